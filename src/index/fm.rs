use std::ops::Range;

use log::info;

use crate::error::{Error, Result};
use crate::index::bwt;
use crate::index::rank::{RankIndex, DEFAULT_BLOCKSIZE};
use crate::index::sa::{build_suffix_array, SaConfig};
use crate::util::PackedSequence;

/// 每隔多少行采样一次后缀数组（与索引文件格式绑定）
pub const SA_SAMPLE_RATE: usize = 32;

/// BWT 行区间 `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaInterval {
    pub start: usize,
    pub end: usize,
}

impl SaInterval {
    #[inline]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn rows(&self) -> Range<usize> {
        self.start..self.end.max(self.start)
    }
}

/// 最大可映射后缀：从模式末尾起匹配上的碱基数，以及最后一个非空区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mms {
    pub matched: usize,
    pub interval: SaInterval,
}

#[derive(Debug, Clone, Copy)]
pub struct BuildConfig {
    pub sa: SaConfig,
    pub rank_blocksize: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { sa: SaConfig::default(), rank_blocksize: DEFAULT_BLOCKSIZE }
    }
}

/// 2-bit 打包的 FM 索引。
///
/// - BWT 只编码 `length` 个碱基，哨兵所在行单独记录在 `sentinel_pos`
/// - `cumulative[0] = 1`（第 0 行是哨兵后缀），`cumulative[c + 1] = cumulative[c] + total(c)`
/// - 每 [`SA_SAMPLE_RATE`] 行保存一个后缀数组值，其余位置用 LF 回溯
///
/// 构建完成后只读，可在多线程间共享引用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmIndex {
    length: usize,
    bwt: PackedSequence,
    sentinel_pos: usize,
    cumulative: [usize; 5],
    rank: RankIndex,
    sampled_sa: Vec<u32>,
}

impl FmIndex {
    /// 由打包序列构建：后缀数组 -> 采样 + BWT -> rank 索引。后缀数组用完即丢弃。
    pub fn build(seq: &PackedSequence, cfg: &BuildConfig) -> Result<Self> {
        info!("building suffix array for {} bases ({:?})", seq.len(), cfg.sa.algorithm);
        let sa = build_suffix_array(seq, &cfg.sa)?;
        let sampled_sa: Vec<u32> = sa.iter().step_by(SA_SAMPLE_RATE).copied().collect();
        let encoded = bwt::encode(seq, &sa);
        drop(sa);
        info!("BWT encoded, sentinel at row {}", encoded.sentinel_pos);
        Self::from_parts(seq.len(), encoded.packed, encoded.sentinel_pos, sampled_sa, cfg.rank_blocksize)
    }

    /// 由持久化字段重建索引；rank 索引与累计计数总是重新计算。
    pub fn from_parts(
        length: usize,
        bwt: PackedSequence,
        sentinel_pos: usize,
        sampled_sa: Vec<u32>,
        blocksize: usize,
    ) -> Result<Self> {
        if bwt.len() != length {
            return Err(Error::Format(format!("BWT holds {} bases, header says {}", bwt.len(), length)));
        }
        if sentinel_pos > length {
            return Err(Error::Format(format!("sentinel row {} outside 0..={}", sentinel_pos, length)));
        }
        if sampled_sa.len() != length / SA_SAMPLE_RATE + 1 {
            return Err(Error::Format(format!(
                "expected {} suffix array samples, got {}",
                length / SA_SAMPLE_RATE + 1,
                sampled_sa.len()
            )));
        }
        if let Some(&bad) = sampled_sa.iter().find(|&&v| v as usize > length) {
            return Err(Error::Format(format!("suffix array sample {} exceeds length {}", bad, length)));
        }

        let rank = RankIndex::build(&bwt, blocksize)?;
        let totals = rank.totals();
        let mut cumulative = [0usize; 5];
        cumulative[0] = 1;
        for c in 0..4 {
            cumulative[c + 1] = cumulative[c] + totals[c];
        }
        debug_assert_eq!(cumulative[4], length + 1);

        let fm = Self { length, bwt, sentinel_pos, cumulative, rank, sampled_sa };
        fm.check_lf_cycle()?;
        Ok(fm)
    }

    /// LF 必须是一个覆盖全部行的单环，否则 [`resolve_row`](Self::resolve_row)
    /// 可能困在不含采样行的小环里
    fn check_lf_cycle(&self) -> Result<()> {
        let rows = self.rows();
        let mut row = 0usize;
        for step in 1..=rows {
            row = self.lf(row);
            if row == 0 {
                return if step == rows {
                    Ok(())
                } else {
                    Err(Error::Format(format!("LF cycle through row 0 has {} rows, expected {}", step, rows)))
                };
            }
        }
        Err(Error::Format(format!("LF walk from row 0 does not return within {} steps", rows)))
    }

    /// 参考序列长度（不含哨兵）
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// BWT 行数（`len() + 1`）
    #[inline]
    pub fn rows(&self) -> usize {
        self.length + 1
    }

    pub fn bwt(&self) -> &PackedSequence {
        &self.bwt
    }

    pub fn sentinel_pos(&self) -> usize {
        self.sentinel_pos
    }

    pub fn cumulative(&self) -> [usize; 5] {
        self.cumulative
    }

    pub fn sampled_sa(&self) -> &[u32] {
        &self.sampled_sa
    }

    pub fn rank_index(&self) -> &RankIndex {
        &self.rank
    }

    pub fn full_interval(&self) -> SaInterval {
        SaInterval { start: 0, end: self.rows() }
    }

    /// 第 `row` 行的 BWT 字符；哨兵行返回 None
    #[inline]
    pub fn symbol_at(&self, row: usize) -> Option<u8> {
        if row == self.sentinel_pos {
            return None;
        }
        Some(self.bwt.get(row - usize::from(row > self.sentinel_pos)))
    }

    /// BWT 前 `row` 行中 `sym` 的出现次数。哨兵之后的行先减一再查。
    #[inline]
    pub fn rank(&self, sym: u8, row: usize) -> usize {
        let pos = if row > self.sentinel_pos { row - 1 } else { row };
        self.rank.rank(&self.bwt, pos, sym)
    }

    /// LF 映射：第 `row` 行的后缀向前一个位置所在的行
    #[inline]
    pub fn lf(&self, row: usize) -> usize {
        match self.symbol_at(row) {
            None => 0,
            Some(s) => self.cumulative[s as usize] + self.rank(s, row),
        }
    }

    /// 用字符 `sym` 向前扩展区间
    #[inline]
    pub fn step(&self, interval: SaInterval, sym: u8) -> SaInterval {
        let c0 = self.cumulative[sym as usize];
        SaInterval {
            start: c0 + self.rank(sym, interval.start),
            end: c0 + self.rank(sym, interval.end),
        }
    }

    /// 反向搜索精确匹配，`pattern` 为 0..=3 编码；无匹配返回 None
    pub fn backward_search(&self, pattern: &[u8]) -> Option<SaInterval> {
        let Some((&last, rest)) = pattern.split_last() else {
            return Some(self.full_interval());
        };
        let mut iv = SaInterval {
            start: self.cumulative[last as usize],
            end: self.cumulative[last as usize + 1],
        };
        for &c in rest.iter().rev() {
            if iv.is_empty() {
                return None;
            }
            iv = self.step(iv, c);
        }
        if iv.is_empty() {
            None
        } else {
            Some(iv)
        }
    }

    pub fn count(&self, pattern: &[u8]) -> usize {
        self.backward_search(pattern).map_or(0, |iv| iv.len())
    }

    /// 行号 -> 后缀数组值：LF 回溯到采样行，再加上步数（对 `len + 1` 取模）
    pub fn resolve_row(&self, row: usize) -> usize {
        let mut row = row;
        let mut steps = 0usize;
        while row % SA_SAMPLE_RATE != 0 {
            row = self.lf(row);
            steps += 1;
        }
        (self.sampled_sa[row / SA_SAMPLE_RATE] as usize + steps) % self.rows()
    }

    /// 返回匹配区间第一行对应的位置（按后缀字典序最小的那次出现）
    pub fn locate(&self, pattern: &[u8]) -> Option<usize> {
        self.backward_search(pattern).map(|iv| self.resolve_row(iv.start))
    }

    /// 全部出现位置，升序
    pub fn locate_all(&self, pattern: &[u8]) -> Vec<usize> {
        let mut out: Vec<usize> = match self.backward_search(pattern) {
            Some(iv) => iv.rows().map(|r| self.resolve_row(r)).collect(),
            None => Vec::new(),
        };
        out.sort_unstable();
        out
    }

    /// 最大可映射后缀：匹配到无法继续为止，报告匹配长度与最后的非空区间
    pub fn maximum_mappable_suffix(&self, pattern: &[u8]) -> Mms {
        self.extend(pattern, self.full_interval())
    }

    /// 从已有区间继续反向搜索 `pattern`（从其末尾开始）
    pub fn extend(&self, pattern: &[u8], interval: SaInterval) -> Mms {
        let mut iv = interval;
        for (k, &c) in pattern.iter().rev().enumerate() {
            let next = self.step(iv, c);
            if next.is_empty() {
                return Mms { matched: k, interval: iv };
            }
            iv = next;
        }
        Mms { matched: pattern.len(), interval: iv }
    }

    /// 由 BWT 还原原序列：从第 0 行（哨兵后缀）出发沿 LF 逆序读出
    pub fn reconstruct(&self) -> PackedSequence {
        let mut codes = vec![0u8; self.length];
        let mut row = 0usize;
        for k in (0..self.length).rev() {
            match self.symbol_at(row) {
                Some(s) => codes[k] = s,
                None => break,
            }
            row = self.lf(row);
        }
        PackedSequence::from_codes(&codes)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::index::sa::tests::make_codes;
    use crate::index::sa::SaAlgorithm;
    use crate::util::dna;

    pub(crate) fn fm_from_codes(codes: &[u8]) -> FmIndex {
        let seq = PackedSequence::from_codes(codes);
        FmIndex::build(&seq, &BuildConfig::default()).unwrap()
    }

    fn enc(s: &[u8]) -> Vec<u8> {
        dna::encode_seq(s, dna::DEFAULT_FALLBACK).0
    }

    #[test]
    fn acgt_scenario() {
        let fm = fm_from_codes(&enc(b"ACGT"));
        assert_eq!(fm.cumulative(), [1, 2, 3, 4, 5]);
        assert_eq!(fm.locate(&enc(b"ACGT")), Some(0));
        assert_eq!(fm.locate(&enc(b"GT")), Some(2));
        assert_eq!(fm.locate(&enc(b"TA")), None);
        assert_eq!(fm.sampled_sa(), &[4]);
    }

    #[test]
    fn cumulative_ends_at_rows() {
        let fm = fm_from_codes(&make_codes(777, 11));
        assert_eq!(fm.cumulative()[0], 1);
        assert_eq!(fm.cumulative()[4], 778);
    }

    #[test]
    fn rank_with_sentinel_matches_brute_force() {
        let codes = make_codes(1500, 21);
        let fm = fm_from_codes(&codes);
        let rows: Vec<Option<u8>> = (0..fm.rows()).map(|r| fm.symbol_at(r)).collect();
        assert_eq!(rows.iter().filter(|s| s.is_none()).count(), 1);
        let mut naive = [0usize; 4];
        for row in 0..=fm.rows() {
            for c in 0..4u8 {
                assert_eq!(fm.rank(c, row), naive[c as usize], "row={} c={}", row, c);
            }
            if let Some(Some(s)) = rows.get(row) {
                naive[*s as usize] += 1;
            }
        }
    }

    #[test]
    fn lf_is_a_single_cycle() {
        let fm = fm_from_codes(&make_codes(1000, 5));
        let mut seen = vec![false; fm.rows()];
        let mut row = 0usize;
        for _ in 0..fm.rows() {
            assert!(!seen[row], "row {} visited twice", row);
            seen[row] = true;
            row = fm.lf(row);
        }
        assert_eq!(row, 0);
        assert!(seen.iter().all(|&s| s));

        let start = 137;
        let mut r = start;
        for _ in 0..fm.rows() {
            r = fm.lf(r);
        }
        assert_eq!(r, start);
    }

    #[test]
    fn reconstruct_reproduces_input() {
        for len in [1usize, 2, 31, 32, 33, 500] {
            let codes = make_codes(len, 77 + len as u32);
            let fm = fm_from_codes(&codes);
            assert_eq!(fm.reconstruct().iter().collect::<Vec<_>>(), codes, "len={}", len);
        }
    }

    #[test]
    fn locate_round_trip() {
        let codes = make_codes(2000, 123);
        let fm = fm_from_codes(&codes);
        let k = 24;
        for p in 0..=codes.len() - k {
            let pat = &codes[p..p + k];
            if fm.count(pat) == 1 {
                assert_eq!(fm.locate(pat), Some(p));
            } else {
                assert!(fm.locate_all(pat).contains(&p));
            }
        }
    }

    #[test]
    fn resolve_row_agrees_with_suffix_array() {
        let codes = make_codes(300, 8);
        let seq = PackedSequence::from_codes(&codes);
        let sa = build_suffix_array(&seq, &SaConfig::default()).unwrap();
        let fm = FmIndex::build(&seq, &BuildConfig::default()).unwrap();
        for (row, &p) in sa.iter().enumerate() {
            assert_eq!(fm.resolve_row(row), p as usize);
        }
    }

    #[test]
    fn count_and_locate_all_on_repeats() {
        let fm = fm_from_codes(&enc(b"ACGTACGTACGT"));
        assert_eq!(fm.count(&enc(b"ACGT")), 3);
        assert_eq!(fm.locate_all(&enc(b"ACGT")), vec![0, 4, 8]);
        assert_eq!(fm.count(&enc(b"GG")), 0);
        assert!(fm.locate_all(&enc(b"GG")).is_empty());
        assert_eq!(fm.count(&[]), fm.rows());
    }

    #[test]
    fn mms_reports_matched_suffix() {
        let codes = make_codes(1000, 99);
        let fm = fm_from_codes(&codes);
        let mut read = codes[400..440].to_vec();
        read[10] = (read[10] + 1) & 3;
        let mms = fm.maximum_mappable_suffix(&read);
        // 突变位于第 10 位，其后 29 个碱基唯一匹配
        assert!(mms.matched >= 29 && mms.matched <= 30, "matched {}", mms.matched);
        assert!(!mms.interval.is_empty());
        let full = fm.maximum_mappable_suffix(&codes[400..440]);
        assert_eq!(full.matched, 40);
        assert_eq!(fm.resolve_row(full.interval.start), 400);
    }

    #[test]
    fn extend_continues_from_interval() {
        let codes = make_codes(800, 3);
        let fm = fm_from_codes(&codes);
        let tail = fm.backward_search(&codes[300..320]).unwrap();
        let cont = fm.extend(&codes[280..300], tail);
        assert_eq!(cont.matched, 20);
        assert_eq!(fm.resolve_row(cont.interval.start), 280);
    }

    #[test]
    fn algorithms_build_identical_indexes() {
        let codes = make_codes(1200, 55);
        let seq = PackedSequence::from_codes(&codes);
        let mut cfg = BuildConfig::default();
        cfg.sa.algorithm = SaAlgorithm::Histogram;
        let a = FmIndex::build(&seq, &cfg).unwrap();
        cfg.sa.algorithm = SaAlgorithm::Sais;
        let b = FmIndex::build(&seq, &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn from_parts_rejects_inconsistent_fields() {
        let bwt = PackedSequence::from_codes(&[0, 1, 2]);
        assert!(FmIndex::from_parts(4, bwt.clone(), 0, vec![0], 16).is_err());
        assert!(FmIndex::from_parts(3, bwt.clone(), 9, vec![0], 16).is_err());
        assert!(FmIndex::from_parts(3, bwt.clone(), 0, vec![0, 1], 16).is_err());
        assert!(FmIndex::from_parts(3, bwt, 0, vec![7], 16).is_err());
    }

    #[test]
    fn from_parts_rejects_split_lf_cycle() {
        let fm = fm_from_codes(&make_codes(300, 17));
        let mut codes = fm.bwt().slice_codes(0, fm.len());
        // 交换两个相邻的不同碱基：计数不变，LF 环被拆成两个
        let i = (0..codes.len() - 1).find(|&i| codes[i] != codes[i + 1]).unwrap();
        codes.swap(i, i + 1);
        let swapped = PackedSequence::from_codes(&codes);
        let err = FmIndex::from_parts(fm.len(), swapped, fm.sentinel_pos(), fm.sampled_sa().to_vec(), 64).unwrap_err();
        assert!(matches!(err, Error::Format(_)), "{:?}", err);

        let again = FmIndex::from_parts(
            fm.len(),
            fm.bwt().clone(),
            fm.sentinel_pos(),
            fm.sampled_sa().to_vec(),
            64,
        );
        assert_eq!(again.unwrap(), fm);
    }
}
