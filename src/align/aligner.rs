//! 近似比对：锚定 -> 反向延伸 -> 错配/插入缺失假设 -> DP 缝合。
//!
//! 读段从尾部向头部推进。先在读段窗口 `P[0..w]` 上找最大可映射后缀作为锚点，
//! 然后沿 FM 索引继续反向搜索；搜索中断时依次尝试替换、参考跳过 1..=k 个碱基、
//! 读段跳过 1..=k 个碱基，接受第一个能继续匹配足够长度的假设。
//! 剩余头部过短时用端点固定的 DP 缝合，被锚点收缩丢掉的尾部同理。

use log::debug;

use crate::align::cigar::{EditOp, EditScript};
use crate::align::dp::{stitch_end_anchored, stitch_start_anchored, DpBuffer, Penalties};
use crate::error::{Error, Result};
use crate::index::{FmIndex, Mms, SaInterval};
use crate::util::{dna, PackedSequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    /// SAM FLAG 位
    pub fn flag(self) -> u16 {
        match self {
            Strand::Forward => 0,
            Strand::Reverse => 16,
        }
    }
}

/// 比对参数
#[derive(Debug, Clone, Copy)]
pub struct AlignParams {
    /// 锚点最少匹配碱基数
    pub min_anchor_len: usize,
    /// 锚点区间最多允许的行数（重复区域直接放弃）
    pub max_anchor_hits: usize,
    /// 锚点窗口最多收缩的次数
    pub max_anchor_retries: usize,
    /// 找不到 `min_anchor_len` 的锚点时，退而接受的唯一（单行）锚点最短长度；0 表示不退让
    pub min_unique_anchor_len: usize,
    /// 假设被接受所需的最少后续匹配数
    pub min_extension: usize,
    /// 枚举的最大插入/缺失长度
    pub max_indel: usize,
    /// 剩余头部不超过此长度时直接 DP 缝合
    pub stitch_len: usize,
    /// 所有假设都失败时仍可 DP 缝合的最大长度
    pub max_stitch_len: usize,
    /// DP 参考窗口比读段片段多取的碱基数
    pub stitch_slack: usize,
    pub penalties: Penalties,
    /// 最低得分为 `-(min_score_base + min_score_per_base * 读长)`
    pub min_score_base: f64,
    pub min_score_per_base: f64,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            min_anchor_len: 20,
            max_anchor_hits: 10,
            max_anchor_retries: 32,
            min_unique_anchor_len: 12,
            min_extension: 6,
            max_indel: 3,
            stitch_len: 8,
            max_stitch_len: 32,
            stitch_slack: 6,
            penalties: Penalties::default(),
            min_score_base: 0.6,
            min_score_per_base: 0.6,
        }
    }
}

impl AlignParams {
    /// 读长为 `len` 时可接受的得分下界（不含）
    pub fn min_score(&self, len: usize) -> f64 {
        -(self.min_score_base + self.min_score_per_base * len as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    /// 参考上最左端的 0-based 坐标
    pub position: usize,
    pub strand: Strand,
    /// 相对于比对方向上的读段（反向链为反向互补序列）
    pub cigar: EditScript,
    pub score: i32,
    /// 编辑距离：错配 + 插入 + 缺失碱基数
    pub nm: u32,
}

/// 中断点上被接受的一个假设
struct Fallback {
    op: EditOp,
    len: usize,
    read_used: usize,
    penalty: i32,
    cont: Mms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hypothesis {
    Substitution,
    /// 参考多出 k 个碱基
    SkipRef(usize),
    /// 读段多出 k 个碱基
    SkipRead(usize),
}

/// 绑定在一个 FM 索引与其参考序列上的比对器，只读，可跨线程共享
pub struct Aligner<'a> {
    fm: &'a FmIndex,
    reference: &'a PackedSequence,
    params: AlignParams,
    hypotheses: Vec<(Hypothesis, i32)>,
}

impl<'a> Aligner<'a> {
    pub fn new(fm: &'a FmIndex, reference: &'a PackedSequence, params: AlignParams) -> Result<Self> {
        if reference.len() != fm.len() {
            return Err(Error::InvalidInput(format!(
                "reference has {} bases but index was built over {}",
                reference.len(),
                fm.len()
            )));
        }
        let pen = params.penalties;
        let mut hypotheses = vec![(Hypothesis::Substitution, -pen.mismatch)];
        for k in 1..=params.max_indel {
            hypotheses.push((Hypothesis::SkipRef(k), pen.gap(k)));
            hypotheses.push((Hypothesis::SkipRead(k), pen.gap(k)));
        }
        // 罚分小的先试；同分时保持上面的顺序
        hypotheses.sort_by_key(|&(_, s)| -s);
        Ok(Self { fm, reference, params, hypotheses })
    }

    pub fn params(&self) -> &AlignParams {
        &self.params
    }

    pub fn index(&self) -> &FmIndex {
        self.fm
    }

    /// 比对一条 0..=3 编码的读段，先正向再反向互补，先成功者返回
    pub fn align(&self, read: &[u8]) -> Option<Alignment> {
        self.align_with_buf(read, &mut DpBuffer::new())
    }

    pub fn align_with_buf(&self, read: &[u8], buf: &mut DpBuffer) -> Option<Alignment> {
        if let Some(a) = self.align_strand(read, Strand::Forward, buf) {
            return Some(a);
        }
        let rc = dna::revcomp_codes(read);
        self.align_strand(&rc, Strand::Reverse, buf)
    }

    fn align_strand(&self, read: &[u8], strand: Strand, buf: &mut DpBuffer) -> Option<Alignment> {
        let p = &self.params;
        let m = read.len();
        let floor = p.min_score(m);

        let (w, anchor) = self.find_anchor(read)?;
        let mut stack = EditScript::new();
        stack.push(EditOp::Match, anchor.matched);
        let mut pos = w - anchor.matched;
        let mut iv = anchor.interval;
        let mut score = 0i32;

        while pos > 0 {
            let ext = self.fm.extend(&read[..pos], iv);
            if ext.matched > 0 {
                stack.push(EditOp::Match, ext.matched);
                pos -= ext.matched;
                iv = ext.interval;
                continue;
            }
            if pos <= p.stitch_len {
                break;
            }
            match self.fallback(read, pos, iv) {
                Some(fb) => {
                    score += fb.penalty;
                    if f64::from(score) <= floor {
                        debug!("{:?} strand: score {} below floor at read offset {}", strand, score, pos);
                        return None;
                    }
                    stack.push(fb.op, fb.len);
                    stack.push(EditOp::Match, fb.cont.matched);
                    pos -= fb.read_used + fb.cont.matched;
                    iv = fb.cont.interval;
                }
                None if pos <= p.max_stitch_len => break,
                None => {
                    debug!("{:?} strand: no hypothesis continues at read offset {}", strand, pos);
                    return None;
                }
            }
        }

        // 多行时取参考坐标最小者
        let frontier = iv.rows().map(|r| self.fm.resolve_row(r)).min()?;
        let mut start = frontier;
        if pos > 0 {
            let lo = frontier.saturating_sub(pos + p.stitch_slack);
            let window = self.reference.slice_codes(lo, frontier);
            let mut head = stitch_end_anchored(&read[..pos], &window, &p.penalties, buf);
            score += head.score;
            start = lo + head.ref_start;
            head.ops.flip_onto(&mut stack);
        }
        stack.reverse();

        let tail = &read[w..];
        if !tail.is_empty() {
            let from = start + stack.ref_len();
            let to = (from + tail.len() + p.stitch_slack).min(self.reference.len());
            let window = self.reference.slice_codes(from, to);
            let s = stitch_start_anchored(tail, &window, &p.penalties, buf);
            score += s.score;
            stack.append(&s.ops);
        }

        if f64::from(score) <= floor {
            debug!("{:?} strand: final score {} below floor {:.1}", strand, score, floor);
            return None;
        }

        let nm = self.edit_distance(read, start, &stack);
        Some(Alignment { position: start, strand, cigar: stack, score, nm })
    }

    /// 在 `P[0..w]` 上找满足长度与重复数要求的最大可映射后缀，失败则 `w` 减一重试。
    /// 全部失败时退而取途中最长的唯一锚点（不短于 `min_unique_anchor_len`），
    /// 这样相距不足 `min_anchor_len` 的多个错配仍能比上。
    fn find_anchor(&self, read: &[u8]) -> Option<(usize, Mms)> {
        let p = &self.params;
        let mut w = read.len();
        let shortest = match p.min_unique_anchor_len {
            0 => p.min_anchor_len,
            u => u.min(p.min_anchor_len),
        };
        let mut unique: Option<(usize, Mms)> = None;
        for _ in 0..=p.max_anchor_retries {
            if w == 0 || w < shortest {
                break;
            }
            let mms = self.fm.maximum_mappable_suffix(&read[..w]);
            if mms.matched >= p.min_anchor_len && mms.interval.len() <= p.max_anchor_hits {
                return Some((w, mms));
            }
            if p.min_unique_anchor_len > 0
                && mms.matched >= p.min_unique_anchor_len
                && mms.interval.len() == 1
                && unique.map_or(true, |(_, u)| mms.matched > u.matched)
            {
                unique = Some((w, mms));
            }
            w -= 1;
        }
        unique
    }

    /// 在读段偏移 `pos`（`read[pos..]` 已比上）处枚举假设
    fn fallback(&self, read: &[u8], pos: usize, iv: SaInterval) -> Option<Fallback> {
        let need = self.params.min_extension.max(1);
        for &(hyp, penalty) in &self.hypotheses {
            for row in iv.rows() {
                if row == self.fm.sentinel_pos() {
                    continue;
                }
                let (op, len, read_used, start_row) = match hyp {
                    Hypothesis::Substitution => (EditOp::Match, 1, 1, self.fm.lf(row)),
                    Hypothesis::SkipRef(k) => match self.walk_back(row, k) {
                        Some(r) => (EditOp::Deletion, k, 0, r),
                        None => continue,
                    },
                    Hypothesis::SkipRead(k) => {
                        if k >= pos {
                            continue;
                        }
                        (EditOp::Insertion, k, k, row)
                    }
                };
                let rest = &read[..pos - read_used];
                let cont = self.fm.extend(rest, SaInterval { start: start_row, end: start_row + 1 });
                if cont.matched >= need || cont.matched == rest.len() {
                    return Some(Fallback { op, len, read_used, penalty, cont });
                }
            }
        }
        None
    }

    /// 沿 LF 回退 `k` 步；途中遇到参考起点返回 None
    fn walk_back(&self, row: usize, k: usize) -> Option<usize> {
        let mut r = row;
        for _ in 0..k {
            if r == self.fm.sentinel_pos() {
                return None;
            }
            r = self.fm.lf(r);
        }
        Some(r)
    }

    fn edit_distance(&self, read: &[u8], start: usize, cigar: &EditScript) -> u32 {
        let mut nm = 0u32;
        let (mut qi, mut rj) = (0usize, start);
        for &(op, n) in cigar.runs() {
            match op {
                EditOp::Match => {
                    for k in 0..n {
                        if read[qi + k] != self.reference.get(rj + k) {
                            nm += 1;
                        }
                    }
                    qi += n;
                    rj += n;
                }
                EditOp::Insertion => {
                    nm += n as u32;
                    qi += n;
                }
                EditOp::Deletion => {
                    nm += n as u32;
                    rj += n;
                }
            }
        }
        nm
    }
}
