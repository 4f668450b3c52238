use crate::error::{Error, Result};
use crate::util::PackedSequence;

/// 默认分块大小（碱基数）
pub const DEFAULT_BLOCKSIZE: usize = 64;

/// 256 种打包字节 × 4 种碱基的计数表（共 1024 项）。
/// 纯派生数据，总是现场生成，从不持久化。
pub fn lookup_table() -> Vec<[u8; 4]> {
    let mut tbl = vec![[0u8; 4]; 256];
    for (b, counts) in tbl.iter_mut().enumerate() {
        for k in 0..4 {
            counts[(b >> (2 * k)) & 3] += 1;
        }
    }
    tbl
}

/// 分块采样的 rank 结构。
///
/// `blocks[j][c]` 为打包 BWT 前 `j * blocksize` 个碱基中 `c` 的数量，
/// 长度不是分块整数倍时末尾多一项覆盖整个序列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankIndex {
    blocksize: usize,
    blocks: Vec<[u32; 4]>,
    lookup: Vec<[u8; 4]>,
}

impl RankIndex {
    pub fn build(bwt: &PackedSequence, blocksize: usize) -> Result<Self> {
        if blocksize == 0 || blocksize % 16 != 0 {
            return Err(Error::InvalidBlockSize(blocksize));
        }
        let lookup = lookup_table();
        let len = bwt.len();
        let bytes = bwt.as_bytes();
        let bytes_per_block = blocksize / 4;
        let full = len / blocksize;

        let mut blocks = Vec::with_capacity(full + 2);
        let mut running = [0u32; 4];
        blocks.push(running);
        for j in 0..full {
            for &b in &bytes[j * bytes_per_block..(j + 1) * bytes_per_block] {
                add_byte(&mut running, &lookup[b as usize]);
            }
            blocks.push(running);
        }
        if len % blocksize != 0 {
            // 末尾不完整的块：整字节查表，剩下 0..=3 个碱基逐个数
            for &b in &bytes[full * bytes_per_block..len / 4] {
                add_byte(&mut running, &lookup[b as usize]);
            }
            for i in (len & !3)..len {
                running[bwt.get(i) as usize] += 1;
            }
            blocks.push(running);
        }

        Ok(Self { blocksize, blocks, lookup })
    }

    /// 打包 BWT 前 `pos` 个碱基中 `sym` 的数量（`pos <= bwt.len()`）。
    /// 哨兵的位置修正由调用方负责。
    #[inline]
    pub fn rank(&self, bwt: &PackedSequence, pos: usize, sym: u8) -> usize {
        debug_assert!(pos <= bwt.len());
        let s = sym as usize;
        let b = pos / self.blocksize;
        let mut x = self.blocks[b][s] as usize;
        let bytes = bwt.as_bytes();
        for &byte in &bytes[b * (self.blocksize / 4)..pos / 4] {
            x += self.lookup[byte as usize][s] as usize;
        }
        for i in (pos & !3)..pos {
            if bwt.get(i) == sym {
                x += 1;
            }
        }
        x
    }

    /// 整个打包 BWT 中各碱基的总数
    pub fn totals(&self) -> [usize; 4] {
        let last = self.blocks.last().copied().unwrap_or([0; 4]);
        [last[0] as usize, last[1] as usize, last[2] as usize, last[3] as usize]
    }

    pub fn blocksize(&self) -> usize {
        self.blocksize
    }

    pub fn blocks(&self) -> &[[u32; 4]] {
        &self.blocks
    }
}

#[inline]
fn add_byte(running: &mut [u32; 4], counts: &[u8; 4]) {
    for c in 0..4 {
        running[c] += counts[c] as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::sa::tests::make_codes;

    #[test]
    fn lookup_table_counts_each_byte() {
        let tbl = lookup_table();
        assert_eq!(tbl.len(), 256);
        assert_eq!(tbl[0x00], [4, 0, 0, 0]);
        assert_eq!(tbl[0xFF], [0, 0, 0, 4]);
        // 00 01 10 11
        assert_eq!(tbl[0b0001_1011], [1, 1, 1, 1]);
        assert_eq!(tbl[0b1010_0101], [0, 2, 2, 0]);
        assert!(tbl.iter().all(|c| c.iter().map(|&x| x as u32).sum::<u32>() == 4));
    }

    #[test]
    fn rank_matches_brute_force() {
        for &(len, bs) in &[(0usize, 16usize), (1, 16), (15, 16), (16, 16), (17, 32), (1000, 16), (1003, 64), (10_000, 32)] {
            let codes = make_codes(len, 31 + len as u32);
            let bwt = PackedSequence::from_codes(&codes);
            let idx = RankIndex::build(&bwt, bs).unwrap();
            let mut naive = [0usize; 4];
            for pos in 0..=len {
                for c in 0..4u8 {
                    assert_eq!(idx.rank(&bwt, pos, c), naive[c as usize], "len={} pos={} c={}", len, pos, c);
                }
                if pos < len {
                    naive[codes[pos] as usize] += 1;
                }
            }
            assert_eq!(idx.totals(), naive);
        }
    }

    #[test]
    fn blocks_are_prefix_sums() {
        let codes = make_codes(250, 3);
        let bwt = PackedSequence::from_codes(&codes);
        let idx = RankIndex::build(&bwt, 32).unwrap();
        assert_eq!(idx.blocks()[0], [0; 4]);
        // 250 / 32 = 7 个完整块 + 一个尾块
        assert_eq!(idx.blocks().len(), 9);
        for j in 1..idx.blocks().len() {
            let end = (j * 32).min(250);
            let mut expect = idx.blocks()[j - 1];
            for &c in &codes[(j - 1) * 32..end] {
                expect[c as usize] += 1;
            }
            assert_eq!(idx.blocks()[j], expect);
        }
    }

    #[test]
    fn rejects_bad_blocksize() {
        let bwt = PackedSequence::from_codes(&[0, 1, 2]);
        assert!(matches!(RankIndex::build(&bwt, 0), Err(Error::InvalidBlockSize(0))));
        assert!(matches!(RankIndex::build(&bwt, 24), Err(Error::InvalidBlockSize(24))));
    }
}
