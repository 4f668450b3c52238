//! 缝合用的仿射间隙动态规划（Gotoh 三矩阵）。
//!
//! 读段必须整体比上（全局），参考窗口的一端固定、另一端可以空出：
//! - [`stitch_end_anchored`]：对齐必须止于窗口末尾，窗口前部可跳过
//! - [`stitch_start_anchored`]：对齐必须始于窗口开头，窗口尾部可跳过

use crate::align::cigar::{EditOp, EditScript};

const NEG_INF: i32 = i32::MIN / 4;

/// 罚分（均为正数，计分时取负）。恒等匹配不加分。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Penalties {
    pub mismatch: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
}

impl Default for Penalties {
    fn default() -> Self {
        // 1/2/3 个碱基的缺口分别为 -8/-11/-14
        Self { mismatch: 6, gap_open: 5, gap_extend: 3 }
    }
}

impl Penalties {
    /// 长度为 `len` 的缺口得分
    #[inline]
    pub fn gap(&self, len: usize) -> i32 {
        -(self.gap_open + self.gap_extend * len as i32)
    }

    #[inline]
    fn subst(&self, a: u8, b: u8) -> i32 {
        if a == b {
            0
        } else {
            -self.mismatch
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stitch {
    /// 按读段正向顺序的编辑操作
    pub ops: EditScript,
    pub score: i32,
    /// 对齐在窗口内的起点
    pub ref_start: usize,
    /// 对齐消耗的窗口碱基数
    pub ref_len: usize,
}

/// DP 工作缓冲区，可跨调用复用
#[derive(Debug, Default)]
pub struct DpBuffer {
    h: Vec<i32>,
    e: Vec<i32>,
    f: Vec<i32>,
}

impl DpBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, size: usize) {
        for v in [&mut self.h, &mut self.e, &mut self.f] {
            v.clear();
            v.resize(size, NEG_INF);
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    H,
    E,
    F,
}

/// 读段 `read` 全部比对到 `window` 的某个后缀上（对齐止于窗口末尾）
pub fn stitch_end_anchored(read: &[u8], window: &[u8], p: &Penalties, buf: &mut DpBuffer) -> Stitch {
    let m = read.len();
    let n = window.len();
    let cols = n + 1;
    buf.reset((m + 1) * cols);
    let (h, e, f) = (&mut buf.h, &mut buf.e, &mut buf.f);

    // 第 0 行：窗口前部免费跳过
    h[..cols].fill(0);
    // 第 0 列：读段开头的插入
    for i in 1..=m {
        h[i * cols] = p.gap(i);
        e[i * cols] = p.gap(i);
    }

    for i in 1..=m {
        for j in 1..=n {
            let idx = i * cols + j;
            let up = idx - cols;
            let left = idx - 1;
            let diag = up - 1;

            e[idx] = (h[up] + p.gap(1)).max(e[up] - p.gap_extend);
            f[idx] = (h[left] + p.gap(1)).max(f[left] - p.gap_extend);
            let d = h[diag] + p.subst(read[i - 1], window[j - 1]);
            h[idx] = d.max(e[idx]).max(f[idx]);
        }
    }

    let score = h[m * cols + n];

    // 回溯：H/E/F 三种状态之间按得分来源转移
    let mut rev = EditScript::new();
    let (mut i, mut j) = (m, n);
    let mut state = State::H;
    loop {
        let idx = i * cols + j;
        match state {
            State::H => {
                if i == 0 {
                    break;
                }
                if j == 0 {
                    state = State::E;
                } else if h[idx] == h[idx - cols - 1] + p.subst(read[i - 1], window[j - 1]) {
                    rev.push(EditOp::Match, 1);
                    i -= 1;
                    j -= 1;
                } else if h[idx] == e[idx] {
                    state = State::E;
                } else {
                    state = State::F;
                }
            }
            State::E => {
                rev.push(EditOp::Insertion, 1);
                if i == 1 || e[idx] == h[idx - cols] + p.gap(1) {
                    state = State::H;
                }
                i -= 1;
            }
            State::F => {
                rev.push(EditOp::Deletion, 1);
                if j == 1 || f[idx] == h[idx - 1] + p.gap(1) {
                    state = State::H;
                }
                j -= 1;
            }
        }
    }

    let mut ops = EditScript::new();
    rev.flip_onto(&mut ops);
    Stitch { ops, score, ref_start: j, ref_len: n - j }
}

/// 读段 `read` 全部比对到 `window` 的某个前缀上（对齐始于窗口开头）。
/// 两条序列反转后复用 [`stitch_end_anchored`]。
pub fn stitch_start_anchored(read: &[u8], window: &[u8], p: &Penalties, buf: &mut DpBuffer) -> Stitch {
    let rread: Vec<u8> = read.iter().rev().copied().collect();
    let rwin: Vec<u8> = window.iter().rev().copied().collect();
    let mut s = stitch_end_anchored(&rread, &rwin, p, buf);
    s.ops.reverse();
    Stitch { ops: s.ops, score: s.score, ref_start: 0, ref_len: s.ref_len }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::dna;

    fn enc(s: &[u8]) -> Vec<u8> {
        dna::encode_seq(s, dna::DEFAULT_FALLBACK).0
    }

    fn end(read: &[u8], win: &[u8]) -> Stitch {
        stitch_end_anchored(&enc(read), &enc(win), &Penalties::default(), &mut DpBuffer::new())
    }

    fn start(read: &[u8], win: &[u8]) -> Stitch {
        stitch_start_anchored(&enc(read), &enc(win), &Penalties::default(), &mut DpBuffer::new())
    }

    #[test]
    fn gap_costs() {
        let p = Penalties::default();
        assert_eq!((p.gap(1), p.gap(2), p.gap(3)), (-8, -11, -14));
    }

    #[test]
    fn end_anchored_exact_skips_window_prefix() {
        let s = end(b"ACGTAC", b"TTTACGTAC");
        assert_eq!(s.score, 0);
        assert_eq!(s.ops.to_string(), "6M");
        assert_eq!((s.ref_start, s.ref_len), (3, 6));
    }

    #[test]
    fn end_anchored_mismatch() {
        let s = end(b"ACCTAC", b"GGACGTAC");
        assert_eq!(s.score, -6);
        assert_eq!(s.ops.to_string(), "6M");
        assert_eq!(s.ref_start, 2);
    }

    #[test]
    fn end_anchored_deletion_inside() {
        // 窗口 ...ACGT|AA|CGTACC，读段缺了 AA
        let s = end(b"GGACGTCGTACC", b"TTGGACGTAACGTACC");
        assert_eq!(s.score, -11);
        assert_eq!(s.ops.read_len(), 12);
        assert_eq!(s.ops.ref_len(), 14);
        assert_eq!(s.ref_start, 2);
        assert_eq!(s.ops.runs().iter().filter(|(op, _)| *op == EditOp::Deletion).count(), 1);
    }

    #[test]
    fn end_anchored_insertion_inside() {
        let s = end(b"GGACGTTCGTACCA", b"CCGGACGTCGTACCA");
        assert_eq!(s.score, -8);
        assert_eq!(s.ops.read_len(), 14);
        assert_eq!(s.ops.ref_len(), 13);
        assert_eq!(s.ref_start, 2);
    }

    #[test]
    fn end_anchored_empty_window_is_all_insertion() {
        let s = end(b"ACG", b"");
        assert_eq!(s.ops.to_string(), "3I");
        assert_eq!(s.score, -14);
        assert_eq!(s.ref_len, 0);
    }

    #[test]
    fn start_anchored_skips_window_suffix() {
        let s = start(b"ACGTAC", b"ACGTACGGG");
        assert_eq!(s.score, 0);
        assert_eq!(s.ops.to_string(), "6M");
        assert_eq!((s.ref_start, s.ref_len), (0, 6));

        let s = start(b"ACGAAC", b"ACGTACGGG");
        assert_eq!(s.score, -6);
        assert_eq!(s.ops.to_string(), "6M");
    }

    #[test]
    fn buffer_reuse_across_sizes() {
        let p = Penalties::default();
        let mut buf = DpBuffer::new();
        let a = stitch_end_anchored(&enc(b"ACGTACGTACGT"), &enc(b"GGGACGTACGTACGT"), &p, &mut buf);
        assert_eq!(a.score, 0);
        let b = stitch_end_anchored(&enc(b"AC"), &enc(b"TAC"), &p, &mut buf);
        assert_eq!(b.score, 0);
        assert_eq!(b.ref_start, 1);
    }
}
