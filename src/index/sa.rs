use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::sais;
use crate::util::PackedSequence;

/// 后缀数组：`len + 1` 行，`sa[0] == len`（只含哨兵的空后缀）。
pub type SuffixArray = Vec<u32>;

/// 桶排序在此行数以上才并行（线程开销在小规模时占主导，数值来自实测）
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 10_000_000;

/// 桶排序的默认深度上限。随机序列的 LCP 约为 log4(n)，
/// 超过这个深度通常意味着长重复，交给 SA-IS 更划算。
pub const DEFAULT_MAX_DEPTH: usize = 4096;

/// 可被打包编码的最大碱基数（行号需要放进 u32）
pub const MAX_BASES: usize = u32::MAX as usize - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum SaAlgorithm {
    /// 并行直方图（基数）排序
    Histogram,
    /// 线性时间 SA-IS
    Sais,
    /// 先用直方图排序，深度超限时回退到 SA-IS
    Auto,
}

#[derive(Debug, Clone, Copy)]
pub struct SaConfig {
    pub algorithm: SaAlgorithm,
    pub parallel_threshold: usize,
    pub max_depth: usize,
}

impl Default for SaConfig {
    fn default() -> Self {
        Self {
            algorithm: SaAlgorithm::Auto,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// 按配置构建后缀数组。两种算法输出完全相同。
pub fn build_suffix_array(seq: &PackedSequence, cfg: &SaConfig) -> Result<SuffixArray> {
    if seq.len() > MAX_BASES {
        return Err(Error::TooLarge { len: seq.len(), limit: MAX_BASES });
    }
    match cfg.algorithm {
        SaAlgorithm::Histogram => histogram_sort(seq, cfg),
        SaAlgorithm::Sais => Ok(sais::build(seq)),
        SaAlgorithm::Auto => match histogram_sort(seq, cfg) {
            Err(Error::SortDepthExceeded { limit }) => {
                warn!("histogram sort hit depth limit {}, falling back to SA-IS", limit);
                Ok(sais::build(seq))
            }
            other => other,
        },
    }
}

/// 并行直方图排序。
///
/// 每一层按 `depth` 处的碱基把区间分成 "已结束" + 4 个桶：先计数，
/// 再分发到另一块等长缓冲区，两块缓冲区按深度奇偶交替使用。
/// 递归改为显式工作栈，深度超过 `max_depth` 时返回
/// [`Error::SortDepthExceeded`]。
pub(crate) fn histogram_sort(seq: &PackedSequence, cfg: &SaConfig) -> Result<SuffixArray> {
    let n = seq.len();
    let rows = n + 1;
    // 位置 n 是空后缀，深度 0 即结束，天然排在最前
    let mut primary: Vec<u32> = Vec::with_capacity(rows);
    primary.push(n as u32);
    primary.extend(0..n as u32);
    let mut aux = vec![0u32; rows];

    if rows < cfg.parallel_threshold || n == 0 {
        sort_range(seq, &mut primary, &mut aux, 0, false, cfg.max_depth)?;
        return Ok(primary);
    }

    info!("histogram sort: {} rows, fanning out over symbol buckets", rows);

    // 深度 0 单独处理：分桶后每个桶交给一个 worker
    let mut lens = [0usize; 4];
    for &p in &primary[1..] {
        lens[seq.get(p as usize) as usize] += 1;
    }
    let mut ptrs = [0usize; 4];
    ptrs[0] = 1;
    for c in 1..4 {
        ptrs[c] = ptrs[c - 1] + lens[c - 1];
    }
    aux[0] = primary[0];
    for &p in &primary[1..] {
        let c = seq.get(p as usize) as usize;
        aux[ptrs[c]] = p;
        ptrs[c] += 1;
    }

    // 桶是互不重叠的区间，切成独立的可变切片后并行，无需加锁
    let mut chunks: Vec<(&mut [u32], &mut [u32])> = Vec::with_capacity(4);
    let (_, mut prim_rest) = primary.split_at_mut(1);
    let (_, mut aux_rest) = aux.split_at_mut(1);
    for &len in &lens {
        let (p, pr) = std::mem::take(&mut prim_rest).split_at_mut(len);
        let (a, ar) = std::mem::take(&mut aux_rest).split_at_mut(len);
        chunks.push((p, a));
        prim_rest = pr;
        aux_rest = ar;
    }

    let max_depth = cfg.max_depth;
    chunks
        .into_par_iter()
        .map(|(p, a)| sort_range(seq, p, a, 1, true, max_depth))
        .collect::<Result<Vec<()>>>()?;

    Ok(primary)
}

struct Task {
    start: usize,
    end: usize,
    depth: usize,
    in_aux: bool,
}

/// 对 `primary`/`aux` 中的一段排序，结果总是落在 `primary`。
/// `in_aux` 表示当前数据位于哪块缓冲区。
fn sort_range(
    seq: &PackedSequence,
    primary: &mut [u32],
    aux: &mut [u32],
    depth: usize,
    in_aux: bool,
    max_depth: usize,
) -> Result<()> {
    let n = seq.len();
    let mut stack = vec![Task { start: 0, end: primary.len(), depth, in_aux }];
    let mut deepest = depth;

    while let Some(t) = stack.pop() {
        let (src, dst): (&mut [u32], &mut [u32]) = if t.in_aux {
            (&mut *aux, &mut *primary)
        } else {
            (&mut *primary, &mut *aux)
        };

        if t.end <= t.start {
            continue;
        }
        if t.end - t.start == 1 {
            if t.in_aux {
                dst[t.start] = src[t.start];
            }
            continue;
        }
        if t.depth > max_depth {
            return Err(Error::SortDepthExceeded { limit: max_depth });
        }
        deepest = deepest.max(t.depth);

        // 同一区间共享长度为 depth 的前缀，至多一个后缀恰好在这里结束
        let mut start = t.start;
        for i in start..t.end {
            if src[i] as usize + t.depth == n {
                src.swap(i, start);
                if t.in_aux {
                    dst[start] = src[start];
                }
                start += 1;
                break;
            }
        }

        let mut lens = [0usize; 4];
        for &p in &src[start..t.end] {
            lens[seq.get(p as usize + t.depth) as usize] += 1;
        }
        let mut ptrs = [0usize; 4];
        ptrs[0] = start;
        for c in 1..4 {
            ptrs[c] = ptrs[c - 1] + lens[c - 1];
        }
        for i in start..t.end {
            let p = src[i];
            let c = seq.get(p as usize + t.depth) as usize;
            dst[ptrs[c]] = p;
            ptrs[c] += 1;
        }

        let mut lo = start;
        for &len in &lens {
            stack.push(Task { start: lo, end: lo + len, depth: t.depth + 1, in_aux: !t.in_aux });
            lo += len;
        }
    }

    debug!("histogram sort range of {} rows finished at depth {}", primary.len(), deepest);
    Ok(())
}
