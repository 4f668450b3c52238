use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;
use rayon::prelude::*;

use crate::align::aligner::{Aligner, Alignment};
use crate::align::dp::DpBuffer;
use crate::error::{Error, Result};
use crate::index::FmIndex;

/// 批量任务的取消标志，克隆后共享同一个状态
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// 精确检索结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    pub count: usize,
    /// 最小的出现位置
    pub first: Option<usize>,
}

/// 可复用的固定大小工作线程池。
///
/// 每批任务按连续区间切分，各线程只读共享同一个 FM 索引，
/// 结果按输入顺序返回。
pub struct AlignPool {
    pool: rayon::ThreadPool,
}

impl AlignPool {
    /// `threads == 0` 时使用 rayon 的默认线程数
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("fmalign-worker-{}", i))
            .build()
            .map_err(|e| Error::InvalidInput(format!("cannot start worker pool: {}", e)))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn chunk_size(&self, total: usize) -> usize {
        let t = self.threads().max(1);
        ((total + t - 1) / t).max(1)
    }

    /// 批量比对。取消后尚未处理的读段不再比对，整批返回 [`Error::Cancelled`]。
    pub fn align_batch(
        &self,
        aligner: &Aligner<'_>,
        reads: &[Vec<u8>],
        cancel: &CancelToken,
    ) -> Result<Vec<Option<Alignment>>> {
        let chunk = self.chunk_size(reads.len());
        let parts: Vec<Vec<Option<Alignment>>> = self.pool.install(|| {
            reads
                .par_chunks(chunk)
                .map(|part| {
                    let mut buf = DpBuffer::new();
                    part.iter()
                        .map(|r| {
                            if cancel.is_cancelled() {
                                return Err(Error::Cancelled);
                            }
                            Ok(aligner.align_with_buf(r, &mut buf))
                        })
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()
        })?;
        let out: Vec<Option<Alignment>> = parts.into_iter().flatten().collect();
        let aligned = out.iter().filter(|a| a.is_some()).count();
        info!("aligned {} of {} reads on {} threads", aligned, out.len(), self.threads());
        Ok(out)
    }

    /// 批量精确检索
    pub fn search_batch(&self, fm: &FmIndex, patterns: &[Vec<u8>], cancel: &CancelToken) -> Result<Vec<SearchHit>> {
        let chunk = self.chunk_size(patterns.len());
        let parts: Vec<Vec<SearchHit>> = self.pool.install(|| {
            patterns
                .par_chunks(chunk)
                .map(|part| {
                    part.iter()
                        .map(|pat| {
                            if cancel.is_cancelled() {
                                return Err(Error::Cancelled);
                            }
                            Ok(match fm.backward_search(pat) {
                                Some(iv) => SearchHit {
                                    count: iv.len(),
                                    first: iv.rows().map(|r| fm.resolve_row(r)).min(),
                                },
                                None => SearchHit { count: 0, first: None },
                            })
                        })
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()
        })?;
        Ok(parts.into_iter().flatten().collect())
    }
}
