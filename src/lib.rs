//! # fmalign
//!
//! 2-bit 打包的 DNA FM 索引与基于它的读段比对。
//!
//! - **索引构建**：并行直方图排序或 SA-IS 构建后缀数组，编码 BWT，
//!   建立分块 rank 结构，每 32 行采样一次后缀数组
//! - **检索**：反向搜索、定位、最大可映射后缀
//! - **比对**：锚点 + 反向延伸 + 错配/插入缺失假设 + DP 缝合，输出 CIGAR
//! - **并发**：可复用线程池批量比对/检索，支持取消
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use fmalign::index::{BuildConfig, FmIndex};
//! use fmalign::util::{dna, PackedSequence};
//!
//! let (reference, _) = PackedSequence::from_ascii(b"ACGTACGTAGCTGATCGTAG", dna::DEFAULT_FALLBACK);
//! let fm = FmIndex::build(&reference, &BuildConfig::default()).unwrap();
//!
//! let (pattern, _) = dna::encode_seq(b"GCTGATC", dna::DEFAULT_FALLBACK);
//! if let Some(iv) = fm.backward_search(&pattern) {
//!     println!("{} hits, first at {:?}", iv.len(), fm.locate(&pattern));
//! }
//! ```
//!
//! ## 模块说明
//!
//! - [`util`] — 碱基编码与 2-bit 打包序列
//! - [`index`] — 后缀数组、BWT、rank 结构、FM 索引与索引文件
//! - [`align`] — 编辑脚本、DP 缝合、近似比对器与线程池
//! - [`io`] — 参考序列与读段读取（纯文本 / FASTA / FASTQ）

pub mod align;
pub mod error;
pub mod index;
pub mod io;
pub mod util;

pub use error::{Error, Result};
