pub mod aligner;
pub mod cigar;
pub mod dp;
pub mod pool;

use std::io::Write;
use std::path::Path;

use log::{info, warn};

use crate::error::Result;
use crate::index::rank::DEFAULT_BLOCKSIZE;
use crate::index::store;
use crate::io::{self, ReadRecord};
use crate::util::dna;

pub use aligner::{AlignParams, Aligner, Alignment, Strand};
pub use cigar::{EditOp, EditScript};
pub use dp::Penalties;
pub use pool::{AlignPool, CancelToken, SearchHit};

/// 比对运行选项
#[derive(Debug, Clone, Copy)]
pub struct AlignOpt {
    pub params: AlignParams,
    /// 0 表示使用全部核心
    pub threads: usize,
    /// 读段与参考中非 ACGT 字符的替换碱基
    pub fallback: u8,
    /// 每批送入线程池的读段数
    pub batch_size: usize,
}

impl Default for AlignOpt {
    fn default() -> Self {
        Self { params: AlignParams::default(), threads: 0, fallback: dna::DEFAULT_FALLBACK, batch_size: 4096 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignStats {
    pub total: usize,
    pub aligned: usize,
    pub reverse: usize,
}

pub fn write_sam_header<W: Write>(w: &mut W, rname: &str, len: usize) -> Result<()> {
    writeln!(w, "@HD\tVN:1.6\tSO:unsorted")?;
    writeln!(w, "@SQ\tSN:{}\tLN:{}", rname, len)?;
    writeln!(w, "@PG\tID:fmalign\tPN:fmalign\tVN:{}", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}

/// 写一行 SAM 记录。反向链输出反向互补序列与反转的质量值。
pub fn write_sam_record<W: Write>(w: &mut W, rname: &str, rec: &ReadRecord, hit: Option<&Alignment>) -> Result<()> {
    let qual_of = |rev: bool| -> String {
        match &rec.qual {
            Some(q) if rev => q.iter().rev().map(|&b| b as char).collect(),
            Some(q) => String::from_utf8_lossy(q).into_owned(),
            None => "*".to_string(),
        }
    };
    match hit {
        Some(a) => {
            let rev = a.strand == Strand::Reverse;
            let seq = if rev { dna::revcomp(&rec.seq) } else { rec.seq.clone() };
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t255\t{}\t*\t0\t0\t{}\t{}\tNM:i:{}\tAS:i:{}",
                rec.name,
                a.strand.flag(),
                rname,
                a.position + 1,
                a.cigar,
                String::from_utf8_lossy(&seq),
                qual_of(rev),
                a.nm,
                a.score,
            )?;
        }
        None => {
            writeln!(
                w,
                "{}\t4\t*\t0\t0\t*\t*\t0\t0\t{}\t{}",
                rec.name,
                String::from_utf8_lossy(&rec.seq),
                qual_of(false),
            )?;
        }
    }
    Ok(())
}

/// 分批比对读段并写出 SAM 记录（不含头部）
pub fn align_reads<W: Write>(
    aligner: &Aligner<'_>,
    pool: &AlignPool,
    reads: &[ReadRecord],
    rname: &str,
    opt: &AlignOpt,
    cancel: &CancelToken,
    out: &mut W,
) -> Result<AlignStats> {
    let mut stats = AlignStats::default();
    for batch in reads.chunks(opt.batch_size.max(1)) {
        let mut replaced = 0usize;
        let codes: Vec<Vec<u8>> = batch
            .iter()
            .map(|r| {
                let (c, n) = dna::encode_seq(&r.seq, opt.fallback);
                replaced += n;
                c
            })
            .collect();
        if replaced > 0 {
            warn!("{} non-ACGT read bases replaced in this batch", replaced);
        }
        let hits = pool.align_batch(aligner, &codes, cancel)?;
        for (rec, hit) in batch.iter().zip(&hits) {
            write_sam_record(out, rname, rec, hit.as_ref())?;
            stats.total += 1;
            if let Some(a) = hit {
                stats.aligned += 1;
                if a.strand == Strand::Reverse {
                    stats.reverse += 1;
                }
            }
        }
    }
    Ok(stats)
}

/// 命令行 `align` 的完整流程：读参考、读索引、读读段、比对、写 SAM
pub fn align_files(
    sequence_path: &Path,
    index_path: &Path,
    reads_path: &Path,
    out_path: Option<&Path>,
    opt: &AlignOpt,
) -> Result<AlignStats> {
    let reference = io::load_reference(sequence_path, opt.fallback)?;
    let meta = store::load_meta(index_path)?;
    if let Some(m) = &meta {
        info!("index built from {} by fmalign {} at {} ({:?})", m.reference, m.version, m.created, m.algorithm);
    }
    let blocksize = meta.map_or(DEFAULT_BLOCKSIZE, |m| m.rank_blocksize as usize);
    let fm = store::load_with_blocksize(index_path, blocksize)?;
    let aligner = Aligner::new(&fm, &reference.seq, opt.params)?;
    let reads = io::load_reads(reads_path)?;
    let pool = AlignPool::new(opt.threads)?;

    let mut out: Box<dyn Write> = match out_path {
        Some(p) => Box::new(std::io::BufWriter::new(std::fs::File::create(p)?)),
        None => Box::new(std::io::BufWriter::new(std::io::stdout())),
    };
    write_sam_header(&mut out, &reference.name, reference.seq.len())?;
    let stats = align_reads(&aligner, &pool, &reads, &reference.name, opt, &CancelToken::new(), &mut out)?;
    out.flush()?;
    info!("{} of {} reads aligned ({} reverse strand)", stats.aligned, stats.total, stats.reverse);
    Ok(stats)
}
