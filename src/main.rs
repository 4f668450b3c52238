use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use fmalign::align::{self, AlignOpt, AlignParams, AlignPool, CancelToken, Penalties};
use fmalign::index::rank::DEFAULT_BLOCKSIZE;
use fmalign::index::sa::{SaAlgorithm, SaConfig, DEFAULT_MAX_DEPTH, DEFAULT_PARALLEL_THRESHOLD};
use fmalign::index::store::{self, IndexMeta};
use fmalign::index::{BuildConfig, FmIndex};
use fmalign::io;
use fmalign::util::dna;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(
    name = "fmalign",
    author,
    version,
    about = "2-bit packed FM-index for DNA: exact search and gapped read alignment",
    arg_required_else_help = true
)]
struct Cli {
    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build an FM index of a single reference sequence
    Index {
        /// Reference sequence (raw bases or single-record FASTA)
        sequence: PathBuf,
        /// Output index file
        index: PathBuf,
        #[arg(long, value_enum, default_value_t = SaAlgorithm::Auto)]
        algorithm: SaAlgorithm,
        /// Rank block size in bases (positive multiple of 16)
        #[arg(long, default_value_t = DEFAULT_BLOCKSIZE)]
        blocksize: usize,
        /// Row count from which the suffix sort fans out over threads
        #[arg(long, default_value_t = DEFAULT_PARALLEL_THRESHOLD)]
        parallel_threshold: usize,
        /// Bucket sort depth before falling back to SA-IS
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
        /// Base substituted for non-ACGT characters
        #[arg(long, default_value = "G", value_parser = parse_base)]
        fallback: u8,
        #[arg(short = 't', long = "threads", default_value_t = 0)]
        threads: usize,
    },
    /// Align reads (one per line, FASTA or FASTQ) and write SAM
    Align {
        /// Reference sequence the index was built from
        sequence: PathBuf,
        /// Index file
        index: PathBuf,
        /// Reads file
        reads: PathBuf,
        /// Output SAM path (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(long, default_value = "G", value_parser = parse_base)]
        fallback: u8,
        #[arg(short = 't', long = "threads", default_value_t = 0)]
        threads: usize,
        #[arg(long = "batch-size", default_value_t = 4096)]
        batch_size: usize,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Exact search: print hit count and leftmost position per pattern
    Search {
        /// Index file
        index: PathBuf,
        /// Patterns (one per line, FASTA or FASTQ)
        patterns: PathBuf,
        #[arg(long, default_value = "G", value_parser = parse_base)]
        fallback: u8,
        #[arg(short = 't', long = "threads", default_value_t = 0)]
        threads: usize,
    },
}

#[derive(Args, Debug)]
struct ParamArgs {
    #[arg(long = "min-anchor", default_value_t = 20)]
    min_anchor_len: usize,
    #[arg(long = "max-anchor-hits", default_value_t = 10)]
    max_anchor_hits: usize,
    #[arg(long = "anchor-retries", default_value_t = 32)]
    max_anchor_retries: usize,
    /// Shortest single-hit anchor accepted when no regular anchor exists (0 disables)
    #[arg(long = "min-unique-anchor", default_value_t = 12)]
    min_unique_anchor_len: usize,
    #[arg(long = "min-extension", default_value_t = 6)]
    min_extension: usize,
    #[arg(long = "max-indel", default_value_t = 3)]
    max_indel: usize,
    #[arg(long = "stitch-len", default_value_t = 8)]
    stitch_len: usize,
    #[arg(long = "max-stitch-len", default_value_t = 32)]
    max_stitch_len: usize,
    #[arg(long = "stitch-slack", default_value_t = 6)]
    stitch_slack: usize,
    #[arg(long = "mismatch", default_value_t = 6)]
    mismatch: i32,
    #[arg(long = "gap-open", default_value_t = 5)]
    gap_open: i32,
    #[arg(long = "gap-ext", default_value_t = 3)]
    gap_extend: i32,
    #[arg(long = "min-score-base", default_value_t = 0.6)]
    min_score_base: f64,
    #[arg(long = "min-score-per-base", default_value_t = 0.6)]
    min_score_per_base: f64,
}

impl From<&ParamArgs> for AlignParams {
    fn from(a: &ParamArgs) -> Self {
        AlignParams {
            min_anchor_len: a.min_anchor_len,
            max_anchor_hits: a.max_anchor_hits,
            max_anchor_retries: a.max_anchor_retries,
            min_unique_anchor_len: a.min_unique_anchor_len,
            min_extension: a.min_extension,
            max_indel: a.max_indel,
            stitch_len: a.stitch_len,
            max_stitch_len: a.max_stitch_len,
            stitch_slack: a.stitch_slack,
            penalties: Penalties { mismatch: a.mismatch, gap_open: a.gap_open, gap_extend: a.gap_extend },
            min_score_base: a.min_score_base,
            min_score_per_base: a.min_score_per_base,
        }
    }
}

fn parse_base(s: &str) -> std::result::Result<u8, String> {
    match s.as_bytes() {
        [b] => dna::to_code(*b).ok_or_else(|| format!("'{}' is not one of A/C/G/T", s)),
        _ => Err(format!("expected a single base, got '{}'", s)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info })
        .format_timestamp(None)
        .format_target(false)
        .init();

    match cli.command {
        Commands::Index { sequence, index, algorithm, blocksize, parallel_threshold, max_depth, fallback, threads } => {
            let cfg = BuildConfig {
                sa: SaConfig { algorithm, parallel_threshold, max_depth },
                rank_blocksize: blocksize,
            };
            run_index(&sequence, &index, &cfg, fallback, threads)
        }
        Commands::Align { sequence, index, reads, out, fallback, threads, batch_size, params } => {
            let opt = AlignOpt { params: AlignParams::from(&params), threads, fallback, batch_size };
            let stats = align::align_files(&sequence, &index, &reads, out.as_deref(), &opt)
                .with_context(|| format!("alignment of '{}' failed", reads.display()))?;
            info!("done: {} reads, {} aligned", stats.total, stats.aligned);
            Ok(())
        }
        Commands::Search { index, patterns, fallback, threads } => run_search(&index, &patterns, fallback, threads),
    }
}

fn run_index(sequence: &Path, index: &Path, cfg: &BuildConfig, fallback: u8, threads: usize) -> Result<()> {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("cannot configure the global thread pool")?;
    }

    let reference = io::load_reference(sequence, fallback)
        .with_context(|| format!("cannot read reference '{}'", sequence.display()))?;
    let fm = FmIndex::build(&reference.seq, cfg).context("index construction failed")?;

    store::save_to_file(&fm, index).with_context(|| format!("cannot write index to '{}'", index.display()))?;
    let meta = IndexMeta::new(
        &sequence.display().to_string(),
        fm.len(),
        cfg.sa.algorithm,
        cfg.rank_blocksize,
        reference.replaced,
    );
    store::save_meta(&meta, index)
        .with_context(|| format!("cannot write index metadata next to '{}'", index.display()))?;

    info!("reference: {} ({} bases, {} replaced)", reference.name, fm.len(), reference.replaced);
    info!("FM index saved: {}", index.display());
    Ok(())
}

fn run_search(index: &Path, patterns: &Path, fallback: u8, threads: usize) -> Result<()> {
    let fm = store::load_from_file(index).with_context(|| format!("cannot load index '{}'", index.display()))?;
    let records =
        io::load_reads(patterns).with_context(|| format!("cannot read patterns '{}'", patterns.display()))?;
    let codes: Vec<Vec<u8>> = records.iter().map(|r| dna::encode_seq(&r.seq, fallback).0).collect();

    let pool = AlignPool::new(threads)?;
    let hits = pool.search_batch(&fm, &codes, &CancelToken::new())?;

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    for (rec, hit) in records.iter().zip(&hits) {
        match hit.first {
            Some(p) => writeln!(out, "{}\t{}\t{}", rec.name, hit.count, p)?,
            None => writeln!(out, "{}\t0\t*", rec.name)?,
        }
    }
    out.flush()?;
    Ok(())
}
