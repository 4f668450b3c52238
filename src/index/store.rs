//! 索引文件读写。
//!
//! 文件按本机字节序依次写入（全部为 32 位有符号整数，BWT 除外）：
//!
//! | 字段          | 数量                     |
//! |---------------|--------------------------|
//! | length        | 1                        |
//! | cumulative    | 5                        |
//! | sentinel_pos  | 1                        |
//! | sampled_sa    | `length / 32 + 1`        |
//! | bwt           | `(length + 3) / 4` 字节  |
//!
//! rank 索引不落盘，读取时重建。构建参数等元数据另存于 `<index>.meta`。

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::fm::{FmIndex, SA_SAMPLE_RATE};
use crate::index::rank::DEFAULT_BLOCKSIZE;
use crate::index::sa::SaAlgorithm;
use crate::util::packed::packed_len;
use crate::util::PackedSequence;

const INT_LIMIT: usize = i32::MAX as usize;

fn put_i32<W: Write>(w: &mut W, v: usize) -> Result<()> {
    if v > INT_LIMIT {
        return Err(Error::TooLarge { len: v, limit: INT_LIMIT });
    }
    w.write_all(&(v as i32).to_ne_bytes())?;
    Ok(())
}

fn read_exact_or_format<R: Read>(r: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => Error::Format(format!("file truncated while reading {}", what)),
        _ => Error::Io(e),
    })
}

fn get_i32<R: Read>(r: &mut R, what: &str) -> Result<usize> {
    let mut buf = [0u8; 4];
    read_exact_or_format(r, &mut buf, what)?;
    let v = i32::from_ne_bytes(buf);
    if v < 0 {
        return Err(Error::Format(format!("negative {} ({})", what, v)));
    }
    Ok(v as usize)
}

/// 按固定布局写出索引
pub fn write_index<W: Write>(fm: &FmIndex, w: &mut W) -> Result<()> {
    if fm.len() > INT_LIMIT {
        return Err(Error::TooLarge { len: fm.len(), limit: INT_LIMIT });
    }
    put_i32(w, fm.len())?;
    for c in fm.cumulative() {
        put_i32(w, c)?;
    }
    put_i32(w, fm.sentinel_pos())?;
    for &s in fm.sampled_sa() {
        put_i32(w, s as usize)?;
    }
    w.write_all(fm.bwt().as_bytes())?;
    Ok(())
}

/// 读取索引并用 `blocksize` 重建 rank 结构。
/// 截断或字段不一致返回 [`Error::Format`]。
pub fn read_index<R: Read>(r: &mut R, blocksize: usize) -> Result<FmIndex> {
    let length = get_i32(r, "length")?;
    let mut cumulative = [0usize; 5];
    for c in cumulative.iter_mut() {
        *c = get_i32(r, "cumulative counts")?;
    }
    let sentinel_pos = get_i32(r, "sentinel position")?;

    let samples = length / SA_SAMPLE_RATE + 1;
    let mut raw = vec![0u8; samples * 4];
    read_exact_or_format(r, &mut raw, "suffix array samples")?;
    let sampled_sa: Vec<u32> = raw
        .chunks_exact(4)
        .map(|b| i32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .map(|v| u32::try_from(v).map_err(|_| Error::Format(format!("negative suffix array sample ({})", v))))
        .collect::<Result<_>>()?;

    let mut bytes = vec![0u8; packed_len(length)];
    read_exact_or_format(r, &mut bytes, "BWT")?;
    let bwt = PackedSequence::from_raw_parts(bytes, length)?;

    let fm = FmIndex::from_parts(length, bwt, sentinel_pos, sampled_sa, blocksize)?;
    if fm.cumulative() != cumulative {
        return Err(Error::Format(format!(
            "stored cumulative counts {:?} disagree with BWT {:?}",
            cumulative,
            fm.cumulative()
        )));
    }
    Ok(fm)
}

pub fn save_to_file<P: AsRef<Path>>(fm: &FmIndex, path: P) -> Result<()> {
    let f = File::create(path.as_ref())?;
    let mut w = BufWriter::new(f);
    write_index(fm, &mut w)?;
    w.flush()?;
    info!("wrote index of {} bases to {}", fm.len(), path.as_ref().display());
    Ok(())
}

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<FmIndex> {
    load_with_blocksize(path, DEFAULT_BLOCKSIZE)
}

/// 读取索引，rank 结构按 `blocksize` 重建
pub fn load_with_blocksize<P: AsRef<Path>>(path: P, blocksize: usize) -> Result<FmIndex> {
    let f = File::open(path.as_ref())?;
    let mut r = BufReader::new(f);
    let fm = read_index(&mut r, blocksize)?;
    info!("loaded index of {} bases from {}", fm.len(), path.as_ref().display());
    Ok(fm)
}

/// 构建信息，写在索引旁边的 `.meta` 文件里，缺失不影响使用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: String,
    pub reference: String,
    pub length: u64,
    pub algorithm: SaAlgorithm,
    pub rank_blocksize: u64,
    pub replaced_bases: u64,
    pub command_line: String,
    pub created: String,
}

impl IndexMeta {
    pub fn new(reference: &str, length: usize, algorithm: SaAlgorithm, rank_blocksize: usize, replaced: usize) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            reference: reference.to_string(),
            length: length as u64,
            algorithm,
            rank_blocksize: rank_blocksize as u64,
            replaced_bases: replaced as u64,
            command_line: std::env::args().collect::<Vec<_>>().join(" "),
            created: Utc::now().to_rfc3339(),
        }
    }
}

/// `<index>.meta`
pub fn meta_path<P: AsRef<Path>>(index_path: P) -> PathBuf {
    let mut s = index_path.as_ref().as_os_str().to_owned();
    s.push(".meta");
    PathBuf::from(s)
}

pub fn save_meta<P: AsRef<Path>>(meta: &IndexMeta, index_path: P) -> Result<()> {
    let f = File::create(meta_path(index_path))?;
    let mut w = BufWriter::new(f);
    bincode::serialize_into(&mut w, meta)?;
    w.flush()?;
    Ok(())
}

/// 读取元数据；文件不存在时返回 `Ok(None)`
pub fn load_meta<P: AsRef<Path>>(index_path: P) -> Result<Option<IndexMeta>> {
    let f = match File::open(meta_path(index_path)) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let meta = bincode::deserialize_from(BufReader::new(f))?;
    Ok(Some(meta))
}
