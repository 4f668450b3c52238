//! 参考序列读取：纯文本或单条 FASTA。

use std::io::{BufRead, Cursor, Read};
use std::path::Path;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::io::fasta::FastaReader;
use crate::util::{dna, PackedSequence};

#[derive(Debug, Clone)]
pub struct Reference {
    pub name: String,
    pub seq: PackedSequence,
    /// 被替换为回退碱基的非 ACGT 字符数
    pub replaced: usize,
}

/// 解析参考序列。首个非空白字符为 `>` 时按 FASTA 读取（只允许一条记录），
/// 否则整个文件视为碱基文本，空白忽略。
pub fn parse_reference(data: &[u8], default_name: &str, fallback: u8) -> Result<Reference> {
    let first = data.iter().find(|b| !b.is_ascii_whitespace());
    let (name, ascii) = if first == Some(&b'>') {
        let mut reader = FastaReader::new(Cursor::new(data));
        let rec = reader
            .next_record()?
            .ok_or_else(|| Error::InvalidInput("FASTA contains no records".into()))?;
        if reader.next_record()?.is_some() {
            return Err(Error::InvalidInput("only a single reference sequence can be indexed".into()));
        }
        (rec.id, rec.seq)
    } else {
        let seq: Vec<u8> = data.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
        (default_name.to_string(), seq)
    };

    let (seq, replaced) = PackedSequence::from_ascii(&ascii, fallback);
    if replaced > 0 {
        let base = dna::from_code(fallback) as char;
        warn!("{} non-ACGT characters in '{}' replaced by {}", replaced, name, base);
    }
    Ok(Reference { name, seq, replaced })
}

pub fn read_reference<R: BufRead>(mut reader: R, default_name: &str, fallback: u8) -> Result<Reference> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    parse_reference(&data, default_name, fallback)
}

pub fn load_reference<P: AsRef<Path>>(path: P, fallback: u8) -> Result<Reference> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "ref".into());
    let r = parse_reference(&data, &stem, fallback)?;
    info!("loaded reference '{}' ({} bases) from {}", r.name, r.seq.len(), path.display());
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::dna::DEFAULT_FALLBACK;

    #[test]
    fn raw_text_ignores_whitespace() {
        let r = parse_reference(b"acgt\nAC GT\r\n", "x", DEFAULT_FALLBACK).unwrap();
        assert_eq!(r.name, "x");
        assert_eq!(r.seq.to_ascii(), b"ACGTACGT");
        assert_eq!(r.replaced, 0);
    }

    #[test]
    fn fasta_single_record_with_unknown_bases() {
        let r = parse_reference(b"\n>chrT test\nACNN\nRT\n", "x", DEFAULT_FALLBACK).unwrap();
        assert_eq!(r.name, "chrT");
        assert_eq!(r.seq.to_ascii(), b"ACGGGT");
        assert_eq!(r.replaced, 3);

        let r = parse_reference(b">c\nAN\n", "x", 0).unwrap();
        assert_eq!(r.seq.to_ascii(), b"AA");
    }

    #[test]
    fn multiple_records_rejected() {
        let err = parse_reference(b">a\nAC\n>b\nGT\n", "x", DEFAULT_FALLBACK).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn empty_input_is_empty_sequence() {
        let r = read_reference(Cursor::new(&b"  \n"[..]), "x", DEFAULT_FALLBACK).unwrap();
        assert!(r.seq.is_empty());
    }
}
