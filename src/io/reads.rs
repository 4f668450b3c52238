//! 读段读取：每行一条，或 FASTQ / FASTA（按首个非空行的首字符判断）。

use std::io::{BufRead, Cursor, Read};
use std::path::Path;

use log::info;

use crate::error::Result;
use crate::io::fasta::FastaReader;
use crate::io::fastq::FastqReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    pub name: String,
    /// 原始 ASCII 序列
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

pub fn parse_reads(data: &[u8]) -> Result<Vec<ReadRecord>> {
    let first = data.iter().find(|b| !b.is_ascii_whitespace()).copied();
    let mut out = Vec::new();
    match first {
        Some(b'@') => {
            let mut r = FastqReader::new(Cursor::new(data));
            while let Some(rec) = r.next_record()? {
                out.push(ReadRecord { name: rec.id, seq: rec.seq, qual: Some(rec.qual) });
            }
        }
        Some(b'>') => {
            for rec in FastaReader::new(Cursor::new(data)) {
                let rec = rec?;
                out.push(ReadRecord { name: rec.id, seq: rec.seq, qual: None });
            }
        }
        _ => {
            for line in Cursor::new(data).lines() {
                let line = line?;
                let seq = line.trim();
                if seq.is_empty() {
                    continue;
                }
                out.push(ReadRecord {
                    name: format!("read{}", out.len() + 1),
                    seq: seq.as_bytes().to_vec(),
                    qual: None,
                });
            }
        }
    }
    Ok(out)
}

pub fn read_reads<R: BufRead>(mut reader: R) -> Result<Vec<ReadRecord>> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    parse_reads(&data)
}

pub fn load_reads<P: AsRef<Path>>(path: P) -> Result<Vec<ReadRecord>> {
    let data = std::fs::read(path.as_ref())?;
    let reads = parse_reads(&data)?;
    info!("loaded {} reads from {}", reads.len(), path.as_ref().display());
    Ok(reads)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines() {
        let reads = parse_reads(b"ACGT\n\nGGNN\r\n").unwrap();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0], ReadRecord { name: "read1".into(), seq: b"ACGT".to_vec(), qual: None });
        assert_eq!(reads[1].name, "read2");
        assert_eq!(reads[1].seq, b"GGNN");
    }

    #[test]
    fn fastq_input() {
        let reads = read_reads(Cursor::new(&b"@q1\nACGT\n+\nIIII\n"[..])).unwrap();
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].name, "q1");
        assert_eq!(reads[0].qual.as_deref(), Some(&b"IIII"[..]));
    }

    #[test]
    fn fasta_input() {
        let reads = parse_reads(b">a\nAC\nGT\n>b\nTT\n").unwrap();
        assert_eq!(reads.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(reads[0].seq, b"ACGT");
    }

    #[test]
    fn empty_input() {
        assert!(parse_reads(b"").unwrap().is_empty());
    }
}
