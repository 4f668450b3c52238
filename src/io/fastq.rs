use std::io::BufRead;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct FastqRecord {
    pub id: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

/// 四行一条的 FASTQ 读取器（不支持折行序列）
pub struct FastqReader<R: BufRead> {
    reader: R,
    line: String,
    line_no: usize,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: String::new(), line_no: 0 }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self.reader.read_line(&mut self.line)?;
        self.line_no += 1;
        Ok(n > 0)
    }

    fn malformed(&self, what: &str) -> Error {
        Error::InvalidInput(format!("FASTQ line {}: {}", self.line_no, what))
    }

    pub fn next_record(&mut self) -> Result<Option<FastqRecord>> {
        // 跳过记录之间的空行
        loop {
            if !self.read_line()? {
                return Ok(None);
            }
            if !self.line.trim().is_empty() {
                break;
            }
        }
        let id = match self.line.strip_prefix('@') {
            Some(h) => h.split_whitespace().next().unwrap_or("").to_string(),
            None => return Err(self.malformed("header does not start with '@'")),
        };

        if !self.read_line()? {
            return Err(self.malformed("unexpected end of file after header"));
        }
        let seq = self.line.trim_end().as_bytes().to_vec();

        if !self.read_line()? || !self.line.starts_with('+') {
            return Err(self.malformed("missing '+' separator"));
        }

        if !self.read_line()? {
            return Err(self.malformed("missing quality line"));
        }
        let qual = self.line.trim_end().as_bytes().to_vec();
        if qual.len() != seq.len() {
            return Err(self.malformed("sequence and quality lengths differ"));
        }

        Ok(Some(FastqRecord { id, seq, qual }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_records() {
        let data = b"@r1 extra\nACGT\n+\nIIII\n\n@r2\nGG\n+r2\n##\n";
        let mut r = FastqReader::new(Cursor::new(&data[..]));
        let a = r.next_record().unwrap().unwrap();
        assert_eq!(a.id, "r1");
        assert_eq!(a.seq, b"ACGT");
        assert_eq!(a.qual, b"IIII");
        let b = r.next_record().unwrap().unwrap();
        assert_eq!((b.id.as_str(), b.seq.as_slice()), ("r2", &b"GG"[..]));
        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn malformed_records() {
        let cases: [&[u8]; 4] = [
            b"r1\nACGT\n+\nIIII\n",
            b"@r1\nACGT\n-\nIIII\n",
            b"@r1\nACGT\n+\nII\n",
            b"@r1\nACGT\n",
        ];
        for data in cases {
            let mut r = FastqReader::new(Cursor::new(data));
            assert!(matches!(r.next_record(), Err(Error::InvalidInput(_))));
        }
    }
}
