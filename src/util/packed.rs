//! 2-bit 打包序列。
//!
//! 每字节存 4 个碱基，高位在前：位置 `i` 位于第 `i / 4` 字节，
//! 右移 `2 * (3 - i % 4)` 位后取低两位。参考序列、BWT 与 rank 索引
//! 都只通过这里的访问函数读写打包数据。

use crate::error::{Error, Result};
use crate::util::dna;

/// 2-bit 打包的核苷酸序列，长度显式保存（末字节可能只用了一部分）。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackedSequence {
    bytes: Vec<u8>,
    len: usize,
}

/// 位置 `i` 所在字节与右移量
#[inline]
pub fn byte_and_shift(i: usize) -> (usize, u32) {
    (i >> 2, (2 * (3 - (i & 3))) as u32)
}

/// 容纳 `len` 个碱基所需的字节数
#[inline]
pub fn packed_len(len: usize) -> usize {
    (len + 3) / 4
}

impl PackedSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bases: usize) -> Self {
        Self { bytes: Vec::with_capacity(packed_len(bases)), len: 0 }
    }

    /// 由 0..=3 编码构建；高于 3 的值只取低两位
    pub fn from_codes(codes: &[u8]) -> Self {
        let mut s = Self::with_capacity(codes.len());
        for &c in codes {
            s.push(c);
        }
        s
    }

    /// 由 ASCII 构建，非 ACGT 替换为 `fallback`；返回替换数量
    pub fn from_ascii(seq: &[u8], fallback: u8) -> (Self, usize) {
        let (codes, replaced) = dna::encode_seq(seq, fallback);
        (Self::from_codes(&codes), replaced)
    }

    /// 由已打包的字节与碱基数重建（读取索引文件时使用）。
    /// 末字节中未使用的位会被清零。
    pub fn from_raw_parts(mut bytes: Vec<u8>, len: usize) -> Result<Self> {
        if bytes.len() != packed_len(len) {
            return Err(Error::Format(format!(
                "packed buffer holds {} bytes, {} bases need {}",
                bytes.len(),
                len,
                packed_len(len)
            )));
        }
        let used = len & 3;
        if used != 0 {
            if let Some(last) = bytes.last_mut() {
                *last &= !(0xFFu8 >> (2 * used));
            }
        }
        Ok(Self { bytes, len })
    }

    #[inline]
    pub fn push(&mut self, code: u8) {
        let (byte, shift) = byte_and_shift(self.len);
        if byte == self.bytes.len() {
            self.bytes.push(0);
        }
        self.bytes[byte] |= (code & 3) << shift;
        self.len += 1;
    }

    #[inline]
    pub fn get(&self, i: usize) -> u8 {
        debug_assert!(i < self.len, "base {} out of range (len {})", i, self.len);
        let (byte, shift) = byte_and_shift(i);
        (self.bytes[byte] >> shift) & 3
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    /// 取出 `[start, end)` 的编码（越界部分截断）
    pub fn slice_codes(&self, start: usize, end: usize) -> Vec<u8> {
        let end = end.min(self.len);
        if start >= end {
            return Vec::new();
        }
        (start..end).map(|i| self.get(i)).collect()
    }

    pub fn to_ascii(&self) -> Vec<u8> {
        self.iter().map(dna::from_code).collect()
    }
}
