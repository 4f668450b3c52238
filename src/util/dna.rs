/// 2-bit 字母表大小：{0:A, 1:C, 2:G, 3:T}
pub const SIGMA: usize = 4;

/// 非 ACGT 字符（包括 N）默认映射到的碱基：G。
/// 这是建模上的取舍，不是正确性要求；CLI 可通过 `--fallback` 修改。
pub const DEFAULT_FALLBACK: u8 = 2;

/// ASCII 碱基转 2-bit 编码；非 ACGT（含 U 以外的 IUPAC 码、N）返回 None。
#[inline]
pub fn to_code(b: u8) -> Option<u8> {
    match b.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' | b'U' => Some(3),
        _ => None,
    }
}

#[inline]
pub fn from_code(c: u8) -> u8 {
    match c & 3 {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        _ => b'T',
    }
}

/// A<->T, C<->G 在 2-bit 编码下恰好是 3 - c
#[inline]
pub fn complement_code(c: u8) -> u8 {
    3 - (c & 3)
}

/// 编码一条 ASCII 序列；返回编码结果和被替换为 `fallback` 的字符数。
pub fn encode_seq(seq: &[u8], fallback: u8) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(seq.len());
    let mut replaced = 0usize;
    for &b in seq {
        match to_code(b) {
            Some(c) => out.push(c),
            None => {
                out.push(fallback & 3);
                replaced += 1;
            }
        }
    }
    (out, replaced)
}

pub fn decode_seq(codes: &[u8]) -> Vec<u8> {
    codes.iter().map(|&c| from_code(c)).collect()
}

/// 对编码序列取反向互补
pub fn revcomp_codes(codes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(codes.len());
    for &c in codes.iter().rev() {
        out.push(complement_code(c));
    }
    out
}

/// ASCII 序列的反向互补，保留大小写；非 ACGT 字符原样保留
pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match b {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' | b'U' => b'A',
            b'a' => b't',
            b'c' => b'g',
            b'g' => b'c',
            b't' | b'u' => b'a',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_maps_unknown_to_fallback() {
        let (codes, replaced) = encode_seq(b"ACgtNu", DEFAULT_FALLBACK);
        assert_eq!(codes, vec![0, 1, 2, 3, 2, 3]);
        assert_eq!(replaced, 1);
    }

    #[test]
    fn revcomp_roundtrip() {
        let (codes, _) = encode_seq(b"AACGTT", DEFAULT_FALLBACK);
        let rc = revcomp_codes(&codes);
        assert_eq!(decode_seq(&rc), b"AACGTT");
        let (codes, _) = encode_seq(b"ACCT", DEFAULT_FALLBACK);
        assert_eq!(decode_seq(&revcomp_codes(&codes)), b"AGGT");
    }

    #[test]
    fn ascii_revcomp_keeps_unknowns() {
        assert_eq!(revcomp(b"ACGTN"), b"NACGT");
        assert_eq!(revcomp(b"aaCg"), b"cGtt");
    }
}
