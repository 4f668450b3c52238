use crate::index::sa::SuffixArray;
use crate::util::PackedSequence;

/// 打包的 BWT：哨兵不编码，只记录其所在行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bwt {
    /// `len` 个碱基（行数为 `len + 1`）
    pub packed: PackedSequence,
    /// `sa[sentinel_pos] == 0` 的那一行
    pub sentinel_pos: usize,
}

/// 根据后缀数组构建 BWT：`BWT[i] = seq[sa[i] - 1]`，`sa[i] == 0` 的行为哨兵。
pub fn encode(seq: &PackedSequence, sa: &SuffixArray) -> Bwt {
    let n = seq.len();
    debug_assert_eq!(sa.len(), n + 1);
    let mut packed = PackedSequence::with_capacity(n);
    let mut sentinel_pos = 0usize;
    for (row, &p) in sa.iter().enumerate() {
        if p == 0 {
            sentinel_pos = row;
        } else {
            packed.push(seq.get(p as usize - 1));
        }
    }
    Bwt { packed, sentinel_pos }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::sa::{build_suffix_array, SaConfig};
    use crate::util::dna;

    #[test]
    fn bwt_of_acgt() {
        let seq = PackedSequence::from_codes(&[0, 1, 2, 3]);
        let sa = build_suffix_array(&seq, &SaConfig::default()).unwrap();
        let bwt = encode(&seq, &sa);
        // rows: $ ACGT$ CGT$ GT$ T$ -> T $ A C G
        assert_eq!(bwt.sentinel_pos, 1);
        assert_eq!(bwt.packed.iter().collect::<Vec<_>>(), vec![3, 0, 1, 2]);
    }

    #[test]
    fn bwt_of_banana_like_text() {
        // ACAACA$ -> 行序 $, A$, AACA$, ACA$, ACAACA$, CA$, CAACA$
        let (seq, _) = PackedSequence::from_ascii(b"ACAACA", dna::DEFAULT_FALLBACK);
        let sa = build_suffix_array(&seq, &SaConfig::default()).unwrap();
        assert_eq!(sa, vec![6, 5, 2, 3, 0, 4, 1]);
        let bwt = encode(&seq, &sa);
        assert_eq!(bwt.sentinel_pos, 4);
        assert_eq!(bwt.packed.to_ascii(), b"ACCAAA");
    }
}
