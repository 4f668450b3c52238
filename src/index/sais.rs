//! 线性时间后缀数组构建（SA-IS，诱导排序）。
//!
//! 与直方图排序的输出契约相同，没有并行，也没有深度问题：
//! 递归只发生在缩减后的 LMS 子串上，层数为 O(log n)。

use crate::index::sa::SuffixArray;
use crate::util::PackedSequence;

const EMPTY: u32 = u32::MAX;

/// 构建 `seq` 的后缀数组（`len + 1` 行，首行是哨兵后缀）
pub(crate) fn build(seq: &PackedSequence) -> SuffixArray {
    // 碱基整体加一，0 留给哨兵
    let mut text: Vec<u32> = Vec::with_capacity(seq.len() + 1);
    text.extend(seq.iter().map(|c| c as u32 + 1));
    text.push(0);
    sais(&text, 5)
}

/// `text` 必须以唯一且最小的 0 结尾
fn sais(text: &[u32], sigma: usize) -> Vec<u32> {
    let n = text.len();
    let mut sa = vec![EMPTY; n];
    if n == 1 {
        sa[0] = 0;
        return sa;
    }

    // S 型：text[i..] < text[i+1..]
    let mut stype = vec![false; n];
    stype[n - 1] = true;
    for i in (0..n - 1).rev() {
        stype[i] = text[i] < text[i + 1] || (text[i] == text[i + 1] && stype[i + 1]);
    }
    let is_lms = |i: usize| i > 0 && stype[i] && !stype[i - 1];

    let mut counts = vec![0usize; sigma];
    for &c in text {
        counts[c as usize] += 1;
    }

    // 1. LMS 后缀放到各桶尾部，诱导出 LMS 子串的顺序
    let mut tails = bucket_tails(&counts);
    for i in 1..n {
        if is_lms(i) {
            let c = text[i] as usize;
            tails[c] -= 1;
            sa[tails[c]] = i as u32;
        }
    }
    induce(text, &mut sa, &stype, &counts);

    // 2. 给排好序的 LMS 子串命名
    let sorted_lms: Vec<u32> = sa
        .iter()
        .copied()
        .filter(|&j| j != EMPTY && is_lms(j as usize))
        .collect();
    let mut names = vec![EMPTY; n];
    let mut name = 0u32;
    names[sorted_lms[0] as usize] = 0;
    for w in sorted_lms.windows(2) {
        if !lms_substrings_equal(text, &stype, w[0] as usize, w[1] as usize) {
            name += 1;
        }
        names[w[1] as usize] = name;
    }

    let mut lms_positions: Vec<u32> = Vec::with_capacity(sorted_lms.len());
    let mut reduced: Vec<u32> = Vec::with_capacity(sorted_lms.len());
    for (i, &nm) in names.iter().enumerate() {
        if nm != EMPTY {
            lms_positions.push(i as u32);
            reduced.push(nm);
        }
    }

    // 3. 名字全不同时可直接得到缩减串的后缀数组，否则递归
    let reduced_sa = if name as usize + 1 == reduced.len() {
        let mut rsa = vec![0u32; reduced.len()];
        for (i, &nm) in reduced.iter().enumerate() {
            rsa[nm as usize] = i as u32;
        }
        rsa
    } else {
        sais(&reduced, name as usize + 1)
    };

    // 4. 按真实顺序放回 LMS 后缀，再诱导一次
    sa.fill(EMPTY);
    let mut tails = bucket_tails(&counts);
    for &r in reduced_sa.iter().rev() {
        let j = lms_positions[r as usize] as usize;
        let c = text[j] as usize;
        tails[c] -= 1;
        sa[tails[c]] = j as u32;
    }
    induce(text, &mut sa, &stype, &counts);
    sa
}

fn bucket_heads(counts: &[usize]) -> Vec<usize> {
    let mut heads = Vec::with_capacity(counts.len());
    let mut acc = 0usize;
    for &c in counts {
        heads.push(acc);
        acc += c;
    }
    heads
}

/// 各桶的结束位置（不含）
fn bucket_tails(counts: &[usize]) -> Vec<usize> {
    let mut tails = Vec::with_capacity(counts.len());
    let mut acc = 0usize;
    for &c in counts {
        acc += c;
        tails.push(acc);
    }
    tails
}

/// 由已放置的后缀诱导 L 型（左到右）与 S 型（右到左）后缀
fn induce(text: &[u32], sa: &mut [u32], stype: &[bool], counts: &[usize]) {
    let n = text.len();
    let mut heads = bucket_heads(counts);
    for i in 0..n {
        let j = sa[i];
        if j != EMPTY && j > 0 {
            let k = j as usize - 1;
            if !stype[k] {
                let c = text[k] as usize;
                sa[heads[c]] = k as u32;
                heads[c] += 1;
            }
        }
    }
    let mut tails = bucket_tails(counts);
    for i in (0..n).rev() {
        let j = sa[i];
        if j != EMPTY && j > 0 {
            let k = j as usize - 1;
            if stype[k] {
                let c = text[k] as usize;
                tails[c] -= 1;
                sa[tails[c]] = k as u32;
            }
        }
    }
}

/// 两个 LMS 子串（含两端 LMS 字符）的字符与类型是否完全一致
fn lms_substrings_equal(text: &[u32], stype: &[bool], a: usize, b: usize) -> bool {
    let n = text.len();
    if a == n - 1 || b == n - 1 {
        return false;
    }
    let is_lms = |i: usize| i > 0 && stype[i] && !stype[i - 1];
    let mut i = 0usize;
    loop {
        let (pa, pb) = (a + i, b + i);
        let (a_lms, b_lms) = (is_lms(pa), is_lms(pb));
        if text[pa] != text[pb] || stype[pa] != stype[pb] || a_lms != b_lms {
            return false;
        }
        if i > 0 && a_lms {
            return true;
        }
        i += 1;
    }
}
