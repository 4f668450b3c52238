use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditOp {
    /// 匹配或错配（CIGAR `M`）
    Match,
    /// 读段中多出的碱基（`I`）
    Insertion,
    /// 参考中多出的碱基（`D`）
    Deletion,
}

impl EditOp {
    pub fn symbol(self) -> char {
        match self {
            EditOp::Match => 'M',
            EditOp::Insertion => 'I',
            EditOp::Deletion => 'D',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            'M' | '=' | 'X' => Some(EditOp::Match),
            'I' => Some(EditOp::Insertion),
            'D' => Some(EditOp::Deletion),
            _ => None,
        }
    }

    #[inline]
    pub fn consumes_read(self) -> bool {
        !matches!(self, EditOp::Deletion)
    }

    #[inline]
    pub fn consumes_ref(self) -> bool {
        !matches!(self, EditOp::Insertion)
    }
}

/// 游程编码的编辑脚本，同时当作栈使用：`push` 压在末尾，
/// 与栈顶相同的操作直接合并计数。
///
/// 比对过程从读段尾部向头部推进，片段按尾到头的顺序入栈，
/// 完成后 [`reverse`](Self::reverse) 一次得到正常顺序。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    runs: Vec<(EditOp, usize)>,
}

impl EditScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: EditOp, count: usize) {
        if count == 0 {
            return;
        }
        match self.runs.last_mut() {
            Some((last, n)) if *last == op => *n += count,
            _ => self.runs.push((op, count)),
        }
    }

    pub fn pop(&mut self) -> Option<(EditOp, usize)> {
        self.runs.pop()
    }

    pub fn peek(&self) -> Option<(EditOp, usize)> {
        self.runs.last().copied()
    }

    pub fn runs(&self) -> &[(EditOp, usize)] {
        &self.runs
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn reverse(&mut self) {
        self.runs.reverse();
    }

    /// 逐个弹出本栈压入 `dst`，结果在 `dst` 中顺序颠倒；本栈被清空
    pub fn flip_onto(&mut self, dst: &mut EditScript) {
        while let Some((op, n)) = self.pop() {
            dst.push(op, n);
        }
    }

    /// 按原顺序追加，接缝处同类操作合并
    pub fn append(&mut self, other: &EditScript) {
        for &(op, n) in &other.runs {
            self.push(op, n);
        }
    }

    pub fn read_len(&self) -> usize {
        self.runs.iter().filter(|(op, _)| op.consumes_read()).map(|&(_, n)| n).sum()
    }

    pub fn ref_len(&self) -> usize {
        self.runs.iter().filter(|(op, _)| op.consumes_ref()).map(|&(_, n)| n).sum()
    }
}

impl fmt::Display for EditScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.runs.is_empty() {
            return f.write_str("*");
        }
        for &(op, n) in &self.runs {
            write!(f, "{}{}", n, op.symbol())?;
        }
        Ok(())
    }
}

impl FromStr for EditScript {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut script = EditScript::new();
        if s == "*" {
            return Ok(script);
        }
        let mut num = 0usize;
        let mut have_num = false;
        for ch in s.chars() {
            if let Some(d) = ch.to_digit(10) {
                num = num
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(d as usize))
                    .ok_or_else(|| Error::InvalidInput(format!("CIGAR run too long in '{}'", s)))?;
                have_num = true;
            } else {
                let op = EditOp::from_symbol(ch)
                    .ok_or_else(|| Error::InvalidInput(format!("unsupported CIGAR op '{}' in '{}'", ch, s)))?;
                if !have_num {
                    return Err(Error::InvalidInput(format!("CIGAR op '{}' without length in '{}'", ch, s)));
                }
                script.push(op, num);
                num = 0;
                have_num = false;
            }
        }
        if have_num {
            return Err(Error::InvalidInput(format!("trailing number in CIGAR '{}'", s)));
        }
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_coalesces_adjacent_ops() {
        let mut s = EditScript::new();
        s.push(EditOp::Match, 10);
        s.push(EditOp::Match, 5);
        s.push(EditOp::Deletion, 0);
        s.push(EditOp::Insertion, 2);
        s.push(EditOp::Match, 3);
        assert_eq!(s.runs(), &[(EditOp::Match, 15), (EditOp::Insertion, 2), (EditOp::Match, 3)]);
        assert_eq!(s.to_string(), "15M2I3M");
        assert_eq!(s.read_len(), 20);
        assert_eq!(s.ref_len(), 18);
    }

    #[test]
    fn tail_to_head_then_reverse() {
        let mut s = EditScript::new();
        // 尾部片段先入栈
        s.push(EditOp::Match, 24);
        s.push(EditOp::Deletion, 2);
        s.push(EditOp::Match, 24);
        s.reverse();
        assert_eq!(s.to_string(), "24M2D24M");
        assert_eq!(s.peek(), Some((EditOp::Match, 24)));
    }

    #[test]
    fn flip_reverses_into_destination() {
        let mut a: EditScript = "3M1I4M".parse().unwrap();
        let mut b = EditScript::new();
        b.push(EditOp::Match, 2);
        a.flip_onto(&mut b);
        assert!(a.is_empty());
        // 2M + 4M 合并
        assert_eq!(b.to_string(), "6M1I3M");
    }

    #[test]
    fn append_merges_at_seam() {
        let mut a: EditScript = "5M1D".parse().unwrap();
        let b: EditScript = "2D7M".parse().unwrap();
        a.append(&b);
        assert_eq!(a.to_string(), "5M3D7M");
    }

    #[test]
    fn parse_and_display() {
        let s: EditScript = "50M".parse().unwrap();
        assert_eq!(s.runs(), &[(EditOp::Match, 50)]);
        assert_eq!("*".parse::<EditScript>().unwrap(), EditScript::new());
        assert_eq!(EditScript::new().to_string(), "*");
        assert_eq!("3=2X".parse::<EditScript>().unwrap().to_string(), "5M");
        assert!("10S5M".parse::<EditScript>().is_err());
        assert!("M".parse::<EditScript>().is_err());
        assert!("5M3".parse::<EditScript>().is_err());
    }
}
