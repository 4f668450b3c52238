//! 演示如何在 library 模式下使用 fmalign 建索引、检索与比对。
//!
//! 运行方式：
//! ```bash
//! cargo run --example simple_align
//! ```

use fmalign::align::{AlignParams, Aligner};
use fmalign::index::store;
use fmalign::index::{BuildConfig, FmIndex};
use fmalign::util::{dna, PackedSequence};

fn main() -> fmalign::Result<()> {
    // 1. 参考序列（伪随机，保证 20bp 片段基本唯一）
    let mut x: u32 = 2024;
    let reference: Vec<u8> = (0..2000)
        .map(|_| {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            b"ACGT"[((x >> 16) & 3) as usize]
        })
        .collect();
    let (seq, _) = PackedSequence::from_ascii(&reference, dna::DEFAULT_FALLBACK);
    println!("参考长度: {} bp", seq.len());

    // 2. 构建 FM 索引
    let fm = FmIndex::build(&seq, &BuildConfig::default())?;
    println!("FM 索引构建完成：哨兵行={}, C={:?}", fm.sentinel_pos(), fm.cumulative());

    // 3. 精确匹配
    let pattern = &reference[700..730];
    let (codes, _) = dna::encode_seq(pattern, dna::DEFAULT_FALLBACK);
    println!(
        "\n精确匹配 '{}': {} 处，位置 {:?}",
        String::from_utf8_lossy(pattern),
        fm.count(&codes),
        fm.locate_all(&codes)
    );

    // 4. 最大可映射后缀
    let mut read = reference[1200..1260].to_vec();
    read[20] = if read[20] == b'A' { b'C' } else { b'A' };
    let (read_codes, _) = dna::encode_seq(&read, dna::DEFAULT_FALLBACK);
    let mms = fm.maximum_mappable_suffix(&read_codes);
    println!("\n读段末尾 {} bp 可精确映射，区间 {:?}", mms.matched, mms.interval);

    // 5. 近似比对（一个错配）
    let aligner = Aligner::new(&fm, &seq, AlignParams::default())?;
    match aligner.align(&read_codes) {
        Some(a) => println!(
            "比对: pos={} strand={:?} CIGAR={} score={} NM={}",
            a.position, a.strand, a.cigar, a.score, a.nm
        ),
        None => println!("未比对上"),
    }

    // 6. 索引写入内存再读回
    let mut buf = Vec::new();
    store::write_index(&fm, &mut buf)?;
    let back = store::read_index(&mut buf.as_slice(), fmalign::index::rank::DEFAULT_BLOCKSIZE)?;
    println!("\n索引序列化 {} 字节，读回一致: {}", buf.len(), back == fm);

    println!("\n完成！");
    Ok(())
}
