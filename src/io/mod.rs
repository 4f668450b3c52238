pub mod fasta;
pub mod fastq;
pub mod reads;
pub mod sequence;

pub use reads::{load_reads, ReadRecord};
pub use sequence::{load_reference, Reference};
