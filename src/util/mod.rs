pub mod dna;
pub mod packed;

pub use packed::PackedSequence;
