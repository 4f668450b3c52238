pub mod bwt;
pub mod fm;
pub mod rank;
pub mod sa;
pub mod sais;
pub mod store;

pub use fm::{BuildConfig, FmIndex, Mms, SaInterval};
