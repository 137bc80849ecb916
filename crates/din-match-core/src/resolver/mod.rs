//! Registry resolution for target records.
//!
//! Pipeline: Cleaning → Normalization → Brand/Generic matching → Strength tie-break

mod matcher;
mod normalizer;

pub use matcher::*;
pub use normalizer::*;
