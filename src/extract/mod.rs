//! Verification-code extraction — normalization plus pattern matching.

pub mod extractor;
pub mod normalize;
pub mod patterns;

pub use extractor::{Extraction, extract, scan};
pub use normalize::normalize;
