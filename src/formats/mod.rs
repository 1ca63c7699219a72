//! Concrete catalog formats

pub mod bmecat;
pub mod bmecat_document;
pub mod datanorm;

pub use bmecat::BmecatAdapter;
pub use datanorm::DatanormAdapter;
