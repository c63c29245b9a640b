//! Core data types shared across the clustering pipeline.

mod record;
mod work;

pub use record::*;
pub use work::*;
