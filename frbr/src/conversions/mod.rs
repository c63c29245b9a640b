//! Codecs for the pipe-delimited composite strings used throughout the
//! pipeline, plus date/year normalization.

pub mod agent;
pub mod date;
pub mod identifier;
pub mod subject;
