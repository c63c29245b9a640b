//! Bibliographic entity resolution and FRBR clustering.
//!
//! The crate turns source records describing the same publication into a
//! canonical Work/Edition/Item aggregate: [`blocking`] finds the candidate
//! pool by transitive identifier matching, [`cluster`] partitions it into
//! editions, [`build`] assembles the aggregate, and [`pipeline`] orchestrates
//! a full run against a [`store`], [`lock`] service, and search [`index`].

pub mod blocking;
pub mod build;
pub mod cluster;
pub mod config;
pub mod conversions;
pub mod error;
pub mod index;
pub mod languages;
pub mod lock;
mod macros;
pub mod pipeline;
pub mod store;
pub mod types;
