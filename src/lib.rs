//! Query and command layer over a local Anki collection: search, add,
//! archive and review statistics.

pub mod add;
pub mod archive;
pub mod cli;
pub mod collection;
pub mod config;
pub mod error;
pub mod fields;
pub mod models;
pub mod output;
pub mod query;
pub mod search;
pub mod stats;
pub mod utils;

#[cfg(test)]
mod testutil;

pub use collection::Collection;
pub use config::CollectionConfig;
pub use error::{CollectionError, Result};
