//! Core library for scout, a supply curve outlook tool.
//!
//! scout loads renewable energy supply curve tables, filters them with user predicates and
//! on-screen selections, matches sites against hydrogen demand centres, differences and masks
//! pairs of scenarios, and recalculates levelised costs under overridden assumptions. The
//! [`compose`] module ties these pieces together into the tables an exploration UI displays;
//! a small CLI covers the batch-shaped operations.
#![warn(missing_docs)]
pub mod cli;
pub mod compose;
pub mod config;
pub mod demand;
pub mod diff;
pub mod error;
pub mod filter;
pub mod finance;
pub mod input;
pub mod log;
pub mod request;
pub mod scenario;
pub mod settings;
pub mod spatial;
pub mod table;

#[cfg(test)]
mod fixture;

use std::path::PathBuf;

/// Get the path to the scout configuration directory
pub fn get_scout_config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_default().join("scout")
}
