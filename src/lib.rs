//! Find visually similar images with perceptual hashing and remove the
//! redundant copies, keeping one representative per group.

pub mod config;
pub mod core;
pub mod history;
pub mod review;

pub use config::{Config, ConfigError, Settings};
pub use crate::core::pipeline::{Culler, RunSummary, ScanReport};
