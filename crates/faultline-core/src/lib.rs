//! Core types, configuration, and error handling for faultline.
//!
//! This crate provides the shared foundation used by the other faultline crates:
//! - [`FaultlineError`]: unified error type using `thiserror`
//! - [`FaultlineConfig`]: configuration loaded from `.faultline.toml`
//! - Shared types: [`Release`], [`ReleaseTimeline`], [`BugReport`],
//!   [`AnalyzedMethod`], [`LineSpan`], [`OutputFormat`]

mod config;
mod error;
mod tickets;
mod types;

pub use config::{DatasetConfig, FaultlineConfig, ProjectConfig, TableFormat};
pub use error::FaultlineError;
pub use tickets::{load_tickets, parse_tracker_datetime, BugReport};
pub use types::{feature, AnalyzedMethod, LineSpan, OutputFormat, Release, ReleaseTimeline};

/// A convenience `Result` type for faultline operations.
pub type Result<T> = std::result::Result<T, FaultlineError>;
