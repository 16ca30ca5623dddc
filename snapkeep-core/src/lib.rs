//! snapkeep core library: retention engine for dated snapshot trees.
//!
//! - [`template`]: time template formatting and per-tier path patterns
//! - [`walker`]: discovery of dated directories
//! - [`linkcopy`]: hardlink-based directory copies
//! - [`registry`]: per-name locked registry of backup sets
//! - [`engine`]: initialize / rotate / time since last run

pub mod engine;
pub mod error;
pub mod linkcopy;
pub mod registry;
pub mod settings;
pub mod template;
pub mod types;
pub mod walker;

pub use engine::{format_elapsed, RotationReport, Rotator};
pub use error::RotateError;
pub use settings::{LinkCopyKind, Settings};
pub use template::TimeTemplate;
pub use types::{BackupSet, BackupSetConfig, Tier, TierDurations};
