//! Crash Warden shared types and helpers.
//!
//! This crate provides the foundational pieces shared by the store and
//! capture crates:
//! - Artifact kinds, file-name grammar, and the monotonic sequence source
//! - Common error types with a stable category taxonomy
//! - Configuration structs with defaults and validation

pub mod config;
pub mod error;
pub mod identity;
pub mod naming;

pub use config::{CapturePolicy, CorrelatorConfig, PlaceholderConfig, RetentionLimits};
pub use error::{Category, Error, Result};
pub use identity::AppIdentity;
pub use naming::{ArtifactKind, NamingScheme, SequenceSource};

/// Zero-fill block size used for placeholder files, in bytes.
pub const ZERO_BLOCK_BYTES: usize = 1024;

/// Fixed process exit status used by the terminate policy.
pub const TERMINATE_EXIT_STATUS: i32 = 10;
