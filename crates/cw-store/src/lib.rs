//! Crash Warden artifact storage.
//!
//! This crate owns the artifact directory. It provides:
//! - Per-kind retention ceilings with deterministic oldest-first eviction
//! - The zero-filled placeholder pool that pre-reserves disk space for
//!   forthcoming crash reports
//! - Artifact acquisition (claim a placeholder or create fresh) and
//!   recycling (convert a discarded artifact back into pool space)
//! - Maintenance scheduling: skip, run now, or run on a background worker
//! - The append-positioning writer used to populate artifacts at capture
//!   time
//!
//! No operation in this crate propagates an error to the hosting
//! application; filesystem failures degrade to "delete and move on" and are
//! logged.

pub mod store;
pub mod writer;

pub use store::{
    default_artifact_dir, ArtifactStore, KindCounts, MaintenanceUrgency, StoreConfig, StoreStatus,
};
pub use writer::ArtifactWriter;
