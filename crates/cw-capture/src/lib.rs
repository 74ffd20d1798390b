//! Crash Warden capture paths.
//!
//! This crate implements the two in-process capture paths that populate
//! artifacts owned by the store:
//! - The unhandled-failure capture pipeline, invoked by the process-wide
//!   failure hook on whichever thread raised the failure
//! - The ANR correlator, which watches the shared OS hang-trace directory
//!   and extracts the segment belonging to this process and this event
//!
//! Both paths share the artifact-population routine and the emergency
//! header builder. Diagnostic text itself comes from collaborator traits;
//! a collaborator failure skips its section and never aborts the capture.

pub mod correlator;
pub mod diagnostics;
pub mod header;
pub mod pipeline;
pub mod report;
pub mod threads;

pub use correlator::{extract_segment, AnrCorrelator, CorrelatorState, TraceEventSender};
pub use diagnostics::{
    CaptureCallback, DiagnosticSources, NullDiagnostics, ProcessControl, ProcessStateProbe,
    SuppressionTarget, ThreadRoster, ThreadSnapshot,
};
pub use pipeline::{CapturePipeline, FailureHook, FailureInfo, TerminationPolicy, ThreadInfo};
