//! Collaborator interfaces consumed by the capture paths.
//!
//! Everything that produces human-readable diagnostic text, inspects
//! process state, or terminates the process lives behind these traits.
//! The capture paths treat every text-producing call as fallible and skip
//! the affected section on failure.

use std::path::Path;

use cw_common::Result;

/// One live thread and its formatted stack.
#[derive(Debug, Clone)]
pub struct ThreadSnapshot {
    pub id: u64,
    pub name: String,
    pub stacktrace: String,
}

/// Produces the diagnostic text sections appended to an artifact.
pub trait DiagnosticSources: Send + Sync {
    /// Log-buffer excerpt with per-buffer line budgets.
    fn logcat_excerpt(&self, main_lines: u32, system_lines: u32, events_lines: u32)
        -> Result<String>;

    /// Open-file-descriptor listing.
    fn open_descriptors(&self) -> Result<String>;

    /// Network state snapshot.
    fn network_snapshot(&self) -> Result<String>;

    /// Memory and process-limits snapshot.
    fn memory_snapshot(&self) -> Result<String>;

    /// Whether the application is currently in the foreground.
    fn is_application_foreground(&self) -> bool;
}

/// Enumerates live threads for the other-thread dump. Order over the
/// thread map is unspecified; callers must not depend on it.
pub trait ThreadRoster: Send + Sync {
    fn thread_snapshots(&self) -> Vec<ThreadSnapshot>;
}

/// OS process-state inspection used by the correlator's liveness check.
pub trait ProcessStateProbe: Send + Sync {
    fn is_process_hung(&self, pid: u32, timeout_ms: u64) -> bool;
}

/// Application teardown and process termination.
pub trait ProcessControl: Send + Sync {
    /// Close all application screens.
    fn teardown_ui(&self);

    /// Terminate the process with the given status. Does not return in
    /// production implementations.
    fn terminate(&self, status: i32);
}

/// Invoked at most once per detected event with the artifact path or the
/// in-memory emergency text, never both on the normal path.
pub trait CaptureCallback: Send + Sync {
    fn on_capture(&self, artifact: Option<&Path>, emergency: Option<&str>);
}

/// A sibling capture path that must stand down once another path fires.
pub trait SuppressionTarget: Send + Sync {
    fn suppress(&self);
}

/// Diagnostic sources that produce empty sections; useful in tests and as
/// a stand-in while collaborators are wired up.
#[derive(Debug, Default)]
pub struct NullDiagnostics;

impl DiagnosticSources for NullDiagnostics {
    fn logcat_excerpt(&self, _main: u32, _system: u32, _events: u32) -> Result<String> {
        Ok(String::new())
    }

    fn open_descriptors(&self) -> Result<String> {
        Ok(String::new())
    }

    fn network_snapshot(&self) -> Result<String> {
        Ok(String::new())
    }

    fn memory_snapshot(&self) -> Result<String> {
        Ok(String::new())
    }

    fn is_application_foreground(&self) -> bool {
        false
    }
}

impl ThreadRoster for NullDiagnostics {
    fn thread_snapshots(&self) -> Vec<ThreadSnapshot> {
        Vec::new()
    }
}
