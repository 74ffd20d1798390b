//! Configuration types for the store and capture components.
//!
//! Each struct follows the same shape: serde derives with per-field
//! defaults, a `Default` impl, and a `validate()` that names the offending
//! entry. Validation reports problems; it never panics. Entries that can be
//! skipped at runtime (an unparseable allowlist pattern) are also skipped
//! there with a warning, so a bad entry degrades rather than disables
//! capture.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::naming::ArtifactKind;

/// Per-kind retention ceilings plus the maintenance slack margin.
///
/// A ceiling of `0` means "keep none": every file of that kind is evicted
/// on the next pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionLimits {
    #[serde(default = "default_crash_max")]
    pub managed_crash_max: usize,

    #[serde(default = "default_crash_max")]
    pub native_crash_max: usize,

    #[serde(default = "default_crash_max")]
    pub anr_max: usize,

    #[serde(default = "default_trace_max")]
    pub trace_max: usize,

    /// How far a count may exceed its bound before initialization treats the
    /// backlog as pathological and cleans up synchronously.
    #[serde(default = "default_backlog_slack")]
    pub backlog_slack: usize,
}

fn default_crash_max() -> usize {
    10
}

fn default_trace_max() -> usize {
    1
}

fn default_backlog_slack() -> usize {
    10
}

impl Default for RetentionLimits {
    fn default() -> Self {
        RetentionLimits {
            managed_crash_max: default_crash_max(),
            native_crash_max: default_crash_max(),
            anr_max: default_crash_max(),
            trace_max: default_trace_max(),
            backlog_slack: default_backlog_slack(),
        }
    }
}

impl RetentionLimits {
    /// Ceiling for a real artifact kind.
    ///
    /// # Panics
    ///
    /// Panics if called with a placeholder kind; placeholders are governed
    /// by [`PlaceholderConfig`], not retention ceilings.
    pub fn ceiling_for(&self, kind: ArtifactKind) -> usize {
        match kind {
            ArtifactKind::ManagedCrash => self.managed_crash_max,
            ArtifactKind::NativeCrash => self.native_crash_max,
            ArtifactKind::Anr => self.anr_max,
            ArtifactKind::TraceSnapshot => self.trace_max,
            ArtifactKind::PlaceholderClean | ArtifactKind::PlaceholderDirty => {
                panic!("placeholder kinds have no retention ceiling")
            }
        }
    }
}

/// Placeholder pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceholderConfig {
    /// Target number of clean placeholder files. `0` disables the pool:
    /// recycling deletes outright.
    #[serde(default)]
    pub target: usize,

    /// Minimum zero-filled size of a clean placeholder, in KiB. A
    /// placeholder converted from a larger evicted log keeps its larger
    /// size.
    #[serde(default = "default_min_size_kb")]
    pub min_size_kb: u64,
}

fn default_min_size_kb() -> u64 {
    128
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        PlaceholderConfig {
            target: 0,
            min_size_kb: default_min_size_kb(),
        }
    }
}

impl PlaceholderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target > 0 && self.min_size_kb == 0 {
            return Err(Error::InvalidConfig(
                "placeholder.min_size_kb must be > 0 when the pool is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Minimum placeholder size in bytes.
    pub fn min_size_bytes(&self) -> u64 {
        self.min_size_kb * 1024
    }
}

/// ANR correlator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatorConfig {
    /// Minimum interval between two accepted detections, also used as the
    /// clock tolerance when matching a trace block's timestamp to the event.
    #[serde(default = "default_debounce_window_ms")]
    pub debounce_window_ms: u64,

    /// Confirm via the process-state probe that the process is actually in
    /// a not-responding state before parsing.
    #[serde(default)]
    pub check_process_hung: bool,

    /// Substring that marks a hang-trace file in the watched directory.
    #[serde(default = "default_trace_marker")]
    pub trace_marker: String,
}

fn default_debounce_window_ms() -> u64 {
    15_000
}

fn default_trace_marker() -> String {
    "trace".to_string()
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        CorrelatorConfig {
            debounce_window_ms: default_debounce_window_ms(),
            check_process_hung: false,
            trace_marker: default_trace_marker(),
        }
    }
}

impl CorrelatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.debounce_window_ms == 0 {
            return Err(Error::InvalidConfig(
                "correlator.debounce_window_ms must be > 0".to_string(),
            ));
        }
        if self.trace_marker.is_empty() {
            return Err(Error::InvalidConfig(
                "correlator.trace_marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Capture pipeline behavior: termination, diagnostic sections, thread dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturePolicy {
    /// Re-raise the failure into the prior hook chain after capture. When
    /// false, tear down all application screens and terminate the process.
    #[serde(default = "default_true")]
    pub rethrow: bool,

    #[serde(default = "default_logcat_main_lines")]
    pub logcat_main_lines: u32,

    #[serde(default = "default_logcat_side_lines")]
    pub logcat_system_lines: u32,

    #[serde(default = "default_logcat_side_lines")]
    pub logcat_events_lines: u32,

    /// Append the open-file-descriptor listing.
    #[serde(default = "default_true")]
    pub dump_open_descriptors: bool,

    /// Append the network snapshot.
    #[serde(default = "default_true")]
    pub dump_network: bool,

    /// Append stacks of the other live threads.
    #[serde(default = "default_true")]
    pub dump_threads: bool,

    /// Upper bound on dumped threads; `0` means unlimited.
    #[serde(default)]
    pub thread_dump_max: usize,

    /// Thread-name patterns to include in the dump. Empty means all
    /// threads. Entries are regular expressions; an unparseable entry is
    /// logged and skipped.
    #[serde(default)]
    pub thread_allowlist: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_logcat_main_lines() -> u32 {
    200
}

fn default_logcat_side_lines() -> u32 {
    50
}

impl Default for CapturePolicy {
    fn default() -> Self {
        CapturePolicy {
            rethrow: true,
            logcat_main_lines: default_logcat_main_lines(),
            logcat_system_lines: default_logcat_side_lines(),
            logcat_events_lines: default_logcat_side_lines(),
            dump_open_descriptors: true,
            dump_network: true,
            dump_threads: true,
            thread_dump_max: 0,
            thread_allowlist: Vec::new(),
        }
    }
}

impl CapturePolicy {
    /// Report unusable allowlist entries without compiling the survivors.
    pub fn validate(&self) -> Result<()> {
        for pattern in &self.thread_allowlist {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(Error::InvalidConfig(format!(
                    "thread_allowlist entry '{}' is not a valid regex: {}",
                    pattern, e
                )));
            }
        }
        Ok(())
    }

    /// Compile the allowlist, skipping unparseable entries with a warning.
    ///
    /// Returns `None` when no allowlist is configured (all threads match).
    pub fn compiled_allowlist(&self) -> Option<Vec<regex::Regex>> {
        if self.thread_allowlist.is_empty() {
            return None;
        }
        let compiled: Vec<regex::Regex> = self
            .thread_allowlist
            .iter()
            .filter_map(|pattern| match regex::Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("skipping unparseable thread allowlist entry '{}': {}", pattern, e);
                    None
                }
            })
            .collect();
        Some(compiled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_limits_defaults() {
        let limits = RetentionLimits::default();
        assert_eq!(limits.managed_crash_max, 10);
        assert_eq!(limits.trace_max, 1);
        assert_eq!(limits.backlog_slack, 10);
    }

    #[test]
    fn test_ceiling_for_real_kinds() {
        let limits = RetentionLimits {
            managed_crash_max: 3,
            native_crash_max: 4,
            anr_max: 5,
            trace_max: 6,
            backlog_slack: 10,
        };
        assert_eq!(limits.ceiling_for(ArtifactKind::ManagedCrash), 3);
        assert_eq!(limits.ceiling_for(ArtifactKind::NativeCrash), 4);
        assert_eq!(limits.ceiling_for(ArtifactKind::Anr), 5);
        assert_eq!(limits.ceiling_for(ArtifactKind::TraceSnapshot), 6);
    }

    #[test]
    fn test_placeholder_validation() {
        let ok = PlaceholderConfig {
            target: 4,
            min_size_kb: 128,
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.min_size_bytes(), 128 * 1024);

        let bad = PlaceholderConfig {
            target: 4,
            min_size_kb: 0,
        };
        assert!(bad.validate().is_err());

        // A disabled pool never reserves space, so zero size is fine.
        let disabled = PlaceholderConfig {
            target: 0,
            min_size_kb: 0,
        };
        assert!(disabled.validate().is_ok());
    }

    #[test]
    fn test_correlator_validation() {
        assert!(CorrelatorConfig::default().validate().is_ok());

        let bad = CorrelatorConfig {
            debounce_window_ms: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_capture_policy_allowlist_validation() {
        let mut policy = CapturePolicy::default();
        assert!(policy.validate().is_ok());
        assert!(policy.compiled_allowlist().is_none());

        policy.thread_allowlist = vec!["^worker-.*$".to_string(), "([".to_string()];
        let err = policy.validate().unwrap_err();
        assert!(format!("{}", err).contains("(["));

        // Runtime compilation skips the bad entry instead of failing.
        let compiled = policy.compiled_allowlist().unwrap();
        assert_eq!(compiled.len(), 1);
        assert!(compiled[0].is_match("worker-1"));
    }

    #[test]
    fn test_config_serde_round_trip() {
        let limits = RetentionLimits::default();
        let json = serde_json::to_string(&limits).unwrap();
        let parsed: RetentionLimits = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.anr_max, limits.anr_max);

        // Missing fields take defaults.
        let parsed: CapturePolicy = serde_json::from_str("{}").unwrap();
        assert!(parsed.rethrow);
        assert_eq!(parsed.logcat_main_lines, 200);
    }
}
