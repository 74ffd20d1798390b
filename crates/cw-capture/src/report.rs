//! Shared artifact-population routine.
//!
//! Both capture paths append their diagnostic sections through this
//! module. Every step is independently guarded: a failed collaborator or a
//! failed write logs a warning and population continues with the next
//! section, so one missing diagnostic never costs the rest of the report.

use tracing::warn;

use cw_common::{CapturePolicy, Result};
use cw_store::ArtifactWriter;

use crate::diagnostics::DiagnosticSources;

/// Append the emergency text and the common diagnostic sections in fixed
/// order: emergency header, log-buffer excerpt, open descriptors, network
/// snapshot, memory snapshot.
///
/// Returns the emergency text back only if its append failed; once it is
/// on disk the in-memory copy is dropped so the callback never delivers
/// the payload twice.
pub fn populate_common(
    writer: &mut ArtifactWriter,
    emergency: Option<String>,
    sources: &dyn DiagnosticSources,
    policy: &CapturePolicy,
) -> Option<String> {
    let mut leftover = emergency;
    if let Some(text) = &leftover {
        match writer.append(text) {
            Ok(()) => leftover = None,
            Err(e) => warn!("emergency header append failed: {}", e),
        }
    }

    if policy.logcat_main_lines > 0 || policy.logcat_system_lines > 0 || policy.logcat_events_lines > 0
    {
        append_section(
            writer,
            "logcat",
            sources.logcat_excerpt(
                policy.logcat_main_lines,
                policy.logcat_system_lines,
                policy.logcat_events_lines,
            ),
        );
    }

    if policy.dump_open_descriptors {
        append_section(writer, "open descriptors", sources.open_descriptors());
    }

    if policy.dump_network {
        append_section(writer, "network", sources.network_snapshot());
    }

    append_section(writer, "memory", sources.memory_snapshot());

    leftover
}

/// Append one delegated section, skipping it on either delegate or write
/// failure.
pub fn append_section(writer: &mut ArtifactWriter, label: &str, section: Result<String>) {
    match section {
        Ok(text) => {
            if let Err(e) = writer.append(&text) {
                warn!("section '{}' write failed: {}", label, e);
            }
        }
        Err(e) => {
            warn!("section '{}' skipped: {}", label, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NullDiagnostics;
    use cw_common::Error;
    use std::fs;
    use tempfile::tempdir;

    struct FlakySources;

    impl DiagnosticSources for FlakySources {
        fn logcat_excerpt(&self, _m: u32, _s: u32, _e: u32) -> Result<String> {
            Ok("logcat:\nline one\n\n".to_string())
        }

        fn open_descriptors(&self) -> Result<String> {
            Err(Error::Delegate {
                section: "open descriptors".to_string(),
                message: "probe unavailable".to_string(),
            })
        }

        fn network_snapshot(&self) -> Result<String> {
            Ok("network:\nup\n\n".to_string())
        }

        fn memory_snapshot(&self) -> Result<String> {
            Ok("memory:\n42 MB\n\n".to_string())
        }

        fn is_application_foreground(&self) -> bool {
            true
        }
    }

    fn open_writer(dir: &std::path::Path) -> ArtifactWriter {
        let path = dir.join("artifact.log");
        fs::write(&path, b"").unwrap();
        ArtifactWriter::open(path).unwrap()
    }

    #[test]
    fn test_emergency_dropped_after_successful_append() {
        let dir = tempdir().unwrap();
        let mut writer = open_writer(dir.path());

        let leftover = populate_common(
            &mut writer,
            Some("header text\n".to_string()),
            &NullDiagnostics,
            &CapturePolicy::default(),
        );

        assert!(leftover.is_none());
        drop(writer);
        let content = fs::read_to_string(dir.path().join("artifact.log")).unwrap();
        assert!(content.starts_with("header text\n"));
    }

    #[test]
    fn test_failed_section_does_not_block_later_sections() {
        let dir = tempdir().unwrap();
        let mut writer = open_writer(dir.path());

        let leftover = populate_common(
            &mut writer,
            Some("header\n".to_string()),
            &FlakySources,
            &CapturePolicy::default(),
        );

        assert!(leftover.is_none());
        drop(writer);
        let content = fs::read_to_string(dir.path().join("artifact.log")).unwrap();
        assert!(content.contains("logcat:"));
        assert!(!content.contains("descriptors"));
        // Sections after the failed delegate still land.
        assert!(content.contains("network:"));
        assert!(content.contains("memory:"));
    }

    #[test]
    fn test_logcat_skipped_when_all_budgets_zero() {
        let dir = tempdir().unwrap();
        let mut writer = open_writer(dir.path());

        let policy = CapturePolicy {
            logcat_main_lines: 0,
            logcat_system_lines: 0,
            logcat_events_lines: 0,
            ..Default::default()
        };
        populate_common(&mut writer, None, &FlakySources, &policy);

        drop(writer);
        let content = fs::read_to_string(dir.path().join("artifact.log")).unwrap();
        assert!(!content.contains("logcat:"));
        assert!(content.contains("memory:"));
    }
}
