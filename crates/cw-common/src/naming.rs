//! Artifact kinds, file-name grammar, and the sequence source.
//!
//! Every diagnostic file lives in a single flat directory and carries its
//! creation order in its own name: a 20-digit zero-padded sequence derived
//! from a microsecond-scaled timestamp plus a small rolling uniqueness
//! counter. Because the field is fixed-width, sorting names ascending sorts
//! artifacts by creation order without touching file metadata.
//!
//! Name grammar:
//! - Real artifact: `<log_prefix>_<sequence>_<app_version>__<process_name><kind_suffix>`
//! - Placeholder: `<placeholder_prefix>_<sequence><clean|dirty suffix>`
//!
//! Everything here is pure; no function touches the filesystem.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Width of the zero-padded sequence field in file names.
pub const SEQUENCE_WIDTH: usize = 20;

/// Rolling bound for the uniqueness counter. Stays below the microsecond
/// scale factor so the counter never carries into the timestamp digits.
const UNIQUE_BOUND: u32 = 1000;

/// The kind of a single diagnostic file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Crash captured by the in-process failure hook.
    ManagedCrash,
    /// Crash captured by the native (out-of-runtime) path.
    NativeCrash,
    /// Application-not-responding capture.
    Anr,
    /// Point-in-time trace snapshot.
    TraceSnapshot,
    /// Zero-filled placeholder, ready to become a real artifact.
    PlaceholderClean,
    /// Unfilled placeholder, transient within a maintenance pass.
    PlaceholderDirty,
}

impl ArtifactKind {
    /// The four kinds subject to retention ceilings.
    pub const REAL_KINDS: [ArtifactKind; 4] = [
        ArtifactKind::NativeCrash,
        ArtifactKind::ManagedCrash,
        ArtifactKind::Anr,
        ArtifactKind::TraceSnapshot,
    ];

    /// Whether this kind is a real artifact (has a retention ceiling).
    pub fn is_real(&self) -> bool {
        !matches!(
            self,
            ArtifactKind::PlaceholderClean | ArtifactKind::PlaceholderDirty
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::ManagedCrash => "managed_crash",
            ArtifactKind::NativeCrash => "native_crash",
            ArtifactKind::Anr => "anr",
            ArtifactKind::TraceSnapshot => "trace_snapshot",
            ArtifactKind::PlaceholderClean => "placeholder_clean",
            ArtifactKind::PlaceholderDirty => "placeholder_dirty",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// File-name prefixes and suffixes for the artifact directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingScheme {
    /// Prefix for real artifact files.
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,

    /// Prefix for placeholder files.
    #[serde(default = "default_placeholder_prefix")]
    pub placeholder_prefix: String,
}

fn default_log_prefix() -> String {
    "tombstone".to_string()
}

fn default_placeholder_prefix() -> String {
    "placeholder".to_string()
}

impl Default for NamingScheme {
    fn default() -> Self {
        NamingScheme {
            log_prefix: default_log_prefix(),
            placeholder_prefix: default_placeholder_prefix(),
        }
    }
}

impl NamingScheme {
    /// Name suffix identifying an artifact kind.
    pub fn suffix_for(&self, kind: ArtifactKind) -> &'static str {
        match kind {
            ArtifactKind::ManagedCrash => ".managed.cwlog",
            ArtifactKind::NativeCrash => ".native.cwlog",
            ArtifactKind::Anr => ".anr.cwlog",
            ArtifactKind::TraceSnapshot => ".trace.cwlog",
            ArtifactKind::PlaceholderClean => ".clean.cwlog",
            ArtifactKind::PlaceholderDirty => ".dirty.cwlog",
        }
    }

    /// Build a real artifact file name.
    ///
    /// `app_version` and `process_name` are embedded for later matching and
    /// debugging only; retention logic never reads them.
    pub fn artifact_name(
        &self,
        kind: ArtifactKind,
        sequence: u64,
        app_version: &str,
        process_name: &str,
    ) -> String {
        format!(
            "{}_{:0width$}_{}__{}{}",
            self.log_prefix,
            sequence,
            app_version,
            process_name,
            self.suffix_for(kind),
            width = SEQUENCE_WIDTH,
        )
    }

    /// Build a placeholder file name in the given pool state.
    pub fn placeholder_name(&self, sequence: u64, kind: ArtifactKind) -> String {
        debug_assert!(!kind.is_real());
        format!(
            "{}_{:0width$}{}",
            self.placeholder_prefix,
            sequence,
            self.suffix_for(kind),
            width = SEQUENCE_WIDTH,
        )
    }

    /// Whether `name` belongs to the given kind under this scheme.
    pub fn matches(&self, name: &str, kind: ArtifactKind) -> bool {
        let prefix = if kind.is_real() {
            &self.log_prefix
        } else {
            &self.placeholder_prefix
        };
        name.len() > prefix.len() + 1
            && name.starts_with(prefix.as_str())
            && name.as_bytes()[prefix.len()] == b'_'
            && name.ends_with(self.suffix_for(kind))
    }

    /// Map a file name back to its artifact kind, if it is one of ours.
    pub fn kind_of(&self, name: &str) -> Option<ArtifactKind> {
        [
            ArtifactKind::ManagedCrash,
            ArtifactKind::NativeCrash,
            ArtifactKind::Anr,
            ArtifactKind::TraceSnapshot,
            ArtifactKind::PlaceholderClean,
            ArtifactKind::PlaceholderDirty,
        ]
        .into_iter()
        .find(|kind| self.matches(name, *kind))
    }

    /// Extract the sequence field from one of our file names.
    pub fn sequence_of(&self, name: &str) -> Option<u64> {
        let kind = self.kind_of(name)?;
        let prefix = if kind.is_real() {
            &self.log_prefix
        } else {
            &self.placeholder_prefix
        };
        let field = name.get(prefix.len() + 1..prefix.len() + 1 + SEQUENCE_WIDTH)?;
        if !field.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        field.parse().ok()
    }
}

/// Produces name-embedded sequence values.
///
/// A sequence is the current wall-clock time in milliseconds scaled to
/// microseconds plus a rolling counter, so two artifacts created within the
/// same millisecond still get distinct, ordered names.
#[derive(Debug, Default)]
pub struct SequenceSource {
    unique: AtomicU32,
}

impl SequenceSource {
    pub fn new() -> Self {
        SequenceSource {
            unique: AtomicU32::new(0),
        }
    }

    /// Next sequence value for the current wall-clock time.
    pub fn next(&self) -> u64 {
        self.next_at(chrono::Utc::now().timestamp_millis().max(0) as u64)
    }

    /// Next sequence value for an explicit millisecond timestamp.
    pub fn next_at(&self, unix_millis: u64) -> u64 {
        unix_millis * 1000 + self.next_unique()
    }

    fn next_unique(&self) -> u64 {
        (self.unique.fetch_add(1, Ordering::Relaxed) % UNIQUE_BOUND) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_name_width_and_fields() {
        let scheme = NamingScheme::default();
        let name = scheme.artifact_name(ArtifactKind::ManagedCrash, 42, "1.2.3", "com.example.app");
        assert_eq!(
            name,
            "tombstone_00000000000000000042_1.2.3__com.example.app.managed.cwlog"
        );
    }

    #[test]
    fn test_placeholder_name() {
        let scheme = NamingScheme::default();
        let name = scheme.placeholder_name(7, ArtifactKind::PlaceholderClean);
        assert_eq!(name, "placeholder_00000000000000000007.clean.cwlog");
    }

    #[test]
    fn test_kind_round_trip() {
        let scheme = NamingScheme::default();
        for kind in ArtifactKind::REAL_KINDS {
            let name = scheme.artifact_name(kind, 1, "2.0", "proc");
            assert_eq!(scheme.kind_of(&name), Some(kind));
        }
        for kind in [
            ArtifactKind::PlaceholderClean,
            ArtifactKind::PlaceholderDirty,
        ] {
            let name = scheme.placeholder_name(1, kind);
            assert_eq!(scheme.kind_of(&name), Some(kind));
        }
    }

    #[test]
    fn test_kind_of_rejects_foreign_names() {
        let scheme = NamingScheme::default();
        assert_eq!(scheme.kind_of("trace_01.txt"), None);
        assert_eq!(scheme.kind_of("tombstone.managed.cwlog"), None);
        assert_eq!(scheme.kind_of(""), None);
    }

    #[test]
    fn test_sequence_of() {
        let scheme = NamingScheme::default();
        let name = scheme.artifact_name(ArtifactKind::Anr, 1234567, "1.0", "p");
        assert_eq!(scheme.sequence_of(&name), Some(1234567));

        let name = scheme.placeholder_name(99, ArtifactKind::PlaceholderDirty);
        assert_eq!(scheme.sequence_of(&name), Some(99));
    }

    #[test]
    fn test_names_sort_by_sequence() {
        let scheme = NamingScheme::default();
        let mut names: Vec<String> = [5u64, 1, 900, 33]
            .iter()
            .map(|s| scheme.artifact_name(ArtifactKind::Anr, *s, "1.0", "p"))
            .collect();
        names.sort();
        let sequences: Vec<u64> = names
            .iter()
            .map(|n| scheme.sequence_of(n).unwrap())
            .collect();
        assert_eq!(sequences, vec![1, 5, 33, 900]);
    }

    #[test]
    fn test_sequence_source_monotonic_within_millisecond() {
        let source = SequenceSource::new();
        let a = source.next_at(1_000);
        let b = source.next_at(1_000);
        let c = source.next_at(1_000);
        assert!(a < b && b < c);
        // Counter never carries into the millisecond digits.
        assert_eq!(a / 1000, 1_000);
        assert_eq!(c / 1000, 1_000);
    }

    #[test]
    fn test_sequence_source_rolls_over() {
        let source = SequenceSource::new();
        let first = source.next_at(0);
        for _ in 0..999 {
            source.next_at(0);
        }
        let wrapped = source.next_at(0);
        assert_eq!(first, wrapped);
    }

    #[test]
    fn test_real_kind_classification() {
        assert!(ArtifactKind::ManagedCrash.is_real());
        assert!(ArtifactKind::TraceSnapshot.is_real());
        assert!(!ArtifactKind::PlaceholderClean.is_real());
        assert!(!ArtifactKind::PlaceholderDirty.is_real());
    }
}
