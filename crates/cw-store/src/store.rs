//! Retention and placeholder store.
//!
//! The store is the sole owner of the artifact directory. Real artifacts
//! are bounded per kind by retention ceilings; evicted files are converted
//! into zero-filled placeholder files that guarantee disk space for the
//! next capture even when the device is near `ENOSPC`. Committing real
//! zeroed pages ahead of time means the rename-into-place at capture time
//! needs no new block allocation.
//!
//! Correctness under concurrent capture relies on atomic rename: a rename
//! either succeeds and the file changes identity exactly once, or fails and
//! no partial state is observed. Maintenance is not mutually excluded
//! against acquisition or recycling.
//!
//! # Maintenance urgency
//!
//! Initialization scans the directory once and picks one of:
//! - `None` — every kind within its ceiling, clean pool exactly at target,
//!   no dirty files.
//! - `Immediate` — some count exceeds its bound by more than the slack
//!   margin (a crash loop left a backlog); cleanup runs synchronously
//!   before initialization returns.
//! - `Deferred` — ordinary housekeeping; [`ArtifactStore::maintain`] runs
//!   it on a background worker, immediately or after the configured delay.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cw_common::naming::{ArtifactKind, NamingScheme, SequenceSource};
use cw_common::{PlaceholderConfig, RetentionLimits, ZERO_BLOCK_BYTES};

/// Name of the background maintenance thread.
const MAINTENANCE_THREAD: &str = "cw-store-maint";

/// Configuration for the artifact store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding every artifact. Single flat layout, no
    /// subdirectories.
    pub artifact_dir: PathBuf,

    #[serde(default)]
    pub naming: NamingScheme,

    #[serde(default)]
    pub retention: RetentionLimits,

    #[serde(default)]
    pub placeholder: PlaceholderConfig,

    /// Delay before a non-urgent deferred maintenance pass, in
    /// milliseconds. Zero runs the pass as soon as `maintain` is called.
    #[serde(default)]
    pub maintenance_delay_ms: u64,
}

impl StoreConfig {
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        StoreConfig {
            artifact_dir: artifact_dir.into(),
            naming: NamingScheme::default(),
            retention: RetentionLimits::default(),
            placeholder: PlaceholderConfig::default(),
            maintenance_delay_ms: 0,
        }
    }
}

/// Get the default artifact directory under the platform data dir.
pub fn default_artifact_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crash_warden")
        .join("artifacts")
}

/// Maintenance decision made by the initialization scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceUrgency {
    /// Directory already matches the configured shape; nothing pending.
    None,
    /// Housekeeping needed; runs on the background worker via `maintain`.
    Deferred,
    /// Pathological backlog; cleanup already ran during initialization.
    Immediate,
}

/// Per-kind file counts from a directory scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounts {
    pub managed_crash: usize,
    pub native_crash: usize,
    pub anr: usize,
    pub trace_snapshot: usize,
    pub placeholder_clean: usize,
    pub placeholder_dirty: usize,
}

impl KindCounts {
    fn count_for(&self, kind: ArtifactKind) -> usize {
        match kind {
            ArtifactKind::ManagedCrash => self.managed_crash,
            ArtifactKind::NativeCrash => self.native_crash,
            ArtifactKind::Anr => self.anr,
            ArtifactKind::TraceSnapshot => self.trace_snapshot,
            ArtifactKind::PlaceholderClean => self.placeholder_clean,
            ArtifactKind::PlaceholderDirty => self.placeholder_dirty,
        }
    }
}

/// Snapshot of the store for tooling and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatus {
    pub artifact_dir: String,
    pub counts: KindCounts,
    pub urgency: MaintenanceUrgency,
    pub placeholder_target: usize,
}

/// Retention and placeholder store for one artifact directory.
pub struct ArtifactStore {
    config: StoreConfig,
    sequence: SequenceSource,
    urgency: MaintenanceUrgency,
    /// Deferred-pass delay, consumed by the first `maintain` call.
    pending_delay: Mutex<Option<Duration>>,
}

impl ArtifactStore {
    /// Scan the artifact directory, decide maintenance urgency, and run the
    /// pathological-backlog cleanup synchronously if needed.
    pub fn initialize(config: StoreConfig) -> Arc<Self> {
        let store = ArtifactStore {
            config,
            sequence: SequenceSource::new(),
            urgency: MaintenanceUrgency::None,
            pending_delay: Mutex::new(None),
        };

        let (urgency, pending) = store.decide_urgency();
        let store = ArtifactStore { urgency, ..store };

        if urgency == MaintenanceUrgency::Immediate {
            info!("artifact backlog exceeds slack margin, cleaning up now");
            store.run_maintenance();
        } else {
            *store.pending_delay.lock().unwrap() = pending;
        }

        Arc::new(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn naming(&self) -> &NamingScheme {
        &self.config.naming
    }

    /// Maintenance decision made during initialization.
    pub fn urgency(&self) -> MaintenanceUrgency {
        self.urgency
    }

    /// Next name-embedded sequence value.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.next()
    }

    fn decide_urgency(&self) -> (MaintenanceUrgency, Option<Duration>) {
        let counts = match self.scan_counts() {
            Ok(counts) => counts,
            Err(e) => {
                // A failed scan produced no evidence of backlog; skip.
                warn!("artifact directory scan failed, skipping maintenance: {}", e);
                return (MaintenanceUrgency::None, None);
            }
        };

        let limits = &self.config.retention;
        let target = self.config.placeholder.target;
        let slack = limits.backlog_slack;

        let over = |kind: ArtifactKind| counts.count_for(kind) > limits.ceiling_for(kind);
        let far_over =
            |kind: ArtifactKind| counts.count_for(kind) > limits.ceiling_for(kind) + slack;

        let any_over = ArtifactKind::REAL_KINDS.iter().any(|k| over(*k))
            || counts.placeholder_clean > target
            || counts.placeholder_dirty > 0;
        let any_far_over = ArtifactKind::REAL_KINDS.iter().any(|k| far_over(*k))
            || counts.placeholder_clean > target + slack
            || counts.placeholder_dirty > slack;
        let pristine = !any_over && counts.placeholder_clean == target;

        debug!(?counts, any_over, any_far_over, "initialization scan");

        if pristine {
            (MaintenanceUrgency::None, None)
        } else if any_far_over {
            (MaintenanceUrgency::Immediate, None)
        } else if any_over {
            (MaintenanceUrgency::Deferred, Some(Duration::ZERO))
        } else {
            // Only the clean pool is below target; no rush.
            (
                MaintenanceUrgency::Deferred,
                Some(Duration::from_millis(self.config.maintenance_delay_ms)),
            )
        }
    }

    /// Execute the deferred maintenance pass on a background worker, either
    /// immediately or after the configured delay. No-op when
    /// initialization decided nothing is pending.
    pub fn maintain(self: &Arc<Self>) {
        let delay = match self.pending_delay.lock().unwrap().take() {
            Some(delay) => delay,
            None => return,
        };

        let store = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(MAINTENANCE_THREAD.to_string())
            .spawn(move || {
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                store.run_maintenance();
            });
        if let Err(e) = spawned {
            warn!("failed to start maintenance worker: {}", e);
        }
    }

    /// Synchronous maintenance pass: evict excess artifacts for every real
    /// kind, then rebalance the placeholder pool. A failure on one kind
    /// never aborts the others.
    pub fn run_maintenance(&self) {
        if !self.ensure_dir() {
            return;
        }

        for kind in ArtifactKind::REAL_KINDS {
            let ceiling = self.config.retention.ceiling_for(kind);
            if !self.evict_excess(kind, ceiling) {
                warn!("eviction incomplete for kind {}", kind);
            }
        }

        self.rebalance_placeholder_pool();
        info!("maintenance pass complete");
    }

    /// Synchronous eviction for one kind at its configured ceiling,
    /// ensuring the directory exists first. Used by the ANR path before
    /// populating a new artifact.
    pub fn evict_now(&self, kind: ArtifactKind) -> bool {
        if !self.ensure_dir() {
            return false;
        }
        self.evict_excess(kind, self.config.retention.ceiling_for(kind))
    }

    /// Recycle the oldest artifacts of `kind` down to `ceiling`.
    ///
    /// Returns true only if every targeted file was recycled or deleted.
    pub fn evict_excess(&self, kind: ArtifactKind, ceiling: usize) -> bool {
        let files = self.list_kind(kind);
        if files.len() <= ceiling {
            return true;
        }

        let excess = files.len() - ceiling;
        debug!("evicting {} excess {} artifact(s)", excess, kind);

        let mut all_ok = true;
        for path in files.into_iter().take(excess) {
            if !self.recycle_artifact_file(&path) {
                all_ok = false;
            }
        }
        all_ok
    }

    /// Drive the clean pool toward its target, then trim any excess and
    /// delete every remaining dirty file. Dirty files are a transient
    /// intermediate state only; none survives a maintenance pass.
    pub fn rebalance_placeholder_pool(&self) {
        let target = self.config.placeholder.target;
        let mut dirty = self.list_kind(ArtifactKind::PlaceholderDirty);
        let mut clean_count = self.list_kind(ArtifactKind::PlaceholderClean).len();

        let mut attempts = 0usize;
        while clean_count < target {
            if let Some(dirty_file) = dirty.pop() {
                if self.clean_dirty_file(&dirty_file) {
                    clean_count += 1;
                }
            } else if let Some(dirty_file) = self.create_dirty_file() {
                if self.clean_dirty_file(&dirty_file) {
                    clean_count += 1;
                }
            }

            // Bound worst-case work when the filesystem keeps failing.
            attempts += 1;
            if attempts > target * 2 {
                warn!("placeholder rebalance hit its attempt cap");
                break;
            }
        }

        let clean = self.list_kind(ArtifactKind::PlaceholderClean);
        if clean.len() > target {
            for path in &clean[..clean.len() - target] {
                self.delete_file(path);
            }
        }

        for path in self.list_kind(ArtifactKind::PlaceholderDirty) {
            self.delete_file(&path);
        }
    }

    /// Claim an artifact file for `target_name`: rename a clean placeholder
    /// onto it, most-recently-created first, falling back to exclusive
    /// creation. Failed placeholders are deleted as encountered.
    pub fn acquire_artifact_file(&self, target_name: &str) -> Option<PathBuf> {
        if !self.ensure_dir() {
            return None;
        }
        let target = self.config.artifact_dir.join(target_name);

        let mut clean = self.list_kind(ArtifactKind::PlaceholderClean);
        while let Some(candidate) = clean.pop() {
            match fs::rename(&candidate, &target) {
                Ok(()) => {
                    debug!("claimed placeholder for {}", target_name);
                    return Some(target);
                }
                Err(e) => {
                    warn!("placeholder claim failed for {}: {}", candidate.display(), e);
                    self.delete_file(&candidate);
                }
            }
        }

        match File::options().write(true).create_new(true).open(&target) {
            Ok(_) => Some(target),
            Err(e) => {
                warn!("artifact creation failed for {}: {}", target.display(), e);
                None
            }
        }
    }

    /// Build a name for a fresh real artifact and acquire a file for it.
    pub fn acquire_artifact(
        &self,
        kind: ArtifactKind,
        app_version: &str,
        process_name: &str,
    ) -> Option<PathBuf> {
        let name =
            self.config
                .naming
                .artifact_name(kind, self.sequence.next(), app_version, process_name);
        self.acquire_artifact_file(&name)
    }

    /// Discard an artifact, replenishing the placeholder pool when it has
    /// room: rename to a dirty placeholder and zero-fill synchronously.
    /// With the pool disabled or full, the file is deleted outright.
    pub fn recycle_artifact_file(&self, path: &Path) -> bool {
        let placeholder = &self.config.placeholder;
        if placeholder.target == 0 {
            return self.delete_file(path);
        }

        let clean_count = self.list_kind(ArtifactKind::PlaceholderClean).len();
        if clean_count >= placeholder.target {
            return self.delete_file(path);
        }

        let dirty_name = self
            .config
            .naming
            .placeholder_name(self.sequence.next(), ArtifactKind::PlaceholderDirty);
        let dirty_path = self.config.artifact_dir.join(dirty_name);

        match fs::rename(path, &dirty_path) {
            Ok(()) => self.clean_dirty_file(&dirty_path),
            Err(e) => {
                warn!("recycle rename failed for {}: {}", path.display(), e);
                self.delete_file(path)
            }
        }
    }

    /// Zero-fill a dirty placeholder and rename it clean.
    ///
    /// Writes 1 KiB zero blocks until the larger of the minimum placeholder
    /// size and the file's current length is covered, so a placeholder
    /// converted from a large evicted log does not shrink. Any failure
    /// deletes the file.
    fn clean_dirty_file(&self, path: &Path) -> bool {
        let succeeded = self.zero_fill_and_promote(path);
        if !succeeded {
            self.delete_file(path);
        }
        succeeded
    }

    fn zero_fill_and_promote(&self, path: &Path) -> bool {
        let existing_len = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!("zero-fill stat failed for {}: {}", path.display(), e);
                return false;
            }
        };

        let block_bytes = ZERO_BLOCK_BYTES as u64;
        let min_bytes = self.config.placeholder.min_size_bytes();
        let mut block_count = min_bytes / block_bytes;
        let mut last_block_bytes = block_bytes;
        if existing_len > min_bytes {
            block_count = existing_len / block_bytes;
            if existing_len % block_bytes != 0 {
                block_count += 1;
                last_block_bytes = existing_len % block_bytes;
            }
        }

        let written = (|| -> std::io::Result<()> {
            let block = [0u8; ZERO_BLOCK_BYTES];
            let mut file = File::create(path)?;
            for i in 0..block_count {
                if i + 1 == block_count {
                    file.write_all(&block[..last_block_bytes as usize])?;
                } else {
                    file.write_all(&block)?;
                }
            }
            file.flush()
        })();
        if let Err(e) = written {
            warn!("zero-fill write failed for {}: {}", path.display(), e);
            return false;
        }

        let clean_name = self
            .config
            .naming
            .placeholder_name(self.sequence.next(), ArtifactKind::PlaceholderClean);
        let clean_path = self.config.artifact_dir.join(clean_name);
        match fs::rename(path, &clean_path) {
            Ok(()) => true,
            Err(e) => {
                warn!("clean rename failed for {}: {}", path.display(), e);
                false
            }
        }
    }

    fn create_dirty_file(&self) -> Option<PathBuf> {
        let name = self
            .config
            .naming
            .placeholder_name(self.sequence.next(), ArtifactKind::PlaceholderDirty);
        let path = self.config.artifact_dir.join(name);
        match File::options().write(true).create_new(true).open(&path) {
            Ok(_) => Some(path),
            Err(e) => {
                warn!("dirty placeholder creation failed: {}", e);
                None
            }
        }
    }

    /// Current per-kind counts and the initialization decision.
    pub fn status(&self) -> StoreStatus {
        StoreStatus {
            artifact_dir: self.config.artifact_dir.display().to_string(),
            counts: self.scan_counts().unwrap_or_default(),
            urgency: self.urgency,
            placeholder_target: self.config.placeholder.target,
        }
    }

    fn scan_counts(&self) -> std::io::Result<KindCounts> {
        let mut counts = KindCounts::default();
        let dir = &self.config.artifact_dir;
        if !dir.is_dir() {
            return Ok(counts);
        }
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            match self.config.naming.kind_of(name) {
                Some(ArtifactKind::ManagedCrash) => counts.managed_crash += 1,
                Some(ArtifactKind::NativeCrash) => counts.native_crash += 1,
                Some(ArtifactKind::Anr) => counts.anr += 1,
                Some(ArtifactKind::TraceSnapshot) => counts.trace_snapshot += 1,
                Some(ArtifactKind::PlaceholderClean) => counts.placeholder_clean += 1,
                Some(ArtifactKind::PlaceholderDirty) => counts.placeholder_dirty += 1,
                None => {}
            }
        }
        Ok(counts)
    }

    /// List files of one kind, sorted by name ascending (= creation order,
    /// by the fixed-width sequence invariant).
    fn list_kind(&self, kind: ArtifactKind) -> Vec<PathBuf> {
        let dir = &self.config.artifact_dir;
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("listing {} failed: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| self.config.naming.matches(name, kind))
            .collect();
        names.sort();
        names.into_iter().map(|name| dir.join(name)).collect()
    }

    fn ensure_dir(&self) -> bool {
        match fs::create_dir_all(&self.config.artifact_dir) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "artifact directory {} unavailable: {}",
                    self.config.artifact_dir.display(),
                    e
                );
                false
            }
        }
    }

    fn delete_file(&self, path: &Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) => {
                warn!("delete failed for {}: {}", path.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config(dir: &Path) -> StoreConfig {
        let mut config = StoreConfig::new(dir);
        config.placeholder.target = 2;
        config.placeholder.min_size_kb = 4;
        config
    }

    fn write_artifact(store: &ArtifactStore, kind: ArtifactKind, seq: u64, content: &[u8]) {
        let name = store.naming().artifact_name(kind, seq, "1.0", "proc");
        fs::write(store.config().artifact_dir.join(name), content).unwrap();
    }

    #[test]
    fn test_initialize_empty_dir_defers() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::initialize(test_config(dir.path()));
        // Pool below target: deferred with the configured delay.
        assert_eq!(store.urgency(), MaintenanceUrgency::Deferred);
    }

    #[test]
    fn test_initialize_pristine_skips() {
        let dir = tempdir().unwrap();
        {
            let store = ArtifactStore::initialize(test_config(dir.path()));
            store.rebalance_placeholder_pool();
        }
        let store = ArtifactStore::initialize(test_config(dir.path()));
        assert_eq!(store.urgency(), MaintenanceUrgency::None);
    }

    #[test]
    fn test_initialize_backlog_runs_immediately() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.retention.anr_max = 1;
        config.retention.backlog_slack = 3;
        config.placeholder.target = 0;

        let scheme = NamingScheme::default();
        for seq in 0..6 {
            let name = scheme.artifact_name(ArtifactKind::Anr, seq, "1.0", "proc");
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let store = ArtifactStore::initialize(config);
        assert_eq!(store.urgency(), MaintenanceUrgency::Immediate);
        // Cleanup already ran: only the newest file remains.
        assert_eq!(store.status().counts.anr, 1);
    }

    #[test]
    fn test_evict_excess_keeps_newest() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.placeholder.target = 0;
        let store = ArtifactStore::initialize(config);

        for seq in [3u64, 1, 5, 2, 4] {
            write_artifact(&store, ArtifactKind::ManagedCrash, seq, b"log");
        }

        assert!(store.evict_excess(ArtifactKind::ManagedCrash, 2));

        let mut remaining: Vec<u64> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter_map(|n| store.naming().sequence_of(&n))
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec![4, 5]);
    }

    #[test]
    fn test_evict_excess_ceiling_zero_removes_all() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.placeholder.target = 0;
        let store = ArtifactStore::initialize(config);

        for seq in 0..4 {
            write_artifact(&store, ArtifactKind::Anr, seq, b"log");
        }
        assert!(store.evict_excess(ArtifactKind::Anr, 0));
        assert_eq!(store.status().counts.anr, 0);
    }

    #[test]
    fn test_eviction_feeds_placeholder_pool() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::initialize(test_config(dir.path()));

        for seq in 0..3 {
            write_artifact(&store, ArtifactKind::NativeCrash, seq, b"log");
        }
        assert!(store.evict_excess(ArtifactKind::NativeCrash, 1));

        let counts = store.status().counts;
        assert_eq!(counts.native_crash, 1);
        assert_eq!(counts.placeholder_clean, 2);
        assert_eq!(counts.placeholder_dirty, 0);
    }

    #[test]
    fn test_rebalance_reaches_target_with_no_dirty_left() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::initialize(test_config(dir.path()));

        store.rebalance_placeholder_pool();

        let counts = store.status().counts;
        assert_eq!(counts.placeholder_clean, 2);
        assert_eq!(counts.placeholder_dirty, 0);
    }

    #[test]
    fn test_rebalance_trims_excess_clean() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::initialize(test_config(dir.path()));

        let scheme = NamingScheme::default();
        for seq in 0..5 {
            let name = scheme.placeholder_name(seq, ArtifactKind::PlaceholderClean);
            fs::write(dir.path().join(name), vec![0u8; 1024]).unwrap();
        }

        store.rebalance_placeholder_pool();
        assert_eq!(store.status().counts.placeholder_clean, 2);
    }

    #[test]
    fn test_rebalance_consumes_dirty_files() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::initialize(test_config(dir.path()));

        let scheme = NamingScheme::default();
        for seq in 0..4 {
            let name = scheme.placeholder_name(seq, ArtifactKind::PlaceholderDirty);
            fs::write(dir.path().join(name), b"garbage content").unwrap();
        }

        store.rebalance_placeholder_pool();
        let counts = store.status().counts;
        assert_eq!(counts.placeholder_clean, 2);
        assert_eq!(counts.placeholder_dirty, 0);
    }

    #[test]
    fn test_clean_placeholder_is_zero_filled_to_min_size() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::initialize(test_config(dir.path()));

        store.rebalance_placeholder_pool();

        let clean = store.list_kind(ArtifactKind::PlaceholderClean);
        assert!(!clean.is_empty());
        for path in clean {
            let content = fs::read(&path).unwrap();
            assert_eq!(content.len() as u64, 4 * 1024);
            assert!(content.iter().all(|b| *b == 0));
        }
    }

    #[test]
    fn test_recycled_large_file_does_not_shrink() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::initialize(test_config(dir.path()));

        // 10 KiB + 100 bytes, well over the 4 KiB minimum.
        let big = dir.path().join(
            store
                .naming()
                .artifact_name(ArtifactKind::ManagedCrash, 1, "1.0", "proc"),
        );
        fs::write(&big, vec![0xAB; 10 * 1024 + 100]).unwrap();

        assert!(store.recycle_artifact_file(&big));

        let clean = store.list_kind(ArtifactKind::PlaceholderClean);
        assert_eq!(clean.len(), 1);
        let content = fs::read(&clean[0]).unwrap();
        assert_eq!(content.len(), 10 * 1024 + 100);
        assert!(content.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_recycle_with_pool_disabled_deletes() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.placeholder.target = 0;
        let store = ArtifactStore::initialize(config);

        write_artifact(&store, ArtifactKind::Anr, 1, b"log");
        let path = store.list_kind(ArtifactKind::Anr).pop().unwrap();
        assert!(store.recycle_artifact_file(&path));

        let counts = store.status().counts;
        assert_eq!(counts.anr, 0);
        assert_eq!(counts.placeholder_clean, 0);
        assert_eq!(counts.placeholder_dirty, 0);
    }

    #[test]
    fn test_recycle_with_full_pool_deletes() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::initialize(test_config(dir.path()));
        store.rebalance_placeholder_pool();

        write_artifact(&store, ArtifactKind::Anr, 1, b"log");
        let path = store.list_kind(ArtifactKind::Anr).pop().unwrap();
        assert!(store.recycle_artifact_file(&path));

        let counts = store.status().counts;
        assert_eq!(counts.anr, 0);
        assert_eq!(counts.placeholder_clean, 2);
    }

    #[test]
    fn test_acquire_claims_newest_placeholder() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::initialize(test_config(dir.path()));
        store.rebalance_placeholder_pool();

        let before = store.list_kind(ArtifactKind::PlaceholderClean);
        let newest_len = fs::metadata(before.last().unwrap()).unwrap().len();

        let name = store
            .naming()
            .artifact_name(ArtifactKind::ManagedCrash, 99, "1.0", "proc");
        let acquired = store.acquire_artifact_file(&name).unwrap();

        assert!(acquired.ends_with(&name));
        // The claimed file keeps its zero-filled length.
        assert_eq!(fs::metadata(&acquired).unwrap().len(), newest_len);
        assert_eq!(store.status().counts.placeholder_clean, 1);
    }

    #[test]
    fn test_acquire_falls_back_to_fresh_file() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.placeholder.target = 0;
        let store = ArtifactStore::initialize(config);

        let name = store
            .naming()
            .artifact_name(ArtifactKind::Anr, 7, "1.0", "proc");
        let acquired = store.acquire_artifact_file(&name).unwrap();
        assert!(acquired.exists());
        assert_eq!(fs::metadata(&acquired).unwrap().len(), 0);
    }

    #[test]
    fn test_acquire_fails_when_target_exists() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.placeholder.target = 0;
        let store = ArtifactStore::initialize(config);

        let name = store
            .naming()
            .artifact_name(ArtifactKind::Anr, 7, "1.0", "proc");
        fs::write(dir.path().join(&name), b"already here").unwrap();
        assert!(store.acquire_artifact_file(&name).is_none());
    }

    #[test]
    fn test_maintenance_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.retention.managed_crash_max = 1;
        let store = ArtifactStore::initialize(config);

        for seq in 0..4 {
            write_artifact(&store, ArtifactKind::ManagedCrash, seq, b"log");
        }

        store.run_maintenance();
        let first = store.status().counts;

        store.run_maintenance();
        let second = store.status().counts;

        assert_eq!(first, second);
        assert_eq!(second.managed_crash, 1);
        assert_eq!(second.placeholder_clean, 2);
        assert_eq!(second.placeholder_dirty, 0);
    }

    #[test]
    fn test_status_serializes() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::initialize(test_config(dir.path()));
        let json = serde_json::to_string(&store.status()).unwrap();
        assert!(json.contains("placeholder_target"));
        assert!(json.contains("deferred"));
    }
}
