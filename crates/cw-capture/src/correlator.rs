//! ANR correlator.
//!
//! The operating system writes hang traces for every process on the device
//! into one shared directory. The correlator consumes file-close
//! notifications for that directory from a bounded single-consumer
//! channel, debounces duplicate notifications for the same underlying
//! event, and extracts the one trace segment matching this process and
//! this point in time.
//!
//! State machine per process: Idle → Watching → Suppressed. Once
//! suppressed (another capture path fired), the correlator never
//! reactivates for the life of the process instance.
//!
//! The debounce guard is not a lock: notifications may be delivered
//! rapidly and the consumer may be re-entered, so the check-then-set on
//! the last-capture timestamp is a compare-and-swap claim. A claim whose
//! capture silently aborts (liveness check failed, no matching segment)
//! is rolled back so a genuine later event is not suppressed.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::{Arc, LazyLock};
use std::thread;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use tracing::{debug, warn};

use cw_common::naming::ArtifactKind;
use cw_common::{AppIdentity, CapturePolicy, CorrelatorConfig};
use cw_store::{ArtifactStore, ArtifactWriter};

use crate::diagnostics::{
    CaptureCallback, DiagnosticSources, ProcessStateProbe, SuppressionTarget,
};
use crate::header::{
    log_header, process_identity_line, OTHER_THREADS_FOOTER, OTHER_THREADS_HEADER,
};
use crate::report;

/// Name of the trace-event consumer thread.
const WATCH_THREAD: &str = "cw-anr-watch";

/// Bound of the notification queue. Overflow drops events; the debounce
/// window makes duplicates worthless anyway.
const EVENT_QUEUE_DEPTH: usize = 32;

const STATE_IDLE: u8 = 0;
const STATE_WATCHING: u8 = 1;
const STATE_SUPPRESSED: u8 = 2;

/// Trace block header: `----- pid <N> at <timestamp> -----`.
static PID_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-----\s+pid\s+(\d+)\s+at\s+(.+?)\s+-----$").expect("static pid/time pattern")
});

/// Process name line: `Cmd line: <name>`.
static CMD_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Cmd\s+line:\s+(.*)$").expect("static cmd line pattern"));

const TRACE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Observable correlator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelatorState {
    Idle,
    Watching,
    Suppressed,
}

/// Handle for the OS notification adapter: deliver paths of files closed
/// in the watched directory.
#[derive(Clone)]
pub struct TraceEventSender {
    tx: SyncSender<PathBuf>,
}

impl TraceEventSender {
    /// Deliver one file-close notification. Never blocks the notifier;
    /// the event is dropped when the queue is full or the consumer is
    /// gone.
    pub fn notify_closed(&self, path: impl Into<PathBuf>) {
        match self.tx.try_send(path.into()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("trace event queue full, dropping event"),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Watches the shared hang-trace directory for this process's ANR events.
pub struct AnrCorrelator {
    inner: Arc<Inner>,
}

struct Inner {
    config: CorrelatorConfig,
    policy: CapturePolicy,
    identity: AppIdentity,
    store: Arc<ArtifactStore>,
    sources: Arc<dyn DiagnosticSources>,
    probe: Option<Arc<dyn ProcessStateProbe>>,
    callback: Option<Arc<dyn CaptureCallback>>,
    started_at: DateTime<Utc>,
    state: AtomicU8,
    last_capture_ms: AtomicI64,
}

impl AnrCorrelator {
    pub fn new(
        config: CorrelatorConfig,
        policy: CapturePolicy,
        identity: AppIdentity,
        store: Arc<ArtifactStore>,
        sources: Arc<dyn DiagnosticSources>,
        probe: Option<Arc<dyn ProcessStateProbe>>,
        callback: Option<Arc<dyn CaptureCallback>>,
    ) -> Self {
        AnrCorrelator {
            inner: Arc::new(Inner {
                config,
                policy,
                identity,
                store,
                sources,
                probe,
                callback,
                started_at: Utc::now(),
                state: AtomicU8::new(STATE_IDLE),
                last_capture_ms: AtomicI64::new(0),
            }),
        }
    }

    /// Transition Idle → Watching and spawn the consumer thread.
    ///
    /// Returns the sender the OS notification adapter feeds, or `None`
    /// when the correlator is not idle or the thread could not start.
    pub fn start(&self) -> Option<TraceEventSender> {
        if self
            .inner
            .state
            .compare_exchange(
                STATE_IDLE,
                STATE_WATCHING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            warn!("correlator start ignored: not idle");
            return None;
        }

        let (tx, rx) = sync_channel::<PathBuf>(EVENT_QUEUE_DEPTH);
        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name(WATCH_THREAD.to_string())
            .spawn(move || {
                for path in rx {
                    if inner.state.load(Ordering::Acquire) == STATE_SUPPRESSED {
                        break;
                    }
                    inner.handle_event(&path);
                }
                debug!("trace event consumer exiting");
            });

        match spawned {
            Ok(_) => Some(TraceEventSender { tx }),
            Err(e) => {
                warn!("failed to start trace event consumer: {}", e);
                self.inner.state.store(STATE_IDLE, Ordering::Release);
                None
            }
        }
    }

    /// Permanently stand down; another capture path has fired.
    pub fn suppress(&self) {
        self.inner.state.store(STATE_SUPPRESSED, Ordering::Release);
    }

    pub fn state(&self) -> CorrelatorState {
        match self.inner.state.load(Ordering::Acquire) {
            STATE_WATCHING => CorrelatorState::Watching,
            STATE_SUPPRESSED => CorrelatorState::Suppressed,
            _ => CorrelatorState::Idle,
        }
    }
}

impl SuppressionTarget for AnrCorrelator {
    fn suppress(&self) {
        AnrCorrelator::suppress(self);
    }
}

impl Inner {
    fn handle_event(&self, path: &Path) {
        if self.state.load(Ordering::Acquire) != STATE_WATCHING {
            return;
        }
        let Some(name) = path.to_str() else {
            return;
        };
        if !name.contains(&self.config.trace_marker) {
            return;
        }
        self.handle_trace(path);
    }

    fn handle_trace(&self, path: &Path) {
        let event_time = Utc::now();
        let now_ms = event_time.timestamp_millis();
        let window_ms = self.config.debounce_window_ms as i64;

        // Debounce claim: the OS writes several related files for one
        // underlying event, and notifications may arrive concurrently.
        let last = self.last_capture_ms.load(Ordering::Acquire);
        if now_ms.saturating_sub(last) < window_ms {
            return;
        }
        if self
            .last_capture_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        if self.config.check_process_hung {
            if let Some(probe) = &self.probe {
                if !probe.is_process_hung(self.identity.pid, self.config.debounce_window_ms) {
                    self.last_capture_ms.store(last, Ordering::Release);
                    return;
                }
            }
        }

        let trace = match File::open(path) {
            Ok(file) => extract_segment(
                BufReader::new(file),
                self.identity.pid,
                &self.identity.process_name,
                now_ms,
                self.config.debounce_window_ms,
            ),
            Err(e) => {
                debug!("trace open failed for {}: {}", path.display(), e);
                String::new()
            }
        };
        if trace.is_empty() {
            // Not an event for this process, or the file is still being
            // written; release the claim.
            self.last_capture_ms.store(last, Ordering::Release);
            return;
        }

        debug!("ANR segment captured from {}", path.display());

        if !self.store.evict_now(ArtifactKind::Anr) {
            return;
        }

        let emergency = self.build_emergency(event_time, &trace);
        let artifact = self.store.acquire_artifact(
            ArtifactKind::Anr,
            &self.identity.app_version,
            &self.identity.process_name,
        );

        let mut leftover = Some(emergency);
        if let Some(artifact_path) = &artifact {
            match ArtifactWriter::open(artifact_path) {
                Ok(mut writer) => {
                    leftover = report::populate_common(
                        &mut writer,
                        leftover,
                        self.sources.as_ref(),
                        &self.policy,
                    );
                }
                Err(e) => warn!("ANR artifact open failed: {}", e),
            }
        }

        if let Some(callback) = &self.callback {
            let invoked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback.on_capture(artifact.as_deref(), leftover.as_deref());
            }));
            if invoked.is_err() {
                warn!("capture callback panicked");
            }
        }
    }

    fn build_emergency(&self, event_time: DateTime<Utc>, trace: &str) -> String {
        let mut out = log_header(
            self.started_at,
            event_time,
            ArtifactKind::Anr.as_str(),
            &self.identity.app_id,
            &self.identity.app_version,
        );
        out.push_str(&process_identity_line(
            self.identity.pid,
            &self.identity.process_name,
        ));
        out.push('\n');
        out.push_str(OTHER_THREADS_HEADER);
        out.push_str("\n\n");
        out.push_str(trace);
        out.push('\n');
        out.push_str(OTHER_THREADS_FOOTER);
        out.push_str("\n\n");
        out
    }
}

/// Extract this process's segment from a shared hang-trace file.
///
/// Forward-only single-pass scan over blocks of the form:
///
/// ```text
/// ----- pid <N> at <YYYY-MM-DD HH:MM:SS> -----
/// Cmd line: <process name>
/// <free-form stack content>
/// ----- end <N> -----
/// ```
///
/// A block is accepted only when the pid matches, the block timestamp is
/// within `tolerance_ms` of `event_time_ms`, and the command line equals
/// the process name. The returned body starts at the `Cmd line:` line and
/// excludes the header and terminator. Returns empty when no block matches
/// or the file ends before a terminator; malformed lines are skipped, not
/// errors.
pub fn extract_segment<R: BufRead>(
    reader: R,
    pid: u32,
    process_name: &str,
    event_time_ms: i64,
    tolerance_ms: u64,
) -> String {
    let mut lines = reader.lines();

    loop {
        let Some(line) = lines.next() else {
            return String::new();
        };
        let Ok(line) = line else {
            return String::new();
        };
        if !line.starts_with("----- pid ") {
            continue;
        }

        let Some(caps) = PID_TIME_RE.captures(&line) else {
            continue;
        };
        let Ok(header_pid) = caps[1].parse::<u32>() else {
            continue;
        };
        if header_pid != pid {
            continue;
        }
        let Ok(stamp) = NaiveDateTime::parse_from_str(&caps[2], TRACE_TIME_FORMAT) else {
            continue;
        };
        let stamp_ms = stamp.and_utc().timestamp_millis();
        if stamp_ms.abs_diff(event_time_ms) > tolerance_ms {
            continue;
        }

        let Some(Ok(cmd_line)) = lines.next() else {
            return String::new();
        };
        let Some(cmd) = CMD_LINE_RE.captures(&cmd_line) else {
            continue;
        };
        if &cmd[1] != process_name {
            continue;
        }

        // Accepted: accumulate verbatim until the terminator, then stop.
        let mut body = String::new();
        body.push_str(&cmd_line);
        body.push('\n');
        for rest in lines.by_ref() {
            let Ok(rest) = rest else {
                return String::new();
            };
            if rest.starts_with("----- end ") {
                return body;
            }
            body.push_str(&rest);
            body.push('\n');
        }
        return String::new();
    }
}
