//! Unhandled-failure capture pipeline.
//!
//! Installed once per process as the process-wide default hook for
//! uncaught failures. The pipeline is an explicitly constructed,
//! process-scoped object: the host installs whatever process hook it owns
//! and forwards into [`CapturePipeline::on_failure`] on the failing
//! thread. The previously installed hook is held as an explicit delegate
//! and invoked at most once, post-capture, so a second failure during
//! capture is handled by the original chain rather than recursing.
//!
//! Exactly one invocation is expected per process lifetime under normal
//! policy; the pipeline defends only against sibling capture paths, which
//! it suppresses before enumerating any artifact state.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cw_common::naming::ArtifactKind;
use cw_common::{AppIdentity, CapturePolicy, TERMINATE_EXIT_STATUS};
use cw_store::{ArtifactStore, ArtifactWriter};

use crate::diagnostics::{
    CaptureCallback, DiagnosticSources, ProcessControl, SuppressionTarget, ThreadRoster,
};
use crate::header::{identity_line, log_header};
use crate::report;
use crate::threads::other_threads_section;

/// What happens to the process after capture completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationPolicy {
    /// Re-raise the failure into the prior hook chain, so default
    /// process-death semantics proceed.
    Rethrow,
    /// Close all application screens and terminate with a fixed nonzero
    /// status.
    Terminate,
}

/// The thread that raised the failure.
#[derive(Debug, Clone)]
pub struct ThreadInfo {
    pub id: u64,
    pub name: String,
}

/// A pre-formatted description of the failure.
#[derive(Debug, Clone)]
pub struct FailureInfo {
    /// Failure class, e.g. the panic or exception type.
    pub kind: String,
    pub message: String,
    pub stacktrace: String,
}

/// The previously installed process-wide failure hook.
pub trait FailureHook: Send + Sync {
    fn on_failure(&self, thread: &ThreadInfo, failure: &FailureInfo);
}

/// Process-scoped capture pipeline for unhandled failures.
pub struct CapturePipeline {
    identity: AppIdentity,
    policy: CapturePolicy,
    termination: TerminationPolicy,
    store: Arc<ArtifactStore>,
    sources: Arc<dyn DiagnosticSources>,
    roster: Arc<dyn ThreadRoster>,
    control: Arc<dyn ProcessControl>,
    callback: Option<Arc<dyn CaptureCallback>>,
    suppression_targets: Vec<Arc<dyn SuppressionTarget>>,
    prior_hook: Mutex<Option<Box<dyn FailureHook>>>,
    started_at: DateTime<Utc>,
}

impl CapturePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: AppIdentity,
        policy: CapturePolicy,
        termination: TerminationPolicy,
        store: Arc<ArtifactStore>,
        sources: Arc<dyn DiagnosticSources>,
        roster: Arc<dyn ThreadRoster>,
        control: Arc<dyn ProcessControl>,
    ) -> Self {
        CapturePipeline {
            identity,
            policy,
            termination,
            store,
            sources,
            roster,
            control,
            callback: None,
            suppression_targets: Vec::new(),
            prior_hook: Mutex::new(None),
            started_at: Utc::now(),
        }
    }

    pub fn with_callback(mut self, callback: Arc<dyn CaptureCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Remember the hook this pipeline replaced when it was installed.
    pub fn with_prior_hook(self, hook: Box<dyn FailureHook>) -> Self {
        *self.prior_hook.lock().unwrap() = Some(hook);
        self
    }

    /// Register a sibling capture path to stand down when this one fires.
    pub fn with_suppression_target(mut self, target: Arc<dyn SuppressionTarget>) -> Self {
        self.suppression_targets.push(target);
        self
    }

    /// Handle an unhandled failure on the thread that raised it.
    pub fn on_failure(&self, thread: &ThreadInfo, failure: &FailureInfo) {
        let failure_time = Utc::now();

        // Restore the prior chain first: a second failure during capture
        // must not re-enter this pipeline.
        let prior = self.prior_hook.lock().unwrap().take();

        // Only one capture path may populate an artifact per failure;
        // suppression must precede any artifact-state enumeration.
        for target in &self.suppression_targets {
            target.suppress();
        }

        let artifact = self.store.acquire_artifact(
            ArtifactKind::ManagedCrash,
            &self.identity.app_version,
            &self.identity.process_name,
        );

        // Built regardless of whether a file was obtained.
        let emergency = self.build_emergency(failure_time, thread, failure);

        let mut leftover = Some(emergency);
        if let Some(path) = &artifact {
            match ArtifactWriter::open(path) {
                Ok(mut writer) => {
                    leftover = report::populate_common(
                        &mut writer,
                        leftover,
                        self.sources.as_ref(),
                        &self.policy,
                    );
                    self.append_crash_sections(&mut writer, thread);
                }
                Err(e) => warn!("crash artifact open failed: {}", e),
            }
        } else {
            debug!("no crash artifact available, emergency goes to the callback");
        }

        if let Some(callback) = &self.callback {
            let invoked = catch_unwind(AssertUnwindSafe(|| {
                callback.on_capture(artifact.as_deref(), leftover.as_deref());
            }));
            if invoked.is_err() {
                warn!("capture callback panicked");
            }
        }

        match self.termination {
            TerminationPolicy::Rethrow => {
                if let Some(prior) = prior {
                    prior.on_failure(thread, failure);
                }
            }
            TerminationPolicy::Terminate => {
                self.control.teardown_ui();
                self.control.terminate(TERMINATE_EXIT_STATUS);
            }
        }
    }

    /// Sections the crash path appends beyond the common set: the
    /// foreground indicator and, when enabled, the other-thread dump.
    fn append_crash_sections(&self, writer: &mut ArtifactWriter, thread: &ThreadInfo) {
        let foreground = format!(
            "foreground:\n{}\n\n",
            if self.sources.is_application_foreground() {
                "yes"
            } else {
                "no"
            }
        );
        if let Err(e) = writer.append(&foreground) {
            warn!("foreground section write failed: {}", e);
        }

        if self.policy.dump_threads {
            let allowlist = self.policy.compiled_allowlist();
            let section = other_threads_section(
                &thread.name,
                self.identity.pid,
                &self.identity.process_name,
                &self.roster.thread_snapshots(),
                allowlist.as_deref(),
                self.policy.thread_dump_max,
            );
            if let Err(e) = writer.append(&section) {
                warn!("other-threads section write failed: {}", e);
            }
        }
    }

    fn build_emergency(
        &self,
        failure_time: DateTime<Utc>,
        thread: &ThreadInfo,
        failure: &FailureInfo,
    ) -> String {
        let mut out = log_header(
            self.started_at,
            failure_time,
            ArtifactKind::ManagedCrash.as_str(),
            &self.identity.app_id,
            &self.identity.app_version,
        );
        out.push_str(&identity_line(
            self.identity.pid,
            thread.id,
            &thread.name,
            &self.identity.process_name,
        ));
        out.push('\n');
        out.push_str(&format!("failure: {}: {}\n", failure.kind, failure.message));
        out.push_str("stacktrace:\n");
        out.push_str(&failure.stacktrace);
        if !failure.stacktrace.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
        out
    }
}
