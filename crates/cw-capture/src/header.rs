//! Emergency header formatting.
//!
//! Both capture paths open their artifact with the same fixed preamble so
//! downstream tooling can parse any report the same way, regardless of
//! which path produced it.

use chrono::{DateTime, Utc};

/// Separator opening a thread block or the ANR trace body.
pub const OTHER_THREADS_HEADER: &str = "--- other threads ---";

/// Separator closing the other-threads section or the ANR trace body.
pub const OTHER_THREADS_FOOTER: &str = "--- end of other threads ---";

const BANNER: &str = "*** *** *** *** *** *** *** *** *** *** *** *** *** *** *** ***";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %z";

/// Fixed report preamble: capture start time, failure time, failure kind,
/// app identity.
pub fn log_header(
    start_time: DateTime<Utc>,
    failure_time: DateTime<Utc>,
    failure_kind: &str,
    app_id: &str,
    app_version: &str,
) -> String {
    format!(
        "{banner}\n\
         Report maker: 'crash_warden {version}'\n\
         Capture start time: '{start}'\n\
         Failure time: '{failure}'\n\
         Failure kind: '{kind}'\n\
         App ID: '{app_id}'\n\
         App version: '{app_version}'\n\n",
        banner = BANNER,
        version = env!("CARGO_PKG_VERSION"),
        start = start_time.format(TIME_FORMAT),
        failure = failure_time.format(TIME_FORMAT),
        kind = failure_kind,
        app_id = app_id,
        app_version = app_version,
    )
}

/// Identity line for the failing thread.
pub fn identity_line(pid: u32, tid: u64, thread_name: &str, process_name: &str) -> String {
    format!(
        "pid: {}, tid: {}, name: {}  >>> {} <<<\n",
        pid, tid, thread_name, process_name
    )
}

/// Identity line for a process-level event with no specific thread.
pub fn process_identity_line(pid: u32, process_name: &str) -> String {
    format!("pid: {}  >>> {} <<<\n", pid, process_name)
}
