//! Other-thread stack dump.
//!
//! Enumerates the roster's snapshots, skips the failing thread, applies the
//! optional name allowlist and the dump-count limit, and closes with a
//! summary tally. Snapshot order is whatever the roster produced;
//! callers must not depend on dump order.

use regex::Regex;

use crate::diagnostics::ThreadSnapshot;
use crate::header::{identity_line, OTHER_THREADS_FOOTER, OTHER_THREADS_HEADER};

/// Render the other-threads section for one failure.
///
/// `max_dumped == 0` means unlimited. An empty allowlist (`None`) matches
/// every thread.
pub fn other_threads_section(
    failing_thread_name: &str,
    pid: u32,
    process_name: &str,
    snapshots: &[ThreadSnapshot],
    allowlist: Option<&[Regex]>,
    max_dumped: usize,
) -> String {
    let mut matched = 0usize;
    let mut ignored_by_limit = 0usize;
    let mut dumped = 0usize;
    let mut out = String::new();

    for snapshot in snapshots {
        if snapshot.name == failing_thread_name {
            continue;
        }

        if let Some(patterns) = allowlist {
            if !patterns.iter().any(|p| p.is_match(&snapshot.name)) {
                continue;
            }
        }
        matched += 1;

        if max_dumped > 0 && dumped >= max_dumped {
            ignored_by_limit += 1;
            continue;
        }

        out.push_str(OTHER_THREADS_HEADER);
        out.push('\n');
        out.push_str(&identity_line(pid, snapshot.id, &snapshot.name, process_name));
        out.push('\n');
        out.push_str("stacktrace:\n");
        out.push_str(&snapshot.stacktrace);
        if !snapshot.stacktrace.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
        dumped += 1;
    }

    if snapshots.len() > 1 {
        if dumped == 0 {
            out.push_str(OTHER_THREADS_HEADER);
            out.push('\n');
        }
        out.push_str(&format!(
            "total threads (exclude the failing thread): {}\n",
            snapshots.len() - 1
        ));
        if allowlist.is_some() {
            out.push_str(&format!("threads matched allowlist: {}\n", matched));
        }
        if max_dumped > 0 {
            out.push_str(&format!(
                "threads ignored by max count limit: {}\n",
                ignored_by_limit
            ));
        }
        out.push_str(&format!("dumped threads: {}\n", dumped));
        out.push_str(OTHER_THREADS_FOOTER);
        out.push('\n');
    }

    out
}
