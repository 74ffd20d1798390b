//! Identity of the hosting process.
//!
//! Embedded in artifact names and report headers so a report can be
//! matched back to the process and build that produced it.

use serde::{Deserialize, Serialize};

/// Process and application identity carried by every capture path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub pid: u32,

    /// Name of the hosting process; empty input becomes `"unknown"`.
    pub process_name: String,

    pub app_id: String,

    pub app_version: String,
}

impl AppIdentity {
    pub fn new(
        pid: u32,
        process_name: impl Into<String>,
        app_id: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        let process_name = process_name.into();
        AppIdentity {
            pid,
            process_name: if process_name.is_empty() {
                "unknown".to_string()
            } else {
                process_name
            },
            app_id: app_id.into(),
            app_version: app_version.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_process_name_becomes_unknown() {
        let identity = AppIdentity::new(42, "", "com.example", "1.0");
        assert_eq!(identity.process_name, "unknown");
    }

    #[test]
    fn test_fields_preserved() {
        let identity = AppIdentity::new(42, "com.example:push", "com.example", "1.0");
        assert_eq!(identity.pid, 42);
        assert_eq!(identity.process_name, "com.example:push");
        assert_eq!(identity.app_id, "com.example");
        assert_eq!(identity.app_version, "1.0");
    }
}
