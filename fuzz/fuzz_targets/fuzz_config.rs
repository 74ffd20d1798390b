//! Fuzz target for configuration JSON parsing and validation.
//!
//! Configuration may come from hand-edited files; parsing and validation
//! handle arbitrary input without panicking.

#![no_main]

use cw_common::{CapturePolicy, CorrelatorConfig, PlaceholderConfig, RetentionLimits};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<RetentionLimits>(data);
    if let Ok(config) = serde_json::from_slice::<PlaceholderConfig>(data) {
        let _ = config.validate();
    }
    if let Ok(config) = serde_json::from_slice::<CorrelatorConfig>(data) {
        let _ = config.validate();
    }
    if let Ok(policy) = serde_json::from_slice::<CapturePolicy>(data) {
        let _ = policy.validate();
        let _ = policy.compiled_allowlist();
    }
});
