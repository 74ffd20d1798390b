//! Fuzz target for artifact file-name parsing.
//!
//! The artifact directory may contain foreign files; classifying a name
//! must never panic, only return `None`.

#![no_main]

use cw_common::NamingScheme;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(name) = std::str::from_utf8(data) {
        let scheme = NamingScheme::default();
        let _ = scheme.kind_of(name);
        let _ = scheme.sequence_of(name);
    }
});
