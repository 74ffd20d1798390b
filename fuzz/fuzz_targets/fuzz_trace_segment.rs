//! Fuzz target for hang-trace segment extraction.
//!
//! The shared trace directory is populated by the operating system and
//! holds interleaved entries from every process on the device, so the
//! parser must handle arbitrary content without panicking.

#![no_main]

use cw_capture::extract_segment;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parse errors are "no match", never a panic.
    let _ = extract_segment(data, 4242, "com.example.app", 1_700_000_000_000, 15_000);
});
