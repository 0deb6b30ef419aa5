//! Fuzz target for the length-prefixed frame parser.
//!
//! `peek_frame` must never panic on arbitrary bytes, regardless of what a
//! declared length claims about the rest of the buffer.

#![no_main]

use dilation_proto::frame::peek_frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = peek_frame(data);
});
