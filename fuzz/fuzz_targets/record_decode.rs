//! Fuzz target for `Record::decode`.
//!
//! The record tag byte plus trailing fields are attacker-controlled the
//! moment a Noise session is established; decoding arbitrary plaintext must
//! never panic, only return `Err`.

#![no_main]

use dilation_proto::Record;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = Record::decode(data);
});
