//! Property-based test for the Framer's fragmentation tolerance (testable
//! property #1 of the Dilation core specification): splitting a byte stream
//! arbitrarily into chunks and feeding it to `add_and_parse` piecemeal must
//! produce the same token sequence as feeding it in one call.
//!
//! `dilation-proto/tests/record_properties.rs` covers the equivalent
//! invariant for the bare frame/record wire format; this test drives the
//! full prologue + length-prefixed-frame state machine in `dilation-core`.

use dilation_core::{
    framer::{Framer, FramerConfig, FramerToken},
    transport::RecordingTransport,
};
use proptest::prelude::*;

fn framer() -> Framer<RecordingTransport> {
    Framer::new(RecordingTransport::new(), b"out".to_vec(), b"in".to_vec(), FramerConfig::default())
}

fn arbitrary_stream() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16).prop_map(|frames| {
        let mut stream = b"in".to_vec();
        for payload in frames {
            stream.extend_from_slice(&dilation_proto::encode_frame_to_vec(&payload).unwrap());
        }
        stream
    })
}

proptest! {
    #[test]
    fn whole_stream_matches_arbitrary_fragmentation(
        stream in arbitrary_stream(),
        split_points in prop::collection::vec(0..usize::MAX, 0..32),
    ) {
        let mut whole = framer();
        let whole_tokens = whole.add_and_parse(&stream).unwrap();

        let mut offsets: Vec<usize> = split_points.iter().map(|p| p % (stream.len() + 1)).collect();
        offsets.sort_unstable();
        offsets.dedup();

        let mut fragmented = framer();
        let mut fragmented_tokens = Vec::new();
        let mut prev = 0;
        for offset in offsets.into_iter().chain(std::iter::once(stream.len())) {
            if offset < prev {
                continue;
            }
            fragmented_tokens.extend(fragmented.add_and_parse(&stream[prev..offset]).unwrap());
            prev = offset;
        }

        prop_assert_eq!(&whole_tokens, &fragmented_tokens);
    }

    #[test]
    fn one_byte_at_a_time_recovers_every_frame(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..8),
    ) {
        let mut stream = b"in".to_vec();
        for payload in &payloads {
            stream.extend_from_slice(&dilation_proto::encode_frame_to_vec(payload).unwrap());
        }

        let mut f = framer();
        let mut frames = Vec::new();
        for byte in &stream {
            for token in f.add_and_parse(std::slice::from_ref(byte)).unwrap() {
                if let FramerToken::Frame(payload) = token {
                    frames.push(payload.to_vec());
                }
            }
        }

        prop_assert_eq!(frames, payloads);
    }
}
