#![no_main]

use flowsocket::frame::{decode_frame, DecodeOutcome, Role};
use libfuzzer_sys::fuzz_target;

const MAX_BUFFER_LENGTH: usize = 64 * 1024;

// Decoding arbitrary bytes as both a server (expects masked client frames)
// and a client (expects unmasked server frames) must never panic, and a
// `Frame` outcome must never consume more bytes than were in the buffer.
fuzz_target!(|data: &[u8]| {
    for role in [Role::Server, Role::Client] {
        if let Ok(DecodeOutcome::Frame { consumed, .. }) = decode_frame(data, role, MAX_BUFFER_LENGTH) {
            assert!(consumed <= data.len());
        }
    }
});
