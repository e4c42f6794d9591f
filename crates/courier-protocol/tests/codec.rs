//! Codec behaviour over realistic client transcripts.

use courier_protocol::{Command, Frame, FrameDecoder, encode};

/// Feeds `bytes` in chunks of `chunk` bytes, like a socket would.
fn decode_chunked(bytes: &[u8], chunk: usize) -> Vec<Frame> {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for piece in bytes.chunks(chunk) {
        frames.extend(decoder.decode(piece).expect("should decode"));
    }
    assert_eq!(decoder.pending(), 0, "no leftover bytes");
    frames
}

#[test]
fn test_round_trip_preserves_command_headers_and_body() {
    let frames = vec![
        Frame::new(Command::Connect)
            .with_header("accept-version", "1.2")
            .with_header("host", "stomp.example")
            .with_header("login", "alice")
            .with_header("passcode", "123"),
        Frame::new(Command::Send)
            .with_header("destination", "/topic/germany_spain")
            .with_header("file-name", "events1.json")
            .with_body(
                "user: alice\nteam a: germany\nevent name: goal!!!!\n\
                 description:\nheader:looking\n\nsecond paragraph",
            ),
        Frame::new(Command::Unknown("ABORT".into()))
            .with_header("transaction", "tx1"),
        Frame::new(Command::Disconnect).with_header("receipt", "77"),
    ];

    let mut wire = Vec::new();
    for frame in &frames {
        wire.extend(encode(frame));
    }

    for chunk in [1, 3, 64, wire.len()] {
        assert_eq!(decode_chunked(&wire, chunk), frames, "chunk={chunk}");
    }
}

#[test]
fn test_keepalive_filler_between_frames_is_ignored() {
    let wire = b"\n\0SUBSCRIBE\ndestination:/a\nid:1\n\n\0\0\n\0";
    let frames = decode_chunked(wire, 5);

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].command(), &Command::Subscribe);
}

#[test]
fn test_header_set_survives_round_trip_regardless_of_duplicates() {
    // A raw frame repeating a header decodes with the last value, and
    // that decoded frame re-encodes to a single header line.
    let wire = b"SEND\ndestination:/a\ndestination:/b\n\nbody\0";
    let frames = decode_chunked(wire, 4);
    assert_eq!(frames[0].header("destination"), Some("/b"));

    let reencoded = encode(&frames[0]);
    assert_eq!(reencoded, b"SEND\ndestination:/b\n\nbody\0");
}
