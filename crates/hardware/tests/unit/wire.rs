//! Frame Codec Tests.
//!
//! Every message on a link is one fixed-size frame of padded JSON. Oversized
//! messages and frames of the wrong length are errors, never split or truncated.

use nebula_core::common::WireError;
use nebula_core::common::constants::MESSAGE_SIZE;
use nebula_core::sim::message::{Control, Envelope, Event, FetchCmd, Message, Tick};
use nebula_core::sim::wire;
use pretty_assertions::assert_eq;

fn tick() -> Message {
    Message::Tick(Tick {
        cycle: 7,
        results: Vec::new(),
        events: vec![Envelope::new(7, Some(0), Event::Fetch(FetchCmd::Get { addr: 0x1000 }))],
        snapshot: None,
    })
}

// ══════════════════════════════════════════════════════════
// 1. Framing
// ══════════════════════════════════════════════════════════

#[test]
fn frames_are_padded_to_the_message_size() {
    let frame = wire::encode(&Message::Text(Control::Pause)).unwrap();
    assert_eq!(frame.len(), MESSAGE_SIZE);
    assert!(frame.starts_with(br#"{"text":"pause"}"#));
    assert!(frame[16..].iter().all(|&b| b == b' '), "the tail is spaces");
}

#[test]
fn tick_survives_a_frame() {
    let msg = tick();
    let frame = wire::encode(&msg).unwrap();
    assert_eq!(wire::decode(&frame).unwrap(), msg);
}

// ══════════════════════════════════════════════════════════
// 2. Rejections
// ══════════════════════════════════════════════════════════

#[test]
fn oversized_message_is_rejected() {
    let msg = Message::Event(Envelope::new(
        3,
        Some(0),
        Event::Output {
            fd: 1,
            data: "x".repeat(20_000),
        },
    ));
    match wire::check(&msg) {
        Err(WireError::Oversize { len, cap }) => {
            assert!(len > cap);
            assert_eq!(cap, MESSAGE_SIZE);
        }
        other => panic!("expected Oversize, got {other:?}"),
    }
}

#[test]
fn short_frame_is_a_bad_length() {
    let frame = wire::encode(&tick()).unwrap();
    assert!(matches!(
        wire::decode(&frame[..100]),
        Err(WireError::BadLength(100))
    ));
}

#[test]
fn garbage_frame_is_malformed() {
    let mut frame = vec![b' '; MESSAGE_SIZE];
    frame[..5].copy_from_slice(b"{oops");
    assert!(matches!(wire::decode(&frame), Err(WireError::Malformed(_))));
}

#[test]
fn frame_with_two_messages_is_malformed() {
    let one = br#"{"text":"run"}"#;
    let mut frame = vec![b' '; MESSAGE_SIZE];
    frame[..one.len()].copy_from_slice(one);
    frame[one.len()..2 * one.len()].copy_from_slice(one);
    assert!(matches!(wire::decode(&frame), Err(WireError::Malformed(_))));
}
