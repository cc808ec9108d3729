//! Property-based tests for message reassembly and decoding.
//!
//! These tests use proptest to split payloads at arbitrary points and check
//! that reassembly never loses, reorders or invents bytes.

use proptest::prelude::*;
use wsession::protocol::{Assembled, MessageAssembler, Received};
use wsession::{CloseCode, Limits, Message, MessageKind};

fn kind_strategy() -> impl Strategy<Value = MessageKind> {
    prop_oneof![Just(MessageKind::Text), Just(MessageKind::Binary)]
}

/// Cut `payload` at the given offsets into consecutive fragments.
fn split_at_points(payload: &[u8], mut points: Vec<usize>) -> Vec<&[u8]> {
    points.iter_mut().for_each(|p| *p %= payload.len() + 1);
    points.sort_unstable();
    points.dedup();

    let mut fragments = Vec::new();
    let mut start = 0;
    for point in points {
        fragments.push(&payload[start..point]);
        start = point;
    }
    fragments.push(&payload[start..]);
    fragments
}

fn assemble(
    assembler: &mut MessageAssembler,
    kind: MessageKind,
    fragments: &[&[u8]],
) -> Vec<Message> {
    let mut out = Vec::new();
    let last = fragments.len() - 1;
    for (i, fragment) in fragments.iter().enumerate() {
        let received = Received::fragment(fragment.len(), kind, i == last);
        match assembler.push(received, fragment).unwrap() {
            Assembled::Message(message) => out.push(message),
            Assembled::Pending => {}
            Assembled::Close(_) => unreachable!("no close was pushed"),
        }
    }
    out
}

proptest! {
    // =========================================================================
    // Property 1: Reassembled payload equals the concatenation of fragments
    // =========================================================================
    #[test]
    fn test_reassembly_is_concatenation(
        kind in kind_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..4096),
        points in prop::collection::vec(any::<usize>(), 0..16)
    ) {
        let fragments = split_at_points(&payload, points);
        let mut assembler = MessageAssembler::new(Limits::default());

        let messages = assemble(&mut assembler, kind, &fragments);

        prop_assert_eq!(messages.len(), 1);
        prop_assert_eq!(messages[0].kind(), kind);
        prop_assert_eq!(messages[0].payload(), payload.as_slice());
        prop_assert!(!assembler.is_assembling());
    }

    // =========================================================================
    // Property 2: Consecutive messages never bleed into each other
    // =========================================================================
    #[test]
    fn test_consecutive_messages_are_independent(
        first in prop::collection::vec(any::<u8>(), 0..512),
        second in prop::collection::vec(any::<u8>(), 0..512),
        first_points in prop::collection::vec(any::<usize>(), 0..8),
        second_points in prop::collection::vec(any::<usize>(), 0..8)
    ) {
        let mut assembler = MessageAssembler::new(Limits::default());

        let first_fragments = split_at_points(&first, first_points);
        let second_fragments = split_at_points(&second, second_points);

        let a = assemble(&mut assembler, MessageKind::Binary, &first_fragments);
        let b = assemble(&mut assembler, MessageKind::Text, &second_fragments);

        prop_assert_eq!(a[0].payload(), first.as_slice());
        prop_assert_eq!(b[0].payload(), second.as_slice());
        prop_assert_eq!(b[0].kind(), MessageKind::Text);
    }

    // =========================================================================
    // Property 3: The size cap triggers exactly when the total exceeds it
    // =========================================================================
    #[test]
    fn test_size_limit_boundary(
        payload in prop::collection::vec(any::<u8>(), 1..1024),
        max in 0usize..1024,
        points in prop::collection::vec(any::<usize>(), 0..8)
    ) {
        let fragments = split_at_points(&payload, points);
        let mut assembler = MessageAssembler::new(Limits::new(max));
        let last = fragments.len() - 1;

        let mut failed = false;
        for (i, fragment) in fragments.iter().enumerate() {
            let received = Received::fragment(fragment.len(), MessageKind::Binary, i == last);
            if assembler.push(received, fragment).is_err() {
                failed = true;
                break;
            }
        }

        prop_assert_eq!(failed, payload.len() > max);
        if failed {
            prop_assert_eq!(assembler.buffered(), 0);
        }
    }

    // =========================================================================
    // Property 4: Text view is total and matches lossy UTF-8 decoding
    // =========================================================================
    #[test]
    fn test_text_view_is_lossy_decoding(payload in prop::collection::vec(any::<u8>(), 0..1024)) {
        let message = Message::new(MessageKind::Text, payload.clone());
        let expected = String::from_utf8_lossy(&payload).into_owned();

        prop_assert_eq!(message.as_text(), Some(expected.as_str()));
        prop_assert_eq!(message.payload(), payload.as_slice());
    }

    #[test]
    fn test_valid_utf8_text_is_unchanged(text in ".{0,256}") {
        let message = Message::text(text.clone());
        prop_assert_eq!(message.as_text(), Some(text.as_str()));
    }

    // =========================================================================
    // Property 5: Every wire close code maps to a code that reports it back
    // =========================================================================
    #[test]
    fn test_close_code_preserves_value(code in any::<u16>()) {
        let mapped = CloseCode::from_u16(code);
        prop_assert_eq!(mapped.as_u16(), code);
        prop_assert_eq!(mapped.is_unknown(), !matches!(code, 1000..=1011 | 1015));
    }
}
