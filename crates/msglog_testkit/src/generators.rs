//! Property-based test generators using proptest.
//!
//! Provides strategies for generating varints, headers and push batches.

use msglog_core::Msg;
use proptest::prelude::*;

/// Strategy for varint values, biased toward the width boundaries.
pub fn varint_value_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        any::<u64>(),
        0u64..=0x7F,
        (0u32..8).prop_map(|k| 1u64 << (8 * k)),
        (1u32..=8).prop_map(|k| if k == 8 { u64::MAX } else { (1u64 << (8 * k)) - 1 }),
    ]
}

/// Strategy for arbitrary record headers.
pub fn msg_strategy() -> impl Strategy<Value = Msg> {
    (
        varint_value_strategy(),
        varint_value_strategy(),
        varint_value_strategy(),
        varint_value_strategy(),
        varint_value_strategy(),
        varint_value_strategy(),
        varint_value_strategy(),
    )
        .prop_map(|(seq, time, from, pos, prev_pos, id, length)| Msg {
            seq,
            time,
            from,
            pos,
            prev_pos,
            id,
            length,
        })
}

/// Strategy for payloads up to `max_len` bytes, empty included.
pub fn payload_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// One push: source id, message id and payload.
pub type PushOp = (u64, u64, Vec<u8>);

/// Strategy for a batch of pushes.
pub fn push_batch_strategy(max_pushes: usize, max_payload: usize) -> impl Strategy<Value = Vec<PushOp>> {
    prop::collection::vec(
        (any::<u64>(), any::<u64>(), payload_strategy(max_payload)),
        0..=max_pushes,
    )
}
