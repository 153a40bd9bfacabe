use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::conversions::{from_unsigned, to_unsigned, DataFormat};
use crate::memory::{Memory, MemoryDeserializationError};
use crate::value::MemoryValue;

fn fmt() -> DataFormat {
    DataFormat::default()
}

#[test]
fn write_then_read_round_trips() {
    let mut memory = Memory::new(64, 8);
    let value = from_unsigned(0x0000_0489, 32, &fmt());
    memory.put(0, &value);
    assert_eq!(memory.get(0, 4), value);
}

#[test]
fn cellwise_reads_slice_the_block_read() {
    let mut memory = Memory::new(64, 8);
    let value = from_unsigned(0xdead_beef, 32, &fmt());
    memory.put(8, &value);
    let block = memory.get(8, 4);
    for i in 0..4 {
        assert_eq!(block.subset(i * 8, (i + 1) * 8), memory.get(8 + i, 1));
    }
}

#[test]
fn reads_past_the_end_are_zero_padded() {
    let mut memory = Memory::new(4, 8);
    memory.put(3, &from_unsigned(0xaa, 8, &fmt()));
    let value = memory.get(3, 2);
    assert_eq!(value.size(), 16);
    assert_eq!(to_unsigned(&value, &fmt()), 0xaa);
}

#[test]
fn writes_past_the_end_are_clipped() {
    let mut memory = Memory::new(4, 8);
    memory.put(3, &from_unsigned(0xbbaa, 16, &fmt()));
    assert_eq!(to_unsigned(&memory.get(3, 1), &fmt()), 0xaa);
    // Nothing outside the memory, nothing wrapped around.
    assert_eq!(to_unsigned(&memory.get(0, 3), &fmt()), 0);
}

#[test]
fn writes_entirely_outside_are_dropped() {
    let mut memory = Memory::new(4, 8);
    memory.put(9, &from_unsigned(0xff, 8, &fmt()));
    assert!(memory.get(0, 4).is_zero());
}

#[test]
fn set_returns_the_previous_value() {
    let mut memory = Memory::new(8, 8);
    let old = from_unsigned(0x11, 8, &fmt());
    let new = from_unsigned(0x22, 8, &fmt());
    memory.put(2, &old);
    assert_eq!(memory.set(2, &new), old);
    assert_eq!(memory.get(2, 1), new);
}

#[test]
fn mutations_fire_the_change_callback() {
    let mut memory = Memory::new(16, 8);
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    memory.set_callback(move |address, amount| {
        assert_eq!(address, 4);
        assert_eq!(amount, 2);
        seen.fetch_add(1, Ordering::SeqCst);
    });
    memory.put(4, &MemoryValue::new(16));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn json_round_trip() {
    let mut memory = Memory::new(200, 8);
    memory.put(0, &from_unsigned(0x12, 8, &fmt()));
    memory.put(130, &from_unsigned(0xfe, 8, &fmt()));
    let snapshot = memory.serialize_json();

    let mut restored = Memory::new(200, 8);
    restored.deserialize_json(&snapshot).unwrap();
    assert_eq!(restored.get(0, 1), memory.get(0, 1));
    assert_eq!(restored.get(130, 1), memory.get(130, 1));
    assert!(restored.get(1, 64).is_zero());
}

#[test]
fn json_omits_all_zero_lines() {
    let memory = Memory::new(256, 8);
    let snapshot = memory.serialize_json();
    let object = snapshot.as_object().unwrap();
    assert!(object.keys().all(|key| !key.starts_with("memory_line")));
}

#[test]
fn json_geometry_mismatch_is_an_error() {
    let memory = Memory::new(64, 8);
    let snapshot = memory.serialize_json();

    let mut smaller = Memory::new(32, 8);
    match smaller.deserialize_json(&snapshot) {
        Err(MemoryDeserializationError::ByteCountMismatch { expected, found }) => {
            assert_eq!(expected, 32);
            assert_eq!(found, 64);
        }
        other => panic!("expected a byte count mismatch, got {:?}", other),
    }
}
