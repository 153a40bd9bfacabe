use std::sync::{Arc, Mutex};

use crate::conversions::{from_unsigned, to_unsigned, DataFormat};
use crate::register_set::RegisterSet;
use crate::value::MemoryValue;

fn fmt() -> DataFormat {
    DataFormat::default()
}

#[test]
fn create_and_read_back() {
    let mut set = RegisterSet::new();
    set.create("r0", 32);
    assert!(set.exists("r0"));
    assert_eq!(set.size_of("r0"), 32);
    assert!(set.get("r0").is_zero());

    let value = from_unsigned(0xcafe, 32, &fmt());
    set.put("r0", &value);
    assert_eq!(set.get("r0"), value);
}

#[test]
fn alias_reads_the_parent_window() {
    let mut set = RegisterSet::new();
    set.create("r0", 32);
    set.alias("r0h", "r0", 16, 32, false);

    let value = from_unsigned(0x1234_5678, 32, &fmt());
    set.put("r0", &value);
    assert_eq!(set.get("r0h"), value.subset(16, 32));
    assert_eq!(to_unsigned(&set.get("r0h"), &fmt()), 0x1234);
}

#[test]
fn alias_writes_through_to_the_parent() {
    let mut set = RegisterSet::new();
    set.create("r0", 32);
    set.alias("r0l", "r0", 0, 16, false);
    set.put("r0l", &from_unsigned(0xbeef, 16, &fmt()));
    assert_eq!(to_unsigned(&set.get("r0"), &fmt()), 0xbeef);
}

#[test]
fn transitive_aliases_are_denormalized() {
    let mut set = RegisterSet::new();
    set.create("r0", 32);
    set.alias("high", "r0", 16, 32, false);
    set.alias("highest", "high", 8, 16, false);

    set.put("r0", &from_unsigned(0xab00_0000, 32, &fmt()));
    assert_eq!(to_unsigned(&set.get("highest"), &fmt()), 0xab);
}

#[test]
fn writes_to_constant_registers_are_dropped() {
    let mut set = RegisterSet::new();
    set.create_with_value("zero", MemoryValue::new(32), true);
    set.put("zero", &from_unsigned(99, 32, &fmt()));
    assert!(set.get("zero").is_zero());
}

#[test]
fn set_returns_the_previous_value() {
    let mut set = RegisterSet::new();
    set.create("r1", 8);
    let first = from_unsigned(1, 8, &fmt());
    let second = from_unsigned(2, 8, &fmt());
    set.put("r1", &first);
    assert_eq!(set.set("r1", &second), first);
    assert_eq!(set.get("r1"), second);
}

#[test]
fn writes_notify_every_non_silent_name_of_the_root() {
    let mut set = RegisterSet::new();
    let notified: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notified);
    set.set_callback(move |name| sink.lock().unwrap().push(name.to_owned()));

    set.create("r0", 32);
    set.alias("r0l", "r0", 0, 16, false);
    set.alias("shadow", "r0", 0, 32, true);

    notified.lock().unwrap().clear();
    set.put("r0l", &MemoryValue::new(16));

    let seen = notified.lock().unwrap().clone();
    assert!(seen.contains(&"r0".to_owned()));
    assert!(seen.contains(&"r0l".to_owned()));
    assert!(!seen.contains(&"shadow".to_owned()));
}

#[test]
fn equality_considers_top_level_registers() {
    let mut a = RegisterSet::new();
    a.create("r0", 16);
    let mut b = RegisterSet::new();
    b.create("r0", 16);
    assert!(a == b);

    b.put("r0", &from_unsigned(7, 16, &fmt()));
    assert!(a != b);
}

#[test]
fn json_round_trip() {
    let mut set = RegisterSet::new();
    set.create("r0", 32);
    set.create("r1", 32);
    set.put("r0", &from_unsigned(0x1234, 32, &fmt()));

    let snapshot = set.serialize_json();
    let mut restored = RegisterSet::new();
    restored.create("r0", 32);
    restored.create("r1", 32);
    restored.deserialize_json(&snapshot).unwrap();
    assert!(set == restored);
}
