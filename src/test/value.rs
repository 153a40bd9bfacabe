use crate::value::MemoryValue;

#[test]
fn new_value_is_zero() {
    let value = MemoryValue::new(12);
    assert_eq!(value.size(), 12);
    assert!(value.is_zero());
    assert!((0..12).all(|i| !value.get(i)));
}

#[test]
fn put_get_set() {
    let mut value = MemoryValue::new(9);
    value.put(8, true);
    assert!(value.get(8));
    assert!(!value.set(8, false));

    let previous = value.set(8, true);
    assert!(!previous);
    assert!(value.get(8));
}

#[test]
fn subset_of_full_range_is_identity() {
    let mut value = MemoryValue::new(21);
    for i in &[0, 3, 7, 20] {
        value.put(*i, true);
    }
    assert_eq!(value.subset(0, value.size()), value);
}

#[test]
fn subset_extracts_window() {
    let mut value = MemoryValue::new(16);
    value.put(4, true);
    value.put(6, true);
    let window = value.subset(4, 8);
    assert_eq!(window.size(), 4);
    assert!(window.get(0));
    assert!(!window.get(1));
    assert!(window.get(2));
    assert!(!window.get(3));
}

#[test]
fn subset_with_stride_pads_to_stride() {
    let mut value = MemoryValue::new(16);
    value.put(2, true);
    let padded = value.subset_with_stride(0, 5, 8);
    assert_eq!(padded.size(), 8);
    assert!(padded.get(2));
    assert!(!padded.get(5));
}

#[test]
fn write_then_subset_round_trips() {
    let mut outer = MemoryValue::new(32);
    let mut inner = MemoryValue::new(10);
    inner.put(0, true);
    inner.put(9, true);
    outer.write(&inner, 13);
    assert_eq!(outer.subset(13, 23), inner);
}

#[test]
#[should_panic]
fn write_past_end_panics() {
    let mut outer = MemoryValue::new(8);
    let inner = MemoryValue::new(4);
    outer.write(&inner, 5);
}

#[test]
fn byte_at_pads_with_zero_past_the_end() {
    let mut value = MemoryValue::new(12);
    value.put(8, true);
    value.put(11, true);
    assert_eq!(value.byte_at(8), 0b1001);
    assert_eq!(value.byte_at(0), 0);
}

#[test]
fn from_bytes_masks_superfluous_bits() {
    let value = MemoryValue::from_bytes(&[0xff, 0xff], 12);
    assert_eq!(value.data(), &[0xff, 0x0f]);
    assert!((0..12).all(|i| value.get(i)));
}

#[test]
fn equality_considers_length_and_content() {
    let a = MemoryValue::new(8);
    let b = MemoryValue::new(9);
    assert_ne!(a, b);

    let mut c = MemoryValue::new(8);
    assert_eq!(a, c);
    c.put(3, true);
    assert_ne!(a, c);
}

#[test]
fn display_renders_most_significant_first() {
    let mut value = MemoryValue::new(4);
    value.put(0, true);
    assert_eq!(value.to_string(), "0001");
}
