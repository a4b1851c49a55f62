//! Embedded records, unions, buffers and sequences.

use binrec::{
    list, ByteOrder, DependencyError, Field, RecordError, RecordType, ValidationError, Value,
};
use std::sync::Arc;

fn my_word() -> Arc<RecordType> {
    RecordType::builder("MyWord")
        .byte_order(ByteOrder::LittleEndian)
        .field("a", Field::u16())
        .build()
        .expect("MyWord")
}

/// Unions keyed by integers, strings and a nested union selecting an embedded record.
fn onion(word: &Arc<RecordType>) -> Arc<RecordType> {
    RecordType::builder("Onion")
        .byte_order(ByteOrder::BigEndian)
        .field("a", Field::i8())
        .field(
            "b",
            Field::union(
                "a",
                [
                    (-10i8, Field::string(4)),
                    (-3, Field::bool()),
                    (1, Field::u32()),
                    (2, Field::i32()),
                ],
            ),
        )
        .field("c", Field::u8())
        .field(
            "d",
            Field::union(
                "b",
                [
                    (Value::from("ab"), Field::array(Field::i16(), 3)),
                    (Value::from("c"), Field::char().with_default('z')),
                    (
                        Value::from(400u32),
                        Field::union("c", [(1u8, Field::record(word))]),
                    ),
                ],
            ),
        )
        .build()
        .expect("Onion")
}

#[test]
fn test_union_keyed_by_string() {
    let word = my_word();
    let ty = onion(&word);
    let r = ty
        .create([
            ("a", Value::from(-10i8)),
            ("b", Value::from("ab")),
            ("c", Value::from(0xffu8)),
            ("d", list([1i16, 2, 3])),
        ])
        .expect("create");
    let bytes = b"\xf6ab\x00\x00\xff\x00\x01\x00\x02\x00\x03";
    assert_eq!(r.pack().expect("pack"), bytes);
    assert_eq!(r.len().expect("len"), bytes.len());
    assert_eq!(ty.unpack(bytes).expect("unpack"), r);
}

#[test]
fn test_union_char_option_ignores_default() {
    let word = my_word();
    let ty = onion(&word);
    let mut r = ty
        .create([
            ("a", Value::from(-10i8)),
            ("b", Value::from("c")),
            ("c", Value::from(0u8)),
        ])
        .expect("create");
    assert_eq!(r.get("d"), None);
    r.set("d", 'a').expect("d");
    assert_eq!(r.pack().expect("pack"), b"\xf6c\x00\x00\x00\x00a");
}

#[test]
fn test_nested_union_selects_embedded_record() {
    let word = my_word();
    let ty = onion(&word);
    let inner = word.create([("a", 2u16)]).expect("word");
    let r = ty
        .create([
            ("a", Value::from(1i8)),
            ("b", Value::from(400u32)),
            ("c", Value::from(1u8)),
            ("d", Value::from(inner)),
        ])
        .expect("create");
    let bytes = b"\x01\x00\x00\x01\x90\x01\x02\x00";
    assert_eq!(r.pack().expect("pack"), bytes);
    assert_eq!(r.len().expect("len"), bytes.len());
    assert_eq!(ty.unpack(bytes).expect("unpack"), r);
}

#[test]
fn test_union_introspection_and_static_len() {
    let word = my_word();
    let ty = onion(&word);
    let b = ty.field("b").expect("b");
    assert_eq!(b.option(1i8).and_then(|f| f.max()), Some(i128::from(u32::MAX)));
    assert_eq!(b.option(2i8).and_then(|f| f.min()), Some(i128::from(i32::MIN)));
    assert!(b.option(7i8).is_none());

    let d = ty.field("d").expect("d");
    let ab = d.option("ab").and_then(|f| f.base()).expect("ab base");
    assert_eq!(ab.min(), Some(-32768));
    assert_eq!(ab.byte_order(), ByteOrder::BigEndian);
    let embedded = d
        .option(400u32)
        .and_then(|f| f.option(1u8))
        .and_then(|f| f.record_type())
        .expect("embedded");
    assert!(Arc::ptr_eq(embedded, &word));

    assert!(matches!(
        ty.static_len(),
        Err(RecordError::IndeterminateLength { .. })
    ));
}

#[test]
fn test_union_selector_errors() {
    let word = my_word();
    let ty = onion(&word);
    let mut r = ty.instance().expect("instance");

    match r.set("b", 0u32) {
        Err(RecordError::UnresolvedDependency(DependencyError::Unset { field, reference })) => {
            assert_eq!(field, "Onion.b");
            assert_eq!(reference, "a");
        }
        other => panic!("expected unset selector, got {:?}", other),
    }

    r.set("a", 0i8).expect("a");
    match r.set("b", 0u32) {
        Err(RecordError::InvalidDependencyValue { reference, value, .. }) => {
            assert_eq!(reference, "a");
            assert_eq!(value, Value::Int(0));
        }
        other => panic!("expected invalid selector, got {:?}", other),
    }

    r.set("a", -10i8).expect("a");
    assert!(matches!(
        r.set("b", 4u32),
        Err(RecordError::Validation(ValidationError::TypeMismatch { .. }))
    ));
    assert!(matches!(
        r.set("b", "sadfsadfsadf"),
        Err(RecordError::Validation(ValidationError::LengthViolation { .. }))
    ));
}

#[test]
fn test_union_selector_change_is_seen_at_pack() {
    let ty = RecordType::builder("Switch")
        .byte_order(ByteOrder::BigEndian)
        .field("s", Field::u8())
        .field("v", Field::union("s", [(1u8, Field::u8()), (2u8, Field::u16())]))
        .build()
        .expect("build");
    let mut r = ty.create([("s", 1u8), ("v", 5u8)]).expect("create");
    assert_eq!(r.pack().expect("pack"), b"\x01\x05");
    r.set("s", 2u8).expect("s");
    assert_eq!(r.pack().expect("pack"), b"\x02\x00\x05");
    r.set("s", 3u8).expect("s");
    assert!(matches!(
        r.pack(),
        Err(RecordError::InvalidDependencyValue { .. })
    ));
    r.clear("s").expect("clear");
    assert!(matches!(
        r.len(),
        Err(RecordError::UnresolvedDependency(DependencyError::Unset { .. }))
    ));
}

#[test]
fn test_reference_outside_record() {
    let ty = RecordType::builder("JustWrong")
        .byte_order(ByteOrder::BigEndian)
        .field("data", Field::union("x", [(1u8, Field::u32())]))
        .field("blob", Field::buffer("x"))
        .build()
        .expect("build");
    let mut r = ty.instance().expect("instance");
    for name in ["data", "blob"] {
        assert!(matches!(
            r.set(name, 2u32),
            Err(RecordError::UnresolvedDependency(
                DependencyError::NotInRecord { .. }
            ))
        ));
    }
}

fn boo() -> Arc<RecordType> {
    RecordType::builder("Boo")
        .byte_order(ByteOrder::Network)
        .field("a", Field::i8())
        .field("b", Field::u8())
        .field("c", Field::buffer("a"))
        .build()
        .expect("Boo")
}

#[test]
fn test_buffer_round_trip() {
    let ty = boo();
    let r = ty
        .create([
            ("a", Value::from(4i8)),
            ("b", Value::from(2u8)),
            ("c", Value::from(b"\x00a\x00b")),
        ])
        .expect("create");
    assert_eq!(r.pack().expect("pack"), b"\x04\x02\x00a\x00b");
    assert_eq!(r.len().expect("len"), 6);
    assert_eq!(ty.unpack(b"\x04\x02\x00a\x00b").expect("unpack"), r);
}

#[test]
fn test_buffer_assignment_checks_current_length() {
    let ty = boo();
    let mut r = ty
        .create([
            ("a", Value::from(4i8)),
            ("b", Value::from(2u8)),
            ("c", Value::from(b"abcd")),
        ])
        .expect("create");
    assert!(matches!(
        r.set("c", list([4u8, 4, 4, 4])),
        Err(RecordError::Validation(ValidationError::TypeMismatch { .. }))
    ));
    assert!(matches!(
        r.set("c", b"abcde"),
        Err(RecordError::Validation(ValidationError::LengthViolation { .. }))
    ));
    r.set("a", 2i8).expect("a");
    assert!(r.set("c", b"abcd").is_err());
    r.set("c", b"ab").expect("fits");
    assert_eq!(r.pack().expect("pack"), b"\x02\x02ab");
}

#[test]
fn test_buffer_fails_late_on_stale_length() {
    let ty = boo();
    let mut r = ty
        .create([
            ("a", Value::from(4i8)),
            ("b", Value::from(0u8)),
            ("c", Value::from(b"abcd")),
        ])
        .expect("create");
    r.set("a", 2i8).expect("shrinking the length is allowed");
    assert!(matches!(
        r.pack(),
        Err(RecordError::Validation(ValidationError::LengthViolation { len: 4, .. }))
    ));
    assert!(r.validate().is_err());

    // A longer length zero-fills the remainder.
    r.set("a", 6i8).expect("a");
    assert_eq!(r.pack().expect("pack"), b"\x06\x00abcd\x00\x00");
    assert_eq!(r.len().expect("len"), 8);
}

#[test]
fn test_buffer_length_errors() {
    let ty = boo();
    let mut r = ty.instance().expect("instance");
    assert!(matches!(
        r.set("c", b"a"),
        Err(RecordError::UnresolvedDependency(DependencyError::Unset { .. }))
    ));
    r.set("a", -1i8).expect("a");
    assert!(matches!(
        r.set("c", b"a"),
        Err(RecordError::InvalidDependencyValue { .. })
    ));
    assert!(matches!(
        ty.unpack(b"\xff\x00"),
        Err(RecordError::InvalidDependencyValue { .. })
    ));
}

#[test]
fn test_sequence_is_count_prefixed() {
    let ty = RecordType::builder("Seq")
        .byte_order(ByteOrder::BigEndian)
        .field("items", Field::sequence(Field::u16()))
        .field("tail", Field::u8())
        .build()
        .expect("build");
    let mut r = ty.instance().expect("instance");
    r.set("items", list([1u16, 2])).expect("items");
    r.set("tail", 9u8).expect("tail");
    let bytes = b"\x00\x02\x00\x01\x00\x02\x09";
    assert_eq!(r.pack().expect("pack"), bytes);
    assert_eq!(r.len().expect("len"), 7);
    assert_eq!(ty.unpack(bytes).expect("unpack"), r);

    r.set("items", list::<u16>([])).expect("empty");
    assert_eq!(r.pack().expect("pack"), b"\x00\x00\x09");
    assert!(r.set("items", list([70000u32])).is_err());
}

#[test]
fn test_sequence_of_embedded_records() {
    let word = my_word();
    let ty = RecordType::builder("Words")
        .byte_order(ByteOrder::LittleEndian)
        .field("words", Field::sequence(Field::record(&word)))
        .build()
        .expect("build");
    let items: Vec<Value> = (1u16..=3)
        .map(|a| word.create([("a", a)]).map(Value::from))
        .collect::<binrec::Result<_>>()
        .expect("words");
    let r = ty.create([("words", Value::List(items))]).expect("create");
    let bytes = b"\x03\x00\x01\x00\x02\x00\x03\x00";
    assert_eq!(r.pack().expect("pack"), bytes);
    assert_eq!(ty.unpack(bytes).expect("unpack"), r);
    assert!(matches!(
        ty.unpack(b"\x03\x00\x01\x00"),
        Err(RecordError::TruncatedInput { .. })
    ));
}

#[test]
fn test_array_of_sequences_packs_element_wise() {
    let ty = RecordType::builder("Grid")
        .byte_order(ByteOrder::LittleEndian)
        .field("rows", Field::array(Field::sequence(Field::u8()), 2))
        .build()
        .expect("build");
    let rows = Value::List(vec![list([1u8]), list([2u8, 3])]);
    let r = ty.create([("rows", rows)]).expect("create");
    let bytes = b"\x01\x00\x01\x02\x00\x02\x03";
    assert_eq!(r.pack().expect("pack"), bytes);
    assert_eq!(r.len().expect("len"), 7);
    assert_eq!(ty.unpack(bytes).expect("unpack"), r);
}

#[test]
fn test_embedded_record_keeps_its_byte_order() {
    let word = my_word();
    let ty = RecordType::builder("Outer")
        .byte_order(ByteOrder::BigEndian)
        .field("head", Field::u16())
        .field("inner", Field::record(&word))
        .build()
        .expect("build");
    assert_eq!(ty.static_len().expect("len"), 4);
    let inner = word.create([("a", 1u16)]).expect("inner");
    let r = ty
        .create([("head", Value::from(1u16)), ("inner", Value::from(inner))])
        .expect("create");
    assert_eq!(r.pack().expect("pack"), b"\x00\x01\x01\x00");
    assert_eq!(ty.unpack(b"\x00\x01\x01\x00").expect("unpack"), r);
}

#[test]
fn test_embedded_record_type_is_checked() {
    let word = my_word();
    let other = RecordType::builder("MyWord")
        .byte_order(ByteOrder::LittleEndian)
        .field("a", Field::u16())
        .build()
        .expect("other");
    let ty = RecordType::builder("Outer")
        .byte_order(ByteOrder::LittleEndian)
        .field("inner", Field::record(&word))
        .build()
        .expect("build");
    let mut r = ty.instance().expect("instance");
    let stranger = other.create([("a", 1u16)]).expect("stranger");
    assert!(matches!(
        r.set("inner", stranger),
        Err(RecordError::Validation(ValidationError::TypeMismatch { .. }))
    ));
    assert!(r.set("inner", 1u16).is_err());

    // Incomplete embedded values are accepted on assignment and fail at pack.
    r.set("inner", word.instance().expect("blank")).expect("inner");
    assert_eq!(
        r.pack().unwrap_err().to_string(),
        "Validation: MyWord.a has no value"
    );
}
