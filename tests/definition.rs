//! Record definition: inheritance, byte-order policy, defaults, definition errors and the
//! `record_type!` macro.

use binrec::{list, record_type, ByteOrder, DefinitionError, Field, RecordError, RecordType, Value};
use std::sync::Arc;

fn definition_error(result: binrec::Result<Arc<RecordType>>) -> DefinitionError {
    match result {
        Err(RecordError::Definition(e)) => e,
        other => panic!("expected a definition error, got {:?}", other),
    }
}

struct Family {
    base2: Arc<RecordType>,
    derived: Arc<RecordType>,
}

fn family() -> Family {
    let base1 = RecordType::builder("Base1")
        .byte_order(ByteOrder::BigEndian)
        .field("x", Field::ulong())
        .field("a", Field::char())
        .field("e", Field::u8().with_default(5u8))
        .build()
        .expect("Base1");
    let base2 = RecordType::builder("Base2")
        .extends(&base1)
        .field("y", Field::long())
        .field("b", Field::pad())
        .build()
        .expect("Base2");
    let base3 = RecordType::builder("Base3")
        .extends(&base2)
        .field("w", Field::string(4))
        .field("d", Field::record(&base2))
        .build()
        .expect("Base3");
    let derived = RecordType::builder("Derived")
        .byte_order(ByteOrder::BigEndian)
        .extends(&base3)
        .field("z", Field::bool())
        .field("c", Field::array(Field::i16(), 2))
        .build()
        .expect("Derived");
    Family { base2, derived }
}

#[test]
fn test_inheritance_layout() {
    let Family { base2, derived } = family();
    assert_eq!(derived.byte_order(), Some(ByteOrder::BigEndian));
    let names: Vec<&str> = derived.fields().iter().map(|f| f.name()).collect();
    assert_eq!(names, ["x", "a", "e", "y", "b", "w", "d", "z", "c"]);
    assert_eq!(base2.static_len().expect("len"), 11);
    assert_eq!(derived.static_len().expect("len"), 31);

    let inner = base2
        .create([
            ("x", Value::from(3u32)),
            ("a", Value::from('b')),
            ("y", Value::from(4i32)),
        ])
        .expect("inner");
    let inner_bytes = b"\x00\x00\x00\x03b\x05\x00\x00\x00\x04\x00";
    assert_eq!(inner.pack().expect("inner pack"), inner_bytes);

    let obj = derived
        .create([
            ("x", Value::from(1u32)),
            ("a", Value::from('a')),
            ("y", Value::from(2i32)),
            ("w", Value::from("abcd")),
            ("d", Value::from(inner)),
            ("z", Value::from(true)),
            ("c", list([5i16, 6])),
        ])
        .expect("derived");
    let mut expected = b"\x00\x00\x00\x01a\x05\x00\x00\x00\x02\x00abcd".to_vec();
    expected.extend_from_slice(inner_bytes);
    expected.extend_from_slice(b"\x01\x00\x05\x00\x06");
    assert_eq!(obj.pack().expect("pack"), expected);
    assert_eq!(obj.len().expect("len"), 31);
    assert_eq!(derived.unpack(&expected).expect("unpack"), obj);
}

#[test]
fn test_derived_fields_are_stamped_with_inherited_order() {
    let Family { derived, .. } = family();
    for f in derived.fields() {
        assert_eq!(f.field().byte_order(), ByteOrder::BigEndian, "{}", f.name());
    }
    let c = derived.field("c").expect("c");
    assert_eq!(c.base().map(|b| b.byte_order()), Some(ByteOrder::BigEndian));
}

#[test]
fn test_base_fields_are_not_restamped() {
    let base = RecordType::builder("Base")
        .field("v", Field::u16())
        .build()
        .expect("base");
    assert_eq!(base.byte_order(), None);
    let little = RecordType::builder("Little")
        .byte_order(ByteOrder::LittleEndian)
        .extends(&base)
        .build()
        .expect("little");
    let big = RecordType::builder("Big")
        .byte_order(ByteOrder::BigEndian)
        .extends(&base)
        .build()
        .expect("big");
    let l = little.create([("v", 1u16)]).expect("l");
    let b = big.create([("v", 1u16)]).expect("b");
    assert_eq!(l.pack().expect("pack"), b"\x01\x00");
    assert_eq!(b.pack().expect("pack"), b"\x00\x01");
    assert_eq!(
        base.field("v").map(|f| f.byte_order()),
        Some(ByteOrder::default())
    );
}

#[test]
fn test_abstract_record_cannot_be_instantiated() {
    let base = RecordType::builder("Abstract")
        .field("v", Field::u8())
        .build()
        .expect("base");
    assert!(matches!(
        base.instance(),
        Err(RecordError::Definition(DefinitionError::MissingByteOrder(ref name))) if name == "Abstract"
    ));
    assert!(base.unpack(b"\x01").is_err());
}

#[test]
fn test_byte_order_conflict() {
    let base = RecordType::builder("Base")
        .byte_order(ByteOrder::BigEndian)
        .field("v", Field::u8())
        .build()
        .expect("base");
    let err = definition_error(
        RecordType::builder("Derived")
            .byte_order(ByteOrder::LittleEndian)
            .extends(&base)
            .build(),
    );
    assert_eq!(
        err,
        DefinitionError::ByteOrderConflict {
            record: "Derived".to_string(),
            order: ByteOrder::LittleEndian,
            base: "Base".to_string(),
            base_order: ByteOrder::BigEndian,
        }
    );
}

#[test]
fn test_duplicate_field_after_merge() {
    let base = RecordType::builder("Base")
        .byte_order(ByteOrder::BigEndian)
        .field("v", Field::u8())
        .build()
        .expect("base");
    let err = definition_error(
        RecordType::builder("Derived")
            .extends(&base)
            .field("v", Field::u16())
            .build(),
    );
    assert!(matches!(err, DefinitionError::DuplicateField { ref field, .. } if field == "v"));
}

#[test]
fn test_forward_reference_rejected() {
    let err = definition_error(
        RecordType::builder("Late")
            .byte_order(ByteOrder::BigEndian)
            .field("data", Field::buffer("len"))
            .field("len", Field::u8())
            .build(),
    );
    assert_eq!(
        err,
        DefinitionError::ForwardReference {
            field: "Late.data".to_string(),
            reference: "len".to_string(),
        }
    );

    let err = definition_error(
        RecordType::builder("SelfRef")
            .byte_order(ByteOrder::BigEndian)
            .field("u", Field::union("u", [(1u8, Field::u8())]))
            .build(),
    );
    assert!(matches!(err, DefinitionError::ForwardReference { .. }));
}

#[test]
fn test_unsupported_constructs() {
    let point = RecordType::builder("Point")
        .byte_order(ByteOrder::LittleEndian)
        .field("x", Field::u8())
        .build()
        .expect("point");
    let cases = [
        (Field::array(Field::array(Field::u8(), 2), 2), "multidimensional array"),
        (Field::array(Field::pad(), 2), "array of padding"),
        (Field::array(Field::string(3), 2), "array of strings"),
        (Field::array(Field::record(&point), 2), "array of embedded records"),
    ];
    for (field, expected) in cases {
        let err = definition_error(
            RecordType::builder("Bad")
                .byte_order(ByteOrder::LittleEndian)
                .field("f", field)
                .build(),
        );
        assert!(
            matches!(err, DefinitionError::Unsupported { construct, .. } if construct == expected),
            "{}",
            expected
        );
    }
}

#[test]
fn test_defaults_only_on_primitives() {
    let point = RecordType::builder("Point")
        .byte_order(ByteOrder::LittleEndian)
        .field("x", Field::u8())
        .build()
        .expect("point");
    let blank = point.instance().expect("blank");
    let err = definition_error(
        RecordType::builder("Embedded")
            .byte_order(ByteOrder::LittleEndian)
            .field("a", Field::record(&point).with_default(blank))
            .build(),
    );
    assert!(matches!(err, DefinitionError::DefaultNotSupported { .. }));

    let err = definition_error(
        RecordType::builder("Seq")
            .byte_order(ByteOrder::LittleEndian)
            .field("a", Field::sequence(Field::u8()).with_default(list([1u8])))
            .build(),
    );
    assert!(matches!(err, DefinitionError::DefaultNotSupported { .. }));
}

#[test]
fn test_invalid_default_rejected_at_build() {
    let err = definition_error(
        RecordType::builder("Bad")
            .byte_order(ByteOrder::LittleEndian)
            .field("a", Field::u8().with_default(256u16))
            .build(),
    );
    assert!(matches!(err, DefinitionError::InvalidDefault { ref field, .. } if field == "Bad.a"));
}

fn all_default() -> (Arc<RecordType>, Arc<RecordType>) {
    let point = RecordType::builder("Point")
        .byte_order(ByteOrder::LittleEndian)
        .field("x", Field::u16().with_default(2u16))
        .field("y", Field::u16().with_default(3u16))
        .build()
        .expect("Point");
    let all = RecordType::builder("AllDefault")
        .byte_order(ByteOrder::BigEndian)
        .field("a", Field::i16().with_default(-10i16))
        .field("b", Field::u16().with_default(20u16))
        .field("c", Field::bool().with_default(true))
        .field("d", Field::string(8).with_default("bla"))
        .field("e", Field::char().with_default('a'))
        .field("f", Field::array(Field::long(), 3).with_default(list([1i32, 2, 3])))
        .field("g", Field::record(&point))
        .build()
        .expect("AllDefault");
    (point, all)
}

#[test]
fn test_defaults_applied_at_construction() {
    let (point, all) = all_default();
    let obj = all
        .create([("g", point.instance().expect("point"))])
        .expect("create");
    let bytes = b"\xff\xf6\x00\x14\x01bla\x00\x00\x00\x00\x00a\
                  \x00\x00\x00\x01\x00\x00\x00\x02\x00\x00\x00\x03\x02\x00\x03\x00";
    assert_eq!(obj.pack().expect("pack"), bytes.as_slice());
    assert_eq!(all.unpack(bytes).expect("unpack"), obj);

    let defaults: Vec<(&str, &Value)> = all.defaults().collect();
    assert_eq!(defaults.len(), 6);
    assert_eq!(defaults[0], ("a", &Value::Int(-10)));
    assert_eq!(all.field("d").and_then(|f| f.default()), Some(&Value::from("bla")));
    assert_eq!(all.field("g").and_then(|f| f.default()), None);
    let g = all.field("g").and_then(|f| f.record_type()).expect("g");
    assert_eq!(g.field("y").and_then(|f| f.default()), Some(&Value::Int(3)));
}

#[test]
fn test_cleared_default_stays_cleared() {
    let (_, all) = all_default();
    let mut obj = all.instance().expect("instance");
    obj.set("a", 5i16).expect("a");
    assert_eq!(obj.get("a"), Some(&Value::Int(5)));
    obj.clear("a").expect("clear");
    assert_eq!(obj.get("a"), None);
    assert!(obj.pack().is_err());
    assert_eq!(
        all.instance().expect("fresh").get("a"),
        Some(&Value::Int(-10))
    );
}

#[test]
fn test_record_type_macro() {
    let point = record_type!(Point: LittleEndian {
        x: Field::u16(),
        y: Field::u16().with_default(7u16),
    })
    .expect("point");
    assert_eq!(point.name(), "Point");
    let p = point.create([("x", 1u16)]).expect("create");
    assert_eq!(p.pack().expect("pack"), b"\x01\x00\x07\x00");

    let point3 = record_type!(Point3 extends point => { z: Field::u16() }).expect("point3");
    assert_eq!(point3.byte_order(), Some(ByteOrder::LittleEndian));
    assert_eq!(point3.static_len().expect("len"), 6);

    let header = record_type!(Header { kind: Field::u8() }).expect("header");
    assert_eq!(header.byte_order(), None);
    let packet = record_type!(Packet: Network extends header => {
        len: Field::u8(),
        body: Field::buffer("len"),
    })
    .expect("packet");
    let names: Vec<&str> = packet.fields().iter().map(|f| f.name()).collect();
    assert_eq!(names, ["kind", "len", "body"]);

    assert!(record_type!(Clash: BigEndian extends point => {}).is_err());
}
