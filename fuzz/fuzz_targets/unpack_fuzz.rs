//! Unpack fuzz target: feed arbitrary bytes to `RecordType::unpack`.
//! Unpack must not panic; it returns a record or an error. A decoded record must repack.
//! Build with: cargo fuzz run unpack_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn record_type() -> std::sync::Arc<binrec::RecordType> {
    use binrec::{ByteOrder, Field, RecordType};
    let inner = RecordType::builder("Inner")
        .byte_order(ByteOrder::LittleEndian)
        .field("a", Field::u16())
        .field("s", Field::string(3))
        .build()
        .expect("inner");
    RecordType::builder("Fuzzed")
        .byte_order(ByteOrder::BigEndian)
        .field("kind", Field::u8())
        .field(
            "body",
            Field::union(
                "kind",
                [
                    (0u8, Field::record(&inner)),
                    (1u8, Field::array(Field::i32(), 2)),
                    (2u8, Field::sequence(Field::char())),
                ],
            ),
        )
        .field("len", Field::u8())
        .field("data", Field::buffer("len"))
        .field("tail", Field::f64())
        .build()
        .expect("record type")
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let ty = record_type();
    if let Ok(record) = ty.unpack(data) {
        let _ = record.pack().expect("decoded record repacks");
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run unpack_fuzz");
}
