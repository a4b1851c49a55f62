//! # binrec: declarative binary records
//!
//! Describe a fixed binary layout once, as an ordered list of typed fields, then pack record
//! instances to bytes and unpack bytes (from a buffer, a reader function, any
//! `std::io::Read`, or asynchronously) back into instances.
//!
//! ## Field kinds
//!
//! - Numeric: `i8`..`u64`, C `long`/`unsigned long`, `f32`, `f64`; `bool`, `char`, pad byte
//! - `string(n)`: fixed `n` bytes of 8-bit text, zero padded, decoded up to the first zero
//! - `array(base, n)`: exactly `n` elements
//! - `record(&ty)`: an embedded record, packed with its own byte order
//! - `union(selector, options)`: layout chosen by a sibling's current value
//! - `buffer(length)`: raw bytes sized by a sibling's current value
//! - `sequence(base)`: 2-byte element count followed by the elements
//!
//! ## Byte order
//!
//! Every record carries one [`ByteOrder`]; a record extending another inherits it and may not
//! declare a different one.
//!
//! ## Example
//!
//! ```ignore
//! use binrec::{ByteOrder, Field, RecordType};
//!
//! let packet = RecordType::builder("Packet")
//!     .byte_order(ByteOrder::Network)
//!     .field("kind", Field::u8())
//!     .field("len", Field::u16())
//!     .field("payload", Field::buffer("len"))
//!     .build()?;
//!
//! let mut p = packet.instance()?;
//! p.set("kind", 1u8)?;
//! p.set("len", 3u16)?;
//! p.set("payload", b"abc")?;
//! assert_eq!(p.pack()?, b"\x01\x00\x03abc");
//! assert_eq!(packet.unpack(&p.pack()?)?, p);
//! ```

pub mod deferred;
pub mod error;
pub mod field;
pub mod macros;
pub mod order;
pub mod record;
pub mod source;
pub mod text;
pub mod value;

pub use deferred::{AsyncByteSource, AsyncCallableSource, AsyncReaderSource};
pub use error::{
    Allowed, Bound, DefinitionError, DependencyError, RecordError, Result, ValidationError,
};
pub use field::{Field, FieldKind, NumericKind, SEQUENCE_COUNT_WIDTH};
pub use order::ByteOrder;
pub use record::{NamedField, Record, RecordBuilder, RecordType};
pub use source::{
    from_any, BufferSource, ByteSource, CallableSource, IntoByteSource, ReadFn, ReaderSource,
};
pub use value::{list, Value};
