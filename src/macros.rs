//! # Declarative record definitions
//!
//! `record_type!` expands to a [`RecordBuilder`](crate::RecordBuilder) chain and evaluates to
//! `binrec::Result<Arc<RecordType>>`. Field names are identifiers; each one is followed by a
//! [`Field`](crate::Field) expression.
//!
//! ```ignore
//! let point = record_type!(Point: LittleEndian {
//!     x: Field::u16(),
//!     y: Field::u16(),
//! })?;
//!
//! let point3 = record_type!(Point3 extends point => {
//!     z: Field::u16(),
//! })?;
//!
//! // No byte order: only usable as a base.
//! let header = record_type!(Header { kind: Field::u8() })?;
//! ```

/// Define a record type. See the [module docs](crate::macros).
#[macro_export]
macro_rules! record_type {
    (@fields $builder:expr ; ) => {
        $builder
    };
    (@fields $builder:expr ; $name:ident : $field:expr $(, $($rest:tt)*)?) => {
        $crate::record_type!(@fields $builder.field(stringify!($name), $field) ; $($($rest)*)?)
    };
    ($name:ident : $order:ident extends $base:expr => { $($body:tt)* }) => {
        $crate::record_type!(@fields
            $crate::RecordType::builder(stringify!($name))
                .byte_order($crate::ByteOrder::$order)
                .extends(&$base) ;
            $($body)*
        )
        .build()
    };
    ($name:ident extends $base:expr => { $($body:tt)* }) => {
        $crate::record_type!(@fields
            $crate::RecordType::builder(stringify!($name)).extends(&$base) ;
            $($body)*
        )
        .build()
    };
    ($name:ident : $order:ident { $($body:tt)* }) => {
        $crate::record_type!(@fields
            $crate::RecordType::builder(stringify!($name)).byte_order($crate::ByteOrder::$order) ;
            $($body)*
        )
        .build()
    };
    ($name:ident { $($body:tt)* }) => {
        $crate::record_type!(@fields $crate::RecordType::builder(stringify!($name)) ; $($body)*).build()
    };
}
