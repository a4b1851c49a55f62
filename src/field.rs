//! Field kinds and their layout rules: validation, pack, unpack and length per variant.
//!
//! A [`Field`] is inert until a [`RecordBuilder`](crate::record::RecordBuilder) places it in a
//! record, which stamps it (and everything nested in arrays, unions and sequences) with the
//! record's byte order. Embedded records keep their own byte order.
//!
//! Union selectors and buffer lengths are *names* of sibling fields. They are looked up in the
//! owning record every time the field is validated, packed, unpacked or measured, never cached.

use crate::error::{Allowed, Bound, DefinitionError, RecordError, Result, ValidationError};
use crate::order::ByteOrder;
use crate::record::{Record, RecordType, Scope};
use crate::source::{read_exact, ByteSource};
use crate::text;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Width of the element count that prefixes every sequence.
pub const SEQUENCE_COUNT_WIDTH: usize = 2;

pub type ValueHook = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;
pub type BytesHook = Arc<dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync>;

/// Optional callbacks around packing and unpacking a primitive field.
/// A hook returning `None` leaves its input untouched.
#[derive(Clone, Default)]
pub struct Hooks {
    before_pack: Option<ValueHook>,
    after_pack: Option<BytesHook>,
    before_unpack: Option<BytesHook>,
    after_unpack: Option<ValueHook>,
}

impl Hooks {
    fn is_empty(&self) -> bool {
        self.before_pack.is_none()
            && self.after_pack.is_none()
            && self.before_unpack.is_none()
            && self.after_unpack.is_none()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_pack", &self.before_pack.is_some())
            .field("after_pack", &self.after_pack.is_some())
            .field("before_unpack", &self.before_unpack.is_some())
            .field("after_unpack", &self.after_unpack.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    /// C `long`: native width under `NativePacked`, 4 bytes otherwise.
    Long,
    /// C `unsigned long`.
    ULong,
    F32,
    F64,
}

impl NumericKind {
    pub fn is_signed(self) -> bool {
        !matches!(
            self,
            NumericKind::U8 | NumericKind::U16 | NumericKind::U32 | NumericKind::U64 | NumericKind::ULong
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumericKind::F32 | NumericKind::F64)
    }

    pub fn width(self, order: ByteOrder) -> usize {
        match self {
            NumericKind::I8 | NumericKind::U8 => 1,
            NumericKind::I16 | NumericKind::U16 => 2,
            NumericKind::I32 | NumericKind::U32 | NumericKind::F32 => 4,
            NumericKind::I64 | NumericKind::U64 | NumericKind::F64 => 8,
            NumericKind::Long | NumericKind::ULong => {
                if order.uses_native_size() {
                    std::mem::size_of::<std::os::raw::c_long>()
                } else {
                    4
                }
            }
        }
    }

    /// Inclusive (min, max); `None` for floats, which carry no integer bounds.
    fn bounds(self, order: ByteOrder) -> Option<(i128, i128)> {
        if self.is_float() {
            return None;
        }
        let bits = 8 * self.width(order) as u32;
        Some(if self.is_signed() {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        })
    }
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Numeric(NumericKind),
    Bool,
    Char,
    /// One byte of space, no value.
    Padding,
    /// Fixed-length 8-bit string; decoding stops at the first zero byte.
    Str(usize),
    Array { base: Box<Field>, count: usize },
    Record(Arc<RecordType>),
    Union {
        selector: String,
        options: Vec<(Value, Field)>,
    },
    Buffer { length: String },
    Sequence { base: Box<Field> },
}

#[derive(Debug, Clone)]
pub struct Field {
    kind: FieldKind,
    order: ByteOrder,
    default: Option<Value>,
    hooks: Hooks,
}

impl Field {
    fn new(kind: FieldKind) -> Self {
        Field {
            kind,
            order: ByteOrder::default(),
            default: None,
            hooks: Hooks::default(),
        }
    }

    pub fn numeric(kind: NumericKind) -> Self {
        Field::new(FieldKind::Numeric(kind))
    }

    pub fn pad() -> Self {
        Field::new(FieldKind::Padding)
    }

    pub fn bool() -> Self {
        Field::new(FieldKind::Bool)
    }

    pub fn char() -> Self {
        Field::new(FieldKind::Char)
    }

    pub fn i8() -> Self {
        Field::numeric(NumericKind::I8)
    }

    /// BYTE.
    pub fn u8() -> Self {
        Field::numeric(NumericKind::U8)
    }

    pub fn i16() -> Self {
        Field::numeric(NumericKind::I16)
    }

    /// WORD.
    pub fn u16() -> Self {
        Field::numeric(NumericKind::U16)
    }

    pub fn i32() -> Self {
        Field::numeric(NumericKind::I32)
    }

    /// DWORD.
    pub fn u32() -> Self {
        Field::numeric(NumericKind::U32)
    }

    pub fn i64() -> Self {
        Field::numeric(NumericKind::I64)
    }

    /// QWORD.
    pub fn u64() -> Self {
        Field::numeric(NumericKind::U64)
    }

    pub fn long() -> Self {
        Field::numeric(NumericKind::Long)
    }

    pub fn ulong() -> Self {
        Field::numeric(NumericKind::ULong)
    }

    pub fn f32() -> Self {
        Field::numeric(NumericKind::F32)
    }

    pub fn f64() -> Self {
        Field::numeric(NumericKind::F64)
    }

    pub fn string(len: usize) -> Self {
        Field::new(FieldKind::Str(len))
    }

    /// `count` elements of `base`. Arrays of arrays, padding, strings and embedded records
    /// are rejected when the record is built.
    pub fn array(base: Field, count: usize) -> Self {
        Field::new(FieldKind::Array {
            base: Box::new(base),
            count,
        })
    }

    pub fn record(ty: &Arc<RecordType>) -> Self {
        Field::new(FieldKind::Record(Arc::clone(ty)))
    }

    /// A field whose layout is chosen by the current value of sibling `selector`.
    pub fn union<K: Into<Value>>(
        selector: impl Into<String>,
        options: impl IntoIterator<Item = (K, Field)>,
    ) -> Self {
        Field::new(FieldKind::Union {
            selector: selector.into(),
            options: options.into_iter().map(|(k, f)| (k.into(), f)).collect(),
        })
    }

    /// Raw bytes whose length is the current value of sibling `length`.
    pub fn buffer(length: impl Into<String>) -> Self {
        Field::new(FieldKind::Buffer {
            length: length.into(),
        })
    }

    /// Count-prefixed list of `base` (2-byte unsigned count in the record's byte order).
    pub fn sequence(base: Field) -> Self {
        Field::new(FieldKind::Sequence {
            base: Box::new(base),
        })
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn before_pack(mut self, hook: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        self.hooks.before_pack = Some(Arc::new(hook));
        self
    }

    pub fn after_pack(mut self, hook: impl Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static) -> Self {
        self.hooks.after_pack = Some(Arc::new(hook));
        self
    }

    pub fn before_unpack(
        mut self,
        hook: impl Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.before_unpack = Some(Arc::new(hook));
        self
    }

    pub fn after_unpack(mut self, hook: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        self.hooks.after_unpack = Some(Arc::new(hook));
        self
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    fn bounds(&self) -> Option<(i128, i128)> {
        match self.kind {
            FieldKind::Numeric(k) => k.bounds(self.order),
            _ => None,
        }
    }

    /// Largest assignable value (integer fields only).
    pub fn max(&self) -> Option<i128> {
        self.bounds().map(|(_, max)| max)
    }

    pub fn min(&self) -> Option<i128> {
        self.bounds().map(|(min, _)| min)
    }

    /// Smallest value above `max` (exclusive limit).
    pub fn upper_limit(&self) -> Option<i128> {
        self.max().map(|m| m + 1)
    }

    pub fn lower_limit(&self) -> Option<i128> {
        self.min().map(|m| m - 1)
    }

    /// Element count of an array.
    pub fn count(&self) -> Option<usize> {
        match self.kind {
            FieldKind::Array { count, .. } => Some(count),
            _ => None,
        }
    }

    /// Element field of an array or sequence.
    pub fn base(&self) -> Option<&Field> {
        match &self.kind {
            FieldKind::Array { base, .. } | FieldKind::Sequence { base } => Some(base),
            _ => None,
        }
    }

    /// Embedded record type.
    pub fn record_type(&self) -> Option<&Arc<RecordType>> {
        match &self.kind {
            FieldKind::Record(ty) => Some(ty),
            _ => None,
        }
    }

    /// Union option selected by `key`.
    pub fn option(&self, key: impl Into<Value>) -> Option<&Field> {
        let key = key.into();
        match &self.kind {
            FieldKind::Union { options, .. } => {
                options.iter().find(|(k, _)| *k == key).map(|(_, f)| f)
            }
            _ => None,
        }
    }

    /// Primitive fields have a fixed size known without data, and accept defaults and hooks.
    pub fn is_primitive(&self) -> bool {
        match &self.kind {
            FieldKind::Numeric(_)
            | FieldKind::Bool
            | FieldKind::Char
            | FieldKind::Padding
            | FieldKind::Str(_) => true,
            FieldKind::Array { base, .. } => base.is_primitive(),
            _ => false,
        }
    }

    /// Size in bytes without any instance. Fails for unions, buffers and sequences.
    pub fn static_len(&self) -> Result<usize> {
        match &self.kind {
            FieldKind::Array { base, count } => Ok(count * base.static_len()?),
            FieldKind::Record(ty) => ty.static_len(),
            FieldKind::Union { selector, .. } => Err(RecordError::IndeterminateLength {
                field: format!("union on {}", selector),
            }),
            FieldKind::Buffer { length } => Err(RecordError::IndeterminateLength {
                field: format!("buffer sized by {}", length),
            }),
            FieldKind::Sequence { .. } => Err(RecordError::IndeterminateLength {
                field: "sequence".to_string(),
            }),
            _ => Ok(self.primitive_width()),
        }
    }

    pub(crate) fn primitive_width(&self) -> usize {
        match &self.kind {
            FieldKind::Numeric(k) => k.width(self.order),
            FieldKind::Bool | FieldKind::Char | FieldKind::Padding => 1,
            FieldKind::Str(n) => *n,
            FieldKind::Array { base, count } => count * base.primitive_width(),
            _ => 0,
        }
    }

    pub(crate) fn stamp(&mut self, order: ByteOrder) {
        self.order = order;
        match &mut self.kind {
            FieldKind::Array { base, .. } | FieldKind::Sequence { base } => base.stamp(order),
            FieldKind::Union { options, .. } => {
                for (_, option) in options.iter_mut() {
                    option.stamp(order);
                }
            }
            _ => {}
        }
    }

    /// Definition-time checks. Defaults on primitives nested in unions are accepted but inert.
    pub(crate) fn check_definition(&self, name: &str) -> std::result::Result<(), DefinitionError> {
        if self.default.is_some() && !self.is_primitive() {
            return Err(DefinitionError::DefaultNotSupported {
                field: name.to_string(),
            });
        }
        if !self.hooks.is_empty() && !self.is_primitive() {
            return Err(DefinitionError::HooksNotSupported {
                field: name.to_string(),
            });
        }
        match &self.kind {
            FieldKind::Array { base, .. } => {
                let construct = match base.kind {
                    FieldKind::Array { .. } => Some("multidimensional array"),
                    FieldKind::Padding => Some("array of padding"),
                    FieldKind::Str(_) => Some("array of strings"),
                    FieldKind::Record(_) => Some("array of embedded records"),
                    _ => None,
                };
                if let Some(construct) = construct {
                    return Err(DefinitionError::Unsupported {
                        field: name.to_string(),
                        construct,
                    });
                }
                base.check_definition(&format!("{}[]", name))
            }
            FieldKind::Sequence { base } => base.check_definition(&format!("{}[]", name)),
            FieldKind::Union { options, .. } => {
                for (key, option) in options {
                    option.check_definition(&format!("{}[{}]", name, key))?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Sibling names this field reads at pack/unpack time, including nested ones.
    pub(crate) fn references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.kind {
            FieldKind::Union { selector, options } => {
                out.push(selector);
                for (_, option) in options {
                    option.references(out);
                }
            }
            FieldKind::Buffer { length } => out.push(length),
            FieldKind::Array { base, .. } | FieldKind::Sequence { base } => base.references(out),
            _ => {}
        }
    }

    pub(crate) fn validate(&self, scope: &Scope<'_>, value: Option<&Value>, name: &str) -> Result<()> {
        let value = match value {
            Some(v) => v,
            None => return Ok(()),
        };
        match &self.kind {
            FieldKind::Numeric(k) => self.check_numeric(*k, value, name).map(|_| ()),
            FieldKind::Bool => match value {
                Value::Bool(_) => Ok(()),
                other => Err(RecordError::type_mismatch(name, "bool", other)),
            },
            FieldKind::Char => check_char(value, name).map(|_| ()),
            FieldKind::Padding => Err(RecordError::type_mismatch(name, "no value", value)),
            FieldKind::Str(n) => check_text(value, *n, name).map(|_| ()),
            FieldKind::Array { base, count } => {
                let items = value
                    .as_list()
                    .ok_or_else(|| RecordError::type_mismatch(name, "list", value))?;
                check_count(items, *count, name)?;
                for (i, item) in items.iter().enumerate() {
                    base.validate(scope, Some(item), &format!("{}[{}]", name, i))?;
                }
                Ok(())
            }
            FieldKind::Record(ty) => check_record(ty, value, name).map(|_| ()),
            FieldKind::Union { selector, options } => {
                let (key, option) = resolve_option(scope, name, selector, options)?;
                option.validate(scope, Some(value), &format!("{}[{}]", name, key))
            }
            FieldKind::Buffer { length } => {
                let limit = resolve_length(scope, name, length)?;
                let bytes = value
                    .as_bytes()
                    .ok_or_else(|| RecordError::type_mismatch(name, "bytes", value))?;
                if bytes.len() > limit {
                    return Err(RecordError::too_long(name, bytes.len(), limit));
                }
                Ok(())
            }
            FieldKind::Sequence { base } => {
                let items = value
                    .as_list()
                    .ok_or_else(|| RecordError::type_mismatch(name, "list", value))?;
                if items.len() > usize::from(u16::MAX) {
                    return Err(RecordError::too_long(name, items.len(), usize::from(u16::MAX)));
                }
                for (i, item) in items.iter().enumerate() {
                    base.validate(scope, Some(item), &format!("{}[{}]", name, i))?;
                }
                Ok(())
            }
        }
    }

    /// Integer value checked against the field's bounds. Floats accept any number an `f32`
    /// or `f64` can hold without overflowing to infinity.
    fn check_numeric(&self, kind: NumericKind, value: &Value, name: &str) -> Result<i128> {
        let (min, max) = match kind.bounds(self.order) {
            Some(b) => b,
            None => {
                return match value {
                    Value::Int(x) => Ok(*x),
                    Value::Float(x)
                        if kind == NumericKind::F32 && x.is_finite() && x.abs() > f64::from(f32::MAX) =>
                    {
                        Err(ValidationError::RangeViolation {
                            field: name.to_string(),
                            value: x.to_string(),
                            bound: Bound::F32Max,
                        }
                        .into())
                    }
                    Value::Float(_) => Ok(0),
                    other => Err(RecordError::type_mismatch(name, "number", other)),
                }
            }
        };
        let x = value
            .as_int()
            .ok_or_else(|| RecordError::type_mismatch(name, "int", value))?;
        let bound = if x > max {
            Bound::Max(max)
        } else if x < min {
            Bound::Min(min)
        } else {
            return Ok(x);
        };
        Err(ValidationError::RangeViolation {
            field: name.to_string(),
            value: x.to_string(),
            bound,
        }
        .into())
    }

    /// Serialize `value`, running the pack hooks around the encoding.
    pub(crate) fn pack(
        &self,
        scope: &Scope<'_>,
        value: Option<&Value>,
        name: &str,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        if self.hooks.is_empty() {
            return self.encode(scope, value, name, out);
        }
        let replaced = match (value, &self.hooks.before_pack) {
            (Some(v), Some(hook)) => hook(v),
            _ => None,
        };
        let value = replaced.as_ref().or(value);
        let mut buf = Vec::new();
        self.encode(scope, value, name, &mut buf)?;
        if let Some(hook) = &self.hooks.after_pack {
            if let Some(altered) = hook(&buf) {
                buf = altered;
            }
        }
        out.extend_from_slice(&buf);
        Ok(())
    }

    fn encode(&self, scope: &Scope<'_>, value: Option<&Value>, name: &str, out: &mut Vec<u8>) -> Result<()> {
        match &self.kind {
            FieldKind::Padding => {
                if let Some(v) = value {
                    return Err(RecordError::type_mismatch(name, "no value", v));
                }
                out.push(0);
            }
            FieldKind::Numeric(kind) => {
                let value = required(value, name)?;
                let width = kind.width(self.order);
                match kind {
                    NumericKind::F32 => {
                        self.check_numeric(*kind, value, name)?;
                        self.order.write_f32(out, float_of(value, name)? as f32)?
                    }
                    NumericKind::F64 => self.order.write_f64(out, float_of(value, name)?)?,
                    _ => {
                        // In range after the check, so the narrowing casts are lossless.
                        let x = self.check_numeric(*kind, value, name)?;
                        if kind.is_signed() {
                            self.order.write_int(out, x as i64, width)?;
                        } else {
                            self.order.write_uint(out, x as u64, width)?;
                        }
                    }
                }
            }
            FieldKind::Bool => {
                let value = required(value, name)?;
                let b = value
                    .as_bool()
                    .ok_or_else(|| RecordError::type_mismatch(name, "bool", value))?;
                out.push(u8::from(b));
            }
            FieldKind::Char => out.push(check_char(required(value, name)?, name)?),
            FieldKind::Str(n) => {
                let bytes = check_text(required(value, name)?, *n, name)?;
                write_padded(out, &bytes, *n);
            }
            FieldKind::Array { base, count } => {
                let value = required(value, name)?;
                let items = value
                    .as_list()
                    .ok_or_else(|| RecordError::type_mismatch(name, "list", value))?;
                check_count(items, *count, name)?;
                for (i, item) in items.iter().enumerate() {
                    base.encode(scope, Some(item), &format!("{}[{}]", name, i), out)?;
                }
            }
            FieldKind::Record(ty) => {
                let record = check_record(ty, required(value, name)?, name)?;
                out.extend_from_slice(&record.pack()?);
            }
            FieldKind::Union { selector, options } => {
                let (key, option) = resolve_option(scope, name, selector, options)?;
                option.pack(scope, value, &format!("{}[{}]", name, key), out)?;
            }
            FieldKind::Buffer { length } => {
                let limit = resolve_length(scope, name, length)?;
                let value = required(value, name)?;
                let bytes = value
                    .as_bytes()
                    .ok_or_else(|| RecordError::type_mismatch(name, "bytes", value))?;
                // The length sibling may have changed since assignment; this is where it shows.
                if bytes.len() > limit {
                    return Err(RecordError::too_long(name, bytes.len(), limit));
                }
                write_padded(out, bytes, limit);
            }
            FieldKind::Sequence { base } => {
                let value = required(value, name)?;
                let items = value
                    .as_list()
                    .ok_or_else(|| RecordError::type_mismatch(name, "list", value))?;
                let count = u16::try_from(items.len())
                    .map_err(|_| RecordError::too_long(name, items.len(), usize::from(u16::MAX)))?;
                self.order
                    .write_uint(out, u64::from(count), SEQUENCE_COUNT_WIDTH)?;
                for (i, item) in items.iter().enumerate() {
                    base.encode(scope, Some(item), &format!("{}[{}]", name, i), out)?;
                }
            }
        }
        log::trace!("packed {}", name);
        Ok(())
    }

    /// Consume this field's bytes from `src`. `scope` holds the siblings decoded so far.
    pub(crate) fn unpack(
        &self,
        scope: &Scope<'_>,
        src: &mut dyn ByteSource,
        name: &str,
    ) -> Result<Option<Value>> {
        match &self.kind {
            FieldKind::Array { base, count } if !base.is_primitive() => {
                let mut items = Vec::with_capacity(*count);
                for i in 0..*count {
                    let elem = format!("{}[{}]", name, i);
                    let item = base.unpack(scope, src, &elem)?;
                    items.push(item.ok_or_else(|| RecordError::unset(&elem))?);
                }
                Ok(Some(Value::List(items)))
            }
            FieldKind::Record(ty) => Ok(Some(Value::Record(ty.unpack_from(src)?))),
            FieldKind::Union { selector, options } => {
                let (key, option) = resolve_option(scope, name, selector, options)?;
                option.unpack(scope, src, &format!("{}[{}]", name, key))
            }
            FieldKind::Buffer { length } => {
                let n = resolve_length(scope, name, length)?;
                Ok(Some(Value::Bytes(read_exact(src, n, name)?)))
            }
            FieldKind::Sequence { base } => {
                let raw = read_exact(src, SEQUENCE_COUNT_WIDTH, name)?;
                let count = self.order.read_uint(&raw) as usize;
                let mut items = Vec::with_capacity(count);
                for i in 0..count {
                    let elem = format!("{}[{}]", name, i);
                    let item = base.unpack(scope, src, &elem)?;
                    items.push(item.ok_or_else(|| RecordError::unset(&elem))?);
                }
                Ok(Some(Value::List(items)))
            }
            _ => {
                let raw = read_exact(src, self.primitive_width(), name)?;
                self.decode_primitive(raw, name)
            }
        }
    }

    /// Decode the bytes of a primitive field, running the unpack hooks around the decoding.
    pub(crate) fn decode_primitive(&self, raw: Vec<u8>, name: &str) -> Result<Option<Value>> {
        let raw = match &self.hooks.before_unpack {
            Some(hook) => hook(&raw).unwrap_or(raw),
            None => raw,
        };
        let expected = self.primitive_width();
        if raw.len() != expected {
            return Err(RecordError::TruncatedInput {
                field: name.to_string(),
                expected,
                got: raw.len(),
            });
        }
        let value = self.decode_bytes(&raw);
        log::trace!("unpacked {} ({} bytes)", name, expected);
        Ok(match (value, &self.hooks.after_unpack) {
            (Some(v), Some(hook)) => Some(hook(&v).unwrap_or(v)),
            (v, _) => v,
        })
    }

    /// `raw` is exactly `primitive_width()` bytes.
    fn decode_bytes(&self, raw: &[u8]) -> Option<Value> {
        match &self.kind {
            FieldKind::Numeric(NumericKind::F32) => Some(Value::Float(f64::from(self.order.read_f32(raw)))),
            FieldKind::Numeric(NumericKind::F64) => Some(Value::Float(self.order.read_f64(raw))),
            FieldKind::Numeric(k) if k.is_signed() => Some(Value::Int(i128::from(self.order.read_int(raw)))),
            FieldKind::Numeric(_) => Some(Value::Int(i128::from(self.order.read_uint(raw)))),
            FieldKind::Bool => Some(Value::Bool(raw.iter().any(|&b| b != 0))),
            FieldKind::Char => raw.first().map(|&b| Value::Char(char::from(b))),
            FieldKind::Str(_) => {
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                Some(Value::Str(text::decode(&raw[..end])))
            }
            FieldKind::Array { base, .. } => {
                let width = base.primitive_width();
                if width == 0 {
                    return Some(Value::List(Vec::new()));
                }
                Some(Value::List(
                    raw.chunks(width).filter_map(|c| base.decode_bytes(c)).collect(),
                ))
            }
            _ => None,
        }
    }

    /// Length in bytes of `value` packed by this field within `scope`.
    pub(crate) fn dynamic_len(&self, scope: &Scope<'_>, value: Option<&Value>, name: &str) -> Result<usize> {
        match &self.kind {
            FieldKind::Array { base, count } if !base.is_primitive() => {
                match value.and_then(Value::as_list) {
                    Some(items) => items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| base.dynamic_len(scope, Some(item), &format!("{}[{}]", name, i)))
                        .sum(),
                    None => Ok(count * base.dynamic_len(scope, None, name)?),
                }
            }
            FieldKind::Record(ty) => match value.and_then(Value::as_record) {
                Some(record) => record.len(),
                None => ty.static_len(),
            },
            FieldKind::Union { selector, options } => {
                let (key, option) = resolve_option(scope, name, selector, options)?;
                option.dynamic_len(scope, value, &format!("{}[{}]", name, key))
            }
            FieldKind::Buffer { length } => resolve_length(scope, name, length),
            FieldKind::Sequence { base } => {
                let items = value
                    .and_then(Value::as_list)
                    .ok_or_else(|| RecordError::unset(name))?;
                let body: usize = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| base.dynamic_len(scope, Some(item), &format!("{}[{}]", name, i)))
                    .sum::<Result<usize>>()?;
                Ok(SEQUENCE_COUNT_WIDTH + body)
            }
            _ => Ok(self.primitive_width()),
        }
    }
}

/// The option of a union selected by the current value of its selector.
pub(crate) fn resolve_option<'f>(
    scope: &Scope<'_>,
    name: &str,
    selector: &str,
    options: &'f [(Value, Field)],
) -> Result<(Value, &'f Field)> {
    let key = scope.resolve(name, selector)?;
    options
        .iter()
        .find(|(k, _)| k == key)
        .map(|(k, f)| (k.clone(), f))
        .ok_or_else(|| RecordError::InvalidDependencyValue {
            field: name.to_string(),
            reference: selector.to_string(),
            value: key.clone(),
        })
}

/// The byte length a buffer reads from sibling `length`.
pub(crate) fn resolve_length(scope: &Scope<'_>, name: &str, length: &str) -> Result<usize> {
    let value = scope.resolve(name, length)?;
    value
        .as_int()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| RecordError::InvalidDependencyValue {
            field: name.to_string(),
            reference: length.to_string(),
            value: value.clone(),
        })
}

fn required<'v>(value: Option<&'v Value>, name: &str) -> Result<&'v Value> {
    value.ok_or_else(|| RecordError::unset(name))
}

fn float_of(value: &Value, name: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| RecordError::type_mismatch(name, "number", value))
}

fn check_char(value: &Value, name: &str) -> Result<u8> {
    let c = value
        .as_char()
        .ok_or_else(|| RecordError::type_mismatch(name, "char", value))?;
    u8::try_from(u32::from(c)).map_err(|_| {
        ValidationError::RangeViolation {
            field: name.to_string(),
            value: format!("{:?}", c),
            bound: Bound::Max(255),
        }
        .into()
    })
}

/// Encoded bytes of a string value that fits in `len` bytes.
fn check_text(value: &Value, len: usize, name: &str) -> Result<Vec<u8>> {
    let s = value
        .as_str()
        .ok_or_else(|| RecordError::type_mismatch(name, "string", value))?;
    if s.contains('\0') {
        return Err(RecordError::Encoding(format!(
            "{}: string values cannot contain the NUL terminator",
            name
        )));
    }
    let bytes = text::encode(s)?;
    if bytes.len() > len {
        return Err(RecordError::too_long(name, bytes.len(), len));
    }
    Ok(bytes)
}

fn check_count(items: &[Value], count: usize, name: &str) -> Result<()> {
    if items.len() != count {
        return Err(ValidationError::LengthViolation {
            field: name.to_string(),
            len: items.len(),
            allowed: Allowed::Exactly(count),
        }
        .into());
    }
    Ok(())
}

fn check_record<'v>(ty: &Arc<RecordType>, value: &'v Value, name: &str) -> Result<&'v Record> {
    match value {
        Value::Record(r) if Arc::ptr_eq(r.record_type(), ty) => Ok(r),
        Value::Record(r) => Err(ValidationError::TypeMismatch {
            field: name.to_string(),
            expected: "an instance of the embedded record type",
            found: format!("record {}", r.record_type().name()),
        }
        .into()),
        other => Err(RecordError::type_mismatch(name, "record", other)),
    }
}

fn write_padded(out: &mut Vec<u8>, bytes: &[u8], len: usize) {
    out.extend_from_slice(bytes);
    out.resize(out.len() + len.saturating_sub(bytes.len()), 0);
}
