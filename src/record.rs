//! Record types and record instances.
//!
//! A [`RecordBuilder`] runs once per record type: it merges the base record's fields, stamps
//! every field with the byte order, checks the definition and collects defaults. The result
//! is an immutable [`RecordType`] shared through `Arc`, safe to use from any number of threads
//! without locking. Building consumes the builder and mutates no shared state.
//!
//! A [`Record`] holds the current value of every field (`None` meaning unset). Assignments
//! are validated immediately; [`Record::pack`] and [`RecordType::unpack`] walk the field
//! table in declaration order, inherited fields first.

use crate::error::{DefinitionError, DependencyError, RecordError, Result};
use crate::field::Field;
use crate::order::ByteOrder;
use crate::source::{from_any, ByteSource, CallableSource, IntoByteSource};
use crate::value::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

/// A field and the name it is declared under.
#[derive(Debug, Clone)]
pub struct NamedField {
    name: String,
    field: Field,
}

impl NamedField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self) -> &Field {
        &self.field
    }
}

/// Sibling values visible to a field while it is validated, packed, unpacked or measured.
/// `values` is indexed like the record's field table; during unpack it holds only the
/// fields decoded so far.
pub(crate) struct Scope<'a> {
    ty: &'a RecordType,
    values: &'a [Option<Value>],
}

impl<'a> Scope<'a> {
    pub(crate) fn new(ty: &'a RecordType, values: &'a [Option<Value>]) -> Self {
        Scope { ty, values }
    }

    /// Current value of `reference`, read on behalf of `field`.
    pub(crate) fn resolve(&self, field: &str, reference: &str) -> Result<&'a Value> {
        let idx = self
            .ty
            .index_of(reference)
            .ok_or_else(|| DependencyError::NotInRecord {
                record: self.ty.name.clone(),
                field: field.to_string(),
                reference: reference.to_string(),
            })?;
        self.values
            .get(idx)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                DependencyError::Unset {
                    field: field.to_string(),
                    reference: reference.to_string(),
                }
                .into()
            })
    }
}

#[derive(Debug)]
pub struct RecordBuilder {
    name: String,
    order: Option<ByteOrder>,
    base: Option<Arc<RecordType>>,
    fields: Vec<NamedField>,
}

impl RecordBuilder {
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.order = Some(order);
        self
    }

    /// Extend `base`: its fields come first, in its order. Without an explicit byte order the
    /// base's is inherited; a different explicit one is a definition error.
    pub fn extends(mut self, base: &Arc<RecordType>) -> Self {
        self.base = Some(Arc::clone(base));
        self
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.push(NamedField {
            name: name.into(),
            field,
        });
        self
    }

    pub fn build(self) -> Result<Arc<RecordType>> {
        let RecordBuilder {
            name,
            order,
            base,
            fields: local,
        } = self;

        let inherited_order = base.as_ref().and_then(|b| b.order);
        if let (Some(order), Some(base_order), Some(b)) = (order, inherited_order, base.as_ref()) {
            if order != base_order {
                return Err(DefinitionError::ByteOrderConflict {
                    record: name,
                    order,
                    base: b.name.clone(),
                    base_order,
                }
                .into());
            }
        }
        let order = order.or(inherited_order);

        // Copies, so restamping never touches the base's own table.
        let mut fields: Vec<NamedField> = base.map(|b| b.fields.clone()).unwrap_or_default();
        fields.extend(local);

        let mut index = HashMap::with_capacity(fields.len());
        for (i, nf) in fields.iter_mut().enumerate() {
            if index.insert(nf.name.clone(), i).is_some() {
                return Err(DefinitionError::DuplicateField {
                    record: name,
                    field: nf.name.clone(),
                }
                .into());
            }
            nf.field.stamp(order.unwrap_or_default());
        }

        for (i, nf) in fields.iter().enumerate() {
            let qualified = format!("{}.{}", name, nf.name);
            nf.field.check_definition(&qualified)?;
            let mut refs = Vec::new();
            nf.field.references(&mut refs);
            for reference in refs {
                if matches!(index.get(reference), Some(&j) if j >= i) {
                    return Err(DefinitionError::ForwardReference {
                        field: qualified,
                        reference: reference.to_string(),
                    }
                    .into());
                }
            }
        }

        let defaults = fields
            .iter()
            .enumerate()
            .filter_map(|(i, nf)| nf.field.default().map(|d| (i, d.clone())))
            .collect();

        let ty = RecordType {
            name,
            order,
            fields,
            index,
            defaults,
        };
        ty.check_defaults()?;
        log::debug!(
            "defined record {} ({} fields, byte order {:?})",
            ty.name,
            ty.fields.len(),
            ty.order
        );
        Ok(Arc::new(ty))
    }
}

/// A finalized record layout: the ordered field table plus default values.
pub struct RecordType {
    name: String,
    order: Option<ByteOrder>,
    fields: Vec<NamedField>,
    index: HashMap<String, usize>,
    defaults: Vec<(usize, Value)>,
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("fields", &self.fields)
            .finish()
    }
}

impl RecordType {
    pub fn builder(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            name: name.into(),
            order: None,
            base: None,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` for an abstract record meant only as a base.
    pub fn byte_order(&self) -> Option<ByteOrder> {
        self.order
    }

    pub fn fields(&self) -> &[NamedField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index_of(name).map(|i| &self.fields[i].field)
    }

    pub fn defaults(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.defaults
            .iter()
            .map(move |(i, v)| (self.fields[*i].name.as_str(), v))
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn qualified(&self, idx: usize) -> String {
        format!("{}.{}", self.name, self.fields[idx].name)
    }

    /// Defaults are primitives, so they validate without siblings.
    fn check_defaults(&self) -> std::result::Result<(), DefinitionError> {
        let empty: Vec<Option<Value>> = vec![None; self.fields.len()];
        let scope = Scope::new(self, &empty);
        for (i, value) in &self.defaults {
            let name = self.qualified(*i);
            if let Err(e) = self.fields[*i].field.validate(&scope, Some(value), &name) {
                return Err(DefinitionError::InvalidDefault {
                    field: name,
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn require_order(&self) -> Result<()> {
        match self.order {
            Some(_) => Ok(()),
            None => Err(DefinitionError::MissingByteOrder(self.name.clone()).into()),
        }
    }

    /// Packed size computable without an instance.
    pub fn static_len(&self) -> Result<usize> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, nf)| {
                nf.field.static_len().map_err(|e| match e {
                    RecordError::IndeterminateLength { .. } => RecordError::IndeterminateLength {
                        field: self.qualified(i),
                    },
                    other => other,
                })
            })
            .sum()
    }

    /// Every field unset.
    fn blank(self: &Arc<Self>) -> Result<Record> {
        self.require_order()?;
        Ok(Record {
            ty: Arc::clone(self),
            values: vec![None; self.fields.len()],
        })
    }

    /// A new instance with defaults applied.
    pub fn instance(self: &Arc<Self>) -> Result<Record> {
        let mut record = self.blank()?;
        for (i, value) in &self.defaults {
            record.assign(*i, Some(value.clone()))?;
        }
        Ok(record)
    }

    /// A new instance with defaults applied, then `values` assigned in the given order.
    pub fn create<I, K, V>(self: &Arc<Self>, values: I) -> Result<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = self.instance()?;
        for (name, value) in values {
            record.set(name.as_ref(), value)?;
        }
        Ok(record)
    }

    /// Decode one record from `source`.
    pub fn unpack<S: IntoByteSource>(self: &Arc<Self>, source: S) -> Result<Record> {
        let mut src = source.into_source()?;
        self.unpack_from(&mut src)
    }

    /// Decode one record through `reader(n, &args)`; `args` is reused for every read.
    pub fn unpack_with<F, A>(self: &Arc<Self>, reader: F, args: A) -> Result<Record>
    where
        F: FnMut(usize, &A) -> io::Result<Vec<u8>>,
    {
        self.unpack_from(&mut CallableSource::new(reader, args))
    }

    /// Decode from a dynamically typed source (see [`from_any`]).
    pub fn unpack_any(self: &Arc<Self>, source: Box<dyn Any>) -> Result<Record> {
        let mut src = from_any(source)?;
        self.unpack_from(&mut *src)
    }

    pub fn unpack_from(self: &Arc<Self>, src: &mut dyn ByteSource) -> Result<Record> {
        self.require_order()?;
        let mut values: Vec<Option<Value>> = vec![None; self.fields.len()];
        for (i, nf) in self.fields.iter().enumerate() {
            let name = self.qualified(i);
            let value = nf.field.unpack(&Scope::new(self, &values), src, &name)?;
            values[i] = value;
        }
        self.from_decoded(values)
    }

    /// Build the instance from a complete dependency map, re-running assignment validation.
    pub(crate) fn from_decoded(self: &Arc<Self>, values: Vec<Option<Value>>) -> Result<Record> {
        let mut record = self.blank()?;
        for (i, value) in values.into_iter().enumerate() {
            record.assign(i, value)?;
        }
        Ok(record)
    }
}

/// An instance of a [`RecordType`].
#[derive(Clone)]
pub struct Record {
    ty: Arc<RecordType>,
    values: Vec<Option<Value>>,
}

impl Record {
    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    /// Current value of `name`; `None` when unset or not a field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ty
            .index_of(name)
            .and_then(|i| self.values[i].as_ref())
    }

    /// Validate and assign. Defaults are never re-applied once overwritten.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.set_opt(name, Some(value.into()))
    }

    /// Assign or clear; `None` is always accepted.
    pub fn set_opt(&mut self, name: &str, value: Option<Value>) -> Result<()> {
        let idx = self
            .ty
            .index_of(name)
            .ok_or_else(|| RecordError::UnknownField(format!("{}.{}", self.ty.name, name)))?;
        self.assign(idx, value)
    }

    pub fn clear(&mut self, name: &str) -> Result<()> {
        self.set_opt(name, None)
    }

    fn assign(&mut self, idx: usize, value: Option<Value>) -> Result<()> {
        let name = self.ty.qualified(idx);
        self.ty.fields[idx]
            .field
            .validate(&Scope::new(&self.ty, &self.values), value.as_ref(), &name)?;
        self.values[idx] = value;
        Ok(())
    }

    /// Field names with their current values, in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.ty
            .fields
            .iter()
            .zip(&self.values)
            .map(|(nf, v)| (nf.name.as_str(), v.as_ref()))
    }

    /// Re-run assignment validation on every field against current sibling values.
    pub fn validate(&self) -> Result<()> {
        let scope = Scope::new(&self.ty, &self.values);
        for (i, nf) in self.ty.fields.iter().enumerate() {
            nf.field
                .validate(&scope, self.values[i].as_ref(), &self.ty.qualified(i))?;
        }
        Ok(())
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        let scope = Scope::new(&self.ty, &self.values);
        let mut out = Vec::new();
        for (i, nf) in self.ty.fields.iter().enumerate() {
            nf.field
                .pack(&scope, self.values[i].as_ref(), &self.ty.qualified(i), &mut out)?;
        }
        Ok(out)
    }

    /// Packed size with unions, buffers and sequences resolved from current values.
    pub fn len(&self) -> Result<usize> {
        let scope = Scope::new(&self.ty, &self.values);
        self.ty
            .fields
            .iter()
            .enumerate()
            .map(|(i, nf)| {
                nf.field
                    .dynamic_len(&scope, self.values[i].as_ref(), &self.ty.qualified(i))
            })
            .sum()
    }
}

/// Same record type (by identity) and equal values field by field.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.ty, &other.ty) && self.values == other.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(&self.ty.name);
        for (name, value) in self.values() {
            s.field(name, &value);
        }
        s.finish()
    }
}
