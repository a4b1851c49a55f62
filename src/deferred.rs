//! Deferred (asynchronous) unpacking.
//!
//! Same layout rules as [`RecordType::unpack`], but every read is awaited. Reads stay strictly
//! sequential in field order and a read is the only suspension point, so a record decoded
//! from an async source is identical to one decoded from the same bytes in memory.

use crate::error::{RecordError, Result};
use crate::field::{resolve_length, resolve_option, Field, FieldKind, SEQUENCE_COUNT_WIDTH};
use crate::record::{Record, RecordType, Scope};
use crate::source::{check_read, BufferSource, READ_CHUNK};
use crate::value::Value;
use futures::future::{self, BoxFuture};
use futures::io::{AsyncRead, AsyncReadExt};
use std::future::Future;
use std::io;
use std::sync::Arc;

pub trait AsyncByteSource: Send {
    /// Read up to `n` bytes; fewer only when the source is exhausted.
    fn read(&mut self, n: usize) -> BoxFuture<'_, Result<Vec<u8>>>;
}

impl<S: AsyncByteSource + ?Sized> AsyncByteSource for &mut S {
    fn read(&mut self, n: usize) -> BoxFuture<'_, Result<Vec<u8>>> {
        (**self).read(n)
    }
}

impl<S: AsyncByteSource + ?Sized> AsyncByteSource for Box<S> {
    fn read(&mut self, n: usize) -> BoxFuture<'_, Result<Vec<u8>>> {
        (**self).read(n)
    }
}

/// In-memory bytes resolve immediately.
impl AsyncByteSource for BufferSource<'_> {
    fn read(&mut self, n: usize) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(future::ready(crate::source::ByteSource::read(self, n)))
    }
}

/// An async reader function invoked as `reader(n, &args)`; the returned future must own
/// whatever it needs from `args`.
pub struct AsyncCallableSource<F, A> {
    reader: F,
    args: A,
}

impl<F, A, Fut> AsyncCallableSource<F, A>
where
    F: FnMut(usize, &A) -> Fut + Send,
    A: Send,
    Fut: Future<Output = io::Result<Vec<u8>>> + Send + 'static,
{
    pub fn new(reader: F, args: A) -> Self {
        AsyncCallableSource { reader, args }
    }
}

impl<F, A, Fut> AsyncByteSource for AsyncCallableSource<F, A>
where
    F: FnMut(usize, &A) -> Fut + Send,
    A: Send,
    Fut: Future<Output = io::Result<Vec<u8>>> + Send + 'static,
{
    fn read(&mut self, n: usize) -> BoxFuture<'_, Result<Vec<u8>>> {
        let pending = (self.reader)(n, &self.args);
        Box::pin(async move { Ok(pending.await?) })
    }
}

/// Any [`futures::io::AsyncRead`].
#[derive(Debug)]
pub struct AsyncReaderSource<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin + Send> AsyncReaderSource<R> {
    pub fn new(inner: R) -> Self {
        AsyncReaderSource { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin + Send> AsyncByteSource for AsyncReaderSource<R> {
    fn read(&mut self, n: usize) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move {
            let mut buf = Vec::with_capacity(n.min(READ_CHUNK));
            (&mut self.inner).take(n as u64).read_to_end(&mut buf).await?;
            Ok(buf)
        })
    }
}

impl Field {
    pub(crate) fn unpack_deferred<'a>(
        &'a self,
        scope: &'a Scope<'a>,
        src: &'a mut (dyn AsyncByteSource + 'a),
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move {
            match self.kind() {
                FieldKind::Array { base, count } if !base.is_primitive() => {
                    let mut items = Vec::with_capacity(*count);
                    for i in 0..*count {
                        let elem = format!("{}[{}]", name, i);
                        let item = base.unpack_deferred(scope, &mut *src, &elem).await?;
                        items.push(item.ok_or_else(|| RecordError::unset(&elem))?);
                    }
                    Ok(Some(Value::List(items)))
                }
                FieldKind::Record(ty) => {
                    let record = ty.unpack_deferred(&mut *src).await?;
                    Ok(Some(Value::Record(record)))
                }
                FieldKind::Union { selector, options } => {
                    let (key, option) = resolve_option(scope, name, selector, options)?;
                    let qualified = format!("{}[{}]", name, key);
                    option.unpack_deferred(scope, &mut *src, &qualified).await
                }
                FieldKind::Buffer { length } => {
                    let n = resolve_length(scope, name, length)?;
                    let raw = src.read(n).await?;
                    Ok(Some(Value::Bytes(check_read(raw, n, name)?)))
                }
                FieldKind::Sequence { base } => {
                    let raw = src.read(SEQUENCE_COUNT_WIDTH).await?;
                    let raw = check_read(raw, SEQUENCE_COUNT_WIDTH, name)?;
                    let count = self.byte_order().read_uint(&raw) as usize;
                    let mut items = Vec::with_capacity(count);
                    for i in 0..count {
                        let elem = format!("{}[{}]", name, i);
                        let item = base.unpack_deferred(scope, &mut *src, &elem).await?;
                        items.push(item.ok_or_else(|| RecordError::unset(&elem))?);
                    }
                    Ok(Some(Value::List(items)))
                }
                _ => {
                    let n = self.primitive_width();
                    let raw = check_read(src.read(n).await?, n, name)?;
                    self.decode_primitive(raw, name)
                }
            }
        })
    }
}

impl RecordType {
    /// Decode one record, awaiting each read in field order.
    pub fn unpack_async<'a, S: AsyncByteSource + 'a>(
        self: &'a Arc<Self>,
        src: &'a mut S,
    ) -> BoxFuture<'a, Result<Record>> {
        self.unpack_deferred(src)
    }

    /// Decode one record through the async `reader(n, &args)`.
    pub fn unpack_async_with<F, A, Fut>(
        self: &Arc<Self>,
        reader: F,
        args: A,
    ) -> BoxFuture<'static, Result<Record>>
    where
        F: FnMut(usize, &A) -> Fut + Send + 'static,
        A: Send + 'static,
        Fut: Future<Output = io::Result<Vec<u8>>> + Send + 'static,
    {
        let ty = Arc::clone(self);
        Box::pin(async move {
            let mut src = AsyncCallableSource::new(reader, args);
            ty.unpack_deferred(&mut src).await
        })
    }

    pub(crate) fn unpack_deferred<'a>(
        self: &'a Arc<Self>,
        src: &'a mut (dyn AsyncByteSource + 'a),
    ) -> BoxFuture<'a, Result<Record>> {
        Box::pin(async move {
            self.require_order()?;
            let mut values: Vec<Option<Value>> = vec![None; self.fields().len()];
            for (i, nf) in self.fields().iter().enumerate() {
                let name = self.qualified(i);
                let value = {
                    let scope = Scope::new(self, &values);
                    nf.field().unpack_deferred(&scope, &mut *src, &name).await?
                };
                values[i] = value;
            }
            self.from_decoded(values)
        })
    }
}
