//! Input sources for unpacking.
//!
//! Everything `unpack` accepts is normalized into one capability, [`ByteSource::read`]:
//! return up to `n` bytes, fewer meaning the source has nothing more to give. The record
//! engine turns a short read into [`RecordError::TruncatedInput`]; adapters never pad.
//!
//! | Source | Adapter |
//! |--------|---------|
//! | `&[u8]`, `Vec<u8>`, `&[u8; N]` | [`BufferSource`] |
//! | `&str`, `String` (8-bit text) | [`BufferSource`] |
//! | reader function + forwarded arguments | [`CallableSource`] |
//! | any [`std::io::Read`] | [`ReaderSource`] |
//! | an existing [`ByteSource`] | passed through |

use crate::error::{RecordError, Result};
use crate::text;
use std::any::Any;
use std::borrow::Cow;
use std::io::{self, Read};

/// Upper bound on the buffer reserved up front for one reader call. Requested sizes come from
/// the wire, so larger reads grow as bytes arrive.
pub(crate) const READ_CHUNK: usize = 8 * 1024;

pub trait ByteSource {
    /// Read up to `n` bytes.
    fn read(&mut self, n: usize) -> Result<Vec<u8>>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        (**self).read(n)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        (**self).read(n)
    }
}

/// Read exactly `n` bytes for `field`, or fail with `TruncatedInput`.
pub(crate) fn read_exact(src: &mut dyn ByteSource, n: usize, field: &str) -> Result<Vec<u8>> {
    let buf = src.read(n)?;
    check_read(buf, n, field)
}

pub(crate) fn check_read(buf: Vec<u8>, n: usize, field: &str) -> Result<Vec<u8>> {
    if buf.len() < n {
        return Err(RecordError::TruncatedInput {
            field: field.to_string(),
            expected: n,
            got: buf.len(),
        });
    }
    if buf.len() > n {
        return Err(RecordError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("source returned {} bytes for a {}-byte read of {}", buf.len(), n, field),
        )));
    }
    Ok(buf)
}

/// In-memory bytes with a cursor.
#[derive(Debug, Clone)]
pub struct BufferSource<'a> {
    buf: Cow<'a, [u8]>,
    pos: usize,
}

impl<'a> BufferSource<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        BufferSource {
            buf: Cow::Borrowed(buf),
            pos: 0,
        }
    }

    pub fn owned(buf: Vec<u8>) -> BufferSource<'static> {
        BufferSource {
            buf: Cow::Owned(buf),
            pos: 0,
        }
    }

    /// 8-bit text, one byte per character.
    pub fn from_text(s: &str) -> Result<BufferSource<'static>> {
        Ok(BufferSource::owned(text::encode(s)?))
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

impl ByteSource for BufferSource<'_> {
    fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        let end = self.pos.saturating_add(n).min(self.buf.len());
        let out = self.buf[self.pos..end].to_vec();
        self.pos = end;
        Ok(out)
    }
}

/// A reader function invoked as `reader(n, &args)` for every read, with the same `args`
/// each time (e.g. a socket handle and a timeout).
pub struct CallableSource<F, A> {
    reader: F,
    args: A,
}

impl<F, A> CallableSource<F, A>
where
    F: FnMut(usize, &A) -> io::Result<Vec<u8>>,
{
    pub fn new(reader: F, args: A) -> Self {
        CallableSource { reader, args }
    }
}

impl<F, A> ByteSource for CallableSource<F, A>
where
    F: FnMut(usize, &A) -> io::Result<Vec<u8>>,
{
    fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok((self.reader)(n, &self.args)?)
    }
}

/// Any [`Read`]; a read returns fewer than `n` bytes only at end of stream.
#[derive(Debug)]
pub struct ReaderSource<R> {
    inner: R,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        ReaderSource { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(n.min(READ_CHUNK));
        (&mut self.inner).take(n as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Conversion into a [`ByteSource`]. Fails eagerly, before any field is read.
pub trait IntoByteSource {
    type Source: ByteSource;

    fn into_source(self) -> Result<Self::Source>;
}

impl<'a> IntoByteSource for &'a [u8] {
    type Source = BufferSource<'a>;

    fn into_source(self) -> Result<Self::Source> {
        Ok(BufferSource::new(self))
    }
}

impl<'a, const N: usize> IntoByteSource for &'a [u8; N] {
    type Source = BufferSource<'a>;

    fn into_source(self) -> Result<Self::Source> {
        Ok(BufferSource::new(self))
    }
}

impl<'a> IntoByteSource for &'a Vec<u8> {
    type Source = BufferSource<'a>;

    fn into_source(self) -> Result<Self::Source> {
        Ok(BufferSource::new(self))
    }
}

impl IntoByteSource for Vec<u8> {
    type Source = BufferSource<'static>;

    fn into_source(self) -> Result<Self::Source> {
        Ok(BufferSource::owned(self))
    }
}

impl IntoByteSource for &str {
    type Source = BufferSource<'static>;

    fn into_source(self) -> Result<Self::Source> {
        BufferSource::from_text(self)
    }
}

impl IntoByteSource for String {
    type Source = BufferSource<'static>;

    fn into_source(self) -> Result<Self::Source> {
        BufferSource::from_text(&self)
    }
}

impl<'a, S: ByteSource + ?Sized> IntoByteSource for &'a mut S {
    type Source = &'a mut S;

    fn into_source(self) -> Result<Self::Source> {
        Ok(self)
    }
}

impl<'a> IntoByteSource for BufferSource<'a> {
    type Source = BufferSource<'a>;

    fn into_source(self) -> Result<Self::Source> {
        Ok(self)
    }
}

impl<F, A> IntoByteSource for CallableSource<F, A>
where
    F: FnMut(usize, &A) -> io::Result<Vec<u8>>,
{
    type Source = Self;

    fn into_source(self) -> Result<Self::Source> {
        Ok(self)
    }
}

impl<R: Read> IntoByteSource for ReaderSource<R> {
    type Source = Self;

    fn into_source(self) -> Result<Self::Source> {
        Ok(self)
    }
}

impl<'a> IntoByteSource for Box<dyn ByteSource + 'a> {
    type Source = Self;

    fn into_source(self) -> Result<Self::Source> {
        Ok(self)
    }
}

/// A reader function without extra arguments, as accepted by [`from_any`].
pub type ReadFn = Box<dyn FnMut(usize) -> io::Result<Vec<u8>>>;

/// Adapt a dynamically typed source. Accepts `Box<dyn ByteSource>`, [`ReadFn`], `Vec<u8>`,
/// `String`, `&'static [u8]` and `&'static str`; anything else is `UnsupportedSourceType`.
pub fn from_any(source: Box<dyn Any>) -> Result<Box<dyn ByteSource>> {
    let source = match source.downcast::<Box<dyn ByteSource>>() {
        Ok(s) => return Ok(*s),
        Err(other) => other,
    };
    let source = match source.downcast::<ReadFn>() {
        Ok(mut f) => {
            return Ok(Box::new(CallableSource::new(
                move |n: usize, _: &()| f(n),
                (),
            )))
        }
        Err(other) => other,
    };
    let source = match source.downcast::<Vec<u8>>() {
        Ok(buf) => return Ok(Box::new(BufferSource::owned(*buf))),
        Err(other) => other,
    };
    let source = match source.downcast::<&'static [u8]>() {
        Ok(buf) => return Ok(Box::new(BufferSource::new(*buf))),
        Err(other) => other,
    };
    let source = match source.downcast::<String>() {
        Ok(s) => return Ok(Box::new(BufferSource::from_text(&s)?)),
        Err(other) => other,
    };
    match source.downcast::<&'static str>() {
        Ok(s) => Ok(Box::new(BufferSource::from_text(*s)?)),
        Err(other) => Err(RecordError::UnsupportedSourceType(format!(
            "{:?} is not a byte buffer, text, reader function or byte source",
            (*other).type_id()
        ))),
    }
}
