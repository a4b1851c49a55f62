//! Byte-order policy of a record and the numeric read/write primitives behind it.
//!
//! The five policies follow the classic C struct layout modes. Only `NativePacked`
//! uses native sizes (it affects the C `long` kinds); the other four use standard sizes.
//! Alignment padding is never inserted: every field packs independently.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian, WriteBytesExt};
use std::fmt;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Native order, native size.
    #[default]
    NativePacked,
    /// Native order, standard size.
    NativeStandard,
    LittleEndian,
    BigEndian,
    /// Network order (big endian).
    Network,
}

impl ByteOrder {
    pub fn is_big_endian(self) -> bool {
        match self {
            ByteOrder::BigEndian | ByteOrder::Network => true,
            ByteOrder::LittleEndian => false,
            ByteOrder::NativePacked | ByteOrder::NativeStandard => cfg!(target_endian = "big"),
        }
    }

    /// True when primitive sizes follow the platform C ABI instead of the standard sizes.
    pub fn uses_native_size(self) -> bool {
        self == ByteOrder::NativePacked
    }

    /// The conventional single-character code of this policy.
    pub fn symbol(self) -> char {
        match self {
            ByteOrder::NativePacked => '@',
            ByteOrder::NativeStandard => '=',
            ByteOrder::LittleEndian => '<',
            ByteOrder::BigEndian => '>',
            ByteOrder::Network => '!',
        }
    }

    pub(crate) fn write_uint(self, w: &mut Vec<u8>, v: u64, width: usize) -> io::Result<()> {
        if self.is_big_endian() {
            w.write_uint::<BigEndian>(v, width)
        } else {
            w.write_uint::<LittleEndian>(v, width)
        }
    }

    pub(crate) fn write_int(self, w: &mut Vec<u8>, v: i64, width: usize) -> io::Result<()> {
        if self.is_big_endian() {
            w.write_int::<BigEndian>(v, width)
        } else {
            w.write_int::<LittleEndian>(v, width)
        }
    }

    pub(crate) fn write_f32(self, w: &mut Vec<u8>, v: f32) -> io::Result<()> {
        if self.is_big_endian() {
            w.write_f32::<BigEndian>(v)
        } else {
            w.write_f32::<LittleEndian>(v)
        }
    }

    pub(crate) fn write_f64(self, w: &mut Vec<u8>, v: f64) -> io::Result<()> {
        if self.is_big_endian() {
            w.write_f64::<BigEndian>(v)
        } else {
            w.write_f64::<LittleEndian>(v)
        }
    }

    /// `buf.len()` must be the field width (1..=8).
    pub(crate) fn read_uint(self, buf: &[u8]) -> u64 {
        if self.is_big_endian() {
            BigEndian::read_uint(buf, buf.len())
        } else {
            LittleEndian::read_uint(buf, buf.len())
        }
    }

    pub(crate) fn read_int(self, buf: &[u8]) -> i64 {
        if self.is_big_endian() {
            BigEndian::read_int(buf, buf.len())
        } else {
            LittleEndian::read_int(buf, buf.len())
        }
    }

    pub(crate) fn read_f32(self, buf: &[u8]) -> f32 {
        if self.is_big_endian() {
            BigEndian::read_f32(buf)
        } else {
            LittleEndian::read_f32(buf)
        }
    }

    pub(crate) fn read_f64(self, buf: &[u8]) -> f64 {
        if self.is_big_endian() {
            BigEndian::read_f64(buf)
        } else {
            LittleEndian::read_f64(buf)
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ByteOrder::NativePacked => "native packed",
            ByteOrder::NativeStandard => "native standard",
            ByteOrder::LittleEndian => "little endian",
            ByteOrder::BigEndian => "big endian",
            ByteOrder::Network => "network",
        };
        write!(f, "{} ('{}')", name, self.symbol())
    }
}
