//! 8-bit text conversion (ISO 8859-1): every char in U+0000..=U+00FF maps to one byte.

use crate::error::{RecordError, Result};

pub fn encode(s: &str) -> Result<Vec<u8>> {
    s.chars()
        .map(|c| {
            u8::try_from(u32::from(c))
                .map_err(|_| RecordError::Encoding(format!("{:?} is not an 8-bit character", c)))
        })
        .collect()
}

pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
