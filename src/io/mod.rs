//! Low-level binary IO primitives for CIL and metadata decoding.
//!
//! This module provides the [`CilIO`] conversion trait together with free functions for
//! bounds-checked little-endian reads and the ECMA-335 compressed-integer write side.
//! The read side is consumed through [`crate::io::parser::Parser`]; the write side is
//! used by the signature encoders and the byte-stream code sink.

pub mod parser;

use crate::{metadata::token::Token, Result};

/// Conversion support between primitive values and their little-endian byte form.
///
/// Implemented for the fixed-width integers and floats that appear in CIL operands
/// and metadata signatures. All implementations are pure conversions without shared
/// state.
pub trait CilIO: Sized {
    /// The byte array type for this numeric type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
}

// Implement CilIO support for u64
impl CilIO for u64 {
    type Bytes = [u8; 8];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u64::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u64::to_le_bytes(self)
    }
}

// Implement CilIO support for i64
impl CilIO for i64 {
    type Bytes = [u8; 8];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        i64::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        i64::to_le_bytes(self)
    }
}

// Implement CilIO support for u32
impl CilIO for u32 {
    type Bytes = [u8; 4];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u32::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u32::to_le_bytes(self)
    }
}

// Implement CilIO support for i32
impl CilIO for i32 {
    type Bytes = [u8; 4];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        i32::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        i32::to_le_bytes(self)
    }
}

// Implement CilIO support for u16
impl CilIO for u16 {
    type Bytes = [u8; 2];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u16::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u16::to_le_bytes(self)
    }
}

// Implement CilIO support for i16
impl CilIO for i16 {
    type Bytes = [u8; 2];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        i16::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        i16::to_le_bytes(self)
    }
}

// Implement CilIO support for u8
impl CilIO for u8 {
    type Bytes = [u8; 1];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        bytes[0]
    }

    fn to_le_bytes(self) -> Self::Bytes {
        [self]
    }
}

// Implement CilIO support for i8
impl CilIO for i8 {
    type Bytes = [u8; 1];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        i8::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        i8::to_le_bytes(self)
    }
}

// Implement CilIO support for f32
impl CilIO for f32 {
    type Bytes = [u8; 4];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        f32::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        f32::to_le_bytes(self)
    }
}

// Implement CilIO support for f64
impl CilIO for f64 {
    type Bytes = [u8; 8];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        f64::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        f64::to_le_bytes(self)
    }
}

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer holds fewer bytes than `T` needs.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes read.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes at `offset`.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    if (type_len + *offset) > data.len() {
        return Err(crate::Error::OutOfBounds);
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(crate::Error::OutOfBounds);
    };

    *offset += type_len;

    Ok(T::from_le_bytes(read))
}

/// Appends a value of type `T` in little-endian byte order to a buffer.
pub fn write_le<T: CilIO>(value: T, buffer: &mut Vec<u8>)
where
    T::Bytes: AsRef<[u8]>,
{
    buffer.extend_from_slice(value.to_le_bytes().as_ref());
}

/// Appends an ECMA-335 II.23.2 compressed unsigned integer to a buffer.
///
/// Uses the smallest of the three encodings the value fits in:
/// - 0..=0x7F: 1 byte (`0xxxxxxx`)
/// - 0x80..=0x3FFF: 2 bytes (`10xxxxxx xxxxxxxx`)
/// - 0x4000..=0x1FFF_FFFF: 4 bytes (`110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx`)
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the value exceeds the 29-bit maximum
/// the format can represent.
pub fn write_compressed_uint(value: u32, buffer: &mut Vec<u8>) -> Result<()> {
    if value <= 0x7F {
        buffer.push(value as u8);
        return Ok(());
    }

    if value <= 0x3FFF {
        buffer.push(0x80 | (value >> 8) as u8);
        buffer.push((value & 0xFF) as u8);
        return Ok(());
    }

    if value <= 0x1FFF_FFFF {
        buffer.push(0xC0 | (value >> 24) as u8);
        buffer.push(((value >> 16) & 0xFF) as u8);
        buffer.push(((value >> 8) & 0xFF) as u8);
        buffer.push((value & 0xFF) as u8);
        return Ok(());
    }

    Err(malformed_error!(
        "Value {} exceeds compressed uint maximum",
        value
    ))
}

/// Appends an ECMA-335 II.23.2 compressed signed integer to a buffer.
///
/// The sign bit is rotated into the least significant position before the unsigned
/// encoding is applied.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the rotated value exceeds the encodable range.
pub fn write_compressed_int(value: i32, buffer: &mut Vec<u8>) -> Result<()> {
    let rotated = if value >= 0 {
        (value as u32) << 1
    } else {
        (((-value - 1) as u32) << 1) | 1
    };

    write_compressed_uint(rotated, buffer)
}

/// Appends a TypeDefOrRefOrSpec coded token (ECMA-335 II.23.2.8) to a buffer.
///
/// # Errors
/// Returns [`crate::Error::InvalidModifier`] if the token's table is not TypeDef (0x02),
/// TypeRef (0x01) or TypeSpec (0x1B).
pub fn write_compressed_token(token: Token, buffer: &mut Vec<u8>) -> Result<()> {
    let tag: u32 = match token.table() {
        0x02 => 0x0, // TypeDef
        0x01 => 0x1, // TypeRef
        0x1B => 0x2, // TypeSpec
        table => return Err(crate::Error::InvalidModifier(table)),
    };

    write_compressed_uint((token.row() << 2) | tag, buffer)
}
