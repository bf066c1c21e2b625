//! Bounds-checked byte cursor for CIL and metadata decoding.
//!
//! [`Parser`] is a cursor over a byte slice with position tracking, peeking, and the
//! ECMA-335 compressed encodings (II.23.2) needed by the signature decoder and
//! instruction disassembler. All operations validate data availability before reading;
//! malformed or truncated input surfaces [`crate::Error::OutOfBounds`] or
//! [`crate::Error::Malformed`], never garbage values.

use crate::{
    io::{read_le_at, CilIO},
    metadata::token::Token,
    Result,
};

/// A cursor-based binary reader for instruction streams and signature blobs.
///
/// The parser maintains a position within a borrowed byte slice and provides
/// strongly typed, bounds-checked reads in little-endian order, plus the
/// compressed integer and coded-token encodings defined by ECMA-335.
///
/// # Examples
///
/// ```
/// use cilweave::io::parser::Parser;
///
/// let data = [0x01, 0x02, 0x03, 0x04];
/// let mut parser = Parser::new(&data);
/// let value = parser.read_le::<u16>()?;
/// assert_eq!(value, 0x0201);
/// # Ok::<(), cilweave::Error>(())
/// ```
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(crate::Error::OutOfBounds);
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by one byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing would exceed the data length.
    pub fn advance(&mut self) -> Result<()> {
        self.advance_by(1)
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by `step` would exceed the
    /// data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        if self.position + step > self.data.len() {
            return Err(crate::Error::OutOfBounds);
        }

        self.position += step;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the position is at or beyond the data
    /// length.
    pub fn peek_byte(&self) -> Result<u8> {
        if self.position >= self.data.len() {
            return Err(crate::Error::OutOfBounds);
        }
        Ok(self.data[self.position])
    }

    /// Execute a closure transactionally, rolling back the position on failure.
    ///
    /// # Errors
    /// Propagates whatever error the closure returns; the cursor is restored to its
    /// prior position in that case.
    pub fn transactional<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_position = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = saved_position;
        }
        result
    }

    /// Read a type `T` from the current position in little-endian format and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a compressed unsigned integer as defined in ECMA-335 II.23.2.
    ///
    /// - Values 0-0x7F: 1 byte (`0xxxxxxx`)
    /// - Values up to 0x3FFF: 2 bytes (`10xxxxxx xxxxxxxx`)
    /// - Values up to 0x1FFFFFFF: 4 bytes (`110xxxxx` + 3 bytes)
    ///
    /// Any other bit-7-set pattern (`111xxxxx`) is invalid.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for an invalid leading byte.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_le::<u8>()?;

        // 1-byte encoding: 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        // 2-byte encoding: 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_le::<u8>()?;
            let value = ((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte);
            return Ok(value);
        }

        // 4-byte encoding: 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let b1 = u32::from(self.read_le::<u8>()?);
            let b2 = u32::from(self.read_le::<u8>()?);
            let b3 = u32::from(self.read_le::<u8>()?);
            let value = ((u32::from(first_byte) & 0x1F) << 24) | (b1 << 16) | (b2 << 8) | b3;
            return Ok(value);
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Read a compressed signed integer as defined in ECMA-335 II.23.2.
    ///
    /// Same variable-length encoding as the unsigned form, with the sign bit rotated
    /// into the least significant position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for an invalid encoding.
    pub fn read_compressed_int(&mut self) -> Result<i32> {
        let unsigned = self.read_compressed_uint()?;

        let signed = if (unsigned & 1) == 0 {
            #[allow(clippy::cast_possible_wrap)]
            let result = (unsigned >> 1) as i32;
            result
        } else {
            #[allow(clippy::cast_possible_wrap)]
            let result = -((unsigned >> 1) as i32 + 1);
            result
        };

        Ok(signed)
    }

    /// Read a compressed coded token as defined in ECMA-335 II.23.2.8
    /// (`TypeDefOrRefOrSpecEncoded`).
    ///
    /// The 2 lowest bits select the table (TypeDef/TypeRef/TypeSpec), the remaining
    /// bits are the row index. Tag 0x3 is reserved and rejected.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for the reserved tag.
    pub fn read_compressed_token(&mut self) -> Result<Token> {
        let compressed_token = self.read_compressed_uint()?;

        let table: u32 = match compressed_token & 0x3 {
            0x0 => 0x0200_0000, // TypeDef
            0x1 => 0x0100_0000, // TypeRef
            0x2 => 0x1B00_0000, // TypeSpec
            _ => {
                return Err(malformed_error!(
                    "Invalid compressed token - {}",
                    compressed_token
                ))
            }
        };

        let table_index = compressed_token >> 2;

        Ok(Token::new(table + table_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_le_sequence() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_le::<u32>().unwrap(), 0x0403_0201);
        parser.seek(6).unwrap();
        assert_eq!(parser.read_le::<u16>().unwrap(), 0x0807);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn peek_does_not_advance() {
        let data = [0x0A, 0x0B];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.peek_byte().unwrap(), 0x0A);
        assert_eq!(parser.pos(), 0);
        assert_eq!(parser.read_le::<u8>().unwrap(), 0x0A);
        assert_eq!(parser.pos(), 1);
    }

    #[test]
    fn compressed_uint_forms() {
        let mut parser = Parser::new(&[0x7F]);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x7F);

        let mut parser = Parser::new(&[0x80, 0x80]);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x80);

        let mut parser = Parser::new(&[0xC0, 0x00, 0x40, 0x00]);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x4000);

        // 111xxxxx leading byte is not a valid encoding
        let mut parser = Parser::new(&[0xE0, 0x00, 0x00, 0x00]);
        assert!(parser.read_compressed_uint().is_err());
    }

    #[test]
    fn compressed_int_sign_rotation() {
        let mut parser = Parser::new(&[20]);
        assert_eq!(parser.read_compressed_int().unwrap(), 10);

        let mut parser = Parser::new(&[9]);
        assert_eq!(parser.read_compressed_int().unwrap(), -5);
    }

    #[test]
    fn compressed_token_tables() {
        // TypeRef token (tag 0x1, index 1) encoded as (1 << 2) | 0x1 = 5
        let mut parser = Parser::new(&[5]);
        assert_eq!(
            parser.read_compressed_token().unwrap(),
            Token::new(0x0100_0001)
        );

        // Reserved tag 0x3
        let mut parser = Parser::new(&[0x07]);
        assert!(parser.read_compressed_token().is_err());
    }

    #[test]
    fn transactional_rolls_back() {
        let data = [0x01];
        let mut parser = Parser::new(&data);

        let result: Result<u32> = parser.transactional(|p| p.read_le());
        assert!(result.is_err());
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn truncated_reads_fail() {
        let mut parser = Parser::new(&[0x80]);
        assert!(parser.read_compressed_uint().is_err());

        let mut parser = Parser::new(&[]);
        assert!(parser.peek_byte().is_err());
    }
}
