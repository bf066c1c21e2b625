//! Metadata tokens (ECMA-335 II.22).
//!
//! A [`Token`] packs a table id and a row index into one 32-bit value; it is
//! the currency every instruction operand and resolver call uses to name a
//! type, method, field, string or standalone signature.

use std::fmt;

/// A metadata token referencing an entry in a metadata scope's tables.
///
/// Tokens are 32-bit values where:
/// - The high byte (bits 24-31) selects the table
/// - The low 24 bits (bits 0-23) are the row index within that table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table id from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_parts() {
        let token = Token::new(0x0600_002A);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.row(), 0x2A);
        assert!(!token.is_null());
        assert!(Token::new(0).is_null());
    }

    #[test]
    fn token_display() {
        assert_eq!(Token::new(0x0A00_0001).to_string(), "0x0a000001");
    }
}
