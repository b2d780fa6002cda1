//! Metadata tokens addressing the arenas of an image.
//!
//! A [`Token`] packs a [`TableId`] into its high byte and a 1-based row into the low 24 bits.

use std::fmt;
use std::hash::{Hash, Hasher};

use strum::{EnumCount, EnumIter, IntoEnumIterator};

/// Identifiers of the arenas an [`crate::metadata::image::Image`] stores symbols in.
///
/// The numeric values mirror the ECMA-335 metadata table ids, so a [`Token`] built from a
/// `TableId` reads like a regular metadata token (`0x06000001` is the first method).
#[derive(Clone, Copy, PartialEq, Debug, EnumIter, EnumCount, Eq, Hash)]
pub enum TableId {
    /// Modules of the image
    Module = 0x00,
    /// Module-local references to types defined in another module
    TypeRef = 0x01,
    /// Type definitions
    TypeDef = 0x02,
    /// Field definitions
    Field = 0x04,
    /// Method definitions
    MethodDef = 0x06,
    /// Module-local references to methods or fields defined in another module
    MemberRef = 0x0A,
}

impl TableId {
    /// Looks up the table id encoded in the high byte of a token.
    #[must_use]
    pub fn from_byte(value: u8) -> Option<Self> {
        TableId::iter().find(|table| *table as u8 == value)
    }
}

/// A metadata token representing a reference to an entity of the image.
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the 1-based row index within that table
///
/// Token identity is symbol identity: two structurally equal references imported into
/// different modules carry different tokens, which is what makes identity-based reference
/// search possible.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// The null token, which never names an entity
    pub const NULL: Token = Token(0);

    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a table id and a 1-based row
    #[must_use]
    pub fn from_parts(table: TableId, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the table id from the token, if the high byte names a known table
    #[must_use]
    pub fn table_id(&self) -> Option<TableId> {
        TableId::from_byte(self.table())
    }

    /// Returns true if the token belongs to `table`
    #[must_use]
    pub fn is_table(&self, table: TableId) -> bool {
        self.table() == table as u8 && !self.is_null()
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

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
