//! Narrow resolution interface between the bytecode engine and a metadata scope.
//!
//! The engine never owns metadata tables; whatever hosts the instruction stream
//! (an assembly loader, a test fixture, a remapping layer) implements
//! [`MetadataResolver`] and hands out member descriptions keyed by [`Token`].
//! The interface is deliberately opaque-handle based and independent of any
//! runtime reflection API.

use crate::{
    metadata::{
        signatures::{FieldSignature, MethodSignature},
        token::Token,
    },
    Result,
};

/// Description of a resolved type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDesc {
    /// Token of the type within its scope
    pub token: Token,
    /// Type name for diagnostics
    pub name: String,
}

/// Description of a resolved method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDesc {
    /// Token of the method within its scope
    pub token: Token,
    /// Method name for diagnostics
    pub name: String,
    /// The decoded method signature
    pub signature: MethodSignature,
    /// Token of the type declaring this method, when the scope knows it
    pub declaring_type: Option<Token>,
    /// The next method up the hide-by-signature base-definition chain, if any.
    /// Walking this chain from an override reaches the original declaration.
    pub base_definition: Option<Token>,
}

/// Description of a resolved field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesc {
    /// Token of the field within its scope
    pub token: Token,
    /// Field name for diagnostics
    pub name: String,
    /// The decoded field signature
    pub signature: FieldSignature,
}

/// A resolved member of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberDesc {
    /// A type reference
    Type(TypeDesc),
    /// A method reference
    Method(MethodDesc),
    /// A field reference
    Field(FieldDesc),
}

/// Resolution of metadata tokens against one scope.
///
/// Every method fails with [`crate::Error::TokenNotFound`] when the token is absent
/// from the scope; the engine never substitutes defaults for missing members.
pub trait MetadataResolver {
    /// Resolve a type token (TypeDef/TypeRef/TypeSpec).
    fn resolve_type(&self, token: Token) -> Result<TypeDesc>;

    /// Resolve a method token (MethodDef/MemberRef/MethodSpec).
    fn resolve_method(&self, token: Token) -> Result<MethodDesc>;

    /// Resolve a field token (Field/MemberRef).
    fn resolve_field(&self, token: Token) -> Result<FieldDesc>;

    /// Resolve a token that may name a type, method or field.
    fn resolve_member(&self, token: Token) -> Result<MemberDesc> {
        if let Ok(method) = self.resolve_method(token) {
            return Ok(MemberDesc::Method(method));
        }
        if let Ok(field) = self.resolve_field(token) {
            return Ok(MemberDesc::Field(field));
        }

        Ok(MemberDesc::Type(self.resolve_type(token)?))
    }

    /// Resolve a user-string token to its literal value.
    fn resolve_string(&self, token: Token) -> Result<String>;

    /// Resolve a standalone-signature token to its raw blob bytes.
    fn resolve_signature(&self, token: Token) -> Result<Vec<u8>>;
}

/// A resolver bound to no scope at all: every lookup fails with
/// [`crate::Error::TokenNotFound`].
///
/// Useful for re-encoding bodies that carry no `calli` signatures and for
/// call-site scans that match tokens directly.
pub struct NullResolver;

impl MetadataResolver for NullResolver {
    fn resolve_type(&self, token: Token) -> Result<TypeDesc> {
        Err(crate::Error::TokenNotFound(token))
    }

    fn resolve_method(&self, token: Token) -> Result<MethodDesc> {
        Err(crate::Error::TokenNotFound(token))
    }

    fn resolve_field(&self, token: Token) -> Result<FieldDesc> {
        Err(crate::Error::TokenNotFound(token))
    }

    fn resolve_string(&self, token: Token) -> Result<String> {
        Err(crate::Error::TokenNotFound(token))
    }

    fn resolve_signature(&self, token: Token) -> Result<Vec<u8>> {
        Err(crate::Error::TokenNotFound(token))
    }
}
