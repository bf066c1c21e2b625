//! Shared fixtures for unit tests: an in-memory metadata scope.

use std::collections::HashMap;

use crate::metadata::resolver::{FieldDesc, MetadataResolver, MethodDesc, TypeDesc};
use crate::metadata::signatures::{FieldSignature, MethodSignature};
use crate::metadata::token::Token;
use crate::Result;

/// A metadata scope backed by hash maps, populated by hand in tests.
#[derive(Default)]
pub struct ScopeFixture {
    pub types: HashMap<Token, TypeDesc>,
    pub methods: HashMap<Token, MethodDesc>,
    pub fields: HashMap<Token, FieldDesc>,
    pub strings: HashMap<Token, String>,
    pub signatures: HashMap<Token, Vec<u8>>,
}

impl ScopeFixture {
    pub fn new() -> Self {
        ScopeFixture::default()
    }

    pub fn with_method(mut self, token: u32, name: &str, signature: MethodSignature) -> Self {
        let token = Token::new(token);
        self.methods.insert(
            token,
            MethodDesc {
                token,
                name: name.to_string(),
                signature,
                declaring_type: None,
                base_definition: None,
            },
        );
        self
    }

    pub fn with_field(mut self, token: u32, name: &str, signature: FieldSignature) -> Self {
        let token = Token::new(token);
        self.fields.insert(
            token,
            FieldDesc {
                token,
                name: name.to_string(),
                signature,
            },
        );
        self
    }

    pub fn with_signature(mut self, token: u32, blob: Vec<u8>) -> Self {
        self.signatures.insert(Token::new(token), blob);
        self
    }

    pub fn with_base_definition(mut self, token: u32, base: u32) -> Self {
        if let Some(method) = self.methods.get_mut(&Token::new(token)) {
            method.base_definition = Some(Token::new(base));
        }
        self
    }
}

impl MetadataResolver for ScopeFixture {
    fn resolve_type(&self, token: Token) -> Result<TypeDesc> {
        self.types
            .get(&token)
            .cloned()
            .ok_or(crate::Error::TokenNotFound(token))
    }

    fn resolve_method(&self, token: Token) -> Result<MethodDesc> {
        self.methods
            .get(&token)
            .cloned()
            .ok_or(crate::Error::TokenNotFound(token))
    }

    fn resolve_field(&self, token: Token) -> Result<FieldDesc> {
        self.fields
            .get(&token)
            .cloned()
            .ok_or(crate::Error::TokenNotFound(token))
    }

    fn resolve_string(&self, token: Token) -> Result<String> {
        self.strings
            .get(&token)
            .cloned()
            .ok_or(crate::Error::TokenNotFound(token))
    }

    fn resolve_signature(&self, token: Token) -> Result<Vec<u8>> {
        self.signatures
            .get(&token)
            .cloned()
            .ok_or(crate::Error::TokenNotFound(token))
    }
}
