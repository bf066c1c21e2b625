//! ECMA-335 metadata signature decoding and encoding.
//!
//! Signatures are the compressed binary descriptors attached to methods, fields and
//! properties (ECMA-335 II.23.2). This module decodes them into a structured,
//! immutable model and re-encodes that model byte-for-byte.
//!
//! # Key Types
//! - [`Signature`] - Tagged union over the method/field/property families
//! - [`MethodSignature`] - Calling convention, return, parameters, vararg sentinel
//! - [`TypeSignature`] - Recursive type description (primitives, tokens, generics, arrays)
//! - [`SignatureParser`] - Blob → model decoder
//!
//! # Example
//! ```
//! use cilweave::metadata::signatures::{SignatureParser, TypeSignature};
//! // instance string M(int32)
//! let blob = [0x20, 0x01, 0x0E, 0x08];
//! let method = SignatureParser::new(&blob).parse_method_signature()?;
//! assert_eq!(method.return_type.base, TypeSignature::String);
//! # Ok::<(), cilweave::Error>(())
//! ```

mod encoders;
mod parser;
mod types;

pub use encoders::{
    encode_field_signature, encode_method_signature, encode_property_signature, encode_signature,
    encode_type,
};
pub use parser::SignatureParser;
pub use types::{
    ArrayDimension, ArrayShape, CallingConvention, CustomModifier, FieldSignature, MethodSignature,
    Pointer, PropertySignature, Signature, SignatureParameter, SzArray, TypeSignature,
    ELEMENT_TYPE,
};
