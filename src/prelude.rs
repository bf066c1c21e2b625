//! # cilweave Prelude
//!
//! A curated selection of the most frequently used types from across the
//! crate, for convenient glob imports.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all engine operations
pub use crate::Error;

/// The result type used throughout the crate
pub use crate::Result;

// ================================================================================================
// Instruction Model
// ================================================================================================

pub use crate::disassembler::{
    decode_instruction, Disassembler, FlowType, Instruction, Label, LabelProvider, OpCode,
    Operand, OperandKind, ProviderId, StackPop, StackPush,
};

// ================================================================================================
// Method Bodies
// ================================================================================================

pub use crate::body::emit::{BytesSink, CodeSink, EmitOperand, MemberKind};
pub use crate::body::stack::{StackEntry, StackEntryKind, StackIterator};
pub use crate::body::MethodBody;

// ================================================================================================
// Metadata
// ================================================================================================

pub use crate::io::parser::Parser;
pub use crate::metadata::resolver::{
    FieldDesc, MemberDesc, MetadataResolver, MethodDesc, NullResolver, TypeDesc,
};
pub use crate::metadata::signatures::{
    encode_method_signature, encode_signature, CallingConvention, CustomModifier, FieldSignature,
    MethodSignature, PropertySignature, Signature, SignatureParameter, SignatureParser,
    TypeSignature,
};
pub use crate::metadata::token::Token;
