// Copyright 2026 cilweave contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # cilweave
//!
//! A CIL (Common Intermediate Language) bytecode engine: decode raw ECMA-335
//! instruction streams into a structured, editable model, decode and re-encode
//! the binary metadata signatures that describe methods, fields and properties,
//! infer the abstract operand-stack shape per instruction, and re-emit the
//! edited model as bytes against a target metadata scope.
//!
//! ## Features
//!
//! - **Instruction decoding** - All one-byte and `0xFE`-prefixed opcodes with
//!   validated operands, plus a lenient scanning mode for mixed code/data
//! - **Editable method bodies** - Insert, remove and replace instructions while
//!   branch labels stay consistent automatically
//! - **Signature codec** - ECMA-335 II.23.2 compressed method/field/property
//!   signatures, decode and encode
//! - **Stack inference** - A miniature abstract interpreter reproducing the
//!   runtime's binary-operator type tables
//! - **Structural rewriting** - Field-to-parameter conversion, call-site
//!   discovery, short/long opcode canonicalization
//!
//! ## Quick Start
//!
//! ```rust
//! use cilweave::prelude::*;
//!
//! // ldarg.0 / ldarg.1 / add / ret
//! let code = [0x02, 0x03, 0x58, 0x2A];
//! let signature = MethodSignature {
//!     return_type: SignatureParameter::plain(TypeSignature::I4),
//!     params: vec![
//!         SignatureParameter::plain(TypeSignature::I4),
//!         SignatureParameter::plain(TypeSignature::I4),
//!     ],
//!     ..MethodSignature::default()
//! };
//!
//! let body = MethodBody::from_bytes(&code, signature, Vec::new())?;
//! assert_eq!(body.len(), 4);
//!
//! let bytes = body.to_bytes(&NullResolver)?;
//! assert_eq!(bytes, code);
//! # Ok::<(), cilweave::Error>(())
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared fixtures used by unit tests across the crate.
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use cilweave::prelude::*;
///
/// let mut parser = Parser::new(&[0x2A]); // ret
/// let instruction = decode_instruction(&mut parser)?;
/// assert_eq!(instruction.opcode.mnemonic, "ret");
/// # Ok::<(), cilweave::Error>(())
/// ```
pub mod prelude;

/// Bounds-checked binary IO: the little-endian conversion trait, the cursor
/// [`io::parser::Parser`], and the ECMA-335 compressed-integer writers.
pub mod io;

/// Metadata primitives: tokens, the [`metadata::resolver::MetadataResolver`]
/// interface, and the ECMA-335 signature model with its decoder and encoders.
pub mod metadata;

/// The instruction model: opcode tables, decoded instructions with validated
/// operands, branch labels, and the stream decoder.
///
/// # Examples
///
/// ```rust
/// use cilweave::disassembler::{decode_instruction, opcodes};
/// use cilweave::io::parser::Parser;
///
/// let bytecode = [0x00, 0x2A]; // nop, ret
/// let mut parser = Parser::new(&bytecode);
/// let instruction = decode_instruction(&mut parser)?;
/// assert_eq!(instruction.opcode, opcodes::NOP);
/// # Ok::<(), cilweave::Error>(())
/// ```
pub mod disassembler;

/// Editable method bodies: branch-label maintenance across edits, structural
/// rewriting, stack-shape inference and code emission.
pub mod body;

pub use crate::body::emit::{BytesSink, CodeSink, EmitOperand, MemberKind};
pub use crate::body::stack::{StackEntry, StackEntryKind, StackIterator};
pub use crate::body::MethodBody;
pub use crate::disassembler::{
    decode_instruction, Disassembler, Instruction, Label, LabelProvider, Operand, ProviderId,
};
pub use crate::error::Error;
pub use crate::metadata::resolver::{
    FieldDesc, MemberDesc, MetadataResolver, MethodDesc, NullResolver, TypeDesc,
};
pub use crate::metadata::signatures::{
    FieldSignature, MethodSignature, PropertySignature, Signature, SignatureParameter,
    SignatureParser, TypeSignature,
};
pub use crate::metadata::token::Token;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
