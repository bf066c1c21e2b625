//! CIL instruction model: opcode tables, decoded instructions, branch labels
//! and the stream decoder.
//!
//! The types here are deliberately free of metadata context. An
//! [`Instruction`] can be decoded, inspected, normalized and re-encoded
//! without knowing which method it came from; method-level concerns such as
//! branch relocation and stack inference live in [`crate::body`].

mod decoder;
mod instruction;
mod label;
pub mod opcodes;

pub use decoder::{decode_instruction, Disassembler};
pub use instruction::{Instruction, Operand};
pub use label::{Label, LabelProvider, ProviderId};
pub use opcodes::{FlowType, OpCode, OperandKind, StackPop, StackPush};
