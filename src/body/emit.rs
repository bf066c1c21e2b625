//! Code emission: one sink call per instruction, operand already classified.
//!
//! A [`CodeSink`] is the narrow interface a destination metadata scope
//! implements to receive re-encoded instructions. Branch operands arrive as
//! final byte displacements, variable indices in their narrow or wide width,
//! member references with the kind the opcode implies, and `calli` signatures
//! with both the source token and the raw blob so the sink can re-encode the
//! blob against its own scope. [`BytesSink`] is the built-in sink producing
//! raw CIL bytes.

use crate::disassembler::{OpCode, OperandKind};
use crate::io::write_le;
use crate::metadata::token::Token;
use crate::Result;

/// The member kind an instruction's token operand refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// TypeDef/TypeRef/TypeSpec
    Type,
    /// Method definition, reference or instantiation
    Method,
    /// Field definition or reference
    Field,
    /// Constructor (`newobj` target)
    Constructor,
}

impl MemberKind {
    /// Classifies a token operand from the opcode's declared kind, falling
    /// back to the token's table for `ldtoken`-style any-member operands.
    #[must_use]
    pub fn classify(opcode: OpCode, token: Token) -> MemberKind {
        if opcode.code == 0x73 && opcode.prefix == 0 {
            return MemberKind::Constructor;
        }
        match opcode.operand_kind {
            OperandKind::Method => MemberKind::Method,
            OperandKind::Field => MemberKind::Field,
            OperandKind::Type => MemberKind::Type,
            _ => match token.table() {
                0x01 | 0x02 | 0x1B => MemberKind::Type,
                0x04 => MemberKind::Field,
                _ => MemberKind::Method,
            },
        }
    }
}

/// One classified operand, handed to a sink together with its opcode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmitOperand<'a> {
    /// No operand
    None,
    /// 8-bit immediate
    Int8(i8),
    /// 32-bit immediate
    Int32(i32),
    /// 64-bit immediate
    Int64(i64),
    /// 32-bit float immediate
    Float32(f32),
    /// 64-bit float immediate
    Float64(f64),
    /// User-string token
    String(Token),
    /// Final branch displacement from the end of the instruction
    Branch(i32),
    /// 8-bit variable index
    VariableNarrow(u8),
    /// 16-bit variable index
    VariableWide(u16),
    /// Member reference
    Member(MemberKind, Token),
    /// Standalone signature: source token plus the raw blob for re-encoding
    Signature {
        /// The token in the source scope
        token: Token,
        /// The signature blob the token resolves to
        blob: &'a [u8],
    },
    /// Switch jump table of final displacements
    Switch(&'a [i32]),
}

/// Receives one call per emitted instruction.
pub trait CodeSink {
    /// Emits a single instruction.
    fn emit(&mut self, opcode: OpCode, operand: EmitOperand<'_>) -> Result<()>;
}

/// A sink that produces the raw CIL byte encoding.
#[derive(Default)]
pub struct BytesSink {
    buffer: Vec<u8>,
}

impl BytesSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        BytesSink::default()
    }

    /// Consumes the sink and returns the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Bytes emitted so far.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }
}

impl CodeSink for BytesSink {
    fn emit(&mut self, opcode: OpCode, operand: EmitOperand<'_>) -> Result<()> {
        if opcode.prefix == 0xFE {
            self.buffer.push(0xFE);
        }
        self.buffer.push(opcode.code);

        match operand {
            EmitOperand::None => {}
            EmitOperand::Int8(value) => write_le(value, &mut self.buffer),
            EmitOperand::Int32(value) => write_le(value, &mut self.buffer),
            EmitOperand::Int64(value) => write_le(value, &mut self.buffer),
            EmitOperand::Float32(value) => write_le(value, &mut self.buffer),
            EmitOperand::Float64(value) => write_le(value, &mut self.buffer),
            EmitOperand::String(token)
            | EmitOperand::Member(_, token)
            | EmitOperand::Signature { token, .. } => write_le(token.value(), &mut self.buffer),
            EmitOperand::Branch(displacement) => {
                if opcode.operand_kind == OperandKind::BranchTarget8 {
                    let Ok(short) = i8::try_from(displacement) else {
                        return Err(malformed_error!(
                            "Branch displacement {} does not fit the short form of {}",
                            displacement,
                            opcode.mnemonic
                        ));
                    };
                    write_le(short, &mut self.buffer);
                } else {
                    write_le(displacement, &mut self.buffer);
                }
            }
            EmitOperand::VariableNarrow(index) => write_le(index, &mut self.buffer),
            EmitOperand::VariableWide(index) => write_le(index, &mut self.buffer),
            EmitOperand::Switch(displacements) => {
                let count = u32::try_from(displacements.len())
                    .map_err(|_| malformed_error!("Switch table too large"))?;
                write_le(count, &mut self.buffer);
                for displacement in displacements {
                    write_le(*displacement, &mut self.buffer);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disassembler::opcodes;

    #[test]
    fn bytes_sink_encodes_operands() {
        let mut sink = BytesSink::new();
        sink.emit(opcodes::LDARG_0, EmitOperand::None).unwrap();
        sink.emit(opcodes::LDC_I4, EmitOperand::Int32(7)).unwrap();
        sink.emit(opcodes::BR_S, EmitOperand::Branch(-2)).unwrap();
        sink.emit(opcodes::CEQ, EmitOperand::None).unwrap();
        sink.emit(
            opcodes::CALL,
            EmitOperand::Member(MemberKind::Method, Token::new(0x0A00_0001)),
        )
        .unwrap();

        assert_eq!(
            sink.bytes(),
            &[
                0x02, // ldarg.0
                0x20, 0x07, 0x00, 0x00, 0x00, // ldc.i4 7
                0x2B, 0xFE, // br.s -2
                0xFE, 0x01, // ceq
                0x28, 0x01, 0x00, 0x00, 0x0A, // call
            ]
        );
    }

    #[test]
    fn bytes_sink_encodes_switch() {
        let mut sink = BytesSink::new();
        sink.emit(opcodes::SWITCH, EmitOperand::Switch(&[2, -9])).unwrap();

        assert_eq!(
            sink.bytes(),
            &[0x45, 0x02, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0xF7, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn short_branch_displacement_must_fit() {
        let mut sink = BytesSink::new();
        assert!(sink.emit(opcodes::BR_S, EmitOperand::Branch(300)).is_err());
    }

    #[test]
    fn member_classification() {
        assert_eq!(
            MemberKind::classify(opcodes::NEWOBJ, Token::new(0x0600_0001)),
            MemberKind::Constructor
        );
        assert_eq!(
            MemberKind::classify(opcodes::CALL, Token::new(0x0A00_0001)),
            MemberKind::Method
        );
        assert_eq!(
            MemberKind::classify(opcodes::LDFLD, Token::new(0x0400_0001)),
            MemberKind::Field
        );
        assert_eq!(
            MemberKind::classify(opcodes::LDTOKEN, Token::new(0x0200_0001)),
            MemberKind::Type
        );
        assert_eq!(
            MemberKind::classify(opcodes::LDTOKEN, Token::new(0x0400_0001)),
            MemberKind::Field
        );
    }
}
