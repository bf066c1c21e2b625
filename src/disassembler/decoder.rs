//! CIL instruction decoding.
//!
//! [`decode_instruction`] decodes a single instruction at a parser's current
//! position. [`Disassembler`] walks a whole instruction stream with an explicit
//! cursor, optionally treating the first undecodable byte as the end of the
//! stream instead of failing, which tolerates a truncated tail.

use crate::disassembler::instruction::{Instruction, Operand};
use crate::disassembler::label::Label;
use crate::disassembler::opcodes::{self, OperandKind};
use crate::io::parser::Parser;
use crate::metadata::token::Token;
use crate::Result;

/// Decodes the instruction at the parser's current position, advancing past it.
///
/// ## Errors
/// Fails on unknown or reserved opcodes and on operand bytes that run past the
/// end of the stream.
///
/// ## Examples
///
/// ```rust
/// use cilweave::disassembler::{decode_instruction, opcodes};
/// use cilweave::io::parser::Parser;
///
/// // ldc.i4.s 10 / ret
/// let mut parser = Parser::new(&[0x1F, 0x0A, 0x2A]);
/// let inst = decode_instruction(&mut parser).unwrap();
/// assert_eq!(inst.opcode, opcodes::LDC_I4_S);
/// let inst = decode_instruction(&mut parser).unwrap();
/// assert_eq!(inst.opcode, opcodes::RET);
/// ```
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let first = parser.read_le::<u8>()?;
    let (prefix, code) = if first == 0xFE {
        (0xFE, parser.read_le::<u8>()?)
    } else {
        (0x00, first)
    };

    let Some(opcode) = opcodes::lookup(prefix, code) else {
        return Err(malformed_error!(
            "Unknown opcode - 0x{:02X} 0x{:02X}",
            prefix,
            code
        ));
    };

    let operand = match opcode.operand_kind {
        OperandKind::None => Operand::None,
        OperandKind::Int8 => Operand::Int8(parser.read_le::<i8>()?),
        OperandKind::UInt8 => Operand::UInt8(parser.read_le::<u8>()?),
        OperandKind::Int32 => Operand::Int32(parser.read_le::<i32>()?),
        OperandKind::Int64 => Operand::Int64(parser.read_le::<i64>()?),
        OperandKind::Float32 => Operand::Float32(parser.read_le::<f32>()?),
        OperandKind::Float64 => Operand::Float64(parser.read_le::<f64>()?),
        OperandKind::String => Operand::String(Token::new(parser.read_le::<u32>()?)),
        OperandKind::BranchTarget8 => {
            Operand::Branch(Label::Offset(i32::from(parser.read_le::<i8>()?)))
        }
        OperandKind::BranchTarget32 => Operand::Branch(Label::Offset(parser.read_le::<i32>()?)),
        OperandKind::Variable8 => Operand::Variable(u16::from(parser.read_le::<u8>()?)),
        OperandKind::Variable16 => Operand::Variable(parser.read_le::<u16>()?),
        OperandKind::Method | OperandKind::Field | OperandKind::Type | OperandKind::Token => {
            Operand::Token(Token::new(parser.read_le::<u32>()?))
        }
        OperandKind::Signature => Operand::Signature(Token::new(parser.read_le::<u32>()?)),
        OperandKind::Switch => {
            let count = parser.read_le::<u32>()? as usize;
            let remaining = parser.len() - parser.pos();
            if count * 4 > remaining {
                return Err(malformed_error!(
                    "Switch table with {} targets exceeds remaining {} bytes",
                    count,
                    remaining
                ));
            }

            let mut targets = Vec::with_capacity(count);
            for _ in 0..count {
                targets.push(Label::Offset(parser.read_le::<i32>()?));
            }
            Operand::Switch(targets)
        }
    };

    Instruction::new(*opcode, operand)
}

/// A cursor over an instruction stream.
///
/// Owns a copy of the input bytes; [`Disassembler::move_next`] advances to the
/// next instruction and the accessors expose the instruction under the cursor.
/// The cursor starts before the first instruction.
pub struct Disassembler {
    data: Vec<u8>,
    position: usize,
    lenient: bool,
    current: Option<(usize, Instruction)>,
}

impl Disassembler {
    /// Creates a disassembler over a copy of `data`, positioned before the
    /// first instruction.
    #[must_use]
    pub fn new(data: &[u8]) -> Self {
        Disassembler {
            data: data.to_vec(),
            position: 0,
            lenient: false,
            current: None,
        }
    }

    /// Switches to lenient mode: a byte that does not decode ends the walk
    /// with "no more instructions" instead of an error.
    ///
    /// This tolerates a truncated tail without ever fabricating instructions
    /// from leftover operand bytes.
    #[must_use]
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    /// Advances to the next instruction.
    ///
    /// Returns `Ok(false)` at the end of the stream. In strict mode a byte
    /// that does not decode is an error and the cursor stays where it was; in
    /// lenient mode the walk stops there and reports the end of the stream.
    pub fn move_next(&mut self) -> Result<bool> {
        if self.position < self.data.len() {
            let mut parser = Parser::new(&self.data);
            parser.seek(self.position)?;

            match decode_instruction(&mut parser) {
                Ok(instruction) => {
                    self.current = Some((self.position, instruction));
                    self.position = parser.pos();
                    return Ok(true);
                }
                Err(error) => {
                    self.current = None;
                    if !self.lenient {
                        return Err(error);
                    }
                    // stop scanning; the rest of the buffer is not code
                    self.position = self.data.len();
                    return Ok(false);
                }
            }
        }

        self.current = None;
        Ok(false)
    }

    /// The instruction under the cursor.
    ///
    /// ## Errors
    /// Returns [`Error::InvalidPosition`](crate::Error::InvalidPosition) when
    /// the cursor is before the first instruction or past the end.
    pub fn instruction(&self) -> Result<&Instruction> {
        match &self.current {
            Some((_, instruction)) => Ok(instruction),
            None => Err(crate::Error::InvalidPosition),
        }
    }

    /// The operand of the instruction under the cursor.
    pub fn operand(&self) -> Result<&Operand> {
        self.instruction().map(|instruction| &instruction.operand)
    }

    /// Byte offset of the instruction under the cursor.
    pub fn offset(&self) -> Result<usize> {
        match &self.current {
            Some((offset, _)) => Ok(*offset),
            None => Err(crate::Error::InvalidPosition),
        }
    }
}
