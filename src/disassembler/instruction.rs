//! Decoded CIL instructions and their operands.
//!
//! An [`Instruction`] pairs an opcode descriptor with a decoded operand. The
//! pairing is validated at construction: operand variant and declared operand
//! kind must agree, so an instruction that exists is always encodable.
//! [`Instruction::normalize`] and [`Instruction::compress`] convert between the
//! canonical long encodings and the compact short forms ECMA-335 defines for
//! common argument, local, constant and branch patterns.

use std::fmt;

use crate::disassembler::label::Label;
use crate::disassembler::opcodes::{self, OpCode, OperandKind};
use crate::metadata::token::Token;
use crate::Result;

/// A decoded inline operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Signed 8-bit immediate
    Int8(i8),
    /// Unsigned 8-bit immediate (prefix arguments)
    UInt8(u8),
    /// Signed 32-bit immediate
    Int32(i32),
    /// Signed 64-bit immediate
    Int64(i64),
    /// 32-bit float immediate
    Float32(f32),
    /// 64-bit float immediate
    Float64(f64),
    /// User-string token
    String(Token),
    /// Branch target
    Branch(Label),
    /// Argument or local index
    Variable(u16),
    /// Metadata token (method, field, type or `ldtoken` member)
    Token(Token),
    /// Standalone-signature token
    Signature(Token),
    /// Jump-table targets
    Switch(Vec<Label>),
}

impl Operand {
    /// Short name used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Operand::None => "none",
            Operand::Int8(_) => "int8",
            Operand::UInt8(_) => "uint8",
            Operand::Int32(_) => "int32",
            Operand::Int64(_) => "int64",
            Operand::Float32(_) => "float32",
            Operand::Float64(_) => "float64",
            Operand::String(_) => "string token",
            Operand::Branch(_) => "branch target",
            Operand::Variable(_) => "variable index",
            Operand::Token(_) => "metadata token",
            Operand::Signature(_) => "signature token",
            Operand::Switch(_) => "jump table",
        }
    }
}

fn expected_operand(kind: OperandKind) -> &'static str {
    match kind {
        OperandKind::None => "none",
        OperandKind::Int8 => "int8",
        OperandKind::UInt8 => "uint8",
        OperandKind::Int32 => "int32",
        OperandKind::Int64 => "int64",
        OperandKind::Float32 => "float32",
        OperandKind::Float64 => "float64",
        OperandKind::String => "string token",
        OperandKind::BranchTarget8 | OperandKind::BranchTarget32 => "branch target",
        OperandKind::Variable8 => "variable index (8-bit)",
        OperandKind::Variable16 => "variable index",
        OperandKind::Method | OperandKind::Field | OperandKind::Type | OperandKind::Token => {
            "metadata token"
        }
        OperandKind::Signature => "signature token",
        OperandKind::Switch => "jump table",
    }
}

/// One CIL instruction: opcode plus validated operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The opcode descriptor
    pub opcode: OpCode,
    /// The decoded operand, matching `opcode.operand_kind`
    pub operand: Operand,
}

impl Instruction {
    /// Builds an instruction, validating that the operand variant matches the
    /// opcode's declared operand kind.
    ///
    /// ## Errors
    /// Returns [`Error::OperandMismatch`](crate::Error::OperandMismatch) when
    /// they disagree, including an 8-bit variable form given an index above
    /// 255.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use cilweave::disassembler::{Instruction, Operand, opcodes};
    ///
    /// let inst = Instruction::new(opcodes::LDC_I4, Operand::Int32(42)).unwrap();
    /// assert_eq!(inst.byte_size(), 5);
    ///
    /// assert!(Instruction::new(opcodes::LDC_I4, Operand::None).is_err());
    /// ```
    pub fn new(opcode: OpCode, operand: Operand) -> Result<Self> {
        let matches = match opcode.operand_kind {
            OperandKind::None => matches!(operand, Operand::None),
            OperandKind::Int8 => matches!(operand, Operand::Int8(_)),
            OperandKind::UInt8 => matches!(operand, Operand::UInt8(_)),
            OperandKind::Int32 => matches!(operand, Operand::Int32(_)),
            OperandKind::Int64 => matches!(operand, Operand::Int64(_)),
            OperandKind::Float32 => matches!(operand, Operand::Float32(_)),
            OperandKind::Float64 => matches!(operand, Operand::Float64(_)),
            OperandKind::String => matches!(operand, Operand::String(_)),
            OperandKind::BranchTarget8 | OperandKind::BranchTarget32 => {
                matches!(operand, Operand::Branch(_))
            }
            OperandKind::Variable8 => {
                matches!(operand, Operand::Variable(index) if index <= u16::from(u8::MAX))
            }
            OperandKind::Variable16 => matches!(operand, Operand::Variable(_)),
            OperandKind::Method
            | OperandKind::Field
            | OperandKind::Type
            | OperandKind::Token => matches!(operand, Operand::Token(_)),
            OperandKind::Signature => matches!(operand, Operand::Signature(_)),
            OperandKind::Switch => matches!(operand, Operand::Switch(_)),
        };

        if !matches {
            return Err(crate::Error::OperandMismatch {
                mnemonic: opcode.mnemonic,
                expected: expected_operand(opcode.operand_kind),
                found: operand.kind_name(),
            });
        }

        Ok(Instruction { opcode, operand })
    }

    /// Encoded size of this instruction in bytes, opcode plus operand.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        let operand_size = match (&self.operand, self.opcode.operand_size()) {
            (Operand::Switch(targets), None) => 4 + 4 * targets.len(),
            (_, Some(size)) => size,
            // unreachable for validated instructions; keep a sane fallback
            (_, None) => 4,
        };
        self.opcode.size() + operand_size
    }

    /// Rewrites short encodings into their canonical long forms.
    ///
    /// `ldarg.1` becomes `ldarg 1`, `ldc.i4.s 7` becomes `ldc.i4 7`, `br.s`
    /// becomes `br`, and so on. Raw offset branch targets are adjusted for the
    /// size the instruction gains, so the target byte stays the same;
    /// index-based targets need no adjustment. Instructions already in long
    /// form are returned unchanged.
    #[must_use]
    pub fn normalize(self) -> Instruction {
        if self.opcode.prefix != 0 {
            return self;
        }

        let (opcode, operand) = match (self.opcode.code, self.operand) {
            (0x02..=0x05, Operand::None) => {
                (opcodes::LDARG, Operand::Variable(u16::from(self.opcode.code - 0x02)))
            }
            (0x06..=0x09, Operand::None) => {
                (opcodes::LDLOC, Operand::Variable(u16::from(self.opcode.code - 0x06)))
            }
            (0x0A..=0x0D, Operand::None) => {
                (opcodes::STLOC, Operand::Variable(u16::from(self.opcode.code - 0x0A)))
            }
            (0x0E, operand) => (opcodes::LDARG, operand),
            (0x0F, operand) => (opcodes::LDARGA, operand),
            (0x10, operand) => (opcodes::STARG, operand),
            (0x11, operand) => (opcodes::LDLOC, operand),
            (0x12, operand) => (opcodes::LDLOCA, operand),
            (0x13, operand) => (opcodes::STLOC, operand),
            (0x15..=0x1E, Operand::None) => {
                (opcodes::LDC_I4, Operand::Int32(i32::from(self.opcode.code) - 0x16))
            }
            (0x1F, Operand::Int8(value)) => (opcodes::LDC_I4, Operand::Int32(i32::from(value))),
            (0x2B..=0x37, operand) => {
                let long = opcodes::OPCODES[usize::from(self.opcode.code) + 0x0D];
                (long, widen_branch(operand, &long))
            }
            (0xDE, operand) => (opcodes::LEAVE, widen_branch(operand, &opcodes::LEAVE)),
            (code, operand) => {
                return Instruction {
                    opcode: opcodes::OPCODES[usize::from(code)],
                    operand,
                }
            }
        };

        Instruction { opcode, operand }
    }

    /// Rewrites long encodings into the shortest equivalent form.
    ///
    /// Variable accesses shrink to `.0`-`.3` or `.s` forms where the index
    /// fits, `ldc.i4` shrinks to its single-byte or `.s` forms, and branches
    /// shrink only when the target is a raw offset whose adjusted displacement
    /// fits in a signed byte. Index-based branch targets are left in long form
    /// since their displacement is not known until layout.
    #[must_use]
    pub fn compress(self) -> Instruction {
        match (self.opcode.prefix, self.opcode.code, self.operand) {
            (0xFE, 0x09, Operand::Variable(index)) => short_variable(
                index,
                Some(0x02),
                opcodes::LDARG_S,
                opcodes::LDARG,
            ),
            (0xFE, 0x0A, Operand::Variable(index)) => {
                short_variable(index, None, opcodes::LDARGA_S, opcodes::LDARGA)
            }
            (0xFE, 0x0B, Operand::Variable(index)) => {
                short_variable(index, None, opcodes::STARG_S, opcodes::STARG)
            }
            (0xFE, 0x0C, Operand::Variable(index)) => short_variable(
                index,
                Some(0x06),
                opcodes::LDLOC_S,
                opcodes::LDLOC,
            ),
            (0xFE, 0x0D, Operand::Variable(index)) => {
                short_variable(index, None, opcodes::LDLOCA_S, opcodes::LDLOCA)
            }
            (0xFE, 0x0E, Operand::Variable(index)) => short_variable(
                index,
                Some(0x0A),
                opcodes::STLOC_S,
                opcodes::STLOC,
            ),
            (0, 0x20, Operand::Int32(value)) => {
                if (-1..=8).contains(&value) {
                    let code = 0x16 + value; // ldc.i4.m1 is 0x15
                    Instruction {
                        opcode: opcodes::OPCODES[usize::try_from(code).unwrap_or(0x15)],
                        operand: Operand::None,
                    }
                } else if let Ok(small) = i8::try_from(value) {
                    Instruction {
                        opcode: opcodes::LDC_I4_S,
                        operand: Operand::Int8(small),
                    }
                } else {
                    Instruction {
                        opcode: opcodes::LDC_I4,
                        operand: Operand::Int32(value),
                    }
                }
            }
            (0, code @ 0x38..=0x44, Operand::Branch(label)) => {
                short_branch(label, opcodes::OPCODES[usize::from(code)], opcodes::OPCODES[usize::from(code) - 0x0D])
            }
            (0, 0xDD, Operand::Branch(label)) => {
                short_branch(label, opcodes::LEAVE, opcodes::LEAVE_S)
            }
            (_, _, operand) => Instruction {
                opcode: self.opcode,
                operand,
            },
        }
    }
}

// A short branch that grows by 3 bytes moves its own end; raw displacements are
// measured from that end, so the same target byte needs a smaller displacement.
fn widen_branch(operand: Operand, long: &OpCode) -> Operand {
    debug_assert_eq!(long.operand_kind, OperandKind::BranchTarget32);
    match operand {
        Operand::Branch(Label::Offset(displacement)) => {
            Operand::Branch(Label::Offset(displacement - 3))
        }
        other => other,
    }
}

fn short_branch(label: Label, long: OpCode, short: OpCode) -> Instruction {
    if let Label::Offset(displacement) = label {
        // the short form ends 3 bytes earlier, so the displacement grows
        if let Ok(adjusted) = i8::try_from(displacement + 3) {
            return Instruction {
                opcode: short,
                operand: Operand::Branch(Label::Offset(i32::from(adjusted))),
            };
        }
    }
    Instruction {
        opcode: long,
        operand: Operand::Branch(label),
    }
}

fn short_variable(index: u16, zero_form: Option<u8>, short: OpCode, long: OpCode) -> Instruction {
    if index <= 3 {
        if let Some(base) = zero_form {
            return Instruction {
                opcode: opcodes::OPCODES[usize::from(base) + usize::from(index)],
                operand: Operand::None,
            };
        }
    }
    if index <= u16::from(u8::MAX) {
        Instruction {
            opcode: short,
            operand: Operand::Variable(index),
        }
    } else {
        Instruction {
            opcode: long,
            operand: Operand::Variable(index),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Operand::None => write!(f, "{}", self.opcode.mnemonic),
            Operand::Int8(v) => write!(f, "{} {}", self.opcode.mnemonic, v),
            Operand::UInt8(v) => write!(f, "{} {}", self.opcode.mnemonic, v),
            Operand::Int32(v) => write!(f, "{} {}", self.opcode.mnemonic, v),
            Operand::Int64(v) => write!(f, "{} {}", self.opcode.mnemonic, v),
            Operand::Float32(v) => write!(f, "{} {}", self.opcode.mnemonic, v),
            Operand::Float64(v) => write!(f, "{} {}", self.opcode.mnemonic, v),
            Operand::String(token) | Operand::Token(token) | Operand::Signature(token) => {
                write!(f, "{} {}", self.opcode.mnemonic, token)
            }
            Operand::Branch(Label::Offset(d)) => write!(f, "{} {:+}", self.opcode.mnemonic, d),
            Operand::Branch(Label::Index { slot, .. }) => {
                write!(f, "{} @{}", self.opcode.mnemonic, slot)
            }
            Operand::Variable(index) => write!(f, "{} {}", self.opcode.mnemonic, index),
            Operand::Switch(targets) => {
                write!(f, "{} [{} targets]", self.opcode.mnemonic, targets.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_validation() {
        assert!(Instruction::new(opcodes::NOP, Operand::None).is_ok());
        assert!(Instruction::new(opcodes::LDC_I4, Operand::Int32(7)).is_ok());
        assert!(Instruction::new(opcodes::CALL, Operand::Token(Token::new(0x0A00_0001))).is_ok());

        let err = Instruction::new(opcodes::LDC_I4, Operand::Int8(7)).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::OperandMismatch {
                mnemonic: "ldc.i4",
                ..
            }
        ));
    }

    #[test]
    fn variable8_range_check() {
        assert!(Instruction::new(opcodes::LDARG_S, Operand::Variable(255)).is_ok());
        assert!(Instruction::new(opcodes::LDARG_S, Operand::Variable(256)).is_err());
        assert!(Instruction::new(opcodes::LDARG, Operand::Variable(256)).is_ok());
    }

    #[test]
    fn byte_sizes() {
        let nop = Instruction::new(opcodes::NOP, Operand::None).unwrap();
        assert_eq!(nop.byte_size(), 1);

        let ldc = Instruction::new(opcodes::LDC_I4, Operand::Int32(300)).unwrap();
        assert_eq!(ldc.byte_size(), 5);

        let ldloc = Instruction::new(opcodes::LDLOC, Operand::Variable(4)).unwrap();
        assert_eq!(ldloc.byte_size(), 4); // FE 0C plus 16-bit index

        let switch = Instruction::new(
            opcodes::SWITCH,
            Operand::Switch(vec![Label::Offset(0), Label::Offset(5)]),
        )
        .unwrap();
        assert_eq!(switch.byte_size(), 1 + 4 + 8);
    }

    #[test]
    fn normalize_variable_shorthand() {
        let inst = Instruction::new(opcodes::LDARG_1, Operand::None).unwrap().normalize();
        assert_eq!(inst.opcode, opcodes::LDARG);
        assert_eq!(inst.operand, Operand::Variable(1));

        let inst = Instruction::new(opcodes::STLOC_S, Operand::Variable(9))
            .unwrap()
            .normalize();
        assert_eq!(inst.opcode, opcodes::STLOC);
        assert_eq!(inst.operand, Operand::Variable(9));
    }

    #[test]
    fn normalize_constants() {
        let inst = Instruction::new(opcodes::LDC_I4_M1, Operand::None).unwrap().normalize();
        assert_eq!(inst.opcode, opcodes::LDC_I4);
        assert_eq!(inst.operand, Operand::Int32(-1));

        let inst = Instruction::new(opcodes::LDC_I4_8, Operand::None).unwrap().normalize();
        assert_eq!(inst.operand, Operand::Int32(8));

        let inst = Instruction::new(opcodes::LDC_I4_S, Operand::Int8(-100))
            .unwrap()
            .normalize();
        assert_eq!(inst.opcode, opcodes::LDC_I4);
        assert_eq!(inst.operand, Operand::Int32(-100));
    }

    #[test]
    fn normalize_branches_preserve_target_byte() {
        // br.s with displacement +4: target is at (start + 2) + 4 = start + 6.
        // The long form ends at start + 5, so the displacement becomes +1.
        let inst = Instruction::new(opcodes::BR_S, Operand::Branch(Label::Offset(4)))
            .unwrap()
            .normalize();
        assert_eq!(inst.opcode, opcodes::BR);
        assert_eq!(inst.operand, Operand::Branch(Label::Offset(1)));

        let inst = Instruction::new(opcodes::BLT_UN_S, Operand::Branch(Label::Offset(-10)))
            .unwrap()
            .normalize();
        assert_eq!(inst.opcode, opcodes::BLT_UN);
        assert_eq!(inst.operand, Operand::Branch(Label::Offset(-13)));

        let inst = Instruction::new(opcodes::LEAVE_S, Operand::Branch(Label::Offset(0)))
            .unwrap()
            .normalize();
        assert_eq!(inst.opcode, opcodes::LEAVE);
        assert_eq!(inst.operand, Operand::Branch(Label::Offset(-3)));
    }

    #[test]
    fn normalize_is_identity_on_long_forms() {
        let inst = Instruction::new(opcodes::LDC_I4, Operand::Int32(3)).unwrap();
        assert_eq!(inst.clone().normalize(), inst);

        let inst = Instruction::new(opcodes::LDLOC, Operand::Variable(2)).unwrap();
        assert_eq!(inst.clone().normalize(), inst);
    }

    #[test]
    fn compress_variables() {
        let inst = Instruction::new(opcodes::LDARG, Operand::Variable(2)).unwrap().compress();
        assert_eq!(inst.opcode, opcodes::LDARG_2);
        assert_eq!(inst.operand, Operand::None);

        let inst = Instruction::new(opcodes::LDLOC, Operand::Variable(200))
            .unwrap()
            .compress();
        assert_eq!(inst.opcode, opcodes::LDLOC_S);
        assert_eq!(inst.operand, Operand::Variable(200));

        let inst = Instruction::new(opcodes::STLOC, Operand::Variable(1000))
            .unwrap()
            .compress();
        assert_eq!(inst.opcode, opcodes::STLOC);

        // ldarga has no zero-operand short form
        let inst = Instruction::new(opcodes::LDARGA, Operand::Variable(0)).unwrap().compress();
        assert_eq!(inst.opcode, opcodes::LDARGA_S);
        assert_eq!(inst.operand, Operand::Variable(0));
    }

    #[test]
    fn compress_constants() {
        let inst = Instruction::new(opcodes::LDC_I4, Operand::Int32(-1)).unwrap().compress();
        assert_eq!(inst.opcode, opcodes::LDC_I4_M1);

        let inst = Instruction::new(opcodes::LDC_I4, Operand::Int32(5)).unwrap().compress();
        assert_eq!(inst.opcode, opcodes::LDC_I4_5);

        let inst = Instruction::new(opcodes::LDC_I4, Operand::Int32(100)).unwrap().compress();
        assert_eq!(inst.opcode, opcodes::LDC_I4_S);
        assert_eq!(inst.operand, Operand::Int8(100));

        let inst = Instruction::new(opcodes::LDC_I4, Operand::Int32(1000)).unwrap().compress();
        assert_eq!(inst.opcode, opcodes::LDC_I4);
    }

    #[test]
    fn compress_branches_only_when_displacement_fits() {
        let inst = Instruction::new(opcodes::BR, Operand::Branch(Label::Offset(1)))
            .unwrap()
            .compress();
        assert_eq!(inst.opcode, opcodes::BR_S);
        assert_eq!(inst.operand, Operand::Branch(Label::Offset(4)));

        // +125 would become +128 after the shrink, out of i8 range
        let inst = Instruction::new(opcodes::BR, Operand::Branch(Label::Offset(125)))
            .unwrap()
            .compress();
        assert_eq!(inst.opcode, opcodes::BR);

        let provider = crate::disassembler::label::ProviderId::next();
        let label = Label::Index { slot: 0, provider };
        let inst = Instruction::new(opcodes::BEQ, Operand::Branch(label)).unwrap().compress();
        assert_eq!(inst.opcode, opcodes::BEQ);
    }

    #[test]
    fn compress_is_identity_on_non_shrinkable_forms() {
        let inst = Instruction::new(opcodes::CEQ, Operand::None).unwrap();
        assert_eq!(inst.clone().compress(), inst);

        let inst =
            Instruction::new(opcodes::CALL, Operand::Token(Token::new(0x0A00_0001))).unwrap();
        assert_eq!(inst.clone().compress(), inst);

        let inst = Instruction::new(opcodes::CONSTRAINED, Operand::Token(Token::new(0x0200_0001)))
            .unwrap()
            .compress();
        assert_eq!(inst.opcode, opcodes::CONSTRAINED);
    }

    #[test]
    fn normalize_compress_round_trip() {
        let original = Instruction::new(opcodes::LDARG_3, Operand::None).unwrap();
        let round = original.clone().normalize().compress();
        assert_eq!(round, original);

        let original = Instruction::new(opcodes::LDC_I4_S, Operand::Int8(42)).unwrap();
        let round = original.clone().normalize().compress();
        assert_eq!(round, original);
    }
}
