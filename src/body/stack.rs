//! Abstract stack-shape inference over a method body.
//!
//! [`StackIterator`] replays a body's instructions against a shadow stack of
//! [`StackEntry`] values, tracking for each slot where it came from and what
//! type it carries. Binary operators follow the ECMA-335 III.1.5 result-type
//! tables; call-shaped instructions consult the resolver for the callee's
//! signature; undefined type combinations and underflows are errors naming the
//! offending instruction index.
//!
//! The iterator does not borrow the body across calls. It snapshots the body's
//! identity and edit version at construction and re-checks them on every
//! advance, so a structural edit made between steps is detected instead of
//! silently iterating stale state.

use crate::body::MethodBody;
use crate::disassembler::{Instruction, LabelProvider, Operand, ProviderId, StackPush};
use crate::metadata::resolver::MetadataResolver;
use crate::metadata::signatures::{
    CallingConvention, MethodSignature, Signature, SignatureParser, SzArray, TypeSignature,
};
use crate::Result;

/// Where a stack slot's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEntryKind {
    /// A literal pushed by an `ldc.*`, `ldnull` or `ldstr`
    Constant,
    /// An argument load
    Argument,
    /// A local variable load
    Local,
    /// A field load
    Field,
    /// A call's return value (or `newobj` result)
    Return,
    /// Result of an arithmetic/conversion/other computation
    Computed,
    /// An address taken with `ldarga`/`ldloca`/`ldflda`/`ldelema`/`unbox`
    AddressOf,
    /// A runtime handle pushed by `ldtoken`
    MetadataToken,
    /// Memory allocated by `localloc`
    StackAlloc,
}

/// One slot of the shadow stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackEntry {
    /// Classification of the value's origin
    pub kind: StackEntryKind,
    /// Inferred type
    pub ty: TypeSignature,
    /// Index of the instruction that pushed this slot
    pub origin: usize,
    /// Raw payload for constants
    pub constant: Option<Operand>,
}

impl StackEntry {
    fn computed(ty: TypeSignature, origin: usize) -> Self {
        StackEntry {
            kind: StackEntryKind::Computed,
            ty,
            origin,
            constant: None,
        }
    }
}

/// Coarse type classes the operator tables are defined over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackClass {
    Int32,
    Int64,
    Native,
    Float32,
    Float64,
    Pointer,
    ByRef,
    Object,
    Value,
}

fn class_of(ty: &TypeSignature) -> StackClass {
    match ty {
        TypeSignature::Boolean
        | TypeSignature::Char
        | TypeSignature::I1
        | TypeSignature::U1
        | TypeSignature::I2
        | TypeSignature::U2
        | TypeSignature::I4
        | TypeSignature::U4 => StackClass::Int32,
        TypeSignature::I8 | TypeSignature::U8 => StackClass::Int64,
        TypeSignature::I | TypeSignature::U => StackClass::Native,
        TypeSignature::R4 => StackClass::Float32,
        TypeSignature::R8 => StackClass::Float64,
        TypeSignature::Ptr(_) | TypeSignature::FnPtr(_) => StackClass::Pointer,
        TypeSignature::ByRef(_) => StackClass::ByRef,
        TypeSignature::ValueType(_) | TypeSignature::TypedByRef => StackClass::Value,
        _ => StackClass::Object,
    }
}

/// Walks a method body one instruction at a time, maintaining the shadow stack.
pub struct StackIterator<'a> {
    resolver: &'a dyn MetadataResolver,
    provider: ProviderId,
    version: u64,
    /// Index of the next instruction to execute
    next: usize,
    /// Index of the last executed instruction
    current: Option<usize>,
    stack: Vec<StackEntry>,
}

impl<'a> StackIterator<'a> {
    /// Creates an iterator positioned before the body's first instruction.
    #[must_use]
    pub fn new(body: &MethodBody, resolver: &'a dyn MetadataResolver) -> Self {
        StackIterator {
            resolver,
            provider: body.provider_id(),
            version: body.version(),
            next: 0,
            current: None,
            stack: Vec::new(),
        }
    }

    /// The shadow stack after the last executed instruction; index 0 is the
    /// bottom.
    #[must_use]
    pub fn stack(&self) -> &[StackEntry] {
        &self.stack
    }

    /// Current stack depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Index of the last executed instruction.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    fn check_synchronized(&self, body: &MethodBody) -> Result<()> {
        if body.provider_id() != self.provider || body.version() != self.version {
            return Err(crate::Error::IteratorInvalidated);
        }
        Ok(())
    }

    /// Resets the shadow stack to empty and repositions so the next advance
    /// executes the instruction at `index`.
    pub fn goto(&mut self, body: &MethodBody, index: usize) -> Result<()> {
        self.check_synchronized(body)?;
        if index > body.len() {
            return Err(crate::Error::InvalidPosition);
        }
        self.stack.clear();
        self.next = index;
        self.current = None;
        Ok(())
    }

    /// Executes the next instruction against the shadow stack.
    ///
    /// Returns `Ok(false)` past the last instruction.
    ///
    /// ## Errors
    /// [`Error::IteratorInvalidated`](crate::Error::IteratorInvalidated) if
    /// the body was structurally edited since this iterator was created,
    /// [`Error::StackUnderflow`](crate::Error::StackUnderflow) when the
    /// instruction pops more than the current depth, and
    /// [`Error::TypeCombination`](crate::Error::TypeCombination) for operand
    /// types the operator tables leave undefined.
    pub fn move_next(&mut self, body: &MethodBody) -> Result<bool> {
        self.check_synchronized(body)?;
        if self.next >= body.len() {
            return Ok(false);
        }

        let index = self.next;
        self.step(body, index)?;
        self.current = Some(index);
        self.next = index + 1;
        Ok(true)
    }

    fn step(&mut self, body: &MethodBody, index: usize) -> Result<()> {
        let instruction = body.instructions()[index].clone().normalize();
        let (prefix, code) = (instruction.opcode.prefix, instruction.opcode.code);

        // leave and endfinally discard the evaluation stack wholesale
        if prefix == 0 && (code == 0xDD || code == 0xDC) {
            self.stack.clear();
            return Ok(());
        }

        let pops = self.pop_count(body, index, &instruction)?;
        if pops > self.stack.len() {
            return Err(crate::Error::StackUnderflow(index));
        }
        // popped[0] is the former top of stack
        let mut popped = Vec::with_capacity(pops);
        for _ in 0..pops {
            popped.push(self.stack.pop().unwrap_or_else(|| unreachable!()));
        }

        // dup replays the popped slot twice
        if prefix == 0 && code == 0x25 {
            let top = popped.remove(0);
            self.stack.push(top.clone());
            self.stack.push(StackEntry { origin: index, ..top });
            return Ok(());
        }

        if let Some(entry) = self.push_entry(body, index, &instruction, &popped)? {
            self.stack.push(entry);
        }
        Ok(())
    }

    fn pop_count(
        &self,
        body: &MethodBody,
        index: usize,
        instruction: &Instruction,
    ) -> Result<usize> {
        let (prefix, code) = (instruction.opcode.prefix, instruction.opcode.code);
        match (prefix, code) {
            // call / callvirt pop the arguments plus an implicit receiver
            (0, 0x28) | (0, 0x6F) => {
                let signature = self.method_signature(instruction)?;
                Ok(signature.params.len() + usize::from(implicit_this(&signature.convention)))
            }
            // newobj pops only the constructor arguments
            (0, 0x73) => {
                let signature = self.method_signature(instruction)?;
                Ok(signature.params.len())
            }
            // calli additionally pops the function pointer itself
            (0, 0x29) => {
                let signature = self.inline_signature(instruction)?;
                Ok(signature.params.len() + usize::from(implicit_this(&signature.convention)) + 1)
            }
            // ret pops the return value for non-void methods
            (0, 0x2A) => Ok(usize::from(body.return_type().base != TypeSignature::Void)),
            _ => match instruction.opcode.pops.count() {
                Some(count) => Ok(count),
                None => Err(malformed_error!(
                    "No pop rule for {} at instruction {}",
                    instruction.opcode.mnemonic,
                    index
                )),
            },
        }
    }

    fn method_signature(&self, instruction: &Instruction) -> Result<MethodSignature> {
        let Operand::Token(token) = instruction.operand else {
            return Err(crate::Error::OperandMismatch {
                mnemonic: instruction.opcode.mnemonic,
                expected: "metadata token",
                found: instruction.operand.kind_name(),
            });
        };
        Ok(self.resolver.resolve_method(token)?.signature)
    }

    fn inline_signature(&self, instruction: &Instruction) -> Result<MethodSignature> {
        let Operand::Signature(token) = instruction.operand else {
            return Err(crate::Error::OperandMismatch {
                mnemonic: instruction.opcode.mnemonic,
                expected: "signature token",
                found: instruction.operand.kind_name(),
            });
        };
        let blob = self.resolver.resolve_signature(token)?;
        match SignatureParser::new(&blob).parse()? {
            Signature::Method(signature) => Ok(signature),
            _ => Err(malformed_error!(
                "calli signature token {} is not a method signature",
                token
            )),
        }
    }

    /// Substitutes generic placeholders from the body's generic context.
    /// Placeholders pass through unchanged when no context was supplied;
    /// an index beyond a supplied context is an error.
    fn substitute(&self, body: &MethodBody, index: usize, ty: &TypeSignature) -> Result<TypeSignature> {
        let resolve = |args: &[TypeSignature], position: u32| -> Result<Option<TypeSignature>> {
            if args.is_empty() {
                return Ok(None);
            }
            match args.get(position as usize) {
                Some(concrete) => Ok(Some(concrete.clone())),
                None => Err(malformed_error!(
                    "Generic parameter {} out of range at instruction {}",
                    position,
                    index
                )),
            }
        };

        Ok(match ty {
            TypeSignature::GenericParamMethod(position) => {
                match resolve(body.method_generic_args(), *position)? {
                    Some(concrete) => concrete,
                    None => ty.clone(),
                }
            }
            TypeSignature::GenericParamType(position) => {
                match resolve(body.type_generic_args(), *position)? {
                    Some(concrete) => concrete,
                    None => ty.clone(),
                }
            }
            TypeSignature::ByRef(inner) => {
                TypeSignature::ByRef(Box::new(self.substitute(body, index, inner)?))
            }
            TypeSignature::SzArray(array) => TypeSignature::SzArray(SzArray {
                modifiers: array.modifiers.clone(),
                base: Box::new(self.substitute(body, index, &array.base)?),
            }),
            TypeSignature::GenericInst(base, args) => {
                let mut substituted = Vec::with_capacity(args.len());
                for arg in args {
                    substituted.push(self.substitute(body, index, arg)?);
                }
                TypeSignature::GenericInst(base.clone(), substituted)
            }
            other => other.clone(),
        })
    }

    fn argument_type(&self, body: &MethodBody, index: usize, slot: u16) -> Result<TypeSignature> {
        let convention = body.convention();
        let mut slot = usize::from(slot);
        if implicit_this(&convention) {
            if slot == 0 {
                return Ok(TypeSignature::Object);
            }
            slot -= 1;
        }
        match body.params().get(slot) {
            Some(param) => self.substitute(body, index, &param.base),
            None => Err(malformed_error!(
                "Argument index {} out of range at instruction {}",
                slot,
                index
            )),
        }
    }

    fn local_type(&self, body: &MethodBody, index: usize, slot: u16) -> Result<TypeSignature> {
        match body.locals().get(usize::from(slot)) {
            Some(local) => self.substitute(body, index, &local.base),
            None => Err(malformed_error!(
                "Local index {} out of range at instruction {}",
                slot,
                index
            )),
        }
    }

    fn variable_slot(instruction: &Instruction) -> Result<u16> {
        match instruction.operand {
            Operand::Variable(slot) => Ok(slot),
            _ => Err(crate::Error::OperandMismatch {
                mnemonic: instruction.opcode.mnemonic,
                expected: "variable index",
                found: instruction.operand.kind_name(),
            }),
        }
    }

    fn token_type(instruction: &Instruction) -> Result<TypeSignature> {
        match instruction.operand {
            Operand::Token(token) => Ok(TypeSignature::Class(token)),
            _ => Err(crate::Error::OperandMismatch {
                mnemonic: instruction.opcode.mnemonic,
                expected: "metadata token",
                found: instruction.operand.kind_name(),
            }),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn push_entry(
        &self,
        body: &MethodBody,
        index: usize,
        instruction: &Instruction,
        popped: &[StackEntry],
    ) -> Result<Option<StackEntry>> {
        let (prefix, code) = (instruction.opcode.prefix, instruction.opcode.code);

        let entry = match (prefix, code) {
            // constants
            (0, 0x14) => StackEntry {
                kind: StackEntryKind::Constant,
                ty: TypeSignature::Object,
                origin: index,
                constant: None,
            },
            (0, 0x20) | (0, 0x21) | (0, 0x22) | (0, 0x23) | (0, 0x72) => {
                let ty = match code {
                    0x20 => TypeSignature::I4,
                    0x21 => TypeSignature::I8,
                    0x22 => TypeSignature::R4,
                    0x23 => TypeSignature::R8,
                    _ => TypeSignature::String,
                };
                StackEntry {
                    kind: StackEntryKind::Constant,
                    ty,
                    origin: index,
                    constant: Some(instruction.operand.clone()),
                }
            }

            // argument and local access (canonical forms after normalize)
            (0xFE, 0x09) => StackEntry {
                kind: StackEntryKind::Argument,
                ty: self.argument_type(body, index, Self::variable_slot(instruction)?)?,
                origin: index,
                constant: None,
            },
            (0xFE, 0x0A) => StackEntry {
                kind: StackEntryKind::AddressOf,
                ty: TypeSignature::ByRef(Box::new(self.argument_type(
                    body,
                    index,
                    Self::variable_slot(instruction)?,
                )?)),
                origin: index,
                constant: None,
            },
            (0xFE, 0x0C) => StackEntry {
                kind: StackEntryKind::Local,
                ty: self.local_type(body, index, Self::variable_slot(instruction)?)?,
                origin: index,
                constant: None,
            },
            (0xFE, 0x0D) => StackEntry {
                kind: StackEntryKind::AddressOf,
                ty: TypeSignature::ByRef(Box::new(self.local_type(
                    body,
                    index,
                    Self::variable_slot(instruction)?,
                )?)),
                origin: index,
                constant: None,
            },

            // field access
            (0, 0x7B) | (0, 0x7E) => {
                let ty = self.field_type(body, index, instruction)?;
                StackEntry {
                    kind: StackEntryKind::Field,
                    ty,
                    origin: index,
                    constant: None,
                }
            }
            (0, 0x7C) | (0, 0x7F) => {
                let ty = self.field_type(body, index, instruction)?;
                StackEntry {
                    kind: StackEntryKind::AddressOf,
                    ty: TypeSignature::ByRef(Box::new(ty)),
                    origin: index,
                    constant: None,
                }
            }

            // calls
            (0, 0x28) | (0, 0x6F) => {
                let signature = self.method_signature(instruction)?;
                let ty = self.substitute(body, index, &signature.return_type.base)?;
                if ty == TypeSignature::Void {
                    return Ok(None);
                }
                StackEntry {
                    kind: StackEntryKind::Return,
                    ty,
                    origin: index,
                    constant: None,
                }
            }
            (0, 0x29) => {
                let signature = self.inline_signature(instruction)?;
                let ty = self.substitute(body, index, &signature.return_type.base)?;
                if ty == TypeSignature::Void {
                    return Ok(None);
                }
                StackEntry {
                    kind: StackEntryKind::Return,
                    ty,
                    origin: index,
                    constant: None,
                }
            }
            (0, 0x73) => {
                let constructed = match self.method_signature_desc(instruction)? {
                    Some(declaring) => TypeSignature::Class(declaring),
                    None => TypeSignature::Object,
                };
                StackEntry {
                    kind: StackEntryKind::Return,
                    ty: constructed,
                    origin: index,
                    constant: None,
                }
            }

            // numeric binary operators
            (0, 0x58..=0x5B)
            | (0, 0x5D)
            | (0, 0xD6..=0xDB) => {
                let ty = numeric_binary(instruction, index, &popped[1], &popped[0], code)?;
                StackEntry::computed(ty, index)
            }
            // integer-only binary operators
            (0, 0x5C) | (0, 0x5E) | (0, 0x5F..=0x61) => {
                let ty = integer_binary(instruction, index, &popped[1], &popped[0])?;
                StackEntry::computed(ty, index)
            }
            // shifts
            (0, 0x62..=0x64) => {
                let ty = shift_result(instruction, index, &popped[1], &popped[0])?;
                StackEntry::computed(ty, index)
            }
            // unary: preserve the operand type
            (0, 0x65) | (0, 0x66) | (0, 0xC3) => {
                StackEntry::computed(popped[0].ty.clone(), index)
            }

            // type-operand instructions
            (0, 0x74) | (0, 0x71) | (0, 0xA3) | (0, 0xA5) => {
                StackEntry::computed(Self::token_type(instruction)?, index)
            }
            (0, 0x75) => StackEntry::computed(Self::token_type(instruction)?, index),
            (0, 0x8C) => StackEntry::computed(TypeSignature::Object, index),
            (0, 0x8D) => {
                let element = Self::token_type(instruction)?;
                StackEntry::computed(
                    TypeSignature::SzArray(SzArray {
                        modifiers: Vec::new(),
                        base: Box::new(element),
                    }),
                    index,
                )
            }
            (0, 0x79) | (0, 0xC2) => StackEntry {
                kind: StackEntryKind::AddressOf,
                ty: TypeSignature::ByRef(Box::new(Self::token_type(instruction)?)),
                origin: index,
                constant: None,
            },
            (0, 0x8F) => StackEntry {
                kind: StackEntryKind::AddressOf,
                ty: TypeSignature::ByRef(Box::new(Self::token_type(instruction)?)),
                origin: index,
                constant: None,
            },
            (0, 0xC6) => StackEntry::computed(TypeSignature::TypedByRef, index),

            // handles and function pointers
            (0, 0xD0) => StackEntry {
                kind: StackEntryKind::MetadataToken,
                ty: TypeSignature::I,
                origin: index,
                constant: Some(instruction.operand.clone()),
            },
            (0xFE, 0x06) | (0xFE, 0x07) | (0xFE, 0x00) => {
                StackEntry::computed(TypeSignature::I, index)
            }
            (0xFE, 0x0F) => StackEntry {
                kind: StackEntryKind::StackAlloc,
                ty: TypeSignature::I,
                origin: index,
                constant: None,
            },

            // native-int conversions and loads
            (0, 0xD3) | (0, 0xD4) | (0, 0xD5) | (0, 0xE0) | (0, 0x8A) | (0, 0x8B) | (0, 0x4D)
            | (0, 0x97) | (0, 0x8E) => StackEntry::computed(TypeSignature::I, index),

            // everything else follows the opcode's static push class
            _ => match instruction.opcode.pushes {
                StackPush::Push0 => return Ok(None),
                StackPush::PushI => StackEntry::computed(TypeSignature::I4, index),
                StackPush::PushI8 => StackEntry::computed(TypeSignature::I8, index),
                StackPush::PushR4 => StackEntry::computed(TypeSignature::R4, index),
                StackPush::PushR8 => StackEntry::computed(TypeSignature::R8, index),
                StackPush::PushRef => StackEntry::computed(TypeSignature::Object, index),
                StackPush::Push1 | StackPush::Push2 | StackPush::VarPush => {
                    return Err(crate::Error::TypeCombination {
                        index,
                        message: format!(
                            "no type inference rule for {}",
                            instruction.opcode.mnemonic
                        ),
                    })
                }
            },
        };
        Ok(Some(entry))
    }

    fn field_type(
        &self,
        body: &MethodBody,
        index: usize,
        instruction: &Instruction,
    ) -> Result<TypeSignature> {
        let Operand::Token(token) = instruction.operand else {
            return Err(crate::Error::OperandMismatch {
                mnemonic: instruction.opcode.mnemonic,
                expected: "metadata token",
                found: instruction.operand.kind_name(),
            });
        };
        let field = self.resolver.resolve_field(token)?;
        self.substitute(body, index, &field.signature.base)
    }

    /// Declaring type of a method token, when the resolver knows it.
    fn method_signature_desc(&self, instruction: &Instruction) -> Result<Option<crate::metadata::token::Token>> {
        let Operand::Token(token) = instruction.operand else {
            return Err(crate::Error::OperandMismatch {
                mnemonic: instruction.opcode.mnemonic,
                expected: "metadata token",
                found: instruction.operand.kind_name(),
            });
        };
        Ok(self.resolver.resolve_method(token)?.declaring_type)
    }
}

fn implicit_this(convention: &CallingConvention) -> bool {
    convention.contains(CallingConvention::HAS_THIS)
        && !convention.contains(CallingConvention::EXPLICIT_THIS)
}

fn combination_error(
    instruction: &Instruction,
    index: usize,
    lhs: &StackEntry,
    rhs: &StackEntry,
) -> crate::Error {
    crate::Error::TypeCombination {
        index,
        message: format!(
            "{} over {:?} and {:?}",
            instruction.opcode.mnemonic,
            class_of(&lhs.ty),
            class_of(&rhs.ty)
        ),
    }
}

/// Result type of add/sub/mul/div/rem (and their overflow forms) per the
/// ECMA-335 III.1.5 binary numeric table.
fn numeric_binary(
    instruction: &Instruction,
    index: usize,
    lhs: &StackEntry,
    rhs: &StackEntry,
    code: u8,
) -> Result<TypeSignature> {
    use StackClass as C;
    let is_add = matches!(code, 0x58 | 0xD6 | 0xD7);
    let is_sub = matches!(code, 0x59 | 0xDA | 0xDB);

    let ty = match (class_of(&lhs.ty), class_of(&rhs.ty)) {
        (C::Int32, C::Int32) => TypeSignature::I4,
        (C::Int32, C::Native) | (C::Native, C::Int32) | (C::Native, C::Native) => TypeSignature::I,
        (C::Int64, C::Int64) => TypeSignature::I8,
        (C::Float32, C::Float32) => TypeSignature::R4,
        (C::Float32, C::Float64) | (C::Float64, C::Float32) | (C::Float64, C::Float64) => {
            TypeSignature::R8
        }
        // pointer arithmetic: offsetting keeps the pointer type
        (C::Pointer | C::ByRef, C::Int32 | C::Native) if is_add || is_sub => lhs.ty.clone(),
        (C::Int32 | C::Native, C::Pointer | C::ByRef) if is_add => rhs.ty.clone(),
        (C::Pointer, C::Pointer) | (C::ByRef, C::ByRef) if is_sub => TypeSignature::I,
        _ => return Err(combination_error(instruction, index, lhs, rhs)),
    };
    Ok(ty)
}

/// Result type of and/or/xor/div.un/rem.un, defined only over integers.
fn integer_binary(
    instruction: &Instruction,
    index: usize,
    lhs: &StackEntry,
    rhs: &StackEntry,
) -> Result<TypeSignature> {
    use StackClass as C;
    let ty = match (class_of(&lhs.ty), class_of(&rhs.ty)) {
        (C::Int32, C::Int32) => TypeSignature::I4,
        (C::Int32, C::Native) | (C::Native, C::Int32) | (C::Native, C::Native) => TypeSignature::I,
        (C::Int64, C::Int64) => TypeSignature::I8,
        _ => return Err(combination_error(instruction, index, lhs, rhs)),
    };
    Ok(ty)
}

/// Result type of shl/shr/shr.un: the value's integer type, with an
/// int32/native shift count.
fn shift_result(
    instruction: &Instruction,
    index: usize,
    value: &StackEntry,
    count: &StackEntry,
) -> Result<TypeSignature> {
    use StackClass as C;
    if !matches!(class_of(&count.ty), C::Int32 | C::Native) {
        return Err(combination_error(instruction, index, value, count));
    }
    let ty = match class_of(&value.ty) {
        C::Int32 => TypeSignature::I4,
        C::Int64 => TypeSignature::I8,
        C::Native => TypeSignature::I,
        _ => return Err(combination_error(instruction, index, value, count)),
    };
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disassembler::opcodes;
    use crate::disassembler::Instruction;
    use crate::metadata::resolver::NullResolver;
    use crate::metadata::signatures::SignatureParameter;

    fn method(params: Vec<TypeSignature>, returns: TypeSignature) -> MethodSignature {
        MethodSignature {
            convention: CallingConvention::default(),
            generic_param_count: 0,
            return_type: SignatureParameter::plain(returns),
            params: params.into_iter().map(SignatureParameter::plain).collect(),
            sentinel: None,
        }
    }

    fn run_to_end(body: &MethodBody) -> Vec<Vec<TypeSignature>> {
        let resolver = NullResolver;
        let mut iter = StackIterator::new(body, &resolver);
        let mut shapes = Vec::new();
        while iter.move_next(body).unwrap() {
            shapes.push(iter.stack().iter().map(|entry| entry.ty.clone()).collect());
        }
        shapes
    }

    #[test]
    fn add_two_int32_arguments() {
        // ldarg.0 / ldarg.1 / add / ret
        let body = MethodBody::from_bytes(
            &[0x02, 0x03, 0x58, 0x2A],
            method(vec![TypeSignature::I4, TypeSignature::I4], TypeSignature::I4),
            Vec::new(),
        )
        .unwrap();

        let shapes = run_to_end(&body);
        assert_eq!(shapes[1], vec![TypeSignature::I4, TypeSignature::I4]);
        assert_eq!(shapes[2], vec![TypeSignature::I4]);
        assert!(shapes[3].is_empty());
    }

    #[test]
    fn lone_add_underflows() {
        let body = MethodBody::from_bytes(
            &[0x58],
            method(Vec::new(), TypeSignature::Void),
            Vec::new(),
        )
        .unwrap();

        let resolver = NullResolver;
        let mut iter = StackIterator::new(&body, &resolver);
        assert!(matches!(
            iter.move_next(&body),
            Err(crate::Error::StackUnderflow(0))
        ));
    }

    #[test]
    fn binary_table_widens_to_native() {
        // ldarg.0 (i4) / ldarg.1 (native) / add
        let body = MethodBody::from_bytes(
            &[0x02, 0x03, 0x58],
            method(vec![TypeSignature::I4, TypeSignature::I], TypeSignature::Void),
            Vec::new(),
        )
        .unwrap();

        let shapes = run_to_end(&body);
        assert_eq!(shapes[2], vec![TypeSignature::I]);
    }

    #[test]
    fn binary_table_rejects_mixed_widths() {
        // ldarg.0 (i4) / ldarg.1 (i8) / add
        let body = MethodBody::from_bytes(
            &[0x02, 0x03, 0x58],
            method(vec![TypeSignature::I4, TypeSignature::I8], TypeSignature::Void),
            Vec::new(),
        )
        .unwrap();

        let resolver = NullResolver;
        let mut iter = StackIterator::new(&body, &resolver);
        iter.move_next(&body).unwrap();
        iter.move_next(&body).unwrap();
        let error = iter.move_next(&body).unwrap_err();
        assert!(matches!(
            error,
            crate::Error::TypeCombination { index: 2, .. }
        ));
    }

    #[test]
    fn shift_keeps_value_type() {
        // ldarg.0 (i8) / ldc.i4.1 / shl
        let body = MethodBody::from_bytes(
            &[0x02, 0x17, 0x62],
            method(vec![TypeSignature::I8], TypeSignature::Void),
            Vec::new(),
        )
        .unwrap();

        let shapes = run_to_end(&body);
        assert_eq!(shapes[2], vec![TypeSignature::I8]);
    }

    #[test]
    fn constants_carry_payload() {
        // ldc.i4 42
        let body = MethodBody::from_bytes(
            &[0x20, 0x2A, 0x00, 0x00, 0x00],
            method(Vec::new(), TypeSignature::Void),
            Vec::new(),
        )
        .unwrap();

        let resolver = NullResolver;
        let mut iter = StackIterator::new(&body, &resolver);
        iter.move_next(&body).unwrap();
        let entry = &iter.stack()[0];
        assert_eq!(entry.kind, StackEntryKind::Constant);
        assert_eq!(entry.constant, Some(Operand::Int32(42)));
        assert_eq!(entry.origin, 0);
    }

    #[test]
    fn dup_copies_top_entry() {
        // ldc.i4.5 / dup
        let body = MethodBody::from_bytes(
            &[0x1B, 0x25],
            method(Vec::new(), TypeSignature::Void),
            Vec::new(),
        )
        .unwrap();

        let shapes = run_to_end(&body);
        assert_eq!(shapes[1], vec![TypeSignature::I4, TypeSignature::I4]);
    }

    #[test]
    fn address_of_local() {
        // ldloca.s 0
        let body = MethodBody::from_bytes(
            &[0x12, 0x00],
            method(Vec::new(), TypeSignature::Void),
            vec![SignatureParameter::plain(TypeSignature::R8)],
        )
        .unwrap();

        let resolver = NullResolver;
        let mut iter = StackIterator::new(&body, &resolver);
        iter.move_next(&body).unwrap();
        let entry = &iter.stack()[0];
        assert_eq!(entry.kind, StackEntryKind::AddressOf);
        assert_eq!(
            entry.ty,
            TypeSignature::ByRef(Box::new(TypeSignature::R8))
        );
    }

    #[test]
    fn leave_discards_stack() {
        // ldc.i4.0 / leave.s +0
        let body = MethodBody::from_bytes(
            &[0x16, 0xDE, 0x00, 0x2A],
            method(Vec::new(), TypeSignature::Void),
            Vec::new(),
        )
        .unwrap();

        let resolver = NullResolver;
        let mut iter = StackIterator::new(&body, &resolver);
        iter.move_next(&body).unwrap();
        assert_eq!(iter.depth(), 1);
        iter.move_next(&body).unwrap();
        assert_eq!(iter.depth(), 0);
    }

    #[test]
    fn generic_substitution_out_of_range() {
        // ldarg.0 where the parameter type is !!1 but only one generic arg is supplied
        let mut body = MethodBody::from_bytes(
            &[0x02],
            method(
                vec![TypeSignature::GenericParamMethod(1)],
                TypeSignature::Void,
            ),
            Vec::new(),
        )
        .unwrap();
        body.set_method_generic_args(vec![TypeSignature::I4]);

        let resolver = NullResolver;
        let mut iter = StackIterator::new(&body, &resolver);
        assert!(iter.move_next(&body).is_err());
    }

    #[test]
    fn generic_substitution_resolves_placeholder() {
        let mut body = MethodBody::from_bytes(
            &[0x02],
            method(
                vec![TypeSignature::GenericParamMethod(0)],
                TypeSignature::Void,
            ),
            Vec::new(),
        )
        .unwrap();
        body.set_method_generic_args(vec![TypeSignature::String]);

        let resolver = NullResolver;
        let mut iter = StackIterator::new(&body, &resolver);
        iter.move_next(&body).unwrap();
        assert_eq!(iter.stack()[0].ty, TypeSignature::String);
    }

    #[test]
    fn structural_edit_invalidates_iterator() {
        let mut body = MethodBody::from_bytes(
            &[0x00, 0x2A],
            method(Vec::new(), TypeSignature::Void),
            Vec::new(),
        )
        .unwrap();

        let resolver = NullResolver;
        let mut iter = StackIterator::new(&body, &resolver);
        iter.move_next(&body).unwrap();

        body.push(Instruction::new(opcodes::NOP, Operand::None).unwrap())
            .unwrap();
        assert!(matches!(
            iter.move_next(&body),
            Err(crate::Error::IteratorInvalidated)
        ));
        assert!(matches!(
            iter.goto(&body, 0),
            Err(crate::Error::IteratorInvalidated)
        ));
    }

    #[test]
    fn call_pops_arguments_and_pushes_return() {
        use crate::test::ScopeFixture;

        // ldc.i4.1 / ldc.i4.2 / call int32 M(int32, int32) / ret
        let scope = ScopeFixture::new().with_method(
            0x0600_0001,
            "M",
            method(vec![TypeSignature::I4, TypeSignature::I4], TypeSignature::I4),
        );
        let body = MethodBody::from_bytes(
            &[0x17, 0x18, 0x28, 0x01, 0x00, 0x00, 0x06, 0x2A],
            method(Vec::new(), TypeSignature::I4),
            Vec::new(),
        )
        .unwrap();

        let mut iter = StackIterator::new(&body, &scope);
        iter.move_next(&body).unwrap();
        iter.move_next(&body).unwrap();
        iter.move_next(&body).unwrap();
        assert_eq!(iter.depth(), 1);
        let entry = &iter.stack()[0];
        assert_eq!(entry.kind, StackEntryKind::Return);
        assert_eq!(entry.ty, TypeSignature::I4);

        iter.move_next(&body).unwrap();
        assert_eq!(iter.depth(), 0);
    }

    #[test]
    fn instance_call_pops_receiver() {
        use crate::test::ScopeFixture;

        let mut signature = method(vec![TypeSignature::I4], TypeSignature::Void);
        signature.convention = CallingConvention::HAS_THIS;

        // ldnull / ldc.i4.0 / callvirt void M(int32)
        let scope = ScopeFixture::new().with_method(0x0A00_0002, "M", signature);
        let body = MethodBody::from_bytes(
            &[0x14, 0x16, 0x6F, 0x02, 0x00, 0x00, 0x0A],
            method(Vec::new(), TypeSignature::Void),
            Vec::new(),
        )
        .unwrap();

        let mut iter = StackIterator::new(&body, &scope);
        while iter.move_next(&body).unwrap() {}
        assert_eq!(iter.depth(), 0);
    }

    #[test]
    fn calli_decodes_inline_signature() {
        use crate::test::ScopeFixture;

        // blob: default convention, 1 param, returns int64, param int32
        let scope =
            ScopeFixture::new().with_signature(0x1100_0001, vec![0x00, 0x01, 0x0A, 0x08]);
        // ldc.i4.3 (argument) / ldc.i4.0 (function pointer) / calli
        let body = MethodBody::from_bytes(
            &[0x19, 0x16, 0x29, 0x01, 0x00, 0x00, 0x11],
            method(Vec::new(), TypeSignature::Void),
            Vec::new(),
        )
        .unwrap();

        let mut iter = StackIterator::new(&body, &scope);
        iter.move_next(&body).unwrap();
        iter.move_next(&body).unwrap();
        iter.move_next(&body).unwrap();
        assert_eq!(iter.depth(), 1);
        assert_eq!(iter.stack()[0].ty, TypeSignature::I8);
    }

    #[test]
    fn goto_resets_stack() {
        let body = MethodBody::from_bytes(
            &[0x16, 0x17, 0x58, 0x2A],
            method(Vec::new(), TypeSignature::Void),
            Vec::new(),
        )
        .unwrap();

        let resolver = NullResolver;
        let mut iter = StackIterator::new(&body, &resolver);
        iter.move_next(&body).unwrap();
        iter.move_next(&body).unwrap();
        assert_eq!(iter.depth(), 2);

        iter.goto(&body, 0).unwrap();
        assert_eq!(iter.depth(), 0);
        iter.move_next(&body).unwrap();
        assert_eq!(iter.current_index(), Some(0));
    }
}
