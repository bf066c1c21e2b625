//! Static CIL opcode tables.
//!
//! Every opcode descriptor is a compile-time constant: mnemonic, encoding (one byte,
//! or two bytes behind the 0xFE prefix), declared operand kind, control-flow class
//! and static stack behavior. The two 256-entry tables are built at compile time and
//! keyed directly by the numeric opcode value; reserved slots carry an empty
//! mnemonic (ECMA-335 III.1).

use strum::Display;

/// The operand kind an opcode declares for its inline bytes.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No inline operand
    None,
    /// Signed 8-bit immediate (`ldc.i4.s`)
    Int8,
    /// Unsigned 8-bit immediate (`unaligned.`, `no.`)
    UInt8,
    /// Signed 32-bit immediate
    Int32,
    /// Signed 64-bit immediate
    Int64,
    /// 32-bit float immediate
    Float32,
    /// 64-bit float immediate
    Float64,
    /// User-string token (`ldstr`)
    String,
    /// 8-bit branch displacement from the end of the instruction
    BranchTarget8,
    /// 32-bit branch displacement from the end of the instruction
    BranchTarget32,
    /// 8-bit argument/local index (`*_s` forms)
    Variable8,
    /// 16-bit argument/local index (wide forms)
    Variable16,
    /// Method token
    Method,
    /// Field token
    Field,
    /// Type token
    Type,
    /// Token of any member kind (`ldtoken`)
    Token,
    /// Standalone-signature token (`calli`)
    Signature,
    /// Jump table: case count followed by 32-bit displacements
    Switch,
}

/// How an instruction affects control flow.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// Always transfers to the branch target
    UnconditionalBranch,
    /// Transfers to the branch target or falls through
    ConditionalBranch,
    /// Transfers to one of the jump-table targets or falls through
    Switch,
    /// Calls another method and continues after it returns
    Call,
    /// Leaves the method (or filter/finally region)
    Return,
    /// Raises an exception
    Throw,
    /// Debugger break
    Break,
    /// Prefix that modifies the following instruction
    Meta,
}

/// Static pop behavior class of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPop {
    /// Pops nothing
    Pop0,
    /// Pops one entry
    Pop1,
    /// Pops two entries
    Pop2,
    /// Pops three entries
    Pop3,
    /// Pop count depends on the resolved callee signature (`call`, `calli`, `ret`, …)
    VarPop,
}

impl StackPop {
    /// Fixed pop count, or `None` for [`StackPop::VarPop`].
    #[must_use]
    pub fn count(&self) -> Option<usize> {
        match self {
            StackPop::Pop0 => Some(0),
            StackPop::Pop1 => Some(1),
            StackPop::Pop2 => Some(2),
            StackPop::Pop3 => Some(3),
            StackPop::VarPop => None,
        }
    }
}

/// Static push behavior class of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPush {
    /// Pushes nothing
    Push0,
    /// Pushes one entry whose type depends on the operands
    Push1,
    /// Pushes two entries (`dup`)
    Push2,
    /// Pushes an int32/native int
    PushI,
    /// Pushes an int64
    PushI8,
    /// Pushes a float32
    PushR4,
    /// Pushes a float64
    PushR8,
    /// Pushes an object reference
    PushRef,
    /// Push depends on the resolved callee signature
    VarPush,
}

/// One CIL opcode descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode {
    /// Instruction mnemonic; empty for reserved encodings
    pub mnemonic: &'static str,
    /// 0 for one-byte opcodes, 0xFE for the two-byte page
    pub prefix: u8,
    /// The (second) opcode byte
    pub code: u8,
    /// Declared operand kind
    pub operand_kind: OperandKind,
    /// Control-flow class
    pub flow: FlowType,
    /// Static pop behavior
    pub pops: StackPop,
    /// Static push behavior
    pub pushes: StackPush,
}

impl OpCode {
    /// Size of the opcode encoding itself (1 or 2 bytes).
    #[must_use]
    pub fn size(&self) -> usize {
        if self.prefix == 0xFE {
            2
        } else {
            1
        }
    }

    /// Returns `true` for reserved table slots.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.mnemonic.is_empty()
    }

    /// Fixed byte size of the inline operand, or `None` for `switch` (length
    /// depends on the case count).
    #[must_use]
    pub fn operand_size(&self) -> Option<usize> {
        let size = match self.operand_kind {
            OperandKind::None => 0,
            OperandKind::Int8 | OperandKind::UInt8 => 1,
            OperandKind::BranchTarget8 | OperandKind::Variable8 => 1,
            OperandKind::Variable16 => 2,
            OperandKind::Int32 | OperandKind::Float32 => 4,
            OperandKind::String
            | OperandKind::BranchTarget32
            | OperandKind::Method
            | OperandKind::Field
            | OperandKind::Type
            | OperandKind::Token
            | OperandKind::Signature => 4,
            OperandKind::Int64 | OperandKind::Float64 => 8,
            OperandKind::Switch => return None,
        };
        Some(size)
    }
}

const RESERVED: OpCode = OpCode {
    mnemonic: "",
    prefix: 0,
    code: 0,
    operand_kind: OperandKind::None,
    flow: FlowType::Sequential,
    pops: StackPop::Pop0,
    pushes: StackPush::Push0,
};

macro_rules! define_opcodes {
    ($table:ident, $prefix:literal; $( $NAME:ident = ($code:literal, $mnemonic:literal, $kind:ident, $flow:ident, $pops:ident, $pushes:ident) ),* $(,)? ) => {
        $(
            #[doc = concat!("`", $mnemonic, "`")]
            pub const $NAME: OpCode = OpCode {
                mnemonic: $mnemonic,
                prefix: $prefix,
                code: $code,
                operand_kind: OperandKind::$kind,
                flow: FlowType::$flow,
                pops: StackPop::$pops,
                pushes: StackPush::$pushes,
            };
        )*

        pub(crate) static $table: [OpCode; 256] = {
            let mut table = [RESERVED; 256];
            $( table[$code as usize] = $NAME; )*
            table
        };
    };
}

define_opcodes!(OPCODES, 0x00;
    NOP = (0x00, "nop", None, Sequential, Pop0, Push0),
    BREAK = (0x01, "break", None, Break, Pop0, Push0),
    LDARG_0 = (0x02, "ldarg.0", None, Sequential, Pop0, Push1),
    LDARG_1 = (0x03, "ldarg.1", None, Sequential, Pop0, Push1),
    LDARG_2 = (0x04, "ldarg.2", None, Sequential, Pop0, Push1),
    LDARG_3 = (0x05, "ldarg.3", None, Sequential, Pop0, Push1),
    LDLOC_0 = (0x06, "ldloc.0", None, Sequential, Pop0, Push1),
    LDLOC_1 = (0x07, "ldloc.1", None, Sequential, Pop0, Push1),
    LDLOC_2 = (0x08, "ldloc.2", None, Sequential, Pop0, Push1),
    LDLOC_3 = (0x09, "ldloc.3", None, Sequential, Pop0, Push1),
    STLOC_0 = (0x0A, "stloc.0", None, Sequential, Pop1, Push0),
    STLOC_1 = (0x0B, "stloc.1", None, Sequential, Pop1, Push0),
    STLOC_2 = (0x0C, "stloc.2", None, Sequential, Pop1, Push0),
    STLOC_3 = (0x0D, "stloc.3", None, Sequential, Pop1, Push0),
    LDARG_S = (0x0E, "ldarg.s", Variable8, Sequential, Pop0, Push1),
    LDARGA_S = (0x0F, "ldarga.s", Variable8, Sequential, Pop0, PushI),
    STARG_S = (0x10, "starg.s", Variable8, Sequential, Pop1, Push0),
    LDLOC_S = (0x11, "ldloc.s", Variable8, Sequential, Pop0, Push1),
    LDLOCA_S = (0x12, "ldloca.s", Variable8, Sequential, Pop0, PushI),
    STLOC_S = (0x13, "stloc.s", Variable8, Sequential, Pop1, Push0),
    LDNULL = (0x14, "ldnull", None, Sequential, Pop0, PushRef),
    LDC_I4_M1 = (0x15, "ldc.i4.m1", None, Sequential, Pop0, PushI),
    LDC_I4_0 = (0x16, "ldc.i4.0", None, Sequential, Pop0, PushI),
    LDC_I4_1 = (0x17, "ldc.i4.1", None, Sequential, Pop0, PushI),
    LDC_I4_2 = (0x18, "ldc.i4.2", None, Sequential, Pop0, PushI),
    LDC_I4_3 = (0x19, "ldc.i4.3", None, Sequential, Pop0, PushI),
    LDC_I4_4 = (0x1A, "ldc.i4.4", None, Sequential, Pop0, PushI),
    LDC_I4_5 = (0x1B, "ldc.i4.5", None, Sequential, Pop0, PushI),
    LDC_I4_6 = (0x1C, "ldc.i4.6", None, Sequential, Pop0, PushI),
    LDC_I4_7 = (0x1D, "ldc.i4.7", None, Sequential, Pop0, PushI),
    LDC_I4_8 = (0x1E, "ldc.i4.8", None, Sequential, Pop0, PushI),
    LDC_I4_S = (0x1F, "ldc.i4.s", Int8, Sequential, Pop0, PushI),
    LDC_I4 = (0x20, "ldc.i4", Int32, Sequential, Pop0, PushI),
    LDC_I8 = (0x21, "ldc.i8", Int64, Sequential, Pop0, PushI8),
    LDC_R4 = (0x22, "ldc.r4", Float32, Sequential, Pop0, PushR4),
    LDC_R8 = (0x23, "ldc.r8", Float64, Sequential, Pop0, PushR8),
    DUP = (0x25, "dup", None, Sequential, Pop1, Push2),
    POP = (0x26, "pop", None, Sequential, Pop1, Push0),
    JMP = (0x27, "jmp", Method, Call, Pop0, Push0),
    CALL = (0x28, "call", Method, Call, VarPop, VarPush),
    CALLI = (0x29, "calli", Signature, Call, VarPop, VarPush),
    RET = (0x2A, "ret", None, Return, VarPop, Push0),
    BR_S = (0x2B, "br.s", BranchTarget8, UnconditionalBranch, Pop0, Push0),
    BRFALSE_S = (0x2C, "brfalse.s", BranchTarget8, ConditionalBranch, Pop1, Push0),
    BRTRUE_S = (0x2D, "brtrue.s", BranchTarget8, ConditionalBranch, Pop1, Push0),
    BEQ_S = (0x2E, "beq.s", BranchTarget8, ConditionalBranch, Pop2, Push0),
    BGE_S = (0x2F, "bge.s", BranchTarget8, ConditionalBranch, Pop2, Push0),
    BGT_S = (0x30, "bgt.s", BranchTarget8, ConditionalBranch, Pop2, Push0),
    BLE_S = (0x31, "ble.s", BranchTarget8, ConditionalBranch, Pop2, Push0),
    BLT_S = (0x32, "blt.s", BranchTarget8, ConditionalBranch, Pop2, Push0),
    BNE_UN_S = (0x33, "bne.un.s", BranchTarget8, ConditionalBranch, Pop2, Push0),
    BGE_UN_S = (0x34, "bge.un.s", BranchTarget8, ConditionalBranch, Pop2, Push0),
    BGT_UN_S = (0x35, "bgt.un.s", BranchTarget8, ConditionalBranch, Pop2, Push0),
    BLE_UN_S = (0x36, "ble.un.s", BranchTarget8, ConditionalBranch, Pop2, Push0),
    BLT_UN_S = (0x37, "blt.un.s", BranchTarget8, ConditionalBranch, Pop2, Push0),
    BR = (0x38, "br", BranchTarget32, UnconditionalBranch, Pop0, Push0),
    BRFALSE = (0x39, "brfalse", BranchTarget32, ConditionalBranch, Pop1, Push0),
    BRTRUE = (0x3A, "brtrue", BranchTarget32, ConditionalBranch, Pop1, Push0),
    BEQ = (0x3B, "beq", BranchTarget32, ConditionalBranch, Pop2, Push0),
    BGE = (0x3C, "bge", BranchTarget32, ConditionalBranch, Pop2, Push0),
    BGT = (0x3D, "bgt", BranchTarget32, ConditionalBranch, Pop2, Push0),
    BLE = (0x3E, "ble", BranchTarget32, ConditionalBranch, Pop2, Push0),
    BLT = (0x3F, "blt", BranchTarget32, ConditionalBranch, Pop2, Push0),
    BNE_UN = (0x40, "bne.un", BranchTarget32, ConditionalBranch, Pop2, Push0),
    BGE_UN = (0x41, "bge.un", BranchTarget32, ConditionalBranch, Pop2, Push0),
    BGT_UN = (0x42, "bgt.un", BranchTarget32, ConditionalBranch, Pop2, Push0),
    BLE_UN = (0x43, "ble.un", BranchTarget32, ConditionalBranch, Pop2, Push0),
    BLT_UN = (0x44, "blt.un", BranchTarget32, ConditionalBranch, Pop2, Push0),
    SWITCH = (0x45, "switch", Switch, Switch, Pop1, Push0),
    LDIND_I1 = (0x46, "ldind.i1", None, Sequential, Pop1, PushI),
    LDIND_U1 = (0x47, "ldind.u1", None, Sequential, Pop1, PushI),
    LDIND_I2 = (0x48, "ldind.i2", None, Sequential, Pop1, PushI),
    LDIND_U2 = (0x49, "ldind.u2", None, Sequential, Pop1, PushI),
    LDIND_I4 = (0x4A, "ldind.i4", None, Sequential, Pop1, PushI),
    LDIND_U4 = (0x4B, "ldind.u4", None, Sequential, Pop1, PushI),
    LDIND_I8 = (0x4C, "ldind.i8", None, Sequential, Pop1, PushI8),
    LDIND_I = (0x4D, "ldind.i", None, Sequential, Pop1, PushI),
    LDIND_R4 = (0x4E, "ldind.r4", None, Sequential, Pop1, PushR4),
    LDIND_R8 = (0x4F, "ldind.r8", None, Sequential, Pop1, PushR8),
    LDIND_REF = (0x50, "ldind.ref", None, Sequential, Pop1, PushRef),
    STIND_REF = (0x51, "stind.ref", None, Sequential, Pop2, Push0),
    STIND_I1 = (0x52, "stind.i1", None, Sequential, Pop2, Push0),
    STIND_I2 = (0x53, "stind.i2", None, Sequential, Pop2, Push0),
    STIND_I4 = (0x54, "stind.i4", None, Sequential, Pop2, Push0),
    STIND_I8 = (0x55, "stind.i8", None, Sequential, Pop2, Push0),
    STIND_R4 = (0x56, "stind.r4", None, Sequential, Pop2, Push0),
    STIND_R8 = (0x57, "stind.r8", None, Sequential, Pop2, Push0),
    ADD = (0x58, "add", None, Sequential, Pop2, Push1),
    SUB = (0x59, "sub", None, Sequential, Pop2, Push1),
    MUL = (0x5A, "mul", None, Sequential, Pop2, Push1),
    DIV = (0x5B, "div", None, Sequential, Pop2, Push1),
    DIV_UN = (0x5C, "div.un", None, Sequential, Pop2, Push1),
    REM = (0x5D, "rem", None, Sequential, Pop2, Push1),
    REM_UN = (0x5E, "rem.un", None, Sequential, Pop2, Push1),
    AND = (0x5F, "and", None, Sequential, Pop2, Push1),
    OR = (0x60, "or", None, Sequential, Pop2, Push1),
    XOR = (0x61, "xor", None, Sequential, Pop2, Push1),
    SHL = (0x62, "shl", None, Sequential, Pop2, Push1),
    SHR = (0x63, "shr", None, Sequential, Pop2, Push1),
    SHR_UN = (0x64, "shr.un", None, Sequential, Pop2, Push1),
    NEG = (0x65, "neg", None, Sequential, Pop1, Push1),
    NOT = (0x66, "not", None, Sequential, Pop1, Push1),
    CONV_I1 = (0x67, "conv.i1", None, Sequential, Pop1, PushI),
    CONV_I2 = (0x68, "conv.i2", None, Sequential, Pop1, PushI),
    CONV_I4 = (0x69, "conv.i4", None, Sequential, Pop1, PushI),
    CONV_I8 = (0x6A, "conv.i8", None, Sequential, Pop1, PushI8),
    CONV_R4 = (0x6B, "conv.r4", None, Sequential, Pop1, PushR4),
    CONV_R8 = (0x6C, "conv.r8", None, Sequential, Pop1, PushR8),
    CONV_U4 = (0x6D, "conv.u4", None, Sequential, Pop1, PushI),
    CONV_U8 = (0x6E, "conv.u8", None, Sequential, Pop1, PushI8),
    CALLVIRT = (0x6F, "callvirt", Method, Call, VarPop, VarPush),
    CPOBJ = (0x70, "cpobj", Type, Sequential, Pop2, Push0),
    LDOBJ = (0x71, "ldobj", Type, Sequential, Pop1, Push1),
    LDSTR = (0x72, "ldstr", String, Sequential, Pop0, PushRef),
    NEWOBJ = (0x73, "newobj", Method, Call, VarPop, PushRef),
    CASTCLASS = (0x74, "castclass", Type, Sequential, Pop1, PushRef),
    ISINST = (0x75, "isinst", Type, Sequential, Pop1, PushRef),
    CONV_R_UN = (0x76, "conv.r.un", None, Sequential, Pop1, PushR8),
    UNBOX = (0x79, "unbox", Type, Sequential, Pop1, PushI),
    THROW = (0x7A, "throw", None, Throw, Pop1, Push0),
    LDFLD = (0x7B, "ldfld", Field, Sequential, Pop1, Push1),
    LDFLDA = (0x7C, "ldflda", Field, Sequential, Pop1, PushI),
    STFLD = (0x7D, "stfld", Field, Sequential, Pop2, Push0),
    LDSFLD = (0x7E, "ldsfld", Field, Sequential, Pop0, Push1),
    LDSFLDA = (0x7F, "ldsflda", Field, Sequential, Pop0, PushI),
    STSFLD = (0x80, "stsfld", Field, Sequential, Pop1, Push0),
    STOBJ = (0x81, "stobj", Type, Sequential, Pop2, Push0),
    CONV_OVF_I1_UN = (0x82, "conv.ovf.i1.un", None, Sequential, Pop1, PushI),
    CONV_OVF_I2_UN = (0x83, "conv.ovf.i2.un", None, Sequential, Pop1, PushI),
    CONV_OVF_I4_UN = (0x84, "conv.ovf.i4.un", None, Sequential, Pop1, PushI),
    CONV_OVF_I8_UN = (0x85, "conv.ovf.i8.un", None, Sequential, Pop1, PushI8),
    CONV_OVF_U1_UN = (0x86, "conv.ovf.u1.un", None, Sequential, Pop1, PushI),
    CONV_OVF_U2_UN = (0x87, "conv.ovf.u2.un", None, Sequential, Pop1, PushI),
    CONV_OVF_U4_UN = (0x88, "conv.ovf.u4.un", None, Sequential, Pop1, PushI),
    CONV_OVF_U8_UN = (0x89, "conv.ovf.u8.un", None, Sequential, Pop1, PushI8),
    CONV_OVF_I_UN = (0x8A, "conv.ovf.i.un", None, Sequential, Pop1, PushI),
    CONV_OVF_U_UN = (0x8B, "conv.ovf.u.un", None, Sequential, Pop1, PushI),
    BOX = (0x8C, "box", Type, Sequential, Pop1, PushRef),
    NEWARR = (0x8D, "newarr", Type, Sequential, Pop1, PushRef),
    LDLEN = (0x8E, "ldlen", None, Sequential, Pop1, PushI),
    LDELEMA = (0x8F, "ldelema", Type, Sequential, Pop2, PushI),
    LDELEM_I1 = (0x90, "ldelem.i1", None, Sequential, Pop2, PushI),
    LDELEM_U1 = (0x91, "ldelem.u1", None, Sequential, Pop2, PushI),
    LDELEM_I2 = (0x92, "ldelem.i2", None, Sequential, Pop2, PushI),
    LDELEM_U2 = (0x93, "ldelem.u2", None, Sequential, Pop2, PushI),
    LDELEM_I4 = (0x94, "ldelem.i4", None, Sequential, Pop2, PushI),
    LDELEM_U4 = (0x95, "ldelem.u4", None, Sequential, Pop2, PushI),
    LDELEM_I8 = (0x96, "ldelem.i8", None, Sequential, Pop2, PushI8),
    LDELEM_I = (0x97, "ldelem.i", None, Sequential, Pop2, PushI),
    LDELEM_R4 = (0x98, "ldelem.r4", None, Sequential, Pop2, PushR4),
    LDELEM_R8 = (0x99, "ldelem.r8", None, Sequential, Pop2, PushR8),
    LDELEM_REF = (0x9A, "ldelem.ref", None, Sequential, Pop2, PushRef),
    STELEM_I = (0x9B, "stelem.i", None, Sequential, Pop3, Push0),
    STELEM_I1 = (0x9C, "stelem.i1", None, Sequential, Pop3, Push0),
    STELEM_I2 = (0x9D, "stelem.i2", None, Sequential, Pop3, Push0),
    STELEM_I4 = (0x9E, "stelem.i4", None, Sequential, Pop3, Push0),
    STELEM_I8 = (0x9F, "stelem.i8", None, Sequential, Pop3, Push0),
    STELEM_R4 = (0xA0, "stelem.r4", None, Sequential, Pop3, Push0),
    STELEM_R8 = (0xA1, "stelem.r8", None, Sequential, Pop3, Push0),
    STELEM_REF = (0xA2, "stelem.ref", None, Sequential, Pop3, Push0),
    LDELEM = (0xA3, "ldelem", Type, Sequential, Pop2, Push1),
    STELEM = (0xA4, "stelem", Type, Sequential, Pop3, Push0),
    UNBOX_ANY = (0xA5, "unbox.any", Type, Sequential, Pop1, Push1),
    CONV_OVF_I1 = (0xB3, "conv.ovf.i1", None, Sequential, Pop1, PushI),
    CONV_OVF_U1 = (0xB4, "conv.ovf.u1", None, Sequential, Pop1, PushI),
    CONV_OVF_I2 = (0xB5, "conv.ovf.i2", None, Sequential, Pop1, PushI),
    CONV_OVF_U2 = (0xB6, "conv.ovf.u2", None, Sequential, Pop1, PushI),
    CONV_OVF_I4 = (0xB7, "conv.ovf.i4", None, Sequential, Pop1, PushI),
    CONV_OVF_U4 = (0xB8, "conv.ovf.u4", None, Sequential, Pop1, PushI),
    CONV_OVF_I8 = (0xB9, "conv.ovf.i8", None, Sequential, Pop1, PushI8),
    CONV_OVF_U8 = (0xBA, "conv.ovf.u8", None, Sequential, Pop1, PushI8),
    REFANYVAL = (0xC2, "refanyval", Type, Sequential, Pop1, PushI),
    CKFINITE = (0xC3, "ckfinite", None, Sequential, Pop1, PushR8),
    MKREFANY = (0xC6, "mkrefany", Type, Sequential, Pop1, Push1),
    LDTOKEN = (0xD0, "ldtoken", Token, Sequential, Pop0, PushI),
    CONV_U2 = (0xD1, "conv.u2", None, Sequential, Pop1, PushI),
    CONV_U1 = (0xD2, "conv.u1", None, Sequential, Pop1, PushI),
    CONV_I = (0xD3, "conv.i", None, Sequential, Pop1, PushI),
    CONV_OVF_I = (0xD4, "conv.ovf.i", None, Sequential, Pop1, PushI),
    CONV_OVF_U = (0xD5, "conv.ovf.u", None, Sequential, Pop1, PushI),
    ADD_OVF = (0xD6, "add.ovf", None, Sequential, Pop2, Push1),
    ADD_OVF_UN = (0xD7, "add.ovf.un", None, Sequential, Pop2, Push1),
    MUL_OVF = (0xD8, "mul.ovf", None, Sequential, Pop2, Push1),
    MUL_OVF_UN = (0xD9, "mul.ovf.un", None, Sequential, Pop2, Push1),
    SUB_OVF = (0xDA, "sub.ovf", None, Sequential, Pop2, Push1),
    SUB_OVF_UN = (0xDB, "sub.ovf.un", None, Sequential, Pop2, Push1),
    ENDFINALLY = (0xDC, "endfinally", None, Return, Pop0, Push0),
    LEAVE = (0xDD, "leave", BranchTarget32, UnconditionalBranch, Pop0, Push0),
    LEAVE_S = (0xDE, "leave.s", BranchTarget8, UnconditionalBranch, Pop0, Push0),
    STIND_I = (0xDF, "stind.i", None, Sequential, Pop2, Push0),
    CONV_U = (0xE0, "conv.u", None, Sequential, Pop1, PushI),
);

define_opcodes!(OPCODES_FE, 0xFE;
    ARGLIST = (0x00, "arglist", None, Sequential, Pop0, PushI),
    CEQ = (0x01, "ceq", None, Sequential, Pop2, PushI),
    CGT = (0x02, "cgt", None, Sequential, Pop2, PushI),
    CGT_UN = (0x03, "cgt.un", None, Sequential, Pop2, PushI),
    CLT = (0x04, "clt", None, Sequential, Pop2, PushI),
    CLT_UN = (0x05, "clt.un", None, Sequential, Pop2, PushI),
    LDFTN = (0x06, "ldftn", Method, Sequential, Pop0, PushI),
    LDVIRTFTN = (0x07, "ldvirtftn", Method, Sequential, Pop1, PushI),
    LDARG = (0x09, "ldarg", Variable16, Sequential, Pop0, Push1),
    LDARGA = (0x0A, "ldarga", Variable16, Sequential, Pop0, PushI),
    STARG = (0x0B, "starg", Variable16, Sequential, Pop1, Push0),
    LDLOC = (0x0C, "ldloc", Variable16, Sequential, Pop0, Push1),
    LDLOCA = (0x0D, "ldloca", Variable16, Sequential, Pop0, PushI),
    STLOC = (0x0E, "stloc", Variable16, Sequential, Pop1, Push0),
    LOCALLOC = (0x0F, "localloc", None, Sequential, Pop1, PushI),
    ENDFILTER = (0x11, "endfilter", None, Return, Pop1, Push0),
    UNALIGNED = (0x12, "unaligned.", UInt8, Meta, Pop0, Push0),
    VOLATILE = (0x13, "volatile.", None, Meta, Pop0, Push0),
    TAIL = (0x14, "tail.", None, Meta, Pop0, Push0),
    INITOBJ = (0x15, "initobj", Type, Sequential, Pop1, Push0),
    CONSTRAINED = (0x16, "constrained.", Type, Meta, Pop0, Push0),
    CPBLK = (0x17, "cpblk", None, Sequential, Pop3, Push0),
    INITBLK = (0x18, "initblk", None, Sequential, Pop3, Push0),
    NO = (0x19, "no.", UInt8, Meta, Pop0, Push0),
    RETHROW = (0x1A, "rethrow", None, Throw, Pop0, Push0),
    SIZEOF = (0x1C, "sizeof", Type, Sequential, Pop0, PushI),
    REFANYTYPE = (0x1D, "refanytype", None, Sequential, Pop1, PushI),
    READONLY = (0x1E, "readonly.", None, Meta, Pop0, Push0),
);

/// Look up an opcode descriptor by encoding.
///
/// ## Arguments
/// * `prefix` - 0 for the one-byte page, 0xFE for the extended page
/// * `code` - The (second) opcode byte
#[must_use]
pub fn lookup(prefix: u8, code: u8) -> Option<&'static OpCode> {
    let table = match prefix {
        0x00 => &OPCODES,
        0xFE => &OPCODES_FE,
        _ => return None,
    };

    let opcode = &table[code as usize];
    if opcode.is_reserved() {
        None
    } else {
        Some(opcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_opcodes() {
        assert_eq!(lookup(0, 0x2A), Some(&RET));
        assert_eq!(lookup(0xFE, 0x01), Some(&CEQ));
        assert_eq!(lookup(0, 0x00), Some(&NOP));
    }

    #[test]
    fn lookup_reserved_slots() {
        assert_eq!(lookup(0, 0x24), None);
        assert_eq!(lookup(0, 0xFF), None);
        assert_eq!(lookup(0xFE, 0xFF), None);
        assert_eq!(lookup(0x12, 0x00), None);
    }

    #[test]
    fn encoding_sizes() {
        assert_eq!(RET.size(), 1);
        assert_eq!(CEQ.size(), 2);
        assert_eq!(LDC_I4.operand_size(), Some(4));
        assert_eq!(LDC_I8.operand_size(), Some(8));
        assert_eq!(LDARG_S.operand_size(), Some(1));
        assert_eq!(LDARG.operand_size(), Some(2));
        assert_eq!(SWITCH.operand_size(), None);
    }

    #[test]
    fn stack_behavior_classes() {
        assert_eq!(ADD.pops.count(), Some(2));
        assert_eq!(CALL.pops.count(), None);
        assert_eq!(NOP.pops.count(), Some(0));
        assert_eq!(DUP.pushes, StackPush::Push2);
    }
}
