use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers every failure mode of the bytecode engine: malformed instruction
/// streams, invalid compressed signature encodings, stack-shape violations and misuse of
/// labels or iterators. Each variant carries the context needed for the caller to react
/// at the point of detection; no error is ever downgraded to a default value.
///
/// # Error Categories
///
/// ## Stream decoding
/// - [`Error::OutOfBounds`] - Read past the end of the instruction/signature buffer
/// - [`Error::Malformed`] - Corrupted or truncated binary data
/// - [`Error::InvalidPosition`] - Disassembler accessor used before-first or past-end
///
/// ## Signature decoding
/// - [`Error::RecursionLimit`] - Nesting (including cyclic generic chains) exceeded the cap
/// - [`Error::DuplicateSentinel`] - Second vararg sentinel in one parameter list
/// - [`Error::InvalidModifier`] - Custom-modifier tag references an invalid table
///
/// ## Instruction model
/// - [`Error::OperandMismatch`] - Operand tag does not match the opcode's declared kind
/// - [`Error::MisalignedBranchTarget`] - Branch target not on an instruction boundary
/// - [`Error::ForeignLabel`] - Index label used against a provider that did not issue it
/// - [`Error::DanglingLabel`] - Label whose target instruction was removed by an edit
///
/// ## Analysis
/// - [`Error::StackUnderflow`] - Instruction pops more entries than the stack holds
/// - [`Error::TypeCombination`] - Operand types have no defined binary-operation result
/// - [`Error::IteratorInvalidated`] - Instruction sequence mutated during iteration
///
/// ## Resolution / emission
/// - [`Error::TokenNotFound`] - Metadata token absent from the resolution scope
/// - [`Error::Unsupported`] - Operation the engine refuses (e.g. unmanaged convention emission)
#[derive(Error, Debug)]
pub enum Error {
    /// The data is damaged and could not be decoded.
    ///
    /// Indicates that an instruction stream or signature blob does not conform to the
    /// ECMA-335 binary format. The error includes the source location where the
    /// malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while decoding.
    ///
    /// Reading an opcode, operand or signature element would have crossed the end of
    /// the buffer. This is the strict-mode outcome for a truncated tail; lenient
    /// disassembly reports "no more instructions" instead.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// A current-instruction accessor was used at an invalid cursor position.
    ///
    /// The disassembler cursor is before the first instruction or past the end of the
    /// stream. This is a usage error by the caller, not a stream defect.
    #[error("Disassembler has no current instruction at this position")]
    InvalidPosition,

    /// Recursion limit reached.
    ///
    /// Signature decoding bounds its nesting depth so that deeply nested (or cyclic)
    /// generic instantiations fail instead of looping. The associated value is the
    /// limit that was hit.
    #[error("Reached the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// The operand does not match the opcode's declared operand kind.
    ///
    /// Instructions are validated at construction; combining e.g. a branch label with
    /// an opcode that takes a member token is rejected here rather than surfacing as
    /// garbage bytes at emission.
    #[error("Operand kind `{found}` does not match `{expected}` declared by `{mnemonic}`")]
    OperandMismatch {
        /// Mnemonic of the opcode the operand was combined with
        mnemonic: &'static str,
        /// Operand kind the opcode declares
        expected: &'static str,
        /// Operand kind that was supplied
        found: &'static str,
    },

    /// A branch target address does not fall on an instruction boundary.
    ///
    /// Found during the two-pass relocation of raw byte offsets into instruction
    /// indices, or when converting an address through a label provider.
    #[error("Branch target 0x{0:x} is not on an instruction boundary")]
    MisalignedBranchTarget(usize),

    /// A vararg parameter list contained more than one sentinel marker.
    #[error("Duplicate sentinel in vararg parameter list")]
    DuplicateSentinel,

    /// A custom modifier carries a token from a table that is not
    /// TypeDef, TypeRef or TypeSpec.
    #[error("Invalid custom modifier token table - 0x{0:02x}")]
    InvalidModifier(u8),

    /// A metadata token could not be resolved within the scope.
    #[error("Token not found in metadata scope - {0}")]
    TokenNotFound(Token),

    /// An instruction pops more entries than the evaluation stack currently holds.
    ///
    /// The associated value is the index of the offending instruction.
    #[error("Stack underflow at instruction {0}")]
    StackUnderflow(usize),

    /// The operand types on the stack have no defined result for this operation.
    ///
    /// Mirrors the ECMA-335 binary-operation tables: combinations outside the table
    /// (e.g. `int32 + float64`) are rejected, naming the instruction index.
    #[error("Undefined type combination at instruction {index}: {message}")]
    TypeCombination {
        /// Index of the instruction with the undefined combination
        index: usize,
        /// Description of the operand types involved
        message: String,
    },

    /// The requested operation is not supported by this engine.
    ///
    /// Used for e.g. emission of unmanaged calling conventions and rewriting of
    /// `ldtoken` field references.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The instruction sequence was mutated while an iterator was live.
    ///
    /// Stack-state iteration snapshots the body's edit version; any structural edit
    /// invalidates the iterator instead of letting it walk stale data.
    #[error("Instruction sequence was modified while an iterator was live")]
    IteratorInvalidated,

    /// An index-based label was used against a provider that did not issue it.
    #[error("Label belongs to a different label provider")]
    ForeignLabel,

    /// A label whose target instruction was removed by a structural edit.
    ///
    /// The associated value is the label slot that was invalidated.
    #[error("Label {0} no longer refers to a live instruction")]
    DanglingLabel(usize),
}
