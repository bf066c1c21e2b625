use bitflags::bitflags;

use crate::metadata::token::Token;

/// ECMA-335 II.23.1.16 element type constants used in signature blobs.
#[allow(non_snake_case, missing_docs)]
pub mod ELEMENT_TYPE {
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const PTR: u8 = 0x0F;
    pub const BYREF: u8 = 0x10;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const FNPTR: u8 = 0x1B;
    pub const OBJECT: u8 = 0x1C;
    pub const SZARRAY: u8 = 0x1D;
    pub const MVAR: u8 = 0x1E;
    pub const CMOD_REQD: u8 = 0x1F;
    pub const CMOD_OPT: u8 = 0x20;
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
}

bitflags! {
    /// Calling-convention flags from the first byte of a method or property signature
    /// (ECMA-335 II.23.2.1 / II.23.2.3).
    ///
    /// The low nibble selects the convention, the high nibble carries the
    /// has-this / explicit-this / generic markers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CallingConvention: u8 {
        /// Unmanaged cdecl
        const C = 0x01;
        /// Unmanaged stdcall
        const STDCALL = 0x02;
        /// Unmanaged thiscall
        const THISCALL = 0x03;
        /// Unmanaged fastcall
        const FASTCALL = 0x04;
        /// Managed vararg
        const VARARG = 0x05;
        /// Generic method with an encoded generic parameter count
        const GENERIC = 0x10;
        /// Instance method (`this` is passed implicitly)
        const HAS_THIS = 0x20;
        /// `this` is encoded explicitly as the first parameter type
        const EXPLICIT_THIS = 0x40;
    }
}

impl CallingConvention {
    /// The convention selector from the low nibble.
    #[must_use]
    pub fn kind(&self) -> u8 {
        self.bits() & 0x0F
    }

    /// Returns `true` for the managed vararg convention.
    #[must_use]
    pub fn is_vararg(&self) -> bool {
        self.kind() == Self::VARARG.bits()
    }

    /// Returns `true` for any unmanaged native convention (cdecl, stdcall,
    /// thiscall, fastcall). These can be decoded but never re-emitted.
    #[must_use]
    pub fn is_unmanaged(&self) -> bool {
        matches!(self.kind(), 0x01..=0x04)
    }
}

/// A decoded metadata signature.
///
/// One variant per signature family the engine understands; the tag replaces the
/// abstract-class hierarchy found in reflection-based implementations.
#[derive(Debug, Clone, PartialEq)]
pub enum Signature {
    /// MethodDefSig / MethodRefSig / StandAloneMethodSig (II.23.2.1-3)
    Method(MethodSignature),
    /// FieldSig (II.23.2.4)
    Field(FieldSignature),
    /// PropertySig (II.23.2.5)
    Property(PropertySignature),
}

/// A method signature: calling convention, return descriptor and parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodSignature {
    /// Calling convention and instance/generic flags
    pub convention: CallingConvention,
    /// Number of generic parameters (0 unless [`CallingConvention::GENERIC`])
    pub generic_param_count: u32,
    /// Return descriptor (`void` is an ordinary type here)
    pub return_type: SignatureParameter,
    /// Fixed parameters, in declaration order
    pub params: Vec<SignatureParameter>,
    /// For vararg signatures, the index within `params` where the sentinel sits;
    /// parameters at or after this index belong to the variable part
    pub sentinel: Option<usize>,
}

/// A field signature: the field type with its leading custom modifiers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldSignature {
    /// Custom modifiers, in blob order
    pub modifiers: Vec<CustomModifier>,
    /// The field type
    pub base: TypeSignature,
}

/// A property signature: getter shape without the accessor conventions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertySignature {
    /// Whether accessors take an implicit `this`
    pub has_this: bool,
    /// Custom modifiers on the property type
    pub modifiers: Vec<CustomModifier>,
    /// The property type
    pub base: TypeSignature,
    /// Index parameters
    pub params: Vec<SignatureParameter>,
}

/// One parameter or return entry: ordered custom modifiers, byref flag and type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureParameter {
    /// Custom modifiers, in blob order
    pub modifiers: Vec<CustomModifier>,
    /// `true` if passed by reference (BYREF marker)
    pub by_ref: bool,
    /// The parameter type
    pub base: TypeSignature,
}

impl SignatureParameter {
    /// A plain parameter of the given type, no modifiers, by value.
    #[must_use]
    pub fn plain(base: TypeSignature) -> Self {
        SignatureParameter {
            modifiers: Vec::new(),
            by_ref: false,
            base,
        }
    }
}

/// An optional or required custom modifier attached to a signature element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomModifier {
    /// `true` for `modreq`, `false` for `modopt`
    pub required: bool,
    /// Coded type token of the modifier (TypeDef/TypeRef/TypeSpec)
    pub modifier: Token,
}

/// Shape of one dimension of a multi-dimensional array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArrayDimension {
    /// Declared size, if present in the signature
    pub size: Option<u32>,
    /// Declared lower bound, if present in the signature
    pub lower_bound: Option<u32>,
}

/// A multi-dimensional array shape: element type, rank and per-dimension bounds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArrayShape {
    /// The element type
    pub base: Box<TypeSignature>,
    /// Number of dimensions
    pub rank: u32,
    /// Declared dimensions (may be fewer than `rank`, in order from 0)
    pub dimensions: Vec<ArrayDimension>,
}

/// A single-dimension, zero-based array.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SzArray {
    /// Custom modifiers on the element type
    pub modifiers: Vec<CustomModifier>,
    /// The element type
    pub base: Box<TypeSignature>,
}

/// An unmanaged pointer type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pointer {
    /// Custom modifiers on the pointee
    pub modifiers: Vec<CustomModifier>,
    /// The type pointed to
    pub base: Box<TypeSignature>,
}

/// A parsed type description from a signature blob.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TypeSignature {
    /// Not defined
    #[default]
    Unknown,
    /// void
    Void,
    /// bool
    Boolean,
    /// char
    Char,
    /// signed 8bit integer
    I1,
    /// unsigned 8bit integer
    U1,
    /// signed 16bit integer
    I2,
    /// unsigned 16bit integer
    U2,
    /// signed 32bit integer
    I4,
    /// unsigned 32bit integer
    U4,
    /// signed 64bit integer
    I8,
    /// unsigned 64bit integer
    U8,
    /// 32bit floating-point
    R4,
    /// 64bit floating-point
    R8,
    /// System.String
    String,
    /// System.Object
    Object,
    /// signed integer, sized to the executing platform
    I,
    /// unsigned integer, sized to the executing platform
    U,
    /// A pointer to a type
    Ptr(Pointer),
    /// Type passed by reference
    ByRef(Box<TypeSignature>),
    /// Value type by coded token
    ValueType(Token),
    /// Class by coded token
    Class(Token),
    /// Generic type parameter placeholder (index into the type's generic parameters)
    GenericParamType(u32),
    /// Generic method parameter placeholder (index into the method's generic parameters)
    GenericParamMethod(u32),
    /// Generic instantiation: base coded type + ordered type arguments
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
    /// Multi-dimensional array with shape
    Array(ArrayShape),
    /// Single-dimension, zero-based array
    SzArray(SzArray),
    /// Function pointer carrying a nested method signature
    FnPtr(Box<MethodSignature>),
    /// Typed reference (System.TypedReference)
    TypedByRef,
    /// A pinned local type
    Pinned(Box<TypeSignature>),
}

impl TypeSignature {
    /// Returns `true` for the primitive element types (void through unative int).
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeSignature::Void
                | TypeSignature::Boolean
                | TypeSignature::Char
                | TypeSignature::I1
                | TypeSignature::U1
                | TypeSignature::I2
                | TypeSignature::U2
                | TypeSignature::I4
                | TypeSignature::U4
                | TypeSignature::I8
                | TypeSignature::U8
                | TypeSignature::R4
                | TypeSignature::R8
                | TypeSignature::I
                | TypeSignature::U
        )
    }

    /// The ELEMENT_TYPE code of a primitive, if this is one.
    #[must_use]
    pub fn primitive_code(&self) -> Option<u8> {
        let code = match self {
            TypeSignature::Void => ELEMENT_TYPE::VOID,
            TypeSignature::Boolean => ELEMENT_TYPE::BOOLEAN,
            TypeSignature::Char => ELEMENT_TYPE::CHAR,
            TypeSignature::I1 => ELEMENT_TYPE::I1,
            TypeSignature::U1 => ELEMENT_TYPE::U1,
            TypeSignature::I2 => ELEMENT_TYPE::I2,
            TypeSignature::U2 => ELEMENT_TYPE::U2,
            TypeSignature::I4 => ELEMENT_TYPE::I4,
            TypeSignature::U4 => ELEMENT_TYPE::U4,
            TypeSignature::I8 => ELEMENT_TYPE::I8,
            TypeSignature::U8 => ELEMENT_TYPE::U8,
            TypeSignature::R4 => ELEMENT_TYPE::R4,
            TypeSignature::R8 => ELEMENT_TYPE::R8,
            TypeSignature::String => ELEMENT_TYPE::STRING,
            TypeSignature::Object => ELEMENT_TYPE::OBJECT,
            TypeSignature::I => ELEMENT_TYPE::I,
            TypeSignature::U => ELEMENT_TYPE::U,
            TypeSignature::TypedByRef => ELEMENT_TYPE::TYPEDBYREF,
            _ => return None,
        };
        Some(code)
    }
}
