use crate::{
    io::parser::Parser,
    metadata::signatures::{
        ArrayDimension, ArrayShape, CallingConvention, CustomModifier, FieldSignature,
        MethodSignature, Pointer, PropertySignature, Signature, SignatureParameter, SzArray,
        TypeSignature, ELEMENT_TYPE,
    },
    Error::RecursionLimit,
    Result,
};

/// Maximum recursion depth for signature parsing.
///
/// Bounds nesting of generic instantiations, arrays and function pointers; a blob
/// that tries to express an unbounded (cyclic) generic argument chain fails here
/// instead of looping.
const MAX_RECURSION_DEPTH: usize = 50;

/// Signature parser for the ECMA-335 compressed blob formats.
///
/// # Example
///
/// ```
/// use cilweave::metadata::signatures::SignatureParser;
/// let data = &[0x20, 0x01, 0x01, 0x0E];
/// let mut parser = SignatureParser::new(data);
/// let sig = parser.parse_method_signature()?;
/// assert_eq!(sig.params.len(), 1);
/// # Ok::<(), cilweave::Error>(())
/// ```
///
/// ## Notes:
/// - Besides ECMA-335 II.23.2, the CoreCLR `sigparse.cpp` reference sample documents
///   the same grammar.
/// - Do not re-use one parser instance for multiple signature blobs; the cursor is
///   not reset between entry points.
pub struct SignatureParser<'a> {
    parser: Parser<'a>,
    depth: usize,
}

impl<'a> SignatureParser<'a> {
    /// Create a new `SignatureParser` from a byte slice
    ///
    /// ## Arguments
    /// * 'data' - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        SignatureParser {
            parser: Parser::new(data),
            depth: 0,
        }
    }

    /// Parse any signature blob, dispatching on the low nibble of the first byte.
    ///
    /// 0x6 selects a field signature, 0x8 a property signature, anything else is
    /// treated as a method signature whose first byte carries the calling convention.
    ///
    /// # Errors
    /// Returns an error if the blob is empty, truncated or malformed.
    pub fn parse(&mut self) -> Result<Signature> {
        let head_byte = self.parser.peek_byte()?;

        match head_byte & 0x0F {
            0x6 => Ok(Signature::Field(self.parse_field_signature()?)),
            0x8 => Ok(Signature::Property(self.parse_property_signature()?)),
            _ => Ok(Signature::Method(self.parse_method_signature()?)),
        }
    }

    /// Parse a single type from the signature blob
    pub(crate) fn parse_type(&mut self) -> Result<TypeSignature> {
        if self.depth + 1 >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        self.depth += 1;
        let result = self.parse_type_inner();
        self.depth -= 1;
        result
    }

    fn parse_type_inner(&mut self) -> Result<TypeSignature> {
        let current_byte = self.parser.read_le::<u8>()?;
        match current_byte {
            ELEMENT_TYPE::VOID => Ok(TypeSignature::Void),
            ELEMENT_TYPE::BOOLEAN => Ok(TypeSignature::Boolean),
            ELEMENT_TYPE::CHAR => Ok(TypeSignature::Char),
            ELEMENT_TYPE::I1 => Ok(TypeSignature::I1),
            ELEMENT_TYPE::U1 => Ok(TypeSignature::U1),
            ELEMENT_TYPE::I2 => Ok(TypeSignature::I2),
            ELEMENT_TYPE::U2 => Ok(TypeSignature::U2),
            ELEMENT_TYPE::I4 => Ok(TypeSignature::I4),
            ELEMENT_TYPE::U4 => Ok(TypeSignature::U4),
            ELEMENT_TYPE::I8 => Ok(TypeSignature::I8),
            ELEMENT_TYPE::U8 => Ok(TypeSignature::U8),
            ELEMENT_TYPE::R4 => Ok(TypeSignature::R4),
            ELEMENT_TYPE::R8 => Ok(TypeSignature::R8),
            ELEMENT_TYPE::STRING => Ok(TypeSignature::String),
            ELEMENT_TYPE::OBJECT => Ok(TypeSignature::Object),
            ELEMENT_TYPE::I => Ok(TypeSignature::I),
            ELEMENT_TYPE::U => Ok(TypeSignature::U),
            ELEMENT_TYPE::TYPEDBYREF => Ok(TypeSignature::TypedByRef),
            ELEMENT_TYPE::PTR => Ok(TypeSignature::Ptr(Pointer {
                modifiers: self.parse_custom_mods()?,
                base: Box::new(self.parse_type()?),
            })),
            ELEMENT_TYPE::BYREF => Ok(TypeSignature::ByRef(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::VALUETYPE => Ok(TypeSignature::ValueType(
                self.parser.read_compressed_token()?,
            )),
            ELEMENT_TYPE::CLASS => Ok(TypeSignature::Class(self.parser.read_compressed_token()?)),
            ELEMENT_TYPE::VAR => Ok(TypeSignature::GenericParamType(
                self.parser.read_compressed_uint()?,
            )),
            ELEMENT_TYPE::MVAR => Ok(TypeSignature::GenericParamMethod(
                self.parser.read_compressed_uint()?,
            )),
            ELEMENT_TYPE::ARRAY => {
                let elem_type = self.parse_type()?;
                let rank = self.parser.read_compressed_uint()?;

                let num_sizes = self.parser.read_compressed_uint()?;
                let mut dimensions: Vec<ArrayDimension> = Vec::with_capacity(num_sizes as usize);
                for _ in 0..num_sizes {
                    dimensions.push(ArrayDimension {
                        size: Some(self.parser.read_compressed_uint()?),
                        lower_bound: None,
                    });
                }

                let num_lo_bounds = self.parser.read_compressed_uint()?;
                for i in 0..num_lo_bounds {
                    let lower_bound = self.parser.read_compressed_uint()?;
                    if let Some(dimension) = dimensions.get_mut(i as usize) {
                        dimension.lower_bound = Some(lower_bound);
                    } else {
                        dimensions.push(ArrayDimension {
                            size: None,
                            lower_bound: Some(lower_bound),
                        });
                    }
                }

                Ok(TypeSignature::Array(ArrayShape {
                    base: Box::new(elem_type),
                    rank,
                    dimensions,
                }))
            }
            ELEMENT_TYPE::GENERICINST => {
                let peek_byte = self.parser.peek_byte()?;
                if peek_byte != ELEMENT_TYPE::CLASS && peek_byte != ELEMENT_TYPE::VALUETYPE {
                    return Err(malformed_error!(
                        "GENERICINST - next byte is not CLASS or VALUETYPE - {}",
                        peek_byte
                    ));
                }

                let base_type = self.parse_type()?;
                let arg_count = self.parser.read_compressed_uint()?;

                let mut type_args = Vec::with_capacity(arg_count as usize);
                for _ in 0..arg_count {
                    type_args.push(self.parse_type()?);
                }

                Ok(TypeSignature::GenericInst(Box::new(base_type), type_args))
            }
            ELEMENT_TYPE::FNPTR => Ok(TypeSignature::FnPtr(Box::new(
                self.parse_method_signature()?,
            ))),
            ELEMENT_TYPE::SZARRAY => Ok(TypeSignature::SzArray(SzArray {
                modifiers: self.parse_custom_mods()?,
                base: Box::new(self.parse_type()?),
            })),
            ELEMENT_TYPE::PINNED => Ok(TypeSignature::Pinned(Box::new(self.parse_type()?))),
            _ => Err(malformed_error!(
                "Unsupported ELEMENT_TYPE - {}",
                current_byte
            )),
        }
    }

    /// Parse a run of custom modifiers (`CMOD_OPT` / `CMOD_REQD`).
    ///
    /// The run terminates at the first non-modifier tag, which is peeked but not
    /// consumed.
    fn parse_custom_mods(&mut self) -> Result<Vec<CustomModifier>> {
        let mut mods = Vec::new();

        while self.parser.has_more_data() {
            let next_byte = self.parser.peek_byte()?;
            if next_byte != ELEMENT_TYPE::CMOD_OPT && next_byte != ELEMENT_TYPE::CMOD_REQD {
                break;
            }

            self.parser.advance()?;

            mods.push(CustomModifier {
                required: next_byte == ELEMENT_TYPE::CMOD_REQD,
                modifier: self.parser.read_compressed_token()?,
            });
        }

        Ok(mods)
    }

    /// Parse a parameter including custom modifiers (the return type counts as one)
    fn parse_param(&mut self) -> Result<SignatureParameter> {
        let custom_mods = self.parse_custom_mods()?;

        let mut by_ref = false;
        if self.parser.peek_byte()? == ELEMENT_TYPE::BYREF {
            self.parser.advance()?;
            by_ref = true;
        }

        Ok(SignatureParameter {
            modifiers: custom_mods,
            by_ref,
            base: self.parse_type()?,
        })
    }

    /// Parse a method signature from the blob - `MethodDefSig`, `MethodRefSig`,
    /// `StandAloneMethodSig`.
    ///
    /// For vararg signatures the sentinel position is recorded as an index into the
    /// parameter list; a second sentinel is a decode error.
    ///
    /// # Errors
    /// Returns an error if the signature data is malformed or truncated.
    pub fn parse_method_signature(&mut self) -> Result<MethodSignature> {
        let convention_byte = self.parser.read_le::<u8>()?;
        let convention = CallingConvention::from_bits_retain(convention_byte);

        let generic_param_count = if convention.contains(CallingConvention::GENERIC) {
            self.parser.read_compressed_uint()?
        } else {
            0
        };

        let param_count = self.parser.read_compressed_uint()?;
        let return_type = self.parse_param()?;

        let mut params = Vec::with_capacity(param_count as usize);
        let mut sentinel = None;

        while params.len() < param_count as usize {
            if self.parser.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                if sentinel.is_some() {
                    return Err(crate::Error::DuplicateSentinel);
                }

                self.parser.advance()?;
                sentinel = Some(params.len());
                continue;
            }

            params.push(self.parse_param()?);
        }

        Ok(MethodSignature {
            convention,
            generic_param_count,
            return_type,
            params,
            sentinel,
        })
    }

    /// Parse a field signature from the blob (II.23.2.4)
    ///
    /// # Errors
    /// Returns an error if the signature header is invalid or if the field type
    /// cannot be parsed.
    pub fn parse_field_signature(&mut self) -> Result<FieldSignature> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte & 0x0F != 0x06 {
            return Err(malformed_error!(
                "FieldSignature - invalid start - {}",
                head_byte
            ));
        }

        let custom_mods = self.parse_custom_mods()?;
        let type_sig = self.parse_type()?;

        Ok(FieldSignature {
            modifiers: custom_mods,
            base: type_sig,
        })
    }

    /// Parse a property signature from the blob (II.23.2.5)
    ///
    /// # Errors
    /// Returns an error if the property header is invalid or a parameter cannot be
    /// parsed.
    pub fn parse_property_signature(&mut self) -> Result<PropertySignature> {
        let head_byte = self.parser.read_le::<u8>()?;
        if (head_byte & 0x08) == 0 {
            return Err(malformed_error!(
                "PropertySignature - invalid start - {}",
                head_byte
            ));
        }

        let has_this = (head_byte & CallingConvention::HAS_THIS.bits()) != 0;

        let param_count = self.parser.read_compressed_uint()?;
        let custom_mods = self.parse_custom_mods()?;
        let type_sig = self.parse_type()?;

        let mut params = Vec::with_capacity(param_count as usize);
        for _ in 0..param_count {
            params.push(self.parse_param()?);
        }

        Ok(PropertySignature {
            has_this,
            modifiers: custom_mods,
            base: type_sig,
            params,
        })
    }
}
