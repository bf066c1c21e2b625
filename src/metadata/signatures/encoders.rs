//! Signature encoders for the ECMA-335 compressed blob formats.
//!
//! Each encoder reverses the corresponding decoder in
//! [`crate::metadata::signatures::SignatureParser`], producing a blob that decodes
//! back to the same model: calling convention, parameter count, parameter and return
//! types, custom modifier order and sentinel position are all preserved. They are
//! used when re-encoding method bodies against a destination metadata scope (`calli`
//! inline signatures travel through decode → encode).
//!
//! Unmanaged calling conventions (cdecl/stdcall/thiscall/fastcall) can be decoded
//! but are rejected on the encode side with [`crate::Error::Unsupported`].

use crate::{
    io::{write_compressed_token, write_compressed_uint},
    metadata::signatures::{
        CallingConvention, CustomModifier, FieldSignature, MethodSignature, PropertySignature,
        Signature, SignatureParameter, TypeSignature, ELEMENT_TYPE,
    },
    Result,
};

/// Encodes a custom modifier (`modreq`/`modopt` + coded type token).
fn encode_custom_modifier(modifier: &CustomModifier, buffer: &mut Vec<u8>) -> Result<()> {
    buffer.push(if modifier.required {
        ELEMENT_TYPE::CMOD_REQD
    } else {
        ELEMENT_TYPE::CMOD_OPT
    });

    write_compressed_token(modifier.modifier, buffer)
}

fn encode_custom_modifiers(modifiers: &[CustomModifier], buffer: &mut Vec<u8>) -> Result<()> {
    for modifier in modifiers {
        encode_custom_modifier(modifier, buffer)?;
    }
    Ok(())
}

/// Encodes a single type signature element.
///
/// # Errors
/// Returns an error for [`TypeSignature::Unknown`], values that exceed the compressed
/// integer ranges, tokens from tables a coded token cannot express, or nested method
/// signatures with unmanaged conventions.
pub fn encode_type(ty: &TypeSignature, buffer: &mut Vec<u8>) -> Result<()> {
    if let Some(code) = ty.primitive_code() {
        buffer.push(code);
        return Ok(());
    }

    match ty {
        TypeSignature::Ptr(pointer) => {
            buffer.push(ELEMENT_TYPE::PTR);
            encode_custom_modifiers(&pointer.modifiers, buffer)?;
            encode_type(&pointer.base, buffer)
        }
        TypeSignature::ByRef(inner) => {
            buffer.push(ELEMENT_TYPE::BYREF);
            encode_type(inner, buffer)
        }
        TypeSignature::ValueType(token) => {
            buffer.push(ELEMENT_TYPE::VALUETYPE);
            write_compressed_token(*token, buffer)
        }
        TypeSignature::Class(token) => {
            buffer.push(ELEMENT_TYPE::CLASS);
            write_compressed_token(*token, buffer)
        }
        TypeSignature::GenericParamType(index) => {
            buffer.push(ELEMENT_TYPE::VAR);
            write_compressed_uint(*index, buffer)
        }
        TypeSignature::GenericParamMethod(index) => {
            buffer.push(ELEMENT_TYPE::MVAR);
            write_compressed_uint(*index, buffer)
        }
        TypeSignature::GenericInst(base, args) => {
            buffer.push(ELEMENT_TYPE::GENERICINST);
            encode_type(base, buffer)?;
            write_compressed_uint(args.len() as u32, buffer)?;
            for arg in args {
                encode_type(arg, buffer)?;
            }
            Ok(())
        }
        TypeSignature::Array(shape) => {
            buffer.push(ELEMENT_TYPE::ARRAY);
            encode_type(&shape.base, buffer)?;
            write_compressed_uint(shape.rank, buffer)?;

            let sizes: Vec<u32> = shape.dimensions.iter().filter_map(|d| d.size).collect();
            write_compressed_uint(sizes.len() as u32, buffer)?;
            for size in sizes {
                write_compressed_uint(size, buffer)?;
            }

            let bounds: Vec<u32> = shape
                .dimensions
                .iter()
                .filter_map(|d| d.lower_bound)
                .collect();
            write_compressed_uint(bounds.len() as u32, buffer)?;
            for bound in bounds {
                write_compressed_uint(bound, buffer)?;
            }
            Ok(())
        }
        TypeSignature::SzArray(array) => {
            buffer.push(ELEMENT_TYPE::SZARRAY);
            encode_custom_modifiers(&array.modifiers, buffer)?;
            encode_type(&array.base, buffer)
        }
        TypeSignature::FnPtr(method) => {
            buffer.push(ELEMENT_TYPE::FNPTR);
            encode_method_signature_into(method, buffer)
        }
        TypeSignature::Pinned(inner) => {
            buffer.push(ELEMENT_TYPE::PINNED);
            encode_type(inner, buffer)
        }
        TypeSignature::Unknown => Err(malformed_error!("Cannot encode an unknown type signature")),
        // Primitives were handled through primitive_code above
        _ => Err(malformed_error!("Cannot encode type signature {:?}", ty)),
    }
}

fn encode_param(param: &SignatureParameter, buffer: &mut Vec<u8>) -> Result<()> {
    encode_custom_modifiers(&param.modifiers, buffer)?;
    if param.by_ref {
        buffer.push(ELEMENT_TYPE::BYREF);
    }
    encode_type(&param.base, buffer)
}

fn encode_method_signature_into(method: &MethodSignature, buffer: &mut Vec<u8>) -> Result<()> {
    if method.convention.is_unmanaged() {
        return Err(crate::Error::Unsupported(format!(
            "Unmanaged calling convention 0x{:02x} cannot be emitted",
            method.convention.kind()
        )));
    }

    buffer.push(method.convention.bits());

    if method.convention.contains(CallingConvention::GENERIC) {
        write_compressed_uint(method.generic_param_count, buffer)?;
    }

    write_compressed_uint(method.params.len() as u32, buffer)?;
    encode_param(&method.return_type, buffer)?;

    for (index, param) in method.params.iter().enumerate() {
        if method.sentinel == Some(index) {
            buffer.push(ELEMENT_TYPE::SENTINEL);
        }
        encode_param(param, buffer)?;
    }

    // A sentinel may legally trail the last fixed parameter
    if method.sentinel == Some(method.params.len()) {
        buffer.push(ELEMENT_TYPE::SENTINEL);
    }

    Ok(())
}

/// Encodes a method signature blob (II.23.2.1-3).
///
/// # Errors
/// Returns [`crate::Error::Unsupported`] for unmanaged calling conventions, or an
/// encoding error from a nested element.
pub fn encode_method_signature(method: &MethodSignature) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    encode_method_signature_into(method, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a field signature blob (II.23.2.4).
///
/// # Errors
/// Returns an encoding error from the field type or its modifiers.
pub fn encode_field_signature(field: &FieldSignature) -> Result<Vec<u8>> {
    let mut buffer = vec![0x06];
    encode_custom_modifiers(&field.modifiers, &mut buffer)?;
    encode_type(&field.base, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a property signature blob (II.23.2.5).
///
/// # Errors
/// Returns an encoding error from the property type or a parameter.
pub fn encode_property_signature(property: &PropertySignature) -> Result<Vec<u8>> {
    let mut buffer = vec![if property.has_this { 0x28 } else { 0x08 }];
    write_compressed_uint(property.params.len() as u32, &mut buffer)?;
    encode_custom_modifiers(&property.modifiers, &mut buffer)?;
    encode_type(&property.base, &mut buffer)?;

    for param in &property.params {
        encode_param(param, &mut buffer)?;
    }

    Ok(buffer)
}

/// Encodes any signature, dispatching on its variant.
///
/// # Errors
/// Propagates the per-variant encoder errors.
pub fn encode_signature(signature: &Signature) -> Result<Vec<u8>> {
    match signature {
        Signature::Method(method) => encode_method_signature(method),
        Signature::Field(field) => encode_field_signature(field),
        Signature::Property(property) => encode_property_signature(property),
    }
}
