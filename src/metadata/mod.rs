//! Metadata primitives consumed by the bytecode engine.
//!
//! The engine does not load assemblies; it works against tokens and the narrow
//! [`resolver::MetadataResolver`] interface. This module holds those primitives plus
//! the ECMA-335 signature model.

pub mod resolver;
pub mod signatures;
pub mod token;
