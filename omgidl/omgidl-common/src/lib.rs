//! Shared schema model, name resolution, and value types used by the
//! `omgidl` parser and CDR serialization crates.
//!
//! Key components:
//! - [`ast`] — definition tree produced by the IDL parser
//! - [`resolve`] — lexical-scope type-name resolution
//! - [`idl_map`] — scoped-name map and typedef collapsing
//! - [`value`] — message values exchanged with the CDR codec

pub mod ast;
mod error;
mod idl_map;
mod resolve;
mod value;

pub use ast::{
    AnnotationValue, Annotations, CasePredicate, ConstValue, Constant, Definition, Enum, Field,
    Module, PrimitiveType, Struct, Typedef, Union, UnionCase, is_builtin, normalize_primitive,
};
pub use error::SchemaError;
pub use idl_map::{CollapsedType, IdlMap, apply_field_modifiers};
pub use resolve::resolve_definitions;
pub use value::{StructValue, UNION_DISCRIMINATOR_KEY, Value};
