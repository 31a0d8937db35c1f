//! OMG IDL schema parsing and CDR serialization.
//!
//! # Pipeline
//!
//! ```text
//! IDL source text
//!   └─ parse_idl                   – definition tree (omgidl-parser)
//!       ├─ MessageReader / MessageWriter – CDR codec (omgidl-serialization)
//!       └─ parse_idl_message_definitions – flat export (omgidl-msgdef)
//! ```
//!
//! ```
//! use omgidl::{MessageReader, MessageWriter, StructValue, Value, parse_idl};
//!
//! let defs = parse_idl("struct Point { float64 x; float64 y; };")?;
//! let writer = MessageWriter::new("Point", &defs)?;
//! let reader = MessageReader::new("Point", &defs)?;
//!
//! let point = Value::Struct(StructValue::from([
//!     ("x", Value::F64(1.0)),
//!     ("y", Value::F64(2.0)),
//! ]));
//! let bytes = writer.write_message(&point)?;
//! assert_eq!(reader.read_message(&bytes)?, point);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use omgidl_common as common;
pub use omgidl_common::{
    CasePredicate, ConstValue, Definition, SchemaError, StructValue, UNION_DISCRIMINATOR_KEY,
    Value,
};
pub use omgidl_msgdef as msgdef;
pub use omgidl_msgdef::{MessageDefinition, MessageDefinitionField, flatten};
pub use omgidl_parser::parse_idl;
pub use omgidl_serialization::{
    EncapsulationKind, MessageReader, MessageWriter, SerializationError,
};

/// Parse IDL text and flatten it into message-definition records in one
/// step.
pub fn parse_idl_message_definitions(
    source: &str,
) -> Result<Vec<MessageDefinition>, SchemaError> {
    flatten(&parse_idl(source)?)
}
