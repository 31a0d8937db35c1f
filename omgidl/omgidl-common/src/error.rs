//! Schema-level error type shared by the parser, resolver, and map.

/// Errors produced while parsing IDL text or normalizing the schema.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    /// IDL source text could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A field, switch, or typedef references a name that is neither a
    /// primitive nor present in the schema map.
    #[error("unrecognized type '{0}'")]
    UnknownType(String),

    /// A typedef chain loops back on itself.
    #[error("typedef cycle detected through '{0}'")]
    TypedefCycle(String),

    /// A variable-length collection is layered onto another variable-length
    /// collection through a typedef or a field modifier.
    #[error("cannot compose variable-length arrays through typedef '{0}'")]
    UnsupportedComposition(String),
}
