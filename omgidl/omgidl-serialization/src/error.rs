//! Error type for CDR encoding and decoding.

use omgidl_common::SchemaError;

/// Errors produced by [`MessageReader`](crate::MessageReader) and
/// [`MessageWriter`](crate::MessageWriter).
#[derive(Debug, Clone, thiserror::Error)]
pub enum SerializationError {
    /// Schema normalization failed while building codec metadata
    /// (unknown type, typedef cycle, unsupported composition).
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The codec was constructed against a root type that is not in the
    /// schema definitions.
    #[error("root definition name \"{0}\" not found in schema definitions")]
    RootNotFound(String),

    /// A bounded string or sequence exceeds its declared bound, on either
    /// the read or the write side.
    #[error("field '{field}' {kind} length {got} exceeds bound {max}")]
    BoundViolation {
        field: String,
        kind: &'static str,
        got: usize,
        max: usize,
    },

    /// A union discriminator matches no case and the union has no default
    /// case (write side only; the reader returns a partial value instead).
    #[error("union '{union}' has no case for discriminator {discriminator}")]
    UnionNoCase {
        union: String,
        discriminator: String,
    },

    /// The buffer ended before the schema was fully decoded, or a header
    /// advertised more bytes than remain.
    #[error("buffer too short while reading {0}")]
    BufferUnderflow(String),

    /// Byte 1 of the encapsulation header is not a recognized kind.
    #[error("unsupported encapsulation kind 0x{0:02x}")]
    BadEncapsulation(u8),

    /// Malformed string payload (missing terminator, invalid UTF-8 or
    /// UTF-16, odd wstring length), or a member too large for its header.
    #[error("encoding error in field '{field}': {detail}")]
    EncodingError { field: String, detail: String },

    /// The caller supplied a value whose shape does not match the field's
    /// schema type.
    #[error("field '{field}' expects {expected}")]
    UnexpectedValue {
        field: String,
        expected: &'static str,
    },
}
