//! CDR serialization for OMG IDL schemas.
//!
//! # Pipeline
//!
//! ```text
//! parsed definitions (omgidl-parser / omgidl-common)
//!   └─ IdlMap::build              – scoped-name map, typedef collapsing
//!       └─ DeserializationInfoCache – per-type field descriptors + framing
//!           ├─ MessageReader       – CDR bytes → Value
//!           └─ MessageWriter       – Value → CDR bytes (two-pass)
//! ```
//!
//! Supported encapsulations: classic CDR, PL_CDR, CDR2, PL_CDR2, and
//! delimited CDR2 in both endiannesses (see [`EncapsulationKind`]).

mod deser_info;
mod encapsulation;
mod error;
mod reader;
mod writer;

pub use deser_info::{
    CaseInfo, ComplexInfo, DeserializationInfoCache, FieldInfo, FieldType, Framing, StructInfo,
    UnionInfo,
};
pub use encapsulation::EncapsulationKind;
pub use error::SerializationError;
pub use reader::MessageReader;
pub use writer::MessageWriter;
