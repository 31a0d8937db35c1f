//! OMG IDL schema parser for `omgidl`.
//!
//! # Pipeline
//!
//! ```text
//! IDL source text
//!   └─ parse_idl            – nom-based parser → definition tree
//!       └─ resolve_definitions  – lexical-scope name resolution (omgidl-common)
//! ```
//!
//! The returned [`Definition`](omgidl_common::Definition) tree feeds both
//! the CDR codec (`omgidl-serialization`) and the flat message-definition
//! view (`omgidl-msgdef`).

mod lex;
mod parser;

pub use parser::parse_idl;
