//! Schema definition tree produced by the IDL parser.
//!
//! Types are stored as canonical name strings: either a primitive from the
//! closed set (see [`PrimitiveType::from_name`]) or a `::`-scoped name that
//! the resolver rewrites to fully qualified form.  The codec layer maps the
//! primitive names onto [`PrimitiveType`] for dispatch.

use indexmap::IndexMap;

/// Scalar primitive kinds recognized by the CDR codec.
///
/// `byte`, `octet` and `char` behave as `U8`, `wchar` as `U16`, and
/// `boolean` as `Bool`; the distinction only exists in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// Unbounded UTF-8 string (bounds are carried on the field).
    String,
    /// Unbounded UTF-16 wide string.
    WString,
}

impl PrimitiveType {
    /// Map a canonical type name to its primitive kind.
    ///
    /// Returns `None` for anything that is not in the closed primitive set,
    /// i.e. a scoped type reference.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" | "boolean" => Self::Bool,
            "int8" => Self::I8,
            "uint8" | "byte" | "octet" | "char" => Self::U8,
            "int16" => Self::I16,
            "uint16" | "wchar" => Self::U16,
            "int32" => Self::I32,
            "uint32" => Self::U32,
            "int64" => Self::I64,
            "uint64" => Self::U64,
            "float32" => Self::F32,
            "float64" => Self::F64,
            "string" => Self::String,
            "wstring" => Self::WString,
            _ => return None,
        })
    }

    /// CDR size and alignment in bytes. Strings align on their 4-byte
    /// length prefix instead.
    pub fn size(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
            Self::String | Self::WString => 4,
        }
    }

    pub fn is_string(self) -> bool {
        matches!(self, Self::String | Self::WString)
    }
}

/// Rewrite a multi-word or aliased IDL spelling to its canonical name.
///
/// Names that are not aliases (including scoped references) pass through
/// unchanged.
pub fn normalize_primitive(name: &str) -> &str {
    match name {
        "long double" | "double" => "float64",
        "float" => "float32",
        "short" => "int16",
        "unsigned short" => "uint16",
        "long" => "int32",
        "unsigned long" => "uint32",
        "long long" => "int64",
        "unsigned long long" => "uint64",
        other => other,
    }
}

/// Whether `name` belongs to the closed set of builtin type names.
pub fn is_builtin(name: &str) -> bool {
    PrimitiveType::from_name(name).is_some()
}

/// A literal constant value as written in IDL source.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ConstValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// Value attached to an annotation: `@optional` is a bare flag,
/// `@default(5)` carries a constant.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Flag,
    Const(ConstValue),
}

/// Annotations in declaration order. Unknown annotations are preserved here
/// but ignored by the codec.
pub type Annotations = IndexMap<String, AnnotationValue>;

/// A struct field or union case member.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Field {
    pub name: String,
    /// Canonical primitive name or (fully qualified, after resolution)
    /// scoped type name.
    pub ty: String,
    /// Fixed array dimensions, outermost first. Empty for non-arrays.
    pub array_lengths: Vec<usize>,
    pub is_sequence: bool,
    pub sequence_bound: Option<usize>,
    pub string_upper_bound: Option<usize>,
    pub annotations: Annotations,
}

impl Field {
    /// Shorthand for a plain scalar field with no modifiers.
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            ..Self::default()
        }
    }
}

/// `const T NAME = VALUE;` — also the representation of enum enumerators,
/// which are `uint32` constants.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub name: String,
    pub ty: String,
    pub value: ConstValue,
    pub annotations: Annotations,
}

/// `enum NAME { A, B @value(5), C };`
#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub name: String,
    /// Enumerators in declaration order, values already assigned.
    pub enumerators: Vec<Constant>,
}

/// `typedef T NAME;` with optional array/sequence/bounded-string modifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct Typedef {
    pub name: String,
    pub ty: String,
    pub array_lengths: Vec<usize>,
    pub is_sequence: bool,
    pub sequence_bound: Option<usize>,
    pub string_upper_bound: Option<usize>,
}

/// `struct NAME { fields };`
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    pub name: String,
    pub fields: Vec<Field>,
    pub annotations: Annotations,
}

/// A union case label value. Boolean predicates occur with
/// `switch (boolean)` unions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CasePredicate {
    Int(i64),
    Bool(bool),
}

/// One union arm: the set of stacked `case X:` labels and the member they
/// select.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionCase {
    pub predicates: Vec<CasePredicate>,
    pub field: Field,
}

/// `union NAME switch (T) { cases };`
#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    pub name: String,
    pub switch_type: String,
    pub cases: Vec<UnionCase>,
    pub default: Option<Field>,
    pub annotations: Annotations,
}

/// `module NAME { definitions };` — a namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub definitions: Vec<Definition>,
}

/// Any top-level or module-scoped IDL definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Module(Module),
    Struct(Struct),
    Enum(Enum),
    Typedef(Typedef),
    Union(Union),
    Constant(Constant),
}

impl Definition {
    /// The unqualified declared name of this definition.
    pub fn name(&self) -> &str {
        match self {
            Self::Module(m) => &m.name,
            Self::Struct(s) => &s.name,
            Self::Enum(e) => &e.name,
            Self::Typedef(t) => &t.name,
            Self::Union(u) => &u.name,
            Self::Constant(c) => &c.name,
        }
    }
}
