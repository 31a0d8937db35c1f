//! Pre-computed serialization metadata per complex type.
//!
//! [`DeserializationInfoCache::from_map`] walks the schema map once,
//! collapsing typedefs and resolving enum/struct/union references, so the
//! reader and writer never touch raw definitions. Nested complex types are
//! referenced by scoped name rather than nested ownership, which keeps the
//! cache immutable and freely shareable after construction.

use std::collections::HashMap;

use omgidl_common::{
    AnnotationValue, Annotations, CasePredicate, ConstValue, Definition, Field, IdlMap,
    PrimitiveType, StructValue, UNION_DISCRIMINATOR_KEY, Union, Value, apply_field_modifiers,
};

use crate::error::SerializationError;

/// Framing derived from a type's extensibility annotations.
///
/// `@mutable` → delimiter + member headers; `@appendable` → delimiter
/// only; otherwise final. Delimiters additionally require a CDR2
/// encapsulation kind at codec time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Framing {
    pub uses_delimiter_header: bool,
    pub uses_member_header: bool,
}

/// The wire type of a field after typedef collapsing.
#[derive(Debug, Clone)]
pub enum FieldType {
    Primitive(PrimitiveType),
    /// Scoped enum name; serialized as `uint32`.
    Enum(String),
    /// Scoped struct or union name, resolved through the cache.
    Complex(String),
}

/// One struct field or union member with all schema indirection removed.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub ty: FieldType,
    /// Fixed array dimensions, outermost first.
    pub array_lengths: Vec<usize>,
    pub is_sequence: bool,
    pub sequence_bound: Option<usize>,
    pub string_upper_bound: Option<usize>,
    pub is_optional: bool,
    /// Value of a `@default(...)` annotation, already typed.
    pub default: Option<Value>,
    /// `@id(n)` or the 1-based declaration position.
    pub id: u16,
}

#[derive(Debug, Clone)]
pub struct StructInfo {
    pub name: String,
    pub fields: Vec<FieldInfo>,
    pub framing: Framing,
}

#[derive(Debug, Clone)]
pub struct CaseInfo {
    pub predicates: Vec<CasePredicate>,
    pub field: FieldInfo,
}

#[derive(Debug, Clone)]
pub struct UnionInfo {
    pub name: String,
    /// Synthetic field describing the discriminator (id 0).
    pub discriminator: FieldInfo,
    pub cases: Vec<CaseInfo>,
    pub default_case: Option<FieldInfo>,
    pub framing: Framing,
}

impl UnionInfo {
    /// The case selected by `discriminator`, or the default case.
    pub fn select_case(&self, discriminator: &Value) -> Option<&FieldInfo> {
        for case in &self.cases {
            if case.predicates.iter().any(|p| predicate_matches(p, discriminator)) {
                return Some(&case.field);
            }
        }
        self.default_case.as_ref()
    }
}

fn predicate_matches(predicate: &CasePredicate, value: &Value) -> bool {
    match predicate {
        CasePredicate::Int(p) => value.to_i64() == Some(*p),
        CasePredicate::Bool(p) => value.as_bool() == Some(*p),
    }
}

#[derive(Debug, Clone)]
pub enum ComplexInfo {
    Struct(StructInfo),
    Union(UnionInfo),
}

impl ComplexInfo {
    pub fn name(&self) -> &str {
        match self {
            Self::Struct(s) => &s.name,
            Self::Union(u) => &u.name,
        }
    }

    pub fn framing(&self) -> Framing {
        match self {
            Self::Struct(s) => s.framing,
            Self::Union(u) => u.framing,
        }
    }
}

/// Serialization metadata for every struct and union in a schema.
#[derive(Debug, Clone)]
pub struct DeserializationInfoCache {
    complexes: HashMap<String, ComplexInfo>,
}

impl DeserializationInfoCache {
    /// Build metadata for all complex types in `map`.
    pub fn from_map(map: &IdlMap) -> Result<Self, SerializationError> {
        let mut complexes = HashMap::new();
        for (key, def) in map.iter() {
            match def {
                Definition::Struct(s) => {
                    let fields = s
                        .fields
                        .iter()
                        .enumerate()
                        .map(|(i, f)| build_field_info(f, (i + 1) as u16, map))
                        .collect::<Result<Vec<_>, _>>()?;
                    complexes.insert(
                        key.to_string(),
                        ComplexInfo::Struct(StructInfo {
                            name: key.to_string(),
                            fields,
                            framing: framing_for(&s.annotations),
                        }),
                    );
                }
                Definition::Union(u) => {
                    complexes.insert(key.to_string(), build_union_info(key, u, map)?);
                }
                _ => {}
            }
        }
        Ok(Self { complexes })
    }

    /// Look up a complex type by scoped name.
    pub fn complex(&self, name: &str) -> Result<&ComplexInfo, SerializationError> {
        self.complexes
            .get(name)
            .ok_or_else(|| omgidl_common::SchemaError::UnknownType(name.to_string()).into())
    }

    /// Default value for a field: its `@default`, or a zero value of the
    /// right shape (nested arrays for fixed dimensions, empty sequences,
    /// recursive struct/union defaults).
    pub fn field_default(&self, field: &FieldInfo) -> Result<Value, SerializationError> {
        if let Some(default) = &field.default {
            return Ok(default.clone());
        }
        if !field.array_lengths.is_empty() {
            return self.nested_array_default(field, &field.array_lengths);
        }
        if field.is_sequence {
            return Ok(Value::Array(Vec::new()));
        }
        self.base_default(field)
    }

    /// Default value for a whole struct or union.
    pub fn complex_default(&self, info: &ComplexInfo) -> Result<Value, SerializationError> {
        Ok(Value::Struct(match info {
            ComplexInfo::Struct(s) => self.struct_default(s)?,
            ComplexInfo::Union(u) => self.union_default(u)?,
        }))
    }

    /// Struct defaults include every non-optional field; optional fields
    /// only when they carry `@default`.
    pub fn struct_default(&self, info: &StructInfo) -> Result<StructValue, SerializationError> {
        let mut msg = StructValue::new();
        for field in &info.fields {
            if !field.is_optional || field.default.is_some() {
                msg.insert(field.name.clone(), self.field_default(field)?);
            }
        }
        Ok(msg)
    }

    /// Union defaults use the default case with a `Null` discriminator when
    /// one exists, otherwise the case selected by the discriminator's zero
    /// value.
    pub fn union_default(&self, info: &UnionInfo) -> Result<StructValue, SerializationError> {
        let mut msg = StructValue::new();
        if let Some(default_case) = &info.default_case {
            msg.insert(UNION_DISCRIMINATOR_KEY, Value::Null);
            msg.insert(default_case.name.clone(), self.field_default(default_case)?);
            return Ok(msg);
        }
        let discriminator = self.field_default(&info.discriminator)?;
        let Some(case) = info.select_case(&discriminator) else {
            return Err(SerializationError::UnionNoCase {
                union: info.name.clone(),
                discriminator: format!("{discriminator:?}"),
            });
        };
        msg.insert(UNION_DISCRIMINATOR_KEY, discriminator);
        msg.insert(case.name.clone(), self.field_default(case)?);
        Ok(msg)
    }

    fn nested_array_default(
        &self,
        field: &FieldInfo,
        lengths: &[usize],
    ) -> Result<Value, SerializationError> {
        let mut arr = Vec::with_capacity(lengths[0]);
        for _ in 0..lengths[0] {
            arr.push(if lengths.len() > 1 {
                self.nested_array_default(field, &lengths[1..])?
            } else if field.is_sequence {
                Value::Array(Vec::new())
            } else {
                self.base_default(field)?
            });
        }
        Ok(Value::Array(arr))
    }

    fn base_default(&self, field: &FieldInfo) -> Result<Value, SerializationError> {
        match &field.ty {
            FieldType::Primitive(p) => Ok(primitive_default(*p)),
            FieldType::Enum(_) => Ok(Value::U32(0)),
            FieldType::Complex(name) => self.complex_default(self.complex(name)?),
        }
    }
}

fn primitive_default(p: PrimitiveType) -> Value {
    match p {
        PrimitiveType::Bool => Value::Bool(false),
        PrimitiveType::I8 => Value::I8(0),
        PrimitiveType::I16 => Value::I16(0),
        PrimitiveType::I32 => Value::I32(0),
        PrimitiveType::I64 => Value::I64(0),
        PrimitiveType::U8 => Value::U8(0),
        PrimitiveType::U16 => Value::U16(0),
        PrimitiveType::U32 => Value::U32(0),
        PrimitiveType::U64 => Value::U64(0),
        PrimitiveType::F32 => Value::F32(0.0),
        PrimitiveType::F64 => Value::F64(0.0),
        PrimitiveType::String | PrimitiveType::WString => Value::string(""),
    }
}

fn framing_for(annotations: &Annotations) -> Framing {
    if annotations.contains_key("mutable") {
        Framing {
            uses_delimiter_header: true,
            uses_member_header: true,
        }
    } else if annotations.contains_key("appendable") {
        Framing {
            uses_delimiter_header: true,
            uses_member_header: false,
        }
    } else {
        Framing::default()
    }
}

/// Collapse a field's type through typedefs, merge modifiers, and resolve
/// the final name to a wire type.
fn build_field_info(
    field: &Field,
    position_id: u16,
    map: &IdlMap,
) -> Result<FieldInfo, SerializationError> {
    let collapsed = map.collapse(&field.ty)?;
    let merged = apply_field_modifiers(
        &field.array_lengths,
        field.is_sequence,
        field.sequence_bound,
        field.string_upper_bound,
        &collapsed,
    )?;

    let ty = field_type_for(&merged.ty, map)?;
    let id = match field.annotations.get("id") {
        Some(AnnotationValue::Const(ConstValue::Int(v))) => *v as u16,
        _ => position_id,
    };
    let default = match field.annotations.get("default") {
        Some(AnnotationValue::Const(c)) if merged.array_lengths.is_empty() && !merged.is_sequence => {
            default_from_const(&ty, c)
        }
        _ => None,
    };

    Ok(FieldInfo {
        name: field.name.clone(),
        ty,
        array_lengths: merged.array_lengths,
        is_sequence: merged.is_sequence,
        sequence_bound: merged.sequence_bound,
        string_upper_bound: merged.string_upper_bound,
        is_optional: field.annotations.contains_key("optional"),
        default,
        id,
    })
}

fn field_type_for(name: &str, map: &IdlMap) -> Result<FieldType, SerializationError> {
    if let Some(p) = PrimitiveType::from_name(name) {
        return Ok(FieldType::Primitive(p));
    }
    match map.get(name) {
        Some(Definition::Enum(_)) => Ok(FieldType::Enum(name.to_string())),
        Some(Definition::Struct(_) | Definition::Union(_)) => {
            Ok(FieldType::Complex(name.to_string()))
        }
        _ => Err(omgidl_common::SchemaError::UnknownType(name.to_string()).into()),
    }
}

/// Convert a `@default(...)` constant to the field's value type.
/// Mismatched constants are ignored rather than rejected.
fn default_from_const(ty: &FieldType, c: &ConstValue) -> Option<Value> {
    let p = match ty {
        FieldType::Primitive(p) => *p,
        FieldType::Enum(_) => PrimitiveType::U32,
        FieldType::Complex(_) => return None,
    };
    Some(match (p, c) {
        (PrimitiveType::Bool, ConstValue::Bool(v)) => Value::Bool(*v),
        (PrimitiveType::I8, ConstValue::Int(v)) => Value::I8(i8::try_from(*v).ok()?),
        (PrimitiveType::I16, ConstValue::Int(v)) => Value::I16(i16::try_from(*v).ok()?),
        (PrimitiveType::I32, ConstValue::Int(v)) => Value::I32(i32::try_from(*v).ok()?),
        (PrimitiveType::I64, ConstValue::Int(v)) => Value::I64(*v),
        (PrimitiveType::U8, ConstValue::Int(v)) => Value::U8(u8::try_from(*v).ok()?),
        (PrimitiveType::U16, ConstValue::Int(v)) => Value::U16(u16::try_from(*v).ok()?),
        (PrimitiveType::U32, ConstValue::Int(v)) => Value::U32(u32::try_from(*v).ok()?),
        (PrimitiveType::U64, ConstValue::Int(v)) => Value::U64(u64::try_from(*v).ok()?),
        (PrimitiveType::F32, ConstValue::Float(v)) => Value::F32(*v as f32),
        (PrimitiveType::F32, ConstValue::Int(v)) => Value::F32(*v as f32),
        (PrimitiveType::F64, ConstValue::Float(v)) => Value::F64(*v),
        (PrimitiveType::F64, ConstValue::Int(v)) => Value::F64(*v as f64),
        (PrimitiveType::String | PrimitiveType::WString, ConstValue::String(v)) => {
            Value::string(v)
        }
        _ => return None,
    })
}

fn build_union_info(
    key: &str,
    union: &Union,
    map: &IdlMap,
) -> Result<ComplexInfo, SerializationError> {
    let collapsed = map.collapse(&union.switch_type)?;
    let switch_ty = field_type_for(&collapsed.ty, map)?;
    let valid = match &switch_ty {
        FieldType::Primitive(p) => !p.is_string(),
        FieldType::Enum(_) => true,
        FieldType::Complex(_) => false,
    };
    if !valid {
        return Err(SerializationError::UnexpectedValue {
            field: format!("{key}::{UNION_DISCRIMINATOR_KEY}"),
            expected: "an integer, boolean, or enum switch type",
        });
    }

    let discriminator = FieldInfo {
        name: UNION_DISCRIMINATOR_KEY.to_string(),
        ty: switch_ty,
        array_lengths: Vec::new(),
        is_sequence: false,
        sequence_bound: None,
        string_upper_bound: None,
        is_optional: false,
        default: None,
        id: 0,
    };

    let cases = union
        .cases
        .iter()
        .enumerate()
        .map(|(i, case)| {
            Ok(CaseInfo {
                predicates: case.predicates.clone(),
                field: build_field_info(&case.field, (i + 1) as u16, map)?,
            })
        })
        .collect::<Result<Vec<_>, SerializationError>>()?;

    let default_case = union
        .default
        .as_ref()
        .map(|f| build_field_info(f, (union.cases.len() + 1) as u16, map))
        .transpose()?;

    Ok(ComplexInfo::Union(UnionInfo {
        name: key.to_string(),
        discriminator,
        cases,
        default_case,
        framing: framing_for(&union.annotations),
    }))
}
