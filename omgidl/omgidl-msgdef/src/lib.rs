//! Flattened message-definition view over a parsed IDL schema.
//!
//! Derives one record per struct, enum, const-carrying module, and union,
//! with typedefs collapsed into the field descriptions and enums demoted
//! to `uint32` (keeping an `enum_type` back-pointer). This is a read-only
//! export for downstream consumers; the CDR codec does not depend on it.

use omgidl_common::{
    AnnotationValue, Annotations, CasePredicate, ConstValue, Constant, Definition, Field, IdlMap,
    SchemaError, Union, apply_field_modifiers,
};

/// A field (or constant pseudo-field) in a flattened record.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDefinitionField {
    pub name: String,
    /// Collapsed type: a primitive name or a scoped struct/union name.
    pub ty: String,
    /// True when `ty` names a struct or union.
    pub is_complex: bool,
    /// Scoped enum name when the declared type was an enum (then `ty` is
    /// `uint32`).
    pub enum_type: Option<String>,
    pub is_array: bool,
    pub array_lengths: Option<Vec<usize>>,
    /// Sequence bound, when the field is a bounded sequence.
    pub array_upper_bound: Option<usize>,
    /// String bound, when the field is a bounded string.
    pub upper_bound: Option<usize>,
    pub default_value: Option<ConstValue>,
    pub is_constant: bool,
    pub value: Option<ConstValue>,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructRecord {
    pub name: String,
    pub fields: Vec<MessageDefinitionField>,
}

/// Also used for enums and top-level constant aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRecord {
    pub name: String,
    pub fields: Vec<MessageDefinitionField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseRecord {
    pub predicates: Vec<CasePredicate>,
    pub field: MessageDefinitionField,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionRecord {
    pub name: String,
    /// Collapsed switch type; `uint32` when the switch was an enum.
    pub switch_type: String,
    pub cases: Vec<CaseRecord>,
    pub default_case: Option<MessageDefinitionField>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageDefinition {
    Struct(StructRecord),
    Module(ModuleRecord),
    Union(UnionRecord),
}

impl MessageDefinition {
    pub fn name(&self) -> &str {
        match self {
            Self::Struct(r) => &r.name,
            Self::Module(r) => &r.name,
            Self::Union(r) => &r.name,
        }
    }
}

/// Flatten a resolved definition tree into message-definition records.
pub fn flatten(definitions: &[Definition]) -> Result<Vec<MessageDefinition>, SchemaError> {
    flatten_map(&IdlMap::build(definitions))
}

/// Flatten an already-built schema map, preserving its entry order.
pub fn flatten_map(map: &IdlMap) -> Result<Vec<MessageDefinition>, SchemaError> {
    let mut records = Vec::new();
    let mut top_level_consts = Vec::new();

    for (scoped_name, def) in map.iter() {
        match def {
            Definition::Struct(s) => {
                let fields = s
                    .fields
                    .iter()
                    .map(|f| convert_field(f, map))
                    .collect::<Result<Vec<_>, _>>()?;
                records.push(MessageDefinition::Struct(StructRecord {
                    name: scoped_name.to_string(),
                    fields,
                }));
            }
            Definition::Module(m) => {
                let consts = m
                    .definitions
                    .iter()
                    .filter_map(|d| match d {
                        Definition::Constant(c) => Some(convert_constant(c, map)),
                        _ => None,
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if !consts.is_empty() {
                    records.push(MessageDefinition::Module(ModuleRecord {
                        name: scoped_name.to_string(),
                        fields: consts,
                    }));
                }
            }
            Definition::Enum(e) => {
                let consts = e
                    .enumerators
                    .iter()
                    .map(|c| convert_constant(c, map))
                    .collect::<Result<Vec<_>, _>>()?;
                records.push(MessageDefinition::Module(ModuleRecord {
                    name: scoped_name.to_string(),
                    fields: consts,
                }));
            }
            Definition::Union(u) => {
                records.push(convert_union(scoped_name, u, map)?);
            }
            Definition::Constant(c) => {
                // Enumerators and module constants carry scoped keys and
                // are emitted with their parent record instead.
                if !scoped_name.contains("::") {
                    top_level_consts.push(convert_constant(c, map)?);
                }
            }
            Definition::Typedef(_) => {
                // Typedefs only feed resolution; they produce no output.
            }
        }
    }

    if !top_level_consts.is_empty() {
        records.push(MessageDefinition::Module(ModuleRecord {
            name: String::new(),
            fields: top_level_consts,
        }));
    }
    Ok(records)
}

/// Whether `name` refers to an enum in the map; used for demotion.
fn enum_demotion(name: &str, map: &IdlMap) -> (String, Option<String>, bool) {
    match map.get(name) {
        Some(Definition::Enum(_)) => ("uint32".to_string(), Some(name.to_string()), false),
        Some(Definition::Struct(_) | Definition::Union(_)) => (name.to_string(), None, true),
        _ => (name.to_string(), None, false),
    }
}

fn convert_field(field: &Field, map: &IdlMap) -> Result<MessageDefinitionField, SchemaError> {
    let collapsed = map.collapse(&field.ty)?;
    let merged = apply_field_modifiers(
        &field.array_lengths,
        field.is_sequence,
        field.sequence_bound,
        field.string_upper_bound,
        &collapsed,
    )?;
    let (ty, enum_type, is_complex) = enum_demotion(&merged.ty, map);

    let default_value = match field.annotations.get("default") {
        Some(AnnotationValue::Const(c)) => Some(c.clone()),
        _ => None,
    };
    let is_array = !merged.array_lengths.is_empty() || merged.is_sequence;

    Ok(MessageDefinitionField {
        name: field.name.clone(),
        ty,
        is_complex,
        enum_type,
        is_array,
        array_lengths: (!merged.array_lengths.is_empty()).then_some(merged.array_lengths),
        array_upper_bound: merged.is_sequence.then_some(merged.sequence_bound).flatten(),
        upper_bound: merged.string_upper_bound,
        default_value,
        is_constant: false,
        value: None,
        annotations: field.annotations.clone(),
    })
}

fn convert_constant(
    constant: &Constant,
    map: &IdlMap,
) -> Result<MessageDefinitionField, SchemaError> {
    let collapsed = map.collapse(&constant.ty)?;
    let (ty, enum_type, is_complex) = enum_demotion(&collapsed.ty, map);
    Ok(MessageDefinitionField {
        name: constant.name.clone(),
        ty,
        is_complex,
        enum_type,
        is_array: false,
        array_lengths: None,
        array_upper_bound: None,
        upper_bound: None,
        default_value: None,
        is_constant: true,
        value: Some(constant.value.clone()),
        annotations: constant.annotations.clone(),
    })
}

fn convert_union(
    scoped_name: &str,
    union: &Union,
    map: &IdlMap,
) -> Result<MessageDefinition, SchemaError> {
    let collapsed = map.collapse(&union.switch_type)?;
    let switch_type = match map.get(&collapsed.ty) {
        Some(Definition::Enum(_)) => "uint32".to_string(),
        _ => collapsed.ty,
    };

    let cases = union
        .cases
        .iter()
        .map(|case| {
            Ok(CaseRecord {
                predicates: case.predicates.clone(),
                field: convert_field(&case.field, map)?,
            })
        })
        .collect::<Result<Vec<_>, SchemaError>>()?;
    let default_case = union
        .default
        .as_ref()
        .map(|f| convert_field(f, map))
        .transpose()?;

    Ok(MessageDefinition::Union(UnionRecord {
        name: scoped_name.to_string(),
        switch_type,
        cases,
        default_case,
    }))
}
