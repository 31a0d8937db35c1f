//! Scoped-name map over a parsed definition tree, plus typedef collapsing.
//!
//! The map preserves a deterministic order that downstream views rely on:
//! module bodies are inserted before the module itself, enum enumerators
//! right after their enum, and everything else in source order.

use indexmap::IndexMap;

use crate::ast::{Definition, Typedef};
use crate::error::SchemaError;

/// A type reference with every typedef in its chain collapsed away.
///
/// `ty` is the final primitive or scoped struct/union/enum name;
/// the modifiers are accumulated along the chain, outermost first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollapsedType {
    pub ty: String,
    pub array_lengths: Vec<usize>,
    pub is_sequence: bool,
    pub sequence_bound: Option<usize>,
    pub string_upper_bound: Option<usize>,
}

/// Ordered map of fully scoped name → definition.
#[derive(Debug, Clone, Default)]
pub struct IdlMap {
    map: IndexMap<String, Definition>,
}

impl IdlMap {
    /// Build the map from a resolved definition tree.
    pub fn build(definitions: &[Definition]) -> Self {
        let mut map = IndexMap::new();
        for def in definitions {
            insert_definition(&mut map, def, &mut Vec::new());
        }
        Self { map }
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.map.get(name)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Definition)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Find the struct or union to serialize against.
    ///
    /// Accepts a fully qualified name, or an unqualified name that matches
    /// exactly one struct/union entry by suffix (`"A"` for `ex::msg::A`).
    /// An ambiguous suffix resolves to nothing.
    pub fn find_root(&self, name: &str) -> Option<&str> {
        if let Some((key, def)) = self.map.get_key_value(name)
            && matches!(def, Definition::Struct(_) | Definition::Union(_))
        {
            return Some(key.as_str());
        }
        let suffix = format!("::{name}");
        let mut found = None;
        for (key, def) in &self.map {
            if !matches!(def, Definition::Struct(_) | Definition::Union(_)) {
                continue;
            }
            if key.ends_with(&suffix) {
                if found.is_some() {
                    return None;
                }
                found = Some(key.as_str());
            }
        }
        found
    }

    /// Follow the typedef chain starting at `type_name`, accumulating
    /// array/sequence/string modifiers.
    ///
    /// Enums, structs, unions, and primitives are terminal. A chain that
    /// revisits a name fails with [`SchemaError::TypedefCycle`]; layering a
    /// variable-length collection onto another variable-length collection
    /// fails with [`SchemaError::UnsupportedComposition`].
    pub fn collapse(&self, type_name: &str) -> Result<CollapsedType, SchemaError> {
        let mut out = CollapsedType {
            ty: type_name.to_string(),
            ..CollapsedType::default()
        };
        let mut visited: Vec<String> = Vec::new();

        while let Some(Definition::Typedef(td)) = self.map.get(&out.ty) {
            if visited.contains(&out.ty) {
                return Err(SchemaError::TypedefCycle(out.ty.clone()));
            }
            visited.push(out.ty.clone());

            if let Some(Definition::Typedef(inner)) = self.map.get(&td.ty) {
                check_typedef_composition(&out.ty, td, inner)?;
            }

            out.array_lengths.extend(&td.array_lengths);
            if td.is_sequence {
                out.is_sequence = true;
                if td.sequence_bound.is_some() {
                    out.sequence_bound = td.sequence_bound;
                }
            }
            if out.string_upper_bound.is_none() {
                out.string_upper_bound = td.string_upper_bound;
            }
            out.ty = td.ty.clone();
        }
        Ok(out)
    }
}

/// Re-check the variable-length composition rule between a field's own
/// modifiers and its (collapsed) typedef modifiers, then merge them with
/// the field's modifiers outermost.
pub fn apply_field_modifiers(
    field_array_lengths: &[usize],
    field_is_sequence: bool,
    field_sequence_bound: Option<usize>,
    field_string_upper_bound: Option<usize>,
    collapsed: &CollapsedType,
) -> Result<CollapsedType, SchemaError> {
    let field_has_array = !field_array_lengths.is_empty() || field_is_sequence;
    let td_has_array = !collapsed.array_lengths.is_empty() || collapsed.is_sequence;
    if field_has_array && td_has_array {
        let field_fixed = !field_array_lengths.is_empty() && !field_is_sequence;
        let td_fixed = !collapsed.array_lengths.is_empty() && !collapsed.is_sequence;
        if !(field_fixed && td_fixed) {
            return Err(SchemaError::UnsupportedComposition(collapsed.ty.clone()));
        }
    }

    let mut array_lengths = field_array_lengths.to_vec();
    array_lengths.extend(&collapsed.array_lengths);
    Ok(CollapsedType {
        ty: collapsed.ty.clone(),
        array_lengths,
        is_sequence: field_is_sequence || collapsed.is_sequence,
        sequence_bound: if field_is_sequence {
            field_sequence_bound
        } else {
            collapsed.sequence_bound
        },
        string_upper_bound: field_string_upper_bound.or(collapsed.string_upper_bound),
    })
}

fn check_typedef_composition(
    outer_name: &str,
    outer: &Typedef,
    inner: &Typedef,
) -> Result<(), SchemaError> {
    let outer_has = !outer.array_lengths.is_empty() || outer.is_sequence;
    let inner_has = !inner.array_lengths.is_empty() || inner.is_sequence;
    if outer_has && inner_has {
        let outer_fixed = !outer.array_lengths.is_empty() && !outer.is_sequence;
        let inner_fixed = !inner.array_lengths.is_empty() && !inner.is_sequence;
        if !(outer_fixed && inner_fixed) {
            return Err(SchemaError::UnsupportedComposition(outer_name.to_string()));
        }
    }
    Ok(())
}

fn insert_definition(
    map: &mut IndexMap<String, Definition>,
    def: &Definition,
    scope: &mut Vec<String>,
) {
    match def {
        Definition::Module(m) => {
            scope.push(m.name.clone());
            for sub in &m.definitions {
                insert_definition(map, sub, scope);
            }
            scope.pop();
            map.insert(scoped(scope, &m.name), def.clone());
        }
        Definition::Enum(e) => {
            let enum_key = scoped(scope, &e.name);
            map.insert(enum_key.clone(), def.clone());
            for enumerator in &e.enumerators {
                let key = format!("{enum_key}::{}", enumerator.name);
                map.insert(key, Definition::Constant(enumerator.clone()));
            }
        }
        other => {
            map.insert(scoped(scope, other.name()), other.clone());
        }
    }
}

fn scoped(scope: &[String], name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}::{name}", scope.join("::"))
    }
}
