//! Name resolution: rewrites unqualified type references to fully
//! qualified `::` names under lexical scope.
//!
//! # Lookup strategy
//!
//! For a reference `T` seen inside module scope `a::b`:
//!
//! 1. A leading `::` anchors the name at the global scope — strip it and
//!    accept the rest verbatim.
//! 2. A name that already contains `::` is accepted verbatim.
//! 3. Otherwise try `a::b::T`, `a::T`, `T` in that order and bind the first
//!    name that is declared somewhere in the document.
//!
//! A reference that stays unresolved is left untouched; consumers report
//! [`SchemaError::UnknownType`](crate::SchemaError::UnknownType) when they
//! fail to look it up.

use std::collections::HashSet;

use crate::ast::{Definition, Field, is_builtin};

/// Resolve every field, union switch, and typedef type reference in
/// `definitions`, in place.
pub fn resolve_definitions(definitions: &mut [Definition]) {
    let mut named_types = HashSet::new();
    collect_named_types(definitions, &mut Vec::new(), &mut named_types);
    resolve_in_scope(definitions, &mut Vec::new(), &named_types);
}

/// Gather the fully qualified names of every struct, union, typedef, and
/// enum declaration.
fn collect_named_types(
    definitions: &[Definition],
    scope: &mut Vec<String>,
    out: &mut HashSet<String>,
) {
    for def in definitions {
        match def {
            Definition::Struct(_)
            | Definition::Union(_)
            | Definition::Typedef(_)
            | Definition::Enum(_) => {
                out.insert(scoped_name(scope, def.name()));
            }
            Definition::Module(m) => {
                scope.push(m.name.clone());
                collect_named_types(&m.definitions, scope, out);
                scope.pop();
            }
            Definition::Constant(_) => {}
        }
    }
}

fn resolve_in_scope(
    definitions: &mut [Definition],
    scope: &mut Vec<String>,
    named_types: &HashSet<String>,
) {
    for def in definitions {
        match def {
            Definition::Struct(s) => {
                for field in &mut s.fields {
                    resolve_field(field, scope, named_types);
                }
            }
            Definition::Union(u) => {
                resolve_type_name(&mut u.switch_type, scope, named_types);
                for case in &mut u.cases {
                    resolve_field(&mut case.field, scope, named_types);
                }
                if let Some(default) = &mut u.default {
                    resolve_field(default, scope, named_types);
                }
            }
            Definition::Typedef(t) => {
                resolve_type_name(&mut t.ty, scope, named_types);
            }
            Definition::Module(m) => {
                scope.push(m.name.clone());
                resolve_in_scope(&mut m.definitions, scope, named_types);
                scope.pop();
            }
            Definition::Enum(_) | Definition::Constant(_) => {}
        }
    }
}

fn resolve_field(field: &mut Field, scope: &[String], named_types: &HashSet<String>) {
    resolve_type_name(&mut field.ty, scope, named_types);
}

fn resolve_type_name(ty: &mut String, scope: &[String], named_types: &HashSet<String>) {
    if is_builtin(ty) {
        return;
    }
    if let Some(stripped) = ty.strip_prefix("::") {
        *ty = stripped.to_string();
        return;
    }
    if ty.contains("::") {
        return;
    }
    // Search the enclosing scopes from innermost to global.
    for i in (0..=scope.len()).rev() {
        let candidate = scoped_name(&scope[..i], ty);
        if named_types.contains(&candidate) {
            *ty = candidate;
            return;
        }
    }
}

fn scoped_name(scope: &[String], name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}::{name}", scope.join("::"))
    }
}
