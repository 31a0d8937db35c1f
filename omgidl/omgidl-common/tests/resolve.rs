use omgidl_common::{
    Annotations, CasePredicate, Definition, Enum, Field, Module, Struct, Typedef, Union,
    UnionCase, resolve_definitions,
};

// ── helpers ──────────────────────────────────────────────────────────────

fn module(name: &str, definitions: Vec<Definition>) -> Definition {
    Definition::Module(Module {
        name: name.to_string(),
        definitions,
    })
}

fn named_struct(name: &str, fields: Vec<Field>) -> Definition {
    Definition::Struct(Struct {
        name: name.to_string(),
        fields,
        annotations: Annotations::new(),
    })
}

fn field_ty<'a>(def: &'a Definition, index: usize) -> &'a str {
    match def {
        Definition::Struct(s) => &s.fields[index].ty,
        other => panic!("expected struct, got {other:?}"),
    }
}

// ── scope resolution ─────────────────────────────────────────────────────

#[test]
fn resolves_innermost_scope_first() {
    let mut defs = vec![
        named_struct("T", vec![]),
        module(
            "outer",
            vec![
                named_struct("T", vec![]),
                named_struct("User", vec![Field::new("t", "T")]),
            ],
        ),
    ];
    resolve_definitions(&mut defs);
    let Definition::Module(m) = &defs[1] else {
        panic!("expected module");
    };
    assert_eq!(field_ty(&m.definitions[1], 0), "outer::T");
}

#[test]
fn falls_back_to_outer_scopes() {
    let mut defs = vec![
        module(
            "outer",
            vec![
                named_struct("T", vec![]),
                module(
                    "inner",
                    vec![named_struct("User", vec![Field::new("t", "T")])],
                ),
            ],
        ),
    ];
    resolve_definitions(&mut defs);
    let Definition::Module(outer) = &defs[0] else {
        panic!("expected module");
    };
    let Definition::Module(inner) = &outer.definitions[1] else {
        panic!("expected module");
    };
    assert_eq!(field_ty(&inner.definitions[0], 0), "outer::T");
}

#[test]
fn leaves_builtins_and_already_qualified_names_alone() {
    let mut defs = vec![
        module("a", vec![named_struct("T", vec![])]),
        named_struct(
            "User",
            vec![Field::new("n", "uint32"), Field::new("t", "a::T")],
        ),
    ];
    resolve_definitions(&mut defs);
    assert_eq!(field_ty(&defs[1], 0), "uint32");
    assert_eq!(field_ty(&defs[1], 1), "a::T");
}

#[test]
fn leaves_unknown_references_untouched() {
    // Consumers surface these as UnknownType when they look them up.
    let mut defs = vec![named_struct("User", vec![Field::new("t", "Missing")])];
    resolve_definitions(&mut defs);
    assert_eq!(field_ty(&defs[0], 0), "Missing");
}

#[test]
fn resolves_enum_references() {
    let mut defs = vec![
        module(
            "ex",
            vec![
                Definition::Enum(Enum {
                    name: "Color".to_string(),
                    enumerators: vec![],
                }),
                named_struct("User", vec![Field::new("c", "Color")]),
            ],
        ),
    ];
    resolve_definitions(&mut defs);
    let Definition::Module(m) = &defs[0] else {
        panic!("expected module");
    };
    assert_eq!(field_ty(&m.definitions[1], 0), "ex::Color");
}

#[test]
fn resolves_union_switch_cases_and_typedef_targets() {
    let mut defs = vec![
        module(
            "ex",
            vec![
                Definition::Enum(Enum {
                    name: "Color".to_string(),
                    enumerators: vec![],
                }),
                named_struct("Payload", vec![]),
                Definition::Typedef(Typedef {
                    name: "Alias".to_string(),
                    ty: "Payload".to_string(),
                    array_lengths: Vec::new(),
                    is_sequence: false,
                    sequence_bound: None,
                    string_upper_bound: None,
                }),
                Definition::Union(Union {
                    name: "U".to_string(),
                    switch_type: "Color".to_string(),
                    cases: vec![UnionCase {
                        predicates: vec![CasePredicate::Int(0)],
                        field: Field::new("p", "Payload"),
                    }],
                    default: Some(Field::new("q", "Payload")),
                    annotations: Annotations::new(),
                }),
            ],
        ),
    ];
    resolve_definitions(&mut defs);
    let Definition::Module(m) = &defs[0] else {
        panic!("expected module");
    };
    let Definition::Typedef(td) = &m.definitions[2] else {
        panic!("expected typedef");
    };
    assert_eq!(td.ty, "ex::Payload");
    let Definition::Union(u) = &m.definitions[3] else {
        panic!("expected union");
    };
    assert_eq!(u.switch_type, "ex::Color");
    assert_eq!(u.cases[0].field.ty, "ex::Payload");
    assert_eq!(u.default.as_ref().unwrap().ty, "ex::Payload");
}
