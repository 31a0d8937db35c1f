use omgidl_common::{StructValue, Value};
use omgidl_parser::parse_idl;
use omgidl_serialization::{EncapsulationKind, MessageWriter, SerializationError};

// ── helpers ──────────────────────────────────────────────────────────────

fn msg<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Struct(StructValue::from(entries))
}

fn writer(schema: &str, root: &str) -> MessageWriter {
    let defs = parse_idl(schema).expect("schema should parse");
    MessageWriter::new(root, &defs).expect("writer should build")
}

fn writer_with_kind(schema: &str, root: &str, kind: EncapsulationKind) -> MessageWriter {
    let defs = parse_idl(schema).expect("schema should parse");
    MessageWriter::with_encapsulation_kind(root, &defs, kind).expect("writer should build")
}

/// Write and check the size law at the same time.
fn write_checked(writer: &MessageWriter, value: &Value) -> Vec<u8> {
    let bytes = writer.write_message(value).expect("write should succeed");
    assert_eq!(
        writer.calculate_byte_size(value).expect("size should succeed"),
        bytes.len()
    );
    bytes
}

// ── byte-exact scenarios ─────────────────────────────────────────────────

#[test]
fn writes_two_primitives() {
    let w = writer("struct A { int32 num; uint8 flag; };", "A");
    let m = msg([("num", Value::I32(5)), ("flag", Value::U8(7))]);
    assert_eq!(write_checked(&w, &m), [0, 1, 0, 0, 5, 0, 0, 0, 7]);
}

#[test]
fn writes_fixed_byte_array() {
    let w = writer("struct A { uint8 data[4]; };", "A");
    let m = msg([(
        "data",
        Value::Array(vec![Value::U8(1), Value::U8(2), Value::U8(3), Value::U8(4)]),
    )]);
    assert_eq!(write_checked(&w, &m), [0, 1, 0, 0, 1, 2, 3, 4]);
}

#[test]
fn writes_string_with_terminator() {
    let w = writer("struct A { string name; };", "A");
    let m = msg([("name", Value::string("hi"))]);
    assert_eq!(
        write_checked(&w, &m),
        [0, 1, 0, 0, 3, 0, 0, 0, 0x68, 0x69, 0]
    );
}

#[test]
fn writes_int32_sequence() {
    let w = writer("struct A { sequence<int32> data; };", "A");
    let m = msg([("data", Value::Array(vec![Value::I32(3), Value::I32(7)]))]);
    assert_eq!(
        write_checked(&w, &m),
        [0, 1, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 7, 0, 0, 0]
    );
}

#[test]
fn writes_union_discriminator_then_case() {
    let schema = r#"
        union U switch (uint8) {
            case 0: uint8 a;
            case 1: uint8 b;
        };
        struct A { U u; };
    "#;
    let w = writer(schema, "A");
    let m = msg([(
        "u",
        msg([("$discriminator", Value::U8(0)), ("a", Value::U8(7))]),
    )]);
    assert_eq!(write_checked(&w, &m), [0, 1, 0, 0, 0, 7]);
}

#[test]
fn writes_nested_struct_big_endian() {
    let schema = "struct I { int32 n; }; struct O { I i; };";
    let w = writer_with_kind(schema, "O", EncapsulationKind::CdrBe);
    let m = msg([("i", msg([("n", Value::I32(258))]))]);
    assert_eq!(write_checked(&w, &m), [0, 0, 0, 0, 0, 0, 1, 2]);
}

#[test]
fn writes_sequence_of_structs() {
    let schema = "struct Inner { int32 num; }; struct Outer { sequence<Inner> inners; };";
    let w = writer(schema, "Outer");
    let m = msg([(
        "inners",
        Value::Array(vec![
            msg([("num", Value::I32(1))]),
            msg([("num", Value::I32(2))]),
        ]),
    )]);
    assert_eq!(
        write_checked(&w, &m),
        [0, 1, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0]
    );
}

#[test]
fn pads_relative_to_encapsulation_header() {
    let w = writer("struct A { uint8 flag; float64 value; };", "A");
    let m = msg([("flag", Value::U8(7)), ("value", Value::F64(1.25))]);
    let mut expected = vec![0u8, 1, 0, 0, 7];
    expected.extend([0; 7]);
    expected.extend(1.25f64.to_bits().to_le_bytes());
    assert_eq!(write_checked(&w, &m), expected);
}

// ── framing ──────────────────────────────────────────────────────────────

#[test]
fn appendable_struct_gets_delimiter_under_cdr2() {
    let schema = "@appendable struct A { uint8 x; };";
    let w = writer_with_kind(schema, "A", EncapsulationKind::Cdr2Le);
    let m = msg([("x", Value::U8(7))]);
    assert_eq!(write_checked(&w, &m), [0, 0x11, 0, 0, 1, 0, 0, 0, 7]);
}

#[test]
fn appendable_struct_frames_as_final_under_classic_cdr() {
    let schema = "@appendable struct A { uint8 x; };";
    let w = writer(schema, "A");
    let m = msg([("x", Value::U8(7))]);
    assert_eq!(write_checked(&w, &m), [0, 1, 0, 0, 7]);
}

#[test]
fn mutable_struct_writes_member_headers_and_sentinel() {
    let schema = "@mutable struct M { @id(10) uint8 x; };";
    let w = writer(schema, "M");
    let m = msg([("x", Value::U8(7))]);
    assert_eq!(
        write_checked(&w, &m),
        [0, 1, 0, 0, 0x0A, 0, 1, 0, 7, 0, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn mutable_struct_under_pl_cdr2_adds_delimiter() {
    let schema = "@mutable struct M { @id(10) uint8 x; };";
    let w = writer_with_kind(schema, "M", EncapsulationKind::PlCdr2Le);
    let m = msg([("x", Value::U8(7))]);
    assert_eq!(
        write_checked(&w, &m),
        [0, 0x13, 0, 0, 12, 0, 0, 0, 0x0A, 0, 1, 0, 7, 0, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn mutable_struct_omits_absent_optional_members() {
    let schema = "@mutable struct M { @id(1) uint8 x; @id(2) @optional string note; };";
    let w = writer(schema, "M");
    let m = msg([("x", Value::U8(7))]);
    assert_eq!(
        write_checked(&w, &m),
        [0, 1, 0, 0, 1, 0, 1, 0, 7, 0, 0, 0, 0, 0, 0, 0]
    );
}

// ── defaults ─────────────────────────────────────────────────────────────

#[test]
fn missing_fields_take_defaults() {
    let w = writer("struct A { @default(5) int32 num; string name; };", "A");
    let m = msg([]);
    assert_eq!(
        write_checked(&w, &m),
        [0, 1, 0, 0, 5, 0, 0, 0, 1, 0, 0, 0, 0]
    );
}

#[test]
fn short_fixed_arrays_are_padded_with_element_defaults() {
    let w = writer("struct A { uint8 data[4]; };", "A");
    let m = msg([("data", Value::Array(vec![Value::U8(9)]))]);
    assert_eq!(write_checked(&w, &m), [0, 1, 0, 0, 9, 0, 0, 0]);
}

// ── failures ─────────────────────────────────────────────────────────────

#[test]
fn fails_on_missing_root() {
    let defs = parse_idl("struct A { int32 num; };").unwrap();
    let err = MessageWriter::new("B", &defs).expect_err("missing root should fail");
    assert!(matches!(err, SerializationError::RootNotFound(_)));
}

#[test]
fn fails_on_sequence_bound_overflow() {
    let w = writer("struct A { sequence<int32, 2> data; };", "A");
    let m = msg([(
        "data",
        Value::Array(vec![Value::I32(1), Value::I32(2), Value::I32(3)]),
    )]);
    let err = w.write_message(&m).expect_err("bound overflow should fail");
    assert!(matches!(
        err,
        SerializationError::BoundViolation { kind: "sequence", got: 3, max: 2, .. }
    ));
}

#[test]
fn fails_on_string_bound_overflow() {
    let w = writer("struct A { string<5> name; };", "A");
    let m = msg([("name", Value::string("toolong"))]);
    let err = w.write_message(&m).expect_err("bound overflow should fail");
    assert!(matches!(
        err,
        SerializationError::BoundViolation { kind: "string", got: 7, max: 5, .. }
    ));
}

#[test]
fn fails_when_no_union_case_matches_and_no_default_exists() {
    let schema = r#"
        union U switch (uint8) {
            case 0: uint8 a;
        };
        struct A { U u; };
    "#;
    let w = writer(schema, "A");
    let m = msg([("u", msg([("$discriminator", Value::U8(9))]))]);
    let err = w.write_message(&m).expect_err("unmatched case should fail");
    assert!(matches!(err, SerializationError::UnionNoCase { .. }));
}

#[test]
fn fails_on_mismatched_value_shape() {
    let w = writer("struct A { int32 num; };", "A");
    let m = msg([("num", Value::string("not a number"))]);
    let err = w.write_message(&m).expect_err("type mismatch should fail");
    assert!(matches!(err, SerializationError::UnexpectedValue { .. }));
}
