use omgidl_common::{StructValue, Value};
use omgidl_parser::parse_idl;
use omgidl_serialization::{MessageReader, MessageWriter, SerializationError};

// ── helpers ──────────────────────────────────────────────────────────────

fn msg<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Struct(StructValue::from(entries))
}

fn reader(schema: &str, root: &str) -> MessageReader {
    let defs = parse_idl(schema).expect("schema should parse");
    MessageReader::new(root, &defs).expect("reader should build")
}

/// A little-endian classic-CDR buffer: header plus payload.
fn cdr_le(payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0x00, 0x01, 0x00, 0x00];
    buf.extend_from_slice(payload);
    buf
}

// ── scenarios ────────────────────────────────────────────────────────────

#[test]
fn decodes_two_primitives() {
    let r = reader("struct A { int32 num; uint8 flag; };", "A");
    let value = r
        .read_message(&cdr_le(&[5, 0, 0, 0, 7]))
        .expect("decode should succeed");
    assert_eq!(value, msg([("num", Value::I32(5)), ("flag", Value::U8(7))]));
}

#[test]
fn decodes_f64_with_header_relative_alignment() {
    let r = reader("struct A { uint8 flag; float64 value; };", "A");
    let mut payload = vec![7u8];
    payload.extend([0; 7]);
    payload.extend(1.25f64.to_bits().to_le_bytes());
    let value = r.read_message(&cdr_le(&payload)).expect("decode should succeed");
    assert_eq!(
        value,
        msg([("flag", Value::U8(7)), ("value", Value::F64(1.25))])
    );
}

#[test]
fn decodes_enum_field_as_uint32() {
    let schema = "enum State { OK, WARN };\nstruct A { State state; };";
    let r = reader(schema, "A");
    let value = r
        .read_message(&cdr_le(&[1, 0, 0, 0]))
        .expect("decode should succeed");
    assert_eq!(value, msg([("state", Value::U32(1))]));
}

#[test]
fn decodes_big_endian_buffer() {
    let r = reader("struct A { int32 num; };", "A");
    let value = r
        .read_message(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x02])
        .expect("decode should succeed");
    assert_eq!(value, msg([("num", Value::I32(258))]));
}

#[test]
fn decodes_wstring_payload_as_utf16le() {
    let r = reader("struct A { wstring name; };", "A");
    let value = r
        .read_message(&cdr_le(&[6, 0, 0, 0, 0x68, 0, 0x69, 0, 0, 0]))
        .expect("decode should succeed");
    assert_eq!(value, msg([("name", Value::string("hi"))]));
}

#[test]
fn tolerates_zero_length_strings_without_terminator() {
    let r = reader("struct A { string name; };", "A");
    let value = r
        .read_message(&cdr_le(&[0, 0, 0, 0]))
        .expect("decode should succeed");
    assert_eq!(value, msg([("name", Value::string(""))]));
}

// ── member-header streams ────────────────────────────────────────────────

#[test]
fn mutable_struct_tolerates_member_id_permutation() {
    let schema = "@mutable struct M { @id(100) int32 a; string b; };";
    let r = reader(schema, "M");
    // Members written in reverse id order: b (id 2) first, then a (id 100).
    let mut payload = Vec::new();
    payload.extend([2, 0, 7, 0]); // (id 2, size 7)
    payload.extend([3, 0, 0, 0, 0x68, 0x69, 0]); // "hi"
    payload.push(0); // pad to 4
    payload.extend([100, 0, 4, 0]); // (id 100, size 4)
    payload.extend(42i32.to_le_bytes());
    payload.extend([0, 0, 0, 0]); // sentinel
    let value = r.read_message(&cdr_le(&payload)).expect("decode should succeed");
    assert_eq!(
        value,
        msg([("a", Value::I32(42)), ("b", Value::string("hi"))])
    );
}

#[test]
fn mutable_struct_skips_unknown_member_ids() {
    let schema = "@mutable struct M { @id(1) uint8 x; };";
    let r = reader(schema, "M");
    let mut payload = Vec::new();
    payload.extend([99, 0, 4, 0]); // unknown member, 4 payload bytes
    payload.extend([0xAA, 0xBB, 0xCC, 0xDD]);
    payload.extend([1, 0, 1, 0, 7]); // x = 7
    payload.extend([0, 0, 0]); // pad to 4
    payload.extend([0, 0, 0, 0]); // sentinel
    let value = r.read_message(&cdr_le(&payload)).expect("decode should succeed");
    assert_eq!(value, msg([("x", Value::U8(7))]));
}

#[test]
fn mutable_struct_fills_missing_members_from_defaults() {
    let schema = "@mutable struct M { @id(1) uint8 x; @id(2) @default(9) int32 y; };";
    let r = reader(schema, "M");
    let mut payload = Vec::new();
    payload.extend([1, 0, 1, 0, 7]);
    payload.extend([0, 0, 0]); // pad to 4
    payload.extend([0, 0, 0, 0]); // sentinel
    let value = r.read_message(&cdr_le(&payload)).expect("decode should succeed");
    assert_eq!(value, msg([("x", Value::U8(7)), ("y", Value::I32(9))]));
}

#[test]
fn absent_optional_members_stay_absent() {
    let schema = "@mutable struct M { @id(1) uint8 x; @id(2) @optional string note; };";
    let r = reader(schema, "M");
    let mut payload = Vec::new();
    payload.extend([1, 0, 1, 0, 7]);
    payload.extend([0, 0, 0]);
    payload.extend([0, 0, 0, 0]);
    let value = r.read_message(&cdr_le(&payload)).expect("decode should succeed");
    let s = value.as_struct().expect("struct value");
    assert_eq!(s.get("x"), Some(&Value::U8(7)));
    assert_eq!(s.get("note"), None);
}

// ── failures ─────────────────────────────────────────────────────────────

#[test]
fn fails_on_unknown_encapsulation_kind() {
    let r = reader("struct A { uint8 x; };", "A");
    let err = r
        .read_message(&[0x00, 0x05, 0x00, 0x00, 7])
        .expect_err("kind 0x05 should fail");
    assert!(matches!(err, SerializationError::BadEncapsulation(0x05)));
}

#[test]
fn fails_on_truncated_buffer() {
    let r = reader("struct A { int32 num; };", "A");
    let err = r
        .read_message(&cdr_le(&[1, 2]))
        .expect_err("short buffer should fail");
    assert!(matches!(err, SerializationError::BufferUnderflow(_)));
}

#[test]
fn fails_on_buffer_shorter_than_header() {
    let r = reader("struct A { uint8 x; };", "A");
    let err = r.read_message(&[0x00]).expect_err("no header should fail");
    assert!(matches!(err, SerializationError::BufferUnderflow(_)));
}

#[test]
fn fails_on_sequence_bound_overflow() {
    let r = reader("struct A { sequence<uint8, 1> data; };", "A");
    let err = r
        .read_message(&cdr_le(&[2, 0, 0, 0, 1, 2]))
        .expect_err("over-bound sequence should fail");
    assert!(matches!(
        err,
        SerializationError::BoundViolation { kind: "sequence", got: 2, max: 1, .. }
    ));
}

#[test]
fn enforces_string_bounds_against_foreign_buffers() {
    // A buffer produced under an unbounded schema decodes strictly against
    // a bounded one.
    let defs = parse_idl("struct A { string name; };").unwrap();
    let w = MessageWriter::new("A", &defs).unwrap();
    let buf = w
        .write_message(&msg([("name", Value::string("toolong"))]))
        .unwrap();

    let r = reader("struct A { string<5> name; };", "A");
    let err = r.read_message(&buf).expect_err("bound should be enforced");
    assert!(matches!(
        err,
        SerializationError::BoundViolation { kind: "string", got: 7, max: 5, .. }
    ));
}

#[test]
fn fails_on_missing_string_terminator() {
    let r = reader("struct A { string name; };", "A");
    let err = r
        .read_message(&cdr_le(&[3, 0, 0, 0, 0x61, 0x62, 0x63]))
        .expect_err("unterminated string should fail");
    assert!(matches!(err, SerializationError::EncodingError { .. }));
}

#[test]
fn fails_on_member_header_larger_than_buffer() {
    let schema = "@mutable struct M { @id(1) uint8 x; };";
    let r = reader(schema, "M");
    let err = r
        .read_message(&cdr_le(&[99, 0, 255, 0, 1]))
        .expect_err("oversized member should fail");
    assert!(matches!(err, SerializationError::BufferUnderflow(_)));
}

#[test]
fn fails_on_unresolved_field_type() {
    let defs = parse_idl("struct A { Missing m; };").unwrap();
    let err = MessageReader::new("A", &defs).expect_err("unknown type should fail");
    assert!(matches!(err, SerializationError::Schema(_)));
}
