use omgidl::{
    EncapsulationKind, MessageDefinition, MessageReader, MessageWriter, StructValue, Value,
    parse_idl, parse_idl_message_definitions,
};

#[test]
fn parse_encode_decode_flatten_end_to_end() {
    let schema = r#"
        module sensor_msgs {
            module msg {
                enum Status { OK, DEGRADED };
                struct Reading {
                    Status status;
                    float64 value;
                    sequence<string, 4> tags;
                };
            };
        };
    "#;
    let defs = parse_idl(schema).expect("schema should parse");

    let writer = MessageWriter::with_encapsulation_kind(
        "sensor_msgs::msg::Reading",
        &defs,
        EncapsulationKind::CdrLe,
    )
    .expect("writer should build");
    let reader = MessageReader::new("Reading", &defs).expect("reader should build");

    let reading = Value::Struct(StructValue::from([
        ("status", Value::U32(1)),
        ("value", Value::F64(21.5)),
        (
            "tags",
            Value::Array(vec![Value::string("raw"), Value::string("imu")]),
        ),
    ]));
    let bytes = writer.write_message(&reading).expect("write should succeed");
    assert_eq!(
        writer.calculate_byte_size(&reading).unwrap(),
        bytes.len()
    );
    assert_eq!(reader.read_message(&bytes).unwrap(), reading);

    let records = parse_idl_message_definitions(schema).expect("flatten should succeed");
    let reading_record = records
        .iter()
        .find(|r| r.name() == "sensor_msgs::msg::Reading")
        .expect("struct record expected");
    let MessageDefinition::Struct(s) = reading_record else {
        panic!("expected struct record");
    };
    assert_eq!(s.fields[0].ty, "uint32");
    assert_eq!(
        s.fields[0].enum_type.as_deref(),
        Some("sensor_msgs::msg::Status")
    );
}
