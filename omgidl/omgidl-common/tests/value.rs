use omgidl_common::{StructValue, Value};

#[test]
fn struct_value_preserves_insertion_order_and_overwrites_in_place() {
    let mut msg = StructValue::new();
    msg.insert("a", Value::I32(1));
    msg.insert("b", Value::I32(2));
    msg.insert("a", Value::I32(3));
    let entries: Vec<(&str, &Value)> = msg.iter().collect();
    assert_eq!(
        entries,
        vec![("a", &Value::I32(3)), ("b", &Value::I32(2))]
    );
}

#[test]
fn lenient_integer_widening_checks_ranges() {
    assert_eq!(Value::I8(-3).to_i64(), Some(-3));
    assert_eq!(Value::U64(u64::MAX).to_i64(), None);
    assert_eq!(Value::I32(-1).to_u64(), None);
    assert_eq!(Value::U16(7).to_u64(), Some(7));
    assert_eq!(Value::String("x".into()).to_i64(), None);
}

#[test]
fn lenient_float_widening_accepts_integers() {
    assert_eq!(Value::F32(1.5).to_f64(), Some(1.5));
    assert_eq!(Value::I32(2).to_f64(), Some(2.0));
    assert_eq!(Value::Bool(true).to_f64(), None);
}

#[test]
fn strict_accessors_reject_other_variants() {
    assert_eq!(Value::Bool(true).as_bool(), Some(true));
    assert_eq!(Value::I32(1).as_bool(), None);
    assert_eq!(Value::string("hi").as_str(), Some("hi"));
}
