//! Unit tests for Value and PropertyKey

use core_types::{ObjectId, PropertyKey, SymbolId, Value};

#[test]
fn test_object_and_function_share_handle_access() {
    let obj = Value::Object(ObjectId(7));
    let func = Value::Function(ObjectId(8));
    assert_eq!(obj.as_object(), Some(ObjectId(7)));
    assert_eq!(func.as_object(), Some(ObjectId(8)));
    assert!(func.is_callable());
    assert!(!obj.is_callable());
    assert!(obj.is_object() && func.is_object());
}

#[test]
fn test_strict_equality_semantics() {
    assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    assert_eq!(Value::string("a"), Value::from("a"));
    assert_ne!(Value::Object(ObjectId(1)), Value::Function(ObjectId(1)));
    assert_ne!(Value::Undefined, Value::Null);
}

#[test]
fn test_display_of_primitives() {
    assert_eq!(Value::Number(3.0).to_string(), "3");
    assert_eq!(Value::Number(-0.5).to_string(), "-0.5");
    assert_eq!(Value::Boolean(true).to_string(), "true");
    assert_eq!(Value::Null.to_string(), "null");
    assert_eq!(Value::Hole.to_string(), "undefined");
}

#[test]
fn test_property_key_round_trip_to_value() {
    let key = PropertyKey::Symbol(SymbolId(2));
    assert_eq!(key.to_value(), Value::Symbol(SymbolId(2)));
    assert!(key.is_symbol());
    assert_eq!(PropertyKey::index(5), PropertyKey::from("5"));
}
