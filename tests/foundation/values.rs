//! Integration tests for Value and keyword interning.

use flintlock_foundation::{FlVec, Interner, Type, Value};

// =============================================================================
// Typed Access
// =============================================================================

#[test]
fn value_types() {
    assert_eq!(Value::Nil.value_type(), Type::Nil);
    assert_eq!(Value::Int(1).value_type(), Type::Int);
    assert_eq!(Value::string("x").value_type(), Type::String);
    assert_eq!(Value::Float(1.5).value_type(), Type::Float);
}

#[test]
fn conversions_from_primitives() {
    assert_eq!(Value::from(true), Value::Bool(true));
    assert_eq!(Value::from(42_i64), Value::Int(42));
    assert_eq!(Value::from("hi"), Value::string("hi"));
}

#[test]
fn expect_accessors_succeed_on_matching_type() {
    assert_eq!(Value::Int(42).expect_int().unwrap(), 42);
    assert_eq!(Value::string("me").expect_str().unwrap(), "me");
    assert!(Value::Bool(true).expect_bool().unwrap());
}

#[test]
fn expect_accessors_fail_on_wrong_type() {
    assert!(Value::Int(42).expect_str().is_err());
    assert!(Value::Nil.expect_int().is_err());
}

// =============================================================================
// Keywords
// =============================================================================

#[test]
fn keywords_compare_by_identity() {
    let mut interner = Interner::new();
    let gift = interner.intern_keyword("gift");
    let person = interner.intern_keyword("person");

    assert_eq!(Value::from(gift), Value::Keyword(gift));
    assert_ne!(Value::from(gift), Value::from(person));
}

// =============================================================================
// Composites
// =============================================================================

#[test]
fn vec_values_share_structure() {
    let base: FlVec<Value> = [Value::Int(1), Value::Int(2)].into_iter().collect();
    let extended = base.push_back(Value::Int(3));

    assert_eq!(base.len(), 2);
    assert_eq!(extended.len(), 3);
    assert_ne!(Value::Vec(base), Value::Vec(extended));
}
