//! JSON built-in methods

use super::{eval, eval_error};
use jsbridge::Value;

#[test]
fn test_stringify() {
    assert_eq!(
        eval("JSON.stringify({ a: 1, b: [true, null, 'x'] })"),
        Value::from(r#"{"a":1,"b":[true,null,"x"]}"#)
    );
    assert_eq!(eval("JSON.stringify('s')"), Value::from(r#""s""#));
    assert_eq!(eval("JSON.stringify(undefined)"), Value::Undefined);
}

#[test]
fn test_stringify_omits_functions_and_undefined() {
    assert_eq!(
        eval("JSON.stringify({ f() {}, u: undefined, k: 1, arr: [undefined] })"),
        Value::from(r#"{"k":1,"arr":[null]}"#)
    );
}

#[test]
fn test_stringify_indent() {
    assert_eq!(
        eval("JSON.stringify({ a: [1] }, null, 2)"),
        Value::from("{\n  \"a\": [\n    1\n  ]\n}")
    );
}

#[test]
fn test_stringify_preserves_key_order() {
    assert_eq!(
        eval("JSON.stringify({ z: 1, a: 2 })"),
        Value::from(r#"{"z":1,"a":2}"#)
    );
}

#[test]
fn test_stringify_cycle() {
    assert_eq!(
        eval_error("const o = {}; o.self = o; JSON.stringify(o)"),
        "TypeError: Converting circular structure to JSON"
    );
}

#[test]
fn test_parse() {
    assert_eq!(eval(r#"JSON.parse('{"a": [1, 2]}').a[1]"#), Value::from(2));
    assert_eq!(eval(r#"JSON.parse('"str"')"#), Value::from("str"));
    assert_eq!(eval("JSON.parse('null')"), Value::Null);
}

#[test]
fn test_parse_error_is_syntax_error() {
    assert_eq!(
        eval("try { JSON.parse('{bad') } catch (e) { e.name }"),
        Value::from("SyntaxError")
    );
}
