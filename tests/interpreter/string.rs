//! String built-in methods

use super::eval;
use jsbridge::Value;

#[test]
fn test_length_and_index() {
    assert_eq!(eval("'hello'.length"), Value::from(5));
    assert_eq!(eval("'hello'[1]"), Value::from("e"));
    assert_eq!(eval("'hello'[10]"), Value::Undefined);
}

#[test]
fn test_case_conversion() {
    assert_eq!(eval("'MiXed'.toUpperCase()"), Value::from("MIXED"));
    assert_eq!(eval("'MiXed'.toLowerCase()"), Value::from("mixed"));
}

#[test]
fn test_index_of() {
    assert_eq!(eval("'banana'.indexOf('an')"), Value::from(1));
    assert_eq!(eval("'banana'.indexOf('an', 2)"), Value::from(3));
    assert_eq!(eval("'banana'.indexOf('x')"), Value::from(-1));
}

#[test]
fn test_slice() {
    assert_eq!(eval("'javascript'.slice(4)"), Value::from("script"));
    assert_eq!(eval("'javascript'.slice(0, 4)"), Value::from("java"));
    assert_eq!(eval("'javascript'.slice(-6, -3)"), Value::from("scr"));
    assert_eq!(eval("'abc'.slice(2, 1)"), Value::from(""));
}

#[test]
fn test_string_conversion() {
    assert_eq!(eval("String(12)"), Value::from("12"));
    assert_eq!(eval("String(null)"), Value::from("null"));
    assert_eq!(eval("String([1, 2])"), Value::from("1,2"));
}

#[test]
fn test_escapes() {
    assert_eq!(eval(r#""a\tb\n""#), Value::from("a\tb\n"));
    assert_eq!(eval(r"'it\'s'"), Value::from("it's"));
}
