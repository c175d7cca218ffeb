//! Literals, operators and conversions

use super::eval;
use jsbridge::Value;

#[test]
fn test_arithmetic() {
    assert_eq!(eval("1 + 2 * 3"), Value::from(7));
    assert_eq!(eval("(1 + 2) * 3"), Value::from(9));
    assert_eq!(eval("7 % 4"), Value::from(3));
    assert_eq!(eval("2 ** 10"), Value::from(1024));
    assert_eq!(eval("-5 / 2"), Value::from(-2.5));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval("'a' + 'b'"), Value::from("ab"));
    assert_eq!(eval("'n=' + 1"), Value::from("n=1"));
    assert_eq!(eval("1 + 2 + 'x'"), Value::from("3x"));
    assert_eq!(eval("'x' + null"), Value::from("xnull"));
}

#[test]
fn test_comparison_and_equality() {
    assert_eq!(eval("1 < 2"), Value::Bool(true));
    assert_eq!(eval("'b' > 'a'"), Value::Bool(true));
    assert_eq!(eval("1 == '1'"), Value::Bool(true));
    assert_eq!(eval("1 === '1'"), Value::Bool(false));
    assert_eq!(eval("null == undefined"), Value::Bool(true));
    assert_eq!(eval("null === undefined"), Value::Bool(false));
    assert_eq!(eval("NaN == NaN"), Value::Bool(false));
}

#[test]
fn test_logical_operators() {
    assert_eq!(eval("0 || 'fallback'"), Value::from("fallback"));
    assert_eq!(eval("1 && 'second'"), Value::from("second"));
    assert_eq!(eval("null ?? 'default'"), Value::from("default"));
    assert_eq!(eval("0 ?? 'default'"), Value::from(0));
    assert_eq!(eval("!''"), Value::Bool(true));
}

#[test]
fn test_typeof() {
    assert_eq!(eval("typeof 1"), Value::from("number"));
    assert_eq!(eval("typeof 'x'"), Value::from("string"));
    assert_eq!(eval("typeof undefined"), Value::from("undefined"));
    assert_eq!(eval("typeof notDeclared"), Value::from("undefined"));
    assert_eq!(eval("typeof {}"), Value::from("object"));
    assert_eq!(eval("typeof function () {}"), Value::from("function"));
}

#[test]
fn test_update_and_compound_assignment() {
    assert_eq!(eval("let i = 1; i++; i"), Value::from(2));
    assert_eq!(eval("let i = 1; i++"), Value::from(1));
    assert_eq!(eval("let i = 1; ++i"), Value::from(2));
    assert_eq!(eval("let s = 'a'; s += 'b'; s"), Value::from("ab"));
    assert_eq!(eval("let n = 10; n -= 3; n *= 2; n"), Value::from(14));
}

#[test]
fn test_bitwise_operators() {
    assert_eq!(eval("5 & 3"), Value::from(1));
    assert_eq!(eval("5 | 3"), Value::from(7));
    assert_eq!(eval("1 << 4"), Value::from(16));
    assert_eq!(eval("-1 >>> 28"), Value::from(15));
}

#[test]
fn test_conditional_and_sequence() {
    assert_eq!(eval("true ? 'yes' : 'no'"), Value::from("yes"));
    assert_eq!(eval("(1, 2, 3)"), Value::from(3));
}

#[test]
fn test_completion_value_of_last_expression() {
    assert_eq!(eval("1; 2; 3"), Value::from(3));
    assert_eq!(eval("let x = 5"), Value::Undefined);
    assert_eq!(eval(""), Value::Undefined);
}

#[test]
fn test_asi_at_newlines() {
    assert_eq!(eval("let a = 1\nlet b = 2\na + b"), Value::from(3));
}
