//! Array built-in methods

use super::{eval, eval_error};
use jsbridge::Value;

#[test]
fn test_array_literal_and_length() {
    assert_eq!(eval("[1, 2, 3].length"), Value::from(3));
    assert_eq!(eval("[].length"), Value::from(0));
    assert_eq!(eval("[10, 20][1]"), Value::from(20));
}

#[test]
fn test_push_pop() {
    assert_eq!(eval("const a = [1]; a.push(2, 3)"), Value::from(3));
    assert_eq!(eval("const a = [1, 2]; a.pop()"), Value::from(2));
    assert_eq!(eval("[].pop()"), Value::Undefined);
}

#[test]
fn test_index_assignment_grows_array() {
    assert_eq!(eval("const a = []; a[2] = 'x'; a.length"), Value::from(3));
    assert_eq!(eval("const a = [1, 2, 3]; a.length = 1; a.join()"), Value::from("1"));
}

#[test]
fn test_join_and_to_string() {
    assert_eq!(eval("[1, 2, 3].join('-')"), Value::from("1-2-3"));
    assert_eq!(eval("[1, null, undefined, 4].join()"), Value::from("1,,,4"));
    assert_eq!(eval("'' + [1, [2, 3]]"), Value::from("1,2,3"));
}

#[test]
fn test_index_of() {
    assert_eq!(eval("['a', 'b'].indexOf('b')"), Value::from(1));
    assert_eq!(eval("['a', 'b'].indexOf('z')"), Value::from(-1));
}

#[test]
fn test_map_and_for_each() {
    assert_eq!(eval("[1, 2, 3].map(x => x * 2).join()"), Value::from("2,4,6"));
    assert_eq!(
        eval("let t = 0; [1, 2, 3].forEach((x, i) => { t += x * i }); t"),
        Value::from(8)
    );
}

#[test]
fn test_is_array() {
    assert_eq!(eval("Array.isArray([])"), Value::Bool(true));
    assert_eq!(eval("Array.isArray({})"), Value::Bool(false));
}

#[test]
fn test_array_constructor() {
    assert_eq!(eval("new Array(3).length"), Value::from(3));
    assert_eq!(eval("Array(1, 2).join()"), Value::from("1,2"));
}

#[test]
fn test_map_requires_callable() {
    assert_eq!(
        eval_error("[1].map(5)"),
        "TypeError: Array.prototype.map callback is not a function"
    );
}

#[test]
fn test_invalid_array_length() {
    assert_eq!(
        eval_error("var a = []; a.length = 4294967295"),
        "RangeError: Invalid array length"
    );
    assert_eq!(
        eval_error("new Array(4294967295)"),
        "RangeError: Invalid array length"
    );
    assert_eq!(eval_error("[].length = -1"), "RangeError: Invalid array length");
    assert_eq!(eval_error("new Array(1.5)"), "RangeError: Invalid array length");
    assert_eq!(
        eval("var a = []; try { a.length = 4294967295 } catch (e) { a.length = 3 } a.length"),
        Value::from(3)
    );
    assert_eq!(eval("new Array(1000).length"), Value::from(1000));
}
