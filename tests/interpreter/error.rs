//! Error constructors and guest-thrown values

use super::{create_test_context, eval, eval_result};
use jsbridge::{PropertyBearing, Value};

#[test]
fn test_error_constructor() {
    assert_eq!(eval("new Error('oops').message"), Value::from("oops"));
    assert_eq!(eval("new Error('oops').name"), Value::from("Error"));
    assert_eq!(eval("Error('no new').message"), Value::from("no new"));
}

#[test]
fn test_derived_error_types() {
    for name in ["TypeError", "RangeError", "ReferenceError", "SyntaxError"] {
        let source = format!(
            "const e = new {name}('m'); [e.name, e instanceof {name}, e instanceof Error].join()"
        );
        assert_eq!(eval(&source), Value::from(format!("{name},true,true")));
    }
}

// Error.prototype.toString tests
#[test]
fn test_error_tostring() {
    assert_eq!(
        eval("new Error('something went wrong').toString()"),
        Value::from("Error: something went wrong")
    );
    assert_eq!(eval("new Error().toString()"), Value::from("Error"));
    assert_eq!(
        eval("String(new TypeError('invalid argument'))"),
        Value::from("TypeError: invalid argument")
    );
}

#[test]
fn test_error_stack_starts_with_summary() {
    assert_eq!(
        eval("new RangeError('too far').stack.indexOf('RangeError: too far')"),
        Value::from(0)
    );
}

#[test]
fn test_uncaught_error_object() {
    let err = eval_result("throw new TypeError('bad input')").err();
    let Some(err) = err else {
        panic!("expected an error");
    };
    let Some(js) = err.as_js_exception() else {
        panic!("expected a guest exception, got {:?}", err);
    };
    assert_eq!(js.name(), Some("TypeError"));
    assert_eq!(js.message(), "bad input");
    assert_eq!(err.to_string(), "TypeError: bad input");
}

#[test]
fn test_uncaught_primitive() {
    let err = eval_result("throw 42").err();
    let Some(js) = err.as_ref().and_then(|e| e.as_js_exception()) else {
        panic!("expected a guest exception");
    };
    assert_eq!(js.value(), &Value::from(42));
    assert_eq!(js.name(), None);
    assert_eq!(js.message(), "42");
}

#[test]
fn test_uncaught_plain_object_payload() {
    // The payload proxy needs its context alive
    let ctx = create_test_context();
    let err = ctx.eval("throw { code: 7, reason: 'nope' }").err();
    let Some(js) = err.as_ref().and_then(|e| e.as_js_exception()) else {
        panic!("expected a guest exception");
    };
    assert_eq!(js.value().get("code").ok(), Some(Value::from(7)));
    assert_eq!(js.value().get("reason").ok(), Some(Value::from("nope")));
}

#[test]
fn test_syntax_error_is_guest_exception() {
    let err = eval_result("let = ;").err();
    let Some(js) = err.as_ref().and_then(|e| e.as_js_exception()) else {
        panic!("expected a guest exception");
    };
    assert_eq!(js.name(), Some("SyntaxError"));
}

#[test]
fn test_rethrow_keeps_value() {
    let ctx = create_test_context();
    let err = ctx
        .eval("try { throw { id: 1 } } catch (e) { e.id = 2; throw e }")
        .err();
    let Some(js) = err.as_ref().and_then(|e| e.as_js_exception()) else {
        panic!("expected a guest exception");
    };
    assert_eq!(js.value().get("id").ok(), Some(Value::from(2)));
}
