//! Functions, closures, `this` and `new`

use super::{create_test_context, eval, eval_error};
use jsbridge::{TerminationReason, Value};

#[test]
fn test_declaration_hoisting() {
    assert_eq!(eval("add(2, 3); function add(a, b) { return a + b }"), Value::from(5));
}

#[test]
fn test_closures_capture_environment() {
    let source = "
        function counter() {
            let n = 0;
            return function () { n++; return n };
        }
        const next = counter();
        next(); next(); next()";
    assert_eq!(eval(source), Value::from(3));
}

#[test]
fn test_arrow_functions() {
    assert_eq!(eval("const sq = x => x * x; sq(7)"), Value::from(49));
    assert_eq!(eval("const add = (a, b) => { return a + b }; add(1, 2)"), Value::from(3));
    assert_eq!(eval("(() => 'none')()"), Value::from("none"));
}

#[test]
fn test_arrow_captures_this() {
    let source = "
        const obj = {
            value: 42,
            read() { return (() => this.value)() }
        };
        obj.read()";
    assert_eq!(eval(source), Value::from(42));
}

#[test]
fn test_method_this() {
    assert_eq!(
        eval("const o = { n: 2, twice() { return this.n * 2 } }; o.twice()"),
        Value::from(4)
    );
}

#[test]
fn test_missing_arguments_are_undefined() {
    assert_eq!(eval("function f(a, b) { return b } f(1)"), Value::Undefined);
}

#[test]
fn test_constructor_functions() {
    let source = "
        function Point(x, y) { this.x = x; this.y = y }
        const p = new Point(1, 2);
        [p.x + p.y, p instanceof Point].join(',')";
    assert_eq!(eval(source), Value::from("3,true"));
}

#[test]
fn test_call_and_apply() {
    assert_eq!(
        eval("function f(a) { return this.base + a } f.call({ base: 1 }, 2)"),
        Value::from(3)
    );
    assert_eq!(
        eval("function f(a, b) { return this.k + a + b } f.apply({ k: 'k' }, ['a', 'b'])"),
        Value::from("kab")
    );
}

#[test]
fn test_function_name_and_length() {
    assert_eq!(eval("function named(a, b, c) {} named.name"), Value::from("named"));
    assert_eq!(eval("function named(a, b, c) {} named.length"), Value::from(3));
}

#[test]
fn test_function_to_string_is_source() {
    assert_eq!(
        eval("function f() { return 1 } f.toString()"),
        Value::from("function f() { return 1 }")
    );
}

#[test]
fn test_calling_non_function() {
    assert_eq!(
        eval_error("const o = {}; o.missing()"),
        "TypeError: o.missing is not a function"
    );
}

#[test]
fn test_arrow_is_not_a_constructor() {
    assert_eq!(
        eval_error("const A = () => 1; new A()"),
        "TypeError: A is not a constructor"
    );
}

#[test]
fn test_runaway_recursion_terminates() {
    let ctx = create_test_context();
    let err = ctx.eval("function f() { return f() } f()").err();
    assert_eq!(
        err.and_then(|e| e.termination()),
        Some(TerminationReason::StackOverflow)
    );
}

#[test]
fn test_recursion_is_not_catchable() {
    let ctx = create_test_context();
    let err = ctx
        .eval("function f() { return f() } try { f() } catch (e) { 'caught' }")
        .err();
    assert!(err.is_some_and(|e| e.termination().is_some()));
}
