//! Statements: loops, branches, exceptions

use super::{eval, eval_error};
use jsbridge::Value;

#[test]
fn test_if_else() {
    assert_eq!(eval("let r; if (1 > 2) { r = 'a' } else { r = 'b' } r"), Value::from("b"));
}

#[test]
fn test_while_and_do_while() {
    assert_eq!(eval("let i = 0; while (i < 5) { i++ } i"), Value::from(5));
    assert_eq!(eval("let n = 0; do { n++ } while (false); n"), Value::from(1));
}

#[test]
fn test_for_loop_with_break_and_continue() {
    let source = "
        let sum = 0;
        for (let i = 0; i < 10; i++) {
            if (i % 2 === 0) continue;
            if (i > 7) break;
            sum += i;
        }
        sum";
    assert_eq!(eval(source), Value::from(16));
}

#[test]
fn test_for_of_array_and_string() {
    assert_eq!(
        eval("let t = 0; for (const x of [1, 2, 3]) { t += x } t"),
        Value::from(6)
    );
    assert_eq!(
        eval("let out = ''; for (const c of 'abc') { out = c + out } out"),
        Value::from("cba")
    );
}

#[test]
fn test_for_of_non_iterable() {
    assert_eq!(
        eval_error("let n = 42; for (const x of n) {}"),
        "TypeError: n is not iterable"
    );
}

#[test]
fn test_try_catch_finally() {
    let source = "
        let log = [];
        try {
            log.push('try');
            throw 'boom';
        } catch (e) {
            log.push('catch ' + e);
        } finally {
            log.push('finally');
        }
        log.join(',')";
    assert_eq!(eval(source), Value::from("try,catch boom,finally"));
}

#[test]
fn test_finally_runs_on_return() {
    let source = "
        let ran = false;
        function f() {
            try { return 1 } finally { ran = true }
        }
        f() + (ran ? 10 : 0)";
    assert_eq!(eval(source), Value::from(11));
}

#[test]
fn test_catch_engine_errors() {
    assert_eq!(
        eval("try { missing } catch (e) { e.name + ': ' + e.message }"),
        Value::from("ReferenceError: missing is not defined")
    );
    assert_eq!(
        eval("try { null.x } catch (e) { e instanceof TypeError }"),
        Value::Bool(true)
    );
}

#[test]
fn test_const_reassignment() {
    assert_eq!(
        eval_error("const c = 1; c = 2"),
        "TypeError: Assignment to constant variable."
    );
}

#[test]
fn test_break_outside_loop_is_error() {
    assert!(super::eval_result("break").is_err());
}
