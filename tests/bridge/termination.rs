//! Resource limits and external termination

use super::{expect_err, expect_ok};
use jsbridge::{
    Context, ContextConfig, Exception, HostFunction, NoOpConsoleProvider, TerminationReason, Value,
};
use std::thread;
use std::time::Duration;

fn context_with(config: ContextConfig) -> Context {
    Context::builder()
        .config(config)
        .console(NoOpConsoleProvider)
        .build()
}

#[test]
fn test_operation_limit() {
    let ctx = context_with(ContextConfig::unlimited().with_max_operations(10_000));
    let err = expect_err(ctx.eval("while (true) {}"));
    assert_eq!(err.termination(), Some(TerminationReason::OutOfFuel));
    assert_eq!(err.to_string(), "execution terminated: operation limit exceeded");

    // Every entry starts with a fresh budget
    assert_eq!(expect_ok(ctx.eval("1 + 1")), Value::from(2));
}

#[test]
fn test_deadline() {
    let ctx = context_with(ContextConfig::unlimited().with_timeout_ms(50));
    let err = expect_err(ctx.eval("for (;;) {}"));
    assert_eq!(err.termination(), Some(TerminationReason::DeadlineExceeded));
}

#[test]
fn test_termination_handle_from_another_thread() {
    let ctx = context_with(ContextConfig::unlimited());
    let handle = ctx.termination_handle();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        handle.terminate();
    });

    let err = expect_err(ctx.eval("while (true) {}"));
    assert!(stopper.join().is_ok());
    assert_eq!(err.termination(), Some(TerminationReason::Interrupted));
    assert!(ctx.termination_handle().is_terminated());

    let later = expect_err(ctx.eval("1"));
    assert_eq!(later.termination(), Some(TerminationReason::Interrupted));
}

#[test]
fn test_termination_is_not_catchable() {
    let ctx = context_with(ContextConfig::unlimited().with_max_operations(10_000));
    let err = expect_err(ctx.eval("try { while (true) {} } catch (e) { 'caught' }"));
    assert_eq!(err.termination(), Some(TerminationReason::OutOfFuel));
}

#[test]
fn test_termination_skips_finally() {
    let ctx = context_with(ContextConfig::unlimited().with_max_operations(10_000));
    let err = expect_err(ctx.eval("var ran = false; try { while (true) {} } finally { ran = true }"));
    assert!(err.termination().is_some());
    assert_eq!(expect_ok(ctx.get_global("ran")), Value::Bool(false));
}

#[test]
fn test_termination_passes_through_host_callables() {
    let ctx = context_with(ContextConfig::unlimited().with_max_operations(10_000));
    expect_ok(ctx.expose(HostFunction::new("run", |_, args| {
        match args.first().and_then(Value::as_function) {
            Some(callback) => callback.call(&[]),
            None => Ok(Value::Undefined),
        }
    })));
    let err = expect_err(ctx.eval(
        "try { run(() => { while (true) {} }) } catch (e) { 'caught' }",
    ));
    assert_eq!(err.termination(), Some(TerminationReason::OutOfFuel));
}

#[test]
fn test_call_depth_limit() {
    let ctx = context_with(ContextConfig::unlimited().with_max_call_depth(16));
    let err = expect_err(ctx.eval("function down(n) { return down(n + 1) } down(0)"));
    assert_eq!(err.termination(), Some(TerminationReason::StackOverflow));
    assert_eq!(expect_ok(ctx.eval("down.length")), Value::from(1));
}

#[test]
fn test_host_call_gets_fresh_budget() {
    let ctx = context_with(ContextConfig::unlimited().with_max_operations(2_000));
    expect_ok(ctx.eval("function spin(n) { let i = 0; while (i < n) { i++ } return i }"));
    let Value::Function(spin) = expect_ok(ctx.get_global("spin")) else {
        panic!("expected a guest function");
    };
    for _ in 0..3 {
        assert_eq!(expect_ok(spin.call(&[Value::from(500)])), Value::from(500));
    }
}

fn syntax_error_name(err: &Exception) -> Option<&str> {
    err.as_js_exception().and_then(|js| js.name())
}

#[test]
fn test_deeply_nested_source_is_rejected() {
    let ctx = context_with(ContextConfig::default());
    let chain = format!("1{}", "+1".repeat(20_000));
    let err = expect_err(ctx.eval(&chain));
    assert_eq!(syntax_error_name(&err), Some("SyntaxError"));

    let parens = format!("{}1{}", "(".repeat(5_000), ")".repeat(5_000));
    let err = expect_err(ctx.eval(&parens));
    assert_eq!(syntax_error_name(&err), Some("SyntaxError"));

    assert_eq!(expect_ok(ctx.eval(&format!("1{}", "+1".repeat(50)))), Value::from(51));
}

#[test]
fn test_deeply_nested_data_terminates() {
    let ctx = context_with(ContextConfig::unlimited());
    let err = expect_err(ctx.eval(
        "var o = {}; for (var i = 0; i < 20000; i++) { o = { a: o }; } JSON.stringify(o)",
    ));
    assert_eq!(err.termination(), Some(TerminationReason::StackOverflow));

    // The context stays usable
    assert_eq!(
        expect_ok(ctx.eval("JSON.stringify({ a: { b: [1] } })")),
        Value::from(r#"{"a":{"b":[1]}}"#)
    );
}

#[test]
fn test_unbounded_call_depth_still_terminates() {
    let ctx = context_with(ContextConfig::unlimited());
    let err = expect_err(ctx.eval("function down(n) { return down(n + 1) } down(0)"));
    assert_eq!(err.termination(), Some(TerminationReason::StackOverflow));
}
