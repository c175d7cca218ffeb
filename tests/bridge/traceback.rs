//! Synthetic frames recorded at every crossing

use super::{expect_err, expect_ok, test_error_context};
use jsbridge::{FrameKind, HostFunction, Side, Value, registry};

fn summary(err: &jsbridge::Exception) -> Vec<(FrameKind, Side, String)> {
    let trace = err.traceback();
    trace
        .frames()
        .iter()
        .map(|frame| (frame.kind(), frame.origin(), frame.source().to_string()))
        .collect()
}

#[test]
fn test_direct_host_call_frames() {
    let ctx = test_error_context();
    let err = expect_err(ctx.eval("throw_exception()"));
    assert_eq!(
        summary(&err),
        vec![
            (FrameKind::Script, Side::Host, "throw_exception()".to_string()),
            (FrameKind::Call, Side::Guest, "throw_exception()".to_string()),
        ]
    );
}

#[test]
fn test_guest_function_frame_is_recorded() {
    let ctx = test_error_context();
    expect_ok(ctx.eval("function f() { throw_exception(); }"));
    let err = expect_err(ctx.eval("f()"));
    assert_eq!(
        summary(&err),
        vec![
            (FrameKind::Script, Side::Host, "f()".to_string()),
            (
                FrameKind::Function,
                Side::Guest,
                "function f() { throw_exception(); }".to_string()
            ),
            (FrameKind::Call, Side::Guest, "throw_exception()".to_string()),
        ]
    );
    let trace = err.traceback();
    let names: Vec<Option<&str>> = trace.frames().iter().map(|frame| frame.name()).collect();
    assert_eq!(names, vec![None, Some("f"), Some("throw_exception")]);
}

#[test]
fn test_frames_resolve_through_registry() {
    let ctx = test_error_context();
    expect_ok(ctx.eval("function g() {\n  return throw_exception();\n}"));
    let err = expect_err(ctx.eval("g()"));
    let trace = err.traceback();
    for frame in trace.frames() {
        let source = registry::lookup(frame.location());
        assert_eq!(source.as_ref().map(|s| s.text()), Some(frame.source()));
        assert_eq!(registry::get_source(frame.location()).as_deref(), Some(frame.source()));
        assert!(
            frame
                .module_name()
                .starts_with(&format!("javascript:{}:", ctx.id()))
        );
    }
    let function_frame = trace.frames().into_iter().find(|f| f.kind() == FrameKind::Function);
    assert!(function_frame.is_some_and(|frame| frame.module_name().ends_with(":g")));
}

#[test]
fn test_host_called_guest_function_frame() {
    let ctx = test_error_context();
    expect_ok(ctx.eval("function f() { throw_exception() }"));
    let Value::Function(f) = expect_ok(ctx.get_global("f")) else {
        panic!("expected a guest function");
    };
    let err = expect_err(f.call(&[]));
    assert!(err.is::<super::TestError>());

    let trace = err.traceback();
    let frames = trace.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames.first().map(|f| (f.kind(), f.origin())), Some((FrameKind::Function, Side::Host)));
    assert_eq!(frames.last().map(|f| (f.kind(), f.origin())), Some((FrameKind::Call, Side::Guest)));
}

#[test]
fn test_reentrant_eval_accumulates_frames() {
    let ctx = test_error_context();
    expect_ok(ctx.expose(HostFunction::new("nested", |invocation, _| {
        let Some(ctx) = &invocation.context else {
            return Ok(Value::Undefined);
        };
        ctx.eval("throw_exception()")
    })));

    let err = expect_err(ctx.eval("nested()"));
    assert!(err.is::<super::TestError>());
    assert_eq!(
        summary(&err),
        vec![
            (FrameKind::Script, Side::Host, "nested()".to_string()),
            (FrameKind::Call, Side::Guest, "nested()".to_string()),
            (FrameKind::Script, Side::Host, "throw_exception()".to_string()),
            (FrameKind::Call, Side::Guest, "throw_exception()".to_string()),
        ]
    );
}

#[test]
fn test_guest_error_traceback() {
    let ctx = test_error_context();
    expect_ok(ctx.eval("function fail() { throw new Error('inner') }"));
    let err = expect_err(ctx.eval("fail()"));
    let trace = err.traceback();
    let innermost = trace.innermost();
    assert_eq!(innermost.map(|f| f.kind()), Some(FrameKind::Function));
    assert_eq!(innermost.and_then(|f| f.name()), Some("fail"));
}

#[test]
fn test_traceback_display() {
    let ctx = test_error_context();
    let err = expect_err(ctx.eval("throw_exception()"));
    let text = err.traceback().to_string();
    assert!(text.starts_with("Traceback (most recent call last):"));
    assert!(text.contains("in <script> [host]"));
    assert!(text.contains("in throw_exception [guest]"));
    assert!(text.ends_with("\n    throw_exception()"));
}

#[test]
fn test_multiline_source_is_elided() {
    let ctx = test_error_context();
    let err = expect_err(ctx.eval("let a = 1;\nthrow_exception()"));
    let text = err.traceback().to_string();
    assert!(text.contains("\n    let a = 1; ..."));
}

#[test]
fn test_no_frames_left_after_call() {
    let ctx = test_error_context();
    let _ = ctx.eval("throw_exception()");
    assert_eq!(jsbridge::frame::depth(), 0);
}
