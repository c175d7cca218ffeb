//! Source registration as seen through contexts

use super::{create_test_context, expect_err, expect_ok, test_error_context};
use jsbridge::registry;

#[test]
fn test_eval_text_is_registered() {
    let ctx = create_test_context();
    expect_ok(ctx.eval("40 + 2"));
    let scripts = ctx.scripts();
    let script = scripts.iter().find(|script| script.text() == "40 + 2");
    let Some(script) = script else {
        panic!("eval text not registered: {:?}", scripts.iter().map(|s| s.text()).collect::<Vec<_>>());
    };
    assert_eq!(script.context(), ctx.id());
    assert!(script.name().starts_with(&format!("javascript:{}:", ctx.id())));
    assert_eq!(registry::get_source(script.id()).as_deref(), Some("40 + 2"));
}

#[test]
fn test_scripts_are_per_context() {
    let a = create_test_context();
    let b = create_test_context();
    expect_ok(a.eval("'only in a'"));
    assert!(b.scripts().iter().all(|script| script.text() != "'only in a'"));
}

#[test]
fn test_function_sources_are_named() {
    let ctx = create_test_context();
    expect_ok(ctx.eval("function named() { return 1 } named()"));
    let scripts = ctx.scripts();
    assert!(
        scripts
            .iter()
            .any(|script| script.name().ends_with(":named") && script.text() == "function named() { return 1 }")
    );
}

#[test]
fn test_close_releases_sources() {
    let ctx = create_test_context();
    expect_ok(ctx.eval("1 + 1"));
    let id = ctx.id();
    ctx.close();
    assert!(registry::scripts_for(id).is_empty());
}

#[test]
fn test_exception_keeps_its_sources_alive() {
    let err = {
        let ctx = test_error_context();
        expect_err(ctx.eval("throw_exception()"))
    };
    let trace = err.traceback();
    let frames = trace.frames();
    assert_eq!(frames.len(), 2);
    for frame in frames {
        assert_eq!(registry::get_source(frame.location()).as_deref(), Some("throw_exception()"));
    }
}
