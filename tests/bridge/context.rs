//! Context lifecycle, globals and isolation

use super::{create_test_context, expect_err, expect_ok, test_error_context};
use jsbridge::{
    BridgeError, Context, ContextConfig, HostClass, HostFunction, PropertyBearing, Value,
};

#[test]
fn test_set_and_get_scalars() {
    let ctx = create_test_context();
    expect_ok(ctx.set_global("n", 2.5));
    expect_ok(ctx.set_global("s", "text"));
    expect_ok(ctx.set_global("flag", true));
    expect_ok(ctx.set_global("nothing", None::<i32>));
    assert_eq!(expect_ok(ctx.eval("n * 2")), Value::from(5));
    assert_eq!(expect_ok(ctx.eval("s.toUpperCase()")), Value::from("TEXT"));
    assert_eq!(expect_ok(ctx.eval("flag && nothing === null")), Value::Bool(true));
    assert_eq!(expect_ok(ctx.get_global("s")), Value::from("text"));
}

#[test]
fn test_unknown_global_is_undefined() {
    let ctx = create_test_context();
    assert_eq!(expect_ok(ctx.get_global("nope")), Value::Undefined);
}

#[test]
fn test_get_global_reads_script_bindings() {
    let ctx = create_test_context();
    expect_ok(ctx.eval("const limit = 3; let name = 'x'"));
    assert_eq!(expect_ok(ctx.get_global("limit")), Value::from(3));
    assert_eq!(expect_ok(ctx.get_global("name")), Value::from("x"));
}

#[test]
fn test_expose_uses_function_name() {
    let ctx = create_test_context();
    expect_ok(ctx.expose(HostFunction::new("greet", |_, args| {
        let who = args.first().and_then(Value::as_str).unwrap_or("nobody");
        Ok(Value::from(format!("hello {}", who)))
    })));
    assert_eq!(expect_ok(ctx.eval("greet('guest')")), Value::from("hello guest"));
    assert!(expect_ok(ctx.global_names()).contains(&"greet".to_string()));
}

#[test]
fn test_global_names_include_script_bindings() {
    let ctx = create_test_context();
    expect_ok(ctx.eval("let scoped = 1; var plain = 2"));
    let names = expect_ok(ctx.global_names());
    assert!(names.contains(&"scoped".to_string()));
    assert!(names.contains(&"plain".to_string()));
    assert!(names.contains(&"JSON".to_string()));
}

#[test]
fn test_mirrored_names() {
    let ctx = test_error_context();
    assert_eq!(expect_ok(ctx.mirrored_names()), vec!["TestError".to_string()]);
}

#[test]
fn test_contexts_are_isolated() {
    let a = create_test_context();
    let b = create_test_context();
    expect_ok(a.eval("var x = 'a'; globalThis.y = 1"));
    assert_eq!(expect_ok(b.get_global("x")), Value::Undefined);
    assert_eq!(expect_ok(b.eval("typeof y")), Value::from("undefined"));
    expect_ok(b.eval("Array.prototype.extra = 1"));
    assert_eq!(expect_ok(a.eval("[].extra")), Value::Undefined);
}

#[test]
fn test_call_with_receiver() {
    let ctx = create_test_context();
    expect_ok(ctx.eval("function describe(suffix) { return this.name + suffix }"));
    let Value::Function(describe) = expect_ok(ctx.get_global("describe")) else {
        panic!("expected a guest function");
    };
    let receiver = expect_ok(ctx.eval("({ name: 'box' })"));
    assert_eq!(
        expect_ok(ctx.call(&describe, receiver, &[Value::from("!")])),
        Value::from("box!")
    );
}

#[test]
fn test_config_is_kept() {
    let config = ContextConfig::default().with_max_call_depth(5);
    let ctx = Context::with_config(config.clone());
    assert_eq!(ctx.config(), &config);
}

#[test]
fn test_closed_context_rejects_everything() {
    let ctx = create_test_context();
    let object = expect_ok(ctx.eval("({ a: 1 })"));
    ctx.close();
    assert!(ctx.is_closed());

    let err = expect_err(ctx.eval("1"));
    assert_eq!(err.downcast_ref::<BridgeError>(), Some(&BridgeError::ContextDestroyed));
    let err = ctx.set_global("x", 1).err();
    assert!(err.is_some_and(|e| e.is::<BridgeError>()));

    let err = object.get("a").err();
    assert_eq!(
        err.as_ref().and_then(|e| e.downcast_ref::<BridgeError>()),
        Some(&BridgeError::ContextDestroyed)
    );
}

#[test]
fn test_proxies_fail_after_context_dropped() {
    let object = {
        let ctx = create_test_context();
        expect_ok(ctx.eval("({ a: 1 })"))
    };
    let err = object.get("a").err();
    assert_eq!(
        err.as_ref().and_then(|e| e.downcast_ref::<BridgeError>()),
        Some(&BridgeError::ContextDestroyed)
    );
}

#[test]
fn test_close_is_idempotent() {
    let ctx = create_test_context();
    ctx.close();
    ctx.close();
    assert!(ctx.downgrade().upgrade().is_none());
}

#[test]
fn test_proxy_reports_owning_context() {
    let ctx = create_test_context();
    let Value::Object(object) = expect_ok(ctx.eval("({})")) else {
        panic!("expected a guest object");
    };
    assert_eq!(object.context_id(), ctx.id());
    assert!(object.context().is_some_and(|owner| owner.ptr_eq(&ctx)));
}

#[test]
fn test_guest_object_passed_between_contexts() {
    let a = create_test_context();
    let b = create_test_context();
    let object = expect_ok(a.eval("var source = { n: 1 }; source"));
    expect_ok(b.set_global("remote", object));
    assert_eq!(expect_ok(b.eval("remote.n")), Value::from(1));

    expect_ok(b.eval("remote.n = 5"));
    assert_eq!(expect_ok(a.eval("source.n")), Value::from(5));
}

#[test]
fn test_guest_function_called_from_other_context() {
    let a = create_test_context();
    let b = create_test_context();
    let add = expect_ok(a.eval("(x, y) => x + y"));
    expect_ok(b.set_global("add", add));
    assert_eq!(expect_ok(b.eval("add(2, 3)")), Value::from(5));
    assert_eq!(expect_ok(b.eval("typeof add")), Value::from("function"));
}

#[test]
fn test_guest_exception_crosses_contexts_as_payload() {
    let a = create_test_context();
    let b = create_test_context();
    let err = expect_err(a.eval("throw { foo: 'bar' }"));
    let Some(original) = err.as_js_exception().map(|js| js.value().clone()) else {
        panic!("expected a guest exception");
    };

    expect_ok(b.set_global("err", err));
    assert_eq!(expect_ok(b.eval("err.foo")), Value::from("bar"));

    let rethrown = expect_err(b.eval("throw err"));
    let payload = rethrown.as_js_exception().map(|js| js.value().clone());
    assert_eq!(payload, Some(original));
}

#[test]
fn test_shared_callable_rethrows_payload_in_every_context() {
    let ctx1 = create_test_context();
    let ctx2 = create_test_context();
    let origin = ctx1.downgrade();
    let call_context = HostFunction::new("call_context", move |_, _| match origin.upgrade() {
        Some(ctx) => ctx.eval(r#"throw { foo: "bar" }"#),
        None => Ok(Value::Undefined),
    });
    expect_ok(ctx1.expose(call_context.clone()));
    expect_ok(ctx2.expose(call_context));

    for ctx in [&ctx1, &ctx2] {
        let err = expect_err(ctx.eval("call_context()"));
        let Some(js) = err.as_js_exception() else {
            panic!("expected a guest exception, got {}", err);
        };
        assert_eq!(js.value().get("foo").ok(), Some(Value::from("bar")));
    }
    assert!(!ctx1.is_closed());
    assert!(!ctx2.is_closed());
}

#[test]
fn test_mirrors_are_per_context() {
    let a = test_error_context();
    let b = create_test_context();
    expect_ok(b.expose(super::throw_exception()));
    assert_eq!(
        expect_ok(b.eval("try { throw_exception() } catch (e) { e.name }")),
        Value::from("Error")
    );
    assert_eq!(
        expect_ok(a.eval("try { throw_exception() } catch (e) { e.name }")),
        Value::from("TestError")
    );
    assert_eq!(expect_ok(b.eval("typeof TestError")), Value::from("undefined"));
}

#[test]
fn test_same_error_type_under_different_names() {
    let a = create_test_context();
    let b = create_test_context();
    expect_ok(a.set_global("Alpha", HostClass::error::<super::TestError>()));
    expect_ok(b.set_global("Beta", HostClass::error::<super::TestError>()));
    expect_ok(a.expose(super::throw_exception()));
    expect_ok(b.expose(super::throw_exception()));

    let check = "try { throw_exception() } catch (e) { e instanceof %s && e.name === '%s' }";
    assert_eq!(
        expect_ok(a.eval(&check.replace("%s", "Alpha"))),
        Value::Bool(true)
    );
    assert_eq!(
        expect_ok(b.eval(&check.replace("%s", "Beta"))),
        Value::Bool(true)
    );
    assert_eq!(expect_ok(b.eval("typeof Alpha")), Value::from("undefined"));

    let from_a = expect_err(a.eval("throw new Alpha('a')"));
    let from_b = expect_err(b.eval("throw new Beta('b')"));
    assert!(from_a.is::<super::TestError>() && from_b.is::<super::TestError>());
}
