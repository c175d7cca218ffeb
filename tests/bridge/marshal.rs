//! Value conversion between host and guest

use std::cell::Cell;
use std::rc::Rc;

use super::{create_test_context, expect_err, expect_ok};
use jsbridge::{BridgeError, HostClass, HostFunction, HostObject, PropertyBearing, Value};

fn echo() -> HostFunction {
    HostFunction::new("echo", |_, args| Ok(args.first().cloned().unwrap_or_default()))
}

#[test]
fn test_scalars_round_trip() {
    let ctx = create_test_context();
    expect_ok(ctx.expose(echo()));
    assert_eq!(expect_ok(ctx.eval("echo(1.5)")), Value::from(1.5));
    assert_eq!(expect_ok(ctx.eval("echo('s')")), Value::from("s"));
    assert_eq!(expect_ok(ctx.eval("echo(false)")), Value::Bool(false));
    assert_eq!(expect_ok(ctx.eval("echo(null)")), Value::Null);
    assert_eq!(expect_ok(ctx.eval("echo()")), Value::Undefined);
    assert_eq!(expect_ok(ctx.eval("typeof echo")), Value::from("function"));
}

#[test]
fn test_guest_values_survive_host_round_trip() {
    let ctx = create_test_context();
    expect_ok(ctx.expose(echo()));
    assert_eq!(
        expect_ok(ctx.eval("const o = {}; echo(o) === o")),
        Value::Bool(true)
    );
    assert_eq!(
        expect_ok(ctx.eval("const f = () => 1; echo(f) === f && echo(f)()")),
        Value::from(1)
    );
}

#[test]
fn test_host_calls_guest_callback() {
    let ctx = create_test_context();
    expect_ok(ctx.expose(HostFunction::new("twice", |_, args| {
        let Some(callback) = args.first().and_then(Value::as_function) else {
            return Err(BridgeError::NotCallable("callback".to_string()).into());
        };
        let once = callback.call(&[args.get(1).cloned().unwrap_or_default()])?;
        callback.call(&[once])
    })));
    assert_eq!(expect_ok(ctx.eval("twice(x => x * 3, 2)")), Value::from(18));

    let err = expect_err(ctx.eval("twice(1, 2)"));
    assert_eq!(
        err.downcast_ref::<BridgeError>(),
        Some(&BridgeError::NotCallable("callback".to_string()))
    );
}

#[test]
fn test_guest_error_inside_callback_reaches_guest_catch() {
    let ctx = create_test_context();
    expect_ok(ctx.expose(HostFunction::new("run", |_, args| {
        match args.first().and_then(Value::as_function) {
            Some(callback) => callback.call(&[]),
            None => Ok(Value::Undefined),
        }
    })));
    let result = expect_ok(ctx.eval(
        "const boom = new Error('inner'); try { run(() => { throw boom }) } catch (e) { e === boom }",
    ));
    assert_eq!(result, Value::Bool(true));
}

#[test]
fn test_host_class_construct_and_instanceof() {
    let ctx = create_test_context();
    let point = HostClass::new("Point", |_, args| {
        let x = args.first().and_then(Value::as_f64).unwrap_or(0.0);
        let y = args.get(1).and_then(Value::as_f64).unwrap_or(0.0);
        Ok(HostObject::new("Point").field("x", x).field("y", y))
    });
    expect_ok(ctx.set_global("Point", point.clone()));

    assert_eq!(
        expect_ok(ctx.eval("const p = new Point(1, 2); p.x + p.y")),
        Value::from(3)
    );
    assert_eq!(expect_ok(ctx.eval("p instanceof Point")), Value::Bool(true));
    assert_eq!(expect_ok(ctx.eval("({}) instanceof Point")), Value::Bool(false));
    assert_eq!(expect_ok(ctx.eval("Point.name")), Value::from("Point"));

    let Value::Host(p) = expect_ok(ctx.get_global("p")) else {
        panic!("expected a host object");
    };
    assert!(p.class().is_some_and(|class| class.ptr_eq(&point)));
    assert_eq!(expect_ok(p.get("y")), Value::from(2));
}

#[test]
fn test_invocation_receiver() {
    let ctx = create_test_context();
    expect_ok(ctx.expose(HostFunction::new("whoami", |invocation, _| {
        invocation.this.get("name")
    })));
    assert_eq!(
        expect_ok(ctx.eval("const box = { name: 'box', who: whoami }; box.who()")),
        Value::from("box")
    );
}

#[test]
fn test_invocation_context_allows_reentry() {
    let ctx = create_test_context();
    expect_ok(ctx.expose(HostFunction::new("peek", |invocation, args| {
        let Some(ctx) = &invocation.context else {
            return Ok(Value::Undefined);
        };
        let name = args.first().and_then(Value::as_str).unwrap_or("undefined");
        ctx.eval(name)
    })));
    assert_eq!(
        expect_ok(ctx.eval("let secret = 41; peek('secret') + 1")),
        Value::from(42)
    );
}

#[test]
fn test_direct_host_call_has_no_context() {
    let function = HostFunction::new("has_context", |invocation, _| {
        Ok(Value::Bool(invocation.context.is_some()))
    });
    assert_eq!(expect_ok(function.call(&[])), Value::Bool(false));

    let ctx = create_test_context();
    expect_ok(ctx.expose(function));
    assert_eq!(expect_ok(ctx.eval("has_context()")), Value::Bool(true));
}

#[test]
fn test_json_interop() {
    let ctx = create_test_context();
    let json = serde_json::json!({ "name": "svc", "ports": [80, 443], "tls": true });
    let value = expect_ok(Value::from_json(&ctx, &json));
    expect_ok(ctx.set_global("settings", value.clone()));
    assert_eq!(
        expect_ok(ctx.eval("settings.ports[1] + (settings.tls ? 1 : 0)")),
        Value::from(444)
    );
    assert_eq!(expect_ok(value.to_json()), json);

    let host = HostObject::new("Host").field("a", 1).field("b", "two");
    assert_eq!(
        expect_ok(Value::Host(host).to_json()),
        serde_json::json!({ "a": 1, "b": "two" })
    );
}

#[test]
fn test_value_conversions() {
    let ctx = create_test_context();
    let value = expect_ok(ctx.eval("'text'"));
    assert_eq!(value.type_name(), "string");
    assert_eq!(String::try_from(value), Ok("text".to_string()));
    assert!(f64::try_from(expect_ok(ctx.eval("'x'"))).is_err());
    assert_eq!(bool::try_from(expect_ok(ctx.eval("1 < 2"))), Ok(true));
}

#[test]
fn test_error_value_as_global() {
    let ctx = create_test_context();
    let exception = jsbridge::Exception::new(super::OtherError);
    expect_ok(ctx.set_global("failure", exception.clone()));
    assert_eq!(
        expect_ok(ctx.eval("failure instanceof Error && failure.message")),
        Value::from("other failure")
    );
    let Value::Error(back) = expect_ok(ctx.get_global("failure")) else {
        panic!("expected an exception");
    };
    assert!(back.ptr_eq(&exception));
}

struct Tracker(Rc<Cell<usize>>);

impl Drop for Tracker {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn test_unreachable_host_values_are_released() {
    let ctx = create_test_context();
    let dropped = Rc::new(Cell::new(0));
    let counter = dropped.clone();
    expect_ok(ctx.expose(HostFunction::new("make", move |_, _| {
        Ok(Value::from(HostObject::with_data("Tracked", Tracker(counter.clone()))))
    })));
    expect_ok(ctx.expose(echo()));

    expect_ok(ctx.eval("var keep = make(); for (var i = 0; i < 1000; i++) make();"));
    expect_ok(ctx.eval("for (var j = 0; j < 5000; j++) { var o = {}; }"));

    assert!(dropped.get() > 0);
    assert!(dropped.get() <= 1000);
    assert_eq!(expect_ok(ctx.eval("echo(keep) === keep")), Value::Bool(true));
}
