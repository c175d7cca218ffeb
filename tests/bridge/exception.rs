//! Exception identity, mirrored error types and propagation state

use super::{
    OtherError, TestError, create_test_context, expect_err, expect_ok, test_error_context,
};
use jsbridge::{
    Exception, ExceptionKind, HostClass, HostFunction, PropagationState, PropertyBearing, Value,
};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_unmirrored_guest_error_is_opaque() {
    let ctx = create_test_context();
    let err = expect_err(ctx.eval("throw new RangeError('too far')"));
    assert!(!err.is::<TestError>());
    let Some(js) = err.as_js_exception() else {
        panic!("expected a guest exception, got {:?}", err);
    };
    assert_eq!(js.name(), Some("RangeError"));
    assert_eq!(js.message(), "too far");
    assert_eq!(js.context_id(), ctx.id());
    assert_eq!(err.to_string(), "RangeError: too far");
    assert_eq!(err.state(), PropagationState::Delivered);
}

#[test]
fn test_guest_constructed_mirror_reaches_host_as_host_type() {
    let ctx = test_error_context();
    let err = expect_err(ctx.eval("throw new TestError('bad input')"));
    assert!(err.is::<TestError>());
    assert_eq!(
        err.downcast_ref::<TestError>().map(|e| e.0.as_str()),
        Some("bad input")
    );
    assert!(matches!(err.kind(), ExceptionKind::Host(_)));
}

#[test]
fn test_mirror_without_message() {
    let ctx = test_error_context();
    let err = expect_err(ctx.eval("throw new TestError()"));
    assert_eq!(err.downcast_ref::<TestError>().map(|e| e.0.as_str()), Some(""));
}

#[test]
fn test_host_error_keeps_identity_across_round_trip() {
    let ctx = create_test_context();
    let raised: Rc<RefCell<Option<Exception>>> = Rc::new(RefCell::new(None));
    let slot = raised.clone();
    expect_ok(ctx.expose(HostFunction::new("fail", move |_, _| {
        let exception = Exception::new(TestError("kept".to_string()));
        *slot.borrow_mut() = Some(exception.clone());
        Err(exception)
    })));

    let err = expect_err(ctx.eval("fail()"));
    let original = raised.borrow().clone();
    assert!(original.is_some_and(|original| original.ptr_eq(&err)));
    assert!(err.is::<TestError>());
}

#[test]
fn test_host_error_caught_as_mirror_instance() {
    let ctx = test_error_context();
    let caught = expect_ok(ctx.eval(
        "try { throw_exception() } catch (exc) { this.exc = exc; exc instanceof TestError }",
    ));
    assert_eq!(caught, Value::Bool(true));

    let Value::Error(exc) = expect_ok(ctx.get_global("exc")) else {
        panic!("expected the caught error to come back as an exception");
    };
    assert!(exc.is::<TestError>());
    assert_eq!(exc.to_string(), "from host");
}

#[test]
fn test_mirror_instance_properties() {
    let ctx = test_error_context();
    let result = expect_ok(ctx.eval(
        "try { throw_exception() } catch (e) { [e.name, e.message, e instanceof Error].join('|') }",
    ));
    assert_eq!(result, Value::from("TestError|from host|true"));
}

#[test]
fn test_same_error_object_for_repeated_entry() {
    let ctx = test_error_context();
    expect_ok(ctx.eval("var first; try { throw_exception() } catch (e) { first = e }"));
    let Value::Error(exception) = expect_ok(ctx.get_global("first")) else {
        panic!("expected an exception");
    };
    expect_ok(ctx.set_global("again", exception));
    assert_eq!(expect_ok(ctx.eval("again === first")), Value::Bool(true));
}

#[test]
fn test_rethrow_preserves_identity_and_traceback() {
    let ctx = test_error_context();
    let err = expect_err(ctx.eval("try { throw_exception() } catch (e) { throw e }"));
    assert!(err.is::<TestError>());
    assert_eq!(err.state(), PropagationState::Delivered);
    assert_eq!(err.crossings(), 2);

    let trace = err.traceback();
    let innermost = trace.innermost().map(|frame| frame.name());
    assert_eq!(innermost, Some(Some("throw_exception")));
}

#[test]
fn test_uncaught_host_error_crossings() {
    let ctx = test_error_context();
    let err = expect_err(ctx.eval("throw_exception()"));
    assert_eq!(err.state(), PropagationState::Delivered);
    assert_eq!(err.crossings(), 2);
}

#[test]
fn test_thrown_object_payload() {
    let ctx = create_test_context();
    let err = expect_err(ctx.eval("throw { foo: 'bar' }"));
    let Some(js) = err.as_js_exception() else {
        panic!("expected a guest exception");
    };
    assert_eq!(js.name(), None);
    assert_eq!(expect_ok(js.value().get("foo")), Value::from("bar"));
}

#[test]
fn test_thrown_scalar_payload() {
    let ctx = create_test_context();
    let err = expect_err(ctx.eval("throw 'plain'"));
    let js = err.as_js_exception();
    assert_eq!(js.map(|js| js.value().clone()), Some(Value::from("plain")));
    assert_eq!(err.to_string(), "plain");
}

#[test]
fn test_unmirrored_host_error_is_plain_error_in_guest() {
    let ctx = create_test_context();
    expect_ok(ctx.expose(HostFunction::new("other", |_, _| Err(OtherError.into()))));
    let result = expect_ok(ctx.eval(
        "try { other() } catch (e) { (e instanceof Error) + ' ' + e.name + ' ' + e.message }",
    ));
    assert_eq!(result, Value::from("true Error other failure"));

    let err = expect_err(ctx.eval("other()"));
    assert!(err.is::<OtherError>());
}

#[test]
fn test_latest_mirror_wins() {
    let ctx = create_test_context();
    expect_ok(ctx.set_global("OldName", HostClass::error::<TestError>()));
    expect_ok(ctx.set_global("NewName", HostClass::error::<TestError>()));
    expect_ok(ctx.expose(super::throw_exception()));

    let name = expect_ok(ctx.eval("try { throw_exception() } catch (e) { e.name }"));
    assert_eq!(name, Value::from("NewName"));

    let err = expect_err(ctx.eval("throw new OldName('legacy')"));
    assert!(err.is::<TestError>());
}

#[test]
fn test_error_class_passed_as_value_is_mirrored_on_demand() {
    let ctx = create_test_context();
    expect_ok(ctx.expose(HostFunction::new("error_class", |_, _| {
        Ok(Value::from(HostClass::error::<TestError>()))
    })));
    let err = expect_err(ctx.eval("const E = error_class(); throw new E('dynamic')"));
    assert_eq!(
        err.downcast_ref::<TestError>().map(|e| e.0.as_str()),
        Some("dynamic")
    );
}

#[test]
fn test_host_constructs_mirrored_error_value() {
    let ctx = test_error_context();
    let Value::Class(class) = expect_ok(ctx.get_global("TestError")) else {
        panic!("expected the mirrored class");
    };
    let Value::Error(exception) = expect_ok(class.construct(
        &jsbridge::Invocation::detached(),
        &[Value::from("built on host")],
    )) else {
        panic!("expected an error value");
    };
    assert!(exception.is::<TestError>());
    expect_ok(ctx.set_global("built", exception));
    assert_eq!(
        expect_ok(ctx.eval("built instanceof TestError && built.message")),
        Value::from("built on host")
    );
}
