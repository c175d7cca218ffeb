//! Property access across the boundary in both directions

use super::{TestError, create_test_context, expect_err, expect_ok};
use jsbridge::{BridgeError, Exception, FrameKind, HostObject, PropertyBearing, Value};
use std::cell::Cell;
use std::rc::Rc;

type NoSetter = fn(&HostObject, Value) -> Result<(), Exception>;

fn account() -> HostObject {
    HostObject::new("Account")
        .field("owner", "ada")
        .field("balance", 10)
        .accessor(
            "broken",
            |_| Err(TestError("getter failed".to_string()).into()),
            None::<NoSetter>,
        )
        .accessor(
            "locked",
            |_| Ok(Value::Bool(true)),
            Some(|_: &HostObject, _: Value| -> Result<(), Exception> {
                Err(TestError("setter failed".to_string()).into())
            }),
        )
        .accessor("frozen", |_| Ok(Value::from(1)), None::<NoSetter>)
}

#[test]
fn test_guest_reads_and_writes_host_fields() {
    let ctx = create_test_context();
    let object = account();
    expect_ok(ctx.set_global("acct", object.clone()));
    assert_eq!(expect_ok(ctx.eval("acct.owner + ':' + acct.balance")), Value::from("ada:10"));

    expect_ok(ctx.eval("acct.balance = acct.balance + 5; acct.note = 'new'"));
    assert_eq!(expect_ok(object.get("balance")), Value::from(15));
    assert_eq!(expect_ok(object.get("note")), Value::from("new"));
    assert_eq!(expect_ok(ctx.eval("acct.missing")), Value::Undefined);
}

#[test]
fn test_accessor_sees_host_state() {
    let ctx = create_test_context();
    let hits = Rc::new(Cell::new(0));
    let counter = hits.clone();
    let object = HostObject::new("Counter").accessor(
        "next",
        move |_| {
            counter.set(counter.get() + 1);
            Ok(Value::from(counter.get()))
        },
        None::<NoSetter>,
    );
    expect_ok(ctx.set_global("counter", object));
    assert_eq!(expect_ok(ctx.eval("counter.next + counter.next")), Value::from(3));
    assert_eq!(hits.get(), 2);
}

#[test]
fn test_getter_error_records_get_frame() {
    let ctx = create_test_context();
    expect_ok(ctx.set_global("obj", account()));
    let err = expect_err(ctx.eval("obj.broken"));
    assert!(err.is::<TestError>());

    let trace = err.traceback();
    let innermost = trace.innermost();
    assert_eq!(innermost.map(|f| f.kind()), Some(FrameKind::Get));
    assert_eq!(innermost.and_then(|f| f.name()), Some("broken"));
    assert_eq!(innermost.map(|f| f.source()), Some("obj.broken"));
}

#[test]
fn test_getter_error_is_catchable() {
    let ctx = create_test_context();
    expect_ok(ctx.set_global("obj", account()));
    assert_eq!(
        expect_ok(ctx.eval("try { obj.broken } catch (e) { e.message }")),
        Value::from("getter failed")
    );
}

#[test]
fn test_setter_error_records_set_frame() {
    let ctx = create_test_context();
    expect_ok(ctx.set_global("obj", account()));
    let err = expect_err(ctx.eval("obj.locked = false"));
    assert!(err.is::<TestError>());
    assert_eq!(err.to_string(), "setter failed");

    let trace = err.traceback();
    let innermost = trace.innermost();
    assert_eq!(innermost.map(|f| f.kind()), Some(FrameKind::Set));
    assert_eq!(innermost.and_then(|f| f.name()), Some("locked"));
}

#[test]
fn test_read_only_property() {
    let ctx = create_test_context();
    expect_ok(ctx.set_global("obj", account()));
    let err = expect_err(ctx.eval("obj.frozen = 2"));
    assert_eq!(
        err.downcast_ref::<BridgeError>(),
        Some(&BridgeError::ReadOnly("frozen".to_string()))
    );
    assert_eq!(expect_ok(ctx.eval("obj.frozen")), Value::from(1));
}

#[test]
fn test_host_object_keys_and_membership() {
    let ctx = create_test_context();
    expect_ok(ctx.set_global("obj", HostObject::new("Pair").field("a", 1).field("b", 2)));
    assert_eq!(expect_ok(ctx.eval("Object.keys(obj).join(',')")), Value::from("a,b"));
    assert_eq!(expect_ok(ctx.eval("'a' in obj")), Value::Bool(true));
    assert_eq!(expect_ok(ctx.eval("'z' in obj")), Value::Bool(false));
}

#[test]
fn test_host_object_data() {
    let object = HostObject::with_data("Blob", vec![1u8, 2, 3]);
    assert_eq!(object.data::<Vec<u8>>().map(Vec::len), Some(3));
    assert!(object.data::<String>().is_none());
    assert_eq!(object.class_name(), "Blob");
}

#[test]
fn test_host_wrapper_identity() {
    let ctx = create_test_context();
    let object = HostObject::new("Thing");
    expect_ok(ctx.set_global("first", object.clone()));
    expect_ok(ctx.set_global("second", object.clone()));
    assert_eq!(expect_ok(ctx.eval("first === second")), Value::Bool(true));
    assert_eq!(expect_ok(ctx.get_global("first")), Value::Host(object));
    assert_eq!(expect_ok(ctx.eval("typeof first")), Value::from("object"));
}

#[test]
fn test_guest_object_proxy_is_live() {
    let ctx = create_test_context();
    let Value::Object(config) = expect_ok(ctx.eval("var config = { retries: 1 }; config")) else {
        panic!("expected a guest object");
    };
    expect_ok(config.set("retries", Value::from(3)));
    expect_ok(config.set("name", Value::from("svc")));
    assert_eq!(expect_ok(ctx.eval("config.retries")), Value::from(3));
    assert_eq!(expect_ok(ctx.eval("config.name")), Value::from("svc"));

    expect_ok(ctx.eval("config.retries = 7"));
    assert_eq!(expect_ok(config.get("retries")), Value::from(7));
    assert!(expect_ok(config.has("name")));
    assert!(expect_ok(config.has("toString")));
    assert_eq!(expect_ok(config.keys()), vec!["retries".to_string(), "name".to_string()]);
}

#[test]
fn test_guest_object_identity() {
    let ctx = create_test_context();
    expect_ok(ctx.eval("var shared = {}; var alias = shared"));
    let a = expect_ok(ctx.get_global("shared"));
    let b = expect_ok(ctx.get_global("alias"));
    assert_eq!(a, b);
    let c = expect_ok(ctx.eval("({})"));
    assert_ne!(a, c);
}

#[test]
fn test_guest_object_round_trips_to_original() {
    let ctx = create_test_context();
    let object = expect_ok(ctx.eval("var original = { tag: 1 }; original"));
    expect_ok(ctx.set_global("back", object));
    assert_eq!(expect_ok(ctx.eval("back === original")), Value::Bool(true));
}

#[test]
fn test_call_method() {
    let ctx = create_test_context();
    let Value::Object(box_) =
        expect_ok(ctx.eval("({ n: 2, times(k) { return this.n * k } })"))
    else {
        panic!("expected a guest object");
    };
    assert_eq!(expect_ok(box_.call_method("times", &[Value::from(3)])), Value::from(6));

    let err = box_.call_method("n", &[]).err();
    assert_eq!(
        err.as_ref().and_then(|e| e.downcast_ref::<BridgeError>()),
        Some(&BridgeError::NotCallable("n".to_string()))
    );
}

#[test]
fn test_array_proxy() {
    let ctx = create_test_context();
    let Value::Object(list) = expect_ok(ctx.eval("[1, 'two', [3]]")) else {
        panic!("expected a guest array");
    };
    assert!(list.is_array());
    assert_eq!(expect_ok(list.len()), 3);
    assert_eq!(expect_ok(list.get_index(1)), Value::from("two"));
    assert_eq!(expect_ok(list.get("length")), Value::from(3));
    assert_eq!(expect_ok(list.to_json()), serde_json::json!([1, "two", [3]]));

    expect_ok(list.call_method("push", &[Value::from(4)]));
    assert_eq!(expect_ok(list.len()), 4);
}

#[test]
fn test_host_error_through_guest_method() {
    let ctx = create_test_context();
    expect_ok(ctx.set_global("obj", account()));
    let Value::Object(wrapper) = expect_ok(ctx.eval("({ inner() { return obj.broken } })"))
    else {
        panic!("expected a guest object");
    };
    let err = wrapper.call_method("inner", &[]).err();
    assert!(err.is_some_and(|e| e.is::<TestError>()));
}
