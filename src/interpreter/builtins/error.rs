//! Error constructor built-in methods

use crate::error::JsError;
use crate::frame;
use crate::interpreter::Interpreter;
use crate::value::{CheapClone, ExoticObject, JsObjectRef, JsValue, NativeCall};

/// Builtin error constructors, all sharing one native implementation.
const ERROR_NAMES: [&str; 5] = [
    "Error",
    "TypeError",
    "ReferenceError",
    "RangeError",
    "SyntaxError",
];

/// Initialize Error and all derived error constructors and add them to globals
pub fn init_error(interp: &Interpreter) {
    for name in ERROR_NAMES {
        let proto = interp.realm.error_prototype_for(name).cheap_clone();
        {
            let mut p = proto.borrow_mut();
            p.set_property(interp.intern("name"), JsValue::from(name));
            p.set_property(interp.intern("message"), JsValue::from(""));
        }
        let constructor = interp.create_constructor(name, error_constructor, 1, &proto);
        interp.set_global_value(name, JsValue::Object(constructor));
    }

    let error_proto = interp.realm.error_prototype.cheap_clone();
    interp.register_method(&error_proto, "toString", error_to_string, 0);
}

/// Constructor of `Error`, its builtin subclasses and mirrored host error
/// types. The instance prototype comes from the callee, so one function
/// serves them all.
pub fn error_constructor(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let prototype = match call.callee.borrow().get_property("prototype") {
        Some(JsValue::Object(prototype)) => prototype,
        _ => interp.realm.error_prototype.cheap_clone(),
    };
    let message = match call.arg(0) {
        JsValue::Undefined => None,
        value => Some(interp.to_string(&value)?.to_string()),
    };
    Ok(JsValue::Object(create_error(interp, prototype, message)))
}

/// Allocate an error instance with an own `message` (when given) and a
/// `stack` listing the synthetic frames live at creation.
pub fn create_error(
    interp: &Interpreter,
    prototype: JsObjectRef,
    message: Option<String>,
) -> JsObjectRef {
    let name = prototype
        .borrow()
        .get_property("name")
        .map(|name| name.to_js_string().to_string())
        .unwrap_or_else(|| "Error".to_string());
    let obj = interp.alloc(Some(prototype), ExoticObject::Error { host: None });

    let mut stack = match &message {
        Some(message) if !message.is_empty() => format!("{}: {}", name, message),
        _ => name,
    };
    let trace = frame::capture();
    for frame in trace.frames().iter().rev() {
        stack.push_str(&format!(
            "\n    at {} ({})",
            frame.name().unwrap_or("<anonymous>"),
            frame.module_name()
        ));
    }

    let mut o = obj.borrow_mut();
    if let Some(message) = message {
        o.set_property(interp.intern("message"), JsValue::from(message));
    }
    o.set_property(interp.intern("stack"), JsValue::from(stack));
    drop(o);
    obj
}

/// Error.prototype.toString()
pub fn error_to_string(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let JsValue::Object(obj) = call.this else {
        return Err(JsError::type_error(
            "Error.prototype.toString called on non-object",
        ));
    };
    let (name, message) = {
        let o = obj.borrow();
        (o.get_property("name"), o.get_property("message"))
    };
    let name = match name {
        None | Some(JsValue::Undefined) => "Error".to_string(),
        Some(name) => interp.to_string(&name)?.to_string(),
    };
    let message = match message {
        None | Some(JsValue::Undefined) => String::new(),
        Some(message) => interp.to_string(&message)?.to_string(),
    };
    Ok(JsValue::from(match (name.is_empty(), message.is_empty()) {
        (_, true) => name,
        (true, false) => message,
        (false, false) => format!("{}: {}", name, message),
    }))
}
