//! Object built-in methods

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::value::{CheapClone, ExoticObject, JsValue, NativeCall};

/// Initialize Object.prototype and the Object constructor.
pub fn init_object(interp: &Interpreter) {
    let proto = interp.realm.object_prototype.cheap_clone();

    interp.register_method(&proto, "hasOwnProperty", object_has_own_property, 1);
    interp.register_method(&proto, "toString", object_to_string, 0);
    interp.register_method(&proto, "valueOf", object_value_of, 0);

    let constructor = interp.create_constructor("Object", object_constructor, 1, &proto);
    interp.register_method(&constructor, "keys", object_keys, 1);
    interp.set_global_value("Object", JsValue::Object(constructor));
}

/// `Object(value)` and `new Object(value)`
pub fn object_constructor(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    match call.arg(0) {
        value @ JsValue::Object(_) => Ok(value),
        _ => Ok(JsValue::Object(interp.create_object())),
    }
}

pub fn object_keys(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let keys = match call.arg(0) {
        JsValue::Object(obj) => interp.own_keys(&obj)?,
        JsValue::String(s) => (0..s.utf16_len())
            .map(|i| interp.intern(&i.to_string()))
            .collect(),
        JsValue::Undefined | JsValue::Null => {
            return Err(JsError::type_error(
                "Cannot convert undefined or null to object",
            ));
        }
        _ => Vec::new(),
    };
    let keys = keys.into_iter().map(JsValue::String).collect();
    Ok(JsValue::Object(interp.create_array(keys)))
}

pub fn object_has_own_property(
    interp: &Interpreter,
    call: &NativeCall<'_>,
) -> Result<JsValue, JsError> {
    let key = interp.to_property_key(&call.arg(0))?;
    let JsValue::Object(obj) = call.this else {
        return Ok(JsValue::Boolean(false));
    };
    if matches!(obj.borrow().exotic, ExoticObject::Foreign { .. }) {
        return interp.has_property(obj, &key).map(JsValue::Boolean);
    }
    Ok(JsValue::Boolean(obj.borrow().has_own_property(&key)))
}

pub fn object_to_string(_interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let tag = match call.this {
        JsValue::Undefined => "Undefined",
        JsValue::Null => "Null",
        JsValue::Object(obj) => match &obj.borrow().exotic {
            ExoticObject::Array(_) => "Array",
            ExoticObject::Function(_) => "Function",
            ExoticObject::Error { .. } => "Error",
            _ => "Object",
        },
        JsValue::Boolean(_) => "Boolean",
        JsValue::Number(_) => "Number",
        JsValue::String(_) => "String",
    };
    Ok(JsValue::from(format!("[object {}]", tag)))
}

pub fn object_value_of(_interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    Ok(call.this.clone())
}
