//! Array built-in methods

use crate::error::JsError;
use crate::frame::Side;
use crate::interpreter::{Interpreter, array_length};
use crate::value::{CheapClone, ExoticObject, JsObjectRef, JsString, JsValue, NativeCall};

/// Initialize Array.prototype and the Array constructor.
pub fn init_array(interp: &Interpreter) {
    let proto = interp.realm.array_prototype.cheap_clone();

    // Mutating methods
    interp.register_method(&proto, "push", array_push, 1);
    interp.register_method(&proto, "pop", array_pop, 0);

    // Accessor methods
    interp.register_method(&proto, "join", array_join, 1);
    interp.register_method(&proto, "toString", array_to_string, 0);
    interp.register_method(&proto, "indexOf", array_index_of, 1);

    // Iteration methods
    interp.register_method(&proto, "forEach", array_foreach, 1);
    interp.register_method(&proto, "map", array_map, 1);

    let constructor = interp.create_constructor("Array", array_constructor_fn, 1, &proto);
    interp.register_method(&constructor, "isArray", array_is_array, 1);
    interp.set_global_value("Array", JsValue::Object(constructor));
}

/// `Array(n)` / `Array(a, b, ...)`
pub fn array_constructor_fn(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    if let [JsValue::Number(n)] = call.args {
        let elements = vec![JsValue::Undefined; array_length(*n, 0)?];
        return Ok(JsValue::Object(interp.create_array(elements)));
    }
    Ok(JsValue::Object(interp.create_array(call.args.to_vec())))
}

pub fn array_is_array(_interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let is_array = match call.arg(0) {
        JsValue::Object(obj) => obj.borrow().is_array(),
        _ => false,
    };
    Ok(JsValue::Boolean(is_array))
}

/// The receiver as an array, or a TypeError naming `method`.
fn this_array(call: &NativeCall<'_>, method: &str) -> Result<JsObjectRef, JsError> {
    match call.this {
        JsValue::Object(obj) if obj.borrow().is_array() => Ok(obj.cheap_clone()),
        _ => Err(JsError::type_error(format!(
            "Array.prototype.{} called on non-array",
            method
        ))),
    }
}

/// Element `index`, read fresh each time: callbacks may mutate the array.
fn element_at(arr: &JsObjectRef, index: usize) -> Option<JsValue> {
    match &arr.borrow().exotic {
        ExoticObject::Array(elements) => elements.get(index).cloned(),
        _ => None,
    }
}

fn callback_arg(call: &NativeCall<'_>, method: &str) -> Result<JsValue, JsError> {
    let callback = call.arg(0);
    if !callback.is_callable() {
        return Err(JsError::type_error(format!(
            "Array.prototype.{} callback is not a function",
            method
        )));
    }
    Ok(callback)
}

pub fn array_push(_interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let arr = this_array(call, "push")?;
    let mut obj = arr.borrow_mut();
    let ExoticObject::Array(elements) = &mut obj.exotic else {
        return Err(JsError::type_error("Not an array"));
    };
    elements.extend(call.args.iter().cloned());
    Ok(JsValue::from(elements.len()))
}

pub fn array_pop(_interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let arr = this_array(call, "pop")?;
    let mut obj = arr.borrow_mut();
    let ExoticObject::Array(elements) = &mut obj.exotic else {
        return Err(JsError::type_error("Not an array"));
    };
    Ok(elements.pop().unwrap_or(JsValue::Undefined))
}

pub fn array_map(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let arr = this_array(call, "map")?;
    let callback = callback_arg(call, "map")?;
    let this_arg = call.arg(1);

    let mut result = Vec::new();
    let mut index = 0;
    while let Some(elem) = element_at(&arr, index) {
        let mapped = interp.call_function(
            &callback,
            this_arg.clone(),
            &[elem, JsValue::from(index), call.this.clone()],
            None,
            Side::Guest,
        )?;
        result.push(mapped);
        index += 1;
    }
    Ok(JsValue::Object(interp.create_array(result)))
}

pub fn array_foreach(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let arr = this_array(call, "forEach")?;
    let callback = callback_arg(call, "forEach")?;
    let this_arg = call.arg(1);

    let mut index = 0;
    while let Some(elem) = element_at(&arr, index) {
        interp.call_function(
            &callback,
            this_arg.clone(),
            &[elem, JsValue::from(index), call.this.clone()],
            None,
            Side::Guest,
        )?;
        index += 1;
    }
    Ok(JsValue::Undefined)
}

pub fn array_index_of(_interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let arr = this_array(call, "indexOf")?;
    let search = call.arg(0);
    let obj = arr.borrow();
    let ExoticObject::Array(elements) = &obj.exotic else {
        return Ok(JsValue::Number(-1.0));
    };
    let position = elements.iter().position(|elem| elem.strict_equals(&search));
    Ok(position.map_or(JsValue::Number(-1.0), JsValue::from))
}

pub fn array_join(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let arr = this_array(call, "join")?;
    let separator = match call.arg(0) {
        JsValue::Undefined => JsString::from(","),
        other => interp.to_string(&other)?,
    };

    let mut parts = Vec::new();
    let mut index = 0;
    while let Some(elem) = element_at(&arr, index) {
        let part = match elem {
            JsValue::Undefined | JsValue::Null => String::new(),
            _ => interp.to_string(&elem)?.to_string(),
        };
        parts.push(part);
        index += 1;
    }
    Ok(JsValue::from(parts.join(separator.as_str())))
}

/// Array.prototype.toString()
/// Returns a string of comma-separated elements (equivalent to join()).
pub fn array_to_string(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    array_join(
        interp,
        &NativeCall {
            this: call.this,
            args: &[],
            callee: call.callee,
            constructing: false,
        },
    )
}
