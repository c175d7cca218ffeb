//! String built-in methods
//!
//! Positions are UTF-16 code unit offsets, as guest code observes them.

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::value::{CheapClone, JsString, JsValue, NativeCall};

/// Initialize String.prototype and the String constructor.
pub fn init_string(interp: &Interpreter) {
    let proto = interp.realm.string_prototype.cheap_clone();

    interp.register_method(&proto, "toUpperCase", string_to_upper_case, 0);
    interp.register_method(&proto, "toLowerCase", string_to_lower_case, 0);
    interp.register_method(&proto, "indexOf", string_index_of, 1);
    interp.register_method(&proto, "slice", string_slice, 2);
    interp.register_method(&proto, "toString", string_to_string, 0);

    let constructor = interp.create_constructor("String", string_constructor_fn, 1, &proto);
    interp.set_global_value("String", JsValue::Object(constructor));
}

/// `String(value)`: string conversion. There are no String wrapper objects,
/// so `new String(value)` converts too.
pub fn string_constructor_fn(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    match call.args.first() {
        None => Ok(JsValue::from("")),
        Some(value) => Ok(JsValue::String(interp.to_string(value)?)),
    }
}

fn get_string_value(this: &JsValue) -> Result<JsString, JsError> {
    match this {
        JsValue::String(s) => Ok(s.cheap_clone()),
        JsValue::Undefined | JsValue::Null => Err(JsError::type_error(
            "String.prototype method called on null or undefined",
        )),
        other => Ok(other.to_js_string()),
    }
}

pub fn string_to_string(_interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    get_string_value(call.this).map(JsValue::String)
}

pub fn string_to_upper_case(_interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let s = get_string_value(call.this)?;
    Ok(JsValue::from(s.to_uppercase()))
}

pub fn string_to_lower_case(_interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let s = get_string_value(call.this)?;
    Ok(JsValue::from(s.to_lowercase()))
}

pub fn string_index_of(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let haystack: Vec<u16> = get_string_value(call.this)?.encode_utf16().collect();
    let needle: Vec<u16> = interp.to_string(&call.arg(0))?.encode_utf16().collect();
    let start = relative_index(interp.to_number(&call.arg(1))?, haystack.len(), false);

    if needle.is_empty() {
        return Ok(JsValue::from(start.min(haystack.len())));
    }
    let found = haystack
        .windows(needle.len())
        .enumerate()
        .skip(start)
        .find(|(_, window)| *window == needle.as_slice())
        .map(|(position, _)| position);
    Ok(found.map_or(JsValue::Number(-1.0), JsValue::from))
}

pub fn string_slice(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let units: Vec<u16> = get_string_value(call.this)?.encode_utf16().collect();
    let len = units.len();
    let start = relative_index(interp.to_number(&call.arg(0))?, len, true);
    let end = match call.arg(1) {
        JsValue::Undefined => len,
        value => relative_index(interp.to_number(&value)?, len, true),
    };
    let slice = units.get(start..end.max(start)).unwrap_or(&[]);
    Ok(JsValue::from(String::from_utf16_lossy(slice)))
}

/// Clamp a position argument into `0..=len`. Negative positions count from
/// the end when `from_end` is set.
fn relative_index(n: f64, len: usize, from_end: bool) -> usize {
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        if from_end {
            let back = (-n).min(len as f64) as usize;
            return len - back;
        }
        return 0;
    }
    n.min(len as f64) as usize
}
