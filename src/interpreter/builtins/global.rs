//! Global value properties and functions (globalThis, NaN, isNaN, ...)

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::value::{CheapClone, JsValue, NativeCall};

/// Register the global value properties and functions
pub fn init_global(interp: &Interpreter) {
    let global = interp.realm.global.cheap_clone();

    interp.set_global_value("globalThis", JsValue::Object(global.cheap_clone()));
    interp.set_global_value("undefined", JsValue::Undefined);
    interp.set_global_value("NaN", JsValue::Number(f64::NAN));
    interp.set_global_value("Infinity", JsValue::Number(f64::INFINITY));

    interp.register_method(&global, "isNaN", global_is_nan, 1);
    interp.register_method(&global, "isFinite", global_is_finite, 1);
}

// Global isNaN - converts argument to number first
pub fn global_is_nan(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let n = interp.to_number(&call.arg(0))?;
    Ok(JsValue::Boolean(n.is_nan()))
}

// Global isFinite - converts argument to number first
pub fn global_is_finite(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let n = interp.to_number(&call.arg(0))?;
    Ok(JsValue::Boolean(n.is_finite()))
}
