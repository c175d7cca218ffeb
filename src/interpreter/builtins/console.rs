//! Console built-in methods
//!
//! Output is routed through the context's
//! [`ConsoleProvider`](crate::platform::ConsoleProvider), never straight to
//! stdout.

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::platform::ConsoleLevel;
use crate::value::{ExoticObject, JsValue, NativeCall};

/// Initialize the console object and add it to globals
pub fn init_console(interp: &Interpreter) {
    let console = interp.create_object();

    interp.register_method(&console, "log", console_log, 0);
    interp.register_method(&console, "info", console_info, 0);
    interp.register_method(&console, "debug", console_debug, 0);
    interp.register_method(&console, "warn", console_warn, 0);
    interp.register_method(&console, "error", console_error, 0);
    interp.register_method(&console, "clear", console_clear, 0);

    interp.set_global_value("console", JsValue::Object(console));
}

fn write(interp: &Interpreter, level: ConsoleLevel, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(format_value(interp, arg)?);
    }
    interp.console.write(level, &parts.join(" "));
    Ok(JsValue::Undefined)
}

/// Strings print raw, errors as `name: message`, plain objects and arrays
/// as JSON.
fn format_value(interp: &Interpreter, value: &JsValue) -> Result<String, JsError> {
    let JsValue::Object(obj) = value else {
        return Ok(value.to_js_string().to_string());
    };
    let plain = {
        let o = obj.borrow();
        !o.is_callable() && !matches!(o.exotic, ExoticObject::Error { .. })
    };
    if plain && let Ok(json) = interp.guest_to_json(value) {
        return Ok(json.to_string());
    }
    Ok(interp.to_string(value)?.to_string())
}

pub fn console_log(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    write(interp, ConsoleLevel::Log, call.args)
}

pub fn console_info(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    write(interp, ConsoleLevel::Info, call.args)
}

pub fn console_debug(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    write(interp, ConsoleLevel::Debug, call.args)
}

pub fn console_warn(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    write(interp, ConsoleLevel::Warn, call.args)
}

pub fn console_error(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    write(interp, ConsoleLevel::Error, call.args)
}

pub fn console_clear(interp: &Interpreter, _call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    interp.console.clear();
    Ok(JsValue::Undefined)
}
