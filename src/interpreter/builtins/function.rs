//! Function.prototype built-in methods (call, apply, toString)

use crate::error::JsError;
use crate::frame::Side;
use crate::interpreter::Interpreter;
use crate::value::{CheapClone, ExoticObject, JsFunction, JsValue, NativeCall};

/// Initialize Function.prototype.
pub fn init_function(interp: &Interpreter) {
    let proto = interp.realm.function_prototype.cheap_clone();

    interp.register_method(&proto, "call", function_call, 1);
    interp.register_method(&proto, "apply", function_apply, 2);
    interp.register_method(&proto, "toString", function_to_string, 0);
}

/// Function.prototype.call(thisArg, ...args)
pub fn function_call(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let this = call.arg(0);
    let args = call.args.get(1..).unwrap_or(&[]);
    interp.call_function(call.this, this, args, None, Side::Guest)
}

/// Function.prototype.apply(thisArg, argsArray)
pub fn function_apply(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let this = call.arg(0);
    let args = match call.arg(1) {
        JsValue::Undefined | JsValue::Null => Vec::new(),
        JsValue::Object(obj) => match &obj.borrow().exotic {
            ExoticObject::Array(elements) => elements.clone(),
            _ => Vec::new(),
        },
        _ => {
            return Err(JsError::type_error(
                "CreateListFromArrayLike called on non-object",
            ));
        }
    };
    interp.call_function(call.this, this, &args, None, Side::Guest)
}

/// Function.prototype.toString(): the literal source of guest functions.
pub fn function_to_string(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let JsValue::Object(obj) = call.this else {
        return Err(JsError::type_error(
            "Function.prototype.toString requires that 'this' be a Function",
        ));
    };
    let text = match &obj.borrow().exotic {
        ExoticObject::Function(JsFunction::Interpreted(function)) => {
            function.source_text().to_string()
        }
        ExoticObject::Function(JsFunction::Native(native)) => {
            format!("function {}() {{ [native code] }}", native.name)
        }
        ExoticObject::Foreign { callable: true, .. } => interp.display_string(call.this),
        _ => {
            return Err(JsError::type_error(
                "Function.prototype.toString requires that 'this' be a Function",
            ));
        }
    };
    Ok(JsValue::from(text))
}
