//! Built-in objects of the guest global environment

pub mod array;
#[cfg(feature = "console")]
pub mod console;
pub mod error;
pub mod function;
pub mod global;
pub mod json;
pub mod object;
pub mod string;

use crate::interpreter::Interpreter;

/// Populate the global object of a fresh context.
pub(crate) fn install(interp: &Interpreter) {
    object::init_object(interp);
    function::init_function(interp);
    array::init_array(interp);
    string::init_string(interp);
    error::init_error(interp);
    json::init_json(interp);
    #[cfg(feature = "console")]
    console::init_console(interp);
    global::init_global(interp);
}
