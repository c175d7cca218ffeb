//! Integration tests for the guest engine, organized by feature
//!
//! These tests exercise the interpreter through the public `Context` API.

mod array;
mod basics;
mod console;
mod control_flow;
mod error;
mod function;
mod json;
mod string;

use jsbridge::{Context, ContextConfig, Exception, NoOpConsoleProvider, Value};

/// A context with small limits so runaway tests fail fast.
pub fn create_test_context() -> Context {
    Context::builder()
        .config(
            ContextConfig::default()
                .with_max_operations(100_000)
                .with_max_call_depth(32),
        )
        .console(NoOpConsoleProvider)
        .build()
}

/// Evaluate in a fresh context; fail the test on error.
pub fn eval(source: &str) -> Value {
    match eval_result(source) {
        Ok(value) => value,
        Err(err) => panic!("eval failed for {:?}: {}", source, err),
    }
}

pub fn eval_result(source: &str) -> Result<Value, Exception> {
    create_test_context().eval(source)
}

/// Evaluate expecting a guest error; returns its `name: message` form.
pub fn eval_error(source: &str) -> String {
    match eval_result(source) {
        Ok(value) => panic!("expected an error from {:?}, got {:?}", source, value),
        Err(err) => err.to_string(),
    }
}
