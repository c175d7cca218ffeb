//! Integration tests for the host/guest bridge, organized by component

mod context;
mod exception;
mod marshal;
mod property;
mod registry;
mod termination;
mod traceback;

use jsbridge::{
    Context, ContextConfig, Exception, HostClass, HostFunction, MirroredError,
    NoOpConsoleProvider, Value,
};

/// The host error type used throughout the bridge tests.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TestError(pub String);

impl MirroredError for TestError {
    fn from_guest(message: Option<String>) -> Self {
        TestError(message.unwrap_or_default())
    }
}

/// A second, unrelated host error type.
#[derive(Debug, thiserror::Error)]
#[error("other failure")]
pub struct OtherError;

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

/// A host callable that always fails with `TestError("from host")`.
pub fn throw_exception() -> HostFunction {
    HostFunction::new("throw_exception", |_, _| {
        Err(TestError("from host".to_string()).into())
    })
}

/// A context with `TestError` mirrored and `throw_exception` exposed.
pub fn test_error_context() -> Context {
    let ctx = create_test_context();
    expect_ok(ctx.set_global("TestError", HostClass::error::<TestError>()));
    expect_ok(ctx.expose(throw_exception()));
    ctx
}

pub fn expect_ok<T>(result: Result<T, Exception>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("unexpected error: {}\n{}", err, err.traceback()),
    }
}

pub fn expect_err(result: Result<Value, Exception>) -> Exception {
    match result {
        Ok(value) => panic!("expected an error, got {:?}", value),
        Err(err) => err,
    }
}
