//! Embedded JavaScript engine with a transparent host/guest bridge
//!
//! Host values, callables and error types are exposed to guest code; guest
//! objects and functions come back as live proxies. Errors keep their
//! identity in both directions and carry a traceback of the synthetic
//! frames pushed at every crossing.
//!
//! # Example
//!
//! ```
//! use jsbridge::{Context, HostClass, HostFunction, MirroredError, Value};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("quota exceeded")]
//! struct QuotaError;
//!
//! impl MirroredError for QuotaError {
//!     fn from_guest(_message: Option<String>) -> Self {
//!         QuotaError
//!     }
//! }
//!
//! let ctx = Context::new();
//! ctx.set_global("QuotaError", HostClass::error::<QuotaError>())?;
//! ctx.expose(HostFunction::new("spend", |_, _| Err(QuotaError.into())))?;
//!
//! let caught = ctx.eval("try { spend(); false } catch (e) { e instanceof QuotaError }")?;
//! assert_eq!(caught, Value::Bool(true));
//!
//! let err = ctx.eval("spend()").err();
//! assert!(err.is_some_and(|e| e.is::<QuotaError>()));
//! # Ok::<(), jsbridge::Exception>(())
//! ```

pub mod ast;
pub mod bridge;
pub mod config;
pub mod context;
pub mod error;
pub mod exception;
pub mod frame;
pub mod handles;
pub mod host;
pub mod interpreter;
pub mod lexer;
pub mod marshal;
pub mod parser;
pub mod platform;
pub mod prelude;
pub mod proxy;
pub mod registry;
pub mod string_dict;
pub mod value;

pub use config::ContextConfig;
pub use context::{Context, ContextBuilder, TerminationHandle, WeakContext};
pub use error::{BridgeError, JsError, TerminationReason};
pub use exception::{Exception, ExceptionKind, JsException, PropagationState};
pub use frame::{FrameKind, Side, SyntheticFrame, Traceback};
pub use host::{
    HostClass, HostFunction, HostObject, Invocation, MirroredError, Property, PropertyBearing,
};
pub use marshal::Value;
pub use platform::{
    BufferedConsoleProvider, ConsoleLevel, ConsoleProvider, NoOpConsoleProvider,
    StdConsoleProvider,
};
pub use proxy::{GuestFunction, GuestObject};
pub use registry::{ScriptId, ScriptSource};
