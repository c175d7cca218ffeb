//! Contexts: the unit of isolation
//!
//! A [`Context`] owns one guest environment (global object, prototypes,
//! script-level bindings) and the handle table through which guest code
//! reaches host values. Contexts are pinned to the thread that made them;
//! cloning one clones a reference to the same environment.
//!
//! # Example
//!
//! ```
//! use jsbridge::{Context, HostFunction, Value};
//!
//! let ctx = Context::new();
//! ctx.expose(HostFunction::new("double", |_, args| {
//!     let n = args.first().and_then(Value::as_f64).unwrap_or(0.0);
//!     Ok(Value::from(n * 2.0))
//! }))?;
//! assert_eq!(ctx.eval("double(21)")?, Value::from(42));
//! # Ok::<(), jsbridge::Exception>(())
//! ```

use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::ContextConfig;
use crate::error::BridgeError;
use crate::exception::Exception;
use crate::host::HostFunction;
use crate::interpreter::Interpreter;
use crate::marshal::Value;
use crate::platform::{ConsoleProvider, StdConsoleProvider};
use crate::proxy::GuestFunction;
use crate::registry::{self, ScriptSource};
use crate::value::{CheapClone, JsValue};

/// Process-wide context ids; never reused.
static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A guest environment and the bridge into it.
#[derive(Clone)]
pub struct Context {
    interp: Rc<Interpreter>,
}

impl Context {
    /// A context with the default configuration, printing console output
    /// to stdout/stderr.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub(crate) fn from_interpreter(interp: Rc<Interpreter>) -> Self {
        Self { interp }
    }

    /// The engine, unless the context has been closed.
    pub(crate) fn interpreter(&self) -> Result<&Rc<Interpreter>, Exception> {
        if self.interp.is_closed() {
            return Err(Exception::new(BridgeError::ContextDestroyed));
        }
        Ok(&self.interp)
    }

    pub fn id(&self) -> u64 {
        self.interp.id()
    }

    pub fn config(&self) -> &ContextConfig {
        &self.interp.config
    }

    /// Evaluate `source` as a new top-level unit and return the value of
    /// its last expression statement.
    ///
    /// The source text is registered with the script registry so that
    /// tracebacks can show it.
    pub fn eval(&self, source: &str) -> Result<Value, Exception> {
        self.interpreter()?.eval(source)
    }

    /// Expose `value` to guest code as the global `name`.
    ///
    /// Exposing an error class (`HostClass::error::<E>()`) installs a guest
    /// constructor whose instances reach the host as `E`, and makes `E`
    /// errors raised by host code enter this context as its instances.
    pub fn set_global(&self, name: &str, value: impl Into<Value>) -> Result<(), Exception> {
        let interp = self.interpreter()?;
        let value = match value.into() {
            Value::Class(class) if class.is_error() => {
                JsValue::Object(interp.register_mirror(name, class))
            }
            other => interp.to_guest(other),
        };
        interp.set_global_value(name, value);
        Ok(())
    }

    /// Read a global: a property of the global object, or else a
    /// script-level `let`/`const` binding. Unknown names read as
    /// `undefined`.
    pub fn get_global(&self, name: &str) -> Result<Value, Exception> {
        let interp = self.interpreter()?;
        let global = interp.realm.global.cheap_clone();
        if global.borrow().has_own_property(name) {
            let key = interp.intern(name);
            return interp
                .get_property(&JsValue::Object(global), &key, None)
                .map(|value| interp.to_host(&value))
                .map_err(|e| interp.deliver(e));
        }
        Ok(interp
            .script_env
            .lookup(name)
            .map_or(Value::Undefined, |value| interp.to_host(&value)))
    }

    /// Expose a host callable under its own name.
    pub fn expose(&self, function: HostFunction) -> Result<(), Exception> {
        let name = function.name().to_string();
        self.set_global(&name, function)
    }

    /// Call a guest function with an explicit receiver.
    pub fn call(
        &self,
        function: &GuestFunction,
        this: Value,
        args: &[Value],
    ) -> Result<Value, Exception> {
        self.interpreter()?;
        function.call_with_this(this, args)
    }

    /// Names of the global object's own properties followed by script-level
    /// bindings.
    pub fn global_names(&self) -> Result<Vec<String>, Exception> {
        let interp = self.interpreter()?;
        let mut names: Vec<String> = interp
            .realm
            .global
            .borrow()
            .own_keys()
            .iter()
            .map(|key| key.to_string())
            .collect();
        for name in interp.script_env.names() {
            if !names.iter().any(|existing| existing == name.as_str()) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Names under which host error types are mirrored, oldest first.
    pub fn mirrored_names(&self) -> Result<Vec<String>, Exception> {
        Ok(self.interpreter()?.mirror_names())
    }

    /// Sources registered by this context that are still alive.
    pub fn scripts(&self) -> Vec<Arc<ScriptSource>> {
        registry::scripts_for(self.id())
    }

    /// A handle that stops this context from any thread.
    pub fn termination_handle(&self) -> TerminationHandle {
        TerminationHandle {
            flag: self.interp.interrupt.clone(),
        }
    }

    /// Tear the environment down now. Every proxy and handle of this
    /// context fails with [`BridgeError::ContextDestroyed`] afterwards.
    pub fn close(&self) {
        self.interp.teardown();
    }

    pub fn is_closed(&self) -> bool {
        self.interp.is_closed()
    }

    pub fn downgrade(&self) -> WeakContext {
        WeakContext {
            interp: Rc::downgrade(&self.interp),
        }
    }

    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.interp, &other.interp)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A context reference that does not keep the environment alive.
#[derive(Clone)]
pub struct WeakContext {
    interp: Weak<Interpreter>,
}

impl WeakContext {
    /// The context, if it is still alive and open.
    pub fn upgrade(&self) -> Option<Context> {
        self.interp
            .upgrade()
            .filter(|interp| !interp.is_closed())
            .map(Context::from_interpreter)
    }
}

impl fmt::Debug for WeakContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakContext(alive: {})", self.upgrade().is_some())
    }
}

/// Builder for [`Context`].
#[derive(Default)]
pub struct ContextBuilder {
    config: ContextConfig,
    console: Option<Box<dyn ConsoleProvider>>,
}

impl ContextBuilder {
    pub fn config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }

    /// Where guest `console` output goes.
    pub fn console(mut self, console: impl ConsoleProvider + 'static) -> Self {
        self.console = Some(Box::new(console));
        self
    }

    pub fn build(self) -> Context {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let console = self
            .console
            .unwrap_or_else(|| Box::new(StdConsoleProvider::new()));
        let interp = Interpreter::new(id, self.config, console, Arc::new(AtomicBool::new(false)));
        Context::from_interpreter(interp)
    }
}

/// Stops a context from another thread.
///
/// The call in flight fails with
/// [`TerminationReason::Interrupted`](crate::TerminationReason::Interrupted),
/// and so does every later call into the context.
#[derive(Debug, Clone)]
pub struct TerminationHandle {
    flag: Arc<AtomicBool>,
}

impl TerminationHandle {
    pub fn terminate(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_terminated(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
