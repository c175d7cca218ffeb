//! Host-facing exceptions
//!
//! An [`Exception`] is what host code sees whenever anything goes wrong on
//! either side of the bridge. It is a shared handle: the same exception
//! travelling host → guest → host comes back as the very same object, which
//! is how identity is preserved across crossings.

use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::TerminationReason;
use crate::frame::{self, Traceback};
use crate::marshal::Value;

/// Where an exception is in its journey across the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationState {
    /// Created, not yet crossed a boundary
    Raised,
    /// Travelling through the other runtime
    Crossing,
    /// Handed to a host caller
    Delivered,
    /// Re-raised by guest code after being caught
    Rethrown,
}

pub enum ExceptionKind {
    /// A host error, mirrored into the guest or not
    Host(Arc<dyn Error + Send + Sync>),
    /// A guest value with no mirrored host type
    Guest(JsException),
    /// Execution was stopped
    Terminated(TerminationReason),
}

struct ExceptionInner {
    kind: ExceptionKind,
    trace: RefCell<Traceback>,
    state: Cell<PropagationState>,
    crossings: Cell<u32>,
}

#[derive(Clone)]
pub struct Exception {
    inner: Rc<ExceptionInner>,
}

impl Exception {
    /// Wrap a host error, capturing the current synthetic frame chain.
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::from_kind(ExceptionKind::Host(Arc::new(error)), frame::capture())
    }

    /// Wrap an already shared host error.
    pub fn from_arc(error: Arc<dyn Error + Send + Sync>) -> Self {
        Self::from_kind(ExceptionKind::Host(error), frame::capture())
    }

    pub(crate) fn from_kind(kind: ExceptionKind, trace: Traceback) -> Self {
        Self {
            inner: Rc::new(ExceptionInner {
                kind,
                trace: RefCell::new(trace),
                state: Cell::new(PropagationState::Raised),
                crossings: Cell::new(0),
            }),
        }
    }

    pub(crate) fn terminated(reason: TerminationReason, trace: Traceback) -> Self {
        Self::from_kind(ExceptionKind::Terminated(reason), trace)
    }

    pub fn kind(&self) -> &ExceptionKind {
        &self.inner.kind
    }

    /// The host error, for host-kind exceptions.
    pub fn host_error(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        match &self.inner.kind {
            ExceptionKind::Host(error) => Some(error.as_ref()),
            _ => None,
        }
    }

    /// Whether this carries a host error of type `E`.
    pub fn is<E: Error + 'static>(&self) -> bool {
        self.host_error().is_some_and(|error| error.is::<E>())
    }

    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.host_error()
            .and_then(|error| error.downcast_ref::<E>())
    }

    pub fn as_js_exception(&self) -> Option<&JsException> {
        match &self.inner.kind {
            ExceptionKind::Guest(exception) => Some(exception),
            _ => None,
        }
    }

    pub fn termination(&self) -> Option<TerminationReason> {
        match &self.inner.kind {
            ExceptionKind::Terminated(reason) => Some(*reason),
            _ => None,
        }
    }

    /// The frame chain captured where the exception was raised.
    pub fn traceback(&self) -> Traceback {
        self.inner.trace.borrow().clone()
    }

    pub fn state(&self) -> PropagationState {
        self.inner.state.get()
    }

    /// Number of boundary crossings so far.
    pub fn crossings(&self) -> u32 {
        self.inner.crossings.get()
    }

    /// Whether both handles refer to the same exception.
    pub fn ptr_eq(&self, other: &Exception) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn as_ptr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn mark_crossing(&self) {
        self.inner.state.set(PropagationState::Crossing);
        self.bump_crossings();
    }

    pub(crate) fn mark_delivered(&self) {
        if self.inner.state.get() != PropagationState::Delivered {
            self.bump_crossings();
        }
        self.inner.state.set(PropagationState::Delivered);
    }

    pub(crate) fn mark_rethrown(&self) {
        self.inner.state.set(PropagationState::Rethrown);
    }

    fn bump_crossings(&self) {
        self.inner
            .crossings
            .set(self.inner.crossings.get().saturating_add(1));
    }
}

impl<E> From<E> for Exception
where
    E: Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Exception::new(error)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            ExceptionKind::Host(error) => write!(f, "{}", error),
            ExceptionKind::Guest(exception) => write!(f, "{}", exception),
            ExceptionKind::Terminated(reason) => write!(f, "execution terminated: {}", reason),
        }
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.inner.kind {
            ExceptionKind::Host(_) => "Host",
            ExceptionKind::Guest(_) => "Guest",
            ExceptionKind::Terminated(_) => "Terminated",
        };
        f.debug_struct("Exception")
            .field("kind", &kind)
            .field("message", &self.to_string())
            .field("state", &self.state())
            .field("frames", &self.inner.trace.borrow().len())
            .finish()
    }
}

/// A guest-thrown value that has no mirrored host type.
pub struct JsException {
    value: Value,
    name: Option<String>,
    message: String,
    context: u64,
}

impl JsException {
    pub(crate) fn new(value: Value, name: Option<String>, message: String, context: u64) -> Self {
        Self {
            value,
            name,
            message,
            context,
        }
    }

    /// The thrown value. Objects are live proxies of the guest original.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The `name` of a thrown Error object.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The `message` of a thrown Error object, or the guest string form of
    /// any other value.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Id of the context the value was thrown in.
    pub fn context_id(&self) -> u64 {
        self.context
    }
}

impl fmt::Display for JsException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) if self.message.is_empty() => write!(f, "{}", name),
            Some(name) => write!(f, "{}: {}", name, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Debug for JsException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsException")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish()
    }
}
