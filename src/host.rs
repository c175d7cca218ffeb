//! Host object model
//!
//! The minimal set of host-side shapes the bridge knows how to expose:
//! objects with fields and accessors, callables, classes, and error types
//! that are mirrored as guest constructors.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::error::Error;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::context::Context;
use crate::error::BridgeError;
use crate::exception::Exception;
use crate::marshal::Value;
use crate::prelude::{IndexMap, index_map_new};

/// Key/attribute access shared by host objects, guest proxies and values.
pub trait PropertyBearing {
    fn get(&self, key: &str) -> Result<Value, Exception>;

    fn set(&self, key: &str, value: Value) -> Result<(), Exception>;

    fn has(&self, key: &str) -> Result<bool, Exception>;

    /// Own enumerable keys.
    fn keys(&self) -> Result<Vec<String>, Exception>;
}

/// A host error type that guest code can construct and catch by name.
///
/// Exposing `HostClass::error::<E>()` under a name makes `new Name(msg)` in
/// guest code produce a value that reaches the host as an `E`, built from
/// the guest-side message.
pub trait MirroredError: Error + Send + Sync + Sized + 'static {
    fn from_guest(message: Option<String>) -> Self;
}

// ═══════════════════════════════════════════════════════════════════════════════
// HostObject
// ═══════════════════════════════════════════════════════════════════════════════

pub type Getter = dyn Fn(&HostObject) -> Result<Value, Exception>;
pub type Setter = dyn Fn(&HostObject, Value) -> Result<(), Exception>;

/// A host property: a plain field or a getter/setter pair.
#[derive(Clone)]
pub enum Property {
    Field(Value),
    Accessor {
        get: Option<Rc<Getter>>,
        set: Option<Rc<Setter>>,
    },
}

struct HostObjectInner {
    class_name: String,
    class: RefCell<Option<HostClass>>,
    properties: RefCell<IndexMap<String, Property>>,
    data: Option<Box<dyn Any>>,
}

/// A host object reachable from guest code by reference.
#[derive(Clone)]
pub struct HostObject {
    inner: Rc<HostObjectInner>,
}

impl HostObject {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self::build(class_name.into(), None)
    }

    /// A host object carrying arbitrary host data, reachable again through
    /// [`HostObject::data`].
    pub fn with_data<T: Any>(class_name: impl Into<String>, data: T) -> Self {
        Self::build(class_name.into(), Some(Box::new(data)))
    }

    fn build(class_name: String, data: Option<Box<dyn Any>>) -> Self {
        Self {
            inner: Rc::new(HostObjectInner {
                class_name,
                class: RefCell::new(None),
                properties: RefCell::new(index_map_new()),
                data,
            }),
        }
    }

    /// Builder form of [`HostObject::define_field`].
    pub fn field(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.define_field(name, value);
        self
    }

    /// Builder form of [`HostObject::define_accessor`].
    pub fn accessor<G, S>(self, name: impl Into<String>, get: G, set: Option<S>) -> Self
    where
        G: Fn(&HostObject) -> Result<Value, Exception> + 'static,
        S: Fn(&HostObject, Value) -> Result<(), Exception> + 'static,
    {
        self.define_accessor(name, get, set);
        self
    }

    pub fn define_field(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .properties
            .borrow_mut()
            .insert(name.into(), Property::Field(value.into()));
    }

    pub fn define_accessor<G, S>(&self, name: impl Into<String>, get: G, set: Option<S>)
    where
        G: Fn(&HostObject) -> Result<Value, Exception> + 'static,
        S: Fn(&HostObject, Value) -> Result<(), Exception> + 'static,
    {
        let set = set.map(|set| Rc::new(set) as Rc<Setter>);
        self.inner.properties.borrow_mut().insert(
            name.into(),
            Property::Accessor {
                get: Some(Rc::new(get)),
                set,
            },
        );
    }

    /// A write-only accessor.
    pub fn define_setter<S>(&self, name: impl Into<String>, set: S)
    where
        S: Fn(&HostObject, Value) -> Result<(), Exception> + 'static,
    {
        self.inner.properties.borrow_mut().insert(
            name.into(),
            Property::Accessor {
                get: None,
                set: Some(Rc::new(set)),
            },
        );
    }

    pub fn class_name(&self) -> &str {
        &self.inner.class_name
    }

    /// The class that constructed this object, if any.
    pub fn class(&self) -> Option<HostClass> {
        self.inner.class.borrow().clone()
    }

    pub fn data<T: Any>(&self) -> Option<&T> {
        self.inner.data.as_ref().and_then(|data| data.downcast_ref::<T>())
    }

    pub fn property(&self, name: &str) -> Option<Property> {
        self.inner.properties.borrow().get(name).cloned()
    }

    pub fn ptr_eq(&self, other: &HostObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn as_ptr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    fn stamp_class(&self, class: &HostClass) {
        *self.inner.class.borrow_mut() = Some(class.clone());
    }
}

impl PropertyBearing for HostObject {
    fn get(&self, key: &str) -> Result<Value, Exception> {
        // The getter may touch this object again, so no borrow is held
        // while it runs.
        let property = self.property(key);
        match property {
            Some(Property::Field(value)) => Ok(value),
            Some(Property::Accessor { get: Some(get), .. }) => get(self),
            Some(Property::Accessor { get: None, .. }) | None => Ok(Value::Undefined),
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<(), Exception> {
        let property = self.property(key);
        match property {
            Some(Property::Accessor { set: Some(set), .. }) => set(self, value),
            Some(Property::Accessor { set: None, .. }) => {
                Err(Exception::new(BridgeError::ReadOnly(key.to_string())))
            }
            Some(Property::Field(_)) | None => {
                self.define_field(key, value);
                Ok(())
            }
        }
    }

    fn has(&self, key: &str) -> Result<bool, Exception> {
        Ok(self.inner.properties.borrow().contains_key(key))
    }

    fn keys(&self) -> Result<Vec<String>, Exception> {
        Ok(self.inner.properties.borrow().keys().cloned().collect())
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("class_name", &self.inner.class_name)
            .field("keys", &self.inner.properties.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HostFunction
// ═══════════════════════════════════════════════════════════════════════════════

/// The receiver and calling context of a host callable invocation.
pub struct Invocation {
    pub this: Value,
    /// The context whose guest code made the call; `None` for direct host
    /// calls.
    pub context: Option<Context>,
}

impl Invocation {
    pub fn detached() -> Self {
        Self {
            this: Value::Undefined,
            context: None,
        }
    }
}

type HostCallback = dyn Fn(&Invocation, &[Value]) -> Result<Value, Exception>;

struct HostFunctionInner {
    name: String,
    callback: Box<HostCallback>,
}

/// A host callable.
#[derive(Clone)]
pub struct HostFunction {
    inner: Rc<HostFunctionInner>,
}

impl HostFunction {
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Invocation, &[Value]) -> Result<Value, Exception> + 'static,
    {
        Self {
            inner: Rc::new(HostFunctionInner {
                name: name.into(),
                callback: Box::new(callback),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Call directly from host code.
    pub fn call(&self, args: &[Value]) -> Result<Value, Exception> {
        self.invoke(&Invocation::detached(), args)
    }

    pub fn invoke(&self, invocation: &Invocation, args: &[Value]) -> Result<Value, Exception> {
        (self.inner.callback)(invocation, args)
    }

    pub fn ptr_eq(&self, other: &HostFunction) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn as_ptr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction({})", self.inner.name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HostClass
// ═══════════════════════════════════════════════════════════════════════════════

type HostConstructor = dyn Fn(&Invocation, &[Value]) -> Result<HostObject, Exception>;

enum ClassKind {
    Error {
        type_id: TypeId,
        matches: fn(&(dyn Error + Send + Sync + 'static)) -> bool,
        make: fn(Option<String>) -> Arc<dyn Error + Send + Sync>,
    },
    Object {
        construct: Box<HostConstructor>,
    },
}

struct HostClassInner {
    name: String,
    kind: ClassKind,
}

/// A host type that guest code can construct with `new` and test with
/// `instanceof`.
#[derive(Clone)]
pub struct HostClass {
    inner: Rc<HostClassInner>,
}

fn error_matches<E: MirroredError>(error: &(dyn Error + Send + Sync + 'static)) -> bool {
    error.is::<E>()
}

fn error_make<E: MirroredError>(message: Option<String>) -> Arc<dyn Error + Send + Sync> {
    Arc::new(E::from_guest(message))
}

impl HostClass {
    /// Mirror the error type `E`.
    pub fn error<E: MirroredError>() -> Self {
        let full = std::any::type_name::<E>();
        let name = full.rsplit("::").next().unwrap_or(full).to_string();
        Self {
            inner: Rc::new(HostClassInner {
                name,
                kind: ClassKind::Error {
                    type_id: TypeId::of::<E>(),
                    matches: error_matches::<E>,
                    make: error_make::<E>,
                },
            }),
        }
    }

    /// A class whose instances are host objects built by `construct`.
    pub fn new<F>(name: impl Into<String>, construct: F) -> Self
    where
        F: Fn(&Invocation, &[Value]) -> Result<HostObject, Exception> + 'static,
    {
        Self {
            inner: Rc::new(HostClassInner {
                name: name.into(),
                kind: ClassKind::Object {
                    construct: Box::new(construct),
                },
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_error(&self) -> bool {
        matches!(self.inner.kind, ClassKind::Error { .. })
    }

    /// The mirrored error type, for error classes.
    pub fn type_id(&self) -> Option<TypeId> {
        match &self.inner.kind {
            ClassKind::Error { type_id, .. } => Some(*type_id),
            ClassKind::Object { .. } => None,
        }
    }

    /// Construct an instance from host code or on behalf of guest `new`.
    pub fn construct(&self, invocation: &Invocation, args: &[Value]) -> Result<Value, Exception> {
        match &self.inner.kind {
            ClassKind::Object { construct } => {
                let object = construct(invocation, args)?;
                object.stamp_class(self);
                Ok(Value::Host(object))
            }
            ClassKind::Error { make, .. } => {
                let message = args.first().and_then(Value::as_message);
                Ok(Value::Error(Exception::from_arc(make(message))))
            }
        }
    }

    /// Whether `error` is an instance of the mirrored type.
    pub(crate) fn matches_error(&self, error: &(dyn Error + Send + Sync + 'static)) -> bool {
        match &self.inner.kind {
            ClassKind::Error { matches, .. } => matches(error),
            ClassKind::Object { .. } => false,
        }
    }

    /// Build the host error for a guest value of this class.
    pub(crate) fn make_error(&self, message: Option<String>) -> Option<Arc<dyn Error + Send + Sync>> {
        match &self.inner.kind {
            ClassKind::Error { make, .. } => Some(make(message)),
            ClassKind::Object { .. } => None,
        }
    }

    pub fn ptr_eq(&self, other: &HostClass) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn as_ptr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }
}

impl fmt::Debug for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostClass({})", self.inner.name)
    }
}
