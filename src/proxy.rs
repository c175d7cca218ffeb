//! Host-side proxies of guest objects
//!
//! A proxy holds a generation-checked handle into its context's handle
//! table and a weak reference to the context. Every operation goes to the
//! live guest object; nothing is cached on the host side. Once the context
//! is gone every operation fails with [`BridgeError::ContextDestroyed`].

use std::fmt;
use std::rc::{Rc, Weak};

use crate::context::Context;
use crate::error::BridgeError;
use crate::exception::Exception;
use crate::handles::HandleId;
use crate::host::PropertyBearing;
use crate::interpreter::Interpreter;
use crate::marshal::Value;
use crate::value::{ExoticObject, JsObjectRef, JsString, JsValue};

/// Keeps one guest object reachable from the host.
pub(crate) struct GuestHandle {
    context: Weak<Interpreter>,
    context_id: u64,
    id: HandleId,
    key: usize,
}

impl GuestHandle {
    pub(crate) fn new(context: Weak<Interpreter>, context_id: u64, id: HandleId, key: usize) -> Self {
        Self {
            context,
            context_id,
            id,
            key,
        }
    }

    pub(crate) fn id(&self) -> HandleId {
        self.id
    }

    pub(crate) fn key(&self) -> usize {
        self.key
    }

    pub(crate) fn context_id(&self) -> u64 {
        self.context_id
    }

    fn resolve(&self) -> Result<(Rc<Interpreter>, JsObjectRef), Exception> {
        let interp = self
            .context
            .upgrade()
            .filter(|interp| !interp.is_closed())
            .ok_or_else(|| Exception::new(BridgeError::ContextDestroyed))?;
        let obj = interp
            .resolve_guest(self)
            .ok_or_else(|| Exception::new(BridgeError::InvalidHandle))?;
        Ok((interp, obj))
    }
}

impl Drop for GuestHandle {
    fn drop(&mut self) {
        if let Some(interp) = self.context.upgrade() {
            interp.release_guest_handle(self);
        }
    }
}

/// A guest object or array.
#[derive(Clone)]
pub struct GuestObject {
    handle: Rc<GuestHandle>,
}

impl GuestObject {
    pub(crate) fn new(handle: Rc<GuestHandle>) -> Self {
        Self { handle }
    }

    pub(crate) fn handle(&self) -> &Rc<GuestHandle> {
        &self.handle
    }

    /// Id of the owning context.
    pub fn context_id(&self) -> u64 {
        self.handle.context_id
    }

    /// The owning context, while it is alive.
    pub fn context(&self) -> Option<Context> {
        self.handle
            .context
            .upgrade()
            .filter(|interp| !interp.is_closed())
            .map(Context::from_interpreter)
    }

    pub fn is_array(&self) -> bool {
        self.handle
            .resolve()
            .is_ok_and(|(_, obj)| obj.borrow().is_array())
    }

    /// Array length, or the number of own keys of a plain object.
    pub fn len(&self) -> Result<usize, Exception> {
        let (_, obj) = self.handle.resolve()?;
        let o = obj.borrow();
        Ok(match &o.exotic {
            ExoticObject::Array(elements) => elements.len(),
            _ => o.properties.len(),
        })
    }

    pub fn is_empty(&self) -> Result<bool, Exception> {
        self.len().map(|len| len == 0)
    }

    pub fn get_index(&self, index: usize) -> Result<Value, Exception> {
        self.get(&index.to_string())
    }

    /// Call the method `name` with this object as receiver.
    pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, Exception> {
        let (interp, obj) = self.handle.resolve()?;
        let this = JsValue::Object(obj);
        let method = interp
            .get_property(&this, &JsString::from(name), None)
            .map_err(|e| interp.deliver(e))?;
        let JsValue::Object(function) = method else {
            return Err(Exception::new(BridgeError::NotCallable(name.to_string())));
        };
        if !function.borrow().is_callable() {
            return Err(Exception::new(BridgeError::NotCallable(name.to_string())));
        }
        interp.call_from_host(&function, interp.to_host(&this), args)
    }

    /// Snapshot the object as JSON, the way `JSON.stringify` sees it.
    pub fn to_json(&self) -> Result<serde_json::Value, Exception> {
        let (interp, obj) = self.handle.resolve()?;
        interp
            .guest_to_json(&JsValue::Object(obj))
            .map_err(|e| interp.deliver(e))
    }

    pub fn ptr_eq(&self, other: &GuestObject) -> bool {
        Rc::ptr_eq(&self.handle, &other.handle)
    }
}

impl PropertyBearing for GuestObject {
    fn get(&self, key: &str) -> Result<Value, Exception> {
        let (interp, obj) = self.handle.resolve()?;
        interp
            .get_property(&JsValue::Object(obj), &JsString::from(key), None)
            .map(|value| interp.to_host(&value))
            .map_err(|e| interp.deliver(e))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), Exception> {
        let (interp, obj) = self.handle.resolve()?;
        let value = interp.to_guest(value);
        interp
            .set_property(&JsValue::Object(obj), JsString::from(key), value, None)
            .map_err(|e| interp.deliver(e))
    }

    fn has(&self, key: &str) -> Result<bool, Exception> {
        let (interp, obj) = self.handle.resolve()?;
        interp
            .has_property(&obj, &JsString::from(key))
            .map_err(|e| interp.deliver(e))
    }

    fn keys(&self) -> Result<Vec<String>, Exception> {
        let (interp, obj) = self.handle.resolve()?;
        interp
            .own_keys(&obj)
            .map(|keys| keys.iter().map(|key| key.to_string()).collect())
            .map_err(|e| interp.deliver(e))
    }
}

impl fmt::Debug for GuestObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GuestObject(context {})", self.handle.context_id)
    }
}

/// A guest function.
#[derive(Clone)]
pub struct GuestFunction {
    handle: Rc<GuestHandle>,
}

impl GuestFunction {
    pub(crate) fn new(handle: Rc<GuestHandle>) -> Self {
        Self { handle }
    }

    pub(crate) fn handle(&self) -> &Rc<GuestHandle> {
        &self.handle
    }

    pub fn context_id(&self) -> u64 {
        self.handle.context_id
    }

    /// Call with `undefined` as receiver.
    pub fn call(&self, args: &[Value]) -> Result<Value, Exception> {
        self.call_with_this(Value::Undefined, args)
    }

    pub fn call_with_this(&self, this: Value, args: &[Value]) -> Result<Value, Exception> {
        let (interp, function) = self.handle.resolve()?;
        interp.call_from_host(&function, this, args)
    }

    /// The function's `name`, if it has one.
    pub fn name(&self) -> Option<String> {
        let (_, function) = self.handle.resolve().ok()?;
        let f = function.borrow();
        match &f.exotic {
            ExoticObject::Function(func) => func.name().map(str::to_string),
            _ => None,
        }
    }

    /// Property access on the function object itself.
    pub fn as_object(&self) -> GuestObject {
        GuestObject::new(self.handle.clone())
    }

    pub fn ptr_eq(&self, other: &GuestFunction) -> bool {
        Rc::ptr_eq(&self.handle, &other.handle)
    }
}

impl fmt::Debug for GuestFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "GuestFunction({})", name),
            None => write!(f, "GuestFunction(<anonymous>)"),
        }
    }
}
