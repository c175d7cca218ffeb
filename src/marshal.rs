//! Value marshalling between host and guest
//!
//! [`Value`] is the host-side view of anything that crosses the boundary.
//! Scalars are copied; guest objects become [`GuestObject`]/[`GuestFunction`]
//! proxies that forward every access to the live guest object; host objects,
//! callables and classes are referenced from the guest through wrapper
//! objects that point at a slot of the context's handle table.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::BridgeError;
use crate::exception::{Exception, ExceptionKind};
use crate::handles::{HandleEntry, HandleId};
use crate::host::{HostClass, HostFunction, HostObject, PropertyBearing};
use crate::interpreter::Interpreter;
use crate::proxy::{GuestFunction, GuestHandle, GuestObject};
use crate::value::{
    CheapClone, ExoticObject, JsObject, JsObjectRef, JsString, JsValue, number_to_string,
};

/// A value as seen from the host side of the bridge.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// A guest object or array owned by a context
    Object(GuestObject),
    /// A guest function owned by a context
    Function(GuestFunction),
    Host(HostObject),
    Callable(HostFunction),
    Class(HostClass),
    Error(Exception),
}

/// Guest wrapper of a host value and the handle slot it refers to. The slot
/// is freed once the wrapper dies.
pub(crate) struct ForeignWrapper {
    pub object: Weak<RefCell<JsObject>>,
    pub handle: HandleId,
}

impl Value {
    /// Short name of the variant, used in mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Host(_) => "host object",
            Value::Callable(_) => "host function",
            Value::Class(_) => "host class",
            Value::Error(_) => "error",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&GuestObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&GuestFunction> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_host(&self) -> Option<&HostObject> {
        match self {
            Value::Host(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&Exception> {
        match self {
            Value::Error(exception) => Some(exception),
            _ => None,
        }
    }

    /// The text used as an error message when this value is passed to an
    /// error constructor.
    pub(crate) fn as_message(&self) -> Option<String> {
        match self {
            Value::Undefined => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(number_to_string(*n)),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => Some("null".to_string()),
            Value::Error(exception) => Some(exception.to_string()),
            Value::Object(_)
            | Value::Function(_)
            | Value::Host(_)
            | Value::Callable(_)
            | Value::Class(_) => None,
        }
    }

    /// Snapshot as JSON. Guest objects are read through their context;
    /// host objects through their properties. Callables serialise as `null`.
    pub fn to_json(&self) -> Result<serde_json::Value, Exception> {
        Ok(match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(object) => object.to_json()?,
            Value::Host(object) => {
                let mut map = serde_json::Map::new();
                for key in object.keys()? {
                    let value = object.get(&key)?;
                    map.insert(key, value.to_json()?);
                }
                serde_json::Value::Object(map)
            }
            Value::Error(exception) => serde_json::Value::String(exception.to_string()),
            Value::Function(_) | Value::Callable(_) | Value::Class(_) => serde_json::Value::Null,
        })
    }

    /// Build a value from JSON. Arrays and objects are created as guest
    /// objects in `context`.
    pub fn from_json(
        context: &crate::context::Context,
        json: &serde_json::Value,
    ) -> Result<Value, Exception> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                let interp = context.interpreter()?;
                let guest = crate::interpreter::builtins::json::json_to_guest(interp, json);
                interp.to_host(&guest)
            }
        })
    }
}

pub(crate) fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::Number(serde_json::Number::from(n as i64))
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Host(a), Value::Host(b)) => a.ptr_eq(b),
            (Value::Callable(a), Value::Callable(b)) => a.ptr_eq(b),
            (Value::Class(a), Value::Class(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(object) => write!(f, "{:?}", object),
            Value::Function(function) => write!(f, "{:?}", function),
            Value::Host(object) => write!(f, "{:?}", object),
            Value::Callable(function) => write!(f, "{:?}", function),
            Value::Class(class) => write!(f, "{:?}", class),
            Value::Error(exception) => write!(f, "{:?}", exception),
        }
    }
}

impl PropertyBearing for Value {
    fn get(&self, key: &str) -> Result<Value, Exception> {
        match self {
            Value::Object(object) => object.get(key),
            Value::Function(function) => function.as_object().get(key),
            Value::Host(object) => object.get(key),
            Value::Error(exception) => match exception.as_js_exception() {
                Some(js) => js.value().get(key),
                None => Err(not_an_object(self)),
            },
            _ => Err(not_an_object(self)),
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<(), Exception> {
        match self {
            Value::Object(object) => object.set(key, value),
            Value::Function(function) => function.as_object().set(key, value),
            Value::Host(object) => object.set(key, value),
            _ => Err(not_an_object(self)),
        }
    }

    fn has(&self, key: &str) -> Result<bool, Exception> {
        match self {
            Value::Object(object) => object.has(key),
            Value::Function(function) => function.as_object().has(key),
            Value::Host(object) => object.has(key),
            _ => Err(not_an_object(self)),
        }
    }

    fn keys(&self) -> Result<Vec<String>, Exception> {
        match self {
            Value::Object(object) => object.keys(),
            Value::Function(function) => function.as_object().keys(),
            Value::Host(object) => object.keys(),
            _ => Err(not_an_object(self)),
        }
    }
}

fn not_an_object(value: &Value) -> Exception {
    Exception::new(BridgeError::NotAnObject(value.type_name().to_string()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Conversions
// ═══════════════════════════════════════════════════════════════════════════════

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<GuestObject> for Value {
    fn from(object: GuestObject) -> Self {
        Value::Object(object)
    }
}

impl From<GuestFunction> for Value {
    fn from(function: GuestFunction) -> Self {
        Value::Function(function)
    }
}

impl From<HostObject> for Value {
    fn from(object: HostObject) -> Self {
        Value::Host(object)
    }
}

impl From<HostFunction> for Value {
    fn from(function: HostFunction) -> Self {
        Value::Callable(function)
    }
}

impl From<HostClass> for Value {
    fn from(class: HostClass) -> Self {
        Value::Class(class)
    }
}

impl From<Exception> for Value {
    fn from(exception: Exception) -> Self {
        Value::Error(exception)
    }
}

fn mismatch(expected: &'static str, got: &Value) -> BridgeError {
    BridgeError::TypeMismatch {
        expected,
        got: got.type_name().to_string(),
    }
}

impl TryFrom<Value> for bool {
    type Error = BridgeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_bool().ok_or_else(|| mismatch("bool", &value))
    }
}

impl TryFrom<Value> for f64 {
    type Error = BridgeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_f64().ok_or_else(|| mismatch("number", &value))
    }
}

impl TryFrom<Value> for String {
    type Error = BridgeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Host <-> guest
// ═══════════════════════════════════════════════════════════════════════════════

impl Interpreter {
    /// Convert a host value for use by guest code of this context.
    pub(crate) fn to_guest(&self, value: Value) -> JsValue {
        match value {
            Value::Undefined => JsValue::Undefined,
            Value::Null => JsValue::Null,
            Value::Bool(b) => JsValue::Boolean(b),
            Value::Number(n) => JsValue::Number(n),
            Value::String(s) => JsValue::String(JsString::from(s)),
            Value::Object(object) => self.proxy_to_guest(object.handle(), Value::Object(object.clone())),
            Value::Function(function) => {
                self.proxy_to_guest(function.handle(), Value::Function(function.clone()))
            }
            Value::Host(object) => {
                let key = object.as_ptr();
                self.wrap_foreign(key, HandleEntry::Object(object), false)
            }
            Value::Callable(function) => {
                let key = function.as_ptr();
                self.wrap_foreign(key, HandleEntry::Function(function), true)
            }
            Value::Class(class) if class.is_error() => {
                JsValue::Object(self.mirror_for_class(&class))
            }
            Value::Class(class) => {
                let key = class.as_ptr();
                self.wrap_foreign(key, HandleEntry::Class(class), true)
            }
            Value::Error(exception) => self.exception_value(&exception),
        }
    }

    /// Convert a guest value for use by host code.
    pub(crate) fn to_host(&self, value: &JsValue) -> Value {
        match value {
            JsValue::Undefined => Value::Undefined,
            JsValue::Null => Value::Null,
            JsValue::Boolean(b) => Value::Bool(*b),
            JsValue::Number(n) => Value::Number(*n),
            JsValue::String(s) => Value::String(s.to_string()),
            JsValue::Object(obj) => self.object_to_host(obj),
        }
    }

    fn object_to_host(&self, obj: &JsObjectRef) -> Value {
        let (foreign, host_error, callable) = {
            let o = obj.borrow();
            match &o.exotic {
                ExoticObject::Foreign { handle, .. } => (Some(*handle), None, false),
                ExoticObject::Error { host: Some(exception) } => {
                    (None, Some(exception.clone()), false)
                }
                _ => (None, None, o.is_callable()),
            }
        };

        if let Some(handle) = foreign {
            let entry = self.handles.borrow().get(handle).cloned();
            return match entry {
                Some(HandleEntry::Object(object)) => Value::Host(object),
                Some(HandleEntry::Function(function)) => Value::Callable(function),
                Some(HandleEntry::Class(class)) => Value::Class(class),
                Some(HandleEntry::Foreign(value)) => value,
                Some(HandleEntry::Guest(_)) | None => Value::Undefined,
            };
        }
        if let Some(exception) = host_error {
            return Value::Error(exception);
        }
        if callable && let Some(class) = self.mirrored_class_of_constructor(obj) {
            return Value::Class(class);
        }

        let handle = self.guest_handle(obj);
        if callable {
            Value::Function(GuestFunction::new(handle))
        } else {
            Value::Object(GuestObject::new(handle))
        }
    }

    /// The host-side handle of `obj`, shared by every proxy of it.
    fn guest_handle(&self, obj: &JsObjectRef) -> Rc<GuestHandle> {
        let key = Rc::as_ptr(obj) as usize;
        if let Some(existing) = self.proxies.borrow().get(&key).and_then(|weak| weak.upgrade()) {
            return existing;
        }
        let id = self
            .handles
            .borrow_mut()
            .insert(HandleEntry::Guest(obj.cheap_clone()));
        let handle = Rc::new(GuestHandle::new(self.weak_self.clone(), self.id, id, key));
        self.proxies.borrow_mut().insert(key, Rc::downgrade(&handle));
        handle
    }

    /// Release the slot of a dropped host-side handle.
    pub(crate) fn release_guest_handle(&self, handle: &GuestHandle) {
        let entry = match self.handles.try_borrow_mut() {
            Ok(mut handles) => handles.remove(handle.id()),
            Err(_) => None,
        };
        if let Ok(mut proxies) = self.proxies.try_borrow_mut()
            && proxies
                .get(&handle.key())
                .is_some_and(|weak| weak.strong_count() == 0)
        {
            proxies.remove(&handle.key());
        }
        drop(entry);
    }

    /// Resolve a proxy of this context to its guest object.
    pub(crate) fn resolve_guest(&self, handle: &GuestHandle) -> Option<JsObjectRef> {
        match self.handles.borrow().get(handle.id()) {
            Some(HandleEntry::Guest(obj)) => Some(obj.cheap_clone()),
            _ => None,
        }
    }

    fn proxy_to_guest(&self, handle: &Rc<GuestHandle>, value: Value) -> JsValue {
        if handle.context_id() == self.id {
            return match self.resolve_guest(handle) {
                Some(obj) => JsValue::Object(obj),
                None => JsValue::Undefined,
            };
        }
        let callable = matches!(value, Value::Function(_));
        let key = Rc::as_ptr(handle) as usize;
        self.wrap_foreign(key, HandleEntry::Foreign(value), callable)
    }

    /// The guest wrapper of a host value. The same wrapper is returned for
    /// as long as guest code keeps it alive.
    fn wrap_foreign(&self, key: usize, entry: HandleEntry, callable: bool) -> JsValue {
        let cached = self
            .wrappers
            .borrow()
            .get(&key)
            .map(|wrapper| (wrapper.object.upgrade(), wrapper.handle));
        let stale = match cached {
            Some((Some(wrapper), _)) => return JsValue::Object(wrapper),
            Some((None, handle)) => self.handles.borrow_mut().remove(handle),
            None => None,
        };
        drop(stale);

        let handle = self.handles.borrow_mut().insert(entry);
        let prototype = if callable {
            self.realm.function_prototype.cheap_clone()
        } else {
            self.realm.object_prototype.cheap_clone()
        };
        let wrapper = self.alloc(Some(prototype), ExoticObject::Foreign { handle, callable });
        self.wrappers.borrow_mut().insert(
            key,
            ForeignWrapper {
                object: Rc::downgrade(&wrapper),
                handle,
            },
        );
        JsValue::Object(wrapper)
    }

    /// Free the slots of wrappers guest code no longer reaches and forget
    /// dead error objects. Skipped while either map is in use.
    pub(crate) fn prune_bridges(&self) {
        let released = {
            let (Ok(mut wrappers), Ok(mut handles)) =
                (self.wrappers.try_borrow_mut(), self.handles.try_borrow_mut())
            else {
                return;
            };
            let mut released = Vec::new();
            wrappers.retain(|_, wrapper| {
                if wrapper.object.strong_count() > 0 {
                    return true;
                }
                released.extend(handles.remove(wrapper.handle));
                false
            });
            released
        };
        // Host values may run arbitrary drop code, so no borrow is held here.
        drop(released);

        if let Ok(mut error_objects) = self.error_objects.try_borrow_mut() {
            error_objects.retain(|_, obj| obj.strong_count() > 0);
        }
    }

    /// The guest value standing for `exception`, without marking a crossing.
    /// Opaque guest errors enter as their payload: the original value in
    /// the owning context, a foreign reference to it anywhere else.
    pub(crate) fn exception_value(&self, exception: &Exception) -> JsValue {
        if let ExceptionKind::Guest(js) = exception.kind() {
            return self.to_guest(js.value().clone());
        }
        JsValue::Object(self.error_object_for(exception))
    }
}
