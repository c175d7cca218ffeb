//! Call and exception bridge
//!
//! Every crossing between the guest engine and host code goes through this
//! module. A crossing pushes a [`SyntheticFrame`] for as long as the callee
//! runs, marshals the arguments, and converts errors at the boundary:
//! host [`Exception`]s enter guest code as guest values and guest errors
//! leave as [`Exception`]s, keeping their identity both ways.

use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::error::{BridgeError, JsError};
use crate::exception::{Exception, ExceptionKind, JsException};
use crate::frame::{self, FrameKind, Side, SyntheticFrame, Traceback};
use crate::handles::{HandleEntry, HandleId};
use crate::host::{HostClass, Invocation, PropertyBearing};
use crate::interpreter::builtins::error::{create_error, error_constructor};
use crate::interpreter::{Interpreter, Site, SourceUnit, host_exception_of};
use crate::marshal::Value;
use crate::registry::{self, ScriptSource};
use crate::value::{CheapClone, ExoticObject, InterpretedFunction, JsObjectRef, JsString, JsValue};

/// A host error type exposed to guest code under a constructor name.
pub(crate) struct Mirror {
    pub name: String,
    pub class: HostClass,
    pub constructor: JsObjectRef,
    pub prototype: JsObjectRef,
}

/// Cache key of a registered frame source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum SiteKey {
    /// A call or property access inside an evaluated unit
    Span(u64, usize, usize),
    /// A guest function literal
    Function(u64, usize, usize),
    /// A crossing without guest source, named after its target
    Text(String),
}

impl Interpreter {
    // ═══════════════════════════════════════════════════════════════════════
    // Frame sources
    // ═══════════════════════════════════════════════════════════════════════

    /// Register the literal text of one `eval` unit.
    pub(crate) fn register_eval_source(&self, text: &str) -> Arc<ScriptSource> {
        let source = registry::register(self.id, None, text);
        self.scripts.borrow_mut().push(source.clone());
        source
    }

    /// The registered source of a crossing made at `site`. Crossings
    /// without a site show the target name.
    fn site_source(&self, site: Option<Site<'_>>, name: &str) -> Arc<ScriptSource> {
        let (key, text) = match site {
            Some(site) => (
                SiteKey::Span(
                    site.unit.script().id().as_u64(),
                    site.span.start,
                    site.span.end,
                ),
                site.text(),
            ),
            None => (SiteKey::Text(name.to_string()), name),
        };
        self.cached_source(key, None, text)
    }

    /// The registered source of a guest function: its full literal text.
    pub(crate) fn function_source(&self, function: &InterpretedFunction) -> Arc<ScriptSource> {
        let span = function.node.span;
        let key = SiteKey::Function(function.unit.script().id().as_u64(), span.start, span.end);
        let name = function.node.name.as_ref().map(|name| name.as_str());
        self.cached_source(key, name, function.source_text())
    }

    fn cached_source(&self, key: SiteKey, function: Option<&str>, text: &str) -> Arc<ScriptSource> {
        if let Some(source) = self.sites.borrow().get(&key) {
            return source.clone();
        }
        let source = registry::register(self.id, function, text);
        self.sites.borrow_mut().insert(key, source.clone());
        source
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Entry points from the host
    // ═══════════════════════════════════════════════════════════════════════

    /// Evaluate `source` as a new unit and return its completion value.
    pub(crate) fn eval(&self, source: &str) -> Result<Value, Exception> {
        let script = self.register_eval_source(source);
        let _frame = frame::push(SyntheticFrame::new(
            Side::Host,
            FrameKind::Script,
            None,
            script.clone(),
        ));
        let result = self.enter().and_then(|_entry| {
            let program = self.parse(source)?;
            self.execute_program(&program, Rc::new(SourceUnit::new(script)))
        });
        match result {
            Ok(value) => Ok(self.to_host(&value)),
            Err(err) => Err(self.deliver(err)),
        }
    }

    /// Call a guest function of this context from host code.
    pub(crate) fn call_from_host(
        &self,
        function: &JsObjectRef,
        this: Value,
        args: &[Value],
    ) -> Result<Value, Exception> {
        let result = self.enter().and_then(|_entry| {
            let this = self.to_guest(this);
            let args: Vec<JsValue> = args.iter().map(|arg| self.to_guest(arg.clone())).collect();
            self.call_function(
                &JsValue::Object(function.cheap_clone()),
                this,
                &args,
                None,
                Side::Host,
            )
        });
        match result {
            Ok(value) => Ok(self.to_host(&value)),
            Err(err) => Err(self.deliver(err)),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Foreign references
    // ═══════════════════════════════════════════════════════════════════════

    fn foreign_entry(&self, handle: HandleId) -> Result<HandleEntry, JsError> {
        let entry = self.handles.borrow().get(handle).cloned();
        entry.ok_or_else(|| self.exception_to_guest(Exception::new(BridgeError::InvalidHandle)))
    }

    fn invocation(&self, this: &JsValue) -> Invocation {
        Invocation {
            this: self.to_host(this),
            context: self.context(),
        }
    }

    fn host_args(&self, args: &[JsValue]) -> Vec<Value> {
        args.iter().map(|arg| self.to_host(arg)).collect()
    }

    fn from_host(&self, result: Result<Value, Exception>) -> Result<JsValue, JsError> {
        match result {
            Ok(value) => Ok(self.to_guest(value)),
            Err(exception) => Err(self.exception_to_guest(exception)),
        }
    }

    /// A guest call of a host callable, host class or foreign function.
    pub(crate) fn call_foreign(
        &self,
        handle: HandleId,
        this: JsValue,
        args: &[JsValue],
        site: Option<Site<'_>>,
    ) -> Result<JsValue, JsError> {
        let entry = self.foreign_entry(handle)?;
        let name = entry_name(&entry);
        let source = self.site_source(site, &name);
        let _frame = frame::push(SyntheticFrame::new(
            Side::Guest,
            FrameKind::Call,
            Some(name.clone()),
            source,
        ));
        let args = self.host_args(args);
        let result = match &entry {
            HandleEntry::Function(function) => function.invoke(&self.invocation(&this), &args),
            HandleEntry::Class(class) => class.construct(&self.invocation(&this), &args),
            HandleEntry::Foreign(Value::Function(function)) => {
                function.call_with_this(self.to_host(&this), &args)
            }
            _ => Err(Exception::new(BridgeError::NotCallable(name))),
        };
        self.from_host(result)
    }

    /// A guest `new` applied to a host class.
    pub(crate) fn construct_foreign(
        &self,
        handle: HandleId,
        args: &[JsValue],
        site: Option<Site<'_>>,
        describe: &dyn Fn() -> String,
    ) -> Result<JsValue, JsError> {
        let entry = self.foreign_entry(handle)?;
        let HandleEntry::Class(class) = &entry else {
            return Err(JsError::type_error(format!("{} is not a constructor", describe())));
        };
        let source = self.site_source(site, class.name());
        let _frame = frame::push(SyntheticFrame::new(
            Side::Guest,
            FrameKind::Call,
            Some(class.name().to_string()),
            source,
        ));
        let args = self.host_args(args);
        let result = class.construct(&self.invocation(&JsValue::Undefined), &args);
        self.from_host(result)
    }

    /// A guest read of a property of a foreign reference.
    pub(crate) fn get_foreign(
        &self,
        handle: HandleId,
        key: &JsString,
        site: Option<Site<'_>>,
    ) -> Result<JsValue, JsError> {
        let entry = self.foreign_entry(handle)?;
        let result = match &entry {
            HandleEntry::Object(object) => {
                let source = self.site_source(site, key);
                let _frame = frame::push(SyntheticFrame::new(
                    Side::Guest,
                    FrameKind::Get,
                    Some(key.to_string()),
                    source,
                ));
                object.get(key)
            }
            HandleEntry::Foreign(value) => value.get(key),
            HandleEntry::Function(function) if key == "name" => Ok(Value::from(function.name())),
            HandleEntry::Class(class) if key == "name" => Ok(Value::from(class.name())),
            _ => {
                // Callables still answer the Function.prototype methods
                let value = self
                    .realm
                    .function_prototype
                    .borrow()
                    .get_property(key)
                    .unwrap_or_default();
                return Ok(value);
            }
        };
        self.from_host(result)
    }

    /// A guest write of a property of a foreign reference.
    pub(crate) fn set_foreign(
        &self,
        handle: HandleId,
        key: &JsString,
        value: JsValue,
        site: Option<Site<'_>>,
    ) -> Result<(), JsError> {
        let entry = self.foreign_entry(handle)?;
        let value = self.to_host(&value);
        let result = match &entry {
            HandleEntry::Object(object) => {
                let source = self.site_source(site, key);
                let _frame = frame::push(SyntheticFrame::new(
                    Side::Guest,
                    FrameKind::Set,
                    Some(key.to_string()),
                    source,
                ));
                object.set(key, value)
            }
            HandleEntry::Foreign(target) => target.set(key, value),
            _ => Err(Exception::new(BridgeError::ReadOnly(key.to_string()))),
        };
        result.map_err(|exception| self.exception_to_guest(exception))
    }

    pub(crate) fn has_foreign(&self, handle: HandleId, key: &JsString) -> Result<bool, JsError> {
        let entry = self.foreign_entry(handle)?;
        let result = match &entry {
            HandleEntry::Object(object) => object.has(key),
            HandleEntry::Foreign(value) => value.has(key),
            _ => Ok(false),
        };
        result.map_err(|exception| self.exception_to_guest(exception))
    }

    pub(crate) fn foreign_keys(&self, handle: HandleId) -> Result<Vec<JsString>, JsError> {
        let entry = self.foreign_entry(handle)?;
        let result = match &entry {
            HandleEntry::Object(object) => object.keys(),
            HandleEntry::Foreign(value) => value.keys(),
            _ => Ok(Vec::new()),
        };
        result
            .map(|keys| keys.into_iter().map(JsString::from).collect())
            .map_err(|exception| self.exception_to_guest(exception))
    }

    /// `value instanceof C` for a host class `C`.
    pub(crate) fn foreign_instance_of(&self, handle: HandleId, value: &JsValue) -> bool {
        let Some(HandleEntry::Class(class)) = self.handles.borrow().get(handle).cloned() else {
            return false;
        };
        match self.to_host(value) {
            Value::Host(object) => object.class().is_some_and(|c| c.ptr_eq(&class)),
            _ => false,
        }
    }

    /// Display form of a foreign reference. Never calls into host code.
    pub(crate) fn describe_foreign(&self, handle: HandleId) -> String {
        let entry = self.handles.borrow().get(handle).cloned();
        match entry {
            Some(HandleEntry::Object(object)) => format!("[object {}]", object.class_name()),
            Some(HandleEntry::Function(function)) => {
                format!("function {}() {{ [native code] }}", function.name())
            }
            Some(HandleEntry::Class(class)) => format!("class {} {{ [native code] }}", class.name()),
            Some(HandleEntry::Foreign(Value::Function(_))) => {
                "function () { [native code] }".to_string()
            }
            Some(_) => "[object Object]".to_string(),
            None => "[object Undefined]".to_string(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Mirrored error types
    // ═══════════════════════════════════════════════════════════════════════

    /// Expose the host error class under `name`. Returns the guest
    /// constructor, whose instances deliver as the host type.
    pub(crate) fn register_mirror(&self, name: &str, class: HostClass) -> JsObjectRef {
        let prototype = self.alloc(
            Some(self.realm.error_prototype.cheap_clone()),
            ExoticObject::Ordinary,
        );
        prototype
            .borrow_mut()
            .set_property(self.intern("name"), JsValue::from(name));
        prototype
            .borrow_mut()
            .set_property(self.intern("message"), JsValue::from(""));
        let constructor = self.create_constructor(name, error_constructor, 1, &prototype);
        self.mirrors.borrow_mut().push(Mirror {
            name: name.to_string(),
            class,
            constructor: constructor.cheap_clone(),
            prototype,
        });
        constructor
    }

    /// The guest constructor of an error class, registered under the class
    /// name on first use.
    pub(crate) fn mirror_for_class(&self, class: &HostClass) -> JsObjectRef {
        let existing = self
            .mirrors
            .borrow()
            .iter()
            .rev()
            .find(|mirror| mirror.class.type_id() == class.type_id())
            .map(|mirror| mirror.constructor.cheap_clone());
        match existing {
            Some(constructor) => constructor,
            None => self.register_mirror(class.name(), class.clone()),
        }
    }

    pub(crate) fn mirrored_class_of_constructor(&self, obj: &JsObjectRef) -> Option<HostClass> {
        self.mirrors
            .borrow()
            .iter()
            .find(|mirror| Rc::ptr_eq(&mirror.constructor, obj))
            .map(|mirror| mirror.class.clone())
    }

    /// The mirror whose prototype is on the prototype chain of `obj`.
    fn mirrored_class_of_instance(&self, obj: &JsObjectRef) -> Option<HostClass> {
        let mirrors = self.mirrors.borrow();
        if mirrors.is_empty() {
            return None;
        }
        let mut current = obj.borrow().prototype.clone();
        while let Some(proto) = current {
            if let Some(mirror) = mirrors
                .iter()
                .find(|mirror| Rc::ptr_eq(&mirror.prototype, &proto))
            {
                return Some(mirror.class.clone());
            }
            current = proto.borrow().prototype.clone();
        }
        None
    }

    /// Names under which guest code sees mirrored error types.
    pub(crate) fn mirror_names(&self) -> Vec<String> {
        self.mirrors
            .borrow()
            .iter()
            .map(|mirror| mirror.name.clone())
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Exceptions
    // ═══════════════════════════════════════════════════════════════════════

    /// The guest error object carrying `exception` in its hidden slot. The
    /// same object is returned for as long as guest code keeps it alive.
    pub(crate) fn error_object_for(&self, exception: &Exception) -> JsObjectRef {
        let key = exception.as_ptr();
        let cached = self
            .error_objects
            .borrow()
            .get(&key)
            .and_then(Weak::upgrade);
        if let Some(obj) = cached {
            return obj;
        }

        let prototype = exception
            .host_error()
            .and_then(|error| {
                self.mirrors
                    .borrow()
                    .iter()
                    .rev()
                    .find(|mirror| mirror.class.matches_error(error))
                    .map(|mirror| mirror.prototype.cheap_clone())
            })
            .unwrap_or_else(|| self.realm.error_prototype.cheap_clone());
        let obj = create_error(self, prototype, Some(exception.to_string()));
        if let ExoticObject::Error { host } = &mut obj.borrow_mut().exotic {
            *host = Some(exception.clone());
        }
        self.error_objects
            .borrow_mut()
            .insert(key, Rc::downgrade(&obj));
        obj
    }

    /// Convert a host exception into a guest error at a boundary.
    pub(crate) fn exception_to_guest(&self, exception: Exception) -> JsError {
        if let Some(reason) = exception.termination() {
            return JsError::Terminated {
                reason,
                trace: exception.traceback(),
            };
        }
        exception.mark_crossing();
        let value = self.exception_value(&exception);
        JsError::Thrown {
            value,
            trace: exception.traceback(),
            origin: Some(exception),
        }
    }

    /// Convert a guest error escaping to host code into an [`Exception`].
    pub(crate) fn deliver(&self, err: JsError) -> Exception {
        let exception = match err {
            JsError::Terminated { reason, trace } => Exception::terminated(reason, trace),
            JsError::Thrown {
                origin: Some(exception),
                ..
            } => exception,
            JsError::Thrown {
                value,
                trace,
                origin: None,
            } => self.exception_from_value(value, trace),
            engine => {
                let trace = engine.trace().clone();
                let value = self.error_to_value(engine);
                self.exception_from_value(value, trace)
            }
        };
        exception.mark_delivered();
        exception
    }

    fn exception_from_value(&self, value: JsValue, trace: Traceback) -> Exception {
        if let Some(exception) = host_exception_of(&value) {
            return exception;
        }
        let (name, message) = self.error_parts(&value);
        if let JsValue::Object(obj) = &value
            && let Some(error) = self
                .mirrored_class_of_instance(obj)
                .and_then(|class| class.make_error(message.clone().filter(|m| !m.is_empty())))
        {
            return Exception::from_kind(ExceptionKind::Host(error), trace);
        }
        let message = match message {
            Some(message) => message,
            None => self
                .to_string(&value)
                .map(|s| s.to_string())
                .unwrap_or_else(|_| self.display_string(&value)),
        };
        let payload = self.to_host(&value);
        Exception::from_kind(
            ExceptionKind::Guest(JsException::new(payload, name, message, self.id)),
            trace,
        )
    }

    /// `name` and `message` of a guest error object.
    fn error_parts(&self, value: &JsValue) -> (Option<String>, Option<String>) {
        let JsValue::Object(obj) = value else {
            return (None, None);
        };
        let o = obj.borrow();
        let is_error = matches!(o.exotic, ExoticObject::Error { .. });
        if !is_error {
            return (None, None);
        }
        let name = o.get_property("name").map(|v| v.to_js_string().to_string());
        let message = o
            .get_property("message")
            .filter(|v| !v.is_null_or_undefined())
            .map(|v| v.to_js_string().to_string());
        (name, message)
    }
}

/// Name a handle table entry shows in frames and errors.
fn entry_name(entry: &HandleEntry) -> String {
    match entry {
        HandleEntry::Function(function) => function.name().to_string(),
        HandleEntry::Class(class) => class.name().to_string(),
        HandleEntry::Object(object) => object.class_name().to_string(),
        HandleEntry::Foreign(Value::Function(function)) => {
            function.name().unwrap_or_else(|| "<anonymous>".to_string())
        }
        HandleEntry::Foreign(_) | HandleEntry::Guest(_) => "<anonymous>".to_string(),
    }
}
