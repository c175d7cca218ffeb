//! Guest value representation
//!
//! The core JsValue type and the heap object model of the embedded engine.
//! Objects are reference counted; cycles are broken explicitly when the
//! owning context is torn down.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionNode;
use crate::error::JsError;
use crate::exception::Exception;
use crate::handles::HandleId;
use crate::interpreter::{Interpreter, SourceUnit};
use crate::prelude::{FxHashMap, IndexMap, index_map_new};

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// Makes it explicit at the call site that a clone only bumps a reference
/// count.
pub trait CheapClone: Clone {
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// A guest value
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Object(JsObjectRef),
}

impl JsValue {
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    pub fn is_callable(&self) -> bool {
        match self {
            JsValue::Object(obj) => obj.borrow().is_callable(),
            _ => false,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, JsValue::String(_))
    }

    pub fn as_object(&self) -> Option<&JsObjectRef> {
        match self {
            JsValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get the typeof result for this value
    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object", // Historical quirk
            JsValue::Boolean(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Object(obj) => {
                if obj.borrow().is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// Convert to boolean (ToBoolean)
    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Object(_) => true,
        }
    }

    /// Convert a primitive to number (ToNumber). Objects go through
    /// `Interpreter::to_primitive` first.
    pub fn to_number(&self) -> f64 {
        match self {
            JsValue::Undefined => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Boolean(true) => 1.0,
            JsValue::Boolean(false) => 0.0,
            JsValue::Number(n) => *n,
            JsValue::String(s) => string_to_number(s.as_str()),
            JsValue::Object(_) => f64::NAN,
        }
    }

    /// Convert a primitive to string (ToString)
    pub fn to_js_string(&self) -> JsString {
        match self {
            JsValue::Undefined => JsString::from("undefined"),
            JsValue::Null => JsString::from("null"),
            JsValue::Boolean(true) => JsString::from("true"),
            JsValue::Boolean(false) => JsString::from("false"),
            JsValue::Number(n) => JsString::from(number_to_string(*n)),
            JsValue::String(s) => s.cheap_clone(),
            JsValue::Object(_) => JsString::from("[object Object]"),
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            // NaN !== NaN falls out of f64 comparison
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::Number(n) => write!(f, "{}", number_to_string(*n)),
            JsValue::String(s) => write!(f, "\"{}\"", s.as_str()),
            JsValue::Object(obj) => match obj.try_borrow() {
                Ok(obj) => match &obj.exotic {
                    ExoticObject::Ordinary => write!(f, "{{...}}"),
                    ExoticObject::Array(elements) => write!(f, "[{} items]", elements.len()),
                    ExoticObject::Function(func) => {
                        write!(f, "[Function: {}]", func.name().unwrap_or("anonymous"))
                    }
                    ExoticObject::Error { .. } => write!(f, "[Error]"),
                    ExoticObject::Foreign { callable, .. } => {
                        if *callable {
                            write!(f, "[Function: host]")
                        } else {
                            write!(f, "[object Host]")
                        }
                    }
                },
                Err(_) => write!(f, "[object]"),
            },
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(n as f64)
    }
}

impl From<usize> for JsValue {
    fn from(n: usize) -> Self {
        JsValue::Number(n as f64)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<JsString> for JsValue {
    fn from(s: JsString) -> Self {
        JsValue::String(s)
    }
}

impl From<JsObjectRef> for JsValue {
    fn from(obj: JsObjectRef) -> Self {
        JsValue::Object(obj)
    }
}

/// Format a number the way guest code prints it.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

/// StringToNumber for the subset of numeric literals guest code produces.
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Reference-counted string for efficient string handling
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Rc<str>);

// JsString wraps Rc<str>, so clone is cheap (just reference count increment)
impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Length in UTF-16 code units, as guest code observes it.
    pub fn utf16_len(&self) -> usize {
        self.0.encode_utf16().count()
    }

    /// The key as an array index, if it is one in canonical form.
    pub fn as_index(&self) -> Option<usize> {
        let s = self.as_str();
        if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
            return None;
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse().ok()
    }
}

impl std::ops::Deref for JsString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(s.into())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add<&JsString> for JsString {
    type Output = JsString;

    fn add(self, other: &JsString) -> JsString {
        let mut s = String::from(&*self.0);
        s.push_str(&other.0);
        JsString::from(s)
    }
}

/// Reference to a heap-allocated guest object
pub type JsObjectRef = Rc<RefCell<JsObject>>;

/// A guest object
pub struct JsObject {
    pub prototype: Option<JsObjectRef>,
    /// Own properties in insertion order
    pub properties: IndexMap<JsString, JsValue>,
    pub exotic: ExoticObject,
}

impl JsObject {
    pub fn new() -> Self {
        Self {
            prototype: None,
            properties: index_map_new(),
            exotic: ExoticObject::Ordinary,
        }
    }

    pub fn with_prototype(prototype: Option<JsObjectRef>, exotic: ExoticObject) -> Self {
        Self {
            prototype,
            properties: index_map_new(),
            exotic,
        }
    }

    pub fn is_callable(&self) -> bool {
        match &self.exotic {
            ExoticObject::Function(_) => true,
            ExoticObject::Foreign { callable, .. } => *callable,
            _ => false,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.exotic, ExoticObject::Array(_))
    }

    /// Look up an ordinary property, searching the prototype chain. Does not
    /// know about array elements or foreign objects.
    pub fn get_property(&self, key: &str) -> Option<JsValue> {
        if let Some(value) = self.properties.get(key) {
            return Some(value.clone());
        }
        let mut proto = self.prototype.clone();
        while let Some(current) = proto {
            let current = current.borrow();
            if let Some(value) = current.properties.get(key) {
                return Some(value.clone());
            }
            proto = current.prototype.clone();
        }
        None
    }

    pub fn set_property(&mut self, key: JsString, value: JsValue) {
        self.properties.insert(key, value);
    }

    pub fn has_own_property(&self, key: &str) -> bool {
        if let ExoticObject::Array(elements) = &self.exotic {
            if key == "length" {
                return true;
            }
            if let Some(index) = JsString::from(key).as_index() {
                return index < elements.len();
            }
        }
        self.properties.contains_key(key)
    }

    /// Own enumerable keys: array indices first, then insertion order.
    pub fn own_keys(&self) -> Vec<JsString> {
        let mut keys = Vec::new();
        if let ExoticObject::Array(elements) = &self.exotic {
            keys.extend((0..elements.len()).map(|i| JsString::from(i.to_string())));
        }
        keys.extend(self.properties.keys().cloned());
        keys
    }

    /// Drop everything this object references.
    pub fn clear(&mut self) {
        self.prototype = None;
        self.properties.clear();
        self.exotic = ExoticObject::Ordinary;
    }
}

impl Default for JsObject {
    fn default() -> Self {
        Self::new()
    }
}

/// Object kinds with behaviour beyond ordinary properties
pub enum ExoticObject {
    Ordinary,
    Array(Vec<JsValue>),
    Function(JsFunction),
    /// An Error instance. `host` is the hidden slot holding the host
    /// exception this object stands for, if any.
    Error { host: Option<Exception> },
    /// Guest wrapper of a host value held in the context's handle table
    Foreign { handle: HandleId, callable: bool },
}

/// Signature of builtin functions
pub type NativeFn = fn(&Interpreter, &NativeCall<'_>) -> Result<JsValue, JsError>;

/// Arguments of a builtin invocation
pub struct NativeCall<'a> {
    pub this: &'a JsValue,
    pub args: &'a [JsValue],
    pub callee: &'a JsObjectRef,
    /// True when invoked through `new`
    pub constructing: bool,
}

impl NativeCall<'_> {
    /// Argument `index`, or undefined when absent.
    pub fn arg(&self, index: usize) -> JsValue {
        self.args.get(index).cloned().unwrap_or(JsValue::Undefined)
    }
}

#[derive(Clone)]
pub enum JsFunction {
    Interpreted(Rc<InterpretedFunction>),
    Native(NativeFunction),
}

impl JsFunction {
    pub fn name(&self) -> Option<&str> {
        match self {
            JsFunction::Interpreted(f) => f.node.name.as_ref().map(|n| n.as_str()),
            JsFunction::Native(f) => Some(f.name.as_str()),
        }
    }
}

/// A function defined by guest source
pub struct InterpretedFunction {
    pub node: Rc<FunctionNode>,
    pub closure: EnvRef,
    /// `this` captured by an arrow function
    pub captured_this: Option<JsValue>,
    /// The evaluated unit the function text belongs to
    pub unit: Rc<SourceUnit>,
}

impl InterpretedFunction {
    /// The literal source text of the function.
    pub fn source_text(&self) -> &str {
        self.node.span.slice(self.unit.text())
    }
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: JsString,
    pub func: NativeFn,
    pub arity: usize,
    /// Whether `new` may be applied to it
    pub constructor: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Environments
// ═══════════════════════════════════════════════════════════════════════════════

pub type EnvRef = Rc<Environment>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The persistent script scope of a context; `var` goes to the global
    /// object instead
    Global,
    Function,
    Block,
}

pub struct Binding {
    pub value: JsValue,
    pub mutable: bool,
}

/// A lexical scope
pub struct Environment {
    bindings: RefCell<FxHashMap<JsString, Binding>>,
    outer: Option<EnvRef>,
    kind: ScopeKind,
}

/// Outcome of assigning to a name.
pub enum Assignment {
    Done,
    Constant,
    /// Unresolved in every lexical scope
    Unbound,
}

impl Environment {
    pub fn new_global() -> EnvRef {
        Rc::new(Self {
            bindings: RefCell::new(FxHashMap::default()),
            outer: None,
            kind: ScopeKind::Global,
        })
    }

    pub fn child(outer: &EnvRef, kind: ScopeKind) -> EnvRef {
        Rc::new(Self {
            bindings: RefCell::new(FxHashMap::default()),
            outer: Some(outer.cheap_clone()),
            kind,
        })
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    pub fn declare(&self, name: JsString, value: JsValue, mutable: bool) {
        self.bindings
            .borrow_mut()
            .insert(name, Binding { value, mutable });
    }

    /// Resolve a name through the scope chain.
    pub fn lookup(&self, name: &str) -> Option<JsValue> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.value.clone());
        }
        self.outer.as_ref().and_then(|outer| outer.lookup(name))
    }

    pub fn assign(&self, name: &str, value: JsValue) -> Assignment {
        if let Some(binding) = self.bindings.borrow_mut().get_mut(name) {
            if !binding.mutable {
                return Assignment::Constant;
            }
            binding.value = value;
            return Assignment::Done;
        }
        match &self.outer {
            Some(outer) => outer.assign(name, value),
            None => Assignment::Unbound,
        }
    }

    /// Nearest scope that receives `var` declarations.
    pub fn var_scope(self: &Rc<Self>) -> EnvRef {
        let mut env = self.cheap_clone();
        while env.kind == ScopeKind::Block {
            match &env.outer {
                Some(outer) => env = outer.cheap_clone(),
                None => break,
            }
        }
        env
    }

    pub fn names(&self) -> Vec<JsString> {
        self.bindings.borrow().keys().cloned().collect()
    }

    /// Drop all bindings of this scope.
    pub fn clear(&self) {
        let bindings = std::mem::take(&mut *self.bindings.borrow_mut());
        drop(bindings);
    }
}
