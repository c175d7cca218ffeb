//! Interning of identifier and literal strings.
//!
//! Each evaluated unit is lexed with the interpreter's dictionary so that
//! property names produced by different scripts share one `Rc<str>`.

use rustc_hash::FxHashMap;

use crate::value::{CheapClone, JsString};

/// A dictionary for deduplicating JsString instances.
pub struct StringDict {
    strings: FxHashMap<Box<str>, JsString>,
}

impl StringDict {
    pub fn new() -> Self {
        Self {
            strings: FxHashMap::default(),
        }
    }

    /// Create a dictionary pre-populated with the names the builtins use.
    pub fn with_builtin_names() -> Self {
        let mut dict = Self::new();
        for s in BUILTIN_NAMES {
            dict.get_or_insert(s);
        }
        dict
    }

    /// Get an existing string or insert a new one.
    pub fn get_or_insert(&mut self, s: &str) -> JsString {
        if let Some(existing) = self.strings.get(s) {
            return existing.cheap_clone();
        }
        let js_str = JsString::from(s);
        self.strings.insert(s.into(), js_str.cheap_clone());
        js_str
    }

    pub fn get(&self, s: &str) -> Option<JsString> {
        self.strings.get(s).map(|s| s.cheap_clone())
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringDict {
    fn default() -> Self {
        Self::new()
    }
}

const BUILTIN_NAMES: &[&str] = &[
    "length",
    "prototype",
    "constructor",
    "name",
    "message",
    "stack",
    "toString",
    "hasOwnProperty",
    "undefined",
    "Object",
    "Array",
    "String",
    "Error",
    "TypeError",
    "ReferenceError",
    "SyntaxError",
    "RangeError",
    "JSON",
    "console",
    "globalThis",
    "log",
    "info",
    "debug",
    "warn",
    "error",
    "push",
    "pop",
    "join",
    "map",
    "forEach",
    "indexOf",
    "slice",
    "toUpperCase",
    "toLowerCase",
    "keys",
    "isArray",
    "stringify",
    "parse",
];
