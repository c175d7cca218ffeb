//! JSON built-in methods
//!
//! Conversion goes through `serde_json::Value` in both directions. The same
//! conversion backs `GuestObject::to_json` and `Value::from_json` on the
//! host side.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::marshal::number_to_json;
use crate::prelude::FxHashSet;
use crate::value::{CheapClone, ExoticObject, JsObjectRef, JsValue, NativeCall};

/// Initialize the JSON object and add it to globals
pub fn init_json(interp: &Interpreter) {
    let json = interp.create_object();

    interp.register_method(&json, "stringify", json_stringify, 3);
    interp.register_method(&json, "parse", json_parse, 2);

    interp.set_global_value("JSON", JsValue::Object(json));
}

/// JSON.stringify(value, replacer, space). The replacer is ignored.
pub fn json_stringify(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let mut visited = FxHashSet::default();
    let Some(json) = interp.to_json_value(&call.arg(0), &mut visited)? else {
        return Ok(JsValue::Undefined);
    };

    let indent = match call.arg(2) {
        JsValue::Number(n) if n >= 1.0 => " ".repeat(n.min(10.0) as usize),
        JsValue::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    if indent.is_empty() {
        return Ok(JsValue::from(json.to_string()));
    }

    let mut out = Vec::new();
    let mut serializer =
        Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
    json.serialize(&mut serializer)
        .map_err(|e| JsError::type_error(e.to_string()))?;
    Ok(JsValue::from(String::from_utf8_lossy(&out).into_owned()))
}

/// JSON.parse(text). The reviver is ignored.
pub fn json_parse(interp: &Interpreter, call: &NativeCall<'_>) -> Result<JsValue, JsError> {
    let text = interp.to_string(&call.arg(0))?;
    let json: serde_json::Value = serde_json::from_str(text.as_str()).map_err(|e| {
        JsError::syntax_error(
            format!("Unexpected token in JSON: {}", e),
            e.line() as u32,
            e.column() as u32,
        )
    })?;
    Ok(json_to_guest(interp, &json))
}

/// Build guest values from JSON.
pub fn json_to_guest(interp: &Interpreter, json: &serde_json::Value) -> JsValue {
    match json {
        serde_json::Value::Null => JsValue::Null,
        serde_json::Value::Bool(b) => JsValue::Boolean(*b),
        serde_json::Value::Number(n) => JsValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => JsValue::from(s.as_str()),
        serde_json::Value::Array(items) => {
            let elements = items.iter().map(|item| json_to_guest(interp, item)).collect();
            JsValue::Object(interp.create_array(elements))
        }
        serde_json::Value::Object(map) => {
            let obj = interp.create_object();
            for (key, value) in map {
                let value = json_to_guest(interp, value);
                obj.borrow_mut().set_property(interp.intern(key), value);
            }
            JsValue::Object(obj)
        }
    }
}

impl Interpreter {
    /// JSON form of a guest value. `undefined` and functions become `null`.
    pub(crate) fn guest_to_json(&self, value: &JsValue) -> Result<serde_json::Value, JsError> {
        let mut visited = FxHashSet::default();
        Ok(self
            .to_json_value(value, &mut visited)?
            .unwrap_or(serde_json::Value::Null))
    }

    /// `None` for values JSON.stringify omits.
    fn to_json_value(
        &self,
        value: &JsValue,
        visited: &mut FxHashSet<usize>,
    ) -> Result<Option<serde_json::Value>, JsError> {
        Ok(Some(match value {
            JsValue::Undefined => return Ok(None),
            JsValue::Null => serde_json::Value::Null,
            JsValue::Boolean(b) => serde_json::Value::Bool(*b),
            JsValue::Number(n) => number_to_json(*n),
            JsValue::String(s) => serde_json::Value::String(s.to_string()),
            JsValue::Object(obj) => {
                if obj.borrow().is_callable() {
                    return Ok(None);
                }
                let key = std::rc::Rc::as_ptr(obj) as usize;
                if !visited.insert(key) {
                    return Err(JsError::type_error(
                        "Converting circular structure to JSON",
                    ));
                }
                let _nesting = self.nest()?;
                let json = self.object_to_json(obj, visited);
                visited.remove(&key);
                json?
            }
        }))
    }

    fn object_to_json(
        &self,
        obj: &JsObjectRef,
        visited: &mut FxHashSet<usize>,
    ) -> Result<serde_json::Value, JsError> {
        let elements = match &obj.borrow().exotic {
            ExoticObject::Array(elements) => Some(elements.clone()),
            _ => None,
        };
        if let Some(elements) = elements {
            let mut items = Vec::with_capacity(elements.len());
            for element in &elements {
                items.push(
                    self.to_json_value(element, visited)?
                        .unwrap_or(serde_json::Value::Null),
                );
            }
            return Ok(serde_json::Value::Array(items));
        }

        let mut map = serde_json::Map::new();
        for key in self.own_keys(obj)? {
            let value = self.get_property(&JsValue::Object(obj.cheap_clone()), &key, None)?;
            if let Some(json) = self.to_json_value(&value, visited)? {
                map.insert(key.to_string(), json);
            }
        }
        Ok(serde_json::Value::Object(map))
    }
}
