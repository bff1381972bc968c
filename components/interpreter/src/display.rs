//! Value rendering for diagnostics
//!
//! Used in error messages, uncaught-exception reports and logs. Rendering
//! only reads the heap: no getter, `toString` or proxy trap ever runs.

use core_types::{ObjectId, PropertyKey, Value};
use memory_manager::Property;

use crate::object::ObjectKind;
use crate::vm::VM;

impl VM {
    /// Short human-readable form of `value`
    ///
    /// Strings render raw, errors as `Name: message`, arrays as their
    /// elements joined with `,`.
    pub fn display_value(&self, value: &Value) -> String {
        let mut visiting = Vec::new();
        self.render(value, &mut visiting)
    }

    fn render(&self, value: &Value, visiting: &mut Vec<ObjectId>) -> String {
        match value {
            Value::Symbol(id) => format!(
                "Symbol({})",
                self.symbol_description(*id).as_deref().unwrap_or("")
            ),
            Value::Object(id) => self.render_object(*id, visiting),
            Value::Function(id) => self.render_function(*id),
            other => other.to_string(),
        }
    }

    fn render_object(&self, id: ObjectId, visiting: &mut Vec<ObjectId>) -> String {
        match self.kind(id) {
            Some(ObjectKind::Error) => self.render_error(id),
            Some(ObjectKind::Array(store)) => {
                // cyclic arrays render the inner occurrence as empty
                if visiting.contains(&id) {
                    return String::new();
                }
                visiting.push(id);
                let parts: Vec<String> = store
                    .elements
                    .iter()
                    .map(|element| match element {
                        Value::Undefined | Value::Null | Value::Hole => String::new(),
                        element => self.render(element, visiting),
                    })
                    .collect();
                visiting.pop();
                parts.join(",")
            }
            Some(ObjectKind::Promise(_)) => "[object Promise]".to_string(),
            Some(ObjectKind::Coroutine(_)) => "[object Generator]".to_string(),
            Some(ObjectKind::ArrayIterator { .. }) => "[object Array Iterator]".to_string(),
            Some(ObjectKind::Arguments) => "[object Arguments]".to_string(),
            _ => "[object Object]".to_string(),
        }
    }

    fn render_error(&self, id: ObjectId) -> String {
        let read = |name: &str| match self.lookup_data(id, &PropertyKey::from(name)) {
            Some(Value::Undefined) | None => None,
            Some(value) => Some(value.to_string()),
        };
        let name = read("name").unwrap_or_else(|| "Error".to_string());
        match read("message") {
            Some(message) if !message.is_empty() => format!("{}: {}", name, message),
            _ => name,
        }
    }

    fn render_function(&self, id: ObjectId) -> String {
        let name = match self.heap.get_own(id, &PropertyKey::from("name")).and_then(Property::value) {
            Some(Value::String(name)) => name.to_string(),
            _ => String::new(),
        };
        match self.kind(id) {
            Some(ObjectKind::Function(closure)) if closure.template.kind().is_class_constructor() => {
                format!("class {}", name)
            }
            _ => format!("function {}() {{ [native code] }}", name),
        }
    }

    /// Data property `key` found along the prototype chain of `id`
    fn lookup_data(&self, id: ObjectId, key: &PropertyKey) -> Option<Value> {
        let mut current = Some(id);
        for _ in 0..self.config.max_prototype_chain {
            let object = current?;
            if let Some(property) = self.heap.get_own(object, key) {
                return property.value().cloned();
            }
            current = self.heap.prototype_of(object);
        }
        None
    }
}
