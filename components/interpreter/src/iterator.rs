//! Iterator protocol helpers
//!
//! Spread, destructuring, `for-of`, `yield*` and the promise combinators
//! all consume iterables through these operations.

use core_types::{PropertyKey, Value};

use crate::error::{Exception, JsResult};
use crate::intrinsics::symbol::ITERATOR;
use crate::object::ObjectKind;
use crate::vm::VM;

impl VM {
    /// `GetIterator(iterable, sync)`
    pub(crate) fn get_iterator(&mut self, iterable: &Value) -> JsResult<Value> {
        let Some(method) = self.get_method(iterable, &PropertyKey::Symbol(ITERATOR))? else {
            return Err(Exception::type_error(format!(
                "{} is not iterable",
                self.display_value(iterable)
            )));
        };
        let iterator = self.call_function(&method, iterable, &[])?;
        if !iterator.is_object() {
            return Err(Exception::type_error(
                "Result of the Symbol.iterator method is not an object",
            ));
        }
        Ok(iterator)
    }

    /// `IteratorNext`: call `next` and check the result is an object
    pub(crate) fn iterator_next(&mut self, iterator: &Value, value: Option<Value>) -> JsResult<Value> {
        let args: Vec<Value> = value.into_iter().collect();
        let result = self.invoke_method(iterator, &PropertyKey::from("next"), &args)?;
        self.require_iter_result(result)
    }

    pub(crate) fn require_iter_result(&self, result: Value) -> JsResult<Value> {
        if result.is_object() {
            Ok(result)
        } else {
            Err(Exception::type_error(format!(
                "Iterator result {} is not an object",
                self.display_value(&result)
            )))
        }
    }

    /// `IteratorComplete`
    pub(crate) fn iter_done(&mut self, result: &Value) -> JsResult<bool> {
        Ok(self.get_property(result, &PropertyKey::from("done"))?.is_truthy())
    }

    /// `IteratorClose` for a normal early exit
    pub(crate) fn iterator_close(&mut self, iterator: &Value) -> JsResult<()> {
        let Some(method) = self.get_method(iterator, &PropertyKey::from("return"))? else {
            return Ok(());
        };
        let result = self.call_function(&method, iterator, &[])?;
        if !result.is_object() {
            return Err(Exception::type_error(format!(
                "Iterator result {} is not an object",
                self.display_value(&result)
            )));
        }
        Ok(())
    }

    /// Drain an iterable into a list
    pub(crate) fn iterate_to_vec(&mut self, iterable: &Value) -> JsResult<Vec<Value>> {
        let iterator = self.get_iterator(iterable)?;
        let mut values = Vec::new();
        loop {
            let result = self.iterator_next(&iterator, None)?;
            if self.iter_done(&result)? {
                return Ok(values);
            }
            values.push(self.get_property(&result, &PropertyKey::from("value"))?);
        }
    }

    /// Iterator over the values of an array-like
    pub(crate) fn create_array_iterator(&mut self, array: Value) -> Value {
        Value::Object(self.heap.allocate(
            Some(self.intrinsics.array_iterator_prototype),
            ObjectKind::ArrayIterator {
                array,
                index: 0,
                done: false,
            },
        ))
    }
}

/// `%ArrayIteratorPrototype%.next`
pub(crate) fn array_iterator_next(vm: &mut VM, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let state = this.as_object().and_then(|id| match vm.kind(id) {
        Some(ObjectKind::ArrayIterator { array, index, done }) => Some((id, array.clone(), *index, *done)),
        _ => None,
    });
    let Some((id, array, index, done)) = state else {
        return Err(Exception::type_error(format!(
            "next method called on incompatible receiver {}",
            vm.display_value(this)
        )));
    };
    if done {
        return Ok(vm.iter_result(Value::Undefined, true));
    }
    let length = vm.length_of_array_like(&array)?;
    if index >= length {
        if let Some(ObjectKind::ArrayIterator { done, .. }) = vm.heap.kind_mut(id) {
            *done = true;
        }
        return Ok(vm.iter_result(Value::Undefined, true));
    }
    let value = vm.get_property(&array, &PropertyKey::index(index as u32))?;
    if let Some(ObjectKind::ArrayIterator { index: next, .. }) = vm.heap.kind_mut(id) {
        *next = index + 1;
    }
    Ok(vm.iter_result(value, false))
}
