//! Property semantics
//!
//! `[[Get]]`, `[[Set]]`, `[[Delete]]`, `[[HasProperty]]`,
//! `[[DefineOwnProperty]]` and friends on top of the arena's property
//! tables. Arrays keep their indices and `length` in the backing store;
//! proxies forward to their traps. Named accesses from bytecode go through
//! the per-site inline caches first.

use std::rc::Rc;

use core_types::{ObjectId, PropertyKey, Value};
use memory_manager::{Property, PropertySlot};

use crate::call_frame::FunctionTemplate;
use crate::error::{Exception, JsResult};
use crate::inline_cache::CacheHit;
use crate::object::ObjectKind;
use crate::vm::VM;

/// Largest length a dense array store may grow to
pub const MAX_ARRAY_LENGTH: u32 = 1 << 24;

/// A property descriptor with optional fields, as accepted by
/// `Object.defineProperty`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyDescriptor {
    /// `[[Value]]`
    pub value: Option<Value>,
    /// `[[Writable]]`
    pub writable: Option<bool>,
    /// `[[Get]]`
    pub get: Option<Value>,
    /// `[[Set]]`
    pub set: Option<Value>,
    /// `[[Enumerable]]`
    pub enumerable: Option<bool>,
    /// `[[Configurable]]`
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// Fully populated data descriptor
    pub fn data(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value: Some(value),
            writable: Some(writable),
            enumerable: Some(enumerable),
            configurable: Some(configurable),
            ..Self::default()
        }
    }

    /// Whether the descriptor has a getter or setter field
    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    /// Whether the descriptor has a value or writable field
    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    /// Descriptor describing an existing property
    pub fn from_property(property: &Property) -> Self {
        match &property.slot {
            PropertySlot::Data { value, writable } => Self::data(
                value.clone(),
                *writable,
                property.enumerable,
                property.configurable,
            ),
            PropertySlot::Accessor { getter, setter } => Self {
                get: Some(getter.clone()),
                set: Some(setter.clone()),
                enumerable: Some(property.enumerable),
                configurable: Some(property.configurable),
                ..Self::default()
            },
        }
    }

    /// Apply this descriptor on top of `current` (or on the defaults when
    /// the property does not exist yet)
    fn merge_into(&self, current: Option<&Property>) -> Property {
        let enumerable = self
            .enumerable
            .or(current.map(|p| p.enumerable))
            .unwrap_or(false);
        let configurable = self
            .configurable
            .or(current.map(|p| p.configurable))
            .unwrap_or(false);
        let current_slot = current.map(|p| &p.slot);
        let slot = if self.is_accessor() {
            let (getter, setter) = match current_slot {
                Some(PropertySlot::Accessor { getter, setter }) => (getter.clone(), setter.clone()),
                _ => (Value::Undefined, Value::Undefined),
            };
            PropertySlot::Accessor {
                getter: self.get.clone().unwrap_or(getter),
                setter: self.set.clone().unwrap_or(setter),
            }
        } else {
            match current_slot {
                Some(PropertySlot::Accessor { getter, setter }) if !self.is_data() => {
                    PropertySlot::Accessor {
                        getter: getter.clone(),
                        setter: setter.clone(),
                    }
                }
                Some(PropertySlot::Data { value, writable }) => PropertySlot::Data {
                    value: self.value.clone().unwrap_or_else(|| value.clone()),
                    writable: self.writable.unwrap_or(*writable),
                },
                _ => PropertySlot::Data {
                    value: self.value.clone().unwrap_or(Value::Undefined),
                    writable: self.writable.unwrap_or(false),
                },
            }
        };
        Property {
            slot,
            enumerable,
            configurable,
        }
    }
}

/// Whether changing `current` as `desc` asks is allowed
fn is_compatible(current: &Property, desc: &PropertyDescriptor) -> bool {
    if current.configurable {
        return true;
    }
    if desc.configurable == Some(true) {
        return false;
    }
    if desc.enumerable.is_some_and(|e| e != current.enumerable) {
        return false;
    }
    match &current.slot {
        PropertySlot::Data { .. } if desc.is_accessor() => false,
        PropertySlot::Accessor { .. } if desc.is_data() => false,
        PropertySlot::Data { value, writable } => {
            if *writable {
                return true;
            }
            if desc.writable == Some(true) {
                return false;
            }
            desc.value.as_ref().map_or(true, |v| v.same_value(value))
        }
        PropertySlot::Accessor { getter, setter } => {
            desc.get.as_ref().map_or(true, |g| g == getter)
                && desc.set.as_ref().map_or(true, |s| s == setter)
        }
    }
}

impl VM {
    /// Own property of `id`, including the virtual index and `length`
    /// properties of arrays
    pub fn get_own_property(&self, id: ObjectId, key: &PropertyKey) -> Option<Property> {
        match self.kind(id) {
            Some(ObjectKind::Array(store)) => {
                if let Some(index) = key.as_array_index() {
                    return store
                        .elements
                        .get(index as usize)
                        .filter(|value| !matches!(value, Value::Hole))
                        .map(|value| {
                            Property::with_attributes(value.clone(), !store.frozen, true, !store.frozen)
                        });
                }
                if is_length(key) {
                    let length = Value::Number(store.elements.len() as f64);
                    return Some(Property::with_attributes(length, !store.frozen, false, false));
                }
            }
            Some(ObjectKind::Proxy { target, .. }) => {
                return target
                    .as_object()
                    .and_then(|target| self.get_own_property(target, key));
            }
            _ => {}
        }
        self.heap.get_own(id, key).cloned()
    }

    /// `[[Get]]` on any value; primitives read through their prototypes
    pub fn get_property(&mut self, target: &Value, key: &PropertyKey) -> JsResult<Value> {
        let holder = match target {
            Value::Object(id) | Value::Function(id) => *id,
            Value::String(s) => {
                if is_length(key) {
                    return Ok(Value::Number(s.encode_utf16().count() as f64));
                }
                if let Some(index) = key.as_array_index() {
                    if let Some(unit) = s.encode_utf16().nth(index as usize) {
                        return Ok(Value::from(String::from_utf16_lossy(&[unit])));
                    }
                }
                self.intrinsics.string_prototype
            }
            Value::Number(_) => self.intrinsics.number_prototype,
            Value::Boolean(_) => self.intrinsics.boolean_prototype,
            Value::Symbol(_) => self.intrinsics.symbol_prototype,
            Value::Undefined | Value::Null | Value::Hole => {
                return Err(Exception::type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    target,
                    self.display_key(key)
                )))
            }
        };
        self.get_with_receiver(holder, key, target)
    }

    /// `[[Get]]` with an explicit receiver for accessors
    pub fn get_with_receiver(
        &mut self,
        id: ObjectId,
        key: &PropertyKey,
        receiver: &Value,
    ) -> JsResult<Value> {
        let mut current = id;
        for _ in 0..self.config.max_prototype_chain {
            if matches!(self.kind(current), Some(ObjectKind::Proxy { .. })) {
                return self.proxy_get(current, key, receiver);
            }
            if let Some(property) = self.get_own_property(current, key) {
                return match property.slot {
                    PropertySlot::Data { value, .. } => Ok(value),
                    PropertySlot::Accessor { getter, .. } => {
                        if getter.is_callable() {
                            self.call_function(&getter, receiver, &[])
                        } else {
                            Ok(Value::Undefined)
                        }
                    }
                };
            }
            match self.heap.prototype_of(current) {
                Some(next) => current = next,
                None => return Ok(Value::Undefined),
            }
        }
        Err(Exception::range_error("Maximum prototype chain length exceeded"))
    }

    /// `[[Set]]` on any value. A failed assignment throws in strict code
    /// and is ignored otherwise.
    pub fn set_property(
        &mut self,
        target: &Value,
        key: PropertyKey,
        value: Value,
        strict: bool,
    ) -> JsResult<()> {
        let holder = match target {
            Value::Object(id) | Value::Function(id) => *id,
            Value::Undefined | Value::Null | Value::Hole => {
                return Err(Exception::type_error(format!(
                    "Cannot set properties of {} (setting '{}')",
                    target,
                    self.display_key(&key)
                )))
            }
            Value::String(_) => self.intrinsics.string_prototype,
            Value::Number(_) => self.intrinsics.number_prototype,
            Value::Boolean(_) => self.intrinsics.boolean_prototype,
            Value::Symbol(_) => self.intrinsics.symbol_prototype,
        };
        let done = self.set_with_receiver(holder, &key, value, target)?;
        if !done && strict {
            return Err(Exception::type_error(format!(
                "Cannot assign to read only property '{}' of {}",
                self.display_key(&key),
                self.display_value(target)
            )));
        }
        Ok(())
    }

    /// OrdinarySet: returns false when the assignment was refused
    pub fn set_with_receiver(
        &mut self,
        id: ObjectId,
        key: &PropertyKey,
        value: Value,
        receiver: &Value,
    ) -> JsResult<bool> {
        let mut current = id;
        let mut steps = 0;
        loop {
            if matches!(self.kind(current), Some(ObjectKind::Proxy { .. })) {
                return self.proxy_set(current, key, value, receiver);
            }
            if let Some(property) = self.get_own_property(current, key) {
                match property.slot {
                    PropertySlot::Accessor { setter, .. } => {
                        if !setter.is_callable() {
                            return Ok(false);
                        }
                        self.call_function(&setter, receiver, &[value])?;
                        return Ok(true);
                    }
                    PropertySlot::Data { writable: false, .. } => return Ok(false),
                    PropertySlot::Data { .. } => break,
                }
            }
            match self.heap.prototype_of(current) {
                Some(next) => current = next,
                None => break,
            }
            steps += 1;
            if steps > self.config.max_prototype_chain {
                return Err(Exception::range_error(
                    "Maximum prototype chain length exceeded",
                ));
            }
        }

        let Some(receiver) = receiver.as_object() else {
            return Ok(false);
        };
        match self.get_own_property(receiver, key) {
            Some(Property {
                slot: PropertySlot::Data { writable: true, .. },
                ..
            }) => self.write_own_value(receiver, key, value),
            Some(_) => Ok(false),
            None => self.define_own_property(
                receiver,
                key.clone(),
                PropertyDescriptor::data(value, true, true, true),
            ),
        }
    }

    /// Overwrite the value of an existing own writable data property
    fn write_own_value(&mut self, id: ObjectId, key: &PropertyKey, value: Value) -> JsResult<bool> {
        if let Some(ObjectKind::Array(_)) = self.kind(id) {
            if let Some(index) = key.as_array_index() {
                return self.array_set_index(id, index, value);
            }
            if is_length(key) {
                return self.array_set_length(id, &value);
            }
        }
        let Some(existing) = self.heap.get_own(id, key) else {
            return Ok(false);
        };
        let property = Property {
            slot: PropertySlot::Data {
                value,
                writable: true,
            },
            ..existing.clone()
        };
        Ok(self.heap.define(id, key.clone(), property))
    }

    /// CreateDataProperty: own enumerable, writable, configurable data
    /// property (object literals, array building)
    pub fn create_data_property(&mut self, id: ObjectId, key: PropertyKey, value: Value) -> JsResult<bool> {
        self.define_own_property(id, key, PropertyDescriptor::data(value, true, true, true))
    }

    /// `[[DefineOwnProperty]]`; returns false on an illegal redefinition
    pub fn define_own_property(
        &mut self,
        id: ObjectId,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> JsResult<bool> {
        match self.kind(id) {
            Some(ObjectKind::Proxy { target, .. }) => {
                let Some(target) = target.as_object() else {
                    return Ok(false);
                };
                return self.define_own_property(target, key, desc);
            }
            Some(ObjectKind::Array(store)) => {
                let frozen = store.frozen;
                if let Some(index) = key.as_array_index() {
                    if frozen {
                        return Ok(false);
                    }
                    if desc.is_accessor()
                        || desc.writable == Some(false)
                        || desc.enumerable == Some(false)
                        || desc.configurable == Some(false)
                    {
                        return Err(Exception::type_error(format!(
                            "Cannot define non-default attributes on array index {}",
                            index
                        )));
                    }
                    let value = match desc.value {
                        Some(value) => value,
                        None => self
                            .get_own_property(id, &key)
                            .and_then(|p| p.value().cloned())
                            .unwrap_or(Value::Undefined),
                    };
                    return self.array_set_index(id, index, value);
                }
                if is_length(&key) {
                    if desc.is_accessor()
                        || desc.enumerable == Some(true)
                        || desc.configurable == Some(true)
                    {
                        return Ok(false);
                    }
                    if desc.writable == Some(false) {
                        return Err(Exception::type_error(
                            "Cannot make array length read-only without freezing the array",
                        ));
                    }
                    return match desc.value {
                        Some(value) => self.array_set_length(id, &value),
                        None => Ok(!frozen),
                    };
                }
            }
            _ => {}
        }

        match self.heap.get_own(id, &key) {
            None => {
                if !self.heap.is_extensible(id) {
                    return Ok(false);
                }
                let property = desc.merge_into(None);
                Ok(self.heap.define(id, key, property))
            }
            Some(current) => {
                if !is_compatible(current, &desc) {
                    return Ok(false);
                }
                let property = desc.merge_into(Some(current));
                Ok(self.heap.define(id, key, property))
            }
        }
    }

    /// `[[Delete]]` on any value
    pub fn delete_property(&mut self, target: &Value, key: &PropertyKey, strict: bool) -> JsResult<bool> {
        let id = match target {
            Value::Object(id) | Value::Function(id) => *id,
            Value::Undefined | Value::Null | Value::Hole => {
                return Err(Exception::type_error(format!(
                    "Cannot convert undefined or null to object (deleting '{}')",
                    self.display_key(key)
                )))
            }
            _ => return Ok(true),
        };
        let deleted = match self.kind(id) {
            Some(ObjectKind::Proxy { .. }) => self.proxy_delete(id, key)?,
            Some(ObjectKind::Array(store)) if key.as_array_index().is_some() || is_length(key) => {
                let frozen = store.frozen;
                match (key.as_array_index(), self.heap.kind_mut(id)) {
                    (Some(index), Some(ObjectKind::Array(store))) if !frozen => {
                        if let Some(slot) = store.elements.get_mut(index as usize) {
                            *slot = Value::Hole;
                        }
                        true
                    }
                    _ => false,
                }
            }
            _ => match self.heap.get_own(id, key) {
                None => true,
                Some(property) if !property.configurable => false,
                Some(_) => {
                    self.heap.remove(id, key);
                    true
                }
            },
        };
        if !deleted && strict {
            return Err(Exception::type_error(format!(
                "Cannot delete property '{}' of {}",
                self.display_key(key),
                self.display_value(target)
            )));
        }
        Ok(deleted)
    }

    /// `[[HasProperty]]` (the `in` operator)
    pub fn has_property(&mut self, id: ObjectId, key: &PropertyKey) -> JsResult<bool> {
        let mut current = id;
        for _ in 0..self.config.max_prototype_chain {
            if matches!(self.kind(current), Some(ObjectKind::Proxy { .. })) {
                return self.proxy_has(current, key);
            }
            if self.get_own_property(current, key).is_some() {
                return Ok(true);
            }
            match self.heap.prototype_of(current) {
                Some(next) => current = next,
                None => return Ok(false),
            }
        }
        Err(Exception::range_error("Maximum prototype chain length exceeded"))
    }

    /// Own keys: integer keys ascending, then strings, then symbols, each
    /// group in insertion order
    pub fn own_keys(&self, id: ObjectId) -> Vec<PropertyKey> {
        let mut indices: Vec<u32> = Vec::new();
        let mut strings = Vec::new();
        let mut symbols = Vec::new();
        match self.kind(id) {
            Some(ObjectKind::Proxy { target, .. }) => {
                return target
                    .as_object()
                    .map(|target| self.own_keys(target))
                    .unwrap_or_default();
            }
            Some(ObjectKind::Array(store)) => {
                indices.extend(
                    store
                        .elements
                        .iter()
                        .enumerate()
                        .filter(|(_, value)| !matches!(value, Value::Hole))
                        .map(|(index, _)| index as u32),
                );
                strings.push(PropertyKey::from("length"));
            }
            _ => {}
        }
        for key in self.heap.own_keys(id) {
            match key.as_array_index() {
                Some(index) => indices.push(index),
                None if key.is_symbol() => symbols.push(key),
                None => strings.push(key),
            }
        }
        indices.sort_unstable();
        indices
            .into_iter()
            .map(PropertyKey::index)
            .chain(strings)
            .chain(symbols)
            .collect()
    }

    /// `[[GetPrototypeOf]]`
    pub fn get_prototype_of(&mut self, id: ObjectId) -> JsResult<Option<ObjectId>> {
        if matches!(self.kind(id), Some(ObjectKind::Proxy { .. })) {
            return self.proxy_get_prototype_of(id);
        }
        Ok(self.heap.prototype_of(id))
    }

    /// `[[SetPrototypeOf]]`; false on a cycle or a non-extensible object
    pub fn set_prototype_of(&mut self, id: ObjectId, prototype: Option<ObjectId>) -> JsResult<bool> {
        if let Some(ObjectKind::Proxy { target, .. }) = self.kind(id) {
            let Some(target) = target.as_object() else {
                return Ok(false);
            };
            return self.set_prototype_of(target, prototype);
        }
        if self.heap.prototype_of(id) == prototype {
            return Ok(true);
        }
        if !self.heap.is_extensible(id) {
            return Ok(false);
        }
        let mut link = prototype;
        let mut steps = 0;
        while let Some(ancestor) = link {
            if ancestor == id {
                return Ok(false);
            }
            // A proxy may answer differently each time; stop at it
            if matches!(self.kind(ancestor), Some(ObjectKind::Proxy { .. })) {
                break;
            }
            steps += 1;
            if steps > self.config.max_prototype_chain {
                return Err(Exception::range_error(
                    "Maximum prototype chain length exceeded",
                ));
            }
            link = self.heap.prototype_of(ancestor);
        }
        Ok(self.heap.set_prototype(id, prototype))
    }

    /// `[[PreventExtensions]]`
    pub fn prevent_extensions(&mut self, id: ObjectId) -> bool {
        if let Some(ObjectKind::Proxy { target, .. }) = self.kind(id) {
            return match target.as_object() {
                Some(target) => self.prevent_extensions(target),
                None => false,
            };
        }
        self.heap.prevent_extensions(id)
    }

    /// Whether new properties may be added to `id`
    pub fn is_extensible(&self, id: ObjectId) -> bool {
        if let Some(ObjectKind::Proxy { target, .. }) = self.kind(id) {
            return target.as_object().is_some_and(|t| self.is_extensible(t));
        }
        self.heap.is_extensible(id)
    }

    /// `Object.freeze`: non-extensible, every property non-configurable
    /// and every data property read-only
    pub fn freeze(&mut self, id: ObjectId) -> bool {
        if let Some(ObjectKind::Proxy { target, .. }) = self.kind(id) {
            return match target.as_object() {
                Some(target) => self.freeze(target),
                None => false,
            };
        }
        if !self.heap.prevent_extensions(id) {
            return false;
        }
        if let Some(ObjectKind::Array(store)) = self.heap.kind_mut(id) {
            store.frozen = true;
        }
        for key in self.heap.own_keys(id) {
            let Some(mut property) = self.heap.get_own(id, &key).cloned() else {
                continue;
            };
            property.configurable = false;
            if let PropertySlot::Data { writable, .. } = &mut property.slot {
                *writable = false;
            }
            self.heap.define(id, key, property);
        }
        true
    }

    /// `Object.isFrozen`
    pub fn is_frozen(&self, id: ObjectId) -> bool {
        if self.is_extensible(id) {
            return false;
        }
        self.own_keys(id).iter().all(|key| match self.get_own_property(id, key) {
            Some(property) => {
                !property.configurable
                    && !matches!(property.slot, PropertySlot::Data { writable: true, .. })
            }
            None => true,
        })
    }

    /// `Array.isArray`
    pub fn is_array(&self, value: &Value) -> bool {
        match value.as_object().and_then(|id| self.kind(id)) {
            Some(ObjectKind::Array(_)) => true,
            Some(ObjectKind::Proxy { target, .. }) => self.is_array(target),
            _ => false,
        }
    }

    /// GetMethod: `None` for undefined or null, TypeError if not callable
    pub(crate) fn get_method(&mut self, value: &Value, key: &PropertyKey) -> JsResult<Option<Value>> {
        let method = self.get_property(value, key)?;
        if method.is_nullish() {
            return Ok(None);
        }
        if !method.is_callable() {
            return Err(Exception::type_error(format!(
                "{} is not a function",
                self.display_value(&method)
            )));
        }
        Ok(Some(method))
    }

    /// LengthOfArrayLike
    pub(crate) fn length_of_array_like(&mut self, value: &Value) -> JsResult<usize> {
        let length = self.get_property(value, &PropertyKey::from("length"))?;
        let n = self.to_number(&length)?;
        if n.is_nan() || n <= 0.0 {
            return Ok(0);
        }
        Ok(n.min(f64::from(MAX_ARRAY_LENGTH)) as usize)
    }

    /// Write an array element, growing the store with holes
    pub(crate) fn array_set_index(&mut self, id: ObjectId, index: u32, value: Value) -> JsResult<bool> {
        let extensible = self.heap.is_extensible(id);
        let Some(ObjectKind::Array(store)) = self.heap.kind_mut(id) else {
            return Ok(false);
        };
        if store.frozen {
            return Ok(false);
        }
        let index = index as usize;
        if index >= store.elements.len() {
            if !extensible {
                return Ok(false);
            }
            if index >= MAX_ARRAY_LENGTH as usize {
                return Err(Exception::range_error("Invalid array length"));
            }
            store.elements.resize(index + 1, Value::Hole);
        }
        store.elements[index] = value;
        Ok(true)
    }

    /// ArraySetLength
    pub(crate) fn array_set_length(&mut self, id: ObjectId, value: &Value) -> JsResult<bool> {
        let number = self.to_number(value)?;
        let length = self.to_uint32(value)?;
        if f64::from(length) != number || length > MAX_ARRAY_LENGTH {
            return Err(Exception::range_error("Invalid array length"));
        }
        let Some(ObjectKind::Array(store)) = self.heap.kind_mut(id) else {
            return Ok(false);
        };
        if store.frozen {
            return Ok(false);
        }
        store.elements.resize(length as usize, Value::Hole);
        Ok(true)
    }

    /// Append to an array's backing store
    pub(crate) fn array_push(&mut self, id: ObjectId, value: Value) -> JsResult<()> {
        match self.heap.kind_mut(id) {
            Some(ObjectKind::Array(store)) if !store.frozen => {
                store.elements.push(value);
                Ok(())
            }
            Some(ObjectKind::Array(_)) => Err(Exception::type_error(
                "Cannot add property, object is not extensible",
            )),
            _ => Err(Exception::internal("array store expected")),
        }
    }

    /// `obj.name` through inline cache `slot` of `template`
    pub(crate) fn get_named_cached(
        &mut self,
        target: &Value,
        key: &PropertyKey,
        template: &FunctionTemplate,
        slot: u32,
    ) -> JsResult<Value> {
        if let (Some(id), true) = (target.as_object(), self.config.inline_caches) {
            if let Some(value) = self.cached_lookup(id, key, template, slot as usize) {
                return Ok(value);
            }
        }
        self.get_property(target, key)
    }

    /// Probe the cache and, on a miss, try to fill it from a plain data
    /// property on the receiver or its direct prototype
    fn cached_lookup(
        &self,
        id: ObjectId,
        key: &PropertyKey,
        template: &FunctionTemplate,
        slot: usize,
    ) -> Option<Value> {
        let object = self.heap.get(id)?;
        if object.kind.is_exotic() {
            return None;
        }
        let shape = object.shape();
        let mut caches = template.caches.borrow_mut();
        let cache = caches.get_mut(slot)?;

        match cache.lookup(shape) {
            Some(CacheHit::Own(offset)) => {
                if let Some((_, property)) = object.property_at(offset as usize) {
                    if let PropertySlot::Data { value, .. } = &property.slot {
                        return Some(value.clone());
                    }
                }
                cache.evict(shape);
            }
            Some(CacheHit::Prototype {
                holder,
                holder_shape,
                offset,
            }) => {
                if self.heap.shape_of(holder) == Some(holder_shape) {
                    if let Some((_, property)) = self
                        .heap
                        .get(holder)
                        .and_then(|h| h.property_at(offset as usize))
                    {
                        if let PropertySlot::Data { value, .. } = &property.slot {
                            return Some(value.clone());
                        }
                    }
                }
                cache.evict(shape);
            }
            None => {}
        }
        if cache.is_megamorphic() {
            return None;
        }

        if let Some((offset, property)) = object.lookup(key) {
            let PropertySlot::Data { value, .. } = &property.slot else {
                return None;
            };
            cache.update(shape, CacheHit::Own(offset as u32));
            return Some(value.clone());
        }
        let holder_id = object.prototype()?;
        let holder = self.heap.get(holder_id)?;
        if holder.kind.is_exotic() {
            return None;
        }
        let (offset, property) = holder.lookup(key)?;
        let PropertySlot::Data { value, .. } = &property.slot else {
            return None;
        };
        cache.update(
            shape,
            CacheHit::Prototype {
                holder: holder_id,
                holder_shape: holder.shape(),
                offset: offset as u32,
            },
        );
        Some(value.clone())
    }

    /// `obj.name = value` through inline cache `slot` of `template`.
    /// Only own writable data properties are cached.
    pub(crate) fn set_named_cached(
        &mut self,
        target: &Value,
        key: PropertyKey,
        value: Value,
        template: &FunctionTemplate,
        slot: u32,
    ) -> JsResult<()> {
        let strict = template.is_strict();
        let cacheable = self.config.inline_caches
            && target
                .as_object()
                .and_then(|id| self.kind(id))
                .is_some_and(|kind| !kind.is_exotic());
        let Some(id) = target.as_object().filter(|_| cacheable) else {
            return self.set_property(target, key, value, strict);
        };

        let shape = self.heap.shape_of(id);
        let hit = shape.and_then(|shape| {
            template
                .caches
                .borrow()
                .get(slot as usize)
                .and_then(|cache| cache.lookup(shape))
        });
        if let Some(CacheHit::Own(offset)) = hit {
            if self.heap.set_value_at(id, offset as usize, value.clone()) {
                return Ok(());
            }
        }

        self.set_property(target, key.clone(), value, strict)?;

        let Some(object) = self.heap.get(id) else {
            return Ok(());
        };
        if let Some((offset, property)) = object.lookup(&key) {
            if property.is_data() && property.is_writable() {
                let shape = object.shape();
                if let Some(cache) = template.caches.borrow_mut().get_mut(slot as usize) {
                    cache.update(shape, CacheHit::Own(offset as u32));
                }
            }
        }
        Ok(())
    }

    /// Key rendering for error messages
    pub(crate) fn display_key(&self, key: &PropertyKey) -> Rc<str> {
        match key {
            PropertyKey::String(s) => s.clone(),
            PropertyKey::Symbol(id) => Rc::from(format!(
                "Symbol({})",
                self.symbol_description(*id).as_deref().unwrap_or("")
            )),
        }
    }
}

fn is_length(key: &PropertyKey) -> bool {
    matches!(key, PropertyKey::String(s) if &**s == "length")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from(s)
    }

    #[test]
    fn test_non_writable_assignment() {
        let mut vm = VM::new();
        let obj = vm.create_object();
        let id = obj.as_object().unwrap();
        vm.define_own_property(id, key("x"), PropertyDescriptor::data(Value::from(1), false, true, false))
            .unwrap();
        assert!(vm.set_property(&obj, key("x"), Value::from(2), true).is_err());
        vm.set_property(&obj, key("x"), Value::from(3), false).unwrap();
        assert_eq!(vm.get_property(&obj, &key("x")).unwrap(), Value::from(1));
    }

    #[test]
    fn test_non_configurable_redefinition_fails() {
        let mut vm = VM::new();
        let id = vm.create_object().as_object().unwrap();
        let frozen = PropertyDescriptor::data(Value::from(1), false, false, false);
        assert!(vm.define_own_property(id, key("k"), frozen.clone()).unwrap());
        assert!(vm.define_own_property(id, key("k"), frozen).unwrap());
        let changed = PropertyDescriptor::data(Value::from(2), false, false, false);
        assert!(!vm.define_own_property(id, key("k"), changed).unwrap());
        assert!(!vm.delete_property(&Value::Object(id), &key("k"), false).unwrap());
    }

    #[test]
    fn test_own_keys_order() {
        let mut vm = VM::new();
        let id = vm.create_object().as_object().unwrap();
        let sym = vm.new_symbol(None);
        let sym_key = vm.to_property_key(&sym).unwrap();
        assert!(sym_key.is_symbol());
        for k in [key("b"), sym_key.clone(), key("2"), key("a"), key("1")] {
            vm.create_data_property(id, k, Value::Null).unwrap();
        }
        assert_eq!(
            vm.own_keys(id),
            vec![key("1"), key("2"), key("b"), key("a"), sym_key]
        );
    }

    #[test]
    fn test_prototype_cycle_is_rejected() {
        let mut vm = VM::new();
        let a = vm.create_object().as_object().unwrap();
        let b = vm.create_object().as_object().unwrap();
        assert!(vm.set_prototype_of(b, Some(a)).unwrap());
        assert!(!vm.set_prototype_of(a, Some(b)).unwrap());
        assert!(!vm.set_prototype_of(a, Some(a)).unwrap());
    }

    #[test]
    fn test_array_length_and_holes() {
        let mut vm = VM::new();
        let arr = vm.create_array(vec![Value::from(1)]);
        vm.set_property(&arr, key("3"), Value::from(4), true).unwrap();
        assert_eq!(vm.get_property(&arr, &key("length")).unwrap(), Value::from(4));
        assert_eq!(vm.get_property(&arr, &key("1")).unwrap(), Value::Undefined);
        assert!(vm
            .set_property(&arr, key("length"), Value::Number(1.5), true)
            .is_err());
        vm.set_property(&arr, key("length"), Value::from(1), true).unwrap();
        assert_eq!(vm.own_keys(arr.as_object().unwrap()), vec![key("0"), key("length")]);
    }

    #[test]
    fn test_frozen_object() {
        let mut vm = VM::new();
        let obj = vm.create_object();
        let id = obj.as_object().unwrap();
        vm.set_property(&obj, key("x"), Value::from(1), true).unwrap();
        assert!(!vm.is_frozen(id));
        vm.freeze(id);
        assert!(vm.is_frozen(id));
        assert!(vm.set_property(&obj, key("y"), Value::from(1), true).is_err());
        assert!(vm.set_property(&obj, key("x"), Value::from(2), true).is_err());
    }

    #[test]
    fn test_string_indexing() {
        let mut vm = VM::new();
        let s = Value::from("héllo");
        assert_eq!(vm.get_property(&s, &key("length")).unwrap(), Value::from(5));
        assert_eq!(vm.get_property(&s, &key("1")).unwrap(), Value::from("é"));
    }

    #[test]
    fn test_reading_from_undefined_throws() {
        let mut vm = VM::new();
        let err = vm.get_property(&Value::Undefined, &key("x")).unwrap_err();
        assert_eq!(
            err.as_error().map(|e| e.message.as_str()),
            Some("Cannot read properties of undefined (reading 'x')")
        );
    }
}
