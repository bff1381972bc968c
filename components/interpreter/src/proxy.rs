//! Proxy exotic objects
//!
//! Each internal method looks up its trap on the handler and forwards to
//! the target when the trap is missing. Invariant checks against the
//! target are not performed.

use core_types::{ObjectId, PropertyKey, Value};

use crate::error::{Exception, JsResult};
use crate::object::ObjectKind;
use crate::vm::VM;

impl VM {
    fn proxy_parts(&self, id: ObjectId) -> JsResult<(Value, Value)> {
        match self.kind(id) {
            Some(ObjectKind::Proxy { target, handler }) => Ok((target.clone(), handler.clone())),
            _ => Err(Exception::internal("proxy expected")),
        }
    }

    /// The trap `name` of `handler`, if defined
    fn proxy_trap(&mut self, handler: &Value, name: &str) -> JsResult<Option<Value>> {
        self.get_method(handler, &PropertyKey::from(name))
    }

    fn target_object(&self, target: &Value) -> JsResult<ObjectId> {
        target
            .as_object()
            .ok_or_else(|| Exception::internal("proxy target is not an object"))
    }

    pub(crate) fn proxy_get(&mut self, id: ObjectId, key: &PropertyKey, receiver: &Value) -> JsResult<Value> {
        let (target, handler) = self.proxy_parts(id)?;
        match self.proxy_trap(&handler, "get")? {
            Some(trap) => self.call_function(&trap, &handler, &[target, key.to_value(), receiver.clone()]),
            None => {
                let target = self.target_object(&target)?;
                self.get_with_receiver(target, key, receiver)
            }
        }
    }

    pub(crate) fn proxy_set(
        &mut self,
        id: ObjectId,
        key: &PropertyKey,
        value: Value,
        receiver: &Value,
    ) -> JsResult<bool> {
        let (target, handler) = self.proxy_parts(id)?;
        match self.proxy_trap(&handler, "set")? {
            Some(trap) => {
                let args = [target, key.to_value(), value, receiver.clone()];
                Ok(self.call_function(&trap, &handler, &args)?.is_truthy())
            }
            None => {
                let target = self.target_object(&target)?;
                self.set_with_receiver(target, key, value, receiver)
            }
        }
    }

    pub(crate) fn proxy_has(&mut self, id: ObjectId, key: &PropertyKey) -> JsResult<bool> {
        let (target, handler) = self.proxy_parts(id)?;
        match self.proxy_trap(&handler, "has")? {
            Some(trap) => Ok(self
                .call_function(&trap, &handler, &[target, key.to_value()])?
                .is_truthy()),
            None => {
                let target = self.target_object(&target)?;
                self.has_property(target, key)
            }
        }
    }

    pub(crate) fn proxy_delete(&mut self, id: ObjectId, key: &PropertyKey) -> JsResult<bool> {
        let (target, handler) = self.proxy_parts(id)?;
        match self.proxy_trap(&handler, "deleteProperty")? {
            Some(trap) => Ok(self
                .call_function(&trap, &handler, &[target, key.to_value()])?
                .is_truthy()),
            None => self.delete_property(&target, key, false),
        }
    }

    pub(crate) fn proxy_get_prototype_of(&mut self, id: ObjectId) -> JsResult<Option<ObjectId>> {
        let (target, handler) = self.proxy_parts(id)?;
        match self.proxy_trap(&handler, "getPrototypeOf")? {
            Some(trap) => match self.call_function(&trap, &handler, &[target])? {
                Value::Null => Ok(None),
                value => value.as_object().map(Some).ok_or_else(|| {
                    Exception::type_error(
                        "'getPrototypeOf' on proxy: trap returned neither object nor null",
                    )
                }),
            },
            None => {
                let target = self.target_object(&target)?;
                self.get_prototype_of(target)
            }
        }
    }

    pub(crate) fn proxy_call(&mut self, id: ObjectId, this: &Value, args: &[Value]) -> JsResult<Value> {
        let (target, handler) = self.proxy_parts(id)?;
        match self.proxy_trap(&handler, "apply")? {
            Some(trap) => {
                let list = self.create_array(args.to_vec());
                self.call_function(&trap, &handler, &[target, this.clone(), list])
            }
            None => self.call_function(&target, this, args),
        }
    }

    pub(crate) fn proxy_construct(&mut self, id: ObjectId, args: &[Value], new_target: &Value) -> JsResult<Value> {
        let (target, handler) = self.proxy_parts(id)?;
        if !self.is_constructor(&target) {
            return Err(Exception::type_error(format!(
                "{} is not a constructor",
                self.display_value(&Value::Object(id))
            )));
        }
        match self.proxy_trap(&handler, "construct")? {
            Some(trap) => {
                let list = self.create_array(args.to_vec());
                let result = self.call_function(&trap, &handler, &[target, list, new_target.clone()])?;
                if result.is_object() {
                    Ok(result)
                } else {
                    Err(Exception::type_error(
                        "'construct' on proxy: trap returned non-object",
                    ))
                }
            }
            None => {
                let new_target = if new_target.as_object() == Some(id) {
                    target.clone()
                } else {
                    new_target.clone()
                };
                self.construct(&target, args, Some(&new_target))
            }
        }
    }
}

/// `Proxy(...)` without `new`
pub(crate) fn proxy_call_without_new(_vm: &mut VM, _this: &Value, _args: &[Value]) -> JsResult<Value> {
    Err(Exception::type_error("Constructor Proxy requires 'new'"))
}

/// `new Proxy(target, handler)`
pub(crate) fn proxy_constructor(vm: &mut VM, args: &[Value], _new_target: &Value) -> JsResult<Value> {
    let target = args.first().cloned().unwrap_or(Value::Undefined);
    let handler = args.get(1).cloned().unwrap_or(Value::Undefined);
    if !target.is_object() || !handler.is_object() {
        return Err(Exception::type_error(
            "Cannot create proxy with a non-object as target or handler",
        ));
    }
    let callable = target.is_callable();
    let id = vm.heap.allocate(None, ObjectKind::Proxy { target, handler });
    Ok(if callable {
        Value::Function(id)
    } else {
        Value::Object(id)
    })
}
