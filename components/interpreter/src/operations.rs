//! Type conversions and operators
//!
//! ToPrimitive, ToNumber, ToString and ToPropertyKey plus the binary and
//! unary operators of the instruction set. Conversions of objects may run
//! user code (`valueOf`, `toString`, `[Symbol.toPrimitive]`), so they all
//! live on the VM and return [`JsResult`].

use std::rc::Rc;

use bytecode_system::{BinaryOp, UnaryOp};
use core_types::number::{number_to_string, string_to_number, to_int32, to_uint32};
use core_types::{ObjectId, PropertyKey, Value};

use crate::error::{Exception, JsResult};
use crate::intrinsics::symbol::{HAS_INSTANCE, TO_PRIMITIVE};
use crate::object::ObjectKind;
use crate::vm::VM;

/// Hint passed to ToPrimitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    /// No preference (`+`, `==`)
    Default,
    /// Numeric context
    Number,
    /// String context
    String,
}

impl PreferredType {
    fn as_str(self) -> &'static str {
        match self {
            PreferredType::Default => "default",
            PreferredType::Number => "number",
            PreferredType::String => "string",
        }
    }
}

impl VM {
    /// ToPrimitive
    pub fn to_primitive(&mut self, value: &Value, hint: PreferredType) -> JsResult<Value> {
        if !value.is_object() {
            return Ok(value.clone());
        }
        let exotic = self.get_property(value, &PropertyKey::Symbol(TO_PRIMITIVE))?;
        if !exotic.is_nullish() {
            if !exotic.is_callable() {
                return Err(Exception::type_error(
                    "Symbol.toPrimitive is not a function",
                ));
            }
            let result = self.call_function(&exotic, value, &[Value::string(hint.as_str())])?;
            if result.is_object() {
                return Err(Exception::type_error(
                    "Cannot convert object to primitive value",
                ));
            }
            return Ok(result);
        }

        let order = match hint {
            PreferredType::String => ["toString", "valueOf"],
            _ => ["valueOf", "toString"],
        };
        for name in order {
            let method = self.get_property(value, &PropertyKey::from(name))?;
            if method.is_callable() {
                let result = self.call_function(&method, value, &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        Err(Exception::type_error(
            "Cannot convert object to primitive value",
        ))
    }

    /// ToNumber
    pub fn to_number(&mut self, value: &Value) -> JsResult<f64> {
        Ok(match value {
            Value::Undefined | Value::Hole => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Symbol(_) => {
                return Err(Exception::type_error(
                    "Cannot convert a Symbol value to a number",
                ))
            }
            Value::Object(_) | Value::Function(_) => {
                let primitive = self.to_primitive(value, PreferredType::Number)?;
                return self.to_number(&primitive);
            }
        })
    }

    /// ToString
    pub fn to_string(&mut self, value: &Value) -> JsResult<Rc<str>> {
        Ok(match value {
            Value::String(s) => s.clone(),
            Value::Symbol(_) => {
                return Err(Exception::type_error(
                    "Cannot convert a Symbol value to a string",
                ))
            }
            Value::Object(_) | Value::Function(_) => {
                let primitive = self.to_primitive(value, PreferredType::String)?;
                return self.to_string(&primitive);
            }
            primitive => Rc::from(primitive.to_string()),
        })
    }

    /// ToPropertyKey
    pub fn to_property_key(&mut self, value: &Value) -> JsResult<PropertyKey> {
        match value {
            Value::String(s) => Ok(PropertyKey::String(s.clone())),
            Value::Symbol(id) => Ok(PropertyKey::Symbol(*id)),
            Value::Number(n) => Ok(PropertyKey::String(Rc::from(number_to_string(*n)))),
            Value::Object(_) | Value::Function(_) => {
                let primitive = self.to_primitive(value, PreferredType::String)?;
                self.to_property_key(&primitive)
            }
            other => Ok(PropertyKey::String(Rc::from(other.to_string()))),
        }
    }

    /// ToInt32
    pub(crate) fn to_int32(&mut self, value: &Value) -> JsResult<i32> {
        Ok(to_int32(self.to_number(value)?))
    }

    /// ToUint32
    pub(crate) fn to_uint32(&mut self, value: &Value) -> JsResult<u32> {
        Ok(to_uint32(self.to_number(value)?))
    }

    /// Apply a binary operator
    pub(crate) fn binary_op(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value) -> JsResult<Value> {
        use BinaryOp::*;
        Ok(match op {
            Add => return self.add(lhs, rhs),
            Sub => Value::Number(self.to_number(lhs)? - self.to_number(rhs)?),
            Mul => Value::Number(self.to_number(lhs)? * self.to_number(rhs)?),
            Div => Value::Number(self.to_number(lhs)? / self.to_number(rhs)?),
            Mod => {
                let (a, b) = (self.to_number(lhs)?, self.to_number(rhs)?);
                // Rust's % truncates like the language's remainder
                Value::Number(a % b)
            }
            Exp => {
                let (a, b) = (self.to_number(lhs)?, self.to_number(rhs)?);
                if b.is_nan() || (a.abs() == 1.0 && b.is_infinite()) {
                    Value::Number(f64::NAN)
                } else {
                    Value::Number(a.powf(b))
                }
            }
            BitAnd => Value::from(self.to_int32(lhs)? & self.to_int32(rhs)?),
            BitOr => Value::from(self.to_int32(lhs)? | self.to_int32(rhs)?),
            BitXor => Value::from(self.to_int32(lhs)? ^ self.to_int32(rhs)?),
            Shl => {
                let (a, b) = (self.to_int32(lhs)?, self.to_uint32(rhs)?);
                Value::from(a.wrapping_shl(b & 31))
            }
            Shr => {
                let (a, b) = (self.to_int32(lhs)?, self.to_uint32(rhs)?);
                Value::from(a >> (b & 31))
            }
            UShr => {
                let (a, b) = (self.to_uint32(lhs)?, self.to_uint32(rhs)?);
                Value::Number(f64::from(a >> (b & 31)))
            }
            Eq => Value::Boolean(self.loose_equals(lhs, rhs)?),
            NotEq => Value::Boolean(!self.loose_equals(lhs, rhs)?),
            StrictEq => Value::Boolean(lhs == rhs),
            StrictNotEq => Value::Boolean(lhs != rhs),
            Lt => Value::Boolean(self.less_than(lhs, rhs, true)? == Some(true)),
            Gt => Value::Boolean(self.less_than(rhs, lhs, false)? == Some(true)),
            LtEq => Value::Boolean(self.less_than(rhs, lhs, false)? == Some(false)),
            GtEq => Value::Boolean(self.less_than(lhs, rhs, true)? == Some(false)),
            In => {
                let Some(target) = rhs.as_object() else {
                    return Err(Exception::type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        self.display_value(lhs),
                        self.display_value(rhs)
                    )));
                };
                let key = self.to_property_key(lhs)?;
                Value::Boolean(self.has_property(target, &key)?)
            }
            InstanceOf => Value::Boolean(self.instance_of(lhs, rhs)?),
        })
    }

    fn add(&mut self, lhs: &Value, rhs: &Value) -> JsResult<Value> {
        if let (Value::Number(a), Value::Number(b)) = (lhs, rhs) {
            return Ok(Value::Number(a + b));
        }
        let a = self.to_primitive(lhs, PreferredType::Default)?;
        let b = self.to_primitive(rhs, PreferredType::Default)?;
        if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) {
            let mut text = self.to_string(&a)?.to_string();
            text.push_str(&self.to_string(&b)?);
            return Ok(Value::from(text));
        }
        Ok(Value::Number(self.to_number(&a)? + self.to_number(&b)?))
    }

    /// Apply a unary operator
    pub(crate) fn unary_op(&mut self, op: UnaryOp, value: &Value) -> JsResult<Value> {
        Ok(match op {
            UnaryOp::Neg => Value::Number(-self.to_number(value)?),
            UnaryOp::Plus => Value::Number(self.to_number(value)?),
            UnaryOp::Not => Value::Boolean(!value.is_truthy()),
            UnaryOp::BitNot => Value::from(!self.to_int32(value)?),
            UnaryOp::TypeOf => Value::string(value.type_of()),
            UnaryOp::Void => Value::Undefined,
        })
    }

    /// Abstract equality (`==`)
    pub fn loose_equals(&mut self, lhs: &Value, rhs: &Value) -> JsResult<bool> {
        use Value::*;
        Ok(match (lhs, rhs) {
            (Undefined | Null, Undefined | Null) => true,
            (Undefined | Null, _) | (_, Undefined | Null) => false,
            (Number(_), String(s)) => lhs == &Number(string_to_number(s)),
            (String(s), Number(_)) => &Number(string_to_number(s)) == rhs,
            (Boolean(b), _) => {
                let n = Number(f64::from(u8::from(*b)));
                return self.loose_equals(&n, rhs);
            }
            (_, Boolean(b)) => {
                let n = Number(f64::from(u8::from(*b)));
                return self.loose_equals(lhs, &n);
            }
            (Number(_) | String(_) | Symbol(_), Object(_) | Function(_)) => {
                let primitive = self.to_primitive(rhs, PreferredType::Default)?;
                return self.loose_equals(lhs, &primitive);
            }
            (Object(_) | Function(_), Number(_) | String(_) | Symbol(_)) => {
                let primitive = self.to_primitive(lhs, PreferredType::Default)?;
                return self.loose_equals(&primitive, rhs);
            }
            _ => lhs == rhs,
        })
    }

    /// Abstract relational comparison `lhs < rhs`; `None` when either side
    /// is NaN. `left_first` fixes the order in which operands are coerced.
    fn less_than(&mut self, lhs: &Value, rhs: &Value, left_first: bool) -> JsResult<Option<bool>> {
        let (a, b) = if left_first {
            let a = self.to_primitive(lhs, PreferredType::Number)?;
            (a, self.to_primitive(rhs, PreferredType::Number)?)
        } else {
            let b = self.to_primitive(rhs, PreferredType::Number)?;
            (self.to_primitive(lhs, PreferredType::Number)?, b)
        };
        if let (Value::String(x), Value::String(y)) = (&a, &b) {
            // Code unit order, not code point order
            return Ok(Some(x.encode_utf16().lt(y.encode_utf16())));
        }
        let (x, y) = (self.to_number(&a)?, self.to_number(&b)?);
        if x.is_nan() || y.is_nan() {
            return Ok(None);
        }
        Ok(Some(x < y))
    }

    /// `value instanceof target`
    pub fn instance_of(&mut self, value: &Value, target: &Value) -> JsResult<bool> {
        if !target.is_object() {
            return Err(Exception::type_error(
                "Right-hand side of 'instanceof' is not an object",
            ));
        }
        let checker = self.get_property(target, &PropertyKey::Symbol(HAS_INSTANCE))?;
        if !checker.is_nullish() {
            let result = self.call_function(&checker, target, &[value.clone()])?;
            return Ok(result.is_truthy());
        }
        if !target.is_callable() {
            return Err(Exception::type_error(
                "Right-hand side of 'instanceof' is not callable",
            ));
        }
        self.ordinary_has_instance(target, value)
    }

    /// OrdinaryHasInstance; bound functions test against their target
    pub(crate) fn ordinary_has_instance(&mut self, target: &Value, value: &Value) -> JsResult<bool> {
        let Some(id) = target.as_object() else {
            return Ok(false);
        };
        if let Some(ObjectKind::Bound { target: inner, .. }) = self.kind(id) {
            let inner = inner.clone();
            return self.instance_of(value, &inner);
        }
        if !target.is_callable() {
            return Ok(false);
        }
        let Some(mut current) = value.as_object() else {
            return Ok(false);
        };
        let prototype = self.get_property(target, &PropertyKey::from("prototype"))?;
        let Some(prototype) = prototype.as_object() else {
            return Err(Exception::type_error(
                "Function has non-object prototype in instanceof check",
            ));
        };
        for _ in 0..self.config.max_prototype_chain {
            match self.get_prototype_of(current)? {
                Some(next) if next == prototype => return Ok(true),
                Some(next) => current = next,
                None => return Ok(false),
            }
        }
        Err(Exception::range_error("Maximum prototype chain length exceeded"))
    }

    /// Whether `id` is `prototype` or inherits from it
    pub(crate) fn inherits_from(&self, id: ObjectId, prototype: ObjectId) -> bool {
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(object) = current {
            if object == prototype {
                return true;
            }
            steps += 1;
            if steps > self.config.max_prototype_chain {
                return false;
            }
            current = self.heap.prototype_of(object);
        }
        false
    }
}
