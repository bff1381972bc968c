//! Upvalue support for closures
//!
//! This module provides the runtime structures for captured variables
//! in closures. Upvalues allow inner functions to access variables
//! from their enclosing scopes.

use std::cell::RefCell;
use std::rc::Rc;

use core_types::{ObjectId, Value};
use memory_manager::Tracer;

use crate::call_frame::{FunctionTemplate, ThisScope};

/// Register window of a frame, shared with the open upvalues that alias it
pub type Registers = Rc<RefCell<Vec<Value>>>;

/// Upvalue represents a captured variable from an outer scope
///
/// An upvalue can be in one of two states:
/// - Open: the variable still lives in a register of a live frame
/// - Closed: the frame was popped and the upvalue owns the last value
#[derive(Debug, Clone)]
pub enum Upvalue {
    /// Variable still lives in the owning frame's registers
    Open {
        /// Register window of the owning frame
        registers: Registers,
        /// Register index
        index: usize,
    },
    /// Variable outlived its frame
    Closed {
        /// Boxed value
        value: Value,
    },
}

impl Upvalue {
    /// Create a new open upvalue aliasing a register
    pub fn new_open(registers: Registers, index: usize) -> Self {
        Upvalue::Open { registers, index }
    }

    /// Close this upvalue by copying the register value into the upvalue
    ///
    /// Closing an already closed upvalue does nothing.
    pub fn close(&mut self) {
        if let Upvalue::Open { registers, index } = self {
            let value = registers
                .borrow()
                .get(*index)
                .cloned()
                .unwrap_or(Value::Undefined);
            *self = Upvalue::Closed { value };
        }
    }

    /// Get the value of this upvalue
    pub fn get(&self) -> Value {
        match self {
            Upvalue::Open { registers, index } => registers
                .borrow()
                .get(*index)
                .cloned()
                .unwrap_or(Value::Undefined),
            Upvalue::Closed { value } => value.clone(),
        }
    }

    /// Set the value of this upvalue
    pub fn set(&mut self, new_value: Value) {
        match self {
            Upvalue::Open { registers, index } => {
                if let Some(slot) = registers.borrow_mut().get_mut(*index) {
                    *slot = new_value;
                }
            }
            Upvalue::Closed { value } => *value = new_value,
        }
    }

    /// Check if this upvalue is still open
    pub fn is_open(&self) -> bool {
        matches!(self, Upvalue::Open { .. })
    }
}

/// A handle to a shared upvalue
pub type UpvalueHandle = Rc<RefCell<Upvalue>>;

/// Create a new upvalue handle
pub fn new_upvalue_handle(upvalue: Upvalue) -> UpvalueHandle {
    Rc::new(RefCell::new(upvalue))
}

/// Closure combines function code with its captured environment
#[derive(Debug, Clone)]
pub struct Closure {
    /// Compiled function plus its per-site caches
    pub template: Rc<FunctionTemplate>,
    /// Captured variables, in upvalue index order
    pub upvalues: Vec<UpvalueHandle>,
    /// `this`/`new.target`/home object of the defining frame (arrows only)
    pub lexical_scope: Option<Rc<ThisScope>>,
    /// Object whose prototype `super` property lookups start from
    pub home_object: Option<ObjectId>,
    /// Instance field initializer of a class constructor
    pub field_initializer: Option<ObjectId>,
}

impl Closure {
    /// Create a closure with the given template and upvalues
    pub fn new(template: Rc<FunctionTemplate>, upvalues: Vec<UpvalueHandle>) -> Self {
        Self {
            template,
            upvalues,
            lexical_scope: None,
            home_object: None,
            field_initializer: None,
        }
    }

    /// Report every object reachable from the closure
    pub fn trace(&self, tracer: &mut Tracer) {
        for upvalue in &self.upvalues {
            trace_upvalue(upvalue, tracer);
        }
        if let Some(scope) = &self.lexical_scope {
            scope.trace(tracer);
        }
        if let Some(home) = self.home_object {
            tracer.mark(home);
        }
        if let Some(initializer) = self.field_initializer {
            tracer.mark(initializer);
        }
    }
}

/// Report the value held by an upvalue
pub(crate) fn trace_upvalue(upvalue: &UpvalueHandle, tracer: &mut Tracer) {
    match &*upvalue.borrow() {
        Upvalue::Open { registers, .. } => tracer.mark_values(registers.borrow().iter()),
        Upvalue::Closed { value } => tracer.mark_value(value),
    }
}
