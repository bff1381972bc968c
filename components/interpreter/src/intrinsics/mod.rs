//! Built-in objects
//!
//! [`install`] builds the global object and the intrinsic prototypes and
//! constructors straight into a fresh heap, before the [`VM`] exists.
//! Built-ins use the host function ABI from [`crate::object`].

pub(crate) mod array;
pub(crate) mod error;
pub(crate) mod function;
pub(crate) mod object;
pub(crate) mod promise;
pub(crate) mod symbol;

use std::rc::Rc;

use core_types::{ErrorKind, ObjectId, PropertyKey, SymbolId, Value};
use memory_manager::{Heap, Property};

use crate::error::JsResult;
use crate::iterator::array_iterator_next;
use crate::object::{
    ArrayStore, NativeConstructorFn, NativeFn, NativeFunction, ObjectKind, ResumeMode,
};
use crate::proxy::{proxy_call_without_new, proxy_constructor};
use crate::vm::VM;

/// Well-known objects the engine refers to directly
#[derive(Debug, Clone)]
pub struct Intrinsics {
    pub global: ObjectId,
    pub object_prototype: ObjectId,
    pub function_prototype: ObjectId,
    pub array_prototype: ObjectId,
    pub string_prototype: ObjectId,
    pub number_prototype: ObjectId,
    pub boolean_prototype: ObjectId,
    pub symbol_prototype: ObjectId,
    pub iterator_prototype: ObjectId,
    pub array_iterator_prototype: ObjectId,
    pub generator_prototype: ObjectId,
    pub promise_prototype: ObjectId,
    pub error_prototype: ObjectId,
    pub type_error_prototype: ObjectId,
    pub reference_error_prototype: ObjectId,
    pub range_error_prototype: ObjectId,
    pub syntax_error_prototype: ObjectId,
    pub aggregate_error_prototype: ObjectId,
}

impl Intrinsics {
    /// Prototype for Error objects of `kind`
    pub fn error_prototype(&self, kind: ErrorKind) -> ObjectId {
        match kind {
            ErrorKind::TypeError => self.type_error_prototype,
            ErrorKind::ReferenceError => self.reference_error_prototype,
            ErrorKind::RangeError => self.range_error_prototype,
            ErrorKind::SyntaxError => self.syntax_error_prototype,
            ErrorKind::AggregateError => self.aggregate_error_prototype,
            ErrorKind::Error | ErrorKind::InternalError => self.error_prototype,
        }
    }

    /// Objects that must survive every collection
    pub fn roots(&self) -> Vec<ObjectId> {
        vec![
            self.global,
            self.object_prototype,
            self.function_prototype,
            self.array_prototype,
            self.string_prototype,
            self.number_prototype,
            self.boolean_prototype,
            self.symbol_prototype,
            self.iterator_prototype,
            self.array_iterator_prototype,
            self.generator_prototype,
            self.promise_prototype,
            self.error_prototype,
            self.type_error_prototype,
            self.reference_error_prototype,
            self.range_error_prototype,
            self.syntax_error_prototype,
            self.aggregate_error_prototype,
        ]
    }
}

/// Argument `index`, `undefined` when missing
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

/// Allocate a native function object with `length` and `name`
pub(crate) fn alloc_native(
    heap: &mut Heap<ObjectKind>,
    function_prototype: ObjectId,
    native: NativeFunction,
    arity: u32,
) -> ObjectId {
    let name = Value::String(native.name.clone());
    let id = heap.allocate(Some(function_prototype), ObjectKind::Native(native));
    heap.define(
        id,
        "length".into(),
        Property::with_attributes(Value::Number(f64::from(arity)), false, false, true),
    );
    heap.define(id, "name".into(), Property::with_attributes(name, false, false, true));
    id
}

/// Helper for wiring up built-ins
pub(crate) struct Installer<'a> {
    pub heap: &'a mut Heap<ObjectKind>,
    pub function_prototype: ObjectId,
}

impl Installer<'_> {
    pub fn function(&mut self, name: &str, call: NativeFn, arity: u32) -> ObjectId {
        alloc_native(
            self.heap,
            self.function_prototype,
            NativeFunction::new(name, call),
            arity,
        )
    }

    /// Non-enumerable method `name` on `target`
    pub fn method(&mut self, target: ObjectId, name: &str, call: NativeFn, arity: u32) -> ObjectId {
        let function = self.function(name, call, arity);
        self.value(target, name, Value::Function(function));
        function
    }

    /// Method keyed by a well-known symbol
    pub fn symbol_method(
        &mut self,
        target: ObjectId,
        symbol: SymbolId,
        name: &str,
        call: NativeFn,
        arity: u32,
    ) -> ObjectId {
        let function = self.function(name, call, arity);
        self.heap.define(
            target,
            PropertyKey::Symbol(symbol),
            Property::hidden(Value::Function(function)),
        );
        function
    }

    /// Constructor linked both ways with `prototype`
    pub fn constructor(
        &mut self,
        name: &str,
        call: NativeFn,
        construct: NativeConstructorFn,
        arity: u32,
        prototype: ObjectId,
    ) -> ObjectId {
        let native = NativeFunction::new(name, call).with_construct(construct);
        let function = alloc_native(self.heap, self.function_prototype, native, arity);
        self.heap.define(
            function,
            "prototype".into(),
            Property::with_attributes(Value::Object(prototype), false, false, false),
        );
        self.value(prototype, "constructor", Value::Function(function));
        function
    }

    /// Writable, configurable, non-enumerable data property
    pub fn value(&mut self, target: ObjectId, name: &str, value: Value) {
        self.heap.define(target, name.into(), Property::hidden(value));
    }

    /// Read-only, non-configurable data property
    pub fn constant(&mut self, target: ObjectId, key: PropertyKey, value: Value) {
        self.heap
            .define(target, key, Property::with_attributes(value, false, false, false));
    }

    /// Read-only `[Symbol.toStringTag]`
    pub fn to_string_tag(&mut self, target: ObjectId, tag: &str) {
        self.heap.define(
            target,
            PropertyKey::Symbol(symbol::TO_STRING_TAG),
            Property::with_attributes(Value::string(tag), false, false, true),
        );
    }

    pub fn object(&mut self, prototype: Option<ObjectId>) -> ObjectId {
        self.heap.allocate(prototype, ObjectKind::Ordinary)
    }
}

/// Build the global object and every intrinsic
pub(crate) fn install(heap: &mut Heap<ObjectKind>, symbols: &mut Vec<Option<Rc<str>>>) -> Intrinsics {
    symbol::register_well_known(symbols);

    let object_prototype = heap.allocate(None, ObjectKind::Ordinary);
    let function_prototype = heap.allocate(
        Some(object_prototype),
        ObjectKind::Native(NativeFunction::new("", function::empty)),
    );
    let mut installer = Installer {
        heap,
        function_prototype,
    };
    let global = installer.object(Some(object_prototype));

    let array_prototype = installer.heap.allocate(
        Some(object_prototype),
        ObjectKind::Array(ArrayStore::default()),
    );
    let string_prototype = installer.object(Some(object_prototype));
    let number_prototype = installer.object(Some(object_prototype));
    let boolean_prototype = installer.object(Some(object_prototype));
    let symbol_prototype = installer.object(Some(object_prototype));
    let promise_prototype = installer.object(Some(object_prototype));

    let iterator_prototype = installer.object(Some(object_prototype));
    installer.symbol_method(
        iterator_prototype,
        symbol::ITERATOR,
        "[Symbol.iterator]",
        return_this,
        0,
    );
    let array_iterator_prototype = installer.object(Some(iterator_prototype));
    installer.method(array_iterator_prototype, "next", array_iterator_next, 0);
    installer.to_string_tag(array_iterator_prototype, "Array Iterator");

    let generator_prototype = installer.object(Some(iterator_prototype));
    installer.method(generator_prototype, "next", generator_next, 1);
    installer.method(generator_prototype, "return", generator_return, 1);
    installer.method(generator_prototype, "throw", generator_throw, 1);
    installer.to_string_tag(generator_prototype, "Generator");

    object::install(&mut installer, global, object_prototype);
    function::install(&mut installer, global);
    array::install(&mut installer, global, array_prototype);
    symbol::install(&mut installer, global, symbol_prototype);
    promise::install(&mut installer, global, promise_prototype);
    let errors = error::install(&mut installer, global, object_prototype);

    let proxy = alloc_native(
        installer.heap,
        function_prototype,
        NativeFunction::new("Proxy", proxy_call_without_new).with_construct(proxy_constructor),
        2,
    );
    installer.value(global, "Proxy", Value::Function(proxy));

    installer.value(global, "globalThis", Value::Object(global));
    installer.constant(global, "NaN".into(), Value::Number(f64::NAN));
    installer.constant(global, "Infinity".into(), Value::Number(f64::INFINITY));
    installer.constant(global, "undefined".into(), Value::Undefined);

    Intrinsics {
        global,
        object_prototype,
        function_prototype,
        array_prototype,
        string_prototype,
        number_prototype,
        boolean_prototype,
        symbol_prototype,
        iterator_prototype,
        array_iterator_prototype,
        generator_prototype,
        promise_prototype,
        error_prototype: errors.error,
        type_error_prototype: errors.type_error,
        reference_error_prototype: errors.reference_error,
        range_error_prototype: errors.range_error,
        syntax_error_prototype: errors.syntax_error,
        aggregate_error_prototype: errors.aggregate_error,
    }
}

/// `%IteratorPrototype%[Symbol.iterator]`
fn return_this(_vm: &mut VM, this: &Value, _args: &[Value]) -> JsResult<Value> {
    Ok(this.clone())
}

fn generator_next(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    vm.resume_generator(this, ResumeMode::Next, arg(args, 0))
}

fn generator_return(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    vm.resume_generator(this, ResumeMode::Return, arg(args, 0))
}

fn generator_throw(vm: &mut VM, this: &Value, args: &[Value]) -> JsResult<Value> {
    vm.resume_generator(this, ResumeMode::Throw, arg(args, 0))
}
