//! Own-property records.

use core_types::Value;

/// Storage of one own property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertySlot {
    /// Data property
    Data {
        /// Current value
        value: Value,
        /// Whether assignment may change the value
        writable: bool,
    },
    /// Accessor property; `Undefined` stands for a missing half
    Accessor {
        /// Getter function or undefined
        getter: Value,
        /// Setter function or undefined
        setter: Value,
    },
}

/// An own property: storage plus the shared attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Data or accessor storage
    pub slot: PropertySlot,
    /// Visible to for-in and `Object.keys`
    pub enumerable: bool,
    /// May be deleted or redefined
    pub configurable: bool,
}

impl Property {
    /// Writable, enumerable, configurable data property (plain assignment).
    pub fn data(value: Value) -> Self {
        Self::with_attributes(value, true, true, true)
    }

    /// Writable, configurable, non-enumerable data property (methods).
    pub fn hidden(value: Value) -> Self {
        Self::with_attributes(value, true, false, true)
    }

    /// Data property with explicit attributes.
    pub fn with_attributes(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Property {
            slot: PropertySlot::Data { value, writable },
            enumerable,
            configurable,
        }
    }

    /// Accessor property.
    pub fn accessor(getter: Value, setter: Value, enumerable: bool, configurable: bool) -> Self {
        Property {
            slot: PropertySlot::Accessor { getter, setter },
            enumerable,
            configurable,
        }
    }

    /// The value of a data property.
    pub fn value(&self) -> Option<&Value> {
        match &self.slot {
            PropertySlot::Data { value, .. } => Some(value),
            PropertySlot::Accessor { .. } => None,
        }
    }

    /// Returns true for data properties.
    pub fn is_data(&self) -> bool {
        matches!(self.slot, PropertySlot::Data { .. })
    }

    /// Returns true for writable data properties.
    pub fn is_writable(&self) -> bool {
        matches!(self.slot, PropertySlot::Data { writable: true, .. })
    }

    /// Whether two records agree on kind and attributes, so that replacing
    /// one with the other keeps the object's layout.
    pub fn same_layout(&self, other: &Property) -> bool {
        let same_kind = match (&self.slot, &other.slot) {
            (PropertySlot::Data { writable: a, .. }, PropertySlot::Data { writable: b, .. }) => a == b,
            (PropertySlot::Accessor { .. }, PropertySlot::Accessor { .. }) => true,
            _ => false,
        };
        same_kind && self.enumerable == other.enumerable && self.configurable == other.configurable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_comparison() {
        let a = Property::data(Value::Number(1.0));
        let b = Property::data(Value::Number(2.0));
        let frozen = Property::with_attributes(Value::Number(1.0), false, true, false);
        assert!(a.same_layout(&b));
        assert!(!a.same_layout(&frozen));
        let acc = Property::accessor(Value::Undefined, Value::Undefined, true, true);
        assert!(acc.same_layout(&acc.clone()));
        assert!(!acc.same_layout(&a));
    }
}
