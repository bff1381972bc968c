//! Engine configuration
//!
//! Limits and switches read by the VM. Every field has a default, so a
//! partial JSON or TOML document deserializes into a complete config.

use serde::{Deserialize, Serialize};

/// Tunable limits and feature switches
///
/// # Example
///
/// ```
/// use interpreter::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_max_call_depth(500)
///     .with_inline_caches(false);
/// assert_eq!(config.max_call_depth, 500);
/// assert!(!config.inline_caches);
/// assert!(config.verify_bytecode);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames on the VM stack before RangeError
    pub max_call_depth: usize,
    /// Nested native re-entries (host calls, accessors, generator resumes)
    pub max_native_depth: usize,
    /// Prototype links followed by a single lookup before RangeError
    pub max_prototype_chain: usize,
    /// Use per-site inline caches for named property access
    pub inline_caches: bool,
    /// Run the bytecode verifier before executing a chunk
    pub verify_bytecode: bool,
    /// Drain the microtask queue when `execute` finishes
    pub drain_microtasks_on_execute: bool,
    /// Record rejected promises that never got a handler
    pub track_unhandled_rejections: bool,
}

impl EngineConfig {
    /// Set the frame limit
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Set the native re-entry limit
    pub fn with_max_native_depth(mut self, depth: usize) -> Self {
        self.max_native_depth = depth;
        self
    }

    /// Set the prototype chain limit
    pub fn with_max_prototype_chain(mut self, length: usize) -> Self {
        self.max_prototype_chain = length;
        self
    }

    /// Enable or disable inline caches
    pub fn with_inline_caches(mut self, enabled: bool) -> Self {
        self.inline_caches = enabled;
        self
    }

    /// Enable or disable bytecode verification
    pub fn with_verify_bytecode(mut self, enabled: bool) -> Self {
        self.verify_bytecode = enabled;
        self
    }

    /// Enable or disable the microtask drain after `execute`
    pub fn with_drain_microtasks_on_execute(mut self, enabled: bool) -> Self {
        self.drain_microtasks_on_execute = enabled;
        self
    }

    /// Enable or disable unhandled rejection tracking
    pub fn with_track_unhandled_rejections(mut self, enabled: bool) -> Self {
        self.track_unhandled_rejections = enabled;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 10_000,
            max_native_depth: 256,
            max_prototype_chain: 10_000,
            inline_caches: true,
            verify_bytecode: true,
            drain_microtasks_on_execute: true,
            track_unhandled_rejections: true,
        }
    }
}
