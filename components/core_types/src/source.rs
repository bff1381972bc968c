//! Source positions and stack frames for error reporting.

use std::fmt;

/// A position in the source the bytecode was compiled from.
///
/// # Examples
///
/// ```
/// use core_types::SourcePosition;
///
/// let pos = SourcePosition::new(10, 5);
/// assert_eq!(pos.line, 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
    /// Byte offset from the start of the source
    pub offset: usize,
}

impl SourcePosition {
    /// Creates a position without a byte offset.
    pub fn new(line: u32, column: u32) -> Self {
        SourcePosition {
            line,
            column,
            offset: 0,
        }
    }
}

/// A single frame of a captured call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Function name, `None` for anonymous functions
    pub function_name: Option<String>,
    /// Script URL if the embedder provided one
    pub source_url: Option<String>,
    /// Line number
    pub line: u32,
    /// Column number
    pub column: u32,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.function_name.as_deref().unwrap_or("<anonymous>");
        match &self.source_url {
            Some(url) => write!(f, "{} ({}:{}:{})", name, url, self.line, self.column),
            None => write!(f, "{} ({}:{})", name, self.line, self.column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_frame_display() {
        let frame = StackFrame {
            function_name: None,
            source_url: Some("main.ts".to_string()),
            line: 1,
            column: 2,
        };
        assert_eq!(frame.to_string(), "<anonymous> (main.ts:1:2)");
    }
}
