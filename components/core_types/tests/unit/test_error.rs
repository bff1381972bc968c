//! Unit tests for JsError and ErrorKind

use core_types::{ErrorKind, JsError, StackFrame};

#[test]
fn test_display_includes_kind_name() {
    let error = JsError::range_error("Maximum call stack size exceeded");
    assert_eq!(error.to_string(), "RangeError: Maximum call stack size exceeded");
}

#[test]
fn test_constructible_kinds_exclude_internal() {
    assert!(!ErrorKind::CONSTRUCTIBLE.contains(&ErrorKind::InternalError));
    assert!(ErrorKind::CONSTRUCTIBLE.contains(&ErrorKind::AggregateError));
}

#[test]
fn test_stack_trace_lists_frames_in_order() {
    let frames = vec![
        StackFrame {
            function_name: Some("inner".to_string()),
            source_url: None,
            line: 2,
            column: 1,
        },
        StackFrame {
            function_name: Some("outer".to_string()),
            source_url: None,
            line: 9,
            column: 4,
        },
    ];
    let error = JsError::type_error("boom").with_stack(frames);
    let trace = error.stack_trace();
    let lines: Vec<&str> = trace.lines().collect();
    assert_eq!(lines[0], "TypeError: boom");
    assert_eq!(lines[1], "    at inner (2:1)");
    assert_eq!(lines[2], "    at outer (9:4)");
}
