//! Unit tests for the number conversions used by the operators

use core_types::number::{number_to_string, string_to_number, to_int32, to_uint32};

#[test]
fn test_unsigned_shift_operand() {
    // (-1) >>> 0
    assert_eq!(to_uint32(-1.0) >> 0, 4294967295);
}

#[test]
fn test_signed_shift_operand() {
    // (-5) >> 1
    assert_eq!(to_int32(-5.0) >> 1, -3);
}

#[test]
fn test_wraparound() {
    assert_eq!(to_int32(4294967296.0 + 5.0), 5);
    assert_eq!(to_int32(-4294967297.0), -1);
    assert_eq!(to_uint32(1e300), 0);
}

#[test]
fn test_formatting_matches_script_output() {
    assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
    assert_eq!(number_to_string(-1e-7), "-1e-7");
    assert_eq!(number_to_string(123456789012345680000.0), "123456789012345680000");
}

#[test]
fn test_parsing() {
    assert_eq!(string_to_number("\n 1e3 \t"), 1000.0);
    assert_eq!(string_to_number("0b101"), 5.0);
    assert!(string_to_number("0x").is_nan());
    assert!(string_to_number("1 2").is_nan());
}
