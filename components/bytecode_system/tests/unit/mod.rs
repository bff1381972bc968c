//! Unit tests for the bytecode system

mod test_builder;
mod test_verifier;
