//! Property-based tests

mod generations;
mod values;
