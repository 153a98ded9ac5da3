// Common utilities shared by the derive implementations
//
// This module contains:
// - parse_utils: Attribute and list parsing helpers

mod parse_utils;

pub use parse_utils::*;
