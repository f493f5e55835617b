//! Sift Core
//!
//! Shared value and type model used across the compiler and the VM, plus
//! the pure string helpers that back both compile-time constant folding and
//! run-time builtin execution.

pub mod strings;
pub mod types;
pub mod values;
