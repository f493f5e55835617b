//! Sift VM
//!
//! Register VM executing the instruction streams produced by the compiler's
//! specialization stage, including the generic builtin-call path. Doubles
//! as the oracle for verifying that specialized instruction sequences are
//! observationally identical to generic calls.

pub mod builtins;
pub mod vm;

pub use vm::{LogEntry, ReassemblyConfig, Vm, VmError};
