//! Sift Compiler — builtin-call specialization stage.
//!
//! Takes type-checked call statements from the front end and selects
//! instructions for the sift register VM. Calls to catalogued builtin
//! functions whose operand shapes permit are rewritten into specialized
//! instruction sequences; everything else falls back to the generic call
//! path, which is always correct.

pub mod compiler;

pub use compiler::diagnostics::{SpecializeError, Warning};
pub use compiler::specialize::FnCompiler;
