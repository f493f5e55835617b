//! Compiler internals: the input AST contract, the frame-slot allocator,
//! the instruction model, and the specialization stage itself.

pub mod ast;
pub mod cat;
pub mod diagnostics;
pub mod emit;
pub mod frame;
pub mod ir;
pub mod specialize;
