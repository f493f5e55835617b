//! Diagnostics surfaced by the specialization stage.
//!
//! Warnings are recorded and compilation proceeds; `SpecializeError` values
//! are compiler defects (states the stage declares unreachable for a correct
//! front end) and abort compilation of the unit. Declination is neither: a
//! handler that cannot specialize simply reports `Ok(false)` and the generic
//! call path takes over.

use thiserror::Error;

/// Non-fatal diagnostics reported to the script author.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    /// A pure, value-producing builtin was called without consuming its
    /// result. The call compiles to nothing.
    #[error("return value of built-in function `{builtin}` is ignored")]
    DiscardedValue { builtin: String },
}

/// Fatal internal errors. None of these are reachable from a well-formed,
/// type-checked input; hitting one means a bug in the compiler, not in the
/// script.
#[derive(Debug, Error)]
pub enum SpecializeError {
    #[error("builtin `{builtin}` dispatched with {got} arguments, expected {expected}")]
    ArityMismatch { builtin: &'static str, expected: usize, got: usize },

    #[error("value-producing builtin `{builtin}` dispatched without a destination")]
    MissingDestination { builtin: &'static str },

    #[error("function `{func}` exceeds the {max} frame slot limit")]
    FrameOverflow { func: String, max: u32 },
}
