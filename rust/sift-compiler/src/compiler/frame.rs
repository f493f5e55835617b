//! Frame-slot allocator for one function body.
//!
//! Assigns a numeric frame slot to each live variable on first use. The
//! surrounding compiler owns variable liveness; this stage only needs
//! `slot_of` to be stable within a body.

use crate::compiler::diagnostics::SpecializeError;
use std::collections::HashMap;

/// Maximum number of frame slots per function body.
pub const MAX_SLOTS: u32 = 1 << 20;

/// Slot allocation state for a single function body.
#[derive(Debug)]
pub struct FrameAlloc {
    next_slot: u32,
    bindings: HashMap<String, u32>,
    func_name: String,
}

impl Default for FrameAlloc {
    fn default() -> Self {
        Self::new("<anonymous>")
    }
}

impl FrameAlloc {
    pub fn new(func_name: &str) -> Self {
        Self {
            next_slot: 0,
            bindings: HashMap::new(),
            func_name: func_name.to_string(),
        }
    }

    /// Slot for a named variable, assigning the next free slot on first use.
    pub fn slot_of(&mut self, name: &str) -> Result<u32, SpecializeError> {
        if let Some(&slot) = self.bindings.get(name) {
            return Ok(slot);
        }
        let slot = self.fresh()?;
        self.bindings.insert(name.to_string(), slot);
        Ok(slot)
    }

    /// Allocate an anonymous temporary slot.
    pub fn alloc_temp(&mut self) -> Result<u32, SpecializeError> {
        self.fresh()
    }

    fn fresh(&mut self) -> Result<u32, SpecializeError> {
        if self.next_slot == MAX_SLOTS {
            return Err(SpecializeError::FrameOverflow {
                func: self.func_name.clone(),
                max: MAX_SLOTS,
            });
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        Ok(slot)
    }

    /// Look up a binding without allocating.
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.bindings.get(name).copied()
    }

    /// Number of slots used so far.
    pub fn max_slots(&self) -> u32 {
        self.next_slot
    }
}
