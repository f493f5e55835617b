//! Compiled-body serialization to canonical JSON.

use crate::compiler::ir::CompiledBody;

/// Emit a compiled body as pretty-printed JSON.
pub fn emit_json(body: &CompiledBody) -> String {
    serde_json::to_string_pretty(body).unwrap_or_else(|e| {
        panic!("Failed to serialize compiled body: {}", e);
    })
}

/// Emit a compiled body as compact canonical JSON (for hashing/caching).
pub fn emit_canonical_json(body: &CompiledBody) -> String {
    serde_json::to_string(body).unwrap_or_else(|e| {
        panic!("Failed to serialize compiled body: {}", e);
    })
}
