//! Instruction model for the sift register VM.
//!
//! Wide-format instructions: an opcode, up to four integer operand fields
//! (frame slots or embedded constants, as recorded by the layout tag), an
//! optional inline constant value, and an optional auxiliary payload for
//! dynamic-arity operations. Instructions are immutable once emitted and
//! owned by the compiled body's instruction stream.

use crate::compiler::cat::CatRender;
use crate::compiler::specialize::Builtin;
use serde::{Deserialize, Serialize};
use sift_core::types::TypeTag;
use sift_core::values::Value;
use strum_macros::Display;

/// Opcodes emitted by the specialization stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Op {
    // Constants
    LoadConst, // dest; konst: the value to load

    // Analyzer queries
    AnalyzerName, // dest, tag-slot; ty: tag type

    // Log plumbing
    FlushLogs,         // dest
    FlushLogsVoid,     //
    LogWrite,          // dest, stream-slot, columns-slot; ty: columns type
    LogWriteConst,     // dest, columns-slot; aux[0]: stream constant
    LogWriteVoid,      // stream-slot, columns-slot; ty: columns type
    LogWriteConstVoid, // columns-slot; konst: stream constant

    // File reassembly configuration
    EnableReassembly,         // file-slot
    SetReassemblyBuffer,      // file-slot, size-slot
    SetReassemblyBufferConst, // file-slot, size (embedded)

    // Concatenation
    Cat1Const, // dest; konst: pre-rendered string
    Cat1Full,  // dest, src-slot; ty: operand type (rendered at run time)
    Cat1,      // dest, src-slot (string pass-through)
    Cat2,      // dest; aux: 2 operands + converters
    Cat3,      // dest; aux: 3 operands + converters
    Cat4,      // dest; aux: 4 operands + converters
    Cat5,      // dest; aux: 5 operands + converters
    Cat6,      // dest; aux: 6 operands + converters
    Cat7,      // dest; aux: 7 operands + converters
    Cat8,      // dest; aux: 8 operands + converters
    CatN,      // dest; aux: N operands + converters

    // Environment queries
    CurrentTime,        // dest
    NetworkTime,        // dest
    ReadingLiveTraffic, // dest
    ReadingTraces,      // dest
    PortProtocol,       // dest, port-slot

    // Substring search: slot operand always precedes the constant
    Strstr,            // dest, big-slot, little-slot
    StrstrConstLittle, // dest, big-slot; konst: little
    StrstrConstBig,    // dest, little-slot; konst: big

    // Substring extraction, one variant per constant-position combination
    SubBytes,                 // dest, s-slot, start-slot, n-slot
    SubBytesLenImm,           // dest, s-slot, start-slot, n (embedded)
    SubBytesStartImm,         // dest, s-slot, n-slot, start (embedded)
    SubBytesStartLenImm,      // dest, s-slot, start (embedded), n (embedded)
    SubBytesConst,            // dest, start-slot, n-slot; konst: s
    SubBytesConstLenImm,      // dest, start-slot, n (embedded); konst: s
    SubBytesConstStartImm,    // dest, n-slot, start (embedded); konst: s
    SubBytesConstStartLenImm, // dest, start (embedded), n (embedded); konst: s

    // Case transform
    ToLower, // dest, src-slot

    // Generic builtin call (the always-correct fallback path)
    CallBuiltin,     // dest; aux: callee + operands
    CallBuiltinVoid, // aux: callee + operands
}

/// Operand-field layout: which of the four fields hold frame slots and
/// which hold embedded integers, and whether an inline constant follows.
/// Lowercase positions are embedded integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[allow(clippy::enum_variant_names)]
pub enum OpLayout {
    X,        // no operands
    V,        // one slot
    Vc,       // one slot + inline constant
    Vv,       // two slots
    VvI2,     // slot, embedded int
    Vvc,      // two slots + inline constant
    Vvv,      // three slots
    Vvvc,     // three slots + inline constant
    VvvcI3,   // slot, slot, embedded int + inline constant
    VvvcI2I3, // slot, embedded int, embedded int + inline constant
    Vvvv,     // four slots
    VvvvI4,   // three slots, embedded int
    VvvvI3I4, // two slots, embedded int, embedded int
}

/// One entry of an auxiliary payload: a constant, or a typed frame slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuxItem {
    Const(Value),
    Slot { slot: u32, ty: TypeTag },
}

/// Variable-length payload attached to one instruction. Owned exclusively
/// by its instruction; destroyed with it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuxData {
    /// Per-operand constants and slots, in argument order.
    pub items: Vec<AuxItem>,
    /// Converters parallel to `items`; populated only for concatenation.
    pub renders: Vec<CatRender>,
    /// Callee of a generic builtin call.
    pub callee: Option<Builtin>,
}

impl AuxData {
    pub fn with_items(items: Vec<AuxItem>) -> Self {
        Self { items, ..Self::default() }
    }
}

/// A single emitted instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: Op,
    pub layout: OpLayout,
    pub v1: i64,
    pub v2: i64,
    pub v3: i64,
    pub v4: i64,
    /// Inline embedded constant, when the layout carries one.
    pub konst: Option<Value>,
    /// Auxiliary payload for dynamic-arity operations.
    pub aux: Option<AuxData>,
    /// Type annotation consulted by the VM for type-specific dispatch.
    pub ty: Option<TypeTag>,
}

impl Instruction {
    fn raw(op: Op, layout: OpLayout, v1: i64, v2: i64, v3: i64, v4: i64) -> Self {
        Self { op, layout, v1, v2, v3, v4, konst: None, aux: None, ty: None }
    }

    pub fn x(op: Op) -> Self {
        Self::raw(op, OpLayout::X, 0, 0, 0, 0)
    }

    pub fn v(op: Op, v1: u32) -> Self {
        Self::raw(op, OpLayout::V, v1 as i64, 0, 0, 0)
    }

    pub fn vv(op: Op, v1: u32, v2: i64) -> Self {
        Self::raw(op, OpLayout::Vv, v1 as i64, v2, 0, 0)
    }

    pub fn vvv(op: Op, v1: u32, v2: i64, v3: i64) -> Self {
        Self::raw(op, OpLayout::Vvv, v1 as i64, v2, v3, 0)
    }

    pub fn vvvv(op: Op, v1: u32, v2: i64, v3: i64, v4: i64) -> Self {
        Self::raw(op, OpLayout::Vvvv, v1 as i64, v2, v3, v4)
    }

    pub fn with_layout(mut self, layout: OpLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_const(mut self, value: Value) -> Self {
        self.konst = Some(value);
        self
    }

    pub fn with_aux(mut self, aux: AuxData) -> Self {
        self.aux = Some(aux);
        self
    }

    pub fn with_type(mut self, ty: TypeTag) -> Self {
        self.ty = Some(ty);
        self
    }
}

/// A fully compiled function body: the instruction stream plus the frame
/// size it needs. Lifetime of every instruction equals the lifetime of the
/// body that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledBody {
    pub name: String,
    pub slots: u32,
    pub instructions: Vec<Instruction>,
}
