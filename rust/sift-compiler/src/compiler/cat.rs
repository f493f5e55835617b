//! Converter catalogue for the variadic `cat` builtin.
//!
//! Each concatenation operand gets one converter, chosen at compile time
//! from its static type. That moves the per-operand type dispatch out of
//! the execution loop: at run time the VM just walks the converter list.

use serde::{Deserialize, Serialize};
use sift_core::types::TypeTag;
use sift_core::values::Value;

/// A per-operand rendering strategy, fixed at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CatRender {
    /// Constant operand, rendered during compilation. The stored text is
    /// the final contribution to the result.
    Literal(String),
    /// Fixed-width scalar rendering for the given type.
    Fixed(TypeTag),
    /// Identity pass-through for string operands.
    StringId,
    /// Pattern source rendering (`/text/`).
    Pattern,
    /// Generic describe fallback for every type without a dedicated
    /// renderer. Keeps the catalogue total.
    Describe(TypeTag),
}

impl CatRender {
    /// Select the converter for a slot-resident operand of static type `ty`.
    pub fn for_type(ty: TypeTag) -> CatRender {
        match ty {
            TypeTag::Bool
            | TypeTag::Int
            | TypeTag::Count
            | TypeTag::Double
            | TypeTag::Time
            | TypeTag::Enum
            | TypeTag::Port
            | TypeTag::Addr
            | TypeTag::Subnet => CatRender::Fixed(ty),
            TypeTag::String => CatRender::StringId,
            TypeTag::Pattern => CatRender::Pattern,
            TypeTag::List | TypeTag::Record | TypeTag::Any => CatRender::Describe(ty),
        }
    }

    /// Render one operand. Pure; `Literal` ignores the value entirely.
    pub fn render_value(&self, v: &Value) -> String {
        match self {
            CatRender::Literal(text) => text.clone(),
            CatRender::Fixed(_) | CatRender::StringId | CatRender::Pattern => v.render(),
            CatRender::Describe(_) => v.describe(),
        }
    }
}
