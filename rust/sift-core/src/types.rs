//! Static type tags for sift values.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Static type of a script-level expression or frame slot.
///
/// The checker has already validated every call this stage sees, so tags are
/// only consulted for per-type instruction selection and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TypeTag {
    Bool,
    Int,
    Count,
    Double,
    Time,
    Enum,
    Port,
    Addr,
    Subnet,
    String,
    Pattern,
    List,
    Record,
    /// Unconstrained type; only reachable through the generic call path.
    Any,
}

impl TypeTag {
    /// Fixed-width scalar types that render with a single formatter.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            TypeTag::Bool
                | TypeTag::Int
                | TypeTag::Count
                | TypeTag::Double
                | TypeTag::Time
                | TypeTag::Enum
                | TypeTag::Port
                | TypeTag::Addr
                | TypeTag::Subnet
        )
    }
}
