//! Tagged value representation shared by the compiler and the VM.
//!
//! Constants embedded in instructions and values living in VM frame slots
//! use the same representation, so compile-time folding and run-time
//! execution render identically by construction.

use crate::types::TypeTag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use strum_macros::Display;

/// Transport protocol of a port value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
    Icmp,
    Unknown,
}

/// Runtime and constant values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Count(u64),
    Double(f64),
    /// Seconds since the epoch.
    Time(f64),
    /// Enum values carry their declared label.
    Enum(String),
    Port { number: u16, proto: Transport },
    Addr(IpAddr),
    Subnet { prefix: IpAddr, width: u8 },
    Str(String),
    /// Pattern source text, without the surrounding slashes.
    Pattern(String),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Count(_) => TypeTag::Count,
            Value::Double(_) => TypeTag::Double,
            Value::Time(_) => TypeTag::Time,
            Value::Enum(_) => TypeTag::Enum,
            Value::Port { .. } => TypeTag::Port,
            Value::Addr(_) => TypeTag::Addr,
            Value::Subnet { .. } => TypeTag::Subnet,
            Value::Str(_) => TypeTag::String,
            Value::Pattern(_) => TypeTag::Pattern,
            Value::List(_) => TypeTag::List,
            Value::Record(_) => TypeTag::Record,
        }
    }

    /// Concatenation rendering for scalar and string types.
    ///
    /// This is the run-time counterpart of the compile-time constant
    /// rendering done during specialization; the two must agree, so both go
    /// through here.
    pub fn render(&self) -> String {
        match self {
            Value::Bool(b) => if *b { "T" } else { "F" }.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Count(n) => n.to_string(),
            Value::Double(f) => format_float(*f),
            Value::Time(t) => format_float(*t),
            Value::Enum(label) => label.clone(),
            Value::Port { number, proto } => format!("{}/{}", number, proto),
            Value::Addr(a) => a.to_string(),
            Value::Subnet { prefix, width } => format!("{}/{}", prefix, width),
            Value::Str(s) => s.clone(),
            Value::Pattern(p) => format!("/{}/", p),
            Value::List(_) | Value::Record(_) => self.describe(),
        }
    }

    /// Generic fallback rendering for types without a dedicated formatter.
    pub fn describe(&self) -> String {
        match self {
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.render()).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Record(fields) => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v.render()))
                    .collect();
                format!("[{}]", inner.join(", "))
            }
            other => other.render(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            Value::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Count(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Format a double so integral values keep a trailing `.0`.
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}
