//! Native builtin implementations backing the generic call path.
//!
//! `invoke` is the reference semantics for every catalogued builtin: a
//! specialized instruction sequence is correct exactly when it matches what
//! `invoke` does with the same arguments against the same world.

use crate::vm::{port_proto_value, Vm, VmError};
use once_cell::sync::Lazy;
use sift_compiler::compiler::cat::CatRender;
use sift_compiler::compiler::specialize::Builtin;
use sift_core::strings;
use sift_core::values::Value;
use std::collections::BTreeMap;

/// Analyzer tag label → human-readable analyzer name.
static ANALYZER_NAMES: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        ("ANALYZER_DNS", "DNS"),
        ("ANALYZER_FTP", "FTP"),
        ("ANALYZER_HTTP", "HTTP"),
        ("ANALYZER_SMTP", "SMTP"),
        ("ANALYZER_SSH", "SSH"),
        ("ANALYZER_SSL", "SSL"),
    ])
});

/// Resolve an analyzer tag label to its display name. Unknown tags fall
/// back to the label with any `ANALYZER_` prefix stripped.
pub fn analyzer_display_name(tag: &str) -> String {
    match ANALYZER_NAMES.get(tag) {
        Some(name) => (*name).to_string(),
        None => tag.strip_prefix("ANALYZER_").unwrap_or(tag).to_string(),
    }
}

fn arg<'a>(builtin: Builtin, args: &'a [Value], idx: usize) -> Result<&'a Value, VmError> {
    args.get(idx).ok_or_else(|| {
        VmError::Malformed(format!("{}: missing argument {}", builtin, idx))
    })
}

fn str_arg(builtin: Builtin, args: &[Value], idx: usize) -> Result<String, VmError> {
    match arg(builtin, args, idx)? {
        Value::Str(s) => Ok(s.clone()),
        other => Err(VmError::TypeError(format!("{}: expected string, got {:?}", builtin, other))),
    }
}

fn count_arg(builtin: Builtin, args: &[Value], idx: usize) -> Result<u64, VmError> {
    match arg(builtin, args, idx)? {
        Value::Count(n) => Ok(*n),
        other => Err(VmError::TypeError(format!("{}: expected count, got {:?}", builtin, other))),
    }
}

fn int_arg(builtin: Builtin, args: &[Value], idx: usize) -> Result<i64, VmError> {
    match arg(builtin, args, idx)? {
        Value::Int(n) => Ok(*n),
        Value::Count(n) => i64::try_from(*n)
            .map_err(|_| VmError::TypeError(format!("{}: count {} overflows int", builtin, n))),
        other => Err(VmError::TypeError(format!("{}: expected int, got {:?}", builtin, other))),
    }
}

/// Execute one builtin against the VM's world, returning its value.
pub fn invoke(vm: &mut Vm, builtin: Builtin, args: &[Value]) -> Result<Value, VmError> {
    match builtin {
        Builtin::AnalyzerName => match arg(builtin, args, 0)? {
            Value::Enum(label) => Ok(Value::Str(analyzer_display_name(label))),
            other => {
                Err(VmError::TypeError(format!("expected analyzer tag, got {:?}", other)))
            }
        },

        Builtin::Cat => {
            let mut out = String::new();
            for v in args {
                out.push_str(&CatRender::for_type(v.type_tag()).render_value(v));
            }
            Ok(Value::Str(out))
        }

        Builtin::CurrentTime => Ok(Value::Time(vm.now)),
        Builtin::NetworkTime => Ok(Value::Time(vm.network_time)),
        Builtin::ReadingLiveTraffic => Ok(Value::Bool(vm.reading_live)),
        Builtin::ReadingTraces => Ok(Value::Bool(vm.reading_traces)),

        Builtin::EnableReassembly => {
            let file_id = str_arg(builtin, args, 0)?;
            vm.enable_reassembly(&file_id);
            Ok(Value::Bool(true))
        }
        Builtin::SetReassemblyBuffer => {
            let file_id = str_arg(builtin, args, 0)?;
            let size = count_arg(builtin, args, 1)?;
            vm.set_reassembly_buffer(&file_id, size);
            Ok(Value::Bool(true))
        }

        Builtin::FlushLogs => {
            vm.flush_logs();
            Ok(Value::Bool(true))
        }
        Builtin::LogWrite => {
            let stream = arg(builtin, args, 0)?.clone();
            let columns = arg(builtin, args, 1)?.clone();
            vm.write_log(&stream, &columns);
            Ok(Value::Bool(true))
        }

        Builtin::PortProtocol => match arg(builtin, args, 0)? {
            Value::Port { proto, .. } => Ok(port_proto_value(*proto)),
            other => Err(VmError::TypeError(format!("expected port, got {:?}", other))),
        },

        Builtin::Strstr => {
            let big = str_arg(builtin, args, 0)?;
            let little = str_arg(builtin, args, 1)?;
            Ok(Value::Count(strings::strstr(&big, &little)))
        }

        Builtin::SubBytes => {
            let s = str_arg(builtin, args, 0)?;
            let start = count_arg(builtin, args, 1)?;
            let n = int_arg(builtin, args, 2)?;
            Ok(Value::Str(strings::sub_bytes(&s, start, n)))
        }

        Builtin::ToLower => {
            let s = str_arg(builtin, args, 0)?;
            Ok(Value::Str(strings::to_lower(&s)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyzer_display_name() {
        assert_eq!(analyzer_display_name("ANALYZER_HTTP"), "HTTP");
        assert_eq!(analyzer_display_name("ANALYZER_QUIC"), "QUIC");
        assert_eq!(analyzer_display_name("custom"), "custom");
    }

    #[test]
    fn test_invoke_cat_mixed_types() {
        let mut vm = Vm::new();
        let out = invoke(
            &mut vm,
            Builtin::Cat,
            &[Value::Str("n=".into()), Value::Count(3), Value::Bool(false)],
        )
        .unwrap();
        assert_eq!(out, Value::Str("n=3F".into()));
    }

    #[test]
    fn test_invoke_type_error() {
        let mut vm = Vm::new();
        let err = invoke(&mut vm, Builtin::ToLower, &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
    }
}
