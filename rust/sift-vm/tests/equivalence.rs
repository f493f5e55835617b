//! Specialized/generic equivalence suite.
//!
//! Every statement is compiled twice: once through the full specialization
//! pipeline and once forced down the generic call path. Both bodies run
//! against identically seeded VMs; results and world state must match, the
//! generic path being the reference semantics.

use sift_compiler::compiler::ast::{CallExpr, Expr, Stmt, VarRef};
use sift_compiler::compiler::ir::{CompiledBody, Op};
use sift_compiler::FnCompiler;
use sift_core::types::TypeTag;
use sift_core::values::{Transport, Value};
use sift_vm::{LogEntry, Vm};

fn var(name: &str, ty: TypeTag) -> Expr {
    Expr::Var { name: name.to_string(), ty }
}

fn assign(target: &str, ty: TypeTag, builtin: &str, args: Vec<Expr>) -> Stmt {
    Stmt::Assign {
        target: VarRef { name: target.to_string(), ty },
        call: CallExpr::builtin(builtin, args),
    }
}

fn bare(builtin: &str, args: Vec<Expr>) -> Stmt {
    Stmt::Call(CallExpr::builtin(builtin, args))
}

fn compile(inputs: &[(&str, Value)], stmt: &Stmt, generic: bool) -> CompiledBody {
    let mut c = FnCompiler::new("eq");
    for (name, _) in inputs {
        c.declare(name).expect("declare");
    }
    let handled = if generic {
        c.compile_generic(stmt).expect("compile_generic")
    } else {
        c.compile_stmt(stmt).expect("compile_stmt")
    };
    assert!(handled, "statement must be a catalogued builtin call");
    c.finish().0
}

/// A VM with deterministic environment readings and seeded input slots.
fn seeded_vm(inputs: &[(&str, Value)]) -> Vm {
    let mut vm = Vm::new();
    vm.now = 1_700_000_000.25;
    vm.network_time = 1_699_999_999.5;
    vm.reading_live = true;
    vm.reading_traces = false;
    vm.log_buffer.push(LogEntry {
        stream: "preexisting".to_string(),
        line: "[x=1]".to_string(),
    });
    for (i, (_, v)) in inputs.iter().enumerate() {
        vm.set_slot(i as u32, v.clone());
    }
    vm
}

/// Run the specialized and generic compilations of `stmt` against the same
/// world and assert identical observable behavior.
fn assert_equivalent(inputs: &[(&str, Value)], stmt: &Stmt) {
    let specialized = compile(inputs, stmt, false);
    let generic = compile(inputs, stmt, true);
    assert!(
        generic.instructions.iter().all(|z| matches!(z.op, Op::CallBuiltin | Op::CallBuiltinVoid)),
        "forced-generic body must only contain generic calls"
    );

    let mut vm_s = seeded_vm(inputs);
    let mut vm_g = seeded_vm(inputs);
    vm_s.run(&specialized).expect("specialized run");
    vm_g.run(&generic).expect("generic run");

    // The destination (when the statement assigns one) lands in the slot
    // right after the declared inputs in both compilations.
    if matches!(stmt, Stmt::Assign { .. }) {
        let dest = inputs.len() as u32;
        assert_eq!(vm_s.slot(dest), vm_g.slot(dest), "destination value diverged");
    }
    assert_eq!(vm_s.log_buffer, vm_g.log_buffer, "log buffer diverged");
    assert_eq!(vm_s.flushed_logs, vm_g.flushed_logs, "flushed logs diverged");
    assert_eq!(vm_s.files, vm_g.files, "reassembly state diverged");
}

fn s(text: &str) -> Value {
    Value::Str(text.to_string())
}

// ── Environment queries ─────────────────────────────────────────────────

#[test]
fn eq_environment_queries() {
    for (name, ty) in [
        ("current_time", TypeTag::Time),
        ("network_time", TypeTag::Time),
        ("reading_live_traffic", TypeTag::Bool),
        ("reading_traces", TypeTag::Bool),
    ] {
        assert_equivalent(&[], &assign("out", ty, name, vec![]));
    }
}

// ── String builtins ─────────────────────────────────────────────────────

#[test]
fn eq_to_lower() {
    let inputs = [("s", s("MiXeD Case 123"))];
    assert_equivalent(&inputs, &assign("out", TypeTag::String, "to_lower", vec![var("s", TypeTag::String)]));
    assert_equivalent(
        &[],
        &assign("out", TypeTag::String, "to_lower", vec![Expr::Const(s("FOLDED"))]),
    );
}

#[test]
fn eq_strstr_all_shapes() {
    let inputs = [("big", s("the needle is here")), ("little", s("needle"))];
    let shapes: [(Expr, Expr); 3] = [
        (var("big", TypeTag::String), var("little", TypeTag::String)),
        (var("big", TypeTag::String), Expr::Const(s("here"))),
        (Expr::Const(s("the needle is here")), var("little", TypeTag::String)),
    ];
    for (big, little) in shapes {
        assert_equivalent(&inputs, &assign("out", TypeTag::Count, "strstr", vec![big, little]));
    }
}

#[test]
fn eq_strstr_absent_needle() {
    let inputs = [("big", s("abc")), ("little", s("zzz"))];
    assert_equivalent(
        &inputs,
        &assign(
            "out",
            TypeTag::Count,
            "strstr",
            vec![var("big", TypeTag::String), var("little", TypeTag::String)],
        ),
    );
}

#[test]
fn eq_sub_bytes_all_constant_combinations() {
    let inputs = [("s", s("abcdefgh")), ("start", Value::Count(2)), ("n", Value::Int(5))];
    for mask in 0u8..8 {
        let subject = if mask & 4 != 0 {
            Expr::Const(s("abcdefgh"))
        } else {
            var("s", TypeTag::String)
        };
        let start =
            if mask & 2 != 0 { Expr::Const(Value::Count(2)) } else { var("start", TypeTag::Count) };
        let n = if mask & 1 != 0 { Expr::Const(Value::Int(5)) } else { var("n", TypeTag::Int) };
        assert_equivalent(
            &inputs,
            &assign("out", TypeTag::String, "sub_bytes", vec![subject, start, n]),
        );
    }
}

#[test]
fn eq_sub_bytes_clamping_edges() {
    // Zero start clamps to 1; negative length takes the rest; out-of-range
    // extents truncate.
    let edges = [(0u64, 3i64), (1, -1), (6, 99), (99, 2)];
    for (start, n) in edges {
        let inputs = [("s", s("abcdefgh"))];
        assert_equivalent(
            &inputs,
            &assign(
                "out",
                TypeTag::String,
                "sub_bytes",
                vec![
                    var("s", TypeTag::String),
                    Expr::Const(Value::Count(start)),
                    Expr::Const(Value::Int(n)),
                ],
            ),
        );
    }
}

// ── Concatenation ───────────────────────────────────────────────────────

#[test]
fn eq_cat_arities() {
    let inputs = [
        ("a", s("conn ")),
        ("n", Value::Count(7)),
        ("p", Value::Port { number: 443, proto: Transport::Tcp }),
        ("d", Value::Double(2.0)),
    ];
    let arg_sets: Vec<Vec<Expr>> = vec![
        vec![],
        vec![var("a", TypeTag::String)],
        vec![var("n", TypeTag::Count)],
        vec![Expr::Const(Value::Bool(true))],
        vec![var("a", TypeTag::String), var("n", TypeTag::Count)],
        vec![
            var("a", TypeTag::String),
            Expr::Const(s(" via ")),
            var("p", TypeTag::Port),
            var("d", TypeTag::Double),
        ],
    ];
    for args in arg_sets {
        assert_equivalent(&inputs, &assign("out", TypeTag::String, "cat", args));
    }
}

#[test]
fn eq_cat_wide_arity() {
    let inputs = [("x", s("-"))];
    let args: Vec<Expr> = (0u64..9)
        .map(|i| {
            if i % 2 == 0 {
                var("x", TypeTag::String)
            } else {
                Expr::Const(Value::Count(i))
            }
        })
        .collect();
    assert_equivalent(&inputs, &assign("out", TypeTag::String, "cat", args));
}

#[test]
fn eq_cat_aggregate_operands() {
    let rec = Value::Record(
        [("host".to_string(), s("a.example")), ("port".to_string(), Value::Count(53))].into(),
    );
    let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
    let inputs = [("r", rec), ("l", list), ("pat", Value::Pattern("foo|bar".to_string()))];
    assert_equivalent(
        &inputs,
        &assign(
            "out",
            TypeTag::String,
            "cat",
            vec![
                var("r", TypeTag::Record),
                var("l", TypeTag::List),
                var("pat", TypeTag::Pattern),
            ],
        ),
    );
}

// ── Analyzer and port queries ───────────────────────────────────────────

#[test]
fn eq_analyzer_name() {
    for tag in ["ANALYZER_HTTP", "ANALYZER_QUIC", "oddball"] {
        let inputs = [("tag", Value::Enum(tag.to_string()))];
        assert_equivalent(
            &inputs,
            &assign("out", TypeTag::String, "analyzer_name", vec![var("tag", TypeTag::Enum)]),
        );
    }
}

#[test]
fn eq_port_protocol() {
    for proto in [Transport::Tcp, Transport::Udp, Transport::Icmp, Transport::Unknown] {
        let inputs = [("p", Value::Port { number: 53, proto })];
        assert_equivalent(
            &inputs,
            &assign("out", TypeTag::Enum, "port_protocol", vec![var("p", TypeTag::Port)]),
        );
    }
}

// ── Log plumbing ────────────────────────────────────────────────────────

#[test]
fn eq_log_write_all_shapes() {
    let rec = Value::Record([("uid".to_string(), s("C1")), ("dur".to_string(), Value::Double(0.5))].into());
    let inputs = [("stream", Value::Enum("conn_log".to_string())), ("rec", rec)];
    let stream_shapes =
        [var("stream", TypeTag::Enum), Expr::Const(Value::Enum("conn_log".to_string()))];
    for stream in stream_shapes {
        assert_equivalent(
            &inputs,
            &assign(
                "ok",
                TypeTag::Bool,
                "log_write",
                vec![stream.clone(), var("rec", TypeTag::Record)],
            ),
        );
        assert_equivalent(&inputs, &bare("log_write", vec![stream, var("rec", TypeTag::Record)]));
    }
}

#[test]
fn eq_flush_logs() {
    assert_equivalent(&[], &bare("flush_logs", vec![]));
    assert_equivalent(&[], &assign("ok", TypeTag::Bool, "flush_logs", vec![]));
}

// ── Reassembly configuration ────────────────────────────────────────────

#[test]
fn eq_reassembly_configuration() {
    let inputs = [("f", s("Fa6qkp3")), ("sz", Value::Count(16384))];
    assert_equivalent(&inputs, &bare("enable_reassembly", vec![var("f", TypeTag::String)]));
    assert_equivalent(
        &inputs,
        &bare(
            "set_reassembly_buffer",
            vec![var("f", TypeTag::String), var("sz", TypeTag::Count)],
        ),
    );
    assert_equivalent(
        &inputs,
        &bare(
            "set_reassembly_buffer",
            vec![var("f", TypeTag::String), Expr::Const(Value::Count(4096))],
        ),
    );
}

// ── Dead-code elision keeps the world untouched ─────────────────────────

#[test]
fn eq_elided_pure_call_matches_generic_discard() {
    // The specialized pipeline compiles a discarded pure call to nothing;
    // the generic path executes it and drops the value. Either way the
    // world must come out identical.
    let inputs = [("a", s("x")), ("b", s("y"))];
    let stmt = bare("cat", vec![var("a", TypeTag::String), var("b", TypeTag::String)]);

    let mut c = FnCompiler::new("eq");
    for (name, _) in &inputs {
        c.declare(name).unwrap();
    }
    assert!(c.compile_stmt(&stmt).unwrap());
    let (specialized, warnings) = c.finish();
    assert!(specialized.instructions.is_empty());
    assert_eq!(warnings.len(), 1);

    let generic = compile(&inputs, &stmt, true);
    let mut vm_s = seeded_vm(&inputs);
    let mut vm_g = seeded_vm(&inputs);
    vm_s.run(&specialized).unwrap();
    vm_g.run(&generic).unwrap();
    assert_eq!(vm_s.log_buffer, vm_g.log_buffer);
    assert_eq!(vm_s.flushed_logs, vm_g.flushed_logs);
    assert_eq!(vm_s.files, vm_g.files);
}
