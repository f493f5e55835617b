//! Compile-then-execute pipeline tests: several statements compiled into
//! one body and run on the VM, checking end-to-end results rather than
//! per-instruction encodings.

use sift_compiler::compiler::ast::{CallExpr, Expr, Stmt, VarRef};
use sift_compiler::FnCompiler;
use sift_core::types::TypeTag;
use sift_core::values::{Transport, Value};
use sift_vm::Vm;

fn assign(target: &str, ty: TypeTag, builtin: &str, args: Vec<Expr>) -> Stmt {
    Stmt::Assign {
        target: VarRef { name: target.to_string(), ty },
        call: CallExpr::builtin(builtin, args),
    }
}

#[test]
fn folded_and_runtime_paths_agree_within_one_body() {
    let mut c = FnCompiler::new("session_summary");
    let s_slot = c.declare("banner").unwrap();
    let p_slot = c.declare("resp_p").unwrap();

    let stmts = [
        // Folds to a constant load.
        assign(
            "lowered",
            TypeTag::String,
            "to_lower",
            vec![Expr::Const(Value::Str("SSH-2.0-OpenSSH".into()))],
        ),
        // Runtime transform of the same text; must agree with the fold.
        assign(
            "lowered_rt",
            TypeTag::String,
            "to_lower",
            vec![Expr::Var { name: "banner".to_string(), ty: TypeTag::String }],
        ),
        assign(
            "summary",
            TypeTag::String,
            "cat",
            vec![
                Expr::Const(Value::Str("responded on ".into())),
                Expr::Var { name: "resp_p".to_string(), ty: TypeTag::Port },
            ],
        ),
        assign(
            "offset",
            TypeTag::Count,
            "strstr",
            vec![
                Expr::Var { name: "banner".to_string(), ty: TypeTag::String },
                Expr::Const(Value::Str("OpenSSH".into())),
            ],
        ),
        assign(
            "version",
            TypeTag::String,
            "sub_bytes",
            vec![
                Expr::Var { name: "banner".to_string(), ty: TypeTag::String },
                Expr::Const(Value::Count(5)),
                Expr::Const(Value::Int(3)),
            ],
        ),
    ];
    for stmt in &stmts {
        assert!(c.compile_stmt(stmt).unwrap());
    }
    let (body, warnings) = c.finish();
    assert!(warnings.is_empty());

    let mut vm = Vm::new();
    vm.set_slot(s_slot, Value::Str("SSH-2.0-OpenSSH".into()));
    vm.set_slot(p_slot, Value::Port { number: 22, proto: Transport::Tcp });
    vm.run(&body).unwrap();

    // Destinations take slots 2..=6 in statement order, after the two
    // declared inputs.
    let lowered = vm.slot(2).unwrap();
    let lowered_rt = vm.slot(3).unwrap();
    assert_eq!(lowered, &Value::Str("ssh-2.0-openssh".into()));
    assert_eq!(lowered, lowered_rt);
    assert_eq!(vm.slot(4), Some(&Value::Str("responded on 22/tcp".into())));
    assert_eq!(vm.slot(5), Some(&Value::Count(9)));
    assert_eq!(vm.slot(6), Some(&Value::Str("2.0".into())));
}

#[test]
fn warnings_accumulate_across_statements() {
    let mut c = FnCompiler::new("noisy");
    let dead = [
        Stmt::Call(CallExpr::builtin("current_time", vec![])),
        Stmt::Call(CallExpr::builtin("cat", vec![Expr::Const(Value::Str("x".into()))])),
    ];
    for stmt in &dead {
        assert!(c.compile_stmt(stmt).unwrap());
    }
    assert_eq!(c.warnings().len(), 2);
    let (body, _) = c.finish();
    assert!(body.instructions.is_empty());
}
