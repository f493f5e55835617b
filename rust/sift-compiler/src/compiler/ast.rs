//! Call-expression AST as handed over by the front end.
//!
//! The parser and type checker run before this stage, so everything here is
//! already validated: argument types match the builtin's signature, and
//! constant expressions carry their folded literal value. This stage never
//! re-checks any of it.

use sift_core::types::TypeTag;
use sift_core::values::Value;

/// One argument expression, reduced to what instruction selection needs:
/// a constant literal, a simple variable reference, or anything else.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A compile-time literal constant.
    Const(Value),
    /// A reference to a frame-resident variable.
    Var { name: String, ty: TypeTag },
    /// Any expression shape the classifier does not support (field access,
    /// nested call, ...). Forces declination of the surrounding call.
    Complex { ty: TypeTag },
}

impl Expr {
    pub fn ty(&self) -> TypeTag {
        match self {
            Expr::Const(v) => v.type_tag(),
            Expr::Var { ty, .. } | Expr::Complex { ty } => *ty,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Expr::Const(_))
    }
}

/// The callee of a call expression.
#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    /// A direct, statically resolved reference to a defined function.
    Direct { name: String, builtin: bool },
    /// A call through a function-valued expression.
    Indirect,
}

/// A call expression with ordered arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub target: CallTarget,
    pub args: Vec<Expr>,
}

impl CallExpr {
    /// A direct call to a builtin, the shape this stage cares about.
    pub fn builtin(name: &str, args: Vec<Expr>) -> Self {
        Self {
            target: CallTarget::Direct { name: name.to_string(), builtin: true },
            args,
        }
    }
}

/// The destination of an assignment statement.
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub name: String,
    pub ty: TypeTag,
}

/// A statement this stage may handle: a bare call, or an assignment whose
/// right-hand side is a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Call(CallExpr),
    Assign { target: VarRef, call: CallExpr },
}
