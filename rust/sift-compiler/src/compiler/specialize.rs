//! Instruction selection for builtin calls.
//!
//! A call to a catalogued builtin whose operand shapes permit is replaced
//! by a specialized instruction sequence; any handler may instead decline,
//! in which case the generic call instruction is emitted. Declination is
//! the expected outcome for operand shapes outside the enumerated fast
//! paths and is always safe.

use crate::compiler::ast::{CallTarget, Expr, Stmt};
use crate::compiler::cat::CatRender;
use crate::compiler::diagnostics::{SpecializeError, Warning};
use crate::compiler::frame::FrameAlloc;
use crate::compiler::ir::{AuxData, AuxItem, CompiledBody, Instruction, Op, OpLayout};
use serde::{Deserialize, Serialize};
use sift_core::strings;
use sift_core::types::TypeTag;
use sift_core::values::Value;
use std::str::FromStr;
use strum_macros::{Display, EnumString, IntoStaticStr};

/// The closed catalogue of specializable builtins.
///
/// `from_str` over the script-level name is the registry lookup; the
/// catalogue is a static enum, so it is immutable and safe to consult from
/// any number of concurrent compilations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Builtin {
    AnalyzerName,
    Cat,
    CurrentTime,
    EnableReassembly,
    FlushLogs,
    LogWrite,
    NetworkTime,
    PortProtocol,
    ReadingLiveTraffic,
    ReadingTraces,
    SetReassemblyBuffer,
    Strstr,
    SubBytes,
    ToLower,
}

impl Builtin {
    /// True when the builtin is pure and its result must be consumed for
    /// the call to have any effect. A bare call to such a builtin is dead
    /// code and compiles to nothing (with a warning).
    ///
    /// Only builtins documented side-effect-free may report true here;
    /// anything ambiguous must stay false so its call is never elided.
    pub fn value_matters(self) -> bool {
        match self {
            Builtin::AnalyzerName
            | Builtin::Cat
            | Builtin::CurrentTime
            | Builtin::NetworkTime
            | Builtin::PortProtocol
            | Builtin::ReadingLiveTraffic
            | Builtin::ReadingTraces
            | Builtin::Strstr
            | Builtin::SubBytes
            | Builtin::ToLower => true,
            Builtin::EnableReassembly
            | Builtin::FlushLogs
            | Builtin::LogWrite
            | Builtin::SetReassemblyBuffer => false,
        }
    }
}

/// Shape of one argument expression, as seen by instruction selection.
enum Shape<'a> {
    Const(&'a Value),
    Slot { slot: u32, ty: TypeTag },
    Unsupported,
}

fn check_arity(builtin: Builtin, expected: usize, args: &[Expr]) -> Result<(), SpecializeError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(SpecializeError::ArityMismatch { builtin: builtin.into(), expected, got: args.len() })
    }
}

fn require_dest(builtin: Builtin, dest: Option<u32>) -> Result<u32, SpecializeError> {
    dest.ok_or(SpecializeError::MissingDestination { builtin: builtin.into() })
}

/// Compiles call statements of one function body into VM instructions.
///
/// Owns the instruction stream and the frame-slot allocator for the body;
/// compilation is single-threaded and synchronous, and the stream is never
/// shared until `finish`.
pub struct FnCompiler {
    name: String,
    frame: FrameAlloc,
    instrs: Vec<Instruction>,
    warnings: Vec<Warning>,
}

impl FnCompiler {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            frame: FrameAlloc::new(name),
            instrs: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Pre-assign a frame slot for a parameter or local, in declaration
    /// order. Later references through `Expr::Var` reuse the same slot.
    pub fn declare(&mut self, name: &str) -> Result<u32, SpecializeError> {
        self.frame.slot_of(name)
    }

    /// Warnings recorded so far.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Consume the compiler, yielding the compiled body and its warnings.
    pub fn finish(self) -> (CompiledBody, Vec<Warning>) {
        (
            CompiledBody {
                name: self.name,
                slots: self.frame.max_slots(),
                instructions: self.instrs,
            },
            self.warnings,
        )
    }

    /// Compile one call statement: specialized when possible, generic
    /// otherwise. `Ok(false)` means the statement is not a direct call to a
    /// catalogued builtin at all and belongs to the general call lowering
    /// outside this stage.
    pub fn compile_stmt(&mut self, stmt: &Stmt) -> Result<bool, SpecializeError> {
        if self.try_specialize(stmt)? {
            return Ok(true);
        }
        self.compile_generic(stmt)
    }

    /// The call recognizer. Reports `Ok(true)` when the statement is fully
    /// handled (instructions emitted, or intentionally elided), `Ok(false)`
    /// when the caller must fall back to the generic path.
    pub fn try_specialize(&mut self, stmt: &Stmt) -> Result<bool, SpecializeError> {
        let (call, dest_var) = match stmt {
            Stmt::Call(c) => (c, None),
            Stmt::Assign { target, call } => (call, Some(target)),
        };

        let CallTarget::Direct { name, builtin: true } = &call.target else {
            // Indirect call, or a script-defined function.
            return Ok(false);
        };
        let Ok(builtin) = Builtin::from_str(name) else {
            return Ok(false);
        };

        if builtin.value_matters() && dest_var.is_none() {
            // The builtin is side-effect-free, so with its result ignored
            // the whole call is a no-op. Report it handled with zero
            // instructions rather than executing it for nothing.
            self.warnings.push(Warning::DiscardedValue { builtin: name.clone() });
            return Ok(true);
        }

        let dest = match dest_var {
            Some(v) => Some(self.frame.slot_of(&v.name)?),
            None => None,
        };

        self.dispatch(builtin, dest, &call.args)
    }

    /// Emit the generic, unspecialized call instruction for a direct
    /// builtin call. Always correct; used when every fast path declined.
    pub fn compile_generic(&mut self, stmt: &Stmt) -> Result<bool, SpecializeError> {
        let (call, dest_var) = match stmt {
            Stmt::Call(c) => (c, None),
            Stmt::Assign { target, call } => (call, Some(target)),
        };
        let CallTarget::Direct { name, builtin: true } = &call.target else {
            return Ok(false);
        };
        let Ok(builtin) = Builtin::from_str(name) else {
            return Ok(false);
        };

        let mut aux = AuxData { callee: Some(builtin), ..AuxData::default() };
        for a in &call.args {
            let item = match a {
                Expr::Const(v) => AuxItem::Const(v.clone()),
                Expr::Var { name, ty } => {
                    AuxItem::Slot { slot: self.frame.slot_of(name)?, ty: *ty }
                }
                // The front end materializes complex arguments into a
                // temporary before the call; reserve its slot here.
                Expr::Complex { ty } => AuxItem::Slot { slot: self.frame.alloc_temp()?, ty: *ty },
            };
            aux.items.push(item);
        }

        let z = match dest_var {
            Some(v) => {
                let dest = self.frame.slot_of(&v.name)?;
                Instruction::v(Op::CallBuiltin, dest).with_aux(aux)
            }
            None => Instruction::x(Op::CallBuiltinVoid).with_aux(aux),
        };
        self.emit(z);
        Ok(true)
    }

    fn dispatch(
        &mut self,
        builtin: Builtin,
        dest: Option<u32>,
        args: &[Expr],
    ) -> Result<bool, SpecializeError> {
        match builtin {
            Builtin::AnalyzerName => {
                let d = require_dest(builtin, dest)?;
                self.builtin_analyzer_name(d, args)
            }
            Builtin::Cat => {
                let d = require_dest(builtin, dest)?;
                self.builtin_cat(d, args)
            }
            Builtin::CurrentTime => {
                check_arity(builtin, 0, args)?;
                let d = require_dest(builtin, dest)?;
                self.emit(Instruction::v(Op::CurrentTime, d));
                Ok(true)
            }
            Builtin::EnableReassembly => self.builtin_enable_reassembly(dest, args),
            Builtin::FlushLogs => {
                check_arity(builtin, 0, args)?;
                match dest {
                    Some(d) => self.emit(Instruction::v(Op::FlushLogs, d)),
                    None => self.emit(Instruction::x(Op::FlushLogsVoid)),
                }
                Ok(true)
            }
            Builtin::LogWrite => self.builtin_log_write(dest, args),
            Builtin::NetworkTime => {
                check_arity(builtin, 0, args)?;
                let d = require_dest(builtin, dest)?;
                self.emit(Instruction::v(Op::NetworkTime, d));
                Ok(true)
            }
            Builtin::PortProtocol => {
                let d = require_dest(builtin, dest)?;
                self.builtin_port_protocol(d, args)
            }
            Builtin::ReadingLiveTraffic => {
                check_arity(builtin, 0, args)?;
                let d = require_dest(builtin, dest)?;
                self.emit(Instruction::v(Op::ReadingLiveTraffic, d));
                Ok(true)
            }
            Builtin::ReadingTraces => {
                check_arity(builtin, 0, args)?;
                let d = require_dest(builtin, dest)?;
                self.emit(Instruction::v(Op::ReadingTraces, d));
                Ok(true)
            }
            Builtin::SetReassemblyBuffer => self.builtin_set_reassembly_buffer(dest, args),
            Builtin::Strstr => {
                let d = require_dest(builtin, dest)?;
                self.builtin_strstr(d, args)
            }
            Builtin::SubBytes => {
                let d = require_dest(builtin, dest)?;
                self.builtin_sub_bytes(d, args)
            }
            Builtin::ToLower => {
                let d = require_dest(builtin, dest)?;
                self.builtin_to_lower(d, args)
            }
        }
    }

    fn emit(&mut self, z: Instruction) {
        self.instrs.push(z);
    }

    fn classify<'a>(&mut self, e: &'a Expr) -> Result<Shape<'a>, SpecializeError> {
        Ok(match e {
            Expr::Const(v) => Shape::Const(v),
            Expr::Var { name, ty } => Shape::Slot { slot: self.frame.slot_of(name)?, ty: *ty },
            Expr::Complex { .. } => Shape::Unsupported,
        })
    }

    // ── Per-builtin handlers ────────────────────────────────────────────

    fn builtin_analyzer_name(&mut self, dest: u32, args: &[Expr]) -> Result<bool, SpecializeError> {
        check_arity(Builtin::AnalyzerName, 1, args)?;
        match self.classify(&args[0])? {
            // A constant analyzer tag is a weird enough usage that no
            // variant exists for it.
            Shape::Const(_) | Shape::Unsupported => Ok(false),
            Shape::Slot { slot, ty } => {
                self.emit(Instruction::vv(Op::AnalyzerName, dest, slot as i64).with_type(ty));
                Ok(true)
            }
        }
    }

    fn builtin_enable_reassembly(
        &mut self,
        dest: Option<u32>,
        args: &[Expr],
    ) -> Result<bool, SpecializeError> {
        check_arity(Builtin::EnableReassembly, 1, args)?;
        if dest.is_some() {
            // Nominally value-producing, but script code ignores the
            // result; only the bare form is specialized.
            return Ok(false);
        }
        match self.classify(&args[0])? {
            Shape::Const(_) | Shape::Unsupported => Ok(false),
            Shape::Slot { slot, .. } => {
                self.emit(Instruction::v(Op::EnableReassembly, slot));
                Ok(true)
            }
        }
    }

    fn builtin_set_reassembly_buffer(
        &mut self,
        dest: Option<u32>,
        args: &[Expr],
    ) -> Result<bool, SpecializeError> {
        check_arity(Builtin::SetReassemblyBuffer, 2, args)?;
        if dest.is_some() {
            return Ok(false);
        }
        let file_slot = match self.classify(&args[0])? {
            Shape::Slot { slot, .. } => slot,
            Shape::Const(_) | Shape::Unsupported => return Ok(false),
        };
        let z = match self.classify(&args[1])? {
            Shape::Const(v) => match v.as_count() {
                Some(size) => {
                    Instruction::vv(Op::SetReassemblyBufferConst, file_slot, size as i64)
                        .with_layout(OpLayout::VvI2)
                }
                None => return Ok(false),
            },
            Shape::Slot { slot, .. } => {
                Instruction::vv(Op::SetReassemblyBuffer, file_slot, slot as i64)
            }
            Shape::Unsupported => return Ok(false),
        };
        self.emit(z);
        Ok(true)
    }

    fn builtin_log_write(
        &mut self,
        dest: Option<u32>,
        args: &[Expr],
    ) -> Result<bool, SpecializeError> {
        check_arity(Builtin::LogWrite, 2, args)?;
        let (col_slot, col_ty) = match self.classify(&args[1])? {
            Shape::Slot { slot, ty } => (slot, ty),
            Shape::Const(_) | Shape::Unsupported => return Ok(false),
        };
        let z = match (dest, self.classify(&args[0])?) {
            (Some(d), Shape::Const(stream)) => {
                Instruction::vv(Op::LogWriteConst, d, col_slot as i64)
                    .with_aux(AuxData::with_items(vec![AuxItem::Const(stream.clone())]))
            }
            (Some(d), Shape::Slot { slot, .. }) => {
                Instruction::vvv(Op::LogWrite, d, slot as i64, col_slot as i64)
            }
            (None, Shape::Const(stream)) => Instruction::v(Op::LogWriteConstVoid, col_slot)
                .with_layout(OpLayout::Vc)
                .with_const(stream.clone()),
            (None, Shape::Slot { slot, .. }) => {
                Instruction::vv(Op::LogWriteVoid, slot, col_slot as i64)
            }
            (_, Shape::Unsupported) => return Ok(false),
        };
        self.emit(z.with_type(col_ty));
        Ok(true)
    }

    fn builtin_cat(&mut self, dest: u32, args: &[Expr]) -> Result<bool, SpecializeError> {
        if args.is_empty() {
            // Weird, but easy enough to support.
            self.emit(
                Instruction::v(Op::Cat1Const, dest)
                    .with_layout(OpLayout::Vc)
                    .with_const(Value::Str(String::new()))
                    .with_type(TypeTag::String),
            );
            return Ok(true);
        }

        if args.len() > 1 {
            let op = match args.len() {
                2 => Op::Cat2,
                3 => Op::Cat3,
                4 => Op::Cat4,
                5 => Op::Cat5,
                6 => Op::Cat6,
                7 => Op::Cat7,
                8 => Op::Cat8,
                _ => Op::CatN,
            };
            let Some(aux) = self.build_cat_aux(args)? else {
                return Ok(false);
            };
            self.emit(Instruction::v(op, dest).with_aux(aux).with_type(TypeTag::String));
            return Ok(true);
        }

        match self.classify(&args[0])? {
            Shape::Unsupported => Ok(false),
            Shape::Const(v) => {
                self.emit(
                    Instruction::v(Op::Cat1Const, dest)
                        .with_layout(OpLayout::Vc)
                        .with_const(Value::Str(v.render()))
                        .with_type(TypeTag::String),
                );
                Ok(true)
            }
            Shape::Slot { slot, ty } if ty != TypeTag::String => {
                self.emit(Instruction::vv(Op::Cat1Full, dest, slot as i64).with_type(ty));
                Ok(true)
            }
            Shape::Slot { slot, .. } => {
                self.emit(Instruction::vv(Op::Cat1, dest, slot as i64));
                Ok(true)
            }
        }
    }

    /// Per-operand payload for a multi-argument concatenation: constants
    /// are rendered now, slots get a converter chosen from their static
    /// type. `None` declines the whole call.
    fn build_cat_aux(&mut self, args: &[Expr]) -> Result<Option<AuxData>, SpecializeError> {
        let mut aux = AuxData::default();
        for a in args {
            match self.classify(a)? {
                Shape::Const(v) => {
                    aux.renders.push(CatRender::Literal(v.render()));
                    aux.items.push(AuxItem::Const(v.clone()));
                }
                Shape::Slot { slot, ty } => {
                    aux.renders.push(CatRender::for_type(ty));
                    aux.items.push(AuxItem::Slot { slot, ty });
                }
                Shape::Unsupported => return Ok(None),
            }
        }
        Ok(Some(aux))
    }

    fn builtin_port_protocol(&mut self, dest: u32, args: &[Expr]) -> Result<bool, SpecializeError> {
        check_arity(Builtin::PortProtocol, 1, args)?;
        match self.classify(&args[0])? {
            Shape::Const(_) | Shape::Unsupported => Ok(false),
            Shape::Slot { slot, .. } => {
                self.emit(Instruction::vv(Op::PortProtocol, dest, slot as i64));
                Ok(true)
            }
        }
    }

    fn builtin_strstr(&mut self, dest: u32, args: &[Expr]) -> Result<bool, SpecializeError> {
        check_arity(Builtin::Strstr, 2, args)?;
        let big = self.classify(&args[0])?;
        let little = self.classify(&args[1])?;
        let z = match (big, little) {
            (Shape::Slot { slot: b, .. }, Shape::Slot { slot: l, .. }) => {
                Instruction::vvv(Op::Strstr, dest, b as i64, l as i64)
            }
            (Shape::Slot { slot: b, .. }, Shape::Const(little)) => {
                Instruction::vv(Op::StrstrConstLittle, dest, b as i64)
                    .with_layout(OpLayout::Vvc)
                    .with_const(little.clone())
            }
            // One side constant: swap the logical order so the slot
            // operand keeps the encoded position.
            (Shape::Const(big), Shape::Slot { slot: l, .. }) => {
                Instruction::vv(Op::StrstrConstBig, dest, l as i64)
                    .with_layout(OpLayout::Vvc)
                    .with_const(big.clone())
            }
            _ => return Ok(false),
        };
        self.emit(z);
        Ok(true)
    }

    fn builtin_sub_bytes(&mut self, dest: u32, args: &[Expr]) -> Result<bool, SpecializeError> {
        check_arity(Builtin::SubBytes, 3, args)?;

        let (s_slot, s_const) = match self.classify(&args[0])? {
            Shape::Slot { slot, .. } => (slot as i64, None),
            Shape::Const(v) => (0, Some(v.clone())),
            Shape::Unsupported => return Ok(false),
        };
        // Constant offsets fold to their concrete numeric form and embed
        // directly in the operand field.
        let (v_start, start_const) = match self.classify(&args[1])? {
            Shape::Slot { slot, .. } => (slot as i64, false),
            Shape::Const(v) => match v.as_count() {
                Some(c) => (c as i64, true),
                None => return Ok(false),
            },
            Shape::Unsupported => return Ok(false),
        };
        let (v_n, n_const) = match self.classify(&args[2])? {
            Shape::Slot { slot, .. } => (slot as i64, false),
            Shape::Const(v) => match v.as_int() {
                Some(n) => (n, true),
                None => return Ok(false),
            },
            Shape::Unsupported => return Ok(false),
        };

        // Every constant-position combination has its own pre-enumerated
        // variant; the match is exhaustive by construction, so no
        // combination can reach an undefined branch. The flipped variants
        // keep embedded integers in the trailing operand fields.
        let z = match (s_const.is_some(), start_const, n_const) {
            (false, false, false) => Instruction::vvvv(Op::SubBytes, dest, s_slot, v_start, v_n),
            (false, false, true) => Instruction::vvvv(Op::SubBytesLenImm, dest, s_slot, v_start, v_n)
                .with_layout(OpLayout::VvvvI4),
            (false, true, false) => Instruction::vvvv(Op::SubBytesStartImm, dest, s_slot, v_n, v_start)
                .with_layout(OpLayout::VvvvI4),
            (false, true, true) => {
                Instruction::vvvv(Op::SubBytesStartLenImm, dest, s_slot, v_start, v_n)
                    .with_layout(OpLayout::VvvvI3I4)
            }
            (true, false, false) => Instruction::vvv(Op::SubBytesConst, dest, v_start, v_n)
                .with_layout(OpLayout::Vvvc),
            (true, false, true) => Instruction::vvv(Op::SubBytesConstLenImm, dest, v_start, v_n)
                .with_layout(OpLayout::VvvcI3),
            (true, true, false) => Instruction::vvv(Op::SubBytesConstStartImm, dest, v_n, v_start)
                .with_layout(OpLayout::VvvcI3),
            (true, true, true) => Instruction::vvv(Op::SubBytesConstStartLenImm, dest, v_start, v_n)
                .with_layout(OpLayout::VvvcI2I3),
        };
        let z = match s_const {
            Some(subject) => z.with_const(subject),
            None => z,
        };
        self.emit(z);
        Ok(true)
    }

    fn builtin_to_lower(&mut self, dest: u32, args: &[Expr]) -> Result<bool, SpecializeError> {
        check_arity(Builtin::ToLower, 1, args)?;
        match self.classify(&args[0])? {
            Shape::Const(v) => {
                let Some(s) = v.as_str() else {
                    return Ok(false);
                };
                // Fold the transform at compile time and load the result.
                self.emit(
                    Instruction::v(Op::LoadConst, dest)
                        .with_layout(OpLayout::Vc)
                        .with_const(Value::Str(strings::to_lower(s))),
                );
                Ok(true)
            }
            Shape::Slot { slot, .. } => {
                self.emit(Instruction::vv(Op::ToLower, dest, slot as i64));
                Ok(true)
            }
            Shape::Unsupported => Ok(false),
        }
    }
}
