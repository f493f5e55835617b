//! Register VM dispatch loop.
//!
//! Each specialized opcode has one execution arm; the arms share their
//! world-mutating helpers with the native builtin implementations in
//! `builtins`, so the specialized and generic paths cannot drift apart.

use crate::builtins;
use sift_compiler::compiler::cat::CatRender;
use sift_compiler::compiler::ir::{AuxData, AuxItem, CompiledBody, Instruction, Op};
use sift_core::strings;
use sift_core::values::{Transport, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("frame slot {0} out of bounds")]
    SlotOutOfBounds(i64),
    #[error("frame slot {0} read before initialization")]
    UninitializedSlot(i64),
    #[error("type error at runtime: {0}")]
    TypeError(String),
    #[error("instruction {0} is missing its auxiliary payload")]
    MissingAux(Op),
    #[error("instruction {0} is missing its inline constant")]
    MissingConst(Op),
    #[error("malformed instruction: {0}")]
    Malformed(String),
}

/// One buffered log write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub stream: String,
    pub line: String,
}

/// Per-file reassembly settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReassemblyConfig {
    pub enabled: bool,
    pub buffer_size: Option<u64>,
}

/// The sift register VM.
///
/// World state is public so tests can seed it and compare it across runs.
pub struct Vm {
    regs: Vec<Option<Value>>,
    /// Wall-clock source for `current_time`; injectable for determinism.
    pub now: f64,
    /// Timestamp of the most recently processed packet.
    pub network_time: f64,
    pub reading_live: bool,
    pub reading_traces: bool,
    pub log_buffer: Vec<LogEntry>,
    pub flushed_logs: Vec<LogEntry>,
    pub files: BTreeMap<String, ReassemblyConfig>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self {
            regs: Vec::new(),
            now: chrono::Utc::now().timestamp_micros() as f64 / 1e6,
            network_time: 0.0,
            reading_live: false,
            reading_traces: false,
            log_buffer: Vec::new(),
            flushed_logs: Vec::new(),
            files: BTreeMap::new(),
        }
    }

    /// Seed a frame slot before execution.
    pub fn set_slot(&mut self, slot: u32, v: Value) {
        let idx = slot as usize;
        if idx >= self.regs.len() {
            self.regs.resize(idx + 1, None);
        }
        self.regs[idx] = Some(v);
    }

    /// Read a frame slot after execution.
    pub fn slot(&self, slot: u32) -> Option<&Value> {
        self.regs.get(slot as usize).and_then(|v| v.as_ref())
    }

    /// Execute a compiled body against the current world.
    pub fn run(&mut self, body: &CompiledBody) -> Result<(), VmError> {
        if self.regs.len() < body.slots as usize {
            self.regs.resize(body.slots as usize, None);
        }
        for z in &body.instructions {
            self.exec(z)?;
        }
        Ok(())
    }

    // ── Frame access ────────────────────────────────────────────────────

    fn get(&self, slot: i64) -> Result<&Value, VmError> {
        let idx = usize::try_from(slot).map_err(|_| VmError::SlotOutOfBounds(slot))?;
        self.regs
            .get(idx)
            .ok_or(VmError::SlotOutOfBounds(slot))?
            .as_ref()
            .ok_or(VmError::UninitializedSlot(slot))
    }

    fn set(&mut self, slot: i64, v: Value) -> Result<(), VmError> {
        let idx = usize::try_from(slot).map_err(|_| VmError::SlotOutOfBounds(slot))?;
        if idx >= self.regs.len() {
            return Err(VmError::SlotOutOfBounds(slot));
        }
        self.regs[idx] = Some(v);
        Ok(())
    }

    fn str_at(&self, slot: i64) -> Result<String, VmError> {
        match self.get(slot)? {
            Value::Str(s) => Ok(s.clone()),
            other => Err(VmError::TypeError(format!("expected string, got {:?}", other))),
        }
    }

    fn count_at(&self, slot: i64) -> Result<u64, VmError> {
        match self.get(slot)? {
            Value::Count(n) => Ok(*n),
            other => Err(VmError::TypeError(format!("expected count, got {:?}", other))),
        }
    }

    fn int_at(&self, slot: i64) -> Result<i64, VmError> {
        match self.get(slot)? {
            Value::Int(n) => Ok(*n),
            Value::Count(n) => i64::try_from(*n)
                .map_err(|_| VmError::TypeError(format!("count {} overflows int", n))),
            other => Err(VmError::TypeError(format!("expected int, got {:?}", other))),
        }
    }

    // ── World effects shared with the generic builtin path ──────────────

    pub(crate) fn write_log(&mut self, stream: &Value, columns: &Value) {
        self.log_buffer.push(LogEntry { stream: stream.render(), line: columns.describe() });
    }

    pub(crate) fn flush_logs(&mut self) {
        let drained: Vec<LogEntry> = self.log_buffer.drain(..).collect();
        self.flushed_logs.extend(drained);
    }

    pub(crate) fn enable_reassembly(&mut self, file_id: &str) {
        self.files.entry(file_id.to_string()).or_default().enabled = true;
    }

    pub(crate) fn set_reassembly_buffer(&mut self, file_id: &str, size: u64) {
        self.files.entry(file_id.to_string()).or_default().buffer_size = Some(size);
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    fn exec(&mut self, z: &Instruction) -> Result<(), VmError> {
        match z.op {
            Op::LoadConst | Op::Cat1Const => {
                let v = konst(z)?.clone();
                self.set(z.v1, v)
            }

            Op::AnalyzerName => {
                let tag = match self.get(z.v2)? {
                    Value::Enum(label) => label.clone(),
                    other => {
                        return Err(VmError::TypeError(format!(
                            "expected analyzer tag, got {:?}",
                            other
                        )))
                    }
                };
                self.set(z.v1, Value::Str(builtins::analyzer_display_name(&tag)))
            }

            Op::FlushLogs => {
                self.flush_logs();
                self.set(z.v1, Value::Bool(true))
            }
            Op::FlushLogsVoid => {
                self.flush_logs();
                Ok(())
            }

            Op::LogWrite => {
                let stream = self.get(z.v2)?.clone();
                let columns = self.get(z.v3)?.clone();
                self.write_log(&stream, &columns);
                self.set(z.v1, Value::Bool(true))
            }
            Op::LogWriteConst => {
                let stream = aux_const(z, 0)?.clone();
                let columns = self.get(z.v2)?.clone();
                self.write_log(&stream, &columns);
                self.set(z.v1, Value::Bool(true))
            }
            Op::LogWriteVoid => {
                let stream = self.get(z.v1)?.clone();
                let columns = self.get(z.v2)?.clone();
                self.write_log(&stream, &columns);
                Ok(())
            }
            Op::LogWriteConstVoid => {
                let stream = konst(z)?.clone();
                let columns = self.get(z.v1)?.clone();
                self.write_log(&stream, &columns);
                Ok(())
            }

            Op::EnableReassembly => {
                let file_id = self.str_at(z.v1)?;
                self.enable_reassembly(&file_id);
                Ok(())
            }
            Op::SetReassemblyBuffer => {
                let file_id = self.str_at(z.v1)?;
                let size = self.count_at(z.v2)?;
                self.set_reassembly_buffer(&file_id, size);
                Ok(())
            }
            Op::SetReassemblyBufferConst => {
                let file_id = self.str_at(z.v1)?;
                self.set_reassembly_buffer(&file_id, z.v2 as u64);
                Ok(())
            }

            Op::Cat1Full => {
                let v = self.get(z.v2)?;
                let ty = z.ty.unwrap_or_else(|| v.type_tag());
                let text = CatRender::for_type(ty).render_value(v);
                self.set(z.v1, Value::Str(text))
            }
            Op::Cat1 => {
                let s = self.str_at(z.v2)?;
                self.set(z.v1, Value::Str(s))
            }
            Op::Cat2 | Op::Cat3 | Op::Cat4 | Op::Cat5 | Op::Cat6 | Op::Cat7 | Op::Cat8
            | Op::CatN => {
                let aux = aux_of(z)?;
                let text = self.render_cat(z.op, aux)?;
                self.set(z.v1, Value::Str(text))
            }

            Op::CurrentTime => self.set(z.v1, Value::Time(self.now)),
            Op::NetworkTime => self.set(z.v1, Value::Time(self.network_time)),
            Op::ReadingLiveTraffic => self.set(z.v1, Value::Bool(self.reading_live)),
            Op::ReadingTraces => self.set(z.v1, Value::Bool(self.reading_traces)),

            Op::PortProtocol => {
                let proto = match self.get(z.v2)? {
                    Value::Port { proto, .. } => *proto,
                    other => {
                        return Err(VmError::TypeError(format!("expected port, got {:?}", other)))
                    }
                };
                self.set(z.v1, port_proto_value(proto))
            }

            Op::Strstr => {
                let big = self.str_at(z.v2)?;
                let little = self.str_at(z.v3)?;
                self.set(z.v1, Value::Count(strings::strstr(&big, &little)))
            }
            Op::StrstrConstLittle => {
                let big = self.str_at(z.v2)?;
                let little = konst_str(z)?;
                self.set(z.v1, Value::Count(strings::strstr(&big, little)))
            }
            Op::StrstrConstBig => {
                let big = konst_str(z)?.to_string();
                let little = self.str_at(z.v2)?;
                self.set(z.v1, Value::Count(strings::strstr(&big, &little)))
            }

            Op::SubBytes => {
                let s = self.str_at(z.v2)?;
                let start = self.count_at(z.v3)?;
                let n = self.int_at(z.v4)?;
                self.set(z.v1, Value::Str(strings::sub_bytes(&s, start, n)))
            }
            Op::SubBytesLenImm => {
                let s = self.str_at(z.v2)?;
                let start = self.count_at(z.v3)?;
                self.set(z.v1, Value::Str(strings::sub_bytes(&s, start, z.v4)))
            }
            Op::SubBytesStartImm => {
                let s = self.str_at(z.v2)?;
                let n = self.int_at(z.v3)?;
                self.set(z.v1, Value::Str(strings::sub_bytes(&s, z.v4 as u64, n)))
            }
            Op::SubBytesStartLenImm => {
                let s = self.str_at(z.v2)?;
                self.set(z.v1, Value::Str(strings::sub_bytes(&s, z.v3 as u64, z.v4)))
            }
            Op::SubBytesConst => {
                let s = konst_str(z)?.to_string();
                let start = self.count_at(z.v2)?;
                let n = self.int_at(z.v3)?;
                self.set(z.v1, Value::Str(strings::sub_bytes(&s, start, n)))
            }
            Op::SubBytesConstLenImm => {
                let s = konst_str(z)?.to_string();
                let start = self.count_at(z.v2)?;
                self.set(z.v1, Value::Str(strings::sub_bytes(&s, start, z.v3)))
            }
            Op::SubBytesConstStartImm => {
                let s = konst_str(z)?.to_string();
                let n = self.int_at(z.v2)?;
                self.set(z.v1, Value::Str(strings::sub_bytes(&s, z.v3 as u64, n)))
            }
            Op::SubBytesConstStartLenImm => {
                let s = konst_str(z)?.to_string();
                self.set(z.v1, Value::Str(strings::sub_bytes(&s, z.v2 as u64, z.v3)))
            }

            Op::ToLower => {
                let s = self.str_at(z.v2)?;
                self.set(z.v1, Value::Str(strings::to_lower(&s)))
            }

            Op::CallBuiltin => {
                let aux = aux_of(z)?;
                let callee = aux
                    .callee
                    .ok_or_else(|| VmError::Malformed("generic call without callee".to_string()))?;
                let argv = self.gather_args(aux)?;
                let result = builtins::invoke(self, callee, &argv)?;
                self.set(z.v1, result)
            }
            Op::CallBuiltinVoid => {
                let aux = aux_of(z)?;
                let callee = aux
                    .callee
                    .ok_or_else(|| VmError::Malformed("generic call without callee".to_string()))?;
                let argv = self.gather_args(aux)?;
                builtins::invoke(self, callee, &argv)?;
                Ok(())
            }
        }
    }

    /// Walk the compile-time-selected converter list; no per-operand type
    /// dispatch happens here.
    fn render_cat(&self, op: Op, aux: &AuxData) -> Result<String, VmError> {
        if aux.renders.len() != aux.items.len() {
            return Err(VmError::Malformed(format!(
                "{}: {} operands but {} converters",
                op,
                aux.items.len(),
                aux.renders.len()
            )));
        }
        let mut out = String::new();
        for (item, render) in aux.items.iter().zip(&aux.renders) {
            match item {
                AuxItem::Const(v) => out.push_str(&render.render_value(v)),
                AuxItem::Slot { slot, .. } => {
                    out.push_str(&render.render_value(self.get(*slot as i64)?))
                }
            }
        }
        Ok(out)
    }

    fn gather_args(&self, aux: &AuxData) -> Result<Vec<Value>, VmError> {
        aux.items
            .iter()
            .map(|item| match item {
                AuxItem::Const(v) => Ok(v.clone()),
                AuxItem::Slot { slot, .. } => self.get(*slot as i64).cloned(),
            })
            .collect()
    }
}

pub(crate) fn port_proto_value(proto: Transport) -> Value {
    Value::Enum(proto.to_string())
}

fn konst(z: &Instruction) -> Result<&Value, VmError> {
    z.konst.as_ref().ok_or(VmError::MissingConst(z.op))
}

fn konst_str(z: &Instruction) -> Result<&str, VmError> {
    match konst(z)? {
        Value::Str(s) => Ok(s),
        other => Err(VmError::TypeError(format!("expected string constant, got {:?}", other))),
    }
}

fn aux_of(z: &Instruction) -> Result<&AuxData, VmError> {
    z.aux.as_ref().ok_or(VmError::MissingAux(z.op))
}

fn aux_const(z: &Instruction, idx: usize) -> Result<&Value, VmError> {
    match aux_of(z)?.items.get(idx) {
        Some(AuxItem::Const(v)) => Ok(v),
        _ => Err(VmError::Malformed(format!("{}: missing constant operand {}", z.op, idx))),
    }
}
