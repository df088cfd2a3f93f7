//! IR → RISC-V assembly.
//!
//! No separate register-allocation pass: allocation is fused into code
//! generation the way the teacher's own backend describes it — every binary
//! result is spilled to a fresh stack slot as soon as it's produced
//! (simplicity over register pressure), and a value's location (register,
//! stack slot, or literal) is looked up on demand as operands are consumed.

use crate::common::{Id, Set};
use crate::error::CompileError;
use crate::middle::tir;

use super::asm::{ArithOp, AsmFunction, AsmProgram, DataDecl, Instruction, Register, ALLOCATABLE};
use Register::*;

/// Where a value currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Imm(i32),
    Reg(Register),
    Stack(i32),
}

/// The set of registers available for allocation at a given point.
pub struct RegisterPool {
    free: Set<Register>,
}

impl RegisterPool {
    pub fn new() -> Self {
        RegisterPool {
            free: ALLOCATABLE.iter().copied().collect(),
        }
    }

    /// Hand out the lowest-sorted free register, or fail if none remain.
    pub fn alloc(&mut self) -> Result<Register, CompileError> {
        let reg = *self.free.iter().next().ok_or(CompileError::RegisterStarvation)?;
        self.free.remove(&reg);
        Ok(reg)
    }

    /// Return a register to the pool. A register backing a live value must
    /// never be released while still live.
    pub fn release(&mut self, reg: Register) {
        self.free.insert(reg);
    }
}

impl Default for RegisterPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Plans the stack frame for one function: one 4-byte slot per `i32`-typed
/// instruction result, rounded up to 16. Deliberately an over-allocation —
/// simplicity over density, since nothing here tracks value liveness to
/// reuse slots.
pub struct StackFrame {
    pub total: u32,
    used: u32,
}

impl StackFrame {
    pub fn plan(func: &tir::Function) -> StackFrame {
        let slots: u32 = func
            .blocks
            .iter()
            .flat_map(|b| &b.insns)
            .filter(|insn| insn.dst().is_some())
            .count() as u32;
        // No `call` instruction exists in this subset's IR, so every
        // function is a leaf and never needs to spill `ra`.
        let total = round_up_16(slots * 4);
        StackFrame { total, used: 0 }
    }

    /// Reserve the next 4-byte slot and return its offset from `sp`.
    pub fn grow(&mut self) -> i32 {
        self.used += 4;
        debug_assert!(self.used <= self.total, "stack frame planned too small");
        (self.total - self.used) as i32
    }
}

fn round_up_16(n: u32) -> u32 {
    (n + 15) & !15
}

/// Tracks where every IR value currently lives.
pub struct ValueLocations {
    map: crate::common::Map<Id, Location>,
}

impl ValueLocations {
    fn new() -> Self {
        ValueLocations { map: crate::common::Map::new() }
    }

    fn get(&self, id: Id) -> Result<Location, CompileError> {
        self.map
            .get(&id)
            .copied()
            .ok_or_else(|| CompileError::IrMalformed(format!("use of undefined value {id}")))
    }

    fn set(&mut self, id: Id, loc: Location) {
        self.map.insert(id, loc);
    }
}

/// Is `imm` representable in the 12-bit signed immediate RISC-V `sw`/`lw`/
/// `addi` encodings use?
pub fn imm12_fits(imm: i32) -> bool {
    (-2048..=2047).contains(&imm)
}

fn push_sw(out: &mut Vec<Instruction>, pool: &mut RegisterPool, src: Register, base: Register, offset: i32) -> Result<(), CompileError> {
    if imm12_fits(offset) {
        out.push(Instruction::Sw { src, base, offset });
    } else {
        let scratch = pool.alloc()?;
        out.push(Instruction::Li { dst: scratch, imm: offset });
        out.push(Instruction::Arith { op: ArithOp::Add, dst: scratch, lhs: scratch, rhs: base });
        out.push(Instruction::Sw { src, base: scratch, offset: 0 });
        pool.release(scratch);
    }
    Ok(())
}

fn push_lw(out: &mut Vec<Instruction>, pool: &mut RegisterPool, dst: Register, base: Register, offset: i32) -> Result<(), CompileError> {
    if imm12_fits(offset) {
        out.push(Instruction::Lw { dst, base, offset });
    } else {
        let scratch = pool.alloc()?;
        out.push(Instruction::Li { dst: scratch, imm: offset });
        out.push(Instruction::Arith { op: ArithOp::Add, dst: scratch, lhs: scratch, rhs: base });
        out.push(Instruction::Lw { dst, base: scratch, offset: 0 });
        pool.release(scratch);
    }
    Ok(())
}

fn push_addi_sp(out: &mut Vec<Instruction>, pool: &mut RegisterPool, imm: i32) -> Result<(), CompileError> {
    if imm12_fits(imm) {
        out.push(Instruction::Addi { dst: Sp, src: Sp, imm });
    } else {
        let scratch = pool.alloc()?;
        out.push(Instruction::Li { dst: scratch, imm });
        out.push(Instruction::Arith { op: ArithOp::Add, dst: Sp, lhs: Sp, rhs: scratch });
        pool.release(scratch);
    }
    Ok(())
}

/// Move a value from one location to another: the six exhaustive
/// `(src, dst)` arms this subset's store/return/spill paths all reduce to.
fn move_value(src: Location, dst: Location, pool: &mut RegisterPool, out: &mut Vec<Instruction>) -> Result<(), CompileError> {
    match (src, dst) {
        (Location::Imm(v), Location::Reg(dst)) => out.push(Instruction::Li { dst, imm: v }),
        (Location::Imm(v), Location::Stack(off)) => {
            let r = pool.alloc()?;
            out.push(Instruction::Li { dst: r, imm: v });
            push_sw(out, pool, r, Sp, off)?;
            pool.release(r);
        }
        (Location::Reg(src), Location::Reg(dst)) => {
            if src != dst {
                out.push(Instruction::Mv { dst, src });
            }
        }
        (Location::Reg(src), Location::Stack(off)) => push_sw(out, pool, src, Sp, off)?,
        (Location::Stack(src_off), Location::Stack(dst_off)) => {
            let r = pool.alloc()?;
            push_lw(out, pool, r, Sp, src_off)?;
            push_sw(out, pool, r, Sp, dst_off)?;
            pool.release(r);
        }
        (Location::Stack(off), Location::Reg(dst)) => push_lw(out, pool, dst, Sp, off)?,
    }
    Ok(())
}

/// Materialize a location into a register, allocating a fresh one if needed.
fn materialize(loc: Location, pool: &mut RegisterPool, out: &mut Vec<Instruction>) -> Result<Register, CompileError> {
    match loc {
        Location::Reg(r) => Ok(r),
        Location::Imm(v) => {
            let r = pool.alloc()?;
            out.push(Instruction::Li { dst: r, imm: v });
            Ok(r)
        }
        Location::Stack(off) => {
            let r = pool.alloc()?;
            push_lw(out, pool, r, Sp, off)?;
            Ok(r)
        }
    }
}

fn resolve_operand(op: tir::Operand, locs: &ValueLocations) -> Result<Location, CompileError> {
    match op {
        tir::Operand::Imm(v) => Ok(Location::Imm(v)),
        tir::Operand::Value(id) => locs.get(id),
    }
}

/// Lazily reserve a stack slot for `id` the first time it's touched by a
/// `Store` or `Load` (the `Alloc` instruction itself emits nothing).
fn ensure_stack_slot(frame: &mut StackFrame, locs: &mut ValueLocations, id: Id) -> Location {
    match locs.get(id) {
        Ok(loc @ Location::Stack(_)) => loc,
        _ => {
            let off = frame.grow();
            locs.set(id, Location::Stack(off));
            Location::Stack(off)
        }
    }
}

fn strip_sigil(id: Id) -> String {
    id.to_string().trim_start_matches(['@', '%']).to_string()
}

fn mangle_label(label: Id, func_name: &str) -> Id {
    Id::new(format!("{}_{func_name}", strip_sigil(label)))
}

fn codegen_load(
    dst: Id,
    src: Id,
    pool: &mut RegisterPool,
    frame: &mut StackFrame,
    locs: &mut ValueLocations,
    globals: &Set<Id>,
    out: &mut Vec<Instruction>,
) -> Result<(), CompileError> {
    if globals.contains(&src) {
        let addr = pool.alloc()?;
        out.push(Instruction::La { dst: addr, symbol: src });
        push_lw(out, pool, addr, addr, 0)?;
        let off = frame.grow();
        push_sw(out, pool, addr, Sp, off)?;
        locs.set(dst, Location::Stack(off));
        pool.release(addr);
    } else {
        let loc = ensure_stack_slot(frame, locs, src);
        locs.set(dst, loc);
    }
    Ok(())
}

fn codegen_store(
    src: tir::Operand,
    dst: Id,
    pool: &mut RegisterPool,
    frame: &mut StackFrame,
    locs: &mut ValueLocations,
    globals: &Set<Id>,
    out: &mut Vec<Instruction>,
) -> Result<(), CompileError> {
    if globals.contains(&dst) {
        let addr = pool.alloc()?;
        out.push(Instruction::La { dst: addr, symbol: dst });
        let src_loc = resolve_operand(src, locs)?;
        let val = materialize(src_loc, pool, out)?;
        push_sw(out, pool, val, addr, 0)?;
        pool.release(val);
        pool.release(addr);
    } else {
        let dst_loc = ensure_stack_slot(frame, locs, dst);
        let src_loc = resolve_operand(src, locs)?;
        move_value(src_loc, dst_loc, pool, out)?;
    }
    Ok(())
}

fn codegen_binary(
    dst: Id,
    op: tir::BinOp,
    lhs: tir::Operand,
    rhs: tir::Operand,
    pool: &mut RegisterPool,
    frame: &mut StackFrame,
    locs: &mut ValueLocations,
    out: &mut Vec<Instruction>,
) -> Result<(), CompileError> {
    let lhs_loc = resolve_operand(lhs, locs)?;
    let rhs_loc = resolve_operand(rhs, locs)?;
    let lhs_reg = materialize(lhs_loc, pool, out)?;
    let rhs_reg = materialize(rhs_loc, pool, out)?;

    use tir::BinOp::*;
    match op {
        Add => out.push(Instruction::Arith { op: ArithOp::Add, dst: lhs_reg, lhs: lhs_reg, rhs: rhs_reg }),
        Sub => out.push(Instruction::Arith { op: ArithOp::Sub, dst: lhs_reg, lhs: lhs_reg, rhs: rhs_reg }),
        Mul => out.push(Instruction::Arith { op: ArithOp::Mul, dst: lhs_reg, lhs: lhs_reg, rhs: rhs_reg }),
        Div => out.push(Instruction::Arith { op: ArithOp::Div, dst: lhs_reg, lhs: lhs_reg, rhs: rhs_reg }),
        Mod => out.push(Instruction::Arith { op: ArithOp::Rem, dst: lhs_reg, lhs: lhs_reg, rhs: rhs_reg }),
        And => out.push(Instruction::Arith { op: ArithOp::And, dst: lhs_reg, lhs: lhs_reg, rhs: rhs_reg }),
        Or => out.push(Instruction::Arith { op: ArithOp::Or, dst: lhs_reg, lhs: lhs_reg, rhs: rhs_reg }),
        Lt => out.push(Instruction::Slt { dst: lhs_reg, lhs: lhs_reg, rhs: rhs_reg }),
        Gt => out.push(Instruction::Sgt { dst: lhs_reg, lhs: lhs_reg, rhs: rhs_reg }),
        Ge => {
            out.push(Instruction::Slt { dst: lhs_reg, lhs: lhs_reg, rhs: rhs_reg });
            out.push(Instruction::Xori { dst: lhs_reg, src: lhs_reg, imm: 1 });
        }
        Le => {
            out.push(Instruction::Sgt { dst: lhs_reg, lhs: lhs_reg, rhs: rhs_reg });
            out.push(Instruction::Xori { dst: lhs_reg, src: lhs_reg, imm: 1 });
        }
        Eq => {
            out.push(Instruction::Xor { dst: lhs_reg, lhs: lhs_reg, rhs: rhs_reg });
            out.push(Instruction::Seqz { dst: lhs_reg, src: lhs_reg });
        }
        Ne => {
            out.push(Instruction::Xor { dst: lhs_reg, lhs: lhs_reg, rhs: rhs_reg });
            out.push(Instruction::Snez { dst: lhs_reg, src: lhs_reg });
        }
    }

    pool.release(rhs_reg);
    let off = frame.grow();
    push_sw(out, pool, lhs_reg, Sp, off)?;
    locs.set(dst, Location::Stack(off));
    pool.release(lhs_reg);
    Ok(())
}

fn codegen_insn(
    insn: &tir::Instruction,
    pool: &mut RegisterPool,
    frame: &mut StackFrame,
    locs: &mut ValueLocations,
    globals: &Set<Id>,
    out: &mut Vec<Instruction>,
) -> Result<(), CompileError> {
    match insn {
        tir::Instruction::Alloc { .. } => Ok(()),
        tir::Instruction::Load { dst, src } => codegen_load(*dst, *src, pool, frame, locs, globals, out),
        tir::Instruction::Store { src, dst } => codegen_store(*src, *dst, pool, frame, locs, globals, out),
        tir::Instruction::Binary { dst, op, lhs, rhs } => codegen_binary(*dst, *op, *lhs, *rhs, pool, frame, locs, out),
    }
}

fn emit_prologue(frame: &StackFrame, pool: &mut RegisterPool, out: &mut Vec<Instruction>) -> Result<(), CompileError> {
    if frame.total > 0 {
        push_addi_sp(out, pool, -(frame.total as i32))?;
    }
    Ok(())
}

fn emit_epilogue(frame: &StackFrame, pool: &mut RegisterPool, out: &mut Vec<Instruction>) -> Result<(), CompileError> {
    if frame.total > 0 {
        push_addi_sp(out, pool, frame.total as i32)?;
    }
    out.push(Instruction::Ret);
    Ok(())
}

fn codegen_term(
    term: &tir::Terminator,
    func_name: &str,
    frame: &StackFrame,
    pool: &mut RegisterPool,
    locs: &ValueLocations,
    out: &mut Vec<Instruction>,
) -> Result<(), CompileError> {
    match term {
        tir::Terminator::Return(operand) => {
            if let Some(op) = operand {
                let loc = resolve_operand(*op, locs)?;
                move_value(loc, Location::Reg(A0), pool, out)?;
            }
            emit_epilogue(frame, pool, out)
        }
        tir::Terminator::Jump(label) => {
            out.push(Instruction::J { label: mangle_label(*label, func_name) });
            Ok(())
        }
        tir::Terminator::Branch { cond, if_true, if_false } => {
            let loc = resolve_operand(*cond, locs)?;
            let reg = materialize(loc, pool, out)?;
            let true_label = mangle_label(*if_true, func_name);
            let false_label = mangle_label(*if_false, func_name);
            let mid_label = Id::new(format!("{true_label}_mid"));
            out.push(Instruction::Bnez { cond: reg, label: mid_label });
            out.push(Instruction::J { label: false_label });
            out.push(Instruction::Label(mid_label));
            out.push(Instruction::J { label: true_label });
            pool.release(reg);
            Ok(())
        }
    }
}

pub fn codegen_function(func: &tir::Function, globals: &Set<Id>) -> Result<AsmFunction, CompileError> {
    let fn_name = strip_sigil(func.name);
    let mut pool = RegisterPool::new();
    let mut frame = StackFrame::plan(func);
    let mut locs = ValueLocations::new();
    let mut out = Vec::new();

    emit_prologue(&frame, &mut pool, &mut out)?;

    for block in &func.blocks {
        out.push(Instruction::Label(mangle_label(block.label, &fn_name)));
        for insn in &block.insns {
            codegen_insn(insn, &mut pool, &mut frame, &mut locs, globals, &mut out)?;
        }
        codegen_term(&block.term, &fn_name, &frame, &mut pool, &locs, &mut out)?;
    }

    Ok(AsmFunction { name: Id::new(fn_name), insns: out })
}

pub fn codegen_program(prog: &tir::Program) -> Result<AsmProgram, CompileError> {
    let globals: Set<Id> = prog.globals.iter().map(|g| g.name).collect();

    let text = prog
        .funcs
        .iter()
        .map(|f| codegen_function(f, &globals))
        .collect::<Result<Vec<_>, _>>()?;

    let data = prog
        .globals
        .iter()
        .map(|g| {
            let decl = match g.init {
                tir::GlobalInit::Zero => DataDecl::Zero(4),
                tir::GlobalInit::Word(v) => DataDecl::Word(v),
            };
            (Id::new(strip_sigil(g.name)), decl)
        })
        .collect();

    Ok(AsmProgram { text, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_pool_hands_out_lowest_sorted_register_first() {
        let mut pool = RegisterPool::new();
        assert_eq!(pool.alloc().unwrap(), T0);
        assert_eq!(pool.alloc().unwrap(), T1);
    }

    #[test]
    fn register_pool_starves_when_exhausted() {
        let mut pool = RegisterPool::new();
        let mut taken = Vec::new();
        for _ in 0..ALLOCATABLE.len() {
            taken.push(pool.alloc().unwrap());
        }
        assert!(matches!(pool.alloc(), Err(CompileError::RegisterStarvation)));
        pool.release(taken[0]);
        assert!(pool.alloc().is_ok());
    }

    #[test]
    fn stack_frame_rounds_up_to_16() {
        let func = tir::Function {
            name: Id::new("@f".to_string()),
            ret_type: tir::Type::Int32,
            blocks: vec![tir::BasicBlock {
                label: Id::new("%entry".to_string()),
                insns: vec![
                    tir::Instruction::Alloc { dst: Id::new("@x_0".to_string()) },
                    tir::Instruction::Binary {
                        dst: Id::new("%0".to_string()),
                        op: tir::BinOp::Add,
                        lhs: tir::Operand::Imm(1),
                        rhs: tir::Operand::Imm(2),
                    },
                ],
                term: tir::Terminator::Return(None),
            }],
        };
        let frame = StackFrame::plan(&func);
        assert_eq!(frame.total, 16);
    }

    #[test]
    fn imm12_boundaries() {
        assert!(imm12_fits(2047));
        assert!(imm12_fits(-2048));
        assert!(!imm12_fits(2048));
        assert!(!imm12_fits(-2049));
    }

    #[test]
    fn codegen_function_for_a_literal_return_has_no_frame() {
        let func = tir::Function {
            name: Id::new("@main".to_string()),
            ret_type: tir::Type::Int32,
            blocks: vec![tir::BasicBlock {
                label: Id::new("%entry".to_string()),
                insns: vec![],
                term: tir::Terminator::Return(Some(tir::Operand::Imm(42))),
            }],
        };
        let globals = Set::new();
        let asm = codegen_function(&func, &globals).unwrap();
        let text = asm.to_string();
        assert!(text.contains("li a0, 42"));
        assert!(text.contains("ret"));
        assert!(!text.contains("addi sp"));
    }
}
