//! The RISC-V instruction and register model for this subset: a 32-bit,
//! single-function, straight-line world — no calling convention, no
//! GC/allocator runtime hooks, no multi-word values. `back::codegen` is the
//! only producer of `Instruction` values; this module just owns their shape
//! and how they print.

use derive_more::Display;

use crate::common::Id;

/// Registers available to the code generator. `sp`/`ra`/`zero` are never
/// handed out by `RegisterPool`; they're addressed directly by the
/// instructions that need them (prologue/epilogue, `ra` spill).
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum Register {
    #[display("zero")]
    Zero,
    #[display("ra")]
    Ra,
    #[display("sp")]
    Sp,
    #[display("t0")]
    T0,
    #[display("t1")]
    T1,
    #[display("t2")]
    T2,
    #[display("t3")]
    T3,
    #[display("t4")]
    T4,
    #[display("t5")]
    T5,
    #[display("t6")]
    T6,
    #[display("a0")]
    A0,
    #[display("a1")]
    A1,
    #[display("a2")]
    A2,
    #[display("a3")]
    A3,
    #[display("a4")]
    A4,
    #[display("a5")]
    A5,
    #[display("a6")]
    A6,
    #[display("a7")]
    A7,
    #[display("s0")]
    S0,
    #[display("s1")]
    S1,
    #[display("s2")]
    S2,
    #[display("s3")]
    S3,
    #[display("s4")]
    S4,
    #[display("s5")]
    S5,
    #[display("s6")]
    S6,
    #[display("s7")]
    S7,
    #[display("s8")]
    S8,
    #[display("s9")]
    S9,
    #[display("s10")]
    S10,
    #[display("s11")]
    S11,
}

/// Registers the register pool may hand out: every temporary, argument, and
/// saved register, in `BTreeSet` order for deterministic allocation.
pub const ALLOCATABLE: &[Register] = &[
    Register::T0,
    Register::T1,
    Register::T2,
    Register::T3,
    Register::T4,
    Register::T5,
    Register::T6,
    Register::A0,
    Register::A1,
    Register::A2,
    Register::A3,
    Register::A4,
    Register::A5,
    Register::A6,
    Register::A7,
    Register::S0,
    Register::S1,
    Register::S2,
    Register::S3,
    Register::S4,
    Register::S5,
    Register::S6,
    Register::S7,
    Register::S8,
    Register::S9,
    Register::S10,
    Register::S11,
];

#[derive(Clone, Copy, Eq, PartialEq, Debug, Display)]
pub enum ArithOp {
    #[display("add")]
    Add,
    #[display("sub")]
    Sub,
    #[display("mul")]
    Mul,
    #[display("div")]
    Div,
    #[display("rem")]
    Rem,
    #[display("and")]
    And,
    #[display("or")]
    Or,
    #[display("xor")]
    Xor,
}

/// A RISC-V instruction. One `Display` impl over the whole variant set,
/// rather than a writer function per opcode.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Instruction {
    Li { dst: Register, imm: i32 },
    Mv { dst: Register, src: Register },
    Arith { op: ArithOp, dst: Register, lhs: Register, rhs: Register },
    Addi { dst: Register, src: Register, imm: i32 },
    Sw { src: Register, base: Register, offset: i32 },
    Lw { dst: Register, base: Register, offset: i32 },
    La { dst: Register, symbol: Id },
    Seqz { dst: Register, src: Register },
    Snez { dst: Register, src: Register },
    Slt { dst: Register, lhs: Register, rhs: Register },
    Sgt { dst: Register, lhs: Register, rhs: Register },
    Xori { dst: Register, src: Register, imm: i32 },
    Xor { dst: Register, lhs: Register, rhs: Register },
    J { label: Id },
    Bnez { cond: Register, label: Id },
    Ret,
    Label(Id),
    Comment(String),
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Instruction::*;
        match self {
            Li { dst, imm } => write!(f, "  li {dst}, {imm}"),
            Mv { dst, src } => write!(f, "  mv {dst}, {src}"),
            Arith { op, dst, lhs, rhs } => write!(f, "  {op} {dst}, {lhs}, {rhs}"),
            Addi { dst, src, imm } => write!(f, "  addi {dst}, {src}, {imm}"),
            Sw { src, base, offset } => write!(f, "  sw {src}, {offset}({base})"),
            Lw { dst, base, offset } => write!(f, "  lw {dst}, {offset}({base})"),
            La { dst, symbol } => write!(f, "  la {dst}, {symbol}"),
            Seqz { dst, src } => write!(f, "  seqz {dst}, {src}"),
            Snez { dst, src } => write!(f, "  snez {dst}, {src}"),
            Slt { dst, lhs, rhs } => write!(f, "  slt {dst}, {lhs}, {rhs}"),
            Sgt { dst, lhs, rhs } => write!(f, "  sgt {dst}, {lhs}, {rhs}"),
            Xori { dst, src, imm } => write!(f, "  xori {dst}, {src}, {imm}"),
            Xor { dst, lhs, rhs } => write!(f, "  xor {dst}, {lhs}, {rhs}"),
            J { label } => write!(f, "  j {label}"),
            Bnez { cond, label } => write!(f, "  bnez {cond}, {label}"),
            Ret => write!(f, "  ret"),
            Label(id) => write!(f, "{id}:"),
            Comment(s) => write!(f, "  # {s}"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum DataDecl {
    Zero(u32),
    Word(i32),
}

impl std::fmt::Display for DataDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataDecl::Zero(n) => write!(f, "  .zero {n}"),
            DataDecl::Word(v) => write!(f, "  .word {v}"),
        }
    }
}

pub struct AsmFunction {
    pub name: Id,
    pub insns: Vec<Instruction>,
}

impl std::fmt::Display for AsmFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for insn in &self.insns {
            writeln!(f, "{insn}")?;
        }
        Ok(())
    }
}

pub struct AsmProgram {
    pub text: Vec<AsmFunction>,
    pub data: Vec<(Id, DataDecl)>,
}

impl std::fmt::Display for AsmProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.data.is_empty() {
            writeln!(f, "  .data")?;
            for (name, decl) in &self.data {
                writeln!(f, "  .globl {name}")?;
                writeln!(f, "{name}:")?;
                writeln!(f, "{decl}")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "  .text")?;
        for func in &self.text {
            writeln!(f, "  .globl {}", func.name)?;
            writeln!(f, "{}:", func.name)?;
            write!(f, "{func}")?;
        }
        Ok(())
    }
}
