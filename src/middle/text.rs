//! Rendering the IR data model as Koopa-like text.
//!
//! This is both the final artifact in `-koopa` mode and the input text
//! `middle::reader` parses back in. The `Display` impls walk `globals` then
//! `funcs` then `blocks` then `insns` in source order, with no reordering
//! pass, so assembly emission order (driven by this same traversal in
//! `back::codegen`) equals source order.

use std::fmt;

use super::tir::*;

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int32 => write!(f, "i32"),
            Type::Unit => Ok(()),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for global in &self.globals {
            writeln!(f, "{global}")?;
        }
        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for (i, func) in self.funcs.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{func}")?;
        }
        Ok(())
    }
}

impl fmt::Display for GlobalDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.init {
            GlobalInit::Zero => write!(f, "global {} = alloc i32, zeroinit", self.name),
            GlobalInit::Word(v) => write!(f, "global {} = alloc i32, {v}", self.name),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ret = match self.ret_type {
            Type::Int32 => ": i32",
            Type::Unit => "",
        };
        writeln!(f, "fun {}(){ret} {{", self.name)?;
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        for insn in &self.insns {
            writeln!(f, "  {insn}")?;
        }
        writeln!(f, "  {}", self.term)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Imm(v) => write!(f, "{v}"),
            Operand::Value(id) => write!(f, "{id}"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Alloc { dst } => write!(f, "{dst} = alloc i32"),
            Instruction::Load { dst, src } => write!(f, "{dst} = load {src}"),
            Instruction::Store { src, dst } => write!(f, "store {src}, {dst}"),
            Instruction::Binary { dst, op, lhs, rhs } => write!(f, "{dst} = {op} {lhs}, {rhs}"),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Return(Some(op)) => write!(f, "ret {op}"),
            Terminator::Return(None) => write!(f, "ret"),
            Terminator::Jump(label) => write!(f, "jump {label}"),
            Terminator::Branch { cond, if_true, if_false } => {
                write!(f, "br {cond}, {if_true}, {if_false}")
            }
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Mod => "mod",
            BinOp::Lt => "lt",
            BinOp::Le => "le",
            BinOp::Gt => "gt",
            BinOp::Ge => "ge",
            BinOp::Eq => "eq",
            BinOp::Ne => "ne",
            BinOp::And => "and",
            BinOp::Or => "or",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Id;

    #[test]
    fn renders_a_minimal_function() {
        let prog = Program {
            globals: vec![],
            funcs: vec![Function {
                name: Id::new("@main".to_string()),
                ret_type: Type::Int32,
                blocks: vec![BasicBlock {
                    label: Id::new("%entry".to_string()),
                    insns: vec![],
                    term: Terminator::Return(Some(Operand::Imm(0))),
                }],
            }],
        };
        let text = prog.to_string();
        assert_eq!(text, "fun @main(): i32 {\n%entry:\n  ret 0\n}\n");
    }

    #[test]
    fn renders_a_binary_instruction_and_store() {
        let block = BasicBlock {
            label: Id::new("%entry".to_string()),
            insns: vec![
                Instruction::Alloc { dst: Id::new("@x_0".to_string()) },
                Instruction::Store {
                    src: Operand::Imm(1),
                    dst: Id::new("@x_0".to_string()),
                },
                Instruction::Binary {
                    dst: Id::new("%0".to_string()),
                    op: BinOp::Add,
                    lhs: Operand::Imm(1),
                    rhs: Operand::Imm(2),
                },
            ],
            term: Terminator::Return(None),
        };
        let text = block.to_string();
        assert_eq!(
            text,
            "%entry:\n  @x_0 = alloc i32\n  store 1, @x_0\n  %0 = add 1, 2\n  ret\n"
        );
    }

    #[test]
    fn renders_a_zeroinit_global() {
        let g = GlobalDecl {
            name: Id::new("@g".to_string()),
            init: GlobalInit::Zero,
        };
        assert_eq!(g.to_string(), "global @g = alloc i32, zeroinit");
    }
}
