//! Parsing the textual format `middle::text` renders back into a
//! `tir::Program`.
//!
//! This is the "third-party IR library" collaborator the original toolchain
//! treats as external: no Rust crate implements this exact grammar, so we own
//! a small hand-written reader instead, tokenized line-by-line with `Regex`
//! the same way `front::lex` tokenizes source text. Since our textual format
//! already is `tir`'s `Display` form, `parse` is the round-trip inverse of
//! `middle::text`'s impls: re-reading a rendering of a program reproduces it
//! exactly, names included.

use regex::Regex;

use crate::common::Id;
use crate::error::CompileError;

use super::tir::*;

pub fn parse(text: &str) -> Result<Program, CompileError> {
    Reader::new(text).program()
}

struct Reader<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

fn malformed(line: &str) -> CompileError {
    CompileError::IrMalformed(line.to_string())
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        let lines = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        Reader { lines, pos: 0 }
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<&'a str> {
        let line = self.peek();
        if line.is_some() {
            self.pos += 1;
        }
        line
    }

    fn program(&mut self) -> Result<Program, CompileError> {
        let mut globals = Vec::new();
        while let Some(line) = self.peek() {
            if !line.starts_with("global ") {
                break;
            }
            globals.push(self.global_decl()?);
        }

        let mut funcs = Vec::new();
        while self.peek().is_some() {
            funcs.push(self.function()?);
        }
        Ok(Program { globals, funcs })
    }

    fn global_decl(&mut self) -> Result<GlobalDecl, CompileError> {
        let re = Regex::new(r"^global (@\w+) = alloc i32, (zeroinit|-?\d+)$").unwrap();
        let line = self.advance().expect("caller checked peek");
        let caps = re.captures(line).ok_or_else(|| malformed(line))?;
        let name = Id::new(caps[1].to_string());
        let init = if &caps[2] == "zeroinit" {
            GlobalInit::Zero
        } else {
            GlobalInit::Word(caps[2].parse().map_err(|_| malformed(line))?)
        };
        Ok(GlobalDecl { name, init })
    }

    fn function(&mut self) -> Result<Function, CompileError> {
        let re = Regex::new(r"^fun (@\w+)\(\)(: i32)? \{$").unwrap();
        let line = self.advance().ok_or_else(|| malformed(""))?;
        let caps = re.captures(line).ok_or_else(|| malformed(line))?;
        let name = Id::new(caps[1].to_string());
        let ret_type = if caps.get(2).is_some() { Type::Int32 } else { Type::Unit };

        let mut blocks = Vec::new();
        loop {
            let line = self.peek().ok_or_else(|| malformed(""))?;
            if line == "}" {
                self.advance();
                break;
            }
            blocks.push(self.basic_block()?);
        }
        Ok(Function { name, ret_type, blocks })
    }

    fn basic_block(&mut self) -> Result<BasicBlock, CompileError> {
        let label_re = Regex::new(r"^(%\w+):$").unwrap();
        let line = self.advance().ok_or_else(|| malformed(""))?;
        let caps = label_re.captures(line).ok_or_else(|| malformed(line))?;
        let label = Id::new(caps[1].to_string());

        let mut insns = Vec::new();
        loop {
            let line = self.peek().ok_or_else(|| malformed(""))?;
            if let Some(term) = self.try_terminator(line)? {
                self.advance();
                return Ok(BasicBlock { label, insns, term });
            }
            insns.push(self.instruction()?);
        }
    }

    fn try_terminator(&self, line: &str) -> Result<Option<Terminator>, CompileError> {
        if let Some(rest) = line.strip_prefix("ret") {
            let rest = rest.trim();
            return Ok(Some(Terminator::Return(if rest.is_empty() {
                None
            } else {
                Some(self.operand(rest)?)
            })));
        }
        if let Some(rest) = line.strip_prefix("jump ") {
            return Ok(Some(Terminator::Jump(Id::new(rest.trim().to_string()))));
        }
        if let Some(rest) = line.strip_prefix("br ") {
            let parts: Vec<&str> = rest.split(',').map(str::trim).collect();
            if parts.len() != 3 {
                return Err(malformed(line));
            }
            return Ok(Some(Terminator::Branch {
                cond: self.operand(parts[0])?,
                if_true: Id::new(parts[1].to_string()),
                if_false: Id::new(parts[2].to_string()),
            }));
        }
        Ok(None)
    }

    fn operand(&self, text: &str) -> Result<Operand, CompileError> {
        if let Ok(v) = text.parse::<i32>() {
            Ok(Operand::Imm(v))
        } else if text.starts_with('%') || text.starts_with('@') {
            Ok(Operand::Value(Id::new(text.to_string())))
        } else {
            Err(malformed(text))
        }
    }

    fn instruction(&mut self) -> Result<Instruction, CompileError> {
        let alloc_re = Regex::new(r"^([@%]\w+) = alloc i32$").unwrap();
        let load_re = Regex::new(r"^([@%]\w+) = load ([@%]\w+)$").unwrap();
        let store_re = Regex::new(r"^store (.+), ([@%]\w+)$").unwrap();
        let binary_re =
            Regex::new(r"^([@%]\w+) = (add|sub|mul|div|mod|lt|le|gt|ge|eq|ne|and|or) (.+), (.+)$")
                .unwrap();

        let line = self.advance().ok_or_else(|| malformed(""))?;

        if let Some(caps) = alloc_re.captures(line) {
            return Ok(Instruction::Alloc { dst: Id::new(caps[1].to_string()) });
        }
        if let Some(caps) = load_re.captures(line) {
            return Ok(Instruction::Load {
                dst: Id::new(caps[1].to_string()),
                src: Id::new(caps[2].to_string()),
            });
        }
        if let Some(caps) = store_re.captures(line) {
            return Ok(Instruction::Store {
                src: self.operand(&caps[1])?,
                dst: Id::new(caps[2].to_string()),
            });
        }
        if let Some(caps) = binary_re.captures(line) {
            let op = match &caps[2] {
                "add" => BinOp::Add,
                "sub" => BinOp::Sub,
                "mul" => BinOp::Mul,
                "div" => BinOp::Div,
                "mod" => BinOp::Mod,
                "lt" => BinOp::Lt,
                "le" => BinOp::Le,
                "gt" => BinOp::Gt,
                "ge" => BinOp::Ge,
                "eq" => BinOp::Eq,
                "ne" => BinOp::Ne,
                "and" => BinOp::And,
                "or" => BinOp::Or,
                _ => unreachable!("regex only matches known op names"),
            };
            return Ok(Instruction::Binary {
                dst: Id::new(caps[1].to_string()),
                op,
                lhs: self.operand(&caps[3])?,
                rhs: self.operand(&caps[4])?,
            });
        }
        Err(malformed(line))
    }
}
