//! AST → IR lowering.
//!
//! Each `lower_*` function takes an explicit `&mut LowerCtx` and returns the
//! `Operand` it produced, rather than pushing onto a shared operand stack —
//! the return value *is* the one-operand-per-expression invariant, not a
//! convention the caller has to uphold by hand.

use crate::common::Id;
use crate::error::CompileError;
use crate::front::ast;
use crate::front::symtab::{SymbolEntry, SymbolKind, SymbolTable};
use crate::middle::tir::{BasicBlock, BinOp, Function, Instruction, Operand, Program, Terminator, Type};

struct LowerCtx {
    symtab: SymbolTable,
    next_temp: u32,
    insns: Vec<Instruction>,
}

impl LowerCtx {
    fn new() -> Self {
        LowerCtx {
            symtab: SymbolTable::new(),
            next_temp: 0,
            insns: Vec::new(),
        }
    }

    fn fresh_temp(&mut self) -> Id {
        let id = self.next_temp;
        self.next_temp += 1;
        Id::new(format!("%{id}"))
    }

    fn write_alloc(&mut self, dst: Id) {
        self.insns.push(Instruction::Alloc { dst });
    }

    fn write_load(&mut self, dst: Id, src: Id) {
        self.insns.push(Instruction::Load { dst, src });
    }

    fn write_store(&mut self, src: Operand, dst: Id) {
        self.insns.push(Instruction::Store { src, dst });
    }
}

pub fn lower(unit: ast::CompUnit) -> Result<Program, CompileError> {
    lower_program(unit)
}

pub fn lower_program(unit: ast::CompUnit) -> Result<Program, CompileError> {
    let func = lower_func(unit.func_def)?;
    Ok(Program {
        globals: Vec::new(),
        funcs: vec![func],
    })
}

fn lower_func(def: ast::FuncDef) -> Result<Function, CompileError> {
    let ret_type = match def.ret_type {
        ast::FuncType::Int => Type::Int32,
    };

    let mut ctx = LowerCtx::new();
    let term = lower_block(&mut ctx, &def.body)?.unwrap_or(Terminator::Return(Some(Operand::Imm(0))));

    let func = Function {
        name: Id::new(format!("@{}", def.name)),
        ret_type,
        blocks: vec![BasicBlock {
            label: Id::new("%entry".to_string()),
            insns: ctx.insns,
            term,
        }],
    };
    Ok(func)
}

/// Lower a block's items in order. Returns `Some(terminator)` the moment a
/// `return` is reached (directly, or nested inside an inner `{ ... }`);
/// anything textually after that point is unreachable and is not lowered,
/// which keeps the one-terminator-per-block invariant trivially true.
fn lower_block(ctx: &mut LowerCtx, block: &ast::Block) -> Result<Option<Terminator>, CompileError> {
    for item in &block.items {
        match item {
            ast::BlockItem::Decl(decl) => lower_decl(ctx, decl)?,
            ast::BlockItem::Stmt(stmt) => {
                if let Some(term) = lower_stmt(ctx, stmt)? {
                    return Ok(Some(term));
                }
            }
        }
    }
    Ok(None)
}

fn lower_decl(ctx: &mut LowerCtx, decl: &ast::Decl) -> Result<(), CompileError> {
    match decl {
        ast::Decl::Const(const_decl) => {
            for def in &const_decl.defs {
                let value = lower_const_expr(ctx, &def.init, def.name)?;
                let ir_name = ctx.symtab.fresh_ir_name(&def.name.to_string());
                ctx.symtab.insert(SymbolEntry {
                    name: def.name,
                    kind: SymbolKind::Const(value),
                    ir_name,
                })?;
            }
        }
        ast::Decl::Var(var_decl) => {
            for def in &var_decl.defs {
                let ir_name = ctx.symtab.fresh_ir_name(&def.name.to_string());
                ctx.write_alloc(ir_name);
                if let Some(init) = &def.init {
                    let operand = lower_expr(ctx, init)?;
                    ctx.write_store(operand, ir_name);
                }
                ctx.symtab.insert(SymbolEntry {
                    name: def.name,
                    kind: SymbolKind::Var,
                    ir_name,
                })?;
            }
        }
    }
    Ok(())
}

/// Lower an initializer that must fold to a compile-time constant.
fn lower_const_expr(ctx: &mut LowerCtx, expr: &ast::Expr, name: Id) -> Result<i32, CompileError> {
    match lower_expr(ctx, expr)? {
        Operand::Imm(v) => Ok(v),
        Operand::Value(_) => Err(CompileError::NotAConstant { name }),
    }
}

fn lower_stmt(ctx: &mut LowerCtx, stmt: &ast::Stmt) -> Result<Option<Terminator>, CompileError> {
    match stmt {
        ast::Stmt::Assign { lval, expr } => {
            let entry = ctx.symtab.lookup(*lval)?.clone();
            let operand = lower_expr(ctx, expr)?;
            ctx.write_store(operand, entry.ir_name);
            Ok(None)
        }
        ast::Stmt::Expr(Some(expr)) => {
            lower_expr(ctx, expr)?;
            Ok(None)
        }
        ast::Stmt::Expr(None) | ast::Stmt::Empty => Ok(None),
        ast::Stmt::Return(expr) => {
            let operand = expr.as_ref().map(|e| lower_expr(ctx, e)).transpose()?;
            Ok(Some(Terminator::Return(operand)))
        }
        ast::Stmt::Block(block) => {
            ctx.symtab.push_scope();
            let term = lower_block(ctx, block);
            ctx.symtab.pop_scope();
            term
        }
    }
}

fn lower_expr(ctx: &mut LowerCtx, expr: &ast::Expr) -> Result<Operand, CompileError> {
    match expr {
        ast::Expr::Number(n) => Ok(Operand::Imm(*n)),
        ast::Expr::LVal(name) => {
            let entry = ctx.symtab.lookup(*name)?.clone();
            match entry.kind {
                SymbolKind::Const(v) => Ok(Operand::Imm(v)),
                SymbolKind::Var => {
                    let dst = ctx.fresh_temp();
                    ctx.write_load(dst, entry.ir_name);
                    Ok(Operand::Value(dst))
                }
            }
        }
        ast::Expr::Unary { op, expr } => {
            let operand = lower_expr(ctx, expr)?;
            lower_unary(ctx, *op, operand)
        }
        ast::Expr::Binary { op: ast::BinOp::And, lhs, rhs } => {
            let lhs = lower_expr(ctx, lhs)?;
            let rhs = lower_expr(ctx, rhs)?;
            lower_logic(ctx, BinOp::And, lhs, rhs)
        }
        ast::Expr::Binary { op: ast::BinOp::Or, lhs, rhs } => {
            let lhs = lower_expr(ctx, lhs)?;
            let rhs = lower_expr(ctx, rhs)?;
            lower_logic(ctx, BinOp::Or, lhs, rhs)
        }
        ast::Expr::Binary { op, lhs, rhs } => {
            let lhs = lower_expr(ctx, lhs)?;
            let rhs = lower_expr(ctx, rhs)?;
            lower_binary(ctx, to_tir_binop(*op), lhs, rhs)
        }
    }
}

fn to_tir_binop(op: ast::BinOp) -> BinOp {
    match op {
        ast::BinOp::Add => BinOp::Add,
        ast::BinOp::Sub => BinOp::Sub,
        ast::BinOp::Mul => BinOp::Mul,
        ast::BinOp::Div => BinOp::Div,
        ast::BinOp::Mod => BinOp::Mod,
        ast::BinOp::Lt => BinOp::Lt,
        ast::BinOp::Le => BinOp::Le,
        ast::BinOp::Gt => BinOp::Gt,
        ast::BinOp::Ge => BinOp::Ge,
        ast::BinOp::Eq => BinOp::Eq,
        ast::BinOp::Ne => BinOp::Ne,
        ast::BinOp::And => BinOp::And,
        ast::BinOp::Or => BinOp::Or,
    }
}

/// `-x` rewrites to `0 - x`; `!x` rewrites to `0 == x`; `+x` is identity.
fn lower_unary(ctx: &mut LowerCtx, op: ast::UnaryOp, operand: Operand) -> Result<Operand, CompileError> {
    match op {
        ast::UnaryOp::Pos => Ok(operand),
        ast::UnaryOp::Neg => lower_binary(ctx, BinOp::Sub, Operand::Imm(0), operand),
        ast::UnaryOp::Not => lower_binary(ctx, BinOp::Eq, Operand::Imm(0), operand),
    }
}

/// Constant-fold when both operands are literal (I7); otherwise emit one
/// `Binary` instruction and return its destination.
fn lower_binary(ctx: &mut LowerCtx, op: BinOp, lhs: Operand, rhs: Operand) -> Result<Operand, CompileError> {
    if let (Operand::Imm(a), Operand::Imm(b)) = (lhs, rhs) {
        return match op.eval(a, b) {
            Some(v) => Ok(Operand::Imm(v)),
            None => Err(CompileError::DivisionByZero),
        };
    }
    let dst = ctx.fresh_temp();
    ctx.insns.push(Instruction::Binary { dst, op, lhs, rhs });
    Ok(Operand::Value(dst))
}

/// Arithmetic (non-short-circuit) `&&`/`||`: booleanize both sides with
/// `!= 0`, then combine with the corresponding bitwise op. Both booleanized
/// operands are always 0 or 1, so bitwise `and`/`or` coincide with logical
/// `and`/`or` here.
fn lower_logic(ctx: &mut LowerCtx, op: BinOp, lhs: Operand, rhs: Operand) -> Result<Operand, CompileError> {
    let lhs_bool = lower_binary(ctx, BinOp::Ne, lhs, Operand::Imm(0))?;
    let rhs_bool = lower_binary(ctx, BinOp::Ne, rhs, Operand::Imm(0))?;
    lower_binary(ctx, op, lhs_bool, rhs_bool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse;

    fn lower_src(src: &str) -> Program {
        lower(parse(src).unwrap()).unwrap()
    }

    #[test]
    fn lowers_a_literal_return() {
        let prog = lower_src("int main() { return 0; }");
        assert_eq!(prog.funcs.len(), 1);
        let block = &prog.funcs[0].blocks[0];
        assert!(block.insns.is_empty());
        assert!(matches!(block.term, Terminator::Return(Some(Operand::Imm(0)))));
    }

    #[test]
    fn constant_folds_a_fully_literal_expression() {
        let prog = lower_src("int main() { return 1 + 2 * 3; }");
        let block = &prog.funcs[0].blocks[0];
        assert!(block.insns.is_empty());
        assert!(matches!(block.term, Terminator::Return(Some(Operand::Imm(7)))));
    }

    #[test]
    fn const_decl_substitutes_at_use_site_emitting_no_alloc() {
        let prog = lower_src("int main() { const int N = 5; return N; }");
        let block = &prog.funcs[0].blocks[0];
        assert!(block.insns.is_empty());
        assert!(matches!(block.term, Terminator::Return(Some(Operand::Imm(5)))));
    }

    #[test]
    fn var_decl_emits_alloc_and_store_and_load_on_use() {
        let prog = lower_src("int main() { int x = 1; return x; }");
        let block = &prog.funcs[0].blocks[0];
        assert!(matches!(block.insns[0], Instruction::Alloc { .. }));
        assert!(matches!(block.insns[1], Instruction::Store { .. }));
        assert!(matches!(block.insns[2], Instruction::Load { .. }));
    }

    #[test]
    fn division_by_zero_in_a_constant_expression_is_an_error() {
        let err = lower(parse("int main() { return 1 / 0; }").unwrap()).unwrap_err();
        assert!(matches!(err, CompileError::DivisionByZero));
    }

    #[test]
    fn non_constant_initializer_in_a_const_decl_is_an_error() {
        let err = lower(parse("int main() { int x = 1; const int N = x; return 0; }").unwrap()).unwrap_err();
        assert!(matches!(err, CompileError::NotAConstant { .. }));
    }

    #[test]
    fn logical_and_booleanizes_and_combines_with_bitwise_and() {
        let prog = lower_src("int main() { int x = 2; int y = 0; return x && y; }");
        let block = &prog.funcs[0].blocks[0];
        let has_and = block
            .insns
            .iter()
            .any(|i| matches!(i, Instruction::Binary { op: BinOp::And, .. }));
        assert!(has_and);
    }

    #[test]
    fn unary_neg_rewrites_to_zero_minus_x() {
        let prog = lower_src("int main() { int x = 5; return -x; }");
        let block = &prog.funcs[0].blocks[0];
        let has_sub = block
            .insns
            .iter()
            .any(|i| matches!(i, Instruction::Binary { op: BinOp::Sub, .. }));
        assert!(has_sub);
    }

    #[test]
    fn inner_block_scope_shadows_and_restores_outer_binding() {
        let prog = lower_src("int main() { int x = 1; { int x = 2; } return x; }");
        // The outer `x` is the only one ever loaded for the final `return x;`,
        // and the block exits without a nested early return.
        let block = &prog.funcs[0].blocks[0];
        assert!(matches!(block.term, Terminator::Return(Some(Operand::Value(_)))));
    }

    #[test]
    fn code_after_an_early_return_is_not_lowered() {
        let prog = lower_src("int main() { return 1; return 2; }");
        let block = &prog.funcs[0].blocks[0];
        assert!(matches!(block.term, Terminator::Return(Some(Operand::Imm(1)))));
    }
}
