//! End-to-end scenario and property tests driving the whole
//! `parse → lower → codegen` pipeline, checking the rendered Koopa text
//! and/or assembly. Where a scenario's expected return value matters, we
//! assert it shows up as the operand of the final `ret`/`li a0, ...`
//! sequence by construction, instead of actually assembling and running it.

use crate::back::codegen::codegen_program;
use crate::front::{lower, parse};
use crate::middle::tir;
use crate::CompileError;

fn compile_to_ir(src: &str) -> tir::Program {
    lower(parse(src).unwrap()).unwrap()
}

fn compile_err(src: &str) -> CompileError {
    match parse(src) {
        Ok(unit) => lower(unit).unwrap_err(),
        Err(e) => e,
    }
}

// S1: the smallest legal program.
#[test]
fn scenario_minimal_return() {
    let prog = compile_to_ir("int main() { return 0; }");
    assert_eq!(prog.to_string(), "fun @main(): i32 {\n%entry:\n  ret 0\n}\n");
    let asm = codegen_program(&prog).unwrap();
    assert!(asm.to_string().contains("li a0, 0"));
}

// S2: arithmetic with full constant folding, no instructions at all.
#[test]
fn scenario_constant_folded_arithmetic() {
    let prog = compile_to_ir("int main() { return (1 + 2) * 3 - 4 / 2; }");
    assert!(matches!(
        prog.funcs[0].blocks[0].term,
        tir::Terminator::Return(Some(tir::Operand::Imm(7)))
    ));
}

// S3: a local variable threading through alloc/store/load.
#[test]
fn scenario_local_variable_round_trip() {
    let prog = compile_to_ir("int main() { int x = 10; x = x + 1; return x; }");
    let insns = &prog.funcs[0].blocks[0].insns;
    assert!(matches!(insns[0], tir::Instruction::Alloc { .. }));
    assert!(matches!(insns[1], tir::Instruction::Store { .. }));
    let asm = codegen_program(&prog).unwrap();
    let text = asm.to_string();
    assert!(text.contains("addi sp, sp,"));
    assert!(text.contains("ret"));
}

// S4: relational and equality operators lower to the expansions in spec.
#[test]
fn scenario_comparisons_use_the_documented_expansions() {
    let prog = compile_to_ir("int main() { int a = 1; int b = 2; return a < b; }");
    let asm = codegen_program(&prog).unwrap();
    assert!(asm.to_string().contains("slt"));

    let prog = compile_to_ir("int main() { int a = 1; int b = 2; return a == b; }");
    let asm = codegen_program(&prog).unwrap();
    let text = asm.to_string();
    assert!(text.contains("xor"));
    assert!(text.contains("seqz"));

    let prog = compile_to_ir("int main() { int a = 1; int b = 2; return a >= b; }");
    let asm = codegen_program(&prog).unwrap();
    let text = asm.to_string();
    assert!(text.contains("slt"));
    assert!(text.contains("xori"));
}

// S5: arithmetic (non-short-circuit) logical and/or.
#[test]
fn scenario_logical_operators_booleanize_then_combine() {
    let prog = compile_to_ir("int main() { int a = 1; int b = 0; return a || b; }");
    let insns = &prog.funcs[0].blocks[0].insns;
    let ne_count = insns
        .iter()
        .filter(|i| matches!(i, tir::Instruction::Binary { op: tir::BinOp::Ne, .. }))
        .count();
    assert_eq!(ne_count, 2);
    assert!(insns
        .iter()
        .any(|i| matches!(i, tir::Instruction::Binary { op: tir::BinOp::Or, .. })));
}

// S6: nested block scoping shadows correctly and constants never reach the IR.
#[test]
fn scenario_nested_scope_and_constants() {
    let prog = compile_to_ir(
        "int main() { const int N = 3; int x = N; { int x = N + 1; } return x; }",
    );
    // Only one `x` is ever loaded for the trailing `return x;` — it
    // resolves to the outer declaration since the inner one is out of scope.
    assert!(matches!(
        prog.funcs[0].blocks[0].term,
        tir::Terminator::Return(Some(tir::Operand::Value(_)))
    ));
}

// Q1 / I1: lowering always returns exactly one operand per expression node,
// which here shows up as every arithmetic sub-expression contributing at
// most one `Binary` destination consumed by its parent.
#[test]
fn q1_expression_lowering_is_single_valued() {
    let prog = compile_to_ir("int main() { return 1 + 2 + 3 + 4; }");
    // Fully literal, so this folds to a single immediate with no instructions.
    assert!(prog.funcs[0].blocks[0].insns.is_empty());
}

// Q4 / I5: a register backing a live value is never handed out twice at once.
#[test]
fn q4_register_pool_never_double_allocates() {
    use crate::back::codegen::RegisterPool;
    let mut pool = RegisterPool::new();
    let a = pool.alloc().unwrap();
    let b = pool.alloc().unwrap();
    assert_ne!(a, b);
    pool.release(a);
    let c = pool.alloc().unwrap();
    assert_eq!(a, c);
}

// Q5: the stack pointer delta across a function is zero (prologue
// subtraction and epilogue addition use the same frame size).
#[test]
fn q5_stack_pointer_delta_is_zero() {
    let prog = compile_to_ir("int main() { int a = 1; int b = 2; int c = 3; return a + b + c; }");
    let asm = codegen_program(&prog).unwrap();
    let text = asm.to_string();
    let subtracted: Vec<i32> = text
        .lines()
        .filter_map(|l| {
            let l = l.trim();
            l.strip_prefix("addi sp, sp, ")
                .and_then(|rest| rest.trim().parse::<i32>().ok())
        })
        .collect();
    assert_eq!(subtracted.iter().sum::<i32>(), 0);
}

// Q6: out-of-range stack offsets go through the 12-bit clamp expansion
// instead of emitting an unencodable `sw`/`lw` immediate directly.
#[test]
fn q6_large_frames_clamp_offsets() {
    use crate::back::codegen::imm12_fits;
    assert!(!imm12_fits(5000));
    // A frame with more than ~512 locals would need offsets past 2047;
    // the expansion path (li + add + {lw,sw} 0(reg)) is exercised directly
    // via move_value's internal helpers, covered by the unit tests in
    // back::codegen.
}

// Q7: scope push/pop is always balanced, even across a nested block with an
// early return.
#[test]
fn q7_scopes_balance_across_early_return_in_nested_block() {
    let prog = compile_to_ir("int main() { int x = 1; { return x; } }");
    assert!(matches!(
        prog.funcs[0].blocks[0].term,
        tir::Terminator::Return(Some(tir::Operand::Value(_)))
    ));
}

// R1: lowering then rendering then re-parsing yields an isomorphic (here:
// identical) IR.
#[test]
fn r1_text_round_trip_is_identity() {
    let prog = compile_to_ir("int main() { int x = 1; int y = 2; return x + y * 3; }");
    let text = prog.to_string();
    let reparsed = crate::middle::reader::parse(&text).unwrap();
    assert_eq!(reparsed.to_string(), text);
}

// Division or modulo by zero in a constant expression is a hard error,
// not a runtime trap (this subset has no runtime).
#[test]
fn division_by_zero_constant_is_a_compile_error() {
    assert!(matches!(compile_err("int main() { return 1 % 0; }"), CompileError::DivisionByZero));
}

#[test]
fn undefined_symbol_is_a_compile_error() {
    assert!(matches!(
        compile_err("int main() { return y; }"),
        CompileError::UndefinedSymbol { .. }
    ));
}

#[test]
fn redeclaration_in_the_same_scope_is_a_compile_error() {
    assert!(matches!(
        compile_err("int main() { int x = 1; int x = 2; return x; }"),
        CompileError::RedeclaredSymbol { .. }
    ));
}
