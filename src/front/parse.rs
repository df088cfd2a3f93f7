//! The recursive-descent parser.
//!
//! One function per precedence level of the expression grammar
//! (`lor_expr <- land_expr <- eq_expr <- rel_expr <- add_expr <- mul_expr <-
//! unary_expr <- primary_expr`), each looping over its own operator set and
//! delegating to the next-tighter level — the grammar is already
//! precedence-stratified, so no Pratt-style table is needed.

use crate::common::Id;
use crate::error::CompileError;

use super::ast::*;
use super::lex::{Lexer, Token, TokenKind};

struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    pos: usize,
}

pub fn parse(input: &str) -> Result<CompUnit, CompileError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next()? {
        tokens.push(tok);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let comp_unit = parser.comp_unit()?;
    parser.expect_end()?;
    Ok(comp_unit)
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn peek_nth_kind(&self, n: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + n).map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token<'src>> {
        let tok = self.tokens.get(self.pos).copied();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind, what: &'static str) -> Result<Token<'src>, CompileError> {
        match self.peek_kind() {
            Some(k) if k == kind => Ok(self.advance().unwrap()),
            Some(_) => Err(CompileError::UnexpectedToken {
                expected: what,
                found: self.peek().unwrap().text.to_string(),
            }),
            None => Err(CompileError::UnexpectedToken {
                expected: what,
                found: "end of input".to_string(),
            }),
        }
    }

    fn expect_end(&self) -> Result<(), CompileError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(CompileError::UnexpectedToken {
                expected: "end of input",
                found: self.tokens[self.pos].text.to_string(),
            })
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn comp_unit(&mut self) -> Result<CompUnit, CompileError> {
        let func_def = self.func_def()?;
        Ok(CompUnit { func_def })
    }

    fn func_def(&mut self) -> Result<FuncDef, CompileError> {
        self.expect(TokenKind::KwInt, "'int'")?;
        let ret_type = FuncType::Int;
        let name_tok = self.expect(TokenKind::Id, "an identifier")?;
        let name = Id::new(name_tok.text.to_string());
        self.expect(TokenKind::LParen, "'('")?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.block()?;
        Ok(FuncDef { ret_type, name, body })
    }

    fn block(&mut self) -> Result<Block, CompileError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut items = Vec::new();
        while !self.at(TokenKind::RBrace) {
            items.push(self.block_item()?);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Block { items })
    }

    fn block_item(&mut self) -> Result<BlockItem, CompileError> {
        if self.at(TokenKind::KwConst) || self.at(TokenKind::KwInt) {
            Ok(BlockItem::Decl(self.decl()?))
        } else {
            Ok(BlockItem::Stmt(self.stmt()?))
        }
    }

    fn decl(&mut self) -> Result<Decl, CompileError> {
        if self.eat(TokenKind::KwConst) {
            self.expect(TokenKind::KwInt, "'int'")?;
            let mut defs = vec![self.const_def()?];
            while self.eat(TokenKind::Comma) {
                defs.push(self.const_def()?);
            }
            self.expect(TokenKind::Semi, "';'")?;
            Ok(Decl::Const(ConstDecl { defs }))
        } else {
            self.expect(TokenKind::KwInt, "'int'")?;
            let mut defs = vec![self.var_def()?];
            while self.eat(TokenKind::Comma) {
                defs.push(self.var_def()?);
            }
            self.expect(TokenKind::Semi, "';'")?;
            Ok(Decl::Var(VarDecl { defs }))
        }
    }

    fn const_def(&mut self) -> Result<ConstDef, CompileError> {
        let name_tok = self.expect(TokenKind::Id, "an identifier")?;
        let name = Id::new(name_tok.text.to_string());
        self.expect(TokenKind::Assign, "'='")?;
        let init = self.expr()?;
        Ok(ConstDef { name, init })
    }

    fn var_def(&mut self) -> Result<VarDef, CompileError> {
        let name_tok = self.expect(TokenKind::Id, "an identifier")?;
        let name = Id::new(name_tok.text.to_string());
        let init = if self.eat(TokenKind::Assign) {
            Some(self.expr()?)
        } else {
            None
        };
        Ok(VarDef { name, init })
    }

    fn stmt(&mut self) -> Result<Stmt, CompileError> {
        if self.at(TokenKind::LBrace) {
            return Ok(Stmt::Block(self.block()?));
        }
        if self.eat(TokenKind::KwReturn) {
            let expr = if self.at(TokenKind::Semi) {
                None
            } else {
                Some(self.expr()?)
            };
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(Stmt::Return(expr));
        }
        if self.eat(TokenKind::Semi) {
            return Ok(Stmt::Empty);
        }
        // `ident '=' expr ';'` is an assignment; any other expression
        // starting with an identifier (or anything else) is an expression
        // statement. Only a bare identifier immediately followed by `=`
        // can be the assignment's LVal.
        if self.peek_kind() == Some(TokenKind::Id) && self.peek_nth_kind(1) == Some(TokenKind::Assign) {
            let name_tok = self.advance().unwrap();
            let lval = Id::new(name_tok.text.to_string());
            self.advance(); // '='
            let expr = self.expr()?;
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(Stmt::Assign { lval, expr });
        }
        let expr = self.expr()?;
        self.expect(TokenKind::Semi, "';'")?;
        Ok(Stmt::Expr(Some(expr)))
    }

    fn expr(&mut self) -> Result<Expr, CompileError> {
        self.lor_expr()
    }

    fn lor_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.land_expr()?;
        while self.eat(TokenKind::OrOr) {
            let rhs = self.land_expr()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn land_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.eq_expr()?;
        while self.eat(TokenKind::AndAnd) {
            let rhs = self.eq_expr()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn eq_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.rel_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::EqEq) => BinOp::Eq,
                Some(TokenKind::Ne) => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.rel_expr()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn rel_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.add_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Lt) => BinOp::Lt,
                Some(TokenKind::Le) => BinOp::Le,
                Some(TokenKind::Gt) => BinOp::Gt,
                Some(TokenKind::Ge) => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.add_expr()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.mul_expr()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Mul) => BinOp::Mul,
                Some(TokenKind::Div) => BinOp::Div,
                Some(TokenKind::Mod) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.unary_expr()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Plus) => Some(UnaryOp::Pos),
            Some(TokenKind::Minus) => Some(UnaryOp::Neg),
            Some(TokenKind::Not) => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.unary_expr()?;
            return Ok(Expr::Unary { op, expr: Box::new(expr) });
        }
        self.primary_expr()
    }

    fn primary_expr(&mut self) -> Result<Expr, CompileError> {
        match self.peek_kind() {
            Some(TokenKind::LParen) => {
                self.advance();
                let inner = self.expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            Some(TokenKind::Num) => {
                let tok = self.advance().unwrap();
                Ok(Expr::Number(parse_int_literal(tok.text)))
            }
            Some(TokenKind::Id) => {
                let tok = self.advance().unwrap();
                Ok(Expr::LVal(Id::new(tok.text.to_string())))
            }
            Some(_) => Err(CompileError::UnexpectedToken {
                expected: "an expression",
                found: self.peek().unwrap().text.to_string(),
            }),
            None => Err(CompileError::UnexpectedToken {
                expected: "an expression",
                found: "end of input".to_string(),
            }),
        }
    }
}

/// Parse a decimal, octal (leading `0`), or hexadecimal (`0x`/`0X`) integer
/// literal. The lexer only ever hands us text that already matches one of
/// these three shapes.
fn parse_int_literal(text: &str) -> i32 {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).unwrap() as i32
    } else if text.starts_with('0') && text.len() > 1 {
        i64::from_str_radix(&text[1..], 8).unwrap() as i32
    } else {
        text.parse::<i64>().unwrap() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_program() {
        let unit = parse("int main() { return 0; }").unwrap();
        assert_eq!(unit.func_def.name.as_str(), "main");
        assert_eq!(unit.func_def.body.items.len(), 1);
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let unit = parse("int main() { return 1 + 2 * 3; }").unwrap();
        let BlockItem::Stmt(Stmt::Return(Some(expr))) = &unit.func_def.body.items[0] else {
            panic!("expected return statement");
        };
        match expr {
            Expr::Binary { op: BinOp::Add, rhs, .. } => {
                assert!(matches!(**rhs, Expr::Binary { op: BinOp::Mul, .. }));
            }
            _ => panic!("expected Add at the top"),
        }
    }

    #[test]
    fn parses_assignment_vs_expression_statement() {
        let unit = parse("int main() { int a; a = 1; a; return a; }").unwrap();
        assert!(matches!(unit.func_def.body.items[1], BlockItem::Stmt(Stmt::Assign { .. })));
        assert!(matches!(unit.func_def.body.items[2], BlockItem::Stmt(Stmt::Expr(Some(_)))));
    }

    #[test]
    fn parses_nested_block_scope() {
        let unit = parse("int main() { int x; { int x; } return x; }").unwrap();
        assert!(matches!(unit.func_def.body.items[1], BlockItem::Stmt(Stmt::Block(_))));
    }

    #[test]
    fn parses_hex_and_octal_literals() {
        let unit = parse("int main() { return 0x1F + 010; }").unwrap();
        let BlockItem::Stmt(Stmt::Return(Some(Expr::Binary { lhs, rhs, .. }))) =
            &unit.func_def.body.items[0]
        else {
            panic!("expected return of a binary expr");
        };
        assert!(matches!(**lhs, Expr::Number(31)));
        assert!(matches!(**rhs, Expr::Number(8)));
    }

    #[test]
    fn rejects_missing_semicolon() {
        assert!(parse("int main() { return 0 }").is_err());
    }
}
