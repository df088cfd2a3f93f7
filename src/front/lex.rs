//! The lexer.

use derive_more::Display;
use regex::Regex;

use crate::error::CompileError;

/// Tokens in the program
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("kind: '{kind}', part of input: '{text}'")]
pub struct Token<'src> {
    /// What token class this token belongs to.
    pub kind: TokenKind,
    /// What part of the input this token carries.
    pub text: &'src str,
    /// Byte offset of the start of this token in the original input.
    pub pos: usize,
}

impl std::fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// Token classes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display, Debug)]
pub enum TokenKind {
    #[display("id")]
    Id,
    #[display("num")]
    Num,
    #[display("int")]
    KwInt,
    #[display("const")]
    KwConst,
    #[display("return")]
    KwReturn,
    #[display("=")]
    Assign,
    #[display("{{")]
    LBrace,
    #[display("}}")]
    RBrace,
    #[display("(")]
    LParen,
    #[display(")")]
    RParen,
    #[display(";")]
    Semi,
    #[display(",")]
    Comma,
    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("*")]
    Mul,
    #[display("/")]
    Div,
    #[display("%")]
    Mod,
    #[display("<")]
    Lt,
    #[display("<=")]
    Le,
    #[display(">")]
    Gt,
    #[display(">=")]
    Ge,
    #[display("==")]
    EqEq,
    #[display("!=")]
    Ne,
    #[display("&&")]
    AndAnd,
    #[display("||")]
    OrOr,
    #[display("!")]
    Not,
}

/// A single lexical rule: a regex anchored at the start of the remaining
/// input, paired with the token class it produces.
struct Matcher {
    regex: Regex,
    kind: TokenKind,
}

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    whitespace: Regex,
    matchers: Vec<Matcher>,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        use TokenKind::*;

        // Multi-character operators are listed before the single-character
        // prefixes they share (`<=` before `<`), since the first matcher
        // that matches at the current position wins.
        let rules: &[(&str, TokenKind)] = &[
            (r"\Aint\b", KwInt),
            (r"\Aconst\b", KwConst),
            (r"\Areturn\b", KwReturn),
            (r"\A[A-Za-z_][A-Za-z0-9_]*", Id),
            (r"\A(?:0[xX][0-9a-fA-F]+|0[0-7]*|[1-9][0-9]*)", Num),
            (r"\A<=", Le),
            (r"\A>=", Ge),
            (r"\A==", EqEq),
            (r"\A!=", Ne),
            (r"\A&&", AndAnd),
            (r"\A\|\|", OrOr),
            (r"\A=", Assign),
            (r"\A\{", LBrace),
            (r"\A\}", RBrace),
            (r"\A\(", LParen),
            (r"\A\)", RParen),
            (r"\A;", Semi),
            (r"\A,", Comma),
            (r"\A\+", Plus),
            (r"\A-", Minus),
            (r"\A\*", Mul),
            (r"\A/", Div),
            (r"\A%", Mod),
            (r"\A<", Lt),
            (r"\A>", Gt),
            (r"\A!", Not),
        ];

        Lexer {
            input,
            pos: 0,
            whitespace: Regex::new(r"\A(?:[ \t\f\r\n\v]|//[^\n]*|/\*(?:[^*]|\*[^/])*\*/)*").unwrap(),
            matchers: rules
                .iter()
                .map(|(pat, kind)| Matcher {
                    regex: Regex::new(pat).unwrap(),
                    kind: *kind,
                })
                .collect(),
        }
    }

    /// Has the lexer reached the end of input?
    pub fn end_of_input(&self) -> bool {
        self.pos == self.input.len()
    }

    // Skip comments and whitespace
    fn skip_whitespace(&mut self) {
        if let Some(m) = self.whitespace.find(&self.input[self.pos..]) {
            self.pos += m.end()
        }
    }

    /// Get the next token if possible.
    ///
    /// The return type distinguishes between end-of-input and lexer error.
    pub fn next(&mut self) -> Result<Option<Token<'input>>, CompileError> {
        self.skip_whitespace();
        if self.end_of_input() {
            return Ok(None);
        }

        let rest = &self.input[self.pos..];
        for matcher in &self.matchers {
            if let Some(m) = matcher.regex.find(rest) {
                let text = m.as_str();
                let pos = self.pos;
                self.pos += text.len();
                return Ok(Some(Token {
                    kind: matcher.kind,
                    text,
                    pos,
                }));
            }
        }

        Err(CompileError::UnexpectedChar(self.pos, rest.chars().next().unwrap()))
    }
}
