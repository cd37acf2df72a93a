//! Lexer and parser for the `.weft` program format
//!
//! The format is a litmus-test style description of a fixed thread set:
//!
//! ```text
//! // two racing writers and a reader
//! thread main {
//!     spawn writer;
//!     let r = read x;
//!     assert r == 0 || r == 1;
//!     join writer;
//! }
//! deferred thread writer {
//!     lock m;
//!     write x = 1;
//!     unlock m;
//! }
//! ```
//!
//! Shared variables and mutexes are interned on first use and start at 0 /
//! unlocked. Registers are thread-local and introduced by `let`. `//`
//! comments run to end of line.

use crate::ast::{BinOp, Expr, LockId, Op, Program, Reg, ThreadDef, ThreadId, UnOp, VarId};
use std::collections::HashMap;
use thiserror::Error;

/// Parse error with source position
#[derive(Debug, Clone, Error)]
#[error("line {line}:{col}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Int(i64),
    KwThread,
    KwDeferred,
    KwWrite,
    KwRead,
    KwFadd,
    KwLet,
    KwFence,
    KwLock,
    KwUnlock,
    KwSpawn,
    KwJoin,
    KwAssert,
    KwAssume,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Semi,
    Comma,
    Assign,
    EqEq,
    NotEq,
    Le,
    Lt,
    Ge,
    Gt,
    Plus,
    Minus,
    Star,
    AndAnd,
    OrOr,
    Bang,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Ident(s) => format!("identifier `{s}`"),
            Tok::Int(n) => format!("integer `{n}`"),
            Tok::KwThread => "`thread`".into(),
            Tok::KwDeferred => "`deferred`".into(),
            Tok::KwWrite => "`write`".into(),
            Tok::KwRead => "`read`".into(),
            Tok::KwFadd => "`fadd`".into(),
            Tok::KwLet => "`let`".into(),
            Tok::KwFence => "`fence`".into(),
            Tok::KwLock => "`lock`".into(),
            Tok::KwUnlock => "`unlock`".into(),
            Tok::KwSpawn => "`spawn`".into(),
            Tok::KwJoin => "`join`".into(),
            Tok::KwAssert => "`assert`".into(),
            Tok::KwAssume => "`assume`".into(),
            Tok::LBrace => "`{`".into(),
            Tok::RBrace => "`}`".into(),
            Tok::LParen => "`(`".into(),
            Tok::RParen => "`)`".into(),
            Tok::Semi => "`;`".into(),
            Tok::Comma => "`,`".into(),
            Tok::Assign => "`=`".into(),
            Tok::EqEq => "`==`".into(),
            Tok::NotEq => "`!=`".into(),
            Tok::Le => "`<=`".into(),
            Tok::Lt => "`<`".into(),
            Tok::Ge => "`>=`".into(),
            Tok::Gt => "`>`".into(),
            Tok::Plus => "`+`".into(),
            Tok::Minus => "`-`".into(),
            Tok::Star => "`*`".into(),
            Tok::AndAnd => "`&&`".into(),
            Tok::OrOr => "`||`".into(),
            Tok::Bang => "`!`".into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    tok: Tok,
    line: usize,
    col: usize,
}

fn keyword(ident: &str) -> Option<Tok> {
    Some(match ident {
        "thread" => Tok::KwThread,
        "deferred" => Tok::KwDeferred,
        "write" => Tok::KwWrite,
        "read" => Tok::KwRead,
        "fadd" => Tok::KwFadd,
        "let" => Tok::KwLet,
        "fence" => Tok::KwFence,
        "lock" => Tok::KwLock,
        "unlock" => Tok::KwUnlock,
        "spawn" => Tok::KwSpawn,
        "join" => Tok::KwJoin,
        "assert" => Tok::KwAssert,
        "assume" => Tok::KwAssume,
        _ => return None,
    })
}

fn lex(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut toks = Vec::new();
    let mut line = 1usize;
    let mut col = 1usize;
    let mut chars = input.chars().peekable();

    macro_rules! push {
        ($tok:expr, $start_col:expr) => {
            toks.push(Spanned {
                tok: $tok,
                line,
                col: $start_col,
            })
        };
    }

    while let Some(&c) = chars.peek() {
        let start_col = col;
        match c {
            '\n' => {
                chars.next();
                line += 1;
                col = 1;
            }
            c if c.is_whitespace() => {
                chars.next();
                col += 1;
            }
            '/' => {
                chars.next();
                col += 1;
                if chars.peek() == Some(&'/') {
                    while let Some(&c) = chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        chars.next();
                        col += 1;
                    }
                } else {
                    return Err(ParseError {
                        line,
                        col: start_col,
                        message: "unexpected `/` (comments are `//`)".into(),
                    });
                }
            }
            c if c.is_ascii_digit() => {
                let mut n: i64 = 0;
                while let Some(&d) = chars.peek() {
                    if let Some(digit) = d.to_digit(10) {
                        n = n
                            .checked_mul(10)
                            .and_then(|n| n.checked_add(i64::from(digit)))
                            .ok_or_else(|| ParseError {
                                line,
                                col: start_col,
                                message: "integer literal out of range".into(),
                            })?;
                        chars.next();
                        col += 1;
                    } else {
                        break;
                    }
                }
                push!(Tok::Int(n), start_col);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                        col += 1;
                    } else {
                        break;
                    }
                }
                push!(keyword(&ident).unwrap_or(Tok::Ident(ident)), start_col);
            }
            _ => {
                chars.next();
                col += 1;
                let two = |chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
                           col: &mut usize,
                           next: char|
                 -> bool {
                    if chars.peek() == Some(&next) {
                        chars.next();
                        *col += 1;
                        true
                    } else {
                        false
                    }
                };
                let tok = match c {
                    '{' => Tok::LBrace,
                    '}' => Tok::RBrace,
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    ';' => Tok::Semi,
                    ',' => Tok::Comma,
                    '+' => Tok::Plus,
                    '-' => Tok::Minus,
                    '*' => Tok::Star,
                    '=' => {
                        if two(&mut chars, &mut col, '=') {
                            Tok::EqEq
                        } else {
                            Tok::Assign
                        }
                    }
                    '!' => {
                        if two(&mut chars, &mut col, '=') {
                            Tok::NotEq
                        } else {
                            Tok::Bang
                        }
                    }
                    '<' => {
                        if two(&mut chars, &mut col, '=') {
                            Tok::Le
                        } else {
                            Tok::Lt
                        }
                    }
                    '>' => {
                        if two(&mut chars, &mut col, '=') {
                            Tok::Ge
                        } else {
                            Tok::Gt
                        }
                    }
                    '&' => {
                        if two(&mut chars, &mut col, '&') {
                            Tok::AndAnd
                        } else {
                            return Err(ParseError {
                                line,
                                col: start_col,
                                message: "unexpected `&` (did you mean `&&`?)".into(),
                            });
                        }
                    }
                    '|' => {
                        if two(&mut chars, &mut col, '|') {
                            Tok::OrOr
                        } else {
                            return Err(ParseError {
                                line,
                                col: start_col,
                                message: "unexpected `|` (did you mean `||`?)".into(),
                            });
                        }
                    }
                    other => {
                        return Err(ParseError {
                            line,
                            col: start_col,
                            message: format!("unexpected character `{other}`"),
                        })
                    }
                };
                push!(tok, start_col);
            }
        }
    }
    Ok(toks)
}

struct Parser {
    toks: Vec<Spanned>,
    pos: usize,
    threads_by_name: HashMap<String, ThreadId>,
    vars: Vec<String>,
    vars_by_name: HashMap<String, VarId>,
    locks: Vec<String>,
    locks_by_name: HashMap<String, LockId>,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.toks.get(self.pos)
    }

    fn err_here(&self, message: impl Into<String>) -> ParseError {
        match self.peek() {
            Some(s) => ParseError {
                line: s.line,
                col: s.col,
                message: message.into(),
            },
            None => {
                let (line, col) = self
                    .toks
                    .last()
                    .map(|s| (s.line, s.col))
                    .unwrap_or((1, 1));
                ParseError {
                    line,
                    col,
                    message: message.into(),
                }
            }
        }
    }

    fn next(&mut self, what: &str) -> Result<Spanned, ParseError> {
        let s = self
            .peek()
            .cloned()
            .ok_or_else(|| self.err_here(format!("unexpected end of input, expected {what}")))?;
        self.pos += 1;
        Ok(s)
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), ParseError> {
        let s = self.next(&tok.describe())?;
        if &s.tok == tok {
            Ok(())
        } else {
            Err(ParseError {
                line: s.line,
                col: s.col,
                message: format!("expected {}, found {}", tok.describe(), s.tok.describe()),
            })
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, usize, usize), ParseError> {
        let s = self.next(what)?;
        match s.tok {
            Tok::Ident(name) => Ok((name, s.line, s.col)),
            other => Err(ParseError {
                line: s.line,
                col: s.col,
                message: format!("expected {what}, found {}", other.describe()),
            }),
        }
    }

    fn var(&mut self, name: String) -> VarId {
        if let Some(&id) = self.vars_by_name.get(&name) {
            return id;
        }
        let id = VarId(self.vars.len() as u32);
        self.vars.push(name.clone());
        self.vars_by_name.insert(name, id);
        id
    }

    fn lock(&mut self, name: String) -> LockId {
        if let Some(&id) = self.locks_by_name.get(&name) {
            return id;
        }
        let id = LockId(self.locks.len() as u32);
        self.locks.push(name.clone());
        self.locks_by_name.insert(name, id);
        id
    }

    fn thread_ref(&mut self) -> Result<ThreadId, ParseError> {
        let (name, line, col) = self.expect_ident("thread name")?;
        self.threads_by_name
            .get(&name)
            .copied()
            .ok_or(ParseError {
                line,
                col,
                message: format!("unknown thread `{name}`"),
            })
    }

    /// Pre-scan for `[deferred] thread NAME` at brace depth 0, so spawn/join
    /// can reference threads declared later in the file.
    fn collect_thread_names(&mut self) -> Result<(), ParseError> {
        let mut depth = 0usize;
        let mut i = 0;
        while i < self.toks.len() {
            match &self.toks[i].tok {
                Tok::LBrace => depth += 1,
                Tok::RBrace => depth = depth.saturating_sub(1),
                Tok::KwThread if depth == 0 => {
                    if let Some(Spanned {
                        tok: Tok::Ident(name),
                        line,
                        col,
                    }) = self.toks.get(i + 1).cloned()
                    {
                        let id = ThreadId(self.threads_by_name.len() as u32);
                        if self.threads_by_name.insert(name.clone(), id).is_some() {
                            return Err(ParseError {
                                line,
                                col,
                                message: format!("duplicate thread `{name}`"),
                            });
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Ok(())
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        self.collect_thread_names()?;
        let mut threads = Vec::new();
        while self.peek().is_some() {
            threads.push(self.parse_thread()?);
        }
        Ok(Program {
            threads,
            vars: std::mem::take(&mut self.vars),
            locks: std::mem::take(&mut self.locks),
        })
    }

    fn parse_thread(&mut self) -> Result<ThreadDef, ParseError> {
        let mut deferred = false;
        if matches!(self.peek().map(|s| &s.tok), Some(Tok::KwDeferred)) {
            self.pos += 1;
            deferred = true;
        }
        self.expect(&Tok::KwThread)?;
        let (name, _, _) = self.expect_ident("thread name")?;
        self.expect(&Tok::LBrace)?;

        let mut body = ThreadBody {
            regs: Vec::new(),
            regs_by_name: HashMap::new(),
        };
        let mut ops = Vec::new();
        loop {
            match self.peek().map(|s| &s.tok) {
                Some(Tok::RBrace) => {
                    self.pos += 1;
                    break;
                }
                Some(_) => ops.push(self.parse_stmt(&mut body)?),
                None => return Err(self.err_here("unexpected end of input, expected `}`")),
            }
        }
        Ok(ThreadDef {
            name,
            deferred,
            regs: body.regs,
            ops,
        })
    }

    fn parse_stmt(&mut self, body: &mut ThreadBody) -> Result<Op, ParseError> {
        let s = self.next("a statement")?;
        let op = match s.tok {
            Tok::KwWrite => {
                let (name, _, _) = self.expect_ident("variable name")?;
                let var = self.var(name);
                self.expect(&Tok::Assign)?;
                let value = self.parse_expr(body)?;
                Op::Write { var, value }
            }
            Tok::KwLet => {
                let (reg_name, _, _) = self.expect_ident("register name")?;
                let dst = body.reg(reg_name);
                self.expect(&Tok::Assign)?;
                let rhs = self.next("`read` or `fadd`")?;
                match rhs.tok {
                    Tok::KwRead => {
                        let (name, _, _) = self.expect_ident("variable name")?;
                        let var = self.var(name);
                        Op::Read { dst, var }
                    }
                    Tok::KwFadd => {
                        let (name, _, _) = self.expect_ident("variable name")?;
                        let var = self.var(name);
                        self.expect(&Tok::Comma)?;
                        let operand = self.parse_expr(body)?;
                        Op::Fadd {
                            dst: Some(dst),
                            var,
                            operand,
                        }
                    }
                    other => {
                        return Err(ParseError {
                            line: rhs.line,
                            col: rhs.col,
                            message: format!(
                                "expected `read` or `fadd`, found {}",
                                other.describe()
                            ),
                        })
                    }
                }
            }
            Tok::KwFadd => {
                let (name, _, _) = self.expect_ident("variable name")?;
                let var = self.var(name);
                self.expect(&Tok::Comma)?;
                let operand = self.parse_expr(body)?;
                Op::Fadd {
                    dst: None,
                    var,
                    operand,
                }
            }
            Tok::KwFence => Op::Fence,
            Tok::KwLock => {
                let (name, _, _) = self.expect_ident("mutex name")?;
                Op::Lock(self.lock(name))
            }
            Tok::KwUnlock => {
                let (name, _, _) = self.expect_ident("mutex name")?;
                Op::Unlock(self.lock(name))
            }
            Tok::KwSpawn => Op::Spawn(self.thread_ref()?),
            Tok::KwJoin => Op::Join(self.thread_ref()?),
            Tok::KwAssert => Op::Assert(self.parse_expr(body)?),
            Tok::KwAssume => Op::Assume(self.parse_expr(body)?),
            other => {
                return Err(ParseError {
                    line: s.line,
                    col: s.col,
                    message: format!("expected a statement, found {}", other.describe()),
                })
            }
        };
        self.expect(&Tok::Semi)?;
        Ok(op)
    }

    fn parse_expr(&mut self, body: &ThreadBody) -> Result<Expr, ParseError> {
        self.parse_or(body)
    }

    fn parse_or(&mut self, body: &ThreadBody) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and(body)?;
        while matches!(self.peek().map(|s| &s.tok), Some(Tok::OrOr)) {
            self.pos += 1;
            let rhs = self.parse_and(body)?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self, body: &ThreadBody) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_cmp(body)?;
        while matches!(self.peek().map(|s| &s.tok), Some(Tok::AndAnd)) {
            self.pos += 1;
            let rhs = self.parse_cmp(body)?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self, body: &ThreadBody) -> Result<Expr, ParseError> {
        let lhs = self.parse_add(body)?;
        let op = match self.peek().map(|s| &s.tok) {
            Some(Tok::EqEq) => BinOp::Eq,
            Some(Tok::NotEq) => BinOp::Ne,
            Some(Tok::Lt) => BinOp::Lt,
            Some(Tok::Le) => BinOp::Le,
            Some(Tok::Gt) => BinOp::Gt,
            Some(Tok::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_add(body)?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_add(&mut self, body: &ThreadBody) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_mul(body)?;
        loop {
            let op = match self.peek().map(|s| &s.tok) {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_mul(body)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_mul(&mut self, body: &ThreadBody) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary(body)?;
        while matches!(self.peek().map(|s| &s.tok), Some(Tok::Star)) {
            self.pos += 1;
            let rhs = self.parse_unary(body)?;
            lhs = Expr::Binary(BinOp::Mul, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self, body: &ThreadBody) -> Result<Expr, ParseError> {
        match self.peek().map(|s| &s.tok) {
            Some(Tok::Minus) => {
                self.pos += 1;
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.parse_unary(body)?)))
            }
            Some(Tok::Bang) => {
                self.pos += 1;
                Ok(Expr::Unary(UnOp::Not, Box::new(self.parse_unary(body)?)))
            }
            _ => self.parse_atom(body),
        }
    }

    fn parse_atom(&mut self, body: &ThreadBody) -> Result<Expr, ParseError> {
        let s = self.next("an expression")?;
        match s.tok {
            Tok::Int(n) => Ok(Expr::Int(n)),
            Tok::Ident(name) => match body.regs_by_name.get(&name) {
                Some(&reg) => Ok(Expr::Reg(reg)),
                None => Err(ParseError {
                    line: s.line,
                    col: s.col,
                    message: format!(
                        "unknown register `{name}` (shared variables are read with `let r = read {name};`)"
                    ),
                }),
            },
            Tok::LParen => {
                let e = self.parse_expr(body)?;
                self.expect(&Tok::RParen)?;
                Ok(e)
            }
            other => Err(ParseError {
                line: s.line,
                col: s.col,
                message: format!("expected an expression, found {}", other.describe()),
            }),
        }
    }
}

struct ThreadBody {
    regs: Vec<String>,
    regs_by_name: HashMap<String, Reg>,
}

impl ThreadBody {
    fn reg(&mut self, name: String) -> Reg {
        if let Some(&r) = self.regs_by_name.get(&name) {
            return r;
        }
        let r = Reg(self.regs.len() as u32);
        self.regs.push(name.clone());
        self.regs_by_name.insert(name, r);
        r
    }
}

/// Parse a program from source text. Structural validation is separate; see
/// [`crate::load_str`].
pub fn parse(input: &str) -> Result<Program, ParseError> {
    let toks = lex(input)?;
    let mut parser = Parser {
        toks,
        pos: 0,
        threads_by_name: HashMap::new(),
        vars: Vec::new(),
        vars_by_name: HashMap::new(),
        locks: Vec::new(),
        locks_by_name: HashMap::new(),
    };
    parser.parse_program()
}
