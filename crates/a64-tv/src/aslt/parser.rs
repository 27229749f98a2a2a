//! Parser for the serialized semantic tree.
//!
//! The backend sends one statement per line in constructor-call
//! syntax: `Stmt_Assign(LExpr_Array(LExpr_Var("_R"),Expr_LitInt(0)),…)`.
//! Identifiers are double-quoted, binary literals single-quoted, lists
//! bracketed. Anything the grammar does not recognize is a
//! [`Error::MalformedSemantics`] naming the offending construct.

use crate::aslt::ast::{Direction, Expr, LExpr, Slice, Stmt, Ty};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Bits(String),
    Int(i128),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn err(&self, msg: &str) -> Error {
        Error::MalformedSemantics(format!("lexer: {msg}"))
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(&(start, c)) = self.chars.peek() {
            match c {
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '(' => {
                    self.chars.next();
                    tokens.push(Token::LParen);
                }
                ')' => {
                    self.chars.next();
                    tokens.push(Token::RParen);
                }
                '[' => {
                    self.chars.next();
                    tokens.push(Token::LBracket);
                }
                ']' => {
                    self.chars.next();
                    tokens.push(Token::RBracket);
                }
                ',' => {
                    self.chars.next();
                    tokens.push(Token::Comma);
                }
                ';' => {
                    self.chars.next();
                }
                '"' => {
                    self.chars.next();
                    let content = self.take_until(start + 1, '"')?;
                    tokens.push(Token::Str(content));
                }
                '\'' => {
                    self.chars.next();
                    let content = self.take_until(start + 1, '\'')?;
                    // the payload is binary digits, possibly spaced
                    let bits: String = content.chars().filter(|&b| b == '0' || b == '1').collect();
                    if bits.is_empty() {
                        return Err(self.err("empty bits literal"));
                    }
                    tokens.push(Token::Bits(bits));
                }
                '-' | '0'..='9' => {
                    self.chars.next();
                    let mut end = start + c.len_utf8();
                    while let Some(&(i, d)) = self.chars.peek() {
                        if d.is_ascii_digit() {
                            self.chars.next();
                            end = i + d.len_utf8();
                        } else {
                            break;
                        }
                    }
                    let text = &self.input[start..end];
                    let value = text
                        .parse::<i128>()
                        .map_err(|_| self.err(&format!("bad integer literal: {text}")))?;
                    tokens.push(Token::Int(value));
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    self.chars.next();
                    let mut end = start + c.len_utf8();
                    while let Some(&(i, d)) = self.chars.peek() {
                        if d.is_ascii_alphanumeric() || d == '_' || d == '.' {
                            self.chars.next();
                            end = i + d.len_utf8();
                        } else {
                            break;
                        }
                    }
                    tokens.push(Token::Ident(self.input[start..end].to_string()));
                }
                other => return Err(self.err(&format!("unexpected character: {other:?}"))),
            }
        }
        Ok(tokens)
    }

    fn take_until(&mut self, from: usize, delim: char) -> Result<String> {
        for (i, c) in self.chars.by_ref() {
            if c == delim {
                return Ok(self.input[from..i].to_string());
            }
        }
        Err(self.err(&format!("unterminated {delim} literal")))
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn err(&self, msg: &str) -> Error {
        Error::MalformedSemantics(format!("parser: {msg} at token {}", self.pos))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| self.err("unexpected end of input"))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, want: &Token) -> Result<()> {
        let got = self.next()?;
        if got == *want {
            Ok(())
        } else {
            Err(self.err(&format!("expected {want:?}, got {got:?}")))
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(s) => Ok(s),
            other => Err(self.err(&format!("expected constructor, got {other:?}"))),
        }
    }

    fn string(&mut self) -> Result<String> {
        match self.next()? {
            Token::Str(s) => Ok(s),
            other => Err(self.err(&format!("expected quoted name, got {other:?}"))),
        }
    }

    fn comma(&mut self) -> Result<()> {
        self.expect(&Token::Comma)
    }

    fn list<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        self.expect(&Token::LBracket)?;
        let mut items = Vec::new();
        if self.peek() == Some(&Token::RBracket) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            match self.next()? {
                Token::Comma => {}
                Token::RBracket => return Ok(items),
                other => return Err(self.err(&format!("expected , or ] in list, got {other:?}"))),
            }
        }
    }

    fn stmt(&mut self) -> Result<Stmt> {
        let head = self.ident()?;
        self.expect(&Token::LParen)?;
        let stmt = match head.as_str() {
            "Stmt_Assign" => {
                let lhs = self.lexpr()?;
                self.comma()?;
                let rhs = self.expr()?;
                Stmt::Assign(lhs, rhs)
            }
            "Stmt_ConstDecl" | "Stmt_VarDecl" => {
                let ty = self.ty()?;
                self.comma()?;
                let name = self.string()?;
                self.comma()?;
                let init = self.expr()?;
                if head == "Stmt_ConstDecl" {
                    Stmt::ConstDecl { ty, name, init }
                } else {
                    Stmt::VarDecl { ty, name, init }
                }
            }
            "Stmt_VarDeclsNoInit" => {
                let ty = self.ty()?;
                self.comma()?;
                let names = self.list(Self::string)?;
                Stmt::VarDeclsNoInit { ty, names }
            }
            "Stmt_Assert" => Stmt::Assert(self.expr()?),
            "Stmt_Throw" => Stmt::Throw,
            "Stmt_If" => {
                let cond = self.expr()?;
                self.comma()?;
                let then = self.list(Self::stmt)?;
                self.comma()?;
                let elsifs = self.list(Self::stmt)?;
                if !elsifs.is_empty() {
                    return Err(Error::MalformedSemantics(
                        "Stmt_If with elsif arms is unsupported".to_string(),
                    ));
                }
                self.comma()?;
                let otherwise = self.list(Self::stmt)?;
                Stmt::If {
                    cond,
                    then,
                    otherwise,
                }
            }
            "Stmt_For" => {
                let var = self.string()?;
                self.comma()?;
                let start = self.expr()?;
                self.comma()?;
                let direction = match self.ident()?.as_str() {
                    "Direction_Up" => Direction::Up,
                    "Direction_Down" => Direction::Down,
                    other => {
                        return Err(Error::MalformedSemantics(format!(
                            "unknown loop direction: {other}"
                        )));
                    }
                };
                self.comma()?;
                let stop = self.expr()?;
                self.comma()?;
                let body = self.list(Self::stmt)?;
                Stmt::For {
                    var,
                    start,
                    direction,
                    stop,
                    body,
                }
            }
            "Stmt_TCall" => {
                let name = self.string()?;
                self.comma()?;
                let targs = self.list(Self::expr)?;
                self.comma()?;
                let args = self.list(Self::expr)?;
                Stmt::TCall { name, targs, args }
            }
            other => {
                return Err(Error::MalformedSemantics(format!(
                    "unknown statement constructor: {other}"
                )));
            }
        };
        self.expect(&Token::RParen)?;
        Ok(stmt)
    }

    fn lexpr(&mut self) -> Result<LExpr> {
        let head = self.ident()?;
        self.expect(&Token::LParen)?;
        let lexpr = match head.as_str() {
            "LExpr_Var" => LExpr::Var(self.string()?),
            "LExpr_Field" => {
                let base = self.lexpr()?;
                self.comma()?;
                let field = self.string()?;
                LExpr::Field(Box::new(base), field)
            }
            "LExpr_Array" => {
                let base = self.lexpr()?;
                self.comma()?;
                let index = self.expr()?;
                LExpr::Array(Box::new(base), Box::new(index))
            }
            other => {
                return Err(Error::MalformedSemantics(format!(
                    "unknown lexpr constructor: {other}"
                )));
            }
        };
        self.expect(&Token::RParen)?;
        Ok(lexpr)
    }

    fn expr(&mut self) -> Result<Expr> {
        let head = self.ident()?;
        self.expect(&Token::LParen)?;
        let expr = match head.as_str() {
            "Expr_Var" => Expr::Var(self.string()?),
            "Expr_Field" => {
                let base = self.expr()?;
                self.comma()?;
                let field = self.string()?;
                Expr::Field(Box::new(base), field)
            }
            "Expr_Array" => {
                let base = self.expr()?;
                self.comma()?;
                let index = self.expr()?;
                Expr::Array(Box::new(base), Box::new(index))
            }
            "Expr_Slices" => {
                let base = self.expr()?;
                self.comma()?;
                let mut slices = self.list(Self::slice)?;
                if slices.len() != 1 {
                    return Err(Error::MalformedSemantics(format!(
                        "expected exactly one slice, got {}",
                        slices.len()
                    )));
                }
                Expr::Slice(Box::new(base), slices.remove(0))
            }
            "Expr_LitInt" => match self.next()? {
                Token::Int(v) => Expr::LitInt(v),
                other => {
                    return Err(Error::MalformedSemantics(format!(
                        "expected integer literal, got {other:?}"
                    )));
                }
            },
            "Expr_LitBits" => match self.next()? {
                Token::Bits(bits) => Expr::LitBits(bits),
                other => {
                    return Err(Error::MalformedSemantics(format!(
                        "expected bits literal, got {other:?}"
                    )));
                }
            },
            "Expr_TApply" => {
                let name = self.string()?;
                self.comma()?;
                let targs = self.list(Self::expr)?;
                self.comma()?;
                let args = self.list(Self::expr)?;
                Expr::TApply { name, targs, args }
            }
            "Expr_Parens" => self.expr()?,
            other => {
                return Err(Error::MalformedSemantics(format!(
                    "unknown expression constructor: {other}"
                )));
            }
        };
        self.expect(&Token::RParen)?;
        Ok(expr)
    }

    fn slice(&mut self) -> Result<Slice> {
        let head = self.ident()?;
        if head != "Slice_LoWd" {
            return Err(Error::MalformedSemantics(format!(
                "unknown slice constructor: {head}"
            )));
        }
        self.expect(&Token::LParen)?;
        let lo = self.expr()?;
        self.comma()?;
        let wd = self.expr()?;
        self.expect(&Token::RParen)?;
        Ok(Slice {
            lo: Box::new(lo),
            wd: Box::new(wd),
        })
    }

    fn ty(&mut self) -> Result<Ty> {
        let head = self.ident()?;
        self.expect(&Token::LParen)?;
        let ty = match head.as_str() {
            "Type_Bits" => Ty::Bits(Box::new(self.expr()?)),
            "Type_Boolean" => Ty::Boolean,
            "Type_Constructor" => Ty::Constructor(self.string()?),
            "Type_Register" => match self.next()? {
                Token::Int(bits) => {
                    let bits = u32::try_from(bits).map_err(|_| {
                        Error::MalformedSemantics(format!("bad register width: {bits}"))
                    })?;
                    Ty::Register(bits)
                }
                other => {
                    return Err(Error::MalformedSemantics(format!(
                        "expected register width, got {other:?}"
                    )));
                }
            },
            other => {
                return Err(Error::MalformedSemantics(format!(
                    "unknown type constructor: {other}"
                )));
            }
        };
        self.expect(&Token::RParen)?;
        Ok(ty)
    }
}

/// Parse a full semantics reply (one statement per line) into a
/// statement list.
pub fn parse(input: &str) -> Result<Vec<Stmt>> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut stmts = Vec::new();
    while parser.peek().is_some() {
        stmts.push(parser.stmt()?);
    }
    Ok(stmts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assign_to_register_array() {
        let stmts = parse(
            "Stmt_Assign(LExpr_Array(LExpr_Var(\"_R\"),Expr_LitInt(3)),\
             Expr_TApply(\"add_bits.0\",[Expr_LitInt(64)],\
             [Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(1)),Expr_Array(Expr_Var(\"_R\"),Expr_LitInt(2))]))",
        )
        .unwrap();
        assert_eq!(stmts.len(), 1);
        let Stmt::Assign(LExpr::Array(base, index), Expr::TApply { name, .. }) = &stmts[0] else {
            panic!("wrong shape: {:?}", stmts[0]);
        };
        assert_eq!(**base, LExpr::Var("_R".to_string()));
        assert_eq!(**index, Expr::LitInt(3));
        assert_eq!(name, "add_bits.0");
    }

    #[test]
    fn parses_bits_literal_with_spaces() {
        let stmts = parse(
            "Stmt_Assign(LExpr_Field(LExpr_Var(\"PSTATE\"),\"Z\"),Expr_LitBits('0000 0001'))",
        )
        .unwrap();
        let Stmt::Assign(_, Expr::LitBits(bits)) = &stmts[0] else {
            panic!("wrong shape");
        };
        assert_eq!(bits, "00000001");
    }

    #[test]
    fn parses_if_and_for() {
        let text = "Stmt_If(Expr_Var(\"TRUE\"),[Stmt_Throw()],[],[])\n\
                    Stmt_For(\"i\",Expr_LitInt(0),Direction_Up,Expr_LitInt(3),[Stmt_Throw()])";
        let stmts = parse(text).unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0], Stmt::If { .. }));
        assert!(matches!(
            stmts[1],
            Stmt::For {
                direction: Direction::Up,
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_constructor() {
        let err = parse("Stmt_Launch(Expr_LitInt(1))").unwrap_err();
        assert!(err.to_string().contains("Stmt_Launch"), "{err}");
    }

    #[test]
    fn rejects_elsif_arms() {
        let text = "Stmt_If(Expr_Var(\"TRUE\"),[],[Stmt_Throw()],[])";
        let err = parse(text).unwrap_err();
        assert!(err.to_string().contains("elsif"), "{err}");
    }

    #[test]
    fn display_round_trips() {
        let original = parse(
            "Stmt_ConstDecl(Type_Bits(Expr_LitInt(64)),\"Cse0__5\",\
             Expr_TApply(\"append_bits.0\",[Expr_LitInt(32),Expr_LitInt(32)],\
             [Expr_Var(\"x\"),Expr_LitBits('0101')]))",
        )
        .unwrap();
        let printed = original[0].to_string();
        let reparsed = parse(&printed).unwrap();
        assert_eq!(original, reparsed);
    }
}
