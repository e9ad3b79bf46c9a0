//! Expression body parser.
//!
//! Recursive descent over the body of a `jit(...)` string:
//!
//! ```text
//! expr   := call | string
//! call   := ident '(' [ expr (',' expr)* ] ')'
//! string := '\'' chars '\'' | '"' chars '"'
//! ```

use crate::{Expr, ExprError, Function};

/// Parse an expression body into an AST.
pub fn parse(input: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser {
        input,
        chars: input.char_indices().collect(),
        pos: 0,
    };
    let expr = parser.expr()?;
    parser.skip_whitespace();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(i, _)| *i)
            .unwrap_or(self.input.len())
    }

    fn error(&self, message: &str) -> ExprError {
        ExprError::Syntax {
            input: self.input.to_string(),
            offset: self.offset(),
            message: message.to_string(),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ExprError> {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn expr(&mut self) -> Result<Expr, ExprError> {
        self.skip_whitespace();
        match self.peek() {
            Some('\'') | Some('"') => self.string(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.call(),
            Some(_) => Err(self.error("expected a string literal or a function call")),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn call(&mut self) -> Result<Expr, ExprError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().map(|(_, c)| *c).collect();
        let function =
            Function::from_name(&name).ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;

        self.expect('(')?;
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(Expr::Call { function, args });
        }

        loop {
            args.push(self.expr()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }

        Ok(Expr::Call { function, args })
    }

    fn string(&mut self) -> Result<Expr, ExprError> {
        let quote = match self.peek() {
            Some(q) => q,
            None => return Err(self.error("expected string literal")),
        };
        self.pos += 1;

        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(Expr::Str(value));
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped = match self.peek() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some(c @ ('\\' | '\'' | '"')) => c,
                        Some(_) => return Err(self.error("unsupported escape sequence")),
                        None => return Err(self.error("unterminated string literal")),
                    };
                    value.push(escaped);
                    self.pos += 1;
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}
