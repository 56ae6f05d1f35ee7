//! Recursive-descent parser for the snippet language.
//!
//! Grammar (statement separators are newlines or `;`):
//!
//! ```text
//! program  := stmt (SEP stmt)*
//! stmt     := IDENT '=' expr | expr
//! expr     := term (('+'|'-') term)*
//! term     := power (('*'|'/'|'%') power)*
//! power    := unary ('^' power)?
//! unary    := '-' unary | postfix
//! postfix  := primary ('.' IDENT ('(' args ')')? | '(' args ')')*
//! primary  := NUMBER | STRING | IDENT | '(' expr ')' | '[' args ']'
//! ```

use super::ast::{BinaryOp, CallTarget, Expr, Program, Stmt, UnaryOp};
use super::lexer::{tokenize, Token};
use super::SandboxError;

pub fn parse(source: &str) -> Result<Program, SandboxError> {
    let tokens = tokenize(source)?;
    Parser { tokens, pos: 0 }.program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn program(mut self) -> Result<Program, SandboxError> {
        let mut stmts = Vec::new();
        self.skip_separators();
        while !self.at_end() {
            stmts.push(self.statement()?);
            if !self.at_end() {
                if !matches!(self.peek(), Some(Token::Separator)) {
                    return Err(self.unexpected("end of statement"));
                }
                self.skip_separators();
            }
        }
        Ok(Program { stmts })
    }

    fn statement(&mut self) -> Result<Stmt, SandboxError> {
        if let Some(Token::Ident(name)) = self.peek() {
            if matches!(self.peek_at(1), Some(Token::Assign)) {
                let name = name.clone();
                self.advance();
                self.advance();
                let value = self.expression()?;
                return Ok(Stmt::Assign { name, value });
            }
        }
        Ok(Stmt::Expr(self.expression()?))
    }

    fn expression(&mut self) -> Result<Expr, SandboxError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, SandboxError> {
        let mut lhs = self.power()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.power()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn power(&mut self) -> Result<Expr, SandboxError> {
        let base = self.unary()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.advance();
            // Right-associative.
            let exponent = self.power()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<Expr, SandboxError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, SandboxError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let name = match self.peek() {
                        Some(Token::Ident(name)) => name.clone(),
                        _ => return Err(self.unexpected("attribute name")),
                    };
                    self.advance();
                    if matches!(self.peek(), Some(Token::LParen)) {
                        self.advance();
                        let args = self.arguments(Token::RParen)?;
                        expr = Expr::Call {
                            target: CallTarget::Attr {
                                object: Box::new(expr),
                                name,
                            },
                            args,
                        };
                    } else {
                        expr = Expr::Attr {
                            object: Box::new(expr),
                            name,
                        };
                    }
                }
                Some(Token::LParen) => {
                    // Only bare names are callable directly; anything else
                    // (like the result of a call) has no call syntax.
                    let Expr::Ident(name) = expr else {
                        return Err(SandboxError::Syntax(
                            "only named functions can be called".into(),
                        ));
                    };
                    self.advance();
                    let args = self.arguments(Token::RParen)?;
                    expr = Expr::Call {
                        target: CallTarget::Name(name),
                        args,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, SandboxError> {
        let expr = match self.peek() {
            Some(Token::Number(n)) => {
                let n = *n;
                self.advance();
                Expr::Number(n)
            }
            Some(Token::Str(s)) => {
                let s = s.clone();
                self.advance();
                Expr::Str(s)
            }
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.advance();
                Expr::Ident(name)
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.expression()?;
                if !matches!(self.peek(), Some(Token::RParen)) {
                    return Err(self.unexpected("closing parenthesis"));
                }
                self.advance();
                inner
            }
            Some(Token::LBracket) => {
                self.advance();
                let items = self.arguments(Token::RBracket)?;
                Expr::List(items)
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(expr)
    }

    /// Parse a comma-separated expression list up to (and consuming) `close`.
    fn arguments(&mut self, close: Token) -> Result<Vec<Expr>, SandboxError> {
        let mut args = Vec::new();
        if self.peek() == Some(&close) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(token) if *token == close => {
                    self.advance();
                    return Ok(args);
                }
                _ => return Err(self.unexpected("`,` or closing delimiter")),
            }
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Token::Separator)) {
            self.advance();
        }
    }

    fn unexpected(&self, expected: &str) -> SandboxError {
        match self.peek() {
            Some(token) => SandboxError::Syntax(format!("expected {expected}, found {token:?}")),
            None => SandboxError::Syntax(format!("expected {expected}, found end of input")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Expr {
        Expr::Number(n)
    }

    #[test]
    fn test_precedence() {
        let program = parse("2 + 3 * 4").unwrap();
        assert_eq!(
            program.stmts,
            vec![Stmt::Expr(Expr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(num(2.0)),
                rhs: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    lhs: Box::new(num(3.0)),
                    rhs: Box::new(num(4.0)),
                }),
            })]
        );
    }

    #[test]
    fn test_power_right_associative() {
        let program = parse("2 ^ 3 ^ 2").unwrap();
        let Stmt::Expr(Expr::Binary { op, rhs, .. }) = &program.stmts[0] else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::Pow);
        assert!(matches!(
            **rhs,
            Expr::Binary {
                op: BinaryOp::Pow,
                ..
            }
        ));
    }

    #[test]
    fn test_assignment() {
        let program = parse("x = 1 + 2").unwrap();
        assert!(matches!(
            &program.stmts[0],
            Stmt::Assign { name, .. } if name == "x"
        ));
    }

    #[test]
    fn test_direct_call() {
        let program = parse("range(3)").unwrap();
        assert_eq!(
            program.stmts,
            vec![Stmt::Expr(Expr::Call {
                target: CallTarget::Name("range".into()),
                args: vec![num(3.0)],
            })]
        );
    }

    #[test]
    fn test_attribute_call_and_read() {
        let program = parse("math.sin(math.pi)").unwrap();
        let Stmt::Expr(Expr::Call { target, args }) = &program.stmts[0] else {
            panic!("expected call");
        };
        assert!(matches!(
            target,
            CallTarget::Attr { name, .. } if name == "sin"
        ));
        assert!(matches!(
            &args[0],
            Expr::Attr { name, .. } if name == "pi"
        ));
    }

    #[test]
    fn test_list_literal() {
        let program = parse("[1, 2, 3]").unwrap();
        assert_eq!(
            program.stmts,
            vec![Stmt::Expr(Expr::List(vec![num(1.0), num(2.0), num(3.0)]))]
        );
    }

    #[test]
    fn test_multiple_statements() {
        let program = parse("x = 1\ny = 2; x + y").unwrap();
        assert_eq!(program.stmts.len(), 3);
    }

    #[test]
    fn test_python_import_is_a_syntax_error() {
        // `import` is not part of the language; snippets pasted from other
        // languages fail the parse and are never executed.
        assert!(parse("import os; os.system('ls')").is_err());
    }

    #[test]
    fn test_dangling_operator() {
        assert!(parse("1 +").is_err());
    }

    #[test]
    fn test_unbalanced_parens() {
        assert!(parse("(1 + 2").is_err());
    }

    #[test]
    fn test_empty_program() {
        assert!(parse("").unwrap().stmts.is_empty());
        assert!(parse("\n\n").unwrap().stmts.is_empty());
    }
}
