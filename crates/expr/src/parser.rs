use std::collections::HashSet;

use serde_json::Value;

use crate::error::ExpressionError;
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::lexer::{tokenize, Token};

/// Attribute names the sandbox permits (spec §4.2). No attribute
/// starting with `_` is ever callable or readable, regardless of this
/// list.
pub const ALLOWED_ATTRIBUTES: &[&str] = &["startswith", "endswith", "lower", "upper", "strip", "split", "get"];

/// Function names the sandbox permits as bare calls (spec §4.2).
pub const ALLOWED_FUNCTIONS: &[&str] = &["sum", "len", "min", "max", "any", "all", "range"];

/// Parse `source` into a validated `Expr` AST. Every whitelist check
/// (allowed identifiers, allowed attributes, allowed call targets) is
/// enforced here, at parse time, before any evaluation is attempted
/// (spec §9 "Expression sandbox"; SPEC_FULL.md §4.2 AMBIENT "Parser
/// Strategy").
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    let base_names: HashSet<String> = ["body", "headers", "context"]
        .iter()
        .map(|s| (*s).to_string())
        .chain(ALLOWED_FUNCTIONS.iter().map(|s| (*s).to_string()))
        .collect();
    let mut parser = Parser {
        tokens,
        pos: 0,
        allowed_names: base_names,
    };
    let expr = parser.parse_expr()?;
    parser.expect(&Token::End)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    allowed_names: HashSet<String>,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExpressionError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(ExpressionError::Syntax(format!(
                "expected {expected:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExpressionError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, ExpressionError> {
        let body = self.parse_or()?;
        if self.eat(&Token::If) {
            let cond = self.parse_or()?;
            self.expect(&Token::Else)?;
            let else_branch = self.parse_ternary()?;
            Ok(Expr::Ternary {
                cond: Box::new(cond),
                then_branch: Box::new(body),
                else_branch: Box::new(else_branch),
            })
        } else {
            Ok(body)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Binary(Box::new(left), BinaryOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = Expr::Binary(Box::new(left), BinaryOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Not) {
            let operand = self.parse_not()?;
            Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)))
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Eq2 => Some(BinaryOp::Eq),
                Token::NotEq => Some(BinaryOp::NotEq),
                Token::Lt => Some(BinaryOp::Lt),
                Token::LtE => Some(BinaryOp::LtE),
                Token::Gt => Some(BinaryOp::Gt),
                Token::GtE => Some(BinaryOp::GtE),
                Token::In => Some(BinaryOp::In),
                Token::Is => Some(BinaryOp::Is),
                Token::Not => {
                    // lookahead for "not in"
                    if self.tokens.get(self.pos + 1) == Some(&Token::In) {
                        self.advance();
                        self.advance();
                        let right = self.parse_additive()?;
                        left = Expr::Binary(Box::new(left), BinaryOp::NotIn, Box::new(right));
                        continue;
                    }
                    None
                }
                _ => None,
            };
            let Some(op) = op else { break };
            self.advance();
            let op = if op == BinaryOp::Is && self.eat(&Token::Not) {
                BinaryOp::IsNot
            } else {
                op
            };
            let right = self.parse_additive()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::DoubleSlash => BinaryOp::FloorDiv,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)))
            }
            Token::Plus => {
                self.advance();
                Ok(Expr::Unary(UnaryOp::Pos, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, ExpressionError> {
        let left = self.parse_postfix()?;
        if self.eat(&Token::DoubleStar) {
            let right = self.parse_unary()?;
            Ok(Expr::Binary(Box::new(left), BinaryOp::Pow, Box::new(right)))
        } else {
            Ok(left)
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let name = self.expect_ident()?;
                    if name.starts_with('_') || !ALLOWED_ATTRIBUTES.contains(&name.as_str()) {
                        return Err(ExpressionError::Security(format!("attribute access not allowed: {name}")));
                    }
                    expr = Expr::Attribute(Box::new(expr), name);
                    if self.peek() == &Token::LParen {
                        let args = self.parse_call_args()?;
                        expr = Expr::Call {
                            callee: Box::new(expr),
                            args,
                        };
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Token::LParen => {
                    if let Expr::Ident(name) = &expr {
                        if !ALLOWED_FUNCTIONS.contains(&name.as_str()) {
                            return Err(ExpressionError::Security("only approved functions may be called".to_string()));
                        }
                    } else {
                        return Err(ExpressionError::Security("only approved functions may be called".to_string()));
                    }
                    let args = self.parse_call_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ExpressionError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if self.peek() != &Token::RParen {
            args.push(self.parse_expr()?);
            while self.eat(&Token::Comma) {
                args.push(self.parse_expr()?);
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn expect_ident(&mut self) -> Result<String, ExpressionError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(ExpressionError::Syntax(format!("expected identifier, found {other:?}"))),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(
                serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
            )),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::None_ => Ok(Expr::Literal(Value::Null)),
            Token::Ident(name) => {
                if !self.allowed_names.contains(&name) {
                    return Err(ExpressionError::Security(format!("disallowed name: {name}")));
                }
                Ok(Expr::Ident(name))
            }
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => self.parse_list_or_comprehension(),
            Token::LBrace => self.parse_dict_or_set(),
            other => Err(ExpressionError::Syntax(format!("unexpected token {other:?}"))),
        }
    }

    /// Look ahead from the current position (just past `[`) for a
    /// top-level `for <name> in` without consuming anything. The
    /// comprehension's bound variable must be known before the element
    /// expression is parsed, since the element may reference it.
    fn scan_comprehension_target(&self) -> Option<String> {
        let mut depth = 0i32;
        let mut i = self.pos;
        while i < self.tokens.len() {
            match &self.tokens[i] {
                Token::LBracket | Token::LParen | Token::LBrace => depth += 1,
                Token::RBracket | Token::RParen | Token::RBrace if depth == 0 => return None,
                Token::RBracket | Token::RParen | Token::RBrace => depth -= 1,
                Token::Comma if depth == 0 => return None,
                Token::For if depth == 0 => {
                    if let Some(Token::Ident(name)) = self.tokens.get(i + 1) {
                        return Some(name.clone());
                    }
                    return None;
                }
                Token::End => return None,
                _ => {}
            }
            i += 1;
        }
        None
    }

    fn parse_list_or_comprehension(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek() == &Token::RBracket {
            self.advance();
            return Ok(Expr::List(Vec::new()));
        }

        if let Some(target) = self.scan_comprehension_target() {
            let inserted = self.allowed_names.insert(target.clone());
            let result = self.parse_comprehension_body(&target);
            if inserted {
                self.allowed_names.remove(&target);
            }
            return result;
        }

        let first = self.parse_expr()?;
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.peek() == &Token::RBracket {
                break;
            }
            items.push(self.parse_expr()?);
        }
        self.expect(&Token::RBracket)?;
        Ok(Expr::List(items))
    }

    fn parse_comprehension_body(&mut self, expected_target: &str) -> Result<Expr, ExpressionError> {
        let element = self.parse_expr()?;
        self.expect(&Token::For)?;
        let target = self.expect_ident()?;
        debug_assert_eq!(target, expected_target);
        self.expect(&Token::In)?;
        let iter = self.parse_or()?;
        let condition = if self.eat(&Token::If) {
            Some(Box::new(self.parse_or()?))
        } else {
            None
        };
        self.expect(&Token::RBracket)?;
        Ok(Expr::Comprehension {
            element: Box::new(element),
            target,
            iter: Box::new(iter),
            condition,
        })
    }

    fn parse_dict_or_set(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek() == &Token::RBrace {
            self.advance();
            return Ok(Expr::Dict(Vec::new()));
        }
        let first_key = self.parse_expr()?;
        if self.eat(&Token::Colon) {
            let first_value = self.parse_expr()?;
            let mut entries = vec![(first_key, first_value)];
            while self.eat(&Token::Comma) {
                if self.peek() == &Token::RBrace {
                    break;
                }
                let key = self.parse_expr()?;
                self.expect(&Token::Colon)?;
                let value = self.parse_expr()?;
                entries.push((key, value));
            }
            self.expect(&Token::RBrace)?;
            Ok(Expr::Dict(entries))
        } else {
            let mut items = vec![first_key];
            while self.eat(&Token::Comma) {
                if self.peek() == &Token::RBrace {
                    break;
                }
                items.push(self.parse_expr()?);
            }
            self.expect(&Token::RBrace)?;
            Ok(Expr::Set(items))
        }
    }
}
