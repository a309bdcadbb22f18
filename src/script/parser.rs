// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Recursive-descent parser

use std::rc::Rc;

use super::ast::{BinaryOp, Block, Callee, Expr, ExprKind, FnDecl, Param, Stmt, UnaryOp};
use super::error::{ScriptError, ScriptErrorKind, ScriptResult};
use super::lexer::tokenize;
use super::token::{Span, Token, TokenKind};

/// Parse a whole script
pub fn parse(source: &str) -> ScriptResult<Vec<Stmt>> {
    Parser::new(tokenize(source)?).parse_program()
}

/// Deepest nesting of blocks, brackets and unary operators
const MAX_NESTING: usize = 100;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    /// Set while parsing `if`/`while`/`for` heads so `{` opens the body
    /// instead of a trailing closure
    no_closure: bool,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| &t.kind) != Some(&TokenKind::Eof) {
            let end = tokens.last().map(|t| t.span.end()).unwrap_or(0);
            tokens.push(Token::new(TokenKind::Eof, Span::new(end, 0)));
        }
        Self {
            tokens,
            pos: 0,
            depth: 0,
            no_closure: false,
        }
    }

    pub fn parse_program(&mut self) -> ScriptResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.at(&TokenKind::Eof) {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ScriptResult<Token> {
        if self.at(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_ident(&mut self, what: &str) -> ScriptResult<(String, Span)> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, token.span))
            }
            ref kind if kind.is_keyword() => Err(ScriptError::new(
                ScriptErrorKind::Reserved(kind.to_string().trim_matches('\'').to_string()),
                token.span,
            )),
            _ => Err(self.unexpected(what)),
        }
    }

    fn unexpected(&self, expected: &str) -> ScriptError {
        let token = self.peek();
        ScriptError::new(
            ScriptErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind.to_string(),
            },
            token.span,
        )
    }

    /// Run `f` one nesting level deeper
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ScriptResult<T>) -> ScriptResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(ScriptError::new(
                ScriptErrorKind::NestingTooDeep(MAX_NESTING),
                self.peek().span,
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn with_closures<T>(
        &mut self,
        allowed: bool,
        f: impl FnOnce(&mut Self) -> ScriptResult<T>,
    ) -> ScriptResult<T> {
        let saved = self.no_closure;
        self.no_closure = !allowed;
        let result = f(self);
        self.no_closure = saved;
        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn statement(&mut self) -> ScriptResult<Stmt> {
        match self.peek().kind {
            TokenKind::Let => self.let_stmt(),
            TokenKind::Fn => self.fn_decl(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::For => self.for_stmt(),
            TokenKind::Break => Ok(Stmt::Break(self.advance().span)),
            TokenKind::Continue => Ok(Stmt::Continue(self.advance().span)),
            TokenKind::Import => {
                let start = self.advance().span;
                let (module, span) = self.expect_ident("module name")?;
                Ok(Stmt::Import {
                    module,
                    span: start.to(span),
                })
            }
            _ => self.expr_stmt(),
        }
    }

    fn let_stmt(&mut self) -> ScriptResult<Stmt> {
        let start = self.advance().span;
        let (name, _) = self.expect_ident("variable name")?;
        self.expect(TokenKind::Assign)?;
        let value = self.expression()?;
        Ok(Stmt::Let {
            name,
            span: start.to(value.span),
            value,
        })
    }

    fn fn_decl(&mut self) -> ScriptResult<Stmt> {
        let start = self.advance().span;
        let (name, _) = self.expect_ident("function name")?;
        self.expect(TokenKind::LParen)?;

        let mut params = Vec::new();
        while !self.at(&TokenKind::RParen) {
            let (param, span) = self.expect_ident("parameter name")?;
            let ty = if self.eat(&TokenKind::Colon) {
                Some(self.expect_ident("type name")?.0)
            } else {
                None
            };
            params.push(Param {
                name: param,
                ty,
                span,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let (body, end) = self.block()?;
        Ok(Stmt::Fn(Rc::new(FnDecl {
            name,
            params,
            body,
            span: start.to(end),
        })))
    }

    fn return_stmt(&mut self) -> ScriptResult<Stmt> {
        let start = self.advance().span;
        let value = match self.peek().kind {
            TokenKind::RBrace | TokenKind::Semicolon | TokenKind::Eof => None,
            _ => Some(self.expression()?),
        };
        let span = value.as_ref().map(|v| start.to(v.span)).unwrap_or(start);
        Ok(Stmt::Return { value, span })
    }

    fn if_stmt(&mut self) -> ScriptResult<Stmt> {
        let start = self.advance().span;
        let cond = self.condition()?;
        let (then, mut end) = self.block()?;

        let otherwise = if self.eat(&TokenKind::Else) {
            if self.at(&TokenKind::If) {
                let nested = self.nested(Self::if_stmt)?;
                end = nested.span();
                Some(Rc::new(vec![nested]))
            } else {
                let (block, block_end) = self.block()?;
                end = block_end;
                Some(block)
            }
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then,
            otherwise,
            span: start.to(end),
        })
    }

    fn while_stmt(&mut self) -> ScriptResult<Stmt> {
        let start = self.advance().span;
        let cond = self.condition()?;
        let (body, end) = self.block()?;
        Ok(Stmt::While {
            cond,
            body,
            span: start.to(end),
        })
    }

    fn for_stmt(&mut self) -> ScriptResult<Stmt> {
        let start = self.advance().span;
        let (var, _) = self.expect_ident("loop variable")?;
        self.expect(TokenKind::In)?;
        let iter = self.condition()?;
        let (body, end) = self.block()?;
        Ok(Stmt::For {
            var,
            iter,
            body,
            span: start.to(end),
        })
    }

    fn expr_stmt(&mut self) -> ScriptResult<Stmt> {
        let target = self.expression()?;
        if !self.eat(&TokenKind::Assign) {
            return Ok(Stmt::Expr(target));
        }

        let value = self.expression()?;
        let span = target.span.to(value.span);
        match target.kind {
            ExprKind::Var(name) => Ok(Stmt::Assign { name, value, span }),
            ExprKind::Index { target, index } => Ok(Stmt::IndexAssign {
                target: *target,
                index: *index,
                value,
                span,
            }),
            _ => Err(ScriptError::new(
                ScriptErrorKind::InvalidAssignment,
                target.span,
            )),
        }
    }

    /// `{ stmt* }`, returning the block and its full span
    fn block(&mut self) -> ScriptResult<(Block, Span)> {
        self.nested(Self::block_body)
    }

    fn block_body(&mut self) -> ScriptResult<(Block, Span)> {
        let open = self.expect(TokenKind::LBrace)?.span;
        let stmts = self.with_closures(true, |p| {
            let mut stmts = Vec::new();
            while !p.at(&TokenKind::RBrace) && !p.at(&TokenKind::Eof) {
                if p.eat(&TokenKind::Semicolon) {
                    continue;
                }
                stmts.push(p.statement()?);
            }
            Ok(stmts)
        })?;
        let close = self.expect(TokenKind::RBrace)?.span;
        Ok((Rc::new(stmts), open.to(close)))
    }

    fn condition(&mut self) -> ScriptResult<Expr> {
        self.with_closures(false, |p| p.expression())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn expression(&mut self) -> ScriptResult<Expr> {
        self.nested(Self::or)
    }

    fn binary_level(
        &mut self,
        operand: fn(&mut Self) -> ScriptResult<Expr>,
        ops: &[(TokenKind, BinaryOp)],
    ) -> ScriptResult<Expr> {
        let mut left = operand(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    let right = operand(self)?;
                    let span = left.span.to(right.span);
                    left = Expr::new(
                        ExprKind::Binary {
                            op: *op,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        span,
                    );
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn or(&mut self) -> ScriptResult<Expr> {
        self.binary_level(Self::and, &[(TokenKind::OrOr, BinaryOp::Or)])
    }

    fn and(&mut self) -> ScriptResult<Expr> {
        self.binary_level(Self::equality, &[(TokenKind::AndAnd, BinaryOp::And)])
    }

    fn equality(&mut self) -> ScriptResult<Expr> {
        self.binary_level(
            Self::comparison,
            &[
                (TokenKind::Eq, BinaryOp::Eq),
                (TokenKind::NotEq, BinaryOp::NotEq),
            ],
        )
    }

    fn comparison(&mut self) -> ScriptResult<Expr> {
        self.binary_level(
            Self::term,
            &[
                (TokenKind::LtEq, BinaryOp::LtEq),
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::GtEq, BinaryOp::GtEq),
                (TokenKind::Gt, BinaryOp::Gt),
            ],
        )
    }

    fn term(&mut self) -> ScriptResult<Expr> {
        self.binary_level(
            Self::factor,
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
        )
    }

    fn factor(&mut self) -> ScriptResult<Expr> {
        self.binary_level(
            Self::unary,
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Rem),
            ],
        )
    }

    fn unary(&mut self) -> ScriptResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        let start = self.advance().span;
        let expr = self.nested(Self::unary)?;
        let span = start.to(expr.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
            span,
        ))
    }

    fn postfix(&mut self) -> ScriptResult<Expr> {
        let mut expr = self.primary()?;
        while self.at(&TokenKind::LBracket) {
            self.advance();
            let index = self.with_closures(true, |p| p.expression())?;
            let close = self.expect(TokenKind::RBracket)?.span;
            let span = expr.span.to(close);
            expr = Expr::new(
                ExprKind::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn primary(&mut self) -> ScriptResult<Expr> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Int(i) => ExprKind::Int(i),
            TokenKind::Float(f) => ExprKind::Float(f),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::Interp(parts) => ExprKind::Interp(parts),
            TokenKind::Ident(name) => return self.identifier(name, token.span),
            TokenKind::LParen => {
                self.advance();
                let inner = self.with_closures(true, |p| p.expression())?;
                let close = self.expect(TokenKind::RParen)?.span;
                return Ok(Expr::new(inner.kind, token.span.to(close)));
            }
            TokenKind::LBracket => return self.array(),
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(Expr::new(kind, token.span))
    }

    fn identifier(&mut self, name: String, span: Span) -> ScriptResult<Expr> {
        self.advance();

        if self.at(&TokenKind::Dot) {
            self.advance();
            let (function, _) = self.expect_ident("function name")?;
            if !self.at(&TokenKind::LParen) {
                return Err(self.unexpected("'('"));
            }
            let callee = Callee::Qualified {
                module: name,
                name: function,
            };
            return self.call(callee, span);
        }

        if self.at(&TokenKind::LParen) {
            return self.call(Callee::Name(name), span);
        }

        Ok(Expr::new(ExprKind::Var(name), span))
    }

    fn call(&mut self, callee: Callee, start: Span) -> ScriptResult<Expr> {
        self.expect(TokenKind::LParen)?;
        let mut args = self.with_closures(true, |p| {
            let mut args = Vec::new();
            while !p.at(&TokenKind::RParen) {
                args.push(p.expression()?);
                if !p.eat(&TokenKind::Comma) {
                    break;
                }
            }
            Ok(args)
        })?;
        let mut end = self.expect(TokenKind::RParen)?.span;

        if !self.no_closure && self.at(&TokenKind::LBrace) {
            let (body, span) = self.block()?;
            args.push(Expr::new(ExprKind::Closure(body), span));
            end = span;
        }

        Ok(Expr::new(ExprKind::Call { callee, args }, start.to(end)))
    }

    fn array(&mut self) -> ScriptResult<Expr> {
        let open = self.advance().span;
        let items = self.with_closures(true, |p| {
            let mut items = Vec::new();
            while !p.at(&TokenKind::RBracket) {
                items.push(p.expression()?);
                if !p.eat(&TokenKind::Comma) {
                    break;
                }
            }
            Ok(items)
        })?;
        let close = self.expect(TokenKind::RBracket)?.span;
        Ok(Expr::new(ExprKind::Array(items), open.to(close)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = r#"pipeline("dev"){
    step("go"){
        workspace("./test")
        cmd("go run main.go")
    }
    parallel("echo"){
         workspace("./test")
         cmd("go run main.go")
    }
}"#;

    fn call_parts(stmt: &Stmt) -> (&Callee, &Vec<Expr>) {
        match stmt {
            Stmt::Expr(Expr {
                kind: ExprKind::Call { callee, args },
                ..
            }) => (callee, args),
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn test_canonical_script_is_one_call_with_closure() {
        let program = parse(CANONICAL).unwrap();
        assert_eq!(program.len(), 1);

        let (callee, args) = call_parts(&program[0]);
        assert_eq!(callee, &Callee::Name("pipeline".into()));
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].kind, ExprKind::Str("dev".into()));

        let ExprKind::Closure(body) = &args[1].kind else {
            panic!("expected trailing closure");
        };
        assert_eq!(body.len(), 2);
        let (inner, inner_args) = call_parts(&body[1]);
        assert_eq!(inner, &Callee::Name("parallel".into()));
        assert_eq!(inner_args.len(), 2);
    }

    #[test]
    fn test_precedence() {
        let program = parse("1 + 2 * 3 == 7 && !false").unwrap();
        let Stmt::Expr(expr) = &program[0] else {
            panic!()
        };
        let ExprKind::Binary { op, left, .. } = &expr.kind else {
            panic!()
        };
        assert_eq!(*op, BinaryOp::And);
        let ExprKind::Binary { op, left, .. } = &left.kind else {
            panic!()
        };
        assert_eq!(*op, BinaryOp::Eq);
        let ExprKind::Binary { op, right, .. } = &left.kind else {
            panic!()
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_condition_block_is_not_a_closure() {
        let program = parse("if ready(x) { cmd(\"go\") } else if y { } else { }").unwrap();
        let Stmt::If {
            cond, otherwise, ..
        } = &program[0]
        else {
            panic!()
        };
        let ExprKind::Call { args, .. } = &cond.kind else {
            panic!()
        };
        assert_eq!(args.len(), 1);
        let nested = otherwise.as_ref().unwrap();
        assert!(matches!(nested[0], Stmt::If { .. }));
    }

    #[test]
    fn test_statements() {
        let program = parse(
            r#"
            import math
            fn add(a: Int, b) { return a + b }
            let xs = [1, 2, 3,]
            xs[0] = 5
            for x in xs { if x > 2 { break } continue }
            while false { }
            let n = math.max(1, 2);
            "#,
        )
        .unwrap();
        assert_eq!(program.len(), 7);
        assert!(matches!(&program[0], Stmt::Import { module, .. } if module == "math"));
        let Stmt::Fn(decl) = &program[1] else {
            panic!()
        };
        assert_eq!(decl.params[0].ty.as_deref(), Some("Int"));
        assert_eq!(decl.params[1].ty, None);
        assert!(matches!(program[3], Stmt::IndexAssign { .. }));
        let Stmt::Let { value, .. } = &program[6] else {
            panic!()
        };
        assert!(matches!(
            &value.kind,
            ExprKind::Call { callee: Callee::Qualified { module, name }, .. }
                if module == "math" && name == "max"
        ));
    }

    #[test]
    fn test_call_span_covers_closure() {
        let src = "step(\"a\") { cmd(\"x\") }";
        let program = parse(src).unwrap();
        assert_eq!(program[0].span(), Span::new(0, src.len()));
    }

    #[test]
    fn test_missing_paren_points_at_token() {
        let err = parse("pipeline(\"dev\" {}").unwrap_err();
        assert_eq!(
            err.kind,
            ScriptErrorKind::UnexpectedToken {
                expected: "')'".into(),
                found: "'{'".into()
            }
        );
        assert_eq!(err.span.offset, 15);
    }

    #[test]
    fn test_keyword_as_name() {
        let err = parse("let if = 1").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::Reserved("if".into()));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse("f() = 1").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::InvalidAssignment);
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let deep = format!("let y = {}1{}", "(".repeat(20_000), ")".repeat(20_000));
        let err = parse(&deep).unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::NestingTooDeep(MAX_NESTING));

        let negations = format!("let y = {}1", "-".repeat(20_000));
        assert!(matches!(
            parse(&negations).unwrap_err().kind,
            ScriptErrorKind::NestingTooDeep(_)
        ));

        let blocks = format!("{}{}", "if true {".repeat(5_000), "}".repeat(5_000));
        assert!(matches!(
            parse(&blocks).unwrap_err().kind,
            ScriptErrorKind::NestingTooDeep(_)
        ));
    }

    #[test]
    fn test_reasonable_nesting_parses() {
        let src = format!("let y = {}1{}", "(".repeat(50), ")".repeat(50));
        assert!(parse(&src).is_ok());
    }
}
