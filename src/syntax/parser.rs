use crate::ast::{Primitive, Range, Type};
use crate::syntax::errors::SyntaxError;
use crate::syntax::expr::{
    AssignOp, BinaryOp, Expr, ExprKind, Literal, Stmt, StmtKind, UnaryOp, Unit, UpdateOp,
};
use crate::syntax::lexer::{lex, Token, TokenKind};

/// Parse a single expression spanning the whole input.
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    let mut parser = Parser::new(lex(source)?);
    let expr = parser.parse_expr()?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parse a type such as `Optional<T>`, `int[]` or `Map<String, ? extends T>`.
pub fn parse_type(source: &str) -> Result<Type, SyntaxError> {
    let mut parser = Parser::new(lex(source)?);
    let ty = parser.parse_type()?;
    parser.expect_eof()?;
    Ok(ty)
}

/// Parse a compilation unit: imports followed by statements.
pub fn parse_unit(source: &str) -> Result<Unit, SyntaxError> {
    let mut parser = Parser::new(lex(source)?);
    let mut stmts = Vec::new();
    while !parser.at(&TokenKind::Eof) {
        stmts.push(parser.parse_stmt()?);
    }
    Ok(Unit { stmts })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    prev_end: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            prev_end: 0,
        }
    }

    // ---- statements -------------------------------------------------------

    fn parse_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.peek().range.start;
        match self.peek().kind {
            TokenKind::Import => self.parse_import(start),
            TokenKind::Return => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(self.stmt(StmtKind::Return(expr), start))
            }
            TokenKind::If => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let then = Box::new(self.parse_stmt()?);
                let otherwise = if self.eat(&TokenKind::Else) {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                Ok(self.stmt(
                    StmtKind::If {
                        cond,
                        then,
                        otherwise,
                    },
                    start,
                ))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut stmts = Vec::new();
                while !self.at(&TokenKind::RBrace) {
                    if self.at(&TokenKind::Eof) {
                        return Err(self.error("'}'"));
                    }
                    stmts.push(self.parse_stmt()?);
                }
                self.advance();
                Ok(self.stmt(StmtKind::Block(stmts), start))
            }
            _ => {
                if let Some(local) = self.try_parse_local(start)? {
                    return Ok(local);
                }
                self.parse_expr_stmt(start)
            }
        }
    }

    fn parse_import(&mut self, start: usize) -> Result<Stmt, SyntaxError> {
        self.advance();
        let is_static = self.eat(&TokenKind::Static);
        let mut path = self.expect_ident()?;
        while self.eat(&TokenKind::Dot) {
            if self.eat(&TokenKind::Star) {
                path.push_str(".*");
                break;
            }
            path.push('.');
            path.push_str(&self.expect_ident()?);
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(self.stmt(StmtKind::Import { path, is_static }, start))
    }

    /// `Type name [= init];`, backtracking when the prefix is not a declaration.
    fn try_parse_local(&mut self, start: usize) -> Result<Option<Stmt>, SyntaxError> {
        if !matches!(self.peek().kind, TokenKind::Ident(_)) {
            return Ok(None);
        }
        let saved = (self.pos, self.prev_end);
        let declared = self.parse_type().ok().and_then(|ty| match self.peek().kind {
            TokenKind::Ident(ref name)
                if matches!(
                    self.peek_at(1).kind,
                    TokenKind::Assign | TokenKind::Semicolon
                ) =>
            {
                Some((ty, name.clone()))
            }
            _ => None,
        });
        let Some((ty, name)) = declared else {
            (self.pos, self.prev_end) = saved;
            return Ok(None);
        };
        self.advance();
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(Some(self.stmt(StmtKind::Local { ty, name, init }, start)))
    }

    fn parse_expr_stmt(&mut self, start: usize) -> Result<Stmt, SyntaxError> {
        let expr = self.parse_expr()?;
        let assign = match self.peek().kind {
            TokenKind::Assign => Some(AssignOp::Assign),
            TokenKind::PlusAssign => Some(AssignOp::AddAssign),
            TokenKind::MinusAssign => Some(AssignOp::SubAssign),
            _ => None,
        };
        let kind = if let Some(op) = assign {
            self.advance();
            let value = self.parse_expr()?;
            StmtKind::Assign {
                target: expr,
                op,
                value,
            }
        } else if self.eat(&TokenKind::PlusPlus) {
            StmtKind::Update {
                target: expr,
                op: UpdateOp::Increment,
            }
        } else if self.eat(&TokenKind::MinusMinus) {
            StmtKind::Update {
                target: expr,
                op: UpdateOp::Decrement,
            }
        } else {
            StmtKind::Expr(expr)
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(self.stmt(kind, start))
    }

    fn stmt(&self, kind: StmtKind, start: usize) -> Stmt {
        Stmt {
            kind,
            range: Range::new(start, self.prev_end),
        }
    }

    // ---- expressions ------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        if let Some(params) = self.lambda_params_ahead() {
            return self.parse_lambda(params);
        }
        self.parse_conditional()
    }

    /// Detects `x ->`, `() ->` and `(a, b) ->` without consuming input.
    fn lambda_params_ahead(&self) -> Option<usize> {
        match &self.peek().kind {
            TokenKind::Ident(_) if self.peek_at(1).kind == TokenKind::Arrow => Some(1),
            TokenKind::LParen => {
                let mut i = 1;
                if self.peek_at(i).kind == TokenKind::RParen {
                    return (self.peek_at(i + 1).kind == TokenKind::Arrow).then_some(0);
                }
                let mut count = 0;
                loop {
                    if !matches!(self.peek_at(i).kind, TokenKind::Ident(_)) {
                        return None;
                    }
                    count += 1;
                    i += 1;
                    match self.peek_at(i).kind {
                        TokenKind::Comma => i += 1,
                        TokenKind::RParen => {
                            return (self.peek_at(i + 1).kind == TokenKind::Arrow).then_some(count)
                        }
                        _ => return None,
                    }
                }
            }
            _ => None,
        }
    }

    fn parse_lambda(&mut self, arity: usize) -> Result<Expr, SyntaxError> {
        let start = self.peek().range.start;
        let mut params = Vec::with_capacity(arity);
        if self.eat(&TokenKind::LParen) {
            while !self.at(&TokenKind::RParen) {
                let range = self.peek().range;
                params.push((self.expect_ident()?, range));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        } else {
            let range = self.peek().range;
            params.push((self.expect_ident()?, range));
        }
        self.expect(TokenKind::Arrow)?;
        let body = self.parse_expr()?;
        Ok(self.expr(
            ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
            start,
        ))
    }

    fn parse_conditional(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.peek().range.start;
        let cond = self.parse_binary(BinaryOp::Or.precedence())?;
        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }
        let then = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        let otherwise = self.parse_expr()?;
        Ok(self.expr(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            start,
        ))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let start = self.peek().range.start;
        let mut lhs = self.parse_unary()?;
        while let Some(op) = binary_op(&self.peek().kind) {
            if op.precedence() < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(op.precedence() + 1)?;
            lhs = self.expr(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                start,
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.peek().range.start;
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Tilde => UnaryOp::BitNot,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(self.expr(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            start,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.peek().range.start;
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let type_args = if self.at(&TokenKind::Lt) {
                    self.parse_type_args()?
                } else {
                    Vec::new()
                };
                let name = self.expect_ident()?;
                if self.at(&TokenKind::LParen) {
                    let args = self.parse_args()?;
                    expr = self.expr(
                        ExprKind::Call {
                            receiver: Some(Box::new(expr)),
                            type_args,
                            name,
                            args,
                        },
                        start,
                    );
                } else if !type_args.is_empty() {
                    return Err(self.error("'('"));
                } else {
                    expr = self.expr(
                        ExprKind::Field {
                            receiver: Box::new(expr),
                            name,
                        },
                        start,
                    );
                }
            } else if self.eat(&TokenKind::ColonColon) {
                let name = self.expect_ident()?;
                expr = self.expr(
                    ExprKind::MethodRef {
                        target: Box::new(expr),
                        name,
                    },
                    start,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.peek().clone();
        let start = token.range.start;
        let literal = match &token.kind {
            TokenKind::Int { value, long, raw } => Some(Literal::Int {
                value: *value,
                long: *long,
                raw: raw.clone(),
            }),
            TokenKind::Float { value, double, raw } => Some(Literal::Float {
                value: *value,
                double: *double,
                raw: raw.clone(),
            }),
            TokenKind::Str(s) => Some(Literal::Str(s.clone())),
            TokenKind::Char(c) => Some(Literal::Char(*c)),
            TokenKind::True => Some(Literal::Bool(true)),
            TokenKind::False => Some(Literal::Bool(false)),
            TokenKind::Null => Some(Literal::Null),
            _ => None,
        };
        if let Some(literal) = literal {
            self.advance();
            return Ok(self.expr(ExprKind::Literal(literal), start));
        }

        match token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                if self.at(&TokenKind::LParen) {
                    let args = self.parse_args()?;
                    Ok(self.expr(
                        ExprKind::Call {
                            receiver: None,
                            type_args: Vec::new(),
                            name,
                            args,
                        },
                        start,
                    ))
                } else {
                    Ok(self.expr(ExprKind::Name(name), start))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(self.expr(ExprKind::Parens(Box::new(inner)), start))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut elements = Vec::new();
                while !self.at(&TokenKind::RBrace) {
                    elements.push(self.parse_expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace)?;
                Ok(self.expr(ExprKind::ArrayInit(elements), start))
            }
            _ => Err(self.error("expression")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(args);
        }
    }

    fn expr(&self, kind: ExprKind, start: usize) -> Expr {
        Expr {
            kind,
            range: Range::new(start, self.prev_end),
        }
    }

    // ---- types ------------------------------------------------------------

    fn parse_type(&mut self) -> Result<Type, SyntaxError> {
        if self.eat(&TokenKind::Question) {
            let bound = match &self.peek().kind {
                TokenKind::Ident(word) if word == "extends" => {
                    self.advance();
                    Some(Box::new(self.parse_type()?))
                }
                _ => None,
            };
            return Ok(Type::Wildcard(bound));
        }

        let mut name = self.expect_ident()?;
        while self.at(&TokenKind::Dot)
            && matches!(self.peek_at(1).kind, TokenKind::Ident(_))
        {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }

        let mut ty = match Primitive::from_keyword(&name) {
            Some(primitive) => Type::Primitive(primitive),
            None => {
                let args = if self.at(&TokenKind::Lt) {
                    self.parse_type_args()?
                } else {
                    Vec::new()
                };
                Type::Class { name, args }
            }
        };

        while self.at(&TokenKind::LBracket) && self.peek_at(1).kind == TokenKind::RBracket {
            self.advance();
            self.advance();
            ty = Type::Array(Box::new(ty));
        }
        Ok(ty)
    }

    fn parse_type_args(&mut self) -> Result<Vec<Type>, SyntaxError> {
        self.expect(TokenKind::Lt)?;
        let mut args = vec![self.parse_type()?];
        while self.eat(&TokenKind::Comma) {
            args.push(self.parse_type()?);
        }
        self.expect(TokenKind::Gt)?;
        Ok(args)
    }

    // ---- token plumbing ---------------------------------------------------

    fn expect_ident(&mut self) -> Result<String, SyntaxError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("identifier")),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), SyntaxError> {
        if self.at(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&kind.to_string()))
        }
    }

    fn expect_eof(&self) -> Result<(), SyntaxError> {
        if self.at(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(SyntaxError::TrailingInput {
                found: self.peek().kind.to_string(),
                offset: self.peek().range.start,
            })
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.prev_end = self.tokens[self.pos].range.end;
            self.pos += 1;
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let index = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn error(&self, expected: &str) -> SyntaxError {
        SyntaxError::Expected {
            expected: expected.to_string(),
            found: self.peek().kind.to_string(),
            offset: self.peek().range.start,
        }
    }
}

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::OrOr => BinaryOp::Or,
        TokenKind::AndAnd => BinaryOp::And,
        TokenKind::EqEq => BinaryOp::Eq,
        TokenKind::BangEq => BinaryOp::Ne,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::Le => BinaryOp::Le,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::Ge => BinaryOp::Ge,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Rem,
        _ => return None,
    })
}
