use std::sync::Arc;

use crate::{
    ast::{
        BinaryOperator, Block, CompilationUnit, ElifArm, Expr, ExprKind, FunctionDecl, Ident,
        Member, Param, Stmt, StmtKind, UnaryOperator,
    },
    diagnostic::{DiagnosticBag, Error},
    lexer,
    text::SourceText,
    token::{Token, TokenKind},
    value::Value,
};

/// The outcome of a parse. Parsing never fails: malformed input yields a
/// tree with synthesized tokens plus diagnostics.
#[derive(Debug)]
pub struct Parsed<T> {
    pub node: T,
    pub diagnostics: DiagnosticBag,
    /// Whether the last token the parser matched had to be synthesized. The
    /// REPL uses this to decide whether a submission is complete.
    pub ends_with_missing: bool,
}

pub fn parse_unit(source: &Arc<SourceText>) -> Parsed<CompilationUnit> {
    parse(source, Parser::parse_unit)
}

pub fn parse_expr(source: &Arc<SourceText>) -> Parsed<Expr> {
    parse(source, |p| {
        let expr = p.parse_expr();
        p.consume(TokenKind::Eof);
        expr
    })
}

fn parse<'src, T>(
    source: &'src Arc<SourceText>,
    f: impl for<'a> FnOnce(&'a mut Parser<'src>) -> T,
) -> Parsed<T> {
    let mut tokens = Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY);
    let diagnostics = lexer::lex(source, &mut tokens);
    tokens.retain(|t| !t.kind.is_trivia() && t.kind != TokenKind::Bad);
    tracing::trace!(tokens = tokens.len(), "lexed");

    let mut p = Parser {
        source,
        tokens,
        cursor: 0,
        diagnostics,
        last_missing: false,
    };
    let node = f(&mut p);
    Parsed {
        node,
        diagnostics: p.diagnostics,
        ends_with_missing: p.last_missing,
    }
}

struct Parser<'src> {
    source: &'src SourceText,
    /// Tokens without trivia. Always ends with [`TokenKind::Eof`].
    tokens: Vec<Token>,
    cursor: usize,
    diagnostics: DiagnosticBag,
    last_missing: bool,
}

impl Parser<'_> {
    fn parse_unit(&mut self) -> CompilationUnit {
        let mut members = Vec::new();
        while !self.is(TokenKind::Eof) {
            let start = self.cursor;
            members.push(self.parse_member());
            // The member reported an error without consuming anything.
            if self.cursor == start {
                self.advance();
            }
        }
        CompilationUnit { members }
    }

    fn parse_member(&mut self) -> Member {
        if self.is(TokenKind::Function) {
            Member::Function(Arc::new(self.parse_function()))
        } else {
            Member::GlobalStatement(self.parse_stmt())
        }
    }

    fn parse_function(&mut self) -> FunctionDecl {
        let keyword = self.consume(TokenKind::Function);
        let name = self.parse_ident();
        self.consume(TokenKind::LParen);
        let params = self.parse_list(TokenKind::RParen, TokenKind::Comma, Parser::parse_param);
        self.consume(TokenKind::RParen);
        let return_ty = if self.take(TokenKind::Colon) {
            Some(self.parse_ident())
        } else {
            None
        };
        let body = self.parse_block();
        FunctionDecl {
            span: keyword.span.to(body.span),
            name,
            params,
            return_ty,
            body,
        }
    }

    fn parse_param(&mut self) -> Param {
        let name = self.parse_ident();
        self.consume(TokenKind::Colon);
        let ty = self.parse_ident();
        Param { name, ty }
    }

    fn parse_ident(&mut self) -> Ident {
        let token = self.consume(TokenKind::Identifier);
        Ident {
            name: token.text,
            span: token.span,
        }
    }

    fn parse_block(&mut self) -> Block {
        let open = self.consume(TokenKind::LBrace);
        let mut stmts = Vec::new();
        while !self.is(TokenKind::RBrace) && !self.is(TokenKind::Eof) {
            let start = self.cursor;
            stmts.push(self.parse_stmt());
            // Skip the offending token; an error was already reported.
            if self.cursor == start {
                self.advance();
            }
        }
        let close = self.consume(TokenKind::RBrace);
        Block {
            stmts,
            span: open.span.to(close.span),
        }
    }

    fn parse_stmt(&mut self) -> Stmt {
        match self.peek().kind {
            TokenKind::LBrace => {
                let block = self.parse_block();
                Stmt {
                    span: block.span,
                    kind: StmtKind::Block(block),
                }
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            _ => {
                let stmt = self.parse_simple_stmt();
                self.take(TokenKind::Semicolon);
                stmt
            }
        }
    }

    /// Statements which may be terminated by an optional `;`.
    fn parse_simple_stmt(&mut self) -> Stmt {
        match self.peek().kind {
            TokenKind::Let => {
                let keyword = self.advance();
                let name = self.parse_ident();
                let ty = if self.take(TokenKind::Colon) {
                    Some(self.parse_ident())
                } else {
                    None
                };
                self.consume(TokenKind::Equals);
                let initializer = self.parse_expr();
                Stmt {
                    span: keyword.span.to(initializer.span),
                    kind: StmtKind::VarDecl {
                        name,
                        ty,
                        initializer,
                    },
                }
            }
            TokenKind::Break => Stmt {
                span: self.advance().span,
                kind: StmtKind::Break,
            },
            TokenKind::Continue => Stmt {
                span: self.advance().span,
                kind: StmtKind::Continue,
            },
            TokenKind::Return => {
                let keyword = self.advance();
                let next = self.peek();
                let same_line =
                    self.source.line_index(keyword.span.lo) == self.source.line_index(next.span.lo);
                let ends = matches!(
                    next.kind,
                    TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
                );
                let expr = (same_line && !ends).then(|| self.parse_expr());
                let span = expr.as_ref().map_or(keyword.span, |e| keyword.span.to(e.span));
                Stmt {
                    span,
                    kind: StmtKind::Return(expr),
                }
            }
            _ => {
                let expr = self.parse_expr();
                Stmt {
                    span: expr.span,
                    kind: StmtKind::Expr(expr),
                }
            }
        }
    }

    fn parse_if(&mut self) -> Stmt {
        let keyword = self.consume(TokenKind::If);
        let condition = self.parse_parenthesized_condition();
        let then_arm = Box::new(self.parse_stmt());
        let mut span = keyword.span.to(then_arm.span);

        let mut elif_arms = Vec::new();
        while self.is(TokenKind::Elif) {
            let keyword = self.advance();
            let condition = self.parse_parenthesized_condition();
            let body = self.parse_stmt();
            let arm_span = keyword.span.to(body.span);
            span = span.to(arm_span);
            elif_arms.push(ElifArm {
                condition,
                body,
                span: arm_span,
            });
        }

        let else_arm = if self.take(TokenKind::Else) {
            let stmt = self.parse_stmt();
            span = span.to(stmt.span);
            Some(Box::new(stmt))
        } else {
            None
        };

        Stmt {
            span,
            kind: StmtKind::If {
                condition,
                then_arm,
                elif_arms,
                else_arm,
            },
        }
    }

    fn parse_while(&mut self) -> Stmt {
        let keyword = self.consume(TokenKind::While);
        let condition = self.parse_parenthesized_condition();
        let body = self.parse_stmt();
        Stmt {
            span: keyword.span.to(body.span),
            kind: StmtKind::While {
                condition,
                body: Box::new(body),
            },
        }
    }

    fn parse_for(&mut self) -> Stmt {
        let keyword = self.consume(TokenKind::For);
        self.consume(TokenKind::LParen);
        let variable = self.parse_ident();
        self.consume(TokenKind::Equals);
        let lower = self.parse_expr();
        self.consume(TokenKind::To);
        let upper = self.parse_expr();
        self.consume(TokenKind::RParen);
        let body = self.parse_stmt();
        Stmt {
            span: keyword.span.to(body.span),
            kind: StmtKind::For {
                variable,
                lower,
                upper,
                body: Box::new(body),
            },
        }
    }

    fn parse_parenthesized_condition(&mut self) -> Expr {
        self.consume(TokenKind::LParen);
        let condition = self.parse_expr();
        self.consume(TokenKind::RParen);
        condition
    }

    fn parse_expr(&mut self) -> Expr {
        self.parse_assignment()
    }

    /// Assignments are recognized by lookahead and are right-associative.
    fn parse_assignment(&mut self) -> Expr {
        if self.is(TokenKind::Identifier) && self.peek_nth(1).kind.is_assignment() {
            let target = self.parse_ident();
            let op_token = self.advance();
            let op = op_token
                .kind
                .compound_operator()
                .and_then(BinaryOperator::from_token);
            let value = self.parse_assignment();
            return Expr {
                span: target.span.to(value.span),
                kind: ExprKind::Assignment {
                    target,
                    op,
                    value: Box::new(value),
                },
            };
        }
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Expr {
        let mut lhs = self.parse_nud();

        loop {
            let op_kind = self.peek().kind;
            let Some((lbp, rbp)) = op_kind.infix_binding_power() else {
                // Not an infix operator
                break;
            };
            if lbp < min_bp {
                // Operator binds less tightly than the minimum required
                break;
            }
            let op_span = self.advance().span;
            let Some(op) = BinaryOperator::from_token(op_kind) else {
                unreachable!("{op_kind:?} has a binding power but no operator");
            };
            let rhs = self.parse_expr_bp(rbp);
            lhs = Expr {
                span: lhs.span.to(rhs.span),
                kind: ExprKind::Binary {
                    op,
                    op_span,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            };
        }

        lhs
    }

    /// nud: Parses tokens that start an expression
    /// (prefix operators, literals, grouping, names and calls)
    fn parse_nud(&mut self) -> Expr {
        let token = self.peek();
        if let Some(op) = UnaryOperator::from_token(token.kind) {
            self.advance();
            let Some(rbp) = token.kind.prefix_binding_power() else {
                unreachable!("{:?} is a unary operator without binding power", token.kind);
            };
            let expr = self.parse_expr_bp(rbp);
            return Expr {
                span: token.span.to(expr.span),
                kind: ExprKind::Unary {
                    op,
                    op_span: token.span,
                    expr: Box::new(expr),
                },
            };
        }

        match token.kind {
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr();
                let close = self.consume(TokenKind::RParen);
                Expr {
                    span: token.span.to(close.span),
                    kind: ExprKind::Paren(Box::new(expr)),
                }
            }
            TokenKind::True | TokenKind::False | TokenKind::Number | TokenKind::String => {
                let token = self.advance();
                let value = token.value.unwrap_or(Value::Int(0));
                Expr {
                    span: token.span,
                    kind: ExprKind::Literal(value),
                }
            }
            TokenKind::Identifier if self.peek_nth(1).kind == TokenKind::LParen => {
                let callee = self.parse_ident();
                self.consume(TokenKind::LParen);
                let args = self.parse_list(TokenKind::RParen, TokenKind::Comma, Parser::parse_expr);
                let close = self.consume(TokenKind::RParen);
                Expr {
                    span: callee.span.to(close.span),
                    kind: ExprKind::Call { callee, args },
                }
            }
            _ => {
                let name = self.parse_ident();
                Expr {
                    span: name.span,
                    kind: ExprKind::Name(name),
                }
            }
        }
    }

    /// Parses `item (separator item)*` until `end_delim` is found. Does
    /// **NOT** consume the end delimiter.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        separator: TokenKind,
        parse_item: impl Fn(&mut Self) -> T,
    ) -> Vec<T> {
        debug_assert_ne!(end_delim, separator);

        let mut items = Vec::new();
        while !self.is(end_delim) && !self.is(TokenKind::Eof) {
            items.push(parse_item(self));
            if !self.take(separator) {
                break;
            }
        }
        items
    }
}

impl Parser<'_> {
    /// Returns the current token.
    fn peek(&self) -> Token {
        self.peek_nth(0)
    }

    /// Returns the token `n` positions ahead. Stays at the end-of-file token.
    fn peek_nth(&self, n: usize) -> Token {
        let last = self.tokens.len() - 1;
        self.tokens[(self.cursor + n).min(last)].clone()
    }

    /// Returns the current token and advances, never past end of file.
    fn advance(&mut self) -> Token {
        let c = self.peek();
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
        self.last_missing = false;
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.tokens[self.cursor].kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one. If not, records
    /// an error and returns a synthesized zero-width token of the expected
    /// kind, without advancing.
    fn consume(&mut self, expect: TokenKind) -> Token {
        if self.is(expect) {
            return self.advance();
        }
        let c = self.peek();
        self.diagnostics.report(
            c.span,
            Error::UnexpectedToken {
                actual: c.kind,
                expected: expect,
            },
        );
        self.last_missing = true;
        Token::missing(expect, c.span.lo)
    }
}
