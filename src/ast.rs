// unit ::= member*
// member ::= function | stmt
// function ::= function ID '(' [param (',' param)*] ')' [':' TYPE] block
// param ::= ID ':' TYPE
// block ::= '{' stmt* '}'
// stmt ::= block
//        | let ID [':' TYPE] '=' expr [';']
//        | if '(' expr ')' stmt (elif '(' expr ')' stmt)* [else stmt]
//        | while '(' expr ')' stmt
//        | for '(' ID '=' expr to expr ')' stmt
//        | break [';']
//        | continue [';']
//        | return [expr] [';']
//        | expr [';']
// expr ::= ID ('=' | '+=' | '-=' | '*=' | '/=' | '^=') expr
//        | ID '(' [expr (',' expr)*] ')'
//        | expr binop expr
//        | ('+' | '-' | '!' | '~') expr
//        | '(' expr ')'
//        | ID
//        | integer
//        | string
//        | true
//        | false

// Precedence
//
// + - ! ~ (prefix)
// * / %
// + -
// == != < <= > >=
// & &&
// | || ^
// = += -= *= /= ^= (right associative)

use std::sync::Arc;

use crate::{text::Span, token::TokenKind, value::Value};

/// The root of one parsed source text.
#[derive(Debug, PartialEq, Default)]
pub struct CompilationUnit {
    pub members: Vec<Member>,
}

#[derive(Debug, PartialEq)]
pub enum Member {
    Function(Arc<FunctionDecl>),
    GlobalStatement(Stmt),
}

#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_ty: Option<Ident>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Ident,
}

/// An identifier. Identifiers synthesized by error recovery have an empty
/// name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: Box<str>,
    pub span: Span,
}

impl Ident {
    pub fn is_missing(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum StmtKind {
    Block(Block),
    VarDecl {
        name: Ident,
        ty: Option<Ident>,
        initializer: Expr,
    },
    If {
        condition: Expr,
        then_arm: Box<Stmt>,
        elif_arms: Vec<ElifArm>,
        else_arm: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    For {
        variable: Ident,
        lower: Expr,
        upper: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Expr(Expr),
}

#[derive(Debug, PartialEq)]
pub struct ElifArm {
    pub condition: Expr,
    pub body: Stmt,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Literal(Value),
    Name(Ident),
    Assignment {
        target: Ident,
        /// The operator of a compound assignment (`+=` and friends).
        op: Option<BinaryOperator>,
        value: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        op_span: Span,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        op_span: Span,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Paren(Box<Expr>),
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Identity,
    Negation,
    LogicalNot,
    OnesComplement,
}

impl UnaryOperator {
    pub fn from_token(kind: TokenKind) -> Option<UnaryOperator> {
        let op = match kind {
            TokenKind::Plus => UnaryOperator::Identity,
            TokenKind::Minus => UnaryOperator::Negation,
            TokenKind::Bang => UnaryOperator::LogicalNot,
            TokenKind::Tilde => UnaryOperator::OnesComplement,
            _ => return None,
        };
        Some(op)
    }

    pub fn text(self) -> &'static str {
        match self {
            UnaryOperator::Identity => "+",
            UnaryOperator::Negation => "-",
            UnaryOperator::LogicalNot => "!",
            UnaryOperator::OnesComplement => "~",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LogicalAnd,
    LogicalOr,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl BinaryOperator {
    pub fn from_token(kind: TokenKind) -> Option<BinaryOperator> {
        use BinaryOperator::*;
        let op = match kind {
            TokenKind::Plus => Add,
            TokenKind::Minus => Sub,
            TokenKind::Star => Mul,
            TokenKind::Slash => Div,
            TokenKind::Percent => Rem,
            TokenKind::Ampersand => BitwiseAnd,
            TokenKind::Pipe => BitwiseOr,
            TokenKind::Hat => BitwiseXor,
            TokenKind::AmpersandAmpersand => LogicalAnd,
            TokenKind::PipePipe => LogicalOr,
            TokenKind::EqualsEquals => Eq,
            TokenKind::BangEquals => NotEq,
            TokenKind::Less => Less,
            TokenKind::LessEquals => LessEq,
            TokenKind::Greater => Greater,
            TokenKind::GreaterEquals => GreaterEq,
            _ => return None,
        };
        Some(op)
    }

    pub fn token(self) -> TokenKind {
        use BinaryOperator::*;
        match self {
            Add => TokenKind::Plus,
            Sub => TokenKind::Minus,
            Mul => TokenKind::Star,
            Div => TokenKind::Slash,
            Rem => TokenKind::Percent,
            BitwiseAnd => TokenKind::Ampersand,
            BitwiseOr => TokenKind::Pipe,
            BitwiseXor => TokenKind::Hat,
            LogicalAnd => TokenKind::AmpersandAmpersand,
            LogicalOr => TokenKind::PipePipe,
            Eq => TokenKind::EqualsEquals,
            NotEq => TokenKind::BangEquals,
            Less => TokenKind::Less,
            LessEq => TokenKind::LessEquals,
            Greater => TokenKind::Greater,
            GreaterEq => TokenKind::GreaterEquals,
        }
    }

    pub fn text(self) -> &'static str {
        self.token().text().unwrap_or_default()
    }

    /// Left binding power, also used to parenthesize printed trees.
    pub fn precedence(self) -> u8 {
        self.token().infix_binding_power().map_or(0, |(lbp, _)| lbp)
    }
}
