use std::{fmt, sync::Arc};

use crate::{
    symbols::Type,
    text::{SourceText, Span, TextLocation},
    token::TokenKind,
};

/// Every non-fatal problem the front end can find in a program.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    // Lexical
    #[error("bad character input: '{0}'")]
    BadCharacter(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("the number {text} is not a valid {ty}")]
    InvalidNumber { text: Box<str>, ty: Type },

    // Syntax
    #[error("unexpected token <{actual:?}>, expected <{expected:?}>")]
    UnexpectedToken {
        actual: TokenKind,
        expected: TokenKind,
    },

    // Binding
    #[error("variable '{0}' does not exist")]
    UndefinedVariable(Box<str>),
    #[error("function '{0}' doesn't exist")]
    UndefinedFunction(Box<str>),
    #[error("type '{0}' doesn't exist")]
    UndefinedType(Box<str>),
    #[error("'{0}' is not a variable")]
    NotAVariable(Box<str>),
    #[error("'{0}' is not a function")]
    NotAFunction(Box<str>),
    #[error("variable '{0}' is already declared")]
    VariableAlreadyDeclared(Box<str>),
    #[error("'{0}' is already declared")]
    SymbolAlreadyDeclared(Box<str>),
    #[error("a parameter with the name '{0}' already exists")]
    ParameterAlreadyDeclared(Box<str>),
    #[error("variable '{0}' is read-only and cannot be assigned to")]
    CannotAssign(Box<str>),
    #[error("unary operator '{op}' is not defined for type '{operand}'")]
    UndefinedUnaryOperator { op: &'static str, operand: Type },
    #[error("binary operator '{op}' is not defined for types '{left}' and '{right}'")]
    UndefinedBinaryOperator {
        op: &'static str,
        left: Type,
        right: Type,
    },
    #[error("cannot convert type '{from}' to '{to}'")]
    CannotConvert { from: Type, to: Type },
    #[error(
        "cannot convert type '{from}' to '{to}'. An explicit conversion exists (are you missing a cast?)"
    )]
    CannotConvertImplicitly { from: Type, to: Type },
    #[error("function '{name}' requires {expected} arguments but was given {actual}")]
    WrongArgumentCount {
        name: Box<str>,
        expected: usize,
        actual: usize,
    },
    #[error("expression must have a value")]
    ExpressionMustHaveValue,
    #[error("the keyword '{0}' can only be used inside of loops")]
    InvalidBreakOrContinue(&'static str),
    #[error("the 'return' keyword can only be used inside of functions")]
    InvalidReturn,
    #[error(
        "since the function '{0}' does not return a value the 'return' keyword cannot be followed by an expression"
    )]
    InvalidReturnExpression(Box<str>),
    #[error("an expression of type '{0}' expected")]
    MissingReturnExpression(Type),
    #[error("not all code paths return a value")]
    AllPathsMustReturn,
    #[error("only assignment and call expressions can be used as a statement")]
    InvalidExpressionStatement,
    #[error("at most one file can have global statements")]
    OnlyOneFileCanHaveGlobalStatements,
    #[error("main must not take arguments and not return anything")]
    MainMustHaveCorrectSignature,
    #[error("cannot declare main function when global statements are used")]
    CannotMixMainAndGlobalStatements,
}

/// A located [`Error`].
///
/// The plain [`Display`](fmt::Display) output is the message alone; the
/// alternate form (`{:#}`) prefixes it with the byte span.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub span: Span,
    pub error: Error,
    pub source: Option<Arc<SourceText>>,
}

impl Diagnostic {
    /// The one-based line/column location, if the diagnostic knows its source.
    pub fn location(&self) -> Option<TextLocation> {
        self.source.as_ref().map(|s| s.location(self.span))
    }
}

impl PartialEq for Diagnostic {
    fn eq(&self, other: &Self) -> bool {
        self.span == other.span
            && self.error == other.error
            && match (&self.source, &other.source) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}: ", self.span)?;
        }
        write!(f, "{}", self.error)
    }
}

/// Accumulates diagnostics reported against one source text.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    source: Option<Arc<SourceText>>,
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> DiagnosticBag {
        DiagnosticBag::default()
    }

    pub fn for_source(source: Arc<SourceText>) -> DiagnosticBag {
        DiagnosticBag {
            source: Some(source),
            diagnostics: Vec::new(),
        }
    }

    /// Changes the source text attached to subsequent reports.
    pub fn set_source(&mut self, source: Option<Arc<SourceText>>) {
        self.source = source;
    }

    pub fn report(&mut self, span: Span, error: Error) {
        self.diagnostics.push(Diagnostic {
            span,
            error,
            source: self.source.clone(),
        });
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_formatting() {
        let source = Arc::new(SourceText::new("let a = 1\nlet a = 2"));
        let mut bag = DiagnosticBag::for_source(source);
        bag.report(
            Span::new_of_bounds(14..15),
            Error::VariableAlreadyDeclared("a".into()),
        );
        let diagnostics = bag.into_vec();
        let d = &diagnostics[0];
        assert_eq!(d.to_string(), "variable 'a' is already declared");
        assert_eq!(format!("{d:#}"), "14..15: variable 'a' is already declared");
        assert_eq!(d.location().map(|l| l.to_string()), Some("2:5".to_owned()));
    }

    #[test]
    fn test_conversion_messages() {
        let e = Error::CannotConvertImplicitly {
            from: Type::Int,
            to: Type::String,
        };
        assert!(e.to_string().starts_with("cannot convert type 'int' to 'string'."));
        let e = Error::UnexpectedToken {
            actual: TokenKind::Eof,
            expected: TokenKind::RParen,
        };
        assert_eq!(e.to_string(), "unexpected token <Eof>, expected <RParen>");
    }
}
