use std::fmt;

use crate::{text::Span, value::Value};

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Source text of the token. Empty for synthesized (missing) tokens.
    pub text: Box<str>,
    /// Decoded literal value, for number, string and boolean tokens.
    pub value: Option<Value>,
    /// Whether the parser synthesized this token to recover from an error.
    pub is_missing: bool,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, text: impl Into<Box<str>>) -> Token {
        Token {
            kind,
            span,
            text: text.into(),
            value: None,
            is_missing: false,
        }
    }

    pub fn with_value(mut self, value: Value) -> Token {
        self.value = Some(value);
        self
    }

    /// A zero-width token of the provided kind, used for error recovery.
    pub fn missing(kind: TokenKind, lo: usize) -> Token {
        Token {
            kind,
            span: Span::new_of_length(lo, 0),
            text: Box::from(""),
            value: None,
            is_missing: true,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {}", self.kind, self.span)?;
        if let Some(value) = &self.value {
            write!(f, ", {value:?}")?;
        }
        if self.is_missing {
            write!(f, ", missing")?;
        }
        write!(f, ")")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Let,
    True,
    False,
    If,
    Elif,
    Else,
    While,
    For,
    To,
    Break,
    Continue,
    Return,
    Function,
    /// Reserved for embedded templates; never valid in a program.
    Script,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Tilde,
    Hat,
    Ampersand,
    AmpersandAmpersand,
    Pipe,
    PipePipe,
    Equals,
    EqualsEquals,
    BangEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    PlusEquals,
    MinusEquals,
    StarEquals,
    SlashEquals,
    HatEquals,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Colon,
    Comma,
    Semicolon,

    Identifier,
    Number,
    String,

    Whitespace,
    LineComment,
    BlockComment,
    Bad,
    Eof,
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "let" => TokenKind::Let,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "if" => TokenKind::If,
    "elif" => TokenKind::Elif,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "for" => TokenKind::For,
    "to" => TokenKind::To,
    "break" => TokenKind::Break,
    "continue" => TokenKind::Continue,
    "return" => TokenKind::Return,
    "function" => TokenKind::Function,
    "script" => TokenKind::Script,
};

impl TokenKind {
    /// Whitespace and comments, which the parser never sees.
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    pub fn is_keyword(self) -> bool {
        KEYWORDS.values().any(|&k| k == self)
    }

    /// The canonical text of fixed-form tokens.
    pub fn text(self) -> Option<&'static str> {
        use TokenKind::*;
        let text = match self {
            Let => "let",
            True => "true",
            False => "false",
            If => "if",
            Elif => "elif",
            Else => "else",
            While => "while",
            For => "for",
            To => "to",
            Break => "break",
            Continue => "continue",
            Return => "return",
            Function => "function",
            Script => "script",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Bang => "!",
            Tilde => "~",
            Hat => "^",
            Ampersand => "&",
            AmpersandAmpersand => "&&",
            Pipe => "|",
            PipePipe => "||",
            Equals => "=",
            EqualsEquals => "==",
            BangEquals => "!=",
            Less => "<",
            LessEquals => "<=",
            Greater => ">",
            GreaterEquals => ">=",
            PlusEquals => "+=",
            MinusEquals => "-=",
            StarEquals => "*=",
            SlashEquals => "/=",
            HatEquals => "^=",
            LParen => "(",
            RParen => ")",
            LBrace => "{",
            RBrace => "}",
            Colon => ":",
            Comma => ",",
            Semicolon => ";",
            Identifier | Number | String | Whitespace | LineComment | BlockComment | Bad
            | Eof => return None,
        };
        Some(text)
    }

    /// Binding power of the token when used as a prefix operator.
    pub fn prefix_binding_power(self) -> Option<u8> {
        match self {
            TokenKind::Plus | TokenKind::Minus | TokenKind::Bang | TokenKind::Tilde => Some(13),
            _ => None,
        }
    }

    /// Left and right binding powers of the token when used as a binary
    /// operator. All binary operators are left-associative.
    pub fn infix_binding_power(self) -> Option<(u8, u8)> {
        use TokenKind::*;
        let bp = match self {
            Star | Slash | Percent => (11, 12),
            Plus | Minus => (9, 10),
            EqualsEquals | BangEquals | Less | LessEquals | Greater | GreaterEquals => (7, 8),
            Ampersand | AmpersandAmpersand => (5, 6),
            Pipe | PipePipe | Hat => (3, 4),
            _ => return None,
        };
        Some(bp)
    }

    /// For assignment tokens, the binary operator applied before storing.
    /// Plain `=` maps to `None`.
    pub fn compound_operator(self) -> Option<TokenKind> {
        match self {
            TokenKind::PlusEquals => Some(TokenKind::Plus),
            TokenKind::MinusEquals => Some(TokenKind::Minus),
            TokenKind::StarEquals => Some(TokenKind::Star),
            TokenKind::SlashEquals => Some(TokenKind::Slash),
            TokenKind::HatEquals => Some(TokenKind::Hat),
            _ => None,
        }
    }

    pub fn is_assignment(self) -> bool {
        self == TokenKind::Equals || self.compound_operator().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_have_canonical_text() {
        for (name, kind) in &KEYWORDS {
            assert_eq!(kind.text(), Some(*name));
            assert!(kind.is_keyword());
        }
        assert!(!TokenKind::Identifier.is_keyword());
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(TokenKind::PlusEquals.compound_operator(), Some(TokenKind::Plus));
        assert_eq!(TokenKind::HatEquals.compound_operator(), Some(TokenKind::Hat));
        assert_eq!(TokenKind::Equals.compound_operator(), None);
        assert!(TokenKind::Equals.is_assignment());
        assert!(TokenKind::SlashEquals.is_assignment());
        assert!(!TokenKind::EqualsEquals.is_assignment());
    }
}
