use std::{iter::Peekable, sync::Arc};

use crate::{
    diagnostic::{DiagnosticBag, Error},
    symbols::Type,
    text::{SourceText, Span},
    token::{Token, TokenKind, KEYWORDS},
    util::BreakableIteratorExt,
    value::Value,
};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 1_024;

/// Lexes the whole source, trivia and bad tokens included, writing the tokens
/// into the provided buffer. The last token is always [`TokenKind::Eof`].
pub fn lex(source: &Arc<SourceText>, tokens: &mut Vec<Token>) -> DiagnosticBag {
    let mut lexer = Lexer::new(source);
    tokens.extend(std::iter::from_fn(|| Some(lexer.next_token())).up_to(Token::is_eof));
    lexer.into_diagnostics()
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(source: &Arc<SourceText>) -> (Vec<Token>, DiagnosticBag) {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    let diagnostics = lex(source, &mut tokens);
    (tokens, diagnostics)
}

/// The ProLang lexer. Produces one token per [`Lexer::next_token`] call.
pub struct Lexer<'src> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    diagnostics: DiagnosticBag,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src Arc<SourceText>) -> Lexer<'src> {
        let src = source.as_str();
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            diagnostics: DiagnosticBag::for_source(Arc::clone(source)),
        }
    }

    /// Scans the next token. Once the input is exhausted, every call returns
    /// an end-of-file token.
    pub fn next_token(&mut self) -> Token {
        let kind = self.scan_token_kind();
        self.produce(kind)
    }

    pub fn into_diagnostics(self) -> DiagnosticBag {
        self.diagnostics
    }

    fn scan_token_kind(&mut self) -> TokenKind {
        use TokenKind::*;
        self.current_lo = self.cursor;
        let Some(c) = self.advance() else {
            return Eof;
        };
        match c {
            '+' => self.or_equals(Plus, PlusEquals),
            '-' => self.or_equals(Minus, MinusEquals),
            '*' => self.or_equals(Star, StarEquals),
            '/' => match self.peek() {
                Some('/') => self.line_comment(),
                Some('*') => self.block_comment(),
                _ => self.or_equals(Slash, SlashEquals),
            },
            '%' => Percent,
            '^' => self.or_equals(Hat, HatEquals),
            '~' => Tilde,
            '!' => self.or_equals(Bang, BangEquals),
            '=' => self.or_equals(Equals, EqualsEquals),
            '<' => self.or_equals(Less, LessEquals),
            '>' => self.or_equals(Greater, GreaterEquals),
            '&' => match self.peek() {
                Some('&') => self.advance_with(AmpersandAmpersand),
                _ => Ampersand,
            },
            '|' => match self.peek() {
                Some('|') => self.advance_with(PipePipe),
                _ => Pipe,
            },
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            ':' => Colon,
            ',' => Comma,
            ';' => Semicolon,
            '"' => self.string(),
            c if c.is_alphabetic() || c == '_' => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_whitespace() => self.whitespace(),
            c => {
                self.diagnostics.report(self.span(), Error::BadCharacter(c));
                Bad
            }
        }
    }

    fn or_equals(&mut self, single: TokenKind, with_equals: TokenKind) -> TokenKind {
        match self.peek() {
            Some('=') => self.advance_with(with_equals),
            _ => single,
        }
    }

    /// Scans a string literal. A doubled quote stands for one quote character.
    /// The literal may not span lines.
    fn string(&mut self) -> TokenKind {
        loop {
            match self.peek() {
                None | Some('\n' | '\r') => {
                    let quote = Span::new_of_length(self.current_lo, 1);
                    self.diagnostics.report(quote, Error::UnterminatedString);
                    break;
                }
                Some('"') => {
                    self.advance();
                    if self.peek() == Some('"') {
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        TokenKind::String
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        TokenKind::Number
    }

    fn whitespace(&mut self) -> TokenKind {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
        TokenKind::Whitespace
    }

    fn line_comment(&mut self) -> TokenKind {
        while !matches!(self.peek(), Some('\n' | '\r') | None) {
            self.advance();
        }
        TokenKind::LineComment
    }

    fn block_comment(&mut self) -> TokenKind {
        self.advance(); // '*'
        loop {
            match self.advance() {
                Some('*') => {
                    if self.peek() == Some('/') {
                        self.advance();
                        break;
                    }
                }
                Some(_) => continue,
                None => {
                    self.diagnostics
                        .report(self.span(), Error::UnterminatedComment);
                    break;
                }
            }
        }
        TokenKind::BlockComment
    }
}

impl<'src> Lexer<'src> {
    /// Returns the next char and advances the iterator.
    fn advance(&mut self) -> Option<char> {
        self.iter
            .next()
            .inspect(|c| self.cursor += c.len_utf8())
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next char without advancing the iterator.
    fn peek(&mut self) -> Option<char> {
        self.iter.peek().copied()
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &'src str {
        self.span().substr(self.src)
    }

    /// Builds the token of the marked bounds, decoding literal values.
    fn produce(&mut self, kind: TokenKind) -> Token {
        let span = self.span();
        let text = self.substr();
        match kind {
            TokenKind::Number => {
                let value = text.parse::<i64>().unwrap_or_else(|_| {
                    self.diagnostics.report(
                        span,
                        Error::InvalidNumber {
                            text: text.into(),
                            ty: Type::Int,
                        },
                    );
                    0
                });
                Token::new(kind, span, text).with_value(Value::Int(value))
            }
            TokenKind::String => {
                let value = extract::string(text);
                Token::new(kind, span, text).with_value(Value::Str(value))
            }
            TokenKind::True => Token::new(kind, span, "true").with_value(Value::Bool(true)),
            TokenKind::False => Token::new(kind, span, "false").with_value(Value::Bool(false)),
            kind => match kind.text() {
                Some(canonical) => Token::new(kind, span, canonical),
                None => Token::new(kind, span, text),
            },
        }
    }
}

pub mod extract {
    /// Decodes the raw text of a string token, removing the delimiting quotes
    /// and collapsing doubled quotes. Tolerates a missing closing quote.
    pub fn string(raw: &str) -> String {
        let inner = raw.strip_prefix('"').unwrap_or(raw);
        let inner = match inner.strip_suffix('"') {
            // `""` inside the literal is an escaped quote, not the terminator.
            Some(stripped) if !ends_in_escaped_quote(inner) => stripped,
            _ => inner,
        };
        inner.replace("\"\"", "\"")
    }

    fn ends_in_escaped_quote(inner: &str) -> bool {
        let trailing = inner.chars().rev().take_while(|&c| c == '"').count();
        trailing % 2 == 0
    }
}
