use crate::ast::Range;
use crate::syntax::errors::SyntaxError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int { value: i128, long: bool, raw: String },
    Float { value: f64, double: bool, raw: String },
    Str(String),
    Char(char),
    True,
    False,
    Null,
    Import,
    Static,
    Return,
    If,
    Else,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,
    ColonColon,
    Colon,
    Arrow,
    Question,
    Bang,
    Tilde,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    BangEq,
    AndAnd,
    OrOr,
    Assign,
    PlusAssign,
    MinusAssign,
    PlusPlus,
    MinusMinus,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Ident(name) => return write!(f, "identifier '{name}'"),
            TokenKind::Int { raw, .. } | TokenKind::Float { raw, .. } => {
                return write!(f, "number '{raw}'")
            }
            TokenKind::Str(_) => "string literal",
            TokenKind::Char(_) => "char literal",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Null => "'null'",
            TokenKind::Import => "'import'",
            TokenKind::Static => "'static'",
            TokenKind::Return => "'return'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Dot => "'.'",
            TokenKind::ColonColon => "'::'",
            TokenKind::Colon => "':'",
            TokenKind::Arrow => "'->'",
            TokenKind::Question => "'?'",
            TokenKind::Bang => "'!'",
            TokenKind::Tilde => "'~'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Le => "'<='",
            TokenKind::Ge => "'>='",
            TokenKind::EqEq => "'=='",
            TokenKind::BangEq => "'!='",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Assign => "'='",
            TokenKind::PlusAssign => "'+='",
            TokenKind::MinusAssign => "'-='",
            TokenKind::PlusPlus => "'++'",
            TokenKind::MinusMinus => "'--'",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// Tokenize `source`. The returned vector always ends with [`TokenKind::Eof`].
pub fn lex(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer {
        source,
        bytes: source.as_bytes(),
        cursor: 0,
        tokens: Vec::new(),
    };
    lexer.lex_all()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    cursor: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn lex_all(&mut self) -> Result<(), SyntaxError> {
        loop {
            self.skip_trivia()?;
            let start = self.cursor;
            let Some(ch) = self.peek_char() else {
                self.push(TokenKind::Eof, start);
                return Ok(());
            };

            if ch.is_alphabetic() || ch == '_' || ch == '$' {
                self.lex_word(start);
                continue;
            }
            if ch.is_ascii_digit() {
                self.lex_number(start)?;
                continue;
            }
            match ch {
                '"' => self.lex_string(start)?,
                '\'' => self.lex_char(start)?,
                _ => self.lex_punct(start, ch)?,
            }
        }
    }

    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.peek_char() {
                Some(ch) if ch.is_whitespace() => self.cursor += ch.len_utf8(),
                Some('/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(ch) = self.peek_char() {
                        if ch == '\n' {
                            break;
                        }
                        self.cursor += ch.len_utf8();
                    }
                }
                Some('/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.cursor;
                    self.cursor += 2;
                    loop {
                        if self.cursor >= self.bytes.len() {
                            return Err(SyntaxError::Unterminated {
                                what: "block comment",
                                offset: start,
                            });
                        }
                        if self.bytes[self.cursor] == b'*' && self.peek_at(1) == Some(b'/') {
                            self.cursor += 2;
                            break;
                        }
                        self.cursor += 1;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_word(&mut self, start: usize) {
        while let Some(ch) = self.peek_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                self.cursor += ch.len_utf8();
            } else {
                break;
            }
        }
        let word = &self.source[start..self.cursor];
        let kind = match word {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "import" => TokenKind::Import,
            "static" => TokenKind::Static,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            _ => TokenKind::Ident(word.to_string()),
        };
        self.push(kind, start);
    }

    fn lex_number(&mut self, start: usize) -> Result<(), SyntaxError> {
        let hex = self.bytes[self.cursor] == b'0'
            && matches!(self.peek_at(1), Some(b'x') | Some(b'X'));
        if hex {
            self.cursor += 2;
            while self.cursor < self.bytes.len()
                && (self.bytes[self.cursor].is_ascii_hexdigit() || self.bytes[self.cursor] == b'_')
            {
                self.cursor += 1;
            }
        } else {
            self.eat_digits();
        }

        let mut is_float = false;
        if !hex
            && self.peek_at(0) == Some(b'.')
            && self.peek_at(1).is_some_and(|b| b.is_ascii_digit())
        {
            is_float = true;
            self.cursor += 1;
            self.eat_digits();
        }

        let digits_end = self.cursor;
        let suffix = self.peek_at(0).map(|b| b.to_ascii_lowercase());
        let (long, double_suffix, float_suffix) = match suffix {
            Some(b'l') => (true, false, false),
            Some(b'd') if !hex => (false, true, false),
            Some(b'f') if !hex => (false, false, true),
            _ => (false, false, false),
        };
        if long || double_suffix || float_suffix {
            self.cursor += 1;
        }

        let raw = self.source[start..self.cursor].to_string();
        let digits: String = self.source[start..digits_end]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        let invalid = || SyntaxError::InvalidNumber {
            text: raw.clone(),
            offset: start,
        };

        let kind = if is_float || double_suffix || float_suffix {
            let value: f64 = digits.parse().map_err(|_| invalid())?;
            TokenKind::Float {
                value,
                double: !float_suffix,
                raw: raw.clone(),
            }
        } else {
            let value = if hex {
                i128::from_str_radix(&digits[2..], 16).map_err(|_| invalid())?
            } else {
                digits.parse::<i128>().map_err(|_| invalid())?
            };
            TokenKind::Int {
                value,
                long,
                raw: raw.clone(),
            }
        };
        self.push(kind, start);
        Ok(())
    }

    fn eat_digits(&mut self) {
        while self.cursor < self.bytes.len()
            && (self.bytes[self.cursor].is_ascii_digit() || self.bytes[self.cursor] == b'_')
        {
            self.cursor += 1;
        }
    }

    fn lex_string(&mut self, start: usize) -> Result<(), SyntaxError> {
        self.cursor += 1;
        let mut value = String::new();
        loop {
            let Some(ch) = self.peek_char() else {
                return Err(SyntaxError::Unterminated {
                    what: "string literal",
                    offset: start,
                });
            };
            self.cursor += ch.len_utf8();
            match ch {
                '"' => break,
                '\\' => value.push(self.lex_escape(start)?),
                '\n' => {
                    return Err(SyntaxError::Unterminated {
                        what: "string literal",
                        offset: start,
                    })
                }
                other => value.push(other),
            }
        }
        self.push(TokenKind::Str(value), start);
        Ok(())
    }

    fn lex_char(&mut self, start: usize) -> Result<(), SyntaxError> {
        self.cursor += 1;
        let ch = match self.peek_char() {
            Some('\\') => {
                self.cursor += 1;
                self.lex_escape(start)?
            }
            Some(ch) if ch != '\'' => {
                self.cursor += ch.len_utf8();
                ch
            }
            _ => {
                return Err(SyntaxError::Unterminated {
                    what: "char literal",
                    offset: start,
                })
            }
        };
        if self.peek_char() != Some('\'') {
            return Err(SyntaxError::Unterminated {
                what: "char literal",
                offset: start,
            });
        }
        self.cursor += 1;
        self.push(TokenKind::Char(ch), start);
        Ok(())
    }

    fn lex_escape(&mut self, start: usize) -> Result<char, SyntaxError> {
        let Some(ch) = self.peek_char() else {
            return Err(SyntaxError::Unterminated {
                what: "escape sequence",
                offset: start,
            });
        };
        self.cursor += ch.len_utf8();
        Ok(match ch {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            other => other,
        })
    }

    fn lex_punct(&mut self, start: usize, ch: char) -> Result<(), SyntaxError> {
        let next = self.peek_at(1);
        let (kind, len) = match (ch, next) {
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            (',', _) => (TokenKind::Comma, 1),
            (';', _) => (TokenKind::Semicolon, 1),
            ('.', _) => (TokenKind::Dot, 1),
            (':', Some(b':')) => (TokenKind::ColonColon, 2),
            (':', _) => (TokenKind::Colon, 1),
            ('?', _) => (TokenKind::Question, 1),
            ('~', _) => (TokenKind::Tilde, 1),
            ('!', Some(b'=')) => (TokenKind::BangEq, 2),
            ('!', _) => (TokenKind::Bang, 1),
            ('-', Some(b'>')) => (TokenKind::Arrow, 2),
            ('-', Some(b'-')) => (TokenKind::MinusMinus, 2),
            ('-', Some(b'=')) => (TokenKind::MinusAssign, 2),
            ('-', _) => (TokenKind::Minus, 1),
            ('+', Some(b'+')) => (TokenKind::PlusPlus, 2),
            ('+', Some(b'=')) => (TokenKind::PlusAssign, 2),
            ('+', _) => (TokenKind::Plus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('<', Some(b'=')) => (TokenKind::Le, 2),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', Some(b'=')) => (TokenKind::Ge, 2),
            ('>', _) => (TokenKind::Gt, 1),
            ('=', Some(b'=')) => (TokenKind::EqEq, 2),
            ('=', _) => (TokenKind::Assign, 1),
            ('&', Some(b'&')) => (TokenKind::AndAnd, 2),
            ('|', Some(b'|')) => (TokenKind::OrOr, 2),
            _ => return Err(SyntaxError::UnexpectedChar { ch, offset: start }),
        };
        self.cursor += len;
        self.push(kind, start);
        Ok(())
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            range: Range::new(start, self.cursor),
        });
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.cursor..].chars().next()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.cursor + ahead).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_method_reference_and_lambda() {
        assert_eq!(
            kinds("Optional::get x -> x"),
            vec![
                TokenKind::Ident("Optional".into()),
                TokenKind::ColonColon,
                TokenKind::Ident("get".into()),
                TokenKind::Ident("x".into()),
                TokenKind::Arrow,
                TokenKind::Ident("x".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_numeric_suffixes() {
        let tokens = kinds("0 0L 0x1F 1.5 2d");
        assert!(matches!(tokens[0], TokenKind::Int { value: 0, long: false, .. }));
        assert!(matches!(tokens[1], TokenKind::Int { value: 0, long: true, .. }));
        assert!(matches!(tokens[2], TokenKind::Int { value: 31, .. }));
        assert!(matches!(tokens[3], TokenKind::Float { .. }));
        assert!(matches!(tokens[4], TokenKind::Float { double: true, .. }));
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            kinds("a // trailing\n /* block */ b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ident("b".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""can\"t""#)[0],
            TokenKind::Str("can\"t".to_string())
        );
    }

    #[test]
    fn token_ranges_are_byte_offsets() {
        let tokens = lex("ab  == c").unwrap();
        assert_eq!(tokens[1].range, Range::new(4, 6));
    }

    #[test]
    fn rejects_stray_characters() {
        assert!(matches!(
            lex("a # b"),
            Err(SyntaxError::UnexpectedChar { ch: '#', offset: 2 })
        ));
    }

    #[test]
    fn unterminated_string_is_reported() {
        assert!(matches!(
            lex("\"abc"),
            Err(SyntaxError::Unterminated { offset: 0, .. })
        ));
    }
}
