//! Tokenizer for predicate sources.
//!
//! The surface syntax is a small expression subset of Python, since that is
//! what language models write when asked for a filter expression. Keywords
//! are lexed as identifiers; the parser decides what they mean.

use super::error::{CompileError, CompileResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    /// `|`; only meaningful between regex flags.
    Pipe,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
    Walrus,
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("`{s}`"),
            TokenKind::Int(i) => format!("`{i}`"),
            TokenKind::Float(x) => format!("`{x}`"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("`{}`", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::DoubleStar => "**",
            TokenKind::Slash => "/",
            TokenKind::DoubleSlash => "//",
            TokenKind::Percent => "%",
            TokenKind::Pipe => "|",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Assign => "=",
            TokenKind::Walrus => ":=",
            _ => "?",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character of the token.
    pub pos: usize,
}

pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
    Lexer {
        src: source,
        chars: source.char_indices().peekable(),
    }
    .run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> CompileResult<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_whitespace() || c == '\\' && self.continues_line(pos) {
                self.chars.next();
                continue;
            }
            if c == '#' {
                while let Some(&(_, c)) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.chars.next();
                }
                continue;
            }

            let kind = if c == '\'' || c == '"' {
                self.string(pos, false)?
            } else if c.is_ascii_digit()
                || (c == '.' && self.src[pos + 1..].starts_with(|n: char| n.is_ascii_digit()))
            {
                self.number(pos)?
            } else if c.is_alphabetic() || c == '_' {
                self.ident_or_prefixed_string(pos)?
            } else {
                self.punct(pos, c)?
            };
            tokens.push(Token { kind, pos });
        }
        tokens.push(Token {
            kind: TokenKind::Eof,
            pos: self.src.len(),
        });
        Ok(tokens)
    }

    fn continues_line(&self, pos: usize) -> bool {
        let rest = &self.src[pos + 1..];
        rest.starts_with('\n') || rest.starts_with("\r\n")
    }

    fn ident_or_prefixed_string(&mut self, start: usize) -> CompileResult<TokenKind> {
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        let word = &self.src[start..end];
        let next_is_quote = matches!(self.chars.peek(), Some(&(_, '\'')) | Some(&(_, '"')));
        let is_prefix = word.len() <= 2 && word.chars().all(|c| "rRbBfFuU".contains(c));
        if next_is_quote && is_prefix {
            if word.contains(['f', 'F']) {
                return Err(CompileError::disallowed(start, "f-strings are not supported"));
            }
            if word.contains(['b', 'B']) {
                return Err(CompileError::disallowed(start, "byte strings are not supported"));
            }
            return self.string(start, word.contains(['r', 'R']));
        }
        Ok(TokenKind::Ident(word.to_string()))
    }

    fn string(&mut self, start: usize, raw: bool) -> CompileResult<TokenKind> {
        let Some((_, quote)) = self.chars.next() else {
            return Err(CompileError::syntax(start, "expected string literal"));
        };
        let triple = {
            let (q_pos, _) = self.peek_pos();
            self.src[q_pos..].starts_with(&format!("{quote}{quote}"))
        };
        if triple {
            self.chars.next();
            self.chars.next();
        }

        let mut out = String::new();
        loop {
            let Some((i, c)) = self.chars.next() else {
                return Err(CompileError::syntax(start, "unterminated string literal"));
            };
            if c == quote {
                if !triple {
                    return Ok(TokenKind::Str(out));
                }
                if self.src[i..].starts_with(&format!("{quote}{quote}{quote}")) {
                    self.chars.next();
                    self.chars.next();
                    return Ok(TokenKind::Str(out));
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(CompileError::syntax(start, "unterminated string literal"));
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let Some((esc_pos, esc)) = self.chars.next() else {
                return Err(CompileError::syntax(start, "unterminated string literal"));
            };
            if raw {
                out.push('\\');
                out.push(esc);
                continue;
            }
            match esc {
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                '"' => out.push('"'),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                'a' => out.push('\u{07}'),
                'b' => out.push('\u{08}'),
                'f' => out.push('\u{0C}'),
                'v' => out.push('\u{0B}'),
                '\n' => {}
                'x' => out.push(self.hex_escape(esc_pos, 2)?),
                'u' => out.push(self.hex_escape(esc_pos, 4)?),
                'U' => out.push(self.hex_escape(esc_pos, 8)?),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    fn hex_escape(&mut self, pos: usize, digits: usize) -> CompileResult<char> {
        let mut value: u32 = 0;
        for _ in 0..digits {
            let digit = self
                .chars
                .next()
                .and_then(|(_, c)| c.to_digit(16))
                .ok_or_else(|| CompileError::syntax(pos, "truncated escape sequence"))?;
            value = value * 16 + digit;
        }
        char::from_u32(value).ok_or_else(|| CompileError::syntax(pos, "invalid code point"))
    }

    fn peek_pos(&mut self) -> (usize, Option<char>) {
        match self.chars.peek() {
            Some(&(i, c)) => (i, Some(c)),
            None => (self.src.len(), None),
        }
    }

    fn number(&mut self, start: usize) -> CompileResult<TokenKind> {
        let rest = &self.src[start..];
        let radix = match rest.get(..2) {
            Some("0x") | Some("0X") => Some(16),
            Some("0o") | Some("0O") => Some(8),
            Some("0b") | Some("0B") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            self.chars.next();
            self.chars.next();
            let digits = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
            let clean: String = digits.chars().filter(|&c| c != '_').collect();
            return i64::from_str_radix(&clean, radix)
                .map(TokenKind::Int)
                .map_err(|_| CompileError::syntax(start, "invalid integer literal"));
        }

        let mut text = String::new();
        let mut is_float = false;
        while let Some(&(_, c)) = self.chars.peek() {
            match c {
                '0'..='9' => text.push(c),
                '_' => {}
                '.' if !is_float => {
                    is_float = true;
                    text.push(c);
                }
                'e' | 'E' => {
                    is_float = true;
                    text.push(c);
                    self.chars.next();
                    if let Some(&(_, sign @ ('+' | '-'))) = self.chars.peek() {
                        text.push(sign);
                        self.chars.next();
                    }
                    continue;
                }
                _ => break,
            }
            self.chars.next();
        }
        if let Some(&(pos, c)) = self.chars.peek() {
            if c.is_alphabetic() || c == '_' {
                return Err(CompileError::syntax(pos, "invalid numeric literal"));
            }
        }
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| CompileError::syntax(start, "invalid float literal"))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| CompileError::syntax(start, "integer literal out of range"))
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.chars.next();
        }
        out
    }

    fn punct(&mut self, pos: usize, c: char) -> CompileResult<TokenKind> {
        self.chars.next();
        let next = self.chars.peek().map(|&(_, n)| n);
        let two = |kind: TokenKind, chars: &mut std::iter::Peekable<std::str::CharIndices<'a>>| {
            chars.next();
            kind
        };
        let kind = match (c, next) {
            ('*', Some('*')) => two(TokenKind::DoubleStar, &mut self.chars),
            ('/', Some('/')) => two(TokenKind::DoubleSlash, &mut self.chars),
            ('=', Some('=')) => two(TokenKind::EqEq, &mut self.chars),
            ('!', Some('=')) => two(TokenKind::NotEq, &mut self.chars),
            ('<', Some('=')) => two(TokenKind::Le, &mut self.chars),
            ('>', Some('=')) => two(TokenKind::Ge, &mut self.chars),
            (':', Some('=')) => two(TokenKind::Walrus, &mut self.chars),
            ('(', _) => TokenKind::LParen,
            (')', _) => TokenKind::RParen,
            ('[', _) => TokenKind::LBracket,
            (']', _) => TokenKind::RBracket,
            ('{', _) => TokenKind::LBrace,
            ('}', _) => TokenKind::RBrace,
            (',', _) => TokenKind::Comma,
            (':', _) => TokenKind::Colon,
            ('.', _) => TokenKind::Dot,
            ('+', _) => TokenKind::Plus,
            ('-', _) => TokenKind::Minus,
            ('*', _) => TokenKind::Star,
            ('/', _) => TokenKind::Slash,
            ('%', _) => TokenKind::Percent,
            ('|', _) => TokenKind::Pipe,
            ('<', _) => TokenKind::Lt,
            ('>', _) => TokenKind::Gt,
            ('=', _) => TokenKind::Assign,
            (other, _) => {
                return Err(CompileError::syntax(
                    pos,
                    format!("unexpected character `{other}`"),
                ))
            }
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_comparison() {
        assert_eq!(
            kinds("len(content) == 0"),
            vec![
                TokenKind::Ident("len".into()),
                TokenKind::LParen,
                TokenKind::Ident("content".into()),
                TokenKind::RParen,
                TokenKind::EqEq,
                TokenKind::Int(0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_escapes_and_raw_strings() {
        assert_eq!(kinds(r#"'a\tb'"#)[0], TokenKind::Str("a\tb".into()));
        assert_eq!(kinds(r#"r'\d+'"#)[0], TokenKind::Str("\\d+".into()));
        assert_eq!(kinds(r#""\u200b""#)[0], TokenKind::Str("\u{200b}".into()));
    }

    #[test]
    fn lexes_pipe_between_flags() {
        assert_eq!(
            kinds("re.I|re.M")[3..5],
            [TokenKind::Pipe, TokenKind::Ident("re".into())]
        );
    }

    #[test]
    fn lexes_numbers() {
        assert_eq!(kinds("1_000")[0], TokenKind::Int(1000));
        assert_eq!(kinds("0x1F")[0], TokenKind::Int(31));
        assert_eq!(kinds("2.5e3")[0], TokenKind::Float(2500.0));
        assert_eq!(kinds(".5")[0], TokenKind::Float(0.5));
    }

    #[test]
    fn positions_are_byte_offsets() {
        let toks = tokenize("é == name").unwrap();
        // `é` is an identifier character, two bytes wide.
        assert_eq!(toks[1].pos, 3);
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = tokenize("'abc").unwrap_err();
        assert_eq!(err.kind, super::super::CompileErrorKind::SyntaxError);
    }

    #[test]
    fn rejects_f_strings() {
        let err = tokenize("f'{name}'").unwrap_err();
        assert_eq!(err.kind, super::super::CompileErrorKind::DisallowedConstruct);
    }

    #[test]
    fn skips_comments() {
        assert_eq!(kinds("name # trailing"), vec![TokenKind::Ident("name".into()), TokenKind::Eof]);
    }
}
