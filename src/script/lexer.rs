// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Script lexer

use super::error::{ScriptError, ScriptErrorKind, ScriptResult};
use super::token::{Span, StrPart, Token, TokenKind};

/// Tokenize a whole script, ending with an `Eof` token
pub fn tokenize(source: &str) -> ScriptResult<Vec<Token>> {
    Lexer::new(source).tokenize()
}

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub fn tokenize(mut self) -> ScriptResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) -> ScriptResult<()> {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match self.bump() {
                            None => {
                                return Err(ScriptError::new(
                                    ScriptErrorKind::UnterminatedComment,
                                    Span::new(start, 2),
                                ))
                            }
                            Some('*') if self.eat('/') => break,
                            Some(_) => {}
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> ScriptResult<Token> {
        self.skip_trivia()?;
        let start = self.pos;

        let Some(c) = self.bump() else {
            return Ok(Token::new(TokenKind::Eof, Span::new(start, 0)));
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' if self.eat('=') => TokenKind::Eq,
            '=' => TokenKind::Assign,
            '!' if self.eat('=') => TokenKind::NotEq,
            '!' => TokenKind::Bang,
            '<' if self.eat('=') => TokenKind::LtEq,
            '<' => TokenKind::Lt,
            '>' if self.eat('=') => TokenKind::GtEq,
            '>' => TokenKind::Gt,
            '&' if self.eat('&') => TokenKind::AndAnd,
            '|' if self.eat('|') => TokenKind::OrOr,
            '"' => return self.string(start),
            c if c.is_ascii_digit() => return self.number(start),
            c if c.is_alphabetic() || c == '_' => return Ok(self.identifier(start)),
            other => {
                return Err(ScriptError::new(
                    ScriptErrorKind::UnexpectedChar(other),
                    Span::new(start, other.len_utf8()),
                ))
            }
        };

        Ok(Token::new(kind, Span::new(start, self.pos - start)))
    }

    fn identifier(&mut self, start: usize) -> Token {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.src[start..self.pos];
        let kind = TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()));
        Token::new(kind, Span::new(start, self.pos - start))
    }

    fn number(&mut self, start: usize) -> ScriptResult<Token> {
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.bump();
            } else if c == '.'
                && !is_float
                && self.peek_second().is_some_and(|n| n.is_ascii_digit())
            {
                is_float = true;
                self.bump();
            } else {
                break;
            }
        }
        // `12abc` is one malformed token, not a number followed by a name
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() {
                self.bump();
            } else {
                break;
            }
        }

        let text = &self.src[start..self.pos];
        let span = Span::new(start, self.pos - start);
        let digits: String = text.chars().filter(|c| *c != '_').collect();
        let malformed = || ScriptError::new(ScriptErrorKind::InvalidNumber(text.to_string()), span);

        let kind = if is_float {
            TokenKind::Float(digits.parse().map_err(|_| malformed())?)
        } else {
            TokenKind::Int(digits.parse().map_err(|_| malformed())?)
        };
        Ok(Token::new(kind, span))
    }

    fn string(&mut self, start: usize) -> ScriptResult<Token> {
        let mut parts = Vec::new();
        let mut lit = String::new();

        loop {
            let Some(c) = self.bump() else {
                return Err(ScriptError::new(
                    ScriptErrorKind::UnterminatedString,
                    Span::new(start, 1),
                ));
            };
            match c {
                '"' => break,
                '\\' => {
                    let escape_start = self.pos - 1;
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some('$') => '$',
                        Some(other) => {
                            return Err(ScriptError::new(
                                ScriptErrorKind::InvalidEscape(other),
                                Span::new(escape_start, 1 + other.len_utf8()),
                            ))
                        }
                        None => {
                            return Err(ScriptError::new(
                                ScriptErrorKind::UnterminatedString,
                                Span::new(start, 1),
                            ))
                        }
                    };
                    lit.push(escaped);
                }
                '$' if self.peek() == Some('{') => {
                    let open = self.pos - 1;
                    self.bump();
                    let name_start = self.pos;
                    while let Some(c) = self.peek() {
                        if c.is_alphanumeric() || c == '_' {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    let name = &self.src[name_start..self.pos];
                    if name.is_empty() || !self.eat('}') {
                        return Err(ScriptError::new(
                            ScriptErrorKind::InvalidInterpolation,
                            Span::new(open, self.pos - open),
                        ));
                    }
                    if !lit.is_empty() {
                        parts.push(StrPart::Lit(std::mem::take(&mut lit)));
                    }
                    parts.push(StrPart::Var(
                        name.to_string(),
                        Span::new(name_start, name.len()),
                    ));
                }
                other => lit.push(other),
            }
        }

        let span = Span::new(start, self.pos - start);
        let kind = if parts.is_empty() {
            TokenKind::Str(lit)
        } else {
            if !lit.is_empty() {
                parts.push(StrPart::Lit(lit));
            }
            TokenKind::Interp(parts)
        };
        Ok(Token::new(kind, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_canonical_call() {
        assert_eq!(
            kinds("pipeline(\"dev\"){ }"),
            vec![
                TokenKind::Ident("pipeline".into()),
                TokenKind::LParen,
                TokenKind::Str("dev".into()),
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let tokens = tokenize("let név = 1").unwrap();
        assert_eq!(tokens[1].span, Span::new(4, 4));
        assert_eq!(tokens[2].span, Span::new(9, 1));
    }

    #[test]
    fn test_operators_and_keywords() {
        assert_eq!(
            kinds("if a <= 2 && !b { return } else {}"),
            vec![
                TokenKind::If,
                TokenKind::Ident("a".into()),
                TokenKind::LtEq,
                TokenKind::Int(2),
                TokenKind::AndAnd,
                TokenKind::Bang,
                TokenKind::Ident("b".into()),
                TokenKind::LBrace,
                TokenKind::Return,
                TokenKind::RBrace,
                TokenKind::Else,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("// line\n1 /* block\n comment */ 2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("10 2.5 1_000"),
            vec![
                TokenKind::Int(10),
                TokenKind::Float(2.5),
                TokenKind::Int(1000),
                TokenKind::Eof
            ]
        );
        let err = tokenize("12abc").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::InvalidNumber("12abc".into()));
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            kinds(r#""a\n\"b\" \$x""#),
            vec![TokenKind::Str("a\n\"b\" $x".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_interpolation() {
        let tokens = tokenize(r#""go ${target} now""#).unwrap();
        assert_eq!(
            tokens[0].kind,
            TokenKind::Interp(vec![
                StrPart::Lit("go ".into()),
                StrPart::Var("target".into(), Span::new(6, 6)),
                StrPart::Lit(" now".into()),
            ])
        );
    }

    #[test]
    fn test_lone_dollar_is_literal() {
        assert_eq!(kinds(r#""$HOME""#)[0], TokenKind::Str("$HOME".into()));
    }

    #[test]
    fn test_errors() {
        let err = tokenize("\"open").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::UnterminatedString);
        assert_eq!(err.span, Span::new(0, 1));

        let err = tokenize("let x = @").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::UnexpectedChar('@'));
        assert_eq!(err.span.offset, 8);

        let err = tokenize("\"${}\"").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::InvalidInterpolation);

        let err = tokenize("/* never closed").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::UnterminatedComment);
    }
}
