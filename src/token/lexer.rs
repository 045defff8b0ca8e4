//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the ents-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Lexer for the ents compiler
//
// Single stateless pass over the preprocessed buffer. The produced vector
// always ends with exactly one Eof token.
//

use super::{keyword_lookup, Token, TokenType};
use crate::diag::{CompileError, CompileResult, Position};

// ============================================================================
// Lexer
// ============================================================================

pub struct Lexer<'a> {
    src: &'a [u8],
    /// Offset of the first byte of the token being scanned
    start: usize,
    /// Offset of the next byte to consume
    current: usize,
    line: u32,
    col: u32,
    /// Position of the token being scanned
    tok_pos: Position,
    tokens: Vec<Token>,
}

#[inline]
fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

#[inline]
fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            start: 0,
            current: 0,
            line: 1,
            col: 1,
            tok_pos: Position::new(1, 1),
            tokens: Vec::with_capacity(source.len() / 4),
        }
    }

    /// Tokenize the whole buffer
    pub fn tokenize(mut self) -> CompileResult<Vec<Token>> {
        while self.current < self.src.len() {
            self.skip_whitespace();
            if self.current >= self.src.len() {
                break;
            }
            self.start = self.current;
            self.tok_pos = Position::new(self.line, self.col);

            let c = self.advance();
            match c {
                b'(' => self.add_token(TokenType::LeftParen),
                b')' => self.add_token(TokenType::RightParen),
                b'{' => self.add_token(TokenType::LeftBrace),
                b'}' => self.add_token(TokenType::RightBrace),
                b'[' => self.add_token(TokenType::LeftBracket),
                b']' => self.add_token(TokenType::RightBracket),
                b';' => self.add_token(TokenType::Semicolon),
                b',' => self.add_token(TokenType::Comma),
                b'=' => {
                    let typ = if self.match_char(b'=') {
                        TokenType::Equal
                    } else {
                        TokenType::Assign
                    };
                    self.add_token(typ);
                }
                b'!' => {
                    let typ = if self.match_char(b'=') {
                        TokenType::NotEqual
                    } else {
                        TokenType::Bang
                    };
                    self.add_token(typ);
                }
                b'<' => {
                    let typ = if self.match_char(b'=') {
                        TokenType::LessEqual
                    } else {
                        TokenType::Less
                    };
                    self.add_token(typ);
                }
                b'>' => {
                    let typ = if self.match_char(b'=') {
                        TokenType::GreaterEqual
                    } else {
                        TokenType::Greater
                    };
                    self.add_token(typ);
                }
                b'+' => self.add_token(TokenType::Plus),
                b'-' => self.add_token(TokenType::Minus),
                b'*' => self.add_token(TokenType::Star),
                b'/' => self.scan_slash()?,
                b'%' => self.add_token(TokenType::Percent),
                b'&' => self.add_token(TokenType::Ampersand),
                b'|' => self.add_token(TokenType::Pipe),
                b'"' => self.scan_string()?,
                _ => {
                    if c.is_ascii_digit() {
                        self.scan_number();
                    } else if is_ident_start(c) {
                        self.scan_identifier();
                    } else {
                        return Err(CompileError::lexical(
                            self.tok_pos,
                            format!("Unexpected character: '{}'", c as char),
                        ));
                    }
                }
            }
        }

        self.tokens.push(Token::new(
            TokenType::Eof,
            "",
            Position::new(self.line, self.col),
        ));
        Ok(self.tokens)
    }

    // ========================================================================
    // Character Navigation
    // ========================================================================

    fn peek(&self) -> u8 {
        if self.current < self.src.len() {
            self.src[self.current]
        } else {
            0
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 < self.src.len() {
            self.src[self.current + 1]
        } else {
            0
        }
    }

    fn advance(&mut self) -> u8 {
        let c = self.src[self.current];
        self.current += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    fn match_char(&mut self, expected: u8) -> bool {
        if self.peek() != expected {
            return false;
        }
        self.advance();
        true
    }

    fn skip_whitespace(&mut self) {
        while self.current < self.src.len() {
            match self.peek() {
                b' ' | b'\r' | b'\t' | b'\n' => {
                    self.advance();
                }
                _ => return,
            }
        }
    }

    // ========================================================================
    // Token Scanners
    // ========================================================================

    fn lexeme(&self) -> &str {
        // The buffer came from a &str; token boundaries stay on char edges
        // because all token-significant bytes are ASCII.
        std::str::from_utf8(&self.src[self.start..self.current]).unwrap_or("")
    }

    fn add_token(&mut self, typ: TokenType) {
        let text = match typ {
            TokenType::Identifier | TokenType::Number => self.lexeme().to_string(),
            _ => String::new(),
        };
        self.tokens.push(Token::new(typ, text, self.tok_pos));
    }

    fn scan_identifier(&mut self) {
        while is_ident_char(self.peek()) {
            self.advance();
        }
        let text = self.lexeme().to_string();
        match keyword_lookup(&text) {
            Some(typ) => self.tokens.push(Token::new(typ, text, self.tok_pos)),
            None => self
                .tokens
                .push(Token::new(TokenType::Identifier, text, self.tok_pos)),
        }
    }

    fn scan_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        self.add_token(TokenType::Number);
    }

    fn scan_string(&mut self) -> CompileResult<()> {
        while self.current < self.src.len() && self.peek() != b'"' {
            self.advance();
        }
        if self.current >= self.src.len() {
            return Err(CompileError::lexical(self.tok_pos, "Unterminated string."));
        }
        self.advance(); // closing quote
        let text =
            std::str::from_utf8(&self.src[self.start + 1..self.current - 1]).unwrap_or("");
        self.tokens
            .push(Token::new(TokenType::Str, text.to_string(), self.tok_pos));
        Ok(())
    }

    fn scan_slash(&mut self) -> CompileResult<()> {
        if self.match_char(b'/') {
            while self.current < self.src.len() && self.peek() != b'\n' {
                self.advance();
            }
            Ok(())
        } else if self.match_char(b'*') {
            self.skip_block_comment()
        } else {
            self.add_token(TokenType::Slash);
            Ok(())
        }
    }

    fn skip_block_comment(&mut self) -> CompileResult<()> {
        // Non-nesting, per the language definition
        while self.current < self.src.len() && !(self.peek() == b'*' && self.peek_next() == b'/') {
            self.advance();
        }
        if self.current >= self.src.len() {
            return Err(CompileError::lexical(
                self.tok_pos,
                "Unterminated block comment.",
            ));
        }
        self.advance(); // '*'
        self.advance(); // '/'
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        Lexer::new(src).tokenize().expect("lex failure")
    }

    fn kinds(src: &str) -> Vec<TokenType> {
        lex(src).iter().map(|t| t.typ).collect()
    }

    #[test]
    fn test_single_eof() {
        let tokens = lex("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].typ, TokenType::Eof);

        let tokens = lex("return 0;");
        let eofs = tokens.iter().filter(|t| t.typ == TokenType::Eof).count();
        assert_eq!(eofs, 1);
        assert_eq!(tokens.last().unwrap().typ, TokenType::Eof);
    }

    #[test]
    fn test_punctuation_and_operators() {
        assert_eq!(
            kinds("( ) { } [ ] ; , = + - * / % & | !"),
            vec![
                TokenType::LeftParen,
                TokenType::RightParen,
                TokenType::LeftBrace,
                TokenType::RightBrace,
                TokenType::LeftBracket,
                TokenType::RightBracket,
                TokenType::Semicolon,
                TokenType::Comma,
                TokenType::Assign,
                TokenType::Plus,
                TokenType::Minus,
                TokenType::Star,
                TokenType::Slash,
                TokenType::Percent,
                TokenType::Ampersand,
                TokenType::Pipe,
                TokenType::Bang,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("== != <= >= < >"),
            vec![
                TokenType::Equal,
                TokenType::NotEqual,
                TokenType::LessEqual,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::Greater,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_arrow_is_two_tokens() {
        assert_eq!(
            kinds("p->y"),
            vec![
                TokenType::Identifier,
                TokenType::Minus,
                TokenType::Greater,
                TokenType::Identifier,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let tokens = lex("function main int32 foo_bar");
        assert_eq!(tokens[0].typ, TokenType::Function);
        assert_eq!(tokens[1].typ, TokenType::Identifier);
        assert_eq!(tokens[1].text, "main");
        assert_eq!(tokens[2].typ, TokenType::Int32);
        assert_eq!(tokens[2].text, "int32");
        assert_eq!(tokens[3].typ, TokenType::Identifier);
        assert_eq!(tokens[3].text, "foo_bar");
    }

    #[test]
    fn test_numbers() {
        let tokens = lex("42 3.14");
        assert_eq!(tokens[0].typ, TokenType::Number);
        assert_eq!(tokens[0].text, "42");
        assert_eq!(tokens[1].typ, TokenType::Number);
        assert_eq!(tokens[1].text, "3.14");
    }

    #[test]
    fn test_number_dot_without_digit() {
        // "1." is a number followed by... nothing consumable: the dot is
        // not part of the literal and lexes as an error character.
        let result = Lexer::new("1.x").tokenize();
        assert!(result.is_err());
    }

    #[test]
    fn test_string_literal_quotes_stripped() {
        let tokens = lex("\"hello world\"");
        assert_eq!(tokens[0].typ, TokenType::Str);
        assert_eq!(tokens[0].text, "hello world");
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("\"oops").tokenize().unwrap_err();
        assert!(err.message.contains("Unterminated string"));
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("1 // comment\n2 /* block\ncomment */ 3"),
            vec![
                TokenType::Number,
                TokenType::Number,
                TokenType::Number,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = Lexer::new("/* never ends").tokenize().unwrap_err();
        assert!(err.message.contains("Unterminated block comment"));
    }

    #[test]
    fn test_positions() {
        let tokens = lex("a\n  b");
        assert_eq!(tokens[0].pos, Position::new(1, 1));
        assert_eq!(tokens[1].pos, Position::new(2, 3));
    }

    #[test]
    fn test_position_after_string() {
        let tokens = lex("\"s\" x");
        assert_eq!(tokens[1].pos, Position::new(1, 5));
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("@").tokenize().unwrap_err();
        assert!(err.message.contains("Unexpected character"));
        assert_eq!(err.pos.unwrap(), Position::new(1, 1));
    }
}
