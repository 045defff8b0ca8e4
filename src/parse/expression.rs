//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the ents-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Expression parsing for the ents compiler
//
// Conventional precedence ladder, lowest first:
//
//   expression := logical_or
//   logical_or := logical_and ( '||' logical_and )*
//   logical_and := bit_or ( '&&' bit_or )*
//   bit_or := bit_and ( '|' bit_and )*
//   bit_and := equality ( '&' equality )*
//   equality := relational ( ('==' | '!=') relational )*
//   relational := additive ( ('<'|'<='|'>'|'>=') additive )*
//   additive := multiplicative ( ('+'|'-') multiplicative )*
//   multiplicative := unary ( ('*'|'/'|'%') unary )*
//   unary := ('!' | '-') unary | primary
//
// The lexer has no two-character logical tokens; '&&', '||' and the '->'
// member arrow are recognized as adjacent token pairs here.
//

use super::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use super::parser::Parser;
use crate::diag::CompileResult;
use crate::token::TokenType;

impl Parser<'_> {
    pub(crate) fn parse_expression(&mut self) -> CompileResult<Expr> {
        self.parse_logical_or()
    }

    fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        let pos = left.pos;
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            pos,
        )
    }

    fn parse_logical_or(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_logical_and()?;
        while self.check(TokenType::Pipe) && self.check_at(1, TokenType::Pipe) {
            self.advance();
            self.advance();
            let right = self.parse_logical_and()?;
            left = self.binary(BinaryOp::LogOr, left, right);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_bit_or()?;
        while self.check(TokenType::Ampersand) && self.check_at(1, TokenType::Ampersand) {
            self.advance();
            self.advance();
            let right = self.parse_bit_or()?;
            left = self.binary(BinaryOp::LogAnd, left, right);
        }
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_bit_and()?;
        while self.check(TokenType::Pipe) && !self.check_at(1, TokenType::Pipe) {
            self.advance();
            let right = self.parse_bit_and()?;
            left = self.binary(BinaryOp::BitOr, left, right);
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.check(TokenType::Ampersand) && !self.check_at(1, TokenType::Ampersand) {
            self.advance();
            let right = self.parse_equality()?;
            left = self.binary(BinaryOp::BitAnd, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.current().typ {
                TokenType::Equal => BinaryOp::Eq,
                TokenType::NotEqual => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current().typ {
                TokenType::Less => BinaryOp::Lt,
                TokenType::LessEqual => BinaryOp::Le,
                TokenType::Greater => BinaryOp::Gt,
                TokenType::GreaterEqual => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current().typ {
                TokenType::Plus => BinaryOp::Add,
                // A '- >' pair is a member arrow, never subtraction
                TokenType::Minus if !self.check_at(1, TokenType::Greater) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().typ {
                TokenType::Star => BinaryOp::Mul,
                TokenType::Slash => BinaryOp::Div,
                TokenType::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> CompileResult<Expr> {
        let op = match self.current().typ {
            TokenType::Bang => Some(UnaryOp::Not),
            TokenType::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            let pos = self.advance().pos;
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                pos,
            ));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> CompileResult<Expr> {
        match self.current().typ {
            TokenType::Number => {
                let token = self.advance();
                Ok(Expr::new(ExprKind::Number(token.text), token.pos))
            }
            TokenType::Str => {
                let token = self.advance();
                Ok(Expr::new(ExprKind::Str(token.text), token.pos))
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(
                    TokenType::RightParen,
                    "Expect ')' after parenthesized expression.",
                )?;
                Ok(expr)
            }
            TokenType::LeftBracket => self.parse_memory_address(),
            TokenType::Identifier => self.parse_identifier_expr(),
            _ => Err(self.syntax_error("Expect expression.")),
        }
    }

    /// `[ NAME ]` — read through the address held in NAME
    fn parse_memory_address(&mut self) -> CompileResult<Expr> {
        let pos = self.current().pos;
        self.expect(TokenType::LeftBracket, "Expect '['.")?;
        let name = self.expect(TokenType::Identifier, "Expect variable name.")?;
        if !self.scopes.is_declared(&name.text) {
            return Err(self.semantic_error_at(&name, "Undefined variable name."));
        }
        self.expect(TokenType::RightBracket, "Expect ']' after variable name.")?;
        Ok(Expr::new(
            ExprKind::MemoryAddress { name: name.text },
            pos,
        ))
    }

    /// Identifier in primary position: a variable, an index, a struct member
    /// chain, or a call
    fn parse_identifier_expr(&mut self) -> CompileResult<Expr> {
        let name = self.advance();

        if self.check(TokenType::LeftBracket) {
            if !self.scopes.is_declared(&name.text) {
                return Err(self.semantic_error_at(&name, "Undefined variable name."));
            }
            self.advance();
            let index = self.parse_expression()?;
            self.expect(TokenType::RightBracket, "Expect ']' after array index.")?;
            return Ok(Expr::new(
                ExprKind::Index {
                    name: name.text,
                    index: Box::new(index),
                },
                name.pos,
            ));
        }

        if self.check(TokenType::Minus) && self.check_at(1, TokenType::Greater) {
            if !self.scopes.is_declared(&name.text) {
                return Err(self.semantic_error_at(&name, "Undefined variable name."));
            }
            let path = self.parse_member_path()?;
            return Ok(Expr::new(
                ExprKind::Member {
                    base: name.text,
                    path,
                },
                name.pos,
            ));
        }

        if self.scopes.is_declared(&name.text) {
            return Ok(Expr::new(ExprKind::Ident(name.text.clone()), name.pos));
        }

        if self.funcs.contains(&name.text) {
            let args = self.parse_call_args(&name)?;
            return Ok(Expr::new(
                ExprKind::Call {
                    name: name.text,
                    args,
                },
                name.pos,
            ));
        }

        Err(self.semantic_error_at(&name, "Undefined variable or function name."))
    }
}
