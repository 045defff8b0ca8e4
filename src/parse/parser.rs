//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the ents-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Parser for the ents compiler
//
// Recursive descent with one-token lookahead (a bounded peek(k) at the few
// disambiguation points). The parser owns the symbol tracking: the type
// registry, the scope stack and the function registry. The first error
// terminates the parse; there is no recovery.
//

use super::ast::{Block, Expr, Item, Param, Program, Stmt, SwitchArm, TypedefSource};
use crate::diag::{Category, CompileError, CompileResult, Position};
use crate::symbol::{FunctionRegistry, ScopeStack};
use crate::token::{Token, TokenType};
use crate::types::{StructMember, TypeTable};

// ============================================================================
// Parser
// ============================================================================

pub struct Parser<'a> {
    /// Token stream; always ends with Eof
    tokens: &'a [Token],
    /// Current position in the token stream
    pub(crate) pos: usize,
    /// Number of asm blocks captured by the preprocessor
    asm_block_count: usize,
    /// Next unused asm block index
    next_asm_index: usize,
    /// Known type names, typedefs and struct layouts
    pub(crate) types: TypeTable,
    /// Lexical variable scoping
    pub(crate) scopes: ScopeStack,
    /// Declared functions (prototypes and definitions)
    pub(crate) funcs: FunctionRegistry,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], asm_block_count: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            asm_block_count,
            next_asm_index: 0,
            types: TypeTable::new(),
            scopes: ScopeStack::new(),
            funcs: FunctionRegistry::new(),
        }
    }

    /// Parse a whole translation unit, returning the tree and the type
    /// registry (typedefs and struct layouts) for the code generator.
    pub fn parse_program(mut self) -> CompileResult<(Program, TypeTable)> {
        let mut items = Vec::new();
        while !self.check(TokenType::Eof) {
            items.push(self.parse_item()?);
        }
        Ok((Program { items }, self.types))
    }

    // ========================================================================
    // Token Navigation
    // ========================================================================

    /// Current token; the stream's trailing Eof is sticky
    pub(crate) fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or(&self.tokens[self.tokens.len() - 1])
    }

    /// Bounded lookahead
    pub(crate) fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .unwrap_or(&self.tokens[self.tokens.len() - 1])
    }

    pub(crate) fn check(&self, typ: TokenType) -> bool {
        self.current().typ == typ
    }

    pub(crate) fn check_at(&self, offset: usize, typ: TokenType) -> bool {
        self.peek_at(offset).typ == typ
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn match_token(&mut self, typ: TokenType) -> bool {
        if self.check(typ) {
            self.advance();
            return true;
        }
        false
    }

    pub(crate) fn expect(&mut self, typ: TokenType, message: &str) -> CompileResult<Token> {
        if self.check(typ) {
            Ok(self.advance())
        } else {
            Err(self.syntax_error(message))
        }
    }

    // ========================================================================
    // Error Construction
    // ========================================================================

    pub(crate) fn syntax_error(&self, message: &str) -> CompileError {
        let token = self.current();
        CompileError::syntax(token.pos, token.symbol(), message)
    }

    pub(crate) fn semantic_error(&self, message: &str) -> CompileError {
        let token = self.current();
        CompileError::semantic(token.pos, token.symbol(), message)
    }

    pub(crate) fn semantic_error_at(&self, token: &Token, message: &str) -> CompileError {
        CompileError::semantic(token.pos, token.symbol(), message)
    }

    // ========================================================================
    // Type Tokens
    // ========================================================================

    /// Is this token a known type name (builtin keyword or typedef)?
    pub(crate) fn is_type_token(&self, token: &Token) -> bool {
        token.typ.is_type_keyword()
            || (token.typ == TokenType::Identifier && self.types.is_type(&token.text))
    }

    /// Consume a type token, or fail with `message`
    fn expect_type(&mut self, message: &str) -> CompileResult<Token> {
        if self.is_type_token(self.current()) {
            Ok(self.advance())
        } else {
            Err(self.semantic_error(message))
        }
    }

    // ========================================================================
    // Top-level Items
    // ========================================================================

    fn parse_item(&mut self) -> CompileResult<Item> {
        match self.current().typ {
            TokenType::Header => self.parse_header(),
            TokenType::Function => self.parse_function(),
            TokenType::Typedef => self.parse_typedef(),
            TokenType::Asm => self.parse_inline_asm_item(),
            _ if self.is_type_token(self.current()) => self.parse_global_var(false),
            _ => Err(self.syntax_error("Expect statement.")),
        }
    }

    /// `header { prototypes | typedefs | globals };`
    fn parse_header(&mut self) -> CompileResult<Item> {
        let pos = self.current().pos;
        self.expect(TokenType::Header, "Expect 'header' keyword.")?;
        self.expect(TokenType::LeftBrace, "Expect '{' after 'header' keyword.")?;

        let mut items = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.check(TokenType::Eof) {
            match self.current().typ {
                TokenType::Function => items.push(self.parse_prototype()?),
                TokenType::Typedef => items.push(self.parse_typedef()?),
                _ if self.is_type_token(self.current()) => {
                    items.push(self.parse_global_var(true)?)
                }
                _ => return Err(self.syntax_error("Expect declaration in header.")),
            }
        }

        self.expect(TokenType::RightBrace, "Expect '}' after header.")?;
        self.expect(TokenType::Semicolon, "Expect ';' after header.")?;
        Ok(Item::Header { items, pos })
    }

    /// `function NAME ( params ) -> TYPE` — shared by prototypes and
    /// definitions
    fn parse_signature(&mut self) -> CompileResult<(Token, Vec<Param>, String)> {
        self.expect(TokenType::Function, "Expect 'function' keyword.")?;
        let name = self.expect(TokenType::Identifier, "Expect function name.")?;
        self.expect(TokenType::LeftParen, "Expect '(' after function name.")?;

        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            // `(void)` is an empty parameter list
            if self.check(TokenType::Void) && self.check_at(1, TokenType::RightParen) {
                self.advance();
            } else {
                loop {
                    let typ = self.expect_type("Expect function parameter type.")?;
                    let param_name =
                        self.expect(TokenType::Identifier, "Expect parameter name.")?;
                    params.push(Param {
                        type_name: typ.text,
                        name: param_name.text,
                    });
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
            }
        }

        self.expect(TokenType::RightParen, "Expect ')' after function parameters.")?;
        self.expect(TokenType::Minus, "Expect '->' after function parameters.")?;
        self.expect(TokenType::Greater, "Expect '->' after function parameters.")?;
        let return_type = self.expect_type("Expect function return type.")?;

        Ok((name, params, return_type.text))
    }

    /// Header prototype: `function NAME(params) -> TYPE ;`
    fn parse_prototype(&mut self) -> CompileResult<Item> {
        let (name, params, return_type) = self.parse_signature()?;
        self.expect(TokenType::Semicolon, "Expect ';' after function prototype.")?;

        self.funcs
            .declare_prototype(&name.text, params.len())
            .map_err(|e| self.semantic_error_at(&name, &e.to_string()))?;

        Ok(Item::Prototype {
            name: name.text.clone(),
            return_type,
            params,
            pos: name.pos,
        })
    }

    /// Full definition: `function NAME(params) -> TYPE { body } ;`
    fn parse_function(&mut self) -> CompileResult<Item> {
        let (name, params, return_type) = self.parse_signature()?;

        self.funcs
            .define(&name.text, params.len())
            .map_err(|e| self.semantic_error_at(&name, &e.to_string()))?;

        // Parameters live in the function scope; the body block shares it
        self.scopes.enter_scope();
        for param in &params {
            if self.scopes.is_declared(&param.name) {
                self.scopes.exit_scope();
                return Err(self.semantic_error_at(&name, "Duplicated variable name."));
            }
            self.scopes.declare(&param.name);
        }

        self.expect(TokenType::LeftBrace, "Expect '{' after function declaration.")?;
        let body = self.parse_block()?;
        self.expect(TokenType::RightBrace, "Expect '}' after function body.")?;
        self.scopes.exit_scope();
        self.expect(TokenType::Semicolon, "Expect ';' after function declaration.")?;

        Ok(Item::Function {
            name: name.text.clone(),
            return_type,
            params,
            body,
            pos: name.pos,
        })
    }

    /// `typedef OLD NEW ;` or `typedef struct { members } NEW ;`
    fn parse_typedef(&mut self) -> CompileResult<Item> {
        let pos = self.current().pos;
        self.expect(TokenType::Typedef, "Expect 'typedef' keyword.")?;

        if self.check(TokenType::Struct) {
            let members = self.parse_struct_body()?;
            if self.check(TokenType::Semicolon) {
                return Err(self.semantic_error("Anonymous struct is not allowed."));
            }
            let name = self.expect_new_type_name("Expect type name after struct.")?;
            self.expect(TokenType::Semicolon, "Expect ';' after typedef.")?;
            self.types.declare_struct(&name.text, members.clone());
            Ok(Item::Typedef {
                name: name.text,
                source: TypedefSource::Struct(members),
                pos,
            })
        } else {
            let old = self.expect_type("Expect typedef type.")?;
            let name = self.expect_new_type_name("Expect type name after typedef.")?;
            self.expect(TokenType::Semicolon, "Expect ';' after typedef.")?;
            self.types.declare_alias(&name.text, &old.text);
            Ok(Item::Typedef {
                name: name.text,
                source: TypedefSource::Alias(old.text.clone()),
                pos,
            })
        }
    }

    /// Consume the new name of a typedef. Existing type names (builtin
    /// keywords included) are a redefinition error.
    fn expect_new_type_name(&mut self, message: &str) -> CompileResult<Token> {
        let name = self.advance();
        if self.is_type_token(&name) {
            return Err(self.semantic_error_at(&name, "Can not redefine type."));
        }
        if name.typ != TokenType::Identifier {
            return Err(self.semantic_error_at(&name, message));
        }
        Ok(name)
    }

    /// `struct { TYPE NAME ; ... }`
    fn parse_struct_body(&mut self) -> CompileResult<Vec<StructMember>> {
        self.expect(TokenType::Struct, "Expect 'struct' keyword.")?;
        self.expect(TokenType::LeftBrace, "Expect '{' after 'struct' keyword.")?;

        let mut members: Vec<StructMember> = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.check(TokenType::Eof) {
            let typ = self.expect_type("Expect struct member type.")?;
            let name = self.expect(TokenType::Identifier, "Expect struct member name.")?;
            if members.iter().any(|m| m.name == name.text) {
                return Err(self.semantic_error_at(&name, "Duplicated struct member name."));
            }
            self.expect(TokenType::Semicolon, "Expect ';' after struct member.")?;
            members.push(StructMember::new(typ.text, name.text));
        }

        self.expect(TokenType::RightBrace, "Expect '}' after struct members.")?;
        Ok(members)
    }

    /// File-scope variable declaration; initializers are rejected here
    fn parse_global_var(&mut self, in_header: bool) -> CompileResult<Item> {
        let typ = self.expect_type("Expect global variable type.")?;
        let by_addr = self.match_token(TokenType::LeftBracket);
        let name = self.expect(TokenType::Identifier, "Expect variable name.")?;
        if self.scopes.is_declared(&name.text) {
            return Err(self.semantic_error_at(&name, "Duplicated global variable name."));
        }
        if by_addr {
            self.expect(TokenType::RightBracket, "Expect ']' after variable name.")?;
        }

        if self.check(TokenType::Assign) {
            let message = if in_header {
                "Header does not allow global variable initialization."
            } else {
                "Global variables can not be initialized."
            };
            return Err(self.semantic_error(message));
        }
        self.expect(
            TokenType::Semicolon,
            "Expect ';' after global variable declaration.",
        )?;

        self.scopes.declare_global(&name.text);
        Ok(Item::GlobalVar {
            type_name: typ.text,
            name: name.text,
            by_addr,
            pos: typ.pos,
        })
    }

    /// Top-level `asm ;` placeholder; resolves to the next unused captured
    /// block
    fn parse_inline_asm_item(&mut self) -> CompileResult<Item> {
        let (index, pos) = self.consume_asm_placeholder()?;
        Ok(Item::InlineAsm { index, pos })
    }

    fn consume_asm_placeholder(&mut self) -> CompileResult<(usize, Position)> {
        let token = self.expect(TokenType::Asm, "Expect 'asm' keyword.")?;
        if self.next_asm_index >= self.asm_block_count {
            return Err(
                CompileError::new(Category::Preprocess, "No captured asm block for this position.")
                    .at(token.pos),
            );
        }
        let index = self.next_asm_index;
        self.next_asm_index += 1;
        self.expect(TokenType::Semicolon, "Expect ';' after asm block.")?;
        Ok((index, token.pos))
    }

    // ========================================================================
    // Blocks and Statements
    // ========================================================================

    /// Statements until the closing brace; does not push a scope (the
    /// function body shares the parameter scope)
    fn parse_block(&mut self) -> CompileResult<Block> {
        let mut stmts = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.check(TokenType::Eof) {
            stmts.push(self.parse_statement()?);
        }
        Ok(Block { stmts })
    }

    /// A nested block with its own scope (loop/branch/case bodies)
    fn parse_scoped_block(&mut self) -> CompileResult<Block> {
        self.scopes.enter_scope();
        let block = self.parse_block();
        self.scopes.exit_scope();
        block
    }

    fn parse_statement(&mut self) -> CompileResult<Stmt> {
        match self.current().typ {
            TokenType::While => self.parse_while(),
            TokenType::If => {
                let stmt = self.parse_if_chain()?;
                self.expect(TokenType::Semicolon, "Expect ';' after 'if' block.")?;
                Ok(stmt)
            }
            TokenType::Return => self.parse_return(),
            TokenType::Continue => {
                let pos = self.advance().pos;
                self.expect(TokenType::Semicolon, "Expect ';' after continue statement.")?;
                Ok(Stmt::Continue { pos })
            }
            TokenType::Break => {
                let pos = self.advance().pos;
                self.expect(TokenType::Semicolon, "Expect ';' after break statement.")?;
                Ok(Stmt::Break { pos })
            }
            TokenType::Switch => self.parse_switch(),
            TokenType::Asm => {
                let (index, pos) = self.consume_asm_placeholder()?;
                Ok(Stmt::InlineAsm { index, pos })
            }
            TokenType::LeftBracket => self.parse_memory_assign(),
            TokenType::Identifier if self.is_type_token(self.current()) => self.parse_var_decl(),
            _ if self.current().typ.is_type_keyword() => self.parse_var_decl(),
            TokenType::Identifier => self.parse_identifier_statement(),
            _ => {
                let expr = self.parse_expression()?;
                self.expect(TokenType::Semicolon, "Expect ';' after expression.")?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// `TYPE name ;`, `TYPE [name] ;`, with optional `= expr` initializer
    fn parse_var_decl(&mut self) -> CompileResult<Stmt> {
        let typ = self.expect_type("Expect variable type.")?;
        let by_addr = self.match_token(TokenType::LeftBracket);
        let name = self.expect(TokenType::Identifier, "Expect variable name.")?;
        if self.scopes.is_declared(&name.text) {
            return Err(self.semantic_error_at(&name, "Duplicated variable name."));
        }
        if by_addr {
            self.expect(TokenType::RightBracket, "Expect ']' after variable name.")?;
        }
        self.scopes.declare(&name.text);

        if self.match_token(TokenType::Semicolon) {
            return Ok(Stmt::VarDecl {
                type_name: typ.text,
                name: name.text,
                by_addr,
                pos: typ.pos,
            });
        }
        if self.match_token(TokenType::Assign) {
            let value = self.parse_expression()?;
            self.expect(TokenType::Semicolon, "Expect ';' after variable declaration.")?;
            return Ok(Stmt::VarDeclAssign {
                type_name: typ.text,
                name: name.text,
                by_addr,
                value,
                pos: typ.pos,
            });
        }
        Err(self.syntax_error("Expect ';' or '=' after variable declaration."))
    }

    fn parse_while(&mut self) -> CompileResult<Stmt> {
        let pos = self.current().pos;
        self.expect(TokenType::While, "Expect 'while' keyword.")?;
        self.expect(TokenType::LeftParen, "Expect '(' after 'while' keyword.")?;
        let cond = self.parse_expression()?;
        self.expect(TokenType::RightParen, "Expect ')' after 'while' condition.")?;
        self.expect(TokenType::LeftBrace, "Expect '{' after 'while' condition.")?;
        let body = self.parse_scoped_block()?;
        self.expect(TokenType::RightBrace, "Expect '}' after 'while' block.")?;
        self.expect(TokenType::Semicolon, "Expect ';' after 'while' block.")?;
        Ok(Stmt::While { cond, body, pos })
    }

    /// An if/else-if chain; the caller consumes the single trailing `;`
    fn parse_if_chain(&mut self) -> CompileResult<Stmt> {
        let pos = self.current().pos;
        self.expect(TokenType::If, "Expect 'if' keyword.")?;
        self.expect(TokenType::LeftParen, "Expect '(' after 'if' keyword.")?;
        let cond = self.parse_expression()?;
        self.expect(TokenType::RightParen, "Expect ')' after 'if' condition.")?;
        self.expect(TokenType::LeftBrace, "Expect '{' after 'if' condition.")?;
        let then_block = self.parse_scoped_block()?;
        self.expect(TokenType::RightBrace, "Expect '}' after 'if' block.")?;

        let else_branch = if self.match_token(TokenType::Else) {
            if self.check(TokenType::If) {
                Some(Box::new(self.parse_if_chain()?))
            } else {
                self.expect(TokenType::LeftBrace, "Expect '{' after 'else' keyword.")?;
                let block = self.parse_scoped_block()?;
                self.expect(TokenType::RightBrace, "Expect '}' after 'else' block.")?;
                Some(Box::new(Stmt::Block(block)))
            }
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then_block,
            else_branch,
            pos,
        })
    }

    fn parse_return(&mut self) -> CompileResult<Stmt> {
        let pos = self.current().pos;
        self.expect(TokenType::Return, "Expect 'return' keyword.")?;
        let value = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenType::Semicolon, "Expect ';' after return statement.")?;
        Ok(Stmt::Return { value, pos })
    }

    /// `switch ( expr ) { case* default? } ;` — default must be last
    fn parse_switch(&mut self) -> CompileResult<Stmt> {
        let pos = self.current().pos;
        self.expect(TokenType::Switch, "Expect 'switch' keyword.")?;
        self.expect(TokenType::LeftParen, "Expect '(' after 'switch' keyword.")?;
        let cond = self.parse_expression()?;
        self.expect(TokenType::RightParen, "Expect ')' after 'switch' condition.")?;
        self.expect(TokenType::LeftBrace, "Expect '{' after 'switch' condition.")?;

        let mut arms = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.check(TokenType::Eof) {
            match self.current().typ {
                TokenType::Case => arms.push(self.parse_case_arm()?),
                TokenType::Default => {
                    arms.push(self.parse_default_arm()?);
                    if !self.check(TokenType::RightBrace) {
                        return Err(
                            self.semantic_error("'default' must be the last switch arm.")
                        );
                    }
                }
                _ => return Err(self.syntax_error("Expect 'case' or 'default' keyword.")),
            }
        }

        self.expect(TokenType::RightBrace, "Expect '}' after 'switch' body.")?;
        self.expect(TokenType::Semicolon, "Expect ';' after 'switch' body.")?;
        Ok(Stmt::Switch { cond, arms, pos })
    }

    fn parse_case_arm(&mut self) -> CompileResult<SwitchArm> {
        let pos = self.current().pos;
        self.expect(TokenType::Case, "Expect 'case' keyword.")?;
        self.expect(TokenType::LeftParen, "Expect '(' after 'case' keyword.")?;
        let value = self.parse_expression()?;
        self.expect(TokenType::RightParen, "Expect ')' after 'case' condition.")?;
        self.expect(TokenType::LeftBrace, "Expect '{' after 'case' condition.")?;
        let body = self.parse_scoped_block()?;
        self.expect(TokenType::RightBrace, "Expect '}' after 'case' block.")?;
        self.expect(TokenType::Semicolon, "Expect ';' after 'case' block.")?;
        Ok(SwitchArm::Case { value, body, pos })
    }

    fn parse_default_arm(&mut self) -> CompileResult<SwitchArm> {
        let pos = self.current().pos;
        self.expect(TokenType::Default, "Expect 'default' keyword.")?;
        self.expect(TokenType::LeftBrace, "Expect '{' after 'default' keyword.")?;
        let body = self.parse_scoped_block()?;
        self.expect(TokenType::RightBrace, "Expect '}' after 'default' block.")?;
        self.expect(TokenType::Semicolon, "Expect ';' after 'default' block.")?;
        Ok(SwitchArm::Default { body, pos })
    }

    /// `[ NAME ] = expr ;` — write through the address held in NAME
    fn parse_memory_assign(&mut self) -> CompileResult<Stmt> {
        let pos = self.current().pos;
        self.expect(TokenType::LeftBracket, "Expect '['.")?;
        let name = self.expect(TokenType::Identifier, "Expect variable name.")?;
        if !self.scopes.is_declared(&name.text) {
            return Err(self.semantic_error_at(&name, "Undefined variable name."));
        }
        self.expect(TokenType::RightBracket, "Expect ']' after variable name.")?;
        self.expect(TokenType::Assign, "Expect '=' after memory address.")?;
        let value = self.parse_expression()?;
        self.expect(TokenType::Semicolon, "Expect ';' after memory assignment.")?;
        Ok(Stmt::MemoryAssign {
            name: name.text,
            value,
            pos,
        })
    }

    /// Statement starting with a declared variable or function name
    fn parse_identifier_statement(&mut self) -> CompileResult<Stmt> {
        let name = self.current().clone();

        if self.scopes.is_declared(&name.text) {
            if self.check_at(1, TokenType::Plus) && self.check_at(2, TokenType::Plus) {
                self.advance();
                self.advance();
                self.advance();
                self.expect(TokenType::Semicolon, "Expect ';' after increment statement.")?;
                return Ok(Stmt::Increment {
                    name: name.text,
                    pos: name.pos,
                });
            }
            if self.check_at(1, TokenType::Minus) && self.check_at(2, TokenType::Minus) {
                self.advance();
                self.advance();
                self.advance();
                self.expect(TokenType::Semicolon, "Expect ';' after decrement statement.")?;
                return Ok(Stmt::Decrement {
                    name: name.text,
                    pos: name.pos,
                });
            }
            if self.check_at(1, TokenType::Assign) {
                self.advance();
                self.advance();
                let value = self.parse_expression()?;
                self.expect(TokenType::Semicolon, "Expect ';' after assignment.")?;
                return Ok(Stmt::Assign {
                    name: name.text,
                    value,
                    pos: name.pos,
                });
            }
            if self.check_at(1, TokenType::LeftBracket) {
                self.advance();
                self.advance();
                let index = self.parse_expression()?;
                self.expect(TokenType::RightBracket, "Expect ']' after index.")?;
                self.expect(TokenType::Assign, "Expect '=' after index.")?;
                let value = self.parse_expression()?;
                self.expect(TokenType::Semicolon, "Expect ';' after indexation assignment.")?;
                return Ok(Stmt::IndexAssign {
                    name: name.text,
                    index,
                    value,
                    pos: name.pos,
                });
            }
            if self.check_at(1, TokenType::Minus) && self.check_at(2, TokenType::Greater) {
                self.advance();
                let path = self.parse_member_path()?;
                self.expect(TokenType::Assign, "Expect '=' after struct member.")?;
                let value = self.parse_expression()?;
                self.expect(TokenType::Semicolon, "Expect ';' after assignment.")?;
                return Ok(Stmt::MemberAssign {
                    base: name.text,
                    path,
                    value,
                    pos: name.pos,
                });
            }
            return Err(CompileError::syntax(
                self.peek_at(1).pos,
                self.peek_at(1).symbol(),
                "Unexpected token after identifier.",
            ));
        }

        if self.funcs.contains(&name.text) {
            self.advance();
            let args = self.parse_call_args(&name)?;
            self.expect(TokenType::Semicolon, "Expect ';' after function call.")?;
            return Ok(Stmt::Call {
                name: name.text,
                args,
                pos: name.pos,
            });
        }

        Err(self.semantic_error("Undefined variable or function name."))
    }

    /// One or more `-> member` steps
    pub(crate) fn parse_member_path(&mut self) -> CompileResult<Vec<String>> {
        let mut path = Vec::new();
        while self.check(TokenType::Minus) && self.check_at(1, TokenType::Greater) {
            self.advance();
            self.advance();
            let member = self.expect(TokenType::Identifier, "Expect member name after '->'.")?;
            path.push(member.text);
        }
        Ok(path)
    }

    /// `( args? )` with arity validation against the registry
    pub(crate) fn parse_call_args(&mut self, name: &Token) -> CompileResult<Vec<Expr>> {
        self.expect(TokenType::LeftParen, "Expect '(' after function name.")?;
        let mut args = Vec::new();
        if !self.check(TokenType::RightParen) {
            args.push(self.parse_expression()?);
            while self.match_token(TokenType::Comma) {
                args.push(self.parse_expression()?);
            }
        }
        self.expect(TokenType::RightParen, "Expect ')' after function arguments.")?;

        if let Some(arity) = self.funcs.arity(&name.text) {
            if arity != args.len() {
                return Err(self.semantic_error_at(
                    name,
                    &format!("Wrong number of arguments in call to '{}'.", name.text),
                ));
            }
        }
        Ok(args)
    }
}
