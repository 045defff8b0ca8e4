//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the ents-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Diagnostics for the ents compiler
//
// One error type flows through every stage; the driver is the sole sink
// and maps it onto the `ents: error:` / `ents: fatal error:` prefixes.
//

use std::fmt;

// ============================================================================
// Source Position
// ============================================================================

/// Source position attached to every token and AST node.
///
/// Both fields are 1-based. Positions refer to the preprocessed buffer of
/// the translation unit being compiled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-based)
    pub line: u32,
    /// Column position (1-based)
    pub col: u32,
}

impl Position {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.line, self.col)
    }
}

// ============================================================================
// Error Category
// ============================================================================

/// Which stage of the pipeline produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Cannot open or read a source, include, or library file
    Io,
    /// Preprocessor failure (bad directive, unterminated asm block, ...)
    Preprocess,
    /// Lexical failure (unexpected character, unterminated string/comment)
    Lexical,
    /// Syntactic failure (expected vs. found token)
    Syntax,
    /// Semantic failure detected by the parser (undeclared name, duplicate
    /// definition, redefined type, initializer in header, ...)
    Semantic,
    /// Code generation failure (unknown type size, break outside loop, ...)
    Codegen,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Io => "io",
            Category::Preprocess => "preprocessor",
            Category::Lexical => "lexical",
            Category::Syntax => "syntax",
            Category::Semantic => "semantic",
            Category::Codegen => "codegen",
        }
    }
}

// ============================================================================
// Compile Error
// ============================================================================

/// The single error type used across the compiler.
///
/// Carries the category, the source location and offending lexeme when one
/// exists, and a human-readable message. Formatting follows the
/// `[line/column:TOKEN] message` convention.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub category: Category,
    pub pos: Option<Position>,
    pub token: Option<String>,
    pub message: String,
}

impl CompileError {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Self {
            category,
            pos: None,
            token: None,
            message: message.into(),
        }
    }

    /// Attach a source position
    pub fn at(mut self, pos: Position) -> Self {
        self.pos = Some(pos);
        self
    }

    /// Attach the offending lexeme
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(Category::Io, message)
    }

    pub fn preprocess(message: impl Into<String>) -> Self {
        Self::new(Category::Preprocess, message)
    }

    pub fn lexical(pos: Position, message: impl Into<String>) -> Self {
        Self::new(Category::Lexical, message).at(pos)
    }

    pub fn syntax(pos: Position, token: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Category::Syntax, message).at(pos).with_token(token)
    }

    pub fn semantic(pos: Position, token: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Category::Semantic, message)
            .at(pos)
            .with_token(token)
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        Self::new(Category::Codegen, message)
    }

    /// True when this error carries a source location (structural errors);
    /// locationless errors (I/O, preprocessor) are reported as plain fatals.
    pub fn has_position(&self) -> bool {
        self.pos.is_some()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.pos, &self.token) {
            (Some(pos), Some(token)) => write!(f, "[{}:{}] {}", pos, token, self.message),
            (Some(pos), None) => write!(f, "[{}] {}", pos, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for CompileError {}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// Warning Output
// ============================================================================

/// Print a warning; warnings never terminate compilation.
pub fn warning(msg: &str) {
    eprintln!("ents: warning: {}", msg);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display() {
        let pos = Position::new(10, 5);
        assert_eq!(format!("{}", pos), "10/5");
    }

    #[test]
    fn test_error_with_location_and_token() {
        let err = CompileError::syntax(Position::new(3, 7), ";", "Expect expression.");
        assert_eq!(format!("{}", err), "[3/7:;] Expect expression.");
        assert!(err.has_position());
        assert_eq!(err.category, Category::Syntax);
    }

    #[test]
    fn test_error_without_location() {
        let err = CompileError::io("could not open file: lib.e");
        assert_eq!(format!("{}", err), "could not open file: lib.e");
        assert!(!err.has_position());
    }

    #[test]
    fn test_error_with_location_only() {
        let err = CompileError::lexical(Position::new(1, 2), "Unterminated string.");
        assert_eq!(format!("{}", err), "[1/2] Unterminated string.");
    }

    #[test]
    fn test_category_names() {
        assert_eq!(Category::Semantic.as_str(), "semantic");
        assert_eq!(Category::Codegen.as_str(), "codegen");
    }
}
