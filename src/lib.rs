//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the ents-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Library interface for the ents compiler
//
// Exposes the pipeline stages (preprocessor, lexer, parser, code
// generator) plus whole-pipeline helpers used by the driver and the
// integration tests.
//

pub mod codegen;
pub mod diag;
pub mod parse;
pub mod symbol;
pub mod target;
pub mod token;
pub mod types;

use diag::CompileResult;
use std::path::{Path, PathBuf};

/// Compile preprocessed text plus its captured asm blocks to assembly
pub fn compile_preprocessed(
    text: &str,
    asm_blocks: &[token::AsmBlock],
) -> CompileResult<String> {
    let tokens = token::Lexer::new(text).tokenize()?;
    let (program, types) = parse::Parser::new(&tokens, asm_blocks.len()).parse_program()?;
    codegen::CodeGenerator::new(&types, asm_blocks).generate(&program)
}

/// Compile source text that contains no preprocessor directives
pub fn compile_source(source: &str) -> CompileResult<String> {
    compile_preprocessed(source, &[])
}

/// Run the full pipeline over a file
pub fn compile_file(path: &Path, include_roots: &[PathBuf]) -> CompileResult<String> {
    let preprocessed = token::Preprocessor::new(include_roots.to_vec()).run(path)?;
    compile_preprocessed(&preprocessed.text, &preprocessed.asm_blocks)
}
