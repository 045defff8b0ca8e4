//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the ents-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// ents - EntS language compiler
//

use clap::Parser as ClapParser;
use gettextrs::{bind_textdomain_codeset, gettext, setlocale, textdomain, LocaleCategory};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use ents::codegen::CodeGenerator;
use ents::diag::{CompileError, CompileResult};
use ents::parse::Parser;
use ents::target::{OutputFormat, Sysroot};
use ents::token::{Lexer, Preprocessor};

// ============================================================================
// CLI
// ============================================================================

#[derive(ClapParser)]
#[command(version, about = gettext("ents - EntS language compiler"))]
struct Args {
    /// Input files
    #[arg(required = true)]
    files: Vec<String>,

    /// Run preprocessor only and dump the result
    #[arg(short = 'E', help = gettext("Preprocess only, output to stdout"))]
    preprocess_only: bool,

    /// Dump tokens (for debugging the lexer)
    #[arg(
        short = 'T',
        long = "dump-tokens",
        help = gettext("Dump tokens to stdout")
    )]
    dump_tokens: bool,

    /// Dump the tree as source text (for debugging the parser)
    #[arg(
        short = 'A',
        long = "dump-ast",
        help = gettext("Parse and dump the tree to stdout")
    )]
    dump_ast: bool,

    /// Compile only; do not assemble or link (output assembly)
    #[arg(short = 'S', help = gettext("Compile only; output assembly"))]
    asm_only: bool,

    /// Output format
    #[arg(
        short = 'f',
        long = "format",
        value_name = "format",
        default_value = "elf",
        help = gettext("Output format (elf, obj, bin)")
    )]
    format: String,

    /// Add include path (searched after the built-in include root)
    #[arg(
        short = 'I',
        long = "include",
        action = clap::ArgAction::Append,
        value_name = "path",
        help = gettext("Add include path")
    )]
    include_paths: Vec<String>,

    /// Place output in file
    #[arg(
        short = 'o',
        long = "output",
        value_name = "file",
        help = gettext("Place output in file")
    )]
    output: Option<String>,
}

// ============================================================================
// Pipeline
// ============================================================================

fn process_file(
    path: &str,
    args: &Args,
    sysroot: &Sysroot,
    format: OutputFormat,
) -> CompileResult<()> {
    // Preprocess
    let mut include_roots = vec![sysroot.include_root()];
    include_roots.extend(args.include_paths.iter().map(PathBuf::from));
    let preprocessed = Preprocessor::new(include_roots).run(Path::new(path))?;

    if args.preprocess_only {
        print!("{}", preprocessed.text);
        return Ok(());
    }

    // Tokenize
    let tokens = Lexer::new(&preprocessed.text).tokenize()?;

    if args.dump_tokens {
        for token in &tokens {
            println!(
                "{:>4}:{:<3} {:14} {}",
                token.pos.line,
                token.pos.col,
                token.typ.name(),
                token.symbol()
            );
        }
        return Ok(());
    }

    // Parse
    let (program, types) =
        Parser::new(&tokens, preprocessed.asm_blocks.len()).parse_program()?;

    if args.dump_ast {
        print!("{}", program);
        return Ok(());
    }

    // Generate assembly
    let asm = CodeGenerator::new(&types, &preprocessed.asm_blocks).generate(&program)?;

    let stem = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("a")
        .to_string();

    if args.asm_only {
        let asm_file = args
            .output
            .clone()
            .unwrap_or_else(|| format!("{}.s", stem));
        write_file(&asm_file, &asm)?;
        return Ok(());
    }

    // Assemble with nasm
    let temp_asm = std::env::temp_dir().join(format!("ents_{}.s", std::process::id()));
    write_file(&temp_asm.to_string_lossy(), &asm)?;

    // Object/flat output skips the link step and assembles straight to the
    // requested file
    let link = format == OutputFormat::Elf;
    let obj_file = if link {
        std::env::temp_dir().join(format!("ents_{}.o", std::process::id()))
    } else {
        PathBuf::from(
            args.output
                .clone()
                .unwrap_or_else(|| format!("{}.o", stem)),
        )
    };

    let status = Command::new("nasm")
        .args(["-f", format.nasm_format(), "-o"])
        .arg(&obj_file)
        .arg(&temp_asm)
        .status()
        .map_err(|e| CompileError::io(format!("could not run assembler: {}", e)));
    let _ = fs::remove_file(&temp_asm);
    if !status?.success() {
        return Err(CompileError::io("assembler failed"));
    }
    if !link {
        return Ok(());
    }

    // Link against the runtime
    let exe_file = args.output.clone().unwrap_or_else(|| "a.out".to_string());
    let status = Command::new("ld")
        .arg("-o")
        .arg(&exe_file)
        .arg(sysroot.crt0())
        .arg(&obj_file)
        .arg(sysroot.intlibe())
        .status()
        .map_err(|e| CompileError::io(format!("could not run linker: {}", e)));
    let _ = fs::remove_file(&obj_file);
    if !status?.success() {
        return Err(CompileError::io("linker failed"));
    }

    Ok(())
}

fn write_file(path: &str, content: &str) -> CompileResult<()> {
    fs::write(path, content)
        .map_err(|e| CompileError::io(format!("could not write {}: {}", path, e)))
}

// ============================================================================
// Entry Point
// ============================================================================

fn fatal(msg: &str) -> ! {
    eprintln!("ents: fatal error: {}", msg);
    eprintln!("compilation terminated.");
    std::process::exit(1);
}

fn main() {
    setlocale(LocaleCategory::LcAll, "");
    let _ = textdomain("ents");
    let _ = bind_textdomain_codeset("ents", "UTF-8");

    let args = Args::parse();

    let format = match OutputFormat::from_name(&args.format) {
        Some(format) => format,
        None => fatal("invalid format specifier"),
    };

    let sysroot = Sysroot::from_build_env();
    if let Err(e) = sysroot.check() {
        fatal(&e.to_string());
    }

    for path in &args.files {
        if let Err(e) = process_file(path, &args, &sysroot, format) {
            if e.has_position() {
                eprintln!("ents: error: {}", e);
                fatal(&format!("failed to compile: {}", path));
            } else {
                fatal(&e.to_string());
            }
        }
    }
}
