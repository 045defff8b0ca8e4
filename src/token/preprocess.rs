//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the ents-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Line-oriented preprocessor for the ents compiler
//
// Produces the rewritten text buffer for the lexer plus the ordered list of
// captured inline-assembly blocks. The macro table lives for a single
// top-level run; nothing is shared across translation units.
//

use crate::diag::{CompileError, CompileResult};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_MACRO_CAPACITY: usize = 32;

// ============================================================================
// Captured Asm Blocks
// ============================================================================

/// A verbatim assembly region captured between `#asmstart` and `#asmend`.
///
/// `params` are the variable names bound, in order, to the System V argument
/// registers when the block is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmBlock {
    pub params: Vec<String>,
    pub lines: Vec<String>,
}

/// Result of a preprocessor run
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// The rewritten source text
    pub text: String,
    /// Captured asm blocks, in source order; the text contains one `asm;`
    /// placeholder per entry
    pub asm_blocks: Vec<AsmBlock>,
}

// ============================================================================
// Preprocessor
// ============================================================================

pub struct Preprocessor {
    include_roots: Vec<PathBuf>,
    macros: HashMap<String, String>,
    asm_blocks: Vec<AsmBlock>,
}

#[inline]
fn is_word_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Does this (already left-trimmed) line start with the `header` keyword?
/// An identifier that merely begins with the letters `header` does not count.
fn is_header_line(trimmed: &str) -> bool {
    match trimmed.strip_prefix("header") {
        Some(rest) => !rest.chars().next().is_some_and(is_word_char),
        None => false,
    }
}

impl Preprocessor {
    pub fn new(include_roots: Vec<PathBuf>) -> Self {
        Self {
            include_roots,
            macros: HashMap::with_capacity(DEFAULT_MACRO_CAPACITY),
            asm_blocks: Vec::new(),
        }
    }

    /// Preprocess one translation unit. Consumes the preprocessor; the macro
    /// table is scoped to this invocation.
    pub fn run(mut self, path: &Path) -> CompileResult<Preprocessed> {
        let content = read_file(path)?;
        let current_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

        let lines: Vec<&str> = content.lines().collect();
        let mut out = String::with_capacity(content.len());
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim_start();

            if let Some(rest) = trimmed.strip_prefix('#') {
                let end = rest
                    .find(|c: char| !c.is_ascii_alphanumeric())
                    .unwrap_or(rest.len());
                let directive = &rest[..end];
                match directive {
                    "include" => self.handle_include(trimmed, &current_dir, &mut out)?,
                    "define" => {
                        i = self.handle_define(&lines, i)?;
                        out.push('\n');
                    }
                    "undef" => {
                        self.handle_undef(rest[end..].trim());
                        out.push('\n');
                    }
                    "asmstart" => {
                        i = self.capture_asm(&lines, i, rest[end..].trim())?;
                        out.push_str("asm;\n");
                    }
                    "asmend" => {
                        return Err(CompileError::preprocess(
                            "#asmend without matching #asmstart",
                        ));
                    }
                    _ => {
                        return Err(CompileError::preprocess(format!(
                            "unknown preprocessor directive: #{}",
                            directive
                        )));
                    }
                }
            } else if is_header_line(trimmed) {
                out.push_str(line);
                out.push('\n');
            } else {
                out.push_str(&self.replace_macros(line));
                out.push('\n');
            }
            i += 1;
        }

        Ok(Preprocessed {
            text: out,
            asm_blocks: self.asm_blocks,
        })
    }

    // ========================================================================
    // Directive Handlers
    // ========================================================================

    /// `#define NAME VALUE`, value extending to end of line; a trailing `\`
    /// continues onto the next line. Returns the index of the last line
    /// consumed.
    fn handle_define(&mut self, lines: &[&str], mut i: usize) -> CompileResult<usize> {
        let rest = lines[i].trim_start();
        let rest = rest.strip_prefix("#define").unwrap_or(rest).trim_start();
        let name_end = rest
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        if name.is_empty() {
            return Err(CompileError::preprocess("#define requires a macro name"));
        }

        let mut value = rest[name_end..].trim().to_string();
        while value.ends_with('\\') {
            value.pop();
            let trimmed = value.trim_end().len();
            value.truncate(trimmed);
            i += 1;
            if i >= lines.len() {
                break;
            }
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(lines[i].trim());
        }

        self.macros.insert(name.to_string(), value);
        Ok(i)
    }

    fn handle_undef(&mut self, name: &str) {
        self.macros.remove(name);
    }

    /// `#asmstart(var, ...)` through `#asmend`; the lines between are stored
    /// verbatim, with no macro expansion. Returns the index of the `#asmend`
    /// line.
    fn capture_asm(&mut self, lines: &[&str], start: usize, args: &str) -> CompileResult<usize> {
        let params = parse_asm_params(args)?;

        let mut body = Vec::new();
        let mut i = start + 1;
        loop {
            if i >= lines.len() {
                return Err(CompileError::preprocess("Unterminated asm block."));
            }
            if lines[i].trim() == "#asmend" {
                break;
            }
            body.push(lines[i].to_string());
            i += 1;
        }

        self.asm_blocks.push(AsmBlock {
            params,
            lines: body,
        });
        Ok(i)
    }

    /// `#include "path"` resolves against the current file's directory;
    /// `#include <path>` against the configured include roots in order.
    /// Only the included file's `header { ... };` block is spliced in.
    fn handle_include(
        &mut self,
        line: &str,
        current_dir: &Path,
        out: &mut String,
    ) -> CompileResult<()> {
        let open = line
            .find(|c: char| c == '"' || c == '<')
            .ok_or_else(|| CompileError::preprocess("unterminated include path"))?;
        let quoted = line.as_bytes()[open] == b'"';
        let close_ch = if quoted { '"' } else { '>' };
        let close = line[open + 1..]
            .find(close_ch)
            .map(|n| open + 1 + n)
            .ok_or_else(|| CompileError::preprocess("unterminated include path"))?;
        let name = &line[open + 1..close];
        if name.is_empty() {
            return Err(CompileError::preprocess("unterminated include path"));
        }

        let resolved = self
            .resolve_include(name, quoted, current_dir)
            .ok_or_else(|| CompileError::io(format!("could not open include file: {}", name)))?;
        let content = read_file(&resolved)?;

        // Extract the header block of the included file
        let mut header_lines = Vec::new();
        let mut in_header = false;
        for file_line in content.lines() {
            let trimmed = file_line.trim_start();
            if !in_header && is_header_line(trimmed) {
                in_header = true;
                header_lines.push(file_line);
                continue;
            }
            if in_header {
                header_lines.push(file_line);
                if trimmed.starts_with("};") {
                    break;
                }
            }
        }

        let mut i = 0;
        while i < header_lines.len() {
            let header_line = header_lines[i];
            let trimmed = header_line.trim_start();
            if trimmed.starts_with("#define") {
                i = self.handle_define(&header_lines, i)?;
            } else if let Some(rest) = trimmed.strip_prefix("#undef") {
                self.handle_undef(rest.trim());
            } else {
                out.push_str(&self.replace_macros(header_line));
                out.push('\n');
            }
            i += 1;
        }

        Ok(())
    }

    fn resolve_include(&self, name: &str, quoted: bool, current_dir: &Path) -> Option<PathBuf> {
        if quoted {
            let local = current_dir.join(name);
            if local.exists() {
                return Some(local);
            }
        } else {
            for root in &self.include_roots {
                let candidate = root.join(name);
                if candidate.exists() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    // ========================================================================
    // Macro Substitution
    // ========================================================================

    /// Whole-word macro substitution: identifiers are replaced in a single
    /// left-to-right pass, with no rescanning of the replacement text.
    fn replace_macros(&self, line: &str) -> String {
        if self.macros.is_empty() {
            return line.to_string();
        }

        let mut out = String::with_capacity(line.len());
        let mut chars = line.char_indices().peekable();
        while let Some((start, c)) = chars.next() {
            if is_word_start(c) {
                let mut end = start + c.len_utf8();
                while let Some(&(i, nc)) = chars.peek() {
                    if is_word_char(nc) {
                        end = i + nc.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let word = &line[start..end];
                match self.macros.get(word) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(word),
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn read_file(path: &Path) -> CompileResult<String> {
    fs::read_to_string(path)
        .map_err(|e| CompileError::io(format!("could not open file: {}: {}", path.display(), e)))
}

/// Parse the parameter list of `#asmstart(a, b, ...)`. A bare `#asmstart`
/// binds nothing.
fn parse_asm_params(args: &str) -> CompileResult<Vec<String>> {
    if args.is_empty() {
        return Ok(Vec::new());
    }
    let inner = args
        .strip_prefix('(')
        .and_then(|s| s.trim_end().strip_suffix(')'))
        .ok_or_else(|| CompileError::preprocess("malformed #asmstart parameter list"))?;
    Ok(inner
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).expect("create");
        f.write_all(content.as_bytes()).expect("write");
        path
    }

    fn run_on(content: &str) -> Preprocessed {
        let dir = TempDir::new().expect("tempdir");
        let main = write_file(&dir, "main.e", content);
        Preprocessor::new(Vec::new()).run(&main).expect("preprocess")
    }

    #[test]
    fn test_plain_text_passthrough() {
        let out = run_on("int32 x;\nint32 y;\n");
        assert_eq!(out.text, "int32 x;\nint32 y;\n");
        assert!(out.asm_blocks.is_empty());
    }

    #[test]
    fn test_define_and_expand() {
        let out = run_on("#define N 42\nint32 x = N;\n");
        assert_eq!(out.text, "\nint32 x = 42;\n");
    }

    #[test]
    fn test_whole_word_boundaries() {
        let out = run_on("#define N 42\nint32 NN = N + xN;\n");
        assert_eq!(out.text, "\nint32 NN = 42 + xN;\n");
    }

    #[test]
    fn test_undef() {
        let out = run_on("#define N 42\nint32 a = N;\n#undef N\nint32 b = N;\n");
        assert_eq!(out.text, "\nint32 a = 42;\n\nint32 b = N;\n");
    }

    #[test]
    fn test_define_continuation() {
        let out = run_on("#define SUM 1 + \\\n2\nint32 x = SUM;\n");
        assert_eq!(out.text, "\nint32 x = 1 + 2;\n");
    }

    #[test]
    fn test_unknown_directive() {
        let dir = TempDir::new().expect("tempdir");
        let main = write_file(&dir, "main.e", "#frobnicate\n");
        let err = Preprocessor::new(Vec::new()).run(&main).unwrap_err();
        assert!(err.message.contains("unknown preprocessor directive"));
    }

    #[test]
    fn test_asm_capture() {
        let out = run_on("#asmstart(a, b)\nmov rax, [rdi]\nadd rax, [rsi]\n#asmend\n");
        assert_eq!(out.text, "asm;\n");
        assert_eq!(out.asm_blocks.len(), 1);
        assert_eq!(out.asm_blocks[0].params, vec!["a", "b"]);
        assert_eq!(
            out.asm_blocks[0].lines,
            vec!["mov rax, [rdi]", "add rax, [rsi]"]
        );
    }

    #[test]
    fn test_asm_lines_not_expanded() {
        let out = run_on("#define rax rbx\n#asmstart\nmov rax, 1\n#asmend\n");
        assert_eq!(out.asm_blocks[0].lines, vec!["mov rax, 1"]);
    }

    #[test]
    fn test_unterminated_asm_block() {
        let dir = TempDir::new().expect("tempdir");
        let main = write_file(&dir, "main.e", "#asmstart\nmov rax, 1\n");
        let err = Preprocessor::new(Vec::new()).run(&main).unwrap_err();
        assert!(err.message.contains("Unterminated asm block"));
    }

    #[test]
    fn test_stray_asmend() {
        let dir = TempDir::new().expect("tempdir");
        let main = write_file(&dir, "main.e", "#asmend\n");
        assert!(Preprocessor::new(Vec::new()).run(&main).is_err());
    }

    #[test]
    fn test_quoted_include_extracts_header_block() {
        let dir = TempDir::new().expect("tempdir");
        write_file(
            &dir,
            "lib.e",
            "header {\nfunction ping() -> int32;\n};\nfunction ping() -> int32 { return 1; };\n",
        );
        let main = write_file(&dir, "main.e", "#include \"lib.e\"\nint32 x;\n");
        let out = Preprocessor::new(Vec::new()).run(&main).expect("preprocess");
        assert!(out.text.contains("header {"));
        assert!(out.text.contains("function ping() -> int32;"));
        assert!(out.text.contains("};"));
        // Only the header block is spliced, never the definition
        assert!(!out.text.contains("return 1"));
    }

    #[test]
    fn test_angle_include_uses_roots() {
        let root = TempDir::new().expect("tempdir");
        write_file(&root, "sys.e", "header {\nint32 errno;\n};\n");
        let dir = TempDir::new().expect("tempdir");
        let main = write_file(&dir, "main.e", "#include <sys.e>\n");
        let out = Preprocessor::new(vec![root.path().to_path_buf()])
            .run(&main)
            .expect("preprocess");
        assert!(out.text.contains("int32 errno;"));
    }

    #[test]
    fn test_header_prefixed_identifier_is_expanded() {
        // An identifier that merely starts with "header" is an ordinary
        // line and still gets macro substitution
        let out = run_on("#define N 7\nheader_flag = N;\nheaderCheck(N);\n");
        assert_eq!(out.text, "\nheader_flag = 7;\nheaderCheck(7);\n");
    }

    #[test]
    fn test_include_skips_header_prefixed_identifiers() {
        let dir = TempDir::new().expect("tempdir");
        write_file(
            &dir,
            "lib.e",
            "headerCheck();\nheader {\nint32 g;\n};\nheader_flag = 1;\n",
        );
        let main = write_file(&dir, "main.e", "#include \"lib.e\"\n");
        let out = Preprocessor::new(Vec::new()).run(&main).expect("preprocess");
        assert!(out.text.contains("int32 g;"));
        // Only the real header block is spliced in
        assert!(!out.text.contains("headerCheck"));
        assert!(!out.text.contains("header_flag"));
    }

    #[test]
    fn test_include_define_continuation() {
        let dir = TempDir::new().expect("tempdir");
        write_file(&dir, "lib.e", "header {\n#define SUM 1 + \\\n2\n};\n");
        let main = write_file(&dir, "main.e", "#include \"lib.e\"\nint32 x = SUM;\n");
        let out = Preprocessor::new(Vec::new()).run(&main).expect("preprocess");
        assert!(out.text.contains("int32 x = 1 + 2;"));
    }

    #[test]
    fn test_include_defines_apply_to_includer() {
        let dir = TempDir::new().expect("tempdir");
        write_file(&dir, "lib.e", "header {\n#define MAX 8\n};\n");
        let main = write_file(&dir, "main.e", "#include \"lib.e\"\nint32 x = MAX;\n");
        let out = Preprocessor::new(Vec::new()).run(&main).expect("preprocess");
        assert!(out.text.contains("int32 x = 8;"));
    }

    #[test]
    fn test_missing_include_is_fatal() {
        let dir = TempDir::new().expect("tempdir");
        let main = write_file(&dir, "main.e", "#include \"nosuch.e\"\n");
        let err = Preprocessor::new(Vec::new()).run(&main).unwrap_err();
        assert!(err.message.contains("could not open include file"));
    }

    #[test]
    fn test_unterminated_include_path() {
        let dir = TempDir::new().expect("tempdir");
        let main = write_file(&dir, "main.e", "#include \"broken\n");
        let err = Preprocessor::new(Vec::new()).run(&main).unwrap_err();
        assert!(err.message.contains("unterminated include path"));
    }

    #[test]
    fn test_idempotent_on_preprocessed_text() {
        let first = run_on("#define N 7\nint32 x = N;\nheader {\nint32 g;\n};\n");
        let dir = TempDir::new().expect("tempdir");
        let again = write_file(&dir, "pre.e", &first.text);
        let second = Preprocessor::new(Vec::new()).run(&again).expect("preprocess");
        assert_eq!(first.text, second.text);
        assert!(!second.text.contains('#'));
    }
}
