//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the ents-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// End-to-end pipeline tests for the ents compiler
//
// Each test drives preprocess -> lex -> parse -> generate through the
// library API and asserts on the emitted assembly text.
//

use ents::diag::Category;
use ents::token::{Lexer, Preprocessor};
use ents::{compile_file, compile_preprocessed, compile_source};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write test file");
    path
}

/// Assert the needles appear in the assembly in order
fn assert_in_order(asm: &str, needles: &[&str]) {
    let mut searched = asm;
    for needle in needles {
        match searched.find(needle) {
            Some(idx) => searched = &searched[idx + needle.len()..],
            None => panic!("missing (in order) {:?} in:\n{}", needle, asm),
        }
    }
}

// ========================================================================
// Scenario A - simplest function
// ========================================================================

#[test]
fn scenario_a_simplest_function() {
    let asm = compile_source("function main(void) -> int32 { return 0; };").expect("compile");
    assert_in_order(
        &asm,
        &[
            "push rbp",
            "mov rbp, rsp",
            "mov rax, 0",
            "jmp .L_return_main",
            ".L_return_main:",
            "leave",
            "ret",
        ],
    );
}

// ========================================================================
// Scenario B - arithmetic and locals
// ========================================================================

#[test]
fn scenario_b_arithmetic_and_locals() {
    let asm =
        compile_source("function f(int32 a, int32 b) -> int32 { int32 c = a + b; return c; };")
            .expect("compile");
    assert_in_order(
        &asm,
        &[
            "mov [rbp-8], rdi",
            "mov [rbp-16], rsi",
            "sub rsp, 16",
            "add rax, rbx",
            "mov [rbp-24], rax",
            "mov rax, [rbp-24]",
            "add rsp, 16",
            "jmp .L_return_f",
        ],
    );
}

// ========================================================================
// Scenario C - while + break
// ========================================================================

#[test]
fn scenario_c_while_break() {
    let asm = compile_source("function g(void) -> void { while (1) { break; }; };")
        .expect("compile");
    assert_in_order(&asm, &["L0:", "cmp rax, 0", "je L1", "jmp L1", "jmp L0", "L1:"]);
}

#[test]
fn scenario_c_break_outside_loop_fatal() {
    let err = compile_source("function g(void) -> void { break; };").unwrap_err();
    assert_eq!(err.category, Category::Codegen);
    assert!(err.message.contains("Break statement not within a loop"));
}

// ========================================================================
// Scenario D - typedef + struct
// ========================================================================

#[test]
fn scenario_d_struct_member_write() {
    let asm = compile_source(
        "typedef struct { int32 x; int32 y; } Point;\n\
         function f(void) -> void { Point p; p->y = 7; };",
    )
    .expect("compile");
    assert_in_order(
        &asm,
        &[
            "lea rax, [rbp-8]",
            "add rax, 4",
            "push rax",
            "mov rax, 7",
            "pop rbx",
            "mov [rbx], rax",
        ],
    );
}

// ========================================================================
// Scenario E - header include
// ========================================================================

#[test]
fn scenario_e_header_include_registers_prototype() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        &dir,
        "lib.e",
        "header {\n\
         function ping() -> int32;\n\
         };\n\
         function ping() -> int32 { return 99; };\n",
    );
    let main = write_file(
        &dir,
        "main.e",
        "#include \"lib.e\"\n\
         function ping() -> int32 { return 1; };\n\
         function main(void) -> int32 { return ping(); };\n",
    );

    let asm = compile_file(&main, &[]).expect("compile");
    assert_in_order(&asm, &[".global ping", "call ping"]);
    // The included definition never leaks in, only its prototype
    assert!(!asm.contains("mov rax, 99"));
}

#[test]
fn scenario_e_duplicate_definition_without_prototype() {
    let err = compile_source(
        "function ping() -> int32 { return 1; };\n\
         function ping() -> int32 { return 2; };",
    )
    .unwrap_err();
    assert!(err.message.contains("Duplicated function name"));
}

// ========================================================================
// Scenario F - preprocessor macros
// ========================================================================

#[test]
fn scenario_f_macro_expansion() {
    let dir = TempDir::new().expect("tempdir");
    let main = write_file(
        &dir,
        "main.e",
        "#define N 42\n\
         function main(void) -> int32 { int32 x = N; return x; };\n",
    );
    let asm = compile_file(&main, &[]).expect("compile");
    assert_in_order(&asm, &["mov rax, 42", "mov [rbp-8], rax"]);
}

#[test]
fn scenario_f_undef_makes_name_undefined() {
    let dir = TempDir::new().expect("tempdir");
    let main = write_file(
        &dir,
        "main.e",
        "#define N 42\n\
         #undef N\n\
         function main(void) -> int32 { int32 x = N; return x; };\n",
    );
    let err = compile_file(&main, &[]).unwrap_err();
    assert_eq!(err.category, Category::Semantic);
    assert!(err.message.contains("Undefined variable or function name"));
}

// ========================================================================
// Inline assembly through the whole pipeline
// ========================================================================

#[test]
fn inline_asm_end_to_end() {
    let dir = TempDir::new().expect("tempdir");
    let main = write_file(
        &dir,
        "main.e",
        "function bump(int64 v) -> void {\n\
         #asmstart(v)\n\
         inc qword [rdi]\n\
         #asmend\n\
         };\n",
    );
    let asm = compile_file(&main, &[]).expect("compile");
    assert_in_order(&asm, &["lea rdi, [rbp-8]", "inc qword [rdi]"]);
}

#[test]
fn angle_include_resolves_against_roots() {
    let root = TempDir::new().expect("tempdir");
    write_file(&root, "proto.e", "header {\nfunction stop() -> void;\n};\n");
    let dir = TempDir::new().expect("tempdir");
    let main = write_file(
        &dir,
        "main.e",
        "#include <proto.e>\n\
         function main(void) -> int32 { stop(); return 0; };\n",
    );
    let asm = compile_file(&main, &[root.path().to_path_buf()]).expect("compile");
    assert_in_order(&asm, &["call stop"]);
}

// ========================================================================
// Boundary behaviors
// ========================================================================

#[test]
fn empty_function_body_is_minimal() {
    let asm = compile_source("function f(void) -> void { };").expect("compile");
    let lines: Vec<&str> = asm.lines().collect();
    assert_eq!(
        lines,
        vec![
            "section .text",
            ".global f",
            "f:",
            "push rbp",
            "mov rbp, rsp",
            ".L_return_f:",
            "leave",
            "ret",
        ]
    );
}

#[test]
fn dead_while_zero_still_resolves_break() {
    let asm = compile_source("function f(void) -> void { while (0) { break; continue; }; };")
        .expect("compile");
    assert_in_order(&asm, &["L0:", "mov rax, 0", "je L1", "jmp L1", "jmp L0", "L1:"]);
}

#[test]
fn seventh_parameter_lives_at_rbp_plus_16() {
    let asm = compile_source(
        "function f(int64 a, int64 b, int64 c, int64 d, int64 e, int64 g, int64 h) -> int64 {\n\
         return h; };",
    )
    .expect("compile");
    assert_in_order(&asm, &["mov [rbp-48], r9", "mov rax, [rbp+16]"]);
}

// ========================================================================
// Invariants
// ========================================================================

#[test]
fn every_function_starts_with_sysv_prologue() {
    let asm = compile_source(
        "function a(void) -> void { };\n\
         function b(int32 x) -> int32 { return x; };",
    )
    .expect("compile");
    for name in ["a", "b"] {
        let idx = asm.find(&format!("{}:\n", name)).expect("function label");
        let after = &asm[idx..];
        assert_in_order(after, &["push rbp", "mov rbp, rsp"]);
        assert_eq!(asm.matches(&format!(".L_return_{}:", name)).count(), 1);
    }
}

#[test]
fn block_frame_sizes_are_sixteen_byte_multiples() {
    let asm = compile_source(
        "function f(void) -> void {\n\
         int8 a;\n\
         int16 b;\n\
         int64 c;\n\
         };",
    )
    .expect("compile");
    for line in asm.lines() {
        if let Some(rest) = line.strip_prefix("sub rsp, ") {
            let bytes: u32 = rest.parse().expect("numeric frame size");
            assert_eq!(bytes % 16, 0, "unaligned frame: {}", line);
        }
    }
}

#[test]
fn rsp_adjustments_balance_per_block() {
    let asm = compile_source(
        "function f(int32 n) -> void {\n\
         int32 a;\n\
         while (n) {\n\
         int32 b;\n\
         if (b) {\n\
         int32 c;\n\
         } else {\n\
         int32 d;\n\
         };\n\
         n--;\n\
         };\n\
         };",
    )
    .expect("compile");
    let subs: i64 = asm
        .lines()
        .filter_map(|l| l.strip_prefix("sub rsp, "))
        .map(|n| n.parse::<i64>().expect("size"))
        .sum();
    let adds: i64 = asm
        .lines()
        .filter_map(|l| l.strip_prefix("add rsp, "))
        .map(|n| n.parse::<i64>().expect("size"))
        .sum();
    assert_eq!(subs, adds);
}

#[test]
fn preprocessing_twice_is_a_no_op() {
    let dir = TempDir::new().expect("tempdir");
    let main = write_file(
        &dir,
        "main.e",
        "#define LIMIT 10\n\
         header {\n\
         int32 shared;\n\
         };\n\
         function main(void) -> int32 { return LIMIT; };\n",
    );
    let first = Preprocessor::new(Vec::new()).run(&main).expect("first run");
    assert!(!first.text.contains('#'));

    let again = write_file(&dir, "pre.e", &first.text);
    let second = Preprocessor::new(Vec::new()).run(&again).expect("second run");
    assert_eq!(first.text, second.text);
}

#[test]
fn token_stream_ends_with_single_eof() {
    let tokens = Lexer::new("function f() -> void { };")
        .tokenize()
        .expect("lex");
    let eof_count = tokens
        .iter()
        .filter(|t| t.typ == ents::token::TokenType::Eof)
        .count();
    assert_eq!(eof_count, 1);
    assert_eq!(tokens.last().unwrap().typ, ents::token::TokenType::Eof);
}

#[test]
fn preprocessed_placeholders_match_block_list() {
    let dir = TempDir::new().expect("tempdir");
    let main = write_file(
        &dir,
        "main.e",
        "#asmstart\nnop\n#asmend\n\
         function f(void) -> void {\n\
         #asmstart\ncli\n#asmend\n\
         };\n",
    );
    let pre = Preprocessor::new(Vec::new()).run(&main).expect("preprocess");
    assert_eq!(pre.text.matches("asm;").count(), pre.asm_blocks.len());
    let asm = compile_preprocessed(&pre.text, &pre.asm_blocks).expect("compile");
    assert_in_order(&asm, &["nop", "cli"]);
}

// ========================================================================
// Whole-program smoke test
// ========================================================================

#[test]
fn whole_program_compiles() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        &dir,
        "io.e",
        "header {\n\
         function put(int64 c) -> void;\n\
         };\n",
    );
    let main = write_file(
        &dir,
        "main.e",
        "#include \"io.e\"\n\
         #define STEP 2\n\
         typedef struct { int32 lo; int32 hi; } Range;\n\
         int32 total;\n\
         function clamp(int32 v, int32 max) -> int32 {\n\
         if (v > max) {\n\
         return max;\n\
         };\n\
         return v;\n\
         };\n\
         function main(void) -> int32 {\n\
         Range r;\n\
         int32 i = 0;\n\
         r->lo = 0;\n\
         r->hi = 8;\n\
         while (i < 10) {\n\
         i = i + STEP;\n\
         switch (i) {\n\
         case (4) {\n\
         break;\n\
         };\n\
         default {\n\
         put(i);\n\
         };\n\
         };\n\
         };\n\
         total = clamp(i, 8);\n\
         return total;\n\
         };\n",
    );

    let asm = compile_file(&main, &[]).expect("compile");
    assert_in_order(&asm, &[".global clamp", ".global main", "call put", "call clamp"]);
    assert_in_order(&asm, &["section .data", "total dd 0"]);
    // The macro expanded to its value
    assert!(asm.contains("mov rax, 2"));
    // Struct member writes hit lo (+0) and hi (+4)
    assert_in_order(&asm, &["add rax, 0", "add rax, 4"]);
}
