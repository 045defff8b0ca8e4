//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the ents-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Parser unit tests
//

use super::ast::{BinaryOp, ExprKind, Item, Program, Stmt, SwitchArm, TypedefSource, UnaryOp};
use super::parser::Parser;
use crate::diag::{Category, CompileResult};
use crate::token::Lexer;
use crate::types::TypeTable;

fn parse(input: &str) -> CompileResult<(Program, TypeTable)> {
    parse_with_asm(input, 0)
}

fn parse_with_asm(input: &str, asm_blocks: usize) -> CompileResult<(Program, TypeTable)> {
    let tokens = Lexer::new(input).tokenize()?;
    Parser::new(&tokens, asm_blocks).parse_program()
}

fn parse_ok(input: &str) -> Program {
    match parse(input) {
        Ok((program, _)) => program,
        Err(e) => panic!("parse failed: {}", e),
    }
}

/// Parse a single statement inside a wrapper function and return it
fn parse_stmt(stmt_src: &str) -> Stmt {
    let src = format!(
        "function wrap(int32 a, int32 b) -> void {{ {} }};",
        stmt_src
    );
    let program = parse_ok(&src);
    match &program.items[0] {
        Item::Function { body, .. } => body.stmts[0].clone(),
        other => panic!("expected function, got {:?}", other),
    }
}

fn parse_expr(expr_src: &str) -> ExprKind {
    match parse_stmt(&format!("a = {};", expr_src)) {
        Stmt::Assign { value, .. } => value.kind,
        other => panic!("expected assignment, got {:?}", other),
    }
}

// ========================================================================
// Top-level items
// ========================================================================

#[test]
fn test_simple_function() {
    let program = parse_ok("function main(void) -> int32 { return 0; };");
    assert_eq!(program.items.len(), 1);
    match &program.items[0] {
        Item::Function {
            name,
            return_type,
            params,
            body,
            ..
        } => {
            assert_eq!(name, "main");
            assert_eq!(return_type, "int32");
            assert!(params.is_empty());
            assert_eq!(body.stmts.len(), 1);
            assert!(matches!(body.stmts[0], Stmt::Return { value: Some(_), .. }));
        }
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn test_function_parameters() {
    let program = parse_ok("function f(int32 a, int32 b) -> int32 { return a; };");
    match &program.items[0] {
        Item::Function { params, .. } => {
            assert_eq!(params.len(), 2);
            assert_eq!(params[0].type_name, "int32");
            assert_eq!(params[0].name, "a");
            assert_eq!(params[1].name, "b");
        }
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn test_empty_parens_parameters() {
    let program = parse_ok("function f() -> void { };");
    match &program.items[0] {
        Item::Function { params, .. } => assert!(params.is_empty()),
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn test_missing_function_semicolon() {
    let err = parse("function f() -> void { }").unwrap_err();
    assert_eq!(err.category, Category::Syntax);
    assert!(err.message.contains("Expect ';' after function declaration"));
}

#[test]
fn test_duplicate_function() {
    let err = parse("function f() -> void { }; function f() -> void { };").unwrap_err();
    assert_eq!(err.category, Category::Semantic);
    assert!(err.message.contains("Duplicated function name"));
}

#[test]
fn test_prototype_then_definition() {
    let program = parse_ok(
        "header { function ping() -> int32; };\n\
         function ping() -> int32 { return 1; };",
    );
    assert_eq!(program.items.len(), 2);
    assert!(matches!(&program.items[0], Item::Header { items, .. } if items.len() == 1));
}

#[test]
fn test_prototype_arity_mismatch() {
    let err = parse(
        "header { function f(int32 a) -> int32; };\n\
         function f(int32 a, int32 b) -> int32 { return a; };",
    )
    .unwrap_err();
    assert_eq!(err.category, Category::Semantic);
}

#[test]
fn test_header_rejects_initializer() {
    let err = parse("header { int32 x = 1; };").unwrap_err();
    assert!(err
        .message
        .contains("Header does not allow global variable initialization"));
}

#[test]
fn test_global_initializer_rejected() {
    let err = parse("int32 x = 1;").unwrap_err();
    assert!(err.message.contains("Global variables can not be initialized"));
}

#[test]
fn test_global_and_address_global() {
    let program = parse_ok("int32 counter;\nuint64 [cursor];");
    match (&program.items[0], &program.items[1]) {
        (
            Item::GlobalVar {
                name: a,
                by_addr: false,
                ..
            },
            Item::GlobalVar {
                name: b,
                by_addr: true,
                ..
            },
        ) => {
            assert_eq!(a, "counter");
            assert_eq!(b, "cursor");
        }
        other => panic!("expected globals, got {:?}", other),
    }
}

#[test]
fn test_typedef_alias() {
    let (_, types) = parse("typedef int32 myint;\nmyint g;").expect("parse");
    assert!(types.is_type("myint"));
    assert_eq!(types.resolve("myint"), "int32");
}

#[test]
fn test_typedef_struct() {
    let (program, types) =
        parse("typedef struct { int32 x; int32 y; } Point;").expect("parse");
    match &program.items[0] {
        Item::Typedef {
            name,
            source: TypedefSource::Struct(members),
            ..
        } => {
            assert_eq!(name, "Point");
            assert_eq!(members.len(), 2);
        }
        other => panic!("expected struct typedef, got {:?}", other),
    }
    assert_eq!(types.size_of("Point"), Some(8));
    assert_eq!(types.member_offset("Point", "y").unwrap().0, 4);
}

#[test]
fn test_duplicate_struct_member() {
    let err = parse("typedef struct { int32 x; int32 x; } P;").unwrap_err();
    assert!(err.message.contains("Duplicated struct member name"));
}

#[test]
fn test_anonymous_struct_rejected() {
    let err = parse("typedef struct { int32 x; };").unwrap_err();
    assert!(err.message.contains("Anonymous struct"));
}

#[test]
fn test_redefine_type_rejected() {
    let err = parse("typedef int32 int64;").unwrap_err();
    assert!(err.message.contains("Can not redefine type"));
    let err = parse("typedef int32 t;\ntypedef int16 t;").unwrap_err();
    assert!(err.message.contains("Can not redefine type"));
}

#[test]
fn test_unknown_top_level_token() {
    let err = parse("return 0;").unwrap_err();
    assert!(err.message.contains("Expect statement"));
}

// ========================================================================
// Statements
// ========================================================================

#[test]
fn test_var_decl_forms() {
    assert!(matches!(
        parse_stmt("int32 x;"),
        Stmt::VarDecl { by_addr: false, .. }
    ));
    assert!(matches!(
        parse_stmt("int32 [x];"),
        Stmt::VarDecl { by_addr: true, .. }
    ));
    assert!(matches!(
        parse_stmt("int32 x = 1;"),
        Stmt::VarDeclAssign { by_addr: false, .. }
    ));
    assert!(matches!(
        parse_stmt("int32 [x] = 1;"),
        Stmt::VarDeclAssign { by_addr: true, .. }
    ));
}

#[test]
fn test_duplicate_variable() {
    let err = parse("function f() -> void { int32 x; int32 x; };").unwrap_err();
    assert!(err.message.contains("Duplicated variable name"));
}

#[test]
fn test_parameter_shadow_rejected() {
    let err = parse("function f(int32 x) -> void { int32 x; };").unwrap_err();
    assert!(err.message.contains("Duplicated variable name"));
}

#[test]
fn test_assignment_statements() {
    assert!(matches!(parse_stmt("a = 1;"), Stmt::Assign { .. }));
    assert!(matches!(parse_stmt("a[2] = 1;"), Stmt::IndexAssign { .. }));
    assert!(matches!(parse_stmt("[a] = 1;"), Stmt::MemoryAssign { .. }));
    assert!(matches!(parse_stmt("a++;"), Stmt::Increment { .. }));
    assert!(matches!(parse_stmt("a--;"), Stmt::Decrement { .. }));
}

#[test]
fn test_member_assign_chain() {
    match parse_stmt("a->x->y = 3;") {
        Stmt::MemberAssign { base, path, .. } => {
            assert_eq!(base, "a");
            assert_eq!(path, vec!["x".to_string(), "y".to_string()]);
        }
        other => panic!("expected member assign, got {:?}", other),
    }
}

#[test]
fn test_undefined_name_statement() {
    let err = parse("function f() -> void { nope = 1; };").unwrap_err();
    assert!(err.message.contains("Undefined variable or function name"));
}

#[test]
fn test_memory_assign_requires_declared_name() {
    let err = parse("function f() -> void { [nope] = 1; };").unwrap_err();
    assert!(err.message.contains("Undefined variable name"));
}

#[test]
fn test_if_else_chain() {
    let stmt = parse_stmt("if (a) { b = 1; } else if (b) { a = 1; } else { a = 2; };");
    match stmt {
        Stmt::If { else_branch, .. } => {
            let else_if = else_branch.expect("else branch");
            match *else_if {
                Stmt::If { else_branch, .. } => {
                    assert!(matches!(else_branch.as_deref(), Some(Stmt::Block(_))));
                }
                other => panic!("expected else-if, got {:?}", other),
            }
        }
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn test_while_statement() {
    assert!(matches!(parse_stmt("while (1) { break; };"), Stmt::While { .. }));
}

#[test]
fn test_switch_arms() {
    let stmt = parse_stmt(
        "switch (a) { case (1) { b = 1; }; case (2) { b = 2; }; default { b = 3; }; };",
    );
    match stmt {
        Stmt::Switch { arms, .. } => {
            assert_eq!(arms.len(), 3);
            assert!(matches!(arms[0], SwitchArm::Case { .. }));
            assert!(matches!(arms[2], SwitchArm::Default { .. }));
        }
        other => panic!("expected switch, got {:?}", other),
    }
}

#[test]
fn test_default_must_be_last() {
    let err = parse(
        "function f(int32 a) -> void { switch (a) { default { }; case (1) { }; }; };",
    )
    .unwrap_err();
    assert!(err.message.contains("'default' must be the last switch arm"));
}

#[test]
fn test_block_scope_expires() {
    let err = parse(
        "function f(int32 a) -> void { while (a) { int32 t; }; t = 1; };",
    )
    .unwrap_err();
    assert!(err.message.contains("Undefined variable or function name"));
}

#[test]
fn test_call_statement() {
    let program = parse_ok(
        "function g(int32 x) -> void { };\n\
         function f() -> void { g(1); };",
    );
    match &program.items[1] {
        Item::Function { body, .. } => {
            assert!(matches!(&body.stmts[0], Stmt::Call { name, args, .. }
                if name == "g" && args.len() == 1));
        }
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn test_call_arity_checked() {
    let err = parse(
        "function g(int32 x) -> void { };\n\
         function f() -> void { g(1, 2); };",
    )
    .unwrap_err();
    assert!(err.message.contains("Wrong number of arguments"));
}

// ========================================================================
// Expressions
// ========================================================================

#[test]
fn test_binary_precedence() {
    // a + b * 2 parses as a + (b * 2)
    match parse_expr("a + b * 2") {
        ExprKind::Binary { op, right, .. } => {
            assert_eq!(op, BinaryOp::Add);
            assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            ));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_left_associativity() {
    // a - b - 1 parses as (a - b) - 1
    match parse_expr("a - b - 1") {
        ExprKind::Binary { op, left, .. } => {
            assert_eq!(op, BinaryOp::Sub);
            assert!(matches!(
                left.kind,
                ExprKind::Binary {
                    op: BinaryOp::Sub,
                    ..
                }
            ));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_logical_pairs() {
    match parse_expr("a && b || a") {
        ExprKind::Binary { op, left, .. } => {
            assert_eq!(op, BinaryOp::LogOr);
            assert!(matches!(
                left.kind,
                ExprKind::Binary {
                    op: BinaryOp::LogAnd,
                    ..
                }
            ));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_bitwise_binds_tighter_than_logical() {
    // a & b && a | b parses as (a & b) && (a | b)
    match parse_expr("a & b && a | b") {
        ExprKind::Binary { op, left, right } => {
            assert_eq!(op, BinaryOp::LogAnd);
            assert!(matches!(
                left.kind,
                ExprKind::Binary {
                    op: BinaryOp::BitAnd,
                    ..
                }
            ));
            assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOp::BitOr,
                    ..
                }
            ));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_comparison_and_modulo() {
    assert!(matches!(
        parse_expr("a <= b"),
        ExprKind::Binary {
            op: BinaryOp::Le,
            ..
        }
    ));
    assert!(matches!(
        parse_expr("a % 2"),
        ExprKind::Binary {
            op: BinaryOp::Mod,
            ..
        }
    ));
}

#[test]
fn test_unary_right_associative() {
    match parse_expr("--a") {
        // Statement form a-- is postfix; expression "- -a" nests
        ExprKind::Unary { op, operand } => {
            assert_eq!(op, UnaryOp::Neg);
            assert!(matches!(
                operand.kind,
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    ..
                }
            ));
        }
        other => panic!("expected unary, got {:?}", other),
    }
    assert!(matches!(
        parse_expr("!a"),
        ExprKind::Unary {
            op: UnaryOp::Not,
            ..
        }
    ));
}

#[test]
fn test_parenthesized_grouping() {
    // (a + b) * 2
    match parse_expr("(a + b) * 2") {
        ExprKind::Binary { op, left, .. } => {
            assert_eq!(op, BinaryOp::Mul);
            assert!(matches!(
                left.kind,
                ExprKind::Binary {
                    op: BinaryOp::Add,
                    ..
                }
            ));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_primary_forms() {
    assert!(matches!(parse_expr("42"), ExprKind::Number(t) if t == "42"));
    assert!(matches!(parse_expr("\"hi\""), ExprKind::Str(t) if t == "hi"));
    assert!(matches!(parse_expr("a"), ExprKind::Ident(n) if n == "a"));
    assert!(matches!(parse_expr("[a]"), ExprKind::MemoryAddress { .. }));
    assert!(matches!(parse_expr("a[b]"), ExprKind::Index { .. }));
    assert!(
        matches!(parse_expr("a->x->y"), ExprKind::Member { base, path }
            if base == "a" && path.len() == 2)
    );
}

#[test]
fn test_call_expression() {
    let program = parse_ok(
        "function g(int32 x) -> int32 { return x; };\n\
         function f(int32 a) -> int32 { return g(a) + 1; };",
    );
    match &program.items[1] {
        Item::Function { body, .. } => match &body.stmts[0] {
            Stmt::Return {
                value: Some(expr), ..
            } => {
                assert!(matches!(
                    expr.kind,
                    ExprKind::Binary {
                        op: BinaryOp::Add,
                        ..
                    }
                ));
            }
            other => panic!("expected return, got {:?}", other),
        },
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn test_undefined_name_in_expression() {
    let err = parse("function f(int32 a) -> void { a = nope; };").unwrap_err();
    assert!(err.message.contains("Undefined variable or function name"));
}

#[test]
fn test_index_requires_declared_name() {
    let err = parse("function f(int32 a) -> void { a = nope[1]; };").unwrap_err();
    assert!(err.message.contains("Undefined variable name"));
}

#[test]
fn test_error_carries_position_and_token() {
    let err = parse("function f() -> void { int32 x @ };").unwrap_err();
    // The lexer rejects '@' before the parser ever runs
    assert_eq!(err.category, Category::Lexical);
    assert!(err.pos.is_some());
}

// ========================================================================
// Inline asm placeholders
// ========================================================================

#[test]
fn test_asm_placeholder_indices() {
    let (program, _) = parse_with_asm(
        "asm;\nfunction f() -> void { asm; };",
        2,
    )
    .expect("parse");
    assert!(matches!(program.items[0], Item::InlineAsm { index: 0, .. }));
    match &program.items[1] {
        Item::Function { body, .. } => {
            assert!(matches!(body.stmts[0], Stmt::InlineAsm { index: 1, .. }));
        }
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn test_asm_placeholder_without_block() {
    let err = parse_with_asm("asm;", 0).unwrap_err();
    assert_eq!(err.category, Category::Preprocess);
}

// ========================================================================
// Round-trip through the textual dump
// ========================================================================

#[test]
fn test_dump_reparses_isomorphic() {
    let src = "\
header {
    function ping() -> int32;
    int32 shared;
};
typedef struct {
    int32 x;
    int32 y;
} Point;
typedef int32 myint;
int32 counter;
function ping() -> int32 {
    return 42;
};
function main(void) -> int32 {
    myint a = 1;
    Point p;
    int32 [buf];
    p->y = (a + 2);
    buf[a] = 3;
    [buf] = 4;
    a++;
    if (a < 3) {
        a = ping();
    } else {
        a = 0;
    };
    while (a) {
        a--;
    };
    switch (a) {
        case (1) {
            break;
        };
        default {
            a = 1;
        };
    };
    return a;
};
";
    let (program, _) = parse(src).expect("first parse");
    let dump = format!("{}", program);
    let (reparsed, _) = parse(&dump).expect("reparse of dump");
    let dump2 = format!("{}", reparsed);
    assert_eq!(dump, dump2);
}
