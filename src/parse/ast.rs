//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the ents-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Abstract syntax tree for the ents compiler
//
// Tagged sums with exhaustive matching; every node carries its source
// position. Nodes exclusively own their children. The Display
// implementations re-emit parseable EntS source (the textual dump used by
// --dump-ast and the round-trip tests).
//

use crate::diag::Position;
use crate::types::StructMember;
use std::fmt;

// ============================================================================
// Operators
// ============================================================================

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    BitAnd,
    BitOr,
    LogAnd,
    LogOr,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::LogAnd => "&&",
            BinaryOp::LogOr => "||",
        }
    }

    /// Comparison operators lower through set<cc>
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Negation: -x
    Neg,
    /// Logical not: !x
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// An expression with its source position
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Self { kind, pos }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Numeric literal, kept as source text
    Number(String),

    /// String literal (quotes already stripped)
    Str(String),

    /// Variable reference
    Ident(String),

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Indexing: name[index]
    Index {
        name: String,
        index: Box<Expr>,
    },

    /// Memory addressing: [name] — reads through the address held in `name`
    MemoryAddress {
        name: String,
    },

    /// Struct member chain: base->a->b; evaluates to the member's address
    Member {
        base: String,
        path: Vec<String>,
    },

    /// Function call
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Number(text) => write!(f, "{}", text),
            ExprKind::Str(text) => write!(f, "\"{}\"", text),
            ExprKind::Ident(name) => write!(f, "{}", name),
            ExprKind::Unary { op, operand } => write!(f, "({}{})", op.symbol(), operand),
            ExprKind::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            ExprKind::Index { name, index } => write!(f, "{}[{}]", name, index),
            ExprKind::MemoryAddress { name } => write!(f, "[{}]", name),
            ExprKind::Member { base, path } => {
                write!(f, "{}", base)?;
                for member in path {
                    write!(f, "->{}", member)?;
                }
                Ok(())
            }
            ExprKind::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

/// A block of statements
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

/// One arm of a switch statement
#[derive(Debug, Clone)]
pub enum SwitchArm {
    Case {
        value: Expr,
        body: Block,
        pos: Position,
    },
    Default {
        body: Block,
        pos: Position,
    },
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// Nested block; produced only as an `else` branch
    Block(Block),

    /// `type name;` or `type [name];`
    VarDecl {
        type_name: String,
        name: String,
        by_addr: bool,
        pos: Position,
    },

    /// `type name = expr;` or `type [name] = expr;`
    VarDeclAssign {
        type_name: String,
        name: String,
        by_addr: bool,
        value: Expr,
        pos: Position,
    },

    /// `name = expr;`
    Assign {
        name: String,
        value: Expr,
        pos: Position,
    },

    /// `name[index] = expr;`
    IndexAssign {
        name: String,
        index: Expr,
        value: Expr,
        pos: Position,
    },

    /// `[name] = expr;` — writes through the address held in `name`
    MemoryAssign {
        name: String,
        value: Expr,
        pos: Position,
    },

    /// `base->a->b = expr;`
    MemberAssign {
        base: String,
        path: Vec<String>,
        value: Expr,
        pos: Position,
    },

    If {
        cond: Expr,
        then_block: Block,
        /// `Stmt::Block` for a plain else, `Stmt::If` for else-if chains
        else_branch: Option<Box<Stmt>>,
        pos: Position,
    },

    While {
        cond: Expr,
        body: Block,
        pos: Position,
    },

    Switch {
        cond: Expr,
        arms: Vec<SwitchArm>,
        pos: Position,
    },

    Return {
        value: Option<Expr>,
        pos: Position,
    },

    Break {
        pos: Position,
    },

    Continue {
        pos: Position,
    },

    /// `name++;`
    Increment {
        name: String,
        pos: Position,
    },

    /// `name--;`
    Decrement {
        name: String,
        pos: Position,
    },

    /// `name(args);`
    Call {
        name: String,
        args: Vec<Expr>,
        pos: Position,
    },

    /// Bare expression statement
    Expr(Expr),

    /// Captured asm block referenced by index
    InlineAsm {
        index: usize,
        pos: Position,
    },
}

// ============================================================================
// Top-level Items
// ============================================================================

/// A function parameter: `type name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub type_name: String,
    pub name: String,
}

/// Typedef right-hand side
#[derive(Debug, Clone)]
pub enum TypedefSource {
    /// `typedef old new;`
    Alias(String),
    /// `typedef struct { members } new;`
    Struct(Vec<StructMember>),
}

#[derive(Debug, Clone)]
pub enum Item {
    /// `header { items };`
    Header {
        items: Vec<Item>,
        pos: Position,
    },

    /// `function name(params) -> type;`
    Prototype {
        name: String,
        return_type: String,
        params: Vec<Param>,
        pos: Position,
    },

    /// `function name(params) -> type { body };`
    Function {
        name: String,
        return_type: String,
        params: Vec<Param>,
        body: Block,
        pos: Position,
    },

    Typedef {
        name: String,
        source: TypedefSource,
        pos: Position,
    },

    /// File-scope variable; never carries an initializer
    GlobalVar {
        type_name: String,
        name: String,
        by_addr: bool,
        pos: Position,
    },

    /// Captured asm block referenced by index
    InlineAsm {
        index: usize,
        pos: Position,
    },
}

/// A whole translation unit
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub items: Vec<Item>,
}

// ============================================================================
// Source Dump
// ============================================================================

const INDENT: &str = "    ";

fn write_indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str(INDENT)?;
    }
    Ok(())
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &[Param]) -> fmt::Result {
    write!(f, "(")?;
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{} {}", p.type_name, p.name)?;
    }
    write!(f, ")")
}

fn write_decl_name(f: &mut fmt::Formatter<'_>, name: &str, by_addr: bool) -> fmt::Result {
    if by_addr {
        write!(f, "[{}]", name)
    } else {
        write!(f, "{}", name)
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &Block, depth: usize) -> fmt::Result {
    writeln!(f, "{{")?;
    for stmt in &block.stmts {
        write_stmt(f, stmt, depth + 1)?;
    }
    write_indent(f, depth)?;
    write!(f, "}}")
}

/// Write an if-chain without its trailing semicolon; the semicolon follows
/// the whole chain.
fn write_if(
    f: &mut fmt::Formatter<'_>,
    cond: &Expr,
    then_block: &Block,
    else_branch: &Option<Box<Stmt>>,
    depth: usize,
) -> fmt::Result {
    write!(f, "if ({}) ", cond)?;
    write_block(f, then_block, depth)?;
    match else_branch.as_deref() {
        None => Ok(()),
        Some(Stmt::If {
            cond,
            then_block,
            else_branch,
            ..
        }) => {
            write!(f, " else ")?;
            write_if(f, cond, then_block, else_branch, depth)
        }
        Some(Stmt::Block(block)) => {
            write!(f, " else ")?;
            write_block(f, block, depth)
        }
        // Unreachable by construction
        Some(other) => {
            write!(f, " else ")?;
            write_stmt(f, other, depth)
        }
    }
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    write_indent(f, depth)?;
    match stmt {
        Stmt::Block(block) => {
            write_block(f, block, depth)?;
            writeln!(f)
        }
        Stmt::VarDecl {
            type_name,
            name,
            by_addr,
            ..
        } => {
            write!(f, "{} ", type_name)?;
            write_decl_name(f, name, *by_addr)?;
            writeln!(f, ";")
        }
        Stmt::VarDeclAssign {
            type_name,
            name,
            by_addr,
            value,
            ..
        } => {
            write!(f, "{} ", type_name)?;
            write_decl_name(f, name, *by_addr)?;
            writeln!(f, " = {};", value)
        }
        Stmt::Assign { name, value, .. } => writeln!(f, "{} = {};", name, value),
        Stmt::IndexAssign {
            name, index, value, ..
        } => writeln!(f, "{}[{}] = {};", name, index, value),
        Stmt::MemoryAssign { name, value, .. } => writeln!(f, "[{}] = {};", name, value),
        Stmt::MemberAssign {
            base, path, value, ..
        } => {
            write!(f, "{}", base)?;
            for member in path {
                write!(f, "->{}", member)?;
            }
            writeln!(f, " = {};", value)
        }
        Stmt::If {
            cond,
            then_block,
            else_branch,
            ..
        } => {
            write_if(f, cond, then_block, else_branch, depth)?;
            writeln!(f, ";")
        }
        Stmt::While { cond, body, .. } => {
            write!(f, "while ({}) ", cond)?;
            write_block(f, body, depth)?;
            writeln!(f, ";")
        }
        Stmt::Switch { cond, arms, .. } => {
            writeln!(f, "switch ({}) {{", cond)?;
            for arm in arms {
                write_indent(f, depth + 1)?;
                match arm {
                    SwitchArm::Case { value, body, .. } => {
                        write!(f, "case ({}) ", value)?;
                        write_block(f, body, depth + 1)?;
                        writeln!(f, ";")?;
                    }
                    SwitchArm::Default { body, .. } => {
                        write!(f, "default ")?;
                        write_block(f, body, depth + 1)?;
                        writeln!(f, ";")?;
                    }
                }
            }
            write_indent(f, depth)?;
            writeln!(f, "}};")
        }
        Stmt::Return { value, .. } => match value {
            Some(expr) => writeln!(f, "return {};", expr),
            None => writeln!(f, "return;"),
        },
        Stmt::Break { .. } => writeln!(f, "break;"),
        Stmt::Continue { .. } => writeln!(f, "continue;"),
        Stmt::Increment { name, .. } => writeln!(f, "{}++;", name),
        Stmt::Decrement { name, .. } => writeln!(f, "{}--;", name),
        Stmt::Call { name, args, .. } => {
            write!(f, "{}(", name)?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            writeln!(f, ");")
        }
        Stmt::Expr(expr) => writeln!(f, "{};", expr),
        Stmt::InlineAsm { .. } => writeln!(f, "asm;"),
    }
}

fn write_item(f: &mut fmt::Formatter<'_>, item: &Item, depth: usize) -> fmt::Result {
    write_indent(f, depth)?;
    match item {
        Item::Header { items, .. } => {
            writeln!(f, "header {{")?;
            for inner in items {
                write_item(f, inner, depth + 1)?;
            }
            write_indent(f, depth)?;
            writeln!(f, "}};")
        }
        Item::Prototype {
            name,
            return_type,
            params,
            ..
        } => {
            write!(f, "function {}", name)?;
            write_params(f, params)?;
            writeln!(f, " -> {};", return_type)
        }
        Item::Function {
            name,
            return_type,
            params,
            body,
            ..
        } => {
            write!(f, "function {}", name)?;
            write_params(f, params)?;
            write!(f, " -> {} ", return_type)?;
            write_block(f, body, depth)?;
            writeln!(f, ";")
        }
        Item::Typedef { name, source, .. } => match source {
            TypedefSource::Alias(old) => writeln!(f, "typedef {} {};", old, name),
            TypedefSource::Struct(members) => {
                writeln!(f, "typedef struct {{")?;
                for member in members {
                    write_indent(f, depth + 1)?;
                    writeln!(f, "{} {};", member.type_name, member.name)?;
                }
                write_indent(f, depth)?;
                writeln!(f, "}} {};", name)
            }
        },
        Item::GlobalVar {
            type_name,
            name,
            by_addr,
            ..
        } => {
            write!(f, "{} ", type_name)?;
            write_decl_name(f, name, *by_addr)?;
            writeln!(f, ";")
        }
        Item::InlineAsm { .. } => writeln!(f, "asm;"),
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            write_item(f, item, 0)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
