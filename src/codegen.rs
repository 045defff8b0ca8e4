//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the ents-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// x86-64 code generator for the ents compiler
//
// Tree-walking single pass producing Intel-syntax text assembly for the
// System V AMD64 ABI. Integer arguments travel in rdi, rsi, rdx, rcx, r8,
// r9; results in rax; rbp is the frame base; block frames are 16-byte
// aligned.
//
// Expressions use a two-register scheme: the left subtree is evaluated
// into rax and pushed, the right subtree is evaluated into rax, the left
// value is popped into rbx, and the operation is applied.
//

use crate::diag::{CompileError, CompileResult, Position};
use crate::parse::ast::{
    BinaryOp, Block, Expr, ExprKind, Item, Param, Program, Stmt, SwitchArm, UnaryOp,
};
use crate::token::AsmBlock;
use crate::types::TypeTable;
use std::collections::HashMap;

/// System V AMD64 integer argument registers, in order
pub const ARG_REGISTERS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

/// Offset of the first stack-passed argument above the saved base pointer
const FIRST_STACK_ARG_OFFSET: i32 = 16;

// ============================================================================
// Frame Slots
// ============================================================================

/// A variable the generator can address
enum VarSlot {
    /// rbp-relative frame offset (negative for locals and spilled register
    /// parameters, positive for stack-passed parameters)
    Local(i32),
    /// File-scope symbol
    Global(String),
}

/// A local recorded in the current frame
#[derive(Debug, Clone)]
struct LocalVar {
    offset: i32,
    type_name: String,
}

/// Labels consumed by break/continue. `start` is None for switch frames:
/// break targets the end label, continue skips to the nearest loop.
struct LoopFrame {
    start: Option<String>,
    end: String,
}

// ============================================================================
// Code Generator
// ============================================================================

pub struct CodeGenerator<'a> {
    /// Typedef and struct layout tables from the parser
    types: &'a TypeTable,
    /// Captured inline-asm blocks from the preprocessor
    asm_blocks: &'a [AsmBlock],
    /// Emitted assembly lines
    output: Vec<String>,
    /// Stack of per-block frames, innermost last
    frames: Vec<HashMap<String, LocalVar>>,
    /// Next free negative frame offset
    local_offset: i32,
    /// Bytes of live block allocation in the current function
    frame_bytes: i32,
    /// Monotonic counter for unique labels
    label_counter: u32,
    loop_stack: Vec<LoopFrame>,
    current_fn: String,
    /// Declared globals: name -> declared type
    globals: HashMap<String, String>,
    /// Interned string literals, emitted into .data at the end
    strings: Vec<String>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(types: &'a TypeTable, asm_blocks: &'a [AsmBlock]) -> Self {
        Self {
            types,
            asm_blocks,
            output: Vec::new(),
            frames: Vec::new(),
            local_offset: 0,
            frame_bytes: 0,
            label_counter: 0,
            loop_stack: Vec::new(),
            current_fn: String::new(),
            globals: HashMap::new(),
            strings: Vec::new(),
        }
    }

    /// Generate assembly for a whole translation unit
    pub fn generate(mut self, program: &Program) -> CompileResult<String> {
        for item in &program.items {
            self.gen_item(item)?;
        }
        self.emit_string_pool();
        let mut text = self.output.join("\n");
        text.push('\n');
        Ok(text)
    }

    fn gen_item(&mut self, item: &Item) -> CompileResult<()> {
        match item {
            Item::Function {
                name, params, body, ..
            } => self.gen_function(name, params, body),
            Item::GlobalVar {
                type_name,
                name,
                by_addr,
                pos,
            } => self.gen_global(type_name, name, *by_addr, *pos),
            Item::InlineAsm { index, pos } => self.gen_inline_asm(*index, false, *pos),
            Item::Header { items, .. } => {
                // Prototypes and typedefs are parser-side; globals declared
                // in this unit's header still get storage here
                for inner in items {
                    if let Item::GlobalVar {
                        type_name,
                        name,
                        by_addr,
                        pos,
                    } = inner
                    {
                        self.gen_global(type_name, name, *by_addr, *pos)?;
                    }
                }
                Ok(())
            }
            // Typedefs and prototypes emit nothing; the parser recorded them
            Item::Typedef { .. } | Item::Prototype { .. } => Ok(()),
        }
    }

    // ========================================================================
    // Emission Helpers
    // ========================================================================

    fn emit(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    fn new_label(&mut self) -> String {
        let label = format!("L{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    /// rbp-relative operand for a frame offset
    fn frame_operand(offset: i32) -> String {
        if offset < 0 {
            format!("[rbp-{}]", -offset)
        } else {
            format!("[rbp+{}]", offset)
        }
    }

    fn slot_operand(slot: &VarSlot) -> String {
        match slot {
            VarSlot::Local(offset) => Self::frame_operand(*offset),
            VarSlot::Global(name) => format!("[{}]", name),
        }
    }

    // ========================================================================
    // Variable Resolution
    // ========================================================================

    fn resolve_var(&self, name: &str, pos: Position) -> CompileResult<VarSlot> {
        for frame in self.frames.iter().rev() {
            if let Some(var) = frame.get(name) {
                return Ok(VarSlot::Local(var.offset));
            }
        }
        if self.globals.contains_key(name) {
            return Ok(VarSlot::Global(name.to_string()));
        }
        Err(CompileError::codegen(format!("Variable '{}' not defined.", name)).at(pos))
    }

    fn var_type(&self, name: &str, pos: Position) -> CompileResult<String> {
        for frame in self.frames.iter().rev() {
            if let Some(var) = frame.get(name) {
                return Ok(var.type_name.clone());
            }
        }
        if let Some(typ) = self.globals.get(name) {
            return Ok(typ.clone());
        }
        Err(CompileError::codegen(format!("Variable '{}' not defined.", name)).at(pos))
    }

    // ========================================================================
    // Sizes and Frame Layout
    // ========================================================================

    fn type_size(&self, type_name: &str, pos: Position) -> CompileResult<i32> {
        self.types
            .size_of(type_name)
            .map(|s| s as i32)
            .ok_or_else(|| {
                CompileError::codegen(format!("Unknown type size: {}", type_name)).at(pos)
            })
    }

    /// Frame slot for one local: its size rounded up to an 8-byte slot,
    /// matching the one-slot-per-parameter convention
    fn slot_size(&self, type_name: &str, pos: Position) -> CompileResult<i32> {
        let size = self.type_size(type_name, pos)?.max(1);
        Ok((size + 7) & !7)
    }

    /// Bytes a block allocates: the slots of its directly declared locals,
    /// rounded up to a multiple of 16
    fn block_frame_size(&self, block: &Block) -> CompileResult<i32> {
        let mut total = 0;
        for stmt in &block.stmts {
            match stmt {
                Stmt::VarDecl { type_name, pos, .. }
                | Stmt::VarDeclAssign { type_name, pos, .. } => {
                    total += self.slot_size(type_name, *pos)?;
                }
                _ => {}
            }
        }
        Ok((total + 15) & !15)
    }

    fn add_local(&mut self, name: &str, type_name: &str, pos: Position) -> CompileResult<i32> {
        let slot = self.slot_size(type_name, pos)?;
        self.local_offset -= slot;
        let offset = self.local_offset;
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(
                name.to_string(),
                LocalVar {
                    offset,
                    type_name: type_name.to_string(),
                },
            );
        }
        Ok(offset)
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn gen_function(&mut self, name: &str, params: &[Param], body: &Block) -> CompileResult<()> {
        self.current_fn = name.to_string();
        self.frames.clear();
        self.frame_bytes = 0;
        self.local_offset = -8 * params.len().min(ARG_REGISTERS.len()) as i32;

        self.emit("section .text");
        self.emit(format!(".global {}", name));
        self.emit(format!("{}:", name));
        self.emit("push rbp");
        self.emit("mov rbp, rsp");

        // The first six parameters are spilled to one 8-byte slot each,
        // below rsp in the red zone; the rest already live above rbp and
        // are not copied.
        let mut frame = HashMap::new();
        let mut stack_arg_offset = FIRST_STACK_ARG_OFFSET;
        for (i, param) in params.iter().enumerate() {
            let offset = if i < ARG_REGISTERS.len() {
                let offset = -8 * (i as i32 + 1);
                self.emit(format!(
                    "mov {}, {}",
                    Self::frame_operand(offset),
                    ARG_REGISTERS[i]
                ));
                offset
            } else {
                let offset = stack_arg_offset;
                stack_arg_offset += 8;
                offset
            };
            frame.insert(
                param.name.clone(),
                LocalVar {
                    offset,
                    type_name: param.type_name.clone(),
                },
            );
        }
        self.frames.push(frame);

        self.gen_block(body)?;

        self.emit(format!(".L_return_{}:", name));
        self.emit("leave");
        self.emit("ret");

        self.frames.pop();
        self.current_fn.clear();
        Ok(())
    }

    // ========================================================================
    // Blocks and Statements
    // ========================================================================

    fn gen_block(&mut self, block: &Block) -> CompileResult<()> {
        let size = self.block_frame_size(block)?;
        let saved_offset = self.local_offset;
        self.frames.push(HashMap::new());

        if size > 0 {
            self.emit(format!("sub rsp, {}", size));
            self.frame_bytes += size;
        }

        for stmt in &block.stmts {
            self.gen_stmt(stmt)?;
        }

        if size > 0 {
            self.emit(format!("add rsp, {}", size));
            self.frame_bytes -= size;
        }

        self.frames.pop();
        self.local_offset = saved_offset;
        Ok(())
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Block(block) => self.gen_block(block),

            Stmt::VarDecl {
                type_name,
                name,
                pos,
                ..
            } => {
                self.add_local(name, type_name, *pos)?;
                Ok(())
            }

            Stmt::VarDeclAssign {
                type_name,
                name,
                value,
                pos,
                ..
            } => {
                let offset = self.add_local(name, type_name, *pos)?;
                self.gen_expr(value)?;
                self.emit(format!("mov {}, rax", Self::frame_operand(offset)));
                Ok(())
            }

            Stmt::Assign { name, value, pos } => {
                self.gen_expr(value)?;
                let slot = self.resolve_var(name, *pos)?;
                self.emit(format!("mov {}, rax", Self::slot_operand(&slot)));
                Ok(())
            }

            Stmt::IndexAssign {
                name,
                index,
                value,
                pos,
            } => {
                // address = value(name) + index
                self.gen_expr(index)?;
                self.emit("push rax");
                let slot = self.resolve_var(name, *pos)?;
                self.emit(format!("mov rax, {}", Self::slot_operand(&slot)));
                self.emit("pop rbx");
                self.emit("add rax, rbx");
                self.emit("push rax");
                self.gen_expr(value)?;
                self.emit("pop rbx");
                self.emit("mov [rbx], rax");
                Ok(())
            }

            Stmt::MemoryAssign { name, value, pos } => {
                let slot = self.resolve_var(name, *pos)?;
                self.emit(format!("mov rax, {}", Self::slot_operand(&slot)));
                self.emit("push rax");
                self.gen_expr(value)?;
                self.emit("pop rbx");
                self.emit("mov [rbx], rax");
                Ok(())
            }

            Stmt::MemberAssign {
                base,
                path,
                value,
                pos,
            } => {
                self.gen_member_address(base, path, *pos)?;
                self.emit("push rax");
                self.gen_expr(value)?;
                self.emit("pop rbx");
                self.emit("mov [rbx], rax");
                Ok(())
            }

            Stmt::If {
                cond,
                then_block,
                else_branch,
                ..
            } => self.gen_if(cond, then_block, else_branch.as_deref()),

            Stmt::While { cond, body, .. } => self.gen_while(cond, body),

            Stmt::Switch { cond, arms, .. } => self.gen_switch(cond, arms),

            Stmt::Return { value, .. } => {
                if let Some(expr) = value {
                    self.gen_expr(expr)?;
                }
                if self.frame_bytes > 0 {
                    self.emit(format!("add rsp, {}", self.frame_bytes));
                }
                self.emit(format!("jmp .L_return_{}", self.current_fn));
                Ok(())
            }

            Stmt::Break { pos } => match self.loop_stack.last() {
                Some(frame) => {
                    let target = frame.end.clone();
                    self.emit(format!("jmp {}", target));
                    Ok(())
                }
                None => Err(
                    CompileError::codegen("Break statement not within a loop.").at(*pos)
                ),
            },

            Stmt::Continue { pos } => {
                let target = self
                    .loop_stack
                    .iter()
                    .rev()
                    .find_map(|frame| frame.start.clone());
                match target {
                    Some(label) => {
                        self.emit(format!("jmp {}", label));
                        Ok(())
                    }
                    None => Err(
                        CompileError::codegen("Continue statement not within a loop.").at(*pos)
                    ),
                }
            }

            Stmt::Increment { name, pos } => {
                let slot = self.resolve_var(name, *pos)?;
                self.emit(format!("inc qword {}", Self::slot_operand(&slot)));
                Ok(())
            }

            Stmt::Decrement { name, pos } => {
                let slot = self.resolve_var(name, *pos)?;
                self.emit(format!("dec qword {}", Self::slot_operand(&slot)));
                Ok(())
            }

            Stmt::Call { name, args, .. } => self.gen_call(name, args),

            Stmt::Expr(expr) => self.gen_expr(expr),

            Stmt::InlineAsm { index, pos } => self.gen_inline_asm(*index, true, *pos),
        }
    }

    fn gen_if(
        &mut self,
        cond: &Expr,
        then_block: &Block,
        else_branch: Option<&Stmt>,
    ) -> CompileResult<()> {
        let else_label = self.new_label();
        let end_label = self.new_label();

        self.gen_expr(cond)?;
        self.emit("cmp rax, 0");
        self.emit(format!("je {}", else_label));

        self.gen_block(then_block)?;
        self.emit(format!("jmp {}", end_label));

        self.emit(format!("{}:", else_label));
        if let Some(stmt) = else_branch {
            self.gen_stmt(stmt)?;
        }
        self.emit(format!("{}:", end_label));
        Ok(())
    }

    fn gen_while(&mut self, cond: &Expr, body: &Block) -> CompileResult<()> {
        let start_label = self.new_label();
        let end_label = self.new_label();

        self.loop_stack.push(LoopFrame {
            start: Some(start_label.clone()),
            end: end_label.clone(),
        });

        self.emit(format!("{}:", start_label));
        self.gen_expr(cond)?;
        self.emit("cmp rax, 0");
        self.emit(format!("je {}", end_label));

        self.gen_block(body)?;
        self.emit(format!("jmp {}", start_label));
        self.emit(format!("{}:", end_label));

        self.loop_stack.pop();
        Ok(())
    }

    /// Switch lowering: the value is evaluated once into rbx; each case
    /// value is compared in turn; bodies are emitted in arm order and fall
    /// through (an explicit break jumps to the end label).
    fn gen_switch(&mut self, cond: &Expr, arms: &[SwitchArm]) -> CompileResult<()> {
        let end_label = self.new_label();
        let default_label = arms
            .iter()
            .any(|arm| matches!(arm, SwitchArm::Default { .. }))
            .then(|| self.new_label());
        let case_labels: Vec<Option<String>> = arms
            .iter()
            .map(|arm| match arm {
                SwitchArm::Case { .. } => Some(self.new_label()),
                SwitchArm::Default { .. } => None,
            })
            .collect();

        self.gen_expr(cond)?;
        self.emit("mov rbx, rax");

        // Dispatch chain; rbx is saved around each case value because
        // expression evaluation clobbers it
        for (arm, label) in arms.iter().zip(&case_labels) {
            if let (SwitchArm::Case { value, .. }, Some(label)) = (arm, label) {
                self.emit("push rbx");
                self.gen_expr(value)?;
                self.emit("pop rbx");
                self.emit("cmp rbx, rax");
                self.emit(format!("je {}", label));
            }
        }
        match &default_label {
            Some(label) => self.emit(format!("jmp {}", label)),
            None => self.emit(format!("jmp {}", end_label)),
        }

        self.loop_stack.push(LoopFrame {
            start: None,
            end: end_label.clone(),
        });

        for (arm, label) in arms.iter().zip(&case_labels) {
            match arm {
                SwitchArm::Case { body, .. } => {
                    if let Some(label) = label {
                        self.emit(format!("{}:", label));
                    }
                    self.gen_block(body)?;
                }
                SwitchArm::Default { body, .. } => {
                    if let Some(label) = &default_label {
                        self.emit(format!("{}:", label));
                    }
                    self.gen_block(body)?;
                }
            }
        }

        self.loop_stack.pop();
        self.emit(format!("{}:", end_label));
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn gen_expr(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::Number(text) => {
                self.emit(format!("mov rax, {}", text));
                Ok(())
            }

            ExprKind::Str(text) => {
                let label = self.intern_string(text);
                self.emit(format!("mov rax, {}", label));
                Ok(())
            }

            ExprKind::Ident(name) => {
                let slot = self.resolve_var(name, expr.pos)?;
                self.emit(format!("mov rax, {}", Self::slot_operand(&slot)));
                Ok(())
            }

            ExprKind::Unary { op, operand } => {
                self.gen_expr(operand)?;
                match op {
                    UnaryOp::Neg => self.emit("neg rax"),
                    UnaryOp::Not => {
                        self.emit("cmp rax, 0");
                        self.emit("sete al");
                        self.emit("movzx rax, al");
                    }
                }
                Ok(())
            }

            ExprKind::Binary { op, left, right } => {
                self.gen_expr(left)?;
                self.emit("push rax");
                self.gen_expr(right)?;
                self.emit("pop rbx");
                self.gen_binary_op(*op);
                Ok(())
            }

            ExprKind::Index { name, index } => {
                // address = value(name) + index, then load
                self.gen_expr(index)?;
                self.emit("push rax");
                let slot = self.resolve_var(name, expr.pos)?;
                self.emit(format!("mov rax, {}", Self::slot_operand(&slot)));
                self.emit("pop rbx");
                self.emit("add rax, rbx");
                self.emit("mov rax, [rax]");
                Ok(())
            }

            ExprKind::MemoryAddress { name } => {
                let slot = self.resolve_var(name, expr.pos)?;
                self.emit(format!("mov rax, {}", Self::slot_operand(&slot)));
                self.emit("mov rax, [rax]");
                Ok(())
            }

            ExprKind::Member { base, path } => self.gen_member_address(base, path, expr.pos),

            ExprKind::Call { name, args } => self.gen_call(name, args),
        }
    }

    fn gen_binary_op(&mut self, op: BinaryOp) {
        match op {
            BinaryOp::Add => self.emit("add rax, rbx"),
            BinaryOp::Sub => self.emit("sub rax, rbx"),
            BinaryOp::Mul => self.emit("imul rax, rbx"),
            BinaryOp::Div => {
                self.emit("xor rdx, rdx");
                self.emit("idiv rbx");
            }
            BinaryOp::Mod => {
                self.emit("xor rdx, rdx");
                self.emit("idiv rbx");
                self.emit("mov rax, rdx");
            }
            BinaryOp::Eq => self.gen_compare("sete"),
            BinaryOp::Ne => self.gen_compare("setne"),
            BinaryOp::Lt => self.gen_compare("setl"),
            BinaryOp::Le => self.gen_compare("setle"),
            BinaryOp::Gt => self.gen_compare("setg"),
            BinaryOp::Ge => self.gen_compare("setge"),
            // No short-circuit is promised for the logical forms
            BinaryOp::BitAnd | BinaryOp::LogAnd => self.emit("and rax, rbx"),
            BinaryOp::BitOr | BinaryOp::LogOr => self.emit("or rax, rbx"),
        }
    }

    fn gen_compare(&mut self, set_insn: &str) {
        self.emit("cmp rax, rbx");
        self.emit(format!("{} al", set_insn));
        self.emit("movzx rax, al");
    }

    /// Compute a struct member's address into rax: the base variable's
    /// storage address plus the packed offsets along the member path.
    fn gen_member_address(
        &mut self,
        base: &str,
        path: &[String],
        pos: Position,
    ) -> CompileResult<()> {
        let slot = self.resolve_var(base, pos)?;
        match &slot {
            VarSlot::Local(offset) => {
                self.emit(format!("lea rax, {}", Self::frame_operand(*offset)));
            }
            VarSlot::Global(name) => {
                self.emit(format!("mov rax, {}", name));
            }
        }

        let mut current_type = self.var_type(base, pos)?;
        for member in path {
            if self.types.struct_members(&current_type).is_none() {
                return Err(CompileError::codegen(format!(
                    "Type '{}' is not a struct.",
                    current_type
                ))
                .at(pos));
            }
            let (offset, m) = self
                .types
                .member_offset(&current_type, member)
                .ok_or_else(|| {
                    CompileError::codegen(format!(
                        "Struct '{}' has no member '{}'.",
                        current_type, member
                    ))
                    .at(pos)
                })?;
            self.emit(format!("add rax, {}", offset));
            current_type = m.type_name.clone();
        }
        Ok(())
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Arguments are evaluated right to left; the first six land in the
    /// argument registers, the rest are pushed. The caller pops the stack
    /// arguments after the call.
    fn gen_call(&mut self, name: &str, args: &[Expr]) -> CompileResult<()> {
        for i in (0..args.len()).rev() {
            self.gen_expr(&args[i])?;
            if i < ARG_REGISTERS.len() {
                self.emit(format!("mov {}, rax", ARG_REGISTERS[i]));
            } else {
                self.emit("push rax");
            }
        }
        self.emit(format!("call {}", name));

        let stack_args = args.len().saturating_sub(ARG_REGISTERS.len());
        if stack_args > 0 {
            self.emit(format!("add rsp, {}", 8 * stack_args));
        }
        Ok(())
    }

    // ========================================================================
    // Globals and String Literals
    // ========================================================================

    fn gen_global(
        &mut self,
        type_name: &str,
        name: &str,
        by_addr: bool,
        pos: Position,
    ) -> CompileResult<()> {
        let size = self.type_size(type_name, pos)?;
        if by_addr {
            self.emit("section .bss");
            self.emit(format!("{} resb {}", name, size));
        } else {
            self.emit("section .data");
            let line = match size {
                1 => format!("{} db 0", name),
                2 => format!("{} dw 0", name),
                4 => format!("{} dd 0", name),
                8 => format!("{} dq 0", name),
                n => format!("{} times {} db 0", name, n),
            };
            self.emit(line);
        }
        self.globals.insert(name.to_string(), type_name.to_string());
        Ok(())
    }

    fn intern_string(&mut self, text: &str) -> String {
        let index = match self.strings.iter().position(|s| s == text) {
            Some(i) => i,
            None => {
                self.strings.push(text.to_string());
                self.strings.len() - 1
            }
        };
        format!("LC{}", index)
    }

    fn emit_string_pool(&mut self) {
        if self.strings.is_empty() {
            return;
        }
        self.emit("section .data");
        for (i, text) in self.strings.clone().iter().enumerate() {
            self.emit(format!("LC{} db \"{}\", 0", i, text));
        }
    }

    // ========================================================================
    // Inline Assembly
    // ========================================================================

    /// Emit a captured asm block verbatim. Bound parameters get their
    /// addresses loaded into the argument registers first.
    fn gen_inline_asm(
        &mut self,
        index: usize,
        in_function: bool,
        pos: Position,
    ) -> CompileResult<()> {
        let block = self
            .asm_blocks
            .get(index)
            .ok_or_else(|| CompileError::codegen("Asm block index out of range.").at(pos))?
            .clone();

        if !block.params.is_empty() && !in_function {
            return Err(CompileError::codegen(
                "Inline asm parameters require a function frame.",
            )
            .at(pos));
        }
        if block.params.len() > ARG_REGISTERS.len() {
            return Err(CompileError::codegen("Too many inline asm parameters.").at(pos));
        }

        for (i, param) in block.params.iter().enumerate() {
            let slot = self.resolve_var(param, pos)?;
            match &slot {
                VarSlot::Local(offset) => self.emit(format!(
                    "lea {}, {}",
                    ARG_REGISTERS[i],
                    Self::frame_operand(*offset)
                )),
                VarSlot::Global(name) => {
                    self.emit(format!("mov {}, {}", ARG_REGISTERS[i], name))
                }
            }
        }

        for line in &block.lines {
            self.emit(line.clone());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Parser;
    use crate::token::Lexer;

    fn gen_with_asm(src: &str, asm_blocks: &[AsmBlock]) -> CompileResult<String> {
        let tokens = Lexer::new(src).tokenize()?;
        let (program, types) = Parser::new(&tokens, asm_blocks.len()).parse_program()?;
        CodeGenerator::new(&types, asm_blocks).generate(&program)
    }

    fn gen(src: &str) -> String {
        gen_with_asm(src, &[]).expect("codegen failure")
    }

    /// Assert the needles appear in the output in order
    fn assert_in_order(asm: &str, needles: &[&str]) {
        let mut searched = asm;
        for needle in needles {
            match searched.find(needle) {
                Some(idx) => searched = &searched[idx + needle.len()..],
                None => panic!("missing (in order) {:?} in:\n{}", needle, asm),
            }
        }
    }

    #[test]
    fn test_simplest_function() {
        let asm = gen("function main(void) -> int32 { return 0; };");
        assert_in_order(
            &asm,
            &[
                "section .text",
                ".global main",
                "main:",
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

    #[test]
    fn test_empty_body_is_bare_prologue_and_epilogue() {
        let asm = gen("function f(void) -> void { };");
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
    fn test_arithmetic_and_locals() {
        let asm = gen("function f(int32 a, int32 b) -> int32 { int32 c = a + b; return c; };");
        assert_in_order(
            &asm,
            &[
                "mov [rbp-8], rdi",
                "mov [rbp-16], rsi",
                "sub rsp, 16",
                "mov rax, [rbp-8]",
                "push rax",
                "mov rax, [rbp-16]",
                "pop rbx",
                "add rax, rbx",
                "mov [rbp-24], rax",
                "mov rax, [rbp-24]",
                "add rsp, 16",
                "jmp .L_return_f",
            ],
        );
    }

    #[test]
    fn test_frame_alignment_multiple_of_16() {
        // Three int32 locals: three 8-byte slots -> 24, rounded to 32
        let asm = gen("function f(void) -> void { int32 a; int32 b; int32 c; };");
        assert_in_order(&asm, &["sub rsp, 32", "add rsp, 32"]);
    }

    #[test]
    fn test_rsp_balance_in_nested_blocks() {
        let asm = gen(
            "function f(int32 n) -> void { int32 a; while (n) { int32 b; n--; }; int32 c = 1; };",
        );
        let subs = asm.matches("sub rsp, 16").count();
        let adds = asm.matches("add rsp, 16").count();
        // Outer block (a + c -> 16) and loop body block (b -> 16)
        assert_eq!(subs, 2);
        assert_eq!(adds, 2);
    }

    #[test]
    fn test_seventh_parameter_at_rbp_plus_16() {
        let asm = gen(
            "function f(int64 a, int64 b, int64 c, int64 d, int64 e, int64 g, int64 h) -> int64 { return h; };",
        );
        assert_in_order(&asm, &["mov [rbp-48], r9", "mov rax, [rbp+16]"]);
        // Stack parameters are not copied
        assert!(!asm.contains("mov [rbp+16],"));
    }

    #[test]
    fn test_while_with_break() {
        let asm = gen("function g(void) -> void { while (1) { break; }; };");
        assert_in_order(
            &asm,
            &[
                "L0:",
                "mov rax, 1",
                "cmp rax, 0",
                "je L1",
                "jmp L1",
                "jmp L0",
                "L1:",
            ],
        );
    }

    #[test]
    fn test_break_outside_loop_is_fatal() {
        let err = gen_with_asm("function f(void) -> void { break; };", &[]).unwrap_err();
        assert!(err.message.contains("Break statement not within a loop"));
        assert!(err.pos.is_some());
    }

    #[test]
    fn test_continue_outside_loop_is_fatal() {
        let err = gen_with_asm("function f(void) -> void { continue; };", &[]).unwrap_err();
        assert!(err.message.contains("Continue statement not within a loop"));
    }

    #[test]
    fn test_continue_targets_loop_start() {
        let asm = gen("function f(int32 n) -> void { while (n) { continue; }; };");
        assert_in_order(&asm, &["L0:", "je L1", "jmp L0", "jmp L0", "L1:"]);
    }

    #[test]
    fn test_if_else_lowering() {
        let asm = gen("function f(int32 a) -> int32 { if (a) { return 1; } else { return 2; }; };");
        assert_in_order(
            &asm,
            &[
                "cmp rax, 0",
                "je L0",
                "mov rax, 1",
                "jmp .L_return_f",
                "jmp L1",
                "L0:",
                "mov rax, 2",
                "L1:",
            ],
        );
    }

    #[test]
    fn test_struct_member_assign() {
        let asm = gen(
            "typedef struct { int32 x; int32 y; } Point;\n\
             function f(void) -> void { Point p; p->y = 7; };",
        );
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

    #[test]
    fn test_unknown_struct_member_is_fatal() {
        let err = gen_with_asm(
            "typedef struct { int32 x; } P;\n\
             function f(void) -> void { P p; p->nope = 1; };",
            &[],
        )
        .unwrap_err();
        assert!(err.message.contains("has no member"));
    }

    #[test]
    fn test_member_of_non_struct_is_fatal() {
        let err = gen_with_asm(
            "function f(void) -> void { int32 x; x->y = 1; };",
            &[],
        )
        .unwrap_err();
        assert!(err.message.contains("is not a struct"));
    }

    #[test]
    fn test_comparison_lowering() {
        let asm = gen("function f(int32 a, int32 b) -> int32 { return a < b; };");
        assert_in_order(&asm, &["cmp rax, rbx", "setl al", "movzx rax, al"]);
    }

    #[test]
    fn test_unary_lowering() {
        let asm = gen("function f(int32 a) -> int32 { return -a; };");
        assert_in_order(&asm, &["mov rax, [rbp-8]", "neg rax"]);

        let asm = gen("function f(int32 a) -> int32 { return !a; };");
        assert_in_order(&asm, &["cmp rax, 0", "sete al", "movzx rax, al"]);
    }

    #[test]
    fn test_division_and_modulo() {
        let asm = gen("function f(int32 a, int32 b) -> int32 { return a / b; };");
        assert_in_order(&asm, &["xor rdx, rdx", "idiv rbx"]);

        let asm = gen("function f(int32 a, int32 b) -> int32 { return a % b; };");
        assert_in_order(&asm, &["xor rdx, rdx", "idiv rbx", "mov rax, rdx"]);
    }

    #[test]
    fn test_call_register_arguments_right_to_left() {
        let asm = gen(
            "function g(int32 a, int32 b) -> void { };\n\
             function f(void) -> void { g(1, 2); };",
        );
        assert_in_order(
            &asm,
            &["mov rax, 2", "mov rsi, rax", "mov rax, 1", "mov rdi, rax", "call g"],
        );
        // No stack arguments, no rsp adjustment after the call
        let after_call = &asm[asm.find("call g").unwrap()..];
        assert!(!after_call.contains("add rsp,"));
    }

    #[test]
    fn test_call_with_stack_argument() {
        let asm = gen(
            "function g(int64 a, int64 b, int64 c, int64 d, int64 e, int64 f, int64 h) -> void { };\n\
             function f(void) -> void { g(1, 2, 3, 4, 5, 6, 7); };",
        );
        assert_in_order(&asm, &["mov rax, 7", "push rax", "call g", "add rsp, 8"]);
    }

    #[test]
    fn test_switch_dispatch_and_fallthrough() {
        let asm = gen(
            "function f(int32 a) -> int32 {\n\
             switch (a) { case (1) { a = 10; break; }; case (2) { a = 20; }; default { a = 30; }; };\n\
             return a; };",
        );
        // end=L0, default=L1, cases L2, L3
        assert_in_order(
            &asm,
            &[
                "mov rbx, rax",
                "push rbx",
                "mov rax, 1",
                "pop rbx",
                "cmp rbx, rax",
                "je L2",
                "push rbx",
                "mov rax, 2",
                "pop rbx",
                "cmp rbx, rax",
                "je L3",
                "jmp L1",
                "L2:",
                "mov rax, 10",
                "jmp L0", // break
                "L3:",
                "mov rax, 20",
                "L1:",
                "mov rax, 30",
                "L0:",
            ],
        );
    }

    #[test]
    fn test_switch_without_default_jumps_to_end() {
        let asm = gen(
            "function f(int32 a) -> void { switch (a) { case (1) { a = 1; }; }; };",
        );
        assert_in_order(&asm, &["je L1", "jmp L0", "L1:", "L0:"]);
    }

    #[test]
    fn test_globals() {
        let asm = gen("int32 counter;\nuint64 [cursor];");
        assert_in_order(&asm, &["section .data", "counter dd 0"]);
        assert_in_order(&asm, &["section .bss", "cursor resb 8"]);
    }

    #[test]
    fn test_struct_global_uses_times() {
        let asm = gen("typedef struct { int32 x; int32 y; int32 z; } V3;\nV3 origin;");
        assert_in_order(&asm, &["section .data", "origin times 12 db 0"]);
    }

    #[test]
    fn test_global_access_in_function() {
        let asm = gen("int32 counter;\nfunction f(void) -> void { counter = 5; counter++; };");
        assert_in_order(&asm, &["mov rax, 5", "mov [counter], rax", "inc qword [counter]"]);
    }

    #[test]
    fn test_memory_addressing_forms() {
        let asm = gen(
            "function f(int64 p) -> int64 { [p] = 1; int64 x = [p]; return x; };",
        );
        assert_in_order(
            &asm,
            &[
                // [p] = 1
                "mov rax, [rbp-8]",
                "push rax",
                "mov rax, 1",
                "pop rbx",
                "mov [rbx], rax",
                // x = [p]
                "mov rax, [rbp-8]",
                "mov rax, [rax]",
            ],
        );
    }

    #[test]
    fn test_index_lowering() {
        let asm = gen("function f(int64 p, int64 i) -> int64 { p[i] = 2; return p[i]; };");
        assert_in_order(
            &asm,
            &[
                // p[i] = 2
                "mov rax, [rbp-16]",
                "push rax",
                "mov rax, [rbp-8]",
                "pop rbx",
                "add rax, rbx",
                "push rax",
                "mov rax, 2",
                "pop rbx",
                "mov [rbx], rax",
                // return p[i]
                "add rax, rbx",
                "mov rax, [rax]",
            ],
        );
    }

    #[test]
    fn test_string_literals_interned() {
        let asm = gen(
            "function g(int64 s) -> void { };\n\
             function f(void) -> void { g(\"hi\"); g(\"hi\"); };",
        );
        assert_in_order(&asm, &["mov rax, LC0", "mov rax, LC0", "LC0 db \"hi\", 0"]);
        assert_eq!(asm.matches("LC0 db").count(), 1);
    }

    #[test]
    fn test_inline_asm_emitted_verbatim() {
        let blocks = vec![AsmBlock {
            params: vec!["x".to_string()],
            lines: vec!["mov rax, [rdi]".to_string(), "inc rax".to_string()],
        }];
        let asm = gen_with_asm(
            "function f(int64 x) -> void { asm; };",
            &blocks,
        )
        .expect("codegen");
        assert_in_order(
            &asm,
            &["lea rdi, [rbp-8]", "mov rax, [rdi]", "inc rax"],
        );
    }

    #[test]
    fn test_inline_asm_params_outside_function_fatal() {
        let blocks = vec![AsmBlock {
            params: vec!["x".to_string()],
            lines: vec!["nop".to_string()],
        }];
        let err = gen_with_asm("asm;", &blocks).unwrap_err();
        assert!(err.message.contains("require a function frame"));
    }

    #[test]
    fn test_unknown_type_size_is_fatal() {
        let err = gen_with_asm("function f(void) -> void { void v; };", &[]).unwrap_err();
        assert!(err.message.contains("Unknown type size"));
    }

    #[test]
    fn test_single_return_label_per_function() {
        let asm = gen(
            "function f(int32 a) -> int32 { if (a) { return 1; }; return 2; };\n\
             function g(void) -> void { };",
        );
        assert_eq!(asm.matches(".L_return_f:").count(), 1);
        assert_eq!(asm.matches(".L_return_g:").count(), 1);
        assert_eq!(asm.matches("jmp .L_return_f").count(), 2);
    }

    #[test]
    fn test_typedef_resolves_in_frame_layout() {
        let asm = gen("typedef int64 word;\nfunction f(void) -> void { word w = 1; };");
        assert_in_order(&asm, &["sub rsp, 16", "mov [rbp-8], rax"]);
    }
}
