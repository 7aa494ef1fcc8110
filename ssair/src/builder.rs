//! Emission API used by language front-ends.
//!
//! A [`FunctionBuilder`] borrows the program mutably and emits into one
//! function at a time. Constants and undefined values float in the function
//! (they belong to no block); every other instruction is appended to the
//! current block.
use std::sync::Arc;

use log::warn;

use crate::{
    constants::ConstValue,
    instruction::{BinOp, BinaryOp, Call, If, InstKind, Instruction, Jump, Parameter, Phi, Return, UndefinedKind},
    operand::{BlockId, FunctionId, InstId},
    program::Program,
    range::SourceRange,
    value::Variable,
};

pub struct FunctionBuilder<'a> {
    program: &'a mut Program,
    function: FunctionId,
    current_block: Option<BlockId>,
    current_range: Option<SourceRange>,
}

impl<'a> FunctionBuilder<'a> {
    /// Builder positioned at the end of the entry block of `function`.
    pub fn new(program: &'a mut Program, function: FunctionId) -> Self {
        let current_block = program.function(function).and_then(|f| f.entry());
        if current_block.is_none() {
            warn!("FunctionBuilder: {} has no entry block", function);
        }
        Self {
            program,
            function,
            current_block,
            current_range: None,
        }
    }

    pub fn program(&self) -> &Program {
        &*self.program
    }

    pub fn program_mut(&mut self) -> &mut Program {
        &mut *self.program
    }

    pub fn function(&self) -> FunctionId {
        self.function
    }

    /// The value standing for the function being built.
    pub fn function_value(&self) -> Option<InstId> {
        self.program.function(self.function).map(|f| f.value)
    }

    pub fn current_block(&self) -> Option<BlockId> {
        self.current_block
    }

    pub fn set_current_block(&mut self, block: BlockId) {
        self.current_block = Some(block);
    }

    /// Range attached to every instruction emitted from now on.
    pub fn set_range(&mut self, range: Option<SourceRange>) {
        self.current_range = range;
    }

    /// Range of `start..end` in the file currently being built.
    pub fn range_of(&self, start: usize, end: usize) -> Option<SourceRange> {
        self.program
            .current_editor()
            .map(|editor| SourceRange::new(Arc::clone(editor), start, end))
    }

    pub fn new_block(&mut self, name: impl Into<String>) -> Option<BlockId> {
        self.program.new_block(self.function, name)
    }

    /// Create a closure nested in the current function.
    pub fn new_child_function(&mut self, name: impl Into<String>) -> FunctionId {
        self.program.new_function(name, Some(self.function))
    }

    fn prepare(&self, kind: InstKind) -> Instruction {
        let mut inst = Instruction::new(kind);
        inst.function = Some(self.function);
        if let Some(range) = &self.current_range {
            inst.range = Some(range.clone());
        }
        inst
    }

    fn emit_floating(&mut self, kind: InstKind) -> InstId {
        let inst = self.prepare(kind);
        self.program.insert_instruction(inst)
    }

    fn emit(&mut self, kind: InstKind) -> InstId {
        let inst = self.prepare(kind);
        let id = self.program.insert_instruction(inst);
        match self.current_block {
            Some(block) => {
                self.program.append_to_block(block, id);
            }
            None => warn!("emit: no current block in {}, {} left floating", self.function, id),
        }
        id
    }

    pub fn emit_const(&mut self, value: impl Into<ConstValue>) -> InstId {
        self.emit_floating(InstKind::Const(value.into()))
    }

    pub fn emit_undefined(&mut self, name: impl Into<String>) -> InstId {
        let id = self.emit_floating(InstKind::Undefined(UndefinedKind::Default));
        if let Some(inst) = self.program.get_mut(id) {
            inst.set_name(name);
        }
        id
    }

    /// Declare the next parameter of the function.
    pub fn emit_parameter(&mut self, name: impl Into<String>, is_free_value: bool) -> InstId {
        let index = self
            .program
            .function(self.function)
            .map(|f| f.params.len())
            .unwrap_or_default();
        let name = name.into();
        let id = self.emit_floating(InstKind::Parameter(Parameter { index, is_free_value }));
        if let Some(inst) = self.program.get_mut(id) {
            inst.set_name(name.clone());
        }
        if let Some(function) = self.program.function_mut(self.function) {
            function.params.push(id);
        }
        self.program.add_variable(id, name);
        id
    }

    pub fn emit_make(&mut self) -> InstId {
        self.emit(InstKind::Make)
    }

    pub fn emit_call(&mut self, method: InstId, args: Vec<InstId>) -> InstId {
        self.emit(InstKind::Call(Call { method, args }))
    }

    pub fn emit_binop(&mut self, op: BinaryOp, x: InstId, y: InstId) -> InstId {
        self.emit(InstKind::BinOp(BinOp { op, x, y }))
    }

    pub fn emit_phi(&mut self, edges: Vec<InstId>) -> InstId {
        self.emit(InstKind::Phi(Phi { edges }))
    }

    pub fn emit_return(&mut self, results: Vec<InstId>) -> InstId {
        self.emit(InstKind::Return(Return { results }))
    }

    /// Jump to `to` and record the control-flow edge.
    pub fn emit_jump(&mut self, to: BlockId) -> InstId {
        let id = self.emit(InstKind::Jump(Jump { to }));
        if let Some(from) = self.current_block {
            self.program.add_edge(from, to);
        }
        id
    }

    pub fn emit_if(&mut self, cond: InstId, then_block: BlockId, else_block: BlockId) -> InstId {
        let id = self.emit(InstKind::If(If {
            cond,
            then_block,
            else_block,
        }));
        if let Some(from) = self.current_block {
            self.program.add_edge(from, then_block);
            self.program.add_edge(from, else_block);
        }
        id
    }

    /// The value of `object[key]`.
    ///
    /// Reuses the existing member when the object already carries `key`
    /// (by identity, or by literal for string keys); otherwise creates an
    /// undefined member value and records it on the object.
    pub fn emit_member_access(&mut self, object: InstId, key: InstId) -> InstId {
        if let Some(member) = self.lookup_member(object, key) {
            return member;
        }

        let name = match self.program.get(key).and_then(|k| k.const_value()) {
            Some(ConstValue::Str(field)) => format!("{}.{}", self.short_name(object), field),
            _ => format!("{}[{}]", self.short_name(object), self.short_name(key)),
        };
        let member = self.emit_floating(InstKind::Undefined(UndefinedKind::Member));
        if let Some(inst) = self.program.get_mut(member) {
            inst.set_name(name);
        }
        self.program.set_member_access(member, object, key);
        self.program.add_member(object, key, member);
        member
    }

    /// `object[key] = value`.
    pub fn assign_member(&mut self, object: InstId, key: InstId, value: InstId) {
        let literal = self
            .program
            .get(key)
            .and_then(|k| k.const_value())
            .and_then(|c| c.as_str())
            .map(str::to_string);
        match literal {
            Some(field) if self.program.get_string_member(object, &field).is_some() => {
                self.program.set_string_member(object, &field, value)
            }
            _ => self.program.add_member(object, key, value),
        }
    }

    fn lookup_member(&self, object: InstId, key: InstId) -> Option<InstId> {
        let value = self.program.value(object)?;
        if let Some(member) = value.member(key) {
            return Some(member);
        }
        let field = self.program.get(key)?.const_value()?.as_str()?;
        self.program.get_string_member(object, field)
    }

    fn short_name(&self, id: InstId) -> String {
        self.program
            .get(id)
            .map(|i| i.short_verbose_name())
            .unwrap_or_else(|| id.to_string())
    }

    /// Bind `name` to `value`, latest binding last.
    pub fn assign_variable(&mut self, name: impl Into<String>, value: InstId) {
        let mut variable = Variable::new(name, value);
        variable.range = self.current_range.clone();
        match self.program.value_mut(value) {
            Some(v) => v.add_variable(variable),
            None => warn!("assign_variable: {} is not a value", value),
        }
    }

    /// Register how `id` is built on first demand.
    pub fn set_ordinal_build(&mut self, id: InstId, builder: impl FnOnce(&mut Program) -> Option<InstId> + 'static) {
        self.program.set_ordinal_build(id, builder);
    }

    /// Resolve `id` through its deferred builder.
    pub fn build_value(&mut self, id: InstId) -> Option<InstId> {
        self.program.build(id)
    }
}
