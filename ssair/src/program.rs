//! Program arena.
//!
//! A [`Program`] owns every instruction of one compiled program in a single
//! table keyed by [`InstId`], together with its functions and class
//! blueprints. All cross references between nodes (users, members, blocks,
//! points-to edges) are plain ids resolved through this table, so cycles in
//! the graph never turn into ownership cycles.
//!
//! Graph mutation that involves more than one node goes through `&mut
//! Program`. Operations never fail hard: a stale id or an unexpected node kind
//! is reported with a `log` warning and the operation degrades to a no-op.
use std::{collections::BTreeMap, sync::Arc};

use log::{debug, trace, warn};

use crate::{
    constants::ConstValue,
    deferred::{BuildFn, BuildState, DeferredBuild},
    function::Function,
    instruction::{BasicBlock, InstKind, Instruction, UndefinedKind},
    omap::OrderedMap,
    operand::{BlockId, FunctionId, InstId, ProgramId},
    range::SourceEditor,
    types::aggregate::ClassBlueprint,
    value::{Value, Variable},
};

/// Literal carried by the placeholder handed out to re-entrant builds.
pub const SPIN_VALUE: &str = "spin value";

/// Name of the sentinel substituted for a placeholder whose build produced
/// nothing.
pub const UNKNOWN_REPLACE_VALUE: &str = "unknown_replace_value";

#[derive(Debug)]
pub struct Program {
    pub(crate) id: ProgramId,
    pub(crate) name: String,
    pub(crate) next_id: i64,
    pub(crate) next_function: u32,
    pub(crate) instructions: BTreeMap<InstId, Instruction>,
    pub(crate) functions: BTreeMap<FunctionId, Function>,
    pub(crate) blueprints: BTreeMap<String, ClassBlueprint>,

    /// Files pulled in by include directives, in discovery order.
    pub(crate) include_files: OrderedMap<String, ()>,

    /// Editors of the files currently being built, innermost last.
    pub(crate) editors: Vec<Arc<SourceEditor>>,

    /// Every file built into this program, by url.
    pub(crate) files: OrderedMap<String, Arc<SourceEditor>>,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(ProgramId::new_random(), name)
    }

    pub fn with_id(id: ProgramId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            next_id: 1,
            next_function: 0,
            instructions: BTreeMap::new(),
            functions: BTreeMap::new(),
            blueprints: BTreeMap::new(),
            include_files: OrderedMap::new(),
            editors: Vec::new(),
            files: OrderedMap::new(),
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // --- instruction table ---

    /// Insert a detached node, assigning it the next id and registering it as
    /// a user of all its operands.
    pub fn insert_instruction(&mut self, mut inst: Instruction) -> InstId {
        let id = InstId(self.next_id);
        self.next_id += 1;

        inst.id = id;
        inst.program = Some(self.id);
        let operands = inst.operands();
        self.instructions.insert(id, inst);

        for operand in operands {
            self.add_user(operand, id);
        }
        trace!("Inserted instruction {} in program `{}`", id, self.name);
        id
    }

    /// Put back a node under a known id, as read from storage.
    ///
    /// The node is flagged `FROM_DB` and its deferred build is finished,
    /// resolved to itself. Users are not registered: rehydration restores
    /// user lists explicitly. Returns `false` if the id is taken.
    pub fn restore_instruction(&mut self, id: InstId, mut inst: Instruction) -> bool {
        if id.is_nil() || self.instructions.contains_key(&id) {
            warn!("Cannot restore instruction {}: id is nil or already in use", id);
            return false;
        }

        inst.id = id;
        inst.program = Some(self.id);
        inst.set_from_db(true);
        if let Some(value) = inst.value.as_mut() {
            value.deferred = DeferredBuild::finished(Some(id));
        }
        self.instructions.insert(id, inst);
        self.next_id = self.next_id.max(id.0 + 1);
        true
    }

    pub fn get(&self, id: InstId) -> Option<&Instruction> {
        self.instructions.get(&id)
    }

    pub fn get_mut(&mut self, id: InstId) -> Option<&mut Instruction> {
        self.instructions.get_mut(&id)
    }

    pub fn contains(&self, id: InstId) -> bool {
        self.instructions.contains_key(&id)
    }

    pub fn value(&self, id: InstId) -> Option<&Value> {
        self.instructions.get(&id).and_then(|i| i.value.as_ref())
    }

    pub fn value_mut(&mut self, id: InstId) -> Option<&mut Value> {
        self.instructions.get_mut(&id).and_then(|i| i.value.as_mut())
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.values()
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Same as `value_mut` but logs when `id` is not a live value.
    pub(crate) fn expect_value_mut(&mut self, id: InstId, context: &str) -> Option<&mut Value> {
        if self.value(id).is_none() {
            warn!("{}: {} is not a value of program `{}`", context, id, self.name);
            return None;
        }
        self.value_mut(id)
    }

    /// Remove a node from the program.
    ///
    /// Detaches it from its block, from its function's parameter list, from
    /// the user lists of its operands and from the points-to edges and masks
    /// of other values. Remaining users keep a stale reference, which is
    /// logged.
    pub fn delete_instruction(&mut self, id: InstId) -> bool {
        let Some(inst) = self.instructions.remove(&id) else {
            warn!("Cannot delete {}: no such instruction in program `{}`", id, self.name);
            return false;
        };

        if let Some(value) = inst.as_value() {
            if value.has_users() {
                warn!(
                    "Deleting {} while it is still used by {:?}",
                    inst.short_verbose_name(),
                    value.users()
                );
            }
        }

        if let Some(block) = inst.block {
            if let Some(InstKind::Block(body)) = self.instructions.get_mut(&block.0).map(|b| &mut b.kind) {
                body.instructions.retain(|i| *i != id);
            }
        }

        if let Some(function) = inst.function.and_then(|f| self.functions.get_mut(&f)) {
            function.params.retain(|p| *p != id);
            if inst.kind.is_block() {
                function.blocks.retain(|b| b.0 != id);
            }
        }

        let mut operands = inst.operands();
        operands.sort();
        operands.dedup();
        for operand in operands {
            if let Some(value) = self.value_mut(operand) {
                value.remove_user(id);
            }
        }
        self.detach_references(id);

        debug!("Deleted {} from program `{}`", inst.short_verbose_name(), self.name);
        true
    }

    pub fn source_code(&self, id: InstId) -> &str {
        self.get(id).map(|i| i.source_code()).unwrap_or("")
    }

    pub fn source_code_context(&self, id: InstId, n: usize) -> String {
        self.get(id)
            .map(|i| i.source_code_context(n))
            .unwrap_or_default()
    }

    // --- functions & blocks ---

    /// Create a function and its value. The function gets an `entry` block.
    pub fn new_function(&mut self, name: impl Into<String>, parent: Option<FunctionId>) -> FunctionId {
        let name = name.into();
        let fid = FunctionId(self.next_function);
        self.next_function += 1;

        let mut inst = Instruction::new(InstKind::Function(fid)).with_name(name.clone());
        inst.function = parent;
        let value = self.insert_instruction(inst);

        let mut function = Function::new(fid, name, value);
        function.parent = parent;
        self.functions.insert(fid, function);
        if let Some(parent) = parent.and_then(|p| self.functions.get_mut(&p)) {
            parent.children.push(fid);
        }

        self.new_block(fid, "entry");
        fid
    }

    /// Put back a function read from storage.
    pub fn restore_function(&mut self, function: Function) {
        self.next_function = self.next_function.max(function.id.0 + 1);
        self.functions.insert(function.id, function);
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(&id)
    }

    pub fn function_mut(&mut self, id: FunctionId) -> Option<&mut Function> {
        self.functions.get_mut(&id)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Find a function by name, first match in creation order.
    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.values().find(|f| f.name == name)
    }

    /// Append a new basic block to `function`.
    pub fn new_block(&mut self, function: FunctionId, name: impl Into<String>) -> Option<BlockId> {
        if !self.functions.contains_key(&function) {
            warn!("Cannot create block: {} is not a function of program `{}`", function, self.name);
            return None;
        }

        let mut inst = Instruction::new(InstKind::Block(BasicBlock::default())).with_name(name);
        inst.function = Some(function);
        let block = BlockId(self.insert_instruction(inst));
        if let Some(function) = self.functions.get_mut(&function) {
            function.blocks.push(block);
        }
        Some(block)
    }

    /// Typed handle to `id` if it is a live basic block.
    pub fn block_id(&self, id: InstId) -> Option<BlockId> {
        self.get(id)
            .filter(|i| i.kind.is_block())
            .map(|_| BlockId(id))
    }

    pub fn block(&self, block: BlockId) -> Option<&BasicBlock> {
        match self.get(block.0).map(|i| &i.kind) {
            Some(InstKind::Block(body)) => Some(body),
            _ => None,
        }
    }

    pub(crate) fn block_mut(&mut self, block: BlockId) -> Option<&mut BasicBlock> {
        match self.get_mut(block.0).map(|i| &mut i.kind) {
            Some(InstKind::Block(body)) => Some(body),
            _ => None,
        }
    }

    /// The block owning `id`. A stored back-reference that no longer names a
    /// live block is logged and yields `None`.
    pub fn get_block(&self, id: InstId) -> Option<BlockId> {
        let block = self.get(id)?.block?;
        if self.block(block).is_none() {
            warn!("get_block: back-reference {} of {} is not a live basic block", block, id);
            return None;
        }
        Some(block)
    }

    /// Set the owning block of `id`. Settable once: a second assignment to a
    /// different block is logged and ignored.
    pub fn set_block(&mut self, id: InstId, block: BlockId) -> bool {
        let Some(inst) = self.get_mut(id) else {
            warn!("set_block: no instruction {}", id);
            return false;
        };
        match inst.block {
            Some(current) if current != block => {
                warn!(
                    "set_block: {} already belongs to {}, ignoring {}",
                    id, current, block
                );
                false
            }
            _ => {
                inst.block = Some(block);
                true
            }
        }
    }

    /// Append `id` to the instruction list of `block`.
    pub fn append_to_block(&mut self, block: BlockId, id: InstId) -> bool {
        if !self.set_block(id, block) {
            return false;
        }
        match self.block_mut(block) {
            Some(body) => {
                if !body.instructions.contains(&id) {
                    body.instructions.push(id);
                }
                true
            }
            None => {
                warn!("append_to_block: {} is not a live basic block", block);
                false
            }
        }
    }

    /// Record a control-flow edge.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        if let Some(body) = self.block_mut(from) {
            if !body.succs.contains(&to) {
                body.succs.push(to);
            }
        }
        if let Some(body) = self.block_mut(to) {
            if !body.preds.contains(&from) {
                body.preds.push(from);
            }
        }
    }

    // --- blueprints ---

    /// Register a blueprint, replacing any previous one with the same name.
    pub fn add_blueprint(&mut self, blueprint: ClassBlueprint) {
        debug!("Registered blueprint `{}` in program `{}`", blueprint.name, self.name);
        self.blueprints.insert(blueprint.name.clone(), blueprint);
    }

    pub fn blueprint(&self, name: &str) -> Option<&ClassBlueprint> {
        self.blueprints.get(name)
    }

    pub fn blueprint_mut(&mut self, name: &str) -> Option<&mut ClassBlueprint> {
        self.blueprints.get_mut(name)
    }

    pub fn blueprints(&self) -> impl Iterator<Item = &ClassBlueprint> {
        self.blueprints.values()
    }

    // --- members ---

    /// Set `obj[key] = value`, registering `obj` as a user of both.
    pub fn add_member(&mut self, obj: InstId, key: InstId, value: InstId) {
        let Some(members) = self.expect_value_mut(obj, "add_member").map(|v| &mut v.members) else {
            return;
        };
        let previous = members.set(key, value);

        self.add_user(key, obj);
        self.add_user(value, obj);
        if let Some(previous) = previous.filter(|p| *p != value) {
            self.release_operand(previous, obj);
        }
    }

    /// Remove the member keyed by `key` (by identity) and return its value.
    pub fn delete_member(&mut self, obj: InstId, key: InstId) -> Option<InstId> {
        let removed = self
            .expect_value_mut(obj, "delete_member")?
            .members
            .delete(&key)?;
        self.release_operand(key, obj);
        self.release_operand(removed, obj);
        Some(removed)
    }

    /// Member lookup by string literal. Scans member keys and compares the
    /// literal of constant keys, so equal literals carried by distinct
    /// constant nodes match.
    pub fn get_string_member(&self, obj: InstId, key: &str) -> Option<InstId> {
        self.string_member_keys(obj, key)
            .first()
            .and_then(|k| self.value(obj)?.member(*k))
    }

    /// Update every member whose constant key carries the literal `key`.
    /// Nothing happens when no key matches.
    pub fn set_string_member(&mut self, obj: InstId, key: &str, value: InstId) {
        for k in self.string_member_keys(obj, key) {
            self.add_member(obj, k, value);
        }
    }

    fn string_member_keys(&self, obj: InstId, key: &str) -> Vec<InstId> {
        let Some(members) = self.value(obj).map(|v| v.members()) else {
            return Vec::new();
        };
        members
            .keys()
            .filter(|k| {
                self.get(**k)
                    .and_then(|i| i.const_value())
                    .and_then(|c| c.as_str())
                    == Some(key)
            })
            .copied()
            .collect()
    }

    /// Mark `id` as the access `object[key]`.
    pub fn set_member_access(&mut self, id: InstId, object: InstId, key: InstId) {
        let Some(value) = self.expect_value_mut(id, "set_member_access") else {
            return;
        };
        let previous = [value.object.replace(object), value.key.replace(key)];

        self.add_user(object, id);
        self.add_user(key, id);
        for previous in previous.into_iter().flatten() {
            self.release_operand(previous, id);
        }
    }

    // --- variables, masks, points-to ---

    pub fn add_variable(&mut self, id: InstId, name: impl Into<String>) {
        let variable = Variable::new(name, id);
        if let Some(value) = self.expect_value_mut(id, "add_variable") {
            value.add_variable(variable);
        }
    }

    pub fn add_mask(&mut self, id: InstId, masked_by: InstId) {
        if let Some(value) = self.expect_value_mut(id, "add_mask") {
            value.add_mask(masked_by);
        }
    }

    /// Record that `ptr` points to `target`.
    pub fn point(&mut self, ptr: InstId, target: InstId) {
        if self.value(target).is_none() {
            warn!("point: target {} is not a value", target);
            return;
        }
        let Some(value) = self.expect_value_mut(ptr, "point") else {
            return;
        };
        value.set_reference(target);
        if let Some(value) = self.value_mut(target) {
            value.add_pointer(ptr);
        }
    }

    // --- deferred construction ---

    /// Register how `id` is built. Replaces a previously registered closure
    /// that did not run yet.
    pub fn set_ordinal_build(&mut self, id: InstId, builder: impl FnOnce(&mut Program) -> Option<InstId> + 'static) {
        let builder: BuildFn = Box::new(builder);
        let Some(value) = self.expect_value_mut(id, "set_ordinal_build") else {
            return;
        };
        if !value.deferred.state.is_not_started() {
            warn!("set_ordinal_build: {} is already {}", id, value.deferred.state);
            return;
        }
        value.deferred.builder = Some(builder);
    }

    /// Resolve `id`, running its construction closure on first demand.
    ///
    /// A demand arriving while the closure of `id` runs gets a placeholder
    /// constant, created once. When the closure returns, every use of the
    /// placeholder is rewritten to the resolved value.
    pub fn build(&mut self, id: InstId) -> Option<InstId> {
        let value = self.expect_value_mut(id, "build")?;
        let state = value.deferred.state;
        match state {
            BuildState::NotStarted => {
                value.deferred.state = BuildState::InProgress;
                let builder = value.deferred.builder.take();
                trace!("Building {}", id);

                let resolved = builder.and_then(|f| f(self));

                match self.value_mut(id) {
                    Some(value) => {
                        value.deferred.state = BuildState::Finished;
                        value.deferred.resolved = resolved;
                    }
                    None => {
                        warn!("build: {} was deleted by its own construction", id);
                        return resolved;
                    }
                }
                self.fix_spin_ud_chain(id);
                self.value(id).and_then(|v| v.deferred.resolved)
            }
            BuildState::InProgress => {
                if let Some(spin) = value.deferred.spin {
                    return Some(spin);
                }
                let function = self.get(id).and_then(|i| i.function);
                let mut spin = Instruction::new(InstKind::Const(ConstValue::Placeholder(SPIN_VALUE.to_string())));
                spin.function = function;
                let spin = self.insert_instruction(spin);
                debug!("Re-entrant build of {}, handing out spin value {}", id, spin);

                if let Some(value) = self.value_mut(id) {
                    value.deferred.spin = Some(spin);
                }
                Some(spin)
            }
            BuildState::Finished => value.deferred.resolved,
        }
    }

    /// Build `id` now if it never started. Returns whether it did.
    pub fn check_and_finish_build(&mut self, id: InstId) -> bool {
        let not_started = self
            .value(id)
            .is_some_and(|v| v.deferred.state.is_not_started());
        if not_started {
            self.build(id);
        }
        not_started
    }

    /// Rewrite the uses of the placeholder of `id` once its build finished,
    /// then delete the placeholder. Uses are rewritten to the resolved value,
    /// or to an `unknown_replace_value` sentinel when the build produced
    /// nothing. Idempotent.
    pub fn fix_spin_ud_chain(&mut self, id: InstId) {
        let Some(deferred) = self.value_mut(id).map(|v| &mut v.deferred) else {
            return;
        };
        if !deferred.state.is_finished() {
            return;
        }
        let Some(spin) = deferred.spin.take() else {
            return;
        };

        let resolved = deferred.resolved.filter(|r| *r != spin);
        let replacement = match resolved.filter(|r| self.contains(*r)) {
            Some(resolved) => resolved,
            None => {
                let function = self.get(id).and_then(|i| i.function);
                let mut unknown = Instruction::new(InstKind::Undefined(UndefinedKind::Unresolved))
                    .with_name(UNKNOWN_REPLACE_VALUE);
                unknown.function = function;
                let unknown = self.insert_instruction(unknown);
                debug!("Build of {} produced nothing, spin uses go to {}", id, unknown);
                if let Some(value) = self.value_mut(id) {
                    if value.deferred.resolved == Some(spin) {
                        value.deferred.resolved = Some(unknown);
                    }
                }
                unknown
            }
        };

        self.replace_all_value(spin, replacement);
        self.retarget_references(spin, replacement);
        self.delete_instruction(spin);
    }

    /// Force every registered construction closure that has not run yet.
    /// Returns how many builds it started; builds pulled in by other closures
    /// are not counted.
    pub fn finish(&mut self) -> usize {
        let mut built = 0;
        loop {
            let pending: Vec<InstId> = self
                .instructions
                .values()
                .filter(|i| {
                    i.value
                        .as_ref()
                        .is_some_and(|v| v.deferred.state.is_not_started() && v.deferred.has_builder())
                })
                .map(|i| i.id)
                .collect();
            if pending.is_empty() {
                break;
            }
            for id in pending {
                if self.check_and_finish_build(id) {
                    built += 1;
                }
            }
        }
        debug!("Program `{}` finished, {} deferred builds forced", self.name, built);
        built
    }

    /// Close the builds left `InProgress` by a closure that unwound. Each one
    /// is marked finished without a result, so its placeholder uses go to an
    /// `unknown_replace_value` sentinel. Returns how many were settled.
    pub fn settle_interrupted_builds(&mut self) -> usize {
        let stuck: Vec<InstId> = self
            .instructions
            .values()
            .filter(|i| i.value.as_ref().is_some_and(|v| v.deferred.state.is_in_progress()))
            .map(|i| i.id)
            .collect();

        for id in &stuck {
            if let Some(value) = self.value_mut(*id) {
                warn!("Build of {} was interrupted, settling it without a result", id);
                value.deferred.state = BuildState::Finished;
                value.deferred.resolved = None;
                value.deferred.builder = None;
            }
            self.fix_spin_ud_chain(*id);
        }
        stuck.len()
    }

    // --- orchestration ---

    /// Record an included file. Returns `false` if it was already known.
    pub fn push_include_file(&mut self, path: impl Into<String>) -> bool {
        self.include_files.add(path.into())
    }

    pub fn include_files(&self) -> impl Iterator<Item = &str> {
        self.include_files.keys().map(String::as_str)
    }

    pub fn include_file_count(&self) -> usize {
        self.include_files.len()
    }

    /// Enter a file. The editor is also recorded in the file list.
    pub fn push_editor(&mut self, editor: Arc<SourceEditor>) {
        self.add_file(editor.clone());
        self.editors.push(editor);
    }

    /// Record a file without entering it. A file with the same url is
    /// replaced.
    pub fn add_file(&mut self, editor: Arc<SourceEditor>) {
        self.files.set(editor.url().to_string(), editor);
    }

    pub fn pop_editor(&mut self) -> Option<Arc<SourceEditor>> {
        self.editors.pop()
    }

    pub fn current_editor(&self) -> Option<&Arc<SourceEditor>> {
        self.editors.last()
    }

    /// Every file built into this program with its source hash.
    pub fn file_list(&self) -> impl Iterator<Item = (&str, u64)> {
        self.files
            .iter()
            .map(|(url, editor)| (url.as_str(), editor.source_hash()))
    }

    pub fn file(&self, url: &str) -> Option<&Arc<SourceEditor>> {
        self.files.get(&url.to_string())
    }
}
