//! Use-def state carried by value-producing instructions.
//!
//! A [`Value`] is the part of an instruction that participates in the use-def
//! graph: its type, the users referencing it, its member table, the names it
//! is bound to, closure masks and points-to edges. Read accessors live here;
//! mutations that touch more than one node (registering users, retyping,
//! rewiring operands) live on [`Program`](crate::program::Program) so that the
//! user lists can be kept consistent.
use crate::{
    deferred::DeferredBuild, omap::OrderedMap, operand::InstId, range::SourceRange, types::Type,
};

/// A named binding of a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub value: InstId,

    /// Where the binding was declared, if known.
    pub range: Option<SourceRange>,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: InstId) -> Self {
        Self {
            name: name.into(),
            value,
            range: None,
        }
    }

    pub fn with_range(mut self, range: SourceRange) -> Self {
        self.range = Some(range);
        self
    }
}

#[derive(Debug, Default)]
pub struct Value {
    pub(crate) ty: Type,
    pub(crate) users: Vec<InstId>,
    pub(crate) object: Option<InstId>,
    pub(crate) key: Option<InstId>,
    pub(crate) members: OrderedMap<InstId, InstId>,
    pub(crate) variables: OrderedMap<String, Variable>,
    pub(crate) mask: OrderedMap<InstId, ()>,
    pub(crate) pointer: Vec<InstId>,
    pub(crate) reference: Option<InstId>,
    pub(crate) deferred: DeferredBuild,
}

impl Value {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    // --- users ---

    pub fn users(&self) -> &[InstId] {
        &self.users
    }

    pub fn has_users(&self) -> bool {
        !self.users.is_empty()
    }

    /// Register `user`. Returns `false` if it was already registered.
    pub fn add_user(&mut self, user: InstId) -> bool {
        if self.users.contains(&user) {
            return false;
        }
        self.users.push(user);
        true
    }

    /// Unregister `user`. Returns `false` if it was not registered.
    pub fn remove_user(&mut self, user: InstId) -> bool {
        let before = self.users.len();
        self.users.retain(|u| *u != user);
        before != self.users.len()
    }

    // --- members ---

    /// `object[key]` decomposition, present only when both sides are set.
    pub fn is_member(&self) -> bool {
        self.object.is_some() && self.key.is_some()
    }

    pub fn object(&self) -> Option<InstId> {
        self.object
    }

    pub fn key(&self) -> Option<InstId> {
        self.key
    }

    pub fn is_object(&self) -> bool {
        !self.members.is_empty()
    }

    pub fn members(&self) -> &OrderedMap<InstId, InstId> {
        &self.members
    }

    /// Member lookup by key identity.
    pub fn member(&self, key: InstId) -> Option<InstId> {
        self.members.get(&key).copied()
    }

    /// The `i`-th member in insertion order, as `(key, value)`.
    pub fn index_member(&self, index: usize) -> Option<(InstId, InstId)> {
        self.members.get_by_index(index).map(|(k, v)| (*k, *v))
    }

    pub fn for_each_member(&self, f: impl FnMut(&InstId, &InstId) -> bool) {
        self.members.for_each(f)
    }

    // --- variables ---

    /// Bind a name. Rebinding an existing name makes it the latest one again.
    pub fn add_variable(&mut self, variable: Variable) {
        let name = variable.name.clone();
        self.variables.set(name.clone(), variable);
        self.variables.bring_key_to_last(&name);
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(&name.to_string())
    }

    /// The most recently bound name.
    pub fn last_variable(&self) -> Option<&Variable> {
        self.variables.last().map(|(_, v)| v)
    }

    pub fn all_variables(&self) -> &OrderedMap<String, Variable> {
        &self.variables
    }

    // --- mask ---

    pub fn add_mask(&mut self, masked_by: InstId) {
        self.mask.add(masked_by);
    }

    pub fn mask(&self) -> impl Iterator<Item = InstId> + '_ {
        self.mask.keys().copied()
    }

    pub fn masked(&self) -> bool {
        !self.mask.is_empty()
    }

    // --- points-to ---

    /// Record an inbound points-to edge. Not deduplicated.
    pub fn add_pointer(&mut self, pointer: InstId) {
        self.pointer.push(pointer);
    }

    pub fn pointer(&self) -> &[InstId] {
        &self.pointer
    }

    pub fn set_reference(&mut self, target: InstId) {
        self.reference = Some(target);
    }

    pub fn reference(&self) -> Option<InstId> {
        self.reference
    }

    // --- deferred construction ---

    pub fn deferred(&self) -> &DeferredBuild {
        &self.deferred
    }
}
