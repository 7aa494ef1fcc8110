//! Functions of a program.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::operand::{BlockId, FunctionId, InstId};

/// A function body: parameters and basic blocks, entry first.
///
/// The function is also represented in the graph by a value of kind
/// [`InstKind::Function`](crate::instruction::InstKind::Function) so that it
/// can be called, stored in members and typed like any other value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Function {
    pub id: FunctionId,
    pub name: String,

    /// The value standing for this function.
    pub value: InstId,

    /// Parameters in declaration order, free values included.
    pub params: Vec<InstId>,
    pub blocks: Vec<BlockId>,

    /// Enclosing function for closures.
    pub parent: Option<FunctionId>,
    pub children: Vec<FunctionId>,
}

impl Function {
    pub fn new(id: FunctionId, name: impl Into<String>, value: InstId) -> Self {
        Self {
            id,
            name: name.into(),
            value,
            params: Vec::new(),
            blocks: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.first().copied()
    }

    pub fn param(&self, index: usize) -> Option<InstId> {
        self.params.get(index).copied()
    }

    pub fn is_closure(&self) -> bool {
        self.parent.is_some()
    }
}
