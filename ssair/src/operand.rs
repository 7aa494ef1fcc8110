//! Shared identifier types.
//!
//! Every node of the graph lives in the instruction table of its
//! [`Program`](crate::program::Program) and is referred to by an [`InstId`].
//! Back-references from a node to its block, function and program are plain
//! identifiers as well, so the graph may contain arbitrary cycles without any
//! reference counting.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an instruction (or value) inside a program.
///
/// Identifiers are assigned monotonically by the owning program. [`InstId::NIL`]
/// marks a node that has not been inserted yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstId(pub i64);

impl InstId {
    pub const NIL: InstId = InstId(-1);

    /// Returns true if this is the unassigned identifier.
    pub fn is_nil(&self) -> bool {
        self == &InstId::NIL
    }
}

impl std::fmt::Display for InstId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of an instruction known to be a basic block.
///
/// Only the program hands these out (when it creates a block), which makes the
/// block back-reference of an instruction strongly typed. The pointee may
/// still have been deleted since.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlockId(pub(crate) InstId);

impl BlockId {
    pub fn inst(&self) -> InstId {
        self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            write!(f, "block {}", self.0)
        } else {
            write!(f, "%block{}", self.0.0)
        }
    }
}

/// Identifier of a function owned by a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FunctionId(pub u32);

impl std::fmt::Display for FunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@fn{}", self.0)
    }
}

/// Identity of a program, stable across snapshot/rehydration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProgramId(pub Uuid);

impl ProgramId {
    pub fn new_random() -> Self {
        ProgramId(Uuid::new_v4())
    }
}

impl std::fmt::Display for ProgramId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
