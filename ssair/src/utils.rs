use strum::{EnumIs, EnumTryAs};
use thiserror::Error;

use crate::operand::{BlockId, InstId};

#[derive(Debug, PartialEq, Eq, Hash, EnumIs, EnumTryAs, Error)]
pub enum Error {
    /// A user is recorded twice on the same value.
    #[error("The user list of `{value}` contains `{user}` more than once.")]
    DuplicateUser { value: InstId, user: InstId },

    /// A recorded user no longer exists in the program.
    #[error("`{user}` is recorded as a user of `{value}` but is not an instruction of the program.")]
    DanglingUser { value: InstId, user: InstId },

    /// A recorded user does not reference the value anywhere in its operand set.
    #[error("`{user}` is recorded as a user of `{value}` but none of its operands reference it.")]
    StaleUser { value: InstId, user: InstId },

    /// An instruction references a value without being recorded as its user.
    #[error("`{user}` references `{value}` but is missing from its user list.")]
    UnregisteredUse { value: InstId, user: InstId },

    /// An operand refers to an instruction that does not exist.
    #[error("`{user}` references `{operand}` which is not an instruction of the program.")]
    DanglingOperand { user: InstId, operand: InstId },

    /// A points-to edge or an id embedded in a type names a missing instruction.
    #[error("`{value}` refers to `{target}` outside its operands but `{target}` is not an instruction of the program.")]
    DanglingReference { value: InstId, target: InstId },

    /// A re-entrant build placeholder survived the build that created it.
    #[error("The spin placeholder `{spin}` is still alive after construction finished.")]
    LiveSpinValue { spin: InstId },

    /// A deferred build never returned.
    #[error("The deferred build of `{value}` is still in progress.")]
    BuildInProgress { value: InstId },

    /// The block back-reference of an instruction does not name a live block.
    #[error("`{inst}` claims to belong to `{block}` which is not a live basic block.")]
    InvalidBlockReference { inst: InstId, block: BlockId },

    /// The block back-reference and the block's instruction list disagree.
    #[error("`{inst}` claims to belong to `{block}` but is not listed in it.")]
    BlockMembership { inst: InstId, block: BlockId },
}
