//! Deferred construction state of a value.
//!
//! Front-ends register a closure describing how a value is built and leave it
//! to the first demand to run it. The state machine is driven by
//! [`Program::build`](crate::program::Program::build); this module only holds
//! the per-node state cell.
use std::fmt;

use strum::{Display, EnumIs};

use crate::{operand::InstId, program::Program};

/// Construction closure. Receives the program and returns the resolved value,
/// or `None` if nothing usable could be built.
pub type BuildFn = Box<dyn FnOnce(&mut Program) -> Option<InstId>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumIs, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BuildState {
    #[default]
    NotStarted,
    InProgress,
    Finished,
}

#[derive(Default)]
pub struct DeferredBuild {
    pub(crate) state: BuildState,
    pub(crate) builder: Option<BuildFn>,

    /// Placeholder handed out to re-entrant demands while in progress.
    pub(crate) spin: Option<InstId>,
    pub(crate) resolved: Option<InstId>,
}

impl DeferredBuild {
    /// A cell that is already finished and resolves to `value`.
    pub fn finished(value: Option<InstId>) -> Self {
        Self {
            state: BuildState::Finished,
            builder: None,
            spin: None,
            resolved: value,
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn has_builder(&self) -> bool {
        self.builder.is_some()
    }

    pub fn spin(&self) -> Option<InstId> {
        self.spin
    }

    pub fn resolved(&self) -> Option<InstId> {
        self.resolved
    }
}

impl fmt::Debug for DeferredBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredBuild")
            .field("state", &self.state)
            .field("builder", &self.builder.as_ref().map(|_| "<closure>"))
            .field("spin", &self.spin)
            .field("resolved", &self.resolved)
            .finish()
    }
}
