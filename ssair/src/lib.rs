//! Value/instruction graph for multi-language static analysis.
//!
//! Front-ends lower source files into a [`Program`](program::Program) through
//! a [`FunctionBuilder`](builder::FunctionBuilder). Values may be built lazily
//! and in any order: a value demanded while its own construction runs gets a
//! placeholder which is patched once the real value exists, so mutually
//! recursive definitions need no forward declaration pass.

mod binder;
pub mod builder;
pub mod constants;
pub mod deferred;
pub mod function;
pub mod graph;
pub mod instruction;
pub mod omap;
pub mod operand;
pub mod program;
pub mod range;
pub mod types;
mod usedef;
pub mod utils;
pub mod value;
mod verify;

pub use utils::Error;
