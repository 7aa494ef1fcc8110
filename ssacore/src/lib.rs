//! Compile sessions on top of the `ssair` value graph.
//!
//! The crate wires language front-ends to a [`ssair::program::Program`]:
//! configuration ([`config`]), front-end selection ([`language`]), the
//! per-file compile loop ([`session`]) and snapshot storage ([`storage`]).
//! Session diagnostics go through a replaceable sink, see [`ext::ssalog`].

pub mod config;
pub mod ext;
pub mod language;
pub mod magic;
pub mod session;
pub mod storage;
pub mod utils;

pub extern crate chrono;

pub use utils::error::{CoreError, CoreResult};
