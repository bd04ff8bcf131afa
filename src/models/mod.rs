//! Domain models for Taskbook.
//!
//! # Core Concepts
//!
//! ## Tasks Document
//!
//! - [`Context`]: A named partition of the task space (usually one business area).
//! - [`Task`]: A unit of work inside a context, owning a tree of [`Subtask`]s.
//! - [`Subtask`]: Same shape as a task minus priority, nestable without limit.
//! - [`DependencyRef`]: A reference to another task or subtask, never an ownership edge.
//!
//! ## Definitions Document
//!
//! - [`Feature`]: A declared business capability, usually aligned 1:1 with a context.
//! - [`TechTag`]: A declared technical label (`api`, `frontend`, ...) that tasks may carry.

mod context;
mod definitions;
mod dependency;
mod task;
mod timestamp;

pub use context::*;
pub use definitions::*;
pub use dependency::*;
pub use task::*;
