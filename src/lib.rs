//! Taskbook: a validated hierarchical task store.
//!
//! Tasks live in named contexts and own trees of subtasks. Every mutation
//! goes through [`store::TaskStore`] or [`store::DefinitionsStore`], which
//! validate input, enforce the status workflow, and persist before returning.

pub mod api;
pub mod config;
pub mod error;
pub mod ids;
pub mod mcp;
pub mod models;
pub mod navigator;
pub mod store;
pub mod validation;
