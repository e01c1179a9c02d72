// src/dag/mod.rs

//! Dependency graph and order validation.
//!
//! - [`graph`] builds the declared dependency graph reachable from an order.
//! - [`validate`] contains the [`DependencyValidator`] that gates every run.

pub mod graph;
pub mod validate;

pub use graph::DependencyGraph;
pub use validate::DependencyValidator;
