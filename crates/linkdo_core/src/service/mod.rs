//! Core use-case services for the link graph.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own every graph invariant: acyclicity, edge symmetry, size bounds,
//!   ownership-domain containment, and one-directional status propagation.
//!
//! # Invariants
//! - Services hold no shared in-process state; correctness under concurrent
//!   callers comes from idempotent, per-item-atomic repository writes.
//! - Traversals are iterative (work list + visited set), never recursive.

pub mod link_query;
pub mod link_service;
pub mod link_validation;
pub mod status_service;
