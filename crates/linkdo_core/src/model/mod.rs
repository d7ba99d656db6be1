//! Domain model for list items and their link graph.
//!
//! # Responsibility
//! - Define the canonical item/list records used by core business logic.
//! - Define the per-item link attribute (`LinkSet`) and its stored shapes.
//!
//! # Invariants
//! - Every domain object is identified by a stable UUID.
//! - Deletion is represented by soft-delete tombstones, not hard delete.
//! - The link graph is the union of per-item link attributes; there is no
//!   process-wide graph singleton.

pub mod item;
pub mod link_set;
