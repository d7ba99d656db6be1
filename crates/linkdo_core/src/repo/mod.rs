//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the item-store contract consumed by link/status services.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Per-item updates are atomic; multi-item edge writes are the link
//!   service's concern and are only eventually consistent.
//! - Repository APIs return semantic errors (`ItemNotFound`) in addition to
//!   DB transport errors.

pub mod item_repo;
