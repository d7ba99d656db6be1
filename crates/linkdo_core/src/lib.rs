//! Core domain logic for Linkdo: the link graph and status propagation
//! engine for list items.
//! This crate is the single source of truth for link-graph invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging};
pub use model::item::{Item, ItemId, ListId, ListKind, ListRecord, OwnerId};
pub use model::link_set::{encode_links, LinkDecodeError, LinkSet, StoredLinks};
pub use repo::item_repo::{
    ItemPatch, ItemRepository, RepoError, RepoResult, SqliteItemRepository,
};
pub use service::link_query::{LinkQueryService, LinkSummary, LinkedItemRecord, QueryError};
pub use service::link_service::{
    BulkMode, BulkPairOutcome, CreateLinksOutcome, DetachOutcome, LinkRequest, LinkService,
    LinkServiceError, RemoveLinkOutcome,
};
pub use service::link_validation::{
    ChildVerdict, LimitScope, LinkValidator, LinkViolation, LinkWarning, ValidationReport,
    MAX_CHILDREN_PER_CREATE, MAX_LINKS_PER_ITEM,
};
pub use service::status_service::{
    PropagatedUpdate, PropagationPreview, StatusError, StatusOutcome, StatusService,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
