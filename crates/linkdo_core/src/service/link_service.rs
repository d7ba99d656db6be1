//! Link mutation use-case service.
//!
//! # Responsibility
//! - Apply validated create/remove of parent-child edges as symmetric
//!   link-set updates on both endpoints.
//! - Provide bulk creation, informational links, and pre-delete cleanup.
//!
//! # Invariants
//! - Every mutation validates first; the mutator itself never re-checks
//!   beyond endpoint existence.
//! - Both sides of an edge are updated together; a half-applied edge is a
//!   transient state repaired by reissuing the same idempotent call.
//! - The child side is written before the parent side, so a retry always
//!   converges from the parent's view of the edge.

use crate::model::item::ItemId;
use crate::repo::item_repo::{ItemPatch, ItemRepository, RepoError};
use crate::service::link_validation::{LinkValidator, LinkWarning, ValidationReport};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from link mutation operations.
#[derive(Debug)]
pub enum LinkServiceError {
    /// Validation rejected the operation; terminal for this request, never
    /// retried automatically.
    Rejected(ValidationReport),
    /// One pair of an all-or-nothing batch failed validation.
    BatchRejected {
        parent: ItemId,
        report: ValidationReport,
    },
    /// A store write failed between the two sides of an edge; retry the same
    /// call to converge.
    Incomplete {
        parent: ItemId,
        child: Option<ItemId>,
        source: RepoError,
    },
    /// Store failure outside an edge write.
    Store(RepoError),
}

impl LinkServiceError {
    /// Whether reissuing the same call can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Incomplete { .. } | Self::Store(_))
    }
}

impl Display for LinkServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(report) => {
                write!(f, "link operation rejected: {}", report.reason_codes())
            }
            Self::BatchRejected { parent, report } => write!(
                f,
                "bulk link batch rejected at parent {parent}: {}",
                report.reason_codes()
            ),
            Self::Incomplete {
                parent,
                child,
                source,
            } => match child {
                Some(child) => write!(
                    f,
                    "edge {parent} -> {child} incompletely applied, retry to repair: {source}"
                ),
                None => write!(
                    f,
                    "link update on {parent} incompletely applied, retry to repair: {source}"
                ),
            },
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LinkServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Incomplete { source, .. } => Some(source),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LinkServiceError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Outcome of a create operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateLinksOutcome {
    /// Number of edges that did not exist before this call.
    pub created: usize,
    pub warnings: Vec<LinkWarning>,
}

/// Outcome of a remove operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveLinkOutcome {
    /// Whether any side of the edge actually changed.
    pub removed: bool,
    pub warnings: Vec<LinkWarning>,
}

/// Outcome of pre-delete link cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachOutcome {
    /// Number of neighboring items whose link sets were touched.
    pub affected: usize,
}

/// How a bulk create treats validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkMode {
    /// Any invalid pair rejects the whole batch before any mutation.
    AllOrNothing,
    /// Valid pairs are applied; invalid pairs are reported per pair.
    PerPair,
}

/// One (parent, children) pair of a bulk create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub parent: ItemId,
    pub children: Vec<ItemId>,
}

/// Per-pair result of a bulk create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkPairOutcome {
    pub parent: ItemId,
    pub created: usize,
    pub warnings: Vec<LinkWarning>,
    /// Present when this pair failed validation under `BulkMode::PerPair`.
    pub rejected: Option<ValidationReport>,
}

/// Link mutation service facade.
pub struct LinkService<R: ItemRepository> {
    validator: LinkValidator<R>,
}

impl<R: ItemRepository> LinkService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self {
            validator: LinkValidator::new(repo),
        }
    }

    /// The validator this service fronts, for dry-run callers.
    pub fn validator(&self) -> &LinkValidator<R> {
        &self.validator
    }

    fn repo(&self) -> &R {
        self.validator.repo()
    }

    /// Creates `parent -> child` edges for every accepted child.
    pub fn create_links(
        &self,
        parent_id: ItemId,
        child_ids: &[ItemId],
    ) -> Result<CreateLinksOutcome, LinkServiceError> {
        let report = self.validator.validate_create(parent_id, child_ids)?;
        if !report.is_valid() {
            warn!(
                "event=validation_failed module=links op=create parent={parent_id} reason={}",
                report.reason_codes()
            );
            return Err(LinkServiceError::Rejected(report));
        }

        self.apply_accepted(parent_id, report)
    }

    /// Removes one `parent -> child` edge from both sides.
    ///
    /// Removing an edge that does not exist is a successful no-op; a missing
    /// endpoint still gets the surviving side cleaned.
    pub fn remove_link(
        &self,
        parent_id: ItemId,
        child_id: ItemId,
    ) -> Result<RemoveLinkOutcome, LinkServiceError> {
        let report = self.validator.validate_remove(parent_id, child_id)?;
        let mut removed = false;

        if let Some(mut parent) = self.repo().get_item(parent_id, false)? {
            if parent.links.children.remove(&child_id) {
                self.repo()
                    .update_item(parent_id, &ItemPatch::link_set(parent.links))
                    .map_err(|source| LinkServiceError::Incomplete {
                        parent: parent_id,
                        child: Some(child_id),
                        source,
                    })?;
                removed = true;
            }
        }

        if let Some(mut child) = self.repo().get_item(child_id, false)? {
            if child.links.parents.remove(&parent_id) {
                self.repo()
                    .update_item(child_id, &ItemPatch::link_set(child.links))
                    .map_err(|source| LinkServiceError::Incomplete {
                        parent: parent_id,
                        child: Some(child_id),
                        source,
                    })?;
                removed = true;
            }
        }

        info!(
            "event=link_removed module=links parent={parent_id} child={child_id} removed={removed}"
        );
        Ok(RemoveLinkOutcome {
            removed,
            warnings: report.warnings,
        })
    }

    /// Creates edges for multiple (parent, children) pairs.
    ///
    /// Every pair is validated before any pair is mutated.
    pub fn create_links_bulk(
        &self,
        requests: &[LinkRequest],
        mode: BulkMode,
    ) -> Result<Vec<BulkPairOutcome>, LinkServiceError> {
        let mut validated = Vec::with_capacity(requests.len());
        for request in requests {
            let report = self
                .validator
                .validate_create(request.parent, &request.children)?;
            if !report.is_valid() {
                warn!(
                    "event=validation_failed module=links op=bulk_create parent={} reason={}",
                    request.parent,
                    report.reason_codes()
                );
                if matches!(mode, BulkMode::AllOrNothing) {
                    return Err(LinkServiceError::BatchRejected {
                        parent: request.parent,
                        report,
                    });
                }
            }
            validated.push((request.parent, report));
        }

        let mut outcomes = Vec::with_capacity(validated.len());
        for (parent, report) in validated {
            if !report.is_valid() {
                outcomes.push(BulkPairOutcome {
                    parent,
                    created: 0,
                    warnings: report.warnings.clone(),
                    rejected: Some(report),
                });
                continue;
            }
            let applied = self.apply_accepted(parent, report)?;
            outcomes.push(BulkPairOutcome {
                parent,
                created: applied.created,
                warnings: applied.warnings,
                rejected: None,
            });
        }
        Ok(outcomes)
    }

    /// Creates a symmetric informational link between `a` and `b`.
    pub fn link_bidirectional(
        &self,
        a: ItemId,
        b: ItemId,
    ) -> Result<CreateLinksOutcome, LinkServiceError> {
        let report = self.validator.validate_bidirectional(a, b)?;
        if !report.is_valid() {
            warn!(
                "event=validation_failed module=links op=link_bidirectional a={a} b={b} reason={}",
                report.reason_codes()
            );
            return Err(LinkServiceError::Rejected(report));
        }

        let mut created = 0;
        for (item_id, other_id) in [(a, b), (b, a)] {
            let mut item = self
                .repo()
                .get_item(item_id, false)?
                .ok_or(LinkServiceError::Store(RepoError::ItemNotFound(item_id)))?;
            if item.links.bidirectional.insert(other_id) {
                self.repo()
                    .update_item(item_id, &ItemPatch::link_set(item.links))
                    .map_err(|source| LinkServiceError::Incomplete {
                        parent: item_id,
                        child: Some(other_id),
                        source,
                    })?;
                created = 1;
            }
        }

        info!("event=link_created module=links kind=bidirectional a={a} b={b} created={created}");
        Ok(CreateLinksOutcome {
            created,
            warnings: report.warnings,
        })
    }

    /// Removes a symmetric informational link; absent links are a no-op.
    pub fn unlink_bidirectional(
        &self,
        a: ItemId,
        b: ItemId,
    ) -> Result<RemoveLinkOutcome, LinkServiceError> {
        let mut removed = false;
        let mut warnings = Vec::new();

        for (item_id, other_id) in [(a, b), (b, a)] {
            match self.repo().get_item(item_id, false)? {
                Some(mut item) => {
                    if item.links.bidirectional.remove(&other_id) {
                        self.repo()
                            .update_item(item_id, &ItemPatch::link_set(item.links))
                            .map_err(|source| LinkServiceError::Incomplete {
                                parent: item_id,
                                child: Some(other_id),
                                source,
                            })?;
                        removed = true;
                    }
                }
                None => warnings.push(LinkWarning::MissingItem(item_id)),
            }
        }

        info!("event=link_removed module=links kind=bidirectional a={a} b={b} removed={removed}");
        Ok(RemoveLinkOutcome { removed, warnings })
    }

    /// Pre-delete cleanup: removes every edge referencing `item_id` from its
    /// neighbors and clears the item's own link set.
    ///
    /// The deleting caller invokes this before the actual delete and may
    /// surface the affected count as a non-fatal warning.
    pub fn detach_item_links(&self, item_id: ItemId) -> Result<DetachOutcome, LinkServiceError> {
        let neighbors = self.repo().find_items_referencing(item_id)?;
        let mut affected = 0;

        for mut neighbor in neighbors {
            if neighbor.links.remove_all(item_id) {
                let neighbor_id = neighbor.uuid;
                self.repo()
                    .update_item(neighbor_id, &ItemPatch::link_set(neighbor.links))
                    .map_err(|source| LinkServiceError::Incomplete {
                        parent: neighbor_id,
                        child: Some(item_id),
                        source,
                    })?;
                affected += 1;
            }
        }

        if let Some(item) = self.repo().get_item(item_id, false)? {
            if !item.links.is_empty() {
                self.repo()
                    .update_item(item_id, &ItemPatch::link_set(Default::default()))
                    .map_err(|source| LinkServiceError::Incomplete {
                        parent: item_id,
                        child: None,
                        source,
                    })?;
            }
        }

        info!("event=links_detached module=links item={item_id} affected={affected}");
        Ok(DetachOutcome { affected })
    }

    /// Writes both sides of every accepted edge, child side first.
    fn apply_accepted(
        &self,
        parent_id: ItemId,
        report: ValidationReport,
    ) -> Result<CreateLinksOutcome, LinkServiceError> {
        let mut warnings = report.warnings;
        if report.accepted.is_empty() {
            return Ok(CreateLinksOutcome {
                created: 0,
                warnings,
            });
        }

        let mut linked_children = Vec::with_capacity(report.accepted.len());
        for child_id in &report.accepted {
            // A child accepted by validation may have vanished since; it is
            // dropped exactly like a missing child at validation time.
            let Some(mut child) = self.repo().get_item(*child_id, false)? else {
                warnings.push(LinkWarning::MissingChild(*child_id));
                continue;
            };
            if child.links.parents.insert(parent_id) {
                self.repo()
                    .update_item(*child_id, &ItemPatch::link_set(child.links))
                    .map_err(|source| LinkServiceError::Incomplete {
                        parent: parent_id,
                        child: Some(*child_id),
                        source,
                    })?;
            }
            linked_children.push(*child_id);
        }

        let mut parent = self
            .repo()
            .get_item(parent_id, false)?
            .ok_or(LinkServiceError::Store(RepoError::ItemNotFound(parent_id)))?;
        let mut created = 0;
        for child_id in &linked_children {
            if parent.links.children.insert(*child_id) {
                created += 1;
            }
        }
        if created > 0 {
            self.repo()
                .update_item(parent_id, &ItemPatch::link_set(parent.links))
                .map_err(|source| LinkServiceError::Incomplete {
                    parent: parent_id,
                    child: None,
                    source,
                })?;
        }

        info!("event=link_created module=links parent={parent_id} created={created}");
        Ok(CreateLinksOutcome { created, warnings })
    }
}
