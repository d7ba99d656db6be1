//! Per-item link attribute and its persisted shapes.
//!
//! # Responsibility
//! - Interpret an item's opaque link attribute as three id collections.
//! - Decode both the legacy flat shape and the structured shape with an
//!   explicit discriminant check at the persistence boundary.
//!
//! # Invariants
//! - `parents`/`children` carry control semantics; `bidirectional` is
//!   informational only and never participates in status propagation.
//! - Write paths always persist the structured shape.
//! - Edge symmetry (both sides updated together) is owned by the link
//!   service, not by this type.

use crate::model::item::ItemId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Three id collections attached to one item.
///
/// `BTreeSet` keeps iteration deterministic, which keeps traversal order
/// and serialized output stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSet {
    /// Items that control this item (this item is their child).
    #[serde(default)]
    pub parents: BTreeSet<ItemId>,
    /// Items controlled by this item (this item is their parent).
    #[serde(default)]
    pub children: BTreeSet<ItemId>,
    /// Informational links; symmetric, no control semantics.
    #[serde(default)]
    pub bidirectional: BTreeSet<ItemId>,
}

impl LinkSet {
    /// Returns whether all three collections are empty.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty() && self.children.is_empty() && self.bidirectional.is_empty()
    }

    /// Number of control links (parents + children).
    pub fn hierarchical_count(&self) -> usize {
        self.parents.len() + self.children.len()
    }

    /// Total links of any kind, for summary reporting.
    pub fn total_count(&self) -> usize {
        self.hierarchical_count() + self.bidirectional.len()
    }

    /// Returns whether `id` appears in any of the three collections.
    pub fn references(&self, id: ItemId) -> bool {
        self.parents.contains(&id) || self.children.contains(&id) || self.bidirectional.contains(&id)
    }

    /// Removes `id` from all three collections.
    ///
    /// Returns whether anything was removed. Used by delete cleanup, which
    /// must not care which edge kind referenced the deleted item.
    pub fn remove_all(&mut self, id: ItemId) -> bool {
        let removed_parent = self.parents.remove(&id);
        let removed_child = self.children.remove(&id);
        let removed_bidi = self.bidirectional.remove(&id);
        removed_parent || removed_child || removed_bidi
    }
}

/// Decode failure for a persisted link attribute.
#[derive(Debug)]
pub struct LinkDecodeError {
    message: String,
}

impl LinkDecodeError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for LinkDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid link attribute: {}", self.message)
    }
}

impl Error for LinkDecodeError {}

/// Persisted shape of the link attribute.
///
/// Older rows carry a flat id array (informational links only, from before
/// hierarchical links existed); newer rows carry the structured object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredLinks {
    /// Flat id array; interpreted as bidirectional links.
    Legacy(Vec<ItemId>),
    /// Structured `{parents, children, bidirectional}` object.
    Structured(LinkSet),
}

impl StoredLinks {
    /// Decodes a raw column value with an explicit shape discriminant check.
    pub fn decode(raw: &str) -> Result<Self, LinkDecodeError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|err| LinkDecodeError::new(format!("not valid JSON: {err}")))?;
        match value {
            Value::Array(_) => {
                let ids: Vec<ItemId> = serde_json::from_value(value)
                    .map_err(|err| LinkDecodeError::new(format!("bad legacy id array: {err}")))?;
                Ok(Self::Legacy(ids))
            }
            Value::Object(_) => {
                let set: LinkSet = serde_json::from_value(value)
                    .map_err(|err| LinkDecodeError::new(format!("bad structured shape: {err}")))?;
                Ok(Self::Structured(set))
            }
            other => Err(LinkDecodeError::new(format!(
                "expected array or object, got {other}"
            ))),
        }
    }

    /// Normalizes either shape into the in-memory `LinkSet`.
    pub fn into_link_set(self) -> LinkSet {
        match self {
            Self::Legacy(ids) => LinkSet {
                bidirectional: ids.into_iter().collect(),
                ..LinkSet::default()
            },
            Self::Structured(set) => set,
        }
    }
}

/// Encodes a link set into the structured persisted shape.
pub fn encode_links(set: &LinkSet) -> Result<String, LinkDecodeError> {
    serde_json::to_string(set)
        .map_err(|err| LinkDecodeError::new(format!("failed to encode link set: {err}")))
}
