//! # Recipient Forest Traversal
//!
//! Walks parent links within one organization. Nodes are fetched lazily
//! through the store one hop at a time; the forest is never materialized
//! as an in-memory pointer graph.
//!
//! Every walk is:
//!
//! - **Tenant-scoped.** Reaching a node owned by another organization is a
//!   [`TraversalError::CrossTenant`], never a silently followed link.
//! - **Bounded.** Corrupt parent links cannot cause unbounded walks. Depth
//!   calculation stops after `max_depth(type) + 1` hops; chain collection
//!   stops after the deepest rule in the table plus one.
//! - **Interruptible.** The [`ScanControl`] is checked before each store
//!   round-trip.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use xborder_core::{OrganizationId, Recipient, RecipientId, ScanControl};
use xborder_store::RecipientStore;

use crate::error::TraversalError;
use crate::rules::RuleTable;

/// Tenant-scoped walker over one organization's recipient forest.
pub struct GraphTraversal<'a, S: ?Sized> {
    store: &'a S,
    rules: &'a RuleTable,
    control: ScanControl,
}

impl<'a, S: RecipientStore + ?Sized> GraphTraversal<'a, S> {
    pub fn new(store: &'a S, rules: &'a RuleTable) -> Self {
        Self {
            store,
            rules,
            control: ScanControl::new(),
        }
    }

    /// Attach a caller-supplied cancellation handle.
    pub fn with_control(mut self, control: ScanControl) -> Self {
        self.control = control;
        self
    }

    /// Fetch `id` and require it to belong to `organization`.
    pub async fn load(
        &self,
        id: &RecipientId,
        organization: &OrganizationId,
    ) -> Result<Recipient, TraversalError> {
        self.control.checkpoint()?;
        let recipient = self
            .store
            .get_recipient(id)
            .await?
            .ok_or_else(|| TraversalError::RecipientNotFound(id.clone()))?;
        if &recipient.organization_id != organization {
            tracing::warn!(
                recipient_id = %id,
                expected = %organization,
                found = %recipient.organization_id,
                "traversal reached a recipient owned by another organization"
            );
            return Err(TraversalError::CrossTenant {
                recipient: id.clone(),
                expected: organization.clone(),
                found: recipient.organization_id,
            });
        }
        Ok(recipient)
    }

    /// Ancestors of `id`, ordered from immediate parent to root.
    ///
    /// # Errors
    ///
    /// [`TraversalError::CorruptHierarchy`] if the stored links loop or run
    /// deeper than any rule permits. The chain is never returned truncated.
    pub async fn ancestor_chain(
        &self,
        id: &RecipientId,
        organization: &OrganizationId,
    ) -> Result<Vec<Recipient>, TraversalError> {
        let start = self.load(id, organization).await?;
        let bound = self.rules.deepest() + 1;
        let mut visited = BTreeSet::from([start.id.clone()]);
        let mut chain = Vec::new();
        let mut next = start.parent_recipient_id;

        while let Some(parent_id) = next {
            if chain.len() >= bound {
                return Err(TraversalError::CorruptHierarchy {
                    recipient: id.clone(),
                    reason: format!("ancestor chain exceeds {bound} levels"),
                });
            }
            if !visited.insert(parent_id.clone()) {
                return Err(TraversalError::CorruptHierarchy {
                    recipient: id.clone(),
                    reason: format!("parent links loop back to {parent_id}"),
                });
            }
            let parent = self.load(&parent_id, organization).await?;
            next = parent.parent_recipient_id.clone();
            chain.push(parent);
        }

        tracing::debug!(recipient_id = %id, ancestors = chain.len(), "resolved ancestor chain");
        Ok(chain)
    }

    /// Hop-count from `id` to its root (0 for a root).
    ///
    /// The walk runs for at most `max_depth(type) + 1` hops, where `type` is
    /// the type of `id`. Hitting the bound returns the bound, which always
    /// exceeds the type's limit and so fails any depth comparison.
    pub async fn hierarchy_depth(
        &self,
        id: &RecipientId,
        organization: &OrganizationId,
    ) -> Result<usize, TraversalError> {
        let start = self.load(id, organization).await?;
        let bound = self.rules.max_depth(start.recipient_type) + 1;
        let mut depth = 0;
        let mut next = start.parent_recipient_id;

        while let Some(parent_id) = next {
            depth += 1;
            if depth >= bound {
                tracing::warn!(
                    recipient_id = %id,
                    recipient_type = %start.recipient_type,
                    bound,
                    "depth walk reached its iteration bound"
                );
                break;
            }
            let parent = self.load(&parent_id, organization).await?;
            next = parent.parent_recipient_id;
        }

        Ok(depth)
    }

    /// Whether making `candidate_parent` the parent of `id` would close a cycle.
    ///
    /// True when `candidate_parent == id`, when `id` appears in the
    /// candidate's ancestor chain, or when the candidate's chain already
    /// loops on itself.
    pub async fn has_circular_reference(
        &self,
        id: &RecipientId,
        candidate_parent: &RecipientId,
        organization: &OrganizationId,
    ) -> Result<bool, TraversalError> {
        if id == candidate_parent {
            return Ok(true);
        }
        let candidate = self.load(candidate_parent, organization).await?;
        let bound = self.rules.deepest() + 1;
        let mut visited = BTreeSet::from([candidate.id.clone()]);
        let mut next = candidate.parent_recipient_id;

        while let Some(ancestor_id) = next {
            if &ancestor_id == id {
                return Ok(true);
            }
            if !visited.insert(ancestor_id.clone()) {
                tracing::warn!(
                    candidate_parent = %candidate_parent,
                    loop_at = %ancestor_id,
                    "candidate parent sits on an existing loop"
                );
                return Ok(true);
            }
            if visited.len() > bound {
                return Err(TraversalError::CorruptHierarchy {
                    recipient: candidate_parent.clone(),
                    reason: format!("ancestor chain exceeds {bound} levels"),
                });
            }
            let ancestor = self.load(&ancestor_id, organization).await?;
            next = ancestor.parent_recipient_id;
        }

        Ok(false)
    }

    /// Every recipient below `id`, paired with its hop-count from `id`.
    ///
    /// Loads the organization's rows once and walks child links
    /// breadth-first. Each row is visited at most once, so corrupt loops
    /// below `id` terminate.
    pub async fn descendants(
        &self,
        id: &RecipientId,
        organization: &OrganizationId,
    ) -> Result<Vec<(Recipient, usize)>, TraversalError> {
        self.control.checkpoint()?;
        let rows = self.store.list_recipients(organization).await?;
        let mut children: BTreeMap<RecipientId, Vec<Recipient>> = BTreeMap::new();
        for row in rows {
            if let Some(parent) = row.parent_recipient_id.clone() {
                children.entry(parent).or_default().push(row);
            }
        }

        let mut visited = BTreeSet::from([id.clone()]);
        let mut queue = VecDeque::from([(id.clone(), 0usize)]);
        let mut found = Vec::new();
        while let Some((node, depth)) = queue.pop_front() {
            for child in children.remove(&node).unwrap_or_default() {
                if visited.insert(child.id.clone()) {
                    queue.push_back((child.id.clone(), depth + 1));
                    found.push((child, depth + 1));
                }
            }
        }
        Ok(found)
    }
}
