// Reconciliation engine.
//
// The board is the client's copy of server-side work-item state. It only
// changes through the apply functions below, and every apply is a pure,
// idempotent merge: replaying a delivered event leaves the board as it
// was. Optimistic local writes use the same merge, so a later
// authoritative event carrying the same values is a no-op and a
// disagreeing one wins field by field.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::model::{ItemPatch, ItemStatus, WorkItem};
use crate::stream::ChannelEvent;

/// Ordered, id-unique collection of work items, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    items: Vec<WorkItem>,
}

/// Per-status totals, recomputed from the full board on every call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardStats {
    pub total: usize,
    pub pending_review: usize,
    pub processing: usize,
    pub accepted: usize,
    pub assigned: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub revision_needed: usize,
    pub declined: usize,
    pub used: usize,
    pub other: usize,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a board from a snapshot. Duplicate ids keep the first
    /// occurrence.
    pub fn from_items(items: Vec<WorkItem>) -> Self {
        let mut board = Self::new();
        for item in items {
            if !board.contains(&item.id) {
                board.items.push(item);
            }
        }
        board
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&WorkItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert a freshly created item at the head. A duplicate delivery of
    /// an id already on the board changes nothing.
    pub fn apply_created(&mut self, item: WorkItem) -> bool {
        if self.contains(&item.id) {
            debug!(target: "reconcile", id = %item.id, "duplicate create ignored");
            return false;
        }
        self.items.insert(0, item);
        true
    }

    /// Merge a status update into an existing item. An id the board does
    /// not hold is ignored; the next snapshot carries the full row.
    pub fn apply_status_changed(&mut self, id: &str, patch: &ItemPatch) -> bool {
        self.merge_into(id, patch)
    }

    /// Merge an assignment update into an existing item. Same no-op rule
    /// for unknown ids as status changes.
    pub fn apply_assigned(&mut self, id: &str, patch: &ItemPatch) -> bool {
        self.merge_into(id, patch)
    }

    /// Optimistic local write, applied only after the server accepted the
    /// request. Identical merge semantics to authoritative events.
    pub fn apply_local(&mut self, id: &str, patch: &ItemPatch) -> bool {
        self.merge_into(id, patch)
    }

    pub fn apply_event(&mut self, event: &ChannelEvent) -> bool {
        match event {
            ChannelEvent::ItemCreated(item) => self.apply_created(item.clone()),
            ChannelEvent::StatusChanged { id, patch } => self.apply_status_changed(id, patch),
            ChannelEvent::Assigned { id, patch } => self.apply_assigned(id, patch),
            ChannelEvent::KeepAlive => false,
        }
    }

    fn merge_into(&mut self, id: &str, patch: &ItemPatch) -> bool {
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(item) => merge(item, patch),
            None => {
                debug!(target: "reconcile", id, "patch for unknown item ignored");
                false
            }
        }
    }

    pub fn stats(&self) -> BoardStats {
        let mut stats = BoardStats {
            total: self.items.len(),
            ..BoardStats::default()
        };
        for item in &self.items {
            match &item.status {
                ItemStatus::PendingReview => stats.pending_review += 1,
                ItemStatus::Processing => stats.processing += 1,
                ItemStatus::Accepted => stats.accepted += 1,
                ItemStatus::Assigned => stats.assigned += 1,
                ItemStatus::InProgress => stats.in_progress += 1,
                ItemStatus::Completed => stats.completed += 1,
                ItemStatus::RevisionNeeded => stats.revision_needed += 1,
                ItemStatus::Declined => stats.declined += 1,
                ItemStatus::Used => stats.used += 1,
                ItemStatus::Other(_) => stats.other += 1,
            }
        }
        stats
    }

    /// Active assignments per editor id.
    pub fn editor_workload(&self) -> HashMap<String, usize> {
        let mut workload = HashMap::new();
        for item in &self.items {
            if item.status.is_active_assignment() {
                if let Some(editor) = &item.assigned_editor_id {
                    *workload.entry(editor.clone()).or_insert(0) += 1;
                }
            }
        }
        workload
    }
}

/// Shallow per-field merge: only populated patch fields overwrite.
fn merge(item: &mut WorkItem, patch: &ItemPatch) -> bool {
    let mut changed = false;
    if let Some(status) = &patch.status {
        if item.status != *status {
            item.status = status.clone();
            changed = true;
        }
    }
    if let Some(url) = &patch.video_url {
        if item.video_url.as_ref() != Some(url) {
            item.video_url = Some(url.clone());
            changed = true;
        }
    }
    if let Some(url) = &patch.edited_video_url {
        if item.edited_video_url.as_ref() != Some(url) {
            item.edited_video_url = Some(url.clone());
            changed = true;
        }
    }
    if let Some(at) = &patch.completed_at {
        if item.completed_at.as_ref() != Some(at) {
            item.completed_at = Some(*at);
            changed = true;
        }
    }
    if let Some(editor) = &patch.assigned_editor_id {
        if item.assigned_editor_id.as_ref() != Some(editor) {
            item.assigned_editor_id = Some(editor.clone());
            changed = true;
        }
    }
    if let Some(name) = &patch.assigned_editor_name {
        if item.assigned_editor_name.as_ref() != Some(name) {
            item.assigned_editor_name = Some(name.clone());
            changed = true;
        }
    }
    if let Some(notes) = &patch.notes {
        if item.notes.as_ref() != Some(notes) {
            item.notes = Some(notes.clone());
            changed = true;
        }
    }
    changed
}

/// Board behind a lock, shared between the reducer task and view reads.
#[derive(Clone, Default)]
pub struct SharedBoard {
    inner: Arc<RwLock<Board>>,
}

impl SharedBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, board: Board) {
        *self.inner.write().await = board;
    }

    pub async fn apply(&self, event: &ChannelEvent) -> bool {
        self.inner.write().await.apply_event(event)
    }

    pub async fn apply_local(&self, id: &str, patch: &ItemPatch) -> bool {
        self.inner.write().await.apply_local(id, patch)
    }

    /// Cloned snapshot for view building.
    pub async fn snapshot(&self) -> Board {
        self.inner.read().await.clone()
    }

    pub async fn stats(&self) -> BoardStats {
        self.inner.read().await.stats()
    }
}
