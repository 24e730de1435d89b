// Editor dashboard - assigned work queue and completion flow.

use chrono::Utc;
use tracing::info;

use crate::config::DeskConfig;
use crate::gateway::ApiGateway;
use crate::model::{ItemPatch, ItemStatus, Role, WorkItem};
use crate::Result;

use super::DashboardSession;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditorTab {
    #[default]
    Assigned,
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRow {
    pub item: WorkItem,
    pub can_complete: bool,
    pub can_request_revision: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorView {
    pub tab: EditorTab,
    pub rows: Vec<AssignmentRow>,
    pub assigned_count: usize,
    pub completed_count: usize,
}

pub struct EditorDashboard {
    session: DashboardSession,
}

impl EditorDashboard {
    pub async fn open(config: &DeskConfig, gateway: ApiGateway) -> Result<Self> {
        let session = DashboardSession::open(config, gateway, Role::Editor).await?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &DashboardSession {
        &self.session
    }

    /// Render the requested tab. Counts cover both tabs so the badges
    /// stay current regardless of which one is showing.
    pub async fn view(&self, tab: EditorTab) -> EditorView {
        let board = self.session.board().snapshot().await;
        let assigned: Vec<&WorkItem> = board
            .items()
            .iter()
            .filter(|i| i.status.is_active_assignment())
            .collect();
        let completed: Vec<&WorkItem> = board
            .items()
            .iter()
            .filter(|i| matches!(i.status, ItemStatus::Completed | ItemStatus::Used))
            .collect();
        let assigned_count = assigned.len();
        let completed_count = completed.len();

        let rows = match tab {
            EditorTab::Assigned => assigned
                .into_iter()
                .map(|item| AssignmentRow {
                    item: item.clone(),
                    can_complete: true,
                    can_request_revision: true,
                })
                .collect(),
            EditorTab::Completed => completed
                .into_iter()
                .map(|item| AssignmentRow {
                    item: item.clone(),
                    can_complete: false,
                    can_request_revision: false,
                })
                .collect(),
        };

        EditorView {
            tab,
            rows,
            assigned_count,
            completed_count,
        }
    }

    /// Submit the finished edit. The server validates the URL; on
    /// rejection the board is left untouched.
    pub async fn complete(&self, id: &str, edited_video_url: &str) -> Result<()> {
        let body = serde_json::json!({
            "submission_id": id,
            "edited_video_url": edited_video_url,
        });
        let _: serde_json::Value = self
            .session
            .gateway()
            .post("/editor/complete-assignment", &body)
            .await?;

        let patch = ItemPatch {
            status: Some(ItemStatus::Completed),
            edited_video_url: Some(edited_video_url.to_string()),
            completed_at: Some(Utc::now()),
            ..ItemPatch::default()
        };
        self.session.board().apply_local(id, &patch).await;
        info!(target: "dashboard", id, "assignment completed");
        Ok(())
    }

    /// Ask the volunteer for another take.
    pub async fn request_revision(&self, id: &str, note: &str) -> Result<()> {
        let body = serde_json::json!({
            "submission_id": id,
            "note": note,
        });
        let _: serde_json::Value = self
            .session
            .gateway()
            .post("/editor/request-revision", &body)
            .await?;

        let mut patch = ItemPatch::status(ItemStatus::RevisionNeeded);
        patch.notes = Some(note.to_string());
        self.session.board().apply_local(id, &patch).await;
        info!(target: "dashboard", id, "revision requested");
        Ok(())
    }

    /// Hand the assignment back to the pool. The push event carries the
    /// cleared assignment fields.
    pub async fn decline(&self, id: &str) -> Result<()> {
        let body = serde_json::json!({ "submission_id": id });
        let _: serde_json::Value = self
            .session
            .gateway()
            .post("/editor/decline-assignment", &body)
            .await?;

        self.session
            .board()
            .apply_local(id, &ItemPatch::status(ItemStatus::Accepted))
            .await;
        info!(target: "dashboard", id, "assignment declined");
        Ok(())
    }

    pub async fn close(&self) {
        self.session.close().await;
    }
}
