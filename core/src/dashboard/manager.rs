// Manager dashboard - triage, assignment and team management.

use serde::Serialize;
use tracing::info;

use crate::config::DeskConfig;
use crate::gateway::ApiGateway;
use crate::model::{ItemPatch, ItemStatus, Role, TeamMember, WorkItem};
use crate::Result;

use super::DashboardSession;

/// Stat cards across the top of the manager dashboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagerStats {
    pub total: usize,
    pub pending_review: usize,
    pub ready_to_assign: usize,
    pub assigned: usize,
}

/// A submission row plus which controls it offers. Control gating is
/// presentation only; the server re-checks every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionCard {
    pub item: WorkItem,
    pub can_accept: bool,
    pub can_decline: bool,
    pub can_assign: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorLoad {
    pub editor: TeamMember,
    pub active_items: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManagerView {
    pub stats: ManagerStats,
    pub cards: Vec<SubmissionCard>,
    pub workloads: Vec<EditorLoad>,
}

/// Partial team-member update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemberPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
}

pub struct ManagerDashboard {
    session: DashboardSession,
}

impl ManagerDashboard {
    pub async fn open(config: &DeskConfig, gateway: ApiGateway) -> Result<Self> {
        let session = DashboardSession::open(config, gateway, Role::Manager).await?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &DashboardSession {
        &self.session
    }

    /// Render the current board into the manager's view.
    pub async fn view(&self) -> ManagerView {
        let board = self.session.board().snapshot().await;
        let roster = self.session.roster().await;
        let workload = board.editor_workload();
        let stats = board.stats();

        ManagerView {
            stats: ManagerStats {
                total: stats.total,
                pending_review: stats.pending_review + stats.processing,
                ready_to_assign: stats.accepted,
                assigned: stats.assigned + stats.in_progress,
            },
            cards: board.items().iter().map(card_for).collect(),
            workloads: roster
                .into_iter()
                .filter(|m| m.role == Role::Editor && m.is_active)
                .map(|editor| {
                    let active_items = workload.get(&editor.id).copied().unwrap_or(0);
                    EditorLoad {
                        editor,
                        active_items,
                    }
                })
                .collect(),
        }
    }

    /// Accept a submission awaiting triage.
    pub async fn accept(&self, id: &str) -> Result<()> {
        self.update_status(id, ItemStatus::Accepted, None, None).await
    }

    /// Decline a submission awaiting triage, with an optional reason for
    /// the volunteer.
    pub async fn decline(&self, id: &str, reason: Option<&str>) -> Result<()> {
        self.update_status(id, ItemStatus::Declined, None, reason).await
    }

    /// Hand an accepted submission to an editor.
    pub async fn assign(&self, id: &str, editor_id: &str) -> Result<()> {
        self.update_status(id, ItemStatus::Assigned, Some(editor_id), None)
            .await
    }

    /// Assign the topmost ready submission to `editor_id`. Returns the
    /// assigned item id, or `None` when nothing is ready.
    pub async fn auto_assign(&self, editor_id: &str) -> Result<Option<String>> {
        let candidate = {
            let board = self.session.board().snapshot().await;
            board
                .items()
                .iter()
                .find(|i| i.status.is_assignable())
                .map(|i| i.id.clone())
        };
        match candidate {
            Some(id) => {
                self.assign(&id, editor_id).await?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Move an already-assigned item to a different editor.
    pub async fn reassign(&self, id: &str, editor_id: &str) -> Result<()> {
        let query = [
            ("submission_id", id.to_string()),
            ("new_editor_id", editor_id.to_string()),
        ];
        let _: serde_json::Value = self
            .session
            .gateway()
            .post_query("/manager/reassign-assignment", &query)
            .await?;
        let patch = ItemPatch {
            assigned_editor_id: Some(editor_id.to_string()),
            assigned_editor_name: self.editor_name(editor_id).await,
            ..ItemPatch::default()
        };
        self.session.board().apply_local(id, &patch).await;
        info!(target: "dashboard", id, editor_id, "assignment moved");
        Ok(())
    }

    /// Pending and approved editors on this manager's team.
    pub async fn team(&self) -> Result<Vec<TeamMember>> {
        self.session.gateway().get("/manager/team").await
    }

    /// Update a team member's role, activation or verification.
    pub async fn update_member(&self, member_id: &str, patch: &MemberPatch) -> Result<TeamMember> {
        let path = format!("/manager/users/{member_id}");
        let updated: TeamMember = self.session.gateway().put(&path, patch).await?;
        info!(target: "dashboard", member_id, role = %updated.role, "team member updated");
        Ok(updated)
    }

    /// Approve a pending editor request in a single member update.
    pub async fn accept_editor(&self, member_id: &str) -> Result<TeamMember> {
        let patch = MemberPatch {
            role: Some(Role::Editor),
            is_active: Some(true),
            is_verified: Some(true),
        };
        self.update_member(member_id, &patch).await
    }

    /// Turn down a pending editor request. The account stays registered but
    /// inactive and unverified.
    pub async fn decline_request(&self, member_id: &str) -> Result<TeamMember> {
        let patch = MemberPatch {
            is_active: Some(false),
            is_verified: Some(false),
            ..MemberPatch::default()
        };
        self.update_member(member_id, &patch).await
    }

    pub async fn close(&self) {
        self.session.close().await;
    }

    async fn update_status(
        &self,
        id: &str,
        status: ItemStatus,
        editor: Option<&str>,
        reason: Option<&str>,
    ) -> Result<()> {
        let mut query = vec![
            ("submission_id", id.to_string()),
            ("new_status", status.as_str().to_string()),
        ];
        if let Some(editor_id) = editor {
            query.push(("assigned_editor_id", editor_id.to_string()));
        }
        if let Some(reason) = reason {
            query.push(("reason", reason.to_string()));
        }
        let _: serde_json::Value = self
            .session
            .gateway()
            .post_query("/manager/update-submission-status", &query)
            .await?;

        // The server took the transition; reflect it locally until the
        // push event lands.
        let mut patch = ItemPatch::status(status.clone());
        if let Some(editor_id) = editor {
            patch.assigned_editor_id = Some(editor_id.to_string());
            patch.assigned_editor_name = self.editor_name(editor_id).await;
        }
        if let Some(reason) = reason {
            patch.notes = Some(reason.to_string());
        }
        self.session.board().apply_local(id, &patch).await;
        info!(target: "dashboard", id, status = %status, "submission updated");
        Ok(())
    }

    async fn editor_name(&self, editor_id: &str) -> Option<String> {
        self.session
            .roster()
            .await
            .iter()
            .find(|m| m.id == editor_id)
            .map(|m| m.name.clone())
    }
}

fn card_for(item: &WorkItem) -> SubmissionCard {
    SubmissionCard {
        can_accept: item.status.awaits_triage(),
        can_decline: item.status.awaits_triage(),
        can_assign: item.status.is_assignable(),
        item: item.clone(),
    }
}
