// Admin dashboard - org-wide totals, activity and user administration.

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::DeskConfig;
use crate::gateway::ApiGateway;
use crate::model::{ItemStatus, Role, TeamMember, WorkItem};
use crate::reconcile::BoardStats;
use crate::Result;

use super::DashboardSession;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdminTab {
    #[default]
    InProgress,
    Completed,
}

/// Per-editor throughput derived from the board.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorActivity {
    pub editor: TeamMember,
    pub in_progress: usize,
    pub completed: usize,
}

/// Submissions received on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayCount {
    pub day: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminView {
    pub totals: BoardStats,
    pub tab: AdminTab,
    pub rows: Vec<WorkItem>,
    pub editor_activity: Vec<EditorActivity>,
    pub daily_volume: Vec<DayCount>,
}

#[derive(Serialize)]
struct RoleChange {
    role: Role,
}

#[derive(Serialize)]
struct ActiveChange {
    is_active: bool,
}

pub struct AdminDashboard {
    session: DashboardSession,
}

impl AdminDashboard {
    pub async fn open(config: &DeskConfig, gateway: ApiGateway) -> Result<Self> {
        let session = DashboardSession::open(config, gateway, Role::Admin).await?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &DashboardSession {
        &self.session
    }

    pub async fn view(&self, tab: AdminTab) -> AdminView {
        let board = self.session.board().snapshot().await;
        let roster = self.session.roster().await;

        let rows = board
            .items()
            .iter()
            .filter(|i| match tab {
                AdminTab::InProgress => i.status.is_active_assignment(),
                AdminTab::Completed => {
                    matches!(i.status, ItemStatus::Completed | ItemStatus::Used)
                }
            })
            .cloned()
            .collect();

        let editor_activity = roster
            .into_iter()
            .filter(|m| m.role == Role::Editor)
            .map(|editor| {
                let in_progress = board
                    .items()
                    .iter()
                    .filter(|i| {
                        i.status.is_active_assignment()
                            && i.assigned_editor_id.as_deref() == Some(editor.id.as_str())
                    })
                    .count();
                let completed = board
                    .items()
                    .iter()
                    .filter(|i| {
                        matches!(i.status, ItemStatus::Completed | ItemStatus::Used)
                            && i.assigned_editor_id.as_deref() == Some(editor.id.as_str())
                    })
                    .count();
                EditorActivity {
                    editor,
                    in_progress,
                    completed,
                }
            })
            .collect();

        AdminView {
            totals: board.stats(),
            tab,
            rows,
            editor_activity,
            daily_volume: daily_volume(board.items(), Utc::now().date_naive()),
        }
    }

    /// Every account in the org.
    pub async fn users(&self) -> Result<Vec<TeamMember>> {
        self.session.gateway().get("/admin/users").await
    }

    pub async fn change_role(&self, user_id: &str, role: Role) -> Result<TeamMember> {
        let path = format!("/admin/users/{user_id}/role");
        let updated: TeamMember = self
            .session
            .gateway()
            .put(&path, &RoleChange { role })
            .await?;
        info!(target: "dashboard", user_id, role = %role, "user role changed");
        Ok(updated)
    }

    pub async fn set_active(&self, user_id: &str, active: bool) -> Result<TeamMember> {
        let path = format!("/admin/users/{user_id}");
        let updated: TeamMember = self
            .session
            .gateway()
            .put(&path, &ActiveChange { is_active: active })
            .await?;
        info!(target: "dashboard", user_id, active, "user activation changed");
        Ok(updated)
    }

    pub async fn close(&self) {
        self.session.close().await;
    }
}

/// Submission counts per day over the trailing week, oldest first. Days
/// with no submissions still appear so charts keep a fixed axis.
fn daily_volume(items: &[WorkItem], today: NaiveDate) -> Vec<DayCount> {
    (0..7)
        .rev()
        .map(|offset| {
            let day = today - Duration::days(offset);
            let count = items
                .iter()
                .filter(|i| i.received_at.map(|t| t.date_naive()) == Some(day))
                .count();
            DayCount { day, count }
        })
        .collect()
}
