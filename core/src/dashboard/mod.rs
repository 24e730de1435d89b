// Dashboard module - Per-role dashboard sessions and view models
//
// A session couples the initial snapshot fetch with the push channel and a
// reducer task that folds live events into the shared board.

pub mod admin;
pub mod editor;
pub mod manager;

pub use admin::{AdminDashboard, AdminTab, AdminView, DayCount, EditorActivity};
pub use editor::{AssignmentRow, EditorDashboard, EditorTab, EditorView};
pub use manager::{
    EditorLoad, ManagerDashboard, ManagerStats, ManagerView, MemberPatch, SubmissionCard,
};

use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DeskConfig;
use crate::gateway::ApiGateway;
use crate::model::{DashboardSnapshot, Role, TeamMember, UserProfile};
use crate::reconcile::{Board, SharedBoard};
use crate::stream::LiveChannel;
use crate::{DeskError, Result};

/// One live dashboard: the initial snapshot, the push channel and a
/// reducer task folding push events into the shared board.
///
/// The snapshot lands on the board before the stream opens, so events
/// only ever move a complete board forward.
pub struct DashboardSession {
    role: Role,
    gateway: ApiGateway,
    board: SharedBoard,
    roster: Arc<RwLock<Vec<TeamMember>>>,
    profile: Arc<RwLock<Option<UserProfile>>>,
    channel: Arc<LiveChannel>,
    reducer: Mutex<Option<JoinHandle<()>>>,
}

impl DashboardSession {
    pub async fn open(config: &DeskConfig, gateway: ApiGateway, role: Role) -> Result<Self> {
        let path = format!("/{}/dashboard-data", role.api_prefix());
        let snapshot: DashboardSnapshot = gateway.get(&path).await?;
        info!(
            target: "dashboard",
            role = %role,
            items = snapshot.submissions.len(),
            editors = snapshot.editors.len(),
            "dashboard snapshot loaded"
        );

        let board = SharedBoard::new();
        board.replace(Board::from_items(snapshot.submissions)).await;
        let roster = Arc::new(RwLock::new(snapshot.editors));
        let profile = Arc::new(RwLock::new(snapshot.profile));

        let token = gateway.session().token().ok_or_else(|| {
            DeskError::Unauthenticated("session vanished before the stream opened".to_string())
        })?;
        let channel = Arc::new(LiveChannel::new(config)?);
        channel.connect(role, &token).await?;
        let reducer = spawn_reducer(Arc::clone(&channel), board.clone());

        Ok(Self {
            role,
            gateway,
            board,
            roster,
            profile,
            channel,
            reducer: Mutex::new(Some(reducer)),
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn board(&self) -> &SharedBoard {
        &self.board
    }

    pub fn channel(&self) -> &LiveChannel {
        &self.channel
    }

    pub fn gateway(&self) -> &ApiGateway {
        &self.gateway
    }

    pub async fn roster(&self) -> Vec<TeamMember> {
        self.roster.read().await.clone()
    }

    pub async fn profile(&self) -> Option<UserProfile> {
        self.profile.read().await.clone()
    }

    /// Refetch the snapshot, e.g. after a long disconnect left the board
    /// stale.
    pub async fn refresh(&self) -> Result<()> {
        let path = format!("/{}/dashboard-data", self.role.api_prefix());
        let snapshot: DashboardSnapshot = self.gateway.get(&path).await?;
        self.board
            .replace(Board::from_items(snapshot.submissions))
            .await;
        *self.roster.write().await = snapshot.editors;
        if snapshot.profile.is_some() {
            *self.profile.write().await = snapshot.profile;
        }
        info!(target: "dashboard", role = %self.role, "dashboard snapshot refreshed");
        Ok(())
    }

    /// Stop folding and tear the channel down. Idempotent.
    pub async fn close(&self) {
        if let Some(handle) = self.reducer.lock().await.take() {
            handle.abort();
        }
        self.channel.close().await;
        info!(target: "dashboard", role = %self.role, "dashboard session closed");
    }
}

fn spawn_reducer(channel: Arc<LiveChannel>, board: SharedBoard) -> JoinHandle<()> {
    let mut events = channel.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    board.apply(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Missed events surface as stale rows until a refresh.
                    warn!(target: "dashboard", missed, "reducer lagged behind the stream");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(target: "dashboard", "event channel closed, reducer exiting");
                    break;
                }
            }
        }
    })
}
