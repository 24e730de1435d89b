// Newsdesk Core Library
// Session-gated realtime dashboard runtime for the volunteer video desk

pub mod access;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod gateway;
pub mod guard;
pub mod model;
pub mod reconcile;
pub mod session;
pub mod stream;
pub mod telemetry;

// Export core types
pub use access::{AccessDecision, AccessValidator, RemoteAccessValidator};
pub use auth::{AuthClient, LoginOutcome, Registration};
pub use config::DeskConfig;
pub use dashboard::{
    AdminDashboard, DashboardSession, EditorDashboard, ManagerDashboard,
};
pub use gateway::{ApiGateway, Navigation, NavigationSink, NullNavigation};
pub use guard::{GuardState, RouteGuard};
pub use model::{ItemPatch, ItemStatus, Role, TeamMember, UserProfile, WorkItem};
pub use reconcile::{Board, BoardStats, SharedBoard};
pub use session::{Credential, SessionStore};
pub use stream::{ChannelEvent, ChannelState, LiveChannel};

use std::sync::Arc;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Not signed in: {0}")]
    Unauthenticated(String),

    #[error("Not permitted: {0}")]
    Unauthorized(String),

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, DeskError>;

/// Core runtime
pub struct Newsdesk {
    pub config: DeskConfig,
    pub session: SessionStore,
    pub gateway: ApiGateway,
    pub auth: AuthClient,
    pub validator: Arc<RemoteAccessValidator>,
    pub guard: RouteGuard,
}

impl Newsdesk {
    pub fn new(config: DeskConfig, navigation: Arc<dyn NavigationSink>) -> Result<Self> {
        let session = SessionStore::new();
        let gateway = ApiGateway::new(&config, session.clone(), navigation)?;
        let auth = AuthClient::new(&config, gateway.clone())?;
        let validator = Arc::new(RemoteAccessValidator::new(&config)?);
        let guard = RouteGuard::new(
            validator.clone() as Arc<dyn AccessValidator>,
            session.clone(),
            config.guard_debounce,
        );

        Ok(Self {
            config,
            session,
            gateway,
            auth,
            validator,
            guard,
        })
    }

    pub async fn open_manager_dashboard(&self) -> Result<ManagerDashboard> {
        ManagerDashboard::open(&self.config, self.gateway.clone()).await
    }

    pub async fn open_editor_dashboard(&self) -> Result<EditorDashboard> {
        EditorDashboard::open(&self.config, self.gateway.clone()).await
    }

    pub async fn open_admin_dashboard(&self) -> Result<AdminDashboard> {
        AdminDashboard::open(&self.config, self.gateway.clone()).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down Newsdesk...");

        self.guard.close().await;

        tracing::info!("Newsdesk shut down successfully");
        Ok(())
    }
}
