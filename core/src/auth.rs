// Authentication flows: login, logout, registration and account probes.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::DeskConfig;
use crate::gateway::{detail_from_body, ApiGateway};
use crate::model::UserProfile;
use crate::session::Credential;
use crate::{DeskError, Result};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    redirect_url: Option<String>,
}

/// Outcome of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Navigate to the server-chosen dashboard.
    Dashboard { redirect_url: String },
    /// Authenticated, but no dashboard is assigned to this account.
    /// The caller shows a notice and navigates nowhere; the credential
    /// stays stored.
    NoDashboard,
}

/// Sign-up form for editor and manager accounts.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    available: bool,
}

/// Auth endpoints. Login and registration run without a credential;
/// logout and profile go through the gateway like every other
/// authenticated call.
#[derive(Clone)]
pub struct AuthClient {
    http: Client,
    base_url: String,
    gateway: ApiGateway,
}

impl AuthClient {
    pub fn new(config: &DeskConfig, gateway: ApiGateway) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DeskError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url_trimmed().to_string(),
            gateway,
        })
    }

    /// Exchange credentials for a session. On success the credential is
    /// stored with the server-reported lifetime and the server decides
    /// where to land: no `redirect_url` means this account has no
    /// dashboard.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let url = format!("{}/login", self.base_url);
        let resp = self
            .http
            .post(url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| DeskError::Transient(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| DeskError::Transient(e.to_string()))?;
        if !status.is_success() {
            let message =
                detail_from_body(&text).unwrap_or_else(|| "login failed".to_string());
            warn!(target: "auth", %status, "login rejected");
            return Err(DeskError::Rejected(message));
        }

        let body: LoginResponse = serde_json::from_str(&text)
            .map_err(|e| DeskError::Rejected(format!("unexpected login response: {e}")))?;
        let ttl = body.expires_in.map(Duration::from_secs);
        self.gateway
            .session()
            .set(Credential::bearer(body.access_token), ttl);
        info!(target: "auth", user = username, "login succeeded");

        match body.redirect_url.filter(|u| !u.is_empty()) {
            Some(redirect_url) => Ok(LoginOutcome::Dashboard { redirect_url }),
            None => Ok(LoginOutcome::NoDashboard),
        }
    }

    /// Best-effort server logout, then always drop the local session.
    /// Callers close any open live channel before calling this.
    pub async fn logout(&self) {
        if self.gateway.session().is_authenticated() {
            if let Err(e) = self
                .gateway
                .post::<serde_json::Value, _>("/logout", &serde_json::json!({}))
                .await
            {
                warn!(target: "auth", error = %e, "server logout failed, clearing locally");
            }
        }
        self.gateway.session().clear();
        info!(target: "auth", "logged out");
    }

    pub async fn me(&self) -> Result<UserProfile> {
        self.gateway.get("/me").await
    }

    /// Liveness probe, no credential required.
    pub async fn health(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        match self.http.get(url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => Err(DeskError::Transient(e.to_string())),
        }
    }

    pub async fn register_editor(&self, form: &Registration) -> Result<()> {
        self.register("editor", form).await
    }

    pub async fn register_manager(&self, form: &Registration) -> Result<()> {
        self.register("manager", form).await
    }

    async fn register(&self, kind: &str, form: &Registration) -> Result<()> {
        let url = format!("{}/register/{}", self.base_url, kind);
        let resp = self
            .http
            .post(url)
            .json(form)
            .send()
            .await
            .map_err(|e| DeskError::Transient(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            info!(target: "auth", kind, "registration submitted");
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        let message = detail_from_body(&text)
            .unwrap_or_else(|| format!("registration failed with status {status}"));
        Err(DeskError::Rejected(message))
    }

    pub async fn check_username(&self, username: &str) -> Result<bool> {
        self.check("check-username", username).await
    }

    pub async fn check_email(&self, email: &str) -> Result<bool> {
        self.check("check-email", email).await
    }

    /// Availability probe. A server-side refusal reads as unavailable,
    /// keeping the probe advisory.
    async fn check(&self, endpoint: &str, value: &str) -> Result<bool> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| DeskError::Config(format!("bad base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DeskError::Config("base URL cannot hold paths".to_string()))?
            .push(endpoint)
            .push(value);
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| DeskError::Transient(e.to_string()))?;
        if !resp.status().is_success() {
            return Ok(false);
        }
        let body: AvailabilityResponse = resp
            .json()
            .await
            .map_err(|e| DeskError::Rejected(format!("unexpected response shape: {e}")))?;
        Ok(body.available)
    }
}
