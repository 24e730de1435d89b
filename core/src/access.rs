// Server-side access validation.
//
// The server is the only authorization oracle: the client never inspects
// credential claims to decide what a user may see. Each navigation asks
// the backend, and concurrent asks for the same path share one request.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::DeskConfig;
use crate::model::UserProfile;
use crate::{DeskError, Result};

/// Outcome of one validation. `valid` means the server vouched for the
/// credential at all; `authorized` means it may enter the requested path.
/// The default is the safe answer: neither.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessDecision {
    pub valid: bool,
    pub authorized: bool,
    pub user: Option<UserProfile>,
}

impl AccessDecision {
    pub fn granted(user: Option<UserProfile>) -> Self {
        Self {
            valid: true,
            authorized: true,
            user,
        }
    }

    pub fn denied(user: Option<UserProfile>) -> Self {
        Self {
            valid: true,
            authorized: false,
            user,
        }
    }
}

/// Asks whether `token` may enter `requested_path`.
///
/// Implementations never fail: any transport or server problem reads as
/// an invalid session. Callers may drop the future at any point.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessValidator: Send + Sync {
    async fn validate(&self, token: &str, requested_path: &str) -> AccessDecision;
}

#[derive(Debug, Deserialize)]
struct ValidatePayload {
    #[serde(default)]
    has_permission: bool,
    #[serde(default)]
    user: Option<UserProfile>,
}

type FlightCell = watch::Receiver<Option<AccessDecision>>;

/// Validator backed by `POST /validate-access`.
pub struct RemoteAccessValidator {
    http: Client,
    base_url: String,
    inflight: DashMap<String, FlightCell>,
}

impl RemoteAccessValidator {
    pub fn new(config: &DeskConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DeskError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url_trimmed().to_string(),
            inflight: DashMap::new(),
        })
    }

    async fn probe(&self, token: &str, requested_path: &str) -> AccessDecision {
        let url = format!("{}/validate-access", self.base_url);
        let body = serde_json::json!({ "requested_path": requested_path });
        let resp = self.http.post(url).bearer_auth(token).json(&body).send().await;

        match resp {
            Ok(r) if r.status().is_success() => match r.json::<ValidatePayload>().await {
                Ok(payload) => {
                    debug!(
                        target: "access",
                        path = requested_path,
                        has_permission = payload.has_permission,
                        "validation answered"
                    );
                    AccessDecision {
                        valid: true,
                        authorized: payload.has_permission,
                        user: payload.user,
                    }
                }
                Err(e) => {
                    warn!(target: "access", error = %e, "validation response unreadable");
                    AccessDecision::default()
                }
            },
            Ok(r) => {
                debug!(
                    target: "access",
                    path = requested_path,
                    status = %r.status(),
                    "validation refused"
                );
                AccessDecision::default()
            }
            Err(e) => {
                warn!(target: "access", error = %e, "validation unreachable");
                AccessDecision::default()
            }
        }
    }
}

/// Removes the in-flight entry when the leading probe settles or is
/// dropped mid-request.
struct Flight<'a> {
    map: &'a DashMap<String, FlightCell>,
    key: String,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

#[async_trait]
impl AccessValidator for RemoteAccessValidator {
    async fn validate(&self, token: &str, requested_path: &str) -> AccessDecision {
        loop {
            let role = match self.inflight.entry(requested_path.to_string()) {
                Entry::Occupied(e) => Err(e.get().clone()),
                Entry::Vacant(v) => {
                    let (tx, rx) = watch::channel(None);
                    v.insert(rx);
                    Ok(tx)
                }
            };

            match role {
                Ok(tx) => {
                    let flight = Flight {
                        map: &self.inflight,
                        key: requested_path.to_string(),
                    };
                    let decision = self.probe(token, requested_path).await;
                    // Settle the entry before publishing so later callers
                    // start a fresh probe instead of reusing this result.
                    drop(flight);
                    let _ = tx.send(Some(decision.clone()));
                    return decision;
                }
                Err(mut rx) => {
                    debug!(target: "access", path = requested_path, "joining in-flight validation");
                    loop {
                        if let Some(decision) = rx.borrow().clone() {
                            return decision;
                        }
                        if rx.changed().await.is_err() {
                            // The leading probe was dropped without an
                            // answer; take over as leader.
                            break;
                        }
                    }
                }
            }
        }
    }
}
