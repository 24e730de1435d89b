// Authenticated request gateway.
//
// Every REST call to the backend goes through here: this is the only
// place a credential is attached to a request and the only place raw
// status codes are turned into the client error taxonomy.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::DeskConfig;
use crate::session::SessionStore;
use crate::{DeskError, Result};

/// Navigation demands the core can raise. The host UI decides how to
/// route; the core only signals intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Send the user to the login screen. `return_to` is the path the
    /// user was trying to reach, so login can come back to it.
    Login { return_to: Option<String> },
    /// Send the user to the not-authorized screen.
    Unauthorized,
    /// Server-directed target, e.g. the dashboard picked at login.
    To(String),
}

#[async_trait]
pub trait NavigationSink: Send + Sync {
    async fn navigate(&self, target: Navigation);
}

/// Sink that drops every navigation demand. Useful for headless callers.
pub struct NullNavigation;

#[async_trait]
impl NavigationSink for NullNavigation {
    async fn navigate(&self, _target: Navigation) {}
}

/// Authenticated JSON gateway.
#[derive(Clone)]
pub struct ApiGateway {
    http: Client,
    base_url: String,
    session: SessionStore,
    navigation: Arc<dyn NavigationSink>,
}

impl ApiGateway {
    pub fn new(
        config: &DeskConfig,
        session: SessionStore,
        navigation: Arc<dyn NavigationSink>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DeskError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url_trimmed().to_string(),
            session,
            navigation,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let req = self.authed(Method::GET, path)?;
        self.execute(req, path).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let req = self.authed(Method::POST, path)?.json(body);
        self.execute(req, path).await
    }

    /// POST with query-string parameters and no body. Several workflow
    /// endpoints take their arguments this way.
    pub async fn post_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let req = self.authed(Method::POST, path)?.query(query);
        self.execute(req, path).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let req = self.authed(Method::PUT, path)?.json(body);
        self.execute(req, path).await
    }

    /// Build an authenticated request, failing fast before any network
    /// traffic when no credential is stored.
    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.session.token().ok_or_else(|| {
            debug!(target: "gateway", path, "request without credential refused");
            DeskError::Unauthenticated("no credential in session".to_string())
        })?;
        let url = format!("{}{}", self.base_url, path);
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder, path: &str) -> Result<T> {
        let resp = req.send().await.map_err(|e| {
            warn!(target: "gateway", path, error = %e, "request failed in transit");
            DeskError::Transient(e.to_string())
        })?;
        self.handle_response(resp, path).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, resp: Response, path: &str) -> Result<T> {
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!(target: "gateway", path, "credential rejected, clearing session");
            self.session.clear();
            self.navigation
                .navigate(Navigation::Login { return_to: None })
                .await;
            return Err(DeskError::Unauthenticated(
                "session expired, please log in again".to_string(),
            ));
        }

        if status == StatusCode::FORBIDDEN {
            let message = read_detail(resp)
                .await
                .unwrap_or_else(|| "permission denied".to_string());
            warn!(target: "gateway", path, "request forbidden");
            self.navigation.navigate(Navigation::Unauthorized).await;
            return Err(DeskError::Unauthorized(message));
        }

        if !status.is_success() {
            let message = read_detail(resp)
                .await
                .unwrap_or_else(|| format!("request failed with status {status}"));
            debug!(target: "gateway", path, %status, message, "request rejected");
            return Err(DeskError::Rejected(message));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| DeskError::Transient(e.to_string()))?;
        let body = if text.trim().is_empty() { "null" } else { &text };
        serde_json::from_str(body)
            .map_err(|e| DeskError::Rejected(format!("unexpected response shape: {e}")))
    }
}

/// Pull a human-readable message out of an error response body. The
/// backend reports validation failures as `{"detail": [{"msg": ...}]}`
/// and most other rejections as `{"detail": "..."}`.
pub(crate) async fn read_detail(resp: Response) -> Option<String> {
    let text = resp.text().await.ok()?;
    detail_from_body(&text)
}

pub(crate) fn detail_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Array(items)) => items
            .first()
            .and_then(|item| item.get("msg"))
            .and_then(|msg| msg.as_str())
            .map(|s| s.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string_is_extracted() {
        let body = r#"{"detail": "Submission already assigned"}"#;
        assert_eq!(
            detail_from_body(body).as_deref(),
            Some("Submission already assigned")
        );
    }

    #[test]
    fn detail_array_takes_first_message() {
        let body = r#"{"detail": [{"loc": ["body", "edited_video_url"], "msg": "field required"}, {"msg": "second"}]}"#;
        assert_eq!(detail_from_body(body).as_deref(), Some("field required"));
    }

    #[test]
    fn missing_detail_yields_none() {
        assert_eq!(detail_from_body("{}"), None);
        assert_eq!(detail_from_body("not json"), None);
    }
}
