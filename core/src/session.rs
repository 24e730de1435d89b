// Session store: the single owner of the auth credential.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::model::Role;

/// Scopes a credential may have been written under by earlier builds of
/// the frontend. `clear` sweeps every one of them, plus anything else
/// present in the jar.
const KNOWN_SCOPES: &[&str] = &[
    ROOT_SCOPE,
    "/editordashboard",
    "/managerdashboard",
    "/admindashboard",
];

const ROOT_SCOPE: &str = "/";

/// Bearer credential plus display-only identity hints. The hints are never
/// consulted for authorization, the server is asked instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub token: String,
    pub role: Option<Role>,
    pub verified: bool,
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            role: None,
            verified: false,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredCredential {
    credential: Credential,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredCredential {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        if self.credential.token.is_empty() {
            return false;
        }
        match self.expires_at {
            Some(at) => at > now,
            None => true,
        }
    }
}

/// Scoped, expiring credential jar. One instance per application, injected
/// into whatever needs it rather than reached through a global.
///
/// Reads never fail: an expired or malformed entry is simply absent.
#[derive(Clone, Default)]
pub struct SessionStore {
    jar: Arc<DashMap<String, StoredCredential>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the credential at the root scope so every route can read it.
    /// A `ttl` of `None` keeps the entry until it is cleared.
    pub fn set(&self, credential: Credential, ttl: Option<Duration>) {
        let expires_at = ttl
            .and_then(|t| chrono::Duration::from_std(t).ok())
            .map(|d| Utc::now() + d);
        self.jar.insert(
            ROOT_SCOPE.to_string(),
            StoredCredential {
                credential,
                expires_at,
            },
        );
    }

    /// Store a credential under an arbitrary scope. Legacy builds wrote
    /// under dashboard paths; this exists so those entries can be
    /// represented and swept.
    pub fn set_scoped(&self, scope: &str, credential: Credential, ttl: Option<Duration>) {
        let expires_at = ttl
            .and_then(|t| chrono::Duration::from_std(t).ok())
            .map(|d| Utc::now() + d);
        self.jar.insert(
            scope.to_string(),
            StoredCredential {
                credential,
                expires_at,
            },
        );
    }

    /// Current credential, if any scope holds a live one. The root scope
    /// wins when populated.
    pub fn get(&self) -> Option<Credential> {
        let now = Utc::now();
        if let Some(cred) = self.read_scope(ROOT_SCOPE, now) {
            return Some(cred);
        }
        // Legacy scoped entries still authenticate until swept.
        let mut found = None;
        let mut dead = Vec::new();
        for entry in self.jar.iter() {
            if entry.value().is_live(now) {
                found = Some(entry.value().credential.clone());
                break;
            }
            dead.push(entry.key().clone());
        }
        for scope in dead {
            self.jar.remove(&scope);
        }
        found
    }

    /// Bearer token of the current credential.
    pub fn token(&self) -> Option<String> {
        self.get().map(|c| c.token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }

    /// Remove the credential from every scope it could live under.
    pub fn clear(&self) {
        for scope in KNOWN_SCOPES {
            self.jar.remove(*scope);
        }
        let leftovers: Vec<String> = self.jar.iter().map(|e| e.key().clone()).collect();
        for scope in leftovers {
            self.jar.remove(&scope);
        }
        debug!(target: "session", "session cleared");
    }

    fn read_scope(&self, scope: &str, now: DateTime<Utc>) -> Option<Credential> {
        if let Some(entry) = self.jar.get(scope) {
            if entry.is_live(now) {
                return Some(entry.credential.clone());
            }
        } else {
            return None;
        }
        // Expired entries are swept lazily on read.
        self.jar.remove(scope);
        None
    }
}
