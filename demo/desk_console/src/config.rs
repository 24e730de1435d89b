use std::fs;
use std::path::Path;
use std::time::Duration;

use newsdesk_core::{DeskConfig, Role};

/// High-level configuration for the desk console demo
#[derive(Clone, Debug)]
pub struct DeskConsoleConfig {
    pub desk: DeskConfig,
    pub login: LoginConfig,
    /// Dashboard to open when the server does not pick one at login.
    pub role: Role,
}

/// Demo account credentials, env-driven for unattended runs.
#[derive(Clone, Debug)]
pub struct LoginConfig {
    pub username: String,
    pub password: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            username: std::env::var("NEWSDESK_USERNAME")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "manager".to_string()),
            password: std::env::var("NEWSDESK_PASSWORD").unwrap_or_default(),
        }
    }
}

impl Default for DeskConsoleConfig {
    fn default() -> Self {
        // Start from the core's env-driven defaults
        let role = std::env::var("NEWSDESK_ROLE")
            .ok()
            .and_then(|v| Role::parse(&v))
            .unwrap_or(Role::Manager);
        Self {
            desk: DeskConfig::from_env(),
            login: LoginConfig::default(),
            role,
        }
    }
}

impl DeskConsoleConfig {
    /// Load configuration from a TOML file (path via DESK_CONSOLE_CONFIG or ./desk_console.toml),
    /// overlaying values onto sane defaults and env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path =
            std::env::var("DESK_CONSOLE_CONFIG").unwrap_or_else(|_| "desk_console.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "desk_console", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<DeskConsoleToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target = "desk_console", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "desk_console", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    /// Route the guard validates when login reports no landing page.
    pub fn dashboard_route(&self) -> String {
        format!("/{}dashboard", self.role.as_str())
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct DeskConsoleToml {
    pub role: Option<String>,
    pub api: Option<ApiToml>,
    pub login: Option<LoginToml>,
}

impl DeskConsoleToml {
    fn overlay(self, mut base: DeskConsoleConfig) -> DeskConsoleConfig {
        if let Some(r) = self.role.as_deref().and_then(Role::parse) {
            base.role = r;
        }
        if let Some(a) = self.api {
            a.apply(&mut base.desk);
        }
        if let Some(l) = self.login {
            l.apply(&mut base.login);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ApiToml {
    pub base_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub stream_retry_ms: Option<u64>,
    pub guard_debounce_ms: Option<u64>,
}
impl ApiToml {
    fn apply(self, c: &mut DeskConfig) {
        if let Some(v) = self.base_url {
            c.base_url = v;
        }
        if let Some(v) = self.request_timeout_ms {
            c.request_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.connect_timeout_ms {
            c.connect_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.stream_retry_ms {
            c.stream_retry_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.guard_debounce_ms {
            c.guard_debounce = Duration::from_millis(v);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LoginToml {
    pub username: Option<String>,
    pub password: Option<String>,
}
impl LoginToml {
    fn apply(self, l: &mut LoginConfig) {
        if let Some(v) = self.username {
            l.username = v;
        }
        if let Some(v) = self.password {
            l.password = v;
        }
    }
}
