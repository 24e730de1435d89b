// Route guard: per-navigation authorization state machine.
//
// Every protected navigation runs checking -> granted | denied |
// signed-out, observed through a watch channel. A newer navigation
// supersedes an older one; a superseded check can never publish.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::access::AccessValidator;
use crate::model::UserProfile;
use crate::session::SessionStore;

/// Authorization state of the most recent navigation.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardState {
    /// No navigation has been evaluated yet.
    Idle,
    /// Validation for `path` is in flight. Nothing privileged renders.
    Checking { path: String },
    /// Server confirmed both the session and the permission.
    Granted {
        path: String,
        user: Option<UserProfile>,
    },
    /// Valid session, insufficient permission. The session is kept.
    Denied { path: String },
    /// No usable session. `return_to` is where login should come back to.
    SignedOut { return_to: String },
}

impl GuardState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Idle | Self::Checking { .. })
    }
}

struct Inflight {
    path: String,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct GuardInner {
    generation: u64,
    inflight: Option<Inflight>,
}

/// Gate in front of protected routes.
///
/// De-duplicates checks for the path already in flight, cancels the
/// in-flight check when a different path takes over, and discards late
/// results from superseded checks via a generation counter.
pub struct RouteGuard {
    validator: Arc<dyn AccessValidator>,
    session: SessionStore,
    debounce: Duration,
    state: Arc<watch::Sender<GuardState>>,
    inner: Arc<Mutex<GuardInner>>,
}

impl RouteGuard {
    pub fn new(
        validator: Arc<dyn AccessValidator>,
        session: SessionStore,
        debounce: Duration,
    ) -> Self {
        let (state, _) = watch::channel(GuardState::Idle);
        Self {
            validator,
            session,
            debounce,
            state: Arc::new(state),
            inner: Arc::new(Mutex::new(GuardInner::default())),
        }
    }

    /// Begin evaluating a navigation to `path`.
    ///
    /// Publishes `Checking` immediately; the outcome arrives on the watch
    /// channel once the server answers. Calling again with the same path
    /// while its check runs is a no-op; calling with a different path
    /// abandons the older check.
    pub async fn navigate(&self, path: &str) {
        let mut inner = self.inner.lock().await;

        if let Some(inflight) = &inner.inflight {
            if inflight.path == path && !inflight.handle.is_finished() {
                debug!(target: "route_guard", path, "validation already in flight");
                return;
            }
            inflight.handle.abort();
        }

        inner.generation += 1;
        let generation = inner.generation;
        self.state.send_replace(GuardState::Checking {
            path: path.to_string(),
        });

        let validator = Arc::clone(&self.validator);
        let session = self.session.clone();
        let state = Arc::clone(&self.state);
        let inner_ref = Arc::clone(&self.inner);
        let debounce = self.debounce;
        let target_path = path.to_string();

        let handle = tokio::spawn(async move {
            // Rapid re-navigations land here and get aborted before the
            // debounce elapses, so only the last one reaches the server.
            tokio::time::sleep(debounce).await;

            let next = match session.get() {
                None => GuardState::SignedOut {
                    return_to: target_path.clone(),
                },
                Some(credential) => {
                    let decision = validator.validate(&credential.token, &target_path).await;
                    if !decision.valid {
                        // The server would not vouch for this credential.
                        session.clear();
                        GuardState::SignedOut {
                            return_to: target_path.clone(),
                        }
                    } else if decision.authorized {
                        GuardState::Granted {
                            path: target_path.clone(),
                            user: decision.user,
                        }
                    } else {
                        GuardState::Denied {
                            path: target_path.clone(),
                        }
                    }
                }
            };

            let mut inner = inner_ref.lock().await;
            if inner.generation == generation {
                info!(target: "route_guard", path = %target_path, state = next_kind(&next), "navigation settled");
                inner.inflight = None;
                state.send_replace(next);
            } else {
                debug!(target: "route_guard", path = %target_path, "navigation superseded, result discarded");
            }
        });

        inner.inflight = Some(Inflight {
            path: path.to_string(),
            handle,
        });
    }

    /// Abandon any in-flight check. Its result will never publish.
    /// Safe to call repeatedly.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        if let Some(inflight) = inner.inflight.take() {
            inflight.handle.abort();
            debug!(target: "route_guard", path = %inflight.path, "in-flight check abandoned");
        }
    }

    pub fn state(&self) -> GuardState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.state.subscribe()
    }

    /// Wait until the current navigation settles and return the outcome.
    pub async fn settled(&self) -> GuardState {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(GuardState::is_settled).await {
            Ok(settled) => settled.clone(),
            Err(_) => self.state.borrow().clone(),
        };
        settled
    }
}

fn next_kind(state: &GuardState) -> &'static str {
    match state {
        GuardState::Idle => "idle",
        GuardState::Checking { .. } => "checking",
        GuardState::Granted { .. } => "granted",
        GuardState::Denied { .. } => "denied",
        GuardState::SignedOut { .. } => "signed-out",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessDecision, MockAccessValidator};
    use crate::session::Credential;

    fn guard_with(
        mock: MockAccessValidator,
        session: SessionStore,
    ) -> RouteGuard {
        RouteGuard::new(Arc::new(mock), session, Duration::from_millis(5))
    }

    #[tokio::test]
    async fn missing_credential_short_circuits() {
        let mut mock = MockAccessValidator::new();
        mock.expect_validate().times(0);

        let guard = guard_with(mock, SessionStore::new());
        guard.navigate("/managerdashboard").await;

        let state = guard.settled().await;
        assert_eq!(
            state,
            GuardState::SignedOut {
                return_to: "/managerdashboard".to_string()
            }
        );
    }

    #[tokio::test]
    async fn valid_and_permitted_grants() {
        let mut mock = MockAccessValidator::new();
        mock.expect_validate()
            .times(1)
            .returning(|_, _| AccessDecision::granted(None));

        let session = SessionStore::new();
        session.set(Credential::bearer("tok"), None);

        let guard = guard_with(mock, session);
        guard.navigate("/editordashboard").await;

        match guard.settled().await {
            GuardState::Granted { path, .. } => assert_eq!(path, "/editordashboard"),
            other => panic!("expected granted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn valid_without_permission_denies_and_keeps_session() {
        let mut mock = MockAccessValidator::new();
        mock.expect_validate()
            .times(1)
            .returning(|_, _| AccessDecision::denied(None));

        let session = SessionStore::new();
        session.set(Credential::bearer("tok"), None);

        let guard = guard_with(mock, session.clone());
        guard.navigate("/admindashboard").await;

        assert_eq!(
            guard.settled().await,
            GuardState::Denied {
                path: "/admindashboard".to_string()
            }
        );
        assert!(session.is_authenticated(), "denied must not clear the session");
    }

    #[tokio::test]
    async fn invalid_session_is_cleared() {
        let mut mock = MockAccessValidator::new();
        mock.expect_validate()
            .times(1)
            .returning(|_, _| AccessDecision::default());

        let session = SessionStore::new();
        session.set(Credential::bearer("stale"), None);

        let guard = guard_with(mock, session.clone());
        guard.navigate("/managerdashboard").await;

        match guard.settled().await {
            GuardState::SignedOut { return_to } => assert_eq!(return_to, "/managerdashboard"),
            other => panic!("expected signed-out, got {other:?}"),
        }
        assert!(!session.is_authenticated(), "rejected credential must be dropped");
    }
}
