// Route Guard Timing Tests
// Supersession, de-duplication and teardown around slow validations.
//
// A stub validator with a controllable delay stands in for the server so
// each test can park a check mid-flight and race navigations against it.

use newsdesk_core::access::{AccessDecision, AccessValidator};
use newsdesk_core::{Credential, GuardState, RouteGuard, SessionStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

struct StubValidator {
    delay: Duration,
    decision: AccessDecision,
    calls: Arc<AtomicUsize>,
    seen_paths: Arc<Mutex<Vec<String>>>,
}

impl StubValidator {
    fn slow(delay: Duration, decision: AccessDecision) -> (Self, Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_paths = Arc::new(Mutex::new(Vec::new()));
        let stub = Self {
            delay,
            decision,
            calls: Arc::clone(&calls),
            seen_paths: Arc::clone(&seen_paths),
        };
        (stub, calls, seen_paths)
    }
}

#[async_trait::async_trait]
impl AccessValidator for StubValidator {
    async fn validate(&self, _token: &str, requested_path: &str) -> AccessDecision {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_paths.lock().await.push(requested_path.to_string());
        sleep(self.delay).await;
        self.decision.clone()
    }
}

fn signed_in_session() -> SessionStore {
    let session = SessionStore::new();
    session.set(Credential::bearer("tok"), None);
    session
}

async fn settled_within(guard: &RouteGuard, limit: Duration) -> GuardState {
    timeout(limit, guard.settled())
        .await
        .expect("navigation should settle in time")
}

#[tokio::test]
async fn test_newer_navigation_supersedes_older_check() {
    let (stub, _, seen_paths) = StubValidator::slow(
        Duration::from_millis(200),
        AccessDecision::granted(None),
    );
    let guard = RouteGuard::new(Arc::new(stub), signed_in_session(), Duration::from_millis(10));

    // 1. Park the first check at the validator.
    guard.navigate("/editordashboard").await;
    sleep(Duration::from_millis(60)).await;

    // 2. Navigate elsewhere while the first check is still in flight.
    guard.navigate("/managerdashboard").await;

    let state = settled_within(&guard, Duration::from_secs(2)).await;
    match state {
        GuardState::Granted { ref path, .. } => assert_eq!(path, "/managerdashboard"),
        other => panic!("expected granted for the newer path, got {other:?}"),
    }

    // 3. The superseded result must never surface, even later.
    sleep(Duration::from_millis(300)).await;
    match guard.state() {
        GuardState::Granted { ref path, .. } => assert_eq!(
            path, "/managerdashboard",
            "stale result must not overwrite the newer one"
        ),
        other => panic!("state flickered to {other:?}"),
    }

    let paths = seen_paths.lock().await;
    assert_eq!(paths.last().map(|s| s.as_str()), Some("/managerdashboard"));

    println!("✓ Newer navigation supersedes the in-flight check");
}

#[tokio::test]
async fn test_same_path_renavigation_is_deduped() {
    let (stub, calls, _) = StubValidator::slow(
        Duration::from_millis(150),
        AccessDecision::granted(None),
    );
    let guard = RouteGuard::new(Arc::new(stub), signed_in_session(), Duration::from_millis(10));

    guard.navigate("/managerdashboard").await;
    sleep(Duration::from_millis(60)).await;
    // Second call for the path already being checked joins it.
    guard.navigate("/managerdashboard").await;

    let state = settled_within(&guard, Duration::from_secs(2)).await;
    assert!(matches!(state, GuardState::Granted { .. }));
    assert_eq!(
        calls.load(Ordering::SeqCst),
        1,
        "re-navigating to the same path must not start a second check"
    );

    println!("✓ Same-path re-navigation joins the in-flight check");
}

#[tokio::test]
async fn test_rapid_renavigation_collapses_in_the_debounce_window() {
    let (stub, calls, seen_paths) = StubValidator::slow(
        Duration::from_millis(20),
        AccessDecision::granted(None),
    );
    let guard = RouteGuard::new(Arc::new(stub), signed_in_session(), Duration::from_millis(80));

    // Both land inside the debounce window; only the second reaches the
    // validator.
    guard.navigate("/editordashboard").await;
    guard.navigate("/managerdashboard").await;

    let state = settled_within(&guard, Duration::from_secs(2)).await;
    match state {
        GuardState::Granted { ref path, .. } => assert_eq!(path, "/managerdashboard"),
        other => panic!("expected granted, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(seen_paths.lock().await.as_slice(), &["/managerdashboard".to_string()]);

    println!("✓ Rapid re-navigation collapses to one validation");
}

#[tokio::test]
async fn test_close_abandons_inflight_check() {
    let (stub, _, _) = StubValidator::slow(
        Duration::from_millis(100),
        AccessDecision::granted(None),
    );
    let guard = RouteGuard::new(Arc::new(stub), signed_in_session(), Duration::from_millis(10));

    guard.navigate("/managerdashboard").await;
    sleep(Duration::from_millis(40)).await;
    guard.close().await;

    // Give the abandoned check time to have finished, had it survived.
    sleep(Duration::from_millis(250)).await;
    assert!(
        !guard.state().is_settled(),
        "a closed guard must not publish a result, state was {:?}",
        guard.state()
    );

    println!("✓ Close abandons the in-flight check");
}

#[tokio::test]
async fn test_close_without_navigation_is_harmless() {
    let (stub, calls, _) = StubValidator::slow(Duration::ZERO, AccessDecision::granted(None));
    let guard = RouteGuard::new(Arc::new(stub), signed_in_session(), Duration::from_millis(10));

    guard.close().await;
    guard.close().await;

    assert_eq!(guard.state(), GuardState::Idle);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    println!("✓ Close without a navigation is harmless");
}

#[tokio::test]
async fn test_navigation_still_works_after_close() {
    let (stub, _, _) = StubValidator::slow(
        Duration::from_millis(10),
        AccessDecision::granted(None),
    );
    let guard = RouteGuard::new(Arc::new(stub), signed_in_session(), Duration::from_millis(10));

    guard.navigate("/editordashboard").await;
    guard.close().await;
    guard.navigate("/editordashboard").await;

    let state = settled_within(&guard, Duration::from_secs(2)).await;
    match state {
        GuardState::Granted { ref path, .. } => assert_eq!(path, "/editordashboard"),
        other => panic!("expected granted, got {other:?}"),
    }

    println!("✓ The guard accepts navigations after close");
}

#[tokio::test]
async fn test_denied_leaves_session_for_other_routes() {
    let (stub, _, _) = StubValidator::slow(
        Duration::from_millis(10),
        AccessDecision::denied(None),
    );
    let session = signed_in_session();
    let guard = RouteGuard::new(Arc::new(stub), session.clone(), Duration::from_millis(10));

    guard.navigate("/admindashboard").await;
    let state = settled_within(&guard, Duration::from_secs(2)).await;

    assert_eq!(
        state,
        GuardState::Denied {
            path: "/admindashboard".to_string()
        }
    );
    assert!(
        session.is_authenticated(),
        "denied is not signed out, other routes may still be reachable"
    );

    println!("✓ Denied keeps the session intact");
}
