// Auth Flow Integration Tests
// Login outcomes, logout teardown, registration and availability probes.

mod support;

use newsdesk_core::{
    ApiGateway, AuthClient, Credential, DeskConfig, DeskError, LoginOutcome, NullNavigation,
    Registration, SessionStore,
};
use std::sync::Arc;
use std::time::Duration;
use support::{CannedResponse, TestServer};

fn auth_for(server: &TestServer) -> (AuthClient, SessionStore) {
    let config = DeskConfig {
        base_url: server.url(),
        request_timeout: Duration::from_secs(5),
        ..DeskConfig::default()
    };
    let session = SessionStore::new();
    let gateway = ApiGateway::new(&config, session.clone(), Arc::new(NullNavigation)).unwrap();
    let auth = AuthClient::new(&config, gateway).unwrap();
    (auth, session)
}

#[tokio::test]
async fn test_login_stores_credential_and_yields_redirect() {
    let server = TestServer::start(vec![CannedResponse::ok_json(
        r#"{"access_token": "fresh-token", "token_type": "bearer",
            "expires_in": 3600, "redirect_url": "/managerdashboard"}"#,
    )])
    .await;
    let (auth, session) = auth_for(&server);

    let outcome = auth.login("pat", "hunter2").await.unwrap();
    assert_eq!(
        outcome,
        LoginOutcome::Dashboard {
            redirect_url: "/managerdashboard".to_string()
        }
    );
    assert_eq!(session.token().as_deref(), Some("fresh-token"));

    let requests = server.requests().await;
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path(), "/login");
    assert!(
        requests[0]
            .header("content-type")
            .unwrap_or_default()
            .contains("application/x-www-form-urlencoded"),
        "login must be a form post"
    );
    assert!(requests[0].body.contains("username=pat"));
    assert!(requests[0].body.contains("password=hunter2"));

    println!("✓ Login stores the credential and yields the redirect");
}

#[tokio::test]
async fn test_login_without_redirect_reports_no_dashboard() {
    let server = TestServer::start(vec![CannedResponse::ok_json(
        r#"{"access_token": "volunteer-token"}"#,
    )])
    .await;
    let (auth, session) = auth_for(&server);

    let outcome = auth.login("vol", "pw").await.unwrap();
    assert_eq!(outcome, LoginOutcome::NoDashboard);
    assert!(
        session.is_authenticated(),
        "no dashboard still means signed in"
    );

    println!("✓ Login without a redirect reports no dashboard");
}

#[tokio::test]
async fn test_rejected_login_stores_nothing() {
    let server = TestServer::start(vec![CannedResponse::json(
        401,
        r#"{"detail": "Incorrect username or password"}"#,
    )])
    .await;
    let (auth, session) = auth_for(&server);

    let result = auth.login("pat", "wrong").await;
    match result {
        Err(DeskError::Rejected(msg)) => assert_eq!(msg, "Incorrect username or password"),
        other => panic!("expected rejected, got {other:?}"),
    }
    assert!(!session.is_authenticated(), "no credential may be stored");

    println!("✓ Rejected login stores nothing");
}

#[tokio::test]
async fn test_logout_clears_session_even_when_server_fails() {
    let server = TestServer::start(vec![CannedResponse::json(
        500,
        r#"{"detail": "logout backend down"}"#,
    )])
    .await;
    let (auth, session) = auth_for(&server);
    session.set(Credential::bearer("tok"), None);

    auth.logout().await;

    assert!(
        !session.is_authenticated(),
        "the local session goes regardless of the server"
    );
    assert_eq!(server.request_count().await, 1, "server logout was attempted");

    println!("✓ Logout clears locally even when the server fails");
}

#[tokio::test]
async fn test_logout_without_session_skips_the_server() {
    let server = TestServer::start(vec![CannedResponse::ok_json("{}")]).await;
    let (auth, session) = auth_for(&server);

    auth.logout().await;

    assert!(!session.is_authenticated());
    assert_eq!(
        server.request_count().await,
        0,
        "nothing to revoke, nothing to send"
    );

    println!("✓ Logout without a session skips the server");
}

#[tokio::test]
async fn test_registration_posts_the_form() {
    let server = TestServer::start(vec![CannedResponse::json(
        201,
        r#"{"id": 14, "username": "newbie"}"#,
    )])
    .await;
    let (auth, _) = auth_for(&server);

    let form = Registration {
        name: "New Editor".to_string(),
        email: "new@example.org".to_string(),
        username: "newbie".to_string(),
        password: "secret".to_string(),
    };
    auth.register_editor(&form).await.unwrap();

    let requests = server.requests().await;
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path(), "/register/editor");
    assert!(requests[0].body.contains("\"username\":\"newbie\""));
    assert!(requests[0].body.contains("\"email\":\"new@example.org\""));

    println!("✓ Registration posts the sign-up form");
}

#[tokio::test]
async fn test_duplicate_registration_surfaces_detail() {
    let server = TestServer::start(vec![CannedResponse::json(
        400,
        r#"{"detail": "Username already registered"}"#,
    )])
    .await;
    let (auth, _) = auth_for(&server);

    let form = Registration {
        name: "Dup".to_string(),
        email: "dup@example.org".to_string(),
        username: "taken".to_string(),
        password: "secret".to_string(),
    };
    let result = auth.register_manager(&form).await;
    match result {
        Err(DeskError::Rejected(msg)) => assert_eq!(msg, "Username already registered"),
        other => panic!("expected rejected, got {other:?}"),
    }

    println!("✓ Duplicate registration surfaces the server detail");
}

#[tokio::test]
async fn test_availability_probe_maps_answers_and_refusals() {
    let server = TestServer::start(vec![
        CannedResponse::ok_json(r#"{"available": true}"#),
        CannedResponse::ok_json(r#"{"available": false}"#),
        CannedResponse::json(400, r#"{"detail": "too short"}"#),
    ])
    .await;
    let (auth, _) = auth_for(&server);

    assert!(auth.check_username("fresh-name").await.unwrap());
    assert!(!auth.check_username("taken").await.unwrap());
    assert!(
        !auth.check_username("x").await.unwrap(),
        "a refusal reads as unavailable"
    );

    let requests = server.requests().await;
    assert_eq!(requests[0].path(), "/check-username/fresh-name");

    println!("✓ Availability probe maps answers and refusals");
}

#[tokio::test]
async fn test_health_probe_needs_no_credential() {
    let server = TestServer::start(vec![CannedResponse::ok_json(r#"{"status": "ok"}"#)]).await;
    let (auth, session) = auth_for(&server);
    assert!(!session.is_authenticated());

    assert!(auth.health().await.unwrap());

    let requests = server.requests().await;
    assert_eq!(requests[0].path(), "/health");
    assert_eq!(requests[0].header("authorization"), None);

    println!("✓ Health probe runs without a credential");
}
