/// Standalone Signup Probe Example
///
/// This example exercises the account flows without the full desk console
/// loop: liveness probe, username and email availability, then an editor
/// registration that a manager approves later.
///
/// Run with: cargo run --example signup_probe
use newsdesk_core::{DeskConfig, DeskError, Newsdesk, NullNavigation, Registration};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> newsdesk_core::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("info,newsdesk_core=debug")
        .with_target(true)
        .init();

    info!("🚀 Signup Probe - Availability & Registration");

    // 1. Configuration from the environment
    let config = DeskConfig::from_env();
    info!("🌐 Backend: {}", config.base_url);

    let desk = Newsdesk::new(config, Arc::new(NullNavigation))?;

    // 2. Liveness check before anything else
    match desk.auth.health().await {
        Ok(true) => info!("✅ Backend is up"),
        Ok(false) => info!("⚠️ Backend answered unhealthy, continuing anyway"),
        Err(e) => {
            info!("❌ Backend unreachable: {}", e);
            return Err(e);
        }
    }

    // 3. Probe the desired account names
    let username =
        std::env::var("SIGNUP_USERNAME").unwrap_or_else(|_| "probe-editor".to_string());
    let email =
        std::env::var("SIGNUP_EMAIL").unwrap_or_else(|_| format!("{username}@example.org"));

    let name_free = desk.auth.check_username(&username).await?;
    info!(
        "   - username \"{}\": {}",
        username,
        if name_free { "available" } else { "taken" }
    );
    let email_free = desk.auth.check_email(&email).await?;
    info!(
        "   - email \"{}\": {}",
        email,
        if email_free { "available" } else { "taken" }
    );

    if !name_free || !email_free {
        info!("🛑 Nothing to register, pick different credentials");
        return Ok(());
    }

    // 4. Submit the editor application
    let form = Registration {
        name: std::env::var("SIGNUP_NAME").unwrap_or_else(|_| "Probe Editor".to_string()),
        email,
        username: username.clone(),
        password: std::env::var("SIGNUP_PASSWORD").unwrap_or_else(|_| "change-me".to_string()),
    };
    match desk.auth.register_editor(&form).await {
        Ok(()) => info!(
            "✨ Application for \"{}\" submitted, awaiting manager approval",
            username
        ),
        Err(DeskError::Rejected(msg)) => info!("❌ Server declined the application: {}", msg),
        Err(e) => return Err(e),
    }

    Ok(())
}
