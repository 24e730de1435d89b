mod config;
use config::DeskConsoleConfig;
use newsdesk_core::dashboard::{AdminTab, AdminView, EditorTab, EditorView, ManagerView};
use newsdesk_core::{
    ChannelEvent, DeskError, GuardState, LoginOutcome, Navigation, NavigationSink, Newsdesk, Role,
};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Prints where the runtime wants the user to go. A real frontend swaps
/// routes here.
struct ConsoleNavigation;

#[async_trait::async_trait]
impl NavigationSink for ConsoleNavigation {
    async fn navigate(&self, target: Navigation) {
        match target {
            Navigation::Login { return_to: Some(path) } => {
                info!(target = "desk_console", %path, "➡️  Would open the login screen, returning here after")
            }
            Navigation::Login { return_to: None } => {
                info!(target = "desk_console", "➡️  Would open the login screen")
            }
            Navigation::Unauthorized => {
                warn!(target = "desk_console", "➡️  Would open the not-authorized screen")
            }
            Navigation::To(path) => {
                info!(target = "desk_console", %path, "➡️  Would open this route")
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,newsdesk_core=info,desk_console=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        target = "desk_console",
        "Starting desk console: login → route guard → live dashboard"
    );

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = DeskConsoleConfig::load();

    // Runtime with a navigation sink that prints route demands
    let desk = Newsdesk::new(cfg.desk.clone(), Arc::new(ConsoleNavigation))?;

    if !desk.auth.health().await.unwrap_or(false) {
        warn!(
            target = "desk_console",
            url = %cfg.desk.base_url,
            "Backend health probe failed; continuing anyway"
        );
    }

    // Sign in. The server decides which dashboard this account lands on.
    let landing = match desk
        .auth
        .login(&cfg.login.username, &cfg.login.password)
        .await
    {
        Ok(LoginOutcome::Dashboard { redirect_url }) => redirect_url,
        Ok(LoginOutcome::NoDashboard) => {
            info!(
                target = "desk_console",
                "No dashboard assigned to this account; trying the configured role"
            );
            cfg.dashboard_route()
        }
        Err(e) => {
            error!(target = "desk_console", error = %e, "Login failed");
            return Err(e.into());
        }
    };

    // Route guard: nothing opens until the server confirms the permission.
    desk.guard.navigate(&landing).await;
    match desk.guard.settled().await {
        GuardState::Granted { path, user } => {
            let who = user
                .map(|u| u.name)
                .unwrap_or_else(|| cfg.login.username.clone());
            info!(target = "desk_console", %path, user = %who, "Route granted");
        }
        other => {
            error!(target = "desk_console", state = ?other, "Route was not granted, giving up");
            desk.auth.logout().await;
            desk.shutdown().await.ok();
            return Ok(());
        }
    }

    let role = role_for_route(&landing).unwrap_or(cfg.role);
    match role {
        Role::Manager => run_manager(&desk).await?,
        Role::Editor => run_editor(&desk).await?,
        Role::Admin => run_admin(&desk).await?,
        Role::Volunteer => {
            info!(target = "desk_console", "Volunteers have no dashboard; nothing to watch");
        }
    }

    desk.auth.logout().await;
    desk.shutdown().await.ok();
    Ok(())
}

/// Maps a landing route like `/managerdashboard` back to its role.
fn role_for_route(path: &str) -> Option<Role> {
    path.trim_matches('/')
        .strip_suffix("dashboard")
        .and_then(Role::parse)
}

async fn run_manager(desk: &Newsdesk) -> Result<(), DeskError> {
    let dashboard = desk.open_manager_dashboard().await?;
    let mut events = dashboard.session().channel().subscribe_events();
    print_manager(&dashboard.view().await);

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(target = "desk_console", "Shutting down...");
                break;
            }
            event = events.recv() => match event {
                Ok(ChannelEvent::KeepAlive) => continue,
                Ok(event) => {
                    note_event(&event);
                    print_manager(&dashboard.view().await);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    warn!(target = "desk_console", "Live channel closed");
                    break;
                }
            },
        }
    }

    dashboard.session().channel().metrics().print_stats().await;
    dashboard.close().await;
    Ok(())
}

async fn run_editor(desk: &Newsdesk) -> Result<(), DeskError> {
    let dashboard = desk.open_editor_dashboard().await?;
    let mut events = dashboard.session().channel().subscribe_events();
    print_editor(&dashboard.view(EditorTab::Assigned).await);

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(target = "desk_console", "Shutting down...");
                break;
            }
            event = events.recv() => match event {
                Ok(ChannelEvent::KeepAlive) => continue,
                Ok(event) => {
                    note_event(&event);
                    print_editor(&dashboard.view(EditorTab::Assigned).await);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    warn!(target = "desk_console", "Live channel closed");
                    break;
                }
            },
        }
    }

    dashboard.session().channel().metrics().print_stats().await;
    dashboard.close().await;
    Ok(())
}

async fn run_admin(desk: &Newsdesk) -> Result<(), DeskError> {
    let dashboard = desk.open_admin_dashboard().await?;
    let mut events = dashboard.session().channel().subscribe_events();
    print_admin(&dashboard.view(AdminTab::InProgress).await);

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(target = "desk_console", "Shutting down...");
                break;
            }
            event = events.recv() => match event {
                Ok(ChannelEvent::KeepAlive) => continue,
                Ok(event) => {
                    note_event(&event);
                    print_admin(&dashboard.view(AdminTab::InProgress).await);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    warn!(target = "desk_console", "Live channel closed");
                    break;
                }
            },
        }
    }

    dashboard.session().channel().metrics().print_stats().await;
    dashboard.close().await;
    Ok(())
}

fn note_event(event: &ChannelEvent) {
    match event {
        ChannelEvent::ItemCreated(item) => {
            info!(target = "desk_console", id = %item.id, from = %item.volunteer_name, "📥 New submission");
        }
        ChannelEvent::StatusChanged { id, patch } => {
            let status = patch
                .status
                .as_ref()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "updated".to_string());
            info!(target = "desk_console", %id, %status, "🔁 Submission moved");
        }
        ChannelEvent::Assigned { id, patch } => {
            let editor = patch
                .assigned_editor_name
                .clone()
                .unwrap_or_else(|| "unassigned".to_string());
            info!(target = "desk_console", %id, %editor, "✂️  Assignment changed");
        }
        ChannelEvent::KeepAlive => {}
    }
}

fn print_manager(view: &ManagerView) {
    println!();
    println!(
        "── Manager desk · {} submissions · {} awaiting review · {} ready to assign · {} out with editors",
        view.stats.total, view.stats.pending_review, view.stats.ready_to_assign, view.stats.assigned
    );
    for card in &view.cards {
        let editor = card.item.assigned_editor_name.as_deref().unwrap_or("-");
        let mut controls = Vec::new();
        if card.can_accept {
            controls.push("accept");
        }
        if card.can_decline {
            controls.push("decline");
        }
        if card.can_assign {
            controls.push("assign");
        }
        println!(
            "  #{:<6} {:<16} from {:<20} editor {:<14} [{}]",
            card.item.id,
            card.item.status,
            card.item.volunteer_name,
            editor,
            controls.join(", ")
        );
    }
    for load in &view.workloads {
        println!(
            "  {} is editing {} item(s)",
            load.editor.name, load.active_items
        );
    }
}

fn print_editor(view: &EditorView) {
    println!();
    println!(
        "── Editor desk · {} assigned · {} completed",
        view.assigned_count, view.completed_count
    );
    for row in &view.rows {
        let source = row.item.video_url.as_deref().unwrap_or("-");
        let note = row.item.notes.as_deref().unwrap_or("");
        println!(
            "  #{:<6} {:<16} source {:<32} {}",
            row.item.id, row.item.status, source, note
        );
    }
}

fn print_admin(view: &AdminView) {
    println!();
    println!(
        "── Admin desk · {} total · {} in flight · {} completed · {} used",
        view.totals.total,
        view.totals.assigned + view.totals.in_progress,
        view.totals.completed,
        view.totals.used
    );
    for activity in &view.editor_activity {
        println!(
            "  {:<20} {} in progress, {} completed",
            activity.editor.name, activity.in_progress, activity.completed
        );
    }
    let days: Vec<String> = view
        .daily_volume
        .iter()
        .map(|d| format!("{} {}", d.day, d.count))
        .collect();
    println!("  last 7 days: {}", days.join(" · "));
}
