use std::sync::Arc;

use anyhow::Context;

use staged_onboarding::config::SessionConfig;
use staged_onboarding::dashboard::{DashboardStateController, dashboard_routes};
use staged_onboarding::stages::ActorType;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = SessionConfig::from_env().context("Failed to load configuration")?;

    let actor: ActorType = std::env::var("STAGED_ACTOR")
        .unwrap_or_else(|_| "driver".to_string())
        .parse()
        .map_err(anyhow::Error::msg)?;

    eprintln!("Staged onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Registration API: {}", config.api_base_url);
    eprintln!("   Actor type: {}", actor);
    eprintln!("   Dashboard API: http://0.0.0.0:{}/api/dashboard", config.listen_port);

    let controller = Arc::new(
        DashboardStateController::connect(actor, &config)
            .context("Failed to build registration client")?,
    );

    let state = controller.initialize(actor).await;
    tracing::info!(
        percentage = state.progress.percentage,
        current = state.current_stage,
        "Initial dashboard loaded"
    );

    let app = dashboard_routes(Arc::clone(&controller));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.listen_port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.listen_port))?;
    tracing::info!(port = config.listen_port, "Dashboard server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Dashboard server failed")?;

    controller.teardown().await;
    Ok(())
}
