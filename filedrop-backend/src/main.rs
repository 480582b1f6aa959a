use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use filedrop_backend::{build_app, sweeper::spawn_sweeper, AppState};
use filedrop_shared::AddrInfo;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // a missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = filedrop_backend::cli::CliOpts::parse();

    let my_filter = match cli.debug {
        true => "filedrop=debug,tower_http=debug",
        false => "filedrop=info,tower_http=info",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| my_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let appstate = match AppState::new(&cli).await {
        Ok(state) => state,
        Err(err) => {
            error!("Failed to initialize application state: {:?}", err);
            return ExitCode::FAILURE;
        }
    };
    let shared_state = Arc::new(appstate);

    let sweeper = cli
        .sweep_interval()
        .map(|every| spawn_sweeper(shared_state.clone(), every));

    let addrinfo = AddrInfo::from_env();

    let app: axum::Router = build_app(&shared_state);

    let listener = match tokio::net::TcpListener::bind(&addrinfo.as_addr()).await {
        Ok(val) => {
            info!("Listening on {}", addrinfo.as_url());
            val
        }
        Err(err) => {
            error!("Failed to bind to {}: {:?}", addrinfo.as_url(), err);
            return ExitCode::FAILURE;
        }
    };

    let res = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    match res {
        Ok(()) => {
            info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Server error: {:?}", err);
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {:?}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {:?}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
