//! zugate-backend
//!
//! HTTP service for event-ticket proof login.

use std::{env, net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zugate_backend::{app_router, AppState};
use zugate_pcd::dev::DevVerifier;

const DEV_VERIFIER_PUBKEY_ENV: &str = "ZUGATE_DEV_VERIFIER_PUBKEY";

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zugate_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let verifier_key = env::var(DEV_VERIFIER_PUBKEY_ENV).unwrap_or_else(|_| {
        panic!("{DEV_VERIFIER_PUBKEY_ENV} must be set to the prover public key (hex)")
    });
    let verifier = DevVerifier::from_hex(&verifier_key)
        .unwrap_or_else(|err| panic!("failed to parse {DEV_VERIFIER_PUBKEY_ENV}: {err}"));

    let state = AppState::from_env(Arc::new(verifier));

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("ticket login service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received");
}
