use anyhow::{Context, Result};
use friend_request_notifier::dispatch::Dispatcher;
use friend_request_notifier::messaging::FcmGateway;
use friend_request_notifier::server::{router, shutdown_signal, Receiver};
use friend_request_notifier::store::FirestoreUserStore;
use friend_request_notifier::{app, client};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Run an HTTP service that receives Firestore document creation
/// events pushed by Eventarc, and that notifies the target of each
/// friend request through FCM.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();
    let app = app::init()?;
    let client = client::init(&app.settings).await?;

    let store = FirestoreUserStore::new(
        client.clone(),
        &app.settings.firestore_database,
        &app.settings.users_collection,
    );
    let gateway = FcmGateway::new(client, app.settings.fcm_dry_run);
    let dispatcher = Dispatcher::new(&app, store, gateway);

    let addr = SocketAddr::from(([0, 0, 0, 0], app.settings.port));
    let receiver = Arc::new(Receiver { app, dispatcher });
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to listen on {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, router(receiver))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("The receiver stopped unexpectedly")
}
