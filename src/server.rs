//! Defines the HTTP receiver that Eventarc pushes events to.

use crate::app::App;
use crate::dispatch::Dispatcher;
use crate::messaging::PushGateway;
use crate::store::UserStore;
use crate::trigger::Trigger;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Everything a request needs, shared by all of them.
pub struct Receiver<S, G> {
    pub app: App,
    pub dispatcher: Dispatcher<S, G>,
}

/// Liveness probe.
async fn health() -> &'static str {
    "OK"
}

/// Handle one pushed event. The answer is always a success, so that
/// the event isn't delivered again: failures are only logged.
async fn receive<S, G>(
    State(receiver): State<Arc<Receiver<S, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode
where
    S: UserStore + 'static,
    G: PushGateway + 'static,
{
    match Trigger::from_request(&headers, &body) {
        Ok(trigger) => {
            if receiver.app.should_handle(&trigger) {
                receiver.dispatcher.dispatch(&trigger.document).await;
            }
        }
        Err(e) => error!("Couldn't decode the pushed event: {:#}", e),
    }
    StatusCode::OK
}

/// Build the receiver's router.
pub fn router<S, G>(receiver: Arc<Receiver<S, G>>) -> Router
where
    S: UserStore + 'static,
    G: PushGateway + 'static,
{
    Router::new()
        .route("/", post(receive::<S, G>))
        .route("/healthz", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(receiver)
}

/// Wait for SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Couldn't listen for CTRL-C: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Couldn't listen for SIGTERM: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("CTRL-C"),
        _ = terminate => info!("SIGTERM"),
    }
}
