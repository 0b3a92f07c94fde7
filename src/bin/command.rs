use anyhow::Result;
use friend_request_notifier::dispatch::{Dispatcher, Outcome};
use friend_request_notifier::messaging::FcmGateway;
use friend_request_notifier::store::FirestoreUserStore;
use friend_request_notifier::{app, client};
use std::env::var;

/// Send the friend request notification to the user given by the
/// TARGET_ID environment variable, as if a relationship record
/// targeting them had just been created.
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

    match var("TARGET_ID").ok().filter(|id| !id.is_empty()) {
        Some(target_id) => dispatcher.notify(&target_id).await.log(),
        None => Outcome::MissingTarget {
            document: String::from("TARGET_ID"),
        }
        .log(),
    }
    Ok(())
}
