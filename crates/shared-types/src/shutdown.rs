//! Shutdown signalling over a `watch::Receiver<bool>`.

use tokio::sync::watch;

/// Resolves once `shutdown` holds `true`. A dropped sender counts as shutdown.
///
/// Nothing borrowed from the channel outlives the call, so the future can sit
/// in a `select!` next to branches that await.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
