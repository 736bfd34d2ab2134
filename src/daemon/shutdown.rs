use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Waits for a reason to stop: Ctrl-C, SIGTERM (sent by `wordwhen stop`) or another module
/// cancelling the token. Cancels the token in every case so the rest of the daemon winds down.
///
/// On Windows detached processes can't detect signals sent to them, there `stop` kills the
/// process instead.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
        },
        _ = terminate() => {
            info!("Received SIGTERM, shutting down");
        },
        _ = cancelation.cancelled() => (),
    };
    cancelation.cancel();
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(_) => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}
