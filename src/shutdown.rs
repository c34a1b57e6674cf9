use tokio::sync::watch;

pub type ShutdownSender = watch::Sender<bool>;
pub type ShutdownReceiver = watch::Receiver<bool>;

/// Process-wide stop flag. Once raised it stays raised, so receivers created
/// later still observe it.
#[must_use]
pub fn shutdown_channel() -> (ShutdownSender, ShutdownReceiver) {
    watch::channel(false)
}

/// Raises the stop flag. Works whether or not anyone is listening.
pub fn request_shutdown(shutdown_tx: &ShutdownSender) {
    shutdown_tx.send_replace(true);
}

#[must_use]
pub fn shutdown_requested(shutdown_tx: &ShutdownSender) -> bool {
    *shutdown_tx.borrow()
}

/// Resolves once a stop has been requested, immediately if it already was.
/// A channel whose sender is gone without a request never resolves.
pub(crate) async fn wait_for_shutdown(shutdown_rx: &mut ShutdownReceiver) {
    if shutdown_rx.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}
