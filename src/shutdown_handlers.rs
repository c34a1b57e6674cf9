use tracing::warn;

use crate::shutdown::{ShutdownSender, request_shutdown, shutdown_requested};

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Exit status used when a second stop signal forces an immediate exit.
const FORCED_EXIT_CODE: i32 = 130;

/// Raises the stop flag on Ctrl+C (and SIGTERM on unix). A second signal
/// exits without waiting for in-flight requests. The task ends once every
/// shutdown receiver is gone.
pub fn setup_signal_shutdown_handler(shutdown_tx: &ShutdownSender) -> tokio::task::JoinHandle<()> {
    let shutdown_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        let mut signals = StopSignals::register();
        loop {
            tokio::select! {
                () = shutdown_tx.closed() => break,
                () = signals.recv() => {
                    if shutdown_requested(&shutdown_tx) {
                        warn!("Second stop signal; exiting without waiting for in-flight requests.");
                        std::process::exit(FORCED_EXIT_CODE);
                    }
                    warn!("Stop signal received; finishing in-flight requests. Press Ctrl+C again to exit now.");
                    request_shutdown(&shutdown_tx);
                }
            }
        }
    })
}

struct StopSignals {
    #[cfg(unix)]
    term: Option<Signal>,
}

impl StopSignals {
    #[cfg(unix)]
    fn register() -> Self {
        let term = match signal(SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                warn!("Failed to register SIGTERM handler: {}", err);
                None
            }
        };
        Self { term }
    }

    #[cfg(not(unix))]
    const fn register() -> Self {
        Self {}
    }

    #[cfg(unix)]
    async fn recv(&mut self) {
        tokio::select! {
            () = wait_for_ctrl_c() => {}
            () = async {
                match self.term.as_mut() {
                    Some(term) => {
                        if term.recv().await.is_none() {
                            std::future::pending::<()>().await;
                        }
                    }
                    None => std::future::pending::<()>().await,
                }
            } => {}
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) {
        wait_for_ctrl_c().await;
    }
}

async fn wait_for_ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
}
