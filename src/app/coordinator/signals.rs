//! Signal handling for graceful shutdown
//!
//! Ctrl-C or SIGTERM cancels the run's [`CancellationToken`]. Workers notice
//! at their next suspension point, and the coordinator reports whatever was
//! left as cancelled.

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels a token when the process is asked to stop
pub struct SignalHandler {
    cancel: CancellationToken,
}

impl SignalHandler {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Spawn the background task watching for CTRL-C and SIGTERM
    ///
    /// The task also ends quietly when the token is cancelled elsewhere.
    pub fn setup(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = signal::ctrl_c().await {
                    warn!("Could not listen for Ctrl+C: {}", e);
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
                        warn!("Could not listen for SIGTERM: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {
                    info!("Received Ctrl+C, finishing in-flight lookups");
                    cancel.cancel();
                },
                _ = terminate => {
                    info!("Received terminate signal, finishing in-flight lookups");
                    cancel.cancel();
                },
                _ = cancel.cancelled() => {},
            }
        })
    }
}
