//! Event loop and shutdown.

use std::future::Future;
use tokio_stream::{Stream, StreamExt};

use crate::controller::ActuationController;
use crate::error::Result;
use crate::types::ActuatorState;

/// Counts of what the event loop saw before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub handled: usize,
    pub rejected: usize,
}

/// Feed snapshots to `controller` one at a time until `shutdown` resolves or
/// the stream ends, then shut the controller down.
///
/// A snapshot that failed to decode is logged and skipped; the loop keeps
/// going. A snapshot already being handled when `shutdown` resolves is
/// finished first.
pub async fn run<S, F>(
    controller: &ActuationController,
    mut snapshots: S,
    shutdown: F,
) -> RunSummary
where
    S: Stream<Item = Result<ActuatorState>> + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut summary = RunSummary::default();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown requested, stopping listener");
                break;
            }
            next = snapshots.next() => match next {
                Some(Ok(snapshot)) => {
                    controller.handle(snapshot).await;
                    summary.handled += 1;
                }
                Some(Err(e)) => {
                    tracing::error!("rejected document snapshot: {e}");
                    summary.rejected += 1;
                }
                None => {
                    tracing::warn!("state source closed");
                    break;
                }
            },
        }
    }

    controller.shutdown().await;
    summary
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("received SIGINT");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("received SIGTERM");
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
