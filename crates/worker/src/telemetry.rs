use lipsync_events::Envelope;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

const DEFAULT_FILTER: &str = "lipsync_worker=debug,lipsync_pipeline=debug";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing(format: LogFormat) {
    let registry = tracing_subscriber::registry().with(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
    );
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

/// Write every published job event to the log until cancelled or the
/// sender side goes away. Returns how many events were logged.
pub async fn log_events(
    mut rx: broadcast::Receiver<Envelope>,
    cancel: CancellationToken,
) -> usize {
    let mut logged = 0;
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => received,
        };
        match received {
            Ok(Envelope { owner_id, event }) => {
                tracing::debug!(
                    owner_id = %owner_id,
                    job_id = %event.job_id,
                    event_type = %event.event_type,
                    status = %event.status,
                    message = %event.message,
                    "Job event"
                );
                logged += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event log fell behind, events skipped");
            }
            Err(RecvError::Closed) => break,
        }
    }
    logged
}
