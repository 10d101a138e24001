//! Flush scheduler - time-based forced flush

use std::sync::Arc;

use contracts::{DaemonError, OutputSink};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

use crate::daemon::Shared;
use crate::ticker::Ticker;

/// Force-flush on every tick until `cancel` fires or the ticker stops
///
/// Fold failures are logged and do not stop the loop.
#[instrument(name = "flush_scheduler", skip_all, fields(daemon = %shared.name))]
pub(crate) async fn run_flush_scheduler<S, T>(
    shared: Arc<Shared<S, T>>,
    cancel: CancellationToken,
) -> Result<(), DaemonError>
where
    S: OutputSink + Sync + 'static,
    T: Ticker + Sync + 'static,
{
    debug!("flush scheduler started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            ticked = shared.ticker.tick() => {
                if !ticked {
                    break;
                }
                if let Err(e) = shared.flush_on_tick().await {
                    error!(error = %e, "can not flush all messages");
                }
            }
        }
    }

    shared.ticker.stop();
    debug!("flush scheduler stopped");
    Ok(())
}
