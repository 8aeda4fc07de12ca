use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{AttemptError, AttemptFailure};
use crate::metrics::RaceMetrics;
use crate::options::RaceOptions;
use crate::response::RaceResponse;
use crate::transport::RaceTransport;
use crate::variant::{RaceId, RequestVariant};

/// Runs one race pass: staggered dispatch, first success wins.
///
/// The variant list is truncated to `max_concurrent`. Each scheduled dispatch
/// re-checks settlement when its delay elapses, so a fast winner suppresses
/// every not-yet-launched variant. The winner is chosen by completion order
/// among dispatched attempts, not by launch or index order. On a win all
/// other in-flight attempts receive one advisory cancellation; their eventual
/// results are discarded. If every dispatched attempt fails, the ordered
/// attempt-error list is returned for the caller to aggregate or escalate.
pub(crate) async fn execute<T: RaceTransport>(
    transport: &Arc<T>,
    metrics: &RaceMetrics,
    race_id: &RaceId,
    variants: &[RequestVariant],
    options: RaceOptions,
) -> Result<RaceResponse, Vec<AttemptError>> {
    let dispatched = &variants[..variants.len().min(options.configured_max_concurrent())];
    if dispatched.is_empty() {
        return Err(Vec::new());
    }

    let race_token = CancellationToken::new();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    for (index, variant) in dispatched.iter().enumerate() {
        let delay = options.dispatch_delay(index);
        let attempt_token = race_token.child_token();
        let event_tx = event_tx.clone();
        let transport = Arc::clone(transport);
        let metrics = metrics.clone();
        let variant = variant.clone();
        let race_id = race_id.clone();

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    _ = attempt_token.cancelled() => {
                        metrics.record_dispatch_suppressed();
                        debug!(race_id = %race_id, variant = index, "dispatch suppressed by settled race");
                        let _ = event_tx.send(AttemptEvent::Suppressed);
                        return;
                    }
                    _ = sleep(delay) => {}
                }
            }
            // Settlement re-check at fire time, not schedule time.
            if attempt_token.is_cancelled() {
                metrics.record_dispatch_suppressed();
                debug!(race_id = %race_id, variant = index, "dispatch suppressed by settled race");
                let _ = event_tx.send(AttemptEvent::Suppressed);
                return;
            }

            metrics.record_attempt_dispatched();
            debug!(race_id = %race_id, variant = index, "dispatching variant");
            let result = transport
                .send(&variant, options.configured_timeout(), attempt_token)
                .await;
            let _ = event_tx.send(AttemptEvent::Completed { index, result });
        });
    }
    drop(event_tx);

    let mut errors = Vec::new();
    let mut outstanding = dispatched.len();
    while outstanding > 0 {
        let Some(event) = event_rx.recv().await else {
            break;
        };
        outstanding -= 1;
        match event {
            AttemptEvent::Completed {
                index,
                result: Ok(response),
            } => {
                // First success settles the race; losers get one advisory
                // cancellation and their late results are never consumed.
                race_token.cancel();
                debug!(
                    race_id = %race_id,
                    variant = index,
                    status = response.status().as_u16(),
                    "variant won race"
                );
                return Ok(response);
            }
            AttemptEvent::Completed {
                index,
                result: Err(failure),
            } => {
                if failure.is_aborted() {
                    continue;
                }
                metrics.record_attempt_failed();
                warn!(race_id = %race_id, variant = index, error = %failure, "variant failed");
                errors.push(AttemptError {
                    variant: index,
                    error: failure,
                });
            }
            AttemptEvent::Suppressed => {}
        }
    }

    Err(errors)
}

enum AttemptEvent {
    Completed {
        index: usize,
        result: Result<RaceResponse, AttemptFailure>,
    },
    Suppressed,
}
