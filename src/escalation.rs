use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::error::{AttemptError, RaceError};
use crate::executor;
use crate::metrics::RaceMetrics;
use crate::options::RaceOptions;
use crate::response::RaceResponse;
use crate::transport::RaceTransport;
use crate::variant::{RaceId, RequestVariant};

pub(crate) const ESCALATION_BACKOFF: Duration = Duration::from_secs(1);

/// The single conservative retry pass after a primary run fails completely.
///
/// Waits a fixed backoff, reruns the executor once with the derived option
/// set (`retry_on_failure` forced off, so the rerun can never recurse), and
/// on another total failure surfaces the union of primary-pass and
/// escalation-pass attempt errors in order.
pub(crate) async fn escalate<T: RaceTransport>(
    transport: &Arc<T>,
    metrics: &RaceMetrics,
    race_id: &RaceId,
    variants: &[RequestVariant],
    primary_options: RaceOptions,
    mut primary_errors: Vec<AttemptError>,
) -> Result<RaceResponse, RaceError> {
    metrics.record_escalation();
    warn!(
        race_id = %race_id,
        failed_attempts = primary_errors.len(),
        backoff_ms = ESCALATION_BACKOFF.as_millis() as u64,
        "all variants failed, escalating once with conservative options"
    );
    sleep(ESCALATION_BACKOFF).await;

    let options = primary_options.escalated(variants.len());
    match executor::execute(transport, metrics, race_id, variants, options).await {
        Ok(response) => Ok(response),
        Err(mut escalation_errors) => {
            primary_errors.append(&mut escalation_errors);
            Err(RaceError::AllVariantsFailed {
                attempts: primary_errors,
            })
        }
    }
}
