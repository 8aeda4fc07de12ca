use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::{Instrument, debug, info_span};

use crate::ReqraceResult;
use crate::error::RaceError;
use crate::escalation;
use crate::executor;
use crate::metrics::{RaceMetrics, RaceMetricsSnapshot};
use crate::options::RaceOptions;
use crate::response::RaceResponse;
use crate::transport::RaceTransport;
use crate::variant::{RaceId, RequestVariant};

type SharedOutcome = Shared<BoxFuture<'static, ReqraceResult<RaceResponse>>>;

/// Public entry point of the racing engine.
///
/// Owns the registry of in-flight races: concurrent callers that share a
/// [`RaceId`] collapse onto one execution and receive the same settled
/// outcome, and the registry entry is removed on settlement regardless of
/// whether the race won or failed. Races are driven by a spawned task, so
/// they progress and settle even if every caller stops awaiting.
pub struct RaceCoordinator<T: RaceTransport> {
    transport: Arc<T>,
    active: Arc<Mutex<HashMap<RaceId, SharedOutcome>>>,
    metrics: RaceMetrics,
}

impl<T: RaceTransport> Clone for RaceCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            active: Arc::clone(&self.active),
            metrics: self.metrics.clone(),
        }
    }
}

impl<T: RaceTransport> RaceCoordinator<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            active: Arc::new(Mutex::new(HashMap::new())),
            metrics: RaceMetrics::default(),
        }
    }

    /// Races the given variants and resolves with the first success, or with
    /// one aggregate error carrying every non-aborted attempt failure from
    /// the primary pass and, when `retry_on_failure` is set, the single
    /// escalation pass.
    pub async fn race(
        &self,
        race_id: impl Into<RaceId>,
        variants: Vec<RequestVariant>,
        options: RaceOptions,
    ) -> ReqraceResult<RaceResponse> {
        let race_id = race_id.into();
        let outcome = {
            // Lookup-and-insert happens under one lock acquisition so two
            // concurrent registrations for the same id cannot race.
            let mut active = crate::util::lock_unpoisoned(&self.active);
            if let Some(existing) = active.get(&race_id) {
                self.metrics.record_dedup_join();
                debug!(race_id = %race_id, "joining in-flight race");
                existing.clone()
            } else {
                let shared = self.spawn_race(race_id.clone(), variants, options);
                active.insert(race_id, shared.clone());
                shared
            }
        };
        outcome.await
    }

    pub fn metrics(&self) -> RaceMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn active_race_count(&self) -> usize {
        crate::util::lock_unpoisoned(&self.active).len()
    }

    fn spawn_race(
        &self,
        race_id: RaceId,
        variants: Vec<RequestVariant>,
        options: RaceOptions,
    ) -> SharedOutcome {
        self.metrics.record_race_started();
        let transport = Arc::clone(&self.transport);
        let active = Arc::clone(&self.active);
        let metrics = self.metrics.clone();

        let handle = tokio::spawn(async move {
            let span = info_span!(
                "reqrace.race",
                race_id = %race_id,
                variants = variants.len(),
                escalation = options.configured_retry_on_failure()
            );
            let outcome = run_race(&transport, &metrics, &race_id, &variants, options)
                .instrument(span)
                .await;
            match &outcome {
                Ok(_) => metrics.record_race_won(),
                Err(_) => metrics.record_race_failed(),
            }
            // Removed unconditionally, so the next call with this id starts
            // a brand-new dispatch.
            crate::util::lock_unpoisoned(&active).remove(&race_id);
            outcome
        });

        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err(RaceError::RaceTaskFailed {
                    message: join_error.to_string(),
                }),
            }
        }
        .boxed()
        .shared()
    }
}

async fn run_race<T: RaceTransport>(
    transport: &Arc<T>,
    metrics: &RaceMetrics,
    race_id: &RaceId,
    variants: &[RequestVariant],
    options: RaceOptions,
) -> ReqraceResult<RaceResponse> {
    debug!("race started");
    match executor::execute(transport, metrics, race_id, variants, options).await {
        Ok(response) => Ok(response),
        Err(attempts) => {
            if options.configured_retry_on_failure() && !variants.is_empty() {
                escalation::escalate(transport, metrics, race_id, variants, options, attempts).await
            } else {
                Err(RaceError::AllVariantsFailed { attempts })
            }
        }
    }
}
