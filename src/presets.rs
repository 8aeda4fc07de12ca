//! Canned races for the routing backend's three latency-sensitive calls.
//!
//! Each preset builds the variant list and option set the corresponding
//! operation has been tuned for: analysis favors a moderate timeout with
//! escalation, generation a long timeout with fewer concurrent variants, and
//! liveness fails fast with escalation disabled.

use std::time::Duration;

use serde_json::{Value, json};

use crate::ReqraceResult;
use crate::coordinator::RaceCoordinator;
use crate::options::RaceOptions;
use crate::response::RaceResponse;
use crate::transport::RaceTransport;
use crate::variant::{RaceId, RequestVariant};

const ANALYZE_PATH: &str = "/analyze";
const GENERATE_PATH: &str = "/generate";
const HEALTH_PATH: &str = "/health";
const MODELS_PATH: &str = "/models";

const LIVENESS_RACE_ID: &str = "liveness-check";

impl<T: RaceTransport> RaceCoordinator<T> {
    /// Races an analysis request: the primary payload, a lightly perturbed
    /// alternate, and a simplified alternate against the same endpoint.
    pub async fn race_analysis(
        &self,
        prompt: &str,
        priority: &str,
        enabled_models: &[String],
    ) -> ReqraceResult<RaceResponse> {
        let variants = analysis_variants(prompt, priority, enabled_models)?;
        self.race(RaceId::timestamped("analysis"), variants, analysis_options())
            .await
    }

    /// Races a generation request: the primary payload plus one alternate
    /// with different sampling and length parameters.
    pub async fn race_generation(
        &self,
        model: &str,
        prompt: &str,
        messages: &[Value],
    ) -> ReqraceResult<RaceResponse> {
        let variants = generation_variants(model, prompt, messages)?;
        let race_id = RaceId::timestamped(&format!("generation-{model}"));
        self.race(race_id, variants, generation_options()).await
    }

    /// Races a liveness probe across two lightweight endpoints. Concurrent
    /// probes collapse onto one in-flight check via the fixed race id, and a
    /// total failure surfaces immediately without escalation.
    pub async fn race_liveness(&self) -> ReqraceResult<RaceResponse> {
        self.race(LIVENESS_RACE_ID, liveness_variants(), liveness_options())
            .await
    }
}

fn analysis_variants(
    prompt: &str,
    priority: &str,
    enabled_models: &[String],
) -> ReqraceResult<Vec<RequestVariant>> {
    Ok(vec![
        RequestVariant::post(ANALYZE_PATH).json(&json!({
            "prompt": prompt,
            "priority": priority,
            "enabled_models": enabled_models,
        }))?,
        RequestVariant::post(ANALYZE_PATH).json(&json!({
            "prompt": prompt,
            "priority": priority,
            "enabled_models": enabled_models,
            "temperature": 0.7,
        }))?,
        RequestVariant::post(ANALYZE_PATH).json(&json!({
            "prompt": prompt,
            "priority": priority,
        }))?,
    ])
}

fn analysis_options() -> RaceOptions {
    RaceOptions::standard()
        .timeout(Duration::from_secs(60))
        .max_concurrent(3)
        .stagger_delay(Duration::from_millis(800))
        .fallback_delay(Duration::from_millis(3000))
        .retry_on_failure(true)
}

fn generation_variants(
    model: &str,
    prompt: &str,
    messages: &[Value],
) -> ReqraceResult<Vec<RequestVariant>> {
    Ok(vec![
        RequestVariant::post(GENERATE_PATH).json(&json!({
            "model": model,
            "prompt": prompt,
            "messages": messages,
            "max_tokens": 2000,
        }))?,
        RequestVariant::post(GENERATE_PATH).json(&json!({
            "model": model,
            "prompt": prompt,
            "messages": messages,
            "max_tokens": 1500,
            "temperature": 0.8,
        }))?,
    ])
}

fn generation_options() -> RaceOptions {
    RaceOptions::standard()
        .timeout(Duration::from_secs(150))
        .max_concurrent(2)
        .stagger_delay(Duration::from_millis(2000))
        .fallback_delay(Duration::from_millis(8000))
        .retry_on_failure(true)
}

fn liveness_variants() -> Vec<RequestVariant> {
    vec![
        RequestVariant::get(HEALTH_PATH),
        RequestVariant::get(MODELS_PATH),
        RequestVariant::head(HEALTH_PATH),
    ]
}

fn liveness_options() -> RaceOptions {
    RaceOptions::standard()
        .timeout(Duration::from_secs(10))
        .max_concurrent(3)
        .stagger_delay(Duration::from_millis(200))
        .fallback_delay(Duration::from_millis(1000))
        .retry_on_failure(false)
}
