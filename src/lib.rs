//! `reqrace` is an internal request-racing transport crate for latency-sensitive API clients.
//!
//! For one logical operation the coordinator launches several redundant
//! request variants on a staggered schedule, adopts the first successful
//! response, cancels the losing attempts, collapses concurrent callers of the
//! same logical operation onto one execution, and, when every variant fails,
//! runs exactly one conservative escalation pass before surfacing an
//! aggregate error.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use reqrace::prelude::{HttpTransport, RaceCoordinator, RaceOptions, RequestVariant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HttpTransport::builder("https://api.example.com")
//!         .client_name("my-app")
//!         .try_build()?;
//!     let coordinator = RaceCoordinator::new(transport);
//!
//!     let variants = vec![
//!         RequestVariant::post("/analyze")
//!             .json(&serde_json::json!({ "prompt": "hello" }))?,
//!         RequestVariant::post("/analyze")
//!             .json(&serde_json::json!({ "prompt": "hello", "temperature": 0.7 }))?,
//!     ];
//!     let options = RaceOptions::standard()
//!         .timeout(Duration::from_secs(30))
//!         .stagger_delay(Duration::from_millis(800));
//!
//!     let response = coordinator.race("analyze-demo", variants, options).await?;
//!     println!("winner status={}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! # Known Limitation
//!
//! Cancellation is advisory: losing requests stop being consumed client-side,
//! but the remote peer may still finish the work. Callers hitting
//! non-idempotent endpoints must tolerate duplicate server-side effects.

mod coordinator;
mod error;
mod escalation;
mod executor;
mod metrics;
mod options;
mod presets;
mod response;
mod transport;
mod util;
mod variant;

pub use crate::coordinator::RaceCoordinator;
pub use crate::error::{AttemptError, AttemptFailure, RaceError, RaceErrorCode, TransportErrorKind};
pub use crate::metrics::RaceMetricsSnapshot;
pub use crate::options::RaceOptions;
pub use crate::response::RaceResponse;
pub use crate::transport::{HttpTransport, HttpTransportBuilder, RaceTransport};
pub use crate::variant::{RaceId, RequestVariant};

pub type ReqraceResult<T> = std::result::Result<T, RaceError>;

pub mod prelude {
    pub use crate::{
        AttemptError, AttemptFailure, HttpTransport, HttpTransportBuilder, RaceCoordinator,
        RaceError, RaceErrorCode, RaceId, RaceMetricsSnapshot, RaceOptions, RaceResponse,
        RaceTransport, ReqraceResult, RequestVariant, TransportErrorKind,
    };
}
