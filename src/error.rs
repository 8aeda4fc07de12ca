use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Read,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Read => "read",
            Self::Other => "other",
        };
        formatter.write_str(text)
    }
}

/// Classified outcome of one failed attempt inside a race.
///
/// `Aborted` marks an engine-initiated cancellation of a losing attempt; it
/// never appears in the aggregate error list surfaced to callers.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AttemptFailure {
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u128 },
    #[error("request aborted by race settlement")]
    Aborted,
    #[error("transport error ({kind}): {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },
    #[error("http status error {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

impl AttemptFailure {
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// One failed attempt keyed by the ordinal position of its variant.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("variant {variant}: {error}")]
pub struct AttemptError {
    pub variant: usize,
    pub error: AttemptFailure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RaceErrorCode {
    InvalidUri,
    SerializeJson,
    InvalidHeaderName,
    InvalidHeaderValue,
    RequestBuild,
    Deserialize,
    TlsInit,
    AllVariantsFailed,
    RaceTaskFailed,
}

impl RaceErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUri => "invalid_uri",
            Self::SerializeJson => "serialize_json",
            Self::InvalidHeaderName => "invalid_header_name",
            Self::InvalidHeaderValue => "invalid_header_value",
            Self::RequestBuild => "request_build",
            Self::Deserialize => "deserialize",
            Self::TlsInit => "tls_init",
            Self::AllVariantsFailed => "all_variants_failed",
            Self::RaceTaskFailed => "race_task_failed",
        }
    }
}

/// Terminal error of a race, or a build-time configuration error.
///
/// Kept `Clone` so a settled outcome can be handed to every deduplicated
/// caller of the same race; error sources are therefore carried as rendered
/// messages instead of boxed source errors.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum RaceError {
    #[error("invalid request uri: {uri}")]
    InvalidUri { uri: String },
    #[error("failed to serialize request json: {message}")]
    Serialize { message: String },
    #[error("invalid header name {name}: {message}")]
    InvalidHeaderName { name: String, message: String },
    #[error("invalid header value for {name}: {message}")]
    InvalidHeaderValue { name: String, message: String },
    #[error("failed to build http request: {message}")]
    RequestBuild { message: String },
    #[error("failed to decode response json: {message}; body={body}")]
    Deserialize { message: String, body: String },
    #[error("failed to initialize tls backend: {message}")]
    TlsInit { message: String },
    #[error("all {count} request variants failed: {summary}", count = .attempts.len(), summary = summarize_attempts(.attempts))]
    AllVariantsFailed { attempts: Vec<AttemptError> },
    #[error("race task failed: {message}")]
    RaceTaskFailed { message: String },
}

impl RaceError {
    pub const fn code(&self) -> RaceErrorCode {
        match self {
            Self::InvalidUri { .. } => RaceErrorCode::InvalidUri,
            Self::Serialize { .. } => RaceErrorCode::SerializeJson,
            Self::InvalidHeaderName { .. } => RaceErrorCode::InvalidHeaderName,
            Self::InvalidHeaderValue { .. } => RaceErrorCode::InvalidHeaderValue,
            Self::RequestBuild { .. } => RaceErrorCode::RequestBuild,
            Self::Deserialize { .. } => RaceErrorCode::Deserialize,
            Self::TlsInit { .. } => RaceErrorCode::TlsInit,
            Self::AllVariantsFailed { .. } => RaceErrorCode::AllVariantsFailed,
            Self::RaceTaskFailed { .. } => RaceErrorCode::RaceTaskFailed,
        }
    }

    /// Ordered attempt errors of a terminal failure: primary pass first, then
    /// the escalation pass if one ran. Empty for non-aggregate errors.
    pub fn attempt_errors(&self) -> &[AttemptError] {
        match self {
            Self::AllVariantsFailed { attempts } => attempts,
            _ => &[],
        }
    }
}

fn summarize_attempts(attempts: &[AttemptError]) -> String {
    if attempts.is_empty() {
        return "no variants were dispatched".to_owned();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
