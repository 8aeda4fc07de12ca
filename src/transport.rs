use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue, USER_AGENT};
use http::{HeaderMap, Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ReqraceResult;
use crate::error::{AttemptFailure, RaceError, TransportErrorKind};
use crate::response::RaceResponse;
use crate::util::{parse_header_name, parse_header_value, resolve_uri, truncate_body};
use crate::variant::RequestVariant;

const DEFAULT_CLIENT_NAME: &str = "reqrace";
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 8;
const DEFAULT_MAX_RESPONSE_BODY_BYTES: usize = 8 * 1024 * 1024;

/// One attempt against the remote service.
///
/// The implementation must respect the per-attempt deadline, honor the
/// advisory cancellation token, and classify every failure into the four-way
/// taxonomy. Cancellation is cooperative: it stops client-side consumption of
/// the result but does not guarantee the remote peer halts processing.
pub trait RaceTransport: Send + Sync + 'static {
    fn send(
        &self,
        variant: &RequestVariant,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<RaceResponse, AttemptFailure>> + Send;
}

type HyperClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Production [`RaceTransport`] backed by hyper with rustls.
#[derive(Clone)]
pub struct HttpTransport {
    client: HyperClient,
    base_url: Arc<str>,
    default_headers: Arc<HeaderMap>,
    max_response_body_bytes: usize,
}

impl HttpTransport {
    pub fn builder(base_url: impl Into<String>) -> HttpTransportBuilder {
        HttpTransportBuilder::new(base_url)
    }

    fn build_request(&self, variant: &RequestVariant) -> Result<(Uri, Request<Full<Bytes>>), RaceError> {
        let uri = resolve_uri(&self.base_url, variant.path())?;

        let mut builder = Request::builder().method(variant.method().clone()).uri(uri.clone());
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in self.default_headers.iter() {
                headers.insert(name.clone(), value.clone());
            }
            for (name, value) in variant.headers() {
                headers.insert(name.clone(), value.clone());
            }
        }
        let body = variant.body_bytes().cloned().unwrap_or_else(Bytes::new);
        let request = builder
            .body(Full::new(body))
            .map_err(|source| RaceError::RequestBuild {
                message: source.to_string(),
            })?;
        Ok((uri, request))
    }

    async fn fetch(&self, request: Request<Full<Bytes>>) -> Result<RaceResponse, AttemptFailure> {
        let response = self
            .client
            .request(request)
            .await
            .map_err(|source| AttemptFailure::Transport {
                kind: classify_transport_error(&source),
                message: source.to_string(),
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = read_body_limited(response.into_body(), self.max_response_body_bytes).await?;

        if !status.is_success() {
            return Err(AttemptFailure::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
        Ok(RaceResponse::new(status, headers, body))
    }
}

impl RaceTransport for HttpTransport {
    async fn send(
        &self,
        variant: &RequestVariant,
        timeout_value: Duration,
        cancel: CancellationToken,
    ) -> Result<RaceResponse, AttemptFailure> {
        let (uri, request) = self
            .build_request(variant)
            .map_err(|error| AttemptFailure::Transport {
                kind: TransportErrorKind::Other,
                message: error.to_string(),
            })?;
        let timeout_value = timeout_value.max(Duration::from_millis(1));
        debug!(
            method = %variant.method(),
            uri = %crate::util::redact_uri_for_logs(&uri.to_string()),
            timeout_ms = timeout_value.as_millis() as u64,
            "sending attempt"
        );

        tokio::select! {
            _ = cancel.cancelled() => Err(AttemptFailure::Aborted),
            outcome = timeout(timeout_value, self.fetch(request)) => match outcome {
                Ok(result) => result,
                Err(_) => Err(AttemptFailure::Timeout {
                    timeout_ms: timeout_value.as_millis(),
                }),
            },
        }
    }
}

pub struct HttpTransportBuilder {
    base_url: String,
    client_name: String,
    default_headers: HeaderMap,
    pool_idle_timeout: Duration,
    pool_max_idle_per_host: usize,
    max_response_body_bytes: usize,
}

impl HttpTransportBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_name: DEFAULT_CLIENT_NAME.to_owned(),
            default_headers: HeaderMap::new(),
            pool_idle_timeout: DEFAULT_POOL_IDLE_TIMEOUT,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            max_response_body_bytes: DEFAULT_MAX_RESPONSE_BODY_BYTES,
        }
    }

    pub fn client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn try_default_header(self, name: &str, value: &str) -> ReqraceResult<Self> {
        let name = parse_header_name(name)?;
        let value = parse_header_value(name.as_str(), value)?;
        Ok(self.default_header(name, value))
    }

    pub fn pool_idle_timeout(mut self, pool_idle_timeout: Duration) -> Self {
        self.pool_idle_timeout = pool_idle_timeout;
        self
    }

    pub fn pool_max_idle_per_host(mut self, pool_max_idle_per_host: usize) -> Self {
        self.pool_max_idle_per_host = pool_max_idle_per_host;
        self
    }

    pub fn max_response_body_bytes(mut self, max_response_body_bytes: usize) -> Self {
        self.max_response_body_bytes = max_response_body_bytes.max(1);
        self
    }

    pub fn try_build(self) -> ReqraceResult<HttpTransport> {
        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|source| RaceError::TlsInit {
                message: source.to_string(),
            })?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .build(https);

        let mut default_headers = self.default_headers;
        if !default_headers.contains_key(USER_AGENT) {
            let value = parse_header_value(USER_AGENT.as_str(), &self.client_name)?;
            default_headers.insert(USER_AGENT, value);
        }

        Ok(HttpTransport {
            client,
            base_url: self.base_url.into(),
            default_headers: Arc::new(default_headers),
            max_response_body_bytes: self.max_response_body_bytes,
        })
    }
}

fn classify_transport_error(error: &hyper_util::client::legacy::Error) -> TransportErrorKind {
    let text = error.to_string().to_ascii_lowercase();
    if error.is_connect() {
        if text.contains("dns")
            || text.contains("name or service not known")
            || text.contains("failed to lookup address")
        {
            return TransportErrorKind::Dns;
        }
        if text.contains("tls") || text.contains("certificate") || text.contains("handshake") {
            return TransportErrorKind::Tls;
        }
        return TransportErrorKind::Connect;
    }

    if text.contains("read")
        || text.contains("connection reset")
        || text.contains("broken pipe")
        || text.contains("unexpected eof")
        || text.contains("incomplete message")
    {
        return TransportErrorKind::Read;
    }

    TransportErrorKind::Other
}

async fn read_body_limited(body: Incoming, limit: usize) -> Result<Bytes, AttemptFailure> {
    let mut body = body;
    let mut collected = BytesMut::new();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|source| AttemptFailure::Transport {
            kind: TransportErrorKind::Read,
            message: source.to_string(),
        })?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(AttemptFailure::Transport {
                    kind: TransportErrorKind::Read,
                    message: format!(
                        "response body exceeded {limit} bytes ({} read)",
                        collected.len() + chunk.len()
                    ),
                });
            }
            collected.extend_from_slice(chunk);
        }
    }
    Ok(collected.freeze())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{DEFAULT_CLIENT_NAME, HttpTransportBuilder};

    #[test]
    fn builder_defaults_user_agent_to_client_name() {
        let transport = HttpTransportBuilder::new("https://api.example.com")
            .client_name("router-ui")
            .pool_idle_timeout(Duration::from_secs(30))
            .try_build()
            .expect("transport should build");

        let user_agent = transport
            .default_headers
            .get(http::header::USER_AGENT)
            .expect("user agent should be set");
        assert_eq!(user_agent.as_bytes(), b"router-ui");
    }

    #[test]
    fn builder_keeps_explicit_user_agent() {
        let transport = HttpTransportBuilder::new("https://api.example.com")
            .try_default_header("user-agent", "custom")
            .expect("header should parse")
            .try_build()
            .expect("transport should build");

        let user_agent = transport
            .default_headers
            .get(http::header::USER_AGENT)
            .expect("user agent should be set");
        assert_eq!(user_agent.as_bytes(), b"custom");
        assert_ne!(user_agent.as_bytes(), DEFAULT_CLIENT_NAME.as_bytes());
    }

    #[test]
    fn variant_headers_override_defaults() {
        let transport = HttpTransportBuilder::new("https://api.example.com")
            .try_default_header("x-routing-tier", "standard")
            .expect("header should parse")
            .try_build()
            .expect("transport should build");

        let variant = crate::variant::RequestVariant::post("/analyze")
            .try_header("x-routing-tier", "fallback")
            .expect("header should parse");
        let (uri, request) = transport
            .build_request(&variant)
            .expect("request should build");

        assert_eq!(uri.to_string(), "https://api.example.com/analyze");
        assert_eq!(
            request
                .headers()
                .get("x-routing-tier")
                .map(|value| value.as_bytes()),
            Some(b"fallback".as_slice())
        );
    }
}
