use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde::Serialize;

use crate::ReqraceResult;
use crate::error::RaceError;
use crate::util::{parse_header_name, parse_header_value};

/// Opaque key identifying one logical operation instance.
///
/// Used solely to collapse concurrent duplicate invocations onto one
/// execution; never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RaceId(String);

impl RaceId {
    /// Builds a fresh id from an operation prefix and the current unix-epoch
    /// millisecond timestamp, for operations that must not collapse across
    /// distinct invocations.
    pub fn timestamped(prefix: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        Self(format!("{prefix}-{millis}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RaceId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for RaceId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for RaceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One alternative request formulation competing within a race.
///
/// Variants for the same race represent interchangeable ways of asking the
/// same question; only one result is ever consumed. The ordinal position of a
/// variant is its index in the list handed to the coordinator.
#[derive(Clone, Debug)]
pub struct RequestVariant {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl RequestVariant {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn try_header(self, name: &str, value: &str) -> ReqraceResult<Self> {
        let name = parse_header_name(name)?;
        let value = parse_header_value(name.as_str(), value)?;
        Ok(self.header(name, value))
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json<T>(self, payload: &T) -> ReqraceResult<Self>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload).map_err(|source| RaceError::Serialize {
            message: source.to_string(),
        })?;
        let with_body = self.body(Bytes::from(body));
        Ok(with_body.header(CONTENT_TYPE, HeaderValue::from_static("application/json")))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}
