use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::ReqraceResult;
use crate::error::RaceError;

/// A winning response adopted by a race.
///
/// Cloneable so one settled outcome can be handed to every deduplicated
/// caller; the body is reference-counted `Bytes`.
#[derive(Clone, Debug)]
pub struct RaceResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl RaceResponse {
    /// Public so out-of-crate [`RaceTransport`](crate::RaceTransport)
    /// implementations can produce responses.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T>(&self) -> ReqraceResult<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(&self.body).map_err(|source| RaceError::Deserialize {
            message: source.to_string(),
            body: crate::util::truncate_body(&self.body),
        })
    }
}
