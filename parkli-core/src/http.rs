//! Outbound HTTP transport shared by all sources.

use std::borrow::Cow;
use std::str;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::settings::Settings;

/// Response body, decoded according to its content type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `application/json` and friends, already decoded.
    Json(serde_json::Value),
    /// XML or any other `text/*` body.
    Text(String),
    /// Anything else.
    Bytes(Vec<u8>),
}

impl Payload {
    /// Textual view of the body, if it has one.
    #[must_use]
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Payload::Text(text) => Some(Cow::Borrowed(text)),
            Payload::Bytes(bytes) => str::from_utf8(bytes).ok().map(Cow::Borrowed),
            Payload::Json(_) => None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
/// Failures while talking to an upstream server.
pub enum FetchError {
    /// No response within the configured timeout.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Configured timeout.
        timeout: Duration,
    },
    /// Connection could not be established or was interrupted.
    #[error("request to {url} failed: {source}")]
    Connection {
        /// Requested URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// Server answered with a non-success status.
    #[error("{url} responded with HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// Body was declared JSON but did not decode.
    #[error("could not decode response from {url}: {source}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Whether the failure happened while decoding the body.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, FetchError::Decode { .. })
    }

    /// URL of the failed request.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::Timeout { url, .. }
            | FetchError::Connection { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Decode { url, .. } => Some(url),
        }
    }

    /// HTTP status if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// HTTP client with a fixed per-request timeout.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Build a client from settings (user agent and timeout).
    ///
    /// # Errors
    ///
    /// Returns the [`reqwest::Error`] raised when the TLS backend cannot be initialised.
    pub fn from_settings(settings: &Settings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(Self::new(client, settings.request_timeout()))
    }

    /// Same client with a different per-request timeout.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Configured per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` and decode the body by content type.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] on timeout, transport failure, non-success
    /// status, or a JSON body that does not decode.
    pub async fn fetch(&self, url: &str) -> Result<Payload, FetchError> {
        debug!(%url, timeout = ?self.timeout, "requesting upstream");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| self.transport_error(url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let body = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(url, err))?;

        debug!(%url, %content_type, bytes = body.len(), "upstream responded");
        decode_body(url, &content_type, body.to_vec())
    }

    fn transport_error(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_owned(),
                timeout: self.timeout,
            }
        } else {
            FetchError::Connection {
                url: url.to_owned(),
                source: err,
            }
        }
    }
}

fn decode_body(url: &str, content_type: &str, body: Vec<u8>) -> Result<Payload, FetchError> {
    if content_type.contains("json") {
        return serde_json::from_slice(&body)
            .map(Payload::Json)
            .map_err(|source| FetchError::Decode {
                url: url.to_owned(),
                source,
            });
    }

    if content_type.contains("xml") || content_type.starts_with("text/") {
        return Ok(Payload::Text(String::from_utf8_lossy(&body).into_owned()));
    }

    Ok(Payload::Bytes(body))
}
