//! GET-only transport used to fetch the AMP runtime stylesheet.
//!
//! The pipeline never retries; timeouts and retry policy belong to the
//! implementation handed in by the host.

use std::collections::HashMap;

/// Status code and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

impl TransportError {
    pub fn new(url: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

pub trait RemoteGetRequest: Send + Sync {
    fn get(&self, url: &str) -> Result<Response, TransportError>;
}

/// Canned responses keyed by URL; unknown URLs fail.
#[derive(Debug, Clone, Default)]
pub struct StubbedRemoteGetRequest {
    responses: HashMap<String, Response>,
}

impl StubbedRemoteGetRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: &str, status: u16, body: &str) -> Self {
        self.responses.insert(url.to_string(), Response::new(status, body));
        self
    }
}

impl RemoteGetRequest for StubbedRemoteGetRequest {
    fn get(&self, url: &str) -> Result<Response, TransportError> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::new(url, "no stubbed response"))
    }
}

#[cfg(feature = "http")]
pub use self::http::UreqRemoteGetRequest;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use super::{RemoteGetRequest, Response, TransportError};

    /// Blocking transport backed by `ureq`.
    pub struct UreqRemoteGetRequest {
        agent: ureq::Agent,
    }

    impl UreqRemoteGetRequest {
        pub fn new(timeout: Duration) -> Self {
            let agent = ureq::AgentBuilder::new()
                .timeout(timeout)
                .user_agent(concat!("amp-optimizer/", env!("CARGO_PKG_VERSION")))
                .build();
            Self { agent }
        }
    }

    impl Default for UreqRemoteGetRequest {
        fn default() -> Self {
            Self::new(Duration::from_secs(10))
        }
    }

    impl RemoteGetRequest for UreqRemoteGetRequest {
        fn get(&self, url: &str) -> Result<Response, TransportError> {
            match self.agent.get(url).call() {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp
                        .into_string()
                        .map_err(|e| TransportError::new(url, e.to_string()))?;
                    Ok(Response::new(status, body))
                }
                // Non-2xx still carries a response; the caller decides what it means.
                Err(ureq::Error::Status(status, resp)) => {
                    Ok(Response::new(status, resp.into_string().unwrap_or_default()))
                }
                Err(e) => Err(TransportError::new(url, e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stub_returns_registered_response() {
        let stub = StubbedRemoteGetRequest::new().with_response("https://x/v0.css", 200, "body{}");
        let resp = stub.get("https://x/v0.css").unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.body, "body{}");
    }

    #[test]
    fn test_stub_unknown_url_fails() {
        let err = StubbedRemoteGetRequest::new().get("https://x/y").unwrap_err();
        assert_eq!(err.url, "https://x/y");
    }

    #[test]
    fn test_non_2xx_is_not_success() {
        assert!(!Response::new(404, "").is_success());
        assert!(!Response::new(301, "").is_success());
    }
}
