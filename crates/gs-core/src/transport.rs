//! Blocking HTTP transport for the grading service.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("failed to read response from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Synchronous HTTP seam. Response bodies are returned as UTF-8 text.
pub trait HttpTransport: Send + Sync {
    /// A non-2xx status is an error: the body is not usable as a result.
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, TransportError>;

    /// The body is returned whatever the status; the service reports
    /// rejections in it.
    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<String, TransportError>;
}

/// [`HttpTransport`] backed by a `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_agent(ureq::AgentBuilder::new().build())
    }

    /// Agent with a connect timeout; reads stay unbounded.
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        Self::with_agent(ureq::AgentBuilder::new().timeout_connect(timeout).build())
    }

    pub fn with_agent(agent: ureq::Agent) -> Self {
        UreqTransport { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for UreqTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, TransportError> {
        let mut request = self.agent.get(url);
        for (key, value) in query {
            request = request.query(key, value);
        }

        debug!(url, "GET");
        let response = request.call().map_err(|e| map_ureq_error(url, e))?;
        read_body(url, response)
    }

    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<String, TransportError> {
        debug!(url, "POST");
        let response = match self.agent.post(url).send_json(body) {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                warn!(url, status, "Grading service answered with an error status");
                response
            }
            Err(e) => return Err(map_ureq_error(url, e)),
        };
        read_body(url, response)
    }
}

fn read_body(url: &str, response: ureq::Response) -> Result<String, TransportError> {
    response.into_string().map_err(|e| TransportError::Body {
        url: url.to_string(),
        source: e,
    })
}

fn map_ureq_error(url: &str, err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(status, response) => TransportError::Status {
            url: url.to_string(),
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => TransportError::Request {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}
