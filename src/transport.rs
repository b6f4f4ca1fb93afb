//! Blocking HTTP transport used by the feed fetchers and the notifier.

use std::time::Duration;

/// Content type sent with every webhook post.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Raw response from a transport call.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    pub const fn success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] ureq::Error),
}

/// The network seam. Everything above this trait is plain data in, plain
/// data out, so the cycle logic can be exercised without sockets.
pub trait Transport {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;

    fn post_json(&self, url: &str, body: &[u8]) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        (**self).get(url)
    }

    fn post_json(&self, url: &str, body: &[u8]) -> Result<HttpResponse, TransportError> {
        (**self).post_json(url, body)
    }
}

/// `ureq`-backed transport. Non-2xx statuses are returned as responses, not
/// errors, so callers can report the status code themselves.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        tracing::debug!(url, "GET");
        let response = self.agent.get(url).call()?;
        let status = response.status().as_u16();
        let body = response.into_body().read_to_vec()?;
        Ok(HttpResponse { status, body })
    }

    fn post_json(&self, url: &str, body: &[u8]) -> Result<HttpResponse, TransportError> {
        tracing::debug!(bytes = body.len(), "POST webhook");
        let response = self
            .agent
            .post(url)
            .header("Content-Type", JSON_CONTENT_TYPE)
            .send(body)?;
        let status = response.status().as_u16();
        let body = response.into_body().read_to_vec()?;
        Ok(HttpResponse { status, body })
    }
}
