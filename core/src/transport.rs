//! Blocking `ureq` transport with a retry envelope.
//!
//! Only failures that produced no response (timeouts, refused or dropped
//! connections) are retried. Any HTTP status, including 5xx, is handed back
//! to the client as data.

use std::thread;

use tracing::{debug, warn};

use crate::config::{ClientConfig, DebugFlags, RetryPolicy};
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// A [`Transport`] backed by a `ureq` agent.
#[derive(Debug)]
pub struct UreqTransport {
    agent: ureq::Agent,
    retry: RetryPolicy,
    debug: DebugFlags,
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            // Status codes are classified by the client, not by ureq.
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            retry: config.retry,
            debug: config.debug,
        }
    }

    fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let result = match request.method {
            HttpMethod::Get => apply(self.agent.get(&request.url), request).call(),
            HttpMethod::Delete => apply(self.agent.delete(&request.url), request).call(),
            HttpMethod::Post => {
                let builder = apply(self.agent.post(&request.url), request);
                match &request.body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
            HttpMethod::Patch => {
                let builder = apply(self.agent.patch(&request.url), request);
                match &request.body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(convert_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        // ureq caps string reads at 10 MiB by default; a full page can exceed that.
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_string()
            .map_err(convert_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let attempts = self.retry.count.saturating_add(1);
        if self.debug.rest {
            debug!(
                method = %request.method,
                url = %request.url,
                query = ?request.query,
                body = request.body.as_deref().unwrap_or(""),
                "rest request"
            );
        }

        let mut attempt = 1;
        loop {
            debug!(attempt, method = %request.method, url = %request.url, "sending HTTP request");
            match self.send_once(&request) {
                Ok(response) => {
                    debug!(
                        attempt,
                        method = %request.method,
                        url = %request.url,
                        status = response.status,
                        "received HTTP response"
                    );
                    if self.debug.rest {
                        debug!(status = response.status, body = %response.body, "rest response");
                    }
                    return Ok(response);
                }
                Err(err) if err.is_retryable() && attempt < attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        attempt,
                        method = %request.method,
                        url = %request.url,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "HTTP request failed, retrying"
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(err) => {
                    debug!(attempt, method = %request.method, url = %request.url, error = %err, "HTTP request failed");
                    return Err(err);
                }
            }
        }
    }
}

fn apply<B>(mut builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for (key, value) in &request.query {
        builder = builder.query(key, value);
    }
    builder
}

fn convert_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::HostNotFound => TransportError::Connection("host not found".to_owned()),
        ureq::Error::ConnectionFailed => TransportError::Connection("connection failed".to_owned()),
        ureq::Error::Io(e) => TransportError::Connection(e.to_string()),
        other => TransportError::Other(other.to_string()),
    }
}
