//! reqwest-backed `AgentTransport`.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use tessera_contracts::error::{TesseraError, TesseraResult};
use tessera_core::traits::{AgentTransport, OutboundRequest, TransportResponse};

/// Sends agent calls over HTTP(S).
///
/// Timeouts are applied by the invocation client around each attempt. When a
/// call's future is dropped (timeout or caller deadline), reqwest cancels the
/// request and releases its connection.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> TesseraResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TesseraError::Config {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn header_map(headers: &std::collections::BTreeMap<String, String>) -> TesseraResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| TesseraError::Payload {
            reason: format!("invalid header name '{name}': {e}"),
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| TesseraError::Payload {
            reason: format!("invalid value for header '{}': {e}", name.as_str()),
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl AgentTransport for HttpTransport {
    async fn post(&self, request: OutboundRequest) -> TesseraResult<TransportResponse> {
        let headers = header_map(&request.headers)?;
        let started = Instant::now();

        let response = self
            .client
            .post(&request.url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TesseraError::Timeout {
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    }
                } else {
                    TesseraError::Transport {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| TesseraError::Transport {
            reason: format!("failed to read response body: {e}"),
        })?;

        debug!(url = %request.url, status, bytes = body.len(), "agent responded");
        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}
