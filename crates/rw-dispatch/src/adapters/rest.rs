//! REST transport over `reqwest`.

use crate::domain::directory::HttpMethod;
use crate::domain::error::DispatchError;
use crate::ports::outbound::{RestRequest, RestTransport};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Header carrying the hex-encoded trace context.
pub const TRACE_CONTEXT_HEADER: &str = "x-trace-context";

/// [`RestTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestRestTransport {
    client: reqwest::Client,
}

impl ReqwestRestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn to_reqwest(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Flatten a JSON object into query pairs. Nested values are sent as JSON.
fn query_pairs(body: &Value) -> Vec<(String, String)> {
    match body {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn transport_error(status: Option<u16>, cause: impl Into<String>) -> DispatchError {
    DispatchError::Transport {
        status,
        cause: cause.into(),
    }
}

#[async_trait]
impl RestTransport for ReqwestRestTransport {
    async fn send(&self, request: RestRequest) -> Result<Value, DispatchError> {
        let mut builder = self
            .client
            .request(to_reqwest(request.method), &request.url)
            .timeout(request.timeout);

        builder = if request.method.uses_query() {
            builder.query(&query_pairs(&request.body))
        } else {
            builder.json(&request.body)
        };
        if !request.trace_context.is_empty() {
            builder = builder.header(TRACE_CONTEXT_HEADER, hex::encode(&request.trace_context));
        }

        let response = builder.send().await.map_err(|e| {
            let cause = if e.is_timeout() {
                format!("{} timed out after {:?}", request.url, request.timeout)
            } else {
                format!("{} unreachable: {e}", request.url)
            };
            transport_error(e.status().map(|s| s.as_u16()), cause)
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(Some(status.as_u16()), e.to_string()))?;

        debug!(
            operation = %request.operation,
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            "REST call finished"
        );

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(transport_error(
                Some(status.as_u16()),
                format!("{} answered {status}: {}", request.url, body.trim()),
            ));
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_slice(&bytes).map_err(|e| DispatchError::Decode {
            operation: request.operation.clone(),
            reason: e.to_string(),
        })
    }
}
