use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use super::route::Method;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to obtain any response at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Sends one HTTP request. The gateway owns all rate-limit and classification logic.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport over a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connection(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(transport_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
pub mod mock {
    //! Scripted transport double for gateway and engine tests.

    use super::*;
    use std::sync::Mutex;

    type Responder = dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

    /// Answers every request with a caller-supplied closure and records what was sent.
    pub struct ScriptedTransport {
        responder: Box<Responder>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        pub fn new<F>(responder: F) -> Self
        where
            F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
        {
            Self {
                responder: Box::new(responder),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let result = (self.responder)(&request);
            self.requests.lock().unwrap().push(request);
            result
        }
    }

    /// Builds a JSON response with the given status and headers.
    pub fn json_response(status: u16, body: Value, headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_string(),
        }
    }

    /// Bucket headers for a Discord response.
    pub fn bucket_headers(
        bucket: &'static str,
        limit: &'static str,
        remaining: &'static str,
    ) -> Vec<(&'static str, &'static str)> {
        vec![
            (super::super::headers::BUCKET, bucket),
            (super::super::headers::LIMIT, limit),
            (super::super::headers::REMAINING, remaining),
            (super::super::headers::RESET_AFTER, "5"),
        ]
    }
}
