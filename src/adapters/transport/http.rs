//! HTTP transport
//!
//! Posts the message as a `text/plain` body and treats the response body as
//! the partner's acknowledgment.

use super::Transport;
use crate::config::SecretString;
use crate::domain::TransportError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use secrecy::ExposeSecret;
use std::time::Duration;

/// Sends messages with HTTP POST
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with an optional bearer token
    pub fn new(timeout: Duration, auth_token: Option<&SecretString>) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/plain"));

        if let Some(token) = auth_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| TransportError::InvalidEndpoint(format!("invalid auth token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Io(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, message: &str, endpoint: &str) -> Result<Option<String>, TransportError> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::InvalidEndpoint(format!(
                "{endpoint}: scheme must be http or https"
            )));
        }

        let response = self
            .client
            .post(url)
            .body(message.to_string())
            .send()
            .await
            .map_err(|e| classify(endpoint, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| classify(endpoint, e))?;

        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(Some(body).filter(|b| !b.trim().is_empty()))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn classify(endpoint: &str, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(format!("{endpoint}: {error}"))
    } else if error.is_connect() {
        TransportError::Connect {
            endpoint: endpoint.to_string(),
            message: error.to_string(),
        }
    } else {
        TransportError::Io(error.to_string())
    }
}
