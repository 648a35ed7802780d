//! reqwest-backed [`Transport`].

use crate::config::ClientConfig;
use crate::error::ClientError;
use async_trait::async_trait;
use mapcache_core::TransportError;
use mapcache_fetch::{Endpoint, Method, Transport};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "apikey";

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let auth_header = build_auth_headers(config.api_key.as_deref())?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path)
    }

    async fn parse_response(response: reqwest::Response) -> Result<Value, TransportError> {
        let status = response.status();
        if status.is_success() {
            let text = response.text().await.map_err(network_error)?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(|e| TransportError::Decode {
                reason: e.to_string(),
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, endpoint: &Endpoint) -> Result<Value, TransportError> {
        let url = self.url_for(endpoint);
        let method = match endpoint.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut request = self
            .client
            .request(method, &url)
            .headers(self.auth_header.clone());
        if !endpoint.query.is_empty() {
            request = request.query(&endpoint.query);
        }
        if let Some(body) = &endpoint.body {
            request = request.json(body);
        }

        tracing::debug!(%endpoint, "Sending request");
        let response = request.send().await.map_err(network_error)?;
        let result = Self::parse_response(response).await;
        if let Err(error) = &result {
            tracing::debug!(%endpoint, %error, "Request failed");
        }
        result
    }
}

fn network_error(err: reqwest::Error) -> TransportError {
    TransportError::Network {
        reason: err.to_string(),
    }
}

fn build_auth_headers(api_key: Option<&str>) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = api_key {
        headers.insert(
            HeaderName::from_static(API_KEY_HEADER),
            HeaderValue::from_str(api_key).map_err(|e| ClientError::InvalidHeader {
                header: API_KEY_HEADER,
                reason: e.to_string(),
            })?,
        );
    }
    Ok(headers)
}
