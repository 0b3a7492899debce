//! JSON-over-HTTPS resource provider
//!
//! Resources map onto a REST collection per type:
//!
//! - create: `POST {base}/{type}`
//! - update: `PUT {base}/{type}/{id}`
//! - destroy: `DELETE {base}/{type}/{id}`
//!
//! Outputs are the resolved inputs overlaid with the fields of the returned
//! resource object, so every input is also readable as an output.

use crate::error::{HttpProviderError, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use stackflow_engine::{Properties, ProviderError, ResourceProvider, RetryConfig};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for [`HttpProvider`]
#[derive(Clone)]
pub struct HttpProviderConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl HttpProviderConfig {
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl std::fmt::Debug for HttpProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "********"))
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Provider talking to the DanubeData REST API
pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    retry: RetryConfig,
}

impl HttpProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        let api_token = config
            .api_token
            .filter(|t| !t.is_empty())
            .ok_or(HttpProviderError::MissingToken)?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(HttpProviderError::InvalidBaseUrl(config.base_url));
        }

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url,
            api_token,
            retry: config.retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the collection holding resources of `resource_type`
    pub fn collection_url(&self, resource_type: &str) -> String {
        format!("{}/{}", self.base_url, resource_type)
    }

    /// URL of one resource
    pub fn resource_url(&self, resource_type: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, resource_type, id)
    }

    /// Send one request; returns the decoded body, `None` when empty
    async fn send(&self, method: Method, url: &str, body: Option<&Properties>) -> Result<Option<Value>> {
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.api_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(HttpProviderError::Api {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| HttpProviderError::InvalidResponse(e.to_string()))
    }

    /// Send with backoff. A POST that may have reached the server is never
    /// resent, since the resource could already exist.
    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<&Properties>,
    ) -> Result<Option<Value>> {
        let should_retry = |e: &HttpProviderError| {
            if method == Method::POST {
                e.is_unprocessed()
            } else {
                e.is_retryable()
            }
        };
        let mut attempt = 1;
        loop {
            tracing::debug!("{} {} (attempt {})", method, url, attempt);
            match self.send(method.clone(), url, body).await {
                Err(e) if should_retry(&e) && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "{} {} failed (attempt {}/{}): {}; retrying in {:?}",
                        method,
                        url,
                        attempt,
                        self.retry.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl ResourceProvider for HttpProvider {
    fn name(&self) -> &str {
        "danubedata"
    }

    async fn apply(
        &self,
        resource_type: &str,
        inputs: &Properties,
    ) -> std::result::Result<Properties, ProviderError> {
        let url = self.collection_url(resource_type);
        let body = self.send_with_retry(Method::POST, &url, Some(inputs)).await?;
        let outputs = merge_outputs(inputs, body)?;
        if resource_id(&outputs).is_none() {
            // created, but unmanageable without an id; keep what we saw
            let err: ProviderError = HttpProviderError::MissingId {
                resource_type: resource_type.to_string(),
            }
            .into();
            return Err(err.with_partial_outputs(outputs));
        }
        Ok(outputs)
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_outputs: &Properties,
        inputs: &Properties,
    ) -> std::result::Result<Properties, ProviderError> {
        let Some(id) = resource_id(prior_outputs) else {
            return self.apply(resource_type, inputs).await;
        };
        let url = self.resource_url(resource_type, &id);
        let body = self.send_with_retry(Method::PUT, &url, Some(inputs)).await?;

        let mut outputs = merge_outputs(inputs, body)?;
        if let Some(prior_id) = prior_outputs.get("id") {
            outputs
                .entry("id".to_string())
                .or_insert_with(|| prior_id.clone());
        }
        Ok(outputs)
    }

    async fn destroy(
        &self,
        resource_type: &str,
        prior_outputs: &Properties,
    ) -> std::result::Result<(), ProviderError> {
        let id = resource_id(prior_outputs).ok_or_else(|| HttpProviderError::MissingId {
            resource_type: resource_type.to_string(),
        })?;
        let url = self.resource_url(resource_type, &id);
        match self.send_with_retry(Method::DELETE, &url, None).await {
            Ok(_) => Ok(()),
            Err(HttpProviderError::Api { status: 404, .. }) => {
                tracing::debug!("{} {} is already gone", resource_type, id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Resource id from outputs; string or number
pub fn resource_id(outputs: &Properties) -> Option<String> {
    match outputs.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Overlay the returned resource on the inputs. Accepts a bare object or one
/// wrapped in `data`.
fn merge_outputs(inputs: &Properties, body: Option<Value>) -> Result<Properties> {
    let mut outputs = inputs.clone();
    let object = match body {
        None => return Ok(outputs),
        Some(Value::Object(mut map)) => match map.remove("data") {
            Some(Value::Object(data)) => data,
            Some(other) => {
                map.insert("data".to_string(), other);
                map
            }
            None => map,
        },
        Some(other) => {
            return Err(HttpProviderError::InvalidResponse(format!(
                "expected a JSON object, got {}",
                other
            )));
        }
    };
    outputs.extend(object);
    Ok(outputs)
}

fn error_message(status: StatusCode, text: &str) -> String {
    let from_json = serde_json::from_str::<Value>(text).ok().and_then(|v| {
        ["message", "error"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
    });
    match from_json {
        Some(message) => message,
        None if !text.trim().is_empty() => text.trim().to_string(),
        None => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    }
}
