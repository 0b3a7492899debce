//! Resource provider trait definition

use crate::declaration::{Properties, ResourceSchema};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::hash::{DefaultHasher, Hash, Hasher};
use thiserror::Error;

/// Resource provider abstraction trait
///
/// The engine treats providers as opaque: it hands over a resource type and
/// fully resolved inputs and gets back the resource's outputs. Credentials
/// and client handles live inside the implementation, which is injected into
/// the [`Engine`](crate::Engine) explicitly.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Returns the provider name (e.g., "danubedata", "simulated")
    fn name(&self) -> &str;

    /// Create a resource and return its outputs
    async fn apply(
        &self,
        resource_type: &str,
        inputs: &Properties,
    ) -> Result<Properties, ProviderError>;

    /// Update an existing resource in place
    async fn update(
        &self,
        resource_type: &str,
        _prior_outputs: &Properties,
        inputs: &Properties,
    ) -> Result<Properties, ProviderError> {
        self.apply(resource_type, inputs).await
    }

    /// Destroy a resource previously created by this provider
    async fn destroy(
        &self,
        resource_type: &str,
        _prior_outputs: &Properties,
    ) -> Result<(), ProviderError> {
        Err(ProviderError::new(format!(
            "provider '{}' cannot destroy '{}' resources",
            self.name(),
            resource_type
        )))
    }
}

/// Error returned by a provider operation
#[derive(Error, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,

    /// Whether repeating the call may succeed
    pub retryable: bool,

    /// Outputs the resource exposed before the operation failed
    pub partial_outputs: Option<Properties>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            partial_outputs: None,
        }
    }

    pub fn with_partial_outputs(mut self, outputs: Properties) -> Self {
        self.partial_outputs = Some(outputs);
        self
    }
}

/// Retry configuration for provider operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: std::time::Duration,

    /// Maximum delay between retries
    pub max_delay: std::time::Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> std::time::Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        std::time::Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: std::time::Duration::from_secs(1),
            max_delay: std::time::Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Value written for schema-declared outputs the simulation cannot know
pub const SIMULATED_VALUE: &str = "(known after apply)";

/// Provider that performs no I/O
///
/// Outputs echo the inputs, add a stable `id` derived from the type and
/// inputs, and fill every schema-declared output with [`SIMULATED_VALUE`].
/// Used for dry runs.
#[derive(Debug, Clone, Default)]
pub struct SimulatedProvider {
    schema: ResourceSchema,
}

impl SimulatedProvider {
    pub fn new(schema: ResourceSchema) -> Self {
        Self { schema }
    }

    fn simulate(&self, resource_type: &str, inputs: &Properties) -> Properties {
        let mut hasher = DefaultHasher::new();
        resource_type.hash(&mut hasher);
        // Properties is ordered, so the serialized form is stable
        serde_json::to_string(inputs)
            .unwrap_or_default()
            .hash(&mut hasher);

        let mut outputs = inputs.clone();
        outputs.insert(
            "id".to_string(),
            serde_json::json!(format!("sim-{}-{:08x}", resource_type, hasher.finish() as u32)),
        );
        if let Some(declared) = self.schema.outputs_of(resource_type) {
            for key in declared {
                outputs
                    .entry(key.clone())
                    .or_insert_with(|| serde_json::json!(SIMULATED_VALUE));
            }
        }
        outputs
    }
}

#[async_trait]
impl ResourceProvider for SimulatedProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn apply(
        &self,
        resource_type: &str,
        inputs: &Properties,
    ) -> Result<Properties, ProviderError> {
        Ok(self.simulate(resource_type, inputs))
    }

    async fn destroy(
        &self,
        _resource_type: &str,
        _prior_outputs: &Properties,
    ) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_retry_delay_backoff() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for(1), Duration::from_secs(1));
        assert_eq!(retry.delay_for(2), Duration::from_secs(2));
        assert_eq!(retry.delay_for(3), Duration::from_secs(4));
        assert_eq!(retry.delay_for(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_simulated_provider_is_deterministic() {
        let provider = SimulatedProvider::new(
            ResourceSchema::new().with_type("vps", ["public_ip"]),
        );
        let inputs = Properties::from([("image".to_string(), json!("ubuntu-24.04"))]);

        let first = provider.apply("vps", &inputs).await.unwrap();
        let second = provider.apply("vps", &inputs).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first["image"], json!("ubuntu-24.04"));
        assert_eq!(first["public_ip"], json!(SIMULATED_VALUE));
        assert!(first["id"].as_str().unwrap().starts_with("sim-vps-"));
    }

    #[tokio::test]
    async fn test_default_destroy_is_unsupported() {
        struct CreateOnly;

        #[async_trait]
        impl ResourceProvider for CreateOnly {
            fn name(&self) -> &str {
                "create-only"
            }

            async fn apply(
                &self,
                _resource_type: &str,
                inputs: &Properties,
            ) -> Result<Properties, ProviderError> {
                Ok(inputs.clone())
            }
        }

        let err = CreateOnly
            .destroy("vps", &Properties::new())
            .await
            .unwrap_err();
        assert!(err.message.contains("cannot destroy"));
        assert!(!err.retryable);
    }
}
