//! HTTP provider for StackFlow
//!
//! Implements [`ResourceProvider`](stackflow_engine::ResourceProvider) against
//! the DanubeData REST API (`https://danubedata.ro/api/v1`). Supported
//! resource types are whatever collections the API exposes, e.g. `vps`,
//! `serverless`, `cache`, `database`, `storage_bucket`,
//! `storage_access_key`, `ssh_key`, `firewall` and `vps_snapshot`.
//!
//! # Requirements
//!
//! - An API token, from `DANUBEDATA_API_TOKEN` or the settings file
//!
//! # Example
//!
//! ```ignore
//! use stackflow_cloud_http::{HttpProvider, HttpProviderConfig};
//! use stackflow_engine::Engine;
//! use std::sync::Arc;
//!
//! let config = HttpProviderConfig::new("https://danubedata.ro/api/v1", Some(token));
//! let engine = Engine::new(Arc::new(HttpProvider::new(config)?));
//! ```

pub mod error;
pub mod provider;

pub use error::{HttpProviderError, Result};
pub use provider::{HttpProvider, HttpProviderConfig, resource_id};
