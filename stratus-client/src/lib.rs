//! stratus-client - HTTP client for the Stratus control plane
//!
//! Thin JSON transport over the control plane's REST API: base URL
//! handling, bearer token auth, a correlation id per request, and typed
//! errors that preserve the remote's `{code, err, error}` failure body.
//!
//! # Example
//! ```ignore
//! use stratus_client::{ApiClient, ClientConfig};
//!
//! let client = ApiClient::new(ClientConfig::from_env()?)?;
//! let zones: Vec<String> = client
//!     .get_json_query(
//!         "/api/v1/catalog/availability-zones",
//!         &[("provider", "aws"), ("region", "eu-north-1")],
//!     )
//!     .await?;
//! ```

mod config;
mod error;
mod http;

// Re-export commonly used types at crate root
pub use config::{ClientConfig, ConfigError, DEFAULT_TIMEOUT, ENV_API_TOKEN, ENV_API_URL};
pub use error::{ApiError, ApiResult, ErrorPayload};
pub use http::{ApiClient, REQUEST_ID_HEADER};
