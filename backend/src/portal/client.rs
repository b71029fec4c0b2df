//! HTTP client for a live Portal.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use submitr::portal::{Portal, PortalClient};
//!
//! let portal = PortalClient::from_env()?;
//! let donor = portal.get_metadata("/Donor/TEST_DONOR_1").await?;
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::env;
use std::time::Duration;

use super::Portal;
use crate::error::{PortalError, PortalResult};
use crate::logs::log_info;

/// Environment variable holding the Portal base URL
pub const PORTAL_URL_ENV: &str = "SUBMITR_PORTAL_URL";
/// Environment variable holding the access key id
pub const PORTAL_KEY_ENV: &str = "SUBMITR_PORTAL_KEY";
/// Environment variable holding the access key secret
pub const PORTAL_SECRET_ENV: &str = "SUBMITR_PORTAL_SECRET";
/// Environment flag enabling protocol-level tracing of Portal calls
pub const PORTAL_TRACE_ENV: &str = "SUBMITR_DEBUG_PORTAL";

/// Endpoint returning every type schema
const SCHEMAS_PATH: &str = "/profiles/?frame=raw";

/// Request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Portal HTTP client
#[derive(Clone)]
pub struct PortalClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
    trace: bool,
}

impl PortalClient {
    /// Create a client for `base_url` without credentials
    pub fn new(base_url: impl Into<String>) -> PortalResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| PortalError::Request(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            trace: false,
        })
    }

    /// Create a client from `SUBMITR_PORTAL_*` environment variables
    pub fn from_env() -> PortalResult<Self> {
        let _ = dotenvy::dotenv();

        let base_url = env::var(PORTAL_URL_ENV)
            .map_err(|_| PortalError::MissingSetting(PORTAL_URL_ENV.to_string()))?;
        let mut client = Self::new(base_url)?;

        if let (Ok(key), Ok(secret)) = (env::var(PORTAL_KEY_ENV), env::var(PORTAL_SECRET_ENV)) {
            client = client.with_credentials(key, secret);
        }
        Ok(client.with_trace(trace_enabled(env::var(PORTAL_TRACE_ENV).ok().as_deref())))
    }

    /// Set the access key pair used for basic auth
    pub fn with_credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Some((key.into(), secret.into()));
        self
    }

    /// Log every request and response status
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn get_json(&self, path: &str) -> PortalResult<Option<Value>> {
        let url = self.url(path);
        let mut request = self.http.get(&url).header("Accept", "application/json");
        if let Some((key, secret)) = &self.credentials {
            request = request.basic_auth(key, Some(secret));
        }

        if self.trace {
            let auth = if self.credentials.is_some() { "<redacted>" } else { "none" };
            log_info(format!("Portal GET {} (Authorization: {})", url, auth));
        }

        let response = request
            .send()
            .await
            .map_err(|e| PortalError::Request(e.to_string()))?;
        let status = response.status();

        if self.trace {
            log_info(format!("Portal {} -> HTTP {}", path, status.as_u16()));
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| PortalError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(PortalError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| PortalError::InvalidResponse {
                path: path.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl Portal for PortalClient {
    async fn get_metadata(&self, path: &str) -> PortalResult<Option<Value>> {
        self.get_json(path).await
    }

    async fn get_schemas(&self) -> PortalResult<Value> {
        self.get_json(SCHEMAS_PATH)
            .await?
            .ok_or_else(|| PortalError::InvalidResponse {
                path: SCHEMAS_PATH.to_string(),
                message: "schema endpoint not found".to_string(),
            })
    }
}

/// Interpret the tracing flag: set, non-empty, and not `0`/`false`.
pub fn trace_enabled(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => false,
        Some(v) => !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"),
    }
}
