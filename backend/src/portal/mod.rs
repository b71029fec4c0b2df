//! Portal interface.
//!
//! The engine talks to the Portal only through the [`Portal`] trait:
//!
//! - [`client::PortalClient`] - HTTP client for a live Portal
//! - [`memory::InMemoryPortal`] - fixed data, for offline runs and tests
//! - [`validator::PortalValidator`] - bounded-concurrency batches of calls

pub mod client;
pub mod memory;
pub mod validator;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

use crate::error::PortalResult;

pub use client::PortalClient;
pub use memory::InMemoryPortal;
pub use validator::{PortalValidator, SubmittedIdCheck, DEFAULT_PORTAL_CONCURRENCY};

/// Endpoint prefix for submitted identifier validation.
pub const SUBMITTED_ID_VALIDATOR_PATH: &str = "/validators/submitted_id/";

/// Read-only access to a Portal.
#[async_trait]
pub trait Portal: Send + Sync {
    /// `GET <path>`; `Ok(None)` when the Portal answers 404.
    async fn get_metadata(&self, path: &str) -> PortalResult<Option<Value>>;

    /// Every type schema, keyed by type name.
    async fn get_schemas(&self) -> PortalResult<Value>;
}

/// Characters escaped in a path segment or query value: everything but
/// RFC 3986 unreserved characters.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Percent-encode one path segment or query value.
pub fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

/// Path of the submitted identifier validator for `value`.
pub fn submitted_id_validator_path(value: &str, submission_centers: &[String]) -> String {
    let path = format!("{}{}", SUBMITTED_ID_VALIDATOR_PATH, encode_segment(value));
    if submission_centers.is_empty() {
        return path;
    }
    let centers: Vec<String> = submission_centers.iter().map(|c| encode_segment(c)).collect();
    format!("{}?submission_centers={}", path, centers.join(","))
}

/// Canonical path of an item: `/<Type>/<identifier>`.
///
/// This is the form references are recorded and reported in; use
/// [`item_request_path`] to ask the Portal for the item.
pub fn item_path(type_name: &str, identifier: &str) -> String {
    format!("/{}/{}", type_name, identifier)
}

/// Request path of an item, with both segments percent-encoded.
pub fn item_request_path(type_name: &str, identifier: &str) -> String {
    format!("/{}/{}", encode_segment(type_name), encode_segment(identifier))
}
