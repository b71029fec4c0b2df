//! Portal backed by fixed in-memory data.
//!
//! Serves a schema map, items by path, and submitted identifier verdicts.
//! Identifiers are accepted unless registered as rejected. Every call is
//! logged, and the peak number of concurrent calls is tracked.

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{Portal, SUBMITTED_ID_VALIDATOR_PATH};
use crate::error::{PortalError, PortalResult};

#[derive(Debug, Default)]
pub struct InMemoryPortal {
    schemas: Value,
    objects: HashMap<String, Value>,
    rejected_ids: HashMap<String, String>,
    failures: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryPortal {
    pub fn new(schemas: Value) -> Self {
        Self { schemas, ..Default::default() }
    }

    /// Serve `value` for `GET <path>`.
    pub fn with_object(mut self, path: impl Into<String>, value: Value) -> Self {
        self.objects.insert(path.into(), value);
        self
    }

    /// Make the identifier validator reject `id` with `message`.
    pub fn with_rejected_id(mut self, id: impl Into<String>, message: impl Into<String>) -> Self {
        self.rejected_ids.insert(id.into(), message.into());
        self
    }

    /// Answer `GET <path>` with an HTTP 500 carrying `body`.
    pub fn with_failure(mut self, path: impl Into<String>, body: impl Into<String>) -> Self {
        self.failures.insert(path.into(), body.into());
        self
    }

    /// Paths requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn answer(&self, path: &str) -> PortalResult<Option<Value>> {
        if let Some(body) = self.failures.get(path) {
            return Err(PortalError::Status {
                path: path.to_string(),
                status: 500,
                body: body.clone(),
            });
        }

        if let Some(rest) = path.strip_prefix(SUBMITTED_ID_VALIDATOR_PATH) {
            let encoded = rest.split('?').next().unwrap_or(rest);
            let id = percent_decode_str(encoded).decode_utf8_lossy();
            let status = self
                .rejected_ids
                .get(id.as_ref())
                .cloned()
                .unwrap_or_else(|| "OK".to_string());
            return Ok(Some(json!({ "status": status })));
        }

        Ok(self.objects.get(path).cloned())
    }
}

#[async_trait]
impl Portal for InMemoryPortal {
    async fn get_metadata(&self, path: &str) -> PortalResult<Option<Value>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(path.to_string());
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.answer(path)
    }

    async fn get_schemas(&self) -> PortalResult<Value> {
        Ok(self.schemas.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identifier_verdicts() {
        let portal = InMemoryPortal::new(json!({})).with_rejected_id("BAD_ID", "unknown center");

        let ok = portal
            .get_metadata("/validators/submitted_id/GOOD_ID?submission_centers=x")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ok["status"], "OK");

        let bad = portal
            .get_metadata("/validators/submitted_id/BAD_ID")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bad["status"], "unknown center");

        let portal = InMemoryPortal::new(json!({})).with_rejected_id("BAD#ID", "illegal character");
        let encoded = portal
            .get_metadata("/validators/submitted_id/BAD%23ID")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(encoded["status"], "illegal character");
    }

    #[tokio::test]
    async fn test_objects_failures_and_call_log() {
        let portal = InMemoryPortal::new(json!({}))
            .with_object("/Donor/D1", json!({ "status": "released" }))
            .with_failure("/Donor/D2", "gateway timeout");

        assert!(portal.get_metadata("/Donor/D1").await.unwrap().is_some());
        assert!(portal.get_metadata("/Donor/D3").await.unwrap().is_none());
        assert!(matches!(
            portal.get_metadata("/Donor/D2").await,
            Err(PortalError::Status { status: 500, .. })
        ));
        assert_eq!(portal.calls(), vec!["/Donor/D1", "/Donor/D3", "/Donor/D2"]);
    }
}
