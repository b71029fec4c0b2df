//! Batches of Portal calls with bounded concurrency.
//!
//! At most `concurrency` requests are outstanding at once. Results are
//! collected on the caller's task and returned in a deterministic order
//! (by type and row, or by input position), never in completion order.

use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;

use super::{submitted_id_validator_path, Portal};
use crate::error::PortalResult;

/// Outbound calls allowed in flight at once
pub const DEFAULT_PORTAL_CONCURRENCY: usize = 6;

/// A submitted identifier to check, with the record it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedIdCheck {
    pub type_name: String,
    pub row: usize,
    pub value: String,
}

/// Issues Portal calls through a fixed-size window.
#[derive(Clone)]
pub struct PortalValidator {
    portal: Arc<dyn Portal>,
    concurrency: usize,
}

impl PortalValidator {
    pub fn new(portal: Arc<dyn Portal>, concurrency: usize) -> Self {
        Self {
            portal,
            concurrency: concurrency.max(1),
        }
    }

    /// Ask the Portal to validate each identifier.
    ///
    /// Returns every check with `Some(reason)` when the Portal did not answer
    /// `OK`, sorted by type then row. Transport failures count as rejections
    /// carrying the error text.
    pub async fn validate_submitted_ids(
        &self,
        checks: Vec<SubmittedIdCheck>,
        submission_centers: &[String],
    ) -> Vec<(SubmittedIdCheck, Option<String>)> {
        let mut results: Vec<(SubmittedIdCheck, Option<String>)> = stream::iter(checks)
            .map(|check| {
                let portal = Arc::clone(&self.portal);
                let path = submitted_id_validator_path(&check.value, submission_centers);
                async move {
                    let verdict = match portal.get_metadata(&path).await {
                        Ok(Some(body)) => match body.get("status").and_then(|s| s.as_str()) {
                            Some("OK") => None,
                            Some(reason) => Some(reason.to_string()),
                            None => Some(body.to_string()),
                        },
                        Ok(None) => Some(format!("validator not found: {}", path)),
                        Err(e) => Some(e.to_string()),
                    };
                    (check, verdict)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results.sort_by(|a, b| {
            (a.0.type_name.as_str(), a.0.row).cmp(&(b.0.type_name.as_str(), b.0.row))
        });
        results
    }

    /// `GET` every path, returning results in input order.
    pub async fn fetch_all(&self, paths: Vec<String>) -> Vec<(String, PortalResult<Option<Value>>)> {
        let mut results: Vec<(usize, String, PortalResult<Option<Value>>)> =
            stream::iter(paths.into_iter().enumerate())
                .map(|(index, path)| {
                    let portal = Arc::clone(&self.portal);
                    async move {
                        let result = portal.get_metadata(&path).await;
                        (index, path, result)
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, path, result)| (path, result))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::InMemoryPortal;
    use serde_json::json;

    fn check(type_name: &str, row: usize, value: &str) -> SubmittedIdCheck {
        SubmittedIdCheck {
            type_name: type_name.into(),
            row,
            value: value.into(),
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let portal = Arc::new(InMemoryPortal::new(json!({})));
        let validator = PortalValidator::new(portal.clone(), DEFAULT_PORTAL_CONCURRENCY);

        let checks = (0..40).map(|i| check("Donor", i + 2, &format!("D_{}", i))).collect();
        let results = validator.validate_submitted_ids(checks, &[]).await;

        assert_eq!(results.len(), 40);
        assert_eq!(portal.calls().len(), 40);
        assert!(portal.max_in_flight() <= DEFAULT_PORTAL_CONCURRENCY);
        assert!(portal.max_in_flight() > 1);
    }

    #[tokio::test]
    async fn test_rejections_sorted_by_row() {
        let portal = Arc::new(
            InMemoryPortal::new(json!({}))
                .with_rejected_id("D_9", "bad prefix")
                .with_failure("/validators/submitted_id/D_3", "upstream down"),
        );
        let validator = PortalValidator::new(portal, 3);

        let checks = vec![check("Donor", 9, "D_9"), check("Donor", 3, "D_3"), check("Donor", 5, "D_5")];
        let results = validator.validate_submitted_ids(checks, &[]).await;

        let rows: Vec<usize> = results.iter().map(|(c, _)| c.row).collect();
        assert_eq!(rows, vec![3, 5, 9]);
        assert!(results[0].1.as_deref().unwrap().contains("upstream down"));
        assert_eq!(results[1].1, None);
        assert_eq!(results[2].1.as_deref(), Some("bad prefix"));
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_input_order() {
        let portal = Arc::new(
            InMemoryPortal::new(json!({}))
                .with_object("/Donor/A", json!({ "uuid": "a" }))
                .with_object("/Donor/C", json!({ "uuid": "c" })),
        );
        let validator = PortalValidator::new(portal, 2);

        let paths = vec!["/Donor/C".to_string(), "/Donor/B".to_string(), "/Donor/A".to_string()];
        let results = validator.fetch_all(paths).await;

        let order: Vec<&str> = results.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(order, vec!["/Donor/C", "/Donor/B", "/Donor/A"]);
        assert!(results[1].1.as_ref().unwrap().is_none());
        assert_eq!(results[2].1.as_ref().unwrap().as_ref().unwrap()["uuid"], "a");
    }
}
