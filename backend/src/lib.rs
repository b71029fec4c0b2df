//! # Submitr - metadata submission validation
//!
//! Submitr loads a multi-sheet metadata workbook (one sheet per item type),
//! turns each row into a schema-shaped record and validates the whole
//! submission against the type schemas and the existing content of a Portal.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Workbook   │────▶│   Parser    │────▶│  Transform  │────▶│   Dataset   │
//! │ (xlsx/csv)  │     │ (per sheet) │     │ (map/coerce)│     │ (+ refs)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │
//!                     ┌─────────────┐     ┌─────────────┐            │
//!                     │   Portal    │◀───▶│ Validators  │◀───────────┘
//!                     │ (schemas,   │     │ (column,    │
//!                     │  items)     │     │  sheet, fin)│
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use submitr::{load_file, LoadOptions, PortalClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let portal = Arc::new(PortalClient::from_env().unwrap());
//!     let outcome = load_file("submission.xlsx", portal, LoadOptions::default()).await.unwrap();
//!     println!("{} errors", outcome.dataset.errors().len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`logs`] - Progress logging
//! - [`models`] - Records, issues and advisories
//! - [`parser`] - Workbook reading
//! - [`schema`] - Type schema cache
//! - [`transform`] - Column mapping, normalization and coercion
//! - [`dataset`] - The structured dataset validators work on
//! - [`validation`] - Validator registry and built-in rules
//! - [`portal`] - Portal access
//! - [`pipeline`] - Load orchestration

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Input
pub mod parser;
pub mod schema;
pub mod transform;

// Validation
pub mod dataset;
pub mod validation;

// Portal
pub mod portal;

// Orchestration
pub mod pipeline;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CatalogError,
    ConfigurationError,
    LoadError,
    LoadResult,
    PortalError,
    SchemaError,
    WorkbookError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CompareEntry,
    FieldDiff,
    IssueKind,
    Record,
    UnreferencedItem,
    ValidationIssue,
};

// =============================================================================
// Re-exports - Input
// =============================================================================

pub use parser::{Sheet, Workbook};
pub use schema::{SchemaCache, TypeSchema, DEFAULT_IGNORED_TYPES};
pub use transform::{MappingCatalog, DEFAULT_MAPPING_CATALOG_URL};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use dataset::StructuredDataset;
pub use validation::{conformance_errors, unreferenced_items, ValidatorRegistry};

// =============================================================================
// Re-exports - Portal
// =============================================================================

pub use portal::{InMemoryPortal, Portal, PortalClient, PortalValidator};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{load_file, LoadOptions, LoadOutcome, Loader};
