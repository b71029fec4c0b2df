//! Error types for the submission validation engine.
//!
//! Only conditions that stop a load are Rust errors:
//!
//! - [`WorkbookError`] - the workbook cannot be opened or has no usable sheet
//! - [`PortalError`] - transport or protocol failures talking to the Portal
//! - [`CatalogError`] - column mapping catalog could not be fetched or parsed
//! - [`SchemaError`] - the schema endpoint returned an unusable payload
//! - [`ConfigurationError`] - malformed validator registration
//! - [`LoadError`] - top-level orchestration errors
//!
//! Data problems found in a submission are never raised. They accumulate on
//! the dataset as [`crate::models::ValidationIssue`] values.

use thiserror::Error;

// =============================================================================
// Workbook Errors
// =============================================================================

/// Errors opening or decoding a workbook (the `WorkbookIOError` family).
#[derive(Debug, Error)]
pub enum WorkbookError {
    /// Failed to read file.
    #[error("Failed to read workbook: {0}")]
    Io(#[from] std::io::Error),

    /// Extension is not one of the supported workbook formats.
    #[error("Unsupported workbook format: {0}")]
    UnsupportedFormat(String),

    /// Spreadsheet engine rejected the file.
    #[error("Cannot open spreadsheet: {0}")]
    Spreadsheet(String),

    /// Delimited text could not be decoded.
    #[error("Invalid delimited text: {0}")]
    Delimited(String),

    /// No sheet carries a header row.
    #[error("Workbook has no sheet with a header row")]
    NoSheets,
}

// =============================================================================
// Portal Errors
// =============================================================================

/// Errors from the Portal HTTP interface.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Missing connection settings.
    #[error("Missing Portal setting: {0}")]
    MissingSetting(String),

    /// HTTP request failed before a response arrived.
    #[error("Portal request failed: {0}")]
    Request(String),

    /// Non-success status other than 404.
    #[error("Portal returned HTTP {status} for {path}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    /// Response body was not the expected JSON.
    #[error("Invalid Portal response for {path}: {message}")]
    InvalidResponse { path: String, message: String },
}

// =============================================================================
// Catalog Errors
// =============================================================================

/// Errors acquiring the column mapping catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Fetching the remote catalog failed.
    #[error("Failed to fetch mapping catalog from {url}: {message}")]
    Fetch { url: String, message: String },

    /// Catalog JSON is malformed.
    #[error("Invalid mapping catalog: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors building the schema cache.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Portal call failed.
    #[error("Cannot fetch schemas: {0}")]
    Portal(#[from] PortalError),

    /// Schema payload is not a map of type name to schema.
    #[error("Malformed schema payload: {0}")]
    Malformed(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Programmer errors in validator registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Two validators claimed the same key.
    #[error("Duplicate {kind} validator registration for '{key}'")]
    Duplicate { kind: &'static str, key: String },

    /// Registration key is unusable.
    #[error("Invalid {kind} validator key '{key}'")]
    InvalidKey { kind: &'static str, key: String },
}

// =============================================================================
// Load Errors (top-level)
// =============================================================================

/// Top-level errors returned by [`crate::pipeline::load_file`].
///
/// Everything else found while loading a submission is recorded on the
/// dataset instead.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Workbook could not be read.
    #[error("Workbook error: {0}")]
    Workbook(#[from] WorkbookError),

    /// Schema cache could not be built.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Validator registry is malformed.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for workbook operations.
pub type WorkbookResult<T> = Result<T, WorkbookError>;

/// Result type for Portal operations.
pub type PortalResult<T> = Result<T, PortalError>;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result type for the top-level load.
pub type LoadResult<T> = Result<T, LoadError>;
