//! Record transformation.
//!
//! Turns a raw workbook row into a schema-shaped record:
//! - Mapping: column mapping catalog and header/record expansion
//! - Normalize: path-shaped column names into nested structures
//! - Coerce: cell values toward declared schema types

pub mod coerce;
pub mod mapping;
pub mod normalize;

pub use coerce::{coerce_record, split_list, CoercionFailure, ARRAY_SEPARATOR};
pub use mapping::{
    map_header, map_record, ColumnMapping, MappingCatalog, DEFAULT_MAPPING_CATALOG_URL,
};
pub use normalize::normalize_record;
