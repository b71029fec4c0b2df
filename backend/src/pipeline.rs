//! High-level API: load and validate a submission workbook.
//!
//! Steps, in order:
//! 1. Fetch the schema cache (once per [`Loader`])
//! 2. For each sheet in workbook order: resolve its type, expand mapped
//!    columns, normalize and coerce each record, collect references, fire
//!    column validators, then sheet validators and schema conformance
//! 3. Fire finish validators in registration order
//! 4. Sweep for unreferenced records
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use submitr::{load_file, LoadOptions, PortalClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let portal = Arc::new(PortalClient::from_env()?);
//!     let outcome = load_file("submission.xlsx", portal, LoadOptions::default()).await?;
//!
//!     for error in outcome.dataset.errors() {
//!         println!("{}", error);
//!     }
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::dataset::StructuredDataset;
use crate::error::{LoadResult, SchemaError};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::models::{IssueKind, Record, UnreferencedItem};
use crate::parser::{Sheet, Workbook};
use crate::portal::{Portal, DEFAULT_PORTAL_CONCURRENCY};
use crate::schema::{SchemaCache, DEFAULT_IGNORED_TYPES};
use crate::transform::{coerce_record, map_header, map_record, normalize_record, ColumnMapping, MappingCatalog};
use crate::validation::{conformance_errors, unreferenced_items, ValidatorRegistry};

/// Options for loading a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Submission centers passed to the identifier validator
    pub submission_centers: Vec<String>,

    /// Mapping catalog URL or local path (default: published catalog)
    pub mapping_catalog_url: Option<String>,

    /// Portal calls allowed in flight at once
    pub portal_concurrency: usize,

    /// Types hidden from sheet matching
    pub ignored_types: Vec<String>,

    /// Skip every Portal-backed check (identifier validation, lookups,
    /// compare)
    pub skip_remote: bool,

    /// Skip JSON Schema conformance of records
    pub skip_schema_validation: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            submission_centers: Vec::new(),
            mapping_catalog_url: None,
            portal_concurrency: DEFAULT_PORTAL_CONCURRENCY,
            ignored_types: DEFAULT_IGNORED_TYPES.iter().map(|s| s.to_string()).collect(),
            skip_remote: false,
            skip_schema_validation: false,
        }
    }
}

/// Result of loading a submission
#[derive(Serialize)]
pub struct LoadOutcome {
    /// Records, resolved references and recorded errors
    pub dataset: StructuredDataset,

    /// Records nothing links to
    pub advisories: Vec<UnreferencedItem>,
}

impl LoadOutcome {
    pub fn has_errors(&self) -> bool {
        self.dataset.has_errors()
    }
}

/// Loads submissions against one Portal.
///
/// The schema cache and mapping catalog are fetched on first use and
/// shared by every later load.
pub struct Loader {
    portal: Arc<dyn Portal>,
    options: LoadOptions,
    registry: ValidatorRegistry,
    schemas: OnceCell<Arc<SchemaCache>>,
    catalog: OnceCell<Arc<MappingCatalog>>,
}

impl Loader {
    pub fn new(portal: Arc<dyn Portal>, options: LoadOptions) -> LoadResult<Self> {
        Ok(Self {
            portal,
            options,
            registry: ValidatorRegistry::builtin()?,
            schemas: OnceCell::new(),
            catalog: OnceCell::new(),
        })
    }

    /// Use `catalog` instead of acquiring one.
    pub fn with_catalog(self, catalog: MappingCatalog) -> Self {
        Self {
            catalog: OnceCell::new_with(Some(Arc::new(catalog))),
            ..self
        }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub async fn schemas(&self) -> Result<Arc<SchemaCache>, SchemaError> {
        self.schemas
            .get_or_try_init(|| async {
                log_info("Fetching schemas from the Portal...");
                let cache = SchemaCache::fetch(self.portal.as_ref(), &self.options.ignored_types).await?;
                log_success(format!("Loaded {} schemas", cache.type_names().count()));
                Ok(Arc::new(cache))
            })
            .await
            .cloned()
    }

    pub async fn catalog(&self) -> Arc<MappingCatalog> {
        self.catalog
            .get_or_init(|| async {
                Arc::new(MappingCatalog::acquire(self.options.mapping_catalog_url.as_deref()).await)
            })
            .await
            .clone()
    }

    /// Load and validate a workbook file.
    pub async fn load_file<P: AsRef<Path>>(&self, path: P) -> LoadResult<LoadOutcome> {
        let schemas = self.schemas().await?;
        log_info(format!("Reading {}", path.as_ref().display()));
        let workbook = Workbook::open(path)?;
        self.load(workbook, schemas).await
    }

    /// Load and validate an already opened workbook.
    pub async fn load_workbook(&self, workbook: Workbook) -> LoadResult<LoadOutcome> {
        let schemas = self.schemas().await?;
        self.load(workbook, schemas).await
    }

    async fn load(&self, workbook: Workbook, schemas: Arc<SchemaCache>) -> LoadResult<LoadOutcome> {
        let catalog = self.catalog().await;
        let mut dataset = StructuredDataset::new(self.portal.clone(), schemas.clone(), self.options.clone());

        for sheet in &workbook.sheets {
            self.load_sheet(&mut dataset, &schemas, &catalog, sheet);
        }

        for (name, validator) in self.registry.finish_validators() {
            log_info_indent(format!("Running {} checks", name), 1);
            validator(&mut dataset).await;
        }

        let advisories = unreferenced_items(&dataset);

        if dataset.has_errors() {
            log_warning(format!(
                "Loaded {} records with {} errors",
                dataset.record_count(),
                dataset.errors().len()
            ));
        } else {
            log_success(format!("Loaded {} records without errors", dataset.record_count()));
        }
        if !advisories.is_empty() {
            log_warning(format!("{} records are not referenced", advisories.len()));
        }

        Ok(LoadOutcome { dataset, advisories })
    }

    fn load_sheet(
        &self,
        dataset: &mut StructuredDataset,
        schemas: &SchemaCache,
        catalog: &MappingCatalog,
        sheet: &Sheet,
    ) {
        let Some(type_name) = schemas.resolve_type_name(&sheet.name).map(String::from) else {
            log_warning(format!("Sheet '{}' matches no type; skipped", sheet.name));
            dataset.note_validation_error(
                IssueKind::UnknownSheet,
                format!("sheet '{}' does not match any type", sheet.name),
                Some(sheet.name.as_str()),
                None,
            );
            return;
        };

        let mapping = sheet_mapping(catalog, &sheet.name, &type_name);
        let columns = match mapping {
            Some(m) => map_header(&sheet.header, m).len(),
            None => sheet.header.len(),
        };
        log_info(format!(
            "Sheet '{}' -> {} ({} columns, {} rows)",
            sheet.name,
            type_name,
            columns,
            sheet.row_count()
        ));

        let mut records = Vec::new();
        for (row, raw) in sheet.records() {
            let mapped = match mapping {
                Some(m) => map_record(raw, m),
                None => raw,
            };
            let mut values = normalize_record(mapped);

            if let Some(schema) = schemas.get(&type_name) {
                for failure in coerce_record(schema, &mut values) {
                    dataset.note_validation_error(
                        IssueKind::TypeCoercion,
                        failure.message(),
                        Some(type_name.as_str()),
                        Some(row),
                    );
                }
            }

            dataset.resolve_refs(&type_name, &values);
            self.fire_column_validators(dataset, &type_name, row, &mut values);
            records.push(Record::new(row, values));
        }

        for validator in self.registry.sheet_validators(&type_name) {
            validator(dataset, &type_name, &mut records);
        }

        if !self.options.skip_schema_validation {
            if let Some(schema) = schemas.get(&type_name) {
                match conformance_errors(schema, &records) {
                    Ok(errors) => {
                        for (row, message) in errors {
                            dataset.note_validation_error(
                                IssueKind::SchemaViolation,
                                message,
                                Some(type_name.as_str()),
                                Some(row),
                            );
                        }
                    }
                    Err(e) => log_warning(e),
                }
            }
        }

        dataset.extend_records(&type_name, records);
    }

    fn fire_column_validators(
        &self,
        dataset: &mut StructuredDataset,
        type_name: &str,
        row: usize,
        values: &mut Map<String, Value>,
    ) {
        let columns: Vec<String> = values.keys().cloned().collect();
        for column in columns {
            let Some(validator) = self.registry.column_validator(type_name, &column) else {
                continue;
            };
            if let Some(value) = values.remove(&column) {
                let replaced = validator(dataset, type_name, &column, row, value);
                values.insert(column, replaced);
            }
        }
    }

    /// Expand a workbook without validating it: mapped columns and
    /// normalized records per sheet, keyed by sheet name.
    pub async fn parse_workbook(&self, workbook: &Workbook) -> BTreeMap<String, Vec<Record>> {
        let catalog = self.catalog().await;
        workbook
            .sheets
            .iter()
            .map(|sheet| {
                let mapping = catalog.for_sheet(&sheet.name);
                let records = sheet
                    .records()
                    .map(|(row, raw)| {
                        let mapped = match mapping {
                            Some(m) => map_record(raw, m),
                            None => raw,
                        };
                        Record::new(row, normalize_record(mapped))
                    })
                    .collect();
                (sheet.name.clone(), records)
            })
            .collect()
    }
}

/// Mapping for a sheet, by sheet name first, then by resolved type.
fn sheet_mapping<'a>(catalog: &'a MappingCatalog, sheet_name: &str, type_name: &str) -> Option<&'a ColumnMapping> {
    catalog
        .for_sheet(sheet_name)
        .or_else(|| catalog.for_sheet(type_name))
}

/// Load and validate a workbook file.
///
/// Convenience wrapper building a one-off [`Loader`].
pub async fn load_file<P: AsRef<Path>>(
    path: P,
    portal: Arc<dyn Portal>,
    options: LoadOptions,
) -> LoadResult<LoadOutcome> {
    Loader::new(portal, options)?.load_file(path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::portal::InMemoryPortal;
    use crate::test_support::{fixture_portal, sheet};
    use serde_json::json;

    fn loader(portal: InMemoryPortal) -> Loader {
        Loader::new(Arc::new(portal), LoadOptions::default())
            .unwrap()
            .with_catalog(MappingCatalog::bundled().unwrap())
    }

    fn workbook(sheets: Vec<Sheet>) -> Workbook {
        Workbook::from_sheets(sheets).unwrap()
    }

    fn errors_of(outcome: &LoadOutcome, kind: IssueKind) -> Vec<String> {
        outcome
            .dataset
            .errors()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.message.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_duplicate_software_rows() {
        let wb = workbook(vec![sheet(
            "Software",
            &["submitted_id", "name", "version"],
            vec![
                vec![json!("TEST_SOFTWARE_1"), json!("bwa"), json!("0.7.17")],
                vec![json!("TEST_SOFTWARE_1"), json!("bwa"), json!("0.7.17")],
            ],
        )]);
        let outcome = loader(fixture_portal()).load_workbook(wb).await.unwrap();

        assert_eq!(errors_of(&outcome, IssueKind::DuplicateRow), vec!["rows 2 and 3 are identical"]);
        assert_eq!(outcome.dataset.records("Software").len(), 2);
    }

    #[tokio::test]
    async fn test_paired_reads_crossed_file_sets() {
        let wb = workbook(vec![sheet(
            "UnalignedReads",
            &["submitted_id", "read_pair_number", "paired_with", "file_sets"],
            vec![
                vec![json!("X"), json!("R1"), json!(""), json!("B")],
                vec![json!("Y"), json!("R2"), json!("X"), json!("A")],
                vec![json!("Z"), json!("R2"), json!("X"), json!("B")],
            ],
        )]);
        let outcome = loader(fixture_portal()).load_workbook(wb).await.unwrap();

        let errors = errors_of(&outcome, IssueKind::CrossReference);
        assert!(errors.contains(&"file_sets [A] of Y differ from file_sets [B] of paired file X".to_string()));
        assert!(errors.contains(&"paired_with X is used by rows 3 and 4".to_string()));
    }

    #[tokio::test]
    async fn test_rna_analyte_without_rin() {
        let wb = workbook(vec![sheet(
            "Analyte",
            &["submitted_id", "molecule"],
            vec![vec![json!("S"), json!("RNA")]],
        )]);
        let outcome = loader(fixture_portal()).load_workbook(wb).await.unwrap();

        assert_eq!(
            errors_of(&outcome, IssueKind::SchemaViolation),
            vec!["rna_integrity_number is required for RNA analyte S"]
        );
        assert_eq!(outcome.dataset.records("Analyte")[0].values["molecule"], json!(["RNA"]));
    }

    #[tokio::test]
    async fn test_dsa_fasta_missing_haplotype() {
        let wb = workbook(vec![sheet(
            "SupplementaryFile",
            &["submitted_id", "file_format", "data_type"],
            vec![vec![json!("TEST_DSA_1"), json!("fa"), json!("DSA")]],
        )]);
        let outcome = loader(fixture_portal()).load_workbook(wb).await.unwrap();

        let errors = errors_of(&outcome, IssueKind::SchemaViolation);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("haplotype is required"));
        assert!(errors[1].starts_with("donor_specific_assembly is required"));
    }

    #[tokio::test]
    async fn test_ndri_tissue_mismatch() {
        let wb = workbook(vec![
            sheet(
                "Donor",
                &["submitted_id", "external_id"],
                vec![vec![json!("TEST_DONOR_1"), json!("D-999")]],
            ),
            sheet(
                "Tissue",
                &["submitted_id", "external_id", "donor"],
                vec![vec![json!("NDRI_X"), json!("T-001"), json!("TEST_DONOR_1")]],
            ),
        ]);
        let outcome = loader(fixture_portal()).load_workbook(wb).await.unwrap();

        let errors = errors_of(&outcome, IssueKind::CrossReference);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("T-001"));
        assert!(errors[0].contains("D-999"));
    }

    #[tokio::test]
    async fn test_column_mapping_expansion() {
        let wb = workbook(vec![sheet(
            "FileSet",
            &["submitted_id", "total_raw_reads_sequenced"],
            vec![vec![json!("TEST_FILE-SET_1"), json!(11870183)]],
        )]);
        let outcome = loader(fixture_portal()).load_workbook(wb).await.unwrap();

        let record = &outcome.dataset.records("FileSet")[0];
        assert_eq!(
            record.values["qc_values"][0],
            json!({
                "derived_from": "total_raw_reads_sequenced",
                "value": 11870183,
                "key": "Total Raw Reads Sequenced"
            })
        );
        assert!(!record.values.contains_key("total_raw_reads_sequenced"));
        assert!(!outcome.dataset.has_errors());
    }

    #[tokio::test]
    async fn test_unknown_sheet_and_coercion() {
        let wb = workbook(vec![
            sheet("Instructions", &["text"], vec![vec![json!("fill me in")]]),
            sheet(
                "donors",
                &["submitted_id", "age"],
                vec![vec![json!("TEST_DONOR_1"), json!("forty")]],
            ),
        ]);
        let outcome = loader(fixture_portal()).load_workbook(wb).await.unwrap();

        let unknown: Vec<_> = outcome
            .dataset
            .errors()
            .iter()
            .filter(|e| e.kind == IssueKind::UnknownSheet)
            .collect();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].row, None);

        assert_eq!(errors_of(&outcome, IssueKind::TypeCoercion).len(), 1);
        assert_eq!(outcome.dataset.records("Donor")[0].values["age"], "forty");
        assert!(!errors_of(&outcome, IssueKind::SchemaViolation).is_empty());
    }

    #[tokio::test]
    async fn test_refs_and_advisories() {
        let wb = workbook(vec![
            sheet("Analyte", &["submitted_id", "molecule"], vec![vec![json!("TEST_ANALYTE_1"), json!("DNA")]]),
            sheet(
                "Library",
                &["submitted_id", "analytes"],
                vec![vec![json!("TEST_LIBRARY_1"), json!("TEST_ANALYTE_1")]],
            ),
        ]);
        let outcome = loader(fixture_portal()).load_workbook(wb).await.unwrap();

        assert!(outcome.dataset.resolved_refs().contains("/Analyte/TEST_ANALYTE_1"));
        let unreferenced: Vec<&str> = outcome.advisories.iter().map(|a| a.identifier.as_str()).collect();
        assert_eq!(unreferenced, vec!["TEST_LIBRARY_1"]);
    }

    #[tokio::test]
    async fn test_rejected_identifier_from_portal() {
        let portal = fixture_portal().with_rejected_id("XX_DONOR_1", "submission center XX not allowed");
        let wb = workbook(vec![sheet("Donor", &["submitted_id"], vec![vec![json!("XX_DONOR_1")]])]);
        let outcome = loader(portal).load_workbook(wb).await.unwrap();

        let rejected = errors_of(&outcome, IssueKind::RemoteRejected);
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].contains("not allowed"));
    }

    #[tokio::test]
    async fn test_deterministic_outcome() {
        let build = || {
            workbook(vec![sheet(
                "UnalignedReads",
                &["submitted_id", "read_pair_number", "paired_with", "file_sets"],
                vec![
                    vec![json!("X"), json!("R1"), json!(""), json!("B")],
                    vec![json!("Y"), json!("R2"), json!("X"), json!("A")],
                ],
            )])
        };
        let first = loader(fixture_portal()).load_workbook(build()).await.unwrap();
        let second = loader(fixture_portal()).load_workbook(build()).await.unwrap();
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_schema_fetch_failure_is_fatal() {
        let portal = InMemoryPortal::new(json!(["not", "a", "map"]));
        let wb = workbook(vec![sheet("Donor", &["submitted_id"], vec![vec![json!("D")]])]);
        let result = loader(portal).load_workbook(wb).await;
        assert!(matches!(result, Err(LoadError::Schema(_))));
    }

    #[tokio::test]
    async fn test_load_xlsx_file() {
        use rust_xlsxwriter::Workbook as XlsxWorkbook;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submission.xlsx");
        let mut wb = XlsxWorkbook::new();
        let software = wb.add_worksheet().set_name("Software").unwrap();
        software.write_string(0, 0, "submitted_id").unwrap();
        software.write_string(0, 1, "name").unwrap();
        software.write_string(1, 0, "TEST_SOFTWARE_1").unwrap();
        software.write_string(1, 1, "dorado").unwrap();
        wb.save(&path).unwrap();

        let outcome = loader(fixture_portal()).load_file(&path).await.unwrap();
        assert_eq!(outcome.dataset.records("Software").len(), 1);
        assert!(!outcome.has_errors());
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let result = loader(fixture_portal()).load_file("/nonexistent/submission.xlsx").await;
        assert!(matches!(result, Err(LoadError::Workbook(_))));
    }

    #[tokio::test]
    async fn test_parse_workbook_expands_without_validation() {
        let wb = workbook(vec![sheet(
            "FileSet",
            &["submitted_id", "total_raw_reads_sequenced"],
            vec![vec![json!("FS"), json!("123")]],
        )]);
        let parsed = loader(fixture_portal()).parse_workbook(&wb).await;
        assert_eq!(parsed["FileSet"][0].values["qc_values"][0]["value"], "123");
    }
}
