//! Submitr CLI - validate metadata submission workbooks
//!
//! # Main Commands
//!
//! ```bash
//! submitr validate submission.xlsx            # Validate against the Portal
//! submitr validate submission.xlsx --schemas schemas.json   # offline
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! submitr parse submission.xlsx    # Expanded records per sheet, no validation
//! submitr mappings                 # Show the column mapping catalog in use
//! submitr types                    # List submittable types
//! ```
//!
//! The Portal is configured through `SUBMITR_PORTAL_URL`,
//! `SUBMITR_PORTAL_KEY` and `SUBMITR_PORTAL_SECRET` (a `.env` file is read
//! if present). `--schemas` replaces the Portal with a local schema file and
//! skips every check that needs Portal content.

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use submitr::{InMemoryPortal, LoadOptions, Loader, Portal, PortalClient, Workbook};

#[derive(Parser)]
#[command(name = "submitr")]
#[command(about = "Validate metadata submission workbooks against a Portal", long_about = None)]
struct Cli {
    /// Only print warnings while loading
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a workbook and run every validator
    Validate {
        /// Input workbook (.xlsx, .xls, .ods, .csv, .tsv)
        input: PathBuf,

        /// Local schema map (JSON) instead of fetching from the Portal;
        /// implies --skip-remote
        #[arg(long)]
        schemas: Option<PathBuf>,

        /// Submission centers for identifier validation
        #[arg(long, value_delimiter = ',')]
        centers: Vec<String>,

        /// Mapping catalog URL or path
        #[arg(short, long)]
        mappings: Option<String>,

        /// Skip every check that calls the Portal
        #[arg(long)]
        skip_remote: bool,

        /// Skip JSON Schema conformance checks
        #[arg(long)]
        no_schema_check: bool,

        /// Portal calls in flight at once
        #[arg(long, default_value = "6")]
        concurrency: usize,

        /// Output file for the JSON report (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Expand a workbook's records without validating them
    Parse {
        /// Input workbook
        input: PathBuf,

        /// Mapping catalog URL or path
        #[arg(short, long)]
        mappings: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the column mapping catalog
    Mappings {
        /// Mapping catalog URL or path
        #[arg(short, long)]
        mappings: Option<String>,
    },

    /// List the types a sheet can be named after
    Types {
        /// Local schema map (JSON) instead of fetching from the Portal
        #[arg(long)]
        schemas: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    submitr::logs::set_quiet(cli.quiet);

    let result = match cli.command {
        Commands::Validate {
            input,
            schemas,
            centers,
            mappings,
            skip_remote,
            no_schema_check,
            concurrency,
            output,
        } => {
            let options = LoadOptions {
                submission_centers: centers,
                mapping_catalog_url: mappings,
                portal_concurrency: concurrency.max(1),
                skip_remote: remote_checks_skipped(skip_remote, schemas.as_deref()),
                skip_schema_validation: no_schema_check,
                ..LoadOptions::default()
            };
            cmd_validate(&input, schemas.as_deref(), options, output.as_deref()).await
        }

        Commands::Parse { input, mappings, output } => {
            cmd_parse(&input, mappings, output.as_deref()).await
        }

        Commands::Mappings { mappings } => cmd_mappings(mappings).await,

        Commands::Types { schemas } => cmd_types(schemas.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Local schemas mean no Portal content to check against.
fn remote_checks_skipped(skip_remote: bool, schemas: Option<&Path>) -> bool {
    if schemas.is_some() && !skip_remote {
        submitr::logs::log_warning(
            "Local schemas given: identifier, lookup and released-item checks are skipped",
        );
    }
    skip_remote || schemas.is_some()
}

fn open_portal(schemas: Option<&Path>) -> Result<Arc<dyn Portal>, Box<dyn std::error::Error>> {
    match schemas {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            let schemas: Value = serde_json::from_str(&content)?;
            eprintln!("📄 Using local schemas: {}", path.display());
            Ok(Arc::new(InMemoryPortal::new(schemas)))
        }
        None => Ok(Arc::new(PortalClient::from_env()?)),
    }
}

async fn cmd_validate(
    input: &Path,
    schemas: Option<&Path>,
    options: LoadOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Validating: {}", input.display());

    let loader = Loader::new(open_portal(schemas)?, options)?;
    let outcome = loader.load_file(input).await?;

    let errors = outcome.dataset.errors();
    if errors.is_empty() {
        eprintln!("\n✅ No errors in {} records", outcome.dataset.record_count());
    } else {
        eprintln!("\n❌ {} errors:", errors.len());
        for error in errors {
            eprintln!("   - {}", error);
        }
    }
    if !outcome.advisories.is_empty() {
        eprintln!("\n⚠️  {} unreferenced records:", outcome.advisories.len());
        for item in &outcome.advisories {
            eprintln!("   - {}", item);
        }
    }

    let json = serde_json::to_string_pretty(&outcome)?;
    write_output(&json, output)?;

    if outcome.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_parse(
    input: &Path,
    mappings: Option<String>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing: {}", input.display());

    let workbook = Workbook::open(input)?;
    for sheet in &workbook.sheets {
        eprintln!("   {}: {} rows, columns: {}", sheet.name, sheet.row_count(), sheet.header.join(", "));
    }

    let options = LoadOptions {
        mapping_catalog_url: mappings,
        ..LoadOptions::default()
    };
    // Parsing never calls the Portal
    let loader = Loader::new(Arc::new(InMemoryPortal::new(json!({}))), options)?;
    let parsed = loader.parse_workbook(&workbook).await;

    let json = serde_json::to_string_pretty(&parsed)?;
    write_output(&json, output)?;
    Ok(())
}

async fn cmd_mappings(mappings: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = submitr::MappingCatalog::acquire(mappings.as_deref()).await;
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}

async fn cmd_types(schemas: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let loader = Loader::new(open_portal(schemas)?, LoadOptions::default())?;
    let cache = loader.schemas().await?;
    for name in cache.type_names() {
        let marker = if cache.is_abstract(name) { " (abstract)" } else { "" };
        println!("{}{}", name, marker);
    }
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
