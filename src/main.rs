use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crdgen::model::Transpiled;
use crdgen::schema::Schema;
use crdgen::source::DEFAULT_MAX_SCHEMA_BYTES;

/// Transpile JSON Schema documents into a typed record model.
///
/// Reads one or more schema documents, resolves their `$ref`s and prints
/// the resulting records and aliases as JSON for a code renderer.
#[derive(Parser)]
#[command(name = "crdgen", version, about)]
struct Cli {
    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Suppress non-error output.
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transpile schema documents and print the model as JSON.
    Transpile {
        /// Schema sources. The first one is the primary document and yields
        /// the `Root` record; the rest are `$ref` targets.
        #[arg(required = true)]
        schemas: Vec<String>,

        /// Write the model to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Print single-line JSON.
        #[arg(long)]
        compact: bool,

        /// Maximum size of a downloaded schema document.
        #[arg(long, env = "CRDGEN_MAX_SCHEMA_BYTES", default_value_t = DEFAULT_MAX_SCHEMA_BYTES)]
        max_schema_bytes: usize,
    },

    /// Download a schema document and save it locally.
    #[cfg(feature = "download")]
    DownloadSchema {
        /// URL of the schema document.
        #[arg(long, env = "CRDGEN_SCHEMA_URL")]
        url: String,

        /// Where to save the document.
        #[arg(long, default_value = "schema.json")]
        output: PathBuf,

        /// Maximum size of the downloaded document.
        #[arg(long, env = "CRDGEN_MAX_SCHEMA_BYTES", default_value_t = DEFAULT_MAX_SCHEMA_BYTES)]
        max_schema_bytes: usize,
    },
}

/// What `transpile` prints.
#[derive(Serialize)]
struct Report {
    digest: String,
    #[serde(flatten)]
    model: Transpiled,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");

        // Print cause chain.
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = std::error::Error::source(cause);
        }

        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> crdgen::Result<()> {
    match cli.command {
        Commands::Transpile {
            schemas,
            output,
            compact,
            max_schema_bytes,
        } => {
            let mut raw = Vec::with_capacity(schemas.len());
            for source in &schemas {
                if !cli.quiet {
                    eprintln!("Loading schema from {source}");
                }
                raw.push(fetch(source, max_schema_bytes)?);
            }

            let documents = raw
                .iter()
                .map(|bytes| Schema::parse(bytes))
                .collect::<crdgen::Result<Vec<_>>>()?;
            let model = crdgen::transpile(&documents)?;

            if !cli.quiet {
                eprintln!(
                    "Generated {} records, {} aliases",
                    model.records.len(),
                    model.aliases.len()
                );
            }

            let report = Report {
                digest: crdgen::source::digest(raw.iter().map(Vec::as_slice)),
                model,
            };
            let json = if compact {
                serde_json::to_string(&report)?
            } else {
                serde_json::to_string_pretty(&report)?
            };

            match output {
                Some(path) => {
                    crdgen::source::write_output(&path, &json)?;
                    if !cli.quiet {
                        eprintln!("Wrote {}", path.display());
                    }
                }
                None => println!("{json}"),
            }
        }

        #[cfg(feature = "download")]
        Commands::DownloadSchema {
            url,
            output,
            max_schema_bytes,
        } => {
            let rt = tokio::runtime::Runtime::new().map_err(|e| crdgen::Error::Download(e.to_string()))?;
            let schema = rt.block_on(crdgen::source::save_schema(&url, &output, max_schema_bytes))?;
            if !cli.quiet {
                eprintln!(
                    "Saved schema '{}' ({} properties, {} definitions) to {}",
                    schema.title,
                    schema.properties.len(),
                    schema.definitions.len(),
                    output.display()
                );
            }
        }
    }

    Ok(())
}

/// Raw bytes of one schema source: a file path, or a URL when downloads are
/// enabled.
fn fetch(source: &str, max_bytes: usize) -> crdgen::Result<Vec<u8>> {
    if crdgen::source::is_url(source) {
        #[cfg(feature = "download")]
        {
            let rt = tokio::runtime::Runtime::new().map_err(|e| crdgen::Error::Download(e.to_string()))?;
            return rt.block_on(crdgen::source::download_schema(source, max_bytes));
        }
        #[cfg(not(feature = "download"))]
        {
            let _ = max_bytes;
            tracing::warn!(source, "built without the download feature, treating URL as a path");
        }
    }
    crdgen::source::read_schema(std::path::Path::new(source))
}
