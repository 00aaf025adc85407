use clap::{Parser, Subcommand, ValueEnum};
use contentdb::{ContentStore, Entry, FieldFilter, StoreOptions};
use std::path::PathBuf;
use std::process;

/// contentdb CLI - inspect, validate and export content collections
#[derive(Parser)]
#[command(name = "contentdb", version, about)]
struct Cli {
    /// Content root; every directory directly below it is a collection
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Content configuration file, relative to the root
    #[arg(long, default_value = "config.yaml", global = true)]
    config_file: String,

    /// Recognized content extensions (repeatable, default md,mdx,markdown)
    #[arg(long = "ext", value_delimiter = ',', global = true)]
    extensions: Vec<String>,

    /// Process files on a single thread
    #[arg(long, global = true)]
    no_parallel: bool,

    /// Use the entry cache; without a path it lives in <root>/.contentdb/cache.db
    #[arg(long, num_args = 0..=1, global = true)]
    cache: Option<Option<PathBuf>>,

    /// Output format
    #[arg(long, default_value = "yaml", global = true)]
    format: OutputFormat,

    /// Verbosity level (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List the valid entries of a collection
    List {
        /// Collection name
        collection: String,
        /// Field filters (e.g. --where status=draft --where author.name=Ada)
        #[arg(long = "where")]
        filters: Vec<String>,
        /// Leave entry bodies out of the output
        #[arg(long)]
        no_body: bool,
    },

    /// Get a single entry by id (e.g. en/getting-started.md)
    Get {
        /// Collection name
        collection: String,
        /// Entry id, or slug with --slug
        id: String,
        /// Look the entry up by slug instead of id
        #[arg(long)]
        slug: bool,
    },

    /// Check every entry against its collection schema; exits 1 on failures
    Validate,

    /// Show collections, entry counts and the last build
    Status,

    /// Build the index and print the build report
    Build,

    /// Bulk export one collection, or all collections when none is given
    Export {
        /// Collection name
        collection: Option<String>,
    },

    /// Generate Rust bindings for the configured collections
    Generate {
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(cli) {
        // Machine-readable error on stderr
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn store_options(cli: &Cli) -> StoreOptions {
    let mut options = StoreOptions::new(&cli.root)
        .config_file(&cli.config_file)
        .parallel(!cli.no_parallel);
    if !cli.extensions.is_empty() {
        options = options.extensions(&cli.extensions);
    }
    match &cli.cache {
        Some(Some(path)) => options.cache_path(path),
        Some(None) => options.default_cache(),
        None => options,
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let open = || ContentStore::open(store_options(&cli));

    match &cli.command {
        Command::List {
            collection,
            filters,
            no_body,
        } => {
            let store = open()?;
            let filters = filters
                .iter()
                .map(|f| FieldFilter::parse(f))
                .collect::<contentdb::Result<Vec<_>>>()?;
            let entries = store.get_collection_where(collection, |entry| {
                filters.iter().all(|filter| filter.matches(entry))
            })?;
            print_output(&entries_to_value(&entries, *no_body)?, &cli.format)?;
        }

        Command::Get {
            collection,
            id,
            slug,
        } => {
            let store = open()?;
            let entry = if *slug {
                store.get_entry_by_slug(collection, id)?
            } else {
                store.get_entry(collection, id)?
            };
            print_output(&serde_json::to_value(&entry)?, &cli.format)?;
        }

        Command::Validate => {
            let store = open()?;
            let report = store.report();
            let mut collections = serde_json::Map::new();
            for name in store.collection_names() {
                let issues: Vec<_> = report
                    .errors
                    .iter()
                    .filter(|e| e.collection == name)
                    .collect();
                let valid = store.get_collection(&name)?.len();
                collections.insert(
                    name,
                    serde_json::json!({
                        "total": valid + issues.len(),
                        "issues": issues,
                    }),
                );
            }
            print_output(&serde_json::Value::Object(collections), &cli.format)?;

            if !report.is_ok() {
                return Err(format!("{} entries failed validation", report.errors.len()).into());
            }
        }

        Command::Status => {
            print_output(&open()?.status(), &cli.format)?;
        }

        Command::Build => {
            let report = open()?.report();
            print_output(&serde_json::to_value(report.as_ref())?, &cli.format)?;
        }

        Command::Export { collection } => {
            let store = open()?;
            let names = match collection {
                Some(name) => vec![name.clone()],
                None => store.collection_names(),
            };
            let mut export = serde_json::Map::new();
            for name in names {
                let entries = store.get_collection(&name)?;
                export.insert(name, entries_to_value(&entries, false)?);
            }
            let value = match collection {
                Some(name) => export.remove(name).unwrap_or_default(),
                None => serde_json::Value::Object(export),
            };
            print_output(&value, &cli.format)?;
        }

        Command::Generate { out } => generate(&cli, out.as_ref())?,
    }

    Ok(())
}

fn generate(cli: &Cli, out: Option<&PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = cli.root.join(&cli.config_file);
    let config_yaml = std::fs::read_to_string(&config_path)
        .map_err(|e| format!("Failed to read '{}': {e}", config_path.display()))?;
    let code = contentdb_codegen::generate_from_config_str(&config_yaml)?;

    match out {
        Some(path) => {
            std::fs::write(path, code)?;
            log::info!("Wrote bindings to {}", path.display());
        }
        None => print!("{code}"),
    }
    Ok(())
}

fn entries_to_value(
    entries: &[Entry],
    no_body: bool,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let mut value = serde_json::to_value(entries)?;
    if no_body {
        if let Some(items) = value.as_array_mut() {
            for item in items {
                if let Some(object) = item.as_object_mut() {
                    object.remove("body");
                }
            }
        }
    }
    Ok(value)
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
