use anyhow::Context;
use clap::{Parser, ValueEnum};
use querydesigner::config::{CliConfig, ConverterConfig};
use querydesigner::converter::{QueryConverter, RecordingBackend};
use querydesigner::providers::ProviderCatalog;
use querydesigner::sql_generator::SqlQueryBackend;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Output {
    /// Rendered SQL with bound parameters
    Sql,
    /// Backend calls in emission order
    Events,
    /// Table and column alias tables
    Aliases,
}

/// Query designer converter
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON query definition file
    #[arg(long)]
    definition: PathBuf,

    /// Root entity class, unless the definition declares one
    #[arg(long)]
    entity: Option<String>,

    /// YAML catalog of virtual fields, virtual relations and functions
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// YAML converter configuration (defaults to QUERYDESIGNER_* environment variables)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ceiling for the join ordering passes
    #[arg(long)]
    max_join_iterations: Option<u32>,

    /// Prefix of generated table aliases
    #[arg(long)]
    table_alias_prefix: Option<String>,

    /// Prefix of generated column aliases
    #[arg(long)]
    column_alias_prefix: Option<String>,

    #[arg(long, value_enum, default_value = "sql")]
    output: Output,
}

impl From<&Cli> for CliConfig {
    fn from(cli: &Cli) -> Self {
        CliConfig {
            max_join_iterations: cli.max_join_iterations,
            table_alias_prefix: cli.table_alias_prefix.clone(),
            column_alias_prefix: cli.column_alias_prefix.clone(),
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ConverterConfig> {
    let mut config = match &cli.config {
        Some(path) => ConverterConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => ConverterConfig::from_env().context("reading configuration from environment")?,
    };
    config.merge_cli(&CliConfig::from(cli))?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    // Defaults to WARN, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let catalog = match &cli.catalog {
        Some(path) => ProviderCatalog::load(path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => ProviderCatalog::new(),
    };
    let converter = QueryConverter::from_catalog(Arc::new(catalog)).with_config(config);

    let content = std::fs::read_to_string(&cli.definition)
        .with_context(|| format!("reading definition {}", cli.definition.display()))?;
    let definition: Value = serde_json::from_str(&content).context("parsing definition JSON")?;
    let entity = cli.entity.as_deref();

    let output = match cli.output {
        Output::Sql => {
            let mut backend = SqlQueryBackend::new();
            converter.convert_value(&definition, entity, &mut backend)?;
            let sql = backend.sql()?;
            json!({"sql": sql, "parameters": backend.query().parameters})
        }
        Output::Events => {
            let mut backend = RecordingBackend::new();
            converter.convert_value(&definition, entity, &mut backend)?;
            serde_json::to_value(backend.events())?
        }
        Output::Aliases => {
            let mut backend = RecordingBackend::new();
            let summary = converter.convert_value(&definition, entity, &mut backend)?;
            serde_json::to_value(summary)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
