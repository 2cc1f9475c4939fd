use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use device_registry as devreg;
use telemetry_merge::{MergeConfig, MergeMetrics, MergeSummary};

#[derive(Parser, Debug)]
#[command(
    name = "tmerge",
    version,
    about = "Merge per-device telemetry CSV exports using a device registry",
    disable_help_subcommand = true
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Variant {
    /// id, device_address
    Address,
    /// id, device_address, device_eui
    AddressEui,
}

impl Variant {
    fn into_registry(self) -> devreg::EnrichmentVariant {
        match self {
            Variant::Address => devreg::EnrichmentVariant::Address,
            Variant::AddressEui => devreg::EnrichmentVariant::AddressEui,
        }
    }
}

#[derive(Args, Debug, Default)]
struct SourceArgs {
    /// YAML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Device registry CSV
    #[arg(long)]
    registry: Option<PathBuf>,
    /// Registry columns carried into the output
    #[arg(long, value_enum)]
    variant: Option<Variant>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge all registered devices' CSV files into one timestamped file
    Merge {
        #[command(flatten)]
        source: SourceArgs,
        /// Directory with <device_address>.csv files; output is written here
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Output file name prefix
        #[arg(long)]
        prefix: Option<String>,
        /// Print the run summary as JSON after the output path
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
        /// Print Prometheus metrics for the run to stderr
        #[arg(long, action = ArgAction::SetTrue)]
        metrics: bool,
    },
    /// List the records of a device registry
    RegistryList {
        #[command(flatten)]
        source: SourceArgs,
        /// Print records as JSON lines
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
}

#[derive(Serialize)]
struct MergeReport<'a> {
    output_path: &'a Path,
    #[serde(flatten)]
    summary: &'a MergeSummary,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    match cli.command {
        Commands::Merge {
            source,
            data_dir,
            prefix,
            json,
            metrics,
        } => {
            let cfg = resolve_config(&source, data_dir, prefix)?;
            merge(&cfg, json, metrics)
        }
        Commands::RegistryList { source, json } => {
            let cfg = resolve_config(&source, None, None)?;
            registry_list(&cfg, json)
        }
    }
}

fn setup_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_config(
    source: &SourceArgs,
    data_dir: Option<PathBuf>,
    prefix: Option<String>,
) -> Result<MergeConfig> {
    let mut cfg = match &source.config {
        Some(path) => MergeConfig::load(path)?,
        None => MergeConfig::default(),
    };
    if let Some(p) = &source.registry {
        cfg.registry_path = p.clone();
    }
    if let Some(v) = source.variant {
        cfg.variant = v.into_registry();
    }
    if let Some(d) = data_dir {
        cfg.data_dir = d;
    }
    if let Some(p) = prefix {
        cfg.output_prefix = p;
    }
    debug!(?cfg, "resolved config");
    Ok(cfg)
}

fn merge(cfg: &MergeConfig, json: bool, metrics: bool) -> Result<()> {
    let outcome = telemetry_merge::run_merge(cfg).with_context(|| {
        format!(
            "merging {} into {}",
            cfg.registry_path.display(),
            cfg.data_dir.display()
        )
    })?;
    println!("Merged file created: {}", outcome.output_path.display());
    if json {
        let report = MergeReport {
            output_path: &outcome.output_path,
            summary: &outcome.summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    if metrics {
        let hub = MergeMetrics::new().map_err(anyhow::Error::msg)?;
        hub.observe(&outcome.summary);
        eprint!("{}", hub.encode_text());
    }
    Ok(())
}

fn registry_list(cfg: &MergeConfig, json: bool) -> Result<()> {
    let records = devreg::load_registry(&cfg.registry_path, cfg.variant)
        .with_context(|| format!("loading registry {}", cfg.registry_path.display()))?;
    for rec in &records {
        if json {
            println!("{}", serde_json::to_string(rec)?);
        } else {
            println!(
                "{}",
                rec.enrichment_values(cfg.variant).join("\t")
            );
        }
    }
    debug!(count = records.len(), "listed registry records");
    Ok(())
}
