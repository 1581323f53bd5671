use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use faultline_core::{load_tickets, FaultlineConfig, OutputFormat};
use faultline_dataset::indexer::assign_ticket_versions;
use faultline_dataset::pipeline::{generate, write_outputs, GenerationInput};
use faultline_dataset::proportion::{estimate_proportion, proportion_samples};
use faultline_dataset::source::JsonMethodSource;
use faultline_history::releases::{releases_from_tags, timeline_of};

mod attribution;

use attribution::GitFixAttribution;

const CONFIG_FILE: &str = ".faultline.toml";

#[derive(Parser)]
#[command(
    name = "faultline",
    version,
    about = "Build method-level defect-prediction datasets",
    long_about = "Faultline labels every method of every analyzed release as buggy or clean.\n\n\
                   Releases come from git tags, defects from a tracker export, and method\n\
                   metrics from per-release JSON snapshots.\n\n\
                   Examples:\n  \
                     faultline init                     Write a template .faultline.toml\n  \
                     faultline generate                 Build the dataset from .faultline.toml\n  \
                     faultline generate --cutoff 0.75   Analyze the oldest 75% of releases\n  \
                     faultline proportion               Show the estimated proportion"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .faultline.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format for command summaries
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the labeled dataset
    #[command(long_about = "Generate the labeled dataset.\n\n\
        Indexes tickets against the tag timeline, links fixes to commits, estimates\n\
        missing introduction versions, labels methods and drops low-variance columns.\n\n\
        Examples:\n  faultline generate\n  faultline generate --cutoff 0.5 --output out/avro")]
    Generate {
        /// Fraction of releases to analyze, oldest first (overrides config)
        #[arg(long)]
        cutoff: Option<f64>,

        /// Output base path; each format appends its extension (overrides config)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the proportion coefficient estimated from ticket history
    Proportion,
    /// Create a default .faultline.toml configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# Faultline Configuration

[project]
# name = "project"
# repo = "."
# tickets = "tickets.json"
# metrics_dir = "metrics"

[dataset]
# cutoff_fraction = 0.5
# output = "dataset"
# formats = ["csv", "arff"]
"#;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProportionSummary {
    project: String,
    tickets: usize,
    samples: usize,
    proportion: f64,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<FaultlineConfig> {
    let config = match path {
        Some(path) => FaultlineConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                FaultlineConfig::from_file(default_path)?
            } else {
                FaultlineConfig::default()
            }
        }
    };
    Ok(config)
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Generate { cutoff, output } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(cutoff) = cutoff {
                config.dataset.cutoff_fraction = cutoff;
            }
            if let Some(output) = output {
                config.dataset.output = output;
            }
            config.validate()?;
            run_generate(&config, cli.format)?;
        }
        Command::Proportion => {
            let config = load_config(cli.config.as_deref())?;
            config.validate()?;
            run_proportion(&config, cli.format)?;
        }
        Command::Init => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
    }

    Ok(())
}

fn run_generate(config: &FaultlineConfig, format: OutputFormat) -> Result<()> {
    let project = &config.project;
    let tagged = releases_from_tags(&project.repo).map_err(|e| e.for_project(&project.name))?;
    let timeline = timeline_of(&tagged).map_err(|e| e.for_project(&project.name))?;
    let tickets = load_tickets(&project.tickets).map_err(|e| e.for_project(&project.name))?;

    let input = GenerationInput {
        project: project.name.clone(),
        timeline,
        tickets,
        cutoff_fraction: config.dataset.cutoff_fraction,
    };
    let mut attribution = GitFixAttribution::new(&project.repo, &tagged);
    let mut source = JsonMethodSource::new(&project.metrics_dir);
    let generation = generate(input, &mut attribution, &mut source)?;
    let written = write_outputs(&generation, &config.dataset.output, &config.dataset.formats)?;

    let report = &generation.report;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).into_diagnostic()?);
        }
        OutputFormat::Text => {
            println!(
                "{}: {} rows ({} buggy), {} columns",
                report.project,
                generation.table.len(),
                report.assembly.buggy_rows,
                report.columns
            );
            println!(
                "Releases: {} of {} analyzed",
                report.assembly.releases_analyzed, report.assembly.releases_total
            );
            println!(
                "Proportion: {:.2} from {} tickets ({} introductions estimated)",
                report.proportion, report.proportion_samples, report.estimated_introductions
            );
            if !report.dropped_columns.is_empty() {
                println!("Dropped columns: {}", report.dropped_columns.join(", "));
            }
            for path in &written {
                println!("Wrote {}", path.display());
            }
        }
    }
    Ok(())
}

fn run_proportion(config: &FaultlineConfig, format: OutputFormat) -> Result<()> {
    let project = &config.project;
    let tagged = releases_from_tags(&project.repo).map_err(|e| e.for_project(&project.name))?;
    let timeline = timeline_of(&tagged).map_err(|e| e.for_project(&project.name))?;
    let mut tickets = load_tickets(&project.tickets).map_err(|e| e.for_project(&project.name))?;
    assign_ticket_versions(&mut tickets, &timeline);

    let summary = ProportionSummary {
        project: project.name.clone(),
        tickets: tickets.len(),
        samples: proportion_samples(&tickets).len(),
        proportion: estimate_proportion(&tickets),
    };
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        }
        OutputFormat::Text => {
            println!(
                "{}: proportion {:.2} from {} of {} tickets",
                summary.project, summary.proportion, summary.samples, summary.tickets
            );
        }
    }
    Ok(())
}
