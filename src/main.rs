use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use ci_compose::CiEnvironment;
use ci_compose::blueprint::Blueprint;
use ci_compose::validation::validate_blueprint;
use clap::{Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_tracing()?;

    match cli.command {
        Commands::Render {
            blueprint,
            output,
            format,
        } => render(blueprint, output, format),
        Commands::Validate { blueprint } => validate(blueprint),
        Commands::Stages { blueprint } => list_stages(blueprint),
    }
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))?;
    Ok(())
}

fn render(blueprint_path: PathBuf, output: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let blueprint = Blueprint::load(&blueprint_path)?;
    let pipeline = blueprint
        .build_pipeline()
        .with_context(|| format!("Invalid blueprint: {}", blueprint_path.display()))?;
    let env = CiEnvironment::from_env();
    let rendered = match format {
        OutputFormat::Yaml => pipeline.to_yaml_with(&env)?,
        OutputFormat::Json => pipeline.to_json_with(&env)?,
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
            fs::write(&path, rendered)
                .with_context(|| format!("Failed to write pipeline: {}", path.display()))?;
            info!(output = %path.display(), "Pipeline written");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn validate(blueprint_path: PathBuf) -> Result<()> {
    let blueprint = Blueprint::load(&blueprint_path)?;
    let report = validate_blueprint(&blueprint);
    for warning in &report.warnings {
        warn!(file = %blueprint_path.display(), "{warning}");
    }
    if !report.is_ok() {
        for error in &report.errors {
            eprintln!("error: {error}");
        }
        bail!(
            "Blueprint validation failed with {} error(s)",
            report.errors.len()
        );
    }

    // References are sound; rendering surfaces naming conflicts and cycles.
    let pipeline = blueprint.build_pipeline()?;
    pipeline
        .render_with(&CiEnvironment::default())
        .with_context(|| format!("Failed to render blueprint: {}", blueprint_path.display()))?;
    info!(file = %blueprint_path.display(), "Blueprint validation passed");
    Ok(())
}

fn list_stages(blueprint_path: PathBuf) -> Result<()> {
    let blueprint = Blueprint::load(&blueprint_path)?;
    let pipeline = blueprint.build_pipeline()?;
    let jobs = pipeline.populated_jobs(pipeline.root())?;

    let mut stages: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for job in &jobs {
        stages.entry(job.stage()).or_default().push(job.name());
    }
    for (stage, names) in stages {
        println!("{stage}");
        for name in names {
            println!("  {name}");
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Parser)]
#[command(
    name = "ci-compose",
    version,
    about = "Render CI pipelines from nested job sequences"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a blueprint and print or write the pipeline document.
    Render {
        blueprint: PathBuf,
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
    Validate {
        blueprint: PathBuf,
    },
    /// List resolved jobs grouped by stage in execution order.
    Stages {
        blueprint: PathBuf,
    },
}
