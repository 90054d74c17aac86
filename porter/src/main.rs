#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use porter_core::{CheckedModule, PorterConfig, assemble_program, run_pipeline};

mod report;

use report::{AnalysisReport, write_json};

#[derive(Parser, Debug)]
#[command(name = "porter", version, about = "Middle-end passes for checked specification modules")]
struct Cli {
    /// More log output (repeatable). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (defaults to `porter.toml` when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Assemble a checked module, run every pass and print the analysis report
    Analyze {
        /// Checked module as JSON
        module: PathBuf,

        /// Target backend; overrides the configured one
        #[arg(long)]
        target: Option<String>,

        /// Include quantifier iteration plans in the report
        #[arg(long)]
        plans: bool,

        /// Also write the rewritten program as JSON
        #[arg(long)]
        emit_program: Option<PathBuf>,

        /// Write the report here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List targets with a splice table
    Targets,
}

const DEFAULT_CONFIG: &str = "porter.toml";

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> miette::Result<PorterConfig> {
    match path {
        Some(path) => PorterConfig::from_file(path),
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            debug!(path = DEFAULT_CONFIG, "using configuration from working directory");
            PorterConfig::from_file(Path::new(DEFAULT_CONFIG))
        }
        None => Ok(PorterConfig::default()),
    }
}

fn analyze(
    config: &PorterConfig,
    module_path: &Path,
    plans: bool,
    emit_program: Option<&Path>,
    out: Option<&Path>,
) -> miette::Result<()> {
    let text = std::fs::read_to_string(module_path).into_diagnostic()?;
    let module = CheckedModule::from_json(&text).into_diagnostic()?;
    let program = assemble_program(&module, config.max_depth)?;
    let analysis = run_pipeline(program, config)?;

    let mut report = AnalysisReport::new(module_path, &config.target, &analysis);
    if plans {
        report = report.with_plans(analysis.quantifier_plans()?);
    }

    if let Some(path) = emit_program {
        write_json(&analysis.program, path)?;
        info!(path = %path.display(), "wrote rewritten program");
    }

    match out {
        Some(path) => write_json(&report, path)?,
        None => println!("{}", report.to_json()?),
    }
    Ok(())
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Cmd::Analyze {
            module,
            target,
            plans,
            emit_program,
            out,
        } => {
            if let Some(target) = target {
                config.target = target;
            }
            analyze(
                &config,
                &module,
                plans,
                emit_program.as_deref(),
                out.as_deref(),
            )
        }
        Cmd::Targets => {
            for name in config.target_names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}
