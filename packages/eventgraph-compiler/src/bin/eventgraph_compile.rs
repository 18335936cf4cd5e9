//! EventGraph Compile CLI
//!
//! # Usage
//!
//! ```bash
//! # Compile one era/sample to JSON
//! eventgraph-compile compile --analysis analysis.yaml --era 2018 --sample dy --scopes mm,ee
//!
//! # Compile every era/sample combination into a directory
//! eventgraph-compile batch --analysis analysis.yaml --eras 2017,2018 --samples data,dy --scopes mm -o out/
//! ```
//!
//! Logging follows `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use eventgraph_compiler::batch::{compile_batch, jobs};
use eventgraph_compiler::config::{AnalysisDocument, CompileContext, ShiftSelection};
use eventgraph_compiler::pipeline::CompileOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eventgraph-compile")]
#[command(about = "Compile a declarative analysis into per-scope, per-variant configurations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one era/sample
    Compile {
        /// Analysis document (YAML v1)
        #[arg(short, long)]
        analysis: PathBuf,

        #[arg(long)]
        era: String,

        #[arg(long)]
        sample: String,

        /// Comma-separated scopes
        #[arg(long, value_delimiter = ',')]
        scopes: Vec<String>,

        /// `all`, `none`, or comma-separated shift names
        #[arg(long, default_value = "all")]
        shifts: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip split point computation
        #[arg(long)]
        no_optimize: bool,

        /// Pretty-print JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Compile every era/sample combination in parallel
    Batch {
        #[arg(short, long)]
        analysis: PathBuf,

        #[arg(long, value_delimiter = ',')]
        eras: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        samples: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        scopes: Vec<String>,

        #[arg(long, default_value = "all")]
        shifts: String,

        /// Output directory; one `<era>_<sample>.json` per job
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Compile {
            analysis,
            era,
            sample,
            scopes,
            shifts,
            output,
            no_optimize,
            pretty,
        } => {
            let context = CompileContext::new(era, sample, scopes).shifts(ShiftSelection::from_str(&shifts));
            let options = CompileOptions {
                optimize: !no_optimize,
            };
            run_compile(&analysis, context, options, output.as_deref(), pretty)
        }
        Commands::Batch {
            analysis,
            eras,
            samples,
            scopes,
            shifts,
            output,
        } => {
            let base = CompileContext::new("", "", scopes).shifts(ShiftSelection::from_str(&shifts));
            run_batch(&analysis, base, &eras, &samples, &output)
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_compile(
    analysis: &Path,
    context: CompileContext,
    options: CompileOptions,
    output: Option<&Path>,
    pretty: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let document = AnalysisDocument::from_yaml_file(analysis)?;
    let mut config = document.configure(context, options)?;
    config.finalize()?;
    let artifact = config.expanded_configuration()?;

    let json = if pretty {
        artifact.to_json_pretty()?
    } else {
        artifact.to_json()?
    };
    match output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{}", json),
    }
    Ok(true)
}

fn run_batch(
    analysis: &Path,
    base: CompileContext,
    eras: &[String],
    samples: &[String],
    output: &Path,
) -> Result<bool, Box<dyn std::error::Error>> {
    let document = AnalysisDocument::from_yaml_file(analysis)?;
    std::fs::create_dir_all(output)?;

    let results = compile_batch(&document, &base, &jobs(eras, samples), CompileOptions::default());
    let mut all_ok = true;
    for result in results {
        match result.result {
            Ok(artifact) => {
                let path = output.join(format!("{}_{}.json", result.era, result.sample));
                std::fs::write(&path, artifact.to_json_pretty()?)?;
                println!("✅ {} / {} -> {}", result.era, result.sample, path.display());
            }
            Err(e) => {
                all_ok = false;
                eprintln!("❌ {} / {}: {}", result.era, result.sample, e);
            }
        }
    }
    Ok(all_ok)
}
