//! Crewline CLI: run YAML-defined agent workflows against an
//! OpenAI-compatible completion API.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crewline_cli::commands;
use crewline_cli::commands::run::RunOptions;

/// Crewline CLI: sequential multi-agent workflows
#[derive(Parser)]
#[command(name = "crewline", version, about = "Crewline CLI: sequential multi-agent workflows")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more workflow YAML files, in order
    Run {
        /// Workflow definition files
        #[arg(required = true)]
        files: Vec<String>,

        /// Directory to write each workflow's final output to
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Print each workflow's final output
        #[arg(short, long)]
        verbose: bool,

        /// Answer every task locally without calling the API
        #[arg(long)]
        dry_run: bool,

        /// Give each workflow the final outputs of the ones before it
        #[arg(long)]
        chain: bool,

        /// Model ID (overrides CREWLINE_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// API base URL (overrides OPENAI_BASE_URL)
        #[arg(long)]
        base_url: Option<String>,

        /// API key (overrides OPENAI_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Validate a workflow YAML file without executing it
    Validate {
        /// Workflow definition file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Before tracing init so RUST_LOG from .env is honored.
    let env_files = commands::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crewline_core=info,crewline_cli=info".into()),
        )
        .init();

    commands::log_dotenv(&env_files);

    let result = match cli.command {
        Commands::Run {
            files,
            out_dir,
            verbose,
            dry_run,
            chain,
            model,
            base_url,
            api_key,
        } => {
            let options = RunOptions {
                out_dir,
                verbose,
                dry_run,
                chain,
                model,
                base_url,
                api_key,
            };
            commands::run::run(&files, &options).await
        }
        Commands::Validate { file } => commands::validate::validate(&file).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
