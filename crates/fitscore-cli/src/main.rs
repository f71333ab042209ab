use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod analyze;
mod catalog_check;

#[derive(Debug, Parser)]
#[command(name = "fitscore")]
#[command(about = "Partnership-fit analysis for social-media profiles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the analysis pipeline for one subject and print the result.
    Analyze(analyze::AnalyzeArgs),
    /// Load and validate the model catalog file, then exit.
    CatalogCheck,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => analyze::run(args).await,
        Commands::CatalogCheck => catalog_check::run(),
    }
}
