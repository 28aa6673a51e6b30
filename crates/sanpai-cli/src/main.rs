mod crawl;
mod ledger;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sanpai")]
#[command(about = "Crawl municipal industrial-waste reports into a single ledger")]
struct Cli {
    /// Session file (defaults to `SANPAI_SESSION_PATH`)
    #[arg(long, global = true)]
    session: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Where to look for report links. Unset fields fall back to config.
#[derive(Debug, Clone, Default, clap::Args)]
struct TargetArgs {
    /// Listing page URL
    #[arg(long)]
    url: Option<String>,
    /// Filename substring to keep (empty keeps every attachment)
    #[arg(long)]
    keyword: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List attachment links found on the listing page
    Links {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Download and extract unprocessed links in batches
    Crawl {
        #[command(flatten)]
        target: TargetArgs,
        /// Links per batch
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        batch_size: Option<u64>,
        /// Gemini API key, used only when `GEMINI_API_KEY` is unset
        #[arg(long)]
        api_key: Option<String>,
        /// Write the full ledger here when the crawl stops
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Extract records from local files and add them to the history
    Extract {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Gemini API key, used only when `GEMINI_API_KEY` is unset
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Write every extracted record to an xlsx ledger
    Export {
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Check which discovered files produced records
    Audit {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Show session progress
    Status,
    /// Forget processed links, history and failures
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Loads `.env`, then reads the environment.
    let config = sanpai_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let session_path = cli
        .session
        .clone()
        .unwrap_or_else(|| config.session_path.clone());

    match cli.command {
        Some(Commands::Links { target }) => crawl::run_links(&config, &target).await,
        Some(Commands::Crawl {
            target,
            batch_size,
            api_key,
            output,
        }) => {
            let batch_size = batch_size.map(usize::try_from).transpose()?;
            crawl::run_crawl(
                &config,
                &session_path,
                &target,
                batch_size,
                api_key.as_deref(),
                output.as_deref(),
            )
            .await
        }
        Some(Commands::Extract { files, api_key }) => {
            crawl::run_extract(&config, &session_path, &files, api_key.as_deref()).await
        }
        Some(Commands::Export { output }) => ledger::run_export(&session_path, &output),
        Some(Commands::Audit { target }) => ledger::run_audit(&config, &session_path, &target).await,
        Some(Commands::Status) => ledger::run_status(&session_path),
        Some(Commands::Reset) => ledger::run_reset(&session_path),
        None => {
            println!("sanpai: no command given; see `sanpai --help`");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests;
