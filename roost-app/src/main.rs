use anyhow::Result;
use clap::Parser;
use roost_common::observability::{init_logging, LogConfig};
use roost_config::{RoostConfig, RoostConfigLoader};
use std::path::PathBuf;

mod tether;

#[derive(Parser, Debug)]
#[command(name = "roost", about = "Batch browser-session manager")]
struct Cli {
    /// Configuration file (YAML). Env vars prefixed ROOST_ override it.
    #[arg(long, default_value = "roost.yaml")]
    config: PathBuf,

    /// Write a starter roster CSV to the given path and exit.
    #[arg(long, value_name = "PATH")]
    create_sample_roster: Option<PathBuf>,

    /// Run browsers headless regardless of the configured value.
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = cli.create_sample_roster {
        roost_batch::Roster::write_sample(&path)?;
        println!("Sample roster written to {}", path.display());
        return Ok(());
    }

    let mut cfg: RoostConfig = RoostConfigLoader::new()
        .with_file(&cli.config)
        .load()?;
    if cli.headless {
        cfg.browser.headless = true;
    }

    // Logging goes to files only; stderr would fight the TUI for the terminal.
    init_logging(LogConfig::default())?;

    std::fs::create_dir_all(&cfg.browser.profiles_dir)?;

    tether::build_and_run(cfg).await
}
