mod commands;
mod scan;
mod display;

use clap::Parser;
use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "posture")]
#[command(about = "HTTPS posture checks and CVE prioritization", long_about = None)]
struct Cli {
    #[arg(short, long, global = true, help = "Path to a YAML config file")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Log debug output to stderr")]
    verbose: bool,

    #[arg(long, global = true, env = "POSTURE_NVD_API_KEY", hide_env_values = true, help = "NVD API key")]
    nvd_api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
enum Commands {
    #[command(about = "Check hosts for HTTPS and certificate trust")]
    Hosts(commands::Hosts),

    #[command(about = "Prioritize CVEs by CVSS, EPSS and CISA KEV")]
    Prioritize(commands::Prioritize),

    #[command(about = "Find and prioritize CVEs affecting a technology")]
    Technology(commands::Technology),

    #[command(about = "Prioritize CVEs found in a saved nmap vulners scan")]
    Network(commands::Network),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = scan::Settings::load(cli.config.as_deref(), cli.nvd_api_key)?;

    match cli.command {
        Commands::Hosts(cmd) => cmd.run(&settings).await?,
        Commands::Prioritize(cmd) => cmd.run(&settings).await?,
        Commands::Technology(cmd) => cmd.run(&settings).await?,
        Commands::Network(cmd) => cmd.run(&settings).await?,
    }

    Ok(())
}
