use anyhow::Result;
use clap::Parser;
use combo_check::{
    config::RunConfig,
    check::{Engine, HttpAuthenticator, ProxyScheme, ProxySet, SinkPaths},
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// A combo list checker with proxy rotation and multi-threading support
#[derive(Parser)]
#[command(name = "combo-check")]
#[command(about = "A combo list checker with proxy rotation and multi-threading support")]
struct Cli {
    /// JSON config file; command-line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short = 'n', long)]
    threads: Option<usize>,

    /// Authentication endpoint URL
    #[arg(long)]
    target: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Combo list file, one identifier:secret pair per line
    #[arg(long)]
    combos: Option<PathBuf>,

    /// Proxy list file, one endpoint per line
    #[arg(long)]
    proxies: Option<PathBuf>,

    /// Scheme for proxy lines given without one (http, https, socks4, socks5)
    #[arg(long, default_value = "http")]
    proxy_scheme: ProxyScheme,

    /// Output file for accepted pairs
    #[arg(long)]
    accepted: Option<PathBuf>,

    /// Output file for challenge-required pairs
    #[arg(long)]
    challenge: Option<PathBuf>,

    /// Output file for rejected pairs
    #[arg(long)]
    rejected: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };

        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(target) = self.target {
            config.target_url = target;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(combos) = self.combos {
            config.combos = combos;
        }
        if let Some(proxies) = self.proxies {
            config.proxies = proxies;
        }
        if let Some(accepted) = self.accepted {
            config.accepted = accepted;
        }
        if let Some(challenge) = self.challenge {
            config.challenge = challenge;
        }
        if let Some(rejected) = self.rejected {
            config.rejected = rejected;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let proxy_scheme = cli.proxy_scheme;
    let config = cli.into_config()?;

    let proxies = ProxySet::load(&config.proxies, proxy_scheme).await?;
    println!("Loaded {} proxies from {:?}", proxies.len(), config.proxies);
    println!(
        "Checking with {} threads, timeout: {}s",
        config.threads, config.timeout_secs
    );
    println!("Target: {}", config.target_url);
    println!();

    let authenticator = HttpAuthenticator::from_config(&config)?;
    let engine = Engine::new(config.threads, proxies, authenticator);
    let report = engine.run(&config.combos, &SinkPaths::from(&config)).await?;

    println!(
        "Results: {} accepted, {} challenge, {} rejected ({} combos, {} attempts)",
        report.accepted, report.challenged, report.rejected, report.combos, report.attempts
    );
    if report.skipped_lines > 0 {
        println!("Skipped {} malformed combo lines", report.skipped_lines);
    }

    Ok(())
}
