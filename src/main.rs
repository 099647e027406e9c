use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use offerscrape::{
    config::ScraperConfig, response::ScrapeResponse, server, ScrapeMode, ScrapeService,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "offerscrape", version, about = "Scrape product offers from a listing page into CSV")]
struct Cli {
    /// Configuration file (TOML). OFFERSCRAPE_* environment variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape one page and write the CSV
    Scrape {
        /// The listing page to scrape
        url: String,
        /// Write the CSV here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Use the page renderer and CSS selectors instead of pattern matching
        #[arg(long)]
        rendered: bool,
    },
    /// Serve the web form and the scrape API
    Serve {
        /// Address to bind, overriding the configured one
        #[arg(long)]
        bind: Option<String>,
    },
}

/// The main entry point of the application.
///
/// Initializes logging, loads the configuration and runs the requested subcommand.
#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ScraperConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Scrape {
            url,
            output,
            rendered,
        } => {
            let mode = if rendered {
                ScrapeMode::Rendered
            } else {
                ScrapeMode::Pattern
            };
            scrape(config, &url, output, mode).await
        }
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.bind_addr.clone());
            server::serve(ScrapeService::new(config)?, &bind).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn scrape(
    config: ScraperConfig,
    url: &str,
    output: Option<PathBuf>,
    mode: ScrapeMode,
) -> anyhow::Result<ExitCode> {
    let service = ScrapeService::new(config)?;
    let start_time = Instant::now();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Scraping {}...", url));

    let result = service.scrape(url, mode).await;
    let response = ScrapeResponse::from_result(result, url, service.config());

    spinner.finish_and_clear();

    match &output {
        Some(path) => std::fs::write(path, &response.body)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(response.body.as_bytes())?;
            if !response.body.ends_with('\n') {
                writeln!(stdout)?;
            }
        }
    }

    let destination = output
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stdout".to_string());

    if response.is_offers() {
        info!(
            "Wrote {} offers to {} in {:.2?}",
            response.offers,
            destination,
            start_time.elapsed()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        error!(
            "No offers extracted ({}, {}); details written to {}",
            response.status,
            response.filename.as_deref().unwrap_or("json"),
            destination
        );
        Ok(ExitCode::FAILURE)
    }
}
