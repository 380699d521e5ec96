use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use sysinfo::{Pid, System};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use deals_scraper::browser::{HtmlSnapshot, WebDriverBrowser};
use deals_scraper::collector::{self, CollectReport};
use deals_scraper::config::{AppSettings, DEFAULT_CONFIG_PATH};
use deals_scraper::normalizer;
use deals_scraper::notify::Notifier;
use deals_scraper::report;

#[derive(Parser)]
#[command(name = "deals_scraper", about = "Scrape, clean and summarize a deals page")]
struct Cli {
    /// Settings file (TOML); missing keys fall back to defaults
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scroll the deals page, extract listings, append them to the raw file
    Collect {
        /// Replay a saved page instead of driving a live browser
        #[arg(long, value_name = "FILE")]
        from_html: Option<PathBuf>,
    },
    /// Rebuild the cleaned file from the raw file
    Normalize,
    /// Print aggregate views of the cleaned file and save them as JSON
    Report,
    /// Collect, normalize and report in one go
    Run,
}

async fn run_collect(
    settings: &AppSettings,
    from_html: Option<&Path>,
    notifier: &Notifier,
) -> anyhow::Result<CollectReport> {
    let report = match from_html {
        Some(path) => {
            let mut browser = HtmlSnapshot::from_file(path)?;
            collector::collect(&mut browser, settings).await?
        }
        None => {
            let mut browser = WebDriverBrowser::connect(settings).await?;
            collector::collect(&mut browser, settings).await?
        }
    };

    let summary = report.stats.summary();
    println!("{summary}");
    notifier.send(summary).await;
    Ok(report)
}

async fn run_normalize(settings: &AppSettings, notifier: &Notifier) -> anyhow::Result<()> {
    let stats = normalizer::normalize(
        Path::new(&settings.raw_csv_path),
        Path::new(&settings.cleaned_csv_path),
    )?;
    let summary = format!(
        "Cleaned {} rows into {} ({} original prices backfilled, {} unparseable prices)",
        stats.rows,
        settings.cleaned_csv_path,
        stats.original_price_backfilled,
        stats.price_unparseable
    );
    println!("{summary}");
    notifier.send(summary).await;
    Ok(())
}

fn run_report(settings: &AppSettings) -> anyhow::Result<()> {
    let views = report::report(Path::new(&settings.cleaned_csv_path))?;
    print!("{}", report::render_text(&views));
    report::write_json(&views, Path::new(&settings.report_json_path))?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let cli = Cli::parse();

    let settings = match AppSettings::load(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load config file: {}. Using default settings.", e);
            AppSettings::default()
        }
    };

    let start = Instant::now();
    let notifier = Notifier::from_settings(&settings);

    match cli.command {
        Commands::Collect { from_html } => {
            let notifier = if from_html.is_some() {
                Notifier::disabled()
            } else {
                notifier
            };
            run_collect(&settings, from_html.as_deref(), &notifier).await?;
        }
        Commands::Normalize => run_normalize(&settings, &notifier).await?,
        Commands::Report => run_report(&settings)?,
        Commands::Run => {
            run_collect(&settings, None, &notifier).await?;
            run_normalize(&settings, &notifier).await?;
            run_report(&settings)?;
        }
    }

    let mut sys = System::new_all();
    sys.refresh_processes();
    let memory = sys
        .process(Pid::from(std::process::id() as usize))
        .map_or(0, |process| process.memory());

    tracing::info!(
        total_duration = ?start.elapsed(),
        memory_mb = memory as f64 / (1024.0 * 1024.0),
        "Pipeline finished"
    );
    Ok(())
}
