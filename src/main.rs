// ============================================================================
// File: src/main.rs
// Entry point and CLI handling
// ============================================================================

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use ram_tracker::backend::{self, GenerativeBackend};
use ram_tracker::config::LoggingConfig;
use ram_tracker::markdown::DealReport;
use ram_tracker::{
    Capacity, ChatClient, Config, DealAggregator, ExtractionClient, Filter, Generation, OfferList,
    RetailerCatalog, RetailerScope, SendOutcome, Speed, TipClient, Transcript,
};

/// Command-line arguments for the deal tracker
#[derive(Parser, Debug)]
#[command(name = "ram-tracker")]
#[command(about = "Find the lowest RAM prices across retailers", long_about = None)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan retailers for deals matching the given specs
    Scan(ScanArgs),
    /// Print a one-line RAM buying tip
    Tip,
    /// Chat with the RAM assistant
    Chat,
}

#[derive(clap::Args, Debug)]
struct ScanArgs {
    /// Kit capacity: 8GB, 16GB, 32GB or 64GB
    #[arg(long, default_value = "32GB")]
    capacity: Capacity,

    /// Memory generation: DDR4 or DDR5
    #[arg(long, default_value = "DDR5")]
    generation: Generation,

    /// Speed such as 6000MHz (defaults to the generation's usual speed)
    #[arg(long)]
    speed: Option<Speed>,

    /// Retailer id from the config, or "all"
    #[arg(long, default_value = "all")]
    retailer: RetailerScope,

    /// Write a Markdown deal report to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the offers as JSON instead of a listing
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    init_tracing(&config.logging, args.verbose);
    tracing::debug!(?config, "configuration loaded");

    let backend = backend::connect(&config);

    match args.command {
        Command::Scan(scan) => run_scan(&config, backend, scan).await,
        Command::Tip => {
            let tip = TipClient::new(backend, config.models.tip.clone()).get_tip().await;
            println!("{} {} {}", "⚡".yellow(), "AI Insight:".bright_blue().bold(), tip);
            Ok(())
        }
        Command::Chat => run_chat(&config, backend).await,
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&logging.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
}

async fn run_scan(config: &Config, backend: Arc<dyn GenerativeBackend>, args: ScanArgs) -> Result<()> {
    let mut filter = Filter::default()
        .with_capacity(args.capacity)
        .with_generation(args.generation)
        .with_scope(args.retailer);
    if let Some(speed) = args.speed {
        filter = filter.with_speed(speed)?;
    }

    let extractor = ExtractionClient::new(
        backend,
        config.models.extraction.clone(),
        config.offer_policy(),
    );
    let aggregator = DealAggregator::new(RetailerCatalog::new(config.retailers.clone()), extractor);

    let spinner = create_spinner(aggregator.catalog().scanning_banner(filter.scope()));
    let result = aggregator.scan(&filter).await;
    spinner.finish_and_clear();

    let offers = result.map_err(|e| anyhow!("Unable to fetch real-time data: {}", e))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&offers)?);
    } else {
        print_offers(&filter, aggregator.catalog(), &offers);
    }

    if let Some(path) = args.output {
        let retailers = aggregator.catalog().resolve(filter.scope())?;
        DealReport::new(&filter, &retailers, &offers).export(&path)?;
        println!(
            "\n{} Report exported to: {}",
            "✓".green().bold(),
            path.display().to_string().bright_cyan()
        );
    }

    Ok(())
}

fn print_offers(filter: &Filter, catalog: &RetailerCatalog, offers: &OfferList) {
    let heading = match filter.scope() {
        RetailerScope::All => "Found Deals".to_string(),
        RetailerScope::Only(id) => {
            let label = catalog.get(id).map(|r| r.label.as_str()).unwrap_or(id.as_str());
            format!("{} Deals", label)
        }
    };

    println!(
        "\n{} {}",
        heading.bright_white().bold(),
        format!("({})", filter.describe()).bright_black()
    );
    println!("{}", "─".repeat(40).bright_black());

    if offers.is_empty() {
        println!("{}", "No deals found for this configuration.".yellow());
        println!("{}", "Try changing the filters or the retailer selection.".bright_black());
        return;
    }

    for (i, offer) in offers.iter().enumerate() {
        let badge = if i == 0 {
            format!(" {}", "Best Value".black().on_green().bold())
        } else {
            String::new()
        };
        println!(
            "\n{} {}{}",
            format!("{:>2}.", i + 1).bright_black(),
            offer.title().bright_white(),
            badge
        );
        println!(
            "    {} {}  {}",
            format!("${:.2}", offer.price()).green().bold(),
            format!("[{}]", offer.retailer()).cyan(),
            offer.url().bright_black()
        );
    }

    let count = offers.len();
    println!(
        "\n{} {} result{} found",
        "ℹ".blue().bold(),
        count.to_string().bright_yellow(),
        if count == 1 { "" } else { "s" }
    );
}

async fn run_chat(config: &Config, backend: Arc<dyn GenerativeBackend>) -> Result<()> {
    let chat = ChatClient::new(backend, config.models.chat.clone());
    let session = chat.create_session();
    let mut transcript = Transcript::with_welcome();

    if let Some(welcome) = transcript.last() {
        println!("{} {}", "assistant ›".cyan().bold(), welcome.text());
    }
    println!("{}", "(type 'exit' to quit)".bright_black());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n{} ", "you ›".green().bold());
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        print!("{} ", "assistant ›".cyan().bold());
        io::stdout().flush()?;

        let outcome = transcript
            .send(&session, line, |fragment| {
                print!("{}", fragment);
                let _ = io::stdout().flush();
            })
            .await;

        if outcome == SendOutcome::Failed {
            if let Some(apology) = transcript.last() {
                println!("\n{}", apology.text().red());
            }
        } else {
            println!();
        }
    }

    Ok(())
}

fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner
}
