use std::fs;
use std::io::BufWriter;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use quotex_rs::adapter;
use quotex_rs::config::PartitionConfig;
use quotex_rs::engine::book::trim_parallel;
use quotex_rs::engine::Side;
use quotex_rs::sim::{JsonLinesFeed, Runner};
use quotex_rs::telemetry;

#[derive(Parser)]
#[command(name = "quotex", version, about = "Expected-volume quoting engine and replay simulator")]
struct Cli {
    /// Default tracing filter when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Serve Prometheus metrics on this address.
    #[arg(long, global = true)]
    metrics: Option<SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute one buy/sell quote for a book, trimmed to the configured depth.
    Quote {
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSON parallel arrays, or `side,rate,quantity` rows for a .csv file.
        #[arg(long)]
        book: PathBuf,
    },
    /// Replay recorded snapshots through the quoter and matching engine.
    Simulate {
        #[arg(long)]
        config: Option<PathBuf>,
        /// One JSON snapshot per line.
        #[arg(long)]
        feed: PathBuf,
        /// Write each fill as a JSON line here.
        #[arg(long)]
        fills: Option<PathBuf>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct BookFile {
    buy_rates: Vec<f64>,
    buy_quantities: Vec<f64>,
    sell_rates: Vec<f64>,
    sell_quantities: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct BookRow {
    side: Side,
    rate: f64,
    quantity: f64,
}

fn load_book(path: &Path) -> anyhow::Result<BookFile> {
    let is_csv = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        return serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut book = BookFile::default();
    for row in reader.deserialize() {
        let row: BookRow = row.with_context(|| format!("parsing {}", path.display()))?;
        match row.side {
            Side::Buy => {
                book.buy_rates.push(row.rate);
                book.buy_quantities.push(row.quantity);
            }
            Side::Sell => {
                book.sell_rates.push(row.rate);
                book.sell_quantities.push(row.quantity);
            }
        }
    }
    Ok(book)
}

/// Quote `book` under `cfg`, trimming each side to the configured depth first
/// so the result matches what `simulate` would quote.
fn quote_book(cfg: &PartitionConfig, mut book: BookFile) -> anyhow::Result<(f64, f64)> {
    if let Some(depth) = cfg.trim_depth() {
        trim_parallel(&mut book.buy_rates, &mut book.buy_quantities, depth);
        trim_parallel(&mut book.sell_rates, &mut book.sell_quantities, depth);
    }
    let sizes = cfg.pdf.sizes();

    let rates = adapter::compute_orders(
        &cfg.engine(),
        cfg.fee_rate,
        cfg.quantity_limit,
        cfg.tick,
        &sizes,
        cfg.pdf.probabilities(),
        &book.buy_rates,
        &book.buy_quantities,
        &book.sell_rates,
        &book.sell_quantities,
    )?;
    Ok(rates)
}

fn quote(config: Option<&Path>, book_path: &Path) -> anyhow::Result<()> {
    let cfg = PartitionConfig::load(config)?;
    let book = load_book(book_path)?;
    let (buy_rate, sell_rate) = quote_book(&cfg, book)?;

    if buy_rate > 0.0 && sell_rate > 0.0 {
        let precision = cfg.rate_precision().max(0) as usize;
        println!("buy {buy_rate:.precision$}  sell {sell_rate:.precision$}");
    } else {
        println!("no quote");
    }
    Ok(())
}

async fn simulate(config: Option<&Path>, feed: PathBuf, fills: Option<PathBuf>) -> anyhow::Result<()> {
    let cfg = PartitionConfig::load(config)?;
    let mut runner = Runner::from_config(cfg)?;
    if let Some(path) = fills {
        let file = fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        info!(path = %path.display(), "Writing fills");
        runner = runner.with_fills_sink(Box::new(BufWriter::new(file)));
    }

    let summary = runner.run(JsonLinesFeed::new(feed)).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_level);
    if let Some(listen) = cli.metrics {
        telemetry::init_metrics(listen)?;
    }

    match cli.command {
        Command::Quote { config, book } => quote(config.as_deref(), &book),
        Command::Simulate { config, feed, fills } => simulate(config.as_deref(), feed, fills).await,
    }
}
