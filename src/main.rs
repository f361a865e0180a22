mod models;
mod scrapers;
mod sweep;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Parser;
use scrapers::{BrowserCollector, BrowserOptions, CollectOptions, PageCollector, SearchParams};
use std::path::PathBuf;
use std::time::Duration;
use sweep::output::{read_existing_ids, JsonLines};
use sweep::{order_regions, read_regions, run_sweep, DedupSet, SweepOutputs, VisitOrder};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Sweep Airbnb search results colonia by colonia
#[derive(Debug, Parser)]
#[command(name = "airbnb-sweep", version)]
struct Args {
    /// Panpoint CSV with city, colonia and n_samples columns
    #[arg(
        long,
        env = "AIRBNB_SWEEP_PANPOINTS",
        default_value = "data/panpoints/airbnb_panpoints_gdl_zap.csv"
    )]
    panpoints: PathBuf,

    /// City codes to sweep; empty sweeps every city in the panpoint file
    #[arg(long, env = "AIRBNB_SWEEP_CITIES", value_delimiter = ',', default_value = "gdl,zap")]
    cities: Vec<String>,

    #[arg(long, env = "AIRBNB_SWEEP_CHECKIN", default_value = "2025-09-12")]
    checkin: NaiveDate,

    #[arg(long, env = "AIRBNB_SWEEP_CHECKOUT", default_value = "2025-09-16")]
    checkout: NaiveDate,

    #[arg(long, env = "AIRBNB_SWEEP_ADULTS", default_value_t = 2)]
    adults: u32,

    /// Show the browser window
    #[arg(long, env = "AIRBNB_SWEEP_HEADED")]
    headed: bool,

    #[arg(long, env = "AIRBNB_SWEEP_MAX_SCROLLS", default_value_t = 8)]
    max_scrolls: usize,

    /// Scroll rounds without new listings before giving up on a page
    #[arg(long, env = "AIRBNB_SWEEP_PATIENCE", default_value_t = 3)]
    patience: usize,

    #[arg(long, env = "AIRBNB_SWEEP_MAX_LISTINGS", default_value_t = 500)]
    max_listings: usize,

    #[arg(long, env = "AIRBNB_SWEEP_NAV_RETRIES", default_value_t = 3)]
    nav_retries: u32,

    #[arg(long, env = "AIRBNB_SWEEP_NAV_TIMEOUT_SECS", default_value_t = 60)]
    nav_timeout_secs: u64,

    #[arg(long, env = "AIRBNB_SWEEP_ORDER", value_enum, default_value_t = VisitOrder::Density)]
    order: VisitOrder,

    #[arg(long, env = "AIRBNB_SWEEP_OUT_CSV", default_value = "data/out/results.csv")]
    out_csv: PathBuf,

    #[arg(long, env = "AIRBNB_SWEEP_COVERAGE", default_value = "data/coverage/coverage.jsonl")]
    coverage: PathBuf,

    #[arg(long, env = "AIRBNB_SWEEP_SNAPSHOTS", default_value = "data/snapshots/cards.ndjson")]
    snapshots: PathBuf,

    /// Do not write card snapshots
    #[arg(long, env = "AIRBNB_SWEEP_NO_SNAPSHOTS")]
    no_snapshots: bool,

    #[arg(long, env = "AIRBNB_SWEEP_SUMMARY", default_value = "data/out/summary_by_colonia.csv")]
    summary: PathBuf,

    /// Skip listings already present in the results CSV
    #[arg(long, env = "AIRBNB_SWEEP_RESUME")]
    resume: bool,
}

impl Args {
    fn search_params(&self) -> Result<SearchParams> {
        if self.checkout <= self.checkin {
            bail!(
                "checkout {} must be after checkin {}",
                self.checkout,
                self.checkin
            );
        }
        Ok(SearchParams {
            checkin: self.checkin,
            checkout: self.checkout,
            adults: self.adults,
            ..SearchParams::default()
        })
    }

    fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            max_scroll_rounds: self.max_scrolls,
            patience: self.patience,
            max_listings: self.max_listings,
            nav_retries: self.nav_retries,
            nav_timeout: Duration::from_secs(self.nav_timeout_secs),
        }
    }

    fn city_filter(&self) -> Vec<String> {
        self.cities
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let params = args.search_params()?;

    let regions = order_regions(read_regions(&args.panpoints, &args.city_filter())?, args.order);
    info!(
        regions = regions.len(),
        panpoints = %args.panpoints.display(),
        order = ?args.order,
        "Loaded regions"
    );

    let seen = if args.resume {
        let ids = read_existing_ids(&args.out_csv)?;
        info!(existing_ids = ids.len(), "Resuming from existing results");
        DedupSet::with_ids(ids)
    } else {
        DedupSet::new()
    };

    let mut outputs = SweepOutputs::open(&args.out_csv, &args.coverage, &args.summary)?;
    let snapshots = if args.no_snapshots {
        None
    } else {
        sweep::output::ensure_parent_dir(&args.snapshots)?;
        Some(JsonLines::open_append(&args.snapshots)?)
    };

    let page_collector = PageCollector::new(args.collect_options(), &params.base_url)?;
    let browser_options = BrowserOptions {
        headless: !args.headed,
        ..BrowserOptions::default()
    };
    let mut collector = BrowserCollector::launch(browser_options, page_collector, snapshots)?;

    let report = run_sweep(&mut collector, regions, &params, &mut outputs, seen).await?;

    info!(
        total_ids = report.total_ids,
        new_ids = report.new_ids,
        regions = report.summary.len(),
        empty_regions = report.coverage.iter().filter(|c| c.new_ids == 0).count(),
        results = %args.out_csv.display(),
        "Sweep finished"
    );

    Ok(())
}
