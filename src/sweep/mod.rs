//! Cross-region sweep: visits every region in turn, keeps each listing
//! only the first time it is seen, and records per-region coverage.

pub mod dedup;
pub mod output;
pub mod regions;
pub mod summary;

pub use dedup::DedupSet;
pub use regions::{order_regions, read_regions, VisitOrder};

use crate::models::{CoverageEvent, ListingRecord, Region, RegionKey, SummaryRow};
use crate::scrapers::traits::RegionCollector;
use crate::scrapers::types::SearchParams;
use anyhow::Result;
use output::{ensure_parent_dir, write_summary, JsonLines, ResultsWriter};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use summary::{round2, RegionStats};
use tracing::{info, warn};

/// Files a sweep writes to
pub struct SweepOutputs {
    results: ResultsWriter,
    coverage: JsonLines,
    summary_path: PathBuf,
}

impl SweepOutputs {
    /// Open the results and coverage files for appending, creating parent
    /// directories as needed
    pub fn open(results: &Path, coverage: &Path, summary: &Path) -> Result<Self> {
        for path in [results, coverage, summary] {
            ensure_parent_dir(path)?;
        }
        Ok(Self {
            results: ResultsWriter::open_append(results)?,
            coverage: JsonLines::open_append(coverage)?,
            summary_path: summary.to_path_buf(),
        })
    }
}

#[derive(Debug)]
pub struct SweepReport {
    /// Size of the dedup set at the end of the run
    pub total_ids: usize,
    /// Ids first seen during this run
    pub new_ids: usize,
    pub coverage: Vec<CoverageEvent>,
    pub summary: Vec<SummaryRow>,
}

/// Context tags attached to snapshot lines for a region
pub fn snapshot_context(key: &RegionKey) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("city".to_string(), key.city.clone()),
        ("colonia".to_string(), key.colonia.clone()),
    ])
}

/// Write the first-seen records of one region and account for them.
///
/// Returns how many records were new to the sweep.
pub fn merge_region(
    records: Vec<ListingRecord>,
    key: &RegionKey,
    seen: &mut DedupSet,
    results: &mut ResultsWriter,
    stats: &mut RegionStats,
) -> Result<usize> {
    let mut new = 0;
    for mut record in records {
        if !seen.insert_new(&record.listing_id) {
            continue;
        }
        record.region = Some(key.clone());
        results.write(&record)?;
        stats.observe(&record);
        new += 1;
    }
    Ok(new)
}

/// Visit `regions` in the given order.
///
/// A region whose collection fails contributes nothing and the sweep moves
/// on. Only an unusable base URL or a failure to write output aborts the run.
pub async fn run_sweep<C>(
    collector: &mut C,
    regions: Vec<Region>,
    params: &SearchParams,
    outputs: &mut SweepOutputs,
    mut seen: DedupSet,
) -> Result<SweepReport>
where
    C: RegionCollector + ?Sized,
{
    info!(regions = regions.len(), seeded_ids = seen.len(), "sweep_start");

    let mut all_stats = Vec::with_capacity(regions.len());
    let mut coverage = Vec::with_capacity(regions.len());

    for region in regions {
        let key = region.key.clone();
        let url = params.search_url(&key)?;
        let context = snapshot_context(&key);
        let started = Instant::now();

        let records = match collector.collect(&url, &context).await {
            Ok(records) => records,
            Err(e) => {
                warn!(region = %key, error = %e, "sweep_error");
                Vec::new()
            }
        };

        let mut stats = RegionStats::new(region);
        let new_ids = merge_region(records, &key, &mut seen, &mut outputs.results, &mut stats)?;

        let elapsed_s = round2(started.elapsed().as_secs_f64());
        stats.elapsed_s += elapsed_s;

        let event = CoverageEvent {
            city: key.city.clone(),
            colonia: key.colonia.clone(),
            new_ids,
            total_ids: seen.len(),
            elapsed_s,
        };
        outputs.coverage.append(&event)?;
        info!(
            city = %key.city,
            colonia = %key.colonia,
            new_ids,
            total_ids = seen.len(),
            elapsed_s,
            "colonia_done"
        );

        coverage.push(event);
        all_stats.push(stats);
    }

    let new_ids: usize = all_stats.iter().map(|s| s.new_ids).sum();
    let summary: Vec<SummaryRow> = all_stats.iter().map(|s| s.summarize(new_ids)).collect();
    write_summary(&outputs.summary_path, &summary)?;

    info!(
        total_ids = seen.len(),
        new_ids,
        summary = %outputs.summary_path.display(),
        "sweep_done"
    );

    Ok(SweepReport {
        total_ids: seen.len(),
        new_ids,
        coverage,
        summary,
    })
}
