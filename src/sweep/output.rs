use crate::models::{ListingRecord, SummaryRow};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Results CSV header, in output order
pub const RESULT_COLUMNS: [&str; 14] = [
    "listing_id",
    "titulo",
    "precio_noche",
    "precio_noche_mxn",
    "precio_total_aprox",
    "precio_total_aprox_mxn",
    "rating",
    "reviews",
    "tipo_lugar",
    "superhost",
    "ubicacion",
    "url",
    "city",
    "colonia",
];

/// Create the parent directory of `path` if it has one
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {} for appending", path.display()))
}

/// Append-only newline-delimited JSON log
pub struct JsonLines {
    file: File,
    path: PathBuf,
}

impl JsonLines {
    pub fn open_append(path: &Path) -> Result<Self> {
        Ok(Self {
            file: open_append(path)?,
            path: path.to_path_buf(),
        })
    }

    /// Serialize `value` as one line and write it through immediately
    pub fn append<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let mut line = serde_json::to_vec(value).context("Failed to serialize log line")?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .with_context(|| format!("Failed to write to {}", self.path.display()))
    }
}

#[derive(Serialize)]
struct ResultRow<'a> {
    listing_id: &'a str,
    titulo: Option<&'a str>,
    precio_noche: Option<&'a str>,
    precio_noche_mxn: Option<u64>,
    precio_total_aprox: Option<&'a str>,
    precio_total_aprox_mxn: Option<u64>,
    rating: Option<f64>,
    reviews: Option<u32>,
    tipo_lugar: Option<&'a str>,
    superhost: bool,
    ubicacion: Option<&'a str>,
    url: &'a str,
    city: &'a str,
    colonia: &'a str,
}

impl<'a> ResultRow<'a> {
    fn new(record: &'a ListingRecord) -> Self {
        let region = record.region.as_ref();
        Self {
            listing_id: &record.listing_id,
            titulo: record.title.as_deref(),
            precio_noche: record.price_per_night_text.as_deref(),
            precio_noche_mxn: record.price_per_night_amount,
            precio_total_aprox: record.approx_total_price_text.as_deref(),
            precio_total_aprox_mxn: record.approx_total_price_amount,
            rating: record.rating,
            reviews: record.review_count,
            tipo_lugar: record.place_type.as_deref(),
            superhost: record.is_superhost,
            ubicacion: record.location_text.as_deref(),
            url: &record.url,
            city: region.map(|r| r.city.as_str()).unwrap_or(""),
            colonia: region.map(|r| r.colonia.as_str()).unwrap_or(""),
        }
    }
}

/// Appendable results CSV. The header is written only when the file is new
/// or empty; every row is flushed as soon as it is written.
pub struct ResultsWriter {
    writer: csv::Writer<File>,
}

impl ResultsWriter {
    pub fn open_append(path: &Path) -> Result<Self> {
        let is_empty = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = open_append(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_empty {
            writer
                .write_record(RESULT_COLUMNS)
                .context("Failed to write results header")?;
            writer.flush()?;
        }

        Ok(Self { writer })
    }

    /// Append one row; city and colonia come from the record's region
    pub fn write(&mut self, record: &ListingRecord) -> Result<()> {
        self.writer
            .serialize(ResultRow::new(record))
            .with_context(|| format!("Failed to write row for listing {}", record.listing_id))?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Listing ids already present in a results CSV. A missing file has none.
pub fn read_existing_ids(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let Some(idx) = reader.headers()?.iter().position(|h| h == "listing_id") else {
        return Ok(HashSet::new());
    };

    let mut ids = HashSet::new();
    for row in reader.records() {
        let Ok(row) = row else { continue };
        if let Some(id) = row.get(idx).filter(|id| !id.is_empty()) {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}

/// Rewrite the summary CSV in full
pub fn write_summary(path: &Path, rows: &[SummaryRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
