use crate::models::{Region, RegionKey};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Order in which regions are visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum VisitOrder {
    /// Highest prior sample density first
    Density,
    /// Order of first appearance in the panpoint file
    AsIs,
}

#[derive(Debug, Deserialize)]
struct PanpointRow {
    city: String,
    colonia: String,
    #[serde(default)]
    n_samples: Option<String>,
}

fn sample_count(raw: Option<&str>) -> u64 {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
}

/// Read panpoints from a CSV file, keeping only `cities` when non-empty
pub fn read_regions(path: &Path, cities: &[String]) -> Result<Vec<Region>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open panpoints file {}", path.display()))?;
    regions_from_reader(file, cities)
        .with_context(|| format!("Failed to read panpoints from {}", path.display()))
}

/// Collapse panpoint rows into one region per (city, colonia).
///
/// Density is the sum of `n_samples`; the reported sample count is the
/// maximum. Regions keep the order in which they first appear.
pub fn regions_from_reader<R: Read>(reader: R, cities: &[String]) -> Result<Vec<Region>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut regions: Vec<Region> = Vec::new();
    let mut index: HashMap<RegionKey, usize> = HashMap::new();

    for row in rdr.deserialize::<PanpointRow>() {
        let row = row.context("Malformed panpoint row")?;
        if !cities.is_empty() && !cities.iter().any(|c| c == &row.city) {
            continue;
        }

        let samples = sample_count(row.n_samples.as_deref());
        let key = RegionKey::new(row.city, row.colonia);
        match index.get(&key) {
            Some(&i) => {
                let region = &mut regions[i];
                region.density += samples;
                region.n_samples = region.n_samples.max(samples);
            }
            None => {
                index.insert(key.clone(), regions.len());
                regions.push(Region {
                    key,
                    n_samples: samples,
                    density: samples,
                });
            }
        }
    }

    Ok(regions)
}

/// Arrange regions for visiting. Density ordering is stable, so equal
/// densities keep their input order.
pub fn order_regions(mut regions: Vec<Region>, order: VisitOrder) -> Vec<Region> {
    if order == VisitOrder::Density {
        regions.sort_by(|a, b| b.density.cmp(&a.density));
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    const PANPOINTS: &str = "\
city,colonia,lat,lon,n_samples
gdl,Americana,20.67,-103.37,3
zap,Ciudad Granja,20.68,-103.44,2
gdl,Providencia,20.69,-103.38,5
gdl,Americana,20.671,-103.371,4
zap,Chapalita,20.66,-103.40,
tlq,Centro,20.64,-103.31,9
";

    fn names(regions: &[Region]) -> Vec<&str> {
        regions.iter().map(|r| r.key.colonia.as_str()).collect()
    }

    #[test]
    fn rows_collapse_per_region() {
        let regions = regions_from_reader(PANPOINTS.as_bytes(), &[]).unwrap();
        assert_eq!(
            names(&regions),
            ["Americana", "Ciudad Granja", "Providencia", "Chapalita", "Centro"]
        );
        let americana = &regions[0];
        assert_eq!(americana.density, 7);
        assert_eq!(americana.n_samples, 4);
        assert_eq!(regions[3].density, 1, "missing n_samples counts as one");
    }

    #[test]
    fn city_filter_keeps_listed_cities_only() {
        let cities = vec!["gdl".to_string(), "zap".to_string()];
        let regions = regions_from_reader(PANPOINTS.as_bytes(), &cities).unwrap();
        assert!(regions.iter().all(|r| r.key.city != "tlq"));
        assert_eq!(regions.len(), 4);
    }

    #[test]
    fn density_order_is_descending_and_stable() {
        let csv = "city,colonia,n_samples\ngdl,A,2\ngdl,B,5\ngdl,C,2\ngdl,D,7\n";
        let regions = regions_from_reader(csv.as_bytes(), &[]).unwrap();
        let ordered = order_regions(regions.clone(), VisitOrder::Density);
        assert_eq!(names(&ordered), ["D", "B", "A", "C"]);
        let as_is = order_regions(regions, VisitOrder::AsIs);
        assert_eq!(names(&as_is), ["A", "B", "C", "D"]);
    }

    #[test]
    fn same_colonia_in_two_cities_stays_separate() {
        let csv = "city,colonia,n_samples\ngdl,Centro,1\nzap,Centro,1\n";
        let regions = regions_from_reader(csv.as_bytes(), &[]).unwrap();
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let csv = "city,n_samples\ngdl,1\n";
        assert!(regions_from_reader(csv.as_bytes(), &[]).is_err());
    }
}
