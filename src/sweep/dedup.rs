use std::collections::HashSet;

/// Every listing id observed so far in a sweep.
///
/// Owned by the sweep and only grown while merging a region's records.
#[derive(Debug, Default)]
pub struct DedupSet {
    ids: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with ids from an earlier run
    pub fn with_ids(ids: HashSet<String>) -> Self {
        Self { ids }
    }

    /// Record `id`, returning `true` only the first time it is seen.
    /// Empty ids are never accepted.
    pub fn insert_new(&mut self, id: &str) -> bool {
        !id.is_empty() && self.ids.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}
