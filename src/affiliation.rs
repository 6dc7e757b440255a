use crate::error::{PulseError, Result};
use crate::model::UNKNOWN;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Resolves a contributor identifier to the organization they are credited to.
///
/// Resolution is total: a contributor without an entry maps to [`UNKNOWN`].
pub trait AffiliationLookup {
    fn affiliation_of(&self, contributor: &str) -> &str;
}

#[derive(Debug, Clone, Default)]
pub struct AffiliationTable {
    entries: HashMap<String, String>,
}

impl AffiliationTable {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Load a JSON object of `contributor -> affiliation` from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            PulseError::Config(format!(
                "Cannot read affiliation file {}: {e}",
                path.display()
            ))
        })?;
        let table = Self::from_json(&raw)?;
        debug!(path = %path.display(), entries = table.len(), "loaded affiliation table");
        Ok(table)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let entries: HashMap<String, String> = serde_json::from_str(raw)?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AffiliationLookup for AffiliationTable {
    fn affiliation_of(&self, contributor: &str) -> &str {
        self.entries
            .get(contributor)
            .map(String::as_str)
            .unwrap_or(UNKNOWN)
    }
}

impl FromIterator<(String, String)> for AffiliationTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
