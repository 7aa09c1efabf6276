use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// One picture shown to the participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimulusItem {
    pub id: usize,
    /// Lowercase, trimmed word the participant is expected to say.
    pub canonical_name: String,
    pub asset_ref: String,
}

/// Raw catalog row as stored on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub name: String,
    pub asset_path: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("stimulus catalog is empty")]
    Empty,
    #[error("stimulus {index} has a blank name")]
    BlankName { index: usize },
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Ordered list of stimuli, identical for every phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StimulusCatalog {
    items: Vec<StimulusItem>,
}

impl StimulusCatalog {
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        let items = entries
            .into_iter()
            .enumerate()
            .map(|(id, entry)| {
                let canonical_name = entry.name.trim().to_lowercase();
                if canonical_name.is_empty() {
                    return Err(CatalogError::BlankName { index: id });
                }
                Ok(StimulusItem {
                    id,
                    canonical_name,
                    asset_ref: entry.asset_path,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { items })
    }

    /// Builds a catalog from bare names, using the name as the asset reference.
    pub fn from_names<I, S>(names: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = names
            .into_iter()
            .map(|name| {
                let name = name.into();
                CatalogEntry {
                    asset_path: format!("{}.png", name.trim().to_lowercase()),
                    name,
                }
            })
            .collect();
        Self::from_entries(entries)
    }

    /// Parses a JSON array of `{ "name": .., "assetPath": .. }` objects.
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(raw)?;
        Self::from_entries(entries)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StimulusItem> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[StimulusItem] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &StimulusItem> {
        self.items.iter()
    }

    /// Trials per session: every stimulus once per phase.
    pub fn session_trials(&self) -> usize {
        self.items.len() * crate::EyePhase::ALL.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_lowercased() {
        let catalog = StimulusCatalog::from_json_str(
            r#"[{"name": "  Cat ", "assetPath": "img/cat.png"}, {"name": "DOG", "assetPath": "img/dog.png"}]"#,
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(0).unwrap().canonical_name, "cat");
        assert_eq!(catalog.get(1).unwrap().canonical_name, "dog");
        assert_eq!(catalog.get(1).unwrap().asset_ref, "img/dog.png");
        assert_eq!(catalog.session_trials(), 6);
    }

    #[test]
    fn empty_and_blank_catalogs_are_rejected() {
        assert!(matches!(
            StimulusCatalog::from_names(Vec::<String>::new()),
            Err(CatalogError::Empty)
        ));
        assert!(matches!(
            StimulusCatalog::from_names(["cat", "   "]),
            Err(CatalogError::BlankName { index: 1 })
        ));
    }
}
