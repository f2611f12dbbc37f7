//! House registry: house number → occupant name, loaded per group.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HouseRegistry {
    houses: BTreeMap<String, String>,
}

impl HouseRegistry {
    /// Load a `{"407": "OCCUPANT NAME", ...}` JSON map.
    pub fn load_json(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading house registry {}", path.display()))?;
        let registry: HouseRegistry = serde_json::from_str(&raw)
            .with_context(|| format!("parsing house registry {}", path.display()))?;
        tracing::info!(houses = registry.len(), path = %path.display(), "loaded house registry");
        Ok(registry)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            houses: pairs
                .into_iter()
                .map(|(k, v)| (k.into().trim().to_string(), v.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.houses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.houses.is_empty()
    }

    pub fn contains(&self, house: &str) -> bool {
        self.houses.contains_key(house.trim())
    }

    pub fn occupant(&self, house: &str) -> Option<&str> {
        self.houses.get(house.trim()).map(String::as_str)
    }

    /// House numbers in numeric order (`"99"` before `"407"`).
    pub fn sorted_numbers(&self) -> Vec<&str> {
        let mut nums: Vec<&str> = self.houses.keys().map(String::as_str).collect();
        nums.sort_by_key(|n| (n.parse::<u64>().unwrap_or(u64::MAX), n.to_string()));
        nums
    }

    /// Reverse lookup: first house whose occupant name appears in `text`
    /// (case-insensitive). Longer names are tried first so "ABEBE KEBEDE"
    /// wins over a bare "ABEBE".
    pub fn find_house_by_name(&self, text: &str) -> Option<&str> {
        let haystack = text.to_uppercase();
        let mut entries: Vec<(&String, &String)> = self
            .houses
            .iter()
            .filter(|(_, name)| name.trim().chars().count() > 3)
            .collect();
        entries.sort_by_key(|(_, name)| std::cmp::Reverse(name.len()));
        entries
            .into_iter()
            .find(|(_, name)| haystack.contains(&name.trim().to_uppercase()))
            .map(|(house, _)| house.as_str())
    }
}
