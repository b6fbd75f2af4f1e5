use crate::domain::DomainResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A (language, registry) pair, e.g. ("javascript", "npm")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistryKey {
    pub language: String,
    pub registry: String,
}

impl RegistryKey {
    pub fn new(language: impl Into<String>, registry: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            registry: registry.into(),
        }
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.language, self.registry)
    }
}

/// Package name to fractional weight within a single (language, registry) group.
/// Keeps insertion order; a repeated name keeps its first position and its last weight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageWeightMap {
    entries: Vec<(String, f64)>,
    positions: HashMap<String, usize>,
}

impl PackageWeightMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, weight: f64) {
        let name = name.into();
        match self.positions.get(&name) {
            Some(&position) => self.entries[position].1 = weight,
            None => {
                self.positions.insert(name.clone(), self.entries.len());
                self.entries.push((name, weight));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(name, weight)| (name.as_str(), *weight))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for PackageWeightMap {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut map = PackageWeightMap::new();
        for (name, weight) in iter {
            map.insert(name, weight);
        }
        map
    }
}

/// Weight map for one group, as fetched for a work item
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryWeights {
    pub key: RegistryKey,
    pub weights: PackageWeightMap,
}

/// Whole-millicent amount credited to one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCredit {
    pub name: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributeOrgDonationInput {
    pub organization_id: String,
    pub language: String,
    pub registry: String,
    pub description: String,
    /// Share of the donation dedicated to this (language, registry) group
    pub donation_amount: i64,
    pub credits: Vec<PackageCredit>,
}

/// Repository trait for per-package donation revenue
/// Infrastructure layer (e.g., postgres) implements this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PackageDonationRepository: Send + Sync {
    /// Upsert every credited package by (registry, language, name) and append a revenue entry.
    /// An input without credits is a no-op.
    async fn distribute_org_donation(&self, input: DistributeOrgDonationInput) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_map_keeps_first_position_and_last_weight() {
        let map: PackageWeightMap = vec![("standard", 0.5), ("js-deep-equals", 0.2), ("standard", 0.3)]
            .into_iter()
            .collect();

        let entries: Vec<(&str, f64)> = map.iter().collect();
        assert_eq!(entries, vec![("standard", 0.3), ("js-deep-equals", 0.2)]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_registry_key_display() {
        assert_eq!(RegistryKey::new("javascript", "npm").to_string(), "javascript_npm");
    }
}
