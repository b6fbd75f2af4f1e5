use crate::domain::RegistryKey;
use serde::{Deserialize, Serialize};

/// A supported (language, registry) pair and the manifest file patterns resolved for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPattern {
    pub language: String,
    pub registry: String,
    pub patterns: Vec<String>,
}

impl SearchPattern {
    pub fn key(&self) -> RegistryKey {
        RegistryKey::new(self.language.clone(), self.registry.clone())
    }
}

/// Enumerates the (language, registry) pairs weight maps are produced for
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait ManifestCatalog: Send + Sync {
    fn supported_manifest_patterns(&self) -> Vec<SearchPattern>;
}
