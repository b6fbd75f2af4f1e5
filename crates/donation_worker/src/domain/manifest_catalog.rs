use common::domain::{ManifestCatalog, SearchPattern};

/// Manifest catalog backed by a fixed list of supported ecosystems
#[derive(Debug, Clone)]
pub struct StaticManifestCatalog {
    patterns: Vec<SearchPattern>,
}

impl StaticManifestCatalog {
    pub fn new(patterns: Vec<SearchPattern>) -> Self {
        Self { patterns }
    }
}

impl Default for StaticManifestCatalog {
    fn default() -> Self {
        Self::new(vec![
            pattern("javascript", "npm", &["package.json"]),
            pattern("ruby", "rubygems", &["Gemfile", "gems.rb"]),
            pattern("php", "packagist", &["composer.json"]),
            pattern("python", "pypi", &["requirements.txt", "Pipfile", "pyproject.toml"]),
            pattern("rust", "crates", &["Cargo.toml"]),
            pattern("go", "gomodules", &["go.mod"]),
        ])
    }
}

fn pattern(language: &str, registry: &str, manifests: &[&str]) -> SearchPattern {
    SearchPattern {
        language: language.to_string(),
        registry: registry.to_string(),
        patterns: manifests.iter().map(|m| m.to_string()).collect(),
    }
}

impl ManifestCatalog for StaticManifestCatalog {
    fn supported_manifest_patterns(&self) -> Vec<SearchPattern> {
        self.patterns.clone()
    }
}
