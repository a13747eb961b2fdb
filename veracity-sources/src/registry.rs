//! Trusted and problematic source registries.
//!
//! Loaded once (built-in YAML or an override file) and shared read-only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const BUILTIN_REGISTRY: &str = include_str!("../data/registry.yaml");

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("failed to read registry {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid registry YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid registry entry `{domain}`: {reason}")]
    Invalid { domain: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    News,
    Academic,
    Government,
    Organization,
    FactChecking,
    FakeNews,
    Conspiracy,
    Satire,
    Other,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Academic => "academic",
            Self::Government => "government",
            Self::Organization => "organization",
            Self::FactChecking => "fact_checking",
            Self::FakeNews => "fake_news",
            Self::Conspiracy => "conspiracy",
            Self::Satire => "satire",
            Self::Other => "other",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::News => "Zpravodajský zdroj",
            Self::Academic => "Akademický zdroj",
            Self::Government => "Vládní zdroj",
            Self::Organization => "Organizace",
            Self::FactChecking => "Fact-checkingová organizace",
            Self::FakeNews => "Zdroj dezinformací",
            Self::Conspiracy => "Konspirační zdroj",
            Self::Satire => "Satirický zdroj",
            Self::Other => "Ostatní zdroj",
        }
    }

    /// Guess from the domain alone.
    pub fn from_domain(domain: &str) -> Self {
        if domain.ends_with(".gov") {
            Self::Government
        } else if domain.ends_with(".edu") || domain.ends_with(".ac.uk") {
            Self::Academic
        } else if domain.ends_with(".org") {
            Self::Organization
        } else if domain.contains("news") || domain.contains("zpravy") {
            Self::News
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustedEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default)]
    pub description: String,
    pub reliability: f64,
    pub expertise: f64,
    pub transparency: f64,
    pub independence: f64,
    pub editorial_process: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblematicEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default)]
    pub description: String,
    pub reliability: f64,
    #[serde(default)]
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRegistry {
    #[serde(default)]
    trusted: BTreeMap<String, TrustedEntry>,
    #[serde(default)]
    problematic: BTreeMap<String, ProblematicEntry>,
}

impl SourceRegistry {
    /// The registry compiled into the binary.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_yaml_str(BUILTIN_REGISTRY)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, RegistryError> {
        let mut registry: SourceRegistry = serde_yaml::from_str(yaml)?;
        registry.normalize_keys();
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let registry = Self::from_yaml_str(&yaml)?;
        tracing::info!(
            path = %path.display(),
            trusted = registry.trusted.len(),
            problematic = registry.problematic.len(),
            "sources.registry.loaded"
        );
        Ok(registry)
    }

    /// Built-in registry unless `path` names an override.
    pub fn load(path: Option<&Path>) -> Result<Self, RegistryError> {
        match path {
            Some(p) => Self::from_path(p),
            None => Self::builtin(),
        }
    }

    fn normalize_keys(&mut self) {
        self.trusted = std::mem::take(&mut self.trusted)
            .into_iter()
            .map(|(k, v)| (normalize_domain(&k), v))
            .collect();
        self.problematic = std::mem::take(&mut self.problematic)
            .into_iter()
            .map(|(k, v)| (normalize_domain(&k), v))
            .collect();
    }

    fn validate(&self) -> Result<(), RegistryError> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        for (domain, e) in &self.trusted {
            let scores = [
                e.reliability,
                e.expertise,
                e.transparency,
                e.independence,
                e.editorial_process,
            ];
            if !scores.into_iter().all(in_range) {
                return Err(RegistryError::Invalid {
                    domain: domain.clone(),
                    reason: "factor scores must be within [0, 1]".into(),
                });
            }
        }
        for (domain, e) in &self.problematic {
            if !in_range(e.reliability) {
                return Err(RegistryError::Invalid {
                    domain: domain.clone(),
                    reason: "reliability must be within [0, 1]".into(),
                });
            }
        }
        Ok(())
    }

    /// Entry for `domain` or its closest listed parent domain.
    pub fn trusted(&self, domain: &str) -> Option<(&str, &TrustedEntry)> {
        lookup(&self.trusted, domain)
    }

    pub fn problematic(&self, domain: &str) -> Option<(&str, &ProblematicEntry)> {
        lookup(&self.problematic, domain)
    }

    pub fn trusted_entries(&self) -> impl Iterator<Item = (&str, &TrustedEntry)> {
        self.trusted.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.trusted.len(), self.problematic.len())
    }
}

fn lookup<'a, T>(map: &'a BTreeMap<String, T>, domain: &str) -> Option<(&'a str, &'a T)> {
    let mut candidate = domain;
    loop {
        if let Some((k, v)) = map.get_key_value(candidate) {
            return Some((k.as_str(), v));
        }
        let (_, parent) = candidate.split_once('.')?;
        if !parent.contains('.') {
            return None;
        }
        candidate = parent;
    }
}

/// Lowercase host without a leading `www.`.
pub fn normalize_domain(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}
