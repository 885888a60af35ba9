//! Version oracle capability and the implementations shipped with the crate

use crate::error::VersionError;
use crate::normalize::canonical_name;
use crate::version::Version;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Reports which versions of a package exist.
///
/// Production implementations query a registry; they are injected by the
/// caller, never discovered.
#[async_trait]
pub trait VersionOracle: Send + Sync {
    /// All published versions of `package` (canonical name). Unknown packages
    /// have no versions; errors mean the oracle could not answer.
    async fn available_versions(&self, package: &str) -> Result<Vec<Version>>;

    fn name(&self) -> &str;
}

/// A fixed version table.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    table: BTreeMap<String, Vec<Version>>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, package: &str, versions: Vec<Version>) {
        self.table.insert(canonical_name(package), versions);
    }

    /// Builder-style insert from version strings.
    pub fn with_versions(mut self, package: &str, versions: &[&str]) -> std::result::Result<Self, VersionError> {
        let parsed = versions
            .iter()
            .map(|v| Version::parse(v))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.insert(package, parsed);
        Ok(self)
    }

    pub fn from_table(table: &BTreeMap<String, Vec<String>>) -> std::result::Result<Self, VersionError> {
        let mut oracle = StaticOracle::new();
        for (package, versions) in table {
            let parsed = versions
                .iter()
                .map(|v| Version::parse(v))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            oracle.insert(package, parsed);
        }
        Ok(oracle)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[async_trait]
impl VersionOracle for StaticOracle {
    async fn available_versions(&self, package: &str) -> Result<Vec<Version>> {
        Ok(self
            .table
            .get(&canonical_name(package))
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Memoizes successful answers of another oracle per package.
pub struct CachingOracle<O> {
    inner: O,
    entries: DashMap<String, Vec<Version>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
}

impl<O: VersionOracle> CachingOracle<O> {
    pub fn new(inner: O) -> Self {
        CachingOracle {
            inner,
            entries: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl<O: VersionOracle> VersionOracle for CachingOracle<O> {
    async fn available_versions(&self, package: &str) -> Result<Vec<Version>> {
        let key = canonical_name(package);
        if let Some(cached) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let versions = self.inner.available_versions(&key).await?;
        debug!("Caching {} versions of {} from {}", versions.len(), key, self.inner.name());
        self.entries.insert(key, versions.clone());
        Ok(versions)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
