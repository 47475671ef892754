//! Storage backends holding one pair package document per exchange date.

use chrono::NaiveDate;
use dashmap::DashMap;
use forexsync_common::PairPackage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Raw document access keyed by exchange date.
///
/// Implementations only load and overwrite whole documents; reconciliation
/// lives in [`crate::RateStore`].
pub trait RateRepository: Send + Sync {
    /// Load the document for a date.
    fn load(&self, exchange_date: NaiveDate) -> StoreResult<Option<PairPackage>>;

    /// Insert or overwrite the document for the package's date.
    fn save(&self, package: &PairPackage) -> StoreResult<()>;
}

/// Repository kept in memory.
#[derive(Default)]
pub struct InMemoryRateRepository {
    documents: DashMap<NaiveDate, PairPackage>,
}

impl InMemoryRateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl RateRepository for InMemoryRateRepository {
    fn load(&self, exchange_date: NaiveDate) -> StoreResult<Option<PairPackage>> {
        Ok(self.documents.get(&exchange_date).map(|doc| doc.clone()))
    }

    fn save(&self, package: &PairPackage) -> StoreResult<()> {
        self.documents
            .insert(package.exchange_date(), package.clone());
        Ok(())
    }
}

/// Repository writing one JSON document per date under a directory.
pub struct JsonFileRateRepository {
    dir: PathBuf,
}

impl JsonFileRateRepository {
    /// Open (and create if needed) the directory holding the documents.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, exchange_date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}.json", exchange_date.format("%Y-%m-%d")))
    }
}

impl RateRepository for JsonFileRateRepository {
    fn load(&self, exchange_date: NaiveDate) -> StoreResult<Option<PairPackage>> {
        let path = self.path_for(exchange_date);
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path)?;
        let package = serde_json::from_str(&raw)
            .map_err(|e| StoreError::corrupt(path.display().to_string(), e))?;
        Ok(Some(package))
    }

    fn save(&self, package: &PairPackage) -> StoreResult<()> {
        let path = self.path_for(package.exchange_date());
        let raw = serde_json::to_string_pretty(package)
            .map_err(|e| StoreError::corrupt(path.display().to_string(), e))?;

        // Write then rename so readers never see a half-written document.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &path)?;

        debug!(path = %path.display(), "Document written");
        Ok(())
    }
}
