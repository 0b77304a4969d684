//! Catalog path layout, partition discovery, the partition-key mapping sidecar,
//! and the processed-raw-files ledger.

mod sanitize;

pub use sanitize::sanitize_key;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::fs::{Filesystem, LocalFs};

const MAPPINGS_FILE: &str = "_partition_mappings.json";
const COMMON_METADATA_FILE: &str = "_common_metadata.json";
const METADATA_FILE: &str = "_metadata.json";
const PROCESSED_FILE: &str = ".processed_raw_files.json";
const PARTITION_METADATA_FILE: &str = "_partition_metadata.json";

/// The single-file, unpartitioned table name instruments live under.
pub const INSTRUMENT_TYPE_NAME: &str = "instrument";

/// `{ column: { sanitized_key: original_key } }`, the inverse mapping sidecar
/// written alongside each table so sanitized partition keys can be reversed
/// when a query asks for decoded records.
pub type Mappings = BTreeMap<String, BTreeMap<String, String>>;

/// `{ partition: { "price_precision": "2", "size_precision": "0" } }`, the
/// per-partition precision sidecar a query consults instead of assuming a
/// catalog-wide default.
pub type PartitionMetadata = BTreeMap<String, BTreeMap<String, String>>;

/// The root of a market-data catalog: a directory tree of per-type Parquet
/// datasets plus the sidecar files that make partition sanitization reversible.
#[derive(Clone)]
pub struct Catalog {
    root: PathBuf,
    fs: Arc<dyn Filesystem>,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl Catalog {
    /// Opens a catalog rooted at `root`, backed by `fs`.
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            root: root.into(),
            fs,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Opens a local-disk catalog rooted at `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::new(LocalFs))
    }

    /// Opens a catalog at the path named by the `NAUTILUS_CATALOG` environment
    /// variable.
    pub fn from_env() -> Result<Self> {
        let root = std::env::var("NAUTILUS_CATALOG")
            .map_err(|_| Error::NotFound("NAUTILUS_CATALOG is not set".to_string()))?;
        Ok(Self::local(root))
    }

    /// The catalog's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The backing filesystem.
    pub fn fs(&self) -> &dyn Filesystem {
        self.fs.as_ref()
    }

    /// The dataset directory for `type_name`, e.g. `<root>/data/quote_tick.parquet`.
    pub fn make_path(&self, type_name: &str) -> PathBuf {
        self.root.join("data").join(format!("{type_name}.parquet"))
    }

    /// The single unpartitioned file the instrument table lives in, unlike
    /// every other table which partitions by `instrument_id=<key>`.
    pub fn instrument_table_file(&self) -> PathBuf {
        self.make_path(INSTRUMENT_TYPE_NAME).join("instrument.parquet")
    }

    /// Returns the process-wide mutex guarding `key`, creating it on first use.
    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Runs `f` while holding the write lock for `type_name`'s `partition`,
    /// serializing concurrent writers against the same partition's files.
    pub fn with_partition_lock<T>(
        &self,
        type_name: &str,
        partition: &str,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let lock = self.lock_for(&format!("partition:{type_name}:{partition}"));
        let _guard = lock.lock().unwrap();
        f()
    }

    /// Runs `f` while holding the write lock for `type_name`'s sidecar files
    /// (mappings, partition metadata), serializing concurrent read-modify-write
    /// updates to them.
    pub fn with_sidecar_lock<T>(&self, type_name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.lock_for(&format!("sidecar:{type_name}"));
        let _guard = lock.lock().unwrap();
        f()
    }

    /// Lists every record type with at least one dataset directory under the catalog.
    pub fn list_data_types(&self) -> Result<Vec<String>> {
        let data_dir = self.root.join("data");
        if !self.fs.exists(&data_dir)? {
            return Ok(Vec::new());
        }
        let mut types: Vec<String> = self
            .fs
            .ls(&data_dir)?
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?;
                name.strip_suffix(".parquet").map(str::to_string)
            })
            .collect();
        types.sort();
        Ok(types)
    }

    /// Lists the partition directory names (e.g. `instrument_id=ES.XCME`) under
    /// `type_name`'s dataset.
    pub fn list_partitions(&self, type_name: &str) -> Result<Vec<String>> {
        let dataset = self.make_path(type_name);
        if !self.fs.exists(&dataset)? {
            return Ok(Vec::new());
        }
        let mut partitions: Vec<String> = self
            .fs
            .ls(&dataset)?
            .into_iter()
            .filter(|path| self.fs.is_dir(path).unwrap_or(false))
            .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
            .collect();
        partitions.sort();
        Ok(partitions)
    }

    /// Lists the data files within one partition, sorted by name (and therefore
    /// by their `{start_ts}-{end_ts}` filename prefix).
    pub fn list_partition_files(&self, type_name: &str, partition: &str) -> Result<Vec<PathBuf>> {
        let dir = self.make_path(type_name).join(partition);
        if !self.fs.exists(&dir)? {
            return Ok(Vec::new());
        }
        let mut files = self.fs.ls(&dir)?;
        files.retain(|p| p.extension().and_then(|e| e.to_str()) == Some("parquet"));
        files.sort();
        Ok(files)
    }

    /// Loads the sanitized-key -> original-key mapping sidecar for `type_name`,
    /// or an empty mapping if none has been written yet.
    pub fn load_mappings(&self, type_name: &str) -> Result<Mappings> {
        let path = self.make_path(type_name).join(MAPPINGS_FILE);
        if !self.fs.exists(&path)? {
            return Ok(Mappings::new());
        }
        let bytes = self.fs.read(&path)?;
        serde_json::from_slice(&bytes).map_err(|e| Error::corrupt_partition(path, e.to_string()))
    }

    /// Atomically replaces the mapping sidecar for `type_name`.
    pub fn write_mappings(&self, type_name: &str, mappings: &Mappings) -> Result<()> {
        let dir = self.make_path(type_name);
        let path = dir.join(MAPPINGS_FILE);
        let tmp = dir.join(format!("{MAPPINGS_FILE}.tmp"));
        let bytes = serde_json::to_vec_pretty(mappings)
            .map_err(|e| Error::corrupt_partition(path.clone(), e.to_string()))?;
        self.fs.write(&tmp, &bytes)?;
        self.fs.rename(&tmp, &path)
    }

    /// Merges `column -> (sanitized, original)` into the existing mapping
    /// sidecar and writes it back atomically.
    pub fn merge_mapping(&self, type_name: &str, column: &str, sanitized: &str, original: &str) -> Result<()> {
        self.with_sidecar_lock(type_name, || {
            let mut mappings = self.load_mappings(type_name)?;
            mappings
                .entry(column.to_string())
                .or_default()
                .insert(sanitized.to_string(), original.to_string());
            self.write_mappings(type_name, &mappings)
        })
    }

    /// Loads the per-partition precision sidecar for `type_name`, or an empty
    /// map if none has been written yet.
    pub fn load_partition_metadata(&self, type_name: &str) -> Result<PartitionMetadata> {
        let path = self.make_path(type_name).join(PARTITION_METADATA_FILE);
        if !self.fs.exists(&path)? {
            return Ok(PartitionMetadata::new());
        }
        let bytes = self.fs.read(&path)?;
        serde_json::from_slice(&bytes).map_err(|e| Error::corrupt_partition(path, e.to_string()))
    }

    /// Atomically replaces the partition-precision sidecar for `type_name`.
    pub fn write_partition_metadata(&self, type_name: &str, metadata: &PartitionMetadata) -> Result<()> {
        let dir = self.make_path(type_name);
        let path = dir.join(PARTITION_METADATA_FILE);
        let tmp = dir.join(format!("{PARTITION_METADATA_FILE}.tmp"));
        let bytes = serde_json::to_vec_pretty(metadata)
            .map_err(|e| Error::corrupt_partition(path.clone(), e.to_string()))?;
        self.fs.write(&tmp, &bytes)?;
        self.fs.rename(&tmp, &path)
    }

    /// Records `partition`'s price/size precision, merging into the existing
    /// sidecar and writing it back atomically.
    pub fn merge_partition_metadata(
        &self,
        type_name: &str,
        partition: &str,
        price_precision: u8,
        size_precision: u8,
    ) -> Result<()> {
        self.with_sidecar_lock(type_name, || {
            let mut metadata = self.load_partition_metadata(type_name)?;
            let entry = metadata.entry(partition.to_string()).or_default();
            entry.insert("price_precision".to_string(), price_precision.to_string());
            entry.insert("size_precision".to_string(), size_precision.to_string());
            self.write_partition_metadata(type_name, &metadata)
        })
    }

    /// Returns `partition`'s recorded price/size precision, or `None` per
    /// field if the sidecar has no entry (or no readable value) for it yet.
    pub fn partition_precision(&self, type_name: &str, partition: &str) -> Result<(Option<u8>, Option<u8>)> {
        let metadata = self.load_partition_metadata(type_name)?;
        let entry = metadata.get(partition);
        let price = entry.and_then(|m| m.get("price_precision")).and_then(|v| v.parse().ok());
        let size = entry.and_then(|m| m.get("size_precision")).and_then(|v| v.parse().ok());
        Ok((price, size))
    }

    /// Loads the `_common_metadata.json` sidecar for `type_name`, or an empty map.
    pub fn load_common_metadata(&self, type_name: &str) -> Result<BTreeMap<String, String>> {
        let path = self.make_path(type_name).join(COMMON_METADATA_FILE);
        if !self.fs.exists(&path)? {
            return Ok(BTreeMap::new());
        }
        let bytes = self.fs.read(&path)?;
        serde_json::from_slice(&bytes).map_err(|e| Error::corrupt_partition(path, e.to_string()))
    }

    /// Atomically writes `_common_metadata.json` for `type_name`.
    pub fn write_common_metadata(&self, type_name: &str, metadata: &BTreeMap<String, String>) -> Result<()> {
        let dir = self.make_path(type_name);
        let path = dir.join(COMMON_METADATA_FILE);
        let tmp = dir.join(format!("{COMMON_METADATA_FILE}.tmp"));
        let bytes = serde_json::to_vec_pretty(metadata)
            .map_err(|e| Error::corrupt_partition(path.clone(), e.to_string()))?;
        self.fs.write(&tmp, &bytes)?;
        self.fs.rename(&tmp, &path)
    }

    /// Writes a minimal `_metadata.json` recording the dataset's schema fields,
    /// analogous to a Parquet dataset's combined footer summary.
    pub fn write_metadata_summary(&self, type_name: &str, field_names: &[&str]) -> Result<()> {
        let dir = self.make_path(type_name);
        let path = dir.join(METADATA_FILE);
        let bytes = serde_json::to_vec_pretty(&field_names)
            .map_err(|e| Error::corrupt_partition(path.clone(), e.to_string()))?;
        self.fs.write(&path, &bytes)
    }

    /// The set of raw source files already fully ingested, per the
    /// `.processed_raw_files.json` ledger at the catalog root.
    pub fn processed_files(&self) -> Result<BTreeSet<PathBuf>> {
        let path = self.root.join(PROCESSED_FILE);
        if !self.fs.exists(&path)? {
            return Ok(BTreeSet::new());
        }
        let bytes = self.fs.read(&path)?;
        let paths: Vec<PathBuf> =
            serde_json::from_slice(&bytes).map_err(|e| Error::corrupt_partition(path, e.to_string()))?;
        Ok(paths.into_iter().collect())
    }

    /// Records `path` as fully ingested. Safe to call repeatedly; the ledger
    /// stays sorted and de-duplicated.
    pub fn mark_processed(&self, path: &Path) -> Result<()> {
        let mut processed = self.processed_files()?;
        processed.insert(path.to_path_buf());
        let ledger_path = self.root.join(PROCESSED_FILE);
        let tmp = self.root.join(format!("{PROCESSED_FILE}.tmp"));
        let sorted: Vec<&PathBuf> = processed.iter().collect();
        let bytes = serde_json::to_vec_pretty(&sorted)
            .map_err(|e| Error::corrupt_partition(ledger_path.clone(), e.to_string()))?;
        self.fs.write(&tmp, &bytes)?;
        self.fs.rename(&tmp, &ledger_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;

    fn catalog() -> Catalog {
        Catalog::new("/catalog", Arc::new(MemFs::new()))
    }

    #[test]
    fn make_path_matches_the_documented_layout() {
        let cat = catalog();
        assert_eq!(
            cat.make_path("quote_tick"),
            PathBuf::from("/catalog/data/quote_tick.parquet")
        );
    }

    #[test]
    fn mappings_round_trip_through_write_and_load() {
        let cat = catalog();
        cat.merge_mapping("trade_tick", "instrument_id", "ES_XCME", "ES.XCME").unwrap();
        let mappings = cat.load_mappings("trade_tick").unwrap();
        assert_eq!(
            mappings.get("instrument_id").and_then(|m| m.get("ES_XCME")),
            Some(&"ES.XCME".to_string())
        );
    }

    #[test]
    fn processed_files_ledger_is_idempotent() {
        let cat = catalog();
        cat.mark_processed(Path::new("/raw/2024-01-01.csv")).unwrap();
        cat.mark_processed(Path::new("/raw/2024-01-01.csv")).unwrap();
        let processed = cat.processed_files().unwrap();
        assert_eq!(processed.len(), 1);
    }

    #[test]
    fn list_data_types_reflects_written_datasets() {
        let cat = catalog();
        cat.fs()
            .write(&cat.make_path("quote_tick").join("_metadata.json"), b"{}")
            .unwrap();
        assert_eq!(cat.list_data_types().unwrap(), vec!["quote_tick".to_string()]);
    }
}
