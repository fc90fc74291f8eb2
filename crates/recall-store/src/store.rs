//! RocksDB-backed durable vector store.
//!
//! Two column families: `records` holds full records keyed by external
//! id (big-endian u64, so iteration is id-ordered), `unprocessed` is a
//! key-only secondary index over records still awaiting an index merge.
//! Every mutation touches both families in one write batch.

use std::path::Path;

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::record::PersistedRecord;

/// Column family holding full records keyed by external id.
pub const CF_RECORDS: &str = "records";
/// Key-only column family indexing records with `processed = false`.
pub const CF_UNPROCESSED: &str = "unprocessed";

/// Durable store for embedded vectors.
///
/// All methods take `&self`; RocksDB serializes concurrent writers
/// internally, so the background worker can upsert while another
/// thread reads counts.
pub struct DurableStore {
    db: DB,
}

impl DurableStore {
    /// Open the store at the given path, creating it if necessary.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_RECORDS, Options::default()),
            ColumnFamilyDescriptor::new(CF_UNPROCESSED, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        info!(path = ?path, "Opened durable store");
        Ok(Self { db })
    }

    fn records_cf(&self) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(CF_RECORDS)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(CF_RECORDS.to_string()))
    }

    fn unprocessed_cf(&self) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(CF_UNPROCESSED)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(CF_UNPROCESSED.to_string()))
    }

    /// Insert or replace a record.
    ///
    /// The record and its unprocessed-index entry are written in one
    /// atomic batch; a reader never sees them disagree.
    pub fn upsert(&self, record: &PersistedRecord) -> Result<(), StoreError> {
        let key = record.external_id.to_be_bytes();
        let value =
            serde_json::to_vec(record).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut batch = WriteBatch::default();
        batch.put_cf(self.records_cf()?, key, value);
        if record.processed {
            batch.delete_cf(self.unprocessed_cf()?, key);
        } else {
            batch.put_cf(self.unprocessed_cf()?, key, []);
        }
        self.db.write(batch)?;

        debug!(
            external_id = record.external_id,
            processed = record.processed,
            "Upserted record"
        );
        Ok(())
    }

    /// Get a record by external id.
    pub fn get(&self, external_id: u64) -> Result<Option<PersistedRecord>, StoreError> {
        let key = external_id.to_be_bytes();
        match self.db.get_cf(self.records_cf()?, key)? {
            Some(bytes) => {
                let record: PersistedRecord = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Flip a record to `processed = true`. Returns false for an
    /// unknown id. Flipping an already-processed record is a no-op.
    pub fn mark_processed(&self, external_id: u64) -> Result<bool, StoreError> {
        let Some(mut record) = self.get(external_id)? else {
            return Ok(false);
        };
        if !record.processed {
            record.processed = true;
            self.upsert(&record)?;
        }
        Ok(true)
    }

    /// Records still awaiting an index merge, in id order.
    pub fn list_unprocessed(&self) -> Result<Vec<PersistedRecord>, StoreError> {
        let mut records = Vec::new();
        for item in self.db.iterator_cf(self.unprocessed_cf()?, IteratorMode::Start) {
            let (key, _) = item?;
            let id = decode_key(&key)?;
            if let Some(record) = self.get(id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// All records, in id order. Used when the index snapshot is lost
    /// and the index must be regenerated from the store.
    pub fn list_all(&self) -> Result<Vec<PersistedRecord>, StoreError> {
        let mut records = Vec::new();
        for item in self.db.iterator_cf(self.records_cf()?, IteratorMode::Start) {
            let (_, value) = item?;
            let record: PersistedRecord = serde_json::from_slice(&value)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }

    /// Delete a record and its unprocessed-index entry.
    ///
    /// Used when an explicit remove supersedes the record.
    pub fn delete(&self, external_id: u64) -> Result<(), StoreError> {
        let key = external_id.to_be_bytes();
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.records_cf()?, key);
        batch.delete_cf(self.unprocessed_cf()?, key);
        self.db.write(batch)?;

        debug!(external_id = external_id, "Deleted record");
        Ok(())
    }

    /// Count all records.
    pub fn count(&self) -> Result<usize, StoreError> {
        Ok(self
            .db
            .iterator_cf(self.records_cf()?, IteratorMode::Start)
            .count())
    }

    /// Count records awaiting an index merge.
    pub fn count_unprocessed(&self) -> Result<usize, StoreError> {
        Ok(self
            .db
            .iterator_cf(self.unprocessed_cf()?, IteratorMode::Start)
            .count())
    }

    /// Count records merged into the live index.
    pub fn count_processed(&self) -> Result<usize, StoreError> {
        Ok(self.count()?.saturating_sub(self.count_unprocessed()?))
    }
}

fn decode_key(key: &[u8]) -> Result<u64, StoreError> {
    let bytes: [u8; 8] = key
        .get(..8)
        .and_then(|k| k.try_into().ok())
        .ok_or(StoreError::CorruptKey)?;
    Ok(u64::from_be_bytes(bytes))
}
