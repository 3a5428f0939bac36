use crate::domain::approval::ApprovalRecord;
use crate::domain::config::ProjectApprovalConfig;
use crate::domain::payment::{Payment, PaymentId, ProjectId};
use crate::domain::ports::{ApprovalConfigStore, ApprovalStore, PaymentStore, StatusUpdate};
use crate::error::{ApprovalError, Result};
use crate::infrastructure::in_memory::apply_update;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing payment records.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for storing approval records.
pub const CF_APPROVALS: &str = "approvals";
/// Column Family for storing per-project approval configuration.
pub const CF_APPROVAL_CONFIG: &str = "approval_config";

/// A persistent store implementation using RocksDB.
///
/// Payments, approval records and project configuration live in separate
/// Column Families. Approval keys are the big-endian payment id followed by
/// the normalized approver e-mail, so one payment's ledger is a key prefix
/// and the `(payment, approver)` pair is unique by construction.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    /// Serializes read-compare-write of payment status.
    cas_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_PAYMENTS, CF_APPROVALS, CF_APPROVAL_CONFIG]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            cas_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            ApprovalError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key, encode(value)?)?;
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        ApprovalError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Serialization error: {}", e),
        )))
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        ApprovalError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

fn approval_key(record: &ApprovalRecord) -> Vec<u8> {
    let mut key = record.payment_id.to_be_bytes().to_vec();
    key.extend_from_slice(record.approver_email.as_str().as_bytes());
    key
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        self.put_json(CF_PAYMENTS, &payment.id.to_be_bytes(), &payment)
    }

    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, &payment_id.to_be_bytes())
    }

    async fn get_all(&self) -> Result<Vec<Payment>> {
        let cf = self.cf(CF_PAYMENTS)?;
        let mut payments = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            payments.push(decode::<Payment>(&value)?);
        }
        Ok(payments)
    }

    async fn compare_and_set_status(
        &self,
        update: StatusUpdate,
        expected_version: u64,
    ) -> Result<u64> {
        let _guard = self.cas_lock.lock().await;

        let key = update.payment_id.to_be_bytes();
        let mut payment: Payment = self
            .get_json(CF_PAYMENTS, &key)?
            .ok_or_else(|| ApprovalError::NotFound(format!("payment {}", update.payment_id)))?;

        if payment.version != expected_version {
            return Err(ApprovalError::Conflict(update.payment_id));
        }

        apply_update(&mut payment, update);
        self.put_json(CF_PAYMENTS, &key, &payment)?;
        Ok(payment.version)
    }
}

#[async_trait]
impl ApprovalStore for RocksDBStore {
    async fn upsert(&self, record: ApprovalRecord) -> Result<()> {
        self.put_json(CF_APPROVALS, &approval_key(&record), &record)
    }

    async fn list(&self, payment_id: PaymentId) -> Result<Vec<ApprovalRecord>> {
        let cf = self.cf(CF_APPROVALS)?;
        let prefix = payment_id.to_be_bytes();
        let mut records = Vec::new();

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            records.push(decode::<ApprovalRecord>(&value)?);
        }
        Ok(records)
    }

    async fn clear(&self, payment_id: PaymentId) -> Result<()> {
        let records = ApprovalStore::list(self, payment_id).await?;
        let cf = self.cf(CF_APPROVALS)?;
        for record in records {
            self.db.delete_cf(cf, approval_key(&record))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ApprovalConfigStore for RocksDBStore {
    async fn get(&self, project: ProjectId) -> Result<Option<ProjectApprovalConfig>> {
        self.get_json(CF_APPROVAL_CONFIG, &project.to_be_bytes())
    }

    async fn put(&self, config: ProjectApprovalConfig) -> Result<()> {
        self.put_json(CF_APPROVAL_CONFIG, &config.project.to_be_bytes(), &config)
    }
}
