//! Storage seam for verification records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

use crate::models::VerificationRecord;
use crate::services::ServiceError;

/// The query shapes the token manager issues against the
/// `(identifier, token, expires)` table. Implementations own their own
/// concurrency control; callers never cache records.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Delete every record filed under `record.identifier`, then insert
    /// `record`, as one atomic unit.
    async fn replace(&self, record: &VerificationRecord) -> Result<(), ServiceError>;

    /// Insert without touching existing records.
    async fn insert(&self, record: &VerificationRecord) -> Result<(), ServiceError>;

    /// Record with exactly this token and `expires > now`.
    async fn find_live_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationRecord>, ServiceError>;

    /// Record filed under exactly `identifier` with this token and
    /// `expires > now`.
    async fn find_live(
        &self,
        identifier: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationRecord>, ServiceError>;

    /// Record with exactly this token, an identifier starting with
    /// `identifier_prefix`, and `expires > now`.
    async fn find_live_by_token_and_prefix(
        &self,
        token: &str,
        identifier_prefix: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationRecord>, ServiceError>;

    /// Remove one record; `true` when this call removed it.
    async fn delete(&self, identifier: &str, token: &str) -> Result<bool, ServiceError>;

    /// Remove every record with `expires < now`, returning how many.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

/// Process-local store for tests and single-node development.
#[derive(Debug, Default)]
pub struct InMemoryVerificationStore {
    records: Mutex<Vec<VerificationRecord>>,
}

impl InMemoryVerificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, in insertion order.
    pub fn records(&self) -> Vec<VerificationRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<VerificationRecord>>, ServiceError> {
        self.records
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Token store mutex poisoned: {}", e)))
    }
}

fn push_unique(
    records: &mut Vec<VerificationRecord>,
    record: &VerificationRecord,
) -> Result<(), ServiceError> {
    let duplicate = records
        .iter()
        .any(|r| r.identifier == record.identifier && r.token == record.token);
    if duplicate {
        return Err(ServiceError::Internal(anyhow::anyhow!(
            "Duplicate verification record for identifier {}",
            record.identifier
        )));
    }
    records.push(record.clone());
    Ok(())
}

#[async_trait]
impl VerificationStore for InMemoryVerificationStore {
    async fn replace(&self, record: &VerificationRecord) -> Result<(), ServiceError> {
        let mut records = self.lock()?;
        records.retain(|r| r.identifier != record.identifier);
        push_unique(&mut records, record)
    }

    async fn insert(&self, record: &VerificationRecord) -> Result<(), ServiceError> {
        let mut records = self.lock()?;
        push_unique(&mut records, record)
    }

    async fn find_live_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationRecord>, ServiceError> {
        let records = self.lock()?;
        Ok(records
            .iter()
            .find(|r| r.token == token && r.is_live_at(now))
            .cloned())
    }

    async fn find_live(
        &self,
        identifier: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationRecord>, ServiceError> {
        let records = self.lock()?;
        Ok(records
            .iter()
            .find(|r| r.identifier == identifier && r.token == token && r.is_live_at(now))
            .cloned())
    }

    async fn find_live_by_token_and_prefix(
        &self,
        token: &str,
        identifier_prefix: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationRecord>, ServiceError> {
        let records = self.lock()?;
        Ok(records
            .iter()
            .find(|r| {
                r.token == token && r.identifier.starts_with(identifier_prefix) && r.is_live_at(now)
            })
            .cloned())
    }

    async fn delete(&self, identifier: &str, token: &str) -> Result<bool, ServiceError> {
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|r| !(r.identifier == identifier && r.token == token));
        Ok(records.len() < before)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|r| !r.is_expired_at(now));
        Ok((before - records.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.lock().map(|_| ())
    }
}
