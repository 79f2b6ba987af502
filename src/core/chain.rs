//! Chain state: the last accepted record per issuer.
//!
//! Persistence belongs to the application; this module only defines the
//! contract and an in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{Result, VerifactuError};
use super::types::{ChainLink, InvoiceId, PreviousRecord, Record};

/// Identity and fingerprint of the newest accepted record of an issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    pub fingerprint: String,
    pub series_number: String,
    pub issue_date: NaiveDate,
}

impl ChainHead {
    /// Head for a sealed record. `None` if the record has no fingerprint yet.
    pub fn from_record(record: &Record) -> Option<Self> {
        let fingerprint = record.fingerprint.as_ref()?;
        let id = record.invoice_id();
        Some(Self {
            fingerprint: fingerprint.value.clone(),
            series_number: id.series_number.clone(),
            issue_date: id.issue_date,
        })
    }

    /// The link a new record of `issuer_nif` must carry.
    pub fn link_for(&self, issuer_nif: &str) -> ChainLink {
        ChainLink::Follows(PreviousRecord {
            id: InvoiceId::new(issuer_nif, self.series_number.clone(), self.issue_date),
            fingerprint: self.fingerprint.clone(),
        })
    }
}

/// Per-issuer chain persistence.
///
/// `record_submitted` is only called after the authority accepted the
/// record; rejected or failed submissions leave the head untouched.
pub trait ChainStateStore: Send + Sync {
    fn get_last(&self, issuer_nif: &str) -> Result<Option<ChainHead>>;

    fn record_submitted(&self, issuer_nif: &str, head: &ChainHead) -> Result<()>;

    /// Link for the next record: `FirstInChain` when the issuer has no head.
    fn next_link(&self, issuer_nif: &str) -> Result<ChainLink> {
        Ok(self
            .get_last(issuer_nif)?
            .map_or(ChainLink::FirstInChain, |head| head.link_for(issuer_nif)))
    }
}

/// Mutex-protected map, suitable for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryChainStore {
    heads: Mutex<HashMap<String, ChainHead>>,
}

impl InMemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one head, e.g. when resuming an existing chain.
    pub fn with_head(issuer_nif: impl Into<String>, head: ChainHead) -> Self {
        let store = Self::default();
        if let Ok(mut heads) = store.heads.lock() {
            heads.insert(issuer_nif.into(), head);
        }
        store
    }
}

impl ChainStateStore for InMemoryChainStore {
    fn get_last(&self, issuer_nif: &str) -> Result<Option<ChainHead>> {
        let heads = self
            .heads
            .lock()
            .map_err(|_| VerifactuError::Store("chain store lock poisoned".into()))?;
        Ok(heads.get(issuer_nif).cloned())
    }

    fn record_submitted(&self, issuer_nif: &str, head: &ChainHead) -> Result<()> {
        let mut heads = self
            .heads
            .lock()
            .map_err(|_| VerifactuError::Store("chain store lock poisoned".into()))?;
        heads.insert(issuer_nif.to_string(), head.clone());
        info!(
            issuer = issuer_nif,
            series = %head.series_number,
            "chain head advanced"
        );
        Ok(())
    }
}
