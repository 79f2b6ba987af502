//! End-to-end submission: chain read, build, fingerprint, validate, sign,
//! envelope, send, chain write.
//!
//! The whole sequence runs under a per-issuer lock so two submissions of the
//! same issuer never claim the same predecessor. Different issuers proceed
//! in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::client::{SendDetails, SendResult, SubmissionClient};
use super::config::VerifactuConfig;
use super::envelope::SubmissionEnvelope;
use crate::core::error::{Result, VerifactuError};
use crate::core::{ChainHead, ChainStateStore, InvoiceSnapshot, Record, SystemDescriptor};
use crate::sign::{KeySource, sign};
use crate::validate::VerifactuValidator;
use crate::xml::Element;

/// Lifecycle of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SubmissionState {
    Built,
    Validated,
    Signed,
    Enveloped,
    Submitted,
    Accepted,
    Rejected,
    TransportFailed,
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::TransportFailed)
    }

    pub fn can_transition_to(&self, next: SubmissionState) -> bool {
        use SubmissionState::*;
        matches!(
            (self, next),
            (Built, Validated)
                | (Validated, Signed)
                | (Validated, Enveloped)
                | (Signed, Enveloped)
                | (Enveloped, Submitted)
                | (Submitted, Accepted)
                | (Submitted, Rejected)
                | (Submitted, TransportFailed)
        )
    }
}

/// State plus the path that led there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionTrace {
    states: Vec<SubmissionState>,
}

impl Default for SubmissionTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionTrace {
    pub fn new() -> Self {
        Self {
            states: vec![SubmissionState::Built],
        }
    }

    pub fn current(&self) -> SubmissionState {
        self.states
            .last()
            .copied()
            .unwrap_or(SubmissionState::Built)
    }

    pub fn states(&self) -> &[SubmissionState] {
        &self.states
    }

    pub fn advance(&mut self, next: SubmissionState) -> Result<()> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(VerifactuError::Inconsistent(format!(
                "illegal submission transition {current:?} -> {next:?}"
            )));
        }
        debug!(from = ?current, to = ?next, "submission state");
        self.states.push(next);
        Ok(())
    }
}

/// Source of `FechaHoraHusoGenRegistro`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().fixed_offset()
    }
}

/// Always the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// One mutex per issuer NIF.
///
/// The table holds weak handles; an issuer's entry lives only while some
/// submission holds its lock, and dead entries are pruned on the next lookup.
#[derive(Debug, Default)]
pub struct IssuerLocks {
    locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl IssuerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, issuer_nif: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| VerifactuError::Store("issuer lock table poisoned".into()))?;
        if let Some(lock) = locks.get(issuer_nif).and_then(Weak::upgrade) {
            return Ok(lock);
        }
        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        locks.insert(issuer_nif.to_string(), Arc::downgrade(&lock));
        Ok(lock)
    }

    /// Issuers with a lock currently handed out.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .map(|locks| locks.values().filter(|l| l.strong_count() > 0).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything known about a finished submission.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    /// The sealed record.
    pub record: Record,
    /// The exact text sent.
    pub envelope_xml: String,
    pub result: SendResult,
    pub trace: SubmissionTrace,
}

impl SubmissionOutcome {
    pub fn state(&self) -> SubmissionState {
        self.trace.current()
    }
}

/// Submission pipeline for one software installation.
pub struct Submitter {
    client: SubmissionClient,
    store: Arc<dyn ChainStateStore>,
    system: SystemDescriptor,
    clock: Box<dyn Clock>,
    signing: Option<(KeySource, KeySource)>,
    validator: VerifactuValidator,
    locks: IssuerLocks,
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("client", &self.client)
            .field("system", &self.system.system_name)
            .field("signing", &self.signing.is_some())
            .finish_non_exhaustive()
    }
}

impl Submitter {
    pub fn new(
        client: SubmissionClient,
        store: Arc<dyn ChainStateStore>,
        system: SystemDescriptor,
    ) -> Self {
        Self {
            client,
            store,
            system,
            clock: Box::new(SystemClock),
            signing: None,
            validator: VerifactuValidator::new(),
            locks: IssuerLocks::new(),
        }
    }

    /// Client and signing material from `config`.
    pub fn from_config(
        config: &VerifactuConfig,
        store: Arc<dyn ChainStateStore>,
        system: SystemDescriptor,
    ) -> Result<Self> {
        let mut submitter = Self::new(SubmissionClient::new(config)?, store, system);
        if let (Some(key), Some(cert)) = (&config.signing_key_path, &config.signing_cert_path) {
            submitter = submitter.with_signing(KeySource::path(key), KeySource::path(cert));
        }
        Ok(submitter)
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_signing(mut self, private_key: KeySource, certificate: KeySource) -> Self {
        self.signing = Some((private_key, certificate));
        self
    }

    /// Build, validate, sign and submit the record for `snapshot`.
    ///
    /// `Err` means nothing was sent: the issuer has no NIF, the record could
    /// not be built, failed validation or could not be signed. Once the
    /// envelope went out, the outcome is in [`SubmissionOutcome::result`];
    /// the chain head only moves on acceptance. Only registrations are
    /// signed.
    pub fn submit(&self, snapshot: &InvoiceSnapshot) -> Result<SubmissionOutcome> {
        let issuer = snapshot
            .issuer
            .nif()
            .filter(|nif| !nif.trim().is_empty())
            .ok_or_else(|| VerifactuError::missing("IDEmisorFactura"))?
            .to_string();
        let lock = self.locks.lock_for(&issuer)?;
        let _guard = lock
            .lock()
            .map_err(|_| VerifactuError::Store(format!("issuer lock for {issuer} poisoned")))?;

        let link = self.store.next_link(&issuer)?;
        let record = Record::build(snapshot, link, self.system.clone(), self.clock.now())?.seal()?;
        let mut trace = SubmissionTrace::new();
        debug!(
            issuer = %issuer,
            series = %record.invoice_id().series_number,
            "submission built"
        );

        let mut element = record.to_xml()?;
        self.validate(&element)?;
        trace.advance(SubmissionState::Validated)?;

        if let Some((key, cert)) = &self.signing {
            if record.is_registration() {
                sign(&mut element, key, cert)?;
                trace.advance(SubmissionState::Signed)?;
            }
        }

        let envelope = SubmissionEnvelope::new(snapshot.issuer.clone(), element);
        let envelope_xml = envelope.to_xml_string()?;
        trace.advance(SubmissionState::Enveloped)?;

        let result = self.client.send(&envelope)?;
        trace.advance(SubmissionState::Submitted)?;

        let terminal = match &result.details {
            SendDetails::Accepted(_) => {
                let head = ChainHead::from_record(&record)
                    .ok_or_else(|| VerifactuError::missing("Huella"))?;
                self.store.record_submitted(&issuer, &head)?;
                SubmissionState::Accepted
            }
            SendDetails::Rejected(_) | SendDetails::Unparsable { .. } => SubmissionState::Rejected,
            SendDetails::TransportFailed { .. } => SubmissionState::TransportFailed,
        };
        trace.advance(terminal)?;
        info!(issuer = %issuer, state = ?terminal, "submission finished");

        Ok(SubmissionOutcome {
            record,
            envelope_xml,
            result,
            trace,
        })
    }

    fn validate(&self, element: &Element) -> Result<()> {
        let result = self.validator.validate_element(element);
        if result.is_valid() {
            return Ok(());
        }
        let details: Vec<&str> = result
            .errors
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        Err(VerifactuError::Validation(format!(
            "{}: {}",
            result.summary(),
            details.join("; ")
        )))
    }
}
