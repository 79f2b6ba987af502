use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::codes::*;
use super::types::*;

/// Invoice data handed over by the surrounding application.
///
/// Totals and the tax breakdown arrive already computed; nothing here is
/// recalculated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    /// Issuer (`ObligadoEmision`): name and NIF.
    pub issuer: Party,
    pub series_number: String,
    pub issue_date: NaiveDate,
    pub operation_date: Option<NaiveDate>,
    pub description: String,
    pub intent: DocumentIntent,
    pub recipients: Vec<Party>,
    pub breakdown: Vec<TaxBreakdownEntry>,
    pub total_quota: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    /// Simplified invoice issued without identifying the recipient (art. 61d).
    pub without_recipient_id: bool,
    /// Simplified invoice under art. 7.2 / 7.3.
    pub simplified_art_7273: bool,
    pub external_ref: Option<String>,
}

/// What kind of record the snapshot should produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DocumentIntent {
    /// F1, F2 or F3. `substitutes` lists the simplified invoices replaced by an F3.
    Standard {
        invoice_type: InvoiceType,
        substitutes: Vec<InvoiceId>,
    },
    /// R1..R5.
    Rectification {
        invoice_type: InvoiceType,
        kind: RectificationKind,
        rectified: Vec<InvoiceId>,
        amounts: Option<RectificationAmounts>,
    },
    /// Cancel a previously registered invoice.
    Cancellation {
        target: InvoiceId,
        reason: CancellationReason,
    },
}

impl InvoiceSnapshot {
    /// Issuer NIF, empty if the issuer is identified by a foreign ID.
    pub fn issuer_nif(&self) -> &str {
        self.issuer.nif().unwrap_or_default()
    }

    /// Invoice identity of the record this snapshot produces.
    pub fn invoice_id(&self) -> InvoiceId {
        match &self.intent {
            DocumentIntent::Cancellation { target, .. } => target.clone(),
            _ => InvoiceId::new(
                self.issuer_nif(),
                self.series_number.clone(),
                self.issue_date,
            ),
        }
    }
}
