use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::codes::*;

/// `IDFactura`: identifies an invoice within its issuer's chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId {
    /// `IDEmisorFactura`: issuer NIF.
    pub issuer_nif: String,
    /// `NumSerieFactura`: series and number.
    pub series_number: String,
    /// `FechaExpedicionFactura`: issue date, rendered `DD-MM-YYYY`.
    pub issue_date: NaiveDate,
}

impl InvoiceId {
    pub fn new(
        issuer_nif: impl Into<String>,
        series_number: impl Into<String>,
        issue_date: NaiveDate,
    ) -> Self {
        Self {
            issuer_nif: issuer_nif.into(),
            series_number: series_number.into(),
            issue_date,
        }
    }
}

/// Natural or legal person: recipient, generator or software producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// `NombreRazon`.
    pub name: String,
    pub id: PartyId,
}

impl Party {
    /// Party identified by a Spanish NIF.
    pub fn with_nif(name: impl Into<String>, nif: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: PartyId::Nif(nif.into()),
        }
    }

    /// The NIF, when the party has one.
    pub fn nif(&self) -> Option<&str> {
        match &self.id {
            PartyId::Nif(nif) => Some(nif),
            PartyId::Other { .. } => None,
        }
    }
}

/// Either a Spanish NIF or a foreign identification (`IDOtro`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyId {
    Nif(String),
    Other {
        /// `CodigoPais` (ISO 3166-1 alpha-2).
        country: Option<String>,
        id_type: OtherIdType,
        id: String,
    },
}

/// `DetalleDesglose`: one tax line of the breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdownEntry {
    /// `Impuesto`. `None` means the schema default (IVA).
    pub tax: Option<TaxType>,
    /// `ClaveRegimen`.
    pub regime: Option<RegimeKey>,
    /// `BaseImponibleOimporteNoSujeto`.
    pub base: Decimal,
    pub treatment: OperationTreatment,
}

impl TaxBreakdownEntry {
    /// Standard taxed line (S1) under the general regime.
    pub fn taxed(base: Decimal, rate: Decimal, quota: Decimal) -> Self {
        Self {
            tax: Some(TaxType::Iva),
            regime: Some(RegimeKey::General),
            base,
            treatment: OperationTreatment::Taxed {
                qualification: TaxedQualification::Standard,
                rate,
                quota,
                surcharge: None,
            },
        }
    }

    /// Exempt line.
    pub fn exempt(base: Decimal, cause: ExemptionCause) -> Self {
        Self {
            tax: Some(TaxType::Iva),
            regime: Some(RegimeKey::General),
            base,
            treatment: OperationTreatment::Exempt { cause },
        }
    }

    /// Non-subject line.
    pub fn not_subject(amount: Decimal, qualification: NotSubjectQualification) -> Self {
        Self {
            tax: Some(TaxType::Iva),
            regime: Some(RegimeKey::General),
            base: amount,
            treatment: OperationTreatment::NotSubject { qualification },
        }
    }

    /// Tax quota of this line plus equivalence surcharge, zero when untaxed.
    pub fn total_quota(&self) -> Decimal {
        match &self.treatment {
            OperationTreatment::Taxed {
                quota, surcharge, ..
            } => *quota + surcharge.as_ref().map_or(Decimal::ZERO, |s| s.quota),
            _ => Decimal::ZERO,
        }
    }
}

/// How an operation is qualified. Rate and quota only exist for taxed operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperationTreatment {
    Taxed {
        qualification: TaxedQualification,
        /// `TipoImpositivo` (percentage).
        rate: Decimal,
        /// `CuotaRepercutida`.
        quota: Decimal,
        surcharge: Option<Surcharge>,
    },
    NotSubject {
        qualification: NotSubjectQualification,
    },
    Exempt {
        cause: ExemptionCause,
    },
}

/// Equivalence surcharge (`recargo de equivalencia`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surcharge {
    /// `TipoRecargoEquivalencia`.
    pub rate: Decimal,
    /// `CuotaRecargoEquivalencia`.
    pub quota: Decimal,
}

/// `Encadenamiento`: link to the previous record of the same issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainLink {
    /// `PrimerRegistro = S`.
    FirstInChain,
    /// `RegistroAnterior`.
    Follows(PreviousRecord),
}

impl ChainLink {
    /// Fingerprint of the previous record, empty for the first record.
    pub fn previous_fingerprint(&self) -> &str {
        match self {
            Self::FirstInChain => "",
            Self::Follows(prev) => &prev.fingerprint,
        }
    }
}

/// `RegistroAnterior`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousRecord {
    pub id: InvoiceId,
    /// `Huella` of the previous record.
    pub fingerprint: String,
}

/// `SistemaInformatico`: the software producing the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemDescriptor {
    /// Producer of the software (`NombreRazon` + `NIF`/`IDOtro`).
    pub producer: Party,
    /// `NombreSistemaInformatico`.
    pub system_name: String,
    /// `IdSistemaInformatico` (2 characters).
    pub system_id: String,
    /// `Version`.
    pub version: String,
    /// `NumeroInstalacion`.
    pub installation_number: String,
    /// `TipoUsoPosibleSoloVerifactu`.
    pub verifactu_only: bool,
    /// `TipoUsoPosibleMultiOT`.
    pub multi_taxpayer: bool,
    /// `IndicadorMultiplesOT`.
    pub multiple_taxpayers: bool,
}

/// `ImporteRectificacion`: mandatory for substitutive rectifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectificationAmounts {
    /// `BaseRectificada`.
    pub base: Decimal,
    /// `CuotaRectificada`.
    pub quota: Decimal,
    /// `CuotaRecargoRectificado`.
    pub surcharge_quota: Option<Decimal>,
}

/// Rectification block of an R-type registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectification {
    pub kind: RectificationKind,
    /// `FacturasRectificadas`.
    pub rectified: Vec<InvoiceId>,
    pub amounts: Option<RectificationAmounts>,
}

/// `RegistroAlta` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: InvoiceId,
    /// `NombreRazonEmisor`.
    pub issuer_name: String,
    pub invoice_type: InvoiceType,
    pub rectification: Option<Rectification>,
    /// `FacturasSustituidas` (F3 only).
    pub substituted: Vec<InvoiceId>,
    /// `FechaOperacion`.
    pub operation_date: Option<NaiveDate>,
    /// `DescripcionOperacion`.
    pub description: String,
    /// `FacturaSimplificadaArt7273`.
    pub simplified_art_7273: bool,
    /// `FacturaSinIdentifDestinatarioArt61d`.
    pub without_recipient_id: bool,
    /// `Macrodato`.
    pub macrodata: bool,
    /// `RefExterna`.
    pub external_ref: Option<String>,
    /// `Subsanacion`.
    pub remedy: bool,
    /// `Destinatarios`.
    pub recipients: Vec<Party>,
    /// `Desglose`.
    pub breakdown: Vec<TaxBreakdownEntry>,
    /// `CuotaTotal`.
    pub total_quota: Decimal,
    /// `ImporteTotal`.
    pub total_amount: Decimal,
}

/// Why a cancellation is being filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CancellationReason {
    /// Ordinary cancellation of a registered invoice.
    #[default]
    Standard,
    /// `SinRegistroPrevio = S`: the cancelled invoice was never registered.
    NoPriorRecord,
    /// `RechazoPrevio = S`: a previous cancellation attempt was rejected.
    PriorRejection,
}

/// `RegistroAnulacion` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancellation {
    /// `IDFactura` of the cancelled invoice.
    pub cancelled: InvoiceId,
    pub reason: CancellationReason,
    /// `GeneradoPor`.
    pub generated_by: Option<GeneratedBy>,
    /// `Generador`.
    pub generator: Option<Party>,
    /// `RefExterna`.
    pub external_ref: Option<String>,
}

/// Registration or cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordVariant {
    Registration(Registration),
    Cancellation(Cancellation),
}

impl RecordVariant {
    /// Identity of the invoice the record is about.
    pub fn invoice_id(&self) -> &InvoiceId {
        match self {
            Self::Registration(r) => &r.id,
            Self::Cancellation(c) => &c.cancelled,
        }
    }
}

/// `Huella` plus the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub kind: FingerprintKind,
    /// 64 uppercase hex characters.
    pub value: String,
}

impl Fingerprint {
    pub fn sha256(value: impl Into<String>) -> Self {
        Self {
            kind: FingerprintKind::Sha256,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// A complete Verifactu record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub version: IdVersion,
    pub variant: RecordVariant,
    pub chain: ChainLink,
    pub system: SystemDescriptor,
    /// `FechaHoraHusoGenRegistro`.
    pub generated_at: DateTime<FixedOffset>,
    /// Write-once; see [`Record::seal`](crate::core::Record::seal).
    pub fingerprint: Option<Fingerprint>,
}

impl Record {
    pub fn invoice_id(&self) -> &InvoiceId {
        self.variant.invoice_id()
    }

    pub fn is_registration(&self) -> bool {
        matches!(self.variant, RecordVariant::Registration(_))
    }

    pub fn as_registration(&self) -> Option<&Registration> {
        match &self.variant {
            RecordVariant::Registration(r) => Some(r),
            RecordVariant::Cancellation(_) => None,
        }
    }

    pub fn as_cancellation(&self) -> Option<&Cancellation> {
        match &self.variant {
            RecordVariant::Cancellation(c) => Some(c),
            RecordVariant::Registration(_) => None,
        }
    }
}
