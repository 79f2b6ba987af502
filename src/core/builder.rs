use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use super::codes::*;
use super::error::{Result, VerifactuError};
use super::format::round_amount;
use super::snapshot::{DocumentIntent, InvoiceSnapshot};
use super::types::*;

/// Allowed drift between the breakdown and the declared totals, per breakdown line.
pub const TOTALS_TOLERANCE: Decimal = dec!(0.02);

/// Builder for `RegistroAlta` records.
///
/// Combinations that can never be valid are rejected at the call that
/// introduces them; everything else is checked by [`build`](Self::build),
/// which reports the first missing mandatory field by its schema name.
///
/// `build` trims identifiers and free text and rounds every amount to two
/// decimals (half away from zero), so the record holds exactly what its XML
/// and its fingerprint carry.
///
/// ```
/// use chrono::{FixedOffset, NaiveDate, TimeZone};
/// use rust_decimal_macros::dec;
/// use verifactu::core::*;
///
/// let system = SystemDescriptor {
///     producer: Party::with_nif("Software SL", "B12345678"),
///     system_name: "Facturas".into(),
///     system_id: "FA".into(),
///     version: "1.0".into(),
///     installation_number: "001".into(),
///     verifactu_only: true,
///     multi_taxpayer: false,
///     multiple_taxpayers: false,
/// };
/// let id = InvoiceId::new("A39200019", "F-2025-1", NaiveDate::from_ymd_opt(2025, 8, 10).unwrap());
/// let record = RegistrationBuilder::new(id)
///     .version(IdVersion::V1_0)
///     .issuer_name("Empresa SA")
///     .invoice_type(InvoiceType::Invoice)
///     .description("Servicios")
///     .add_breakdown(TaxBreakdownEntry::taxed(dec!(100), dec!(21), dec!(21)))
///     .total_quota(dec!(21))
///     .total_amount(dec!(121))
///     .chain(ChainLink::FirstInChain)
///     .system(system)
///     .generated_at(FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2025, 8, 10, 5, 2, 18).unwrap())
///     .build()
///     .unwrap()
///     .seal()
///     .unwrap();
/// assert_eq!(record.fingerprint.unwrap().value.len(), 64);
/// ```
#[derive(Debug, Clone)]
pub struct RegistrationBuilder {
    version: Option<IdVersion>,
    id: InvoiceId,
    issuer_name: Option<String>,
    invoice_type: Option<InvoiceType>,
    rectification_kind: Option<RectificationKind>,
    rectified: Vec<InvoiceId>,
    rectification_amounts: Option<RectificationAmounts>,
    substituted: Vec<InvoiceId>,
    operation_date: Option<chrono::NaiveDate>,
    description: Option<String>,
    simplified_art_7273: bool,
    without_recipient_id: bool,
    macrodata: bool,
    external_ref: Option<String>,
    remedy: bool,
    recipients: Vec<Party>,
    breakdown: Vec<TaxBreakdownEntry>,
    total_quota: Option<Decimal>,
    total_amount: Option<Decimal>,
    chain: Option<ChainLink>,
    system: Option<SystemDescriptor>,
    generated_at: Option<DateTime<FixedOffset>>,
}

impl RegistrationBuilder {
    pub fn new(id: InvoiceId) -> Self {
        Self {
            version: None,
            id,
            issuer_name: None,
            invoice_type: None,
            rectification_kind: None,
            rectified: Vec::new(),
            rectification_amounts: None,
            substituted: Vec::new(),
            operation_date: None,
            description: None,
            simplified_art_7273: false,
            without_recipient_id: false,
            macrodata: false,
            external_ref: None,
            remedy: false,
            recipients: Vec::new(),
            breakdown: Vec::new(),
            total_quota: None,
            total_amount: None,
            chain: None,
            system: None,
            generated_at: None,
        }
    }

    pub fn version(mut self, version: IdVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn issuer_name(mut self, name: impl Into<String>) -> Self {
        self.issuer_name = Some(name.into());
        self
    }

    pub fn invoice_type(mut self, invoice_type: InvoiceType) -> Self {
        self.invoice_type = Some(invoice_type);
        self
    }

    /// Set `TipoFactura` from its wire code.
    pub fn invoice_type_code(self, code: &str) -> Result<Self> {
        let invoice_type = code.parse::<InvoiceType>()?;
        Ok(self.invoice_type(invoice_type))
    }

    /// Set `ImporteRectificacion`. Must precede a substitutive
    /// [`rectification_kind`](Self::rectification_kind).
    pub fn rectification_amounts(mut self, amounts: RectificationAmounts) -> Self {
        self.rectification_amounts = Some(amounts);
        self
    }

    /// Set `TipoRectificativa`.
    ///
    /// Fails with `MissingField("ImporteRectificacion")` for a substitutive
    /// rectification whose amounts were not supplied yet.
    pub fn rectification_kind(mut self, kind: RectificationKind) -> Result<Self> {
        if kind == RectificationKind::Substitutive && self.rectification_amounts.is_none() {
            return Err(VerifactuError::missing("ImporteRectificacion"));
        }
        self.rectification_kind = Some(kind);
        Ok(self)
    }

    /// Set `TipoRectificativa` from its wire code.
    pub fn rectification_kind_code(self, code: &str) -> Result<Self> {
        let kind = code.parse::<RectificationKind>()?;
        self.rectification_kind(kind)
    }

    /// Add an entry to `FacturasRectificadas`.
    pub fn rectifies(mut self, id: InvoiceId) -> Self {
        self.rectified.push(id);
        self
    }

    /// Add an entry to `FacturasSustituidas`.
    pub fn substitutes(mut self, id: InvoiceId) -> Self {
        self.substituted.push(id);
        self
    }

    pub fn operation_date(mut self, date: chrono::NaiveDate) -> Self {
        self.operation_date = Some(date);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn simplified_art_7273(mut self, value: bool) -> Self {
        self.simplified_art_7273 = value;
        self
    }

    pub fn without_recipient_id(mut self, value: bool) -> Self {
        self.without_recipient_id = value;
        self
    }

    pub fn macrodata(mut self, value: bool) -> Self {
        self.macrodata = value;
        self
    }

    pub fn external_ref(mut self, reference: impl Into<String>) -> Self {
        self.external_ref = Some(reference.into());
        self
    }

    pub fn remedy(mut self, value: bool) -> Self {
        self.remedy = value;
        self
    }

    pub fn recipient(mut self, party: Party) -> Self {
        self.recipients.push(party);
        self
    }

    pub fn add_breakdown(mut self, entry: TaxBreakdownEntry) -> Self {
        self.breakdown.push(entry);
        self
    }

    pub fn total_quota(mut self, amount: Decimal) -> Self {
        self.total_quota = Some(amount);
        self
    }

    pub fn total_amount(mut self, amount: Decimal) -> Self {
        self.total_amount = Some(amount);
        self
    }

    pub fn chain(mut self, link: ChainLink) -> Self {
        self.chain = Some(link);
        self
    }

    pub fn system(mut self, system: SystemDescriptor) -> Self {
        self.system = Some(system);
        self
    }

    pub fn generated_at(mut self, ts: DateTime<FixedOffset>) -> Self {
        self.generated_at = Some(ts);
        self
    }

    /// Assemble the record. The fingerprint is left empty; call
    /// [`Record::seal`] once every field is final.
    pub fn build(self) -> Result<Record> {
        let id = trim_id(self.id);
        let rectified: Vec<InvoiceId> = self.rectified.into_iter().map(trim_id).collect();
        let substituted: Vec<InvoiceId> = self.substituted.into_iter().map(trim_id).collect();
        let issuer_name = non_empty(self.issuer_name, "NombreRazonEmisor")?;
        let description = non_empty(self.description, "DescripcionOperacion")?;

        let is_rectification = self
            .invoice_type
            .is_some_and(|t| t.is_rectification());
        if !is_rectification {
            self.total_quota.ok_or_else(|| VerifactuError::missing("CuotaTotal"))?;
            self.total_amount.ok_or_else(|| VerifactuError::missing("ImporteTotal"))?;
        }

        let version = self.version.ok_or_else(|| VerifactuError::missing("IDVersion"))?;
        let invoice_type = self
            .invoice_type
            .ok_or_else(|| VerifactuError::missing("TipoFactura"))?;
        check_invoice_id(&id, "IDEmisorFactura", "NumSerieFactura")?;

        if self.breakdown.is_empty() {
            return Err(VerifactuError::missing("Desglose"));
        }

        let rectification = if invoice_type.is_rectification() {
            let kind = self
                .rectification_kind
                .ok_or_else(|| VerifactuError::missing("TipoRectificativa"))?;
            if rectified.is_empty() {
                return Err(VerifactuError::missing("FacturasRectificadas"));
            }
            if kind == RectificationKind::Substitutive && self.rectification_amounts.is_none() {
                return Err(VerifactuError::missing("ImporteRectificacion"));
            }
            for id in &rectified {
                check_invoice_id(id, "IDEmisorFactura", "NumSerieFactura")?;
            }
            Some(Rectification {
                kind,
                rectified,
                amounts: self.rectification_amounts.map(round_rectification),
            })
        } else {
            if self.rectification_kind.is_some()
                || !rectified.is_empty()
                || self.rectification_amounts.is_some()
            {
                return Err(VerifactuError::Inconsistent(format!(
                    "rectification data is only allowed on R-type invoices, not {invoice_type}"
                )));
            }
            None
        };

        if !substituted.is_empty() && invoice_type != InvoiceType::Substitution {
            return Err(VerifactuError::Inconsistent(format!(
                "substituted invoices are only allowed on F3 invoices, not {invoice_type}"
            )));
        }

        let total_quota = self
            .total_quota
            .map(round_amount)
            .ok_or_else(|| VerifactuError::missing("CuotaTotal"))?;
        let total_amount = self
            .total_amount
            .map(round_amount)
            .ok_or_else(|| VerifactuError::missing("ImporteTotal"))?;

        let chain = self
            .chain
            .ok_or_else(|| VerifactuError::missing("Encadenamiento"))?;
        let system = self
            .system
            .ok_or_else(|| VerifactuError::missing("SistemaInformatico"))?;
        let generated_at = self
            .generated_at
            .ok_or_else(|| VerifactuError::missing("FechaHoraHusoGenRegistro"))?;

        let registration = Registration {
            id,
            issuer_name,
            invoice_type,
            rectification,
            substituted,
            operation_date: self.operation_date,
            description,
            simplified_art_7273: self.simplified_art_7273,
            without_recipient_id: self.without_recipient_id,
            macrodata: self.macrodata,
            external_ref: trim_text(self.external_ref),
            remedy: self.remedy,
            recipients: self.recipients,
            breakdown: self.breakdown.into_iter().map(round_entry).collect(),
            total_quota,
            total_amount,
        };
        check_totals(&registration)?;

        debug!(
            issuer = %registration.id.issuer_nif,
            series = %registration.id.series_number,
            invoice_type = %registration.invoice_type,
            "registration record built"
        );

        Ok(Record {
            version,
            variant: RecordVariant::Registration(registration),
            chain,
            system,
            generated_at,
            fingerprint: None,
        })
    }
}

/// Builder for `RegistroAnulacion` records.
#[derive(Debug, Clone)]
pub struct CancellationBuilder {
    version: Option<IdVersion>,
    cancelled: InvoiceId,
    reason: CancellationReason,
    generated_by: Option<GeneratedBy>,
    generator: Option<Party>,
    external_ref: Option<String>,
    chain: Option<ChainLink>,
    system: Option<SystemDescriptor>,
    generated_at: Option<DateTime<FixedOffset>>,
}

impl CancellationBuilder {
    pub fn new(cancelled: InvoiceId) -> Self {
        Self {
            version: None,
            cancelled,
            reason: CancellationReason::Standard,
            generated_by: None,
            generator: None,
            external_ref: None,
            chain: None,
            system: None,
            generated_at: None,
        }
    }

    pub fn version(mut self, version: IdVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn reason(mut self, reason: CancellationReason) -> Self {
        self.reason = reason;
        self
    }

    /// `GeneradoPor`, with the `Generador` party when it is not the issuer.
    pub fn generated_by(mut self, by: GeneratedBy, generator: Option<Party>) -> Self {
        self.generated_by = Some(by);
        self.generator = generator;
        self
    }

    pub fn external_ref(mut self, reference: impl Into<String>) -> Self {
        self.external_ref = Some(reference.into());
        self
    }

    pub fn chain(mut self, link: ChainLink) -> Self {
        self.chain = Some(link);
        self
    }

    pub fn system(mut self, system: SystemDescriptor) -> Self {
        self.system = Some(system);
        self
    }

    pub fn generated_at(mut self, ts: DateTime<FixedOffset>) -> Self {
        self.generated_at = Some(ts);
        self
    }

    pub fn build(self) -> Result<Record> {
        let version = self.version.ok_or_else(|| VerifactuError::missing("IDVersion"))?;
        let cancelled = trim_id(self.cancelled);
        check_invoice_id(
            &cancelled,
            "IDEmisorFacturaAnulada",
            "NumSerieFacturaAnulada",
        )?;
        let chain = self
            .chain
            .ok_or_else(|| VerifactuError::missing("Encadenamiento"))?;
        let system = self
            .system
            .ok_or_else(|| VerifactuError::missing("SistemaInformatico"))?;
        let generated_at = self
            .generated_at
            .ok_or_else(|| VerifactuError::missing("FechaHoraHusoGenRegistro"))?;

        if self.generator.is_some() && self.generated_by.is_none() {
            return Err(VerifactuError::Inconsistent(
                "Generador requires GeneradoPor".into(),
            ));
        }

        debug!(
            issuer = %cancelled.issuer_nif,
            series = %cancelled.series_number,
            "cancellation record built"
        );

        Ok(Record {
            version,
            variant: RecordVariant::Cancellation(Cancellation {
                cancelled,
                reason: self.reason,
                generated_by: self.generated_by,
                generator: self.generator,
                external_ref: trim_text(self.external_ref),
            }),
            chain,
            system,
            generated_at,
            fingerprint: None,
        })
    }
}

impl Record {
    /// Build the record for an invoice snapshot.
    ///
    /// `chain` comes from the chain state store; the fingerprint is not
    /// computed here.
    pub fn build(
        snapshot: &InvoiceSnapshot,
        chain: ChainLink,
        system: SystemDescriptor,
        generated_at: DateTime<FixedOffset>,
    ) -> Result<Record> {
        let (invoice_type, substitutes, rectification) = match &snapshot.intent {
            DocumentIntent::Cancellation { target, reason } => {
                let mut builder = CancellationBuilder::new(target.clone())
                    .version(IdVersion::default())
                    .reason(*reason)
                    .chain(chain)
                    .system(system)
                    .generated_at(generated_at);
                if let Some(r) = &snapshot.external_ref {
                    builder = builder.external_ref(r.clone());
                }
                return builder.build();
            }
            DocumentIntent::Standard {
                invoice_type,
                substitutes,
            } => (*invoice_type, substitutes.as_slice(), None),
            DocumentIntent::Rectification {
                invoice_type,
                kind,
                rectified,
                amounts,
            } => (*invoice_type, &[][..], Some((*kind, rectified, amounts))),
        };

        let mut builder = RegistrationBuilder::new(snapshot.invoice_id())
            .version(IdVersion::default())
            .issuer_name(snapshot.issuer.name.clone())
            .invoice_type(invoice_type)
            .description(snapshot.description.clone())
            .simplified_art_7273(snapshot.simplified_art_7273)
            .without_recipient_id(snapshot.without_recipient_id)
            .chain(chain)
            .system(system)
            .generated_at(generated_at);

        for id in substitutes {
            builder = builder.substitutes(id.clone());
        }
        if let Some((kind, rectified, amounts)) = rectification {
            if let Some(amounts) = amounts {
                builder = builder.rectification_amounts(amounts.clone());
            }
            builder = builder.rectification_kind(kind)?;
            for id in rectified {
                builder = builder.rectifies(id.clone());
            }
        }
        if let Some(date) = snapshot.operation_date {
            builder = builder.operation_date(date);
        }
        if let Some(r) = &snapshot.external_ref {
            builder = builder.external_ref(r.clone());
        }
        for party in &snapshot.recipients {
            builder = builder.recipient(party.clone());
        }
        for entry in &snapshot.breakdown {
            builder = builder.add_breakdown(entry.clone());
        }
        if let Some(q) = snapshot.total_quota {
            builder = builder.total_quota(q);
        }
        if let Some(a) = snapshot.total_amount {
            builder = builder.total_amount(a);
        }
        builder.build()
    }
}

fn non_empty(value: Option<String>, field: &str) -> Result<String> {
    match trim_text(value) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(VerifactuError::missing(field)),
    }
}

fn trim_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

fn trim_id(id: InvoiceId) -> InvoiceId {
    InvoiceId {
        issuer_nif: id.issuer_nif.trim().to_string(),
        series_number: id.series_number.trim().to_string(),
        issue_date: id.issue_date,
    }
}

fn round_rectification(amounts: RectificationAmounts) -> RectificationAmounts {
    RectificationAmounts {
        base: round_amount(amounts.base),
        quota: round_amount(amounts.quota),
        surcharge_quota: amounts.surcharge_quota.map(round_amount),
    }
}

fn round_entry(mut entry: TaxBreakdownEntry) -> TaxBreakdownEntry {
    entry.base = round_amount(entry.base);
    if let OperationTreatment::Taxed {
        rate,
        quota,
        surcharge,
        ..
    } = &mut entry.treatment
    {
        *rate = round_amount(*rate);
        *quota = round_amount(*quota);
        if let Some(s) = surcharge {
            s.rate = round_amount(s.rate);
            s.quota = round_amount(s.quota);
        }
    }
    entry
}

fn check_invoice_id(id: &InvoiceId, nif_field: &str, series_field: &str) -> Result<()> {
    if id.issuer_nif.trim().is_empty() {
        return Err(VerifactuError::missing(nif_field));
    }
    if id.series_number.trim().is_empty() {
        return Err(VerifactuError::missing(series_field));
    }
    Ok(())
}

/// Breakdown and declared totals must agree within [`TOTALS_TOLERANCE`] per line.
/// Rectifications by differences carry deltas and are not reconciled.
fn check_totals(r: &Registration) -> Result<()> {
    if r
        .rectification
        .as_ref()
        .is_some_and(|rect| rect.kind == RectificationKind::Differences)
    {
        return Ok(());
    }

    let tolerance = TOTALS_TOLERANCE * Decimal::from(r.breakdown.len().max(1));
    let quota: Decimal = r.breakdown.iter().map(|e| e.total_quota()).sum();
    let base: Decimal = r.breakdown.iter().map(|e| e.base).sum();

    if (quota - r.total_quota).abs() > tolerance {
        return Err(VerifactuError::Inconsistent(format!(
            "CuotaTotal {} does not match breakdown quota {}",
            r.total_quota, quota
        )));
    }
    if (base + quota - r.total_amount).abs() > tolerance {
        return Err(VerifactuError::Inconsistent(format!(
            "ImporteTotal {} does not match breakdown base + quota {}",
            r.total_amount,
            base + quota
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ts() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2025, 1, 15, 10, 0, 0)
            .unwrap()
    }

    fn system() -> SystemDescriptor {
        SystemDescriptor {
            producer: Party::with_nif("Software SL", "B12345678"),
            system_name: "Facturas".into(),
            system_id: "FA".into(),
            version: "1.0".into(),
            installation_number: "001".into(),
            verifactu_only: true,
            multi_taxpayer: false,
            multiple_taxpayers: false,
        }
    }

    fn base_builder() -> RegistrationBuilder {
        RegistrationBuilder::new(InvoiceId::new("A39200019", "F-1", date(2025, 1, 15)))
            .version(IdVersion::V1_0)
            .issuer_name("Empresa SA")
            .invoice_type(InvoiceType::Invoice)
            .description("Servicios")
            .add_breakdown(TaxBreakdownEntry::taxed(dec!(100), dec!(21), dec!(21)))
            .total_quota(dec!(21))
            .total_amount(dec!(121))
            .chain(ChainLink::FirstInChain)
            .system(system())
            .generated_at(ts())
    }

    fn missing_field(result: Result<Record>) -> String {
        match result {
            Err(VerifactuError::MissingField(f)) => f,
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn builds_complete_registration() {
        let record = base_builder().build().unwrap();
        assert!(record.fingerprint.is_none());
        assert_eq!(record.version, IdVersion::V1_0);
        assert!(record.is_registration());
    }

    #[test]
    fn issuer_name_and_description_checked_first() {
        let b = RegistrationBuilder::new(InvoiceId::new("A39200019", "F-1", date(2025, 1, 15)));
        assert_eq!(missing_field(b.clone().build()), "NombreRazonEmisor");
        assert_eq!(
            missing_field(b.clone().issuer_name("X").build()),
            "DescripcionOperacion"
        );
        assert_eq!(
            missing_field(b.issuer_name("X").description("Y").build()),
            "CuotaTotal"
        );
    }

    #[test]
    fn missing_version_is_reported() {
        let mut b = base_builder();
        b.version = None;
        assert_eq!(missing_field(b.build()), "IDVersion");
    }

    #[test]
    fn blank_issuer_name_counts_as_missing() {
        assert_eq!(
            missing_field(base_builder().issuer_name("   ").build()),
            "NombreRazonEmisor"
        );
    }

    #[test]
    fn invoice_type_code_rejects_unknown() {
        assert!(matches!(
            base_builder().invoice_type_code("F9"),
            Err(VerifactuError::InvalidEnumValue { .. })
        ));
        for code in ["F1", "F2", "F3", "R1", "R2", "R3", "R4", "R5"] {
            assert!(base_builder().invoice_type_code(code).is_ok(), "{code}");
        }
    }

    #[test]
    fn substitutive_requires_amounts_first() {
        let err = base_builder()
            .invoice_type(InvoiceType::RectificationLegal)
            .rectification_kind(RectificationKind::Substitutive)
            .unwrap_err();
        assert!(matches!(err, VerifactuError::MissingField(f) if f == "ImporteRectificacion"));

        let ok = base_builder()
            .invoice_type(InvoiceType::RectificationLegal)
            .rectification_amounts(RectificationAmounts {
                base: dec!(100),
                quota: dec!(21),
                surcharge_quota: None,
            })
            .rectification_kind(RectificationKind::Substitutive);
        assert!(ok.is_ok());
    }

    #[test]
    fn rectification_kind_code_closed_set() {
        assert!(base_builder().rectification_kind_code("I").is_ok());
        assert!(matches!(
            base_builder().rectification_kind_code("X"),
            Err(VerifactuError::InvalidEnumValue { .. })
        ));
    }

    #[test]
    fn rectification_needs_rectified_invoice() {
        let result = base_builder()
            .invoice_type(InvoiceType::RectificationLegal)
            .rectification_kind(RectificationKind::Differences)
            .unwrap()
            .build();
        assert_eq!(missing_field(result), "FacturasRectificadas");
    }

    #[test]
    fn rectification_data_rejected_on_f1() {
        let result = base_builder()
            .rectification_kind(RectificationKind::Differences)
            .unwrap()
            .build();
        assert!(matches!(result, Err(VerifactuError::Inconsistent(_))));
    }

    #[test]
    fn substitution_list_only_on_f3() {
        let original = InvoiceId::new("A39200019", "S-1", date(2025, 1, 10));
        assert!(matches!(
            base_builder().substitutes(original.clone()).build(),
            Err(VerifactuError::Inconsistent(_))
        ));
        assert!(base_builder()
            .invoice_type(InvoiceType::Substitution)
            .substitutes(original)
            .build()
            .is_ok());
    }

    #[test]
    fn totals_must_reconcile() {
        let result = base_builder().total_quota(dec!(25)).build();
        assert!(matches!(result, Err(VerifactuError::Inconsistent(_))));
        let result = base_builder().total_amount(dec!(150)).build();
        assert!(matches!(result, Err(VerifactuError::Inconsistent(_))));
        // one cent of rounding drift is fine
        assert!(base_builder().total_amount(dec!(121.01)).build().is_ok());
    }

    #[test]
    fn cancellation_builder() {
        let target = InvoiceId::new("A39200019", "F-1", date(2025, 1, 15));
        let record = CancellationBuilder::new(target.clone())
            .version(IdVersion::V1_0)
            .chain(ChainLink::FirstInChain)
            .system(system())
            .generated_at(ts())
            .build()
            .unwrap();
        assert_eq!(record.invoice_id(), &target);

        let err = CancellationBuilder::new(target).build().unwrap_err();
        assert!(matches!(err, VerifactuError::MissingField(f) if f == "IDVersion"));
    }
}
