//! `RegistroAlta` / `RegistroAnulacion` XML mapping.
//!
//! Element order follows `SuministroInformacion.xsd` exactly; the
//! fingerprint and the signature both depend on it.

use std::str::FromStr;

use super::codes::*;
use super::error::{Result, VerifactuError};
use super::format::*;
use super::types::*;
use crate::xml::{Element, ns};

/// Prefix used for the `SuministroInformacion` namespace when writing.
pub const SUM1_PREFIX: &str = "sum1";

fn el(name: &str) -> Element {
    Element::ns(SUM1_PREFIX, ns::SUM1, name)
}

fn leaf(name: &str, text: &str) -> Element {
    el(name).with_text(text)
}

fn flag(parent: &mut Element, name: &str, value: bool) {
    if value {
        parent.push(leaf(name, format_flag(true)));
    }
}

impl Record {
    /// Serialize into a detached `sum1:RegistroAlta` or `sum1:RegistroAnulacion`
    /// element. The record must be sealed.
    pub fn to_xml(&self) -> Result<Element> {
        let fingerprint = self
            .fingerprint
            .as_ref()
            .ok_or_else(|| VerifactuError::missing("Huella"))?;

        let mut root = match &self.variant {
            RecordVariant::Registration(r) => registration_xml(self, r),
            RecordVariant::Cancellation(c) => cancellation_xml(self, c),
        };
        root.push(chain_xml(&self.chain));
        root.push(system_xml(&self.system));
        root.push(leaf(
            "FechaHoraHusoGenRegistro",
            &format_timestamp(&self.generated_at),
        ));
        root.push(leaf("TipoHuella", fingerprint.kind.code()));
        root.push(leaf("Huella", &fingerprint.value));
        Ok(root.declare(SUM1_PREFIX, ns::SUM1))
    }

    /// Compact XML text of [`to_xml`](Self::to_xml).
    pub fn to_xml_string(&self) -> Result<String> {
        self.to_xml()?.to_xml_string()
    }

    /// Read a record from its element, or from the first record element
    /// found below it (e.g. inside a SOAP envelope). Any prefix bound to
    /// the `SuministroInformacion` namespace is accepted; a trailing
    /// `ds:Signature` is ignored.
    pub fn from_xml(element: &Element) -> Result<Record> {
        if let Some(alta) = element.find(ns::SUM1, "RegistroAlta") {
            return registration_from(alta);
        }
        if let Some(anulacion) = element.find(ns::SUM1, "RegistroAnulacion") {
            return cancellation_from(anulacion);
        }
        Err(VerifactuError::MalformedDocument(format!(
            "no RegistroAlta or RegistroAnulacion in {}",
            element.expanded_name()
        )))
    }

    pub fn from_xml_str(xml: &str) -> Result<Record> {
        let root =
            Element::parse(xml).map_err(|e| VerifactuError::MalformedDocument(e.to_string()))?;
        Self::from_xml(&root)
    }
}

// ── Writing ──

fn registration_xml(record: &Record, r: &Registration) -> Element {
    let mut root = el("RegistroAlta");
    root.push(leaf("IDVersion", record.version.code()));
    root.push(
        el("IDFactura")
            .with_child(leaf("IDEmisorFactura", &r.id.issuer_nif))
            .with_child(leaf("NumSerieFactura", &r.id.series_number))
            .with_child(leaf("FechaExpedicionFactura", &format_date(&r.id.issue_date))),
    );
    if let Some(ext) = &r.external_ref {
        root.push(leaf("RefExterna", ext));
    }
    root.push(leaf("NombreRazonEmisor", &r.issuer_name));
    flag(&mut root, "Subsanacion", r.remedy);
    root.push(leaf("TipoFactura", r.invoice_type.code()));

    if let Some(rect) = &r.rectification {
        root.push(leaf("TipoRectificativa", rect.kind.code()));
        let mut list = el("FacturasRectificadas");
        for id in &rect.rectified {
            list.push(invoice_ref_xml("IDFacturaRectificada", id));
        }
        root.push(list);
    }
    if !r.substituted.is_empty() {
        let mut list = el("FacturasSustituidas");
        for id in &r.substituted {
            list.push(invoice_ref_xml("IDFacturaSustituida", id));
        }
        root.push(list);
    }
    if let Some(amounts) = r.rectification.as_ref().and_then(|x| x.amounts.as_ref()) {
        let mut block = el("ImporteRectificacion")
            .with_child(leaf("BaseRectificada", &format_amount(amounts.base)))
            .with_child(leaf("CuotaRectificada", &format_amount(amounts.quota)));
        if let Some(s) = amounts.surcharge_quota {
            block.push(leaf("CuotaRecargoRectificado", &format_amount(s)));
        }
        root.push(block);
    }
    if let Some(date) = &r.operation_date {
        root.push(leaf("FechaOperacion", &format_date(date)));
    }
    root.push(leaf("DescripcionOperacion", &r.description));
    flag(&mut root, "FacturaSimplificadaArt7273", r.simplified_art_7273);
    flag(
        &mut root,
        "FacturaSinIdentifDestinatarioArt61d",
        r.without_recipient_id,
    );
    flag(&mut root, "Macrodato", r.macrodata);

    if !r.recipients.is_empty() {
        let mut list = el("Destinatarios");
        for party in &r.recipients {
            list.push(party_xml("IDDestinatario", party));
        }
        root.push(list);
    }

    let mut desglose = el("Desglose");
    for entry in &r.breakdown {
        desglose.push(breakdown_xml(entry));
    }
    root.push(desglose);
    root.push(leaf("CuotaTotal", &format_amount(r.total_quota)));
    root.push(leaf("ImporteTotal", &format_amount(r.total_amount)));
    root
}

fn cancellation_xml(record: &Record, c: &Cancellation) -> Element {
    let mut root = el("RegistroAnulacion");
    root.push(leaf("IDVersion", record.version.code()));
    root.push(
        el("IDFactura")
            .with_child(leaf("IDEmisorFacturaAnulada", &c.cancelled.issuer_nif))
            .with_child(leaf("NumSerieFacturaAnulada", &c.cancelled.series_number))
            .with_child(leaf(
                "FechaExpedicionFacturaAnulada",
                &format_date(&c.cancelled.issue_date),
            )),
    );
    if let Some(ext) = &c.external_ref {
        root.push(leaf("RefExterna", ext));
    }
    flag(
        &mut root,
        "SinRegistroPrevio",
        c.reason == CancellationReason::NoPriorRecord,
    );
    flag(
        &mut root,
        "RechazoPrevio",
        c.reason == CancellationReason::PriorRejection,
    );
    if let Some(by) = c.generated_by {
        root.push(leaf("GeneradoPor", by.code()));
    }
    if let Some(generator) = &c.generator {
        root.push(party_xml("Generador", generator));
    }
    root
}

fn invoice_ref_xml(name: &str, id: &InvoiceId) -> Element {
    el(name)
        .with_child(leaf("IDEmisorFactura", &id.issuer_nif))
        .with_child(leaf("NumSerieFactura", &id.series_number))
        .with_child(leaf("FechaExpedicionFactura", &format_date(&id.issue_date)))
}

fn party_id_xml(parent: &mut Element, id: &PartyId) {
    match id {
        PartyId::Nif(nif) => parent.push(leaf("NIF", nif)),
        PartyId::Other {
            country,
            id_type,
            id,
        } => {
            let mut other = el("IDOtro");
            if let Some(c) = country {
                other.push(leaf("CodigoPais", c));
            }
            other.push(leaf("IDType", id_type.code()));
            other.push(leaf("ID", id));
            parent.push(other);
        }
    }
}

fn party_xml(name: &str, party: &Party) -> Element {
    let mut e = el(name).with_child(leaf("NombreRazon", &party.name));
    party_id_xml(&mut e, &party.id);
    e
}

fn breakdown_xml(entry: &TaxBreakdownEntry) -> Element {
    let mut d = el("DetalleDesglose");
    if let Some(tax) = entry.tax {
        d.push(leaf("Impuesto", tax.code()));
    }
    if let Some(regime) = entry.regime {
        d.push(leaf("ClaveRegimen", regime.code()));
    }
    match &entry.treatment {
        OperationTreatment::Taxed {
            qualification,
            rate,
            quota,
            surcharge,
        } => {
            d.push(leaf("CalificacionOperacion", qualification.code()));
            d.push(leaf("TipoImpositivo", &format_amount(*rate)));
            d.push(leaf(
                "BaseImponibleOimporteNoSujeto",
                &format_amount(entry.base),
            ));
            d.push(leaf("CuotaRepercutida", &format_amount(*quota)));
            if let Some(s) = surcharge {
                d.push(leaf("TipoRecargoEquivalencia", &format_amount(s.rate)));
                d.push(leaf("CuotaRecargoEquivalencia", &format_amount(s.quota)));
            }
        }
        OperationTreatment::NotSubject { qualification } => {
            d.push(leaf("CalificacionOperacion", qualification.code()));
            d.push(leaf(
                "BaseImponibleOimporteNoSujeto",
                &format_amount(entry.base),
            ));
        }
        OperationTreatment::Exempt { cause } => {
            d.push(leaf("OperacionExenta", cause.code()));
            d.push(leaf(
                "BaseImponibleOimporteNoSujeto",
                &format_amount(entry.base),
            ));
        }
    }
    d
}

fn chain_xml(link: &ChainLink) -> Element {
    let mut enc = el("Encadenamiento");
    match link {
        ChainLink::FirstInChain => enc.push(leaf("PrimerRegistro", "S")),
        ChainLink::Follows(prev) => enc.push(
            el("RegistroAnterior")
                .with_child(leaf("IDEmisorFactura", &prev.id.issuer_nif))
                .with_child(leaf("NumSerieFactura", &prev.id.series_number))
                .with_child(leaf(
                    "FechaExpedicionFactura",
                    &format_date(&prev.id.issue_date),
                ))
                .with_child(leaf("Huella", &prev.fingerprint)),
        ),
    }
    enc
}

fn system_xml(s: &SystemDescriptor) -> Element {
    let mut e = el("SistemaInformatico").with_child(leaf("NombreRazon", &s.producer.name));
    party_id_xml(&mut e, &s.producer.id);
    e.push(leaf("NombreSistemaInformatico", &s.system_name));
    e.push(leaf("IdSistemaInformatico", &s.system_id));
    e.push(leaf("Version", &s.version));
    e.push(leaf("NumeroInstalacion", &s.installation_number));
    e.push(leaf("TipoUsoPosibleSoloVerifactu", format_flag(s.verifactu_only)));
    e.push(leaf("TipoUsoPosibleMultiOT", format_flag(s.multi_taxpayer)));
    e.push(leaf("IndicadorMultiplesOT", format_flag(s.multiple_taxpayers)));
    e
}

// ── Reading ──

fn malformed(msg: String) -> VerifactuError {
    VerifactuError::MalformedDocument(msg)
}

fn required<'a>(parent: &'a Element, name: &str) -> Result<&'a Element> {
    parent
        .child(ns::SUM1, name)
        .ok_or_else(|| malformed(format!("{} has no {name}", parent.name)))
}

fn text(parent: &Element, name: &str) -> Result<String> {
    Ok(required(parent, name)?.text().trim().to_string())
}

fn opt_text(parent: &Element, name: &str) -> Option<String> {
    parent.child_text(ns::SUM1, name)
}

fn code<T: FromStr<Err = VerifactuError>>(parent: &Element, name: &str) -> Result<T> {
    text(parent, name)?
        .parse::<T>()
        .map_err(|e| malformed(e.to_string()))
}

fn opt_code<T: FromStr<Err = VerifactuError>>(parent: &Element, name: &str) -> Result<Option<T>> {
    opt_text(parent, name)
        .map(|s| s.parse::<T>().map_err(|e| malformed(e.to_string())))
        .transpose()
}

fn amount(parent: &Element, name: &str) -> Result<rust_decimal::Decimal> {
    parse_amount(name, &text(parent, name)?)
}

fn opt_amount(parent: &Element, name: &str) -> Result<Option<rust_decimal::Decimal>> {
    opt_text(parent, name)
        .map(|s| parse_amount(name, &s))
        .transpose()
}

fn opt_flag(parent: &Element, name: &str) -> Result<bool> {
    match opt_text(parent, name) {
        Some(s) => parse_flag(name, &s).map_err(|e| malformed(e.to_string())),
        None => Ok(false),
    }
}

fn invoice_ref(e: &Element) -> Result<InvoiceId> {
    Ok(InvoiceId::new(
        text(e, "IDEmisorFactura")?,
        text(e, "NumSerieFactura")?,
        parse_date("FechaExpedicionFactura", &text(e, "FechaExpedicionFactura")?)?,
    ))
}

fn party_id(e: &Element) -> Result<PartyId> {
    if let Some(nif) = opt_text(e, "NIF") {
        return Ok(PartyId::Nif(nif));
    }
    let other = required(e, "IDOtro")?;
    Ok(PartyId::Other {
        country: opt_text(other, "CodigoPais"),
        id_type: code(other, "IDType")?,
        id: text(other, "ID")?,
    })
}

fn party(e: &Element) -> Result<Party> {
    Ok(Party {
        name: text(e, "NombreRazon")?,
        id: party_id(e)?,
    })
}

fn breakdown_entry(d: &Element) -> Result<TaxBreakdownEntry> {
    let base = amount(d, "BaseImponibleOimporteNoSujeto")?;
    let treatment = if let Some(cause) = opt_code::<ExemptionCause>(d, "OperacionExenta")? {
        OperationTreatment::Exempt { cause }
    } else {
        let qualification = text(d, "CalificacionOperacion")?;
        if let Some(q) = NotSubjectQualification::from_code(&qualification) {
            OperationTreatment::NotSubject { qualification: q }
        } else {
            let q = qualification
                .parse::<TaxedQualification>()
                .map_err(|e| malformed(e.to_string()))?;
            let surcharge = match opt_amount(d, "CuotaRecargoEquivalencia")? {
                Some(quota) => Some(Surcharge {
                    rate: opt_amount(d, "TipoRecargoEquivalencia")?.unwrap_or_default(),
                    quota,
                }),
                None => None,
            };
            OperationTreatment::Taxed {
                qualification: q,
                rate: amount(d, "TipoImpositivo")?,
                quota: amount(d, "CuotaRepercutida")?,
                surcharge,
            }
        }
    };
    Ok(TaxBreakdownEntry {
        tax: opt_code(d, "Impuesto")?,
        regime: opt_code(d, "ClaveRegimen")?,
        base,
        treatment,
    })
}

fn chain_from(root: &Element) -> Result<ChainLink> {
    let enc = required(root, "Encadenamiento")?;
    if enc.child(ns::SUM1, "PrimerRegistro").is_some() {
        return Ok(ChainLink::FirstInChain);
    }
    let prev = required(enc, "RegistroAnterior")?;
    Ok(ChainLink::Follows(PreviousRecord {
        id: invoice_ref(prev)?,
        fingerprint: text(prev, "Huella")?,
    }))
}

fn system_from(root: &Element) -> Result<SystemDescriptor> {
    let s = required(root, "SistemaInformatico")?;
    Ok(SystemDescriptor {
        producer: party(s)?,
        system_name: text(s, "NombreSistemaInformatico")?,
        system_id: text(s, "IdSistemaInformatico")?,
        version: text(s, "Version")?,
        installation_number: text(s, "NumeroInstalacion")?,
        verifactu_only: opt_flag(s, "TipoUsoPosibleSoloVerifactu")?,
        multi_taxpayer: opt_flag(s, "TipoUsoPosibleMultiOT")?,
        multiple_taxpayers: opt_flag(s, "IndicadorMultiplesOT")?,
    })
}

fn trailer_from(root: &Element, variant: RecordVariant) -> Result<Record> {
    let version = code(root, "IDVersion")?;
    let chain = chain_from(root)?;
    let system = system_from(root)?;
    let generated_at = parse_timestamp(
        "FechaHoraHusoGenRegistro",
        &text(root, "FechaHoraHusoGenRegistro")?,
    )?;
    let fingerprint = Fingerprint {
        kind: code(root, "TipoHuella")?,
        value: text(root, "Huella")?,
    };
    Ok(Record {
        version,
        variant,
        chain,
        system,
        generated_at,
        fingerprint: Some(fingerprint),
    })
}

fn registration_from(root: &Element) -> Result<Record> {
    let id = invoice_ref(required(root, "IDFactura")?)?;
    let invoice_type: InvoiceType = code(root, "TipoFactura")?;

    let rectification = match opt_code::<RectificationKind>(root, "TipoRectificativa")? {
        Some(kind) => {
            let rectified = match root.child(ns::SUM1, "FacturasRectificadas") {
                Some(list) => list
                    .children_named(ns::SUM1, "IDFacturaRectificada")
                    .map(invoice_ref)
                    .collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            };
            let amounts = match root.child(ns::SUM1, "ImporteRectificacion") {
                Some(block) => Some(RectificationAmounts {
                    base: amount(block, "BaseRectificada")?,
                    quota: amount(block, "CuotaRectificada")?,
                    surcharge_quota: opt_amount(block, "CuotaRecargoRectificado")?,
                }),
                None => None,
            };
            Some(Rectification {
                kind,
                rectified,
                amounts,
            })
        }
        None => None,
    };

    let substituted = match root.child(ns::SUM1, "FacturasSustituidas") {
        Some(list) => list
            .children_named(ns::SUM1, "IDFacturaSustituida")
            .map(invoice_ref)
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let recipients = match root.child(ns::SUM1, "Destinatarios") {
        Some(list) => list
            .children_named(ns::SUM1, "IDDestinatario")
            .map(party)
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let breakdown = required(root, "Desglose")?
        .children_named(ns::SUM1, "DetalleDesglose")
        .map(breakdown_entry)
        .collect::<Result<Vec<_>>>()?;

    let operation_date = opt_text(root, "FechaOperacion")
        .map(|s| parse_date("FechaOperacion", &s))
        .transpose()?;

    let registration = Registration {
        id,
        issuer_name: text(root, "NombreRazonEmisor")?,
        invoice_type,
        rectification,
        substituted,
        operation_date,
        description: text(root, "DescripcionOperacion")?,
        simplified_art_7273: opt_flag(root, "FacturaSimplificadaArt7273")?,
        without_recipient_id: opt_flag(root, "FacturaSinIdentifDestinatarioArt61d")?,
        macrodata: opt_flag(root, "Macrodato")?,
        external_ref: opt_text(root, "RefExterna"),
        remedy: opt_flag(root, "Subsanacion")?,
        recipients,
        breakdown,
        total_quota: amount(root, "CuotaTotal")?,
        total_amount: amount(root, "ImporteTotal")?,
    };
    trailer_from(root, RecordVariant::Registration(registration))
}

fn cancellation_from(root: &Element) -> Result<Record> {
    let id_el = required(root, "IDFactura")?;
    let cancelled = InvoiceId::new(
        text(id_el, "IDEmisorFacturaAnulada")?,
        text(id_el, "NumSerieFacturaAnulada")?,
        parse_date(
            "FechaExpedicionFacturaAnulada",
            &text(id_el, "FechaExpedicionFacturaAnulada")?,
        )?,
    );
    let reason = if opt_flag(root, "SinRegistroPrevio")? {
        CancellationReason::NoPriorRecord
    } else if opt_flag(root, "RechazoPrevio")? {
        CancellationReason::PriorRejection
    } else {
        CancellationReason::Standard
    };
    let generator = root
        .child(ns::SUM1, "Generador")
        .map(party)
        .transpose()?;
    let cancellation = Cancellation {
        cancelled,
        reason,
        generated_by: opt_code(root, "GeneradoPor")?,
        generator,
        external_ref: opt_text(root, "RefExterna"),
    };
    trailer_from(root, RecordVariant::Cancellation(cancellation))
}
