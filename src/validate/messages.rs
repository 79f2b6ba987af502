//! Rewriting of raw schema messages into readable sentences, plus
//! explanations and remediation hints keyed on the error text.

/// Human labels for Verifactu element names.
const LABELS: &[(&str, &str)] = &[
    ("IDVersion", "Format version"),
    ("IDFactura", "Invoice identifier"),
    ("IDEmisorFactura", "Issuer NIF"),
    ("NumSerieFactura", "Invoice series and number"),
    ("FechaExpedicionFactura", "Issue date"),
    ("IDEmisorFacturaAnulada", "Issuer NIF of the cancelled invoice"),
    ("NumSerieFacturaAnulada", "Series and number of the cancelled invoice"),
    ("FechaExpedicionFacturaAnulada", "Issue date of the cancelled invoice"),
    ("RefExterna", "External reference"),
    ("NombreRazonEmisor", "Issuer name"),
    ("Subsanacion", "Remedy flag"),
    ("TipoFactura", "Invoice type"),
    ("TipoRectificativa", "Rectification type"),
    ("FacturasRectificadas", "Rectified invoices"),
    ("IDFacturaRectificada", "Rectified invoice"),
    ("FacturasSustituidas", "Substituted invoices"),
    ("IDFacturaSustituida", "Substituted invoice"),
    ("ImporteRectificacion", "Rectified amounts"),
    ("BaseRectificada", "Rectified taxable base"),
    ("CuotaRectificada", "Rectified tax quota"),
    ("CuotaRecargoRectificado", "Rectified surcharge quota"),
    ("FechaOperacion", "Operation date"),
    ("DescripcionOperacion", "Operation description"),
    ("Destinatarios", "Recipients"),
    ("IDDestinatario", "Recipient"),
    ("NombreRazon", "Name"),
    ("NIF", "Tax ID"),
    ("IDOtro", "Foreign ID"),
    ("Desglose", "Tax breakdown"),
    ("DetalleDesglose", "Tax breakdown line"),
    ("Impuesto", "Tax"),
    ("ClaveRegimen", "Regime key"),
    ("CalificacionOperacion", "Operation qualification"),
    ("OperacionExenta", "Exemption cause"),
    ("TipoImpositivo", "Tax rate"),
    ("BaseImponibleOimporteNoSujeto", "Taxable base"),
    ("CuotaRepercutida", "Tax quota"),
    ("TipoRecargoEquivalencia", "Surcharge rate"),
    ("CuotaRecargoEquivalencia", "Surcharge quota"),
    ("CuotaTotal", "Total tax quota"),
    ("ImporteTotal", "Total amount"),
    ("Encadenamiento", "Chaining"),
    ("PrimerRegistro", "First record flag"),
    ("RegistroAnterior", "Previous record"),
    ("SistemaInformatico", "Invoicing system"),
    ("FechaHoraHusoGenRegistro", "Generation timestamp"),
    ("TipoHuella", "Fingerprint type"),
    ("Huella", "Fingerprint"),
    ("RegistroAlta", "Registration record"),
    ("RegistroAnulacion", "Cancellation record"),
];

/// Label for an element name, if known.
pub fn label(name: &str) -> Option<&'static str> {
    LABELS.iter().find(|(n, _)| *n == name).map(|(_, l)| *l)
}

/// Rewrite, strip namespaces, annotate. The order matters: the known
/// patterns are recognised on the raw text.
pub fn humanize(raw: &str) -> String {
    let rewritten = rewrite(raw);
    let stripped = strip_namespaces(&rewritten);
    annotate(&stripped)
}

fn rewrite(raw: &str) -> String {
    let Some((element, rest)) = split_element(raw) else {
        return raw.to_string();
    };
    let element_q = format!("'{}'", element);

    if let Some(expected) = rest
        .strip_prefix("Missing child element(s). Expected is ")
        .and_then(parse_expected)
    {
        return format!("Element {element_q} is missing required child element(s): {expected}.");
    }
    if let Some(tail) = rest.strip_prefix("This element is not expected.") {
        return match tail
            .trim()
            .strip_prefix("Expected is ")
            .and_then(parse_expected)
        {
            Some(expected) => {
                format!("Element {element_q} is not allowed here; expected {expected}.")
            }
            None => format!("Element {element_q} is not allowed here."),
        };
    }
    if rest.starts_with("Character content other than whitespace is not allowed") {
        return format!(
            "Element {element_q} has invalid content: text is not allowed, only child elements."
        );
    }
    if rest.starts_with("No matching global declaration available") {
        return format!("Element {element_q} was not found in the schema.");
    }
    if let Some(attr) = rest
        .strip_prefix("The attribute '")
        .and_then(|r| r.strip_suffix("' is required but missing."))
    {
        return format!("Element {element_q} is missing required attribute '{attr}'.");
    }
    if let Some(r) = rest.strip_prefix("[facet 'enumeration'] The value '") {
        if let Some((value, set)) = r.split_once("' is not an element of the set {") {
            let set = set.trim_end_matches('.').trim_end_matches('}');
            return format!(
                "Value '{value}' is not allowed for element {element_q}; allowed values: {set}."
            );
        }
    }
    raw.to_string()
}

/// `Element '{ns}X': rest` → `({ns}X, rest)`.
fn split_element(raw: &str) -> Option<(&str, &str)> {
    let r = raw.strip_prefix("Element '")?;
    let (element, rest) = r.split_once("': ")?;
    Some((element, rest))
}

/// `( a )` or `one of ( a, b ).` → `'a'` / `one of 'a', 'b'`.
fn parse_expected(s: &str) -> Option<String> {
    let s = s.trim().trim_end_matches('.');
    let (one_of, inner) = match s.strip_prefix("one of ") {
        Some(r) => (true, r),
        None => (false, s),
    };
    let inner = inner.strip_prefix('(')?.strip_suffix(')')?.trim();
    let names: Vec<String> = inner
        .split(", ")
        .map(|n| format!("'{}'", n.trim()))
        .collect();
    Some(if one_of {
        format!("one of {}", names.join(", "))
    } else {
        names.join(", ")
    })
}

/// Remove every `{uri}` qualifier.
pub fn strip_namespaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find('{') {
        match rest[open..].find('}') {
            Some(close) if looks_like_uri(&rest[open + 1..open + close]) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            _ => {
                out.push_str(&rest[..=open]);
                rest = &rest[open + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn looks_like_uri(s: &str) -> bool {
    s.contains(':') && !s.contains(' ') && !s.contains('\'')
}

/// `'TipoFactura'` → `'TipoFactura' (Invoice type)`.
fn annotate(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 32);
    let mut rest = s;
    while let Some(open) = rest.find('\'') {
        let Some(len) = rest[open + 1..].find('\'') else {
            break;
        };
        let word = &rest[open + 1..open + 1 + len];
        out.push_str(&rest[..open + len + 2]);
        if let Some(l) = label(word) {
            out.push_str(" (");
            out.push_str(l);
            out.push(')');
        }
        rest = &rest[open + len + 2..];
    }
    out.push_str(rest);
    out
}

/// Context for an error, chosen by substring.
pub fn explain(error: &str) -> &'static str {
    const CONTEXT: &[(&str, &str)] = &[
        (
            "Huella",
            "The fingerprint chains this record to the previous one; the tax agency recomputes it.",
        ),
        (
            "Encadenamiento",
            "Every record must either start the chain or reference the previous record of the issuer.",
        ),
        (
            "TipoFactura",
            "The invoice type decides which blocks are mandatory (F1/F2/F3 invoices, R1-R5 rectifications).",
        ),
        (
            "TipoRectificativa",
            "Rectifications are either substitutive (S) or by differences (I).",
        ),
        (
            "FacturasRectificadas",
            "A rectification must identify the invoices it corrects.",
        ),
        (
            "ImporteTotal",
            "The total amount is the taxable base plus every tax and surcharge quota.",
        ),
        (
            "CuotaTotal",
            "The total quota is the sum of the tax quotas of the breakdown.",
        ),
        (
            "Desglose",
            "The breakdown lists each tax rate or exemption applied to the invoice.",
        ),
        ("Fecha", "Dates use the DD-MM-YYYY format."),
        (
            "SistemaInformatico",
            "Identifies the software that produced the record.",
        ),
        ("NIF", "Spanish tax identifiers have exactly 9 characters."),
        (
            "not allowed here",
            "Elements must appear in the order defined by the schema.",
        ),
        (
            "missing required",
            "A mandatory element of the record is absent.",
        ),
    ];
    CONTEXT
        .iter()
        .find(|(key, _)| error.contains(key))
        .map(|(_, text)| *text)
        .unwrap_or("The document does not match the Verifactu record format.")
}

/// Remediation hint for an error, chosen by substring.
pub fn suggest(error: &str) -> &'static str {
    const HINTS: &[(&str, &str)] = &[
        (
            "Huella",
            "Recompute the fingerprint from the record fields and the previous record's fingerprint.",
        ),
        (
            "TipoFactura",
            "Use one of F1, F2, F3, R1, R2, R3, R4, R5.",
        ),
        (
            "TipoRectificativa",
            "Use S for substitutive or I for rectifications by differences.",
        ),
        (
            "FacturasRectificadas",
            "Add an IDFacturaRectificada with issuer NIF, series number and issue date.",
        ),
        (
            "ImporteTotal",
            "Write the total as a positive number with at most two decimals, e.g. 121.00.",
        ),
        (
            "Fecha",
            "Write dates as DD-MM-YYYY, e.g. 10-08-2025.",
        ),
        (
            "Desglose",
            "Add at least one DetalleDesglose with qualification, base and quota.",
        ),
        (
            "NIF",
            "Check the NIF has 9 characters with no spaces or country prefix.",
        ),
        (
            "not allowed here",
            "Move the element to its schema position or remove it.",
        ),
        (
            "missing required",
            "Add the missing element.",
        ),
        (
            "not a valid value",
            "Correct the value so it matches the expected type.",
        ),
    ];
    HINTS
        .iter()
        .find(|(key, _)| error.contains(key))
        .map(|(_, text)| *text)
        .unwrap_or("Check the record against the Verifactu technical specification.")
}
