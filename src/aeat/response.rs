//! AEAT reply parsing.
//!
//! Two shapes are recognized: `RespuestaRegFactuSistemaFacturacion` for
//! processed submissions and SOAP faults for requests rejected before
//! processing (schema errors, certificate problems). Anything else is an
//! [`VerifactuError::UnparsableResponse`].

use serde::Serialize;

use crate::core::error::{Result, VerifactuError};
use crate::xml::{Element, ns};

/// `EstadoEnvio`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmissionStatus {
    Correct,
    PartiallyCorrect,
    Incorrect,
}

impl SubmissionStatus {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "Correcto" => Some(Self::Correct),
            "ParcialmenteCorrecto" => Some(Self::PartiallyCorrect),
            "Incorrecto" => Some(Self::Incorrect),
            _ => None,
        }
    }
}

/// `EstadoRegistro`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordStatus {
    Correct,
    /// Registered, but with warnings the issuer should fix.
    AcceptedWithErrors,
    Incorrect,
}

impl RecordStatus {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "Correcto" => Some(Self::Correct),
            "AceptadoConErrores" => Some(Self::AcceptedWithErrors),
            "Incorrecto" => Some(Self::Incorrect),
            _ => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Incorrect)
    }
}

/// One `RespuestaLinea`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseLine {
    pub issuer_nif: Option<String>,
    pub series_number: Option<String>,
    pub issue_date: Option<String>,
    /// `TipoOperacion` (`Alta` / `Anulacion`).
    pub operation: Option<String>,
    pub status: RecordStatus,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

/// `RespuestaRegFactuSistemaFacturacion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedResponse {
    /// Secure verification code, present when anything was registered.
    pub csv: Option<String>,
    pub status: SubmissionStatus,
    /// `TiempoEsperaEnvio` in seconds.
    pub wait_seconds: Option<u32>,
    pub lines: Vec<ResponseLine>,
}

/// `soapenv:Fault`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoapFault {
    pub fault_code: String,
    /// AEAT code taken from a `Codigo[NNNN].` prefix of the fault string.
    pub code: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SubmissionResponse {
    Processed(ProcessedResponse),
    Fault(SoapFault),
}

/// Normalized outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseSummary {
    pub success: bool,
    pub code: Option<String>,
    pub description: Option<String>,
}

impl SubmissionResponse {
    pub fn summary(&self) -> ResponseSummary {
        match self {
            Self::Processed(p) => {
                let success = p.status != SubmissionStatus::Incorrect
                    && p.lines.iter().all(|l| l.status.is_accepted());
                let flagged = p
                    .lines
                    .iter()
                    .find(|l| l.status == RecordStatus::Incorrect)
                    .or_else(|| p.lines.iter().find(|l| l.error_code.is_some()));
                ResponseSummary {
                    success,
                    code: flagged.and_then(|l| l.error_code.clone()),
                    description: flagged.and_then(|l| l.error_description.clone()),
                }
            }
            Self::Fault(f) => ResponseSummary {
                success: false,
                code: f.code.clone(),
                description: Some(f.description.clone()),
            },
        }
    }

    pub fn csv(&self) -> Option<&str> {
        match self {
            Self::Processed(p) => p.csv.as_deref(),
            Self::Fault(_) => None,
        }
    }
}

fn unparsable(msg: impl Into<String>) -> VerifactuError {
    VerifactuError::UnparsableResponse(msg.into())
}

pub fn parse_response(body: &str) -> Result<SubmissionResponse> {
    let root = Element::parse(body).map_err(|e| unparsable(e.to_string()))?;

    if let Some(resp) = root.find(ns::RESPONSE, "RespuestaRegFactuSistemaFacturacion") {
        return processed(resp).map(SubmissionResponse::Processed);
    }
    if let Some(fault) = root.find(ns::SOAP, "Fault") {
        return Ok(SubmissionResponse::Fault(soap_fault(fault)));
    }
    Err(unparsable(format!(
        "unexpected response element '{}'",
        root.expanded_name()
    )))
}

fn processed(resp: &Element) -> Result<ProcessedResponse> {
    let status_text = resp
        .child_text(ns::RESPONSE, "EstadoEnvio")
        .ok_or_else(|| unparsable("EstadoEnvio missing"))?;
    let status = SubmissionStatus::parse(&status_text)
        .ok_or_else(|| unparsable(format!("unknown EstadoEnvio '{status_text}'")))?;
    let wait_seconds = resp
        .child_text(ns::RESPONSE, "TiempoEsperaEnvio")
        .map(|t| {
            t.parse::<u32>()
                .map_err(|_| unparsable(format!("bad TiempoEsperaEnvio '{t}'")))
        })
        .transpose()?;

    let lines = resp
        .children_named(ns::RESPONSE, "RespuestaLinea")
        .map(line)
        .collect::<Result<Vec<_>>>()?;

    Ok(ProcessedResponse {
        csv: resp.child_text(ns::RESPONSE, "CSV").filter(|c| !c.is_empty()),
        status,
        wait_seconds,
        lines,
    })
}

fn line(el: &Element) -> Result<ResponseLine> {
    let status_text = el
        .child_text(ns::RESPONSE, "EstadoRegistro")
        .ok_or_else(|| unparsable("EstadoRegistro missing"))?;
    let status = RecordStatus::parse(&status_text)
        .ok_or_else(|| unparsable(format!("unknown EstadoRegistro '{status_text}'")))?;
    let id = el.child(ns::RESPONSE, "IDFactura");
    let id_field = |name: &str| id.and_then(|i| i.child_text(ns::SUM1, name));
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

    Ok(ResponseLine {
        issuer_nif: id_field("IDEmisorFactura"),
        series_number: id_field("NumSerieFactura"),
        issue_date: id_field("FechaExpedicionFactura"),
        operation: el
            .child(ns::RESPONSE, "Operacion")
            .and_then(|o| o.child_text(ns::SUM1, "TipoOperacion")),
        status,
        error_code: non_empty(el.child_text(ns::RESPONSE, "CodigoErrorRegistro")),
        error_description: non_empty(el.child_text(ns::RESPONSE, "DescripcionErrorRegistro")),
    })
}

fn soap_fault(fault: &Element) -> SoapFault {
    // faultcode / faultstring are unqualified in SOAP 1.1
    let text = |name: &str| {
        fault
            .elements()
            .find(|e| e.name == name)
            .map(|e| e.text().trim().to_string())
            .unwrap_or_default()
    };
    let fault_string = text("faultstring");
    let (code, description) = split_fault_code(&fault_string);
    SoapFault {
        fault_code: text("faultcode"),
        code,
        description,
    }
}

/// `Codigo[4102].El XML no cumple el esquema.` → (`4102`, `El XML no cumple el esquema.`)
fn split_fault_code(s: &str) -> (Option<String>, String) {
    let parsed = s
        .strip_prefix("Codigo[")
        .and_then(|rest| rest.split_once(']'))
        .filter(|(code, _)| !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()));
    match parsed {
        Some((code, tail)) => {
            let description = tail.strip_prefix('.').unwrap_or(tail).trim();
            (Some(code.to_string()), description.to_string())
        }
        None => (None, s.to_string()),
    }
}

/// A structurally complete success reply, used in test mode.
pub fn synthetic_success_response() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><env:Envelope xmlns:env="{soap}"><env:Header/><env:Body><tikR:RespuestaRegFactuSistemaFacturacion xmlns:tikR="{resp}" xmlns:tik="{sum1}"><tikR:CSV>TEST-MODE-CSV</tikR:CSV><tikR:TiempoEsperaEnvio>60</tikR:TiempoEsperaEnvio><tikR:EstadoEnvio>Correcto</tikR:EstadoEnvio><tikR:RespuestaLinea><tikR:Operacion><tik:TipoOperacion>Alta</tik:TipoOperacion></tikR:Operacion><tikR:EstadoRegistro>Correcto</tikR:EstadoRegistro></tikR:RespuestaLinea></tikR:RespuestaRegFactuSistemaFacturacion></env:Body></env:Envelope>"#,
        soap = ns::SOAP,
        resp = ns::RESPONSE,
        sum1 = ns::SUM1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(estado_envio: &str, linea: &str) -> String {
        format!(
            r#"<env:Envelope xmlns:env="{}"><env:Body><tikR:RespuestaRegFactuSistemaFacturacion xmlns:tikR="{}" xmlns:tik="{}"><tikR:TiempoEsperaEnvio>60</tikR:TiempoEsperaEnvio><tikR:EstadoEnvio>{estado_envio}</tikR:EstadoEnvio>{linea}</tikR:RespuestaRegFactuSistemaFacturacion></env:Body></env:Envelope>"#,
            ns::SOAP,
            ns::RESPONSE,
            ns::SUM1
        )
    }

    const REJECTED_LINE: &str = "<tikR:RespuestaLinea><tikR:IDFactura><tik:IDEmisorFactura>A39200019</tik:IDEmisorFactura><tik:NumSerieFactura>F-1</tik:NumSerieFactura><tik:FechaExpedicionFactura>10-08-2025</tik:FechaExpedicionFactura></tikR:IDFactura><tikR:EstadoRegistro>Incorrecto</tikR:EstadoRegistro><tikR:CodigoErrorRegistro>1100</tikR:CodigoErrorRegistro><tikR:DescripcionErrorRegistro>Valor o tipo incorrecto del campo: NIF</tikR:DescripcionErrorRegistro></tikR:RespuestaLinea>";

    #[test]
    fn synthetic_reply_is_success() {
        let resp = parse_response(&synthetic_success_response()).unwrap();
        let summary = resp.summary();
        assert!(summary.success);
        assert_eq!(summary.code, None);
        assert_eq!(resp.csv(), Some("TEST-MODE-CSV"));
    }

    #[test]
    fn rejection_is_normalized() {
        let resp = parse_response(&reply("Incorrecto", REJECTED_LINE)).unwrap();
        let SubmissionResponse::Processed(p) = &resp else {
            panic!("expected processed response");
        };
        assert_eq!(p.wait_seconds, Some(60));
        assert_eq!(p.lines[0].issuer_nif.as_deref(), Some("A39200019"));
        assert_eq!(
            resp.summary(),
            ResponseSummary {
                success: false,
                code: Some("1100".into()),
                description: Some("Valor o tipo incorrecto del campo: NIF".into()),
            }
        );
    }

    #[test]
    fn accepted_with_errors_is_success_with_code() {
        let line = "<tikR:RespuestaLinea><tikR:EstadoRegistro>AceptadoConErrores</tikR:EstadoRegistro><tikR:CodigoErrorRegistro>2000</tikR:CodigoErrorRegistro></tikR:RespuestaLinea>";
        let summary = parse_response(&reply("ParcialmenteCorrecto", line))
            .unwrap()
            .summary();
        assert!(summary.success);
        assert_eq!(summary.code.as_deref(), Some("2000"));
    }

    #[test]
    fn soap_fault_code_extracted() {
        let body = format!(
            r#"<env:Envelope xmlns:env="{}"><env:Body><env:Fault><faultcode>env:Client</faultcode><faultstring>Codigo[4102].El XML no cumple el esquema. Falta informar campo obligatorio.: Huella</faultstring></env:Fault></env:Body></env:Envelope>"#,
            ns::SOAP
        );
        let summary = parse_response(&body).unwrap().summary();
        assert!(!summary.success);
        assert_eq!(summary.code.as_deref(), Some("4102"));
        assert_eq!(
            summary.description.as_deref(),
            Some("El XML no cumple el esquema. Falta informar campo obligatorio.: Huella")
        );
    }

    #[test]
    fn fault_without_code() {
        assert_eq!(split_fault_code("Server busy"), (None, "Server busy".to_string()));
        assert_eq!(split_fault_code("Codigo[].x"), (None, "Codigo[].x".to_string()));
    }

    #[test]
    fn unknown_shapes_are_unparsable() {
        for body in [
            "<html><body>502 Bad Gateway</body></html>",
            "not xml at all <",
            reply("Quizas", "").as_str(),
        ] {
            assert!(matches!(
                parse_response(body),
                Err(VerifactuError::UnparsableResponse(_))
            ));
        }
    }
}
