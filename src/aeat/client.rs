//! HTTP transport and the single-shot submission client.

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, error, info, warn};

use super::config::VerifactuConfig;
use super::envelope::SubmissionEnvelope;
use super::response::{SubmissionResponse, parse_response, synthetic_success_response};
use crate::core::error::{Result, VerifactuError};
use crate::sign::KeySource;

pub const SOAP_ACTION: &str = "RegFactuSistemaFacturacion";

/// Raw HTTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Moves one SOAP request to the AEAT and back.
pub trait Transport: Send + Sync {
    /// Network, TLS and timeout problems are [`VerifactuError::Transport`];
    /// any HTTP status is a successful exchange.
    fn post(&self, endpoint: &str, body: &str) -> Result<TransportResponse>;
}

/// reqwest blocking client with the client certificate for mutual TLS.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &VerifactuConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(!config.verify_server);

        if let (Some(cert), Some(key)) = (&config.cert_path, &config.key_path) {
            let mut pem = KeySource::path(cert).read()?;
            pem.push(b'\n');
            pem.extend(KeySource::path(key).read()?);
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| VerifactuError::InvalidKey(format!("client identity: {e}")))?;
            builder = builder.identity(identity);
        }
        if !config.verify_server {
            warn!("server certificate verification disabled");
        }

        let client = builder
            .build()
            .map_err(|e| VerifactuError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post(&self, endpoint: &str, body: &str) -> Result<TransportResponse> {
        let resp = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", SOAP_ACTION)
            .body(body.to_string())
            .send()
            .map_err(|e| VerifactuError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| VerifactuError::Transport(e.to_string()))?;
        Ok(TransportResponse { status, body })
    }
}

/// Answers every request with [`synthetic_success_response`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TestModeTransport;

impl Transport for TestModeTransport {
    fn post(&self, endpoint: &str, _body: &str) -> Result<TransportResponse> {
        debug!(endpoint, "test mode: request not sent");
        Ok(TransportResponse {
            status: 200,
            body: synthetic_success_response(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendDetails {
    Accepted(SubmissionResponse),
    Rejected(SubmissionResponse),
    /// The outcome is unknown; the record may or may not be registered.
    TransportFailed { cause: String },
    Unparsable {
        status: u16,
        body: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub success: bool,
    pub details: SendDetails,
}

/// Sends envelopes. Never retries.
pub struct SubmissionClient {
    endpoint: String,
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for SubmissionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl SubmissionClient {
    /// HTTP client, or [`TestModeTransport`] when `config.test_mode` is set.
    pub fn new(config: &VerifactuConfig) -> Result<Self> {
        config.check()?;
        let transport: Box<dyn Transport> = if config.test_mode {
            Box::new(TestModeTransport)
        } else {
            Box::new(HttpTransport::new(config)?)
        };
        Ok(Self::with_transport(config.endpoint(), transport))
    }

    pub fn with_transport(endpoint: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit one envelope.
    ///
    /// Only serialization problems are returned as `Err`; everything that
    /// happens on the wire ends up in [`SendResult::details`].
    pub fn send(&self, envelope: &SubmissionEnvelope) -> Result<SendResult> {
        let body = envelope.to_xml_string()?;
        Ok(self.send_raw(&body))
    }

    fn send_raw(&self, body: &str) -> SendResult {
        let reply = match self.transport.post(&self.endpoint, body) {
            Ok(reply) => reply,
            Err(e) => {
                error!(endpoint = %self.endpoint, error = %e, "submission transport failed");
                return SendResult {
                    success: false,
                    details: SendDetails::TransportFailed {
                        cause: e.to_string(),
                    },
                };
            }
        };

        match parse_response(&reply.body) {
            Ok(resp) => {
                let summary = resp.summary();
                info!(
                    status = reply.status,
                    success = summary.success,
                    code = summary.code.as_deref().unwrap_or(""),
                    csv = resp.csv().unwrap_or(""),
                    "submission answered"
                );
                SendResult {
                    success: summary.success,
                    details: if summary.success {
                        SendDetails::Accepted(resp)
                    } else {
                        SendDetails::Rejected(resp)
                    },
                }
            }
            Err(e) => {
                error!(status = reply.status, error = %e, "submission reply not understood");
                SendResult {
                    success: false,
                    details: SendDetails::Unparsable {
                        status: reply.status,
                        body: reply.body,
                        reason: e.to_string(),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Party;
    use crate::xml::{Element, ns};

    struct Canned(std::result::Result<TransportResponse, String>);

    impl Transport for Canned {
        fn post(&self, _endpoint: &str, _body: &str) -> Result<TransportResponse> {
            self.0.clone().map_err(VerifactuError::Transport)
        }
    }

    fn envelope() -> SubmissionEnvelope {
        SubmissionEnvelope::new(
            Party::with_nif("Empresa SA", "A39200019"),
            Element::ns("sum1", ns::SUM1, "RegistroAlta"),
        )
    }

    fn client(reply: std::result::Result<TransportResponse, String>) -> SubmissionClient {
        SubmissionClient::with_transport("https://example.invalid/soap", Box::new(Canned(reply)))
    }

    #[test]
    fn test_mode_accepts() {
        let client = SubmissionClient::new(&VerifactuConfig::test_mode()).unwrap();
        let result = client.send(&envelope()).unwrap();
        assert!(result.success);
        assert!(matches!(result.details, SendDetails::Accepted(_)));
    }

    #[test]
    fn transport_failure_is_reported() {
        let result = client(Err("operation timed out".into()))
            .send(&envelope())
            .unwrap();
        assert!(!result.success);
        match result.details {
            SendDetails::TransportFailed { cause } => assert!(cause.contains("timed out")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn html_error_page_is_unparsable() {
        let result = client(Ok(TransportResponse {
            status: 503,
            body: "<html><body>Service Unavailable</body></html>".into(),
        }))
        .send(&envelope())
        .unwrap();
        assert!(!result.success);
        match result.details {
            SendDetails::Unparsable { status, body, .. } => {
                assert_eq!(status, 503);
                assert!(body.contains("Service Unavailable"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn fault_is_rejected() {
        let body = format!(
            r#"<env:Envelope xmlns:env="{}"><env:Body><env:Fault><faultcode>env:Client</faultcode><faultstring>Codigo[4102].Error</faultstring></env:Fault></env:Body></env:Envelope>"#,
            ns::SOAP
        );
        let result = client(Ok(TransportResponse { status: 500, body }))
            .send(&envelope())
            .unwrap();
        assert!(!result.success);
        let SendDetails::Rejected(resp) = result.details else {
            panic!("expected rejection");
        };
        assert_eq!(resp.summary().code.as_deref(), Some("4102"));
    }

    #[test]
    fn live_config_needs_tls_material() {
        let err = SubmissionClient::new(&VerifactuConfig::default()).unwrap_err();
        assert!(matches!(err, VerifactuError::Config(_)));
    }
}
