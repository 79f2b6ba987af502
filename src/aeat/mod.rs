//! Submission to the AEAT Verifactu web service.
//!
//! [`Submitter`] runs the full pipeline for an [`InvoiceSnapshot`](crate::core::InvoiceSnapshot);
//! [`SubmissionClient`] sends a prepared [`SubmissionEnvelope`] on its own.
//! Nothing here retries: a failed or timed-out submission has an unknown
//! outcome and the caller decides what to do next.

mod client;
mod config;
mod envelope;
mod response;
mod submitter;

pub use client::{
    HttpTransport, SOAP_ACTION, SendDetails, SendResult, SubmissionClient, TestModeTransport,
    Transport, TransportResponse,
};
pub use config::{
    DEFAULT_TIMEOUT_SECS, Environment, PRODUCTION_ENDPOINT, TEST_ENDPOINT, VerifactuConfig,
};
pub use envelope::{SOAP_PREFIX, SUM_PREFIX, SubmissionEnvelope, extract_record};
pub use response::{
    ProcessedResponse, RecordStatus, ResponseLine, ResponseSummary, SoapFault, SubmissionResponse,
    SubmissionStatus, parse_response, synthetic_success_response,
};
pub use submitter::{
    Clock, FixedClock, IssuerLocks, SubmissionOutcome, SubmissionState, SubmissionTrace,
    Submitter, SystemClock,
};
