use thiserror::Error;

/// Errors that can occur while building, serializing, signing or submitting
/// Verifactu records.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VerifactuError {
    /// A mandatory field was never set. Carries the schema element name.
    #[error("missing mandatory field: {0}")]
    MissingField(String),

    /// A value outside a closed code list.
    #[error("invalid value '{value}' for {field} (allowed: {allowed})")]
    InvalidEnumValue {
        field: String,
        value: String,
        allowed: String,
    },

    /// Fields that are individually valid but contradict each other.
    #[error("inconsistent record: {0}")]
    Inconsistent(String),

    /// Input XML could not be parsed or does not have the expected shape.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// XML generation error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Key or certificate material could not be read.
    #[error("key material not found: {0}")]
    KeyNotFound(String),

    /// Key or certificate material was readable but not usable.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The document carries no `ds:Signature` element.
    #[error("no signature element found in document")]
    SignatureNotFound,

    /// Signature computation or verification error.
    #[error("signature error: {0}")]
    Signature(String),

    /// Network, TLS or timeout failure talking to the AEAT.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The AEAT reply did not match any known response shape.
    #[error("unparsable response: {0}")]
    UnparsableResponse(String),

    /// Validation of a generated document failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Chain state store failure.
    #[error("chain state store error: {0}")]
    Store(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl VerifactuError {
    /// Shorthand for [`VerifactuError::MissingField`].
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    /// Shorthand for [`VerifactuError::InvalidEnumValue`] from a closed code list.
    pub fn invalid_code(field: impl Into<String>, value: impl Into<String>, allowed: &[&str]) -> Self {
        Self::InvalidEnumValue {
            field: field.into(),
            value: value.into(),
            allowed: allowed.join(", "),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VerifactuError>;
