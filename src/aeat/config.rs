use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, VerifactuError};

pub const PRODUCTION_ENDPOINT: &str =
    "https://www1.agenciatributaria.gob.es/wlpl/TIKE-CONT/ws/SistemaFacturacion/VerifactuSOAP";
pub const TEST_ENDPOINT: &str =
    "https://prewww1.aeat.es/wlpl/TIKE-CONT/ws/SistemaFacturacion/VerifactuSOAP";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which AEAT service to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    /// Pre-production (`prewww1`).
    #[default]
    Test,
}

impl std::str::FromStr for Environment {
    type Err = VerifactuError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "test" | "pre" | "preproduction" => Ok(Self::Test),
            other => Err(VerifactuError::Config(format!(
                "unknown environment '{other}' (expected production or test)"
            ))),
        }
    }
}

/// Submission settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifactuConfig {
    pub environment: Environment,
    /// Overrides the environment's URL.
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    /// Client certificate (PEM) for mutual TLS.
    pub cert_path: Option<PathBuf>,
    /// Private key (PEM) for mutual TLS.
    pub key_path: Option<PathBuf>,
    pub verify_server: bool,
    /// No network: every send gets a synthetic success response.
    pub test_mode: bool,
    /// Private key used for XMLDSig. Records are sent unsigned without it.
    pub signing_key_path: Option<PathBuf>,
    pub signing_cert_path: Option<PathBuf>,
}

impl Default for VerifactuConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cert_path: None,
            key_path: None,
            verify_server: true,
            test_mode: false,
            signing_key_path: None,
            signing_cert_path: None,
        }
    }
}

impl VerifactuConfig {
    /// Offline configuration for integration tests.
    pub fn test_mode() -> Self {
        Self {
            test_mode: true,
            ..Self::default()
        }
    }

    /// Read `VERIFACTU_*` environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `VERIFACTU_ENVIRONMENT` | `test` |
    /// | `VERIFACTU_ENDPOINT` | per environment |
    /// | `VERIFACTU_TIMEOUT_SECS` | `30` |
    /// | `VERIFACTU_CERT_PATH` | required unless test mode |
    /// | `VERIFACTU_KEY_PATH` | required unless test mode |
    /// | `VERIFACTU_VERIFY_SERVER` | `true` |
    /// | `VERIFACTU_TEST_MODE` | `false` |
    /// | `VERIFACTU_SIGNING_KEY_PATH` | unset |
    /// | `VERIFACTU_SIGNING_CERT_PATH` | unset |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let bool_var = |name: &str, default: bool| -> Result<bool> {
            match var(name) {
                None => Ok(default),
                Some(v) => parse_bool(name, &v),
            }
        };

        let config = Self {
            environment: var("VERIFACTU_ENVIRONMENT")
                .map(|v| v.parse::<Environment>())
                .transpose()?
                .unwrap_or_default(),
            endpoint: var("VERIFACTU_ENDPOINT"),
            timeout_secs: var("VERIFACTU_TIMEOUT_SECS")
                .map(|v| {
                    v.trim().parse::<u64>().map_err(|e| {
                        VerifactuError::Config(format!("VERIFACTU_TIMEOUT_SECS: {e}"))
                    })
                })
                .transpose()?
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            cert_path: var("VERIFACTU_CERT_PATH").map(PathBuf::from),
            key_path: var("VERIFACTU_KEY_PATH").map(PathBuf::from),
            verify_server: bool_var("VERIFACTU_VERIFY_SERVER", true)?,
            test_mode: bool_var("VERIFACTU_TEST_MODE", false)?,
            signing_key_path: var("VERIFACTU_SIGNING_KEY_PATH").map(PathBuf::from),
            signing_cert_path: var("VERIFACTU_SIGNING_CERT_PATH").map(PathBuf::from),
        };
        config.check()?;
        Ok(config)
    }

    /// Reject settings that cannot work.
    pub fn check(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(VerifactuError::Config("timeout must be positive".into()));
        }
        if !self.test_mode {
            if self.cert_path.is_none() {
                return Err(VerifactuError::Config(
                    "VERIFACTU_CERT_PATH must be set".into(),
                ));
            }
            if self.key_path.is_none() {
                return Err(VerifactuError::Config("VERIFACTU_KEY_PATH must be set".into()));
            }
        }
        if self.signing_key_path.is_some() != self.signing_cert_path.is_some() {
            return Err(VerifactuError::Config(
                "signing key and signing certificate must be set together".into(),
            ));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> &str {
        match (&self.endpoint, self.environment) {
            (Some(url), _) => url,
            (None, Environment::Production) => PRODUCTION_ENDPOINT,
            (None, Environment::Test) => TEST_ENDPOINT,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(VerifactuError::Config(format!(
            "{name}: expected a boolean, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_in_test_mode() {
        let config = VerifactuConfig::from_lookup(lookup(&[("VERIFACTU_TEST_MODE", "true")])).unwrap();
        assert!(config.test_mode);
        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.endpoint(), TEST_ENDPOINT);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.verify_server);
    }

    #[test]
    fn tls_material_required_outside_test_mode() {
        let err = VerifactuConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("VERIFACTU_CERT_PATH"));

        let config = VerifactuConfig::from_lookup(lookup(&[
            ("VERIFACTU_ENVIRONMENT", "production"),
            ("VERIFACTU_CERT_PATH", "/etc/verifactu/cert.pem"),
            ("VERIFACTU_KEY_PATH", "/etc/verifactu/key.pem"),
            ("VERIFACTU_TIMEOUT_SECS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint(), PRODUCTION_ENDPOINT);
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn endpoint_override() {
        let config = VerifactuConfig {
            endpoint: Some("https://localhost:8443/soap".into()),
            ..VerifactuConfig::test_mode()
        };
        assert_eq!(config.endpoint(), "https://localhost:8443/soap");
    }

    #[test]
    fn bad_values_are_config_errors() {
        for vars in [
            [("VERIFACTU_TEST_MODE", "maybe")],
            [("VERIFACTU_ENVIRONMENT", "staging")],
            [("VERIFACTU_TIMEOUT_SECS", "soon")],
        ] {
            let err = VerifactuConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, VerifactuError::Config(_)), "{err}");
        }
    }

    #[test]
    fn signing_paths_come_in_pairs() {
        let err = VerifactuConfig::from_lookup(lookup(&[
            ("VERIFACTU_TEST_MODE", "1"),
            ("VERIFACTU_SIGNING_KEY_PATH", "/keys/sign.pem"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("together"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: VerifactuConfig =
            serde_json::from_str(r#"{"environment":"production","test_mode":true}"#).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }
}
