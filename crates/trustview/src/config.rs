//! Key/value configuration.
//!
//! A [`Configuration`] is a flat JSON object layered over built-in
//! defaults. Typed snapshots ([`TrustSettings`], [`ValidationSettings`],
//! [`RevocationSettings`]) are extracted once per operation so the engines
//! never read raw keys. A missing or malformed key is a
//! `TrustViewError::Config` at the point of use.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, TrustViewError};
use crate::time::millis_to_micros;
use crate::validation::ValidationResult;

// ── Keys ──────────────────────────────────────────────────────────────────────

pub const OPINION_N: &str = "opinion-n";
pub const OPINION_MAX_F: &str = "opinion-max-f";
pub const QUERY_SERVICES_FOR_CA_CERTS: &str = "query-services-for-ca-certs";
pub const SECURITY_LEVEL_LOW: &str = "security-level-low";
pub const SECURITY_LEVEL_MEDIUM: &str = "security-level-medium";
pub const SECURITY_LEVEL_HIGH: &str = "security-level-high";
pub const VALIDATION_TIMEOUT_MILLIS: &str = "validation-timeout-millis";
pub const REVOCATION_CRL_TIMEOUT_MILLIS: &str = "revocation-crl-timeout-millis";
pub const REVOCATION_OCSP_TIMEOUT_MILLIS: &str = "revocation-ocsp-timeout-millis";
pub const REVOCATION_CHECKING_INTERVAL_MILLIS: &str = "revocation-checking-interval-millis";
pub const WATCHLIST_EXPIRATION_MILLIS: &str = "watchlist-expiration-millis";
pub const ASSESSMENT_EXPIRATION_MILLIS: &str = "assessment-expiration-millis";
pub const BOOTSTRAPPING_MODE: &str = "bootstrapping-mode";
pub const OVERRIDE_VALIDATION_SERVICE_RESULT: &str = "override-validation-service-result";

fn default_values() -> BTreeMap<String, Value> {
    [
        (OPINION_N, json!(10)),
        (OPINION_MAX_F, json!(0.95)),
        (QUERY_SERVICES_FOR_CA_CERTS, json!(false)),
        (SECURITY_LEVEL_LOW, json!(0.7)),
        (SECURITY_LEVEL_MEDIUM, json!(0.85)),
        (SECURITY_LEVEL_HIGH, json!(0.95)),
        (VALIDATION_TIMEOUT_MILLIS, json!(10_000)),
        (REVOCATION_CRL_TIMEOUT_MILLIS, json!(10_000)),
        (REVOCATION_OCSP_TIMEOUT_MILLIS, json!(5_000)),
        (REVOCATION_CHECKING_INTERVAL_MILLIS, json!(3_600_000)),
        (WATCHLIST_EXPIRATION_MILLIS, json!(604_800_000u64)),
        (ASSESSMENT_EXPIRATION_MILLIS, json!(31_536_000_000u64)),
        (BOOTSTRAPPING_MODE, json!(false)),
        (OVERRIDE_VALIDATION_SERVICE_RESULT, json!("off")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Flat key/value configuration table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    values: BTreeMap<String, Value>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            values: default_values(),
        }
    }
}

impl Configuration {
    /// Parse a JSON object and layer it over the defaults.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::InvalidFileFormat` if `json` is not a JSON
    /// object.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let overrides: BTreeMap<String, Value> = serde_json::from_str(json).map_err(|e| {
            TrustViewError::InvalidFileFormat(format!("configuration must be a JSON object: {e}"))
        })?;
        let mut config = Self::default();
        config.values.extend(overrides);
        Ok(config)
    }

    /// Load a configuration file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::Io` or `TrustViewError::InvalidFileFormat`
    /// if the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Typed lookup.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::Config` if the key is absent or its value
    /// does not deserialize into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.values.get(key).ok_or_else(|| TrustViewError::Config {
            key: key.to_string(),
            reason: "missing".to_string(),
        })?;
        serde_json::from_value(value.clone()).map_err(|e| TrustViewError::Config {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Set a value.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::SerializationError` if `value` cannot be
    /// represented as JSON.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| TrustViewError::SerializationError(e.to_string()))?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Builder-style [`set`](Self::set) for values that always encode.
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn unit_interval(&self, key: &str) -> Result<f64> {
        let value: f64 = self.get(key)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(TrustViewError::Config {
                key: key.to_string(),
                reason: format!("{value} is outside [0, 1]"),
            });
        }
        Ok(value)
    }
}

// ── Security levels ───────────────────────────────────────────────────────────

/// Named expectation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Low,
    Medium,
    High,
}

impl SecurityLevel {
    /// The configured threshold for this preset.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::Config` if the preset key is malformed.
    pub fn threshold(self, config: &Configuration) -> Result<f64> {
        config.unit_interval(match self {
            SecurityLevel::Low => SECURITY_LEVEL_LOW,
            SecurityLevel::Medium => SECURITY_LEVEL_MEDIUM,
            SecurityLevel::High => SECURITY_LEVEL_HIGH,
        })
    }
}

impl std::str::FromStr for SecurityLevel {
    type Err = TrustViewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(SecurityLevel::Low),
            "medium" => Ok(SecurityLevel::Medium),
            "high" => Ok(SecurityLevel::High),
            other => Err(TrustViewError::Config {
                key: "security-level".into(),
                reason: format!("unknown preset '{other}'"),
            }),
        }
    }
}

// ── Typed snapshots ───────────────────────────────────────────────────────────

/// Parameters of the trust computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustSettings {
    /// Evidence units needed for full certainty.
    pub opinion_n: u32,
    /// Cap on base rates derived from sibling assessments.
    pub max_f: f64,
    /// Ask the validation service about new CA certificates on an
    /// untrusted verdict.
    pub query_services_for_ca_certs: bool,
}

impl Default for TrustSettings {
    fn default() -> Self {
        Self {
            opinion_n: 10,
            max_f: 0.95,
            query_services_for_ca_certs: false,
        }
    }
}

impl TrustSettings {
    /// # Errors
    ///
    /// Returns `TrustViewError::Config` for missing or malformed keys.
    pub fn from_config(config: &Configuration) -> Result<Self> {
        Ok(Self {
            opinion_n: config.get(OPINION_N)?,
            max_f: config.unit_interval(OPINION_MAX_F)?,
            query_services_for_ca_certs: config.get(QUERY_SERVICES_FOR_CA_CERTS)?,
        })
    }
}

/// Replacement for the external validation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOverride {
    Off,
    Fixed(ValidationResult),
}

impl std::str::FromStr for ServiceOverride {
    type Err = TrustViewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(ServiceOverride::Off),
            "trusted" => Ok(ServiceOverride::Fixed(ValidationResult::Trusted)),
            "untrusted" => Ok(ServiceOverride::Fixed(ValidationResult::Untrusted)),
            "unknown" => Ok(ServiceOverride::Fixed(ValidationResult::Unknown)),
            other => Err(TrustViewError::Config {
                key: OVERRIDE_VALIDATION_SERVICE_RESULT.into(),
                reason: format!("expected trusted, untrusted, unknown or off, got '{other}'"),
            }),
        }
    }
}

/// Dispatcher policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationSettings {
    pub bootstrapping_mode: bool,
    pub service_override: ServiceOverride,
    pub validation_timeout: Duration,
    /// Microseconds.
    pub watchlist_expiration: u64,
    /// Microseconds.
    pub assessment_expiration: u64,
}

impl ValidationSettings {
    /// # Errors
    ///
    /// Returns `TrustViewError::Config` for missing or malformed keys.
    pub fn from_config(config: &Configuration) -> Result<Self> {
        let service_override: String = config.get(OVERRIDE_VALIDATION_SERVICE_RESULT)?;
        Ok(Self {
            bootstrapping_mode: config.get(BOOTSTRAPPING_MODE)?,
            service_override: service_override.parse()?,
            validation_timeout: Duration::from_millis(config.get(VALIDATION_TIMEOUT_MILLIS)?),
            watchlist_expiration: millis_to_micros(config.get(WATCHLIST_EXPIRATION_MILLIS)?),
            assessment_expiration: millis_to_micros(config.get(ASSESSMENT_EXPIRATION_MILLIS)?),
        })
    }
}

/// Revocation checking timeouts and schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevocationSettings {
    pub crl_timeout: Duration,
    pub ocsp_timeout: Duration,
    pub checking_interval: Duration,
}

impl Default for RevocationSettings {
    fn default() -> Self {
        Self {
            crl_timeout: Duration::from_millis(10_000),
            ocsp_timeout: Duration::from_millis(5_000),
            checking_interval: Duration::from_millis(3_600_000),
        }
    }
}

impl RevocationSettings {
    /// # Errors
    ///
    /// Returns `TrustViewError::Config` for missing or malformed keys.
    pub fn from_config(config: &Configuration) -> Result<Self> {
        Ok(Self {
            crl_timeout: Duration::from_millis(config.get(REVOCATION_CRL_TIMEOUT_MILLIS)?),
            ocsp_timeout: Duration::from_millis(config.get(REVOCATION_OCSP_TIMEOUT_MILLIS)?),
            checking_interval: Duration::from_millis(
                config.get(REVOCATION_CHECKING_INTERVAL_MILLIS)?,
            ),
        })
    }
}
