//! Gate configuration
//!
//! Values come from, in increasing precedence:
//! - Built-in defaults
//! - A `.env` file in the working directory
//! - Process environment variables
//!
//! Bindings that prefer explicit setup can deserialize a [`GateConfig`]
//! from JSON instead.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::gate::VersionGate;
use crate::native::{DynamicLibrary, NativeClient, SimulatedClient};
use crate::version::{VersionRange, HEADER_API_VERSION, MIN_API_VERSION};

/// Which native implementation backs the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Load the real shared library
    #[default]
    Native,
    /// Use the in-process simulation
    Simulated,
}

/// Gate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub backend: Backend,

    /// Explicit path of the native library
    pub library_path: Option<PathBuf>,

    /// Header version handed to the native library; may only lower the
    /// compiled one
    pub header_version: i32,

    /// Range accepted by the simulated backend
    pub simulated_range: VersionRange,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Native,
            library_path: None,
            header_version: HEADER_API_VERSION,
            simulated_range: VersionRange::default(),
        }
    }
}

impl GateConfig {
    /// Load configuration from `.env` and the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Configuration {
            message: format!("Invalid gate configuration JSON: {}", e),
            source: Some(e.into()),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(backend) = lookup("APIGATE_BACKEND") {
            config.backend = match backend.to_lowercase().as_str() {
                "native" => Backend::Native,
                "simulated" => Backend::Simulated,
                other => {
                    return Err(Error::config(format!(
                        "Unknown APIGATE_BACKEND '{}', expected 'native' or 'simulated'",
                        other
                    )))
                }
            };
        }

        if let Some(path) = lookup("APIGATE_NATIVE_LIBRARY") {
            config.library_path = Some(PathBuf::from(path));
        }

        if let Some(header) = lookup("APIGATE_HEADER_VERSION") {
            config.header_version = parse_version("APIGATE_HEADER_VERSION", &header)?;
        }

        // APIGATE_SIMULATED_MIN/MAX override single bounds of the range
        let base = match lookup("APIGATE_SIMULATED_RANGE") {
            Some(range) => Some(range.parse::<VersionRange>()?),
            None => None,
        };
        let sim_min = lookup("APIGATE_SIMULATED_MIN")
            .map(|v| parse_version("APIGATE_SIMULATED_MIN", &v))
            .transpose()?;
        let sim_max = lookup("APIGATE_SIMULATED_MAX")
            .map(|v| parse_version("APIGATE_SIMULATED_MAX", &v))
            .transpose()?;
        if base.is_some() || sim_min.is_some() || sim_max.is_some() {
            config.simulated_range = VersionRange::new(
                sim_min.or(base.map(|r| r.min)).unwrap_or(MIN_API_VERSION),
                sim_max
                    .or(base.map(|r| r.max))
                    .unwrap_or(config.header_version),
            )?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the header version against the compiled bounds
    pub fn validate(&self) -> Result<()> {
        if self.header_version < MIN_API_VERSION || self.header_version > HEADER_API_VERSION {
            return Err(Error::config(format!(
                "Header version {} must be within [{}, {}]",
                self.header_version, MIN_API_VERSION, HEADER_API_VERSION
            )));
        }
        VersionRange::new(self.simulated_range.min, self.simulated_range.max)?;
        Ok(())
    }

    /// Range the gate checks before calling the native library
    pub fn gate_range(&self) -> VersionRange {
        VersionRange::default().capped_at(self.header_version)
    }

    /// Build the configured native client
    pub fn build_native(&self) -> Result<Arc<dyn NativeClient>> {
        Ok(match self.backend {
            Backend::Native => Arc::new(DynamicLibrary::load(self.library_path.as_deref())?),
            Backend::Simulated => Arc::new(SimulatedClient::new(self.simulated_range)),
        })
    }

    /// Build a gate from this configuration.
    ///
    /// A native library that cannot be loaded does not fail here; the gate
    /// reports the linkage error from every selection attempt instead.
    pub fn build_gate(&self) -> Result<VersionGate> {
        self.validate()?;
        let native: Arc<dyn NativeClient> = match self.build_native() {
            Ok(native) => native,
            Err(e) if e.is_fatal() => Arc::new(SimulatedClient::unlinked(e.detail())),
            Err(e) => return Err(e),
        };
        Ok(VersionGate::with_range(native, self.gate_range()))
    }
}

fn parse_version(key: &str, value: &str) -> Result<i32> {
    value.trim().parse().map_err(|e| Error::Configuration {
        message: format!("{} must be an integer, got '{}'", key, value),
        source: Some(anyhow::Error::new(e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GateConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, GateConfig::default());
        assert_eq!(config.gate_range(), VersionRange::new(13, 730).unwrap());
    }

    #[test]
    fn test_simulated_backend_from_env_values() {
        let config = GateConfig::from_lookup(lookup_from(&[
            ("APIGATE_BACKEND", "Simulated"),
            ("APIGATE_HEADER_VERSION", "600"),
            ("APIGATE_SIMULATED_MIN", "100"),
        ]))
        .unwrap();

        assert_eq!(config.backend, Backend::Simulated);
        assert_eq!(config.header_version, 600);
        assert_eq!(config.simulated_range, VersionRange::new(100, 600).unwrap());
        assert_eq!(config.gate_range().max, 600);
    }

    #[test]
    fn test_simulated_range_string() {
        let config = GateConfig::from_lookup(lookup_from(&[
            ("APIGATE_BACKEND", "simulated"),
            ("APIGATE_SIMULATED_RANGE", "100..=500"),
        ]))
        .unwrap();
        assert_eq!(config.simulated_range, VersionRange::new(100, 500).unwrap());

        let config = GateConfig::from_lookup(lookup_from(&[
            ("APIGATE_SIMULATED_RANGE", "100-500"),
            ("APIGATE_SIMULATED_MAX", "450"),
        ]))
        .unwrap();
        assert_eq!(config.simulated_range, VersionRange::new(100, 450).unwrap());
    }

    #[test]
    fn test_invalid_values() {
        for pairs in [
            vec![("APIGATE_BACKEND", "grpc")],
            vec![("APIGATE_SIMULATED_RANGE", "500..=400")],
            vec![("APIGATE_SIMULATED_RANGE", "abc")],
            vec![("APIGATE_HEADER_VERSION", "abc")],
            vec![("APIGATE_HEADER_VERSION", "731")],
            vec![("APIGATE_SIMULATED_MIN", "500"), ("APIGATE_SIMULATED_MAX", "400")],
        ] {
            let err = GateConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
    }

    #[test]
    fn test_from_json() {
        let config = GateConfig::from_json(r#"{"backend": "simulated", "header_version": 620}"#)
            .unwrap();
        assert_eq!(config.backend, Backend::Simulated);
        assert_eq!(config.header_version, 620);
        assert!(config.library_path.is_none());

        assert!(GateConfig::from_json("{not json").is_err());
        assert!(GateConfig::from_json(r#"{"header_version": 5}"#).is_err());
    }

    #[test]
    fn test_unloadable_library_builds_unlinked_gate() {
        let config = GateConfig {
            library_path: Some(PathBuf::from("/nonexistent/libfdb_c.so")),
            ..GateConfig::default()
        };
        let gate = config.build_gate().unwrap();
        let err = gate.select_api_version(600).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NativeLinkageError);
    }

    #[test]
    #[serial]
    fn test_from_process_env() {
        std::env::set_var("APIGATE_BACKEND", "simulated");
        std::env::set_var("APIGATE_HEADER_VERSION", "610");
        let config = GateConfig::from_env();
        std::env::remove_var("APIGATE_BACKEND");
        std::env::remove_var("APIGATE_HEADER_VERSION");

        let config = config.unwrap();
        assert_eq!(config.backend, Backend::Simulated);
        assert_eq!(config.header_version, 610);
    }
}
