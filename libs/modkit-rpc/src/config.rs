//! Wrapper configuration: exposure policy and fault/log naming tables.
//!
//! Two loading mechanisms are provided:
//!
//! 1. **Module section** (`from_provider`): reads `modules.<name>.config` from a host
//!    configuration provider and falls back to defaults when the section is missing.
//! 2. **Figment** (`from_figment` / `load`): defaults, then an optional YAML file, then
//!    `RPC_WRAPPER__*` environment variables.
//!
//! Both are read once at startup; the result is immutable for the lifetime of the wrapper.

use std::collections::BTreeMap;
use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Environment prefix used by [`RpcWrapperConfig::load`].
pub const ENV_PREFIX: &str = "RPC_WRAPPER__";

/// Configuration error for wrapper config loading
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid config for module '{module}': {source}")]
    InvalidConfig {
        module: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to load wrapper config: {0}")]
    Figment(#[from] Box<figment::Error>),
}

/// Provider of module-specific configuration (raw JSON sections only).
pub trait ConfigProvider: Send + Sync {
    /// Returns raw JSON section for the module, if any.
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;
}

/// A whole host configuration document with a top-level `modules` object.
impl ConfigProvider for serde_json::Value {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.get("modules")?.get(module_name)
    }
}

/// What undeclared errors reveal, and what the audit log records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExposurePolicy {
    /// Show type, code, message and trace of undeclared errors to callers.
    pub expose_internal_details: bool,
    /// Attach full traces to audit entries.
    pub log_stack_traces: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RpcWrapperConfig {
    pub expose_internal_details: bool,
    pub log_stack_traces: bool,
    /// Leading namespace segments dropped from a declared fault's type identifier to
    /// form its detail; the last segment is always kept.
    pub detail_strip_segments: usize,
    /// Namespace segment of the raising type used as the audit log group.
    pub log_group_segment: usize,
    /// Explicit fault details by declared fault type identifier.
    pub fault_codes: BTreeMap<String, String>,
    /// Explicit audit log groups by type namespace prefix.
    pub log_groups: BTreeMap<String, String>,
}

impl Default for RpcWrapperConfig {
    fn default() -> Self {
        Self {
            expose_internal_details: false,
            log_stack_traces: false,
            detail_strip_segments: 4,
            log_group_segment: 1,
            fault_codes: BTreeMap::new(),
            log_groups: BTreeMap::new(),
        }
    }
}

impl RpcWrapperConfig {
    #[must_use]
    pub fn exposure_policy(&self) -> ExposurePolicy {
        ExposurePolicy {
            expose_internal_details: self.expose_internal_details,
            log_stack_traces: self.log_stack_traces,
        }
    }

    /// Lenient loader over a module config section.
    ///
    /// - module not present → defaults
    /// - no `config` field → defaults
    /// - module value not an object → defaults
    /// - `config` present but invalid → `InvalidConfig`
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidConfig` if the `config` field exists but is malformed.
    pub fn from_provider(
        provider: &dyn ConfigProvider,
        module_name: &str,
    ) -> Result<Self, ConfigError> {
        let Some(module_raw) = provider.get_module_config(module_name) else {
            tracing::debug!(module = module_name, "no wrapper config section, using defaults");
            return Ok(Self::default());
        };

        let Some(config_section) = module_raw.as_object().and_then(|obj| obj.get("config")) else {
            tracing::debug!(
                module = module_name,
                "module section has no config object, using defaults"
            );
            return Ok(Self::default());
        };

        serde_json::from_value(config_section.clone()).map_err(|e| ConfigError::InvalidConfig {
            module: module_name.to_owned(),
            source: e,
        })
    }

    /// Extracts the config from a prepared figment.
    ///
    /// # Errors
    /// Returns `ConfigError::Figment` if extraction fails.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(|e| ConfigError::Figment(Box::new(e)))
    }

    /// Defaults, then `yaml_path` if given, then `RPC_WRAPPER__*` environment variables.
    ///
    /// # Errors
    /// Returns `ConfigError::Figment` if a source is malformed.
    pub fn load(yaml_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = yaml_path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        let config = Self::from_figment(&figment)?;
        tracing::info!(
            expose_internal_details = config.expose_internal_details,
            log_stack_traces = config.log_stack_traces,
            "rpc wrapper config loaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn defaults_do_not_leak_internals() {
        let cfg = RpcWrapperConfig::default();
        assert_eq!(cfg.exposure_policy(), ExposurePolicy::default());
        assert!(!cfg.expose_internal_details);
        assert_eq!(cfg.detail_strip_segments, 4);
        assert_eq!(cfg.log_group_segment, 1);
    }

    // ========== Tests for the module section loader ==========

    #[test]
    fn provider_section_is_parsed() {
        let host = json!({
            "modules": {
                "soap": {
                    "config": {
                        "expose_internal_details": true,
                        "fault_codes": { "Acme\\Overdraft": "OVERDRAFT" }
                    }
                }
            }
        });
        let cfg = RpcWrapperConfig::from_provider(&host, "soap").unwrap();
        assert!(cfg.expose_internal_details);
        assert!(!cfg.log_stack_traces);
        assert_eq!(cfg.fault_codes.get("Acme\\Overdraft").map(String::as_str), Some("OVERDRAFT"));
    }

    #[test]
    fn missing_module_or_section_uses_defaults() {
        let host = json!({ "modules": { "soap": { "database": {} } } });
        assert_eq!(
            RpcWrapperConfig::from_provider(&host, "soap").unwrap(),
            RpcWrapperConfig::default()
        );
        assert_eq!(
            RpcWrapperConfig::from_provider(&host, "other").unwrap(),
            RpcWrapperConfig::default()
        );
    }

    #[test]
    fn non_object_module_uses_defaults() {
        for module in [json!("nope"), json!(null), json!([1, 2])] {
            let host = json!({ "modules": { "soap": module } });
            assert_eq!(
                RpcWrapperConfig::from_provider(&host, "soap").unwrap(),
                RpcWrapperConfig::default()
            );
        }
    }

    #[test]
    fn malformed_config_is_rejected() {
        let host = json!({ "modules": { "soap": { "config": { "expose_everything": true } } } });
        match RpcWrapperConfig::from_provider(&host, "soap") {
            Err(ConfigError::InvalidConfig { module, .. }) => assert_eq!(module, "soap"),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    // ========== Tests for figment loading ==========

    #[test]
    fn yaml_and_env_layers_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_stack_traces: true\ndetail_strip_segments: 2").unwrap();

        temp_env::with_vars(
            [("RPC_WRAPPER__EXPOSE_INTERNAL_DETAILS", Some("true"))],
            || {
                let cfg = RpcWrapperConfig::load(Some(file.path())).unwrap();
                assert!(cfg.log_stack_traces);
                assert!(cfg.expose_internal_details);
                assert_eq!(cfg.detail_strip_segments, 2);
                assert_eq!(cfg.log_group_segment, 1);
            },
        );
    }

    #[test]
    fn unknown_yaml_keys_fail_loading() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "expose_everything: true").unwrap();
        assert!(matches!(
            RpcWrapperConfig::load(Some(file.path())),
            Err(ConfigError::Figment(_))
        ));
    }
}
