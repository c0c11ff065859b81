//! Exporter configuration.
//!
//! Loaded from a single YAML file. Every field carries a default so a
//! minimal configuration only needs the LDAP connection details.

use std::{fs::File, io, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LoggingConfig;

/// Error type used when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unable to read the configuration file.
    #[error("unable to read configuration file: {0}")]
    Io(#[from] io::Error),
    /// Configuration file is not valid YAML or has unexpected shape.
    #[error("unable to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// Configuration parsed but fails a semantic requirement.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Storage flavor below the LDBM plugin.
///
/// 389-DS exposes a different set of cache attributes for each flavor, so
/// the choice decides which database collectors get registered.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Berkeley DB.
    Bdb,
    /// LMDB, the default since 389-DS 3.x.
    #[default]
    Mdb,
}

/// Top-level exporter configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    /// Collector selection and shutdown behavior.
    #[serde(default)]
    pub global: GlobalConfig,
    /// HTTP listener configuration.
    #[serde(default)]
    pub http: HttpConfig,
    /// Directory server connection and pool configuration.
    #[serde(default)]
    pub ldap: LdapConfig,
    /// Logging subscribers.
    #[serde(default, rename = "log")]
    pub logging: LoggingConfig,
}

/// Collector selection and shutdown behavior.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Grace period for in-flight requests on shutdown.
    #[serde(
        default = "GlobalConfig::default_shutdown_timeout",
        with = "humantime_serde"
    )]
    pub shutdown_timeout: Duration,
    /// Storage flavor of the monitored instance.
    #[serde(default)]
    pub backend: BackendType,
    /// LDBM backend names to export per-database cache metrics for.
    #[serde(default)]
    pub backends: Vec<String>,
    /// Entries to export `numSubordinates` for.
    #[serde(default)]
    pub num_subordinate_entries: Vec<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: Self::default_shutdown_timeout(),
            backend: BackendType::default(),
            backends: Vec::new(),
            num_subordinate_entries: Vec::new(),
        }
    }
}

impl GlobalConfig {
    /// Default value for [`Self::shutdown_timeout`].
    #[must_use]
    #[inline]
    fn default_shutdown_timeout() -> Duration {
        Duration::from_secs(10)
    }
}

/// HTTP listener configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Host/address and port to listen on.
    #[serde(default = "HttpConfig::default_listen")]
    pub listen: String,
    /// URL path of the Prometheus exposition endpoint.
    #[serde(default = "HttpConfig::default_metrics_path")]
    pub metrics_path: String,
    /// Maximum allowed time to wait for a client to send request headers.
    ///
    /// Connections without a complete header within this time are closed.
    #[serde(
        default = "HttpConfig::default_header_read_timeout",
        with = "humantime_serde"
    )]
    pub header_read_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: Self::default_listen(),
            metrics_path: Self::default_metrics_path(),
            header_read_timeout: Self::default_header_read_timeout(),
        }
    }
}

impl HttpConfig {
    /// Default value for [`Self::listen`].
    #[must_use]
    #[inline]
    fn default_listen() -> String {
        "0.0.0.0:9389".into()
    }

    /// Default value for [`Self::metrics_path`].
    #[must_use]
    #[inline]
    fn default_metrics_path() -> String {
        "/metrics".into()
    }

    /// Default value for [`Self::header_read_timeout`].
    #[must_use]
    #[inline]
    fn default_header_read_timeout() -> Duration {
        Duration::from_secs(5)
    }
}

/// Directory server connection settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LdapConfig {
    /// Server URL, `ldap://`, `ldaps://` or `ldapi://` scheme.
    #[serde(default = "LdapConfig::default_server_url")]
    pub server_url: String,
    /// DN to bind as. Needs read access below `cn=monitor`.
    #[serde(default)]
    pub bind_dn: String,
    /// Password for the bind DN.
    #[serde(default)]
    pub bind_password: String,
    /// Skip server certificate verification on TLS connections.
    #[serde(default)]
    pub tls_skip_verify: bool,
    /// Network timeout for establishing a connection.
    #[serde(
        default = "LdapConfig::default_dial_timeout",
        with = "humantime_serde"
    )]
    pub dial_timeout: Duration,
    /// Connection pool tuning.
    #[serde(default)]
    pub pool: PoolSettings,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            server_url: Self::default_server_url(),
            bind_dn: String::new(),
            bind_password: String::new(),
            tls_skip_verify: false,
            dial_timeout: Self::default_dial_timeout(),
            pool: PoolSettings::default(),
        }
    }
}

impl LdapConfig {
    /// Default value for [`Self::server_url`].
    #[must_use]
    #[inline]
    fn default_server_url() -> String {
        "ldap://localhost:389".into()
    }

    /// Default value for [`Self::dial_timeout`].
    #[must_use]
    #[inline]
    fn default_dial_timeout() -> Duration {
        Duration::from_secs(5)
    }
}

/// Connection pool tuning.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PoolSettings {
    /// Upper bound on open connections to the directory. Zero means
    /// unbounded.
    #[serde(default = "PoolSettings::default_max_connections")]
    pub max_connections: usize,
    /// Maximum time a connection may sit idle before being closed.
    /// Zero disables idle aging.
    #[serde(
        default = "PoolSettings::default_max_idle_time",
        with = "humantime_serde"
    )]
    pub max_idle_time: Duration,
    /// Maximum wall-clock age of a connection. Zero disables lifetime aging.
    #[serde(
        default = "PoolSettings::default_max_life_time",
        with = "humantime_serde"
    )]
    pub max_life_time: Duration,
    /// How long one collector scrape may wait for a pooled connection.
    #[serde(
        default = "PoolSettings::default_acquire_timeout",
        with = "humantime_serde"
    )]
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: Self::default_max_connections(),
            max_idle_time: Self::default_max_idle_time(),
            max_life_time: Self::default_max_life_time(),
            acquire_timeout: Self::default_acquire_timeout(),
        }
    }
}

impl PoolSettings {
    /// Default value for [`Self::max_connections`].
    #[must_use]
    #[inline]
    fn default_max_connections() -> usize {
        4
    }

    /// Default value for [`Self::max_idle_time`].
    #[must_use]
    #[inline]
    fn default_max_idle_time() -> Duration {
        Duration::from_secs(90)
    }

    /// Default value for [`Self::max_life_time`].
    #[must_use]
    #[inline]
    fn default_max_life_time() -> Duration {
        Duration::from_secs(30 * 60)
    }

    /// Default value for [`Self::acquire_timeout`].
    #[must_use]
    #[inline]
    fn default_acquire_timeout() -> Duration {
        Duration::from_secs(3)
    }
}

impl ExporterConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }

    /// Check semantic requirements that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.ldap.server_url;
        if !["ldap://", "ldaps://", "ldapi://"]
            .iter()
            .any(|scheme| url.starts_with(scheme))
        {
            return Err(ConfigError::Invalid(format!(
                "ldap.server_url has unsupported scheme: '{url}'"
            )));
        }
        if self.ldap.bind_dn.is_empty() {
            return Err(ConfigError::Invalid("ldap.bind_dn must be set".into()));
        }
        if !self.http.metrics_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "http.metrics_path must start with '/': '{}'",
                self.http.metrics_path
            )));
        }
        Ok(())
    }

    /// Render the effective configuration as YAML with the bind password
    /// masked, for `--check-config` and startup logging.
    #[must_use]
    pub fn to_redacted_yaml(&self) -> String {
        let mut masked = self.clone();
        if !masked.ldap.bind_password.is_empty() {
            masked.ldap.bind_password = "*****".into();
        }
        serde_yaml::to_string(&masked).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_fills_defaults() {
        let cfg: ExporterConfig = serde_yaml::from_str(
            r#"
            ldap:
              server_url: ldaps://ds.example.org:636
              bind_dn: cn=monitor,cn=config
              bind_password: hunter2
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.http.listen, "0.0.0.0:9389");
        assert_eq!(cfg.http.metrics_path, "/metrics");
        assert_eq!(cfg.ldap.pool.max_connections, 4);
        assert_eq!(cfg.global.backend, BackendType::Mdb);
        assert_eq!(cfg.global.shutdown_timeout, Duration::from_secs(10));
        cfg.validate().expect("valid");
    }

    #[test]
    fn durations_use_humantime() {
        let cfg: ExporterConfig = serde_yaml::from_str(
            r#"
            ldap:
              bind_dn: cn=x
              pool:
                max_idle_time: 90s
                max_life_time: 30m
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.ldap.pool.max_idle_time, Duration::from_secs(90));
        assert_eq!(cfg.ldap.pool.max_life_time, Duration::from_secs(1800));
    }

    #[test]
    fn validation_rejects_bad_scheme_and_empty_bind_dn() {
        let mut cfg = ExporterConfig::default();
        cfg.ldap.server_url = "http://nope".into();
        cfg.ldap.bind_dn = "cn=x".into();
        assert!(cfg.validate().is_err());

        let mut cfg = ExporterConfig::default();
        cfg.ldap.bind_dn.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn redaction_masks_password() {
        let mut cfg = ExporterConfig::default();
        cfg.ldap.bind_password = "hunter2".into();
        let rendered = cfg.to_redacted_yaml();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("*****"));
    }
}
