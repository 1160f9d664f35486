use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration, mapped to `delve.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DelveConfig {
    pub api: ApiConfig,
    pub explorer: ExplorerConfig,
    pub logging: LoggingConfig,
}

// ── API ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the exploration API, e.g. "http://challenge2.airtime.com:10001".
    pub base_url: String,
    /// Sent as the `x-commander-email` header on every request.
    pub commander_email: String,
    /// Per-request timeout in seconds. 0 = no timeout.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://challenge2.airtime.com:10001".into(),
            commander_email: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

// ── Explorer ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Maximum number of commands sent in one batch.
    pub batch_size: usize,
    /// Shuffle newly discovered rooms before pushing them onto a frontier, so
    /// drones fan out over different paths.
    pub shuffle: bool,
    /// When a command comes back with an error, clear the room's in-flight
    /// marker so it can be requested again. When false the room stays marked.
    pub release_on_error: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            shuffle: true,
            release_on_error: true,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "note",
        };
        write!(f, "{}: {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl DelveConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── API base URL ───
        match url::Url::parse(&self.api.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => {
                warnings.push(ConfigWarning {
                    field: "api.base_url".into(),
                    message: format!("unsupported scheme '{}'", url.scheme()),
                    severity: WarningSeverity::Error,
                    hint: Some("Use an http:// or https:// URL".into()),
                });
            }
            Err(e) => {
                warnings.push(ConfigWarning {
                    field: "api.base_url".into(),
                    message: format!("'{}' is not a valid URL: {}", self.api.base_url, e),
                    severity: WarningSeverity::Error,
                    hint: Some("Set to e.g. 'http://challenge2.airtime.com:10001'".into()),
                });
            }
        }

        // ── Commander email ───
        if self.api.commander_email.is_empty() {
            warnings.push(ConfigWarning {
                field: "api.commander_email".into(),
                message: "commander email is empty, the API may reject requests".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set api.commander_email or DELVE_COMMANDER_EMAIL".into()),
            });
        }

        // ── Timeout ───
        if self.api.request_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "api.request_timeout_secs".into(),
                message: "no request timeout, so a hung request stalls every drone".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Batch size ───
        if self.explorer.batch_size == 0 {
            warnings.push(ConfigWarning {
                field: "explorer.batch_size".into(),
                message: "batch size is 0, so drones could never send a command".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 5".into()),
            });
        } else if self.explorer.batch_size < 2 {
            warnings.push(ConfigWarning {
                field: "explorer.batch_size".into(),
                message: "batch size 1 cannot carry a read and an explore together".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Batches of 5 are what the API accepts".into()),
            });
        }

        // ── Error policy ───
        if !self.explorer.release_on_error {
            warnings.push(ConfigWarning {
                field: "explorer.release_on_error".into(),
                message: "rooms whose commands fail stay marked in flight".into(),
                severity: WarningSeverity::Info,
                hint: Some("A drone waiting on such a room will wait forever".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
