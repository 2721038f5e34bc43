//! Configuration types for channel-dl
//!
//! One [`Config`] is built per session. Every option has a default defined in
//! this file, and [`Config::validate`] runs before any work starts.

use crate::error::{Error, Result};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, path::Path, path::PathBuf, time::Duration};

/// Download behavior configuration (directory, policy, concurrency, batching)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download root directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Allowed file extensions, lowercase with leading dot; `""` admits files
    /// without an extension. Deserialized entries are normalized, so `"ZIP"`
    /// becomes `".zip"`.
    #[serde(
        default = "default_allowed_extensions",
        deserialize_with = "deserialize_extensions"
    )]
    pub allowed_extensions: BTreeSet<String>,

    /// Largest attachment accepted, in bytes (default: 1 PiB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Run transfers within a batch (and channels within a run) concurrently
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Maximum in-flight transfers per batch in parallel mode (default: 3)
    #[serde(default = "default_max_concurrent_transfers")]
    pub max_concurrent_transfers: usize,

    /// Number of files per batch (default: 12)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause after every batch (default: 500ms)
    #[serde(default = "default_inter_batch_delay", with = "duration_ms_serde")]
    pub inter_batch_delay: Duration,

    /// Pause between files in sequential mode (default: 100ms)
    #[serde(default = "default_sequential_pacing", with = "duration_ms_serde")]
    pub sequential_pacing: Duration,

    /// Classify and plan, but do not transfer anything
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            allowed_extensions: default_allowed_extensions(),
            max_file_size: default_max_file_size(),
            parallel: true,
            max_concurrent_transfers: default_max_concurrent_transfers(),
            batch_size: default_batch_size(),
            inter_batch_delay: default_inter_batch_delay(),
            sequential_pacing: default_sequential_pacing(),
            dry_run: false,
        }
    }
}

/// On-disk layout of downloaded files
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Put each channel's files in its own directory (default: true)
    #[serde(default = "default_true")]
    pub organize_by_channel: bool,

    /// Put files in a subdirectory named after the message date (default: false)
    #[serde(default)]
    pub organize_by_date: bool,

    /// `strftime` format of the date subdirectory (default: "%Y-%m-%d")
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Names earlier releases used for the same attachment, checked by the
    /// dedup step. Placeholders: `{stem}`, `{ext}`, `{safe_stem}`, `{safe_ext}`,
    /// `{raw_token}`, `{token}`.
    #[serde(default = "default_legacy_name_templates")]
    pub legacy_name_templates: Vec<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            organize_by_channel: true,
            organize_by_date: false,
            date_format: default_date_format(),
            legacy_name_templates: default_legacy_name_templates(),
        }
    }
}

/// Cache lifetimes
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a channel's message listing is reused (default: 300 seconds)
    #[serde(default = "default_message_ttl", with = "duration_serde")]
    pub message_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            message_ttl: default_message_ttl(),
        }
    }
}

/// Connection error handling
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Connection errors tolerated before the run is aborted (default: 5)
    #[serde(default = "default_max_connection_errors")]
    pub max_errors: usize,

    /// Connection timeout handed to the client implementation (default: 30 seconds)
    #[serde(default = "default_connection_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_errors: default_max_connection_errors(),
            timeout: default_connection_timeout(),
        }
    }
}

/// Watch-mode cadence, consumed by a monitoring collaborator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Enable real-time monitoring (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time between polls (default: 15 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Messages checked per poll (default: 50)
    #[serde(default = "default_max_poll_messages")]
    pub max_poll_messages: usize,

    /// Delay before the first poll (default: 5 seconds)
    #[serde(default = "default_startup_delay", with = "duration_serde")]
    pub startup_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: default_poll_interval(),
            max_poll_messages: default_max_poll_messages(),
            startup_delay: default_startup_delay(),
        }
    }
}

/// Log output settings, consumed by the subscriber the embedding application installs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level: trace, debug, info, warn, error (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files (default: "./logs")
    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,

    /// Rotation policy, e.g. "10 MB" or "daily"
    #[serde(default = "default_log_rotation")]
    pub rotation: String,

    /// Retention policy, e.g. "1 week"
    #[serde(default = "default_log_retention")]
    pub retention: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_dir(),
            rotation: default_log_rotation(),
            retention: default_log_retention(),
        }
    }
}

/// Alerting, consumed by an alerting collaborator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Enable alerts (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Keywords that make a file noteworthy
    #[serde(default = "default_alert_keywords")]
    pub keywords: Vec<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keywords: default_alert_keywords(),
        }
    }
}

/// Main configuration for [`ChannelDownloader`](crate::ChannelDownloader)
///
/// Fields are organized into sub-configs:
/// - [`download`](DownloadConfig) - directory, filter policy, concurrency
/// - [`layout`](LayoutConfig) - directory layout and legacy names
/// - [`cache`](CacheConfig) - listing cache lifetime
/// - [`connection`](ConnectionConfig) - connection error budget
/// - [`monitor`](MonitorConfig), [`logging`](LoggingConfig),
///   [`alerts`](AlertConfig) - recognized for collaborators
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// Directory layout
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Cache lifetimes
    #[serde(default)]
    pub cache: CacheConfig,

    /// Connection error handling
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Watch-mode cadence
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Alerting
    #[serde(default)]
    pub alerts: AlertConfig,
}

impl Config {
    /// Parse a JSON configuration and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file and validate it
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&contents)
    }

    /// Download root directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Check the invariants the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        if self.download.batch_size == 0 {
            return Err(Error::config(
                "download.batch_size",
                "batch size must be at least 1",
            ));
        }
        if self.download.max_concurrent_transfers == 0 {
            return Err(Error::config(
                "download.max_concurrent_transfers",
                "at least one concurrent transfer is required",
            ));
        }
        if self.connection.max_errors == 0 {
            return Err(Error::config(
                "connection.max_errors",
                "connection error budget must be at least 1",
            ));
        }
        if let Some(ext) = self
            .download
            .allowed_extensions
            .iter()
            .find(|ext| !ext.is_empty() && (!ext.starts_with('.') || *ext != &ext.to_lowercase()))
        {
            return Err(Error::config(
                "download.allowed_extensions",
                format!("extension {ext:?} must be lowercase and start with a dot"),
            ));
        }
        if self.layout.date_format.trim().is_empty() {
            return Err(Error::config(
                "layout.date_format",
                "date format must not be empty",
            ));
        }
        if StrftimeItems::new(&self.layout.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(Error::config(
                "layout.date_format",
                format!("invalid strftime format {:?}", self.layout.date_format),
            ));
        }
        if let Some(template) = self
            .layout
            .legacy_name_templates
            .iter()
            .find(|t| !t.contains("{stem}") && !t.contains("{safe_stem}"))
        {
            return Err(Error::config(
                "layout.legacy_name_templates",
                format!("template {template:?} must contain {{stem}} or {{safe_stem}}"),
            ));
        }
        Ok(())
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_allowed_extensions() -> BTreeSet<String> {
    const EXTENSIONS: &[&str] = &[
        // Documents
        ".txt", ".doc", ".docx", ".pdf", ".rtf",
        // Data files
        ".csv", ".xls", ".xlsx", ".json", ".xml",
        // Databases
        ".sql", ".db", ".sqlite", ".sqlite3",
        // Logs
        ".log", ".logs",
        // Archives
        ".zip", ".rar", ".7z", ".tar", ".gz",
        // Config files
        ".cfg", ".conf", ".ini", ".env",
        // Source files
        ".py", ".js", ".php", ".html", ".css",
        // Files without an extension
        "",
    ];

    EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

/// Lowercase an extension and give it a leading dot; `""` stays empty
fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

fn deserialize_extensions<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(raw.iter().map(|ext| normalize_extension(ext)).collect())
}

fn default_max_file_size() -> u64 {
    1024 * 1024 * 1024 * 1024 * 1024
}

fn default_max_concurrent_transfers() -> usize {
    3
}

fn default_batch_size() -> usize {
    12
}

fn default_inter_batch_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_sequential_pacing() -> Duration {
    Duration::from_millis(100)
}

fn default_true() -> bool {
    true
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_legacy_name_templates() -> Vec<String> {
    vec![
        "{stem}_password-{raw_token}{ext}".to_string(),
        "{stem}_password-NOPASSWORD{ext}".to_string(),
        "{stem}{ext}".to_string(),
    ]
}

fn default_message_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_max_connection_errors() -> usize {
    5
}

fn default_connection_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_max_poll_messages() -> usize {
    50
}

fn default_startup_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_log_rotation() -> String {
    "10 MB".to_string()
}

fn default_log_retention() -> String {
    "1 week".to_string()
}

fn default_alert_keywords() -> Vec<String> {
    [
        "stealer",
        "logs",
        "credentials",
        "passwords",
        "cookies",
        "crypto",
        "wallet",
        "banking",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
