use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Browser string sent when the configuration does not name one
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/86.0.4240.75 Safari/537.36";

/// Default number of attempts per logical request
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Main configuration structure for a Dredge client
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Session label used in log lines
    pub name: String,

    /// User-Agent sent when the caller does not set one
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Maximum attempts per logical request (including the first)
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Backoff unit; the wait before attempt N+1 is N times this value
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Optional proxy for all traffic (http, https or socks5)
    pub proxy: Option<String>,

    /// Whole-request transport timeout
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    pub diagnostics: DiagnosticsConfig,

    /// SMTP server for [`crate::mail::send`]
    pub mail: Option<MailConfig>,
}

/// Transaction dump configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Write one trace file per attempt
    pub enabled: bool,

    /// Root directory; each session gets a timestamp-named subdirectory
    #[serde(rename = "dump-dir")]
    pub dump_dir: PathBuf,
}

/// SMTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    pub username: Option<String>,
    pub password: Option<String>,

    /// Sender address, defaults to the username
    pub from: Option<String>,

    #[serde(default)]
    pub security: SmtpSecurity,
}

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS
    #[default]
    Starttls,
    /// TLS from the first byte (SMTPS)
    Tls,
    /// Unencrypted, for local relays only
    None,
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "dredge".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: 1000,
            proxy: None,
            timeout_secs: 60,
            connect_timeout_secs: 30,
            diagnostics: DiagnosticsConfig::default(),
            mail: None,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dump_dir: PathBuf::from("dumps"),
        }
    }
}

impl ClientConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
