use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::dispatch::{BackoffConfig, RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Absent until configured; the email service refuses to start without it
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Display name used in the default sender
    pub name: String,
    /// Default sender address
    pub from: String,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl EmailConfig {
    pub fn new(name: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            transport: TransportConfig::default(),
        }
    }

    /// `"Name" <address>`, used when a request names no sender
    pub fn default_from(&self) -> String {
        format!("\"{}\" <{}>", self.name, self.from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS
    #[default]
    StartTls,
    /// Implicit TLS (SMTPS)
    Tls,
    /// No encryption, local relays only
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Transport backend: "smtp" or "log"
    #[serde(default = "default_transport_backend")]
    pub backend: String,
    #[serde(default = "default_smtp_host")]
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub security: SmtpSecurity,
    /// SMTP command timeout in seconds
    #[serde(default = "default_transport_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesConfig {
    /// Directory template files are read from
    #[serde(default = "default_templates_dir")]
    pub dir: String,
    /// Logical name of the shared layout
    #[serde(default = "default_layout")]
    pub layout: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub jitter_factor: f64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retries,
            BackoffConfig {
                initial_delay_ms: self.initial_delay_ms,
                max_delay_ms: self.max_delay_ms,
                multiplier: self.multiplier,
                jitter_factor: self.jitter_factor.clamp(0.0, 1.0),
            },
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Deliveries allowed in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// How long to wait for queued deliveries on shutdown
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_seconds: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_transport_backend() -> String {
    "smtp".to_string()
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_transport_timeout() -> u64 {
    30
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

fn default_layout() -> String {
    "layout.html".to_string()
}

fn default_retries() -> u32 {
    crate::dispatch::DEFAULT_RETRIES
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_concurrency() -> usize {
    crate::dispatch::DEFAULT_CONCURRENCY
}

fn default_drain_timeout() -> u64 {
    30
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8082)?
            .set_default("templates.dir", "templates")?
            .set_default("templates.layout", "layout.html")?
            .set_default("queue.concurrency", 1)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // MAILER__EMAIL__FROM, MAILER__EMAIL__TRANSPORT__HOST, MAILER__SERVER__PORT, etc.
            .add_source(
                Environment::with_prefix("MAILER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            api: ApiConfig::default(),
            email: None,
            templates: TemplatesConfig::default(),
            retry: RetryConfig::default(),
            queue: QueueConfig::default(),
            log: LogConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            backend: default_transport_backend(),
            host: default_smtp_host(),
            port: None,
            username: None,
            password: None,
            security: SmtpSecurity::default(),
            timeout_seconds: default_transport_timeout(),
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: default_templates_dir(),
            layout: default_layout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_factor: 0.0,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_seconds: default_drain_timeout(),
        }
    }
}
