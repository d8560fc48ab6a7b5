mod settings;

pub use settings::{
    ApiConfig, EmailConfig, LogConfig, LogFormat, QueueConfig, RetryConfig, ServerConfig,
    Settings, ShutdownConfig, SmtpSecurity, TemplatesConfig, TransportConfig,
};
