// Shared components
pub mod config;
pub mod error;
pub mod metrics;

// Domain layer
pub mod dispatch;
pub mod email;
pub mod template;
pub mod transport;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod shutdown;
pub mod telemetry;
