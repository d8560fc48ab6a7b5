//! API layer - HTTP endpoint handlers.

mod email;
mod health;
mod metrics;
mod routes;

// Re-export all handlers for use in server/app.rs
pub use email::{send_email, QueuedResponse};
pub use health::{health, HealthResponse};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
