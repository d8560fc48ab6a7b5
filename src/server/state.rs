use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::email::EmailService;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub email: Arc<EmailService>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings, email: Arc<EmailService>) -> Self {
        Self {
            settings: Arc::new(settings),
            email,
            start_time: Instant::now(),
        }
    }
}
