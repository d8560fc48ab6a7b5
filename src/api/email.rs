use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::email::SendRequest;
use crate::error::{AppError, Result};
use crate::server::AppState;

/// Response for an accepted send
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedResponse {
    /// Always true; delivery happens in the background
    pub queued: bool,
    /// Id carried by the delivery logs for this send
    pub job_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/v1/emails - queue one email for delivery
pub async fn send_email(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>)> {
    if request.to.iter().all(|recipient| recipient.trim().is_empty()) {
        return Err(AppError::Validation(
            "`to` must name at least one recipient".to_string(),
        ));
    }

    let job_id = state.email.try_send(request)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            queued: true,
            job_id,
            timestamp: Utc::now(),
        }),
    ))
}
