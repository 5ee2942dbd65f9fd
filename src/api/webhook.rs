use crate::api::AppState;
use crate::error::AppError;
use crate::sync::{OrderUpdate, SyncOutcome};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::warn;

const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Provider webhook envelope. The event name is informational; the order
/// payload drives everything.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub event_name: Option<String>,
    pub data: OrderUpdate,
}

fn expected_signature(secret: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

fn verify_signature(
    secret: Option<&str>,
    headers: &HeaderMap,
    body: &str,
) -> Result<(), AppError> {
    let Some(secret) = secret else {
        return Ok(());
    };
    let presented = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing webhook signature".into()))?;

    if !presented.eq_ignore_ascii_case(&expected_signature(secret, body)) {
        return Err(AppError::Unauthorized("Invalid webhook signature".into()));
    }
    Ok(())
}

/// Push path for provider order state. Always answers 200 for well-formed,
/// authenticated deliveries so the provider stops retrying; unknown orders
/// are acknowledged and dropped.
pub async fn settlement_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, AppError> {
    verify_signature(state.config.webhook_secret.as_deref(), &headers, &body)?;

    let envelope: WebhookEnvelope = serde_json::from_str(&body)
        .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {}", e)))?;

    let outcome = state
        .synchronizer
        .apply_update(&envelope.data)
        .await
        .map_err(|e| AppError::Internal(format!("Webhook processing failed: {}", e)))?;

    let received = match outcome {
        SyncOutcome::Applied { record, .. } => {
            serde_json::json!({"received": true, "orderId": record.order_id.as_str(), "status": record.status.as_str()})
        }
        SyncOutcome::UnknownOrder => {
            warn!(
                event = envelope.event_name.as_deref().unwrap_or("unknown"),
                order_id = %envelope.data.id,
                "webhook for untracked order acknowledged"
            );
            serde_json::json!({"received": true, "tracked": false})
        }
    };
    Ok(Json(received))
}
