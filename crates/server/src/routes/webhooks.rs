//! Platform webhook endpoint.
//!
//! Deliveries are verified against the app secret, acknowledged
//! immediately, and processed on a spawned task. Slow downstream work
//! must never trigger platform retry/backoff, so a failed reconciliation
//! is visible only through logs and Sentry, not through redelivery.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde_json::Value;
use sha2::Sha256;

use crate::db::SessionRepository;
use crate::error::AppError;
use crate::state::AppState;
use crate::sync;

type HmacSha256 = Hmac<Sha256>;

/// Build the webhook router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/webhooks", post(receive_webhook))
}

/// Verify a webhook signature: base64(HMAC-SHA256(body)) keyed by the
/// app secret.
fn verify_webhook_hmac(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(signature) = BASE64.decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Receive one webhook delivery: verify, acknowledge, then process on a
/// spawned task.
async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = header(&headers, "X-Shopify-Hmac-Sha256")
        .ok_or_else(|| AppError::Unauthorized("missing webhook signature".to_string()))?;

    let secret = state.config().shopify.api_secret.expose_secret().to_string();
    if !verify_webhook_hmac(&secret, &body, signature) {
        return Err(AppError::Unauthorized(
            "invalid webhook signature".to_string(),
        ));
    }

    let topic = header(&headers, "X-Shopify-Topic")
        .ok_or_else(|| AppError::BadRequest("missing webhook topic".to_string()))?
        .to_string();
    let shop = header(&headers, "X-Shopify-Shop-Domain")
        .ok_or_else(|| AppError::BadRequest("missing shop domain".to_string()))?
        .to_string();

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("malformed webhook body: {e}")))?;

    tokio::spawn(async move {
        if let Err(e) = process_webhook(&state, &topic, &shop, payload).await {
            tracing::error!(error = %e, topic, shop, "webhook processing failed");
            sentry::capture_error(&e);
        }
    });

    Ok(StatusCode::OK)
}

/// Dispatch a verified webhook to the matching workflow.
async fn process_webhook(
    state: &AppState,
    topic: &str,
    shop: &str,
    payload: Value,
) -> Result<(), AppError> {
    match topic {
        "products/update" => {
            let session = require_session(state, shop).await?;
            sync::handle_product_update(state, &session, &payload).await
        }
        "products/delete" => {
            let session = require_session(state, shop).await?;
            let product_id = payload
                .get("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| AppError::BadRequest("delete payload has no id".to_string()))?;
            sync::handle_product_delete(state, &session, product_id).await
        }
        "app/uninstalled" | "shop/redact" => sync::handle_app_uninstalled(state, shop).await,
        // No customer data is retained; acknowledgment is all that's required.
        "customers/data_request" | "customers/redact" => {
            tracing::info!(topic, shop, "customer data webhook acknowledged, nothing stored");
            Ok(())
        }
        _ => {
            tracing::debug!(topic, shop, "ignoring unhandled webhook topic");
            Ok(())
        }
    }
}

async fn require_session(
    state: &AppState,
    shop: &str,
) -> Result<crate::db::ShopSession, AppError> {
    SessionRepository::new(state.pool())
        .get_by_shop(shop)
        .await?
        .ok_or_else(|| AppError::Unauthorized(format!("no session for shop {shop}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_webhook_hmac_accepts_valid_signature() {
        let secret = "hush";
        let body = b"{\"id\":42}";

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("mac");
        mac.update(body);
        let signature = BASE64.encode(mac.finalize().into_bytes());

        assert!(verify_webhook_hmac(secret, body, &signature));
    }

    #[test]
    fn test_verify_webhook_hmac_rejects_tampered_body() {
        let secret = "hush";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("mac");
        mac.update(b"{\"id\":42}");
        let signature = BASE64.encode(mac.finalize().into_bytes());

        assert!(!verify_webhook_hmac(secret, b"{\"id\":43}", &signature));
    }

    #[test]
    fn test_verify_webhook_hmac_rejects_garbage_signature() {
        assert!(!verify_webhook_hmac("hush", b"{}", "not-base64!!!"));
    }
}
