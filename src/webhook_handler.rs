use crate::errors::{AppError, ResultExt};
use crate::handlers::AppState;
use crate::lead_normalizer::{normalize_lead, RawLeadInput};
use crate::legacy::convert_to_legacy_format;
use crate::scoring::score_lead_with_options;
use crate::webhook_models::{IdempotencyKey, LeadCreatedResponse, WebhookClaim};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use moka::future::Cache;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Lead-created webhook.
///
/// Receives a raw lead from an external CRM (any field spellings), scores it
/// and stores it. Deliveries are deduplicated for 10 minutes by
/// [`IdempotencyKey`]; a replay returns the id created the first time.
///
/// Authentication: X-Webhook-Token header must match WEBHOOK_SECRET env var
pub async fn lead_created_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<LeadCreatedResponse>), AppError> {
    tracing::info!("Received lead-created webhook");

    // 1. Validate webhook secret (if configured)
    validate_webhook_secret(&state, &headers)?;

    let raw = match payload {
        Value::Object(map) if !map.is_empty() => RawLeadInput::from(map),
        _ => {
            return Err(AppError::BadRequest(
                "Webhook body must be a non-empty JSON object".to_string(),
            ))
        }
    };

    // 2. Idempotency: claim the fingerprint before doing any work
    let key = IdempotencyKey::from_payload(&raw);
    match claim_delivery(&state.webhook_dedupe_cache, &key.fingerprint).await {
        DeliveryClaim::Claimed => {}
        DeliveryClaim::Duplicate(existing) => {
            tracing::info!(
                "Duplicate webhook delivery (external_id={:?}), lead {}",
                key.external_id,
                existing
            );
            return Ok((StatusCode::OK, Json(LeadCreatedResponse::duplicate(existing))));
        }
        DeliveryClaim::InFlight => {
            tracing::warn!(
                "Webhook delivery {} (external_id={:?}) already in progress",
                key,
                key.external_id
            );
            return Err(AppError::Conflict(
                "This delivery is already being processed".to_string(),
            ));
        }
    }

    // 3. Normalize, score, store
    let lead = normalize_lead(&raw);
    let result = score_lead_with_options(&lead, &state.scoring_options);
    let legacy = convert_to_legacy_format(&result);

    let raw_payload = Value::Object(raw.0);
    let stored = state
        .storage()
        .insert_scored_lead(&lead, &raw_payload, key.external_id.as_deref(), &legacy)
        .await
        .context("Failed to store webhook lead");

    let lead_id = match stored {
        Ok(id) => id,
        Err(e) => {
            // Let the CRM's retry through
            state.webhook_dedupe_cache.invalidate(&key.fingerprint).await;
            return Err(e);
        }
    };

    state
        .webhook_dedupe_cache
        .insert(key.fingerprint, WebhookClaim::Stored(lead_id))
        .await;

    tracing::info!(
        "Webhook lead {} ('{}') stored as {} (tier {})",
        lead_id,
        lead.full_name,
        result.classification,
        result.call_priority.tier
    );

    Ok((
        StatusCode::CREATED,
        Json(LeadCreatedResponse::created(lead_id, result, legacy)),
    ))
}

#[derive(Debug, PartialEq, Eq)]
enum DeliveryClaim {
    /// This request owns the delivery.
    Claimed,
    Duplicate(Uuid),
    /// Another request holds the claim and has not stored the lead yet.
    InFlight,
}

/// Atomically mark `fingerprint` as pending, or report who already has it.
async fn claim_delivery(cache: &Cache<String, WebhookClaim>, fingerprint: &str) -> DeliveryClaim {
    let entry = cache
        .entry(fingerprint.to_string())
        .or_insert(WebhookClaim::Pending)
        .await;

    if entry.is_fresh() {
        return DeliveryClaim::Claimed;
    }

    match entry.into_value() {
        WebhookClaim::Stored(id) => DeliveryClaim::Duplicate(id),
        WebhookClaim::Pending => DeliveryClaim::InFlight,
    }
}

/// Validate webhook secret from X-Webhook-Token header
fn validate_webhook_secret(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    // If no secret is configured, skip validation (warn was already logged at startup)
    let Some(ref expected_secret) = state.config.webhook_secret else {
        return Ok(());
    };

    // Header names are case-insensitive in `HeaderMap`
    let token = headers
        .get("X-Webhook-Token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Webhook-Token header".to_string()))?;

    if !constant_time_compare(token, expected_secret) {
        tracing::warn!("Invalid webhook token received");
        return Err(AppError::Unauthorized("Invalid webhook token".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison. Length is not secret.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("s3cret-token", "s3cret-token"));
        assert!(!constant_time_compare("s3cret-token", "s3cret-tokeN"));
        assert!(!constant_time_compare("short", "longer-token"));
        assert!(constant_time_compare("", ""));
    }

    fn dedupe_cache() -> Cache<String, WebhookClaim> {
        Cache::builder().max_capacity(100).build()
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_claim_once() {
        let cache = dedupe_cache();

        let (a, b) = tokio::join!(
            claim_delivery(&cache, "fp-1"),
            claim_delivery(&cache, "fp-1")
        );

        let outcomes = [a, b];
        assert_eq!(
            outcomes.iter().filter(|c| **c == DeliveryClaim::Claimed).count(),
            1
        );
        assert!(outcomes.contains(&DeliveryClaim::InFlight));
    }

    #[tokio::test]
    async fn test_stored_delivery_is_duplicate() {
        let cache = dedupe_cache();
        let id = Uuid::new_v4();

        assert_eq!(claim_delivery(&cache, "fp-2").await, DeliveryClaim::Claimed);
        cache.insert("fp-2".to_string(), WebhookClaim::Stored(id)).await;

        assert_eq!(claim_delivery(&cache, "fp-2").await, DeliveryClaim::Duplicate(id));
    }

    #[tokio::test]
    async fn test_released_claim_can_be_retaken() {
        let cache = dedupe_cache();

        assert_eq!(claim_delivery(&cache, "fp-3").await, DeliveryClaim::Claimed);
        cache.invalidate("fp-3").await;

        assert_eq!(claim_delivery(&cache, "fp-3").await, DeliveryClaim::Claimed);
    }
}
