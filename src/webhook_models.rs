use crate::lead_normalizer::RawLeadInput;
use crate::legacy::LegacyScoreFields;
use crate::scoring::{CallPriority, Classification, ScoreResult};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Keys a CRM uses for its own record id, in precedence order.
pub const EXTERNAL_ID_KEYS: &[&str] = &["id", "external_id", "externalId", "lead_id", "leadId"];

/// Response for `POST /api/v1/webhooks/lead-created`.
///
/// Replays carry only the id of the record created the first time.
#[derive(Debug, Serialize)]
pub struct LeadCreatedResponse {
    pub success: bool,
    pub duplicate: bool,
    pub lead_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_priority: Option<CallPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScoreResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy: Option<LegacyScoreFields>,
}

impl LeadCreatedResponse {
    pub fn duplicate(lead_id: Uuid) -> Self {
        Self {
            success: true,
            duplicate: true,
            lead_id,
            classification: None,
            call_priority: None,
            result: None,
            legacy: None,
        }
    }

    pub fn created(lead_id: Uuid, result: ScoreResult, legacy: LegacyScoreFields) -> Self {
        Self {
            success: true,
            duplicate: false,
            lead_id,
            classification: Some(result.classification),
            call_priority: Some(result.call_priority.clone()),
            result: Some(result),
            legacy: Some(legacy),
        }
    }
}

/// Dedupe-cache entry for a webhook fingerprint.
///
/// `Pending` is written before any work starts so a concurrent retry of the
/// same delivery sees it; it becomes `Stored` once the lead row exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookClaim {
    Pending,
    Stored(Uuid),
}

/// Idempotency key for webhook deliveries.
///
/// SHA-256 of the CRM's record id when present, otherwise of the whole
/// payload (keys are sorted, so field order does not matter).
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct IdempotencyKey {
    pub external_id: Option<String>,
    pub fingerprint: String,
}

impl IdempotencyKey {
    pub fn from_payload(raw: &RawLeadInput) -> Self {
        let external_id = raw.first_string(EXTERNAL_ID_KEYS);

        let mut hasher = Sha256::new();
        match &external_id {
            Some(id) => hasher.update(format!("id:{}", id).as_bytes()),
            None => hasher.update(format!("payload:{}", serde_json::Value::Object(raw.0.clone())).as_bytes()),
        }

        Self {
            external_id,
            fingerprint: hex::encode(hasher.finalize()),
        }
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint)
    }
}
