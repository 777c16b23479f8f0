use crate::errors::{AppError, ResultExt};
use crate::lead_normalizer::NormalizedLead;
use crate::legacy::LegacyScoreFields;
use crate::summary::LeadSummary;
use bigdecimal::BigDecimal;
use serde_json::{json, Value};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

/// Persistence of canonical leads and their `ai_*` score columns.
///
/// Schema management is out of scope; the `leads` table is expected to exist.
#[derive(Clone)]
pub struct LeadStorage {
    pool: PgPool,
}

/// Largest whole-pound value a `NUMERIC(14, 2)` column holds.
const MAX_STORED_BUDGET: i64 = 999_999_999_999;

/// Whole pounds to `numeric`. Out-of-range amounts are stored as NULL; the
/// full value stays in `normalized_lead`.
fn budget_to_decimal(amount: Option<i64>) -> Option<BigDecimal> {
    match amount {
        Some(value) if !(0..=MAX_STORED_BUDGET).contains(&value) => {
            tracing::warn!("Budget {} outside the storable range, column left empty", value);
            None
        }
        other => other.map(BigDecimal::from),
    }
}

/// Per-sub-score reason lists as one `jsonb` value.
fn breakdown_json(legacy: &LegacyScoreFields) -> Value {
    json!({
        "quality": legacy.ai_quality_reasons,
        "intent": legacy.ai_intent_reasons,
        "confidence": legacy.ai_confidence_reasons,
    })
}

impl LeadStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a freshly scored lead. Returns the new row id.
    pub async fn insert_scored_lead(
        &self,
        lead: &NormalizedLead,
        raw_payload: &Value,
        external_id: Option<&str>,
        legacy: &LegacyScoreFields,
    ) -> Result<Uuid, AppError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO leads (
                id, external_id, full_name, email, phone, status,
                budget_min, budget_max, normalized_lead, raw_payload,
                ai_quality_score, ai_intent_score, ai_confidence_score,
                ai_classification, ai_priority, ai_call_priority, ai_call_priority_reason,
                ai_risk_flags, ai_is_28_day_buyer, ai_low_urgency, ai_is_fake, ai_fake_flags,
                ai_is_disqualified, ai_disqualification_reason, ai_score_breakdown,
                ai_scored_at, created_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25,
                now(), now()
            )
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(external_id)
        .bind(&lead.full_name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(lead.status.as_str())
        .bind(budget_to_decimal(lead.budget_min))
        .bind(budget_to_decimal(lead.budget_max))
        .bind(Json(lead))
        .bind(raw_payload)
        .bind(legacy.ai_quality_score)
        .bind(legacy.ai_intent_score)
        .bind(legacy.ai_confidence_score)
        .bind(&legacy.ai_classification)
        .bind(&legacy.ai_priority)
        .bind(legacy.ai_call_priority)
        .bind(&legacy.ai_call_priority_reason)
        .bind(&legacy.ai_risk_flags)
        .bind(legacy.ai_is_28_day_buyer)
        .bind(legacy.ai_low_urgency)
        .bind(legacy.ai_is_fake)
        .bind(&legacy.ai_fake_flags)
        .bind(legacy.ai_is_disqualified)
        .bind(&legacy.ai_disqualification_reason)
        .bind(breakdown_json(legacy))
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to insert lead '{}'", lead.full_name))?;

        tracing::info!(
            "Stored lead {} ('{}') as {}",
            id,
            lead.full_name,
            legacy.ai_classification
        );

        Ok(id)
    }

    /// Load the canonical record stored for a lead, if the id exists.
    pub async fn fetch_normalized_lead(&self, id: Uuid) -> Result<Option<NormalizedLead>, AppError> {
        let row: Option<Json<NormalizedLead>> =
            sqlx::query_scalar("SELECT normalized_lead FROM leads WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Failed to load lead {}", id))?;

        Ok(row.map(|Json(lead)| lead))
    }

    /// Overwrite the score columns after a re-score.
    pub async fn update_score(&self, id: Uuid, legacy: &LegacyScoreFields) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE leads
            SET ai_quality_score = $2,
                ai_intent_score = $3,
                ai_confidence_score = $4,
                ai_classification = $5,
                ai_priority = $6,
                ai_call_priority = $7,
                ai_call_priority_reason = $8,
                ai_risk_flags = $9,
                ai_is_28_day_buyer = $10,
                ai_low_urgency = $11,
                ai_is_fake = $12,
                ai_fake_flags = $13,
                ai_is_disqualified = $14,
                ai_disqualification_reason = $15,
                ai_score_breakdown = $16,
                ai_scored_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(legacy.ai_quality_score)
        .bind(legacy.ai_intent_score)
        .bind(legacy.ai_confidence_score)
        .bind(&legacy.ai_classification)
        .bind(&legacy.ai_priority)
        .bind(legacy.ai_call_priority)
        .bind(&legacy.ai_call_priority_reason)
        .bind(&legacy.ai_risk_flags)
        .bind(legacy.ai_is_28_day_buyer)
        .bind(legacy.ai_low_urgency)
        .bind(legacy.ai_is_fake)
        .bind(&legacy.ai_fake_flags)
        .bind(legacy.ai_is_disqualified)
        .bind(&legacy.ai_disqualification_reason)
        .bind(breakdown_json(legacy))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to update score for lead {}", id))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Lead {} not found", id)));
        }

        tracing::debug!("Updated score for lead {}: {}", id, legacy.ai_classification);
        Ok(())
    }

    pub async fn store_summary(&self, id: Uuid, summary: &LeadSummary) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE leads
            SET ai_summary = $2,
                ai_next_action = $3,
                ai_recommendations = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&summary.summary)
        .bind(&summary.next_action)
        .bind(&summary.recommendations)
        .execute(&self.pool)
        .await
        .context("Failed to store lead summary")?;

        Ok(())
    }

    /// Lead ids oldest first, optionally capped.
    pub async fn list_lead_ids(&self, limit: Option<i64>) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM leads ORDER BY created_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list leads")?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead_normalizer::{normalize_lead, RawLeadInput};
    use crate::legacy::convert_to_legacy_format;
    use crate::scoring::score_lead_naybourhood;
    use std::str::FromStr;

    #[test]
    fn test_budget_to_decimal() {
        assert_eq!(
            budget_to_decimal(Some(1_500_000)),
            Some(BigDecimal::from_str("1500000").unwrap())
        );
        assert_eq!(budget_to_decimal(None), None);
        assert!(budget_to_decimal(Some(MAX_STORED_BUDGET)).is_some());
        assert_eq!(budget_to_decimal(Some(MAX_STORED_BUDGET + 1)), None);
        assert_eq!(budget_to_decimal(Some(-5)), None);
    }

    #[test]
    fn test_breakdown_json_has_all_sub_scores() {
        let lead = normalize_lead(&RawLeadInput::new().with("full_name", "Tom Hale"));
        let legacy = convert_to_legacy_format(&score_lead_naybourhood(&lead));
        let value = breakdown_json(&legacy);

        assert!(value["quality"].is_array());
        assert!(value["intent"].is_array());
        assert_eq!(
            value["confidence"].as_array().map(|a| a.len()),
            Some(legacy.ai_confidence_reasons.len())
        );
    }
}
