use crate::config::Config;
use crate::db_storage::LeadStorage;
use crate::errors::{AppError, ResultExt};
use crate::lead_normalizer::{normalize_lead, NormalizedLead, RawLeadInput};
use crate::legacy::{convert_to_legacy_format, LegacyScoreFields};
use crate::scoring::{score_lead_with_options, Classification, ScoreResult, ScoringOptions};
use crate::summary::{generate_summary_with_fallback, LeadSummary, LlmSummaryClient, SummaryGenerator};
use crate::webhook_handler;
use crate::webhook_models::WebhookClaim;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub scoring_options: ScoringOptions,
    /// LLM summaries when configured; `None` means template summaries only.
    pub summary_generator: Option<Arc<dyn SummaryGenerator>>,
    /// Webhook fingerprint -> claim or lead id created for it (10 minute TTL).
    pub webhook_dedupe_cache: Cache<String, WebhookClaim>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Result<Self, AppError> {
        let summary_generator = LlmSummaryClient::from_config(&config)?
            .map(|client| Arc::new(client) as Arc<dyn SummaryGenerator>);

        let webhook_dedupe_cache = Cache::builder()
            .time_to_live(Duration::from_secs(600))
            .max_capacity(10_000)
            .build();

        Ok(Self {
            db,
            scoring_options: config.scoring_options(),
            config,
            summary_generator,
            webhook_dedupe_cache,
        })
    }

    pub fn storage(&self) -> LeadStorage {
        LeadStorage::new(self.db.clone())
    }
}

/// API routes, without middleware. `main` adds rate limiting and tracing.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/score", post(score_lead))
        .route("/api/v1/score/batch", post(score_batch))
        .route(
            "/api/v1/webhooks/lead-created",
            post(webhook_handler::lead_created_webhook),
        )
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "naybourhood-lead-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// A lead to score: inline raw payload or the id of a stored lead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreRequest {
    #[serde(default)]
    pub lead: Option<RawLeadInput>,
    #[serde(default)]
    pub lead_id: Option<Uuid>,
    #[serde(default)]
    pub include_summary: bool,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub success: bool,
    pub lead_id: Option<Uuid>,
    pub lead: NormalizedLead,
    pub result: ScoreResult,
    pub legacy: LegacyScoreFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<LeadSummary>,
}

/// Items stay untyped until scored, so one malformed entry is reported in its
/// own slot instead of rejecting the whole body.
#[derive(Debug, Deserialize)]
pub struct BatchScoreRequest {
    #[serde(default)]
    pub leads: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub success: bool,
    pub lead_id: Option<Uuid>,
    pub classification: Option<Classification>,
    pub result: Option<ScoreResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<LeadSummary>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchScoreResponse {
    pub success: bool,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult>,
}

/// Normalize or load, score, write back when stored, optionally summarise.
async fn score_one(state: &AppState, request: &ScoreRequest) -> Result<ScoreResponse, AppError> {
    let (lead_id, lead) = match (&request.lead, request.lead_id) {
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "Provide either 'lead' or 'lead_id', not both".to_string(),
            ))
        }
        (Some(raw), None) => (None, normalize_lead(raw)),
        (None, Some(id)) => {
            let lead = state
                .storage()
                .fetch_normalized_lead(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))?;
            (Some(id), lead)
        }
        (None, None) => {
            return Err(AppError::BadRequest(
                "Either 'lead' or 'lead_id' is required".to_string(),
            ))
        }
    };

    let result = score_lead_with_options(&lead, &state.scoring_options);
    let legacy = convert_to_legacy_format(&result);

    if let Some(id) = lead_id {
        state
            .storage()
            .update_score(id, &legacy)
            .await
            .with_context(|| format!("Failed to persist score for lead {}", id))?;
    }

    let summary = if request.include_summary {
        let summary =
            generate_summary_with_fallback(state.summary_generator.as_deref(), &lead, &result)
                .await;
        if let Some(id) = lead_id {
            state.storage().store_summary(id, &summary).await?;
        }
        Some(summary)
    } else {
        None
    };

    Ok(ScoreResponse {
        success: true,
        lead_id,
        lead,
        result,
        legacy,
        summary,
    })
}

/// POST /api/v1/score
pub async fn score_lead(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    tracing::info!(
        "POST /score - lead_id: {:?}, inline: {}, summary: {}",
        request.lead_id,
        request.lead.is_some(),
        request.include_summary
    );

    let response = score_one(&state, &request).await?;

    tracing::info!(
        "Scored '{}' as {} (tier {})",
        response.lead.full_name,
        response.result.classification,
        response.result.call_priority.tier
    );

    Ok(Json(response))
}

/// POST /api/v1/score/batch
///
/// Items are scored one after another. A failing item is reported in its
/// slot and never aborts the rest of the batch.
pub async fn score_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchScoreRequest>,
) -> Result<Json<BatchScoreResponse>, AppError> {
    let total = request.leads.len();
    tracing::info!("POST /score/batch - {} lead(s)", total);

    if total == 0 {
        return Err(AppError::BadRequest(
            "'leads' must contain at least one lead".to_string(),
        ));
    }
    if total > state.config.max_batch_size {
        return Err(AppError::BadRequest(format!(
            "Batch of {} exceeds the maximum of {} leads",
            total, state.config.max_batch_size
        )));
    }

    let mut results = Vec::with_capacity(total);
    for (index, item) in request.leads.into_iter().enumerate() {
        let item = serde_json::from_value::<ScoreRequest>(item).map_err(|e| {
            AppError::BadRequest(format!("Invalid batch item: {}", e))
        });
        let lead_id = item.as_ref().ok().and_then(|i| i.lead_id);

        let outcome = match item {
            Ok(item) => score_one(&state, &item).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(scored) => results.push(BatchItemResult {
                index,
                success: true,
                lead_id: scored.lead_id,
                classification: Some(scored.result.classification),
                result: Some(scored.result),
                summary: scored.summary,
                error: None,
            }),
            Err(e) => {
                tracing::warn!("Batch item {} failed: {}", index, e);
                results.push(BatchItemResult {
                    index,
                    success: false,
                    lead_id,
                    classification: None,
                    result: None,
                    summary: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let succeeded = results.iter().filter(|r| r.success).count();
    let failed = total - succeeded;
    tracing::info!(
        "Batch complete: {} succeeded, {} failed",
        succeeded,
        failed
    );

    Ok(Json(BatchScoreResponse {
        success: failed == 0,
        total,
        succeeded,
        failed,
        results,
    }))
}
