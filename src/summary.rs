//! Narrative lead summaries.
//!
//! Two strategies behind [`SummaryGenerator`]: an OpenAI-compatible chat
//! endpoint and a deterministic template. Callers go through
//! [`generate_summary_with_fallback`], which always returns a summary.

use crate::circuit_breaker::{create_llm_circuit_breaker, LlmCircuitBreaker};
use crate::config::Config;
use crate::errors::AppError;
use crate::lead_normalizer::NormalizedLead;
use crate::scoring::{Classification, ScoreResult};
use async_trait::async_trait;
use failsafe::CircuitBreaker;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Llm,
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSummary {
    pub summary: String,
    pub next_action: String,
    pub recommendations: Vec<String>,
    pub source: SummarySource,
}

#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn generate(
        &self,
        lead: &NormalizedLead,
        result: &ScoreResult,
    ) -> Result<LeadSummary, AppError>;
}

/// Deterministic summaries keyed off classification and flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSummaryGenerator;

impl TemplateSummaryGenerator {
    pub fn build(lead: &NormalizedLead, result: &ScoreResult) -> LeadSummary {
        let name = lead.first_name.as_deref().unwrap_or(&lead.full_name);

        let budget = match (lead.budget_min, lead.budget_max) {
            (Some(min), Some(max)) if min == max => format!("budget {}", format_gbp(max)),
            (Some(min), Some(max)) => format!("budget {} to {}", format_gbp(min), format_gbp(max)),
            (Some(amount), None) | (None, Some(amount)) => {
                format!("budget around {}", format_gbp(amount))
            }
            (None, None) => "no stated budget".to_string(),
        };
        let location = lead
            .preferred_location
            .as_deref()
            .map(|l| format!(", looking in {}", l))
            .unwrap_or_default();

        let mut summary = format!(
            "{} ({}): {}{}. Quality {}, intent {}, confidence {}.",
            lead.full_name,
            result.classification,
            budget,
            location,
            result.quality.score,
            result.intent.score,
            result.confidence.score
        );
        if result.is_28_day_buyer {
            summary.push_str(" Ready to purchase within 28 days.");
        }
        if result.low_urgency_flag {
            summary.push_str(" Purchase horizon is beyond 12 months.");
        }
        if let Some(reason) = &result.quality.disqualification_reason {
            summary.push_str(&format!(" Disqualified: {}.", reason));
        }

        let next_action = match result.classification {
            _ if result.is_28_day_buyer => format!(
                "Call {} today and book a viewing; confirm proof of funds and solicitor details.",
                name
            ),
            Classification::HotLead => format!("Call {} today and offer viewing slots this week.", name),
            Classification::Qualified => format!(
                "Call {} within 4 hours to confirm requirements and book a viewing.",
                name
            ),
            Classification::NeedsQualification => format!(
                "Call {} within 24 hours to confirm budget, timeline and financing.",
                name
            ),
            Classification::Nurture => format!(
                "Add {} to the nurture sequence and share new releases matching their brief.",
                name
            ),
            Classification::LowPriority => {
                format!("Schedule a follow-up with {} within 7 days.", name)
            }
            Classification::Disqualified => {
                "No outreach. Review the record before any further contact.".to_string()
            }
        };

        let mut recommendations = Vec::new();
        if lead.email.is_none() && lead.phone.is_none() {
            recommendations.push("Capture an email address or phone number".to_string());
        }
        if !lead.has_budget() {
            recommendations.push("Confirm budget range".to_string());
        }
        if lead.timeline_to_purchase.is_none() && !lead.ready_within_28_days {
            recommendations.push("Ask for a purchase timeline".to_string());
        }
        if lead.payment_method.is_none() && lead.mortgage_status.is_none() {
            recommendations.push("Establish cash or mortgage position".to_string());
        }
        if !lead.uk_broker && !lead.payment_method.as_deref().unwrap_or("").to_lowercase().contains("cash") {
            recommendations.push("Offer an introduction to a UK mortgage broker".to_string());
        }
        if !lead.uk_solicitor {
            recommendations.push("Recommend instructing a UK solicitor".to_string());
        }
        if result.fake_check.is_fake {
            recommendations.push(format!(
                "Verify identity before outreach: {}",
                result.fake_check.flag_names().join(", ")
            ));
        }

        LeadSummary {
            summary,
            next_action,
            recommendations,
            source: SummarySource::Template,
        }
    }
}

#[async_trait]
impl SummaryGenerator for TemplateSummaryGenerator {
    async fn generate(
        &self,
        lead: &NormalizedLead,
        result: &ScoreResult,
    ) -> Result<LeadSummary, AppError> {
        Ok(Self::build(lead, result))
    }
}

/// `1500000` -> `£1.5M`, `450000` -> `£450K`.
fn format_gbp(amount: i64) -> String {
    if amount >= 1_000_000 {
        let millions = amount as f64 / 1_000_000.0;
        let text = format!("{:.2}", millions);
        format!("£{}M", text.trim_end_matches('0').trim_end_matches('.'))
    } else if amount >= 1_000 && amount % 1_000 == 0 {
        format!("£{}K", amount / 1_000)
    } else {
        format!("£{}", amount)
    }
}

const SYSTEM_PROMPT: &str = "You are a UK new-homes sales assistant. Given a lead record and its \
scoring result, reply with a JSON object with keys \"summary\" (two sentences), \"next_action\" \
(one sentence) and \"recommendations\" (array of short strings). Do not change the classification.";

/// OpenAI-compatible chat completion client behind a circuit breaker.
#[derive(Clone)]
pub struct LlmSummaryClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    breaker: LlmCircuitBreaker,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct SummaryReply {
    summary: String,
    next_action: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

impl LlmSummaryClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            breaker: create_llm_circuit_breaker(),
        })
    }

    /// `None` when LLM summaries are not configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, AppError> {
        match (&config.llm_api_url, &config.llm_api_key) {
            (Some(url), Some(key)) => Self::new(
                url.clone(),
                key.clone(),
                config.llm_model.clone(),
                Duration::from_secs(config.llm_timeout_secs),
            )
            .map(Some),
            _ => Ok(None),
        }
    }

    async fn request_summary(
        &self,
        lead: &NormalizedLead,
        result: &ScoreResult,
    ) -> Result<LeadSummary, AppError> {
        let body = json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": json!({"lead": lead, "score": result}).to_string()}
            ],
            "temperature": 0.2,
            "response_format": {"type": "json_object"}
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApiError(format!(
                "LLM API returned {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::ExternalApiError("LLM returned no choices".to_string()))?;

        let reply: SummaryReply = serde_json::from_str(strip_code_fence(&content)).map_err(|e| {
            AppError::ExternalApiError(format!("LLM reply was not the expected JSON: {}", e))
        })?;

        Ok(LeadSummary {
            summary: reply.summary,
            next_action: reply.next_action,
            recommendations: reply.recommendations,
            source: SummarySource::Llm,
        })
    }
}

/// Models sometimes wrap JSON in a markdown fence despite `json_object` mode.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[async_trait]
impl SummaryGenerator for LlmSummaryClient {
    async fn generate(
        &self,
        lead: &NormalizedLead,
        result: &ScoreResult,
    ) -> Result<LeadSummary, AppError> {
        if !self.breaker.is_call_permitted() {
            return Err(AppError::ExternalApiError(
                "LLM circuit breaker open".to_string(),
            ));
        }

        let outcome = self.request_summary(lead, result).await;

        // Record the outcome; rejection here just means the breaker tripped meanwhile
        let _ = self
            .breaker
            .call(|| outcome.as_ref().map(|_| ()).map_err(|_| ()));

        outcome
    }
}

/// Use `generator` when present, the template on absence or any failure.
pub async fn generate_summary_with_fallback(
    generator: Option<&dyn SummaryGenerator>,
    lead: &NormalizedLead,
    result: &ScoreResult,
) -> LeadSummary {
    if let Some(generator) = generator {
        match generator.generate(lead, result).await {
            Ok(summary) => return summary,
            Err(e) => {
                tracing::warn!(
                    "Summary generation failed for '{}', using template: {}",
                    lead.full_name,
                    e
                );
            }
        }
    }

    TemplateSummaryGenerator::build(lead, result)
}
