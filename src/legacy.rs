//! Flat `ai_*` field set written to the `leads` table.
//!
//! Older dashboards and reports read these columns directly, so the names
//! and shapes are fixed. The mapping is a pure copy of the score result.

use crate::scoring::{ScoreFactor, ScoreResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyScoreFields {
    pub ai_quality_score: i32,
    pub ai_intent_score: i32,
    pub ai_confidence_score: i32,
    pub ai_classification: String,
    /// `"P1"` .. `"P4"`
    pub ai_priority: String,
    pub ai_call_priority: i32,
    pub ai_call_priority_reason: String,
    pub ai_risk_flags: Vec<String>,
    pub ai_is_28_day_buyer: bool,
    pub ai_low_urgency: bool,
    pub ai_is_fake: bool,
    pub ai_fake_flags: Vec<String>,
    pub ai_is_disqualified: bool,
    pub ai_disqualification_reason: Option<String>,
    pub ai_quality_reasons: Vec<String>,
    pub ai_intent_reasons: Vec<String>,
    pub ai_confidence_reasons: Vec<String>,
}

fn flatten_breakdown(breakdown: &[ScoreFactor]) -> Vec<String> {
    breakdown
        .iter()
        .map(|f| format!("{} ({:+}): {}", f.factor, f.points, f.reason))
        .collect()
}

pub fn convert_to_legacy_format(result: &ScoreResult) -> LegacyScoreFields {
    LegacyScoreFields {
        ai_quality_score: i32::from(result.quality.score),
        ai_intent_score: i32::from(result.intent.score),
        ai_confidence_score: i32::from(result.confidence.score),
        ai_classification: result.classification.as_str().to_string(),
        ai_priority: format!("P{}", result.call_priority.tier),
        ai_call_priority: i32::from(result.call_priority.tier),
        ai_call_priority_reason: result.call_priority.response_time.clone(),
        ai_risk_flags: result.risk_flags.clone(),
        ai_is_28_day_buyer: result.is_28_day_buyer,
        ai_low_urgency: result.low_urgency_flag,
        ai_is_fake: result.fake_check.is_fake,
        ai_fake_flags: result.fake_check.flag_names(),
        ai_is_disqualified: result.quality.is_disqualified,
        ai_disqualification_reason: result.quality.disqualification_reason.clone(),
        ai_quality_reasons: flatten_breakdown(&result.quality.breakdown),
        ai_intent_reasons: flatten_breakdown(&result.intent.breakdown),
        ai_confidence_reasons: flatten_breakdown(&result.confidence.breakdown),
    }
}
