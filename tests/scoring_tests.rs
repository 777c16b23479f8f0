/// End-to-end scoring scenarios: raw payload -> normalizer -> engine -> legacy fields
use naybourhood_lead_api::lead_normalizer::{normalize_lead, RawLeadInput};
use naybourhood_lead_api::legacy::convert_to_legacy_format;
use naybourhood_lead_api::parsers::{parse_budget_range, parse_date};
use naybourhood_lead_api::core::scoring::{
    score_lead_naybourhood, score_lead_with_options, Classification, OverridePrecedence,
    ScoringOptions,
};
use naybourhood_lead_api::status::{normalize_status, LeadStatus};
use serde_json::json;

fn raw(value: serde_json::Value) -> RawLeadInput {
    RawLeadInput::from(value)
}

#[test]
fn test_sarah_mitchell_cash_28_day_buyer_is_hot() {
    let lead = normalize_lead(&raw(json!({
        "full_name": "Sarah Mitchell",
        "payment_method": "Cash",
        "budget": "£1.5M",
        "bedrooms": 3,
        "purpose": "Residence",
        "timeline": "28 days",
        "location": "London"
    })));
    assert_eq!(lead.budget_min, Some(1_500_000));
    assert_eq!(lead.budget_max, Some(1_500_000));

    let result = score_lead_naybourhood(&lead);
    assert_eq!(result.classification, Classification::HotLead);
    assert!(result.is_28_day_buyer);
    assert!(!result.low_urgency_flag);
    assert_eq!(result.call_priority.tier, 1);
    assert!(result.intent.score >= 40);

    let legacy = convert_to_legacy_format(&result);
    assert_eq!(legacy.ai_classification, "Hot Lead");
    assert_eq!(legacy.ai_call_priority, 1);
}

#[test]
fn test_jane_doe_long_horizon_without_contact() {
    let lead = normalize_lead(&raw(json!({
        "full_name": "Jane Doe",
        "timeline": "12+ months"
    })));
    let result = score_lead_naybourhood(&lead);

    assert!(result.low_urgency_flag);
    assert!(!result.is_28_day_buyer);
    assert!(result.quality.score < 40);
    assert!(result.confidence.score < 50);
    assert!(matches!(
        result.classification,
        Classification::NeedsQualification | Classification::LowPriority
    ));
    assert_eq!(result.call_priority.tier, 4);
    assert!(result
        .risk_flags
        .contains(&"No contact details".to_string()));
}

#[test]
fn test_ready_flag_overrides_weak_scores() {
    let lead = normalize_lead(&raw(json!({
        "name": "Ola",
        "readyWithin28Days": true,
        "timeline": "2 years"
    })));
    let result = score_lead_naybourhood(&lead);
    assert!(result.quality.score < 40);
    assert_eq!(result.classification, Classification::HotLead);
    assert!(!result.low_urgency_flag);
}

#[test]
fn test_fake_lead_is_disqualified_unless_28_day() {
    let fake = json!({
        "full_name": "test",
        "email": "test@mailinator.com",
        "phone": "07777777777",
        "timeline": "3 months"
    });
    let result = score_lead_naybourhood(&normalize_lead(&raw(fake.clone())));
    assert!(result.fake_check.is_fake);
    assert_eq!(result.classification, Classification::Disqualified);

    // Same lead, but ready to buy: the 28-day rule wins by default
    let mut urgent = fake;
    urgent["ready_within_28_days"] = json!(true);
    let lead = normalize_lead(&raw(urgent));
    assert_eq!(
        score_lead_naybourhood(&lead).classification,
        Classification::HotLead
    );

    // ...and loses when disqualification is configured to take precedence
    let strict = ScoringOptions {
        override_precedence: OverridePrecedence::DisqualificationFirst,
    };
    assert_eq!(
        score_lead_with_options(&lead, &strict).classification,
        Classification::Disqualified
    );
}

#[test]
fn test_quality_disqualification_precedence() {
    let lead = normalize_lead(&raw(json!({
        "full_name": "Priya Shah",
        "email": "priya.shah@gmail.com",
        "status": "Not Proceeding",
        "timeline": "ASAP"
    })));

    let default_result = score_lead_naybourhood(&lead);
    assert!(default_result.quality.is_disqualified);
    assert_eq!(default_result.quality.score, 0);
    assert_eq!(default_result.classification, Classification::HotLead);

    let strict = ScoringOptions {
        override_precedence: OverridePrecedence::DisqualificationFirst,
    };
    assert_eq!(
        score_lead_with_options(&lead, &strict).classification,
        Classification::Disqualified
    );
}

#[test]
fn test_legacy_airtable_export_shape() {
    let lead = normalize_lead(&raw(json!({
        "Name": "Daniel Okafor",
        "Email": "Daniel.Okafor@Outlook.com",
        "Phone": "+44 7400 123456",
        "Budget": "£450,000 to £500,000",
        "Area": "Stratford",
        "Status": "Hot",
        "Date Added": "6/1/2026 1:20pm",
        "Source": "Rightmove"
    })));

    assert_eq!(lead.full_name, "Daniel Okafor");
    assert_eq!(lead.email.as_deref(), Some("daniel.okafor@outlook.com"));
    assert_eq!(lead.budget_min, Some(450_000));
    assert_eq!(lead.budget_max, Some(500_000));
    assert_eq!(lead.preferred_location.as_deref(), Some("Stratford"));
    assert_eq!(lead.status, LeadStatus::FollowUp);
    assert!(lead.date_added.starts_with("2026-01-0"));

    let result = score_lead_naybourhood(&lead);
    assert!(!result.fake_check.is_fake);
    assert!(result.confidence.score >= 50);
}

#[test]
fn test_parser_examples() {
    let range = parse_budget_range(Some("£400K - £500K"));
    assert_eq!((range.min, range.max), (Some(400_000), Some(500_000)));

    let point = parse_budget_range(Some("£750K"));
    assert_eq!((point.min, point.max), (Some(750_000), Some(750_000)));

    let fallback = parse_date(Some("not a date"));
    assert!(chrono::DateTime::parse_from_rfc3339(&fallback).is_ok());
}

#[test]
fn test_status_normalization_is_idempotent_for_aliases() {
    for input in ["New", "hot", "SOLD", "dead", "under offer", "gibberish", ""] {
        let once = normalize_status(Some(input));
        assert_eq!(normalize_status(Some(once.as_str())), once);
    }
}

#[test]
fn test_budget_with_trailing_word_is_not_implausible() {
    let lead = normalize_lead(&raw(json!({
        "full_name": "Hannah Price",
        "email": "hannah.price@gmail.com",
        "phone": "07400 123456",
        "budget": "£450,000 max",
        "location": "Manchester"
    })));
    assert_eq!(lead.budget_max, Some(450_000));

    let result = score_lead_naybourhood(&lead);
    assert!(!result
        .fake_check
        .flag_names()
        .iter()
        .any(|f| f.contains("Implausible")));
    assert_ne!(result.classification, Classification::Disqualified);
}
