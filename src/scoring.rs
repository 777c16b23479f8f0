//! Naybourhood lead scoring.
//!
//! A rules-based engine over a [`NormalizedLead`]. Quality, intent and
//! confidence are additive points models, each keeping an ordered breakdown
//! of the factors that contributed. A fake-lead check, the 28-day buyer hard
//! rule and a low-urgency flag feed the final classification and the
//! call-priority tier.
//!
//! Scoring is a pure function of the lead: no I/O, no shared state.

use crate::lead_normalizer::NormalizedLead;
use crate::status::LeadStatus;
use crate::validation::{
    is_placeholder_email, is_placeholder_phone, is_valid_email, validate_uk_phone,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Total severity at which a lead is treated as fake.
pub const FAKE_SEVERITY_THRESHOLD: u8 = 3;

/// Budgets below this cannot buy anything we sell.
pub const MIN_VIABLE_BUDGET: i64 = 50_000;

/// Budgets above this are treated as typed nonsense.
pub const IMPLAUSIBLE_BUDGET: i64 = 100_000_000;

const PRIME_LOCATIONS: &[&str] = &[
    "mayfair",
    "knightsbridge",
    "belgravia",
    "chelsea",
    "kensington",
    "st john's wood",
    "holland park",
    "notting hill",
];

const KNOWN_SOURCES: &[&str] = &[
    "rightmove",
    "zoopla",
    "onthemarket",
    "facebook",
    "meta",
    "instagram",
    "google",
    "tiktok",
    "linkedin",
    "website",
    "referral",
    "whatsapp",
    "event",
    "walk-in",
    "email",
];

const PLACEHOLDER_NAMES: &[&str] = &[
    "test", "testing", "asdf", "qwerty", "fake", "none", "n/a", "na", "xxx", "abc", "aaa",
    "unknown", "no name", "anonymous",
];

const SUSPICIOUS_TEXT: &[&str] = &[
    "test lead",
    "this is a test",
    "ignore this",
    "spam",
    "fake",
    "asdf",
    "lorem ipsum",
];

const NOT_INTERESTED_TEXT: &[&str] = &[
    "not interested",
    "no longer interested",
    "wrong number",
    "never enquired",
    "did not enquire",
    "remove me",
];

const VAGUE_LOCATIONS: &[&str] = &["any", "anywhere", "flexible", "open", "not sure", "tbc", "n/a"];

/// One additive contribution to a sub-score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFactor {
    pub factor: String,
    pub points: i32,
    pub reason: String,
}

impl ScoreFactor {
    fn new(factor: &str, points: i32, reason: impl Into<String>) -> Self {
        Self {
            factor: factor.to_string(),
            points,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityScore {
    pub score: u8,
    pub breakdown: Vec<ScoreFactor>,
    pub is_disqualified: bool,
    pub disqualification_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentScore {
    pub score: u8,
    pub breakdown: Vec<ScoreFactor>,
    pub is_28_day_buyer: bool,
    pub timeline: TimelineBucket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub score: u8,
    pub breakdown: Vec<ScoreFactor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeLeadFlag {
    pub flag: String,
    pub severity: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeLeadCheck {
    pub is_fake: bool,
    pub flags: Vec<FakeLeadFlag>,
    pub severity: u8,
}

impl FakeLeadCheck {
    pub fn flag_names(&self) -> Vec<String> {
        self.flags.iter().map(|f| f.flag.clone()).collect()
    }
}

/// Final categorical label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "Hot Lead")]
    HotLead,
    #[serde(rename = "Qualified")]
    Qualified,
    #[serde(rename = "Needs Qualification")]
    NeedsQualification,
    #[serde(rename = "Nurture")]
    Nurture,
    #[serde(rename = "Low Priority")]
    LowPriority,
    #[serde(rename = "Disqualified")]
    Disqualified,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::HotLead => "Hot Lead",
            Classification::Qualified => "Qualified",
            Classification::NeedsQualification => "Needs Qualification",
            Classification::Nurture => "Nurture",
            Classification::LowPriority => "Low Priority",
            Classification::Disqualified => "Disqualified",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPriority {
    /// 1 is most urgent, 4 is a scheduled follow-up.
    pub tier: u8,
    pub label: String,
    pub response_time: String,
}

impl CallPriority {
    fn for_tier(tier: u8) -> Self {
        let (label, response_time) = match tier {
            1 => ("Urgent", "Same-day contact (call within 1 hour)"),
            2 => ("High", "Call within 4 hours"),
            3 => ("Medium", "Call within 24 hours"),
            _ => ("Low", "Scheduled follow-up within 7 days"),
        };
        Self {
            tier: tier.clamp(1, 4),
            label: label.to_string(),
            response_time: response_time.to_string(),
        }
    }
}

/// Everything the engine produces for one lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub quality: QualityScore,
    pub intent: IntentScore,
    pub confidence: ConfidenceScore,
    pub fake_check: FakeLeadCheck,
    pub classification: Classification,
    pub call_priority: CallPriority,
    pub risk_flags: Vec<String>,
    pub is_28_day_buyer: bool,
    pub low_urgency_flag: bool,
}

/// Which wins when a 28-day buyer is also fake or disqualified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePrecedence {
    /// The 28-day hard rule is checked first and always yields `Hot Lead`.
    #[default]
    #[serde(rename = "28_day_first")]
    TwentyEightDayFirst,
    /// Fake-lead and quality disqualification are checked before the 28-day rule.
    DisqualificationFirst,
}

impl std::str::FromStr for OverridePrecedence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "28_day_first" | "28-day-first" | "twenty_eight_day_first" => {
                Ok(OverridePrecedence::TwentyEightDayFirst)
            }
            "disqualification_first" | "disqualification-first" => {
                Ok(OverridePrecedence::DisqualificationFirst)
            }
            other => Err(format!("unknown override precedence '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringOptions {
    pub override_precedence: OverridePrecedence,
}

/// Purchase horizon read from the free-text timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineBucket {
    /// Within 28 days.
    Immediate,
    WithinThreeMonths,
    WithinSixMonths,
    WithinTwelveMonths,
    OverTwelveMonths,
    Unknown,
}

static IMMEDIATE_TIMELINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(asap|immediate(ly)?|right away|right now|ready now|this month|28\s*-?\s*days?|4\s*weeks?|four weeks)\b").unwrap()
});

/// A negation anywhere before an immediate phrase ("not right now", "don't need it asap").
static NEGATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\b(not|no|never)\b|n't\b)").unwrap());

static LONG_TIMELINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\b(1[2-9]|[2-9]\d|\d{3,})\s*\+\s*(months?|mths?)|\b\d+\s*\+\s*(years?|yrs?)|(more than|over|beyond|after)\s+(a|one|1|12)\s*(year|yr|months?)|\b(18|24|36|48)\s*months?|\b[2-9]\s*(years?|yrs?)|just (browsing|looking)|no rush|long[- ]term)",
    )
    .unwrap()
});

static TIMELINE_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*\+?\s*(?:-|to)?\s*(\d+)?\s*(days?|weeks?|wks?|months?|mths?|years?|yrs?)").unwrap()
});

/// Bucket a timeline string. Ranges use their upper bound.
pub fn classify_timeline(timeline: Option<&str>) -> TimelineBucket {
    let Some(text) = timeline.map(str::trim).filter(|t| !t.is_empty()) else {
        return TimelineBucket::Unknown;
    };

    let text = text
        .to_lowercase()
        .replace("a year", "1 year")
        .replace("one year", "1 year")
        .replace("a month", "1 month")
        .replace("one month", "1 month");

    if LONG_TIMELINE.is_match(&text) {
        return TimelineBucket::OverTwelveMonths;
    }

    if let Some(caps) = TIMELINE_SPAN.captures(&text) {
        let upper: u32 = caps
            .get(2)
            .or_else(|| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        let unit = &caps[3];
        let days = match unit.chars().next() {
            Some('d') => upper,
            Some('w') => upper.saturating_mul(7),
            Some('m') => upper.saturating_mul(30),
            _ => upper.saturating_mul(365),
        };
        return match days {
            0..=28 if NEGATION.is_match(&text[..caps.get(0).map_or(0, |m| m.start())]) => {
                TimelineBucket::Unknown
            }
            0..=28 => TimelineBucket::Immediate,
            29..=90 => TimelineBucket::WithinThreeMonths,
            91..=180 => TimelineBucket::WithinSixMonths,
            181..=365 => TimelineBucket::WithinTwelveMonths,
            _ => TimelineBucket::OverTwelveMonths,
        };
    }

    if let Some(m) = IMMEDIATE_TIMELINE.find(&text) {
        if !NEGATION.is_match(&text[..m.start()]) {
            return TimelineBucket::Immediate;
        }
    }

    TimelineBucket::Unknown
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FundingPosition {
    Cash,
    MortgageApproved,
    Mortgage,
    Unknown,
}

fn funding_position(lead: &NormalizedLead) -> FundingPosition {
    let payment = lead.payment_method.as_deref().unwrap_or("").to_lowercase();
    let mortgage = lead.mortgage_status.as_deref().unwrap_or("").to_lowercase();

    if payment.contains("cash") {
        return FundingPosition::Cash;
    }

    let approved = ["aip", "approved", "in principle", "mortgage offer", "offer received", "dip"]
        .iter()
        .any(|k| mortgage.contains(k) || payment.contains(k));
    if approved {
        return FundingPosition::MortgageApproved;
    }

    if payment.contains("mortgage") || payment.contains("finance") || !mortgage.is_empty() {
        return FundingPosition::Mortgage;
    }

    FundingPosition::Unknown
}

struct ContactCheck {
    email_valid: bool,
    phone_valid: bool,
}

fn check_contact(lead: &NormalizedLead) -> ContactCheck {
    ContactCheck {
        email_valid: lead.email.as_deref().map(is_valid_email).unwrap_or(false),
        phone_valid: lead
            .phone
            .as_deref()
            .map(|p| validate_uk_phone(p).0)
            .unwrap_or(false),
    }
}

fn clamp_score(total: i32) -> u8 {
    total.clamp(0, 100) as u8
}

fn sum_points(breakdown: &[ScoreFactor]) -> i32 {
    breakdown.iter().map(|f| f.points).sum()
}

/// Case-insensitive search of notes and agent transcript.
fn free_text_mentions(lead: &NormalizedLead, needles: &[&str]) -> bool {
    [lead.notes.as_deref(), lead.agent_transcript.as_deref()]
        .into_iter()
        .flatten()
        .map(str::to_lowercase)
        .any(|text| needles.iter().any(|n| text.contains(n)))
}

fn location_is_specific(location: Option<&str>) -> bool {
    location
        .map(|l| l.trim().to_lowercase())
        .map(|l| !l.is_empty() && !VAGUE_LOCATIONS.contains(&l.as_str()))
        .unwrap_or(false)
}

fn disqualification_reason(lead: &NormalizedLead) -> Option<String> {
    match lead.status {
        LeadStatus::NotProceeding => return Some("Lead marked as Not Proceeding".to_string()),
        LeadStatus::Duplicate => return Some("Duplicate lead record".to_string()),
        _ => {}
    }

    if let Some(max) = lead.budget_max.or(lead.budget_min) {
        if max < MIN_VIABLE_BUDGET {
            return Some(format!(
                "Budget £{} below minimum viable property price",
                max
            ));
        }
    }

    if free_text_mentions(lead, NOT_INTERESTED_TEXT) {
        return Some("Lead stated they are not interested".to_string());
    }

    None
}

/// Quality: contact, budget, financial position, professional team, requirements.
pub fn score_quality(lead: &NormalizedLead) -> QualityScore {
    if let Some(reason) = disqualification_reason(lead) {
        tracing::debug!("Lead '{}' disqualified: {}", lead.full_name, reason);
        return QualityScore {
            score: 0,
            breakdown: vec![ScoreFactor::new("Disqualified", 0, reason.clone())],
            is_disqualified: true,
            disqualification_reason: Some(reason),
        };
    }

    let mut breakdown = Vec::new();
    let contact = check_contact(lead);

    // Contact (max 25)
    match (&lead.email, contact.email_valid) {
        (Some(_), true) => breakdown.push(ScoreFactor::new("Email", 10, "Valid email address")),
        (Some(_), false) => breakdown.push(ScoreFactor::new("Email", 0, "Email failed validation")),
        (None, _) => {}
    }
    match (&lead.phone, contact.phone_valid) {
        (Some(_), true) => breakdown.push(ScoreFactor::new("Phone", 10, "Valid phone number")),
        (Some(_), false) => breakdown.push(ScoreFactor::new("Phone", 0, "Phone failed validation")),
        (None, _) => {}
    }
    if contact.email_valid && contact.phone_valid {
        breakdown.push(ScoreFactor::new("Contact Channels", 5, "Reachable by email and phone"));
    }

    // Budget (max 20)
    if lead.has_budget() {
        breakdown.push(ScoreFactor::new("Budget", 10, "Budget provided"));
        let specific = match (lead.budget_min, lead.budget_max) {
            (Some(min), Some(max)) if min > 0 => (max - min) as f64 <= min as f64 * 0.3,
            _ => false,
        };
        if specific {
            breakdown.push(ScoreFactor::new("Budget Specificity", 10, "Narrow budget range"));
        }
    }

    // Financial position (max 25)
    let mut financial = Vec::new();
    match funding_position(lead) {
        FundingPosition::Cash => financial.push(ScoreFactor::new("Funding", 15, "Cash buyer")),
        FundingPosition::MortgageApproved => {
            financial.push(ScoreFactor::new("Funding", 12, "Mortgage agreed in principle"))
        }
        FundingPosition::Mortgage => {
            financial.push(ScoreFactor::new("Funding", 5, "Mortgage buyer, not yet approved"))
        }
        FundingPosition::Unknown => {}
    }
    if lead.proof_of_funds {
        financial.push(ScoreFactor::new("Proof of Funds", 10, "Proof of funds provided"));
    }
    push_capped(&mut breakdown, financial, 25, "Funding Cap");

    // Professional team (max 10)
    if lead.uk_broker {
        breakdown.push(ScoreFactor::new("UK Broker", 5, "Working with a UK mortgage broker"));
    }
    if lead.uk_solicitor {
        breakdown.push(ScoreFactor::new("UK Solicitor", 5, "UK solicitor instructed"));
    }

    // Requirements (max 20)
    if location_is_specific(lead.preferred_location.as_deref()) {
        breakdown.push(ScoreFactor::new("Location", 8, "Specific preferred location"));
    }
    if lead.preferred_bedrooms.is_some() {
        breakdown.push(ScoreFactor::new("Bedrooms", 6, "Bedroom requirement stated"));
    }
    if lead.development_name.is_some() {
        breakdown.push(ScoreFactor::new("Development", 6, "Enquired about a named development"));
    }

    QualityScore {
        score: clamp_score(sum_points(&breakdown)),
        breakdown,
        is_disqualified: false,
        disqualification_reason: None,
    }
}

/// Append a group of factors, adding a negative adjustment if they exceed `cap`.
fn push_capped(breakdown: &mut Vec<ScoreFactor>, group: Vec<ScoreFactor>, cap: i32, name: &str) {
    let total = sum_points(&group);
    breakdown.extend(group);
    if total > cap {
        breakdown.push(ScoreFactor::new(
            name,
            cap - total,
            format!("Capped at {} points", cap),
        ));
    }
}

/// Intent: timeline, purpose, financial readiness, engagement.
pub fn score_intent(lead: &NormalizedLead) -> IntentScore {
    let mut breakdown = Vec::new();
    let timeline = classify_timeline(lead.timeline_to_purchase.as_deref());
    let is_28_day_buyer = lead.ready_within_28_days || timeline == TimelineBucket::Immediate;

    // Timeline (max 40)
    if lead.ready_within_28_days {
        breakdown.push(ScoreFactor::new("Timeline", 40, "Ready to purchase within 28 days"));
    } else {
        let (points, reason) = match timeline {
            TimelineBucket::Immediate => (40, "Purchasing within 28 days"),
            TimelineBucket::WithinThreeMonths => (30, "Purchasing within 3 months"),
            TimelineBucket::WithinSixMonths => (20, "Purchasing within 6 months"),
            TimelineBucket::WithinTwelveMonths => (10, "Purchasing within 12 months"),
            TimelineBucket::OverTwelveMonths => (0, "Purchase horizon beyond 12 months"),
            TimelineBucket::Unknown => (5, "Timeline not provided"),
        };
        breakdown.push(ScoreFactor::new("Timeline", points, reason));
    }
    if is_28_day_buyer {
        breakdown.push(ScoreFactor::new(
            "28-Day Buyer",
            0,
            "Hard rule: ready to purchase within 28 days",
        ));
    }

    // Purpose (max 15)
    if let Some(purpose) = lead.purchase_purpose.as_deref() {
        let p = purpose.to_lowercase();
        let (points, reason) = if ["second home", "holiday", "pied"].iter().any(|k| p.contains(k)) {
            (10, "Second home purchase")
        } else if ["child", "student", "family member", "relative", "parent"]
            .iter()
            .any(|k| p.contains(k))
        {
            (10, "Buying for family")
        } else if ["residen", "live", "home", "primary", "owner", "occupier"]
            .iter()
            .any(|k| p.contains(k))
        {
            (15, "Buying to live in")
        } else if ["invest", "buy to let", "btl", "rental", "yield", "let"]
            .iter()
            .any(|k| p.contains(k))
        {
            (12, "Investment purchase")
        } else {
            (5, "Purpose stated")
        };
        breakdown.push(ScoreFactor::new("Purpose", points, reason));
    }

    // Financial readiness (max 20)
    let mut financial = Vec::new();
    match funding_position(lead) {
        FundingPosition::Cash => financial.push(ScoreFactor::new("Funding Readiness", 12, "Cash ready")),
        FundingPosition::MortgageApproved => {
            financial.push(ScoreFactor::new("Funding Readiness", 10, "Mortgage approved in principle"))
        }
        FundingPosition::Mortgage => {
            financial.push(ScoreFactor::new("Funding Readiness", 4, "Mortgage required"))
        }
        FundingPosition::Unknown => {}
    }
    if lead.proof_of_funds {
        financial.push(ScoreFactor::new("Proof of Funds", 8, "Funds evidenced"));
    }
    push_capped(&mut breakdown, financial, 20, "Funding Readiness Cap");

    // Engagement (max 25)
    let mut engagement = Vec::new();
    if lead.viewing_booked {
        engagement.push(ScoreFactor::new("Viewing", 12, "Viewing booked"));
    } else if lead.viewing_intent_confirmed {
        engagement.push(ScoreFactor::new("Viewing", 8, "Viewing intent confirmed"));
    }
    if lead.replied {
        engagement.push(ScoreFactor::new("Replied", 5, "Lead has replied"));
    }
    if lead.connect_to_broker {
        engagement.push(ScoreFactor::new("Broker Connect", 4, "Asked to be connected to a broker"));
    }
    if let Some(enquiry) = lead.enquiry_type.as_deref() {
        let e = enquiry.to_lowercase();
        if ["viewing", "booking", "reserv", "appointment"].iter().any(|k| e.contains(k)) {
            engagement.push(ScoreFactor::new("Enquiry Type", 4, "High-intent enquiry"));
        }
    }
    match lead.status {
        LeadStatus::ViewingBooked if !lead.viewing_booked => {
            engagement.push(ScoreFactor::new("Pipeline", 6, "Pipeline status: Viewing Booked"))
        }
        status if status.is_advanced() => engagement.push(ScoreFactor::new(
            "Pipeline",
            10,
            format!("Pipeline status: {}", status),
        )),
        _ => {}
    }
    push_capped(&mut breakdown, engagement, 25, "Engagement Cap");

    IntentScore {
        score: clamp_score(sum_points(&breakdown)),
        breakdown,
        is_28_day_buyer,
        timeline,
    }
}

/// Fake-lead heuristics. Each flag carries a severity; the lead is fake once
/// the total reaches [`FAKE_SEVERITY_THRESHOLD`].
pub fn check_fake_lead(lead: &NormalizedLead) -> FakeLeadCheck {
    let mut flags = Vec::new();
    let mut flag = |name: &str, severity: u8| {
        flags.push(FakeLeadFlag {
            flag: name.to_string(),
            severity,
        })
    };

    let name = lead.full_name.trim().to_lowercase();
    let single_repeated_char = name.len() > 1 && name.chars().all(|c| Some(c) == name.chars().next());
    if lead.full_name != "Unknown"
        && (PLACEHOLDER_NAMES.contains(&name.as_str())
            || name.chars().any(|c| c.is_ascii_digit())
            || single_repeated_char)
    {
        flag("Placeholder name", 2);
    }

    if let Some(email) = lead.email.as_deref() {
        if is_placeholder_email(email) {
            flag("Placeholder or disposable email", 2);
        } else if !is_valid_email(email) {
            flag("Malformed email address", 1);
        }
    }

    if let Some(phone) = lead.phone.as_deref() {
        if is_placeholder_phone(phone) {
            flag("Placeholder phone number", 2);
        } else if !validate_uk_phone(phone).0 {
            flag("Invalid phone number", 1);
        }
    }

    if free_text_mentions(lead, SUSPICIOUS_TEXT) {
        flag("Suspicious free-text content", 2);
    }

    if let Some(max) = lead.budget_max.or(lead.budget_min) {
        if max > IMPLAUSIBLE_BUDGET {
            flag("Implausible budget", 2);
        }
        let location = lead.preferred_location.as_deref().unwrap_or("").to_lowercase();
        if max < 250_000 && PRIME_LOCATIONS.iter().any(|p| location.contains(p)) {
            flag("Budget inconsistent with location", 1);
        }
    }

    let severity: u8 = flags.iter().map(|f| f.severity).sum();
    let is_fake = severity >= FAKE_SEVERITY_THRESHOLD;
    if is_fake {
        tracing::warn!(
            "Lead '{}' looks fake (severity {}): {:?}",
            lead.full_name,
            severity,
            flags.iter().map(|f| f.flag.as_str()).collect::<Vec<_>>()
        );
    }

    FakeLeadCheck {
        is_fake,
        flags,
        severity,
    }
}

/// Confidence: completeness and consistency of the record.
pub fn score_confidence(lead: &NormalizedLead, fake_check: &FakeLeadCheck) -> ConfidenceScore {
    let mut breakdown = Vec::new();
    let contact = check_contact(lead);

    if lead.full_name != "Unknown" {
        breakdown.push(ScoreFactor::new("Name", 15, "Name provided"));
        if lead.first_name.is_some() && lead.last_name.is_some() {
            breakdown.push(ScoreFactor::new("Full Name", 5, "First and last name known"));
        }
    }
    if contact.email_valid {
        breakdown.push(ScoreFactor::new("Email", 15, "Valid email on record"));
    }
    if contact.phone_valid {
        breakdown.push(ScoreFactor::new("Phone", 15, "Valid phone on record"));
    }
    if lead.has_budget() {
        breakdown.push(ScoreFactor::new("Budget", 10, "Budget known"));
    }
    if lead.timeline_to_purchase.is_some() {
        breakdown.push(ScoreFactor::new("Timeline", 10, "Timeline known"));
    }
    if lead.purchase_purpose.is_some() {
        breakdown.push(ScoreFactor::new("Purpose", 5, "Purpose known"));
    }
    if lead.preferred_location.is_some() {
        breakdown.push(ScoreFactor::new("Location", 5, "Location known"));
    }
    if lead.payment_method.is_some() {
        breakdown.push(ScoreFactor::new("Payment Method", 5, "Payment method known"));
    }
    if let Some(source) = lead.source_platform.as_deref() {
        let s = source.to_lowercase();
        if KNOWN_SOURCES.iter().any(|k| s.contains(k)) {
            breakdown.push(ScoreFactor::new("Source", 10, format!("Verified channel: {}", source)));
        } else {
            breakdown.push(ScoreFactor::new("Source", 5, format!("Unverified channel: {}", source)));
        }
    }
    if lead.agent_transcript.is_some() {
        breakdown.push(ScoreFactor::new("Transcript", 5, "Agent conversation on record"));
    }

    for fake in &fake_check.flags {
        breakdown.push(ScoreFactor::new("Integrity", -15, fake.flag.clone()));
    }

    let payment = lead.payment_method.as_deref().unwrap_or("").to_lowercase();
    let mortgage = lead.mortgage_status.as_deref().unwrap_or("").to_lowercase();
    if payment.contains("cash")
        && !mortgage.is_empty()
        && !["n/a", "none", "not required", "no"].contains(&mortgage.as_str())
    {
        breakdown.push(ScoreFactor::new(
            "Consistency",
            -10,
            "Cash buyer with a mortgage status on record",
        ));
    }

    ConfidenceScore {
        score: clamp_score(sum_points(&breakdown)),
        breakdown,
    }
}

/// Apply the classification rules in priority order; first match wins.
pub fn classify(
    quality: &QualityScore,
    intent: &IntentScore,
    confidence: &ConfidenceScore,
    fake_check: &FakeLeadCheck,
    low_urgency: bool,
    options: &ScoringOptions,
) -> Classification {
    let disqualified = fake_check.is_fake || quality.is_disqualified;

    match options.override_precedence {
        OverridePrecedence::TwentyEightDayFirst => {
            if intent.is_28_day_buyer {
                return Classification::HotLead;
            }
            if disqualified {
                return Classification::Disqualified;
            }
        }
        OverridePrecedence::DisqualificationFirst => {
            if disqualified {
                return Classification::Disqualified;
            }
            if intent.is_28_day_buyer {
                return Classification::HotLead;
            }
        }
    }

    let (q, i) = (quality.score, intent.score);

    if q >= 70 && i >= 70 {
        Classification::HotLead
    } else if q >= 60 && i >= 50 {
        Classification::Qualified
    } else if confidence.score < 50 {
        Classification::NeedsQualification
    } else if q >= 40 && i < 50 && !low_urgency {
        Classification::Nurture
    } else if q < 40 || low_urgency {
        Classification::LowPriority
    } else {
        Classification::NeedsQualification
    }
}

/// Map the final state onto a call-priority tier.
pub fn call_priority(
    classification: Classification,
    is_28_day_buyer: bool,
    low_urgency: bool,
) -> CallPriority {
    let tier = if is_28_day_buyer || classification == Classification::HotLead {
        1
    } else if low_urgency {
        4
    } else {
        match classification {
            Classification::Qualified => 2,
            Classification::NeedsQualification | Classification::Nurture => 3,
            _ => 4,
        }
    };
    CallPriority::for_tier(tier)
}

fn risk_flags(
    lead: &NormalizedLead,
    quality: &QualityScore,
    fake_check: &FakeLeadCheck,
    low_urgency: bool,
) -> Vec<String> {
    let mut flags = Vec::new();

    if lead.email.is_none() && lead.phone.is_none() {
        flags.push("No contact details".to_string());
    }
    if !lead.has_budget() {
        flags.push("No budget provided".to_string());
    }
    if low_urgency {
        flags.push("Long purchase horizon (12+ months)".to_string());
    }
    if lead.stop_agent_communication {
        flags.push("Agent communication stopped".to_string());
    }
    if funding_position(lead) == FundingPosition::Mortgage {
        flags.push("Mortgage not yet approved".to_string());
    }
    let overseas = lead
        .country
        .as_deref()
        .map(|c| {
            let c = c.trim().to_lowercase();
            !["uk", "united kingdom", "gb", "great britain", "england", "scotland", "wales"]
                .contains(&c.as_str())
        })
        .unwrap_or(false);
    if overseas && !lead.uk_solicitor {
        flags.push("Overseas buyer without UK solicitor".to_string());
    }
    if let Some(reason) = &quality.disqualification_reason {
        flags.push(reason.clone());
    }
    if fake_check.is_fake {
        flags.push("Possible fake lead".to_string());
    }

    flags
}

/// Score a lead with the default options.
pub fn score_lead_naybourhood(lead: &NormalizedLead) -> ScoreResult {
    score_lead_with_options(lead, &ScoringOptions::default())
}

/// Score a lead. Deterministic for identical input.
pub fn score_lead_with_options(lead: &NormalizedLead, options: &ScoringOptions) -> ScoreResult {
    let quality = score_quality(lead);
    let intent = score_intent(lead);
    let fake_check = check_fake_lead(lead);
    let confidence = score_confidence(lead, &fake_check);

    let is_28_day_buyer = intent.is_28_day_buyer;
    let low_urgency_flag = !is_28_day_buyer && intent.timeline == TimelineBucket::OverTwelveMonths;

    let classification = classify(
        &quality,
        &intent,
        &confidence,
        &fake_check,
        low_urgency_flag,
        options,
    );
    let call_priority = call_priority(classification, is_28_day_buyer, low_urgency_flag);
    let risk_flags = risk_flags(lead, &quality, &fake_check, low_urgency_flag);

    tracing::debug!(
        "Scored lead '{}': quality={} intent={} confidence={} -> {} (tier {})",
        lead.full_name,
        quality.score,
        intent.score,
        confidence.score,
        classification,
        call_priority.tier
    );

    ScoreResult {
        quality,
        intent,
        confidence,
        fake_check,
        classification,
        call_priority,
        risk_flags,
        is_28_day_buyer,
        low_urgency_flag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead_normalizer::{normalize_lead, RawLeadInput};
    use serde_json::json;

    fn lead(value: serde_json::Value) -> NormalizedLead {
        normalize_lead(&RawLeadInput::from(value))
    }

    #[test]
    fn test_timeline_buckets() {
        assert_eq!(classify_timeline(Some("28 days")), TimelineBucket::Immediate);
        assert_eq!(classify_timeline(Some("ASAP")), TimelineBucket::Immediate);
        assert_eq!(classify_timeline(Some("within 2 weeks")), TimelineBucket::Immediate);
        assert_eq!(classify_timeline(Some("0-3 months")), TimelineBucket::WithinThreeMonths);
        assert_eq!(classify_timeline(Some("3-6 months")), TimelineBucket::WithinSixMonths);
        assert_eq!(classify_timeline(Some("6 to 12 months")), TimelineBucket::WithinTwelveMonths);
        assert_eq!(classify_timeline(Some("within a year")), TimelineBucket::WithinTwelveMonths);
        assert_eq!(classify_timeline(Some("12+ months")), TimelineBucket::OverTwelveMonths);
        assert_eq!(classify_timeline(Some("18 months")), TimelineBucket::OverTwelveMonths);
        assert_eq!(classify_timeline(Some("just browsing")), TimelineBucket::OverTwelveMonths);
        assert_eq!(classify_timeline(Some("soonish")), TimelineBucket::Unknown);
        assert_eq!(classify_timeline(Some("right now")), TimelineBucket::Immediate);
        assert_eq!(classify_timeline(Some("3+ months")), TimelineBucket::WithinThreeMonths);
        assert_eq!(classify_timeline(Some("6+ months")), TimelineBucket::WithinSixMonths);
        assert_eq!(classify_timeline(Some("2+ years")), TimelineBucket::OverTwelveMonths);
    }

    #[test]
    fn test_negated_timelines_are_not_immediate() {
        for text in [
            "not now",
            "Not right now, maybe next year",
            "no plans for now",
            "not ASAP",
            "don't need it within 28 days",
        ] {
            assert_eq!(classify_timeline(Some(text)), TimelineBucket::Unknown, "{}", text);
        }

        let l = lead(json!({
            "full_name": "Oliver Reed",
            "email": "oliver.reed@gmail.com",
            "timeline": "Not right now, maybe next year"
        }));
        let result = score_lead_naybourhood(&l);
        assert!(!result.is_28_day_buyer);
        assert_ne!(result.classification, Classification::HotLead);
        assert_ne!(result.call_priority.tier, 1);
        assert_eq!(classify_timeline(None), TimelineBucket::Unknown);
    }

    #[test]
    fn test_quality_breakdown_sums_to_score() {
        let l = lead(json!({
            "full_name": "Amelia Grant",
            "email": "amelia.grant@gmail.com",
            "phone": "07400 123456",
            "budget": "£600K - £650K",
            "payment_method": "Cash",
            "proof_of_funds": true,
            "uk_broker": true,
            "uk_solicitor": true,
            "location": "Battersea",
            "bedrooms": 2,
            "development": "Riverside Quarter"
        }));
        let q = score_quality(&l);
        assert_eq!(q.score, 100);
        assert_eq!(sum_points(&q.breakdown), 100);
        assert!(!q.breakdown.iter().any(|f| f.factor == "Funding Cap"));
    }

    #[test]
    fn test_funding_at_cap_needs_no_adjustment() {
        let l = lead(json!({"payment_method": "Cash", "proof_of_funds": "yes"}));
        let q = score_quality(&l);
        // 15 + 10 = 25, exactly at the cap
        assert_eq!(q.score, 25);
        let i = score_intent(&l);
        assert!(!i.breakdown.iter().any(|f| f.factor == "Funding Readiness Cap"));
        assert_eq!(sum_points(&i.breakdown), i32::from(i.score));
    }

    #[test]
    fn test_engagement_cap_is_recorded() {
        let l = lead(json!({
            "viewing_booked": true,
            "replied": true,
            "connect_to_broker": true,
            "enquiry_type": "Viewing request",
            "status": "Reserved"
        }));
        let i = score_intent(&l);
        // 12 + 5 + 4 + 4 + 10 = 35, capped at 25
        let cap = i.breakdown.iter().find(|f| f.factor == "Engagement Cap");
        assert_eq!(cap.map(|f| f.points), Some(-10));
        // timeline unknown (5) + engagement (25)
        assert_eq!(i.score, 30);
    }

    #[test]
    fn test_disqualification_short_circuits_quality() {
        let l = lead(json!({
            "full_name": "Mark Chen",
            "email": "mark.chen@gmail.com",
            "payment_method": "Cash",
            "status": "Duplicate"
        }));
        let q = score_quality(&l);
        assert!(q.is_disqualified);
        assert_eq!(q.score, 0);
        assert_eq!(q.disqualification_reason.as_deref(), Some("Duplicate lead record"));

        let low_budget = lead(json!({"budget": "£20K"}));
        assert!(score_quality(&low_budget).is_disqualified);

        let not_interested = lead(json!({"notes": "Said on the call they are NOT interested"}));
        assert!(score_quality(&not_interested).is_disqualified);
    }

    #[test]
    fn test_fake_lead_detection() {
        let l = lead(json!({
            "full_name": "test",
            "email": "test@mailinator.com",
            "phone": "07777777777"
        }));
        let check = check_fake_lead(&l);
        assert!(check.is_fake);
        assert_eq!(check.severity, 6);

        let genuine = lead(json!({
            "full_name": "Sarah Mitchell",
            "email": "sarah.mitchell@gmail.com",
            "phone": "07400 123456"
        }));
        assert!(!check_fake_lead(&genuine).is_fake);
        assert!(check_fake_lead(&genuine).flags.is_empty());
    }

    #[test]
    fn test_fake_classifies_disqualified() {
        let l = lead(json!({
            "full_name": "asdf",
            "email": "asdf@yopmail.com",
            "timeline": "3 months"
        }));
        let result = score_lead_naybourhood(&l);
        assert!(result.fake_check.is_fake);
        assert_eq!(result.classification, Classification::Disqualified);
        assert_eq!(result.call_priority.tier, 4);
        assert!(result.risk_flags.contains(&"Possible fake lead".to_string()));
    }

    #[test]
    fn test_28_day_override_beats_fake_by_default() {
        let l = lead(json!({
            "full_name": "asdf",
            "email": "asdf@yopmail.com",
            "ready_within_28_days": true
        }));
        let result = score_lead_naybourhood(&l);
        assert!(result.fake_check.is_fake);
        assert_eq!(result.classification, Classification::HotLead);
        assert_eq!(result.call_priority.tier, 1);

        let strict = ScoringOptions {
            override_precedence: OverridePrecedence::DisqualificationFirst,
        };
        let result = score_lead_with_options(&l, &strict);
        assert_eq!(result.classification, Classification::Disqualified);
        // Still a 28-day buyer, so still called first
        assert!(result.is_28_day_buyer);
        assert_eq!(result.call_priority.tier, 1);
    }

    #[test]
    fn test_qualified_and_hot_thresholds() {
        let hot = lead(json!({
            "full_name": "Amelia Grant",
            "email": "amelia.grant@gmail.com",
            "phone": "07400 123456",
            "budget": "£600K - £650K",
            "payment_method": "Cash",
            "proof_of_funds": true,
            "location": "Battersea",
            "bedrooms": 2,
            "purpose": "Main residence",
            "timeline": "1-3 months",
            "viewing_booked": true,
            "replied": true,
            "source": "Rightmove"
        }));
        let result = score_lead_naybourhood(&hot);
        assert!(!result.is_28_day_buyer);
        assert!(result.quality.score >= 70, "quality {}", result.quality.score);
        assert!(result.intent.score >= 70, "intent {}", result.intent.score);
        assert_eq!(result.classification, Classification::HotLead);

        let qualified = lead(json!({
            "full_name": "Daniel Okafor",
            "email": "daniel.okafor@outlook.com",
            "phone": "07400 123457",
            "budget": "£450K - £500K",
            "mortgage_status": "AIP approved",
            "location": "Stratford",
            "bedrooms": 2,
            "purpose": "Investment",
            "timeline": "3-6 months",
            "viewing_intent_confirmed": true,
            "replied": true,
            "source": "Zoopla"
        }));
        let result = score_lead_naybourhood(&qualified);
        assert_eq!(result.classification, Classification::Qualified);
        assert_eq!(result.call_priority.tier, 2);
    }

    #[test]
    fn test_nurture_for_good_profile_with_low_intent() {
        let l = lead(json!({
            "full_name": "Grace Liu",
            "email": "grace.liu@gmail.com",
            "phone": "07400 123458",
            "budget": "£500K",
            "location": "Greenwich",
            "source": "Website",
            "timeline": "6-12 months"
        }));
        let result = score_lead_naybourhood(&l);
        assert!(result.quality.score >= 40);
        assert!(result.intent.score < 50);
        assert!(result.confidence.score >= 50);
        assert!(!result.low_urgency_flag);
        assert_eq!(result.classification, Classification::Nurture);
        assert_eq!(result.call_priority.tier, 3);
    }

    #[test]
    fn test_low_urgency_forces_low_priority() {
        let l = lead(json!({
            "full_name": "Grace Liu",
            "email": "grace.liu@gmail.com",
            "phone": "07400 123458",
            "budget": "£500K",
            "location": "Greenwich",
            "source": "Website",
            "timeline": "2 years"
        }));
        let result = score_lead_naybourhood(&l);
        assert!(result.low_urgency_flag);
        assert_eq!(result.classification, Classification::LowPriority);
        assert_eq!(result.call_priority.tier, 4);
    }

    #[test]
    fn test_override_precedence_parses() {
        assert_eq!(
            "disqualification_first".parse::<OverridePrecedence>(),
            Ok(OverridePrecedence::DisqualificationFirst)
        );
        assert_eq!(
            "28_day_first".parse::<OverridePrecedence>(),
            Ok(OverridePrecedence::TwentyEightDayFirst)
        );
        assert!("whatever".parse::<OverridePrecedence>().is_err());
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let l = lead(json!({"full_name": "Sarah Mitchell", "timeline": "28 days", "budget": "£1.5M"}));
        assert_eq!(score_lead_naybourhood(&l), score_lead_naybourhood(&l));
    }
}
