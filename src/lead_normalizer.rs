//! Canonical lead record and the normalizer that produces it.
//!
//! Leads arrive as CSV rows, web forms, CRM webhooks and old Airtable
//! exports, each with its own field spellings. Every canonical field has an
//! ordered alias table below; the first present, non-empty value wins.

use crate::parsers::{parse_budget_range, parse_date};
use crate::status::{normalize_status, LeadStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An untyped lead record from any ingestion path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawLeadInput(pub Map<String, Value>);

impl RawLeadInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for CSV rows and tests.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// First alias holding a usable scalar, rendered as a trimmed string.
    pub fn first_string(&self, aliases: &[&str]) -> Option<String> {
        aliases
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find_map(value_as_string)
    }

    /// First alias holding a whole number (numeric strings like `"3 bed"` included).
    pub fn first_integer(&self, aliases: &[&str]) -> Option<i64> {
        aliases
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find_map(value_as_integer)
    }

    /// True when any alias holds a truthy value.
    pub fn any_truthy(&self, aliases: &[&str]) -> bool {
        aliases
            .iter()
            .filter_map(|key| self.0.get(*key))
            .any(is_truthy)
    }
}

impl From<Map<String, Value>> for RawLeadInput {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Value> for RawLeadInput {
    /// Non-object JSON becomes an empty record.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let lowered = s.trim().to_lowercase();
            if lowered.starts_with("studio") {
                return Some(0);
            }
            let digits: String = lowered.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

/// Non-empty values are true, except spreadsheet negatives
/// (`"no"`, `"false"`, `"0"`, ...).
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => {
            let lowered = s.trim().to_lowercase();
            !matches!(
                lowered.as_str(),
                "" | "no" | "n" | "false" | "0" | "off" | "none" | "null"
            )
        }
        Value::Array(_) | Value::Object(_) => true,
    }
}

// Alias tables, in precedence order.
pub const FULL_NAME_KEYS: &[&str] = &["full_name", "fullName", "Full Name", "name", "Name", "lead_name", "contact_name"];
pub const FIRST_NAME_KEYS: &[&str] = &["first_name", "firstName", "First Name", "forename"];
pub const LAST_NAME_KEYS: &[&str] = &["last_name", "lastName", "Last Name", "surname"];
pub const EMAIL_KEYS: &[&str] = &["email", "Email", "email_address", "emailAddress"];
pub const PHONE_KEYS: &[&str] = &["phone", "Phone", "phone_number", "phoneNumber", "mobile", "mobile_number", "telephone"];
pub const COUNTRY_KEYS: &[&str] = &["country", "Country", "country_of_residence", "countryOfResidence"];
pub const BUDGET_RANGE_KEYS: &[&str] = &["budget_range", "budgetRange", "budget", "Budget", "price_range", "priceRange"];
pub const BUDGET_MIN_KEYS: &[&str] = &["budget_min", "budgetMin", "min_budget", "minBudget"];
pub const BUDGET_MAX_KEYS: &[&str] = &["budget_max", "budgetMax", "max_budget", "maxBudget"];
pub const BEDROOM_KEYS: &[&str] = &["preferred_bedrooms", "preferredBedrooms", "bedrooms", "Bedrooms", "beds"];
pub const LOCATION_KEYS: &[&str] = &["preferred_location", "preferredLocation", "location", "Location", "area", "Area"];
pub const TIMELINE_KEYS: &[&str] = &["timeline_to_purchase", "timelineToPurchase", "timeline", "Timeline", "purchase_timeline", "purchaseTimeline"];
pub const PURPOSE_KEYS: &[&str] = &["purchase_purpose", "purchasePurpose", "purpose", "Purpose", "buying_purpose"];
pub const READY_28_DAY_KEYS: &[&str] = &["ready_within_28_days", "readyWithin28Days", "ready_in_28_days", "is_28_day_buyer", "28_day_buyer"];
pub const SOURCE_PLATFORM_KEYS: &[&str] = &["source_platform", "sourcePlatform", "source", "Source", "platform"];
pub const SOURCE_CAMPAIGN_KEYS: &[&str] = &["source_campaign", "sourceCampaign", "campaign", "Campaign", "campaign_name", "campaignName"];
pub const DEVELOPMENT_KEYS: &[&str] = &["development_name", "developmentName", "development", "Development"];
pub const ENQUIRY_TYPE_KEYS: &[&str] = &["enquiry_type", "enquiryType", "inquiry_type", "inquiryType", "enquiry"];
pub const STATUS_KEYS: &[&str] = &["status", "Status", "lead_status", "leadStatus", "pipeline_status"];
pub const PAYMENT_METHOD_KEYS: &[&str] = &["payment_method", "paymentMethod", "Payment Method", "buyer_type", "buyerType", "finance_type"];
pub const PROOF_OF_FUNDS_KEYS: &[&str] = &["proof_of_funds", "proofOfFunds", "pof"];
pub const MORTGAGE_STATUS_KEYS: &[&str] = &["mortgage_status", "mortgageStatus", "mortgage", "aip_status"];
pub const UK_BROKER_KEYS: &[&str] = &["uk_broker", "ukBroker", "has_broker", "broker"];
pub const UK_SOLICITOR_KEYS: &[&str] = &["uk_solicitor", "ukSolicitor", "has_solicitor", "solicitor"];
pub const NOTES_KEYS: &[&str] = &["notes", "Notes", "comments", "message"];
pub const TRANSCRIPT_KEYS: &[&str] = &["agent_transcript", "agentTranscript", "transcript", "call_transcript"];
pub const VIEWING_INTENT_KEYS: &[&str] = &["viewing_intent_confirmed", "viewingIntentConfirmed", "wants_viewing"];
pub const VIEWING_BOOKED_KEYS: &[&str] = &["viewing_booked", "viewingBooked"];
pub const VIEWING_DATE_KEYS: &[&str] = &["viewing_date", "viewingDate"];
pub const REPLIED_KEYS: &[&str] = &["replied", "has_replied", "hasReplied"];
pub const STOP_COMMS_KEYS: &[&str] = &["stop_agent_communication", "stopAgentCommunication", "stop_comms", "opt_out"];
pub const CONNECT_BROKER_KEYS: &[&str] = &["connect_to_broker", "connectToBroker", "broker_connect", "wants_broker"];
pub const DATE_ADDED_KEYS: &[&str] = &["date_added", "dateAdded", "Date Added", "created_at", "createdAt", "timestamp"];

/// The canonical lead consumed by the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLead {
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,

    pub email: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,

    pub budget_range: Option<String>,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,

    pub preferred_bedrooms: Option<i64>,
    pub preferred_location: Option<String>,

    pub timeline_to_purchase: Option<String>,
    pub purchase_purpose: Option<String>,
    pub ready_within_28_days: bool,

    pub source_platform: Option<String>,
    pub source_campaign: Option<String>,
    pub development_name: Option<String>,
    pub enquiry_type: Option<String>,

    pub status: LeadStatus,

    pub payment_method: Option<String>,
    pub proof_of_funds: bool,
    pub mortgage_status: Option<String>,
    pub uk_broker: bool,
    pub uk_solicitor: bool,

    pub notes: Option<String>,
    pub agent_transcript: Option<String>,

    pub viewing_intent_confirmed: bool,
    pub viewing_booked: bool,
    pub viewing_date: Option<String>,

    pub replied: bool,
    pub stop_agent_communication: bool,
    pub connect_to_broker: bool,

    pub date_added: String,
}

impl NormalizedLead {
    /// A lead with only a name, everything else absent. Mostly for tests.
    pub fn named(full_name: impl Into<String>) -> Self {
        normalize_lead(&RawLeadInput::new().with("full_name", full_name.into()))
    }

    pub fn has_budget(&self) -> bool {
        self.budget_min.is_some() || self.budget_max.is_some()
    }
}

/// Produce the canonical record from any raw shape. Never fails.
pub fn normalize_lead(raw: &RawLeadInput) -> NormalizedLead {
    let first_name = raw.first_string(FIRST_NAME_KEYS);
    let last_name = raw.first_string(LAST_NAME_KEYS);
    let full_name = resolve_full_name(raw, first_name.as_deref(), last_name.as_deref());

    // Derive name parts from the full name when the source only gave one field
    let (first_name, last_name) = match (first_name, last_name) {
        (None, None) if full_name != UNKNOWN_NAME => split_full_name(&full_name),
        parts => parts,
    };

    let budget_range = raw.first_string(BUDGET_RANGE_KEYS);
    let parsed_budget = parse_budget_range(budget_range.as_deref());
    let budget_min = raw.first_integer(BUDGET_MIN_KEYS).or(parsed_budget.min);
    let budget_max = raw.first_integer(BUDGET_MAX_KEYS).or(parsed_budget.max);

    let status_raw = raw.first_string(STATUS_KEYS);

    let lead = NormalizedLead {
        full_name,
        first_name,
        last_name,
        email: raw.first_string(EMAIL_KEYS).map(|e| e.to_lowercase()),
        phone: raw.first_string(PHONE_KEYS),
        country: raw.first_string(COUNTRY_KEYS),
        budget_range,
        budget_min,
        budget_max,
        preferred_bedrooms: raw.first_integer(BEDROOM_KEYS),
        preferred_location: raw.first_string(LOCATION_KEYS),
        timeline_to_purchase: raw.first_string(TIMELINE_KEYS),
        purchase_purpose: raw.first_string(PURPOSE_KEYS),
        ready_within_28_days: raw.any_truthy(READY_28_DAY_KEYS),
        source_platform: raw.first_string(SOURCE_PLATFORM_KEYS),
        source_campaign: raw.first_string(SOURCE_CAMPAIGN_KEYS),
        development_name: raw.first_string(DEVELOPMENT_KEYS),
        enquiry_type: raw.first_string(ENQUIRY_TYPE_KEYS),
        status: normalize_status(status_raw.as_deref()),
        payment_method: raw.first_string(PAYMENT_METHOD_KEYS),
        proof_of_funds: raw.any_truthy(PROOF_OF_FUNDS_KEYS),
        mortgage_status: raw.first_string(MORTGAGE_STATUS_KEYS),
        uk_broker: raw.any_truthy(UK_BROKER_KEYS),
        uk_solicitor: raw.any_truthy(UK_SOLICITOR_KEYS),
        notes: raw.first_string(NOTES_KEYS),
        agent_transcript: raw.first_string(TRANSCRIPT_KEYS),
        viewing_intent_confirmed: raw.any_truthy(VIEWING_INTENT_KEYS),
        viewing_booked: raw.any_truthy(VIEWING_BOOKED_KEYS),
        viewing_date: raw
            .first_string(VIEWING_DATE_KEYS)
            .map(|d| parse_date(Some(&d))),
        replied: raw.any_truthy(REPLIED_KEYS),
        stop_agent_communication: raw.any_truthy(STOP_COMMS_KEYS),
        connect_to_broker: raw.any_truthy(CONNECT_BROKER_KEYS),
        date_added: parse_date(raw.first_string(DATE_ADDED_KEYS).as_deref()),
    };

    tracing::debug!(
        "Normalized lead '{}' (status: {}, budget: {:?}-{:?})",
        lead.full_name,
        lead.status,
        lead.budget_min,
        lead.budget_max
    );

    lead
}

const UNKNOWN_NAME: &str = "Unknown";

fn resolve_full_name(raw: &RawLeadInput, first: Option<&str>, last: Option<&str>) -> String {
    if let Some(full) = raw.first_string(FULL_NAME_KEYS) {
        return full;
    }

    let joined = [first, last].into_iter().flatten().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        UNKNOWN_NAME.to_string()
    } else {
        joined
    }
}

fn split_full_name(full_name: &str) -> (Option<String>, Option<String>) {
    let mut parts = full_name.splitn(2, char::is_whitespace);
    let first = parts.next().map(str::to_string).filter(|s| !s.is_empty());
    let last = parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawLeadInput {
        RawLeadInput::from(value)
    }

    #[test]
    fn test_empty_record_is_fully_defined() {
        let lead = normalize_lead(&RawLeadInput::new());
        assert_eq!(lead.full_name, "Unknown");
        assert_eq!(lead.status, LeadStatus::ContactPending);
        assert!(lead.email.is_none());
        assert!(!lead.ready_within_28_days);
        assert!(chrono::DateTime::parse_from_rfc3339(&lead.date_added).is_ok());
    }

    #[test]
    fn test_name_precedence() {
        let lead = normalize_lead(&raw(json!({
            "fullName": "Sarah Mitchell",
            "first_name": "Sally",
            "last_name": "M"
        })));
        assert_eq!(lead.full_name, "Sarah Mitchell");
        assert_eq!(lead.first_name.as_deref(), Some("Sally"));

        let lead = normalize_lead(&raw(json!({"firstName": "Tom", "surname": "Hale"})));
        assert_eq!(lead.full_name, "Tom Hale");

        let lead = normalize_lead(&raw(json!({"name": "Priya Shah"})));
        assert_eq!(lead.first_name.as_deref(), Some("Priya"));
        assert_eq!(lead.last_name.as_deref(), Some("Shah"));
    }

    #[test]
    fn test_aliases_and_nulls() {
        let lead = normalize_lead(&raw(json!({
            "preferred_location": null,
            "area": "Canary Wharf",
            "budget": "£400K - £500K",
            "beds": "2 bed",
            "Email": "  Buyer@Example.co.uk ",
            "status": "Hot"
        })));
        assert_eq!(lead.preferred_location.as_deref(), Some("Canary Wharf"));
        assert_eq!(lead.budget_range.as_deref(), Some("£400K - £500K"));
        assert_eq!(lead.budget_min, Some(400_000));
        assert_eq!(lead.budget_max, Some(500_000));
        assert_eq!(lead.preferred_bedrooms, Some(2));
        assert_eq!(lead.email.as_deref(), Some("buyer@example.co.uk"));
        assert_eq!(lead.status, LeadStatus::FollowUp);
    }

    #[test]
    fn test_explicit_budget_bounds_win_over_range() {
        let lead = normalize_lead(&raw(json!({
            "budget": "£400K - £500K",
            "budget_min": 425000
        })));
        assert_eq!(lead.budget_min, Some(425_000));
        assert_eq!(lead.budget_max, Some(500_000));
    }

    #[test]
    fn test_boolean_coercion() {
        let lead = normalize_lead(&raw(json!({
            "readyWithin28Days": "yes",
            "proof_of_funds": 1,
            "uk_broker": "No",
            "solicitor": "Smith & Co",
            "viewing_booked": false,
            "replied": true
        })));
        assert!(lead.ready_within_28_days);
        assert!(lead.proof_of_funds);
        assert!(!lead.uk_broker);
        assert!(lead.uk_solicitor);
        assert!(!lead.viewing_booked);
        assert!(lead.replied);
    }

    #[test]
    fn test_unknown_status_defaults() {
        let lead = normalize_lead(&raw(json!({"lead_status": "maybe later?"})));
        assert_eq!(lead.status, LeadStatus::ContactPending);
    }

    #[test]
    fn test_non_object_payload_is_empty_record() {
        let lead = normalize_lead(&raw(json!(["not", "an", "object"])));
        assert_eq!(lead.full_name, "Unknown");
    }
}
