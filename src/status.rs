//! Pipeline status normalization.
//!
//! Every producer of lead-status values (imports, webhooks, the API) passes
//! through [`normalize_status`] before anything is persisted, so the stored
//! column only ever holds one of the nine [`LeadStatus`] values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical pipeline status, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LeadStatus {
    #[default]
    #[serde(rename = "Contact Pending")]
    ContactPending,
    #[serde(rename = "Follow Up")]
    FollowUp,
    #[serde(rename = "Viewing Booked")]
    ViewingBooked,
    #[serde(rename = "Negotiating")]
    Negotiating,
    #[serde(rename = "Reserved")]
    Reserved,
    #[serde(rename = "Exchanged")]
    Exchanged,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Not Proceeding")]
    NotProceeding,
    #[serde(rename = "Duplicate")]
    Duplicate,
}

impl LeadStatus {
    /// All valid statuses in pipeline order.
    pub const ALL: [LeadStatus; 9] = [
        LeadStatus::ContactPending,
        LeadStatus::FollowUp,
        LeadStatus::ViewingBooked,
        LeadStatus::Negotiating,
        LeadStatus::Reserved,
        LeadStatus::Exchanged,
        LeadStatus::Completed,
        LeadStatus::NotProceeding,
        LeadStatus::Duplicate,
    ];

    /// The persisted display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::ContactPending => "Contact Pending",
            LeadStatus::FollowUp => "Follow Up",
            LeadStatus::ViewingBooked => "Viewing Booked",
            LeadStatus::Negotiating => "Negotiating",
            LeadStatus::Reserved => "Reserved",
            LeadStatus::Exchanged => "Exchanged",
            LeadStatus::Completed => "Completed",
            LeadStatus::NotProceeding => "Not Proceeding",
            LeadStatus::Duplicate => "Duplicate",
        }
    }

    /// Statuses past the first viewing, used by the intent score.
    pub fn is_advanced(&self) -> bool {
        matches!(
            self,
            LeadStatus::Negotiating
                | LeadStatus::Reserved
                | LeadStatus::Exchanged
                | LeadStatus::Completed
        )
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alias table, keyed by lower-cased trimmed input.
/// Legacy CRM labels and punctuation variants live here, not in code branches.
pub const STATUS_ALIASES: &[(&str, LeadStatus)] = &[
    // Contact Pending
    ("new", LeadStatus::ContactPending),
    ("new lead", LeadStatus::ContactPending),
    ("pending", LeadStatus::ContactPending),
    ("contact pending", LeadStatus::ContactPending),
    ("contact_pending", LeadStatus::ContactPending),
    ("contact-pending", LeadStatus::ContactPending),
    ("contactpending", LeadStatus::ContactPending),
    ("not contacted", LeadStatus::ContactPending),
    ("uncontacted", LeadStatus::ContactPending),
    ("open", LeadStatus::ContactPending),
    // Follow Up
    ("follow up", LeadStatus::FollowUp),
    ("follow-up", LeadStatus::FollowUp),
    ("follow_up", LeadStatus::FollowUp),
    ("followup", LeadStatus::FollowUp),
    ("hot", LeadStatus::FollowUp),
    ("warm", LeadStatus::FollowUp),
    ("contacted", LeadStatus::FollowUp),
    ("in progress", LeadStatus::FollowUp),
    ("in_progress", LeadStatus::FollowUp),
    ("qualified", LeadStatus::FollowUp),
    ("callback", LeadStatus::FollowUp),
    // Viewing Booked
    ("viewing booked", LeadStatus::ViewingBooked),
    ("viewing_booked", LeadStatus::ViewingBooked),
    ("viewing-booked", LeadStatus::ViewingBooked),
    ("viewing", LeadStatus::ViewingBooked),
    ("viewing scheduled", LeadStatus::ViewingBooked),
    ("booked viewing", LeadStatus::ViewingBooked),
    ("viewed", LeadStatus::ViewingBooked),
    // Negotiating
    ("negotiating", LeadStatus::Negotiating),
    ("negotiation", LeadStatus::Negotiating),
    ("in negotiation", LeadStatus::Negotiating),
    ("offer", LeadStatus::Negotiating),
    ("offer made", LeadStatus::Negotiating),
    // Reserved
    ("reserved", LeadStatus::Reserved),
    ("reservation", LeadStatus::Reserved),
    ("under offer", LeadStatus::Reserved),
    // Exchanged
    ("exchanged", LeadStatus::Exchanged),
    ("exchange", LeadStatus::Exchanged),
    ("contracts exchanged", LeadStatus::Exchanged),
    // Completed
    ("completed", LeadStatus::Completed),
    ("complete", LeadStatus::Completed),
    ("sold", LeadStatus::Completed),
    ("won", LeadStatus::Completed),
    ("closed won", LeadStatus::Completed),
    // Not Proceeding
    ("not proceeding", LeadStatus::NotProceeding),
    ("not_proceeding", LeadStatus::NotProceeding),
    ("not-proceeding", LeadStatus::NotProceeding),
    ("lost", LeadStatus::NotProceeding),
    ("dead", LeadStatus::NotProceeding),
    ("cold", LeadStatus::NotProceeding),
    ("closed lost", LeadStatus::NotProceeding),
    ("not interested", LeadStatus::NotProceeding),
    ("disqualified", LeadStatus::NotProceeding),
    ("unqualified", LeadStatus::NotProceeding),
    // Duplicate
    ("duplicate", LeadStatus::Duplicate),
    ("dupe", LeadStatus::Duplicate),
    ("duplicated", LeadStatus::Duplicate),
];

/// Map any incoming status label onto the canonical set.
///
/// Lookup order: alias table, then case-insensitive match against the
/// canonical labels, then `Contact Pending` with a warning. Never fails.
pub fn normalize_status(input: Option<&str>) -> LeadStatus {
    let Some(raw) = input else {
        return LeadStatus::default();
    };

    let key = raw.trim().to_lowercase();
    if key.is_empty() {
        return LeadStatus::default();
    }

    if let Some((_, status)) = STATUS_ALIASES.iter().find(|(alias, _)| *alias == key) {
        return *status;
    }

    if let Some(status) = LeadStatus::ALL
        .iter()
        .find(|s| s.as_str().to_lowercase() == key)
    {
        return *status;
    }

    tracing::warn!(
        "Unknown lead status '{}', defaulting to {}",
        raw,
        LeadStatus::default()
    );
    LeadStatus::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_labels_map_to_pipeline() {
        assert_eq!(normalize_status(Some("New")), LeadStatus::ContactPending);
        assert_eq!(normalize_status(Some("Hot")), LeadStatus::FollowUp);
        assert_eq!(normalize_status(Some("SOLD")), LeadStatus::Completed);
        assert_eq!(normalize_status(Some("Lost")), LeadStatus::NotProceeding);
        assert_eq!(normalize_status(Some(" dead ")), LeadStatus::NotProceeding);
        assert_eq!(normalize_status(Some("follow_up")), LeadStatus::FollowUp);
    }

    #[test]
    fn test_canonical_labels_round_trip() {
        for status in LeadStatus::ALL {
            assert_eq!(normalize_status(Some(status.as_str())), status);
            assert_eq!(
                normalize_status(Some(&status.as_str().to_uppercase())),
                status
            );
        }
    }

    #[test]
    fn test_unknown_and_missing_default_to_contact_pending() {
        assert_eq!(normalize_status(None), LeadStatus::ContactPending);
        assert_eq!(normalize_status(Some("")), LeadStatus::ContactPending);
        assert_eq!(
            normalize_status(Some("awaiting moon phase")),
            LeadStatus::ContactPending
        );
    }

    #[test]
    fn test_aliases_point_at_valid_statuses() {
        for (alias, status) in STATUS_ALIASES {
            assert_eq!(alias.trim(), *alias);
            assert_eq!(alias.to_lowercase(), *alias);
            assert!(LeadStatus::ALL.contains(status));
        }
    }

    #[test]
    fn test_serializes_as_display_label() {
        let json = serde_json::to_string(&LeadStatus::NotProceeding).unwrap();
        assert_eq!(json, "\"Not Proceeding\"");
    }
}
