//! Import leads from a CSV export.
//!
//! Header names are used as raw field names, so any export the normalizer
//! has aliases for (Airtable, portal CSVs, CRM dumps) works unchanged.
//!
//! Usage: `import_leads_csv <file.csv> [--dry-run]`

use dotenvy::dotenv;
use naybourhood_lead_api::config::Config;
use naybourhood_lead_api::db::Database;
use naybourhood_lead_api::db_storage::LeadStorage;
use naybourhood_lead_api::lead_normalizer::{normalize_lead, RawLeadInput};
use naybourhood_lead_api::legacy::convert_to_legacy_format;
use naybourhood_lead_api::scoring::score_lead_with_options;
use naybourhood_lead_api::webhook_models::IdempotencyKey;
use serde_json::Value;

/// Build a raw lead from one CSV record, dropping empty cells.
fn row_to_raw(headers: &csv::StringRecord, record: &csv::StringRecord) -> RawLeadInput {
    let mut raw = RawLeadInput::new();
    for (header, cell) in headers.iter().zip(record.iter()) {
        let cell = cell.trim();
        if !cell.is_empty() {
            raw.insert(header.trim(), cell);
        }
    }
    raw
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .ok_or_else(|| anyhow::anyhow!("Usage: import_leads_csv <file.csv> [--dry-run]"))?;
    let dry_run = args.iter().any(|a| a == "--dry-run");

    let config = Config::from_env()?;
    let options = config.scoring_options();
    let storage = if dry_run {
        None
    } else {
        let db = Database::new(&config.database_url).await?;
        Some(LeadStorage::new(db.pool.clone()))
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    tracing::info!("Importing {} ({} columns)", path, headers.len());

    let mut imported = 0;
    let mut skipped = 0;
    let mut error_count = 0;

    for (index, record) in reader.records().enumerate() {
        let row = index + 2; // 1-based, after the header line
        if index > 0 && index % 500 == 0 {
            tracing::info!(
                "Processed {} rows (Imported: {}, Skipped: {}, Errors: {})",
                index,
                imported,
                skipped,
                error_count
            );
        }

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("Row {}: unreadable CSV record: {}", row, e);
                error_count += 1;
                continue;
            }
        };

        let raw = row_to_raw(&headers, &record);
        if raw.0.is_empty() {
            skipped += 1;
            continue;
        }

        let lead = normalize_lead(&raw);
        let result = score_lead_with_options(&lead, &options);
        let legacy = convert_to_legacy_format(&result);

        let Some(storage) = &storage else {
            tracing::info!(
                "Row {}: '{}' -> {} (tier {})",
                row,
                lead.full_name,
                result.classification,
                result.call_priority.tier
            );
            imported += 1;
            continue;
        };

        let key = IdempotencyKey::from_payload(&raw);
        let payload = Value::Object(raw.0);
        match storage
            .insert_scored_lead(&lead, &payload, key.external_id.as_deref(), &legacy)
            .await
        {
            Ok(id) => {
                tracing::debug!("Row {} stored as lead {}", row, id);
                imported += 1;
            }
            Err(e) => {
                tracing::error!("Row {}: failed to store '{}': {}", row, lead.full_name, e);
                error_count += 1;
            }
        }
    }

    tracing::info!("Import complete{}.", if dry_run { " (dry run)" } else { "" });
    tracing::info!("Imported: {}", imported);
    tracing::info!("Skipped (empty rows): {}", skipped);
    tracing::info!("Errors: {}", error_count);

    Ok(())
}
