//! Re-score every stored lead with the current rules.
//!
//! Usage: `rescore_leads [--limit N] [--with-summaries]`

use dotenvy::dotenv;
use naybourhood_lead_api::config::Config;
use naybourhood_lead_api::db::Database;
use naybourhood_lead_api::db_storage::LeadStorage;
use naybourhood_lead_api::legacy::convert_to_legacy_format;
use naybourhood_lead_api::scoring::score_lead_with_options;
use naybourhood_lead_api::summary::{
    generate_summary_with_fallback, LlmSummaryClient, SummaryGenerator,
};
use std::collections::HashMap;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let limit = match args.iter().position(|a| a == "--limit") {
        Some(i) => Some(
            args.get(i + 1)
                .and_then(|n| n.parse::<i64>().ok())
                .ok_or_else(|| anyhow::anyhow!("--limit needs a number"))?,
        ),
        None => None,
    };
    let with_summaries = args.iter().any(|a| a == "--with-summaries");

    let config = Config::from_env()?;
    let options = config.scoring_options();
    let db = Database::new(&config.database_url).await?;
    let storage = LeadStorage::new(db.pool.clone());

    let llm = if with_summaries {
        LlmSummaryClient::from_config(&config)?
    } else {
        None
    };
    let generator = llm.as_ref().map(|c| c as &dyn SummaryGenerator);

    let ids = storage.list_lead_ids(limit).await?;
    let total = ids.len();
    tracing::info!("Re-scoring {} lead(s)...", total);

    let mut rescored = 0;
    let mut missing = 0;
    let mut error_count = 0;
    let mut by_classification: HashMap<String, usize> = HashMap::new();

    for (processed, id) in ids.into_iter().enumerate() {
        if processed > 0 && processed % 100 == 0 {
            tracing::info!(
                "Processed {}/{} leads (Rescored: {}, Missing: {}, Errors: {})",
                processed,
                total,
                rescored,
                missing,
                error_count
            );
        }

        let lead = match storage.fetch_normalized_lead(id).await {
            Ok(Some(lead)) => lead,
            Ok(None) => {
                tracing::warn!("Lead {} disappeared before re-scoring", id);
                missing += 1;
                continue;
            }
            Err(e) => {
                tracing::error!("Failed to load lead {}: {}", id, e);
                error_count += 1;
                continue;
            }
        };

        let result = score_lead_with_options(&lead, &options);
        let legacy = convert_to_legacy_format(&result);

        if let Err(e) = storage.update_score(id, &legacy).await {
            tracing::error!("Failed to update lead {}: {}", id, e);
            error_count += 1;
            continue;
        }

        if with_summaries {
            let summary = generate_summary_with_fallback(generator, &lead, &result).await;
            if let Err(e) = storage.store_summary(id, &summary).await {
                tracing::error!("Failed to store summary for lead {}: {}", id, e);
            }
        }

        *by_classification
            .entry(legacy.ai_classification)
            .or_default() += 1;
        rescored += 1;
    }

    tracing::info!("Re-scoring complete.");
    tracing::info!("Rescored: {}", rescored);
    tracing::info!("Missing: {}", missing);
    tracing::info!("Errors: {}", error_count);
    for (classification, count) in &by_classification {
        tracing::info!("  {}: {}", classification, count);
    }

    Ok(())
}
