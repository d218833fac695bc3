//! Incremental, idempotent file-to-warehouse ingestion.
//!
//! One batch run walks the environment's bucket prefix, keeps the latest
//! closed-day snapshot per active feed, and loads every file the warehouse
//! has not seen yet. Per candidate: Discovered → Deduplicated → Checked →
//! Downloaded → Normalized → Loaded | Failed. Nothing is retried within a
//! run; the next scheduled run is the retry mechanism.

pub mod lister;
pub mod normalize;
pub mod selector;

use chrono::Utc;
use object_store::{aws::AmazonS3Builder, ObjectStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::{Settings, SourceEnv};
use crate::http::PgClient;
use crate::summary::{BatchSummary, Status};

/// Build the S3 client for the configured bucket.
pub fn build_store(settings: &Settings) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(&settings.bucket)
        .with_region(&settings.region)
        .with_access_key_id(&settings.access_key)
        .with_secret_access_key(&settings.secret_key);
    if let Some(endpoint) = &settings.endpoint {
        builder = builder.with_endpoint(endpoint);
    }
    Ok(Arc::new(builder.build()?))
}

/// Run one feed ingestion batch against a single environment.
///
/// Sequential, one candidate at a time. Stage failures are recorded against
/// the candidate and the batch carries on; the returned summary is the
/// operator's view of what actually happened.
pub async fn ingest(
    pg_client: &mut PgClient,
    store: &dyn ObjectStore,
    settings: &Settings,
    env: SourceEnv,
) -> anyhow::Result<BatchSummary> {
    let time = std::time::Instant::now();
    let mut summary = BatchSummary::default();

    // activation table: logical file name -> destination
    let feeds = crate::config::load_feed_config(&settings.feed_config)?;
    let destinations: HashMap<String, &crate::config::FeedConfig> = feeds
        .iter()
        .filter(|f| f.is_active())
        .map(|f| (f.file_name.clone(), f))
        .collect();
    let active: HashSet<String> = destinations.keys().cloned().collect();
    debug!("{} active feeds configured", active.len());

    info!("listing {} feed files ...", env);
    let candidates = lister::list_candidates(store, settings.prefix(env)).await?;

    let today = Utc::now().date_naive();
    let selected = selector::select(candidates.clone(), &active, selector::go_live(), today);
    let kept: HashSet<&str> = selected.iter().map(|c| c.key.as_str()).collect();
    for candidate in &candidates {
        if !kept.contains(candidate.key.as_str()) {
            summary.record(candidate.key.clone(), Status::Discarded);
        }
    }
    info!(
        "{} of {} candidates selected for ingestion",
        selected.len(),
        candidates.len()
    );

    let encodings = normalize::Encodings::default();
    for candidate in selected {
        let feed = match destinations.get(&candidate.logical_name) {
            Some(feed) => *feed,
            // unreachable after the selector's active-set filter
            None => continue,
        };

        // membership check against the table of record
        match crate::warehouse::already_loaded(
            pg_client,
            &feed.table,
            &candidate.logical_name,
            &candidate.file_date_raw,
            env.as_str(),
        )
        .await
        {
            Ok(true) => {
                debug!("{} already in {}", candidate.key, feed.table);
                summary.record(candidate.key.clone(), Status::Existing);
                continue;
            }
            Ok(false) => {}
            Err(err) => {
                error!("failed to check {} in {}, error({err})", candidate.key, feed.table);
                summary.record(
                    candidate.key.clone(),
                    Status::Failed {
                        reason: err.to_string(),
                    },
                );
                continue;
            }
        }

        // download, normalize, load
        let table =
            match normalize::fetch_table(store, &candidate, env, encodings, Utc::now()).await {
                Ok(table) => table,
                Err(err) => {
                    error!("failed to normalize {}, error({err})", candidate.key);
                    summary.record(
                        candidate.key.clone(),
                        Status::Failed {
                            reason: err.to_string(),
                        },
                    );
                    continue;
                }
            };

        match crate::warehouse::load(pg_client, &feed.table, &table, feed.keep_history()).await {
            Ok(rows) => {
                info!("{} loaded into {} ({rows} rows)", candidate.key, feed.table);
                summary.record(candidate.key.clone(), Status::Loaded { rows });
            }
            Err(err) => {
                error!("failed to load {} into {}, error({err})", candidate.key, feed.table);
                summary.record(
                    candidate.key.clone(),
                    Status::Failed {
                        reason: err.to_string(),
                    },
                );
            }
        }
    }

    info!("feed batch for {} complete: {summary}. {}", env, crate::time_elapsed(time));
    Ok(summary)
}
