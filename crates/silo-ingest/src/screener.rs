//! Client for the upstream Screener query API, plus the batch that loads
//! configured screens into the warehouse.
//!
//! A screen call is `GET {base}ckey={key}&ScreenNames={name}` with the
//! entitlement header, returning a JSON array whose first element carries a
//! `QueryResults` array of row objects.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::{ScreenerEndpoint, Settings};
use crate::error::IngestError;
use crate::http::{HttpClient, PgClient};
use crate::summary::{BatchSummary, Status};
use crate::table::{Column, ColumnType, Table};

const ENTITLEMENT_HEADER: &str = "Dylan2010.EntitlementToken";

pub struct ScreenerClient {
    http_client: HttpClient,
    base_url: String,
    ckey: String,
}

impl ScreenerClient {
    pub fn new(endpoint: &ScreenerEndpoint) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url: endpoint.base_url.clone(),
            ckey: endpoint.ckey.clone(),
        }
    }

    /// The full query URL: ckey, screen name, then any optional parameters
    /// that have a value.
    fn screen_url(&self, screen_name: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}ckey={}&ScreenNames={}",
            self.base_url, self.ckey, screen_name
        );
        for (key, value) in params {
            url.push_str(&format!("&{key}={value}"));
        }
        url
    }

    /// Fetch one screen and return its rows as a table.
    pub async fn run_screen(
        &self,
        screen_name: &str,
        params: &[(&str, &str)],
    ) -> Result<Table, IngestError> {
        let url = self.screen_url(screen_name, params);
        debug!("fetching screen {screen_name}");

        let response: Value = self
            .http_client
            .get(url)
            .header(ENTITLEMENT_HEADER, &self.ckey)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        results_to_table(&response)
    }
}

/// Extract `QueryResults` from the response body and pivot the row objects
/// into a table. `serde_json` yields each object's keys alphabetically, so
/// columns come out in alphabetical order, with keys that only appear in
/// later rows appended after the first row's set.
fn results_to_table(response: &Value) -> Result<Table, IngestError> {
    let results = response
        .as_array()
        .and_then(|list| list.first())
        .and_then(|first| first.get("QueryResults"))
        .and_then(Value::as_array)
        .ok_or_else(|| IngestError::Schema("QueryResults not found in response".to_string()))?;

    let mut columns: Vec<String> = Vec::new();
    for row in results {
        if let Some(object) = row.as_object() {
            for key in object.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let rows = results
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| row.get(column).and_then(value_to_cell))
                .collect()
        })
        .collect();

    Ok(Table {
        columns: columns
            .into_iter()
            .map(|name| Column {
                name,
                ty: ColumnType::Text,
            })
            .collect(),
        rows,
    })
}

fn value_to_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Load every active screen from the activation table into its destination,
/// honoring the per-screen history flag. Failures are recorded per screen
/// and the batch carries on.
pub async fn load_screens(
    pg_client: &mut PgClient,
    settings: &Settings,
) -> anyhow::Result<BatchSummary> {
    let time = std::time::Instant::now();
    let mut summary = BatchSummary::default();

    let screens = crate::config::load_screen_config(&settings.screen_config)?;
    for screen in &screens {
        if !screen.is_active() {
            summary.record(screen.screen_name.clone(), Status::Discarded);
            continue;
        }

        let client = ScreenerClient::new(settings.screener(screen.environment));
        let mut table = match client.run_screen(&screen.screen_name, &[]).await {
            Ok(table) => table,
            Err(err) => {
                error!("failed to fetch screen {}, error({err})", screen.screen_name);
                summary.record(
                    screen.screen_name.clone(),
                    Status::Failed {
                        reason: err.to_string(),
                    },
                );
                continue;
            }
        };

        table.sanitize_columns();
        table.drop_null_rows();
        table.infer_types();
        table.push_constant(
            "source_env",
            ColumnType::Text,
            Some(screen.environment.to_string()),
        );
        table.push_constant(
            "rep_date",
            ColumnType::TimestampTz,
            Some(Utc::now().to_rfc3339()),
        );

        match crate::warehouse::load(pg_client, &screen.table, &table, screen.keep_history()).await
        {
            Ok(rows) => {
                info!("screen {} loaded into {} ({rows} rows)", screen.screen_name, screen.table);
                summary.record(screen.screen_name.clone(), Status::Loaded { rows });
            }
            Err(err) => {
                error!(
                    "failed to load screen {} into {}, error({err})",
                    screen.screen_name, screen.table
                );
                summary.record(
                    screen.screen_name.clone(),
                    Status::Failed {
                        reason: err.to_string(),
                    },
                );
            }
        }
    }

    info!("screen batch complete: {summary}. {}", crate::time_elapsed(time));
    Ok(summary)
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
