use chrono::{DateTime, Utc};
use tokio_postgres::types::ToSql;
use tracing::{debug, trace};

use crate::error::IngestError;
use crate::http::PgClient;
use crate::table::{ColumnType, Table};

/// Quote a possibly schema-qualified identifier for use in generated SQL.
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

fn exists_sql(table: &str) -> String {
    format!(
        "SELECT DISTINCT file_name, file_date, source_env FROM {} \
         WHERE file_name = $1 AND file_date = $2 AND source_env = $3",
        quote_ident(table)
    )
}

fn truncate_sql(table: &str) -> String {
    format!("TRUNCATE TABLE {}", quote_ident(table))
}

fn create_table_sql(table: &str, data: &Table) -> String {
    let columns = data
        .columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.ty.pg_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", quote_ident(table), columns)
}

fn insert_sql(table: &str, data: &Table) -> String {
    let columns = data
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let params = (1..=data.columns.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({}) VALUES ({})", quote_ident(table), columns, params)
}

/// The existence oracle: has a file with exactly this (logical name, raw
/// timestamp, source environment) already been persisted to `table`?
///
/// Always queries the table of record; no local caching. Two overlapping
/// runs can both see "missing" and both append — an accepted race, the
/// duplicate rows cost disk space only.
pub async fn already_loaded(
    pg_client: &PgClient,
    table: &str,
    file_name: &str,
    file_date_raw: &str,
    source_env: &str,
) -> Result<bool, IngestError> {
    // a destination created on first write may not exist yet; the name must
    // be quoted here or the server folds it to lowercase and a mixed-case
    // destination looks permanently missing
    let regclass = pg_client
        .query_one("SELECT to_regclass($1)::text", &[&quote_ident(table)])
        .await?;
    if regclass.get::<_, Option<String>>(0).is_none() {
        trace!("{table} does not exist yet; treating {file_name} as new");
        return Ok(false);
    }

    let rows = pg_client
        .query(
            &exists_sql(table),
            &[&file_name, &file_date_raw, &source_env],
        )
        .await?;
    Ok(!rows.is_empty())
}

fn cell_param(cell: &Option<String>, ty: ColumnType) -> Box<dyn ToSql + Sync> {
    match ty {
        ColumnType::BigInt => Box::new(cell.as_deref().and_then(|v| v.parse::<i64>().ok())),
        ColumnType::Double => Box::new(cell.as_deref().and_then(|v| v.parse::<f64>().ok())),
        ColumnType::TimestampTz => Box::new(
            cell.as_deref()
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|d| d.with_timezone(&Utc)),
        ),
        ColumnType::Text => Box::new(cell.clone()),
    }
}

/// Load a normalized batch into `table`, creating the destination from the
/// batch's inferred schema if it is absent. `history = true` appends;
/// `history = false` replaces the table contents with this batch.
///
/// One transaction per call; returns once the commit is durable. Failure is
/// terminal for this batch — nothing is retried here, the next scheduled run
/// picks the file up again.
pub async fn load(
    pg_client: &mut PgClient,
    table: &str,
    data: &Table,
    history: bool,
) -> Result<usize, IngestError> {
    let time = std::time::Instant::now();

    pg_client.batch_execute(&create_table_sql(table, data)).await?;

    let query = pg_client.prepare(&insert_sql(table, data)).await?;
    let transaction = pg_client.transaction().await?;

    if !history {
        transaction.execute(&truncate_sql(table), &[]).await?;
    }

    for row in &data.rows {
        let params: Vec<Box<dyn ToSql + Sync>> = row
            .iter()
            .zip(&data.columns)
            .map(|(cell, column)| cell_param(cell, column.ty))
            .collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p.as_ref()).collect();
        transaction.execute(&query, &param_refs).await?;
    }

    transaction.commit().await?;

    debug!(
        "{} rows loaded into {table}. {}",
        data.len(),
        crate::time_elapsed(time)
    );

    Ok(data.len())
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn sample() -> Table {
        Table {
            columns: vec![
                Column {
                    name: "Osid".to_string(),
                    ty: ColumnType::BigInt,
                },
                Column {
                    name: "rep_date".to_string(),
                    ty: ColumnType::TimestampTz,
                },
            ],
            rows: vec![],
        }
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("rs_ratings"), "\"rs_ratings\"");
        assert_eq!(quote_ident("ibd.rs_ratings"), "\"ibd\".\"rs_ratings\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn create_statement_carries_inferred_types() {
        assert_eq!(
            create_table_sql("ibd.rs_ratings", &sample()),
            "CREATE TABLE IF NOT EXISTS \"ibd\".\"rs_ratings\" \
             (\"Osid\" BIGINT, \"rep_date\" TIMESTAMPTZ)"
        );
    }

    #[test]
    fn insert_statement_parameterizes_every_column() {
        assert_eq!(
            insert_sql("rs_ratings", &sample()),
            "INSERT INTO \"rs_ratings\" (\"Osid\", \"rep_date\") VALUES ($1, $2)"
        );
    }

    // the oracle's regclass lookup must see the same case-sensitive name the
    // DDL created, or a mixed-case destination is re-ingested every run
    #[test]
    fn mixed_case_destinations_keep_their_case() {
        assert_eq!(quote_ident("RS_Ratings"), "\"RS_Ratings\"");
        assert_eq!(
            create_table_sql("RS_Ratings", &sample()),
            "CREATE TABLE IF NOT EXISTS \"RS_Ratings\" \
             (\"Osid\" BIGINT, \"rep_date\" TIMESTAMPTZ)"
        );
        assert!(exists_sql("RS_Ratings").contains("FROM \"RS_Ratings\""));
    }

    #[test]
    fn replace_truncates_the_destination() {
        assert_eq!(truncate_sql("rs_ratings"), "TRUNCATE TABLE \"rs_ratings\"");
        assert_eq!(
            truncate_sql("ibd.RS_Ratings"),
            "TRUNCATE TABLE \"ibd\".\"RS_Ratings\""
        );
    }

    #[test]
    fn existence_query_matches_all_three_provenance_fields() {
        let sql = exists_sql("rs_ratings");
        assert!(sql.starts_with("SELECT DISTINCT file_name, file_date, source_env"));
        assert!(sql.contains("file_name = $1"));
        assert!(sql.contains("file_date = $2"));
        assert!(sql.contains("source_env = $3"));
    }
}
