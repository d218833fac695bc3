use thiserror::Error;

/// Failure kinds for a single ingestion stage.
///
/// Every stage returns its own kind; the batch driver records the failure
/// against the candidate and moves on, so one bad file never aborts the run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// HTTP transport failure (Screener calls). Missing/invalid credentials
    /// also surface here, as a 4xx from the upstream.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Object storage failure (listing or download).
    #[error("object store error: {0}")]
    Store(#[from] object_store::Error),

    /// Neither the primary nor the fallback encoding produced clean text.
    #[error("failed to decode {key} with {primary} or {fallback}")]
    Decode {
        key: String,
        primary: &'static str,
        fallback: &'static str,
    },

    /// An expected key/column/shape was absent from the payload.
    #[error("schema error: {0}")]
    Schema(String),

    /// Warehouse query or load failure.
    #[error("warehouse error: {0}")]
    Warehouse(#[from] tokio_postgres::Error),
}
