pub mod config;
pub mod error;
pub mod feed;
pub mod screener;
pub mod summary;
pub mod table;
pub mod warehouse;

/// Shortcut for required API elements.
pub(crate) mod http {
    pub(crate) use reqwest::Client as HttpClient;
    pub(crate) use tokio_postgres::Client as PgClient;
}

/// Standard timing suffix for debug logs.
pub fn time_elapsed(time: std::time::Instant) -> String {
    format!("time elapsed: {:.2?}", time.elapsed())
}
