use silo_ingest::config::{Settings, SourceEnv};
use tokio_postgres::{self as pg, NoTls};
use tracing::{debug, error, info, trace};

/// Open the warehouse connection and hold it on a background task.
async fn connect_warehouse(settings: &Settings) -> anyhow::Result<pg::Client> {
    trace!("connecting to the warehouse ...");
    let (pg_client, pg_conn) = pg::connect(&settings.warehouse_url, NoTls)
        .await
        .map_err(|err| {
            error!("warehouse connection error: {}", err);
            err
        })?;

    tokio::spawn(async move {
        if let Err(err) = pg_conn.await {
            error!("warehouse connection error: {}", err);
        }
    });
    debug!("warehouse connection established");

    Ok(pg_client)
}

/// Run one feed ingestion batch for the environment.
pub(crate) async fn feeds(env: SourceEnv) -> anyhow::Result<()> {
    let time = std::time::Instant::now();

    let settings = Settings::from_env()?;
    let mut pg_client = connect_warehouse(&settings).await?;
    let store = silo_ingest::feed::build_store(&settings)?;

    let summary = silo_ingest::feed::ingest(&mut pg_client, store.as_ref(), &settings, env).await?;

    info!(
        "feeds ({env}): {summary}, time elapsed: {:?}",
        time.elapsed()
    );
    Ok(())
}

/// Load every active screen into the warehouse.
pub(crate) async fn screens() -> anyhow::Result<()> {
    let time = std::time::Instant::now();

    let settings = Settings::from_env()?;
    let mut pg_client = connect_warehouse(&settings).await?;

    let summary = silo_ingest::screener::load_screens(&mut pg_client, &settings).await?;

    info!("screens: {summary}, time elapsed: {:?}", time.elapsed());
    Ok(())
}
