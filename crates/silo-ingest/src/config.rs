use anyhow::Context;
use dotenv::var;
use serde::Deserialize;
use std::str::FromStr;

/// Source environment a batch run targets.
///
/// Feeds land under a per-environment prefix in the bucket, and each
/// Screener environment has its own base URL and entitlement key. The tag is
/// also written to every ingested row as provenance.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceEnv {
    Dev,
    Stg,
    Prd,
}

impl SourceEnv {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "DEV",
            Self::Stg => "STG",
            Self::Prd => "PRD",
        }
    }
}

impl std::fmt::Display for SourceEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceEnv {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEV" => Ok(Self::Dev),
            "STG" => Ok(Self::Stg),
            "PRD" | "PROD" => Ok(Self::Prd),
            other => anyhow::bail!("unknown source environment: {other}"),
        }
    }
}

/// Screener API endpoint for one environment.
#[derive(Clone, Debug)]
pub struct ScreenerEndpoint {
    pub base_url: String,
    pub ckey: String,
}

/// Process-wide configuration, gathered from the environment once at startup
/// and passed by parameter from there on.
#[derive(Clone, Debug)]
pub struct Settings {
    pub warehouse_url: String,
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    prefixes: [String; 3],
    screener: [ScreenerEndpoint; 3],
    pub feed_config: String,
    pub screen_config: String,
}

impl Settings {
    /// Read every setting from the environment (`.env` supported via
    /// [`dotenv`]). Missing required variables fail here, before any
    /// collaborator is touched.
    pub fn from_env() -> anyhow::Result<Self> {
        let env_var = |key: &str| var(key).with_context(|| format!("environment variable {key}"));

        Ok(Self {
            warehouse_url: env_var("WAREHOUSE_URL")?,
            bucket: env_var("S3_BUCKET_NAME")?,
            region: var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint: var("S3_ENDPOINT").ok(),
            access_key: env_var("S3_ACCESS_KEY")?,
            secret_key: env_var("S3_SECRET_KEY")?,
            prefixes: [
                env_var("S3_DEFAULT_PATH_DEV")?,
                env_var("S3_DEFAULT_PATH_STG")?,
                env_var("S3_DEFAULT_PATH_PRD")?,
            ],
            screener: [
                ScreenerEndpoint {
                    base_url: env_var("SCREENER_URL_BASE_DEV")?,
                    ckey: env_var("SCREENER_CKEY_DEV")?,
                },
                ScreenerEndpoint {
                    base_url: env_var("SCREENER_URL_BASE_STG")?,
                    ckey: env_var("SCREENER_CKEY_STG")?,
                },
                ScreenerEndpoint {
                    base_url: env_var("SCREENER_URL_BASE_PRD")?,
                    ckey: env_var("SCREENER_CKEY_PRD")?,
                },
            ],
            feed_config: var("FEED_CONFIG").unwrap_or_else(|_| "config/feeds.csv".to_string()),
            screen_config: var("SCREEN_CONFIG").unwrap_or_else(|_| "config/screens.csv".to_string()),
        })
    }

    /// Bucket prefix holding the environment's feed files.
    pub fn prefix(&self, env: SourceEnv) -> &str {
        &self.prefixes[env as usize]
    }

    /// Screener endpoint for the environment.
    pub fn screener(&self, env: SourceEnv) -> &ScreenerEndpoint {
        &self.screener[env as usize]
    }
}

/// One row of the feed activation table: which logical file name maps to
/// which destination table. Inactive rows are skipped by the batch.
#[derive(Clone, Debug, Deserialize)]
pub struct FeedConfig {
    pub file_name: String,
    pub table: String,
    pub active: u8,
    pub history: u8,
}

impl FeedConfig {
    pub fn is_active(&self) -> bool {
        self.active == 1
    }

    /// `true` appends snapshots, `false` replaces the table contents.
    pub fn keep_history(&self) -> bool {
        self.history == 1
    }
}

/// One row of the screen activation table.
#[derive(Clone, Debug, Deserialize)]
pub struct ScreenConfig {
    pub screen_name: String,
    pub environment: SourceEnv,
    pub table: String,
    pub active: u8,
    pub history: u8,
}

impl ScreenConfig {
    pub fn is_active(&self) -> bool {
        self.active == 1
    }

    pub fn keep_history(&self) -> bool {
        self.history == 1
    }
}

/// Read the feed activation table from a CSV file.
pub fn load_feed_config(path: &str) -> anyhow::Result<Vec<FeedConfig>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("open {path}"))?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<FeedConfig>, _>>()
        .with_context(|| format!("parse {path}"))?;
    Ok(rows)
}

/// Read the screen activation table from a CSV file.
pub fn load_screen_config(path: &str) -> anyhow::Result<Vec<ScreenConfig>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("open {path}"))?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<ScreenConfig>, _>>()
        .with_context(|| format!("parse {path}"))?;
    Ok(rows)
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_round_trip() {
        assert_eq!("STG".parse::<SourceEnv>().unwrap(), SourceEnv::Stg);
        assert_eq!("prod".parse::<SourceEnv>().unwrap(), SourceEnv::Prd);
        assert_eq!(SourceEnv::Dev.to_string(), "DEV");
        assert!("UAT".parse::<SourceEnv>().is_err());
    }

    #[test]
    fn settings_built_from_environment() {
        for (key, value) in [
            ("WAREHOUSE_URL", "postgres://localhost:5432/silo"),
            ("S3_BUCKET_NAME", "feeds"),
            ("S3_ACCESS_KEY", "ak"),
            ("S3_SECRET_KEY", "sk"),
            ("S3_DEFAULT_PATH_DEV", "dev/feeds"),
            ("S3_DEFAULT_PATH_STG", "stg/feeds"),
            ("S3_DEFAULT_PATH_PRD", "prd/feeds"),
            ("SCREENER_URL_BASE_DEV", "https://dev.example.com/api?"),
            ("SCREENER_CKEY_DEV", "dev-key"),
            ("SCREENER_URL_BASE_STG", "https://stg.example.com/api?"),
            ("SCREENER_CKEY_STG", "stg-key"),
            ("SCREENER_URL_BASE_PRD", "https://prd.example.com/api?"),
            ("SCREENER_CKEY_PRD", "prd-key"),
        ] {
            std::env::set_var(key, value);
        }

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.warehouse_url, "postgres://localhost:5432/silo");
        assert_eq!(settings.prefix(SourceEnv::Stg), "stg/feeds");
        assert_eq!(settings.screener(SourceEnv::Prd).ckey, "prd-key");
    }

    #[test]
    fn feed_config_from_csv() {
        let csv = "file_name,table,active,history\n\
                   wonW_WONDB_HSFINST3MRSRATING,rs_ratings,1,1\n\
                   wonW_WONDB_EPSRANK,eps_ranks,0,1\n";
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let rows: Vec<FeedConfig> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_active());
        assert!(!rows[1].is_active());
        assert_eq!(rows[0].table, "rs_ratings");
    }

    #[test]
    fn screen_config_from_csv() {
        let csv = "screen_name,environment,table,active,history\n\
                   DataStrategy.IndustryCode,PRD,industry_codes,1,0\n";
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let rows: Vec<ScreenConfig> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows[0].environment, SourceEnv::Prd);
        assert!(!rows[0].keep_history());
    }
}
