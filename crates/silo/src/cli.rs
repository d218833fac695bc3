use clap::{Parser, Subcommand, ValueEnum};
use silo_ingest::config::SourceEnv;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets the level of tracing.
    #[arg(short, long, global = true)]
    pub trace: Option<TraceLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest new feed files from the bucket into the warehouse.
    Feeds {
        /// Source environment to ingest from.
        #[arg(short, long)]
        env: EnvArg,
    },

    /// Load every active screen from the Screener API into the warehouse.
    Screens,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
#[clap(rename_all = "UPPERCASE")]
pub enum TraceLevel {
    DEBUG,
    ERROR,
    INFO,
    TRACE,
    WARN,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
#[clap(rename_all = "UPPERCASE")]
pub enum EnvArg {
    DEV,
    STG,
    PRD,
}

impl From<EnvArg> for SourceEnv {
    fn from(arg: EnvArg) -> Self {
        match arg {
            EnvArg::DEV => Self::Dev,
            EnvArg::STG => Self::Stg,
            EnvArg::PRD => Self::Prd,
        }
    }
}
