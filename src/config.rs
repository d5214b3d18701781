use clap::Args;
use uuid::Uuid;

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Maximum pooled connections
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value = "5")]
    pub max_connections: u32,

    /// Log filter, e.g. "info" or "lecture_survey_closure=debug"
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub rust_log: String,

    /// Use JSON formatting for tracing
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Seconds after which an unreleased run lease may be taken over
    #[arg(long, env = "RUN_LEASE_TTL_SECS", default_value = "900")]
    pub lease_ttl_secs: i64,

    /// Identity recorded on the run lease; random per process when unset
    #[arg(long, env = "RUN_LEASE_OWNER")]
    pub lease_owner: Option<String>,
}

impl Config {
    pub fn lease_owner(&self) -> String {
        self.lease_owner
            .clone()
            .unwrap_or_else(|| format!("closure-{}", Uuid::new_v4()))
    }

    pub fn lease_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lease_ttl_secs.max(1))
    }
}
