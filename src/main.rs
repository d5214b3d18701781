use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};
use uuid::Uuid;

mod analysis;
mod catalog;
mod config;
mod crosstab;
mod db;
mod distribution;
mod error;
mod lifecycle;
mod models;
mod normalize;
mod orchestrator;
mod report;
mod stats;
mod store;
mod summary;

use catalog::SurveyCatalog;
use config::Config;
use db::PgStore;
use models::{AnalysisRequest, ClosureRequest, TriggerType};
use orchestrator::ClosureOrchestrator;
use store::LectureStore;

#[derive(Parser)]
#[command(name = "lecture-survey-closure")]
#[command(about = "Closes expired lecture surveys and computes their feedback statistics", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import raw responses for a lecture from a CSV file
    ImportResponses {
        #[arg(long)]
        lecture: Uuid,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Run one closure and analysis cycle
    RunCycle,
    /// Run cycles forever on a fixed interval
    Schedule {
        #[arg(long, default_value_t = 300)]
        interval_secs: u64,
    },
    /// Close one lecture's survey manually
    Close {
        #[arg(long)]
        lecture: Uuid,
        #[arg(long)]
        analyze: bool,
        #[arg(long)]
        user: Option<String>,
    },
    /// Analyze one closed lecture now
    Analyze {
        #[arg(long)]
        lecture: Uuid,
        #[arg(long)]
        user: Option<String>,
    },
    /// Write a markdown report of the result set that analyzed a lecture
    Report {
        #[arg(long)]
        lecture: Uuid,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.config)?;

    let pool = PgPoolOptions::new()
        .max_connections(cli.config.max_connections)
        .connect(&cli.config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let orchestrator = ClosureOrchestrator::new(
        store.clone(),
        SurveyCatalog::default(),
        cli.config.lease_owner(),
        cli.config.lease_ttl(),
    );

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportResponses { lecture, csv } => {
            let inserted = db::import_csv(&pool, lecture, &csv).await?;
            println!("Inserted {inserted} responses from {}.", csv.display());
        }
        Commands::RunCycle => {
            let report = orchestrator.run_scheduled_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Schedule { interval_secs } => {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(interval_secs, "scheduler started");
            loop {
                ticker.tick().await;
                match orchestrator.run_scheduled_cycle().await {
                    Ok(report) => {
                        if let Some(err) = report.error {
                            error!(error = %err, "cycle reported a failure");
                        }
                    }
                    Err(err) => {
                        error!(error = %err, "cycle stopped on a contract violation");
                        return Err(err.into());
                    }
                }
            }
        }
        Commands::Close { lecture, analyze, user } => {
            let outcome = orchestrator
                .run_single_lecture_closure(ClosureRequest {
                    lecture_id: lecture,
                    trigger_analysis: analyze,
                    user_id: user,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Analyze { lecture, user } => {
            let outcome = orchestrator
                .run_analysis(AnalysisRequest {
                    lecture_id: lecture,
                    triggered_by: user,
                    trigger_type: TriggerType::Manual,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Report { lecture, out } => {
            let found = store
                .get(lecture)
                .await?
                .with_context(|| format!("lecture {lecture} not found"))?;
            let current = analysis::current_result(store.as_ref(), &found).await?;
            let report = match &current {
                Some((result_set, facts)) => report::build_report(&found, Some(result_set), facts),
                None => report::build_report(&found, None, &[]),
            };
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.rust_log)
        .with_context(|| format!("invalid log filter '{}'", config.rust_log))?;

    let layer = if config.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_span_list(false)
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_filter(filter).boxed()
    };

    tracing_subscriber::registry().with(layer).init();
    Ok(())
}
