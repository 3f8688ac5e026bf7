use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use radshift::config::Config;
use radshift::coverage::CoverageNarrative;
use radshift::ingest::{AssignmentCandidate, ImportRequest, IngestService, ShiftCandidate};
use radshift::models::{
    AssignmentSource, DateRange, HospitalId, Person, ScheduleVersionId, ScrapeBatchId, Specialty,
    UserId, VersionStatus,
};
use radshift::service::{CoverageService, VersionService};
use radshift::storage::{ScheduleRepository, SharedRepository, SqliteRepository};

#[derive(Parser)]
#[command(
    name = "radshift",
    version,
    about = "Radiology schedule versioning and staff coverage resolution",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overrides configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Acting user id recorded in audit fields
    #[arg(long, global = true)]
    actor: Option<Uuid>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load radiologists from a JSON roster file
    Roster {
        /// Roster file: array of {name, specialty, aliases?, active?}
        file: PathBuf,
    },

    /// Import candidate shifts and assignments from a JSON file
    Ingest {
        /// Payload file: {shifts: [...], assignments: [...]}
        file: PathBuf,

        #[arg(long)]
        hospital: HospitalId,

        /// First day of the imported window (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last day of the imported window (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// Assignment source tag (AMION, MANUAL, OVERRIDE)
        #[arg(long, default_value = "AMION")]
        source: String,
    },

    /// Show the state of a scrape batch
    Batch { id: ScrapeBatchId },

    /// Promote a STAGING version, archiving the current PRODUCTION one
    Promote { version: ScheduleVersionId },

    /// Archive a PRODUCTION version
    Archive { version: ScheduleVersionId },

    /// List versions of a hospital
    Versions {
        #[arg(long)]
        hospital: HospitalId,

        /// Filter by status (STAGING, PRODUCTION, ARCHIVED)
        #[arg(long)]
        status: Option<String>,
    },

    /// Calculate coverage for a version
    Coverage {
        version: ScheduleVersionId,

        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,

        /// Print one line per position
        #[arg(long, default_value = "false")]
        detail: bool,

        /// Store the calculation as a coverage snapshot
        #[arg(long, default_value = "false")]
        save: bool,

        /// Print readiness, insights and recommendations
        #[arg(long, default_value = "false")]
        narrative: bool,
    },

    /// Compare coverage of two versions
    Compare {
        old: ScheduleVersionId,
        new: ScheduleVersionId,
    },
}

#[derive(Deserialize)]
struct RosterEntry {
    name: String,
    specialty: Specialty,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
struct Payload {
    #[serde(default)]
    shifts: Vec<ShiftCandidate>,
    #[serde(default)]
    assignments: Vec<AssignmentCandidate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(db) = &cli.db {
        config.database.sqlite_path = db.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    config.validate()?;

    setup_tracing(&config.logging.format, &config.logging.level, cli.verbose)?;

    if let Err(e) = radshift::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics disabled");
    }

    let actor = cli
        .actor
        .map(UserId::from_uuid)
        .unwrap_or_else(|| UserId::from_uuid(Uuid::nil()));
    let repo: SharedRepository = Arc::new(
        SqliteRepository::new(&config.database.sqlite_path).with_context(|| {
            format!(
                "Failed to open database: {}",
                config.database.sqlite_path.display()
            )
        })?,
    );

    match cli.command {
        Commands::Roster { file } => roster(&repo, &file, actor).await?,

        Commands::Ingest {
            file,
            hospital,
            start,
            end,
            source,
        } => {
            tracing::info!(file = %file.display(), hospital = %hospital, "Starting ingest command");
            let source = AssignmentSource::parse(&source)
                .with_context(|| format!("Unknown assignment source: {source}"))?;
            let payload: Payload = read_json(&file)?;
            let service = IngestService::new(repo, config.ingest.clone());
            let outcome = service
                .ingest(ImportRequest {
                    hospital_id: hospital,
                    window_start: start,
                    window_end: end,
                    shifts: payload.shifts,
                    assignments: payload.assignments,
                    source,
                    actor,
                })
                .await?;

            let batch = outcome.batch();
            println!("Batch {} {}", batch.id, batch.state);
            if let Some(version) = outcome.version() {
                println!("Version {} {}", version.id, version.status);
            }
            println!("{}", outcome.validation().summary());
        }

        Commands::Batch { id } => {
            let batch = repo
                .get_batch(id)
                .await?
                .with_context(|| format!("Batch not found: {id}"))?;
            println!("{}", serde_json::to_string_pretty(&batch)?);
        }

        Commands::Promote { version } => {
            let outcome = VersionService::new(repo).promote(version, actor).await?;
            println!("Promoted {}", outcome.promoted.id);
            for archived in &outcome.archived {
                println!("Archived {}", archived.id);
            }
        }

        Commands::Archive { version } => {
            let archived = VersionService::new(repo).archive(version, actor).await?;
            println!("Archived {}", archived.id);
        }

        Commands::Versions { hospital, status } => {
            let status = status
                .map(|s| {
                    VersionStatus::parse(&s).with_context(|| format!("Unknown status: {s}"))
                })
                .transpose()?;
            for v in VersionService::new(repo).list(hospital, status).await? {
                println!(
                    "{}  {:<10}  {} .. {}  errors={} warnings={}",
                    v.id,
                    v.status,
                    v.effective_start,
                    v.effective_end,
                    v.validation.error_count(),
                    v.validation.warning_count()
                );
            }
        }

        Commands::Coverage {
            version,
            start,
            end,
            detail,
            save,
            narrative,
        } => {
            let range = match (start, end) {
                (Some(s), Some(e)) => Some(DateRange::new(s, e)?),
                (Some(d), None) | (None, Some(d)) => Some(DateRange::day(d)),
                (None, None) => None,
            };
            let service = CoverageService::new(repo, config.reassignment_rules());
            let report = if save {
                let snapshot = service.calculate_and_store(version, range, actor).await?;
                println!("Snapshot {} stored", snapshot.id);
                snapshot.report
            } else {
                service.coverage(version, range).await?
            };

            if detail {
                for line in &report.lines {
                    println!(
                        "{}  {:<4}  {:<7}  {}/{}  {}",
                        line.date,
                        line.shift_type,
                        line.dimension,
                        line.assigned,
                        line.required,
                        line.status
                    );
                }
            }
            println!("{}", report.summary());
            let gaps = service.coverage_gaps(&report);
            if !gaps.is_empty() {
                println!("{}", gaps.summary());
            }
            if narrative {
                println!("\n{}", CoverageNarrative::from_report(&report).to_text());
            }
        }

        Commands::Compare { old, new } => {
            let service = CoverageService::new(repo, config.reassignment_rules());
            let result = service.compare_versions(old, new, None).await?;
            for message in result.messages() {
                println!("[{}] {}", message.severity.as_str(), message.text);
            }
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn roster(repo: &SharedRepository, file: &Path, actor: UserId) -> Result<()> {
    let entries: Vec<RosterEntry> = read_json(file)?;
    let existing = repo.all_persons().await?;

    for entry in entries {
        let person = match existing.iter().find(|p| p.matches_name(&entry.name)) {
            Some(p) => {
                let mut updated = p.clone();
                updated.specialty = entry.specialty;
                updated.active = entry.active;
                updated.aliases = entry.aliases;
                updated.lifecycle.touch(actor);
                updated
            }
            None => Person::new(entry.name, entry.specialty, actor)
                .with_aliases(entry.aliases)
                .with_active(entry.active),
        };
        repo.upsert_person(&person).await?;
        println!("{}  {}  {}", person.id, person.specialty, person.name);
    }
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("radshift=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("radshift={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
