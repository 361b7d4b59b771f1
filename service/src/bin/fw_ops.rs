//! Operator commands that run against the configured database.
#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]
#![allow(clippy::print_stdout)]

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use fellowship_api::{
    config::Config,
    db::setup_database,
    honor::{HonorRepo, PgHonorRepo},
    identity::PgAccountRepo,
    members::{MemberService, PgMemberRepo},
};
use fw_roster::{normalize, parse_calendar_date};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fw-ops", about = "Fellowship roster maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List groups of members that look like the same person
    Duplicates,
    /// Show upcoming birthdays
    Birthdays {
        /// Window in days (defaults to the configured window)
        #[arg(long)]
        within: Option<i64>,
        /// Maximum rows (defaults to the configured limit)
        #[arg(long)]
        limit: Option<usize>,
        /// Reference date, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        reference: Option<NaiveDate>,
    },
    /// Copy account emails onto linked members that have none
    SyncEmails {
        #[arg(long)]
        dry_run: bool,
    },
    /// Report stored birth dates and plan dates that do not parse
    CheckDates,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.level)?)
        .with_writer(std::io::stderr)
        .init();

    let pool = setup_database(&config.database).await?;
    let members = MemberService::new(
        Arc::new(PgMemberRepo::new(pool.clone())),
        Arc::new(PgAccountRepo::new(pool.clone())),
        config.calendar.clone(),
    );

    match cli.command {
        Command::Duplicates => {
            let groups = members.duplicates().await?;
            if groups.is_empty() {
                println!("No duplicates found");
            }
            for (i, group) in groups.iter().enumerate() {
                println!("Group {} ({} records)", i + 1, group.len());
                for m in group.members() {
                    println!(
                        "  {}  {}  {}",
                        m.id,
                        m.full_name,
                        m.birth_date.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Command::Birthdays {
            within,
            limit,
            reference,
        } => {
            let reference = reference.unwrap_or_else(|| Utc::now().date_naive());
            for b in members.upcoming_birthdays(reference, within, limit).await? {
                println!(
                    "{}  in {:>3} days  {}",
                    b.next_occurrence_date, b.days_until_next_occurrence, b.full_name
                );
            }
        }
        Command::SyncEmails { dry_run } => {
            let report = members.sync_emails(dry_run).await?;
            println!(
                "{} {}, {} already set, {} without a linked email, {} failed",
                report.updated,
                if dry_run { "would update" } else { "updated" },
                report.already_set,
                report.unlinked,
                report.failed
            );
        }
        Command::CheckDates => {
            let mut bad = 0usize;
            for m in members.snapshot().await? {
                if let Some(date) = &m.birth_date {
                    if let Err(e) = normalize(date) {
                        bad += 1;
                        println!("member {} ({}): {e}", m.id, m.full_name);
                    }
                }
            }
            for plan in PgHonorRepo::new(pool).list_plans().await? {
                if let Err(e) = parse_calendar_date(&plan.target_date) {
                    bad += 1;
                    println!("honor plan {} ({}): {e}", plan.id, plan.title);
                }
            }
            println!("{bad} invalid date(s)");
        }
    }

    Ok(())
}
