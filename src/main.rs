mod ai;
mod applicant;
mod browser;
mod config;
mod db;
mod error;
mod letter;
mod matcher;
mod models;
mod pipeline;
mod portal;
mod postings;
mod site;
mod store;

use ai::AIProvider;
use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use config::Config;
use letter::CoverLetterWriter;
use models::{JobStatus, LogStatus};
use pipeline::{JobOutcome, Pipeline, RunOptions, RunSummary};
use portal::UbPortal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ubapply")]
#[command(about = "UB job postings - discover, classify, log and apply")]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, discover recent postings and apply to each
    Run {
        /// Fill forms without the final submit. Already the default without
        /// --submit; the flag only makes it explicit
        #[arg(long, conflicts_with = "submit")]
        dry_run: bool,

        /// Really submit applications
        #[arg(long)]
        submit: bool,

        /// Maximum number of postings to process
        #[arg(short, long)]
        limit: Option<usize>,

        /// Run the browser headless
        #[arg(long)]
        headless: bool,

        /// Use the fixed letter body instead of a model
        #[arg(long)]
        no_llm: bool,

        /// Model for letter bodies (gpt-4o, api-sonnet, claude-haiku, ...)
        #[arg(short, long)]
        model: Option<String>,

        /// Classify, log and write letters without applying
        #[arg(long)]
        discover_only: bool,

        /// Recency filter for the search page (day, week, month, any)
        #[arg(long, default_value = "week")]
        posted_within: String,

        /// Job log path (.csv, or .db/.sqlite for SQLite)
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// List logged jobs
    List {
        /// Filter by status (pending, applied, failed, archived, unknown)
        #[arg(short, long)]
        status: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Job log path
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Show one logged job
    Show {
        /// Job ID
        job_id: String,

        /// Job log path
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Score a title and description against the resume categories
    Classify {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Step through the login flow, saving screenshots to the debug directory
    DebugLogin {
        #[arg(long)]
        headless: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "ubapply=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            dry_run,
            submit,
            limit,
            headless,
            no_llm,
            model,
            discover_only,
            posted_within,
            log,
        } => {
            let dry_run = dry_run || !submit;
            let mut config = Config::from_env()?;
            if headless {
                config.headless = true;
            }
            config.ensure_dirs()?;

            let profile = match config::load_profile(&config.profile_path) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    tracing::warn!(error = %format!("{:#}", e), "No usable candidate profile");
                    None
                }
            };
            let missing = config.missing_for_apply(profile.as_ref());
            if !missing.is_empty() && !discover_only {
                println!("WARNING: Missing the following required data. Applications will be SKIPPED.");
                for item in &missing {
                    println!(" - {}", item);
                }
                println!("Running in DISCOVERY MODE only.\n");
            }

            let store = store::open_store(&log.unwrap_or_else(|| config.default_log_path()))?;

            let provider = if no_llm {
                None
            } else {
                let name = model.unwrap_or_else(|| config.model.clone());
                match ai::resolve_model(&name).and_then(|spec| ai::create_provider(&spec)) {
                    Ok(provider) => {
                        tracing::info!(model = provider.model_name(), "Letter bodies from model");
                        Some(provider)
                    }
                    Err(e) => {
                        tracing::warn!(model = %name, error = %format!("{:#}", e), "Model unavailable, using the fixed letter body");
                        None
                    }
                }
            };
            let letters =
                CoverLetterWriter::new(config.docs_dir(), Some(config.cover_template.clone()), provider);

            let profile = profile.unwrap_or_default();
            let resumes = config.resolved_resumes(&profile);
            let options = RunOptions {
                dry_run,
                apply_enabled: !discover_only && missing.is_empty(),
                limit: limit.unwrap_or(config.job_limit),
                posted_within: posted_filter(&posted_within),
            };
            let pipeline = Pipeline {
                store: store.as_ref(),
                letters: &letters,
                profile: &profile,
                resumes: &resumes,
                options,
            };

            let mut portal = UbPortal::open(&config)?;
            let result = pipeline.run(&mut portal, config.credentials.as_ref());
            if let Err(e) = portal.close() {
                tracing::warn!(error = %e, "Browser did not shut down cleanly");
            }
            print_summary(&result?, dry_run);
        }
        Commands::List { status, json, log } => {
            let config = Config::from_env()?;
            let store = store::open_store(&log.unwrap_or_else(|| config.default_log_path()))?;
            let filter = status.as_deref().map(parse_status_filter).transpose()?;
            let entries = store.list(filter)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<10} {:<10} {:<20} {:<32} {:<20}",
                    "JOB ID", "RESUME", "STATUS", "TITLE", "DISCOVERED"
                );
                println!("{}", "-".repeat(96));
                for entry in entries {
                    println!(
                        "{:<10} {:<10} {:<20} {:<32} {:<20}",
                        entry.job_id,
                        entry.resume_type,
                        entry.status.to_string(),
                        truncate(&entry.title, 30),
                        entry.date_discovered
                    );
                }
            }
        }
        Commands::Show { job_id, log } => {
            let config = Config::from_env()?;
            let store = store::open_store(&log.unwrap_or_else(|| config.default_log_path()))?;
            match store.get(&job_id)? {
                Some(entry) => {
                    println!("Job {}", entry.job_id);
                    println!("Title: {}", entry.title);
                    println!("Department: {}", entry.department);
                    println!("Resume: {}", entry.resume_type);
                    println!("Status: {}", entry.status);
                    println!("Discovered: {}", entry.date_discovered);
                    if !entry.submission_date.is_empty() {
                        println!("Submitted: {}", entry.submission_date);
                    }
                    if !entry.confirmation.is_empty() {
                        println!("Confirmation: {}", entry.confirmation);
                    }
                    if !entry.deadline.is_empty() {
                        println!("Deadline: {}", entry.deadline);
                    }
                    if !entry.notes.is_empty() {
                        println!("\n--- Notes ---\n{}", textwrap::fill(&entry.notes, 78));
                    }
                }
                None => {
                    println!("Job {} not found in {}.", job_id, store.location().display());
                }
            }
        }
        Commands::Classify { title, description } => {
            let result = matcher::score(&title, &description);
            println!("{:<10} {:>6}", "CATEGORY", "SCORE");
            println!("{}", "-".repeat(17));
            for (category, points) in &result.scores {
                println!("{:<10} {:>6}", category, points);
            }
            println!("\nResume: {}", result.category);
        }
        Commands::DebugLogin { headless } => {
            let mut config = Config::from_env()?;
            if headless {
                config.headless = true;
            }
            config.ensure_dirs()?;
            let credentials = config
                .credentials
                .clone()
                .ok_or_else(|| anyhow!("UB_USERNAME and UB_PASSWORD must be set"))?;

            let portal = UbPortal::open(&config)?;
            let steps = portal.debug_login(&credentials);
            portal.close()?;

            for (i, step) in steps?.iter().enumerate() {
                let mark = if step.ok { "OK  " } else { "FAIL" };
                println!("{}. [{}] {:<20} {}", i + 1, mark, step.name, step.detail);
            }
            println!("\nDebug files are in {}", config.debug_dir().display());
        }
    }

    Ok(())
}

fn posted_filter(value: &str) -> Option<String> {
    match value.trim().to_lowercase().as_str() {
        "" | "any" | "all" => None,
        other => Some(other.to_string()),
    }
}

fn parse_status_filter(text: &str) -> Result<JobStatus> {
    let status = LogStatus::parse(text).status;
    if status == JobStatus::Unknown && !text.trim().eq_ignore_ascii_case("unknown") {
        bail!("Unknown status '{}' (pending, applied, failed, archived, unknown)", text);
    }
    Ok(status)
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    if summary.reports.is_empty() {
        println!("\nNo postings found.");
    } else {
        println!(
            "\n{:<10} {:<10} {:<4} {:<32} {:<30}",
            "JOB ID", "RESUME", "NEW", "TITLE", "OUTCOME"
        );
        println!("{}", "-".repeat(90));
        for report in &summary.reports {
            let outcome = match &report.outcome {
                JobOutcome::Error(msg) => format!("Error: {}", truncate(msg, 23)),
                other => other.to_string(),
            };
            println!(
                "{:<10} {:<10} {:<4} {:<32} {:<30}",
                report.job_id,
                report.category,
                if report.newly_logged { "yes" } else { "" },
                truncate(&report.title, 30),
                outcome
            );
        }
    }

    println!("\nResults:");
    println!("  Postings:     {}", summary.reports.len());
    println!("  Newly logged: {}", summary.newly_logged());
    println!("  Applied:      {}", summary.count_status(JobStatus::Applied));
    println!("  Failed:       {}", summary.count_status(JobStatus::Failed));
    println!("  Archived:     {}", summary.count_status(JobStatus::Archived));
    println!("  Skipped:      {}", summary.skipped());
    if summary.errors() > 0 {
        println!("  Errors:       {}", summary.errors());
    }
    if dry_run {
        println!("\n(Dry run - no applications were submitted)");
    }
    println!("\nJob log: {}", summary.log_path.display());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
