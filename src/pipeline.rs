use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Credentials;
use crate::error::{GenerationError, LoginError};
use crate::matcher;
use crate::models::{
    ApplyOutcome, CandidateProfile, JobLogEntry, JobPosting, JobStatus, LogStatus, ResumeCategory,
    ResumeFiles,
};
use crate::store::JobStore;

pub trait Authenticator {
    /// Establishes a logged-in session, reusing one that already exists.
    fn login(&mut self, credentials: &Credentials) -> Result<(), LoginError>;
}

pub trait Discovery {
    /// Postings from the search page, at most `limit`. `posted_within` is the
    /// site's recency filter value ("week"); applying it is best-effort.
    fn discover(&mut self, posted_within: Option<&str>, limit: usize) -> Result<Vec<JobPosting>>;
}

pub trait Applicant {
    /// Runs the application form for one posting. In dry-run mode everything
    /// but the final submit happens.
    fn apply(
        &mut self,
        job: &JobPosting,
        resume: &Path,
        letter: &Path,
        profile: &CandidateProfile,
        dry_run: bool,
    ) -> Result<ApplyOutcome>;
}

pub trait LetterGenerator {
    fn generate(
        &self,
        job: &JobPosting,
        category: ResumeCategory,
        profile: &CandidateProfile,
    ) -> Result<PathBuf, GenerationError>;
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dry_run: bool,
    pub apply_enabled: bool,
    pub limit: usize,
    pub posted_within: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            apply_enabled: true,
            limit: crate::config::DEFAULT_JOB_LIMIT,
            posted_within: Some("week".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DiscoveryOnly,
    MissingResume,
    AlreadyApplied,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DiscoveryOnly => "discovery only",
            Self::MissingResume => "missing resume",
            Self::AlreadyApplied => "already applied",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Attempted(LogStatus),
    Skipped(SkipReason),
    Error(String),
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attempted(status) => write!(f, "{}", status),
            Self::Skipped(reason) => write!(f, "Skipped ({})", reason),
            Self::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: String,
    pub title: String,
    pub category: ResumeCategory,
    pub newly_logged: bool,
    pub letter: Option<PathBuf>,
    pub outcome: JobOutcome,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reports: Vec<JobReport>,
    pub log_path: PathBuf,
}

impl RunSummary {
    pub fn newly_logged(&self) -> usize {
        self.reports.iter().filter(|r| r.newly_logged).count()
    }

    pub fn count_status(&self, status: JobStatus) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(&r.outcome, JobOutcome::Attempted(s) if s.status == status))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, JobOutcome::Skipped(_)))
            .count()
    }

    pub fn errors(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, JobOutcome::Error(_)))
            .count()
    }
}

/// Drives one batch: log in, discover, then classify, log, write a letter
/// and apply for each posting in turn.
///
/// Only login and discovery failures end the run. Anything that goes wrong
/// for a single posting ends up in that posting's report.
pub struct Pipeline<'a, G: LetterGenerator> {
    pub store: &'a dyn JobStore,
    pub letters: &'a G,
    pub profile: &'a CandidateProfile,
    pub resumes: &'a ResumeFiles,
    pub options: RunOptions,
}

impl<'a, G: LetterGenerator> Pipeline<'a, G> {
    pub fn run<S>(&self, session: &mut S, credentials: Option<&Credentials>) -> Result<RunSummary>
    where
        S: Authenticator + Discovery + Applicant,
    {
        match credentials {
            Some(credentials) => {
                tracing::info!("Logging in");
                session.login(credentials).context("Login failed")?;
            }
            None => tracing::warn!("No credentials configured, browsing postings without logging in"),
        }

        tracing::info!(limit = self.options.limit, "Discovering postings");
        let jobs = session
            .discover(self.options.posted_within.as_deref(), self.options.limit)
            .context("Job discovery failed")?;
        tracing::info!(count = jobs.len(), "Discovered postings");

        let reports = jobs.iter().map(|job| self.process(session, job)).collect();
        Ok(RunSummary {
            reports,
            log_path: self.store.location().to_path_buf(),
        })
    }

    fn process<S: Applicant>(&self, session: &mut S, job: &JobPosting) -> JobReport {
        let category = matcher::classify(&job.title, &job.description);
        tracing::info!(job_id = %job.job_id, title = %job.title, %category, "Processing posting");

        let mut report = JobReport {
            job_id: job.job_id.clone(),
            title: job.title.clone(),
            category,
            newly_logged: false,
            letter: None,
            outcome: JobOutcome::Skipped(SkipReason::DiscoveryOnly),
        };
        report.outcome = match self.advance(session, job, category, &mut report) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(job_id = %job.job_id, error = %format!("{:#}", e), "Posting failed");
                JobOutcome::Error(format!("{:#}", e))
            }
        };
        report
    }

    fn advance<S: Applicant>(
        &self,
        session: &mut S,
        job: &JobPosting,
        category: ResumeCategory,
        report: &mut JobReport,
    ) -> Result<JobOutcome> {
        report.newly_logged = self
            .store
            .record_if_new(&JobLogEntry::discovered(job, category))?;
        if report.newly_logged {
            tracing::info!(job_id = %job.job_id, "New posting logged");
        } else {
            tracing::info!(job_id = %job.job_id, "Posting already logged");
            if self.options.apply_enabled && self.already_applied(&job.job_id)? {
                return Ok(JobOutcome::Skipped(SkipReason::AlreadyApplied));
            }
        }

        let letter = match self.letters.generate(job, category, self.profile) {
            Ok(path) => path,
            Err(e) => {
                self.store
                    .add_note(&job.job_id, &format!("Cover letter failed: {}", e))?;
                return Err(anyhow::Error::new(e).context("Cover letter generation failed"));
            }
        };
        tracing::info!(job_id = %job.job_id, path = %letter.display(), "Cover letter written");
        report.letter = Some(letter.clone());

        if !self.options.apply_enabled {
            return Ok(JobOutcome::Skipped(SkipReason::DiscoveryOnly));
        }

        let Some(resume) = self.resumes.get(category).filter(|p| p.exists()) else {
            tracing::warn!(job_id = %job.job_id, %category, "No resume file for category, not applying");
            return Ok(JobOutcome::Skipped(SkipReason::MissingResume));
        };

        tracing::info!(job_id = %job.job_id, dry_run = self.options.dry_run, "Applying");
        let outcome = match session.apply(job, resume, &letter, self.profile, self.options.dry_run) {
            Ok(outcome) => outcome,
            Err(e) => {
                let status = LogStatus::new(JobStatus::Failed, self.options.dry_run);
                self.store
                    .set_status(&job.job_id, status, Some(&format!("{:#}", e)))?;
                return Err(e.context("Application failed"));
            }
        };

        let status = outcome.to_status(self.options.dry_run);
        let note = match &outcome {
            ApplyOutcome::Other(label) => Some(format!("Unrecognized apply outcome: {}", label)),
            _ => None,
        };
        self.store.set_status(&job.job_id, status, note.as_deref())?;
        tracing::info!(job_id = %job.job_id, %status, "Log updated");
        Ok(JobOutcome::Attempted(status))
    }

    /// A real (not simulated) submission is already on record.
    fn already_applied(&self, job_id: &str) -> Result<bool> {
        Ok(self
            .store
            .get(job_id)?
            .is_some_and(|e| e.status.is_submitted() && !e.status.dry_run))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CsvJobLog;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;

    fn posting(id: &str, title: &str, description: &str) -> JobPosting {
        JobPosting {
            job_id: id.to_string(),
            title: title.to_string(),
            department: "Unknown".to_string(),
            description: description.to_string(),
            link: format!("https://www.ubjobs.buffalo.edu/postings/{}", id),
        }
    }

    fn three_postings() -> Vec<JobPosting> {
        vec![
            posting("101", "Data Analyst", "SQL, Python and Tableau dashboards"),
            posting("102", "Research Scientist", "Laboratory research and grant writing"),
            posting("103", "Project Coordinator", "Project management and stakeholder communication"),
        ]
    }

    struct FakeSession {
        jobs: Vec<JobPosting>,
        outcomes: HashMap<String, ApplyOutcome>,
        login_ok: bool,
        logins: usize,
        applied: Vec<String>,
    }

    impl FakeSession {
        fn new(jobs: Vec<JobPosting>) -> Self {
            Self {
                jobs,
                outcomes: HashMap::new(),
                login_ok: true,
                logins: 0,
                applied: Vec::new(),
            }
        }
    }

    impl Authenticator for FakeSession {
        fn login(&mut self, _credentials: &Credentials) -> Result<(), LoginError> {
            self.logins += 1;
            if self.login_ok {
                Ok(())
            } else {
                Err(LoginError::Unverified { snapshot: None })
            }
        }
    }

    impl Discovery for FakeSession {
        fn discover(&mut self, _posted_within: Option<&str>, limit: usize) -> Result<Vec<JobPosting>> {
            Ok(self.jobs.iter().take(limit).cloned().collect())
        }
    }

    impl Applicant for FakeSession {
        fn apply(
            &mut self,
            job: &JobPosting,
            resume: &Path,
            letter: &Path,
            _profile: &CandidateProfile,
            _dry_run: bool,
        ) -> Result<ApplyOutcome> {
            assert!(resume.exists());
            assert!(letter.exists());
            self.applied.push(job.job_id.clone());
            match self.outcomes.get(&job.job_id) {
                Some(outcome) => Ok(outcome.clone()),
                None => anyhow::bail!("page timed out"),
            }
        }
    }

    struct FakeLetters {
        dir: PathBuf,
        fail_for: Option<String>,
        written: RefCell<usize>,
    }

    impl LetterGenerator for FakeLetters {
        fn generate(
            &self,
            job: &JobPosting,
            _category: ResumeCategory,
            _profile: &CandidateProfile,
        ) -> Result<PathBuf, GenerationError> {
            if self.fail_for.as_deref() == Some(job.job_id.as_str()) {
                return Err(GenerationError::Template("broken template".to_string()));
            }
            *self.written.borrow_mut() += 1;
            let path = self.dir.join(format!("Cover_Letter_{}.docx", job.job_id));
            fs::write(&path, b"docx")?;
            Ok(path)
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        store: CsvJobLog,
        letters: FakeLetters,
        resumes: ResumeFiles,
        profile: CandidateProfile,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = CsvJobLog::open(&dir.path().join("jobs_log.csv")).unwrap();
            let letters = FakeLetters {
                dir: dir.path().to_path_buf(),
                fail_for: None,
                written: RefCell::new(0),
            };
            let mut resumes = ResumeFiles::default();
            for (name, slot) in [
                ("data.pdf", &mut resumes.data),
                ("research.pdf", &mut resumes.research),
                ("associate.pdf", &mut resumes.associate),
            ] {
                let path = dir.path().join(name);
                fs::write(&path, b"%PDF").unwrap();
                *slot = Some(path);
            }
            Self {
                dir,
                store,
                letters,
                resumes,
                profile: CandidateProfile::default(),
            }
        }

        fn pipeline(&self, options: RunOptions) -> Pipeline<'_, FakeLetters> {
            Pipeline {
                store: &self.store,
                letters: &self.letters,
                profile: &self.profile,
                resumes: &self.resumes,
                options,
            }
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "user".to_string(),
            password: "pass".to_string(),
        }
    }

    fn discovery_only() -> RunOptions {
        RunOptions {
            apply_enabled: false,
            ..RunOptions::default()
        }
    }

    fn status_of(store: &dyn JobStore, id: &str) -> LogStatus {
        store.get(id).unwrap().unwrap().status
    }

    #[test]
    fn test_first_discovery_logs_pending_rows() {
        let fx = Fixture::new();
        let mut session = FakeSession::new(three_postings());

        let summary = fx
            .pipeline(discovery_only())
            .run(&mut session, Some(&credentials()))
            .unwrap();

        assert_eq!(session.logins, 1);
        assert_eq!(summary.newly_logged(), 3);
        let rows = fx.store.list(None).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.status == LogStatus::PENDING));
        assert_eq!(rows[0].resume_type, ResumeCategory::Data);
        assert_eq!(rows[1].resume_type, ResumeCategory::Research);
        assert_eq!(rows[2].resume_type, ResumeCategory::Associate);
        assert!(summary
            .reports
            .iter()
            .all(|r| r.outcome == JobOutcome::Skipped(SkipReason::DiscoveryOnly)));
        assert!(session.applied.is_empty());
    }

    #[test]
    fn test_rediscovery_adds_no_rows() {
        let fx = Fixture::new();
        let mut session = FakeSession::new(three_postings());
        fx.pipeline(discovery_only())
            .run(&mut session, Some(&credentials()))
            .unwrap();

        let summary = fx
            .pipeline(discovery_only())
            .run(&mut session, Some(&credentials()))
            .unwrap();

        assert_eq!(summary.newly_logged(), 0);
        assert_eq!(fx.store.list(None).unwrap().len(), 3);
    }

    #[test]
    fn test_apply_outcomes_map_to_statuses() {
        let fx = Fixture::new();
        let mut session = FakeSession::new(three_postings());
        session.outcomes.insert("101".to_string(), ApplyOutcome::Applied);
        session.outcomes.insert("102".to_string(), ApplyOutcome::Failed);
        session
            .outcomes
            .insert("103".to_string(), ApplyOutcome::Other("captcha".to_string()));

        let options = RunOptions {
            dry_run: false,
            ..RunOptions::default()
        };
        let summary = fx
            .pipeline(options)
            .run(&mut session, Some(&credentials()))
            .unwrap();

        let applied = fx.store.get("101").unwrap().unwrap();
        assert_eq!(applied.status.to_string(), "Applied");
        assert!(!applied.submission_date.is_empty());

        let failed = fx.store.get("102").unwrap().unwrap();
        assert_eq!(failed.status.to_string(), "Failed");
        assert!(failed.submission_date.is_empty());

        let unknown = fx.store.get("103").unwrap().unwrap();
        assert_eq!(unknown.status.to_string(), "Unknown");
        assert!(unknown.notes.contains("captcha"));

        assert_eq!(summary.count_status(JobStatus::Applied), 1);
        assert_eq!(summary.count_status(JobStatus::Failed), 1);
        assert_eq!(summary.count_status(JobStatus::Unknown), 1);
    }

    #[test]
    fn test_dry_run_marks_statuses() {
        let fx = Fixture::new();
        let mut session = FakeSession::new(three_postings());
        session.outcomes.insert("101".to_string(), ApplyOutcome::Applied);
        session.outcomes.insert("102".to_string(), ApplyOutcome::Archived);
        session.outcomes.insert("103".to_string(), ApplyOutcome::Failed);

        fx.pipeline(RunOptions::default())
            .run(&mut session, Some(&credentials()))
            .unwrap();

        let applied = fx.store.get("101").unwrap().unwrap();
        assert_eq!(applied.status.to_string(), "Applied (Dry Run)");
        assert!(!applied.submission_date.is_empty());
        assert_eq!(status_of(&fx.store, "102").to_string(), "Archived (Dry Run)");
        assert_eq!(status_of(&fx.store, "103").to_string(), "Failed (Dry Run)");
    }

    #[test]
    fn test_missing_resume_skips_only_that_job() {
        let mut fx = Fixture::new();
        fx.resumes.research = Some(fx.dir.path().join("gone.pdf"));
        let mut session = FakeSession::new(three_postings());
        session.outcomes.insert("101".to_string(), ApplyOutcome::Applied);
        session.outcomes.insert("103".to_string(), ApplyOutcome::Applied);

        let summary = fx
            .pipeline(RunOptions::default())
            .run(&mut session, Some(&credentials()))
            .unwrap();

        assert_eq!(
            summary.reports[1].outcome,
            JobOutcome::Skipped(SkipReason::MissingResume)
        );
        assert_eq!(status_of(&fx.store, "102"), LogStatus::PENDING);
        assert_eq!(session.applied, vec!["101", "103"]);
        assert_eq!(status_of(&fx.store, "103").status, JobStatus::Applied);
    }

    #[test]
    fn test_letter_failure_is_local_to_job() {
        let mut fx = Fixture::new();
        fx.letters.fail_for = Some("101".to_string());
        let mut session = FakeSession::new(three_postings());
        session.outcomes.insert("102".to_string(), ApplyOutcome::Applied);
        session.outcomes.insert("103".to_string(), ApplyOutcome::Applied);

        let summary = fx
            .pipeline(RunOptions::default())
            .run(&mut session, Some(&credentials()))
            .unwrap();

        assert!(matches!(summary.reports[0].outcome, JobOutcome::Error(_)));
        assert!(summary.reports[0].letter.is_none());
        let row = fx.store.get("101").unwrap().unwrap();
        assert_eq!(row.status, LogStatus::PENDING);
        assert!(row.notes.contains("Cover letter failed"));

        assert_eq!(session.applied, vec!["102", "103"]);
        assert_eq!(summary.errors(), 1);
    }

    #[test]
    fn test_apply_error_records_failure_and_continues() {
        let fx = Fixture::new();
        let mut session = FakeSession::new(three_postings());
        // no outcome for 101: the fake errors out
        session.outcomes.insert("102".to_string(), ApplyOutcome::Applied);
        session.outcomes.insert("103".to_string(), ApplyOutcome::Applied);

        let summary = fx
            .pipeline(RunOptions::default())
            .run(&mut session, Some(&credentials()))
            .unwrap();

        assert!(matches!(summary.reports[0].outcome, JobOutcome::Error(_)));
        let row = fx.store.get("101").unwrap().unwrap();
        assert_eq!(row.status.to_string(), "Failed (Dry Run)");
        assert!(row.notes.contains("page timed out"));
        assert_eq!(summary.count_status(JobStatus::Applied), 2);
    }

    #[test]
    fn test_real_submission_is_not_repeated() {
        let fx = Fixture::new();
        let mut session = FakeSession::new(three_postings());
        for id in ["101", "102", "103"] {
            session.outcomes.insert(id.to_string(), ApplyOutcome::Applied);
        }
        let submit = RunOptions {
            dry_run: false,
            ..RunOptions::default()
        };
        fx.pipeline(submit.clone())
            .run(&mut session, Some(&credentials()))
            .unwrap();
        assert_eq!(session.applied.len(), 3);

        let summary = fx
            .pipeline(submit)
            .run(&mut session, Some(&credentials()))
            .unwrap();
        assert_eq!(session.applied.len(), 3);
        assert!(summary
            .reports
            .iter()
            .all(|r| r.outcome == JobOutcome::Skipped(SkipReason::AlreadyApplied)));
    }

    #[test]
    fn test_dry_run_rows_are_retried() {
        let fx = Fixture::new();
        let mut session = FakeSession::new(three_postings());
        session.outcomes.insert("101".to_string(), ApplyOutcome::Applied);
        fx.pipeline(RunOptions::default())
            .run(&mut session, Some(&credentials()))
            .unwrap();
        fx.pipeline(RunOptions::default())
            .run(&mut session, Some(&credentials()))
            .unwrap();
        assert_eq!(session.applied.iter().filter(|id| *id == "101").count(), 2);
    }

    #[test]
    fn test_login_failure_aborts_run() {
        let fx = Fixture::new();
        let mut session = FakeSession::new(three_postings());
        session.login_ok = false;

        let err = fx
            .pipeline(RunOptions::default())
            .run(&mut session, Some(&credentials()))
            .unwrap_err();
        assert!(err.to_string().contains("Login failed"));
        assert!(fx.store.list(None).unwrap().is_empty());
        assert_eq!(*fx.letters.written.borrow(), 0);
    }

    #[test]
    fn test_no_credentials_skips_login() {
        let fx = Fixture::new();
        let mut session = FakeSession::new(three_postings());
        let summary = fx.pipeline(discovery_only()).run(&mut session, None).unwrap();
        assert_eq!(session.logins, 0);
        assert_eq!(summary.reports.len(), 3);
    }

    #[test]
    fn test_limit_caps_discovery() {
        let fx = Fixture::new();
        let mut session = FakeSession::new(three_postings());
        let options = RunOptions {
            limit: 2,
            ..discovery_only()
        };
        let summary = fx.pipeline(options).run(&mut session, None).unwrap();
        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.log_path, fx.dir.path().join("jobs_log.csv"));
    }
}
