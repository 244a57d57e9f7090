use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub job_id: String,
    pub title: String,
    pub department: String, // "Unknown" when the detail page has no department field
    pub description: String,
    pub link: String,
}

/// Which resume (and cover letter framing) a posting gets.
///
/// Variants are declared in tie-break priority order: when two categories
/// score the same nonzero total, the one declared first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResumeCategory {
    Data,
    Research,
    #[serde(alias = "Associate")]
    Associate,
}

impl ResumeCategory {
    pub const ALL: [ResumeCategory; 3] = [Self::Data, Self::Research, Self::Associate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "DATA",
            Self::Research => "RESEARCH",
            Self::Associate => "ASSOCIATE",
        }
    }
}

impl fmt::Display for ResumeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ResumeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DATA" => Ok(Self::Data),
            "RESEARCH" => Ok(Self::Research),
            "ASSOCIATE" => Ok(Self::Associate),
            other => Err(format!("unknown resume category '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Applied,
    Failed,
    Archived,
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Applied => "Applied",
            Self::Failed => "Failed",
            Self::Archived => "Archived",
            Self::Unknown => "Unknown",
        }
    }
}

const DRY_RUN_SUFFIX: &str = " (Dry Run)";

/// Status as written to the job log: a status plus the dry-run qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct LogStatus {
    pub status: JobStatus,
    pub dry_run: bool,
}

impl LogStatus {
    pub const PENDING: LogStatus = LogStatus {
        status: JobStatus::Pending,
        dry_run: false,
    };

    pub fn new(status: JobStatus, dry_run: bool) -> Self {
        Self { status, dry_run }
    }

    /// Parses the log's text form. Never fails: anything unrecognized reads as Unknown.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let (base, dry_run) = match text.strip_suffix(DRY_RUN_SUFFIX) {
            Some(base) => (base.trim(), true),
            None => (text, false),
        };
        let status = match base.to_lowercase().as_str() {
            "pending" => JobStatus::Pending,
            "applied" | "submitted" => JobStatus::Applied,
            "failed" => JobStatus::Failed,
            "archived" => JobStatus::Archived,
            _ => JobStatus::Unknown,
        };
        Self { status, dry_run }
    }

    pub fn is_submitted(&self) -> bool {
        self.status == JobStatus::Applied
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status.as_str())?;
        if self.dry_run {
            f.write_str(DRY_RUN_SUFFIX)?;
        }
        Ok(())
    }
}

impl From<String> for LogStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<LogStatus> for String {
    fn from(status: LogStatus) -> Self {
        status.to_string()
    }
}

/// Terminal result reported by the application step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Failed,
    Archived,
    Other(String),
}

impl ApplyOutcome {
    /// Total mapping onto the log status; unrecognized outcomes become Unknown.
    pub fn to_status(&self, dry_run: bool) -> LogStatus {
        let status = match self {
            Self::Applied => JobStatus::Applied,
            Self::Failed => JobStatus::Failed,
            Self::Archived => JobStatus::Archived,
            Self::Other(_) => JobStatus::Unknown,
        };
        LogStatus::new(status, dry_run)
    }
}

/// One row of the job log, keyed by `job_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLogEntry {
    #[serde(rename = "Date_Discovered")]
    pub date_discovered: String,
    #[serde(rename = "Job_ID")]
    pub job_id: String,
    #[serde(rename = "Job_Title")]
    pub title: String,
    #[serde(rename = "Department")]
    pub department: String,
    #[serde(rename = "Resume_Type")]
    pub resume_type: ResumeCategory,
    #[serde(rename = "Status")]
    pub status: LogStatus,
    #[serde(rename = "Submission_Date", default)]
    pub submission_date: String,
    #[serde(rename = "Confirmation_Num", default)]
    pub confirmation: String,
    #[serde(rename = "Deadline", default)]
    pub deadline: String,
    #[serde(rename = "Notes", default)]
    pub notes: String,
}

impl JobLogEntry {
    pub fn discovered(job: &JobPosting, category: ResumeCategory) -> Self {
        Self {
            date_discovered: timestamp_now(),
            job_id: job.job_id.clone(),
            title: job.title.clone(),
            department: job.department.clone(),
            resume_type: category,
            status: LogStatus::PENDING,
            submission_date: String::new(),
            confirmation: String::new(),
            deadline: String::new(),
            notes: String::new(),
        }
    }

    /// Applies a status update: overwrite status, stamp the submission time
    /// for submitted states, replace notes only when some are given.
    pub fn apply_status(&mut self, status: LogStatus, notes: Option<&str>) {
        self.status = status;
        if status.is_submitted() {
            self.submission_date = timestamp_now();
        }
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            self.notes = notes.to_string();
        }
    }

    pub fn append_note(&mut self, note: &str) {
        if self.notes.trim().is_empty() {
            self.notes = note.to_string();
        } else {
            self.notes = format!("{}; {}", self.notes, note);
        }
    }
}

// --- Candidate profile (read-only input, loaded from TOML) ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateProfile {
    pub first_name: String,
    pub last_name: String,
    pub preferred_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub location: String,
    pub linkedin: String,
    pub github: String,
    pub authorized_to_work: String,
    pub sponsorship_needed: String,
    pub over_18: String,
    pub education: Vec<Education>,
    pub employment: Vec<Employment>,
    pub references: Vec<Reference>,
    pub eeo: Eeo,
    pub disability_status: String,
    pub veteran_status: String,
    pub resumes: ResumeFiles,
}

impl CandidateProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Resume file per category; entries here override the configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeFiles {
    #[serde(rename = "DATA")]
    pub data: Option<PathBuf>,
    #[serde(rename = "RESEARCH")]
    pub research: Option<PathBuf>,
    #[serde(rename = "ASSOCIATE")]
    pub associate: Option<PathBuf>,
}

impl ResumeFiles {
    pub fn get(&self, category: ResumeCategory) -> Option<&PathBuf> {
        match category {
            ResumeCategory::Data => self.data.as_ref(),
            ResumeCategory::Research => self.research.as_ref(),
            ResumeCategory::Associate => self.associate.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub school: String,
    pub major: String,
    pub graduated: String,
    pub degree_type: String,
    pub other_degree: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Employment {
    pub employer: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub begin_date: String,
    pub end_date: String,
    pub title: String,
    pub duties: String,
    pub hours_per_week: String,
    pub supervisor: String,
    pub supervisor_title: String,
    pub reason_leaving: String,
    pub contact_employer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Reference {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub relationship: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Eeo {
    pub gender: String,
    pub ethnicity: String,
    pub race: String,
    pub race_sub: String,
    pub language: String,
    pub lgbtq: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(id: &str) -> JobPosting {
        JobPosting {
            job_id: id.to_string(),
            title: "Data Analyst".to_string(),
            department: "Institutional Research".to_string(),
            description: "SQL and Python".to_string(),
            link: format!("https://example.edu/postings/{}", id),
        }
    }

    #[test]
    fn test_log_status_text_form() {
        assert_eq!(LogStatus::PENDING.to_string(), "Pending");
        assert_eq!(
            LogStatus::new(JobStatus::Applied, true).to_string(),
            "Applied (Dry Run)"
        );
        assert_eq!(LogStatus::parse("Failed (Dry Run)"), LogStatus::new(JobStatus::Failed, true));
        assert_eq!(LogStatus::parse("Archived"), LogStatus::new(JobStatus::Archived, false));
        assert_eq!(LogStatus::parse("garbage").status, JobStatus::Unknown);
        assert_eq!(LogStatus::parse("").status, JobStatus::Unknown);
    }

    #[test]
    fn test_apply_outcome_mapping_is_total() {
        let other = ApplyOutcome::Other("captcha".to_string());
        assert_eq!(ApplyOutcome::Applied.to_status(false).to_string(), "Applied");
        assert_eq!(ApplyOutcome::Failed.to_status(true).to_string(), "Failed (Dry Run)");
        assert_eq!(ApplyOutcome::Archived.to_status(false).to_string(), "Archived");
        assert_eq!(other.to_status(false).to_string(), "Unknown");
        assert_eq!(other.to_status(true).to_string(), "Unknown (Dry Run)");
    }

    #[test]
    fn test_apply_status_stamps_submission_only_when_submitted() {
        let mut entry = JobLogEntry::discovered(&posting("101"), ResumeCategory::Data);
        assert_eq!(entry.status, LogStatus::PENDING);
        assert!(entry.submission_date.is_empty());

        entry.apply_status(LogStatus::new(JobStatus::Failed, false), None);
        assert!(entry.submission_date.is_empty());

        entry.apply_status(LogStatus::new(JobStatus::Applied, true), Some("ok"));
        assert!(!entry.submission_date.is_empty());
        assert_eq!(entry.notes, "ok");

        entry.apply_status(LogStatus::new(JobStatus::Applied, true), Some("  "));
        assert_eq!(entry.notes, "ok");
    }

    #[test]
    fn test_append_note() {
        let mut entry = JobLogEntry::discovered(&posting("7"), ResumeCategory::Research);
        entry.append_note("letter failed");
        entry.append_note("retry later");
        assert_eq!(entry.notes, "letter failed; retry later");
    }

    #[test]
    fn test_resume_category_parse() {
        assert_eq!("data".parse::<ResumeCategory>().unwrap(), ResumeCategory::Data);
        assert_eq!("Associate".parse::<ResumeCategory>().unwrap(), ResumeCategory::Associate);
        assert!("MANAGER".parse::<ResumeCategory>().is_err());
    }

    #[test]
    fn test_profile_from_toml() {
        let text = r#"
            first_name = "Ada"
            last_name = "Lovelace"
            email = "ada@example.com"

            [resumes]
            DATA = "/tmp/data.pdf"

            [[education]]
            school = "Clarkson University"
            graduated = "Yes"
        "#;
        let profile: CandidateProfile = toml::from_str(text).unwrap();
        assert_eq!(profile.full_name(), "Ada Lovelace");
        assert_eq!(profile.education.len(), 1);
        assert_eq!(
            profile.resumes.get(ResumeCategory::Data),
            Some(&PathBuf::from("/tmp/data.pdf"))
        );
        assert!(profile.resumes.get(ResumeCategory::Research).is_none());
        assert!(profile.references.is_empty());
    }
}
