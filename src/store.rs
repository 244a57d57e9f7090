use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::db::SqliteJobLog;
use crate::models::{JobLogEntry, JobStatus, LogStatus};

pub const COLUMNS: [&str; 10] = [
    "Date_Discovered",
    "Job_ID",
    "Job_Title",
    "Department",
    "Resume_Type",
    "Status",
    "Submission_Date",
    "Confirmation_Num",
    "Deadline",
    "Notes",
];

/// Durable job log keyed by job id. Every mutation is written through.
pub trait JobStore {
    /// Inserts the row unless its job id is already present. First write wins.
    fn record_if_new(&self, entry: &JobLogEntry) -> Result<bool>;

    /// Overwrites the status of a known job; unknown ids are ignored.
    fn set_status(&self, job_id: &str, status: LogStatus, notes: Option<&str>) -> Result<()>;

    /// Appends to the notes of a known job without touching its status.
    fn add_note(&self, job_id: &str, note: &str) -> Result<()>;

    fn get(&self, job_id: &str) -> Result<Option<JobLogEntry>>;

    fn list(&self, status: Option<JobStatus>) -> Result<Vec<JobLogEntry>>;

    fn location(&self) -> &Path;
}

/// Opens the backend matching the file extension: SQLite for `.db`/`.sqlite`,
/// CSV otherwise.
pub fn open_store(path: &Path) -> Result<Box<dyn JobStore>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("db") | Some("sqlite") => Ok(Box::new(SqliteJobLog::open(path)?)),
        _ => Ok(Box::new(CsvJobLog::open(path)?)),
    }
}

/// CSV file job log. Each call reads the whole table, changes it and writes it back.
pub struct CsvJobLog {
    path: PathBuf,
}

impl CsvJobLog {
    pub fn open(path: &Path) -> Result<Self> {
        let log = Self {
            path: path.to_path_buf(),
        };
        if !log.path.exists() {
            log.save(&[])?;
        }
        Ok(log)
    }

    fn load(&self) -> Result<Vec<JobLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open job log {}", self.path.display()))?;
        reader
            .deserialize()
            .collect::<Result<Vec<JobLogEntry>, _>>()
            .with_context(|| format!("Failed to read job log {}", self.path.display()))
    }

    fn save(&self, rows: &[JobLogEntry]) -> Result<()> {
        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&tmp)
                .with_context(|| format!("Failed to write {}", tmp.display()))?;
            writer.write_record(COLUMNS)?;
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace job log {}", self.path.display()))?;
        Ok(())
    }

    fn update<F>(&self, job_id: &str, change: F) -> Result<()>
    where
        F: FnOnce(&mut JobLogEntry),
    {
        let mut rows = self.load()?;
        match rows.iter_mut().find(|r| r.job_id == job_id) {
            Some(row) => {
                change(row);
                self.save(&rows)
            }
            None => {
                tracing::debug!(job_id, "status update for unknown job ignored");
                Ok(())
            }
        }
    }
}

impl JobStore for CsvJobLog {
    fn record_if_new(&self, entry: &JobLogEntry) -> Result<bool> {
        let mut rows = self.load()?;
        if rows.iter().any(|r| r.job_id == entry.job_id) {
            return Ok(false);
        }
        rows.push(entry.clone());
        self.save(&rows)?;
        Ok(true)
    }

    fn set_status(&self, job_id: &str, status: LogStatus, notes: Option<&str>) -> Result<()> {
        self.update(job_id, |row| row.apply_status(status, notes))
    }

    fn add_note(&self, job_id: &str, note: &str) -> Result<()> {
        self.update(job_id, |row| row.append_note(note))
    }

    fn get(&self, job_id: &str) -> Result<Option<JobLogEntry>> {
        Ok(self.load()?.into_iter().find(|r| r.job_id == job_id))
    }

    fn list(&self, status: Option<JobStatus>) -> Result<Vec<JobLogEntry>> {
        let rows = self.load()?;
        Ok(match status {
            Some(s) => rows.into_iter().filter(|r| r.status.status == s).collect(),
            None => rows,
        })
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobPosting, ResumeCategory};

    fn entry(id: &str) -> JobLogEntry {
        let job = JobPosting {
            job_id: id.to_string(),
            title: format!("Position {}", id),
            department: "Libraries, Research & Instruction".to_string(),
            description: String::new(),
            link: format!("https://example.edu/postings/{}", id),
        };
        JobLogEntry::discovered(&job, ResumeCategory::Associate)
    }

    fn csv_log(dir: &tempfile::TempDir) -> CsvJobLog {
        let logs = dir.path().join("logs");
        std::fs::create_dir_all(&logs).unwrap();
        CsvJobLog::open(&logs.join("jobs_log.csv")).unwrap()
    }

    #[test]
    fn test_open_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let log = csv_log(&dir);
        let text = std::fs::read_to_string(log.location()).unwrap();
        assert_eq!(text.trim(), COLUMNS.join(","));
        assert!(log.list(None).unwrap().is_empty());
    }

    #[test]
    fn test_record_if_new_first_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let log = csv_log(&dir);

        assert!(log.record_if_new(&entry("101")).unwrap());
        let mut changed = entry("101");
        changed.title = "Renamed".to_string();
        assert!(!log.record_if_new(&changed).unwrap());
        assert!(!log.record_if_new(&entry("101")).unwrap());

        let rows = log.list(None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Position 101");
    }

    #[test]
    fn test_set_status_unknown_id_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let log = csv_log(&dir);
        log.record_if_new(&entry("1")).unwrap();
        let before = std::fs::read_to_string(log.location()).unwrap();

        log.set_status("999", LogStatus::new(JobStatus::Applied, false), Some("x"))
            .unwrap();
        log.add_note("999", "x").unwrap();

        let after = std::fs::read_to_string(log.location()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_set_status_overwrites_and_stamps() {
        let dir = tempfile::tempdir().unwrap();
        let log = csv_log(&dir);
        log.record_if_new(&entry("5")).unwrap();

        log.set_status("5", LogStatus::new(JobStatus::Failed, false), None)
            .unwrap();
        let row = log.get("5").unwrap().unwrap();
        assert_eq!(row.status.to_string(), "Failed");
        assert!(row.submission_date.is_empty());

        log.set_status("5", LogStatus::new(JobStatus::Applied, true), Some("simulated"))
            .unwrap();
        let row = log.get("5").unwrap().unwrap();
        assert_eq!(row.status.to_string(), "Applied (Dry Run)");
        assert!(!row.submission_date.is_empty());
        assert_eq!(row.notes, "simulated");
    }

    #[test]
    fn test_add_note_keeps_status() {
        let dir = tempfile::tempdir().unwrap();
        let log = csv_log(&dir);
        log.record_if_new(&entry("8")).unwrap();
        log.add_note("8", "cover letter failed: timeout").unwrap();

        let row = log.get("8").unwrap().unwrap();
        assert_eq!(row.status, LogStatus::PENDING);
        assert_eq!(row.notes, "cover letter failed: timeout");
    }

    #[test]
    fn test_list_filters_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let log = csv_log(&dir);
        for id in ["1", "2", "3"] {
            log.record_if_new(&entry(id)).unwrap();
        }
        log.set_status("2", LogStatus::new(JobStatus::Archived, true), None)
            .unwrap();

        assert_eq!(log.list(Some(JobStatus::Pending)).unwrap().len(), 2);
        let archived = log.list(Some(JobStatus::Archived)).unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].job_id, "2");
    }

    #[test]
    fn test_fields_with_commas_and_newlines_survive() {
        let dir = tempfile::tempdir().unwrap();
        let log = csv_log(&dir);
        let mut e = entry("42");
        e.title = "Analyst, \"Senior\"\nLevel II".to_string();
        log.record_if_new(&e).unwrap();

        let row = log.get("42").unwrap().unwrap();
        assert_eq!(row.title, e.title);
        assert_eq!(row.department, "Libraries, Research & Instruction");
    }

    #[test]
    fn test_open_store_picks_backend_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv_store = open_store(&dir.path().join("a").join("jobs_log.csv")).unwrap();
        assert!(csv_store.location().ends_with("jobs_log.csv"));

        let db_store = open_store(&dir.path().join("jobs_log.db")).unwrap();
        assert!(db_store.record_if_new(&entry("1")).unwrap());
        assert!(!db_store.record_if_new(&entry("1")).unwrap());
    }
}
