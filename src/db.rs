use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use crate::models::{JobLogEntry, JobStatus, LogStatus};
use crate::store::JobStore;

/// SQLite job log with the same semantics as the CSV log.
pub struct SqliteJobLog {
    conn: Connection,
    path: PathBuf,
}

impl SqliteJobLog {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open job database {}", path.display()))?;
        let log = Self {
            conn,
            path: path.to_path_buf(),
        };
        log.init()?;
        Ok(log)
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS job_log (
                job_id TEXT PRIMARY KEY,
                date_discovered TEXT NOT NULL,
                title TEXT NOT NULL,
                department TEXT NOT NULL DEFAULT '',
                resume_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'Pending',
                submission_date TEXT NOT NULL DEFAULT '',
                confirmation TEXT NOT NULL DEFAULT '',
                deadline TEXT NOT NULL DEFAULT '',
                notes TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_job_log_status ON job_log(status);
            "#,
        )?;
        Ok(())
    }

    fn write_row(&self, entry: &JobLogEntry) -> Result<()> {
        self.conn.execute(
            "UPDATE job_log SET status = ?1, submission_date = ?2, notes = ?3 WHERE job_id = ?4",
            params![
                entry.status.to_string(),
                entry.submission_date,
                entry.notes,
                entry.job_id
            ],
        )?;
        Ok(())
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<JobLogEntry> {
        let resume_type: String = row.get(4)?;
        let status: String = row.get(5)?;
        Ok(JobLogEntry {
            job_id: row.get(0)?,
            date_discovered: row.get(1)?,
            title: row.get(2)?,
            department: row.get(3)?,
            resume_type: resume_type.parse().map_err(|e: String| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
            })?,
            status: LogStatus::parse(&status),
            submission_date: row.get(6)?,
            confirmation: row.get(7)?,
            deadline: row.get(8)?,
            notes: row.get(9)?,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT job_id, date_discovered, title, department, resume_type, status,
        submission_date, confirmation, deadline, notes FROM job_log";

impl JobStore for SqliteJobLog {
    fn record_if_new(&self, entry: &JobLogEntry) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO job_log (job_id, date_discovered, title, department, resume_type,
                status, submission_date, confirmation, deadline, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.job_id,
                entry.date_discovered,
                entry.title,
                entry.department,
                entry.resume_type.as_str(),
                entry.status.to_string(),
                entry.submission_date,
                entry.confirmation,
                entry.deadline,
                entry.notes
            ],
        )?;
        Ok(inserted > 0)
    }

    fn set_status(&self, job_id: &str, status: LogStatus, notes: Option<&str>) -> Result<()> {
        if let Some(mut entry) = self.get(job_id)? {
            entry.apply_status(status, notes);
            self.write_row(&entry)?;
        }
        Ok(())
    }

    fn add_note(&self, job_id: &str, note: &str) -> Result<()> {
        if let Some(mut entry) = self.get(job_id)? {
            entry.append_note(note);
            self.write_row(&entry)?;
        }
        Ok(())
    }

    fn get(&self, job_id: &str) -> Result<Option<JobLogEntry>> {
        let result = self.conn.query_row(
            &format!("{} WHERE job_id = ?1", SELECT_COLUMNS),
            [job_id],
            Self::row_to_entry,
        );
        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, status: Option<JobStatus>) -> Result<Vec<JobLogEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY date_discovered, rowid", SELECT_COLUMNS))?;
        let rows = stmt
            .query_map([], Self::row_to_entry)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list job log")?;
        Ok(match status {
            // status text carries the dry-run suffix, so filter after parsing
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

    fn entry(id: &str, category: ResumeCategory) -> JobLogEntry {
        let job = JobPosting {
            job_id: id.to_string(),
            title: "Research Scientist".to_string(),
            department: "Chemical Engineering".to_string(),
            description: String::new(),
            link: format!("https://example.edu/postings/{}", id),
        };
        JobLogEntry::discovered(&job, category)
    }

    #[test]
    fn test_record_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let log = SqliteJobLog::open(&dir.path().join("log.db")).unwrap();

        assert!(log.record_if_new(&entry("101", ResumeCategory::Research)).unwrap());
        assert!(!log.record_if_new(&entry("101", ResumeCategory::Data)).unwrap());

        let row = log.get("101").unwrap().unwrap();
        assert_eq!(row.resume_type, ResumeCategory::Research);
        assert_eq!(row.status, LogStatus::PENDING);
        assert!(log.get("102").unwrap().is_none());
    }

    #[test]
    fn test_set_status_and_notes() {
        let dir = tempfile::tempdir().unwrap();
        let log = SqliteJobLog::open(&dir.path().join("log.db")).unwrap();
        log.record_if_new(&entry("7", ResumeCategory::Data)).unwrap();

        log.set_status("7", LogStatus::new(JobStatus::Applied, false), None)
            .unwrap();
        log.add_note("7", "confirmation pending").unwrap();

        let row = log.get("7").unwrap().unwrap();
        assert_eq!(row.status.to_string(), "Applied");
        assert!(!row.submission_date.is_empty());
        assert_eq!(row.notes, "confirmation pending");

        // unknown id leaves the table as is
        log.set_status("8", LogStatus::new(JobStatus::Failed, false), None)
            .unwrap();
        assert_eq!(log.list(None).unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.db");
        {
            let log = SqliteJobLog::open(&path).unwrap();
            log.record_if_new(&entry("1", ResumeCategory::Associate)).unwrap();
            log.set_status("1", LogStatus::new(JobStatus::Failed, true), None)
                .unwrap();
        }
        let log = SqliteJobLog::open(&path).unwrap();
        let failed = log.list(Some(JobStatus::Failed)).unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].status.dry_run);
    }
}
