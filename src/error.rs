use std::path::PathBuf;

/// Failure to establish an authenticated portal session. Aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Browser session failed: {0}")]
    Browser(String),

    #[error("Login form not found: {0}")]
    FormNotFound(String),

    #[error("Could not verify login (snapshot saved to {snapshot:?})")]
    Unverified { snapshot: Option<PathBuf> },
}

/// Failure to produce a cover letter document. Local to one job.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document packaging error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
