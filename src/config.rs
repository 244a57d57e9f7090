use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{CandidateProfile, ResumeCategory, ResumeFiles};

pub const DEFAULT_LOGIN_URL: &str = "https://www.ubjobs.buffalo.edu/";
pub const DEFAULT_SEARCH_URL: &str = "https://www.ubjobs.buffalo.edu/postings/search";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_WAIT_SECS: u64 = 10;
pub const DEFAULT_JOB_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Everything the run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Option<Credentials>,
    pub login_url: String,
    pub search_url: String,
    pub webdriver_url: String,
    pub headless: bool,
    pub wait_timeout: Duration,
    pub job_limit: usize,
    pub model: String,
    pub data_dir: PathBuf,
    pub profile_path: PathBuf,
    pub resume_data: PathBuf,
    pub resume_research: PathBuf,
    pub resume_associate: PathBuf,
    pub cover_template: PathBuf,
}

impl Config {
    /// Reads `.env` and the process environment. Missing or malformed values
    /// fall back to defaults with a warning.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let data_dir = env::var("UB_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());
        let resumes = data_dir.join("resumes");

        let credentials = match (get_env("UB_USERNAME"), get_env("UB_PASSWORD")) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        Ok(Self {
            credentials,
            login_url: get_env("UB_LOGIN_URL").unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string()),
            search_url: get_env("UB_SEARCH_URL").unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            webdriver_url: get_env("WEBDRIVER_URL")
                .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
            headless: get_env_bool("UB_HEADLESS").unwrap_or(false),
            wait_timeout: Duration::from_secs(
                get_env_parse("UB_WAIT_SECS").unwrap_or(DEFAULT_WAIT_SECS),
            ),
            job_limit: get_env_parse("UB_JOB_LIMIT").unwrap_or(DEFAULT_JOB_LIMIT),
            model: get_env("UB_LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            profile_path: get_env("UB_PROFILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("profile.toml")),
            resume_data: get_env("UB_RESUME_DATA")
                .map(PathBuf::from)
                .unwrap_or_else(|| resumes.join("Resume_Data.pdf")),
            resume_research: get_env("UB_RESUME_RESEARCH")
                .map(PathBuf::from)
                .unwrap_or_else(|| resumes.join("Resume_Research.pdf")),
            resume_associate: get_env("UB_RESUME_ASSOCIATE")
                .map(PathBuf::from)
                .unwrap_or_else(|| resumes.join("Resume_Associate.pdf")),
            cover_template: get_env("UB_COVER_TEMPLATE")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("templates").join("cover_template.docx")),
            data_dir,
        })
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.data_dir.join("generated_docs")
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.data_dir.join("debug")
    }

    pub fn default_log_path(&self) -> PathBuf {
        self.logs_dir().join("jobs_log.csv")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.logs_dir(), self.docs_dir(), self.debug_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }

    /// Resume path for a category; the profile's own entry wins over the default.
    pub fn resume_path(&self, profile: &CandidateProfile, category: ResumeCategory) -> PathBuf {
        if let Some(path) = profile.resumes.get(category) {
            return path.clone();
        }
        match category {
            ResumeCategory::Data => self.resume_data.clone(),
            ResumeCategory::Research => self.resume_research.clone(),
            ResumeCategory::Associate => self.resume_associate.clone(),
        }
    }

    pub fn resolved_resumes(&self, profile: &CandidateProfile) -> ResumeFiles {
        ResumeFiles {
            data: Some(self.resume_path(profile, ResumeCategory::Data)),
            research: Some(self.resume_path(profile, ResumeCategory::Research)),
            associate: Some(self.resume_path(profile, ResumeCategory::Associate)),
        }
    }

    /// Lists everything that keeps the run from submitting applications.
    pub fn missing_for_apply(&self, profile: Option<&CandidateProfile>) -> Vec<String> {
        let mut missing = Vec::new();
        if self.credentials.is_none() {
            missing.push("Credentials (UB_USERNAME / UB_PASSWORD)".to_string());
        }
        let Some(profile) = profile else {
            missing.push(format!("Candidate profile ({})", self.profile_path.display()));
            return missing;
        };
        if profile.email.trim().is_empty() {
            missing.push("Personal info (email)".to_string());
        }
        for category in ResumeCategory::ALL {
            let path = self.resume_path(profile, category);
            if !path.exists() {
                missing.push(format!("Resume: {} ({})", category, path.display()));
            }
        }
        missing
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "ubapply") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_parse<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(name, value = %raw, error = %e, "Ignoring invalid setting, using the default");
            None
        }
    }
}

fn get_env_bool(name: &str) -> Option<bool> {
    let raw = get_env(name)?;
    let value = parse_flag(&raw);
    if value.is_none() {
        tracing::warn!(name, value = %raw, "Ignoring invalid setting, using the default");
    }
    value
}

/// true/false, 1/0, yes/no, on/off in any case.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Some(true),
        "false" | "0" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

pub fn load_profile(path: &Path) -> Result<CandidateProfile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read candidate profile {}", path.display()))?;
    toml::from_str(&text)
        .with_context(|| format!("Failed to parse candidate profile {}", path.display()))
}
