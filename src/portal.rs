use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use thirtyfour::By;

use crate::applicant;
use crate::browser::Browser;
use crate::config::{Config, Credentials};
use crate::error::LoginError;
use crate::models::{ApplyOutcome, CandidateProfile, JobPosting};
use crate::pipeline::{Applicant, Authenticator, Discovery};
use crate::postings::{self, PostingLink, UNKNOWN_DEPARTMENT};
use crate::site;

/// The postings site driven through one browser tab.
pub struct UbPortal {
    browser: Browser,
    login_url: String,
    search_url: String,
    debug_dir: PathBuf,
}

/// One step of `debug-login`, for printing.
#[derive(Debug, Clone)]
pub struct DebugStep {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl UbPortal {
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self {
            browser: Browser::launch(config)?,
            login_url: config.login_url.clone(),
            search_url: config.search_url.clone(),
            debug_dir: config.debug_dir(),
        })
    }

    pub fn close(self) -> Result<()> {
        self.browser.quit()
    }

    fn is_logged_in(&self) -> bool {
        site::LOGGED_IN_MARKERS.iter().any(|m| self.browser.has_text(m))
    }

    /// Follows the first login link found. Ok(false) when there is none,
    /// which usually means the form is already on the page.
    fn open_login_form(&self) -> Result<bool> {
        for text in site::LOGIN_LINK_TEXTS {
            if self.browser.click_text("a", text)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn submit_credentials(&self, credentials: &Credentials) -> Result<(), LoginError> {
        if self.browser.wait_for(By::Css(site::USERNAME_INPUT)).is_none() {
            return Err(LoginError::FormNotFound("username field".to_string()));
        }
        let browser_err = |e: anyhow::Error| LoginError::Browser(format!("{:#}", e));

        self.browser
            .fill(site::USERNAME_INPUT, &credentials.username)
            .map_err(browser_err)?;
        if !self
            .browser
            .fill(site::PASSWORD_INPUT, &credentials.password)
            .map_err(browser_err)?
        {
            return Err(LoginError::FormNotFound("password field".to_string()));
        }
        let Some(button) = self.browser.find_now(By::Css(site::LOGIN_SUBMIT)) else {
            return Err(LoginError::FormNotFound("submit button".to_string()));
        };
        self.browser.click(&button).map_err(browser_err)
    }

    /// Saves a screenshot under the debug directory. Failures are only logged.
    fn snapshot(&self, name: &str) -> Option<PathBuf> {
        let path = self.debug_dir.join(name);
        let saved = fs::create_dir_all(&self.debug_dir)
            .context("Failed to create debug directory")
            .and_then(|_| self.browser.screenshot(&path));
        match saved {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "Could not save screenshot");
                None
            }
        }
    }

    fn save_source(&self, name: &str) -> Result<PathBuf> {
        let path = self.debug_dir.join(name);
        fs::create_dir_all(&self.debug_dir)?;
        fs::write(&path, self.browser.source()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    fn apply_recency_filter(&self, value: &str) -> Result<bool> {
        if !self.browser.select_value(site::POSTED_WITHIN_SELECT, value)? {
            return Ok(false);
        }
        let Some(button) = self.browser.find_now(By::Css(site::SEARCH_SUBMIT)) else {
            return Ok(false);
        };
        self.browser.click(&button)?;
        Ok(true)
    }

    fn read_posting(&self, link: &PostingLink) -> Result<JobPosting> {
        self.browser.goto(&link.link)?;
        let html = self.browser.source()?;
        let department =
            postings::parse_department(&html).unwrap_or_else(|| UNKNOWN_DEPARTMENT.to_string());
        let description = self.browser.body_text()?;
        Ok(JobPosting {
            job_id: link.job_id.clone(),
            title: link.title.clone(),
            department,
            description,
            link: link.link.clone(),
        })
    }

    /// Walks through the login flow one step at a time, saving a screenshot
    /// after each step and the page source when the form cannot be found.
    pub fn debug_login(&self, credentials: &Credentials) -> Result<Vec<DebugStep>> {
        let mut steps = Vec::new();
        let mut step = |name: &'static str, ok: bool, detail: String| {
            tracing::info!(step = name, ok, "{}", detail);
            steps.push(DebugStep { name, ok, detail });
        };

        self.browser.goto(&self.login_url)?;
        let shot = self.snapshot("step1_home.png");
        step("open home page", true, describe_shot(&self.login_url, shot.as_deref()));

        let followed = self.open_login_form()?;
        let shot = self.snapshot("step2_login_page.png");
        step(
            "follow login link",
            followed,
            describe_shot(if followed { "clicked" } else { "no login link" }, shot.as_deref()),
        );

        let form_found = self.browser.wait_for(By::Css(site::USERNAME_INPUT)).is_some();
        let detail = if form_found {
            "username field found".to_string()
        } else {
            let source = self.save_source("login_page_source.html")?;
            format!("username field not found; page source saved to {}", source.display())
        };
        step("find login form", form_found, detail);

        if form_found {
            let filled = self.browser.fill(site::USERNAME_INPUT, &credentials.username)?
                && self.browser.fill(site::PASSWORD_INPUT, &credentials.password)?;
            let shot = self.snapshot("step3_filled.png");
            step("fill credentials", filled, describe_shot("", shot.as_deref()));

            let submitted = match self.browser.find_now(By::Css(site::LOGIN_SUBMIT)) {
                Some(button) => {
                    self.browser.click(&button)?;
                    true
                }
                None => false,
            };
            step("submit", submitted, String::new());
        }

        let logged_in = self.browser.wait_for_any_text(&site::LOGGED_IN_MARKERS);
        let shot = self.snapshot("step4_post_login.png");
        step("verify login", logged_in, describe_shot(&self.browser.current_url()?, shot.as_deref()));

        if self.browser.click_text("a", site::SEARCH_LINK_TEXT)? {
            let shot = self.snapshot("step5_search_jobs.png");
            step("open job search", true, describe_shot("", shot.as_deref()));
        }

        Ok(steps)
    }
}

fn describe_shot(detail: &str, shot: Option<&Path>) -> String {
    match (detail.is_empty(), shot) {
        (true, Some(path)) => format!("screenshot {}", path.display()),
        (false, Some(path)) => format!("{} (screenshot {})", detail, path.display()),
        (_, None) => detail.to_string(),
    }
}

impl Authenticator for UbPortal {
    fn login(&mut self, credentials: &Credentials) -> Result<(), LoginError> {
        self.browser
            .goto(&self.login_url)
            .map_err(|e| LoginError::Browser(format!("{:#}", e)))?;
        if self.is_logged_in() {
            tracing::info!("Already logged in");
            return Ok(());
        }

        let followed = self
            .open_login_form()
            .map_err(|e| LoginError::Browser(format!("{:#}", e)))?;
        tracing::debug!(followed, "login link");

        tracing::info!("Entering credentials");
        if let Err(e) = self.submit_credentials(credentials) {
            self.snapshot("login_error.png");
            return Err(e);
        }

        if self.browser.wait_for_any_text(&site::LOGGED_IN_MARKERS) {
            tracing::info!("Login successful");
            Ok(())
        } else {
            Err(LoginError::Unverified {
                snapshot: self.snapshot("login_error.png"),
            })
        }
    }
}

impl Discovery for UbPortal {
    fn discover(&mut self, posted_within: Option<&str>, limit: usize) -> Result<Vec<JobPosting>> {
        self.browser.goto(&self.search_url)?;

        if let Some(value) = posted_within {
            match self.apply_recency_filter(value) {
                Ok(true) => tracing::info!(posted_within = value, "Date filter applied"),
                Ok(false) => tracing::warn!("Date filter not available, using unfiltered results"),
                Err(e) => tracing::warn!(
                    error = %format!("{:#}", e),
                    "Could not apply date filter, using unfiltered results"
                ),
            }
        }

        let page_url = self
            .browser
            .current_url()
            .unwrap_or_else(|_| self.search_url.clone());
        let html = self.browser.source()?;
        let links = postings::parse_posting_links(&html, &page_url, limit)?;
        tracing::info!(count = links.len(), "Found posting links");

        let mut jobs = Vec::with_capacity(links.len());
        for link in &links {
            tracing::info!(job_id = %link.job_id, url = %link.link, "Reading posting");
            match self.read_posting(link) {
                Ok(job) => jobs.push(job),
                Err(e) => tracing::warn!(
                    job_id = %link.job_id,
                    error = %format!("{:#}", e),
                    "Skipping posting"
                ),
            }
        }
        Ok(jobs)
    }
}

impl Applicant for UbPortal {
    fn apply(
        &mut self,
        job: &JobPosting,
        resume: &Path,
        letter: &Path,
        profile: &CandidateProfile,
        dry_run: bool,
    ) -> Result<ApplyOutcome> {
        applicant::submit_application(&self.browser, job, resume, letter, profile, dry_run)
    }
}
