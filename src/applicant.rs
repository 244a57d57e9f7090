use anyhow::Result;
use std::path::Path;
use thirtyfour::{By, WebElement};

use crate::browser::{text_xpath, xpath_literal, Browser};
use crate::models::{ApplyOutcome, CandidateProfile, Education, Employment, JobPosting, Reference};
use crate::site;

/// Opens the posting and works through the application form.
///
/// Missing sections or fields are skipped. Navigation errors are returned;
/// everything the page itself tells us becomes an outcome.
pub fn submit_application(
    browser: &Browser,
    job: &JobPosting,
    resume: &Path,
    letter: &Path,
    profile: &CandidateProfile,
    dry_run: bool,
) -> Result<ApplyOutcome> {
    tracing::info!(job_id = %job.job_id, url = %job.link, "Opening posting");
    browser.goto(&job.link)?;

    let Some(apply) = find_apply_link(browser) else {
        let text = browser.body_text().unwrap_or_default();
        if posting_closed(&text) {
            tracing::info!(job_id = %job.job_id, "Posting is archived or closed");
            return Ok(ApplyOutcome::Archived);
        }
        tracing::warn!(job_id = %job.job_id, "Could not find an apply link");
        return Ok(ApplyOutcome::Failed);
    };
    browser.click(&apply)?;

    if browser.current_url()?.contains("login") {
        tracing::warn!(job_id = %job.job_id, "Redirected to login, session expired");
        return Ok(ApplyOutcome::Failed);
    }

    tracing::info!(job_id = %job.job_id, "Filling application form");
    section("personal", fill_personal(browser, profile));
    add_entries(browser, site::ADD_EDUCATION, &profile.education, fill_education);
    add_entries(browser, site::ADD_EMPLOYMENT, &profile.employment, fill_employment);
    add_entries(browser, site::ADD_REFERENCE, &profile.references, fill_reference);
    section("resume upload", upload_resume(browser, resume));
    section("cover letter upload", upload_letter(browser, letter));
    section("eeo", fill_eeo(browser, profile));

    if dry_run {
        tracing::info!(job_id = %job.job_id, "Dry run: form filled, not submitting");
        return Ok(ApplyOutcome::Applied);
    }

    let submit = browser
        .find_now(By::Css(site::FINAL_SUBMIT))
        .or_else(|| browser.find_now(By::XPath(text_xpath("button", site::FINAL_SUBMIT_TEXT))));
    let Some(submit) = submit else {
        tracing::warn!(job_id = %job.job_id, "Could not find the submit button");
        return Ok(ApplyOutcome::Failed);
    };
    browser.click(&submit)?;
    tracing::info!(job_id = %job.job_id, "Application submitted");
    Ok(ApplyOutcome::Applied)
}

fn section(name: &str, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!(section = name, error = %format!("{:#}", e), "Form section incomplete");
    }
}

fn find_apply_link(browser: &Browser) -> Option<WebElement> {
    site::APPLY_LINK_TEXTS
        .iter()
        .find_map(|text| browser.find_now(By::XPath(text_xpath("a", text))))
        .or_else(|| browser.find_now(By::Css(site::APPLY_BUTTON)))
}

/// Whether the page text says the posting no longer takes applications.
pub fn posting_closed(page_text: &str) -> bool {
    let text = page_text.to_lowercase();
    site::CLOSED_MARKERS.iter().any(|m| text.contains(m))
}

/// Fills the input when both the input and a value exist.
fn fill(browser: &Browser, selector: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Ok(());
    }
    if !browser.fill(selector, value)? {
        tracing::debug!(selector, "field not on form");
    }
    Ok(())
}

fn select(browser: &Browser, selector: &str, label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Ok(());
    }
    if !browser.select_label(selector, label)? {
        tracing::debug!(selector, label, "select or option not on form");
    }
    Ok(())
}

fn fill_personal(browser: &Browser, profile: &CandidateProfile) -> Result<()> {
    fill(browser, site::FIRST_NAME_INPUT, &profile.first_name)?;
    fill(browser, site::LAST_NAME_INPUT, &profile.last_name)?;
    fill(browser, site::EMAIL_INPUT, &profile.email)?;
    fill(browser, site::PHONE_INPUT, &profile.phone)?;
    fill(browser, site::ADDRESS_INPUT, &profile.address)?;
    fill(browser, site::CITY_INPUT, &profile.city)?;
    fill(browser, site::ZIP_INPUT, &profile.zip_code)
}

/// Runs `add` once per entry. An entry that fails is logged and the next
/// one is tried; `Ok(false)` means the section is not on the form and ends
/// the loop. Returns how many entries were added.
fn each_entry<T>(section: &str, entries: &[T], mut add: impl FnMut(&T) -> Result<bool>) -> usize {
    let mut added = 0;
    for (i, entry) in entries.iter().enumerate() {
        match add(entry) {
            Ok(true) => added += 1,
            Ok(false) => {
                tracing::debug!(section, "section not on form");
                break;
            }
            Err(e) => tracing::warn!(
                section,
                entry = i + 1,
                error = %format!("{:#}", e),
                "Entry incomplete, moving on"
            ),
        }
    }
    added
}

/// Adds one history entry per item: press the section's add button, fill
/// the entry, save it.
fn add_entries<T>(
    browser: &Browser,
    add_text: &str,
    entries: &[T],
    fill_entry: fn(&Browser, &T) -> Result<()>,
) {
    let added = each_entry(add_text, entries, |entry| add_entry(browser, add_text, entry, fill_entry));
    if !entries.is_empty() {
        tracing::info!(section = add_text, added, total = entries.len(), "History entries");
    }
}

fn add_entry<T>(
    browser: &Browser,
    add_text: &str,
    entry: &T,
    fill_entry: fn(&Browser, &T) -> Result<()>,
) -> Result<bool> {
    let clicked = browser.click_text("button", add_text)? || browser.click_text("a", add_text)?;
    if !clicked {
        return Ok(false);
    }
    // save even a partly filled entry so the form is not left open
    let filled = fill_entry(browser, entry);

    let save = browser
        .find_now(By::Css(site::SAVE_ENTRY))
        .or_else(|| browser.find_now(By::XPath(text_xpath("button", site::SAVE_ENTRY_TEXT))));
    let saved = match save {
        Some(button) => browser.click(&button),
        None => {
            tracing::debug!(section = add_text, "no save button");
            Ok(())
        }
    };
    filled?;
    saved?;
    Ok(true)
}

fn fill_education(browser: &Browser, edu: &Education) -> Result<()> {
    fill(browser, site::EDU_SCHOOL, &edu.school)?;
    fill(browser, site::EDU_MAJOR, &edu.major)?;
    if edu.graduated.eq_ignore_ascii_case("yes") {
        select(browser, site::EDU_GRADUATED, "Yes")?;
    }
    let degree = if edu.other_degree.trim().is_empty() {
        &edu.degree_type
    } else {
        &edu.other_degree
    };
    fill(browser, site::EDU_DEGREE, degree)
}

fn fill_employment(browser: &Browser, emp: &Employment) -> Result<()> {
    fill(browser, site::EMP_EMPLOYER, &emp.employer)?;
    fill(browser, site::EMP_PHONE, &emp.phone)?;
    fill(browser, site::EMP_ADDRESS, &emp.address)?;
    fill(browser, site::EMP_CITY, &emp.city)?;
    fill(browser, site::EMP_TITLE, &emp.title)?;
    fill(browser, site::EMP_DUTIES, &emp.duties)?;
    fill(browser, site::EMP_SUPERVISOR, &emp.supervisor)?;
    fill(browser, site::EMP_REASON, &emp.reason_leaving)?;
    fill(browser, site::EMP_BEGIN, &emp.begin_date)?;
    fill(browser, site::EMP_END, &emp.end_date)
}

fn fill_reference(browser: &Browser, reference: &Reference) -> Result<()> {
    fill(browser, site::REF_NAME, &reference.name)?;
    fill(browser, site::REF_EMAIL, &reference.email)?;
    fill(browser, site::REF_PHONE, &reference.phone)?;
    fill(browser, site::REF_RELATIONSHIP, &reference.relationship)
}

/// File input inside the table row labelled `label`.
pub fn row_file_input_xpath(label: &str) -> String {
    format!(
        "//tr[contains(normalize-space(.), {})]//input[@type='file']",
        xpath_literal(label)
    )
}

fn upload_resume(browser: &Browser, resume: &Path) -> Result<()> {
    let input = browser
        .find_now(By::XPath(row_file_input_xpath(site::RESUME_ROW_LABEL)))
        .or_else(|| browser.find_now(By::Css(site::ANY_FILE_INPUT)));
    match input {
        Some(input) => {
            tracing::info!(path = %resume.display(), "Uploading resume");
            browser.upload(&input, resume)
        }
        None => {
            tracing::warn!("Could not find a file input for the resume");
            Ok(())
        }
    }
}

fn upload_letter(browser: &Browser, letter: &Path) -> Result<()> {
    match browser.find_now(By::XPath(row_file_input_xpath(site::COVER_LETTER_ROW_LABEL))) {
        Some(input) => {
            tracing::info!(path = %letter.display(), "Uploading cover letter");
            browser.upload(&input, letter)
        }
        None => Ok(()),
    }
}

fn fill_eeo(browser: &Browser, profile: &CandidateProfile) -> Result<()> {
    select(browser, site::EEO_GENDER, &profile.eeo.gender)?;
    select(browser, site::EEO_ETHNICITY, &profile.eeo.ethnicity)?;
    select(browser, site::EEO_RACE, &profile.eeo.race)?;
    select(browser, site::EEO_VETERAN, &profile.veteran_status)?;
    select(browser, site::EEO_DISABILITY, &profile.disability_status)
}
