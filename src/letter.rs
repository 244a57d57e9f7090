use regex::{Captures, Regex};
use std::cell::Cell;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::ai::{self, AIProvider};
use crate::error::GenerationError;
use crate::models::{CandidateProfile, JobPosting, ResumeCategory};
use crate::pipeline::LetterGenerator;

const DOCUMENT_XML: &str = "word/document.xml";
const UNIVERSITY: &str = "University at Buffalo";

/// Produces `Cover_Letter_<job id>.docx` files: a filled-in template when the
/// template carries placeholders, a freshly composed letter otherwise.
pub struct CoverLetterWriter {
    output_dir: PathBuf,
    template: Option<PathBuf>,
    provider: Option<Box<dyn AIProvider>>,
    template_broken: Cell<bool>,
}

impl CoverLetterWriter {
    pub fn new(
        output_dir: PathBuf,
        template: Option<PathBuf>,
        provider: Option<Box<dyn AIProvider>>,
    ) -> Self {
        Self {
            output_dir,
            template,
            provider,
            template_broken: Cell::new(false),
        }
    }

    /// Letter body from the model, or the fixed fallback when there is no
    /// model or the call fails.
    pub fn body(
        &self,
        job: &JobPosting,
        category: ResumeCategory,
        profile: &CandidateProfile,
    ) -> String {
        if let Some(provider) = &self.provider {
            match ai::cover_letter_body(provider.as_ref(), job, category, profile) {
                Ok(body) if !body.is_empty() => return body,
                Ok(_) => tracing::warn!(job_id = %job.job_id, "model returned an empty letter body"),
                Err(e) => {
                    tracing::warn!(job_id = %job.job_id, error = %e, "letter body generation failed, using fallback")
                }
            }
        }
        fallback_body(job)
    }

    pub fn write(
        &self,
        job: &JobPosting,
        category: ResumeCategory,
        profile: &CandidateProfile,
    ) -> Result<PathBuf, GenerationError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let out = self
            .output_dir
            .join(format!("Cover_Letter_{}.docx", sanitize_filename(&job.job_id)));

        let body = self.body(job, category, profile);
        let date = chrono::Local::now().format("%m/%d/%Y").to_string();

        let template = self
            .template
            .as_deref()
            .filter(|t| !self.template_broken.get() && t.exists());
        if let Some(template) = template {
            let mapping = placeholders(job, profile, &body, &date);
            match render_template(template, &mapping, &out) {
                Ok(true) => {
                    tracing::debug!(template = %template.display(), "filled cover letter template");
                    return Ok(out);
                }
                Ok(false) => {
                    tracing::info!(template = %template.display(), "template not usable, composing letter")
                }
                // the template stays unread for the rest of the run
                Err(e) => {
                    self.template_broken.set(true);
                    tracing::warn!(
                        template = %template.display(),
                        error = %e,
                        "cannot read cover letter template, composing letters instead"
                    );
                }
            }
        }

        let paragraphs = compose(job, profile, &body, &date);
        write_docx(&paragraphs, &out)?;
        Ok(out)
    }
}

impl LetterGenerator for CoverLetterWriter {
    fn generate(
        &self,
        job: &JobPosting,
        category: ResumeCategory,
        profile: &CandidateProfile,
    ) -> Result<PathBuf, GenerationError> {
        self.write(job, category, profile)
    }
}

pub fn fallback_body(job: &JobPosting) -> String {
    format!(
        "I am excited to apply for the {} role in {}. \
         My background aligns well with your needs, and I am confident I can contribute immediately.\n\n\
         In my recent roles, I delivered measurable impact through analysis, execution, and collaboration. \
         I am motivated by UB's mission and the opportunity to support your team's work.\n\n\
         Thank you for your consideration. I look forward to discussing fit and next steps.",
        job.title, job.department
    )
}

/// Collapses each run of characters outside `[A-Za-z0-9_-]` into one `_`.
pub fn sanitize_filename(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut in_gap = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            cleaned.push(c);
            in_gap = false;
        } else if !in_gap {
            cleaned.push('_');
            in_gap = true;
        }
    }
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "Unknown".to_string()
    } else {
        cleaned.to_string()
    }
}

fn placeholders(
    job: &JobPosting,
    profile: &CandidateProfile,
    body: &str,
    date: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("{{DATE}}", date.to_string()),
        ("{{DEPARTMENT}}", job.department.clone()),
        ("{{TITLE}}", job.title.clone()),
        ("{{JOB_ID}}", job.job_id.clone()),
        ("{{BODY}}", body.to_string()),
        ("{{FIRST_NAME}}", profile.first_name.clone()),
        ("{{LAST_NAME}}", profile.last_name.clone()),
        ("{{EMAIL}}", profile.email.clone()),
        ("{{PHONE}}", profile.phone.clone()),
        ("{{LOCATION}}", profile.location.clone()),
        ("{{LINKEDIN}}", profile.linkedin.clone()),
        ("{{GITHUB}}", profile.github.clone()),
        ("{{CAMPUS}}", String::new()),
    ]
}

// --- DOCX packaging ---

#[derive(Debug, Clone, PartialEq)]
struct Paragraph {
    text: String,
    bold: bool,
    bullet: bool,
}

impl Paragraph {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            bullet: false,
        }
    }

    fn blank() -> Self {
        Self::plain("")
    }
}

fn join_present(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn compose(
    job: &JobPosting,
    profile: &CandidateProfile,
    body: &str,
    date: &str,
) -> Vec<Paragraph> {
    let name = profile.full_name();
    let mut paragraphs = vec![
        Paragraph {
            text: name.clone(),
            bold: true,
            bullet: false,
        },
        Paragraph::plain(join_present(&[&profile.location, &profile.phone])),
        Paragraph::plain(profile.email.clone()),
        Paragraph::plain(join_present(&[&profile.linkedin, &profile.github])),
        Paragraph::blank(),
        Paragraph::plain(date),
        Paragraph::blank(),
        Paragraph::plain("Hiring Committee"),
        Paragraph::plain(job.department.clone()),
        Paragraph::plain(UNIVERSITY),
        Paragraph::blank(),
        Paragraph::plain("Dear Hiring Committee,"),
        Paragraph::blank(),
    ];
    paragraphs.extend(body_paragraphs(body));
    paragraphs.push(Paragraph::blank());
    paragraphs.push(Paragraph::plain("Sincerely,"));
    paragraphs.push(Paragraph::plain(name));
    paragraphs
}

/// One paragraph per non-empty line; "- " lines become bullets.
fn body_paragraphs(body: &str) -> Vec<Paragraph> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.strip_prefix("- ") {
            Some(item) => Paragraph {
                text: item.trim().to_string(),
                bold: false,
                bullet: true,
            },
            None => Paragraph::plain(line),
        })
        .collect()
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn paragraph_xml(p: &Paragraph) -> String {
    if p.text.is_empty() {
        return "<w:p/>".to_string();
    }
    let (ppr, prefix) = if p.bullet {
        (r#"<w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr>"#, "\u{2022}\t")
    } else {
        ("", "")
    };
    let rpr = if p.bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
    format!(
        r#"<w:p>{}<w:r>{}<w:t xml:space="preserve">{}{}</w:t></w:r></w:p>"#,
        ppr,
        rpr,
        prefix,
        xml_escape(&p.text)
    )
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

// Times New Roman 12pt (sizes are in half points)
const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Times New Roman" w:hAnsi="Times New Roman" w:cs="Times New Roman"/><w:sz w:val="24"/><w:szCs w:val="24"/></w:rPr></w:rPrDefault></w:docDefaults></w:styles>"#;

fn document_xml(paragraphs: &[Paragraph]) -> String {
    let body: String = paragraphs.iter().map(paragraph_xml).collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr></w:body></w:document>"#,
        body
    )
}

fn write_entries(entries: &[(String, Vec<u8>)], out: &Path) -> Result<(), GenerationError> {
    let mut writer = ZipWriter::new(File::create(out)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(data)?;
    }
    writer.finish()?;
    Ok(())
}

fn write_docx(paragraphs: &[Paragraph], out: &Path) -> Result<(), GenerationError> {
    let entries = vec![
        ("[Content_Types].xml".to_string(), CONTENT_TYPES_XML.as_bytes().to_vec()),
        ("_rels/.rels".to_string(), ROOT_RELS_XML.as_bytes().to_vec()),
        (
            "word/_rels/document.xml.rels".to_string(),
            DOCUMENT_RELS_XML.as_bytes().to_vec(),
        ),
        ("word/styles.xml".to_string(), STYLES_XML.as_bytes().to_vec()),
        (DOCUMENT_XML.to_string(), document_xml(paragraphs).into_bytes()),
    ];
    write_entries(&entries, out)
}

fn read_entries(path: &Path) -> Result<Vec<(String, Vec<u8>)>, GenerationError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        entries.push((entry.name().to_string(), data));
    }
    Ok(entries)
}

/// Value as it goes inside a `<w:t>` run; newlines become line breaks.
fn run_text(value: &str) -> String {
    xml_escape(value).replace('\n', r#"</w:t><w:br/><w:t xml:space="preserve">"#)
}

#[derive(Debug, Default, PartialEq)]
struct Filled {
    xml: String,
    substituted: usize,
    unknown: Vec<String>,
}

fn count_tokens(text: &str, mapping: &[(&'static str, String)]) -> usize {
    mapping.iter().map(|(token, _)| text.matches(token).count()).sum()
}

fn replace_tokens(text: &str, mapping: &[(&'static str, String)]) -> String {
    let mut text = text.to_string();
    for (token, value) in mapping {
        if text.contains(token) {
            text = text.replace(token, &run_text(value));
        }
    }
    text
}

/// Substitutes placeholders paragraph by paragraph.
///
/// Word often splits one `{{TOKEN}}` over several runs. Tokens that sit
/// inside a single run are replaced in place and keep their formatting;
/// when one spans runs, the paragraph's joined text goes into its first
/// run and the other runs are emptied.
fn fill_placeholders(
    xml: &str,
    mapping: &[(&'static str, String)],
) -> Result<Filled, GenerationError> {
    let regex_err = |e: regex::Error| GenerationError::Template(e.to_string());
    let paragraph_re = Regex::new(r"(?s)<w:p[ >].*?</w:p>").map_err(regex_err)?;
    let run_re = Regex::new(r"(?s)(<w:t(?:\s[^>]*)?>)(.*?)</w:t>").map_err(regex_err)?;
    let token_re = Regex::new(r"\{\{[^{}]*\}\}").map_err(regex_err)?;

    let mut filled = Filled::default();
    let xml = paragraph_re.replace_all(xml, |para: &Captures| {
        let para = &para[0];
        let texts: Vec<&str> = run_re
            .captures_iter(para)
            .map(|c| c.get(2).map_or("", |m| m.as_str()))
            .collect();
        let joined = texts.concat();

        for token in token_re.find_iter(&joined) {
            if !mapping.iter().any(|(known, _)| *known == token.as_str()) {
                filled.unknown.push(token.as_str().to_string());
            }
        }
        let total = count_tokens(&joined, mapping);
        if total == 0 {
            return para.to_string();
        }
        filled.substituted += total;

        let within_runs: usize = texts.iter().map(|t| count_tokens(t, mapping)).sum();
        if within_runs == total {
            return run_re
                .replace_all(para, |c: &Captures| {
                    format!("{}{}</w:t>", &c[1], replace_tokens(&c[2], mapping))
                })
                .into_owned();
        }

        let merged = replace_tokens(&joined, mapping);
        let mut first = true;
        run_re
            .replace_all(para, |_: &Captures| {
                if std::mem::take(&mut first) {
                    format!(r#"<w:t xml:space="preserve">{}</w:t>"#, merged)
                } else {
                    "<w:t></w:t>".to_string()
                }
            })
            .into_owned()
    });
    filled.xml = xml.into_owned();
    Ok(filled)
}

/// Fills the template's placeholders into `out`. Returns false, writing
/// nothing, when the template has none of them or carries placeholders
/// this writer does not know.
fn render_template(
    template: &Path,
    mapping: &[(&'static str, String)],
    out: &Path,
) -> Result<bool, GenerationError> {
    let mut entries = read_entries(template)?;
    let Some((_, document)) = entries.iter_mut().find(|(name, _)| name == DOCUMENT_XML) else {
        return Err(GenerationError::Template(format!(
            "{} has no {}",
            template.display(),
            DOCUMENT_XML
        )));
    };

    let xml = String::from_utf8(std::mem::take(document))
        .map_err(|e| GenerationError::Template(e.to_string()))?;
    let filled = fill_placeholders(&xml, mapping)?;
    if !filled.unknown.is_empty() {
        tracing::warn!(
            template = %template.display(),
            placeholders = ?filled.unknown,
            "template has unknown placeholders"
        );
        return Ok(false);
    }
    if filled.substituted == 0 {
        return Ok(false);
    }
    *document = filled.xml.into_bytes();

    write_entries(&entries, out)?;
    Ok(true)
}
