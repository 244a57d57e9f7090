use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::models::{CandidateProfile, JobPosting, ResumeCategory};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
const LETTER_MAX_TOKENS: u32 = 900;

// --- Provider trait ---

/// A text-completion backend. `system` frames the writer, `prompt` carries the task.
pub trait AIProvider {
    fn complete(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    ClaudeCli,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
}

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    let (provider, model_id) = match name {
        "gpt-4o" => (ProviderKind::OpenAI, "gpt-4o"),
        "gpt-4o-mini" => (ProviderKind::OpenAI, "gpt-4o-mini"),
        "gpt-5-mini" => (ProviderKind::OpenAI, "gpt-5-mini"),
        "gpt-5.2" | "gpt5" => (ProviderKind::OpenAI, "gpt-5.2"),
        "api-sonnet" => (ProviderKind::Anthropic, "claude-sonnet-4-5-20250929"),
        "api-haiku" => (ProviderKind::Anthropic, "claude-haiku-4-5-20251001"),
        "claude-sonnet" | "sonnet" => (ProviderKind::ClaudeCli, "claude-sonnet-4-5-20250929"),
        "claude-haiku" | "haiku" => (ProviderKind::ClaudeCli, "claude-haiku-4-5-20251001"),
        _ => {
            return Err(anyhow!(
                "Unknown model '{}'. Available: gpt-4o (default), gpt-4o-mini, gpt-5-mini, \
                 gpt-5.2, api-sonnet, api-haiku, claude-sonnet, claude-haiku",
                name
            ));
        }
    };
    Ok(ModelSpec {
        provider,
        model_id: model_id.to_string(),
    })
}

pub fn create_provider(spec: &ModelSpec) -> Result<Box<dyn AIProvider>> {
    Ok(match spec.provider {
        ProviderKind::OpenAI => Box::new(OpenAIProvider::new(spec.model_id.clone())?),
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(spec.model_id.clone())?),
        ProviderKind::ClaudeCli => Box::new(ClaudeCliProvider::new(spec.model_id.clone())?),
    })
}

fn http_client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

fn ensure_success(
    response: reqwest::blocking::Response,
    api: &str,
) -> Result<reqwest::blocking::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().unwrap_or_default();
    Err(anyhow!("{} request failed with status {}: {}", api, status, body))
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    max_completion_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl OpenAIProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set")?;
        Ok(Self {
            api_key,
            model_id,
            client: http_client()?,
        })
    }
}

impl AIProvider for OpenAIProvider {
    fn complete(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model_id.clone(),
            max_completion_tokens: max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("Failed to send request to OpenAI API")?;

        let parsed: OpenAIResponse = ensure_success(response, "OpenAI API")?
            .json()
            .context("Failed to parse OpenAI API response")?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No content in OpenAI API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Anthropic provider ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

pub struct AnthropicProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set")?;
        Ok(Self {
            api_key,
            model_id,
            client: http_client()?,
        })
    }
}

impl AIProvider for AnthropicProvider {
    fn complete(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model_id.clone(),
            max_tokens,
            system: system.to_string(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .context("Failed to send request to Anthropic API")?;

        let parsed: AnthropicResponse = ensure_success(response, "Anthropic API")?
            .json()
            .context("Failed to parse Anthropic API response")?;

        let text: String = parsed.content.into_iter().map(|b| b.text).collect();
        if text.trim().is_empty() {
            return Err(anyhow!("No content in Anthropic API response"));
        }
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- `claude` CLI provider ---

pub struct ClaudeCliProvider {
    model_id: String,
}

impl ClaudeCliProvider {
    pub fn new(model_id: String) -> Result<Self> {
        std::process::Command::new("claude")
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .context("'claude' CLI not found on PATH")?;
        Ok(Self { model_id })
    }
}

impl AIProvider for ClaudeCliProvider {
    fn complete(&self, system: &str, prompt: &str, _max_tokens: u32) -> Result<String> {
        let output = std::process::Command::new("claude")
            .arg("-p")
            .arg(prompt)
            .arg("--append-system-prompt")
            .arg(system)
            .arg("--model")
            .arg(&self.model_id)
            .output()
            .context("Failed to run 'claude' CLI")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("claude CLI failed: {}", stderr));
        }

        let response =
            String::from_utf8(output.stdout).context("Invalid UTF-8 in claude CLI output")?;
        if response.trim().is_empty() {
            return Err(anyhow!("Empty response from claude CLI"));
        }
        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Cover letter body ---

const LETTER_SYSTEM_PROMPT: &str = "You are an expert career writer. \
    Write a tailored cover-letter BODY that reads like a human wrote it carefully. \
    Follow the user's tone and structure instructions exactly.";

const DEFAULT_TONE: &str = "Professional, confident, warm, and specific. \
    No generic filler. 3-5 short paragraphs. \
    Include 1-2 concrete achievements that match the job. Use first person. \
    Do not include placeholders like [Company] or [Hiring Manager]. \
    Do not repeat the header/address. \
    End the body right before 'Sincerely' (do NOT write 'Sincerely').";

pub fn category_guidance(category: ResumeCategory) -> &'static str {
    match category {
        ResumeCategory::Data => {
            "Highlight strengths in data analysis, Python, SQL, dashboards, \
             automation, statistical modeling, and applied ML."
        }
        ResumeCategory::Research => {
            "Highlight strengths in academic research, experimental design, \
             technical writing, scientific programming, and interdisciplinary work."
        }
        ResumeCategory::Associate => {
            "Highlight strengths in operations, coordination, project management, \
             stakeholder communication, process improvement, and documentation."
        }
    }
}

pub fn letter_prompt(
    job: &JobPosting,
    category: ResumeCategory,
    profile: &CandidateProfile,
    tone: Option<&str>,
) -> String {
    format!(
        "Write the cover letter body for this application.\n\n\
        Candidate:\n\
        - Name: {name}\n\
        - Background focus: {category}\n\
        - Guidance: {guidance}\n\n\
        Job:\n\
        - Title: {title}\n\
        - Job ID: {id}\n\
        - Department/Unit: {dept}\n\
        - Description:\n{description}\n\n\
        Tone + structure instructions:\n{tone}",
        name = profile.full_name(),
        guidance = category_guidance(category),
        title = job.title,
        id = job.job_id,
        dept = job.department,
        description = job.description,
        tone = tone.unwrap_or(DEFAULT_TONE),
    )
}

pub fn cover_letter_body(
    provider: &dyn AIProvider,
    job: &JobPosting,
    category: ResumeCategory,
    profile: &CandidateProfile,
) -> Result<String> {
    let prompt = letter_prompt(job, category, profile, None);
    let body = provider.complete(LETTER_SYSTEM_PROMPT, &prompt, LETTER_MAX_TOKENS)?;
    Ok(body.trim().to_string())
}
