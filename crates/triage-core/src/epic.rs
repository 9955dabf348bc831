//! Epic generation: turns requirement mails into Markdown epic documents.
//!
//! The system message combines the base triage rules and the email-format
//! rules (both loaded from the rules directory) with any project-specific
//! extension rules. The user prompt differs depending on whether an epic
//! already exists for the project: creation produces a fresh document,
//! update merges new requirements into the existing one.

use crate::error::LlmError;
use crate::llm::{GenerationRequest, LlmClient};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const BASE_RULES_FILE: &str = "challenge-requirements.md";
const EMAIL_FORMAT_RULES_FILE: &str = "email-format.md";

const FALLBACK_BASE_RULES: &str = "You are a senior product owner. Translate the provided \
     requirements into a well-structured Markdown epic document.";

/// Everything the generator needs for one fold step.
#[derive(Debug, Clone, Default)]
pub struct EpicRequest {
    pub project_name: String,
    pub requirements_body: String,
    /// Current epic content, if the project already has one.
    pub existing_epic: Option<String>,
    /// Project-specific rule overrides appended to the system message.
    pub extension_rules: Option<String>,
    pub title: Option<String>,
    pub idea: Option<String>,
    pub envs: Option<String>,
    pub directives: Option<String>,
}

/// Epic generation seam; the processor only depends on this.
#[async_trait]
pub trait EpicBuilder: Send + Sync {
    /// Produce the complete Markdown epic for one request.
    async fn build(&self, request: &EpicRequest) -> Result<String, LlmError>;
}

/// Compose the system message from the rules files plus extension rules.
fn build_system_message(rules_dir: &Path, extension_rules: Option<&str>) -> String {
    let base = match std::fs::read_to_string(rules_dir.join(BASE_RULES_FILE)) {
        Ok(text) => text,
        Err(_) => {
            tracing::warn!(path = %rules_dir.join(BASE_RULES_FILE).display(), "rules.file_not_found");
            FALLBACK_BASE_RULES.to_string()
        }
    };

    let mut parts = vec![base];

    match std::fs::read_to_string(rules_dir.join(EMAIL_FORMAT_RULES_FILE)) {
        Ok(email_format) if !email_format.is_empty() => {
            parts.push(format!(
                "## Email Format Rules\n\n\
                 The following rules define the structured email format that was \
                 used to send the requirements. Use them to correctly interpret \
                 each section of the incoming email:\n\n{email_format}"
            ));
        }
        Ok(_) => {}
        Err(_) => {
            tracing::warn!(
                path = %rules_dir.join(EMAIL_FORMAT_RULES_FILE).display(),
                "rules.email_format_file_not_found"
            );
        }
    }

    if let Some(rules) = extension_rules {
        parts.push(format!(
            "## Project-Specific Extension Rules\n\n\
             The following project-specific rules take precedence over the \
             general rules above:\n\n{rules}"
        ));
    }

    parts.join("\n\n")
}

/// User prompt for creating a new epic. Structured sections from the mail
/// are labelled; the raw body stands in when no `[idea]` section exists.
fn build_creation_prompt(request: &EpicRequest) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(title) = &request.title {
        sections.push(format!("### Project Title\n\n{title}"));
    }

    match &request.idea {
        Some(idea) => sections.push(format!("### Idea / Concept\n\n{idea}")),
        None => sections.push(format!("### Requirements\n\n{}", request.requirements_body)),
    }

    if let Some(envs) = &request.envs {
        sections.push(format!(
            "### Environment Variables\n\n\
             Translate these into a `.env`-equivalent section in the epic \
             (the scrum-master agent will later generate the actual `.env` file):\n\n{envs}"
        ));
    }

    if let Some(directives) = &request.directives {
        sections.push(format!(
            "### Technical Directives\n\n\
             These instructions must be reflected in the epic's technical sections \
             (dependencies, frameworks, architectural patterns, coding standards, \
             tools, etc.):\n\n{directives}"
        ));
    }

    let structured_block = sections.join("\n\n");

    format!(
        "# Requirements email for project: {}\n\n\
         {structured_block}\n\n\
         ---\n\n\
         Please analyse the requirements above and produce a comprehensive, \
         well-structured Markdown epic document for the development team.\n\n\
         The epic must include at minimum:\n\
         - Project title and executive summary\n\
         - Goals and success criteria\n\
         - Key features / functional requirements\n\
         - Non-functional requirements (performance, security, scalability)\n\
         - Environment variables section (if [envs] was provided)\n\
         - Technical stack and directives section (if [directives] was provided)\n\
         - Out-of-scope items\n\
         - Open questions / assumptions\n\
         - A Mermaid architecture or flow diagram if appropriate\n\n\
         Use proper Markdown headings (##, ###), bullet lists, and tables \
         where they improve readability.",
        request.project_name
    )
}

/// User prompt for merging new requirements into an existing epic.
fn build_update_prompt(request: &EpicRequest, existing_epic: &str) -> String {
    let mut sections: Vec<String> = Vec::new();
    if let Some(title) = &request.title {
        sections.push(format!("### Project Title\n\n{title}"));
    }
    match &request.idea {
        Some(idea) => sections.push(format!("### Idea / Concept Update\n\n{idea}")),
        None => sections.push(format!(
            "### New Requirements\n\n{}",
            request.requirements_body
        )),
    }
    if let Some(envs) = &request.envs {
        sections.push(format!("### Environment Variables\n\n{envs}"));
    }
    if let Some(directives) = &request.directives {
        sections.push(format!("### Technical Directives\n\n{directives}"));
    }
    let new_block = sections.join("\n\n");

    format!(
        "# Update request for project: {}\n\n\
         ## Existing epic\n\n\
         {existing_epic}\n\n\
         ---\n\n\
         ## New requirements / changes received via email\n\n\
         {new_block}\n\n\
         ---\n\n\
         Please merge the new requirements into the existing epic.\n\
         - Preserve all existing content that is not superseded.\n\
         - Add new sections or extend existing ones as needed.\n\
         - Update the \"Last Updated\" date at the top.\n\
         - If requirements conflict with existing content, prefer the new ones \
         and add a note explaining what changed.\n\
         - Return the *complete* updated epic as a Markdown document.",
        request.project_name
    )
}

/// LLM-backed epic generator over the guarded client facade.
pub struct EpicGenerator {
    client: LlmClient,
    rules_dir: PathBuf,
}

impl EpicGenerator {
    pub fn new(client: LlmClient, rules_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            rules_dir: rules_dir.into(),
        }
    }
}

#[async_trait]
impl EpicBuilder for EpicGenerator {
    async fn build(&self, request: &EpicRequest) -> Result<String, LlmError> {
        let system_message =
            build_system_message(&self.rules_dir, request.extension_rules.as_deref());

        let user_prompt = match &request.existing_epic {
            Some(existing) => {
                tracing::info!(
                    project = %request.project_name,
                    existing_length = existing.len(),
                    new_requirements_length = request.requirements_body.len(),
                    "epic.updating"
                );
                build_update_prompt(request, existing)
            }
            None => {
                tracing::info!(
                    project = %request.project_name,
                    requirements_length = request.requirements_body.len(),
                    "epic.creating"
                );
                build_creation_prompt(request)
            }
        };

        self.client
            .generate(&GenerationRequest::new(system_message, user_prompt))
            .await
    }
}
