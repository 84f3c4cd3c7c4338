//! Decision frameworks layered on top of the base config
//!
//! A framework is a YAML or markdown file describing who decides what for a
//! team or a meeting. Frameworks are applied in order; later files override
//! participants and extend prompts and rules.

use super::{AgreementRule, ConfigError, ConfigResult, ParticipantConfig};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The merged result of every framework file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Framework {
    /// Concatenated framework text; the framework fingerprint input
    pub text: String,
    /// Participants named by the last framework that named any
    pub participants: Vec<ParticipantConfig>,
    pub custom_prompt: String,
    pub agreement_rules: BTreeMap<String, AgreementRule>,
}

impl Framework {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrameworkFile {
    participants: Vec<ParticipantConfig>,
    custom_prompt: String,
    agreement_rules: BTreeMap<String, AgreementRule>,
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn append(target: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push_str("\n\n");
    }
    target.push_str(text);
}

/// Read and merge framework files in order. Missing files are skipped.
pub fn merge_frameworks(paths: &[PathBuf]) -> ConfigResult<Framework> {
    let mut framework = Framework::default();

    for path in paths {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Framework file not found, skipping");
            continue;
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let section = format!("# Framework: {}\n{}", name, content);
        append(&mut framework.text, &section);

        let parsed = if is_yaml(path) {
            match serde_yaml::from_str::<Option<FrameworkFile>>(&content) {
                Ok(file) => Some(file.unwrap_or_default()),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Framework is not valid YAML, reading as markdown");
                    None
                }
            }
        } else {
            None
        };

        match parsed {
            Some(file) => {
                if !file.participants.is_empty() {
                    framework.participants = file.participants;
                }
                append(&mut framework.custom_prompt, &file.custom_prompt);
                framework.agreement_rules.extend(file.agreement_rules);
            }
            None => {
                let participants = markdown_participants(&content);
                if !participants.is_empty() {
                    framework.participants = participants;
                }
                append(&mut framework.custom_prompt, &section);
            }
        }
        tracing::debug!(path = %path.display(), "Applied framework");
    }

    Ok(framework)
}

/// Participants from the table under a `## Participants` heading.
///
/// The first column is the name and the second the role; the header row is
/// skipped and emphasis markers disappear with the markdown parse.
pub fn markdown_participants(content: &str) -> Vec<ParticipantConfig> {
    let parser = Parser::new_ext(content, Options::ENABLE_TABLES);

    let mut participants = Vec::new();
    let mut in_section = false;
    let mut heading: Option<(u8, String)> = None;
    let mut in_head = false;
    let mut row: Vec<String> = Vec::new();
    let mut cell: Option<String> = None;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                heading = Some((level as u8, String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = heading.take() {
                    if level <= 2 {
                        if in_section {
                            break;
                        }
                        in_section =
                            level == 2 && text.trim().to_lowercase().starts_with("participant");
                    }
                }
            }
            Event::Start(Tag::TableHead) => in_head = true,
            Event::End(TagEnd::TableHead) => {
                in_head = false;
                row.clear();
            }
            Event::Start(Tag::TableCell) => cell = Some(String::new()),
            Event::End(TagEnd::TableCell) => {
                if let Some(text) = cell.take() {
                    row.push(text.trim().to_string());
                }
            }
            Event::End(TagEnd::TableRow) => {
                let cells = std::mem::take(&mut row);
                if !in_section || in_head {
                    continue;
                }
                let Some(name) = cells.first().filter(|n| !n.is_empty()) else {
                    continue;
                };
                if name.eq_ignore_ascii_case("name") {
                    continue;
                }
                let role = cells.get(1).cloned().unwrap_or_default();
                participants.push(ParticipantConfig::named(name.as_str()).with_role(role));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buf)) = heading.as_mut() {
                    buf.push_str(&text);
                } else if let Some(buf) = cell.as_mut() {
                    buf.push_str(&text);
                }
            }
            _ => {}
        }
    }

    participants
}
