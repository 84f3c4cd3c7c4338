//! Prompt text sent to text-generation backends

use crate::config::TrackerConfig;

/// Characters of transcript sampled for participant detection.
pub const DETECTION_SAMPLE_CHARS: usize = 4000;

const DETECTION_PROMPT: &str = r#"Analyze this transcript and identify decision-makers.

Return ONLY a JSON object with this structure:
{
  "participants": [
    {"name": "FirstName", "role": "inferred role if mentioned"}
  ],
  "reasoning": "Brief explanation of how you identified these participants"
}

Rules:
- Include only people who are ACTIVELY participating in decision-making discussions
- Use first names only
- If a role is mentioned or can be inferred (CEO, CTO, PM, etc.), include it
- Do not include people who are only mentioned but not present
- If speaker names are labeled in the transcript (e.g. "Ryan:" or "[Ryan]"), use those
- If no clear names, return {"participants": [], "reasoning": "No named participants detected"}

Transcript:
"#;

/// The config-derived parts of the extraction prompt.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    categories: String,
    types: String,
    requirements: String,
    agreement_rules: String,
    custom_prompt: String,
}

impl PromptBuilder {
    pub fn new(config: &TrackerConfig) -> Self {
        let categories = config
            .categories
            .iter()
            .map(|c| format!("- **{}**: {}", c.name, c.description))
            .collect::<Vec<_>>()
            .join("\n");

        let types = config
            .types
            .iter()
            .map(|t| format!("- **{}**: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n");

        let requirements = config
            .participants
            .iter()
            .filter(|p| !p.required_for.is_empty())
            .map(|p| {
                let who = if p.role.is_empty() {
                    p.name.clone()
                } else {
                    format!("{} ({})", p.name, p.role)
                };
                format!("- {} must agree on: {}", who, p.required_for.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut rules = Vec::new();
        for (key, rule) in &config.agreement_rules {
            if !rule.requires_all.is_empty() {
                rules.push(format!(
                    "- **{}**: Requires agreement from ALL of: {}",
                    key,
                    rule.requires_all.join(", ")
                ));
            }
            if !rule.requires_any.is_empty() {
                rules.push(format!(
                    "- **{}**: Requires agreement from AT LEAST ONE of: {}",
                    key,
                    rule.requires_any.join(", ")
                ));
            }
        }
        let agreement_rules = if rules.is_empty() {
            "Standard agreement rules apply.".to_string()
        } else {
            rules.join("\n")
        };

        Self {
            categories,
            types,
            requirements,
            agreement_rules,
            custom_prompt: config.custom_prompt.clone(),
        }
    }

    /// Full extraction prompt for one transcript.
    pub fn extraction(&self, transcript: &str, participants: &[String]) -> String {
        let example_agreements = participants
            .iter()
            .map(|n| format!("\"{}\": \"Yes\"", n))
            .collect::<Vec<_>>()
            .join(", ");

        let mut prompt = format!(
            "You are extracting decisions from a meeting transcript.\n\n\
             ## Participants\n{participants}\n\n\
             ## Categories\n{categories}\n\n\
             ## Decision Types\n\
             Agreement rules and required approvers are keyed on these types or on categories.\n\
             {types}\n\n\
             ## Agreement Rules\n{rules}\n{requirements}\n\n\
             ## Output\n\
             Return ONLY a JSON object:\n\
             {{\"decisions\": [{{\"category\": \"...\", \"significance\": 1, \
             \"status\": \"Agreed | Needs Clarification | Unresolved\", \
             \"title\": \"...\", \"description\": \"...\", \"decision\": \"...\", \
             \"agreements\": {{{example}}}, \"notes\": \"\", \"meeting_date\": \"\"}}], \
             \"participants_detected\": [\"...\"]}}\n\n\
             Significance runs from 1 (critical) to 5 (everyone already on the same page).\n\
             Agreement values are \"Yes\", \"Partial\", \"No\" or \"Not Present\".\n",
            participants = participants.join(", "),
            categories = self.categories,
            types = self.types,
            requirements = self.requirements,
            rules = self.agreement_rules,
            example = example_agreements,
        );

        if !self.custom_prompt.is_empty() {
            prompt.push_str("\n## Additional Instructions\n");
            prompt.push_str(&self.custom_prompt);
            prompt.push('\n');
        }

        prompt.push_str("\n## Transcript\n");
        prompt.push_str(transcript);
        prompt
    }
}

/// Participant detection prompt over the start of the transcript.
pub fn detection(transcript: &str) -> String {
    let sample: String = transcript.chars().take(DETECTION_SAMPLE_CHARS).collect();
    format!("{}{}\n\nJSON response:", DETECTION_PROMPT, sample)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgreementRule;

    #[test]
    fn extraction_prompt_names_everything() {
        let mut config = TrackerConfig::default();
        config.custom_prompt = "Ignore small talk.".to_string();
        config.agreement_rules.insert(
            "Pricing".to_string(),
            AgreementRule {
                requires_all: vec!["Ajit".into()],
                ..Default::default()
            },
        );

        let prompt = PromptBuilder::new(&config)
            .extraction("Ryan: let's ship it", &["Ryan".to_string(), "Ajit".to_string()]);

        assert!(prompt.contains("Ryan, Ajit"));
        assert!(prompt.contains("- **Security**"));
        assert!(prompt.contains("Requires agreement from ALL of: Ajit"));
        assert!(prompt.contains("\"Ajit\": \"Yes\""));
        assert!(prompt.contains("Ignore small talk."));
        assert!(prompt.ends_with("Ryan: let's ship it"));
    }

    #[test]
    fn types_and_required_approvers_are_listed() {
        let prompt = PromptBuilder::new(&TrackerConfig::default()).extraction("", &[]);
        assert!(prompt.contains("## Decision Types"));
        assert!(prompt.contains("- **Compliance**: SOC 2"));
        assert!(prompt.contains("- Milkana (Product Manager) must agree on: GTM, Marketing"));
        assert!(prompt.contains("- **Tech**: Requires agreement from ALL of: Ryan, Ajit"));
    }

    #[test]
    fn default_rules_placeholder() {
        let mut config = TrackerConfig::default();
        config.agreement_rules.clear();
        let prompt = PromptBuilder::new(&config).extraction("", &[]);
        assert!(prompt.contains("Standard agreement rules apply."));
        assert!(!prompt.contains("Additional Instructions"));
    }

    #[test]
    fn detection_samples_the_start() {
        let transcript = "~".repeat(DETECTION_SAMPLE_CHARS + 500);
        let prompt = detection(&transcript);
        assert_eq!(prompt.matches('~').count(), DETECTION_SAMPLE_CHARS);
    }
}
