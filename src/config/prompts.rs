//! Prompt templates for Podwise.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub extraction: ExtractionPrompts,
    pub synthesis: SynthesisPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompt for extracting structured insights from a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionPrompts {
    pub user: String,
}

impl Default for ExtractionPrompts {
    fn default() -> Self {
        Self {
            user: r#"You are an expert podcast analyst. Your task is to extract structured insights from a podcast transcript.

<podcast_info>
Podcast: {{podcast_name}}
Episode: {{episode_title}}
Host: {{host}}
Duration: {{duration}}
</podcast_info>

<transcript>
{{transcript}}
</transcript>

Analyze this transcript and extract the following information. Return your response as a JSON object with these exact keys:

{
  "tldr": "A 2-3 sentence summary capturing the main topic and key conclusion. What would you tell someone who asks 'what was this episode about?'",

  "who_should_listen": "One sentence describing the ideal audience. Example: 'Anyone interested in AI safety' or 'Founders raising their first round'",

  "key_insights": [
    "3-7 key insights or 'aha moments' from the episode. Novel ideas, counterintuitive findings, or things that shift thinking."
  ],

  "frameworks": [
    {
      "name": "Name of the framework, model, or concept",
      "description": "Brief explanation of how it works"
    }
  ],

  "soundbites": [
    {
      "quote": "A memorable, quotable statement from the episode (2-4 sentences max)",
      "speaker": "Name of who said it"
    }
  ],

  "takeaways": [
    "Actionable items the listener can actually DO after listening. Be specific and practical."
  ],

  "references": {
    "books": ["Book Title by Author"],
    "people": ["Person Name - brief context of why mentioned"],
    "tools": ["Tool/Product Name - what it does"],
    "links": ["Any URLs or resources mentioned"]
  },

  "categories": ["Select 1-3 from: Tech, Finance, News, Health, Humor, Science, Business, Relationships. You may add ONE new category if none fit well."]
}

Important guidelines:
- Extract 2-7 soundbites that are memorable and quotable
- For frameworks, only include explicitly named concepts or models discussed
- Be specific in takeaways - avoid generic advice
- If no books/people/tools were mentioned, use empty arrays
- Keep the tldr concise but informative
- Categories should reflect the PRIMARY topics, not tangential mentions

Return ONLY the JSON object, no additional text."#
                .to_string(),
        }
    }
}

/// Prompt for merging chunk-level summaries into a single summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisPrompts {
    pub user: String,
}

impl Default for SynthesisPrompts {
    fn default() -> Self {
        Self {
            user: r#"You are synthesizing summaries from a long podcast episode that was processed in chunks.

<podcast_info>
Podcast: {{podcast_name}}
Episode: {{episode_title}}
</podcast_info>

Here are the summaries from each chunk:

{{chunk_summaries}}

Synthesize these into a single cohesive summary. Combine insights, remove duplicates, and create a unified view.

Return a JSON object with these keys:
{
  "tldr": "2-3 sentence overall summary",
  "who_should_listen": "One sentence on ideal audience",
  "key_insights": ["Combined list of unique insights, max 7"],
  "frameworks": [{"name": "...", "description": "..."}],
  "soundbites": [{"quote": "...", "speaker": "..."}],
  "takeaways": ["Combined actionable items"],
  "references": {"books": [], "people": [], "tools": [], "links": []},
  "categories": ["1-3 categories"]
}

Return ONLY the JSON object."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let extraction_path = custom_path.join("extraction.toml");
            if extraction_path.exists() {
                let content = std::fs::read_to_string(&extraction_path)?;
                prompts.extraction = toml::from_str(&content)?;
            }

            let synthesis_path = custom_path.join("synthesis.toml");
            if synthesis_path.exists() {
                let content = std::fs::read_to_string(&synthesis_path)?;
                prompts.synthesis = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
