//! Directive table and rendering
//!
//! Directives are structured values (persona, task, ordered sections, sampling
//! parameters) loaded once at startup. [`Directive::render`] is the single place
//! where a directive becomes prompt text for the generation backend.
//!
//! # Table format
//! ```toml
//! [[shared_article_sections]]   # prepended to every archetype
//! title = "..."
//! rules = ["..."]
//!
//! [archetypes.review]           # review | tutorial | general (all required)
//! persona = "..."
//! task = "... {input} ..."
//! user_prompt = "... {input} ..."
//!
//! [platforms.xhs]               # xhs | douyin | wechat | linkedin (optional)
//! [rewrite]                     # required
//! ```

use crate::error::PipelineError;
use crate::types::{Archetype, Platform, RenderedPrompt};
use scribe_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Directive table shipped with the crate
pub const BUNDLED_DIRECTIVES: &str = include_str!("../../directives.toml");

/// Substituted with the topic or block content during rendering
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// One titled group of rules, optionally followed by an output template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveSection {
    pub title: String,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub template: Option<String>,
}

/// Structured instruction set for one archetype, platform or the rewrite flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    /// Role the backend plays
    pub persona: String,
    /// One-line task statement
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub sections: Vec<DirectiveSection>,
    /// User-level instruction
    #[serde(default = "default_user_prompt")]
    pub user_prompt: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_user_prompt() -> String {
    INPUT_PLACEHOLDER.to_string()
}

impl Directive {
    /// Render into a system/user prompt pair for `input`
    pub fn render(&self, input: &str) -> RenderedPrompt {
        let fill = |text: &str| text.replace(INPUT_PLACEHOLDER, input);

        let mut system = fill(self.persona.trim());

        if let Some(task) = &self.task {
            system.push_str("\n\n任务：");
            system.push_str(&fill(task.trim()));
        }

        for section in &self.sections {
            system.push_str("\n\n【");
            system.push_str(&fill(section.title.trim()));
            system.push_str("】：");
            for (n, rule) in section.rules.iter().enumerate() {
                system.push_str(&format!("\n{}. {}", n + 1, fill(rule.trim())));
            }
            if let Some(template) = &section.template {
                system.push('\n');
                system.push_str(&fill(template.trim()));
            }
        }

        RenderedPrompt {
            system,
            user: fill(&self.user_prompt),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Directive lookup key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKey {
    Archetype(Archetype),
    Platform(Platform),
    Rewrite,
}

/// On-disk table layout
#[derive(Debug, Deserialize)]
struct DirectiveFile {
    #[serde(default)]
    shared_article_sections: Vec<DirectiveSection>,
    #[serde(default)]
    archetypes: HashMap<String, Directive>,
    #[serde(default)]
    platforms: HashMap<String, Directive>,
    rewrite: Directive,
}

/// Read-only directive table
#[derive(Debug, Clone)]
pub struct DirectiveTable {
    archetypes: HashMap<Archetype, Arc<Directive>>,
    platforms: HashMap<Platform, Arc<Directive>>,
    rewrite: Arc<Directive>,
}

impl DirectiveTable {
    /// Table shipped with the crate
    pub fn bundled() -> Result<Self> {
        Self::from_toml_str(BUNDLED_DIRECTIVES)
    }

    /// Load an operator-supplied table
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read directives {} failed: {}", path.display(), e))
        })?;
        let table = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            platforms = table.platforms.len(),
            "Loaded directive table"
        );
        Ok(table)
    }

    /// Parse and validate a table
    ///
    /// Every archetype and the rewrite directive must be present. Platform entries
    /// are optional; unknown archetype or platform names are rejected.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: DirectiveFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse directives failed: {}", e)))?;

        let mut raw_archetypes = file.archetypes;
        let mut archetypes = HashMap::new();
        for archetype in Archetype::ALL {
            let mut directive = raw_archetypes.remove(archetype.as_str()).ok_or_else(|| {
                Error::Config(format!("Directive for archetype '{}' missing", archetype))
            })?;
            let mut sections = file.shared_article_sections.clone();
            sections.append(&mut directive.sections);
            directive.sections = sections;
            archetypes.insert(archetype, Arc::new(directive));
        }
        if let Some(unknown) = raw_archetypes.keys().next() {
            return Err(Error::Config(format!("Unknown archetype '{}'", unknown)));
        }

        let mut platforms = HashMap::new();
        for (name, directive) in file.platforms {
            let platform: Platform = name
                .parse()
                .map_err(|e| Error::Config(format!("Directive table: {}", e)))?;
            platforms.insert(platform, Arc::new(directive));
        }

        Ok(Self {
            archetypes,
            platforms,
            rewrite: Arc::new(file.rewrite),
        })
    }

    /// Look up a directive
    ///
    /// # Errors
    /// `UnknownKey` when the table has no entry (only reachable for platforms)
    pub fn select(&self, key: DirectiveKey) -> std::result::Result<Arc<Directive>, PipelineError> {
        let found = match key {
            DirectiveKey::Archetype(archetype) => self.archetypes.get(&archetype),
            DirectiveKey::Platform(platform) => self.platforms.get(&platform),
            DirectiveKey::Rewrite => Some(&self.rewrite),
        };
        found.cloned().ok_or_else(|| {
            let name = match key {
                DirectiveKey::Archetype(archetype) => archetype.to_string(),
                DirectiveKey::Platform(platform) => platform.to_string(),
                DirectiveKey::Rewrite => "rewrite".to_string(),
            };
            PipelineError::UnknownKey(name)
        })
    }

    /// Platforms that have a directive
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.platforms.keys().copied().collect();
        platforms.sort();
        platforms
    }
}
