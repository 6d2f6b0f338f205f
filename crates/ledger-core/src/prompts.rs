//! Prompt library for analysis requests
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/ledger/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Each prompt file starts with YAML frontmatter followed by `# System` and
//! `# User` sections. The user section supports `{{var}}` substitution and
//! `{{#if var}}...{{/if}}` blocks that are dropped when `var` is empty.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::AnalysisType;

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const SPENDING_PATTERNS: &str = include_str!("../../../prompts/spending_patterns.md");
    pub const MONTHLY_REPORT: &str = include_str!("../../../prompts/monthly_report.md");
    pub const BUDGET_OPTIMIZATION: &str = include_str!("../../../prompts/budget_optimization.md");
}

/// Known prompt IDs, one per analysis type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    SpendingPatterns,
    MonthlyReport,
    BudgetOptimization,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpendingPatterns => "spending_patterns",
            Self::MonthlyReport => "monthly_report",
            Self::BudgetOptimization => "budget_optimization",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[
            Self::SpendingPatterns,
            Self::MonthlyReport,
            Self::BudgetOptimization,
        ]
    }

    /// The prompt used for an analysis type
    pub fn for_analysis(analysis_type: AnalysisType) -> Self {
        match analysis_type {
            AnalysisType::Pattern => Self::SpendingPatterns,
            AnalysisType::Report => Self::MonthlyReport,
            AnalysisType::Optimization => Self::BudgetOptimization,
        }
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::SpendingPatterns => defaults::SPENDING_PATTERNS,
            Self::MonthlyReport => defaults::MONTHLY_REPORT,
            Self::BudgetOptimization => defaults::BUDGET_OPTIMIZATION,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    pub version: u32,
    /// Analysis type this prompt serves (pattern, report, optimization)
    pub analysis_type: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// Body after the frontmatter (system + user sections)
    pub content: String,
    pub is_override: bool,
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the user section (or the whole body if it has none)
    pub fn render_user(&self, vars: &HashMap<&str, String>) -> String {
        let template = self.user_section().unwrap_or(&self.content);
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        resolve_conditionals(&result, vars)
    }
}

/// Prompt library with lazy loading and caching
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a prompt library with the default override directory
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Embedded prompts only, no override lookup
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("prompt {}", id.as_str())))
    }

    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.md", id.as_str()));
            if path.exists() {
                let content = fs::read_to_string(&path).map_err(|e| {
                    Error::InvalidData(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                return Ok(Prompt {
                    metadata,
                    content: body,
                    is_override: true,
                });
            }
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
        })
    }

    /// Forget loaded prompts so edited overrides are picked up
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("ledger").join("prompts").join("overrides"))
}

/// Split a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();
    let rest = content.strip_prefix("---").ok_or_else(|| {
        Error::InvalidData("Prompt must start with YAML frontmatter (---)".into())
    })?;

    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let metadata: PromptMetadata = serde_yaml::from_str(rest[..end].trim())
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, rest[end + 3..].trim().to_string()))
}

fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];
    let end = after_header.find("\n# ").unwrap_or(after_header.len());
    Some(after_header[..end].trim())
}

/// Keep `{{#if var}}` blocks whose variable is non-empty, drop the rest
fn resolve_conditionals(content: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = content.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_start = if_start + 6;
        let Some(var_len) = result[var_start..].find("}}") else {
            break;
        };
        let block_start = var_start + var_len + 2;
        let Some(block_len) = result[block_start..].find("{{/if}}") else {
            break;
        };

        let var_name = result[var_start..var_start + var_len].trim();
        let block = &result[block_start..block_start + block_len];
        let keep = vars.get(var_name).is_some_and(|v| !v.is_empty());
        let tail = &result[block_start + block_len + 7..];

        result = if keep {
            format!("{}{}{}", &result[..if_start], block, tail)
        } else {
            format!("{}{}", &result[..if_start], tail)
        };
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt() {
        let content = r#"---
id: test_prompt
version: 2
analysis_type: pattern
---

# System
Be brief.

# User
Total: {{total_amount}}
"#;

        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 2);
        assert_eq!(metadata.analysis_type, "pattern");
        assert_eq!(extract_section(&body, "# System"), Some("Be brief."));
    }

    #[test]
    fn test_missing_frontmatter_rejected() {
        assert!(parse_prompt("# User\nhello").is_err());
        assert!(parse_prompt("---\nid: x\n# User").is_err());
    }

    #[test]
    fn test_conditional_blocks() {
        let content = "Start{{#if previous_total}}\nLast month: 10{{/if}}\nEnd";

        let mut vars = HashMap::new();
        vars.insert("previous_total", "10".to_string());
        let kept = resolve_conditionals(content, &vars);
        assert!(kept.contains("Last month: 10"));
        assert!(!kept.contains("{{"));

        vars.insert("previous_total", String::new());
        let dropped = resolve_conditionals(content, &vars);
        assert!(!dropped.contains("Last month"));
        assert!(dropped.contains("Start"));
        assert!(dropped.contains("End"));
    }

    #[test]
    fn test_default_prompts_parse_and_match_ids() {
        for id in PromptId::all() {
            let (metadata, body) = parse_prompt(id.default_content()).unwrap();
            assert_eq!(metadata.id, id.as_str());
            assert!(extract_section(&body, "# User").is_some());
        }
    }

    #[test]
    fn test_prompt_ids_cover_analysis_types() {
        for (analysis_type, expected) in [
            (AnalysisType::Pattern, "pattern"),
            (AnalysisType::Report, "report"),
            (AnalysisType::Optimization, "optimization"),
        ] {
            let id = PromptId::for_analysis(analysis_type);
            let (metadata, _) = parse_prompt(id.default_content()).unwrap();
            assert_eq!(metadata.analysis_type, expected);
        }
    }

    #[test]
    fn test_override_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("monthly_report.md"),
            "---\nid: monthly_report\nversion: 9\nanalysis_type: report\n---\n# User\nCustom {{total_amount}}",
        )
        .unwrap();

        let mut lib = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        let prompt = lib.get(PromptId::MonthlyReport).unwrap();
        assert!(prompt.is_override);
        assert_eq!(prompt.metadata.version, 9);

        let mut vars = HashMap::new();
        vars.insert("total_amount", "42.00".to_string());
        assert_eq!(prompt.render_user(&vars), "Custom 42.00");

        let default = lib.get(PromptId::SpendingPatterns).unwrap();
        assert!(!default.is_override);
    }
}
