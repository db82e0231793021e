//! Corpus loading from rule files.
//!
//! A rule file is YAML frontmatter between `---` markers followed by the
//! rule text, which may carry `{{...}}` template wildcard markup:
//!
//! ```text
//! ---
//! license_expression: mit
//! kind: notice
//! relevance: 100
//! ---
//! Licensed under the MIT license.
//! ```
//!
//! The loader only produces `RuleRecord`s; all validation beyond frontmatter
//! syntax happens at index build time.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::models::{RuleKind, RuleRecord};

/// File extension of rule files; anything else in the directory is ignored.
const RULE_EXTENSION: &str = "RULE";

const FRONTMATTER_MARKER: &str = "---";

#[derive(Debug, Deserialize)]
struct RuleFrontmatter {
    license_expression: String,

    #[serde(default = "default_kind")]
    kind: RuleKind,

    #[serde(default = "default_relevance")]
    relevance: u8,

    #[serde(default)]
    minimum_coverage: Option<u8>,

    #[serde(default)]
    notes: Option<String>,
}

fn default_kind() -> RuleKind {
    RuleKind::Notice
}

fn default_relevance() -> u8 {
    100
}

/// Load every `*.RULE` file under `dir` into rule records, sorted by
/// identifier so corpus loading is deterministic.
pub fn load_rules_from_directory(dir: &Path) -> Result<Vec<RuleRecord>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("cannot read rules directory {}", dir.display()))?;

    let mut records = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("cannot list {}", dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RULE_EXTENSION) {
            continue;
        }
        records.push(load_rule_file(&path)?);
    }

    records.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    Ok(records)
}

/// Load one rule file: parse the frontmatter and keep the text verbatim.
pub fn load_rule_file(path: &Path) -> Result<RuleRecord> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read rule file {}", path.display()))?;
    let identifier = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed.RULE")
        .to_string();

    let (frontmatter, text) = split_frontmatter(&content)
        .with_context(|| format!("invalid rule file {}", path.display()))?;

    let frontmatter: RuleFrontmatter = serde_yaml::from_str(frontmatter)
        .with_context(|| format!("invalid frontmatter in rule file {}", path.display()))?;

    Ok(RuleRecord {
        identifier,
        license_expression: frontmatter.license_expression,
        kind: frontmatter.kind,
        text: text.to_string(),
        relevance: frontmatter.relevance,
        minimum_coverage: frontmatter.minimum_coverage,
        notes: frontmatter.notes,
    })
}

/// Split `---` delimited frontmatter from the rule text.
fn split_frontmatter(content: &str) -> Result<(&str, &str)> {
    let Some(rest) = content
        .strip_prefix(&format!("{FRONTMATTER_MARKER}\n"))
        .or_else(|| content.strip_prefix(&format!("{FRONTMATTER_MARKER}\r\n")))
    else {
        bail!("missing frontmatter start marker");
    };

    for marker in [
        format!("\n{FRONTMATTER_MARKER}\n"),
        format!("\r\n{FRONTMATTER_MARKER}\r\n"),
    ] {
        if let Some(end) = rest.find(&marker) {
            let frontmatter = &rest[..end];
            let text = &rest[end + marker.len()..];
            return Ok((frontmatter, text));
        }
    }
    bail!("missing frontmatter end marker");
}
