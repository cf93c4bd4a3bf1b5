//! Offline extraction of editing patterns from raw/refined document pairs.
//!
//! The model call itself lives with the caller; this module owns the
//! file layout, the classification prompt and parsing of its answer.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::category::EditCategory;
use crate::store::{PatternError, PatternExample};

const CLASSIFY_TEMPLATE: &str = include_str!("../../../prompts/classify_edit.md");

/// A draft and its hand-refined counterpart sharing one file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPair {
    pub filename: String,
    pub before: String,
    pub after: String,
}

/// Pairs every `*.md` file in `raw_dir` with the same name in `refined_dir`,
/// sorted by file name.
pub fn load_document_pairs(
    raw_dir: impl AsRef<Path>,
    refined_dir: impl AsRef<Path>,
) -> Result<Vec<DocumentPair>, PatternError> {
    let raw_dir = raw_dir.as_ref();
    let refined_dir = refined_dir.as_ref();
    let entries = fs::read_dir(raw_dir).map_err(|e| PatternError::io(raw_dir, e))?;

    let mut filenames = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PatternError::io(raw_dir, e))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            filenames.push(name.to_string());
        }
    }
    filenames.sort();

    filenames
        .into_iter()
        .map(|filename| {
            let raw_path = raw_dir.join(&filename);
            let refined_path = refined_dir.join(&filename);
            let before =
                fs::read_to_string(&raw_path).map_err(|e| PatternError::io(&raw_path, e))?;
            let after = fs::read_to_string(&refined_path)
                .map_err(|e| PatternError::io(&refined_path, e))?;
            Ok(DocumentPair {
                filename,
                before,
                after,
            })
        })
        .collect()
}

/// Asks the model which edit category describes the change from
/// `before` to `after`, answering in JSON.
pub fn classification_prompt(pair: &DocumentPair) -> String {
    let categories = EditCategory::ALL
        .iter()
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ");
    fill_template(
        CLASSIFY_TEMPLATE,
        &[
            ("categories", categories.as_str()),
            ("before", pair.before.as_str()),
            ("after", pair.after.as_str()),
        ],
    )
    .trim()
    .to_string()
}

/// Replaces `{key}` placeholders in one pass, so substituted text is never
/// scanned again. Unknown braces are copied through.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let (head, tail) = rest.split_at(open);
        out.push_str(head);
        let matched = values.iter().find(|(key, _)| {
            tail.strip_prefix('{')
                .and_then(|t| t.strip_prefix(key))
                .is_some_and(|t| t.starts_with('}'))
        });
        match matched {
            Some((key, value)) => {
                out.push_str(value);
                rest = tail.get(key.len() + 2..).unwrap_or_default();
            }
            None => {
                out.push('{');
                rest = tail.get(1..).unwrap_or_default();
            }
        }
    }
    out.push_str(rest);
    out
}

/// The model's verdict on one document pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: EditCategory,
    pub description: String,
    pub steps: Vec<String>,
}

impl Classification {
    pub fn into_example(self, pair: &DocumentPair) -> (EditCategory, PatternExample) {
        (
            self.category,
            PatternExample {
                filename: Some(pair.filename.clone()),
                description: self.description,
                steps: self.steps,
                example_before: pair.before.clone(),
                example_after: pair.after.clone(),
            },
        )
    }
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    category: String,
    description: String,
    #[serde(default)]
    steps: Steps,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Steps {
    List(Vec<String>),
    One(String),
}

impl Default for Steps {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// Parses the JSON object in a model answer, tolerating prose or code
/// fences around it.
pub fn parse_classification(text: &str) -> Result<Classification, PatternError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let body = match (start, end) {
        (Some(s), Some(e)) if s < e => text.get(s..=e).unwrap_or_default(),
        _ => {
            return Err(PatternError::InvalidInput(
                "classification answer contains no JSON object".to_string(),
            ));
        }
    };
    let raw: RawClassification = serde_json::from_str(body)?;
    let category = EditCategory::from_label(&raw.category).ok_or_else(|| {
        PatternError::InvalidInput(format!("unknown edit category `{}`", raw.category))
    })?;
    let steps = match raw.steps {
        Steps::List(steps) => steps,
        Steps::One(step) => vec![step],
    };
    Ok(Classification {
        category,
        description: raw.description.trim().to_string(),
        steps: steps
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    })
}
