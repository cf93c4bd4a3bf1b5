use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::category::EditCategory;

/// One worked illustration of an edit type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatternExample {
    /// Document the example was mined from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub description: String,
    #[serde(default)]
    pub steps: Vec<String>,
    pub example_before: String,
    pub example_after: String,
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PatternError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Category label → examples, loaded once and shared read-only.
///
/// Only categories with at least one example are kept. Iteration follows
/// [`EditCategory`] declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternStore {
    categories: BTreeMap<EditCategory, Vec<PatternExample>>,
}

impl PatternStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PatternError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| PatternError::io(path, e))?;
        let store = Self::from_json_slice(&bytes)?;
        tracing::info!(
            path = %path.display(),
            categories = store.len(),
            examples = store.example_count(),
            "pattern store loaded"
        );
        Ok(store)
    }

    /// Parses the on-disk JSON shape. Labels outside the fixed enumeration
    /// and empty example lists are skipped with a warning. When several
    /// labels name the same category, their examples are appended in file
    /// order.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, PatternError> {
        let DocumentOrder(raw) = serde_json::from_slice(bytes)?;
        let mut store = Self::default();
        for (label, examples) in raw {
            let Some(category) = EditCategory::from_label(&label) else {
                tracing::warn!(label = %label, "skipping unknown edit category");
                continue;
            };
            if examples.is_empty() {
                tracing::warn!(category = %category, "skipping category without examples");
                continue;
            }
            for example in examples {
                store.insert(category, example);
            }
        }
        Ok(store)
    }

    pub fn insert(&mut self, category: EditCategory, example: PatternExample) {
        self.categories.entry(category).or_default().push(example);
    }

    pub fn examples(&self, category: EditCategory) -> &[PatternExample] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The example used to illustrate a category in prompts.
    pub fn representative(&self, category: EditCategory) -> Option<&PatternExample> {
        self.examples(category).first()
    }

    pub fn categories(&self) -> impl Iterator<Item = (EditCategory, &[PatternExample])> + '_ {
        self.categories
            .iter()
            .map(|(category, examples)| (*category, examples.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn example_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn to_json_pretty(&self) -> Result<String, PatternError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PatternError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| PatternError::io(parent, e))?;
            }
        }
        let body = self.to_json_pretty()?;
        fs::write(path, body).map_err(|e| PatternError::io(path, e))
    }
}

impl Serialize for PatternStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for (category, examples) in &self.categories {
            map.serialize_entry(category.label(), examples)?;
        }
        map.end()
    }
}

/// Top-level entries of the store file in the order they appear.
struct DocumentOrder(Vec<(String, Vec<PatternExample>)>);

impl<'de> Deserialize<'de> for DocumentOrder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = DocumentOrder;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of category labels to example lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Vec<PatternExample>>()? {
                    entries.push(entry);
                }
                Ok(DocumentOrder(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
