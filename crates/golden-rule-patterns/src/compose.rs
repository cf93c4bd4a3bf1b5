use std::fmt::Write as _;
use std::sync::Arc;

use crate::category::EditCategory;
use crate::store::{PatternExample, PatternStore};

/// Invariant rules every rewrite must follow, independent of the patterns chosen.
pub const GOLDEN_RULES: &str = include_str!("../../../prompts/golden_rules.md");

/// Assembles the rewrite instruction for one input text.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    store: Arc<PatternStore>,
}

impl PromptComposer {
    pub const fn new(store: Arc<PatternStore>) -> Self {
        Self { store }
    }

    /// Golden rules, then one section per category in `ranked` order
    /// illustrated by that category's first example, then the input.
    /// Categories missing from the store are left out.
    pub fn compose(&self, input: &str, ranked: &[EditCategory]) -> String {
        let sections = ranked
            .iter()
            .filter_map(|category| {
                self.store
                    .representative(*category)
                    .map(|example| render_section(*category, example))
            })
            .collect::<Vec<_>>();

        let mut prompt = String::new();
        prompt.push_str(
            "あなたは日本語の文章を推敲しています。以下の黄金律と編集方針を守って改善してください。\n\n",
        );
        prompt.push_str("## 黄金律:\n");
        prompt.push_str(GOLDEN_RULES.trim());
        prompt.push_str("\n\n## 編集方針:\n");
        prompt.push_str(&sections.join("\n\n"));
        prompt.push_str("\n\n## 改善対象の文章:\n");
        prompt.push_str(input);
        prompt.push_str("\n\n改善後の文章のみを出力してください。");
        prompt
    }
}

fn render_section(category: EditCategory, example: &PatternExample) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "### 編集方針: {category}");
    let _ = writeln!(out, "{}", example.description.trim());
    out.push_str("編集手順:\n");
    for step in &example.steps {
        let _ = writeln!(out, "- {}", step.trim());
    }
    out.push_str("改善例:\n編集前:\n");
    let _ = writeln!(out, "{}", example.example_before.trim());
    out.push_str("編集後:\n");
    out.push_str(example.example_after.trim());
    out
}
