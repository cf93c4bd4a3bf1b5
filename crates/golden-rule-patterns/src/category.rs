use std::fmt;
use std::str::FromStr;

/// The fixed set of edit types a pattern can belong to.
///
/// Declaration order is significant: ranking ties are broken by it and the
/// store iterates categories in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EditCategory {
    Reordering,
    Simplification,
    ToneAdjustment,
    Clarity,
    RedundancyRemoval,
}

impl EditCategory {
    pub const ALL: [Self; 5] = [
        Self::Reordering,
        Self::Simplification,
        Self::ToneAdjustment,
        Self::Clarity,
        Self::RedundancyRemoval,
    ];

    /// Label used as the key in the pattern store and shown to the model.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reordering => "構成の変更 (Reordering)",
            Self::Simplification => "表現の簡潔化 (Simplification)",
            Self::ToneAdjustment => "トーンや口調の調整 (Tone adjustment)",
            Self::Clarity => "明確化 (Clarity improvement)",
            Self::RedundancyRemoval => "冗長表現の削除 (Removal of redundancy)",
        }
    }

    const fn english(self) -> &'static str {
        match self {
            Self::Reordering => "reordering",
            Self::Simplification => "simplification",
            Self::ToneAdjustment => "tone adjustment",
            Self::Clarity => "clarity improvement",
            Self::RedundancyRemoval => "removal of redundancy",
        }
    }

    /// Matches the full label, or either half of it (`明確化` or
    /// `Clarity improvement`), ignoring surrounding whitespace and ASCII case.
    pub fn from_label(raw: &str) -> Option<Self> {
        let needle = raw.trim();
        if needle.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|cat| {
            let label = cat.label();
            if label == needle {
                return true;
            }
            let japanese = label.split(" (").next().unwrap_or(label);
            japanese == needle || cat.english().eq_ignore_ascii_case(needle)
        })
    }
}

impl fmt::Display for EditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown edit category `{}`", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for EditCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
