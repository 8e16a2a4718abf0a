use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Development,
    Browser,
    Productivity,
    Communication,
    System,
    Entertainment,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Development => "DEVELOPMENT",
            Category::Browser => "BROWSER",
            Category::Productivity => "PRODUCTIVITY",
            Category::Communication => "COMMUNICATION",
            Category::System => "SYSTEM",
            Category::Entertainment => "ENTERTAINMENT",
            Category::Other => "OTHER",
        }
    }

    /// Productive categories: development, office work, communication.
    pub fn is_productive(&self) -> bool {
        matches!(
            self,
            Category::Development | Category::Productivity | Category::Communication
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered keyword table; first substring match wins.
const KEYWORD_CATEGORIES: &[(&str, Category)] = &[
    // Development tools
    ("code", Category::Development),
    ("studio", Category::Development),
    ("intellij", Category::Development),
    ("eclipse", Category::Development),
    ("vim", Category::Development),
    // Browsers
    ("chrome", Category::Browser),
    ("firefox", Category::Browser),
    ("edge", Category::Browser),
    ("safari", Category::Browser),
    ("iexplore", Category::Browser),
    // Office applications
    ("winword", Category::Productivity),
    ("word", Category::Productivity),
    ("excel", Category::Productivity),
    ("powerpoint", Category::Productivity),
    ("outlook", Category::Productivity),
    ("onenote", Category::Productivity),
    ("notepad", Category::Productivity),
    // Communication
    ("teams", Category::Communication),
    ("slack", Category::Communication),
    ("zoom", Category::Communication),
    ("skype", Category::Communication),
    // System tools
    ("explorer", Category::System),
    ("cmd", Category::System),
    ("powershell", Category::System),
    ("taskmanager", Category::System),
    // Entertainment
    ("spotify", Category::Entertainment),
    ("vlc", Category::Entertainment),
    ("steam", Category::Entertainment),
    ("game", Category::Entertainment),
];

/// Map a process name or path to its category. Case-insensitive substring
/// match against the keyword table; unmatched processes land in `Other`.
/// Total: never fails, always returns a category.
pub fn categorize(process_name_or_path: &str) -> Category {
    let lower = process_name_or_path.to_lowercase();
    for (keyword, category) in KEYWORD_CATEGORIES {
        if lower.contains(keyword) {
            return *category;
        }
    }
    Category::Other
}
