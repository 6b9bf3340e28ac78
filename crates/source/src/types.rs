use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Ordered frontmatter fields. Key order is preserved as written.
pub type Frontmatter = serde_yaml::Mapping;

/// Entry file of a skill directory. Other files in the directory are opaque.
pub const SKILL_FILE: &str = "SKILL.md";

/// Kind of canonical content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Subagent definitions (`agents/*.md`).
    Agent,
    /// Skill directories (`skills/<dir>/SKILL.md` plus adjacent files).
    Skill,
    /// Slash commands (`commands/*.md`, fragments in `commands/<name>/`).
    Command,
    /// Rule files (`rules/*.md`).
    Rule,
    /// Hook document and scripts (`hooks/`).
    Hook,
    /// MCP server fragment (`mcp/`).
    Mcp,
}

impl Category {
    /// Every category, in output order.
    pub const ALL: [Category; 6] = [
        Category::Agent,
        Category::Skill,
        Category::Command,
        Category::Rule,
        Category::Hook,
        Category::Mcp,
    ];

    /// Directory name under the template root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Agent => "agents",
            Category::Skill => "skills",
            Category::Command => "commands",
            Category::Rule => "rules",
            Category::Hook => "hooks",
            Category::Mcp => "mcp",
        }
    }

    /// Parses a directory name back into a category.
    ///
    /// ```
    /// use brain_source::Category;
    ///
    /// assert_eq!(Category::from_dir_name("rules"), Some(Category::Rule));
    /// assert_eq!(Category::from_dir_name("prompts"), None);
    /// ```
    pub fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.dir_name() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One file from the template tree.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalFile {
    /// Category the file was found under.
    pub category: Category,
    /// Path relative to the category directory (e.g. `review/SKILL.md`).
    pub path: PathBuf,
    /// Parsed frontmatter. Empty for files without frontmatter and for
    /// non-Markdown files.
    pub frontmatter: Frontmatter,
    /// Text after the frontmatter (the whole text for non-Markdown files).
    pub body: String,
    /// Exact file bytes.
    pub raw: Vec<u8>,
}

impl CanonicalFile {
    /// File name without its extension.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }

    /// Returns true if this file sits directly in its category directory.
    pub fn is_top_level(&self) -> bool {
        self.path.components().count() == 1
    }

    /// Returns true for Markdown files.
    pub fn is_markdown(&self) -> bool {
        self.path.extension().is_some_and(|ext| ext == "md")
    }
}
