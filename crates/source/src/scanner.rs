use crate::frontmatter::parse_document;
use crate::types::{CanonicalFile, Category, Frontmatter, SKILL_FILE};
use crate::{Result, SourceError};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Read-only view of a canonical template tree.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    root: PathBuf,
}

impl TemplateSource {
    /// Opens the template tree rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SourceError::NotADirectory(root));
        }
        Ok(Self { root })
    }

    /// The template root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding `category` content.
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// Lists every file of `category`, ordered by relative path.
    ///
    /// Hidden files and directories are skipped and symlinks are not
    /// followed. A missing category directory yields an empty list.
    pub fn list(&self, category: Category) -> Result<Vec<CanonicalFile>> {
        let dir = self.category_dir(category);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_hidden_component(&e.file_name().to_string_lossy()));
        for entry in walker {
            let entry = entry.map_err(|source| SourceError::Walk {
                path: dir.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&dir)
                .unwrap_or(entry.path())
                .to_path_buf();
            files.push(load_file(category, entry.path(), rel)?);
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::debug!(
            target: "brain::source",
            category = %category,
            count = files.len(),
            "Listed canonical files"
        );
        Ok(files)
    }

    /// Reads one file given its path relative to the template root
    /// (e.g. `agents/architect.md`).
    pub fn read(&self, path: &Path) -> Result<CanonicalFile> {
        let mut components = path.components();
        let category = match components.next() {
            Some(Component::Normal(first)) => first.to_str().and_then(Category::from_dir_name),
            _ => None,
        }
        .ok_or_else(|| SourceError::UnknownCategory(path.to_path_buf()))?;

        let rel: PathBuf = components.collect();
        if rel.as_os_str().is_empty()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(SourceError::UnknownCategory(path.to_path_buf()));
        }
        load_file(category, &self.root.join(path), rel)
    }
}

fn is_hidden_component(name: &str) -> bool {
    name.starts_with('.')
}

/// Markdown carries frontmatter, except skill files other than the entry
/// file, which are copied byte for byte.
fn has_frontmatter(category: Category, rel: &Path) -> bool {
    let is_markdown = rel.extension().is_some_and(|ext| ext == "md");
    match category {
        Category::Skill => is_markdown && rel.file_name().is_some_and(|name| name == SKILL_FILE),
        _ => is_markdown,
    }
}

fn load_file(category: Category, full: &Path, rel: PathBuf) -> Result<CanonicalFile> {
    let raw = fs::read(full).map_err(|source| SourceError::Io {
        path: full.to_path_buf(),
        source,
    })?;

    let (frontmatter, body) = if has_frontmatter(category, &rel) {
        let text = String::from_utf8(raw.clone()).map_err(|_| SourceError::Parse {
            path: full.to_path_buf(),
            message: "file is not valid UTF-8".to_string(),
        })?;
        let doc = parse_document(&text).map_err(|message| SourceError::Parse {
            path: full.to_path_buf(),
            message,
        })?;
        (doc.frontmatter, doc.body)
    } else {
        (
            Frontmatter::new(),
            String::from_utf8_lossy(&raw).into_owned(),
        )
    };

    Ok(CanonicalFile {
        category,
        path: rel,
        frontmatter,
        body,
        raw,
    })
}
