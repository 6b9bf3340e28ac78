use crate::jsonpath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// How placement should treat a generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Written as-is, replacing any existing file.
    Write,
    /// A [`MergePayload`] to deep-merge into a shared JSON document.
    Merge,
}

/// One output file, relative to the scope root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: Vec<u8>,
    pub kind: FileKind,
}

impl GeneratedFile {
    pub fn write(path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            kind: FileKind::Write,
        }
    }

    /// Parses the payload carried by a [`FileKind::Merge`] file.
    pub fn merge_payload(&self) -> Option<MergePayload> {
        match self.kind {
            FileKind::Merge => serde_json::from_slice(&self.content).ok(),
            FileKind::Write => None,
        }
    }
}

/// Handoff for shared JSON documents: `content` is merge-patched into the
/// target and `managedKeys` are recorded for uninstall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePayload {
    #[serde(rename = "managedKeys")]
    pub managed_keys: Vec<String>,
    pub content: Value,
}

impl MergePayload {
    /// Wraps `content`, deriving managed keys from its second-level paths.
    pub fn from_content(content: Value) -> Self {
        Self {
            managed_keys: managed_keys_of(&content),
            content,
        }
    }
}

/// Second-level key paths of a document (`hooks.Stop`, `mcpServers.brain`).
///
/// A top-level value that is not an object is managed as a whole.
pub fn managed_keys_of(content: &Value) -> Vec<String> {
    let Some(top) = content.as_object() else {
        return Vec::new();
    };
    let mut keys = Vec::new();
    for (name, value) in top {
        match value.as_object() {
            Some(children) if !children.is_empty() => {
                keys.extend(children.keys().map(|child| jsonpath::join([name, child])));
            }
            _ => keys.push(jsonpath::join([name])),
        }
    }
    keys
}

/// Generated files for one tool, grouped by category and sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOutput {
    pub agents: Vec<GeneratedFile>,
    pub skills: Vec<GeneratedFile>,
    pub commands: Vec<GeneratedFile>,
    pub rules: Vec<GeneratedFile>,
    pub hooks: Vec<GeneratedFile>,
    pub mcp: Vec<GeneratedFile>,
    /// Plugin descriptor for marketplace-style tools.
    pub descriptor: Option<GeneratedFile>,
}

impl TransformOutput {
    /// Every generated file in category order.
    pub fn files(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.agents
            .iter()
            .chain(&self.skills)
            .chain(&self.commands)
            .chain(&self.rules)
            .chain(&self.hooks)
            .chain(&self.mcp)
            .chain(self.descriptor.as_ref())
    }

    /// Files written outright.
    pub fn writes(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files().filter(|f| f.kind == FileKind::Write)
    }

    /// Shared documents to merge, with their parsed payloads.
    pub fn merges(&self) -> impl Iterator<Item = (&Path, MergePayload)> {
        self.files()
            .filter_map(|f| f.merge_payload().map(|p| (f.path.as_path(), p)))
    }

    pub fn len(&self) -> usize {
        self.files().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn sort(&mut self) {
        for group in [
            &mut self.agents,
            &mut self.skills,
            &mut self.commands,
            &mut self.rules,
            &mut self.hooks,
            &mut self.mcp,
        ] {
            group.sort_by(|a, b| a.path.cmp(&b.path));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn managed_keys_are_second_level() {
        let content = json!({
            "hooks": {"Stop": [], "PreSave": []},
            "version": 2
        });
        assert_eq!(
            managed_keys_of(&content),
            vec!["hooks.PreSave", "hooks.Stop", "version"]
        );
    }

    #[test]
    fn merge_payload_uses_camel_case_key() {
        let payload = MergePayload::from_content(json!({"mcpServers": {"brain": {}}}));
        let text = serde_json::to_string(&payload).unwrap();
        assert_eq!(
            text,
            r#"{"managedKeys":["mcpServers.brain"],"content":{"mcpServers":{"brain":{}}}}"#
        );
    }

    #[test]
    fn write_files_have_no_payload() {
        let file = GeneratedFile::write("agents/a.md", "x");
        assert!(file.merge_payload().is_none());
    }
}
