//! Configuration document loading.
//!
//! Loads `~/.brain/config.yaml` (or an explicit path). The document is walked
//! as a raw YAML tree rather than deserialized in one shot so that every
//! problem is reported together instead of stopping at the first one.
//!
//! ## Configuration File Format
//!
//! ```yaml
//! brand:
//!   name: brain
//!   prefix: "🧠-"
//! source: ~/brain/templates
//! targets: [claude, cursor]
//! tools:
//!   claude:
//!     display_name: Claude Code
//!     placement: direct
//!     config_dir: ~/.claude
//!     prefix: false
//!     scopes: { user: plugins/marketplaces/brain }
//!     default_scope: user
//!     agents:
//!       frontmatter: [name, description, model, color]
//!       select: { architect: { model: opus }, scratchpad: null }
//!     rules: { extension: .md, extra_frontmatter: { alwaysApply: true } }
//!     hooks: { strategy: direct, target: hooks/hooks.json }
//!     mcp: { strategy: direct, target: .mcp.json }
//!     manifest: { type: marketplace }
//!     detection:
//!       brain_installed: { type: json_key, file: plugins/installed_plugins.json, key: plugins.brain }
//! ```

use crate::env::{expand_home, resolve_against};
use crate::error::{ConfigError, ConfigReport};
use crate::types::{
    AgentsConfig, BrainConfig, Brand, Detection, DocStrategy, HooksConfig, ManifestConfig,
    ManifestType, McpConfig, Placement, RulesConfig, ToolConfig,
};
use crate::Result;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

static TOOL_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("valid regex"));

const PLACEMENTS: &[(&str, Placement)] = &[
    ("direct", Placement::Direct),
    ("copy_and_merge", Placement::CopyAndMerge),
];

const STRATEGIES: &[(&str, DocStrategy)] = &[
    ("direct", DocStrategy::Direct),
    ("merge", DocStrategy::Merge),
    ("none", DocStrategy::None),
];

const MANIFEST_TYPES: &[(&str, ManifestType)] = &[
    ("marketplace", ManifestType::Marketplace),
    ("file_list", ManifestType::FileList),
];

const DETECTION_TYPES: &[(&str, &str)] = &[("json_key", "json_key"), ("prefix_scan", "prefix_scan")];

const DEFAULT_DESCRIPTOR: &str = ".claude-plugin/plugin.json";
const DEFAULT_SERVERS_KEY: &str = "mcpServers";

/// Reads and validates the configuration document at `path`.
pub fn load_config(path: &Path) -> Result<BrainConfig> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&text, path)?;

    tracing::debug!(
        target: "brain::config",
        path = %path.display(),
        tools = config.tools.len(),
        "Loaded configuration file"
    );

    Ok(config)
}

/// Validates a configuration document. `origin` is only used in reports.
pub fn parse_config(text: &str, origin: &Path) -> Result<BrainConfig> {
    let root: Value = serde_yaml::from_str(text).map_err(|source| ConfigError::Syntax {
        path: origin.to_path_buf(),
        source,
    })?;

    let mut report = ConfigReport::new(origin.to_path_buf());
    let Some(root) = root.as_mapping() else {
        report.push(None, "<root>", "document must be a mapping with a `tools` key");
        return Err(ConfigError::Invalid(report));
    };
    let doc = Fields::new(None, "", root);

    let brand = match doc.opt_map("brand", &mut report) {
        Some(fields) => parse_brand(&fields, &mut report),
        None => Brand::default(),
    };
    let source = doc
        .opt_str("source", &mut report)
        .and_then(|raw| expand_or_report(&raw, None, "source", &mut report));
    let targets = doc.str_list("targets", false, &mut report);

    let mut declared = BTreeSet::new();
    let mut tools = BTreeMap::new();
    match root.get("tools") {
        None => report.push(None, "tools", "required mapping is missing"),
        Some(Value::Mapping(map)) if map.is_empty() => {
            report.push(None, "tools", "must declare at least one tool")
        }
        Some(Value::Mapping(map)) => {
            for (key, value) in map {
                let Some(name) = key.as_str() else {
                    report.push(
                        None,
                        "tools",
                        format!("tool names must be strings, found {}", describe(key)),
                    );
                    continue;
                };
                declared.insert(name.to_string());
                if let Some(tool) = parse_tool(name, value, &mut report) {
                    tools.insert(name.to_string(), tool);
                }
            }
        }
        Some(other) => report.push(
            None,
            "tools",
            format!("must be a mapping, found {}", describe(other)),
        ),
    }

    if let Some(targets) = &targets {
        for target in targets {
            if !declared.contains(target) {
                report.push(None, "targets", format!("unknown tool '{target}'"));
            }
        }
    }

    check_disjoint_tools(&tools, &mut report);

    for key in root.keys().filter_map(Value::as_str) {
        if !matches!(key, "brand" | "source" | "targets" | "tools") {
            tracing::warn!(target: "brain::config", key, "Ignoring unknown top-level key");
        }
    }

    if !report.is_empty() {
        return Err(ConfigError::Invalid(report));
    }

    Ok(BrainConfig {
        brand,
        source,
        targets,
        tools,
    })
}

fn parse_brand(fields: &Fields<'_>, report: &mut ConfigReport) -> Brand {
    let defaults = Brand::default();
    let name = fields.opt_str("name", report).unwrap_or(defaults.name);
    if name.is_empty() || name.contains('.') {
        report.push(
            None,
            "brand.name",
            "must be non-empty and must not contain '.'",
        );
    }
    Brand {
        name,
        prefix: fields.opt_str("prefix", report).unwrap_or(defaults.prefix),
        version: fields.opt_str("version", report).unwrap_or(defaults.version),
        description: fields.opt_str("description", report),
    }
}

fn parse_tool(name: &str, value: &Value, report: &mut ConfigReport) -> Option<ToolConfig> {
    let before = report.violations.len();
    let tool = Some(name);

    if !TOOL_NAME_REGEX.is_match(name) {
        report.push(
            tool,
            "name",
            "must start with a lowercase letter or digit and contain only [a-z0-9_-]",
        );
    }
    let Some(map) = value.as_mapping() else {
        report.push(
            tool,
            "<record>",
            format!("must be a mapping, found {}", describe(value)),
        );
        return None;
    };
    let fields = Fields::new(tool, "", map);

    let display_name = fields.req_str("display_name", report);
    let placement = fields.req_enum("placement", PLACEMENTS, report);
    let config_dir = fields
        .req_str("config_dir", report)
        .and_then(|raw| expand_or_report(&raw, tool, "config_dir", report));
    if let Some(dir) = &config_dir {
        if !dir.is_absolute() {
            report.push(
                tool,
                "config_dir",
                format!("must be an absolute path, found '{}'", dir.display()),
            );
        }
    }
    let prefix = fields.opt_bool("prefix", false, report);

    let scopes = fields.req_map("scopes", report).map(|scopes| {
        let mut resolved = BTreeMap::new();
        if scopes.map.is_empty() {
            report.push(tool, "scopes", "must declare at least one scope");
        }
        for (key, value) in scopes.map {
            match (key.as_str(), value.as_str()) {
                (Some(scope), Some(raw)) => {
                    let Some(path) = expand_or_report(raw, tool, "scopes", report) else {
                        continue;
                    };
                    let path = match &config_dir {
                        Some(base) => resolve_against(base, &path),
                        None => path,
                    };
                    resolved.insert(scope.to_string(), path);
                }
                _ => report.push(
                    tool,
                    "scopes",
                    "entries must map a scope name to a path string",
                ),
            }
        }
        resolved
    });

    let default_scope = fields.req_str("default_scope", report);
    if let (Some(scope), Some(scopes)) = (&default_scope, &scopes) {
        if !scopes.contains_key(scope) {
            let declared: Vec<&str> = scopes.keys().map(String::as_str).collect();
            report.push(
                tool,
                "default_scope",
                format!(
                    "'{scope}' is not one of the declared scopes [{}]",
                    declared.join(", ")
                ),
            );
        }
    }

    let agents = fields
        .req_map("agents", report)
        .and_then(|agents| parse_agents(&agents, report));
    let rules = fields
        .req_map("rules", report)
        .and_then(|rules| parse_rules(&rules, report));
    let hooks = fields
        .req_map("hooks", report)
        .and_then(|hooks| parse_doc(&hooks, report))
        .map(|(strategy, target)| HooksConfig { strategy, target });
    let mcp = fields.req_map("mcp", report).and_then(|mcp| {
        let servers_key = mcp
            .opt_str("servers_key", report)
            .unwrap_or_else(|| DEFAULT_SERVERS_KEY.to_string());
        parse_doc(&mcp, report).map(|(strategy, target)| McpConfig {
            strategy,
            target,
            servers_key,
        })
    });

    if placement == Some(Placement::Direct) {
        if hooks.as_ref().map(|h| h.strategy) == Some(DocStrategy::Merge) {
            report.push(
                tool,
                "hooks.strategy",
                "'merge' is not allowed with direct placement (the subtree is wholly owned)",
            );
        }
        if mcp.as_ref().map(|m| m.strategy) == Some(DocStrategy::Merge) {
            report.push(
                tool,
                "mcp.strategy",
                "'merge' is not allowed with direct placement (the subtree is wholly owned)",
            );
        }
    }

    // A direct install replaces its scope root wholesale.
    if let (Some(Placement::Direct), Some(dir), Some(scopes)) = (placement, &config_dir, &scopes) {
        for (scope, root) in scopes {
            if dir.starts_with(root) {
                report.push(
                    tool,
                    &format!("scopes.{scope}"),
                    format!(
                        "'{}' would be replaced by direct placement but contains config_dir '{}'",
                        root.display(),
                        dir.display()
                    ),
                );
            }
        }
    }

    let manifest = fields.req_map("manifest", report).and_then(|manifest| {
        let kind = manifest.req_enum("type", MANIFEST_TYPES, report)?;
        let descriptor = match manifest.opt_str("descriptor", report) {
            Some(raw) => relative_or_report(&raw, tool, &manifest.field("descriptor"), report)?,
            None => PathBuf::from(DEFAULT_DESCRIPTOR),
        };
        Some(ManifestConfig { kind, descriptor })
    });

    let detection = fields
        .req_map("detection", report)
        .and_then(|detection| detection.req_map("brain_installed", report))
        .and_then(|rule| parse_detection(&rule, report));

    if report.violations.len() > before {
        return None;
    }

    Some(ToolConfig {
        name: name.to_string(),
        display_name: display_name?,
        placement: placement?,
        config_dir: config_dir?,
        prefix,
        scopes: scopes?,
        default_scope: default_scope?,
        agents: agents?,
        rules: rules?,
        hooks: hooks?,
        mcp: mcp?,
        manifest: manifest?,
        detection: detection?,
    })
}

fn parse_agents(fields: &Fields<'_>, report: &mut ConfigReport) -> Option<AgentsConfig> {
    let frontmatter = fields.str_list("frontmatter", true, report);
    let extension = fields
        .opt_str("extension", report)
        .unwrap_or_else(|| ".md".to_string());
    check_extension(&extension, fields, "extension", report);

    let select = fields.opt_map("select", report).map(|select| {
        let mut entries = BTreeMap::new();
        for (key, value) in select.map {
            let Some(agent) = key.as_str() else {
                report.push(fields.tool, &select.field("<key>"), "agent names must be strings");
                continue;
            };
            match value {
                Value::Null => {
                    entries.insert(agent.to_string(), None);
                }
                Value::Mapping(overrides) => {
                    entries.insert(agent.to_string(), Some(overrides.clone()));
                }
                other => report.push(
                    fields.tool,
                    &select.field(agent),
                    format!(
                        "must be null (skip) or a mapping of overrides, found {}",
                        describe(other)
                    ),
                ),
            }
        }
        entries
    });

    Some(AgentsConfig {
        frontmatter: frontmatter?,
        extension,
        select,
    })
}

fn parse_rules(fields: &Fields<'_>, report: &mut ConfigReport) -> Option<RulesConfig> {
    let extension = fields.req_str("extension", report);
    if let Some(ext) = &extension {
        check_extension(ext, fields, "extension", report);
    }
    let extra_frontmatter = fields
        .opt_map("extra_frontmatter", report)
        .map(|extra| extra.map.clone())
        .unwrap_or_default();
    Some(RulesConfig {
        extension: extension?,
        extra_frontmatter,
    })
}

fn parse_doc(
    fields: &Fields<'_>,
    report: &mut ConfigReport,
) -> Option<(DocStrategy, Option<PathBuf>)> {
    let strategy = fields.req_enum("strategy", STRATEGIES, report)?;
    let target = match fields.opt_str("target", report) {
        Some(raw) => relative_or_report(&raw, fields.tool, &fields.field("target"), report),
        None if strategy != DocStrategy::None => {
            report.push(
                fields.tool,
                &fields.field("target"),
                format!("is required when strategy is '{}'", strategy.as_str()),
            );
            None
        }
        None => None,
    };
    Some((strategy, target))
}

fn parse_detection(fields: &Fields<'_>, report: &mut ConfigReport) -> Option<Detection> {
    match fields.req_enum("type", DETECTION_TYPES, report)? {
        "json_key" => {
            let file = fields
                .req_str("file", report)
                .and_then(|raw| relative_or_report(&raw, fields.tool, &fields.field("file"), report));
            let key = fields.req_str("key", report);
            if key.as_deref() == Some("") {
                report.push(fields.tool, &fields.field("key"), "must not be empty");
            }
            Some(Detection::JsonKey {
                file: file?,
                key: key?,
            })
        }
        _ => {
            let dirs = fields.str_list("dirs", true, report)?;
            if dirs.is_empty() {
                report.push(fields.tool, &fields.field("dirs"), "must list at least one directory");
                return None;
            }
            let mut resolved = Vec::with_capacity(dirs.len());
            for dir in dirs {
                resolved.push(relative_or_report(&dir, fields.tool, &fields.field("dirs"), report)?);
            }
            Some(Detection::PrefixScan { dirs: resolved })
        }
    }
}

/// Enforces the cross-tool guarantee the parallel executor relies on: no
/// tool's `config_dir` or scope root equals or lies inside another tool's.
fn check_disjoint_tools(tools: &BTreeMap<String, ToolConfig>, report: &mut ConfigReport) {
    let mut claimed: Vec<(&str, &Path)> = Vec::new();

    for tool in tools.values() {
        let own: Vec<(String, &Path)> = std::iter::once(("config_dir".to_string(), tool.config_dir.as_path()))
            .chain(
                tool.scopes
                    .iter()
                    .map(|(scope, root)| (format!("scopes.{scope}"), root.as_path())),
            )
            .collect();

        for (field, path) in &own {
            if let Some((owner, other)) = claimed.iter().find(|(_, other)| overlaps(path, other)) {
                report.push(
                    Some(&tool.name),
                    field,
                    format!(
                        "'{}' overlaps '{}' owned by tool '{owner}'",
                        path.display(),
                        other.display()
                    ),
                );
            }
        }
        claimed.extend(own.iter().map(|(_, path)| (tool.name.as_str(), *path)));
    }
}

fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

fn check_extension(ext: &str, fields: &Fields<'_>, key: &str, report: &mut ConfigReport) {
    if !ext.starts_with('.') || ext.len() < 2 {
        report.push(
            fields.tool,
            &fields.field(key),
            format!("must begin with '.' (e.g. '.md'), found '{ext}'"),
        );
    }
}

fn expand_or_report(
    raw: &str,
    tool: Option<&str>,
    field: &str,
    report: &mut ConfigReport,
) -> Option<PathBuf> {
    match expand_home(raw) {
        Ok(path) => Some(path),
        Err(e) => {
            report.push(tool, field, format!("cannot expand '{raw}': {e}"));
            None
        }
    }
}

fn relative_or_report(
    raw: &str,
    tool: Option<&str>,
    field: &str,
    report: &mut ConfigReport,
) -> Option<PathBuf> {
    let path = PathBuf::from(raw);
    let escapes = path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if raw.is_empty() || escapes {
        report.push(
            tool,
            field,
            format!("must be a relative path without '..', found '{raw}'"),
        );
        return None;
    }
    Some(path)
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// A mapping under validation, remembering where it sits in the document.
struct Fields<'a> {
    tool: Option<&'a str>,
    base: String,
    map: &'a Mapping,
}

impl<'a> Fields<'a> {
    fn new(tool: Option<&'a str>, base: &str, map: &'a Mapping) -> Self {
        Self {
            tool,
            base: base.to_string(),
            map,
        }
    }

    fn field(&self, key: &str) -> String {
        if self.base.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.base)
        }
    }

    fn missing(&self, key: &str, report: &mut ConfigReport) {
        report.push(self.tool, &self.field(key), "required field is missing");
    }

    fn wrong_type(&self, key: &str, expected: &str, found: &Value, report: &mut ConfigReport) {
        report.push(
            self.tool,
            &self.field(key),
            format!("expected {expected}, found {}", describe(found)),
        );
    }

    fn req_str(&self, key: &str, report: &mut ConfigReport) -> Option<String> {
        if self.map.get(key).is_none() {
            self.missing(key, report);
            return None;
        }
        self.opt_str(key, report)
    }

    fn opt_str(&self, key: &str, report: &mut ConfigReport) -> Option<String> {
        match self.map.get(key)? {
            Value::String(s) => Some(s.clone()),
            other => {
                self.wrong_type(key, "a string", other, report);
                None
            }
        }
    }

    fn opt_bool(&self, key: &str, default: bool, report: &mut ConfigReport) -> bool {
        match self.map.get(key) {
            None => default,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                self.wrong_type(key, "a boolean", other, report);
                default
            }
        }
    }

    fn req_map(&self, key: &str, report: &mut ConfigReport) -> Option<Fields<'a>> {
        if self.map.get(key).is_none() {
            self.missing(key, report);
            return None;
        }
        self.opt_map(key, report)
    }

    fn opt_map(&self, key: &str, report: &mut ConfigReport) -> Option<Fields<'a>> {
        match self.map.get(key)? {
            Value::Mapping(map) => Some(Fields {
                tool: self.tool,
                base: self.field(key),
                map,
            }),
            other => {
                self.wrong_type(key, "a mapping", other, report);
                None
            }
        }
    }

    fn str_list(&self, key: &str, required: bool, report: &mut ConfigReport) -> Option<Vec<String>> {
        let value = match self.map.get(key) {
            Some(value) => value,
            None => {
                if required {
                    self.missing(key, report);
                }
                return None;
            }
        };
        let Value::Sequence(items) = value else {
            self.wrong_type(key, "a list of strings", value, report);
            return None;
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item.as_str() {
                Some(s) => out.push(s.to_string()),
                None => {
                    self.wrong_type(key, "a list of strings", item, report);
                    return None;
                }
            }
        }
        Some(out)
    }

    fn req_enum<T: Copy>(
        &self,
        key: &str,
        allowed: &[(&str, T)],
        report: &mut ConfigReport,
    ) -> Option<T> {
        let raw = self.req_str(key, report)?;
        match allowed.iter().find(|(label, _)| *label == raw) {
            Some((_, value)) => Some(*value),
            None => {
                let labels: Vec<&str> = allowed.iter().map(|(label, _)| *label).collect();
                report.push(
                    self.tool,
                    &self.field(key),
                    format!("'{raw}' is not one of [{}]", labels.join(", ")),
                );
                None
            }
        }
    }
}
