//! Hook and MCP JSON documents, plus the marketplace plugin descriptor.

use crate::{FileKind, GeneratedFile, MergePayload, Result, TransformContext, TransformError};
use brain_config::{DocStrategy, ManifestType};
use brain_source::{CanonicalFile, Category, TemplateSource};
use regex::{Captures, Regex};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const HOOKS_DOCUMENT: &str = "hooks.json";
const MCP_DOCUMENT: &str = "server.json";
const ROOT_TOKEN: &str = "${BRAIN_ROOT}";

static HOOK_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{HOOKS_DIR\}/([A-Za-z0-9._/-]+)")
        .expect("HOOK_SCRIPT_RE: compile-time constant")
});

/// Hook scripts plus the hooks document at `hooks.target`.
pub(crate) fn hooks(
    source: &TemplateSource,
    ctx: &TransformContext<'_>,
) -> Result<Vec<GeneratedFile>> {
    let config = &ctx.tool.hooks;
    let Some(target) = config
        .target
        .as_deref()
        .filter(|_| config.strategy != DocStrategy::None)
    else {
        return Ok(Vec::new());
    };

    let files = source.list(Category::Hook)?;
    let Some(document) = files.iter().find(|f| f.path == Path::new(HOOKS_DOCUMENT)) else {
        tracing::debug!(
            target: "brain::transform",
            tool = %ctx.tool.name,
            "No hooks document in source"
        );
        return Ok(Vec::new());
    };

    let scripts: Vec<&CanonicalFile> = files
        .iter()
        .filter(|f| f.path != Path::new(HOOKS_DOCUMENT))
        .collect();
    let available: BTreeSet<String> = scripts
        .iter()
        .map(|f| f.path.to_string_lossy().into_owned())
        .collect();

    let mut content = parse_json(document, Category::Hook)?;
    let hooks_dir = ctx.root.join(Category::Hook.dir_name());
    rewrite_strings(&mut content, &mut |text| {
        rewrite_hook_refs(text, &available, &hooks_dir, ctx)
    })?;

    let mut out: Vec<GeneratedFile> = scripts
        .into_iter()
        .map(|script| {
            GeneratedFile::write(
                Path::new(Category::Hook.dir_name()).join(prefixed_path(&script.path, ctx)),
                script.raw.clone(),
            )
        })
        .collect();
    out.push(document_file(target, content, config.strategy)?);
    Ok(out)
}

/// The brand's MCP server definition wrapped under `servers_key`.
pub(crate) fn mcp(
    source: &TemplateSource,
    ctx: &TransformContext<'_>,
) -> Result<Vec<GeneratedFile>> {
    let config = &ctx.tool.mcp;
    let Some(target) = config
        .target
        .as_deref()
        .filter(|_| config.strategy != DocStrategy::None)
    else {
        return Ok(Vec::new());
    };

    let files = source.list(Category::Mcp)?;
    let Some(definition) = files.iter().find(|f| f.path == Path::new(MCP_DOCUMENT)) else {
        tracing::debug!(
            target: "brain::transform",
            tool = %ctx.tool.name,
            "No MCP server definition in source"
        );
        return Ok(Vec::new());
    };

    let mut server = parse_json(definition, Category::Mcp)?;
    let root = ctx.root.to_string_lossy();
    rewrite_strings(&mut server, &mut |text| Ok(text.replace(ROOT_TOKEN, &root)))?;

    let mut servers = Map::new();
    servers.insert(ctx.brand.name.clone(), server);
    let mut content = Map::new();
    content.insert(config.servers_key.clone(), Value::Object(servers));

    Ok(vec![document_file(target, Value::Object(content), config.strategy)?])
}

/// `{name, version, description?}` for marketplace-style tools.
pub(crate) fn descriptor(ctx: &TransformContext<'_>) -> Result<Option<GeneratedFile>> {
    if ctx.tool.manifest.kind != ManifestType::Marketplace {
        return Ok(None);
    }
    let mut doc = json!({
        "name": ctx.brand.name,
        "version": ctx.brand.version,
    });
    if let (Some(description), Some(map)) = (&ctx.brand.description, doc.as_object_mut()) {
        map.insert("description".into(), Value::String(description.clone()));
    }
    let path = ctx.tool.manifest.descriptor.clone();
    Ok(Some(GeneratedFile::write(path.clone(), to_json_bytes(&path, &doc)?)))
}

fn document_file(target: &Path, content: Value, strategy: DocStrategy) -> Result<GeneratedFile> {
    match strategy {
        DocStrategy::Merge => {
            let payload = MergePayload::from_content(content);
            let bytes = serde_json::to_vec(&payload).map_err(|source| TransformError::Json {
                path: target.to_path_buf(),
                source,
            })?;
            Ok(GeneratedFile {
                path: target.to_path_buf(),
                content: bytes,
                kind: FileKind::Merge,
            })
        }
        _ => Ok(GeneratedFile::write(target, to_json_bytes(target, &content)?)),
    }
}

fn parse_json(file: &CanonicalFile, category: Category) -> Result<Value> {
    serde_json::from_slice(&file.raw).map_err(|source| TransformError::Json {
        path: Path::new(category.dir_name()).join(&file.path),
        source,
    })
}

fn to_json_bytes(path: &Path, value: &Value) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|source| TransformError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Applies `f` to every string in `value`, keys excluded.
fn rewrite_strings(
    value: &mut Value,
    f: &mut dyn FnMut(&str) -> Result<String>,
) -> Result<()> {
    match value {
        Value::String(s) => *s = f(s)?,
        Value::Array(items) => {
            for item in items {
                rewrite_strings(item, f)?;
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                rewrite_strings(item, f)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn rewrite_hook_refs(
    text: &str,
    available: &BTreeSet<String>,
    hooks_dir: &Path,
    ctx: &TransformContext<'_>,
) -> Result<String> {
    let mut missing = None;
    let rewritten = HOOK_SCRIPT_RE.replace_all(text, |caps: &Captures<'_>| {
        let script = &caps[1];
        if !available.contains(script) {
            missing.get_or_insert_with(|| script.to_string());
        }
        hooks_dir
            .join(prefixed_path(Path::new(script), ctx))
            .to_string_lossy()
            .into_owned()
    });
    match missing {
        Some(script) => Err(TransformError::MissingScript { script }),
        None => Ok(rewritten.into_owned()),
    }
}

/// Prefixes the first component of a relative path with the brand marker.
fn prefixed_path(path: &Path, ctx: &TransformContext<'_>) -> PathBuf {
    let mut components = path.components();
    let Some(first) = components.next() else {
        return PathBuf::new();
    };
    let mut out = PathBuf::from(ctx.prefixed(&first.as_os_str().to_string_lossy()));
    let rest = components.as_path();
    if !rest.as_os_str().is_empty() {
        out.push(rest);
    }
    out
}
