use crate::{GeneratedFile, Result, TransformContext, TransformError};
use brain_source::{render_document, CanonicalFile, Category, Frontmatter, TemplateSource};
use serde_yaml::Value;
use std::collections::BTreeSet;
use std::path::{Component, Path};

/// Frontmatter key restricting which fragments are composed.
const FRAGMENTS_KEY: &str = "fragments";

/// Emits one file per top-level command, composing fragments from the
/// sibling `commands/<name>/` directory in lexicographic order.
pub(crate) fn transform(
    source: &TemplateSource,
    ctx: &TransformContext<'_>,
) -> Result<Vec<GeneratedFile>> {
    let files = source.list(Category::Command)?;
    let (commands, fragments): (Vec<_>, Vec<_>) =
        files.iter().partition(|f| f.is_top_level());

    let mut out = Vec::new();
    let mut composed = BTreeSet::new();
    for command in commands.into_iter().filter(|c| c.is_markdown()) {
        let name = command.stem();
        let own: Vec<&CanonicalFile> = fragments
            .iter()
            .copied()
            .filter(|f| first_component(&f.path) == Some(name))
            .collect();
        composed.insert(name.to_string());
        out.push(compose(command, &own, ctx)?);
    }

    for orphan in fragments
        .iter()
        .copied()
        .filter_map(|f| first_component(&f.path))
        .collect::<BTreeSet<_>>()
    {
        if !composed.contains(orphan) {
            tracing::warn!(
                target: "brain::transform",
                command = orphan,
                "Fragment directory has no command file"
            );
        }
    }
    Ok(out)
}

fn compose(
    command: &CanonicalFile,
    fragments: &[&CanonicalFile],
    ctx: &TransformContext<'_>,
) -> Result<GeneratedFile> {
    let name = command.stem();
    let wanted = command
        .frontmatter
        .get(FRAGMENTS_KEY)
        .cloned()
        .map(|value| fragment_list(name, value))
        .transpose()?;
    let frontmatter: Frontmatter = command
        .frontmatter
        .iter()
        .filter(|(key, _)| key.as_str() != Some(FRAGMENTS_KEY))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let selected: Vec<&CanonicalFile> = match &wanted {
        Some(wanted) => {
            for fragment in wanted {
                if !fragments.iter().any(|f| fragment_name(f) == *fragment) {
                    return Err(TransformError::MissingFragment {
                        command: name.to_string(),
                        fragment: fragment.clone(),
                    });
                }
            }
            fragments
                .iter()
                .copied()
                .filter(|f| wanted.contains(&fragment_name(f)))
                .collect()
        }
        None => fragments.to_vec(),
    };

    let mut body = command.body.clone();
    for fragment in selected {
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
        if fragment.is_markdown() {
            body.push_str(&fragment.body);
        } else {
            body.push_str(&String::from_utf8_lossy(&fragment.raw));
        }
    }

    let path = Path::new(Category::Command.dir_name()).join(format!("{}.md", ctx.prefixed(name)));
    let content = render_document(&frontmatter, &body).map_err(|message| TransformError::Render {
        path: path.clone(),
        message,
    })?;
    Ok(GeneratedFile::write(path, content))
}

fn fragment_list(command: &str, value: Value) -> Result<BTreeSet<String>> {
    let invalid = |message: &str| TransformError::InvalidFragments {
        command: command.to_string(),
        message: message.to_string(),
    };
    let Value::Sequence(items) = value else {
        return Err(invalid("expected a list of fragment names"));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            _ => Err(invalid("fragment names must be strings")),
        })
        .collect()
}

/// Fragment path relative to its command's directory (`01-intro.md`).
fn fragment_name(fragment: &CanonicalFile) -> String {
    let mut components = fragment.path.components();
    components.next();
    components.as_path().to_string_lossy().into_owned()
}

fn first_component(path: &Path) -> Option<&str> {
    match path.components().next() {
        Some(Component::Normal(first)) => first.to_str(),
        _ => None,
    }
}
