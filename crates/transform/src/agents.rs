use crate::{GeneratedFile, Result, TransformContext, TransformError};
use brain_source::{render_document, CanonicalFile, Category, Frontmatter, TemplateSource};
use serde_yaml::Value;
use std::path::Path;

pub(crate) fn transform(
    source: &TemplateSource,
    ctx: &TransformContext<'_>,
) -> Result<Vec<GeneratedFile>> {
    let mut out = Vec::new();
    for agent in source.list(Category::Agent)? {
        if !agent.is_top_level() || !agent.is_markdown() {
            continue;
        }
        if let Some(file) = transform_agent(&agent, ctx)? {
            out.push(file);
        }
    }
    Ok(out)
}

fn transform_agent(agent: &CanonicalFile, ctx: &TransformContext<'_>) -> Result<Option<GeneratedFile>> {
    let name = agent.stem();
    let mut frontmatter = agent.frontmatter.clone();

    if let Some(select) = &ctx.tool.agents.select {
        match select.get(name) {
            Some(Some(overrides)) => {
                for (key, value) in overrides {
                    frontmatter.insert(key.clone(), value.clone());
                }
            }
            Some(None) | None => {
                tracing::debug!(
                    target: "brain::transform",
                    tool = %ctx.tool.name,
                    agent = name,
                    "Agent not selected for tool"
                );
                return Ok(None);
            }
        }
    }

    let projected = project(&frontmatter, &ctx.tool.agents.frontmatter);
    let path = Path::new(Category::Agent.dir_name()).join(format!(
        "{}{}",
        ctx.prefixed(name),
        ctx.tool.agents.extension
    ));
    let content = render_document(&projected, &agent.body).map_err(|message| {
        TransformError::Render {
            path: path.clone(),
            message,
        }
    })?;
    Ok(Some(GeneratedFile::write(path, content)))
}

/// Keeps only `fields`, in the order they are listed.
fn project(frontmatter: &Frontmatter, fields: &[String]) -> Frontmatter {
    let mut projected = Frontmatter::new();
    for field in fields {
        if let Some(value) = frontmatter.get(field.as_str()) {
            projected.insert(Value::String(field.clone()), value.clone());
        }
    }
    projected
}
