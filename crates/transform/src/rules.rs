use crate::{GeneratedFile, Result, TransformContext, TransformError};
use brain_source::{render_document, Category, TemplateSource};
use std::path::Path;

/// Rules get the tool's extension and `extra_frontmatter` laid over their own
/// fields; configured keys always win.
pub(crate) fn transform(
    source: &TemplateSource,
    ctx: &TransformContext<'_>,
) -> Result<Vec<GeneratedFile>> {
    let rules_config = &ctx.tool.rules;
    let mut out = Vec::new();
    for rule in source.list(Category::Rule)? {
        if !rule.is_top_level() || !rule.is_markdown() {
            continue;
        }
        let mut frontmatter = rule.frontmatter.clone();
        for (key, value) in &rules_config.extra_frontmatter {
            frontmatter.insert(key.clone(), value.clone());
        }

        let path = Path::new(Category::Rule.dir_name()).join(format!(
            "{}{}",
            ctx.prefixed(rule.stem()),
            rules_config.extension
        ));
        let content =
            render_document(&frontmatter, &rule.body).map_err(|message| TransformError::Render {
                path: path.clone(),
                message,
            })?;
        out.push(GeneratedFile::write(path, content));
    }
    Ok(out)
}
