use crate::{GeneratedFile, Result, TransformContext, TransformError};
use brain_source::{Category, TemplateSource, SKILL_FILE};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Copies skill directories verbatim; only the directory name is prefixed.
pub(crate) fn transform(
    source: &TemplateSource,
    ctx: &TransformContext<'_>,
) -> Result<Vec<GeneratedFile>> {
    let mut by_skill: BTreeMap<String, Vec<(PathBuf, Vec<u8>)>> = BTreeMap::new();
    for file in source.list(Category::Skill)? {
        let mut components = file.path.components();
        let (Some(Component::Normal(dir)), rest) = (components.next(), components.as_path())
        else {
            continue;
        };
        if rest.as_os_str().is_empty() {
            tracing::warn!(
                target: "brain::transform",
                path = %file.path.display(),
                "Ignoring loose file outside a skill directory"
            );
            continue;
        }
        by_skill
            .entry(dir.to_string_lossy().into_owned())
            .or_default()
            .push((rest.to_path_buf(), file.raw));
    }

    let mut out = Vec::new();
    for (skill, files) in by_skill {
        if !files.iter().any(|(rel, _)| rel == Path::new(SKILL_FILE)) {
            return Err(TransformError::MissingSkillFile { skill });
        }
        let base = Path::new(Category::Skill.dir_name()).join(ctx.prefixed(&skill));
        out.extend(
            files
                .into_iter()
                .map(|(rel, raw)| GeneratedFile::write(base.join(rel), raw)),
        );
    }
    Ok(out)
}
