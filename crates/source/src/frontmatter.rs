use crate::types::Frontmatter;

/// A Markdown document split into frontmatter and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Parsed fields; empty when the document has none.
    pub frontmatter: Frontmatter,
    /// Everything after the closing delimiter line, verbatim.
    pub body: String,
    /// Whether a frontmatter block was present (possibly empty).
    pub has_frontmatter: bool,
}

const DELIMITER: &str = "---";

fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n']).trim_end() == DELIMITER
}

/// Splits and parses a Markdown document.
///
/// A frontmatter block starts with a `---` line at the very top of the file
/// and ends at the next `---` line. An unterminated block, invalid YAML, or
/// YAML that is not a mapping is an error; a document that does not start
/// with `---` simply has no frontmatter.
///
/// ```
/// use brain_source::parse_document;
///
/// let doc = parse_document("---\nmodel: opus\ncolor: red\n---\n# Body\n").unwrap();
/// let keys: Vec<_> = doc.frontmatter.keys().filter_map(|k| k.as_str()).collect();
/// assert_eq!(keys, ["model", "color"]);
/// assert_eq!(doc.body, "# Body\n");
///
/// assert!(parse_document("---\nmodel: opus\n").is_err());
/// ```
pub fn parse_document(content: &str) -> Result<Document, String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');

    match lines.next() {
        Some(first) if is_delimiter(first) => {}
        _ => {
            return Ok(Document {
                frontmatter: Frontmatter::new(),
                body: content.to_string(),
                has_frontmatter: false,
            })
        }
    }

    let yaml_start = content
        .find('\n')
        .map(|i| i + 1)
        .unwrap_or(content.len());
    let mut offset = yaml_start;
    for line in lines {
        if is_delimiter(line) {
            let yaml = &content[yaml_start..offset];
            let body = &content[offset + line.len()..];
            let frontmatter = parse_yaml_mapping(yaml)?;
            return Ok(Document {
                frontmatter,
                body: body.to_string(),
                has_frontmatter: true,
            });
        }
        offset += line.len();
    }

    Err("frontmatter opened with '---' is never closed".to_string())
}

fn parse_yaml_mapping(yaml: &str) -> Result<Frontmatter, String> {
    if yaml.trim().is_empty() {
        return Ok(Frontmatter::new());
    }
    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| format!("invalid YAML: {e}"))?;
    match value {
        serde_yaml::Value::Mapping(map) => Ok(map),
        serde_yaml::Value::Null => Ok(Frontmatter::new()),
        _ => Err("frontmatter must be a mapping of fields".to_string()),
    }
}

/// Renders frontmatter and body back into a Markdown document.
///
/// An empty frontmatter renders as the body alone.
pub fn render_document(frontmatter: &Frontmatter, body: &str) -> Result<String, String> {
    if frontmatter.is_empty() {
        return Ok(body.to_string());
    }
    let yaml = serde_yaml::to_string(frontmatter).map_err(|e| e.to_string())?;
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
}
