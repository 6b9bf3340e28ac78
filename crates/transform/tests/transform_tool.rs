//! Per-category transform behavior against on-disk template trees.

use brain_config::{parse_config, BrainConfig};
use brain_source::TemplateSource;
use brain_test_utils::TemplateFixture;
use brain_transform::{transform_all, FileKind, TransformContext, TransformError, TransformOutput};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// One-tool config with the given `placement`/`prefix` and extra YAML
/// appended to the tool record.
fn config(placement: &str, prefix: bool, tool_overrides: &str) -> BrainConfig {
    // A direct install owns a subtree below the config dir, never the dir itself.
    let scope = if placement == "direct" { "plugins/brain" } else { "." };
    let mut record = format!(
        r#"
    display_name: Tool
    placement: {placement}
    config_dir: /home/u/.tool
    prefix: {prefix}
    scopes: {{ global: "{scope}" }}
    default_scope: global
    detection:
      brain_installed: {{ type: prefix_scan, dirs: [agents] }}
"#
    );
    for (key, default) in [
        ("agents", "agents: { frontmatter: [model, color] }"),
        ("rules", "rules: { extension: .md }"),
        ("hooks", "hooks: { strategy: none }"),
        ("mcp", "mcp: { strategy: none }"),
        ("manifest", "manifest: { type: file_list }"),
    ] {
        if !tool_overrides.contains(&format!("{key}:")) {
            record.push_str(&format!("    {default}\n"));
        }
    }
    for line in tool_overrides.lines().filter(|l| !l.trim().is_empty()) {
        record.push_str(&format!("    {line}\n"));
    }
    let yaml = format!("brand:\n  version: 1.2.3\ntools:\n  tool:{record}");
    parse_config(&yaml, Path::new("test.yaml")).unwrap()
}

fn run(fixture: &TemplateFixture, config: &BrainConfig) -> Result<TransformOutput, TransformError> {
    let tool = &config.tools["tool"];
    let source = TemplateSource::open(fixture.root()).unwrap();
    let ctx = TransformContext::new(tool, &config.brand, tool.scope_root(None).unwrap());
    transform_all(&source, &ctx)
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn paths(files: &[brain_transform::GeneratedFile]) -> Vec<PathBuf> {
    files.iter().map(|f| f.path.clone()).collect()
}

#[test]
fn agent_frontmatter_is_projected_in_listed_order() {
    // GIVEN an agent with model, description and color
    let fixture = TemplateFixture::sample().unwrap();
    let config = config("direct", true, "");

    // WHEN transformed for a tool keeping model and color
    let output = run(&fixture, &config).unwrap();

    // THEN description is dropped and the listed order is kept
    assert_eq!(paths(&output.agents), [PathBuf::from("agents/🧠-architect.md")]);
    assert_eq!(
        text(&output.agents[0].content),
        "---\nmodel: opus\ncolor: blue\n---\nYou design systems.\n"
    );
}

#[test]
fn agents_select_skips_null_and_unlisted_agents() {
    let fixture = TemplateFixture::new().unwrap();
    fixture.agent("architect", "---\nmodel: opus\n---\nA\n").unwrap();
    fixture.agent("builder", "---\nmodel: opus\n---\nB\n").unwrap();
    fixture.agent("critic", "---\nmodel: opus\n---\nC\n").unwrap();
    let config = config(
        "direct",
        false,
        "agents: { frontmatter: [model], select: { architect: { model: sonnet }, builder: null } }",
    );

    let output = run(&fixture, &config).unwrap();

    assert_eq!(paths(&output.agents), [PathBuf::from("agents/architect.md")]);
    assert_eq!(text(&output.agents[0].content), "---\nmodel: sonnet\n---\nA\n");
}

#[test]
fn agent_extension_is_configurable() {
    let fixture = TemplateFixture::sample().unwrap();
    let config = config(
        "direct",
        false,
        "agents: { frontmatter: [model], extension: .agent.md }",
    );
    let output = run(&fixture, &config).unwrap();
    assert_eq!(
        paths(&output.agents),
        [PathBuf::from("agents/architect.agent.md")]
    );
}

#[test]
fn rule_extension_follows_tool() {
    let fixture = TemplateFixture::sample().unwrap();

    let md = run(&fixture, &config("direct", false, "rules: { extension: .md }")).unwrap();
    assert_eq!(paths(&md.rules), [PathBuf::from("rules/style.md")]);

    let mdc = run(&fixture, &config("direct", true, "rules: { extension: .mdc }")).unwrap();
    assert_eq!(paths(&mdc.rules), [PathBuf::from("rules/🧠-style.mdc")]);
}

#[test]
fn extra_rule_frontmatter_overrides_rule_fields() {
    let fixture = TemplateFixture::new().unwrap();
    fixture
        .rule("style", "---\nscope: backend\nalwaysApply: false\n---\nBody\n")
        .unwrap();
    let config = config(
        "copy_and_merge",
        false,
        "rules: { extension: .mdc, extra_frontmatter: { alwaysApply: true, source: brain } }",
    );

    let output = run(&fixture, &config).unwrap();

    assert_eq!(
        text(&output.rules[0].content),
        "---\nscope: backend\nalwaysApply: true\nsource: brain\n---\nBody\n"
    );
}

#[test]
fn skills_copy_whole_directory_with_prefixed_name() {
    let fixture = TemplateFixture::sample().unwrap();
    let output = run(&fixture, &config("direct", true, "")).unwrap();
    assert_eq!(
        paths(&output.skills),
        [
            PathBuf::from("skills/🧠-review/SKILL.md"),
            PathBuf::from("skills/🧠-review/checklist.txt"),
        ]
    );
    assert_eq!(output.skills[1].content, b"- tests pass\n");
}

#[test]
fn skill_notes_starting_with_a_rule_are_copied_verbatim() {
    let fixture = TemplateFixture::new().unwrap();
    fixture
        .file("skills/review/SKILL.md", "---\nname: review\n---\nReview.\n")
        .unwrap();
    fixture
        .file("skills/review/notes.md", "---\nNot frontmatter, just a rule.\n")
        .unwrap();

    let output = run(&fixture, &config("copy_and_merge", true, "")).unwrap();

    assert_eq!(
        paths(&output.skills),
        [
            PathBuf::from("skills/🧠-review/SKILL.md"),
            PathBuf::from("skills/🧠-review/notes.md"),
        ]
    );
    assert_eq!(output.skills[1].content, b"---\nNot frontmatter, just a rule.\n");
}

#[test]
fn skill_without_skill_file_is_an_error() {
    let fixture = TemplateFixture::new().unwrap();
    fixture.file("skills/broken/notes.md", "no skill file").unwrap();
    let err = run(&fixture, &config("direct", false, "")).unwrap_err();
    assert!(matches!(err, TransformError::MissingSkillFile { skill } if skill == "broken"));
}

#[test]
fn command_fragments_are_appended_in_lexicographic_order() {
    let fixture = TemplateFixture::new().unwrap();
    fixture.file("commands/ship.md", "# Ship").unwrap();
    fixture.file("commands/ship/02-push.md", "Push.\n").unwrap();
    fixture.file("commands/ship/01-plan.md", "Plan.\n").unwrap();

    let output = run(&fixture, &config("direct", false, "")).unwrap();

    assert_eq!(paths(&output.commands), [PathBuf::from("commands/ship.md")]);
    assert_eq!(text(&output.commands[0].content), "# Ship\nPlan.\nPush.\n");
}

#[test]
fn command_fragment_list_restricts_and_is_not_emitted() {
    let fixture = TemplateFixture::new().unwrap();
    fixture
        .file(
            "commands/ship.md",
            "---\ndescription: Ship\nfragments: [02-push.md]\n---\n",
        )
        .unwrap();
    fixture.file("commands/ship/01-plan.md", "Plan.\n").unwrap();
    fixture.file("commands/ship/02-push.md", "Push.\n").unwrap();

    let output = run(&fixture, &config("direct", false, "")).unwrap();

    assert_eq!(
        text(&output.commands[0].content),
        "---\ndescription: Ship\n---\nPush.\n"
    );
}

#[test]
fn missing_listed_fragment_is_an_error() {
    let fixture = TemplateFixture::new().unwrap();
    fixture
        .file("commands/ship.md", "---\nfragments: [03-gone.md]\n---\n")
        .unwrap();
    let err = run(&fixture, &config("direct", false, "")).unwrap_err();
    assert!(matches!(
        err,
        TransformError::MissingFragment { command, fragment }
            if command == "ship" && fragment == "03-gone.md"
    ));
}

#[test]
fn hooks_merge_payload_rewrites_script_paths() {
    let fixture = TemplateFixture::sample().unwrap();
    let config = config(
        "copy_and_merge",
        true,
        "hooks: { strategy: merge, target: hooks.json }",
    );

    let output = run(&fixture, &config).unwrap();

    assert_eq!(
        paths(&output.hooks),
        [PathBuf::from("hooks/🧠-stop.sh"), PathBuf::from("hooks.json")]
    );
    let doc = &output.hooks[1];
    assert_eq!(doc.kind, FileKind::Merge);
    let payload = doc.merge_payload().unwrap();
    assert_eq!(payload.managed_keys, ["hooks.Stop"]);
    assert_eq!(
        payload.content,
        json!({"hooks": {"Stop": [{
            "type": "command",
            "command": "/home/u/.tool/hooks/🧠-stop.sh"
        }]}})
    );
}

#[test]
fn hook_reference_to_missing_script_is_an_error() {
    let fixture = TemplateFixture::new().unwrap();
    fixture
        .file(
            "hooks/hooks.json",
            r#"{"hooks":{"Stop":[{"command":"${HOOKS_DIR}/gone.sh"}]}}"#,
        )
        .unwrap();
    let config = config("direct", false, "hooks: { strategy: direct, target: hooks/hooks.json }");
    let err = run(&fixture, &config).unwrap_err();
    assert!(matches!(err, TransformError::MissingScript { script } if script == "gone.sh"));
}

#[test]
fn hooks_strategy_none_emits_nothing() {
    let fixture = TemplateFixture::sample().unwrap();
    let output = run(&fixture, &config("direct", true, "")).unwrap();
    assert!(output.hooks.is_empty());
    assert!(output.mcp.is_empty());
}

#[test]
fn mcp_definition_is_wrapped_under_brand_name() {
    let fixture = TemplateFixture::sample().unwrap();
    let config = config(
        "direct",
        false,
        "mcp: { strategy: direct, target: .mcp.json, servers_key: servers }",
    );

    let output = run(&fixture, &config).unwrap();

    assert_eq!(output.mcp.len(), 1);
    assert_eq!(output.mcp[0].kind, FileKind::Write);
    let doc: Value = serde_json::from_slice(&output.mcp[0].content).unwrap();
    assert_eq!(
        doc,
        json!({"servers": {"brain": {
            "command": "/home/u/.tool/plugins/brain/bin/brain-mcp",
            "args": ["serve"]
        }}})
    );
}

#[test]
fn marketplace_tools_get_a_plugin_descriptor() {
    let fixture = TemplateFixture::sample().unwrap();
    let config = config("direct", true, "manifest: { type: marketplace }");
    let output = run(&fixture, &config).unwrap();

    let descriptor = output.descriptor.as_ref().unwrap();
    assert_eq!(descriptor.path, Path::new(".claude-plugin/plugin.json"));
    let doc: Value = serde_json::from_slice(&descriptor.content).unwrap();
    assert_eq!(doc, json!({"name": "brain", "version": "1.2.3"}));
}

#[test]
fn file_list_tools_have_no_descriptor() {
    let fixture = TemplateFixture::sample().unwrap();
    let output = run(&fixture, &config("copy_and_merge", true, "")).unwrap();
    assert!(output.descriptor.is_none());
}
