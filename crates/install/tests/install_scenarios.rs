//! End-to-end install and uninstall of configured tools on a sandboxed home.

mod common;

use brain_config::ManifestType;
use brain_install::{
    CancelToken, InstallError, InstallStatus, LogBuffer, PlacementError, StepStatus, ToolInstaller,
};
use brain_state::ManagedKey;
use brain_test_utils::{snapshot_tree, TemplateFixture};
use common::{read_json, Sandbox, CLAUDE, CURSOR};
use serde_json::json;
use std::fs;

fn install(installer: &dyn ToolInstaller, sandbox: &Sandbox) -> Result<brain_install::InstallReport, InstallError> {
    installer.install(&sandbox.request(), &mut LogBuffer::new(), &CancelToken::new())
}

fn uninstall(installer: &dyn ToolInstaller, sandbox: &Sandbox) -> Result<brain_install::InstallReport, InstallError> {
    installer.uninstall(&sandbox.request(), &mut LogBuffer::new(), &CancelToken::new())
}

#[test]
fn direct_install_on_empty_target() {
    // GIVEN an empty Claude config dir and the sample templates
    let sandbox = Sandbox::sample();
    sandbox.tool_present(".claude");
    let config = sandbox.config(CLAUDE);
    let installer = sandbox.installer(&config, "claude");

    // WHEN installing
    let report = install(&installer, &sandbox).unwrap();

    // THEN the agent keeps model then color and the manifest records it
    let root = sandbox.path(".claude/plugins/brain");
    let agent = root.join("agents/🧠-architect.md");
    assert_eq!(
        fs::read_to_string(&agent).unwrap(),
        "---\nmodel: opus\ncolor: blue\n---\nYou design systems.\n"
    );
    assert_eq!(report.root, root);

    let manifest = sandbox.store().read("claude").unwrap().unwrap();
    assert_eq!(manifest.manifest_type, ManifestType::Marketplace);
    assert!(manifest.files.contains(&agent));
    assert_eq!(manifest.managed_subtree.as_deref(), Some(root.as_path()));
    assert!(root.join(".claude-plugin/plugin.json").is_file());
    assert!(installer.is_brain_installed());
}

#[test]
fn every_written_file_is_covered_by_the_manifest() {
    let sandbox = Sandbox::sample();
    sandbox.tool_present(".claude");
    sandbox.tool_present(".cursor");
    let config = sandbox.config(&format!("{CLAUDE}{CURSOR}"));

    for tool in ["claude", "cursor"] {
        let installer = sandbox.installer(&config, tool);
        install(&installer, &sandbox).unwrap();
        let manifest = sandbox.store().read(tool).unwrap().unwrap();
        let dir = installer.config_dir();
        for (rel, _) in snapshot_tree(&dir).unwrap() {
            let path = dir.join(&rel);
            let shared = manifest.shared_documents().contains(&path.as_path());
            assert!(
                manifest.covers(&path) || shared,
                "{tool}: {} is not recorded",
                path.display()
            );
        }
    }
}

#[test]
fn copy_and_merge_keeps_user_hooks_through_install_and_uninstall() {
    // GIVEN user hooks next to a brand hook document without scripts
    let templates = TemplateFixture::new().unwrap();
    templates
        .file("hooks/hooks.json", r#"{"hooks": {"Stop": [{"id": "brand-stop"}]}}"#)
        .unwrap();
    templates.agent("architect", "---\nmodel: opus\n---\nA\n").unwrap();
    let sandbox = Sandbox::new(templates);
    let dir = sandbox.tool_present(".cursor");
    let hooks = dir.join("hooks.json");
    fs::write(
        &hooks,
        r#"{"hooks": {"Stop": [{"id": "user-stop"}], "PreSave": [{"id": "user-pre"}]}}"#,
    )
    .unwrap();
    let config = sandbox.config(CURSOR);
    let installer = sandbox.installer(&config, "cursor");

    // WHEN installing
    install(&installer, &sandbox).unwrap();

    // THEN the brand array replaces Stop and PreSave is untouched
    assert_eq!(
        read_json(&hooks),
        json!({"hooks": {"Stop": [{"id": "brand-stop"}], "PreSave": [{"id": "user-pre"}]}})
    );
    let manifest = sandbox.store().read("cursor").unwrap().unwrap();
    assert!(manifest.managed_keys.contains(&ManagedKey {
        file: hooks.clone(),
        path: "hooks.Stop".into(),
    }));

    // WHEN uninstalling
    uninstall(&installer, &sandbox).unwrap();

    // THEN only the managed key is gone
    assert_eq!(read_json(&hooks), json!({"hooks": {"PreSave": [{"id": "user-pre"}]}}));
    assert!(!dir.join("agents/🧠-architect.md").exists());
    assert!(sandbox.store().read("cursor").unwrap().is_none());
}

#[test]
fn merge_into_missing_shared_documents() {
    let sandbox = Sandbox::sample();
    let dir = sandbox.tool_present(".cursor");
    let config = sandbox.config(CURSOR);
    let installer = sandbox.installer(&config, "cursor");

    install(&installer, &sandbox).unwrap();

    let mcp = read_json(&dir.join("mcp.json"));
    assert_eq!(
        mcp["mcpServers"]["brain"]["command"],
        json!(format!("{}/bin/brain-mcp", dir.display()))
    );
    let hooks = read_json(&dir.join("hooks.json"));
    assert_eq!(
        hooks["hooks"]["Stop"][0]["command"],
        json!(format!("{}/hooks/🧠-stop.sh", dir.display()))
    );
    assert!(dir.join("hooks/🧠-stop.sh").is_file());
    assert!(installer.is_brain_installed());

    // Both documents were created by the install, so uninstall removes them.
    uninstall(&installer, &sandbox).unwrap();
    assert!(!dir.join("mcp.json").exists());
    assert!(!dir.join("hooks.json").exists());
    assert!(snapshot_tree(&dir).unwrap().is_empty());
}

#[test]
fn user_hooks_added_after_install_survive_reinstall_and_uninstall() {
    // GIVEN an install that created hooks.json and its "hooks" object
    let sandbox = Sandbox::sample();
    let dir = sandbox.tool_present(".cursor");
    let hooks = dir.join("hooks.json");
    let config = sandbox.config(CURSOR);
    let installer = sandbox.installer(&config, "cursor");
    install(&installer, &sandbox).unwrap();
    let manifest = sandbox.store().read("cursor").unwrap().unwrap();
    assert!(manifest.managed_keys.contains(&ManagedKey {
        file: hooks.clone(),
        path: "hooks.Stop".into(),
    }));
    assert!(manifest.created_parents.contains(&ManagedKey {
        file: hooks.clone(),
        path: "hooks".into(),
    }));

    // AND a user hook added beside the brand hook afterwards
    let mut doc = read_json(&hooks);
    doc["hooks"]["PreSave"] = json!([{"id": "user-pre"}]);
    fs::write(&hooks, serde_json::to_vec(&doc).unwrap()).unwrap();

    // WHEN reinstalling
    install(&installer, &sandbox).unwrap();

    // THEN the user hook is still there next to the brand hook
    let after = read_json(&hooks);
    assert_eq!(after["hooks"]["PreSave"], json!([{"id": "user-pre"}]));
    assert!(after["hooks"]["Stop"].is_array());

    // WHEN uninstalling
    uninstall(&installer, &sandbox).unwrap();

    // THEN only the brand hook is gone
    assert_eq!(read_json(&hooks), json!({"hooks": {"PreSave": [{"id": "user-pre"}]}}));
    assert!(!dir.join("mcp.json").exists());
}

#[test]
fn failed_undo_reports_rollback_incomplete_with_remnants() {
    // GIVEN an install whose shared hooks document was corrupted since
    let sandbox = Sandbox::sample();
    let dir = sandbox.tool_present(".cursor");
    let config = sandbox.config(CURSOR);
    let installer = sandbox.installer(&config, "cursor");
    install(&installer, &sandbox).unwrap();
    fs::write(dir.join("hooks.json"), "{ not json").unwrap();

    // AND the temp path used to restore one agent is blocked by a directory
    let agent = dir.join("agents/🧠-architect.md");
    fs::create_dir_all(dir.join("agents/.🧠-architect.md.brain-tmp/held")).unwrap();

    // WHEN uninstalling
    let err = uninstall(&installer, &sandbox).unwrap_err();

    // THEN unmerge failed and restoring the removed files failed too
    assert_eq!(err.kind(), "RollbackIncomplete");
    let InstallError::RollbackIncomplete {
        cause,
        failures,
        remnants,
    } = &err
    else {
        panic!("expected RollbackIncomplete, got {err:?}");
    };
    assert!(matches!(**cause, InstallError::Placement(PlacementError::Json { .. })), "{cause}");
    let failed: Vec<&str> = failures.iter().map(|(step, _)| step.as_str()).collect();
    assert_eq!(failed, ["remove-files"]);

    // AND the remnants list what is still on disk, not what was lost
    assert!(!agent.exists());
    assert!(!remnants.contains(&agent));
    assert!(remnants.contains(&dir.join("hooks.json")));
    assert!(remnants.contains(&dir.join("rules/🧠-style.mdc")));
    assert!(dir.join("rules/🧠-style.mdc").is_file());
    assert!(sandbox.store().read("cursor").unwrap().is_some());
    assert_eq!(InstallStatus::of(&Err(err)), InstallStatus::FailedRollbackIncomplete);
}

#[test]
fn rollback_on_merge_failure_restores_prior_install() {
    // GIVEN a successful install without MCP
    let sandbox = Sandbox::sample();
    let dir = sandbox.tool_present(".cursor");
    let without_mcp = sandbox.config(&CURSOR.replace(
        "mcp: { strategy: merge, target: mcp.json }",
        "mcp: { strategy: none }",
    ));
    install(&sandbox.installer(&without_mcp, "cursor"), &sandbox).unwrap();
    let files_before = snapshot_tree(&dir).unwrap();
    let manifest_before = fs::read(sandbox.store().path("cursor")).unwrap();

    // AND an MCP target that cannot be merged into
    fs::create_dir_all(dir.join("mcp.json")).unwrap();

    // WHEN reinstalling with MCP enabled
    let config = sandbox.config(CURSOR);
    let err = install(&sandbox.installer(&config, "cursor"), &sandbox).unwrap_err();

    // THEN place and clean-prior were undone and the manifest is untouched
    assert!(matches!(err, InstallError::Placement(PlacementError::Io { .. })));
    assert_eq!(InstallStatus::of(&Err(err)), InstallStatus::FailedRolledBack);
    assert_eq!(snapshot_tree(&dir).unwrap(), files_before);
    assert_eq!(fs::read(sandbox.store().path("cursor")).unwrap(), manifest_before);
}

#[test]
fn rollback_on_manifest_failure_restores_direct_subtree() {
    let sandbox = Sandbox::sample();
    sandbox.tool_present(".claude");
    let config = sandbox.config(CLAUDE);
    let installer = sandbox.installer(&config, "claude");
    install(&installer, &sandbox).unwrap();
    let root = sandbox.path(".claude/plugins/brain");
    let tree_before = snapshot_tree(&root).unwrap();
    let manifest_before = fs::read(sandbox.store().path("claude")).unwrap();

    // A new agent to place, and a manifest temp path that cannot be written.
    sandbox.templates.agent("builder", "---\nmodel: haiku\n---\nB\n").unwrap();
    fs::create_dir_all(sandbox.path("state/claude.json.tmp")).unwrap();

    let err = install(&installer, &sandbox).unwrap_err();
    assert!(matches!(err, InstallError::Manifest(_)), "{err}");
    assert_eq!(snapshot_tree(&root).unwrap(), tree_before);
    assert!(!root.join("agents/🧠-builder.md").exists());
    assert_eq!(fs::read(sandbox.store().path("claude")).unwrap(), manifest_before);
}

#[test]
fn reinstall_is_byte_identical() {
    let sandbox = Sandbox::sample();
    sandbox.tool_present(".claude");
    let cursor_dir = sandbox.tool_present(".cursor");
    fs::write(cursor_dir.join("hooks.json"), r#"{"hooks": {"PreSave": [1]}, "theme": "dark"}"#)
        .unwrap();
    let config = sandbox.config(&format!("{CLAUDE}{CURSOR}"));

    for tool in ["claude", "cursor"] {
        let installer = sandbox.installer(&config, tool);
        install(&installer, &sandbox).unwrap();
        let first = snapshot_tree(sandbox.home.path()).unwrap();

        let report = install(&installer, &sandbox).unwrap();
        assert_eq!(snapshot_tree(sandbox.home.path()).unwrap(), first, "{tool}");
        let clean = report.steps.iter().find(|s| s.name == "clean-prior").unwrap();
        assert_eq!(clean.status, StepStatus::Run);
    }
}

#[test]
fn uninstall_twice_reports_precondition() {
    let sandbox = Sandbox::sample();
    sandbox.tool_present(".claude");
    let config = sandbox.config(CLAUDE);
    let installer = sandbox.installer(&config, "claude");
    install(&installer, &sandbox).unwrap();

    uninstall(&installer, &sandbox).unwrap();
    let after_first = snapshot_tree(sandbox.home.path()).unwrap();
    let err = uninstall(&installer, &sandbox).unwrap_err();

    assert!(err.is_precondition(), "{err}");
    assert_eq!(snapshot_tree(sandbox.home.path()).unwrap(), after_first);
    assert!(!sandbox.path(".claude/plugins/brain").exists());
}

#[test]
fn install_requires_the_tool() {
    let sandbox = Sandbox::sample();
    let config = sandbox.config(CLAUDE);
    let installer = sandbox.installer(&config, "claude");

    let err = install(&installer, &sandbox).unwrap_err();
    assert!(err.is_precondition());
    assert!(!sandbox.path(".claude").exists());
    assert!(sandbox.store().read("claude").unwrap().is_none());
}

#[test]
fn detected_install_without_manifest_is_recovered() {
    // GIVEN brand files on disk but no manifest
    let sandbox = Sandbox::sample();
    let dir = sandbox.tool_present(".cursor");
    let config = sandbox.config(CURSOR);
    let installer = sandbox.installer(&config, "cursor");
    install(&installer, &sandbox).unwrap();
    fs::remove_file(sandbox.store().path("cursor")).unwrap();
    assert!(installer.is_brain_installed());

    // WHEN uninstalling
    uninstall(&installer, &sandbox).unwrap();

    // THEN the brand files and keys are gone
    assert!(!installer.is_brain_installed());
    assert!(!dir.join("rules/🧠-style.mdc").exists());
    assert!(!dir.join("mcp.json").exists());
}

#[test]
fn uninstall_ignores_files_already_removed() {
    let sandbox = Sandbox::sample();
    let dir = sandbox.tool_present(".cursor");
    let config = sandbox.config(CURSOR);
    let installer = sandbox.installer(&config, "cursor");
    install(&installer, &sandbox).unwrap();
    fs::remove_file(dir.join("rules/🧠-style.mdc")).unwrap();

    uninstall(&installer, &sandbox).unwrap();
    assert!(!dir.join("agents/🧠-architect.md").exists());
}

#[test]
fn cancelled_install_leaves_nothing_behind() {
    let sandbox = Sandbox::sample();
    let dir = sandbox.tool_present(".cursor");
    let config = sandbox.config(CURSOR);
    let installer = sandbox.installer(&config, "cursor");
    let cancel = CancelToken::new();
    cancel.cancel();

    let mut log = LogBuffer::new();
    let err = installer
        .install(&sandbox.request(), &mut log, &cancel)
        .unwrap_err();

    assert!(matches!(err, InstallError::Cancelled));
    assert!(snapshot_tree(&dir).unwrap().is_empty());
    assert!(!log.is_empty());
}

#[test]
fn unknown_scope_is_a_precondition_failure() {
    let sandbox = Sandbox::sample();
    sandbox.tool_present(".claude");
    let config = sandbox.config(CLAUDE);
    let installer = sandbox.installer(&config, "claude");
    let mut request = sandbox.request();
    request.scope = Some("project".into());

    let err = installer
        .install(&request, &mut LogBuffer::new(), &CancelToken::new())
        .unwrap_err();
    assert!(err.is_precondition());
}
