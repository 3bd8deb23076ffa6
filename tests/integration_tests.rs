// tests/integration_tests.rs

use std::fs;
use std::path::Path;

#[test]
fn test_example_config_parses() {
    let content =
        fs::read_to_string("flightboard.example.toml").expect("Failed to read example config");
    let table: toml::Table = toml::from_str(&content).expect("Example config is not valid TOML");

    for key in [
        "url",
        "refresh_ms",
        "timeout_secs",
        "view",
        "theme",
        "numeric_policy",
        "sequence_guard",
        "timezone",
        "site",
        "error_message",
        "log_enabled",
    ] {
        assert!(table.contains_key(key), "example config missing {key}");
    }
    assert_eq!(
        table.get("error_message").and_then(|v| v.as_str()),
        Some("No connection to server")
    );
    assert_eq!(table.get("refresh_ms").and_then(|v| v.as_integer()), Some(10_000));
}

#[test]
fn test_project_structure() {
    let expected_files = vec![
        "src/main.rs",
        "src/app.rs",
        "src/ui.rs",
        "src/runtime.rs",
        "src/config.rs",
        "src/model.rs",
        "src/net.rs",
        "src/rows.rs",
        "src/poller.rs",
        "src/live.rs",
        "src/history.rs",
        "src/lookup.rs",
        "src/logging.rs",
        "Cargo.toml",
        "README.md",
        "flightboard.example.toml",
    ];

    for file in expected_files {
        assert!(Path::new(file).exists(), "Expected file {} not found", file);
    }
}

#[test]
fn test_cargo_toml_metadata() {
    let cargo_content = fs::read_to_string("Cargo.toml").expect("Failed to read Cargo.toml");

    assert!(cargo_content.contains("name = \"flightboard-tui\""), "Missing package name");
    assert!(cargo_content.contains("description ="), "Missing description");
    assert!(cargo_content.contains("license ="), "Missing license");
    assert!(cargo_content.contains("readme ="), "Missing readme");
    assert!(cargo_content.contains("homepage ="), "Missing homepage");
    assert!(cargo_content.contains("repository ="), "Missing repository");
}

#[test]
fn test_readme_exists_and_complete() {
    let readme_content = fs::read_to_string("README.md").expect("Failed to read README.md");

    let required_sections = vec![
        "# Flightboard TUI",
        "## Features",
        "## Quick Start",
        "## Configuration",
        "## Controls",
        "## Development",
    ];

    for section in required_sections {
        assert!(readme_content.contains(section), "README missing section: {}", section);
    }
}
