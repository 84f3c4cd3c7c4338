//! Report tooling commands run through the built binary
//!
//! Run with: `cargo test --test cli`

use groundtruth::report::render_csv;
use groundtruth::{AgreementValue, Decision, Significance, Status};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Run the binary in `dir` with no user config in reach.
fn groundtruth(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_groundtruth"))
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("xdg"))
        .output()
        .expect("run groundtruth")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn template_prints_the_report_header() {
    let dir = TempDir::new().unwrap();
    let out = groundtruth(dir.path(), &["template", "-d", "Ana, Ben"]);
    assert!(out.status.success());
    assert_eq!(
        stdout(&out).trim(),
        "Category,Significance,Status,Title,Description,Decision,Ana Agreed,Ben Agreed,Notes,Meeting Date,Meeting Reference"
    );
}

#[test]
fn template_defaults_to_configured_participants() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("groundtruth.yaml"), "participants: [Zoe]\n").unwrap();
    let out = groundtruth(dir.path(), &["template"]);
    assert!(stdout(&out).contains(",Zoe Agreed,"));
}

#[test]
fn categories_lists_categories_and_types() {
    let dir = TempDir::new().unwrap();
    let out = groundtruth(dir.path(), &["categories"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Technical Architecture"));
    assert!(text.contains("Compliance"));
    assert!(text.contains("SOC 2, HIPAA, GDPR"));
}

#[test]
fn validate_accepts_a_rendered_report() {
    let dir = TempDir::new().unwrap();
    let people = names(&["Ryan", "Ajit"]);
    let decision = Decision::new("Security", Significance::CRITICAL, Status::Agreed, "Rotate keys")
        .with_agreement("Ryan", AgreementValue::Yes)
        .with_agreement("Ajit", AgreementValue::Yes);
    std::fs::write(dir.path().join("report.csv"), render_csv(&[decision], &people)).unwrap();

    let out = groundtruth(dir.path(), &["validate", "report.csv", "-d", "Ryan,Ajit"]);

    assert!(out.status.success(), "{}", stdout(&out));
    assert!(stdout(&out).contains("Validation PASSED (1 rows)"));
}

#[test]
fn validate_fails_on_bad_values() {
    let dir = TempDir::new().unwrap();
    let csv = "Category,Significance,Status,Title,Description,Decision,Ryan Agreed,Notes,Meeting Date,Meeting Reference\n\
               Security,9,Agreed,t,d,x,Yes,,,\n";
    std::fs::write(dir.path().join("bad.csv"), csv).unwrap();

    let out = groundtruth(dir.path(), &["validate", "bad.csv", "-d", "Ryan"]);

    assert_eq!(out.status.code(), Some(1));
    let text = stdout(&out);
    assert!(text.contains("Validation FAILED"));
    assert!(text.contains("Invalid significance '9'"));
}

#[test]
fn validate_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let out = groundtruth(dir.path(), &["validate", "absent.csv"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn manifest_command_summarizes_entries() {
    use groundtruth::manifest::{fingerprint_text, save, FileEntry, Manifest};
    use std::collections::BTreeMap;

    let dir = TempDir::new().unwrap();
    let files = BTreeMap::from([(
        "a.txt".to_string(),
        FileEntry::new(fingerprint_text("a"), 1, "", vec![serde_json::json!({}), serde_json::json!({})]),
    )]);
    let manifest = Manifest::new("out.csv", fingerprint_text("config"), fingerprint_text(""), files);
    save(dir.path(), &manifest).unwrap();

    let out = groundtruth(dir.path(), &["manifest", "."]);

    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Framework:  none"));
    assert!(text.contains("1 files, 2 decisions"));
}
