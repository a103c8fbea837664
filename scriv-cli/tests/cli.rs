use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const CONFIG: &str = r#"
site:
  title: "Test"
  author: "Tester"
  description: "Desc"
  url: "https://example.com"
paths:
  posts: "posts"
  output: "dist"
"#;

fn scriv(dir: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("scriv").expect("scriv binary");
    cmd.current_dir(dir).env("RUST_LOG", "warn");
    cmd
}

fn write_site(dir: &Path, post: &str) -> Result<(), Box<dyn std::error::Error>> {
    fs::write(dir.join("scriv.yml"), CONFIG)?;
    fs::create_dir_all(dir.join("posts"))?;
    fs::write(dir.join("posts/hello.md"), post)?;
    Ok(())
}

#[test]
fn build_writes_pages() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_site(
        dir.path(),
        "+++\nslug = \"hello\"\ndate = 2024-01-02\nvisibility = \"published\"\n+++\n# Hello\n\nFirst post.\n",
    )?;

    scriv(dir.path()).arg("build").assert().success();

    let page = fs::read_to_string(dir.path().join("dist/hello/index.html"))?;
    assert!(page.contains("<title>Hello | Test</title>"));
    let index = fs::read_to_string(dir.path().join("dist/index.html"))?;
    assert!(index.contains("First post."));
    Ok(())
}

#[test]
fn detail_and_index_run_separately() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_site(dir.path(), "+++\nslug = \"hello\"\n+++\n# Hello\n")?;

    scriv(dir.path()).arg("detail").assert().success();
    assert!(dir.path().join("dist/hello/index.html").exists());
    assert!(!dir.path().join("dist/index.html").exists());

    scriv(dir.path()).arg("index").assert().success();
    assert!(dir.path().join("dist/index.html").exists());
    Ok(())
}

#[test]
fn recorded_errors_exit_nonzero() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_site(dir.path(), "+++\nslug = \"hello\"\n+++\n# Hello\n\nSee [@missing].\n")?;

    scriv(dir.path()).arg("build").assert().code(1);
    // The page is still written; the error is reported.
    assert!(dir.path().join("dist/hello/index.html").exists());
    Ok(())
}

#[test]
fn check_json_reports_diagnostics() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_site(dir.path(), "+++\ndate = 2024-01-02\n+++\n# No slug\n")?;

    let assert = scriv(dir.path()).args(["check", "--json"]).assert().code(1);
    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let value: Value = serde_json::from_str(&stdout)?;
    assert_eq!(value["posts"], 1);
    assert_eq!(value["errors"], 1);
    assert_eq!(value["diagnostics"][0]["code"], "meta.empty_slug");
    assert_eq!(value["diagnostics"][0]["severity"], "error");
    assert!(!dir.path().join("dist").exists());
    Ok(())
}

#[test]
fn check_text_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_site(dir.path(), "+++\nslug = \"ok\"\n+++\n# Fine\n")?;

    scriv(dir.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Check complete: 1 posts, 0 errors"));
    Ok(())
}

#[test]
fn missing_config_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    scriv(dir.path())
        .arg("build")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load configuration"));
    Ok(())
}

#[test]
fn unknown_arguments_exit_one() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    scriv(dir.path()).args(["build", "extra"]).assert().code(1);
    scriv(dir.path()).arg("--no-such-flag").assert().code(1);
    Ok(())
}

#[test]
fn help_and_version_succeed() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    scriv(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"));
    scriv(dir.path()).arg("--version").assert().success();
    Ok(())
}
