use std::env;
use std::process::Command;
use tempfile::TempDir;
use vrc_lib::VrcOutput;

fn vrc() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vrc"));
    cmd.env_remove("PROD_WEBSITE_URL")
        .env_remove("MIGRATED_WEBSITE_URL")
        .env_remove("STAGE_WEBSITE_URL")
        .env_remove("VERCEL_AUTOMATION_BYPASS_SECRET")
        .env("HOME", env::temp_dir());
    cmd
}

fn write_list(dir: &TempDir, name: &str, urls: &[&str]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string(urls).unwrap()).expect("write url list");
    path
}

#[test]
fn run_without_origins_is_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let urls = write_list(&dir, "urls.json", &["/"]);

    let output = vrc()
        .args(["run", "--urls", urls.to_str().unwrap(), "--format", "json"])
        .output()
        .expect("run vrc");
    assert_eq!(output.status.code(), Some(2));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: VrcOutput = serde_json::from_str(stdout.trim()).expect("parse output");
    match parsed {
        VrcOutput::Error(err) => assert!(err.error.message.contains("PROD_WEBSITE_URL")),
        other => panic!("expected error output, got {other:?}"),
    }
}

#[test]
fn run_with_invalid_config_is_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let urls = write_list(&dir, "urls.json", &["/"]);
    let cfg = dir.path().join("vrc.toml");
    std::fs::write(&cfg, "workers = 0\n").expect("write config");

    let status = vrc()
        .env("PROD_WEBSITE_URL", "https://www.example.com")
        .env("MIGRATED_WEBSITE_URL", "https://new.example.com")
        .args([
            "run",
            "--urls",
            urls.to_str().unwrap(),
            "--config",
            cfg.to_str().unwrap(),
        ])
        .status()
        .expect("run vrc");
    assert_eq!(status.code(), Some(2));
}

#[test]
fn diff_urls_exits_one_and_writes_differences() {
    let dir = TempDir::new().expect("tempdir");
    let left = write_list(&dir, "left.json", &["/", "/about", "/old"]);
    let right = write_list(&dir, "right.json", &["/", "/about", "/new"]);
    let written = dir.path().join("urls-diff.json");

    let output = vrc()
        .args([
            "diff-urls",
            left.to_str().unwrap(),
            right.to_str().unwrap(),
            "--write",
            written.to_str().unwrap(),
        ])
        .output()
        .expect("run vrc");
    assert_eq!(output.status.code(), Some(1));
    assert!(written.exists());

    let parsed: VrcOutput =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).expect("parse output");
    match parsed {
        VrcOutput::DiffUrls(diff) => {
            let urls: Vec<&str> = diff.differences.iter().map(|d| d.url.as_str()).collect();
            assert_eq!(urls, vec!["/old", "/new"]);
        }
        other => panic!("expected diff-urls output, got {other:?}"),
    }
}

#[test]
fn diff_urls_exits_zero_for_matching_lists() {
    let dir = TempDir::new().expect("tempdir");
    let left = write_list(&dir, "left.json", &["/", "/about"]);
    let right = write_list(&dir, "right.json", &["/about", "/"]);
    let written = dir.path().join("urls-diff.json");

    let status = vrc()
        .args([
            "diff-urls",
            left.to_str().unwrap(),
            right.to_str().unwrap(),
            "--write",
            written.to_str().unwrap(),
        ])
        .status()
        .expect("run vrc");
    assert_eq!(status.code(), Some(0));
    assert!(!written.exists());
}

#[test]
fn report_on_empty_directory_passes() {
    let dir = TempDir::new().expect("tempdir");
    let out = dir.path().join("results-root");

    let status = vrc()
        .args(["report", "--output-dir", out.to_str().unwrap()])
        .status()
        .expect("run vrc");
    assert_eq!(status.code(), Some(0));
    assert!(out.join("summary.json").exists());
}

#[test]
fn missing_url_list_is_fatal_in_pretty_mode() {
    let dir = TempDir::new().expect("tempdir");
    let output = vrc()
        .args([
            "diff-urls",
            dir.path().join("nope.json").to_str().unwrap(),
            dir.path().join("nope2.json").to_str().unwrap(),
            "--format",
            "pretty",
        ])
        .output()
        .expect("run vrc");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stdout).contains("url list"));
}
