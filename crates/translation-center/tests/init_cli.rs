use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;
use translation_center::{AppConfig, Layout};

fn run_cli(args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("translation-center").expect("binary exists");
    cmd.args(args);
    cmd.env_remove("TRANSLATION_CENTER_HTTP_TOKEN");
    cmd.assert()
}

#[test]
fn init_writes_default_config() {
    let tmp = tempdir().expect("temp dir");
    let root = tmp.path().to_str().unwrap();

    run_cli(&["--root", root, "init"])
        .success()
        .stdout(predicate::str::contains("Initialized workspace"));

    let layout = Layout::new(tmp.path().to_path_buf());
    assert!(layout.stores_dir().is_dir(), "expected stores directory");
    assert!(layout.logs_dir().is_dir(), "expected logs directory");

    let config = AppConfig::from_file(layout.config_path()).expect("config parses");
    assert_eq!(config, AppConfig::default());

    // running init again keeps the existing file
    run_cli(&["--root", root, "init"])
        .success()
        .stdout(predicate::str::contains("already initialized"));
}
