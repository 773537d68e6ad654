use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("wm").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("World Models - VAE vision component in Rust"));
}

#[test]
fn test_cli_list() {
    let mut cmd = Command::cargo_bin("wm").unwrap();
    cmd.arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Available environments:"))
        .stdout(predicate::str::contains("bouncing_ball"));
}

#[test]
fn test_cli_collect_writes_npy() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("obs.npy");

    let mut cmd = Command::cargo_bin("wm").unwrap();
    cmd.arg("collect")
        .arg("--steps")
        .arg("6")
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 6 observations"));
    assert!(out.exists());
}

#[test]
fn test_cli_collect_unknown_env_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("wm").unwrap();
    cmd.arg("collect")
        .arg("cartpole")
        .arg("--out")
        .arg(dir.path().join("obs.npy"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown environment"));
}

#[test]
fn test_cli_train_then_eval() {
    let dir = tempfile::tempdir().unwrap();
    let ckpt = dir.path().join("ckpt");
    let logs = dir.path().join("logs");

    let mut cmd = Command::cargo_bin("wm").unwrap();
    cmd.arg("train")
        .arg("--samples")
        .arg("10")
        .arg("--epochs")
        .arg("1")
        .arg("--batch-size")
        .arg("4")
        .arg("--out")
        .arg(&ckpt)
        .arg("--log-dir")
        .arg(&logs)
        .arg("--cpu")
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved weights"));
    assert!(ckpt.join("vae.pt").exists());
    assert!(ckpt.join("vae.json").exists());
    // One validation item after the sanity pass -> one grid
    assert!(logs.join("images").read_dir().unwrap().count() >= 1);

    let mut cmd = Command::cargo_bin("wm").unwrap();
    cmd.arg("eval")
        .arg("--checkpoint")
        .arg(&ckpt)
        .arg("--samples")
        .arg("4")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mean reconstruction loss"));
}
