use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

struct CliFixture {
    _tmp: TempDir,
    config_path: PathBuf,
    disc_root: PathBuf,
}

impl CliFixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let disc_root = tmp.path().join("disc0");
        let db_path = tmp.path().join("accounts.txt");
        let config_path = tmp.path().join("caisson.yaml");

        std::fs::create_dir_all(&disc_root).unwrap();
        std::fs::write(&db_path, "").unwrap();
        std::fs::write(
            &config_path,
            format!(
                "\
account_database: {}
disc_sets:
  - num: 0
    root: {}
    block_size: 4096
",
                db_path.display(),
                disc_root.display()
            ),
        )
        .unwrap();

        Self {
            _tmp: tmp,
            config_path,
            disc_root,
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_caisson"));
        cmd.arg("--config").arg(&self.config_path);
        cmd.args(args);
        cmd.output().unwrap()
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "command failed: {args:?}\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    fn account_root(&self, id_low_byte: &str, id: &str) -> PathBuf {
        self.disc_root.join(id_low_byte).join(id)
    }
}

fn exit_code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

#[test]
fn create_and_info() {
    let fx = CliFixture::new();
    let out = fx.run_ok(&["create", "5", "0", "100B", "200B"]);
    assert!(out.contains("00000005"));

    let info = fx.run_ok(&["info", "5", "--machine"]);
    assert!(info.contains("blocks_soft_limit: 100"));
    assert!(info.contains("blocks_hard_limit: 200"));
    assert!(info.contains("account_id: 00000005"));

    // The account root exists on disc with a usage file and root dir.
    let root = fx.account_root("05", "00000005");
    assert!(root.join("usage.json").exists());
    assert!(root.join("o1").exists());

    // Human-readable variant mentions the limits too.
    let human = fx.run_ok(&["info", "5"]);
    assert!(human.contains("Soft limit"));
}

#[test]
fn create_accepts_megabyte_suffix() {
    let fx = CliFixture::new();
    fx.run_ok(&["create", "a1", "0", "1M", "2M"]);
    // 1 MiB / 4096-byte blocks = 256 blocks.
    let info = fx.run_ok(&["info", "a1", "-m"]);
    assert!(info.contains("blocks_soft_limit: 256"));
    assert!(info.contains("blocks_hard_limit: 512"));
}

#[test]
fn duplicate_create_fails() {
    let fx = CliFixture::new();
    fx.run_ok(&["create", "5", "0", "100B", "200B"]);
    let out = fx.run(&["create", "5", "0", "100B", "200B"]);
    assert_eq!(exit_code(&out), 1);
}

#[test]
fn bad_size_string_is_a_usage_error() {
    let fx = CliFixture::new();
    let out = fx.run(&["create", "5", "0", "100", "200"]);
    assert_eq!(exit_code(&out), 2);
    let out = fx.run(&["create", "5", "0", "100K", "200K"]);
    assert_eq!(exit_code(&out), 2);
}

#[test]
fn unknown_disc_set_is_rejected() {
    let fx = CliFixture::new();
    let out = fx.run(&["create", "5", "9", "100B", "200B"]);
    assert_eq!(exit_code(&out), 2);
}

#[test]
fn setlimit_enforces_the_ratio_cap() {
    let fx = CliFixture::new();
    fx.run_ok(&["create", "5", "0", "100B", "200B"]);
    let before = fx.run_ok(&["info", "5", "-m"]);

    // soft=98, hard=100 exceeds the 97% cap.
    let out = fx.run(&["setlimit", "5", "98B", "100B"]);
    assert_eq!(exit_code(&out), 2);

    // Nothing was mutated.
    let after = fx.run_ok(&["info", "5", "-m"]);
    assert_eq!(before, after);

    // A valid pair goes through.
    fx.run_ok(&["setlimit", "5", "97B", "100B"]);
    let info = fx.run_ok(&["info", "5", "-m"]);
    assert!(info.contains("blocks_soft_limit: 97"));
    assert!(info.contains("blocks_hard_limit: 100"));
}

#[test]
fn delete_removes_account_and_tree() {
    let fx = CliFixture::new();
    fx.run_ok(&["create", "5", "0", "100B", "200B"]);
    let root = fx.account_root("05", "00000005");
    assert!(root.exists());

    fx.run_ok(&["delete", "5", "--yes"]);
    assert!(!root.exists());

    let out = fx.run(&["info", "5"]);
    assert_eq!(exit_code(&out), 1);
}

#[test]
fn delete_unknown_account_fails_cleanly() {
    let fx = CliFixture::new();
    let out = fx.run(&["delete", "77", "--yes"]);
    assert_eq!(exit_code(&out), 1);
}

#[test]
fn check_reports_and_fixes_drift() {
    let fx = CliFixture::new();
    fx.run_ok(&["create", "5", "0", "100B", "200B"]);
    let out = fx.run(&["check", "5"]);
    assert_eq!(exit_code(&out), 0);

    // Corrupt the stored counters behind the store's back.
    let root = fx.account_root("05", "00000005");
    let usage_path = root.join("usage.json");
    let mut usage: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&usage_path).unwrap()).unwrap();
    usage["blocks_used"] = serde_json::json!(9999);
    std::fs::write(&usage_path, serde_json::to_vec(&usage).unwrap()).unwrap();

    let out = fx.run(&["check", "5"]);
    assert_eq!(exit_code(&out), 1);

    fx.run_ok(&["check", "5", "--fix"]);
    let out = fx.run(&["check", "5"]);
    assert_eq!(exit_code(&out), 0);
}
