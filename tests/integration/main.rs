//! Integration tests for Samulator

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Command isolated from the user's config, cache and build directories
    fn samulator(dir: &TempDir) -> Command {
        let config = dir.path().join("config.toml");
        if !config.exists() {
            write_config(dir.path(), &config);
        }
        let mut cmd = cargo_bin_cmd!("samulator");
        cmd.env("SAMULATOR_CONFIG", &config).env_remove("RUST_LOG");
        cmd
    }

    fn write_config(root: &Path, config: &Path) {
        let content = format!(
            "[cache]\nroot = {:?}\n\n[build]\nprogram = \"false\"\nargs = []\nwork_root = {:?}\n\n[runner]\nscratch_root = {:?}\n",
            root.join("cache"),
            root.join("build"),
            root.join("tmp"),
        );
        std::fs::write(config, content).unwrap();
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        samulator(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("simulate"))
            .stdout(predicate::str::contains("prepare"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        samulator(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("samulator"));
    }

    #[test]
    fn simulate_without_nodes_exits_3() {
        let dir = TempDir::new().unwrap();
        samulator(&dir)
            .arg("simulate")
            .assert()
            .code(3)
            .stderr(predicate::str::contains("No node config paths provided"));
    }

    #[test]
    fn simulate_without_version_exits_4() {
        let dir = TempDir::new().unwrap();
        samulator(&dir)
            .args(["simulate", "--buyer"])
            .arg(dir.path().join("buyer"))
            .assert()
            .code(4)
            .stderr(predicate::str::contains("No version provided for node buyer"));
    }

    #[test]
    fn simulate_with_failing_build_exits_2() {
        let dir = TempDir::new().unwrap();
        samulator(&dir)
            .args(["simulate", "--buyer-version", "v1", "--buyer"])
            .arg(dir.path().join("buyer"))
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Node buyer failed to start"));
    }

    #[test]
    fn prepare_reports_build_failure() {
        let dir = TempDir::new().unwrap();
        samulator(&dir)
            .args(["prepare", "v1"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Build of version v1 failed"));
    }

    #[test]
    fn cache_list_empty() {
        let dir = TempDir::new().unwrap();
        samulator(&dir)
            .args(["cache", "list", "--format", "json"])
            .assert()
            .success()
            .stdout("[]\n");
    }

    #[test]
    fn config_show_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(&config, "[cache]\nroot = \"artifacts\"\n").unwrap();

        samulator(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("# Loaded from {}", config.display())))
            .stdout(predicate::str::contains(
                dir.path().join("artifacts").display().to_string(),
            ));
    }

    #[test]
    fn bad_config_value_is_rejected_before_running() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[cache]\nnamespace = \"../escape\"\n",
        )
        .unwrap();

        samulator(&dir)
            .args(["cache", "list"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("cache.namespace"));
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        samulator(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        samulator(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("namespace = \"openbazaard\""));
    }

    #[test]
    fn config_init_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("fresh").join("config.toml");

        cargo_bin_cmd!("samulator")
            .args(["config", "init"])
            .env("SAMULATOR_CONFIG", &config)
            .assert()
            .success();

        let written = std::fs::read_to_string(&config).unwrap();
        assert!(written.contains("[runner]"));
        assert!(written.contains("settle_delay_ms = 1000"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(&config, "[cache\nroot = 1").unwrap();

        samulator(&dir)
            .args(["cache", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }
}
