//! Integration tests for Postroom

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn postroom() -> Command {
        cargo_bin_cmd!("postroom")
    }

    /// Config pointing every URL at a closed local port, with storage in `dir`
    fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
        let storage = dir.join("offline");
        let content = format!(
            r#"[api]
base_url = "http://127.0.0.1:1"

[cache]
origin = "http://127.0.0.1:9"
storage_dir = {:?}
request_timeout_secs = 2
shell_assets = ["/index.html"]

{}"#,
            storage.display().to_string(),
            extra
        );
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn with_config(path: &Path) -> Command {
        let mut cmd = postroom();
        cmd.arg("--config").arg(path);
        cmd
    }

    #[test]
    fn help_displays() {
        postroom()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("admin mail console"));
    }

    #[test]
    fn version_displays() {
        postroom()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("postroom"));
    }

    #[test]
    fn config_path() {
        postroom()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        with_config(&temp.path().join("missing.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"))
            .stdout(predicate::str::contains("admin-shell-v1"));
    }

    #[test]
    fn config_init_then_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        with_config(&path)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(path.exists());

        with_config(&path)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--force"));
    }

    #[test]
    fn invalid_config_reports_hint() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[bootstrap\nmax_attempts = ").unwrap();

        with_config(&path)
            .arg("plan")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn plan_orders_modules() {
        let temp = TempDir::new().unwrap();
        let config = write_config(
            temp.path(),
            r#"[[bootstrap.modules]]
name = "compose"
depends_on = ["folders"]

[[bootstrap.modules]]
name = "folders"

[[bootstrap.modules]]
name = "search"
depends_on = ["index"]
"#,
        );

        with_config(&config)
            .arg("plan")
            .assert()
            .success()
            .stdout(predicate::str::contains("1. folders"))
            .stdout(predicate::str::contains("2. compose"))
            .stdout(predicate::str::contains("search (requires index)"));
    }

    #[test]
    fn plan_rejects_cycle() {
        let temp = TempDir::new().unwrap();
        let config = write_config(
            temp.path(),
            r#"[[bootstrap.modules]]
name = "a"
depends_on = ["b"]

[[bootstrap.modules]]
name = "b"
depends_on = ["a"]
"#,
        );

        with_config(&config)
            .arg("plan")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Dependency cycle detected: a -> b -> a"));
    }

    #[test]
    fn cache_list_empty() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        with_config(&config)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache partitions found"));
    }

    #[test]
    fn status_without_registration() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        with_config(&config)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No worker registered"));
    }

    #[test]
    fn activate_requires_install() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        with_config(&config)
            .args(["cache", "activate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No installed worker"));
    }

    #[test]
    fn install_offline_still_activates() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        with_config(&config)
            .args(["cache", "install"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Shell precache incomplete"))
            .stdout(predicate::str::contains("Worker activated"));

        assert!(temp.path().join("offline").join("registration.json").exists());

        with_config(&config)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("state: activated"));

        // Nothing was cached, so an offline navigation has no fallback
        with_config(&config)
            .args(["fetch", "--navigate", "http://127.0.0.1:9/admin/"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("route: navigation"))
            .stderr(predicate::str::contains("no cached copy"))
            .stderr(predicate::str::contains("Hint:"));

        with_config(&config)
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed worker registration"));
        assert!(!temp.path().join("offline").join("registration.json").exists());
    }

    #[test]
    fn fetch_post_passes_through() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        with_config(&config)
            .args(["fetch", "-X", "POST", "http://127.0.0.1:9/api/messages"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("route: passthrough"))
            .stderr(predicate::str::contains("Network request failed"));
    }

    #[test]
    fn fetch_rejects_bad_url() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        with_config(&config)
            .args(["fetch", "not a url"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid URL"));
    }

    #[test]
    fn cache_clear_rejects_unsafe_partition() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");

        with_config(&config)
            .args(["cache", "clear", "--partition", "../etc"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid partition name"));
    }
}
