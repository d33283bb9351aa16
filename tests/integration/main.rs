//! Integration tests for rollcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn rollcache() -> Command {
        cargo_bin_cmd!("rollcache")
    }

    /// Command using only the config at `config`
    fn rollcache_with(config: &Path) -> Command {
        let mut cmd = rollcache();
        cmd.arg("--no-local").arg("--config").arg(config);
        cmd
    }

    #[test]
    fn help_displays() {
        rollcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("incremental JavaScript bundle cache"));
    }

    #[test]
    fn version_displays() {
        rollcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("rollcache"));
    }

    #[test]
    fn config_path() {
        rollcache()
            .args(["--no-local", "config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        rollcache_with(&temp.path().join("missing.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[middleware]"))
            .stdout(predicate::str::contains("rebuild = \"deps-change\""));
    }

    #[test]
    fn config_init_creates_local_file() {
        let temp = TempDir::new().unwrap();
        rollcache()
            .args(["config", "init", "--dir"])
            .arg(temp.path())
            .assert()
            .success();

        assert!(temp.path().join("rollcache.toml").exists());
    }

    #[test]
    fn build_without_src_hints() {
        let temp = TempDir::new().unwrap();
        rollcache_with(&temp.path().join("missing.toml"))
            .args(["build", "/app.js"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("middleware.src"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn invalid_config_fails() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        std::fs::write(&config, "[middleware]\nserve = \"sometimes\"").unwrap();

        rollcache_with(&config)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[cfg(unix)]
    mod build {
        use super::*;

        /// Project with one entry and a shell bundler printing a fixed bundle
        fn project() -> (TempDir, std::path::PathBuf) {
            let temp = TempDir::new().unwrap();
            std::fs::create_dir_all(temp.path().join("client")).unwrap();
            std::fs::write(temp.path().join("client/app.bundle"), "export default 1;").unwrap();

            let config = temp.path().join("config.toml");
            let script = r#"printf '{"modules":["%s"],"code":"var built = 1;","map":null}' "$1""#;
            let content = format!(
                "[middleware]\nroot = {:?}\nsrc = \"client\"\ndest = \"static\"\n\n[bundler]\ncommand = [\"sh\", \"-c\", {:?}, \"bundle\"]\n",
                temp.path().display().to_string(),
                script
            );
            std::fs::write(&config, content).unwrap();
            (temp, config)
        }

        #[test]
        fn build_writes_bundle() {
            let (temp, config) = project();

            rollcache_with(&config)
                .args(["build", "/app.js", "--stdout"])
                .assert()
                .success()
                .stdout(predicate::str::contains("var built = 1;"));

            let written = std::fs::read_to_string(temp.path().join("static/app.js")).unwrap();
            assert_eq!(written, "var built = 1;");
        }

        #[test]
        fn check_reports_missing_output() {
            let (_temp, config) = project();

            rollcache_with(&config)
                .args(["check", "/app.js"])
                .assert()
                .success()
                .stdout(predicate::str::contains("(missing)"))
                .stderr(predicate::str::contains("Rebuild needed"));
        }

        #[test]
        fn non_bundle_request_is_ignored() {
            let (temp, config) = project();

            rollcache_with(&config)
                .args(["build", "/style.css"])
                .assert()
                .success()
                .stderr(predicate::str::contains("not a bundle request"));

            assert!(!temp.path().join("static").exists());
        }

        #[test]
        fn bundler_failure_is_reported() {
            let (temp, _) = project();
            let config = temp.path().join("failing.toml");
            std::fs::write(
                &config,
                format!(
                    "[middleware]\nroot = {:?}\nsrc = \"client\"\n\n[bundler]\ncommand = [\"sh\", \"-c\", \"echo 'Unexpected token' >&2; exit 1\", \"bundle\"]\n",
                    temp.path().display().to_string()
                ),
            )
            .unwrap();

            rollcache_with(&config)
                .args(["build", "/app.js"])
                .assert()
                .failure()
                .stderr(predicate::str::contains("Unexpected token"));
        }
    }
}
