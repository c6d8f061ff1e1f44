//! Integration tests for the ltipass CLI
//!
//! Each test runs the binary against its own temporary database and an
//! isolated home directory, so no user config leaks in.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CHECKOUT: &str = "https://hub.example.com/lti/redirect?next=%2Fhub%2Fuser-redirect%2Fgit-pull%3Frepo%3Dhttps%253A%252F%252Fgithub.com%252Fcourse%252FMLiP%26urlpath%3Dtree%252FMLiP%252Flab1.ipynb%26branch%3Dmain";

/// Helper to create an ltipass Command bound to `dir`
fn ltipass(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("ltipass");
    cmd.current_dir(dir.path())
        .env_remove("LTIPASS_CONFIG")
        .env_remove("LTIPASS_DB")
        .env_remove("LTIPASS_API_TOKEN")
        .env_remove("LTIPASS_LOG")
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .env("XDG_DATA_HOME", dir.path().join(".local/share"))
        .env("RUST_LOG", "warn")
        .arg("--db")
        .arg(dir.path().join("state").join("ltipass.db"));
    cmd
}

fn launch_json(resource_link_id: &str, user_id: &str) -> String {
    serde_json::json!({
        "resource_link_id": resource_link_id,
        "user_id": user_id,
        "context_title": "Machine Learning in Production",
        "launch_presentation_return_url": "https://lms.example.com/course/1",
        "lis_result_sourcedid": "sourced-1",
        "lis_outcome_service_url": "https://lms.example.com/grade",
        "custom_next": CHECKOUT,
    })
    .to_string()
}

fn record(dir: &TempDir, consumer_key: &str, json: String) {
    ltipass(dir)
        .args(["record", "--consumer-key", consumer_key])
        .write_stdin(json)
        .assert()
        .success();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_ltipass_help() {
        cargo_bin_cmd!("ltipass")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("resolve"))
            .stdout(predicate::str::contains("sessions"));
    }

    #[test]
    fn test_ltipass_version() {
        cargo_bin_cmd!("ltipass").arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_database() {
        let dir = TempDir::new().unwrap();

        ltipass(&dir)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Session store ready"))
            .stdout(predicate::str::contains("0 sessions"));

        assert!(dir.path().join("state/ltipass.db").exists());
    }
}

// =============================================================================
// Launch Recording and Resolution
// =============================================================================

mod sessions {
    use super::*;

    #[test]
    fn test_record_from_stdin() {
        let dir = TempDir::new().unwrap();

        ltipass(&dir)
            .args(["record", "--consumer-key", "canvas"])
            .write_stdin(launch_json("link-1", "alice"))
            .assert()
            .success()
            .stdout(predicate::str::contains("user 'alice'"))
            .stdout(predicate::str::contains("checkout: MLiP/lab1.ipynb"));
    }

    #[test]
    fn test_record_from_file() {
        let dir = TempDir::new().unwrap();
        let params = dir.path().join("launch.json");
        fs::write(&params, launch_json("link-1", "alice")).unwrap();

        ltipass(&dir)
            .args(["record", "--consumer-key", "canvas", "--params"])
            .arg(&params)
            .assert()
            .success();
    }

    #[test]
    fn test_record_without_identity_fails() {
        let dir = TempDir::new().unwrap();

        ltipass(&dir)
            .args(["record", "--consumer-key", "canvas"])
            .write_stdin(r#"{"user_id": "alice"}"#)
            .assert()
            .failure()
            .stderr(predicate::str::contains("resource_link_id"));
    }

    #[test]
    fn test_record_rejects_non_object_json() {
        let dir = TempDir::new().unwrap();

        ltipass(&dir)
            .args(["record", "--consumer-key", "canvas"])
            .write_stdin("[1, 2, 3]")
            .assert()
            .failure()
            .stderr(predicate::str::contains("JSON object"));
    }

    #[test]
    fn test_resolve_exact_and_sibling() {
        let dir = TempDir::new().unwrap();
        record(&dir, "canvas", launch_json("link-1", "alice"));

        ltipass(&dir)
            .args(["resolve", "--user", "alice", "/MLiP/lab1.ipynb"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"resource_link_id\": \"link-1\""))
            .stdout(predicate::str::contains("\"file_is_target\": true"));

        ltipass(&dir)
            .args(["resolve", "--user", "alice", "MLiP/data/train.csv"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"file_is_target\": false"));
    }

    #[test]
    fn test_resolve_template_vars() {
        let dir = TempDir::new().unwrap();
        record(&dir, "canvas", launch_json("link-1", "alice"));

        ltipass(&dir)
            .args(["resolve", "--vars", "--user", "alice", "MLiP/lab1.ipynb"])
            .assert()
            .success()
            .stdout(predicate::str::contains("user_id=alice"))
            .stdout(predicate::str::contains(
                "context_title=Machine Learning in Production",
            ))
            .stdout(predicate::str::contains("file_is_target=true"));
    }

    #[test]
    fn test_resolve_miss() {
        let dir = TempDir::new().unwrap();
        record(&dir, "canvas", launch_json("link-1", "alice"));

        ltipass(&dir)
            .args(["resolve", "--user", "bob", "MLiP/lab1.ipynb"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No LTI session"));
    }

    #[test]
    fn test_resolve_vars_miss_still_has_user() {
        let dir = TempDir::new().unwrap();
        record(&dir, "canvas", launch_json("link-1", "alice"));

        ltipass(&dir)
            .args(["resolve", "--vars", "--user", "bob", "MLiP/lab1.ipynb"])
            .assert()
            .success()
            .stdout(predicate::str::contains("user_id=bob"))
            .stdout(predicate::str::contains("resource_link_id").not())
            .stdout(predicate::str::contains("No LTI session").not());
    }

    #[test]
    fn test_repeat_launch_keeps_one_session() {
        let dir = TempDir::new().unwrap();
        record(&dir, "canvas", launch_json("link-1", "alice"));
        record(&dir, "canvas", launch_json("link-1", "alice"));
        record(&dir, "canvas", launch_json("link-1", "bob"));

        ltipass(&dir)
            .arg("sessions")
            .assert()
            .success()
            .stdout(predicate::str::contains("2 session(s)"));

        ltipass(&dir)
            .args(["sessions", "--user", "bob", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"user_id\": \"bob\""))
            .stdout(predicate::str::contains("\"user_id\": \"alice\"").not());
    }

    #[test]
    fn test_sessions_empty() {
        let dir = TempDir::new().unwrap();

        ltipass(&dir)
            .arg("sessions")
            .assert()
            .success()
            .stdout(predicate::str::contains("No sessions recorded"));
    }
}

// =============================================================================
// Environment Bridge
// =============================================================================

mod bridge {
    use super::*;

    #[test]
    fn test_exec_exports_launch_params() {
        let dir = TempDir::new().unwrap();
        record(&dir, "canvas", launch_json("link-1", "alice"));

        ltipass(&dir)
            .args([
                "exec",
                "--user",
                "alice",
                "--resource-link-id",
                "link-1",
                "--",
                "sh",
                "-c",
                "printf '%s|%s' \"$LTI_CONTEXT_TITLE\" \"$LTI_USER_ID\"",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Machine Learning in Production|alice"));
    }

    #[test]
    fn test_exec_propagates_exit_code() {
        let dir = TempDir::new().unwrap();
        record(&dir, "canvas", launch_json("link-1", "alice"));

        ltipass(&dir)
            .args([
                "exec",
                "--user",
                "alice",
                "--resource-link-id",
                "link-1",
                "--",
                "sh",
                "-c",
                "exit 3",
            ])
            .assert()
            .code(3);
    }

    #[test]
    fn test_exec_unknown_session_fails() {
        let dir = TempDir::new().unwrap();

        ltipass(&dir)
            .args([
                "exec",
                "--user",
                "alice",
                "--resource-link-id",
                "link-1",
                "--",
                "true",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No LTI session"));
    }

    #[test]
    fn test_env_reads_prefixed_variables() {
        let dir = TempDir::new().unwrap();

        ltipass(&dir)
            .arg("env")
            .env("LTI_USER_ID", "alice")
            .env("LTI_CONTEXT_TITLE", "MLiP")
            .assert()
            .success()
            .stdout(predicate::str::contains("user_id=alice"))
            .stdout(predicate::str::contains("context_title=MLiP"));
    }
}

// =============================================================================
// Grading
// =============================================================================

mod grading {
    use super::*;

    #[test]
    fn test_grade_without_session_fails() {
        let dir = TempDir::new().unwrap();

        ltipass(&dir)
            .args(["grade", "--user", "alice", "--score", "0.5", "MLiP/lab1.ipynb"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No LTI session"));
    }

    #[test]
    fn test_grade_unknown_consumer_fails() {
        let dir = TempDir::new().unwrap();
        record(&dir, "canvas", launch_json("link-1", "alice"));

        ltipass(&dir)
            .args(["grade", "--user", "alice", "--score", "0.5", "MLiP/lab1.ipynb"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No shared secret configured"));
    }

    #[test]
    fn test_grade_score_out_of_range_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("ltipass.toml"),
            "[consumers]\ncanvas = \"secret\"\n",
        )
        .unwrap();
        record(&dir, "canvas", launch_json("link-1", "alice"));

        ltipass(&dir)
            .args(["grade", "--user", "alice", "--score", "1.5", "MLiP/lab1.ipynb"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("outside the range"));
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();

        ltipass(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("using defaults"))
            .stdout(predicate::str::contains("port = 8765"));
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = TempDir::new().unwrap();

        ltipass(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created ltipass.toml"));

        assert!(dir.path().join("ltipass.toml").exists());

        ltipass(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_validate_no_config() {
        let dir = TempDir::new().unwrap();

        ltipass(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using defaults (valid)"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("ltipass.toml"),
            "[server]\nport = 0\n\n[consumers]\ncanvas = \"\"\n",
        )
        .unwrap();

        ltipass(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings"))
            .stdout(predicate::str::contains("server.port"))
            .stdout(predicate::str::contains("empty shared secret"));
    }

    #[test]
    fn test_config_show_masks_secrets() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("custom.toml");
        fs::write(&config, "[consumers]\ncanvas = \"top-secret\"\n").unwrap();

        ltipass(&dir)
            .arg("--config")
            .arg(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"))
            .stdout(predicate::str::contains("canvas"))
            .stdout(predicate::str::contains("top-secret").not());
    }

    #[test]
    fn test_config_show_masks_api_token() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("ltipass.toml"),
            "[server]\napi_token = \"hub-service-token\"\n",
        )
        .unwrap();

        ltipass(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("api_token"))
            .stdout(predicate::str::contains("hub-service-token").not());
    }

    #[test]
    fn test_serve_without_api_token_refuses_to_start() {
        let dir = TempDir::new().unwrap();

        ltipass(&dir)
            .args(["serve", "--port", "0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No API token configured"));
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = TempDir::new().unwrap();

        ltipass(&dir)
            .args(["--config", "nope.toml", "sessions"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("nope.toml"));
    }
}
