use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use std::path::PathBuf;

struct TestFixture {
    _temp_dir: tempfile::TempDir,
    config_path: PathBuf,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let data_dir = temp_dir.path().join("data");
        fs::create_dir_all(&data_dir).unwrap();

        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            format!(
                r#"
                [hub]
                sessionsDir = "{sessions}"
                databaseDir = "{database}"

                [daemon]
                embeddingProvider = "mock"
                embeddingModel = "mock"
                provider = "mock"
                model = "mock"
                promptFile = "prompt.md"
                "#,
                sessions = temp_dir.path().join("sessions").to_string_lossy(),
                database = data_dir.to_string_lossy(),
            ),
        )
        .unwrap();

        Self { _temp_dir: temp_dir, config_path }
    }
}

#[test]
fn queue_status_on_a_fresh_store_reports_zero_everywhere() {
    let fixture = TestFixture::new();
    Command::cargo_bin("brain")
        .unwrap()
        .args(["--config", fixture.config_path.to_str().unwrap(), "queue", "status"])
        .assert()
        .success()
        .stdout(contains("pending:   0"))
        .stdout(contains("failed:    0"));
}

#[test]
fn index_rebuild_on_an_empty_blob_store_reports_zero() {
    let fixture = TestFixture::new();
    Command::cargo_bin("brain")
        .unwrap()
        .args(["--config", fixture.config_path.to_str().unwrap(), "index", "rebuild"])
        .assert()
        .success()
        .stdout(contains("rebuilt 0 nodes"));
}

#[test]
fn queue_enqueue_then_status_reflects_one_pending_job() {
    let fixture = TestFixture::new();
    let session_file = fixture._temp_dir.path().join("session.jsonl");
    fs::write(&session_file, "").unwrap();

    Command::cargo_bin("brain")
        .unwrap()
        .args([
            "--config",
            fixture.config_path.to_str().unwrap(),
            "queue",
            "enqueue",
            session_file.to_str().unwrap(),
            "e1",
            "e2",
        ])
        .assert()
        .success()
        .stdout(contains("enqueued job"));

    Command::cargo_bin("brain")
        .unwrap()
        .args(["--config", fixture.config_path.to_str().unwrap(), "queue", "status"])
        .assert()
        .success()
        .stdout(contains("pending:   1"));
}
