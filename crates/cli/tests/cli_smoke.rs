use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn ai_audit(cwd: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("ai-audit").unwrap();
    cmd.current_dir(cwd)
        .env_remove("LLM_API_BASE_URL")
        .env_remove("LLM_MODEL_NAME")
        .env_remove("LLM_API_KEY")
        .env_remove("LLM_MAX_OUTPUT_TOKENS")
        .env_remove("AI_AUDIT_CONCURRENCY")
        .env_remove("AI_AUDIT_CHAR_LIMIT")
        .env("AI_AUDIT_DATA_DIR", cwd.join("data"));
    cmd
}

#[test]
fn config_reads_dotenv_and_masks_key() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join(".env"),
        "LLM_API_BASE_URL=http://localhost:8000/v1\nLLM_MODEL_NAME=\"local-model\"\nLLM_API_KEY=sk-secret-value-9876\n",
    )
    .unwrap();

    let output = ai_audit(dir.path())
        .args(["--quiet", "config", "--concurrency", "64"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["model_name"], "local-model");
    assert_eq!(json["api_base_url"], "http://localhost:8000/v1");
    assert_eq!(json["api_key"], "****9876");
    assert_eq!(json["concurrency"], 32);
    assert_eq!(json["char_limit"], 2000);
}

#[test]
fn process_environment_wins_over_dotenv() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), "LLM_MODEL_NAME=from-file\n").unwrap();

    ai_audit(dir.path())
        .env("LLM_MODEL_NAME", "from-env")
        .args(["-q", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from-env"));
}

#[test]
fn missing_endpoint_is_a_failure() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.py"), "def foo():\n    return 1\n").unwrap();

    ai_audit(dir.path())
        .args(["-q", "audit", "a.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("LLM_API_BASE_URL"));
}
