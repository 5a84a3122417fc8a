mod common;

use audit_inference::InferenceError;
use audit_pipeline::{Severity, SUMMARY_FILE_NAME};
use common::{a_py, pipeline, write, FakeModel};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

#[tokio::test]
async fn two_wears_one_issue_each() {
    let src = tempdir().unwrap();
    let data = tempdir().unwrap();
    write(src.path(), "a.py", &a_py());
    let model = FakeModel::one_issue_per_wear();
    let pipeline = pipeline(data.path(), model.clone()).await;

    let result = pipeline
        .audit_file(&src.path().join("a.py"), src.path(), false)
        .await
        .unwrap();

    assert_eq!(result.chunks.len(), 1);
    let chunk = &result.chunks[0];
    assert_eq!(chunk.chunk_id, "a.py:foo");
    assert_eq!(chunk.start_line, 2);
    assert_eq!(result.total_issues, 2);

    let security = &chunk.issues[0];
    assert_eq!(security.issue_type, "security");
    assert_eq!(security.severity, Severity::High);
    assert_eq!(security.absolute_line, Some(2 + 3 + 1));
    let readability = &chunk.issues[1];
    assert_eq!(readability.issue_type, "readability");
    assert_eq!(readability.absolute_line, Some(2 + 5 + 1));
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let src = tempdir().unwrap();
    let data = tempdir().unwrap();
    write(src.path(), "a.py", &a_py());
    write(src.path(), "b.py", "def bar():\n    return 1\n\ndef baz():\n    return 2\n");
    let model = FakeModel::one_issue_per_wear();
    let pipeline = pipeline(data.path(), model.clone()).await;

    let first = pipeline.audit_directory(src.path(), false, None).await.unwrap();
    let calls_after_first = model.calls();
    assert_eq!(calls_after_first, 3 * 2);

    let second = pipeline.audit_directory(src.path(), false, None).await.unwrap();
    assert_eq!(model.calls(), calls_after_first);
    assert_eq!(second.total_issues, first.total_issues);
    assert_eq!(pipeline.stats().cache_hits, 6);
}

#[tokio::test]
async fn identical_chunks_in_different_files_send_identical_prompts() {
    let src = tempdir().unwrap();
    let body = "def f():\n    return 1\n";
    write(src.path(), "a.py", body);
    write(src.path(), "pkg/b.py", body);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let model = FakeModel::new(move |req| {
        if common::is_security(req) {
            record.lock().unwrap().push(req.user_content.clone());
        }
        Ok(r#"{"issues": []}"#.into())
    });

    // Separate data dirs so both files reach the model
    let mut chunk_ids = Vec::new();
    for rel in ["a.py", "pkg/b.py"] {
        let data = tempdir().unwrap();
        let pipeline = pipeline(data.path(), model.clone()).await;
        let result = pipeline
            .audit_file(&src.path().join(rel), src.path(), false)
            .await
            .unwrap();
        chunk_ids.push(result.chunks[0].chunk_id.clone());
    }
    assert_eq!(chunk_ids, vec!["a.py:f".to_string(), "pkg/b.py:f".to_string()]);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
    assert!(seen[0].contains("return 1"));
    assert!(!seen[0].contains("a.py"));
    drop(seen);

    // Sharing one cache, the second file is answered without the model
    let data = tempdir().unwrap();
    let calls = model.calls();
    let shared = pipeline(data.path(), model.clone()).await;
    shared.audit_file(&src.path().join("a.py"), src.path(), false).await.unwrap();
    shared.audit_file(&src.path().join("pkg/b.py"), src.path(), false).await.unwrap();
    assert_eq!(model.calls() - calls, 2);
}

#[tokio::test]
async fn force_bypasses_cache_for_every_pair() {
    let src = tempdir().unwrap();
    let data = tempdir().unwrap();
    write(src.path(), "b.py", "def bar():\n    return 1\n\ndef baz():\n    return 2\n");
    let model = FakeModel::one_issue_per_wear();
    let pipeline = pipeline(data.path(), model.clone()).await;
    let file = src.path().join("b.py");

    pipeline.audit_file(&file, src.path(), false).await.unwrap();
    let before = model.calls();
    pipeline.audit_file(&file, src.path(), true).await.unwrap();
    assert_eq!(model.calls() - before, 2 * 2);

    // Results stored during the forced run serve the next normal run
    pipeline.audit_file(&file, src.path(), false).await.unwrap();
    assert_eq!(model.calls() - before, 2 * 2);
}

#[tokio::test]
async fn malformed_replies_become_processing_errors() {
    let src = tempdir().unwrap();
    let data = tempdir().unwrap();
    write(src.path(), "a.py", &a_py());
    let model = FakeModel::new(|_| Ok("I think this code is great!".into()));
    let pipeline = pipeline(data.path(), model.clone()).await;

    let result = pipeline
        .audit_file(&src.path().join("a.py"), src.path(), false)
        .await
        .unwrap();

    let issues = &result.chunks[0].issues;
    assert_eq!(issues.len(), 2);
    assert!(issues.iter().all(|i| i.is_processing_error() && i.severity == Severity::Low));
    assert!(issues.iter().all(|i| i.line_number_offset == 0));
    // Three attempts per wear, nothing cached
    assert_eq!(model.calls(), 6);
    pipeline
        .audit_file(&src.path().join("a.py"), src.path(), false)
        .await
        .unwrap();
    assert_eq!(model.calls(), 12);
}

#[tokio::test]
async fn fatal_configuration_aborts_the_directory() {
    let src = tempdir().unwrap();
    let data = tempdir().unwrap();
    write(src.path(), "a.py", &a_py());
    write(src.path(), "b.py", "def bar():\n    return 1\n");
    let model = FakeModel::new(|_| Err(InferenceError::fatal("API error 401: unauthorized")));
    let pipeline = pipeline(data.path(), model).await;

    let err = pipeline.audit_directory(src.path(), false, None).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(!src.path().join(SUMMARY_FILE_NAME).exists());
}

#[tokio::test]
async fn summary_lists_skipped_and_failed_files() {
    let src = tempdir().unwrap();
    let data = tempdir().unwrap();
    let out = tempdir().unwrap();
    write(src.path(), "a.py", &a_py());
    write(src.path(), "empty.py", "");
    write(src.path(), "pkg/b.py", "def bar():\n    return 1\n");
    // A plain file where the mirrored directory should go
    write(out.path(), "pkg", "not a directory");
    let pipeline = pipeline(data.path(), FakeModel::one_issue_per_wear()).await;

    let summary = pipeline
        .audit_directory(src.path(), false, Some(out.path()))
        .await
        .unwrap();

    assert_eq!(summary.total_files, 3);
    assert_eq!(summary.audited_files, 1);
    assert_eq!(summary.skipped_files, 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].file, "pkg/b.py");
    assert_eq!(summary.total_issues, 2);
    assert_eq!(summary.high_severity_total, 1);

    let artifact: Value =
        serde_json::from_slice(&std::fs::read(out.path().join("a_audit.json")).unwrap()).unwrap();
    assert_eq!(artifact["total_issues"], 2);
    assert_eq!(artifact["chunks"][0]["chunk_id"], "a.py:foo");

    let written: Value =
        serde_json::from_slice(&std::fs::read(out.path().join(SUMMARY_FILE_NAME)).unwrap()).unwrap();
    assert_eq!(written["files"][0]["file"], "a.py");
    assert_eq!(written["failed"][0]["file"], "pkg/b.py");
    assert!(!src.path().join(SUMMARY_FILE_NAME).exists());
}

#[tokio::test]
async fn issues_follow_chunk_order() {
    let src = tempdir().unwrap();
    let data = tempdir().unwrap();
    let code: String = (0..8)
        .map(|i| format!("def f{i}():\n    return {i}\n\n"))
        .collect();
    write(src.path(), "many.py", &code);
    let pipeline = pipeline(data.path(), FakeModel::one_issue_per_wear()).await;

    let result = pipeline
        .audit_file(&src.path().join("many.py"), src.path(), false)
        .await
        .unwrap();
    let ids: Vec<_> = result.chunks.iter().map(|c| c.chunk_id.clone()).collect();
    let expected: Vec<_> = (0..8).map(|i| format!("many.py:f{i}")).collect();
    assert_eq!(ids, expected);
    assert!(result
        .chunks
        .iter()
        .all(|c| c.issues[0].issue_type == "security" && c.issues[1].issue_type == "readability"));
}
