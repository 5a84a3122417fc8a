#![allow(dead_code)]

use async_trait::async_trait;
use audit_inference::{ChatRequest, ChatTransport, InferenceClient, InferenceError, ModelConfig};
use audit_pipeline::{Pipeline, PipelineConfig};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Responder = dyn Fn(&ChatRequest) -> Result<String, InferenceError> + Send + Sync;

/// In-process stand-in for the chat API
pub struct FakeModel {
    respond: Box<Responder>,
    calls: AtomicUsize,
}

impl FakeModel {
    pub fn new(
        respond: impl Fn(&ChatRequest) -> Result<String, InferenceError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
        })
    }

    /// One high-severity security issue and one low readability issue per chunk
    pub fn one_issue_per_wear() -> Arc<Self> {
        Self::new(|req| {
            if !req.json_mode {
                return Ok(format!("Generated text for: {}", first_line(&req.user_content)));
            }
            if is_security(req) {
                Ok(r#"{"issues": [{"severity": "high", "description": "Shell command built from input", "suggestion": "Use an argument list", "line_number_offset": 3}]}"#.into())
            } else {
                Ok(r#"```json
{"issues": [{"severity": "low", "description": "Name is vague", "line_number_offset": 5}]}
```"#.into())
            }
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for FakeModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(request)
    }
}

pub fn is_security(req: &ChatRequest) -> bool {
    req.system_prompt.contains("security reviewer")
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

pub async fn pipeline(data_dir: &Path, model: Arc<FakeModel>) -> Pipeline {
    pipeline_with_limit(data_dir, model, 2000).await
}

pub async fn pipeline_with_limit(data_dir: &Path, model: Arc<FakeModel>, char_limit: usize) -> Pipeline {
    let config = ModelConfig::new("http://fake.local/v1", "fake-model").with_backoff(Duration::ZERO);
    let client = InferenceClient::with_transport(config, model);
    let mut settings = PipelineConfig::new(data_dir);
    settings.char_limit = char_limit;
    settings.concurrency = 4;
    Pipeline::open(settings, client).await.expect("pipeline opens")
}

pub fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

/// `import os` preamble followed by a 30-line function `foo` starting on line 2
pub fn a_py() -> String {
    let mut code = String::from("import os\n\ndef foo(cmd):\n");
    for i in 0..28 {
        code.push_str(&format!("    step_{i} = os.system(cmd + \"{i}\")\n"));
    }
    code.push_str("    return step_0\n");
    code
}
