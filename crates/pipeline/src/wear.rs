//! Review personas ("wears") and the issues they report.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Wears applied to every chunk by an audit
pub const AUDIT_WEARS: &[&str] = &["security", "readability"];

pub const WHY_EXTRACTOR: &str = "why_extractor";
pub const ARCHITECTURE_REVIEWER: &str = "architecture_reviewer";
pub const DETAIL_DESIGNER: &str = "detail_designer";
pub const OVERVIEW_DESIGNER: &str = "overview_designer";

/// Issue type used for chunks whose review could not be completed
pub const PROCESSING_ERROR: &str = "processing-error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WearOutput {
    /// JSON `{"issues": [...]}`
    Issues,
    /// Free text explaining design intent
    Rationale,
    /// Markdown document
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wear {
    pub id: &'static str,
    pub issue_type: &'static str,
    pub system_prompt: &'static str,
    pub output: WearOutput,
}

impl Wear {
    #[must_use]
    pub fn builtin(id: &str) -> Option<&'static Wear> {
        BUILTIN_WEARS.iter().find(|w| w.id == id)
    }

    #[must_use]
    pub fn all() -> &'static [Wear] {
        BUILTIN_WEARS
    }

    /// The wears of [`AUDIT_WEARS`], in order
    #[must_use]
    pub fn audit_set() -> Vec<&'static Wear> {
        AUDIT_WEARS.iter().filter_map(|id| Self::builtin(id)).collect()
    }

    #[must_use]
    pub fn json_mode(&self) -> bool {
        self.output == WearOutput::Issues
    }
}

/// Persona text followed by the shared JSON reply format
macro_rules! issue_prompt {
    ($($persona:literal),+ $(,)?) => {
        concat!(
            $($persona,)+
            "\n\n",
            r#"Respond with a single JSON object and nothing else:
{"issues": [{"severity": "high" | "medium" | "low", "description": "...", "suggestion": "...", "line_number_offset": 0}]}
line_number_offset is the 0-based line index within the code you were given.
Return {"issues": []} when you find nothing worth reporting."#
        )
    };
}

static BUILTIN_WEARS: &[Wear] = &[
    Wear {
        id: "security",
        issue_type: "security",
        system_prompt: issue_prompt!(
            "You are a senior application security reviewer. Examine the code for ",
            "vulnerabilities: injection, unsafe deserialization, path traversal, ",
            "hard-coded secrets, missing input validation, insecure cryptography and ",
            "unsafe handling of untrusted data. Report only concrete problems visible ",
            "in the code, not generic advice.",
        ),
        output: WearOutput::Issues,
    },
    Wear {
        id: "readability",
        issue_type: "readability",
        system_prompt: issue_prompt!(
            "You are a clean-code reviewer. Look for unclear names, functions doing ",
            "too much, deep nesting, duplicated logic, misleading comments, dead code ",
            "and error handling that hides failures. Rate severity by how much the ",
            "problem hurts a maintainer.",
        ),
        output: WearOutput::Issues,
    },
    Wear {
        id: WHY_EXTRACTOR,
        issue_type: "rationale",
        system_prompt: concat!(
            "You are a software archaeologist. Given one function or class, explain why ",
            "it is written the way it is: the problem it solves, the constraints it ",
            "appears to work around and the trade-offs the author accepted. Answer in ",
            "three to six plain sentences. Do not restate the code line by line."
        ),
        output: WearOutput::Rationale,
    },
    Wear {
        id: ARCHITECTURE_REVIEWER,
        issue_type: "architecture",
        system_prompt: concat!(
            "You are a software architect reviewing skeleton code: signatures, classes ",
            "and docstrings with bodies removed. Assess module boundaries, layering, ",
            "coupling, naming consistency and responsibilities. Write a Markdown review ",
            "with sections for strengths, problems and concrete recommendations."
        ),
        output: WearOutput::Document,
    },
    Wear {
        id: DETAIL_DESIGNER,
        issue_type: "design",
        system_prompt: concat!(
            "You write internal design documents from skeleton code. For each file ",
            "describe its purpose, the main types and functions with their ",
            "responsibilities, inputs and outputs, and how it depends on other files. ",
            "Write Markdown with one section per file."
        ),
        output: WearOutput::Document,
    },
    Wear {
        id: OVERVIEW_DESIGNER,
        issue_type: "design",
        system_prompt: concat!(
            "You write external design overviews. From the internal design document ",
            "you are given, describe the system as a whole: its purpose, the main ",
            "components and how they interact, the data flow and the external ",
            "interfaces. Write Markdown for a reader who will not read the code."
        ),
        output: WearOutput::Document,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Unknown labels degrade to `Low`
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" | "severe" => Self::High,
            "medium" | "moderate" | "med" => Self::Medium,
            _ => Self::Low,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding from a single wear on a single chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Line within the chunk, 0-based
    pub line_number_offset: usize,
    /// 1-based line in the source file, filled in once the chunk is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute_line: Option<usize>,
}

impl Issue {
    /// Placeholder recorded when a wear could not review a chunk
    #[must_use]
    pub fn processing_error(wear_id: &str, reason: impl fmt::Display) -> Self {
        Self {
            issue_type: PROCESSING_ERROR.to_string(),
            severity: Severity::Low,
            description: format!("{wear_id} review failed: {reason}"),
            suggestion: None,
            line_number_offset: 0,
            absolute_line: None,
        }
    }

    /// 1-based source line for a chunk starting at 0-based `start_line`
    #[must_use]
    pub fn absolute_line(&self, start_line: usize) -> usize {
        start_line + self.line_number_offset + 1
    }

    #[must_use]
    pub fn resolved(mut self, start_line: usize) -> Self {
        self.absolute_line = Some(self.absolute_line(start_line));
        self
    }

    #[must_use]
    pub fn is_processing_error(&self) -> bool {
        self.issue_type == PROCESSING_ERROR
    }
}

/// Read `{"issues": [...]}` leniently.
///
/// Entries that are not objects or carry no description are dropped. The
/// shape error is returned only when there is no `issues` array at all.
pub fn parse_issues(value: &Value, issue_type: &str) -> Result<Vec<Issue>, String> {
    let items = value
        .get("issues")
        .and_then(Value::as_array)
        .ok_or_else(|| "response has no \"issues\" array".to_string())?;

    Ok(items
        .iter()
        .filter_map(|item| issue_from_value(item, issue_type))
        .collect())
}

fn issue_from_value(item: &Value, issue_type: &str) -> Option<Issue> {
    let obj = item.as_object()?;
    let text = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    };

    let description = text(&["description", "message", "issue", "problem"])?;
    let severity = obj
        .get("severity")
        .and_then(Value::as_str)
        .map_or(Severity::Low, Severity::parse_lenient);
    let line_number_offset = ["line_number_offset", "line_offset", "line_number", "line"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(as_line))
        .unwrap_or(0);

    Some(Issue {
        issue_type: issue_type.to_string(),
        severity,
        description,
        suggestion: text(&["suggestion", "fix", "recommendation"]),
        line_number_offset,
        absolute_line: None,
    })
}

fn as_line(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
