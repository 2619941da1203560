use crate::signals::{Evidence, Label, RuleId, Status};
use serde::{Deserialize, Serialize};

/// What the caller gets back for one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub request_id: String,
    pub label: Label,
    pub status: Status,
    pub reason: String,
    pub rule: RuleId,
    pub validation_score: f64,
    pub threshold: f64,
    pub evidence: Evidence,
    /// Collaborators whose failure was replaced by worst-case evidence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCase {
    pub path: String,
    pub category: String,
    pub expected_label: Label,
    pub expected_status: Status,
    #[serde(default)]
    pub actual_label: Option<Label>,
    #[serde(default)]
    pub actual_status: Option<Status>,
    #[serde(default)]
    pub validation_score: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
    pub correct: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub root: String,
    pub started: String,
    pub finished: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub cases: Vec<BatchCase>,
}
