use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Genuine,
    Suspicious,
    Fake,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Genuine, Label::Suspicious, Label::Fake];

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Genuine => "genuine",
            Label::Suspicious => "suspicious",
            Label::Fake => "fake",
        }
    }

    pub fn parse(s: &str) -> Option<Label> {
        match s.trim().to_ascii_lowercase().as_str() {
            "genuine" => Some(Label::Genuine),
            "suspicious" => Some(Label::Suspicious),
            "fake" => Some(Label::Fake),
            _ => None,
        }
    }

    /// Workflow status for a final label. Fixed, not configurable.
    pub fn status(self) -> Status {
        match self {
            Label::Genuine => Status::Approved,
            Label::Suspicious => Status::ManualReview,
            Label::Fake => Status::Rejected,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Approved,
    ManualReview,
    Rejected,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Approved => "approved",
            Status::ManualReview => "manual_review",
            Status::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Name,
    RollNumber,
    Institution,
    Course,
}

impl FieldKind {
    pub const ALL: [FieldKind; 4] = [
        FieldKind::Name,
        FieldKind::RollNumber,
        FieldKind::Institution,
        FieldKind::Course,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Name => "name",
            FieldKind::RollNumber => "roll_number",
            FieldKind::Institution => "institution",
            FieldKind::Course => "course",
        }
    }

    pub fn parse(s: &str) -> Option<FieldKind> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "name" => Some(FieldKind::Name),
            "roll_number" | "roll_no" | "id_number" => Some(FieldKind::RollNumber),
            "institution" | "college" => Some(FieldKind::Institution),
            "course" | "branch" => Some(FieldKind::Course),
            _ => None,
        }
    }
}

/// Class prediction from the image classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualScore {
    pub predicted_class: Label,
    pub confidence: f64,
}

impl VisualScore {
    pub fn new(predicted_class: Label, confidence: f64) -> Self {
        Self {
            predicted_class,
            confidence,
        }
    }

    /// Stand-in when the scorer produced nothing: a non-fake class the engine
    /// can never treat as confident.
    pub fn worst_case() -> Self {
        Self::new(Label::Suspicious, 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValidationResult {
    pub fields_found: BTreeSet<FieldKind>,
    #[serde(default)]
    pub institution_name: Option<String>,
    pub institution_approved: bool,
    pub min_fields_required: usize,
}

impl FieldValidationResult {
    pub fn worst_case(min_fields_required: usize) -> Self {
        Self {
            fields_found: BTreeSet::new(),
            institution_name: None,
            institution_approved: false,
            min_fields_required,
        }
    }

    pub fn missing_fields(&self) -> Vec<FieldKind> {
        FieldKind::ALL
            .into_iter()
            .filter(|k| !self.fields_found.contains(k))
            .collect()
    }

    pub fn has_enough_fields(&self) -> bool {
        self.fields_found.len() >= self.min_fields_required
    }

    /// An approval flag without a readable name counts as not approved.
    pub fn institution_ok(&self) -> bool {
        self.institution_approved
            && self
                .institution_name
                .as_deref()
                .is_some_and(|n| !n.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMatchResult {
    pub matched: bool,
    #[serde(default)]
    pub matched_template_id: Option<String>,
}

impl TemplateMatchResult {
    pub fn worst_case() -> Self {
        Self {
            matched: false,
            matched_template_id: None,
        }
    }
}

/// Which precedence rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    VisualFake,
    LowConfidence,
    Corroborated,
    Uncorroborated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub label: Label,
    pub status: Status,
    pub reason: String,
    pub rule: RuleId,
    pub failed_checks: Vec<String>,
}

/// The three signals for one request, as recorded or replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub visual: VisualScore,
    pub fields: FieldValidationResult,
    pub template: TemplateMatchResult,
}

impl Evidence {
    /// Parse recorded evidence. A confidence outside `[0, 1]` is rejected
    /// rather than fed to the engine.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let evidence: Evidence = serde_json::from_str(raw)?;
        let c = evidence.visual.confidence;
        if !c.is_finite() || !(0.0..=1.0).contains(&c) {
            anyhow::bail!("visual.confidence must be within [0, 1], got {c}");
        }
        Ok(evidence)
    }
}
