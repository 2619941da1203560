use super::{FieldSighting, FieldValidator, TemplateMatcher, VisualScorer};
use crate::{
    intake::ImageInput,
    roster::Roster,
    signals::{FieldKind, FieldValidationResult, Label, TemplateMatchResult, VisualScore},
};
use anyhow::{Result, anyhow};

/// A canned collaborator answer.
#[derive(Debug, Clone)]
pub enum Canned<T> {
    Value(T),
    Fail(String),
}

impl<T: Clone> Canned<T> {
    fn get(&self, what: &str) -> Result<T> {
        match self {
            Canned::Value(v) => Ok(v.clone()),
            Canned::Fail(msg) => Err(anyhow!("{what} unavailable: {msg}")),
        }
    }
}

/// Deterministic collaborators that answer every image the same way.
/// Field sightings still go through the roster, like the real extractor.
#[derive(Debug, Clone)]
pub struct FixedEngine {
    pub visual: Canned<VisualScore>,
    pub fields: Canned<FieldSighting>,
    pub template: Canned<TemplateMatchResult>,
}

impl FixedEngine {
    pub fn new(visual: VisualScore, fields: FieldSighting, template: TemplateMatchResult) -> Self {
        Self {
            visual: Canned::Value(visual),
            fields: Canned::Value(fields),
            template: Canned::Value(template),
        }
    }

    /// Every signal agrees on genuine for an institution named `institution`.
    pub fn all_clear(institution: &str) -> Self {
        Self::new(
            VisualScore::new(Label::Genuine, 0.95),
            FieldSighting {
                fields: FieldKind::ALL.to_vec(),
                institution_text: Some(institution.to_string()),
            },
            TemplateMatchResult {
                matched: true,
                matched_template_id: Some("template1".into()),
            },
        )
    }
}

impl VisualScorer for FixedEngine {
    fn score(&self, _image: &ImageInput) -> Result<VisualScore> {
        self.visual.get("visual scorer")
    }
}

impl FieldValidator for FixedEngine {
    fn validate_fields(
        &self,
        _image: &ImageInput,
        roster: &Roster,
        min_fields: usize,
    ) -> Result<FieldValidationResult> {
        Ok(self
            .fields
            .get("field validator")?
            .resolve(roster, min_fields))
    }
}

impl TemplateMatcher for FixedEngine {
    fn match_template(&self, _image: &ImageInput) -> Result<TemplateMatchResult> {
        self.template.get("template matcher")
    }
}
