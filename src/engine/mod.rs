pub mod fixed;
pub mod python;
pub mod types;

use crate::{
    intake::ImageInput,
    roster::Roster,
    signals::{FieldKind, FieldValidationResult, Label, TemplateMatchResult, VisualScore},
};
use anyhow::{Result, anyhow, bail};
use std::collections::BTreeSet;

pub use types::{DoctorOut, FieldsOut, TemplateOut, VisualOut};

/// Can score an image's visual authenticity.
pub trait VisualScorer: Send + Sync {
    fn score(&self, image: &ImageInput) -> Result<VisualScore>;
}

/// Can read the required text fields off an image and check the institution.
pub trait FieldValidator: Send + Sync {
    fn validate_fields(
        &self,
        image: &ImageInput,
        roster: &Roster,
        min_fields: usize,
    ) -> Result<FieldValidationResult>;
}

/// Can compare an image's layout against the known template families.
pub trait TemplateMatcher: Send + Sync {
    fn match_template(&self, image: &ImageInput) -> Result<TemplateMatchResult>;
}

/// Raw OCR output before the roster is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSighting {
    pub fields: Vec<FieldKind>,
    pub institution_text: Option<String>,
}

impl FieldSighting {
    pub fn resolve(self, roster: &Roster, min_fields: usize) -> FieldValidationResult {
        let institution_name = self
            .institution_text
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let institution_approved = roster.is_approved(institution_name.as_deref());
        FieldValidationResult {
            fields_found: self.fields.into_iter().collect::<BTreeSet<_>>(),
            institution_name,
            institution_approved,
            min_fields_required: min_fields,
        }
    }
}

/// Softmax over raw model scores, then argmax mapped through the configured
/// class order. Ties go to the earliest class.
pub fn visual_from_logits(scores: &[f64], classes: &[Label]) -> Result<VisualScore> {
    if scores.len() != classes.len() {
        bail!(
            "model returned {} scores for {} classes",
            scores.len(),
            classes.len()
        );
    }
    if scores.iter().any(|s| !s.is_finite()) {
        bail!("model returned non-finite scores: {scores:?}");
    }

    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();

    let mut best = 0usize;
    for (i, e) in exps.iter().enumerate() {
        if *e > exps[best] {
            best = i;
        }
    }
    let predicted_class = *classes
        .get(best)
        .ok_or_else(|| anyhow!("no classes configured"))?;

    Ok(VisualScore::new(predicted_class, exps[best] / sum))
}
