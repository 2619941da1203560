use crate::{
    config::{Config, UpstreamFailurePolicy},
    engine::{FieldValidator, TemplateMatcher, VisualScorer},
    intake::ImageInput,
    policy,
    report::ValidationReport,
    roster::Roster,
    signals::{Evidence, FieldValidationResult, TemplateMatchResult, VisualScore},
};
use anyhow::{Context, Result, anyhow};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One request through the three collaborators and the decision engine.
pub struct Pipeline<'a> {
    cfg: Config,
    roster: Roster,
    visual: &'a dyn VisualScorer,
    fields: &'a dyn FieldValidator,
    template: &'a dyn TemplateMatcher,
}

impl<'a> Pipeline<'a> {
    pub fn new<E>(cfg: &Config, roster: Roster, engine: &'a E) -> Self
    where
        E: VisualScorer + FieldValidator + TemplateMatcher,
    {
        Self::from_parts(cfg, roster, engine, engine, engine)
    }

    pub fn from_parts(
        cfg: &Config,
        roster: Roster,
        visual: &'a dyn VisualScorer,
        fields: &'a dyn FieldValidator,
        template: &'a dyn TemplateMatcher,
    ) -> Self {
        Self {
            cfg: cfg.clone(),
            roster,
            visual,
            fields,
            template,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn validate(&self, image: &ImageInput) -> Result<ValidationReport> {
        let started = Instant::now();
        let min_fields = self.cfg.min_required_fields();

        let (visual, fields, template) = if self.cfg.pipeline.parallel_collaborators {
            std::thread::scope(|s| {
                let visual = s.spawn(|| self.visual.score(image));
                let fields =
                    s.spawn(|| self.fields.validate_fields(image, &self.roster, min_fields));
                let template = self.template.match_template(image);
                let visual = visual
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("visual scorer panicked")));
                let fields = fields
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("field validator panicked")));
                (visual, fields, template)
            })
        } else {
            (
                self.visual.score(image),
                self.fields.validate_fields(image, &self.roster, min_fields),
                self.template.match_template(image),
            )
        };

        let mut degraded = Vec::new();
        let visual = self.settle(
            &image.request_id,
            "visual_scorer",
            visual,
            VisualScore::worst_case,
            &mut degraded,
        )?;
        let fields = self.settle(
            &image.request_id,
            "field_validator",
            fields,
            || FieldValidationResult::worst_case(min_fields),
            &mut degraded,
        )?;
        let template = self.settle(
            &image.request_id,
            "template_matcher",
            template,
            TemplateMatchResult::worst_case,
            &mut degraded,
        )?;

        let threshold = self.cfg.threshold();
        let decision = policy::decide(&visual, &fields, &template, threshold);

        info!(
            request_id = %image.request_id,
            label = %decision.label,
            status = %decision.status,
            rule = ?decision.rule,
            confidence = visual.confidence,
            "decision: {}",
            decision.reason
        );
        debug!(
            request_id = %image.request_id,
            "collaborators + decision took {:?}",
            started.elapsed()
        );

        Ok(ValidationReport {
            request_id: image.request_id.clone(),
            label: decision.label,
            status: decision.status,
            reason: decision.reason,
            rule: decision.rule,
            validation_score: visual.confidence,
            threshold,
            evidence: Evidence {
                visual,
                fields,
                template,
            },
            degraded,
        })
    }

    // Absent evidence fails its checks; it is never neutral.
    fn settle<T>(
        &self,
        request_id: &str,
        collaborator: &str,
        result: Result<T>,
        worst_case: impl FnOnce() -> T,
        degraded: &mut Vec<String>,
    ) -> Result<T> {
        match (result, self.cfg.pipeline.on_upstream_failure) {
            (Ok(v), _) => Ok(v),
            (Err(err), UpstreamFailurePolicy::Fail) => {
                Err(err).with_context(|| format!("{collaborator} failed for request {request_id}"))
            }
            (Err(err), UpstreamFailurePolicy::WorstCase) => {
                warn!(
                    request_id = %request_id,
                    "{collaborator} failed; using worst-case evidence: {err:#}"
                );
                degraded.push(collaborator.to_string());
                Ok(worst_case())
            }
        }
    }
}
