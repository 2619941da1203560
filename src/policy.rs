use crate::signals::{
    Decision, Evidence, FieldValidationResult, Label, RuleId, TemplateMatchResult, VisualScore,
};

/// Outcome of each sub-check, computed once per decision.
#[derive(Debug, Clone, Copy)]
struct Checks {
    visual_ok: bool,
    fields_count_ok: bool,
    institution_ok: bool,
    template_ok: bool,
}

impl Checks {
    fn evaluate(
        visual: &VisualScore,
        fields: &FieldValidationResult,
        template: &TemplateMatchResult,
        threshold: f64,
    ) -> Self {
        Self {
            // NaN compares false and lands in the low-confidence rule.
            visual_ok: visual.confidence >= threshold,
            fields_count_ok: fields.has_enough_fields(),
            institution_ok: fields.institution_ok(),
            template_ok: template.matched,
        }
    }

    fn fields_ok(&self) -> bool {
        self.fields_count_ok && self.institution_ok
    }
}

/// Fuse the three signals into one decision. First matching rule wins:
/// a fake call at any confidence, then low visual confidence, then
/// full corroboration, then everything else.
pub fn decide(
    visual: &VisualScore,
    fields: &FieldValidationResult,
    template: &TemplateMatchResult,
    threshold: f64,
) -> Decision {
    let checks = Checks::evaluate(visual, fields, template, threshold);

    let rule = match (visual.predicted_class, checks.visual_ok) {
        (Label::Fake, _) => RuleId::VisualFake,
        (_, false) => RuleId::LowConfidence,
        (Label::Genuine, true) if checks.fields_ok() && checks.template_ok => RuleId::Corroborated,
        _ => RuleId::Uncorroborated,
    };

    let label = match rule {
        RuleId::VisualFake => Label::Fake,
        RuleId::Corroborated => Label::Genuine,
        RuleId::LowConfidence | RuleId::Uncorroborated => Label::Suspicious,
    };

    let summary = match rule {
        RuleId::VisualFake => format!(
            "visual classifier flagged fake with confidence {:.2}",
            visual.confidence
        ),
        RuleId::LowConfidence => format!(
            "visual confidence {:.2} below threshold {:.2}",
            visual.confidence, threshold
        ),
        RuleId::Corroborated => format!(
            "visual classifier, field validation and template match all agree on genuine (confidence {:.2})",
            visual.confidence
        ),
        RuleId::Uncorroborated => "corroborating evidence failed".to_string(),
    };

    let failed_checks = failed_checks(visual, fields, &checks);
    let reason = if failed_checks.is_empty() {
        summary
    } else {
        format!("{summary}: {}", failed_checks.join("; "))
    };

    Decision {
        label,
        status: label.status(),
        reason,
        rule,
        failed_checks,
    }
}

pub fn decide_evidence(evidence: &Evidence, threshold: f64) -> Decision {
    decide(
        &evidence.visual,
        &evidence.fields,
        &evidence.template,
        threshold,
    )
}

// Order is fixed: visual, fields, institution, template.
fn failed_checks(visual: &VisualScore, fields: &FieldValidationResult, checks: &Checks) -> Vec<String> {
    let mut out = Vec::new();

    if visual.predicted_class == Label::Suspicious {
        out.push("visual classifier predicted suspicious".to_string());
    }

    if !checks.fields_count_ok {
        let missing = fields
            .missing_fields()
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>();
        let mut msg = format!(
            "insufficient fields: found {} of {} required",
            fields.fields_found.len(),
            fields.min_fields_required
        );
        if !missing.is_empty() {
            msg.push_str(&format!(" (missing {})", missing.join(", ")));
        }
        out.push(msg);
    }

    if !checks.institution_ok {
        match fields.institution_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                out.push(format!("institution \"{name}\" not on approved roster"))
            }
            _ => out.push("institution name not detected".to_string()),
        }
    }

    if !checks.template_ok {
        out.push("template/layout mismatch".to_string());
    }

    out
}
