use crate::{
    intake,
    pipeline::Pipeline,
    report::{BatchCase, BatchReport},
    signals::{Label, Status},
    util::now_rfc3339,
};
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Expected outcome for a top-level fixture folder. `non_id` holds images that
/// are not identity cards at all and must be rejected like fakes.
pub fn expected_for(category: &str) -> Option<(Label, Status)> {
    match category.to_ascii_lowercase().as_str() {
        "genuine" => Some((Label::Genuine, Status::Approved)),
        "suspicious" => Some((Label::Suspicious, Status::ManualReview)),
        "fake" | "non_id" => Some((Label::Fake, Status::Rejected)),
        _ => None,
    }
}

/// Run every image under `root/<category>/...` through the pipeline and
/// compare against the folder's expectation.
pub fn run(pipeline: &Pipeline<'_>, root: &Path) -> Result<BatchReport> {
    if !root.is_dir() {
        bail!("batch root is not a directory: {}", root.display());
    }
    let started = now_rfc3339();
    let images = collect_images(pipeline, root)?;
    info!("batch: {} images under {}", images.len(), root.display());

    let mut cases = Vec::with_capacity(images.len());
    for (rel, category, path) in images {
        let Some((expected_label, expected_status)) = expected_for(&category) else {
            warn!("skipping {rel}: unknown category folder {category}");
            continue;
        };

        let outcome = intake::admit(pipeline.config(), &path, Some(&rel))
            .and_then(|image| pipeline.validate(&image));

        let case = match outcome {
            Ok(report) => BatchCase {
                path: rel,
                category,
                expected_label,
                expected_status,
                actual_label: Some(report.label),
                actual_status: Some(report.status),
                validation_score: Some(report.validation_score),
                reason: Some(report.reason),
                correct: report.label == expected_label && report.status == expected_status,
                error: None,
            },
            Err(err) => {
                warn!("batch case {rel} errored: {err:#}");
                BatchCase {
                    path: rel,
                    category,
                    expected_label,
                    expected_status,
                    actual_label: None,
                    actual_status: None,
                    validation_score: None,
                    reason: None,
                    correct: false,
                    error: Some(format!("{err:#}")),
                }
            }
        };
        cases.push(case);
    }

    let total = cases.len();
    let passed = cases.iter().filter(|c| c.correct).count();
    let errored = cases.iter().filter(|c| c.error.is_some()).count();
    info!("batch: {passed}/{total} correct, {errored} errored");

    Ok(BatchReport {
        root: root.display().to_string(),
        started,
        finished: now_rfc3339(),
        total,
        passed,
        failed: total - passed - errored,
        errored,
        cases,
    })
}

// (relative path, top-level category, full path), sorted by relative path.
fn collect_images(pipeline: &Pipeline<'_>, root: &Path) -> Result<Vec<(String, String, PathBuf)>> {
    let allowed = &pipeline.config().intake.allowed_extensions;
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("read_dir {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| allowed.iter().any(|a| a.eq_ignore_ascii_case(e)));
            if !is_image {
                continue;
            }
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel_str = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            // Images directly under root have no category.
            if rel.components().count() < 2 {
                warn!("skipping {rel_str}: not inside a category folder");
                continue;
            }
            let category = rel
                .components()
                .next()
                .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
                .unwrap_or_default();
            out.push((rel_str, category, path));
        }
    }

    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}
