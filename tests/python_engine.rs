#![cfg(unix)]

mod common;

use common::{scratch_dir, test_config, test_roster, write_image};
use idcard_check::{
    config::Config,
    engine::{FieldValidator, TemplateMatcher, VisualScorer, python::PythonEngine},
    intake::ImageInput,
    roster::Roster,
    signals::{FieldKind, Label},
};
use std::collections::BTreeSet;
use std::path::Path;

const OK_VISUAL: &str = r#"printf '%s\n' '{"scores":[2.0,0.1,0.1]}'"#;
const OK_FIELDS: &str =
    r#"printf '%s\n' '{"fields":["name","roll_number"],"institution_text":"Anna University"}'"#;
const OK_TEMPLATE: &str = r#"printf '%s\n' '{"matched":true,"template_id":"anna-2024"}'"#;
const OK_DOCTOR: &str =
    r#"printf '%s\n' '{"python_exe":"sh","python_version":"0","ok":true,"components":{}}'"#;

/// Scripts dir with one-line shell scripts under the expected names; `sh` stands in for python.
fn engine_with(
    name: &str,
    visual: &str,
    fields: &str,
    template: &str,
) -> (Config, PythonEngine, ImageInput) {
    let dir = scratch_dir(name);
    for (script, body) in [
        ("visual_score.py", visual),
        ("field_extract.py", fields),
        ("template_match.py", template),
        ("doctor.py", OK_DOCTOR),
    ] {
        std::fs::write(dir.join(script), format!("{body}\n")).unwrap();
    }
    let image = write_image(&dir, "card.png", b"png bytes");

    let mut cfg = test_config();
    cfg.paths.scripts_dir = dir.display().to_string();
    cfg.security.pin_scripts_dir = false;
    cfg.collaborators.python_exe = "sh".into();
    cfg.collaborators.timeout_seconds = 2;
    let engine = PythonEngine::new(&cfg).unwrap();
    (cfg, engine, input(name, &image))
}

fn input(request_id: &str, path: &Path) -> ImageInput {
    ImageInput {
        request_id: request_id.into(),
        path: path.to_path_buf(),
        byte_len: 9,
        sha256: String::new(),
    }
}

fn big_roster() -> Roster {
    let mut names: Vec<String> = (0..5000)
        .map(|i| format!("Regional Institute of Technology and Science {i:05}"))
        .collect();
    names.push("Anna University".into());
    Roster::from_names(names, true).unwrap()
}

#[test]
fn well_formed_scripts_produce_signals() {
    let (cfg, engine, image) = engine_with("py-ok", OK_VISUAL, OK_FIELDS, OK_TEMPLATE);
    let roster = test_roster(&cfg);

    let visual = engine.score(&image).unwrap();
    assert_eq!(visual.predicted_class, Label::Genuine);
    assert!(visual.confidence > 0.7);

    let fields = engine.validate_fields(&image, &roster, 2).unwrap();
    assert_eq!(
        fields.fields_found,
        BTreeSet::from([FieldKind::Name, FieldKind::RollNumber])
    );
    assert_eq!(fields.institution_name.as_deref(), Some("Anna University"));
    assert!(fields.institution_approved);

    let template = engine.match_template(&image).unwrap();
    assert!(template.matched);
    assert_eq!(template.matched_template_id.as_deref(), Some("anna-2024"));

    let doc = engine.doctor().unwrap();
    assert!(doc.python.ok);
}

#[test]
fn nonzero_exit_fails_with_stderr() {
    let (_, engine, image) = engine_with("py-exit", "echo boom >&2; exit 1", OK_FIELDS, OK_TEMPLATE);
    let err = format!("{:#}", engine.score(&image).unwrap_err());
    assert!(err.contains("python script failed"), "{err}");
    assert!(err.contains("boom"), "{err}");
}

#[test]
fn slow_script_is_killed_at_timeout() {
    let (_, engine, image) = engine_with("py-slow", OK_VISUAL, OK_FIELDS, "exec sleep 5");
    let started = std::time::Instant::now();
    let err = format!("{:#}", engine.match_template(&image).unwrap_err());
    assert!(err.contains("exceeded timeout"), "{err}");
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[test]
fn garbage_stdout_is_a_parse_error() {
    let (_, engine, image) = engine_with("py-garbage", "echo not json", OK_FIELDS, OK_TEMPLATE);
    let err = format!("{:#}", engine.score(&image).unwrap_err());
    assert!(err.contains("parsing python JSON output"), "{err}");
}

#[test]
fn error_field_fails_the_collaborator() {
    let (cfg, engine, image) = engine_with(
        "py-error-field",
        r#"printf '%s\n' '{"error":"x"}'"#,
        r#"printf '%s\n' '{"error":"ocr down"}'"#,
        r#"printf '%s\n' '{"error":"no templates"}'"#,
    );
    let roster = test_roster(&cfg);

    let err = format!("{:#}", engine.score(&image).unwrap_err());
    assert!(err.contains("visual_score error: x"), "{err}");
    let err = format!("{:#}", engine.validate_fields(&image, &roster, 2).unwrap_err());
    assert!(err.contains("field_extract error: ocr down"), "{err}");
    let err = format!("{:#}", engine.match_template(&image).unwrap_err());
    assert!(err.contains("template_match error: no templates"), "{err}");
}

#[test]
fn unknown_and_repeated_field_kinds_are_dropped() {
    let (cfg, engine, image) = engine_with(
        "py-unknown-kind",
        OK_VISUAL,
        r#"printf '%s\n' '{"fields":["name","bogus","name"],"institution_text":"Anna University"}'"#,
        OK_TEMPLATE,
    );
    let fields = engine.validate_fields(&image, &test_roster(&cfg), 2).unwrap();
    assert_eq!(fields.fields_found, BTreeSet::from([FieldKind::Name]));
    assert!(fields.institution_approved);
    assert!(!fields.has_enough_fields());
}

#[test]
fn chatty_stderr_before_reading_a_large_request_completes() {
    // Fills the stderr pipe before touching stdin, while the request is larger than a pipe buffer.
    let (_, engine, image) = engine_with(
        "py-chatty",
        OK_VISUAL,
        &format!("head -c 200000 /dev/zero | tr '\\0' x >&2; cat >/dev/null; {OK_FIELDS}"),
        OK_TEMPLATE,
    );
    let fields = engine.validate_fields(&image, &big_roster(), 2).unwrap();
    assert!(fields.institution_approved);
    assert!(fields.has_enough_fields());
}

#[test]
fn script_that_ignores_a_large_request_still_answers() {
    let (_, engine, image) = engine_with("py-no-read", OK_VISUAL, OK_FIELDS, OK_TEMPLATE);
    let fields = engine.validate_fields(&image, &big_roster(), 2).unwrap();
    assert_eq!(fields.institution_name.as_deref(), Some("Anna University"));
    assert!(fields.institution_approved);
}

#[test]
fn missing_script_is_rejected_at_construction() {
    let (cfg, _, _) = engine_with("py-missing", OK_VISUAL, OK_FIELDS, OK_TEMPLATE);
    std::fs::remove_file(Path::new(&cfg.paths.scripts_dir).join("doctor.py")).unwrap();
    let err = PythonEngine::new(&cfg).err().unwrap().to_string();
    assert!(err.contains("missing script"), "{err}");
}
