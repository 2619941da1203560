use super::{
    FieldSighting, FieldValidator, TemplateMatcher, VisualScorer,
    types::{DoctorOut, FieldsOut, FieldsReq, ImageReq, TemplateOut, VisualOut},
    visual_from_logits,
};
use crate::{
    config::Config,
    intake::ImageInput,
    roster::Roster,
    signals::{FieldKind, FieldValidationResult, Label, TemplateMatchResult, VisualScore},
};
use anyhow::{Context, Result, anyhow};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const VISUAL_SCRIPT: &str = "visual_score.py";
const FIELDS_SCRIPT: &str = "field_extract.py";
const TEMPLATE_SCRIPT: &str = "template_match.py";
const DOCTOR_SCRIPT: &str = "doctor.py";

/// Drives the external model, OCR and template scripts. Each script reads one
/// JSON request on stdin and writes one JSON object on stdout.
pub struct PythonEngine {
    cfg: Config,
    scripts_dir: PathBuf,
    python_exe: PathBuf,
    classes: Vec<Label>,
}

impl PythonEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        let scripts_dir = PathBuf::from(&cfg.paths.scripts_dir);
        if cfg.security.pin_scripts_dir {
            let cwd = std::env::current_dir().with_context(|| "current_dir")?;
            let canon = scripts_dir
                .canonicalize()
                .with_context(|| format!("canonicalize scripts_dir: {}", scripts_dir.display()))?;
            if !canon.starts_with(&cwd) {
                return Err(anyhow!(
                    "scripts_dir is outside cwd while pin_scripts_dir=true: {}",
                    canon.display()
                ));
            }
        }
        for script in [VISUAL_SCRIPT, FIELDS_SCRIPT, TEMPLATE_SCRIPT, DOCTOR_SCRIPT] {
            let path = scripts_dir.join(script);
            if !path.exists() {
                return Err(anyhow!("missing script: {}", path.display()));
            }
        }
        let classes = cfg.class_labels()?;
        Ok(Self {
            cfg: cfg.clone(),
            scripts_dir,
            python_exe: expand_tilde(cfg.collaborators.python_exe.trim()),
            classes,
        })
    }

    fn script(&self, name: &str) -> PathBuf {
        self.scripts_dir.join(name)
    }

    pub fn doctor(&self) -> Result<DocDiagnostics> {
        let script = self.script(DOCTOR_SCRIPT);
        let out: DoctorOut = self.run_json(
            &script,
            &serde_json::json!({"cmd": "doctor"}),
            self.cfg.collaborators.doctor_timeout_seconds,
        )?;
        Ok(DocDiagnostics {
            scripts_dir: self.scripts_dir.display().to_string(),
            class_names: self.classes.iter().map(|c| c.to_string()).collect(),
            python: out,
        })
    }

    fn run_json<I: serde::Serialize, O: for<'de> serde::Deserialize<'de>>(
        &self,
        script: &Path,
        input: &I,
        timeout_seconds: u64,
    ) -> Result<O> {
        debug!("python run {} timeout={}s", script.display(), timeout_seconds);
        let request = serde_json::to_vec(input).with_context(|| "encoding python request")?;

        let mut cmd = Command::new(&self.python_exe);
        cmd.arg(script);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        for (k, v) in &self.cfg.collaborators.env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning python: {}", script.display()))?;

        let output = communicate(&mut child, request, Duration::from_secs(timeout_seconds))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "python script failed: {}\n{}",
                script.display(),
                stderr
            ));
        }

        if self.cfg.debug.keep_python_stderr && !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("python stderr {}: {}", script.display(), stderr.trim());
        }

        let out: O = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parsing python JSON output: {}", script.display()))?;
        Ok(out)
    }

    fn image_req(image: &ImageInput) -> ImageReq {
        ImageReq {
            request_id: image.request_id.clone(),
            image_path: image.path.clone(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DocDiagnostics {
    pub scripts_dir: String,
    pub class_names: Vec<String>,
    pub python: DoctorOut,
}

impl VisualScorer for PythonEngine {
    fn score(&self, image: &ImageInput) -> Result<VisualScore> {
        let script = self.script(VISUAL_SCRIPT);
        let out: VisualOut = self.run_json(
            &script,
            &Self::image_req(image),
            self.cfg.collaborators.timeout_seconds,
        )?;
        if let Some(err) = out.error.as_deref() {
            return Err(anyhow!("visual_score error: {err}"));
        }
        visual_from_logits(&out.scores, &self.classes)
    }
}

impl FieldValidator for PythonEngine {
    fn validate_fields(
        &self,
        image: &ImageInput,
        roster: &Roster,
        min_fields: usize,
    ) -> Result<FieldValidationResult> {
        let script = self.script(FIELDS_SCRIPT);
        let req = FieldsReq {
            request_id: image.request_id.clone(),
            image_path: image.path.clone(),
            min_fields,
            roster: roster.names().map(str::to_string).collect(),
        };
        let out: FieldsOut =
            self.run_json(&script, &req, self.cfg.collaborators.timeout_seconds)?;
        if let Some(err) = out.error.as_deref() {
            return Err(anyhow!("field_extract error: {err}"));
        }

        let mut fields = Vec::with_capacity(out.fields.len());
        for raw in &out.fields {
            match FieldKind::parse(raw) {
                Some(kind) => fields.push(kind),
                None => warn!("ignoring unknown field kind from OCR: {raw}"),
            }
        }

        Ok(FieldSighting {
            fields,
            institution_text: out.institution_text,
        }
        .resolve(roster, min_fields))
    }
}

impl TemplateMatcher for PythonEngine {
    fn match_template(&self, image: &ImageInput) -> Result<TemplateMatchResult> {
        let script = self.script(TEMPLATE_SCRIPT);
        let out: TemplateOut = self.run_json(
            &script,
            &Self::image_req(image),
            self.cfg.collaborators.timeout_seconds,
        )?;
        if let Some(err) = out.error.as_deref() {
            return Err(anyhow!("template_match error: {err}"));
        }
        Ok(TemplateMatchResult {
            matched: out.matched,
            matched_template_id: out.template_id,
        })
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Feed `request` to the child's stdin and collect its output, killing it
/// after `timeout`. The child is always reaped before this returns.
fn communicate(child: &mut Child, request: Vec<u8>, timeout: Duration) -> Result<Output> {
    // Drain pipes before writing; a chatty model runtime must not block on a full buffer.
    let stdout_thread = drain(child.stdout.take(), "stdout");
    let stderr_thread = drain(child.stderr.take(), "stderr");

    let Some(stdin) = child.stdin.take() else {
        let _ = child.kill();
        child.wait().with_context(|| "wait after kill")?;
        return Err(anyhow!("no stdin"));
    };
    let stdin_thread = std::thread::spawn(move || -> std::io::Result<()> {
        let mut stdin = stdin;
        match stdin.write_all(&request).and_then(|()| stdin.flush()) {
            // The script exited without reading everything; its exit status decides.
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
            other => other,
        }
    });
    let mut stdin_thread = Some(stdin_thread);

    let start = Instant::now();
    loop {
        if stdin_thread.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(t) = stdin_thread.take() {
                let written = t
                    .join()
                    .map_err(|_| anyhow!("stdin writer thread panicked"))?;
                if let Err(e) = written {
                    let _ = child.kill();
                    child.wait().with_context(|| "wait after kill")?;
                    return Err(anyhow!(e).context("writing request to python"));
                }
            }
        }

        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("python process timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let _ = stdout_thread.join();
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Err(anyhow!(
                "python process exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr)
            ));
        }

        std::thread::sleep(Duration::from_millis(20));
    }
}

fn drain<R: Read + Send + 'static>(
    pipe: Option<R>,
    name: &'static str,
) -> JoinHandle<Result<Vec<u8>>> {
    std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)
                .with_context(|| format!("read {name}"))?;
        }
        Ok(buf)
    })
}
