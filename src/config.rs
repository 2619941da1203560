use crate::signals::Label;
use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub decision: Decision,
    #[serde(default)]
    pub model: Model,
    #[serde(default)]
    pub roster: Roster,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub collaborators: Collaborators,
    #[serde(default)]
    pub pipeline: Pipeline,
    #[serde(default)]
    pub intake: Intake,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    /// Read, parse and validate. Anything malformed fails here, never per request.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        cfg.validate()
            .with_context(|| format!("invalid config: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let t = self.decision.validation_threshold;
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            bail!("decision.validation_threshold must be within [0, 1], got {t}");
        }
        if self.decision.min_required_fields < 0 {
            bail!(
                "decision.min_required_fields must not be negative, got {}",
                self.decision.min_required_fields
            );
        }
        self.class_labels()?;
        if self.collaborators.timeout_seconds == 0 {
            bail!("collaborators.timeout_seconds must be > 0");
        }
        if self.limits.max_image_bytes == 0 {
            bail!("limits.max_image_bytes must be > 0");
        }
        if self.intake.allowed_extensions.is_empty() {
            bail!("intake.allowed_extensions must not be empty");
        }
        if self.roster.path.is_empty() && self.roster.institutions.is_empty() {
            bail!("roster needs a path or inline institutions");
        }
        Ok(())
    }

    pub fn threshold(&self) -> f64 {
        self.decision.validation_threshold
    }

    pub fn min_required_fields(&self) -> usize {
        self.decision.min_required_fields.max(0) as usize
    }

    /// Model output order mapped to labels. Must be a permutation of the three classes.
    pub fn class_labels(&self) -> Result<Vec<Label>> {
        let names = &self.model.class_names;
        if names.len() != Label::ALL.len() {
            bail!(
                "model.class_names must list exactly {} classes, got {}",
                Label::ALL.len(),
                names.len()
            );
        }
        let mut labels = Vec::with_capacity(names.len());
        for name in names {
            let label = Label::parse(name)
                .ok_or_else(|| anyhow!("unknown class name in model.class_names: {name}"))?;
            if labels.contains(&label) {
                bail!("duplicate class name in model.class_names: {name}");
            }
            labels.push(label);
        }
        Ok(labels)
    }

    pub fn normalized_for_dump(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub validation_threshold: f64,
    pub min_required_fields: i64,
}
impl Default for Decision {
    fn default() -> Self {
        Self {
            validation_threshold: 0.7,
            min_required_fields: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub class_names: Vec<String>,
}
impl Default for Model {
    fn default() -> Self {
        Self {
            class_names: vec!["genuine".into(), "fake".into(), "suspicious".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    /// JSON array of canonical institution names. Empty disables the file source.
    pub path: String,
    #[serde(default)]
    pub institutions: Vec<String>,
    pub allow_partial_match: bool,
}
impl Default for Roster {
    fn default() -> Self {
        Self {
            path: "approved_colleges.json".into(),
            institutions: Vec::new(),
            allow_partial_match: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub out_dir: String,
    pub scripts_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            scripts_dir: "scripts".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborators {
    pub python_exe: String,
    pub timeout_seconds: u64,
    pub doctor_timeout_seconds: u64,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
impl Default for Collaborators {
    fn default() -> Self {
        Self {
            python_exe: "python3".into(),
            timeout_seconds: 60,
            doctor_timeout_seconds: 30,
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamFailurePolicy {
    /// Fail the request; no decision is produced.
    Fail,
    /// Substitute worst-case evidence for the failed collaborator and decide anyway.
    WorstCase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub parallel_collaborators: bool,
    pub on_upstream_failure: UpstreamFailurePolicy,
}
impl Default for Pipeline {
    fn default() -> Self {
        Self {
            parallel_collaborators: true,
            on_upstream_failure: UpstreamFailurePolicy::Fail,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intake {
    pub allowed_extensions: Vec<String>,
}
impl Default for Intake {
    fn default() -> Self {
        Self {
            allowed_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_image_bytes: u64,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub keep_python_stderr: bool,
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_python_stderr: true,
            dump_effective_config: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub reject_url_inputs: bool,
    pub pin_scripts_dir: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
            pin_scripts_dir: true,
        }
    }
}
