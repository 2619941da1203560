use crate::{
    batch,
    config::Config,
    engine::python::PythonEngine,
    intake,
    pipeline::Pipeline,
    policy,
    roster::Roster,
    signals::Evidence,
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "idcard-check")]
#[command(about = "Identity-card authenticity checker (visual score + OCR fields + template match)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./idcard-check.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error). Takes precedence over RUST_LOG.
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the collaborator scripts and their runtimes.
    Doctor {},
    /// Score one image and print the decision report.
    Validate {
        #[arg(long)]
        input: PathBuf,
        /// Opaque caller id echoed in the report.
        #[arg(long)]
        request_id: Option<String>,
    },
    /// Replay recorded evidence (JSON with visual, fields, template) through the engine.
    Decide {
        #[arg(long)]
        evidence: PathBuf,
    },
    /// Evaluate every image under a folder of genuine/suspicious/fake/non_id subfolders.
    Batch {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    let cfg = Config::load(&cfg_path)?;
    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Validate { input, request_id } => validate(&cfg, input, request_id.as_deref()),
        Command::Decide { evidence } => decide(&cfg, evidence),
        Command::Batch { dir, out_dir } => run_batch(&cfg, dir, out_dir.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> PathBuf {
    if let Some(p) = user {
        return p.to_path_buf();
    }
    let default = PathBuf::from("idcard-check.toml");
    if default.exists() {
        default
    } else {
        PathBuf::from("idcard-check.example.toml")
    }
}

/// Filter directives by precedence: `--log-level`, then `RUST_LOG`, then `logging.level`.
/// Blank values fall through to the next source.
pub fn log_directives<'a>(cli: Option<&'a str>, env: Option<&'a str>, configured: &'a str) -> &'a str {
    [cli, env]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(configured)
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = log_directives(args.log_level.as_deref(), env.as_deref(), &cfg.logging.level);
    let filter = EnvFilter::try_new(directives)
        .with_context(|| format!("invalid log filter: {directives}"))?;

    // stdout carries the JSON reports, so logs go to stderr.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join("idcard-check.log"))
}

fn doctor(cfg: &Config) -> Result<()> {
    let engine = PythonEngine::new(cfg)?;
    let diag = engine.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

fn validate(cfg: &Config, input: &Path, request_id: Option<&str>) -> Result<()> {
    let roster = Roster::load(cfg)?;
    let engine = PythonEngine::new(cfg)?;
    let pipeline = Pipeline::new(cfg, roster, &engine);

    let image = intake::admit(cfg, input, request_id)?;
    let report = pipeline.validate(&image)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn decide(cfg: &Config, evidence_path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(evidence_path)
        .with_context(|| format!("reading evidence: {}", evidence_path.display()))?;
    let evidence = Evidence::from_json(&raw)
        .with_context(|| format!("parsing evidence JSON: {}", evidence_path.display()))?;

    let decision = policy::decide_evidence(&evidence, cfg.threshold());
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "evidence": evidence,
            "decision": decision,
            "validation_score": evidence.visual.confidence,
            "threshold": cfg.threshold(),
        }))?
    );
    Ok(())
}

fn run_batch(cfg: &Config, dir: &Path, out_override: Option<&Path>) -> Result<()> {
    let roster = Roster::load(cfg)?;
    let engine = PythonEngine::new(cfg)?;
    let pipeline = Pipeline::new(cfg, roster, &engine);

    let out_dir = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    ensure_dir(&out_dir)?;

    if cfg.debug.dump_effective_config {
        std::fs::write(out_dir.join("effective-config.toml"), cfg.normalized_for_dump())?;
    }

    let report = batch::run(&pipeline, dir)?;
    let report_path = out_dir.join("batch-report.json");
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("writing {}", report_path.display()))?;
    info!("batch report written to {}", report_path.display());

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "report": report_path,
            "total": report.total,
            "passed": report.passed,
            "failed": report.failed,
            "errored": report.errored,
        }))?
    );
    Ok(())
}
