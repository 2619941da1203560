use crate::config::Config;
use anyhow::{Context, Result, bail};
use regex::Regex;
use std::path::Path;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

/// Approved institutions, loaded once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Roster {
    entries: Vec<Entry>,
    allow_partial_match: bool,
    separators: Regex,
}

#[derive(Debug, Clone)]
struct Entry {
    canonical: String,
    normalized: String,
}

impl Roster {
    pub fn load(cfg: &Config) -> Result<Self> {
        let mut names = cfg.roster.institutions.clone();
        if !cfg.roster.path.is_empty() {
            names.extend(read_roster_file(Path::new(&cfg.roster.path))?);
        }
        Self::from_names(names, cfg.roster.allow_partial_match)
    }

    pub fn from_names<I, S>(names: I, allow_partial_match: bool) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let separators = Regex::new(r"[^\p{L}\p{N}]+")?;
        let mut entries: Vec<Entry> = Vec::new();
        for name in names {
            let canonical: String = name.into();
            let normalized = normalize(&separators, &canonical);
            if normalized.is_empty() {
                continue;
            }
            if entries.iter().any(|e| e.normalized == normalized) {
                continue;
            }
            entries.push(Entry {
                canonical,
                normalized,
            });
        }
        if entries.is_empty() {
            bail!("approved institution roster is empty");
        }
        debug!("roster loaded: {} institutions", entries.len());
        Ok(Self {
            entries,
            allow_partial_match,
            separators,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.canonical.as_str())
    }

    /// Canonical roster name for an OCR-read institution, if approved.
    /// Blank or missing names never match.
    pub fn lookup(&self, candidate: Option<&str>) -> Option<&str> {
        let candidate = normalize(&self.separators, candidate?);
        if candidate.is_empty() {
            return None;
        }
        if let Some(e) = self.entries.iter().find(|e| e.normalized == candidate) {
            return Some(e.canonical.as_str());
        }
        if !self.allow_partial_match {
            return None;
        }
        // Word-aligned containment: "veltech engineering college chennai" holds
        // "veltech engineering college", but "tech" alone does not match it.
        let padded = format!(" {candidate} ");
        self.entries
            .iter()
            .find(|e| padded.contains(&format!(" {} ", e.normalized)))
            .map(|e| e.canonical.as_str())
    }

    pub fn is_approved(&self, candidate: Option<&str>) -> bool {
        self.lookup(candidate).is_some()
    }
}

fn normalize(separators: &Regex, s: &str) -> String {
    let folded = s.nfkc().collect::<String>().to_lowercase();
    separators.replace_all(&folded, " ").trim().to_string()
}

fn read_roster_file(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading roster: {}", path.display()))?;
    let names: Vec<String> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing roster JSON (array of names): {}", path.display()))?;
    Ok(names)
}
