use crate::{config::Config, util::hash_file};
use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// An admitted inbound image. Collaborators read the file at `path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInput {
    pub request_id: String,
    pub path: PathBuf,
    pub byte_len: u64,
    pub sha256: String,
}

pub fn admit(cfg: &Config, input: &Path, request_id: Option<&str>) -> Result<ImageInput> {
    let input_str = input.display().to_string();

    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are disabled: {input_str}"));
    }

    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    match input.extension().and_then(|s| s.to_str()) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            if !cfg
                .intake
                .allowed_extensions
                .iter()
                .any(|a| a.eq_ignore_ascii_case(&ext))
            {
                bail!("unsupported image type .{ext}: {}", input.display());
            }
        }
        None => bail!("input has no extension: {}", input.display()),
    }

    let byte_len = std::fs::metadata(input)
        .with_context(|| format!("stat input: {}", input.display()))?
        .len();
    if byte_len == 0 {
        bail!("input is empty: {}", input.display());
    }
    if byte_len > cfg.limits.max_image_bytes {
        bail!(
            "input exceeds max_image_bytes ({} > {}): {}",
            byte_len,
            cfg.limits.max_image_bytes,
            input.display()
        );
    }

    let sha256 =
        hash_file(input).with_context(|| format!("hashing input: {}", input.display()))?;

    let request_id = match request_id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        Some(_) => {
            warn!("blank request id; deriving one from the image digest");
            sha256[..16].to_string()
        }
        None => sha256[..16].to_string(),
    };

    Ok(ImageInput {
        request_id,
        path: input.to_path_buf(),
        byte_len,
        sha256,
    })
}

fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}
