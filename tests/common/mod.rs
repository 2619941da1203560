#![allow(dead_code)]

use idcard_check::{config::Config, roster::Roster};
use std::path::{Path, PathBuf};

/// Fresh per-test directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("idcard-check-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

/// Writes a small fake image; collaborators under test never decode it.
pub fn write_image(dir: &Path, rel: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent");
    }
    std::fs::write(&path, bytes).expect("write image");
    path
}

pub fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.roster.path.clear();
    cfg.roster.institutions = vec!["VelTech Engineering College".into(), "Anna University".into()];
    cfg
}

pub fn test_roster(cfg: &Config) -> Roster {
    Roster::load(cfg).expect("roster")
}
