//! Server binary resolution.
//!
//! Mirrors the lookup order users expect from the harness: an explicit
//! path always wins, then `$HOME/bin/<base>`, then the first hit on
//! `$PATH`. Executability is not checked here; a bad binary surfaces as
//! a fatal spawn error from the supervisor instead.

use crate::error::{McTestError, Result};
use camino::{Utf8Path, Utf8PathBuf};

pub fn resolve_program(explicit: Option<&Utf8Path>, base: &str) -> Result<Utf8PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_owned());
    }

    if let Some(home) = dirs::home_dir() {
        let candidate = home.join("bin").join(base);
        if candidate.exists() {
            return utf8_path(candidate);
        }
    }

    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(base);
            if candidate.exists() {
                return utf8_path(candidate);
            }
        }
    }

    Err(McTestError::LaunchFatal(format!(
        "Can't find {} in $HOME/bin or $PATH",
        base
    )))
}

fn utf8_path(path: std::path::PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|p| McTestError::Config(format!("Non-UTF-8 program path: {}", p.display())))
}
