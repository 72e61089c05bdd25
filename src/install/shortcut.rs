//! Operator shortcut command
//!
//! A tiny bash stub in /usr/local/bin that re-fetches and runs the installer
//! bootstrap, so the menu is one short command away.

use std::fs;
use std::path::PathBuf;

use log::info;

use super::file_ops::write_file_atomic;
use crate::config::HostLayout;
use crate::error::Result;

const SHORTCUT_MODE: u32 = 0o755;

pub fn render_stub(source_url: &str) -> String {
    format!("#!/bin/bash\nexec bash <(curl -fsSL {source_url}) \"$@\"\n")
}

/// (Re)write the shortcut stub under `name`.
pub fn write_shortcut(layout: &HostLayout, name: &str, source_url: &str) -> Result<PathBuf> {
    let path = layout.shortcut_path(name);
    write_file_atomic(&path, render_stub(source_url).as_bytes(), SHORTCUT_MODE)?;
    info!("Shortcut installed at {}", path.display());
    Ok(path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed { from: PathBuf, to: PathBuf },
    /// No shortcut existed under the old name
    Created(PathBuf),
    Unchanged(PathBuf),
}

/// Move the shortcut from `old` to `new`, creating it when it does not exist.
pub fn rename_shortcut(
    layout: &HostLayout,
    old: &str,
    new: &str,
    source_url: &str,
) -> Result<RenameOutcome> {
    let from = layout.shortcut_path(old);
    let to = layout.shortcut_path(new);

    if old == new && to.is_file() {
        return Ok(RenameOutcome::Unchanged(to));
    }

    if from.is_file() {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&from, &to)?;
        info!("Renamed {} to {}", from.display(), to.display());
        Ok(RenameOutcome::Renamed { from, to })
    } else {
        let to = write_shortcut(layout, new, source_url)?;
        Ok(RenameOutcome::Created(to))
    }
}
