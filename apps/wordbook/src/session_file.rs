//! Session persistence between CLI runs.

use std::{fs, io::ErrorKind, path::Path};

use anyhow::Context;
use client_core::Session;

pub fn load(path: &Path) -> anyhow::Result<Option<Session>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()))
        }
    };
    match serde_json::from_str(&raw) {
        Ok(session) => Ok(Some(session)),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "discarding unreadable session file"
            );
            Ok(None)
        }
    }
}

pub fn save(path: &Path, session: &Session) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create session directory '{}'", parent.display())
        })?;
    }
    let raw = serde_json::to_string_pretty(session)?;
    fs::write(path, raw).with_context(|| format!("failed to write '{}'", path.display()))?;
    tracing::debug!(path = %path.display(), "saved session");
    Ok(())
}

pub fn remove(path: &Path) -> anyhow::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove '{}'", path.display())),
    }
}
