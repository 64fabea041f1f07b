// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use acadmin_app::{AuthSession, SessionStore};
use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::config::APP_NAME;

const SESSION_FILE_NAME: &str = "session.json";

/// Per-user data directory, created on first use.
pub fn data_dir() -> Result<PathBuf> {
    let root = dirs::data_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set [log].path and keep the session elsewhere")
    })?;
    let dir = root.join(APP_NAME);
    fs::create_dir_all(&dir).with_context(|| format!("create data directory {}", dir.display()))?;
    Ok(dir)
}

/// Keeps the signed-in session as JSON on disk.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(data_dir()?.join(SESSION_FILE_NAME))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<AuthSession>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("read session file {}", self.path.display()));
            }
        };
        let session = serde_json::from_str(&raw).with_context(|| {
            format!(
                "decode session file {} -- run `acadmin --logout` and sign in again",
                self.path.display()
            )
        })?;
        Ok(Some(session))
    }

    fn save(&self, session: &AuthSession) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create session directory {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(session).context("encode session")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("write session file {}", self.path.display()))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => {
                Err(error).with_context(|| format!("remove session file {}", self.path.display()))
            }
        }
    }
}
