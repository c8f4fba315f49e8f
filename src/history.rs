use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::{Result, TutorError};
use crate::symbols::Category;

/// One finished practice session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub date: DateTime<Utc>,
    pub user: String,
    pub category: Category,
    pub answered: u32,
    pub correct: u32,
}

/// Append-only CSV log of finished sessions
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new() -> Option<Self> {
        AppDirs::history_path().map(|path| Self { path })
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, record: &SessionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| TutorError::io(parent, e))?;
            }
        }

        // If the log doesn't exist yet we need to emit a header
        let needs_header = !self.path.exists();

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| TutorError::io(&self.path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer
            .flush()
            .map_err(|e| TutorError::io(&self.path, e))?;
        Ok(())
    }

    /// Every recorded session, oldest first; empty when there is no log yet
    pub fn read_all(&self) -> Result<Vec<SessionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<SessionRecord>, csv::Error>>()?;
        Ok(records)
    }

    /// Sessions played by one user, most recent first
    pub fn for_user(&self, user: &str) -> Result<Vec<SessionRecord>> {
        let mut records: Vec<SessionRecord> = self
            .read_all()?
            .into_iter()
            .filter(|r| r.user == user)
            .collect();
        records.reverse();
        Ok(records)
    }
}
