//! `downloads.json`: the record of which lectures finished downloading.
//!
//! Not safe for concurrent writers; one batch owns a root folder at a time.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{AppError, Course, Lecture};

pub const LEDGER_FILE: &str = "downloads.json";

/// Fields this crate does not know about are kept in `extra` and written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub downloaded: bool,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LedgerEntry {
    fn update(&mut self, lecture: &Lecture) {
        self.title = lecture.title.clone();
        self.url = lecture.url.clone();
        self.downloaded = lecture.downloaded;
        self.download_url = lecture.download_url.clone();
        self.path = lecture
            .destination_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_default();
    }
}

/// subsection name → lecture url → entry, in the order they were first written
pub type SubsectionEntries = IndexMap<String, IndexMap<String, LedgerEntry>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerCourse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sections: IndexMap<String, SubsectionEntries>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// course key → course record
pub type LedgerDocument = IndexMap<String, LedgerCourse>;

#[derive(Debug, Clone)]
pub struct DownloadLedger {
    root: PathBuf,
    path: PathBuf,
}

impl DownloadLedger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let path = root.join(LEDGER_FILE);
        Self { root, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole document; a missing file is an empty ledger.
    pub async fn load(&self) -> Result<LedgerDocument, AppError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LedgerDocument::new()),
            Err(e) => return Err(AppError::Ledger(format!("{}: {}", self.path.display(), e))),
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Ledger(format!("{}: {}", self.path.display(), e)))
    }

    pub async fn is_downloaded(
        &self,
        course_key: &str,
        section: &str,
        subsection: &str,
        lecture_url: &str,
    ) -> Result<bool, AppError> {
        let document = self.load().await?;
        Ok(document
            .get(course_key)
            .and_then(|course| course.sections.get(section))
            .and_then(|subsections| subsections.get(subsection))
            .and_then(|lectures| lectures.get(lecture_url))
            .map(|entry| entry.downloaded)
            .unwrap_or(false))
    }

    /// Merge one lecture into the document and rewrite it, keeping every other
    /// entry, their order and any fields we do not model.
    pub async fn record(
        &self,
        course_key: &str,
        section: &str,
        subsection: &str,
        course: &Course,
        lecture: &Lecture,
    ) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Ledger(format!("{}: {}", self.root.display(), e)))?;

        let mut document = self.load().await?;
        let entry = document
            .entry(course_key.to_string())
            .or_insert_with(|| LedgerCourse {
                name: course.name.clone(),
                ..LedgerCourse::default()
            });
        if entry.name.is_empty() {
            entry.name = course.name.clone();
        }
        entry
            .sections
            .entry(section.to_string())
            .or_default()
            .entry(subsection.to_string())
            .or_default()
            .entry(lecture.url.clone())
            .or_default()
            .update(lecture);

        self.store(&document).await?;
        debug!(course = course_key, url = %lecture.url, "ledger updated");
        Ok(())
    }

    /// Write to a sibling temp file then rename over the ledger, 4-space indented.
    async fn store(&self, document: &LedgerDocument) -> Result<(), AppError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        document
            .serialize(&mut serializer)
            .map_err(|e| AppError::Ledger(e.to_string()))?;

        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, &buf)
            .await
            .map_err(|e| AppError::Ledger(format!("{}: {}", staging.display(), e)))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| AppError::Ledger(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }
}
