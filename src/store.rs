//! Persisted per-page outcomes under `results/`.
//!
//! A page whose result file exists and parses is considered done; rerunning
//! the same URL list only renders the pages that are missing.

use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Result, VrcError};
use crate::naming::ArtifactLayout;
use crate::types::PageOutcome;

pub(crate) fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            VrcError::Config(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    layout: ArtifactLayout,
}

impl ResultStore {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    pub fn save(&self, file: &str, outcome: &PageOutcome) -> Result<()> {
        let path = self.layout.result(file);
        write_json_pretty(&path, outcome)?;
        debug!(path = %path.display(), "persisted page outcome");
        Ok(())
    }

    /// Loads a previous outcome; unreadable files are treated as absent.
    pub fn load(&self, file: &str) -> Option<PageOutcome> {
        let path = self.layout.result(file);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable result file");
                None
            }
        }
    }

    /// Every parseable outcome under `results/`, sorted by URL.
    pub fn load_all(&self) -> Result<Vec<PageOutcome>> {
        let dir = self.layout.results_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut outcomes = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<PageOutcome>(&content) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable result file")
                }
            }
        }
        outcomes.sort_by(|a, b| a.url().cmp(b.url()));
        Ok(outcomes)
    }
}
