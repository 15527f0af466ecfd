//! JSON report of a split.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::boundary::RepairSummary;
use crate::enrich::EnrichedChunk;
use crate::pipeline::SplitOutcome;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    /// Input file the text was read from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub book_title: String,
    pub windows_analyzed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub window_summaries: Vec<String>,
    pub used_fallback: bool,
    pub repair: RepairSummary,
    pub chunks: Vec<EnrichedChunk>,
}

impl Report {
    pub fn new(source: Option<String>, outcome: SplitOutcome) -> Self {
        Self {
            generated_at: Utc::now(),
            source,
            book_title: outcome.book_title,
            windows_analyzed: outcome.windows_analyzed,
            window_summaries: outcome.window_summaries,
            used_fallback: outcome.used_fallback,
            repair: outcome.repair,
            chunks: outcome.chunks.into_iter().map(EnrichedChunk::plain).collect(),
        }
    }

    /// Replace the title and chunks with their enriched versions.
    pub fn with_enrichment(mut self, book_title: String, chunks: Vec<EnrichedChunk>) -> Self {
        self.book_title = book_title;
        self.chunks = chunks;
        self
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize report")
    }

    /// Write the report to `path`, or to stdout when no path is given.
    pub fn write(&self, path: Option<&Path>) -> Result<()> {
        match path {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, self)
                    .context("Failed to write report JSON")?;
                writer.write_all(b"\n")?;
                writer.flush()?;
            }
            None => println!("{}", self.to_json()?),
        }
        Ok(())
    }
}
