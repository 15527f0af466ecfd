//! End-to-end run: windows, consolidation, materialization, repair, and
//! optional enrichment.

use anyhow::Result;
use log::info;
use serde::Serialize;

use crate::boundary::{BoundaryCorrector, RepairSummary};
use crate::config::SplitterConfig;
use crate::document::Document;
use crate::enrich::{EnrichedChunk, Enricher};
use crate::error::SplitError;
use crate::llm::LlmClient;
use crate::patterns::PatternConfig;
use crate::segment::{TextChunk, consolidate, materialize};
use crate::segmenter::Segmenter;
use crate::text::clean_input;

/// Book title used when neither the caller nor the analysis supplies one.
pub const UNTITLED: &str = "タイトル未設定";

/// Everything a split produces.
#[derive(Debug, Clone, Serialize)]
pub struct SplitOutcome {
    pub book_title: String,
    pub chunks: Vec<TextChunk>,
    pub repair: RepairSummary,
    pub windows_analyzed: usize,
    /// Content summary of each window that supplied one, in window order
    pub window_summaries: Vec<String>,
    pub used_fallback: bool,
}

pub struct Pipeline {
    llm: LlmClient,
    config: SplitterConfig,
    patterns: PatternConfig,
}

impl Pipeline {
    /// Validates the configuration and compiles its patterns up front.
    pub fn new(llm: LlmClient, config: SplitterConfig) -> crate::error::Result<Self> {
        config.validate()?;
        let patterns = config.pattern_config()?;
        Ok(Self {
            llm,
            config,
            patterns,
        })
    }

    /// Split `text` into repaired chunks. `book_title` wins over any title
    /// found by the analysis.
    pub async fn run(&self, text: &str, book_title: Option<&str>) -> Result<SplitOutcome> {
        let cleaned = clean_input(text);
        if cleaned.trim().is_empty() {
            return Err(SplitError::EmptyDocument.into());
        }
        let doc = Document::new(&cleaned);

        let analysis = Segmenter::new(&self.llm, &self.patterns, &self.config)
            .analyze(&doc)
            .await?;

        let consolidation = consolidate(&analysis.proposals, &doc, &self.config);
        let chunks = materialize(&doc, &consolidation.segments);
        info!("Materialized {} chunks", chunks.len());

        let corrector = BoundaryCorrector::new(&self.patterns, &self.config, Some(&self.llm));
        let corrected = corrector.correct(chunks).await;

        let book_title = book_title
            .map(str::to_string)
            .or(analysis.book_title)
            .unwrap_or_else(|| UNTITLED.to_string());

        Ok(SplitOutcome {
            book_title,
            chunks: corrected.chunks,
            repair: corrected.summary,
            windows_analyzed: analysis.windows_analyzed,
            window_summaries: analysis.summaries,
            used_fallback: consolidation.used_fallback,
        })
    }

    /// Add summaries and keywords to every chunk and give the book a
    /// better title when it only has a placeholder. Returns the title to
    /// use alongside the enriched chunks.
    pub async fn enrich(
        &self,
        book_title: &str,
        chunks: Vec<TextChunk>,
    ) -> (String, Vec<EnrichedChunk>) {
        let enricher = Enricher::new(&self.llm, self.config.enrich_concurrency);
        let enriched = enricher.enrich_chunks(chunks, book_title).await;
        let title = enricher
            .enhance_book_title(book_title, UNTITLED, &enriched)
            .await;
        (title, enriched)
    }
}
