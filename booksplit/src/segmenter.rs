//! Sequential window analysis: one collaborator call per window, each
//! prompt carrying the proposals found so far.

use anyhow::{Context, Result};
use llm_client::LlmRequest;
use log::info;

use crate::config::SplitterConfig;
use crate::document::Document;
use crate::extract::{ResponseExtractor, Strategy};
use crate::llm::LlmClient;
use crate::patterns::PatternConfig;
use crate::prompts::{WINDOW_SYSTEM_PROMPT, window_prompt};
use crate::segment::{SegmentProposal, windows};

/// Everything learned from the windows.
#[derive(Debug, Clone, Default)]
pub struct StructureAnalysis {
    /// Book title found in the first window
    pub book_title: Option<String>,
    pub proposals: Vec<SegmentProposal>,
    pub summaries: Vec<String>,
    pub windows_analyzed: usize,
    /// Windows whose reply yielded no proposals at all
    pub empty_windows: usize,
}

pub struct Segmenter<'a> {
    llm: &'a LlmClient,
    patterns: &'a PatternConfig,
    config: &'a SplitterConfig,
}

impl<'a> Segmenter<'a> {
    pub fn new(llm: &'a LlmClient, patterns: &'a PatternConfig, config: &'a SplitterConfig) -> Self {
        Self {
            llm,
            patterns,
            config,
        }
    }

    /// Analyze every window in order. A collaborator failure that survives
    /// the retry policy aborts the whole analysis.
    pub async fn analyze(&self, doc: &Document) -> Result<StructureAnalysis> {
        let size = self.config.window_size;
        let overlap = self.config.overlap;
        let total = windows(doc, self.patterns, size, overlap).count();
        let extractor = ResponseExtractor::new(self.patterns);
        let mut analysis = StructureAnalysis::default();

        info!(
            "Analyzing {} characters in {} windows",
            doc.len(),
            total
        );

        for window in windows(doc, self.patterns, size, overlap) {
            let text = window.text(doc);
            let recent: Vec<&SegmentProposal> = {
                let skip = analysis
                    .proposals
                    .len()
                    .saturating_sub(self.config.context_segments);
                analysis.proposals.iter().skip(skip).collect()
            };

            let request = LlmRequest::new(window_prompt(window.index, total, &recent, &text))
                .with_system(WINDOW_SYSTEM_PROMPT)
                .with_max_tokens(1500)
                .with_temperature(0.2);

            let reply = self.llm.complete(request).await.with_context(|| {
                format!(
                    "Failed to analyze window {}/{} (characters {}-{})",
                    window.index + 1,
                    total,
                    window.start,
                    window.end
                )
            })?;

            let result = extractor.extract(&reply, &window, &text);

            if window.index == 0 {
                analysis.book_title = result.book_title;
            }
            if result.strategy == Strategy::Empty {
                analysis.empty_windows += 1;
            }
            if !result.content_summary.is_empty() {
                analysis.summaries.push(result.content_summary);
            }
            analysis.proposals.extend(result.proposals);
            analysis.windows_analyzed += 1;
        }

        info!(
            "Collected {} proposals from {} windows ({} without usable reply)",
            analysis.proposals.len(),
            analysis.windows_analyzed,
            analysis.empty_windows
        );

        Ok(analysis)
    }
}
