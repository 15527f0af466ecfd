//! Optional metadata pass: better titles, short summaries and keywords per
//! chunk, plus a final look at the book title.

use futures_util::stream::{self, StreamExt};
use llm_client::LlmRequest;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;

use crate::llm::LlmClient;
use crate::prompts::{
    BOOK_TITLE_SYSTEM_PROMPT, KEYWORDS_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT, TITLE_SYSTEM_PROMPT,
    book_title_prompt, keywords_prompt, summary_prompt, title_prompt,
};
use crate::segment::{SegmentKind, TextChunk};
use crate::text::{char_len, local_summary};

const GENERIC_TITLE_MAX_CHARS: usize = 5;
const TITLE_MAX_CHARS: usize = 50;
const BOOK_TITLE_MAX_CHARS: usize = 30;
const SUMMARY_MAX_CHARS: usize = 200;
const LOCAL_SUMMARY_CHARS: usize = 100;
const MIN_CONTENT_FOR_LLM: usize = 100;
const MIN_CONTENT_FOR_SUMMARY: usize = 200;
const MAX_KEYWORDS: usize = 5;

/// A chunk with optional enrichment metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedChunk {
    #[serde(flatten)]
    pub chunk: TextChunk,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl EnrichedChunk {
    /// A chunk without metadata, for runs that skip enrichment.
    pub fn plain(chunk: TextChunk) -> Self {
        Self {
            chunk,
            summary: None,
            keywords: Vec::new(),
        }
    }
}

pub struct Enricher<'a> {
    llm: &'a LlmClient,
    concurrency: usize,
}

impl<'a> Enricher<'a> {
    pub fn new(llm: &'a LlmClient, concurrency: usize) -> Self {
        Self {
            llm,
            concurrency: concurrency.max(1),
        }
    }

    /// Enrich every chunk, at most `concurrency` at a time. Output order
    /// matches input order.
    pub async fn enrich_chunks(&self, chunks: Vec<TextChunk>, book_title: &str) -> Vec<EnrichedChunk> {
        info!(
            "Enriching {} chunks ({} at a time)",
            chunks.len(),
            self.concurrency
        );
        stream::iter(chunks)
            .map(|chunk| self.enrich_one(chunk, book_title))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
    }

    async fn enrich_one(&self, mut chunk: TextChunk, book_title: &str) -> EnrichedChunk {
        if let Some(title) = self.improve_title(&chunk).await {
            debug!("Chunk {}: title {:?} -> {:?}", chunk.ordinal, chunk.title, title);
            chunk.title = title;
        }
        let summary = self.summarize(&chunk, book_title).await;
        let keywords = self.keywords(&chunk).await;

        EnrichedChunk {
            chunk,
            summary: Some(summary),
            keywords,
        }
    }

    async fn improve_title(&self, chunk: &TextChunk) -> Option<String> {
        let generic = char_len(&chunk.title) <= GENERIC_TITLE_MAX_CHARS
            || chunk.title.starts_with('章')
            || chunk.title.starts_with('節');
        if !generic || chunk.char_count < MIN_CONTENT_FOR_LLM {
            return None;
        }

        let request = LlmRequest::new(title_prompt(chunk))
            .with_system(TITLE_SYSTEM_PROMPT)
            .with_max_tokens(100)
            .with_temperature(0.3);
        match self.llm.complete(request).await {
            Ok(reply) => {
                let title = strip_quotes(&reply);
                (!title.is_empty() && char_len(&title) <= TITLE_MAX_CHARS).then_some(title)
            }
            Err(e) => {
                warn!("Title generation failed for chunk {}: {:#}", chunk.ordinal, e);
                None
            }
        }
    }

    async fn summarize(&self, chunk: &TextChunk, book_title: &str) -> String {
        let fallback = || local_summary(&chunk.content, LOCAL_SUMMARY_CHARS);
        if chunk.char_count < MIN_CONTENT_FOR_SUMMARY {
            return fallback();
        }

        let request = LlmRequest::new(summary_prompt(chunk, book_title))
            .with_system(SUMMARY_SYSTEM_PROMPT)
            .with_max_tokens(200)
            .with_temperature(0.2);
        match self.llm.complete(request).await {
            Ok(reply) => {
                let summary = reply.trim();
                if summary.is_empty() || char_len(summary) > SUMMARY_MAX_CHARS {
                    fallback()
                } else {
                    summary.to_string()
                }
            }
            Err(e) => {
                warn!("Summary generation failed for chunk {}: {:#}", chunk.ordinal, e);
                fallback()
            }
        }
    }

    async fn keywords(&self, chunk: &TextChunk) -> Vec<String> {
        if chunk.char_count < MIN_CONTENT_FOR_LLM {
            return Vec::new();
        }

        let request = LlmRequest::new(keywords_prompt(chunk))
            .with_system(KEYWORDS_SYSTEM_PROMPT)
            .with_max_tokens(100)
            .with_temperature(0.1);
        match self.llm.complete(request).await {
            Ok(reply) => split_keywords(&reply),
            Err(e) => {
                warn!("Keyword extraction failed for chunk {}: {:#}", chunk.ordinal, e);
                Vec::new()
            }
        }
    }

    /// Ask for a better book title when the current one is the placeholder
    /// or too short to mean much. Returns the title to use.
    pub async fn enhance_book_title(
        &self,
        current: &str,
        placeholder: &str,
        chunks: &[EnrichedChunk],
    ) -> String {
        if current != placeholder && char_len(current) > GENERIC_TITLE_MAX_CHARS {
            return current.to_string();
        }

        let keywords = top_keywords(chunks, 10);
        let summaries = chunks
            .iter()
            .filter_map(|c| c.summary.as_deref())
            .take(5)
            .collect::<Vec<_>>()
            .join("\n");
        let chapter_count = chunks
            .iter()
            .filter(|c| c.chunk.kind == SegmentKind::Chapter)
            .count();

        let request = LlmRequest::new(book_title_prompt(current, chapter_count, &keywords, &summaries))
            .with_system(BOOK_TITLE_SYSTEM_PROMPT)
            .with_max_tokens(100)
            .with_temperature(0.3);
        match self.llm.complete(request).await {
            Ok(reply) => {
                let title = strip_quotes(&reply);
                if !title.is_empty() && char_len(&title) <= BOOK_TITLE_MAX_CHARS {
                    info!("Book title: {:?} -> {:?}", current, title);
                    title
                } else {
                    current.to_string()
                }
            }
            Err(e) => {
                warn!("Book title generation failed: {:#}", e);
                current.to_string()
            }
        }
    }
}

fn strip_quotes(reply: &str) -> String {
    reply
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '「' | '」' | '『' | '』'))
        .trim()
        .to_string()
}

fn split_keywords(reply: &str) -> Vec<String> {
    reply
        .split([',', '、', '，', '\n'])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Most frequent keywords across chunks, ties in first-seen order.
fn top_keywords(chunks: &[EnrichedChunk], n: usize) -> Vec<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (seen, keyword) in chunks.iter().flat_map(|c| &c.keywords).enumerate() {
        counts.entry(keyword.as_str()).or_insert((0, seen)).0 += 1;
    }
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
    ranked.into_iter().take(n).map(|(k, _)| k.to_string()).collect()
}
