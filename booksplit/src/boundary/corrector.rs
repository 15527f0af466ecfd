//! Priority-ordered boundary repairs and the final validation pass.

use log::{debug, info, warn};

use super::{BoundaryDetector, BoundaryIssue, BoundaryRewriter, IssueKind, RepairSummary, RewriteRequest};
use crate::config::SplitterConfig;
use crate::patterns::PatternConfig;
use crate::segment::TextChunk;
use crate::text::{char_len, head_chars, tail_chars};

/// Chunk sequence with stable indices. A merged-away chunk leaves an empty
/// slot, so indices recorded by the detector stay meaningful.
#[derive(Debug)]
struct ChunkArena {
    slots: Vec<Option<TextChunk>>,
}

impl ChunkArena {
    fn new(chunks: Vec<TextChunk>) -> Self {
        Self {
            slots: chunks.into_iter().map(Some).collect(),
        }
    }

    fn get(&self, index: usize) -> Option<&TextChunk> {
        self.slots.get(index)?.as_ref()
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut TextChunk> {
        self.slots.get_mut(index)?.as_mut()
    }

    fn prev_live(&self, index: usize) -> Option<usize> {
        (0..index.min(self.slots.len()))
            .rev()
            .find(|&i| self.slots[i].is_some())
    }

    fn next_live(&self, index: usize) -> Option<usize> {
        (index + 1..self.slots.len()).find(|&i| self.slots[i].is_some())
    }

    /// Append chunk `index` to the live chunk before it.
    fn merge_into_previous(&mut self, index: usize) -> bool {
        let Some(target) = self.prev_live(index) else {
            return false;
        };
        let Some(chunk) = self.slots[index].take() else {
            return false;
        };
        match self.slots[target].as_mut() {
            Some(previous) => {
                previous.absorb_next(chunk);
                true
            }
            None => {
                self.slots[index] = Some(chunk);
                false
            }
        }
    }

    /// Prepend chunk `index` to the live chunk after it.
    fn merge_into_next(&mut self, index: usize) -> bool {
        let Some(target) = self.next_live(index) else {
            return false;
        };
        let Some(chunk) = self.slots[index].take() else {
            return false;
        };
        match self.slots[target].as_mut() {
            Some(next) => {
                next.absorb_previous(chunk);
                true
            }
            None => {
                self.slots[index] = Some(chunk);
                false
            }
        }
    }

    fn into_chunks(self) -> Vec<TextChunk> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Result of boundary repair.
#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    pub chunks: Vec<TextChunk>,
    pub summary: RepairSummary,
}

pub struct BoundaryCorrector<'a> {
    detector: BoundaryDetector<'a>,
    rewriter: Option<&'a dyn BoundaryRewriter>,
    context_chars: usize,
    complete_min_chars: usize,
}

impl<'a> BoundaryCorrector<'a> {
    /// Without a rewriter, incomplete endings are left as they are.
    pub fn new(
        patterns: &'a PatternConfig,
        config: &SplitterConfig,
        rewriter: Option<&'a dyn BoundaryRewriter>,
    ) -> Self {
        Self {
            detector: BoundaryDetector::new(patterns, config.fragment_min_chars),
            rewriter,
            context_chars: config.rewrite_context_chars,
            complete_min_chars: config.complete_min_chars,
        }
    }

    pub fn detector(&self) -> &BoundaryDetector<'a> {
        &self.detector
    }

    /// Repair detected issues, most certain first, then run the final
    /// validation pass. Repairs only merge or rewrite; the chunk count never
    /// grows.
    pub async fn correct(&self, chunks: Vec<TextChunk>) -> CorrectionOutcome {
        let original_count = chunks.len();
        let mut issues = self.detector.detect(&chunks);
        // Stable: equal confidences keep detection order
        issues.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        info!(
            "Detected {} boundary issues in {} chunks",
            issues.len(),
            original_count
        );

        let mut arena = ChunkArena::new(chunks);
        let mut rewritten_count = 0;

        for issue in &issues {
            if !self.still_applies(&arena, issue) {
                continue;
            }

            let index = issue.chunk_index;
            match issue.kind {
                IssueKind::IncompleteStart => {
                    if arena.merge_into_previous(index) {
                        debug!("Merged chunk {index} into its predecessor ({})", issue.description);
                    } else {
                        debug!("Chunk {index} starts mid-sentence but has no predecessor; left as is");
                    }
                }
                IssueKind::Fragment => {
                    if arena.merge_into_previous(index) {
                        debug!("Merged fragment {index} into its predecessor");
                    } else if arena.merge_into_next(index) {
                        debug!("Merged fragment {index} into its successor");
                    } else {
                        debug!("Fragment {index} is the only chunk; left as is");
                    }
                }
                IssueKind::IncompleteEnd => {
                    if self.rewrite(&mut arena, index).await {
                        rewritten_count += 1;
                    }
                }
            }
        }

        let chunks = self.final_validation(arena.into_chunks());
        let summary = RepairSummary::new(original_count, &chunks, rewritten_count);
        info!(
            "Boundary repair: {} -> {} chunks ({} merged, {} rewritten)",
            summary.original_count, summary.final_count, summary.merged_count, summary.rewritten_count
        );

        CorrectionOutcome { chunks, summary }
    }

    /// An issue is skipped once its chunk is gone or an earlier repair has
    /// already fixed it.
    fn still_applies(&self, arena: &ChunkArena, issue: &BoundaryIssue) -> bool {
        let Some(chunk) = arena.get(issue.chunk_index) else {
            debug!("Chunk {} was merged away; skipping {}", issue.chunk_index, issue.kind);
            return false;
        };
        self.detector
            .inspect(issue.chunk_index, &chunk.content)
            .iter()
            .any(|current| current.kind == issue.kind && current.confidence == issue.confidence)
    }

    /// Ask the rewriter for a cleanly ending version of chunk `index`.
    /// Returns whether the rewrite was applied.
    async fn rewrite(&self, arena: &mut ChunkArena, index: usize) -> bool {
        let Some(rewriter) = self.rewriter else {
            return false;
        };
        let Some(chunk) = arena.get(index) else {
            return false;
        };

        let original = chunk.content.clone();
        let before = arena
            .prev_live(index)
            .and_then(|i| arena.get(i))
            .map(|c| tail_chars(&c.content, self.context_chars))
            .unwrap_or_default();
        let after = arena
            .next_live(index)
            .and_then(|i| arena.get(i))
            .map(|c| head_chars(&c.content, self.context_chars))
            .unwrap_or_default();

        let request = RewriteRequest {
            before: &before,
            chunk: &original,
            after: &after,
        };

        let rewritten = match rewriter.rewrite(request).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Rewrite of chunk {index} failed, keeping original: {e:#}");
                return false;
            }
        };

        let original_len = char_len(&original);
        if rewritten.is_empty() {
            warn!("Rewrite of chunk {index} was empty; keeping original");
            return false;
        }
        if char_len(&rewritten) > original_len * 2 {
            warn!(
                "Rewrite of chunk {index} grew from {} to {} characters; keeping original",
                original_len,
                char_len(&rewritten)
            );
            return false;
        }

        match arena.get_mut(index) {
            Some(chunk) => {
                chunk.set_content(rewritten);
                debug!("Rewrote ending of chunk {index}");
                true
            }
            None => false,
        }
    }

    /// Merge every chunk that cannot stand on its own into the previous
    /// validated chunk. The first non-empty chunk is always kept. Empty and
    /// whitespace-only chunks are dropped, including a leading one, whose
    /// range moves onto the next kept chunk. Running this on its own output
    /// changes nothing.
    pub fn final_validation(&self, chunks: Vec<TextChunk>) -> Vec<TextChunk> {
        let mut validated: Vec<TextChunk> = Vec::with_capacity(chunks.len());
        let mut orphan_start: Option<usize> = None;

        for mut chunk in chunks {
            if chunk.content.trim().is_empty() {
                match validated.last_mut() {
                    Some(last) => last.end = last.end.max(chunk.end),
                    None => orphan_start = Some(orphan_start.unwrap_or(chunk.start)),
                }
                continue;
            }

            if let Some(start) = orphan_start.take() {
                chunk.start = chunk.start.min(start);
            }

            if !self.detector.is_complete(&chunk.content, self.complete_min_chars) {
                if let Some(last) = validated.last_mut() {
                    debug!("Final validation merged '{}' into '{}'", chunk.title, last.title);
                    last.absorb_next(chunk);
                    continue;
                }
            }

            validated.push(chunk);
        }

        validated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::chunk;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::Mutex;

    const OPENING: &str = "本章は十分な長さを持つ完全な文章として書かれていて、単独で読んでも意味が通ります。";

    struct FnRewriter<F> {
        respond: F,
        requests: Mutex<Vec<(String, String, String)>>,
    }

    impl<F> FnRewriter<F>
    where
        F: Fn(&str) -> anyhow::Result<String> + Send + Sync,
    {
        fn new(respond: F) -> Self {
            Self {
                respond,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl<F> BoundaryRewriter for FnRewriter<F>
    where
        F: Fn(&str) -> anyhow::Result<String> + Send + Sync,
    {
        async fn rewrite(&self, request: RewriteRequest<'_>) -> anyhow::Result<String> {
            self.requests.lock().unwrap().push((
                request.before.to_string(),
                request.chunk.to_string(),
                request.after.to_string(),
            ));
            (self.respond)(request.chunk)
        }
    }

    fn corrector<'a>(
        patterns: &'a PatternConfig,
        rewriter: Option<&'a dyn BoundaryRewriter>,
    ) -> BoundaryCorrector<'a> {
        BoundaryCorrector::new(patterns, &SplitterConfig::default(), rewriter)
    }

    #[tokio::test]
    async fn test_incomplete_start_merges_into_previous() {
        let patterns = PatternConfig::default();
        let corrector = corrector(&patterns, None);
        let chunks = vec![
            chunk(1, OPENING, 0, 41),
            chunk(2, "ため、これは続きです。次の文。", 41, 56),
        ];

        let outcome = corrector.correct(chunks).await;

        assert_eq!(outcome.chunks.len(), 1);
        let merged = &outcome.chunks[0];
        assert_eq!(merged.content, format!("{OPENING}\n\nため、これは続きです。次の文。"));
        assert_eq!((merged.start, merged.end), (0, 56));
        assert!(corrector
            .detector()
            .inspect(0, &merged.content)
            .iter()
            .all(|issue| issue.confidence < 0.9));
        assert_eq!(outcome.summary.original_count, 2);
        assert_eq!(outcome.summary.final_count, 1);
        assert_eq!(outcome.summary.merged_count, 1);
    }

    #[tokio::test]
    async fn test_incomplete_start_in_first_chunk_is_left_alone() {
        let patterns = PatternConfig::default();
        let corrector = corrector(&patterns, None);
        let first = "そして物語は始まるのだが、ここから先はとても長い話になるので覚悟して読んでほしい。";
        let chunks = vec![chunk(1, first, 0, 40), chunk(2, OPENING, 40, 81)];

        let outcome = corrector.correct(chunks).await;
        assert_eq!(outcome.chunks.len(), 2);
        assert_eq!(outcome.chunks[0].content, first);
    }

    #[tokio::test]
    async fn test_leading_fragment_merges_into_successor() {
        let patterns = PatternConfig::default();
        let corrector = corrector(&patterns, None);
        let chunks = vec![chunk(1, "序。", 0, 2), chunk(2, OPENING, 2, 43)];

        let outcome = corrector.correct(chunks).await;
        assert_eq!(outcome.chunks.len(), 1);
        assert_eq!(outcome.chunks[0].content, format!("序。\n\n{OPENING}"));
        assert_eq!(outcome.chunks[0].start, 0);
        assert_eq!(outcome.chunks[0].title, "第2章");
    }

    #[tokio::test]
    async fn test_lone_fragment_untouched() {
        let patterns = PatternConfig::default();
        let corrector = corrector(&patterns, None);
        let outcome = corrector.correct(vec![chunk(1, "短い。", 0, 3)]).await;
        assert_eq!(outcome.chunks.len(), 1);
        assert_eq!(outcome.chunks[0].content, "短い。");
    }

    #[tokio::test]
    async fn test_incomplete_end_rewritten_with_context() {
        let patterns = PatternConfig::default();
        let rewriter = FnRewriter::new(|chunk: &str| Ok(format!("{chunk}。")));
        let corrector = corrector(&patterns, Some(&rewriter));
        let middle = "本文は途中で途切れてしまっているが十分な長さがある段落になっている";
        let chunks = vec![
            chunk(1, OPENING, 0, 41),
            chunk(2, middle, 41, 74),
            chunk(3, OPENING, 74, 115),
        ];

        let outcome = corrector.correct(chunks).await;
        assert_eq!(outcome.chunks.len(), 3);
        assert_eq!(outcome.chunks[1].content, format!("{middle}。"));
        assert_eq!(outcome.summary.rewritten_count, 1);

        let requests = rewriter.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, OPENING);
        assert_eq!(requests[0].1, middle);
        assert_eq!(requests[0].2, OPENING);
    }

    #[tokio::test]
    async fn test_oversized_rewrite_rejected() {
        let patterns = PatternConfig::default();
        let rewriter = FnRewriter::new(|chunk: &str| Ok(format!("{chunk}{chunk}{chunk}。")));
        let corrector = corrector(&patterns, Some(&rewriter));
        let ending = "最後の段落は句点がないまま終わってしまっているがそれなりの長さがある";
        let chunks = vec![chunk(1, OPENING, 0, 41), chunk(2, ending, 41, 75)];

        let outcome = corrector.correct(chunks).await;
        assert_eq!(outcome.summary.rewritten_count, 0);
        // Still incomplete, so the final pass folds it into the opening chunk
        assert_eq!(outcome.chunks.len(), 1);
        assert!(outcome.chunks[0].content.ends_with(ending));
    }

    #[tokio::test]
    async fn test_empty_or_failed_rewrite_keeps_original() {
        let patterns = PatternConfig::default();
        let ending = "最後の段落は句点がないまま終わってしまっているがそれなりの長さがある";

        let empty = FnRewriter::new(|_: &str| Ok("   ".to_string()));
        let outcome = corrector(&patterns, Some(&empty))
            .correct(vec![chunk(1, ending, 0, 34)])
            .await;
        assert_eq!(outcome.chunks[0].content, ending);

        let failing = FnRewriter::new(|_: &str| Err(anyhow::anyhow!("service unavailable")));
        let outcome = corrector(&patterns, Some(&failing))
            .correct(vec![chunk(1, ending, 0, 34)])
            .await;
        assert_eq!(outcome.chunks[0].content, ending);
        assert_eq!(outcome.summary.rewritten_count, 0);
    }

    #[test]
    fn test_final_validation_merges_into_previous_valid_chunk() {
        let patterns = PatternConfig::default();
        let corrector = corrector(&patterns, None);
        let chunks = vec![
            chunk(1, "短", 0, 1),
            chunk(2, OPENING, 1, 42),
            chunk(3, "句点なし", 42, 46),
            chunk(4, "   ", 46, 49),
            chunk(5, OPENING, 49, 90),
        ];

        let validated = corrector.final_validation(chunks);
        let contents: Vec<_> = validated.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["短".to_string(), format!("{OPENING}\n\n句点なし"), OPENING.to_string()]
        );
        assert_eq!(validated[1].end, 49);
    }

    #[test]
    fn test_final_validation_leading_empty_chunk() {
        let patterns = PatternConfig::default();
        let corrector = corrector(&patterns, None);
        let validated = corrector.final_validation(vec![chunk(1, "", 0, 5), chunk(2, OPENING, 5, 46)]);
        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0].start, 0);

        let validated =
            corrector.final_validation(vec![chunk(1, " \n　", 0, 3), chunk(2, OPENING, 3, 44)]);
        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0].start, 0);
        assert_eq!(validated[0].content, OPENING);
    }

    fn arbitrary_chunks() -> impl Strategy<Value = Vec<TextChunk>> {
        prop::collection::vec("[本文たそa。 ]{0,40}", 1..8).prop_map(|contents| {
            let mut offset = 0;
            contents
                .iter()
                .enumerate()
                .map(|(i, content)| {
                    let len = char_len(content);
                    let c = chunk(i + 1, content, offset, offset + len);
                    offset += len;
                    c
                })
                .collect()
        })
    }

    fn strip_whitespace(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    proptest! {
        #[test]
        fn prop_repair_conserves_content_and_shrinks(chunks in arbitrary_chunks()) {
            let patterns = PatternConfig::default();
            let corrector = corrector(&patterns, None);
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

            let before: String = chunks.iter().map(|c| c.content.as_str()).collect();
            let original_count = chunks.len();
            let outcome = runtime.block_on(corrector.correct(chunks));

            let after: String = outcome.chunks.iter().map(|c| c.content.as_str()).collect();
            prop_assert_eq!(strip_whitespace(&after), strip_whitespace(&before));
            prop_assert!(outcome.chunks.len() <= original_count);
            prop_assert_eq!(outcome.summary.final_count, outcome.chunks.len());
        }

        #[test]
        fn prop_final_validation_is_idempotent(chunks in arbitrary_chunks()) {
            let patterns = PatternConfig::default();
            let corrector = corrector(&patterns, None);
            let once = corrector.final_validation(chunks);
            let twice = corrector.final_validation(once.clone());
            prop_assert_eq!(once, twice);
        }
    }
}
