//! Prompt text for every collaborator call.

use crate::boundary::RewriteRequest;
use crate::segment::{SegmentProposal, TextChunk};
use crate::text::head_chars;

pub const WINDOW_SYSTEM_PROMPT: &str = r#"You are an expert in analyzing the structure of books.
Read the text window you are given the way a human editor would, and find where new chapters or sections begin.

Guidelines:
- Focus on changes in meaning and topic, not only on headings
- Estimate a title for every chapter or section you find
- Place every boundary at the end of a complete sentence
- Never place a boundary so that the next segment starts with a conjunction or particle (for example ために、 そして、 また、)

Reply in exactly this format and nothing else:

BOOK_TITLE: <title of the book, first window only; omit otherwise>
SEGMENTS:
[SEGMENT_START]
TYPE: chapter or section
TITLE: <estimated title>
POSITION: <character offset within this window where the segment starts>
CONFIDENCE: <0.0-1.0>
REASON: <why this is a boundary>
QUALITY: <good, medium or poor>
[SEGMENT_END]
(repeat the block for every segment; no blocks if none start in this window)
SUMMARY: <one or two sentence summary of the window>"#;

pub const REWRITE_SYSTEM_PROMPT: &str = r#"You are an expert text editor.
Adjust the given text chunk so that it reads as complete, self-contained prose.

Rules:
- The text must be complete in meaning
- It must not start with a conjunction or particle
- Every sentence must end with proper punctuation
- Keep the logical flow with the surrounding context
- Keep the original wording and writing style wherever possible

Return ONLY the adjusted text. No explanation."#;

pub const TITLE_SYSTEM_PROMPT: &str = r#"You are an expert book editor.
Write a fitting, engaging title for the given section based on its content.

Requirements:
- At most 50 characters
- Accurately reflects the content
- Natural wording in the language of the text
- Prefer a noun phrase (for example 〜の考察, 〜への道)

Return ONLY the title. No quotes, no explanation."#;

pub const SUMMARY_SYSTEM_PROMPT: &str = r#"You are an expert at summarizing books.
Summarize the given section.

Requirements:
- At most 100 characters
- Capture the main points
- Use the same writing style as the original (keep である調 or ですます調 as the text does)

Return ONLY the summary. No explanation."#;

pub const KEYWORDS_SYSTEM_PROMPT: &str = r#"You are an expert in text analysis.
Extract the important keywords from the given text.

Requirements:
- 3 to 5 keywords
- Prefer proper nouns and technical terms
- Output them separated by commas

Return ONLY the keywords. No explanation."#;

pub const BOOK_TITLE_SYSTEM_PROMPT: &str = r#"You are an expert at creating book titles.
Create an appealing, fitting title for the book described.

Requirements:
- At most 20 characters
- Accurately reflects the content
- Memorable

Return ONLY the title. No quotes, no explanation."#;

/// Prompt for one analysis window, with the most recent proposals as
/// context so boundaries stay consistent across windows.
pub fn window_prompt(
    index: usize,
    total: usize,
    recent: &[&SegmentProposal],
    window_text: &str,
) -> String {
    let mut prompt = format!("Analyze this text window ({}/{}).\n\n", index + 1, total);

    if !recent.is_empty() {
        prompt.push_str("Most recent segments found so far:\n");
        for proposal in recent {
            prompt.push_str(&format!("- {}: {}\n", proposal.kind, proposal.title));
        }
        prompt.push('\n');
    }

    if index == 0 {
        prompt.push_str("This is the first window; include BOOK_TITLE if the title is apparent.\n\n");
    }

    prompt.push_str("Window text:\n");
    prompt.push_str(window_text);
    prompt.push_str(
        "\n\nIdentify where new chapters or sections start in this window and estimate their titles. \
         Boundaries must fall at the end of a complete sentence.",
    );
    prompt
}

pub fn rewrite_prompt(request: &RewriteRequest<'_>) -> String {
    format!(
        "Adjust this text chunk so that its sentences are complete.\n\n\
         Preceding context:\n{}\n\n\
         Chunk to adjust:\n{}\n\n\
         Following context:\n{}\n\n\
         Make the chunk read as complete, self-contained prose.",
        request.before, request.chunk, request.after
    )
}

pub fn title_prompt(chunk: &TextChunk) -> String {
    format!(
        "Give this section a fitting title.\n\n\
         Current title: {}\nNumber: {}\nType: {}\n\nContent:\n{}",
        chunk.title,
        chunk.ordinal,
        chunk.kind,
        head_chars(&chunk.content, 500)
    )
}

pub fn summary_prompt(chunk: &TextChunk, book_title: &str) -> String {
    format!(
        "Summarize this section.\n\nBook: {}\nSection: {} ({})\n\nContent:\n{}",
        book_title,
        chunk.title,
        chunk.ordinal,
        head_chars(&chunk.content, 1000)
    )
}

pub fn keywords_prompt(chunk: &TextChunk) -> String {
    format!(
        "Extract keywords from this text.\n\nTitle: {}\nContent:\n{}",
        chunk.title,
        head_chars(&chunk.content, 800)
    )
}

pub fn book_title_prompt(
    current_title: &str,
    chapter_count: usize,
    keywords: &[String],
    summaries: &str,
) -> String {
    format!(
        "Create a title for this book.\n\n\
         Current title: {}\nChapters: {}\nMain keywords: {}\n\nContent summary:\n{}",
        current_title,
        chapter_count,
        keywords.join(", "),
        head_chars(summaries, 500)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{SegmentKind, chunk};

    #[test]
    fn test_window_prompt_includes_context() {
        let recent = SegmentProposal {
            kind: SegmentKind::Section,
            title: "旅立ち".to_string(),
            position_in_window: 0,
            start: 0,
            confidence: 0.9,
            quality: "good".to_string(),
            reason: None,
            window_index: 0,
        };
        let prompt = window_prompt(1, 4, &[&recent], "本文。");
        assert!(prompt.contains("(2/4)"));
        assert!(prompt.contains("- section: 旅立ち"));
        assert!(prompt.contains("本文。"));
        assert!(!prompt.contains("first window"));
    }

    #[test]
    fn test_first_window_asks_for_title() {
        let prompt = window_prompt(0, 1, &[], "本文。");
        assert!(prompt.contains("BOOK_TITLE"));
        assert!(!prompt.contains("Most recent"));
    }

    #[test]
    fn test_rewrite_prompt_layout() {
        let request = RewriteRequest {
            before: "前。",
            chunk: "途中",
            after: "後。",
        };
        let prompt = rewrite_prompt(&request);
        let before = prompt.find("前。").unwrap();
        let chunk_at = prompt.find("途中").unwrap();
        let after = prompt.find("後。").unwrap();
        assert!(before < chunk_at && chunk_at < after);
    }

    #[test]
    fn test_title_prompt_truncates_content() {
        let long = "あ".repeat(900);
        let prompt = title_prompt(&chunk(3, &long, 0, 900));
        assert!(prompt.contains("Number: 3"));
        assert_eq!(prompt.matches('あ').count(), 500);
    }
}
