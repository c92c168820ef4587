//! Extraction prompt sent with every slide image.
//!
//! Kept in one place so the wording can change without touching the request
//! plumbing in [`crate::provider`], and so tests can inspect it directly.
//! Callers can override it via [`crate::config::OcrConfig::system_prompt`].

/// Default instruction for turning a slide image into Markdown.
pub const OCR_PROMPT: &str = r#"Extract all text from this slide image and convert it to clean Markdown.

Rules:
1. Preserve the hierarchy of the slide:
   - # for the slide title
   - ## for section headings
   - ### for sub-headings
2. Lists:
   - use "- " for bullet points
   - use "1. " for numbered lists
3. Keep the reading order: top to bottom, then left to right.
4. Transcribe any visible text inside charts, diagrams and tables.
5. Do NOT describe images, icons, colours or other visual elements.
6. Output ONLY the Markdown text, with no explanations and no code fences.

If the slide contains no text, return an empty string."#;
