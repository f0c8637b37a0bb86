//! Turning exam documents into candidate questions.
//!
//! Two strategies produce the same output, a list of [`QuestionDraft`]s that
//! still need human review before they are committed:
//! a deterministic [`PatternParser`] and the remote [`ExtractionPipeline`].
//!
//! [`QuestionDraft`]: exam_core::model::QuestionDraft

mod chunk;
mod decode;
mod pattern;
mod pipeline;
pub mod prompts;

pub use chunk::{GEMINI_CHUNK_CHARS, GROQ_CHUNK_CHARS, chunk_text, split_pages};
pub use decode::{decode_candidates, strip_fences};
pub use pattern::PatternParser;
pub use pipeline::{ExtractionPipeline, ExtractionReport};
