//! Instructions sent to the remote models.

use exam_core::model::{OPTION_COUNT, option_label};

/// System message shared by every extraction request.
pub const EXTRACTION_SYSTEM: &str =
    "You are an expert exam creator. You output only JSON, never markdown.";

const SCHEMA: &str = r#"[
  {
    "theme": "Subject",
    "question": "Question text",
    "options": ["A", "B", "C", "D"],
    "answer": 0
  }
]"#;

const PAGE_SCHEMA: &str = r#"[
  {
    "theme": "Subject",
    "question": "Question text",
    "options": ["A", "B", "C", "D"],
    "answer": 0,
    "imageDescription": "Description of the diagram the question refers to (optional)"
  }
]"#;

/// Prompt asking for every question contained in one text chunk.
#[must_use]
pub fn text_extraction(chunk: &str) -> String {
    format!(
        "Extract multiple-choice questions from the following text.\n\n\
         Rules:\n\
         - Extract ALL questions in this text section.\n\
         - Every question has exactly four options; `answer` is the index (0-3) of the correct one.\n\
         - Return the result strictly as a raw JSON array (or an object with a `questions` array). No markdown.\n\n\
         Format:\n{SCHEMA}\n\nText:\n{chunk}"
    )
}

/// Prompt accompanying a single page image.
#[must_use]
pub fn page_extraction() -> String {
    format!(
        "Extract multiple-choice questions from this exam page image.\n\n\
         Rules:\n\
         - Extract ALL questions visible on this page.\n\
         - If a question refers to a diagram or image, describe it in the `imageDescription` field.\n\
         - Every question has exactly four options; `answer` is the index (0-3) of the correct one.\n\
         - Return the result strictly as a raw JSON array. No markdown.\n\n\
         Format:\n{PAGE_SCHEMA}"
    )
}

/// System message for explanations.
pub const EXPLANATION_SYSTEM: &str = "You are an expert Computer Science professor and tutor.";

/// Prompt asking the model to verify and explain the stored answer.
#[must_use]
pub fn explanation(question: &str, options: &[String; OPTION_COUNT], correct: usize) -> String {
    let listed = options
        .iter()
        .enumerate()
        .map(|(index, option)| format!("{}. {option}", option_label(index)))
        .collect::<Vec<_>>()
        .join("\n");
    let claimed = options.get(correct).map_or("", String::as_str);

    format!(
        "Question: {question}\n\
         Options:\n{listed}\n\n\
         Stored correct answer: {label} ({claimed})\n\n\
         Task:\n\
         1. Work out the correct answer yourself before looking at the stored one.\n\
         2. Compare your result with the stored answer.\n\
         3. If the stored answer is wrong, start your reply with \"Correction Needed\" and name the right option.\n\
         4. Otherwise start with \"**Correct via System**\".\n\
         Then explain briefly why the right option is correct and why the others are not.",
        label = option_label(correct),
    )
}
