use serde_json::Value;

use exam_core::model::{OPTION_COUNT, QuestionDraft};

use crate::error::ExtractionParseError;

/// Remove a surrounding markdown code fence (```` ```json ```` or ```` ``` ````).
#[must_use]
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.strip_prefix("json").unwrap_or(rest);
        text = text.strip_prefix("JSON").unwrap_or(text);
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Decode a model response into candidate questions.
///
/// Accepts, in order: a bare array, an object with a `questions` array, or
/// the first array-valued field of an object in document order. Items that do not look like a
/// question are dropped; options are padded or cut to four.
///
/// # Errors
///
/// Returns `ExtractionParseError::Json` for text that is not JSON and
/// `ExtractionParseError::NoQuestionArray` when no array can be found.
pub fn decode_candidates(raw: &str) -> Result<Vec<QuestionDraft>, ExtractionParseError> {
    let value: Value = serde_json::from_str(strip_fences(raw))?;
    let items = question_array(value).ok_or(ExtractionParseError::NoQuestionArray)?;

    let total = items.len();
    let candidates: Vec<QuestionDraft> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<QuestionDraft>(item).ok())
        .filter(|draft| !draft.question.trim().is_empty())
        .map(|mut draft| {
            draft.options.truncate(OPTION_COUNT);
            draft.pad_options();
            draft
        })
        .collect();

    if candidates.len() < total {
        tracing::debug!(
            dropped = total - candidates.len(),
            "ignored malformed question items"
        );
    }
    Ok(candidates)
}

fn question_array(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut fields) => {
            if let Some(Value::Array(items)) = fields.shift_remove("questions") {
                return Some(items);
            }
            fields.into_iter().find_map(|(_, field)| match field {
                Value::Array(items) => Some(items),
                _ => None,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"[{"theme":"Networks","question":"Which layer routes?","options":["Physical","Network","Transport","Session"],"answer":1}]"#;

    #[test]
    fn fenced_and_bare_responses_decode_identically() {
        let fenced = format!("```json\n{BODY}\n```");
        let bare = decode_candidates(BODY).unwrap();
        assert_eq!(decode_candidates(&fenced).unwrap(), bare);
        assert_eq!(decode_candidates(&format!("```\n{BODY}```")).unwrap(), bare);
        assert_eq!(bare[0].answer, 1);
    }

    #[test]
    fn questions_field_and_first_array_fallbacks() {
        let wrapped = format!(r#"{{"questions":{BODY}}}"#);
        assert_eq!(decode_candidates(&wrapped).unwrap().len(), 1);

        let other = format!(r#"{{"count":1,"items":{BODY}}}"#);
        assert_eq!(decode_candidates(&other).unwrap().len(), 1);
    }

    #[test]
    fn first_array_follows_document_order() {
        let raw = format!(r#"{{"results":{BODY},"notes":[]}}"#);
        let candidates = decode_candidates(&raw).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].question, "Which layer routes?");
    }

    #[test]
    fn objects_without_arrays_are_rejected() {
        assert!(matches!(
            decode_candidates(r#"{"message":"no questions here"}"#),
            Err(ExtractionParseError::NoQuestionArray)
        ));
        assert!(matches!(
            decode_candidates("Sorry, I cannot help with that."),
            Err(ExtractionParseError::Json(_))
        ));
    }

    #[test]
    fn malformed_items_are_dropped_and_options_normalized() {
        let raw = r#"[
            {"question":"Keep me","options":["a","b"],"answer":"B","imageDescription":"A tree"},
            {"theme":"x"},
            {"question":"Too many","options":["1","2","3","4","5"],"answer":0}
        ]"#;
        let candidates = decode_candidates(raw).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].options.len(), 4);
        assert_eq!(candidates[0].answer, 1);
        assert_eq!(candidates[0].image_description.as_deref(), Some("A tree"));
        assert_eq!(candidates[1].options, vec!["1", "2", "3", "4"]);
    }
}
