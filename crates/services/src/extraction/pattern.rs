use regex::Regex;

use exam_core::model::{DEFAULT_THEME, OPTION_COUNT, QuestionDraft};

/// Line-oriented parser for exam papers laid out as
/// `Part I: Theme` / `1. Question` / `A. Option`.
///
/// The parser cannot tell which option is correct, so every candidate comes
/// out with `answer = 0` and must be reviewed before it is saved.
#[derive(Clone, Debug)]
pub struct PatternParser {
    theme: Regex,
    question: Regex,
    option: Regex,
    page_marker: Regex,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Question,
    Option,
}

impl PatternParser {
    /// # Errors
    ///
    /// Returns `regex::Error` if a line pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            theme: Regex::new(r"(?i)^Part\s+[IVX]+[:.]?\s*(.+)")?,
            question: Regex::new(r"^\d+[:.)]\s*(.+)")?,
            option: Regex::new(r"(?i)^([A-D])[:.)]\s*(.+)")?,
            page_marker: Regex::new(r"^---\s*Page\s+\d+\s*---$")?,
        })
    }

    /// Parse `text` into candidate questions, in document order.
    ///
    /// An empty result means nothing recognisable was found.
    #[must_use]
    pub fn parse(&self, text: &str) -> Vec<QuestionDraft> {
        let mut candidates = Vec::new();
        let mut theme = DEFAULT_THEME.to_string();
        let mut current: Option<QuestionDraft> = None;
        let mut last_field = Field::Question;

        let lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !self.page_marker.is_match(line));

        for line in lines {
            if let Some(caps) = self.theme.captures(line) {
                theme = caps[1].trim().to_string();
                continue;
            }

            if let Some(caps) = self.question.captures(line) {
                if let Some(done) = current.take() {
                    candidates.push(finish(done));
                }
                current = Some(QuestionDraft::new(theme.clone(), caps[1].trim()));
                last_field = Field::Question;
                continue;
            }

            let Some(draft) = current.as_mut() else {
                continue;
            };

            if let Some(caps) = self.option.captures(line) {
                draft.options.push(caps[2].trim().to_string());
                last_field = Field::Option;
                continue;
            }

            match last_field {
                Field::Question => {
                    draft.question.push(' ');
                    draft.question.push_str(line);
                }
                Field::Option => {
                    if let Some(option) = draft.options.last_mut() {
                        option.push(' ');
                        option.push_str(line);
                    }
                }
            }
        }

        if let Some(done) = current {
            candidates.push(finish(done));
        }
        tracing::debug!(candidates = candidates.len(), "pattern parse finished");
        candidates
    }
}

fn finish(mut draft: QuestionDraft) -> QuestionDraft {
    draft.options.truncate(OPTION_COUNT);
    draft.pad_options();
    draft.answer = 0;
    draft
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::MISSING_OPTION;

    fn parser() -> PatternParser {
        PatternParser::new().unwrap()
    }

    #[test]
    fn parses_numbered_questions_with_lettered_options() {
        let text = "\
Part I: Computer Networks
1. Which layer routes packets?
A. Physical
B. Network
C) Transport
D: Session
2) Which protocol resolves names?
a. ARP
b. DNS
c. DHCP
d. ICMP
";
        let candidates = parser().parse(text);
        assert_eq!(candidates.len(), 2);

        assert_eq!(candidates[0].theme, "Computer Networks");
        assert_eq!(candidates[0].question, "Which layer routes packets?");
        assert_eq!(
            candidates[0].options,
            vec!["Physical", "Network", "Transport", "Session"]
        );
        assert_eq!(candidates[1].options[1], "DNS");
        assert!(candidates.iter().all(|c| c.answer == 0));
        assert!(candidates.iter().all(|c| c.clone().validate().is_ok()));
    }

    #[test]
    fn short_option_lists_are_padded() {
        let candidates = parser().parse("1. Pick one\nA. x\nB. y\nC. z\n");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].options.len(), 4);
        assert_eq!(candidates[0].options[3], MISSING_OPTION);
        assert_eq!(candidates[0].theme, DEFAULT_THEME);
    }

    #[test]
    fn continuation_lines_extend_the_active_field() {
        let text = "1. What does\nthis span?\nA. first\npart two\nB. b\nC. c\nD. d\n";
        let candidates = parser().parse(text);
        assert_eq!(candidates[0].question, "What does this span?");
        assert_eq!(candidates[0].options[0], "first part two");
    }

    #[test]
    fn text_before_the_first_question_is_ignored() {
        let text = "Exit exam 2024\nA. not an option\n--- Page 1 ---\nPart II. Databases\n1. Q?\nA. a\n";
        let candidates = parser().parse(text);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].theme, "Databases");
        assert_eq!(candidates[0].options[0], "a");
    }

    #[test]
    fn unrecognised_text_yields_nothing() {
        assert!(parser().parse("just some prose\nwith no questions").is_empty());
        assert!(parser().parse("").is_empty());
    }
}
