use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;
use crate::model::question::Question;
use crate::model::session::AnswerMap;

/// Minimum percentage required to pass an attempt.
pub const PASS_PERCENTAGE: u32 = 50;

/// Themes scoring below this percentage are reported as weak.
pub const WEAK_THEME_PERCENTAGE: u32 = 60;

/// Outcome of scoring a set of answers against the active questions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
    pub passed: bool,
}

impl ScoreReport {
    /// Count questions whose recorded answer matches the correct option.
    ///
    /// Pure over its inputs. An empty question set scores 0% and fails.
    #[must_use]
    pub fn compute<'a, I>(questions: I, answers: &AnswerMap) -> Self
    where
        I: IntoIterator<Item = &'a Question>,
    {
        let mut score = 0;
        let mut total = 0;
        for question in questions {
            total += 1;
            if answers.get(&question.id()) == Some(&question.answer()) {
                score += 1;
            }
        }
        let percentage = rounded_percentage(score, total);
        Self {
            score,
            total,
            percentage,
            passed: percentage >= PASS_PERCENTAGE,
        }
    }
}

/// A question answered wrongly or left unanswered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissedQuestion {
    pub question_id: QuestionId,
    /// Position within the scored sequence.
    pub position: usize,
    pub chosen: Option<usize>,
    pub correct: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThemeStats {
    pub theme: String,
    pub total: usize,
    pub correct: usize,
    pub percentage: u32,
    pub weak: bool,
}

/// Review data shown after an attempt: missed questions and per-theme accuracy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PerformanceAnalysis {
    pub missed: Vec<MissedQuestion>,
    /// Weakest theme first; ties keep first-seen order.
    pub themes: Vec<ThemeStats>,
}

impl PerformanceAnalysis {
    #[must_use]
    pub fn compute<'a, I>(questions: I, answers: &AnswerMap) -> Self
    where
        I: IntoIterator<Item = &'a Question>,
    {
        let mut missed = Vec::new();
        let mut themes: Vec<ThemeStats> = Vec::new();

        for (position, question) in questions.into_iter().enumerate() {
            let chosen = answers.get(&question.id()).copied();
            let is_correct = chosen == Some(question.answer());

            let idx = match themes.iter().position(|s| s.theme == question.theme()) {
                Some(idx) => idx,
                None => {
                    themes.push(ThemeStats {
                        theme: question.theme().to_string(),
                        total: 0,
                        correct: 0,
                        percentage: 0,
                        weak: false,
                    });
                    themes.len() - 1
                }
            };
            let stats = &mut themes[idx];
            stats.total += 1;
            if is_correct {
                stats.correct += 1;
            } else {
                missed.push(MissedQuestion {
                    question_id: question.id(),
                    position,
                    chosen,
                    correct: question.answer(),
                });
            }
        }

        for stats in &mut themes {
            stats.percentage = rounded_percentage(stats.correct, stats.total);
            stats.weak = stats.percentage < WEAK_THEME_PERCENTAGE;
        }
        themes.sort_by_key(|s| s.percentage);

        Self { missed, themes }
    }

    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.missed.is_empty()
    }
}

/// `round(100 * part / total)` with halves rounded up; 0 when `total` is 0.
fn rounded_percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let pct = (200 * part + total) / (2 * total);
    u32::try_from(pct).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionDraft;

    fn question(id: u64, theme: &str, answer: usize) -> Question {
        QuestionDraft::new(theme, format!("Q{id}"))
            .with_options(["a", "b", "c", "d"])
            .with_answer(answer)
            .validate()
            .unwrap()
            .assign_id(QuestionId::new(id))
    }

    #[test]
    fn empty_set_scores_zero_without_dividing() {
        let report = ScoreReport::compute(&[], &AnswerMap::new());
        assert_eq!(
            report,
            ScoreReport {
                score: 0,
                total: 0,
                percentage: 0,
                passed: false
            }
        );
    }

    #[test]
    fn score_is_pure_and_rounds_half_up() {
        let questions: Vec<_> = (1..=8).map(|i| question(i, "T", 0)).collect();
        let mut answers = AnswerMap::new();
        answers.insert(QuestionId::new(1), 0);
        answers.insert(QuestionId::new(2), 1);

        let first = ScoreReport::compute(&questions, &answers);
        let second = ScoreReport::compute(&questions, &answers);
        assert_eq!(first, second);
        assert_eq!(first.score, 1);
        assert_eq!(first.percentage, 13);
        assert!(!first.passed);
    }

    #[test]
    fn half_correct_passes() {
        let questions = vec![question(1, "T", 2), question(2, "T", 3)];
        let mut answers = AnswerMap::new();
        answers.insert(QuestionId::new(1), 2);
        let report = ScoreReport::compute(&questions, &answers);
        assert_eq!(report.percentage, 50);
        assert!(report.passed);
    }

    #[test]
    fn analysis_lists_missed_and_sorts_weakest_theme_first() {
        let questions = vec![
            question(1, "Databases", 0),
            question(2, "Networks", 1),
            question(3, "Databases", 2),
            question(4, "Networks", 3),
        ];
        let mut answers = AnswerMap::new();
        answers.insert(QuestionId::new(1), 0);
        answers.insert(QuestionId::new(2), 0);
        answers.insert(QuestionId::new(3), 2);

        let analysis = PerformanceAnalysis::compute(&questions, &answers);

        assert_eq!(analysis.missed.len(), 2);
        assert_eq!(analysis.missed[0].chosen, Some(0));
        assert_eq!(analysis.missed[1].question_id, QuestionId::new(4));
        assert_eq!(analysis.missed[1].chosen, None);
        assert_eq!(analysis.missed[1].position, 3);

        assert_eq!(analysis.themes[0].theme, "Networks");
        assert_eq!(analysis.themes[0].percentage, 0);
        assert!(analysis.themes[0].weak);
        assert_eq!(analysis.themes[1].theme, "Databases");
        assert_eq!(analysis.themes[1].percentage, 100);
        assert!(!analysis.themes[1].weak);
    }
}
