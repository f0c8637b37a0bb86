//! Question set shipped with the app.

use exam_core::model::{Question, QuestionDraft, QuestionError, QuestionId};

const BUILTIN: &[(&str, &str, [&str; 4], usize)] = &[
    (
        "Computer Networks",
        "Which OSI layer is responsible for routing packets between networks?",
        ["Data link", "Network", "Transport", "Session"],
        1,
    ),
    (
        "Computer Networks",
        "Which protocol translates domain names into IP addresses?",
        ["ARP", "DHCP", "DNS", "ICMP"],
        2,
    ),
    (
        "Database Systems",
        "Which normal form removes partial dependencies on a composite key?",
        ["First normal form", "Second normal form", "Third normal form", "Boyce-Codd normal form"],
        1,
    ),
    (
        "Database Systems",
        "Which SQL clause filters groups after aggregation?",
        ["WHERE", "ORDER BY", "HAVING", "GROUP BY"],
        2,
    ),
    (
        "Data Structures and Algorithms",
        "What is the worst-case time complexity of binary search on a sorted array?",
        ["O(1)", "O(log n)", "O(n)", "O(n log n)"],
        1,
    ),
    (
        "Operating Systems",
        "Which condition is NOT required for a deadlock to occur?",
        ["Mutual exclusion", "Hold and wait", "Preemption", "Circular wait"],
        2,
    ),
];

/// Built-in questions with their fixed ids (`1..=N`).
///
/// # Errors
///
/// Returns `QuestionError` if a built-in entry fails validation.
pub fn builtin_questions() -> Result<Vec<Question>, QuestionError> {
    BUILTIN
        .iter()
        .zip(1_u64..)
        .map(|(&(theme, prompt, options, answer), id)| {
            Question::from_draft(
                QuestionId::new(id),
                QuestionDraft::new(theme, prompt)
                    .with_options(options)
                    .with_answer(answer),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_questions_validate_with_sequential_ids() {
        let questions = builtin_questions().unwrap();
        assert_eq!(questions.len(), BUILTIN.len());
        assert_eq!(questions[0].id(), QuestionId::new(1));
        assert_eq!(
            questions.last().map(Question::id),
            Some(QuestionId::new(BUILTIN.len() as u64))
        );
    }
}
