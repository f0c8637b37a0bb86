/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    /// Position of the current question, 1-based; 0 when nothing is active.
    pub position: usize,
    pub total: usize,
    pub answered: usize,
    pub flagged: usize,
    pub is_complete: bool,
}

impl SessionProgress {
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }
}
