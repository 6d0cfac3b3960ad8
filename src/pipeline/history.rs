use chrono::{DateTime, Utc};

use crate::media::ImageRef;
use crate::services::{SUGGESTION_COUNT, Suggestion};

/// One successfully completed step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub index: usize,
    pub suggestion: Suggestion,
    pub image: ImageRef,
    pub completed_at: DateTime<Utc>,
}

/// Append-only record of completed steps for the current attempt.
///
/// Appending is the only mutation; `clear` runs when a new attempt starts.
/// The controller is the sole writer — everything else reads.
#[derive(Debug, Clone, Default)]
pub struct ResultHistory {
    entries: Vec<StepResult>,
}

impl ResultHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, result: StepResult) {
        self.entries.push(result);
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&StepResult> {
        self.entries.iter().find(|r| r.index == index)
    }

    #[must_use]
    pub fn latest(&self) -> Option<&StepResult> {
        self.entries.last()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The save/export target: the last step's result when the full run
    /// completed, otherwise whatever step finished most recently. Both halves
    /// of this rule are load-bearing — a partially completed attempt is still
    /// exportable.
    #[must_use]
    pub fn final_result(&self) -> Option<&StepResult> {
        self.get(SUGGESTION_COUNT - 1).or_else(|| self.latest())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepResult> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize) -> StepResult {
        StepResult {
            index,
            suggestion: Suggestion {
                title: format!("Step {index}"),
                description: format!("description {index}"),
            },
            image: ImageRef::Remote(format!("/generated/{index}.png")),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn append_and_lookup_by_step_index() {
        let mut history = ResultHistory::new();
        history.append(result(0));
        history.append(result(1));

        assert_eq!(history.count(), 2);
        assert_eq!(history.get(1).unwrap().suggestion.title, "Step 1");
        assert!(history.get(2).is_none());
    }

    #[test]
    fn final_result_is_last_step_when_run_completed() {
        let mut history = ResultHistory::new();
        history.append(result(0));
        history.append(result(1));
        history.append(result(2));

        assert_eq!(history.final_result().unwrap().index, 2);
    }

    #[test]
    fn final_result_falls_back_to_latest_on_partial_run() {
        let mut history = ResultHistory::new();
        assert!(history.final_result().is_none());

        history.append(result(0));
        assert_eq!(history.final_result().unwrap().index, 0);

        history.append(result(1));
        assert_eq!(history.final_result().unwrap().index, 1);
    }

    #[test]
    fn clear_empties_the_record() {
        let mut history = ResultHistory::new();
        history.append(result(0));
        history.clear();

        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }
}
