use strum::Display;

use crate::error::{AuthRequiredReason, PipelineError};
use crate::media::ImageRef;

/// Observable state of the current attempt.
///
/// `Succeeded` and `Failed` are terminal for the attempt; the controller
/// returns to `Idle` before another start is accepted — automatically after
/// reporting a failure, or through an explicit reset.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum PipelineState {
    Idle,
    AwaitingSuggestions,
    #[strum(serialize = "Running")]
    Running { step: usize },
    Succeeded,
    #[strum(serialize = "Failed")]
    Failed(PipelineError),
}

impl PipelineState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Local reasons a start call is refused before the state machine is entered.
/// No network traffic happens for any of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartDenied {
    /// An attempt is already awaiting suggestions or running.
    Busy,
    /// An image slot is empty.
    MissingInput { slot: &'static str },
}

/// Summary of a completed attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub generation: u64,
    pub steps_completed: usize,
    pub final_image: ImageRef,
}

/// Everything a start call can come back with.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every step completed; the history holds the full result set.
    Succeeded(RunReport),
    /// Refused locally without entering the state machine.
    Rejected(StartDenied),
    /// The attempt needs authentication: quota exhausted at the gate or a
    /// credential rejected mid-flight. The controller is back at `Idle`.
    AuthRequired {
        reason: AuthRequiredReason,
        credential_cleared: bool,
    },
    /// The attempt failed; the failure was reported and the controller reset
    /// to `Idle`. No automatic retry — a fresh start fetches fresh
    /// suggestions.
    Failed(PipelineError),
    /// A reset or newer attempt superseded this one; its late responses were
    /// discarded.
    Abandoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names_render_without_payloads() {
        assert_eq!(PipelineState::Idle.to_string(), "Idle");
        assert_eq!(PipelineState::Running { step: 1 }.to_string(), "Running");
        assert_eq!(
            PipelineState::Failed(PipelineError::TimedOut(120)).to_string(),
            "Failed"
        );
    }

    #[test]
    fn only_idle_reports_idle() {
        assert!(PipelineState::Idle.is_idle());
        assert!(!PipelineState::AwaitingSuggestions.is_idle());
        assert!(!PipelineState::Succeeded.is_idle());
    }
}
