pub mod history;
pub mod state;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::CredentialStore;
use crate::config::Config;
use crate::error::{AuthRequiredReason, PipelineError};
use crate::media::{ImageRef, InputSlots, LocalImage};
use crate::services::{StepProcessor, SuggestionFetcher};
use crate::usage::UsageGate;

pub use history::{ResultHistory, StepResult};
pub use state::{PipelineState, RunOutcome, RunReport, StartDenied};

/// Orchestrates one redesign attempt: gate check, suggestion fetch, then the
/// strictly sequential step chain. Owns all attempt-scoped state; UI layers
/// subscribe to [`PipelineController::subscribe`] and only read.
///
/// One attempt is in flight at most. Attempts are tagged with a generation
/// counter; a reset or newer start makes the in-flight attempt stale, and
/// stale responses are discarded rather than applied.
pub struct PipelineController {
    fetcher: SuggestionFetcher,
    processor: StepProcessor,
    gate: UsageGate,
    state: watch::Sender<PipelineState>,
    history: Mutex<ResultHistory>,
    generation: AtomicU64,
}

impl PipelineController {
    #[must_use]
    pub fn from_config(config: &Config, store: Arc<CredentialStore>) -> Self {
        Self::new(
            config.service_url(),
            Duration::from_secs(config.suggestion_timeout_secs),
            store,
        )
    }

    #[must_use]
    pub fn new(
        base_url: &str,
        suggestion_timeout: Duration,
        store: Arc<CredentialStore>,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            fetcher: SuggestionFetcher::with_timeout(
                base_url,
                Arc::clone(&store),
                suggestion_timeout,
            ),
            processor: StepProcessor::new(base_url, Arc::clone(&store)),
            gate: UsageGate::new(base_url, store),
            state,
            history: Mutex::new(ResultHistory::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Observe state transitions (UI projection).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn usage(&self) -> &UsageGate {
        &self.gate
    }

    /// Snapshot of the completed steps of the current attempt.
    #[must_use]
    pub fn history(&self) -> ResultHistory {
        self.history.lock().expect("history lock poisoned").clone()
    }

    /// User-initiated "back": force Idle and orphan any in-flight attempt.
    /// History is kept — results stay viewable until the next start clears
    /// them.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(PipelineState::Idle);
    }

    /// Run one attempt to completion.
    ///
    /// Local validation and the usage gate are checked before the state
    /// machine is entered; a re-entrant call while an attempt is live is a
    /// no-op that fires no network traffic.
    pub async fn start(&self, inputs: &InputSlots) -> RunOutcome {
        if !self.state.borrow().is_idle() {
            return RunOutcome::Rejected(StartDenied::Busy);
        }

        let Some(original) = inputs.original() else {
            return RunOutcome::Rejected(StartDenied::MissingInput { slot: "original" });
        };
        let Some(inspiration) = inputs.inspiration() else {
            return RunOutcome::Rejected(StartDenied::MissingInput { slot: "inspiration" });
        };

        if !self.gate.can_start() {
            return RunOutcome::AuthRequired {
                reason: AuthRequiredReason::AnonymousLimit,
                credential_cleared: false,
            };
        }

        // Atomic claim: exactly one caller can move Idle → AwaitingSuggestions.
        let claimed = self.state.send_if_modified(|s| {
            if s.is_idle() {
                *s = PipelineState::AwaitingSuggestions;
                true
            } else {
                false
            }
        });
        if !claimed {
            return RunOutcome::Rejected(StartDenied::Busy);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.history.lock().expect("history lock poisoned").clear();
        info!(generation, "redesign attempt started");

        self.run_attempt(generation, original, inspiration).await
    }

    async fn run_attempt(
        &self,
        generation: u64,
        original: LocalImage,
        inspiration: LocalImage,
    ) -> RunOutcome {
        let fetched = self.fetcher.fetch(&original, &inspiration).await;
        if self.is_stale(generation) {
            return RunOutcome::Abandoned;
        }

        let suggestions = match fetched {
            Ok(suggestions) => suggestions,
            Err(PipelineError::AuthRequired {
                reason,
                credential_cleared,
            }) => {
                info!("authentication required, returning to idle");
                self.state.send_replace(PipelineState::Idle);
                return RunOutcome::AuthRequired {
                    reason,
                    credential_cleared,
                };
            }
            Err(error) => return self.fail(error),
        };

        // The server has recorded one more run; pick up the authoritative
        // remaining count. Never decremented locally.
        self.gate.resync().await;
        if self.is_stale(generation) {
            return RunOutcome::Abandoned;
        }

        let mut source = ImageRef::Local(original);
        for (index, suggestion) in suggestions.iter().enumerate() {
            // Progress is visible before the call goes out.
            self.state.send_replace(PipelineState::Running { step: index });

            let produced = self
                .processor
                .run(&source, &suggestion.description, index)
                .await;
            if self.is_stale(generation) {
                return RunOutcome::Abandoned;
            }

            match produced {
                Ok(image) => {
                    self.history
                        .lock()
                        .expect("history lock poisoned")
                        .append(StepResult {
                            index,
                            suggestion: suggestion.clone(),
                            image: image.clone(),
                            completed_at: Utc::now(),
                        });
                    // Chaining rule: step i+1 consumes exactly step i's output.
                    source = image;
                }
                Err(error) => return self.fail(error),
            }
        }

        let steps_completed = self
            .history
            .lock()
            .expect("history lock poisoned")
            .count();
        self.state.send_replace(PipelineState::Succeeded);
        info!(generation, steps = steps_completed, "redesign attempt succeeded");
        RunOutcome::Succeeded(RunReport {
            generation,
            steps_completed,
            final_image: source,
        })
    }

    /// Report the failure to observers, then auto-reset so a fresh attempt
    /// can start. The failed attempt is never retried — a new start fetches
    /// fresh suggestions from step 0.
    fn fail(&self, error: PipelineError) -> RunOutcome {
        warn!(error = %error, "redesign attempt failed");
        self.state
            .send_replace(PipelineState::Failed(error.clone()));
        self.state.send_replace(PipelineState::Idle);
        RunOutcome::Failed(error)
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }
}
