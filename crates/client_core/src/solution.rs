use std::sync::Arc;

use shared::domain::{ExerciseId, ExerciseRecord, UserId};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::DataGateway;

/// Display states of the reference-solution page.
///
/// `Unpublished` and `NotFound` deliberately carry no solution text: the
/// publish gate drops it before it reaches any state the presentation layer
/// can read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolutionPage {
    Loading,
    /// The exercise is absent, or the page could not be loaded.
    NotFound,
    /// The exercise exists but its solution has not been published.
    Unpublished { title: String },
    Ready {
        title: String,
        solution_code: String,
        /// Advisory only: when false, presentation shows a "try it yourself
        /// first" notice. Does not block the solution.
        has_submission: bool,
    },
}

impl SolutionPage {
    pub fn solution_visible(&self) -> bool {
        matches!(self, SolutionPage::Ready { .. })
    }
}

/// View-model of the read-only solution viewer.
pub struct SolutionViewModel {
    gateway: Arc<dyn DataGateway>,
    state: Mutex<SolutionPage>,
    changes: broadcast::Sender<()>,
}

impl SolutionViewModel {
    pub fn new(gateway: Arc<dyn DataGateway>) -> Arc<Self> {
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            gateway,
            state: Mutex::new(SolutionPage::Loading),
            changes,
        })
    }

    pub async fn snapshot(&self) -> SolutionPage {
        self.state.lock().await.clone()
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    /// Loads the page: the exercise record and the submission-existence probe
    /// are fetched concurrently and joined before the state flips, so no
    /// partial render is observable. A failure on either read resolves to the
    /// not-found/unpublished display path.
    pub async fn load(&self, exercise_id: &ExerciseId, viewer: &UserId) -> SolutionPage {
        let (exercise, submission) = tokio::join!(
            self.gateway.fetch_exercise(exercise_id),
            self.gateway.has_submission(exercise_id, viewer),
        );

        let page = match (exercise, submission) {
            (Ok(record), Ok(has_submission)) => {
                info!(
                    exercise_id = %exercise_id,
                    found = record.is_some(),
                    has_submission,
                    "solution: page loaded"
                );
                gate(record, has_submission)
            }
            (Err(err), _) => {
                warn!(exercise_id = %exercise_id, "solution: exercise fetch failed: {err}");
                SolutionPage::NotFound
            }
            (_, Err(err)) => {
                warn!(exercise_id = %exercise_id, "solution: submission probe failed: {err}");
                SolutionPage::NotFound
            }
        };

        *self.state.lock().await = page.clone();
        let _ = self.changes.send(());
        page
    }
}

/// Publish-flag gate: access control by omission. An absent record and an
/// unpublished solution are terminal display states, not errors; the
/// unpublished branch never retains the solution text.
fn gate(record: Option<ExerciseRecord>, has_submission: bool) -> SolutionPage {
    match record {
        None => SolutionPage::NotFound,
        Some(exercise) if !exercise.solution_published => SolutionPage::Unpublished {
            title: exercise.title,
        },
        Some(exercise) => SolutionPage::Ready {
            title: exercise.title,
            solution_code: exercise.solution_code.unwrap_or_default(),
            has_submission,
        },
    }
}

#[cfg(test)]
#[path = "tests/solution_tests.rs"]
mod tests;
