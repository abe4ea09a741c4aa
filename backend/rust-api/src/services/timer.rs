use std::sync::{Arc, Mutex};
use std::time::Duration;

use mongodb::Database;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::metrics::QUESTIONS_AUTO_SKIPPED_TOTAL;
use crate::models::{ActiveSession, SessionMode, TickOutcome};

use super::generation_client::GenerationClient;
use super::{proctor_service, session_service};

/// Everything a timer-driven submission needs once the countdown runs out on
/// the last question.
#[derive(Clone)]
pub struct SubmissionContext {
    pub mongo: Database,
    pub generation: Arc<dyn GenerationClient>,
}

/// Owned handle of the per-session countdown task.
///
/// Started when the session enters the quiz; dropping the handle aborts the
/// task, so teardown cancellation needs no cooperation from the task itself.
pub struct QuestionTimer {
    handle: JoinHandle<()>,
}

impl QuestionTimer {
    pub fn spawn(session: Arc<Mutex<ActiveSession>>, ctx: SubmissionContext) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // consume the immediate first tick; the countdown starts in full
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let (outcome, session_id, mode) = {
                    let mut state = session.lock().unwrap();
                    let outcome = state.tick();
                    (outcome, state.id.clone(), state.mode.name())
                };

                match outcome {
                    TickOutcome::Idle | TickOutcome::Ticked { .. } => {}
                    TickOutcome::AutoSkipped { current } => {
                        QUESTIONS_AUTO_SKIPPED_TOTAL
                            .with_label_values(&[mode])
                            .inc();
                        tracing::info!(
                            "Countdown expired: session={}, now at question {}",
                            session_id,
                            current
                        );
                    }
                    TickOutcome::Completed => {
                        tracing::info!(
                            "Countdown expired on the last question, submitting: session={}",
                            session_id
                        );
                        Self::drive_submission(&session, &ctx).await;
                    }
                    TickOutcome::Terminal => break,
                }
            }
        });

        Self { handle }
    }

    /// The tick left the session in `Submitting`; finish the job the same
    /// way a manual submit would.
    async fn drive_submission(session: &Arc<Mutex<ActiveSession>>, ctx: &SubmissionContext) {
        let is_practice = {
            let state = session.lock().unwrap();
            matches!(state.mode, SessionMode::Practice { .. })
        };

        if is_practice {
            session_service::finalize_practice(session);
        } else if let Err(e) =
            proctor_service::submit_active_session(session, &ctx.mongo, ctx.generation.clone())
                .await
        {
            // submit_active_session already reverted the session for retry
            tracing::error!("Timer-driven proctored submission failed: {}", e);
        }
    }
}

impl Drop for QuestionTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
