/// SessionDriver: wires one session to its collaborators.
///
///   load()     provisioning collaborator → ExerciseSession::begin
///   submit()   straight through to the session (synchronous)
///   conclude() results navigation first, then the single observation flush
///   reveal()   ScoreRevealController over the grid collaborator
///   settle()   same target as reveal(), no animation
///
/// The host is told the session finished BEFORE the flush is awaited, so a
/// slow or failing sink never holds up the results view. A failed flush is
/// reported to the host, never swallowed.

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::domain::random::RandomSource;
use crate::error::{LogFlushError, ProvisioningError, SessionError};
use super::event::SessionEvent;
use super::ports::{GridStateSource, ObservationSink, SessionHost, SessionProvisioner};
use super::reveal::{RevealCanceller, RevealOutcome, ScoreRevealController};
use super::session::{ExerciseSession, Phase, SessionSummary, SubmissionOutcome};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConclusion {
    pub summary: SessionSummary,
    pub flush: Result<(), LogFlushError>,
}

pub struct SessionDriver<P, O, G> {
    provisioner: P,
    sink: O,
    grid: G,
    session: ExerciseSession,
    reveal: ScoreRevealController,
    volume: u32,
    concluded: bool,
}

impl<P, O, G> SessionDriver<P, O, G>
where
    P: SessionProvisioner,
    O: ObservationSink,
    G: GridStateSource,
{
    pub fn new(config: &EngineConfig, provisioner: P, sink: O, grid: G, rng: Box<dyn RandomSource + Send>) -> Self {
        SessionDriver {
            provisioner,
            sink,
            grid,
            session: ExerciseSession::new(config.destabilize, rng),
            reveal: ScoreRevealController::new(config.reveal),
            volume: config.volume,
            concluded: false,
        }
    }

    pub fn session(&self) -> &ExerciseSession {
        &self.session
    }

    pub fn grid_mut(&mut self) -> &mut G {
        &mut self.grid
    }

    /// Cancels the running reveal; clone it out before awaiting `reveal`.
    pub fn reveal_canceller(&self) -> RevealCanceller {
        self.reveal.canceller()
    }

    /// Provision and start. On error the session stays in `Loading`.
    pub async fn load(&mut self) -> Result<Vec<SessionEvent>, ProvisioningError> {
        self.session.restart();
        self.concluded = false;
        let provisioned = match self.provisioner.provision_session(self.volume).await {
            Ok(p) => p,
            Err(e) => {
                warn!("provisioning failed: {e}");
                return Err(e);
            }
        };
        self.session.begin(provisioned)
    }

    pub fn submit(&mut self, raw_input: &str) -> Result<SubmissionOutcome, SessionError> {
        self.session.submit(raw_input)
    }

    /// Finish-time side effects. Idempotent: a second call neither notifies
    /// the host again nor re-sends the log.
    pub async fn conclude<H: SessionHost>(&mut self, host: &mut H) -> Result<SessionConclusion, SessionError> {
        let summary = self.finished_summary()?;

        if self.concluded {
            return Ok(SessionConclusion { summary, flush: Err(LogFlushError::AlreadyFlushed) });
        }
        self.concluded = true;
        host.on_session_finished(&summary);

        let flush = match self.session.take_submission_log() {
            Some(records) => {
                let count = records.len();
                let result = self.sink.flush_observations(summary.session_id, records).await;
                if result.is_ok() {
                    info!(session_id = summary.session_id, count, "observations flushed");
                }
                result
            }
            None => Err(LogFlushError::AlreadyFlushed),
        };
        if let Err(e) = &flush {
            warn!(session_id = summary.session_id, "observation flush failed: {e}");
            host.on_log_flush_failed(e);
        }

        Ok(SessionConclusion { summary, flush })
    }

    /// Animate the finished session's score into the grid.
    pub async fn reveal<H: SessionHost>(&mut self, host: &mut H) -> Result<RevealOutcome, SessionError> {
        let summary = self.finished_summary()?;
        Ok(self.reveal.reveal(&mut self.grid, summary.score, host).await)
    }

    /// The reveal's `final_lit` without the animation (player skipped it).
    pub async fn settle(&mut self) -> Result<RevealOutcome, SessionError> {
        let summary = self.finished_summary()?;
        Ok(self.reveal.settle(&mut self.grid, summary.score).await)
    }

    fn finished_summary(&self) -> Result<SessionSummary, SessionError> {
        match self.session.phase() {
            Phase::Loading => Err(SessionError::NotStarted),
            Phase::InProgress => Err(SessionError::NotFinished),
            Phase::Finished => self.session.summary().ok_or(SessionError::NotFinished),
        }
    }
}
