/// Seams between the engine and the outside world.
///
/// Consumed by the engine (collaborators):
///   - `SessionProvisioner`: hands out a session id + ordered exercises
///   - `GridStateSource`   : current lit count / capacity of the cell grid
///   - `ObservationSink`   : receives the session's submission log, once
///
/// Exposed by the engine (host):
///   - `SessionHost`: results navigation, per-frame reveal rendering,
///     reveal completion, flush failure reporting

use std::future::Future;

use crate::domain::exercise::SubmissionRecord;
use crate::error::{GridFetchError, LogFlushError, ProvisioningError};
use super::animator::AnimationFrame;
use super::reveal::RevealOutcome;
use super::session::{Provisioned, SessionSummary};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GridState {
    pub lit_count: u32,
    pub capacity: u32,
}

pub trait SessionProvisioner {
    fn provision_session(&mut self, volume: u32) -> impl Future<Output = Result<Provisioned, ProvisioningError>> + Send;
}

pub trait GridStateSource {
    fn fetch_grid_state(&mut self) -> impl Future<Output = Result<GridState, GridFetchError>> + Send;
}

pub trait ObservationSink {
    fn flush_observations(
        &mut self,
        session_id: u64,
        records: Vec<SubmissionRecord>,
    ) -> impl Future<Output = Result<(), LogFlushError>> + Send;
}

pub trait SessionHost {
    /// Session reached `Finished`; navigate to results.
    fn on_session_finished(&mut self, summary: &SessionSummary);

    /// One reveal frame; grid and score badge both render from it.
    fn on_grid_reveal_frame(&mut self, frame: AnimationFrame);

    /// Reveal ran to completion or was cancelled.
    fn on_reveal_finished(&mut self, _outcome: &RevealOutcome) {}

    /// The observation flush failed. Non-fatal: retry/telemetry is up to the host.
    fn on_log_flush_failed(&mut self, _error: &LogFlushError) {}
}
