/// ScoreRevealController: the end-of-session score reveal.
///
///   1. Cancel any reveal still running (never two animators on one grid)
///   2. Fetch the persisted lit count (`base`); on failure use 0, don't block
///   3. `delta` = session score bounded to ±score_cap
///   4. Run the `CellGridAnimator`, forwarding each frame to the host
///   5. Report the outcome, carrying `clamp(base + delta)` for the host to persist
///
/// `settle` runs steps 1-3 and reports the same `final_lit` with no frames.
///
/// Cancellation from the host (teardown) goes through a `RevealCanceller`,
/// which can be cloned out before the reveal starts.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{info, warn};

use super::animator::{AnimationOutcome, AnimationSpec, CancelToken, GridAnimation};
use super::ports::{GridStateSource, SessionHost};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RevealSettings {
    pub step_interval: Duration,
    pub max_steps: u32,
    pub score_cap: u32,
    /// Capacity assumed when the grid state can't be fetched.
    pub fallback_capacity: u32,
}

impl Default for RevealSettings {
    fn default() -> Self {
        RevealSettings {
            step_interval: Duration::from_millis(16),
            max_steps: 30,
            score_cap: 30,
            fallback_capacity: crate::domain::grid::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RevealOutcome {
    pub base: u32,
    pub delta: i32,
    pub capacity: u32,
    /// `clamp(base + delta, 0, capacity)`: the value to persist.
    pub final_lit: u32,
    /// `base` came from the fallback, not the grid source.
    pub base_fallback: bool,
    pub animation: AnimationOutcome,
}

impl RevealOutcome {
    pub fn cancelled(&self) -> bool {
        self.animation.is_cancelled()
    }
}

/// Cancels whichever reveal is currently running, if any.
#[derive(Clone, Debug, Default)]
pub struct RevealCanceller {
    current: Arc<Mutex<Option<CancelToken>>>,
}

impl RevealCanceller {
    pub fn cancel(&self) {
        let guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = guard.as_ref() {
            token.cancel();
        }
    }

    /// Supersede the running reveal with a fresh token.
    fn replace(&self) -> CancelToken {
        let mut guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = guard.take() {
            prev.cancel();
        }
        let token = CancelToken::new();
        *guard = Some(token.clone());
        token
    }
}

#[derive(Debug)]
pub struct ScoreRevealController {
    settings: RevealSettings,
    canceller: RevealCanceller,
}

impl ScoreRevealController {
    pub fn new(settings: RevealSettings) -> Self {
        ScoreRevealController { settings, canceller: RevealCanceller::default() }
    }

    pub fn settings(&self) -> &RevealSettings {
        &self.settings
    }

    pub fn canceller(&self) -> RevealCanceller {
        self.canceller.clone()
    }

    /// Session score bounded to the configured magnitude.
    pub fn bounded_delta(&self, score: i32) -> i32 {
        let cap = self.settings.score_cap.min(i32::MAX as u32) as i32;
        score.clamp(-cap, cap)
    }

    pub async fn reveal<G, H>(&self, grid: &mut G, score: i32, host: &mut H) -> RevealOutcome
    where
        G: GridStateSource,
        H: SessionHost,
    {
        let token = self.canceller.replace();
        let target = self.target(grid, score).await;

        let animation = if token.is_cancelled() {
            AnimationOutcome::Cancelled { last: None }
        } else {
            let spec = AnimationSpec {
                capacity: target.capacity,
                base: target.base,
                delta: target.delta,
                step_interval: self.settings.step_interval,
                max_steps: self.settings.max_steps,
            };
            GridAnimation::new(spec, token).play(|frame| host.on_grid_reveal_frame(frame)).await
        };

        let outcome = target.with(animation);
        info!(base = outcome.base, delta = outcome.delta, final_lit = outcome.final_lit,
            cancelled = outcome.cancelled(), "score reveal finished");
        host.on_reveal_finished(&outcome);
        outcome
    }

    /// Resolve the reveal without playing it, for hosts that skip the
    /// animation. Stops any running reveal; the outcome reads as cancelled.
    pub async fn settle<G: GridStateSource>(&self, grid: &mut G, score: i32) -> RevealOutcome {
        self.canceller.replace().cancel();
        let outcome = self.target(grid, score).await.with(AnimationOutcome::Cancelled { last: None });
        info!(base = outcome.base, delta = outcome.delta, final_lit = outcome.final_lit, "score reveal skipped");
        outcome
    }

    async fn target<G: GridStateSource>(&self, grid: &mut G, score: i32) -> RevealTarget {
        let (base, capacity, base_fallback) = match grid.fetch_grid_state().await {
            Ok(state) => (state.lit_count.min(state.capacity), state.capacity, false),
            Err(e) => {
                warn!("grid state fetch failed, revealing from 0: {e}");
                (0, self.settings.fallback_capacity, true)
            }
        };
        let delta = self.bounded_delta(score);
        let final_lit = (base as i64 + delta as i64).clamp(0, capacity as i64) as u32;
        RevealTarget { base, delta, capacity, final_lit, base_fallback }
    }
}

struct RevealTarget {
    base: u32,
    delta: i32,
    capacity: u32,
    final_lit: u32,
    base_fallback: bool,
}

impl RevealTarget {
    fn with(self, animation: AnimationOutcome) -> RevealOutcome {
        RevealOutcome {
            base: self.base,
            delta: self.delta,
            capacity: self.capacity,
            final_lit: self.final_lit,
            base_fallback: self.base_fallback,
            animation,
        }
    }
}
