/// CellGridAnimator: steps a lit-cell counter toward `base + delta`.
///
/// ## Frames
///
/// One `AnimationFrame` per unit, `litCount` moving by ±1 each frame:
///
///   planned = min(|delta|, max_steps)
///   frame k: lit = base + sign(delta)·k,  score_remaining = sign(delta)·(planned − k)
///
/// The grid renderer and the score badge both read the SAME frame, so they
/// can never be one step apart. If a step would leave `[0, capacity]` the
/// sequence stops early instead of clamping in place.
///
/// ## Time and cancellation
///
/// `GridAnimation` is a plain lazy `Iterator` (no clock). `play` paces it
/// with `tokio::time::sleep` and checks a `CancelToken` between frames:
/// once cancelled, no further frame is produced or handed to the sink.
/// Restart = build a new animation; a stream is never resumed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AnimationFrame {
    pub lit_count: u32,
    pub score_remaining: i32,
}

// ── Cancellation ──

/// Cooperative, idempotent cancellation flag shared by clones.
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        CancelToken { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called (immediately if it already was).
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only returns on cancellation.
        let _ = rx.wait_for(|c| *c).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

// ── Animation ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AnimationSpec {
    pub capacity: u32,
    pub base: u32,
    pub delta: i32,
    pub step_interval: Duration,
    pub max_steps: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AnimationOutcome {
    /// All planned frames were emitted, or a bound stopped the run early.
    Completed { last: Option<AnimationFrame> },
    Cancelled { last: Option<AnimationFrame> },
}

impl AnimationOutcome {
    pub fn last_frame(&self) -> Option<AnimationFrame> {
        match *self {
            AnimationOutcome::Completed { last } | AnimationOutcome::Cancelled { last } => last,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnimationOutcome::Cancelled { .. })
    }
}

#[derive(Debug)]
pub struct GridAnimation {
    capacity: u32,
    lit: u32,
    direction: i32,
    steps_left: u32,
    score_remaining: i32,
    step_interval: Duration,
    cancel: CancelToken,
}

impl GridAnimation {
    pub fn new(spec: AnimationSpec, cancel: CancelToken) -> Self {
        let planned = spec.delta.unsigned_abs().min(spec.max_steps);
        let direction = spec.delta.signum();
        GridAnimation {
            capacity: spec.capacity,
            lit: spec.base.min(spec.capacity),
            direction,
            steps_left: planned,
            // |planned| <= |delta|, so the product fits even for i32::MIN.
            score_remaining: (i64::from(direction) * i64::from(planned)) as i32,
            step_interval: spec.step_interval,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current lit count (last emitted frame, or the base).
    pub fn lit_count(&self) -> u32 {
        self.lit
    }

    pub fn steps_left(&self) -> u32 {
        self.steps_left
    }

    /// Drive the animation in real time, handing each frame to `on_frame`.
    pub async fn play<F>(mut self, mut on_frame: F) -> AnimationOutcome
    where
        F: FnMut(AnimationFrame),
    {
        let mut last = None;
        while self.steps_left > 0 {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {}
                () = tokio::time::sleep(self.step_interval) => {}
            }
            if self.cancel.is_cancelled() {
                debug!(lit = self.lit, steps_left = self.steps_left, "grid animation cancelled");
                return AnimationOutcome::Cancelled { last };
            }
            match self.next() {
                Some(frame) => {
                    on_frame(frame);
                    last = Some(frame);
                }
                None => break,
            }
        }
        if self.cancel.is_cancelled() {
            return AnimationOutcome::Cancelled { last };
        }
        AnimationOutcome::Completed { last }
    }
}

impl Iterator for GridAnimation {
    type Item = AnimationFrame;

    fn next(&mut self) -> Option<AnimationFrame> {
        if self.steps_left == 0 || self.direction == 0 || self.cancel.is_cancelled() {
            return None;
        }
        let next = self.lit as i64 + self.direction as i64;
        if next < 0 || next > self.capacity as i64 {
            // Bound reached before the nominal target: stop, don't clamp.
            self.steps_left = 0;
            return None;
        }
        self.lit = next as u32;
        self.steps_left -= 1;
        self.score_remaining -= self.direction;
        Some(AnimationFrame { lit_count: self.lit, score_remaining: self.score_remaining })
    }
}

/// Convenience: build an animation with its own fresh token.
pub fn animate(spec: AnimationSpec) -> GridAnimation {
    GridAnimation::new(spec, CancelToken::new())
}
