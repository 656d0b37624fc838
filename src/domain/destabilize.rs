/// Destabilization: temporary degradation of the keypad (Hide / Shuffle).
///
/// ## Two-slot state (never collapse into one field)
///
///   - `active` : the effect governing the keypad for the exercise being
///                 answered *now*.
///   - `pending`: the effect queued for the *next* exercise.
///
/// The decision for "what happens next" is taken at submit time and applied
/// on advance. An effect revealed while answering can therefore never change
/// the pad mid-answer, and re-rendering without submitting cannot re-roll it.
///
/// ## Transitions
///
/// ### on_answer_submitted (decide)
/// ┌──────────────────────────────────┬──────────────────────────────────┐
/// │ Condition (priority order)        │ Result                           │
/// ├──────────────────────────────────┼──────────────────────────────────┤
/// │ disabled                          │ both slots cleared, no draw      │
/// │ active, remaining-1 == 0          │ active cleared → roll            │
/// │ active, remaining-1 == k > 0      │ pending = {same mode, k}, NO roll│
/// │ no active                         │ roll                             │
/// └──────────────────────────────────┴──────────────────────────────────┘
///
/// ### Roll
/// ┌──────────────────────┬──────────────────────────────────────────────┐
/// │ hide fires? shuffle?  │ pending                                      │
/// ├──────────────────────┼──────────────────────────────────────────────┤
/// │ no / no               │ None                                         │
/// │ yes / no              │ Hide,    duration ~ U[hide_min, hide_max]    │
/// │ no / yes              │ Shuffle, duration ~ U[shuffle_min, ..max]    │
/// │ yes / yes             │ coin flip between the two, then as above     │
/// └──────────────────────┴──────────────────────────────────────────────┘
///
/// ### on_new_exercise (apply)
/// `active = pending; pending = None`. The ONLY place `active` is set.
/// When disabled, both slots are forced to `None`.
///
/// `remaining` only moves on submission, never on reads or navigation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::random::RandomSource;
use crate::error::ConfigError;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Mode {
    /// Digit labels suppressed, positions unchanged.
    Hide,
    /// Digit positions permuted, labels visible.
    Shuffle,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Effect {
    pub mode: Mode,
    /// Exercises (submissions) this effect still covers.
    pub remaining: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct DestabilizationState {
    pub active: Option<Effect>,
    pub pending: Option<Effect>,
}

impl DestabilizationState {
    pub const CLEAR: DestabilizationState = DestabilizationState { active: None, pending: None };

    pub fn is_clear(&self) -> bool {
        self.active.is_none() && self.pending.is_none()
    }
}

// ── Settings ──

/// Inclusive duration range, in exercises. Always `1 <= min <= max`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DurationRange {
    min: u32,
    max: u32,
}

impl DurationRange {
    pub fn new(field: &'static str, min: u32, max: u32) -> Result<Self, ConfigError> {
        if min == 0 {
            return Err(ConfigError::ZeroDuration { field });
        }
        if min > max {
            return Err(ConfigError::DurationRange { field, min, max });
        }
        Ok(DurationRange { min, max })
    }

    pub fn min(&self) -> u32 { self.min }
    pub fn max(&self) -> u32 { self.max }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct DestabilizeSettings {
    pub enabled: bool,
    pub hide_chance: f64,
    pub hide_range: DurationRange,
    pub shuffle_chance: f64,
    pub shuffle_range: DurationRange,
}

impl DestabilizeSettings {
    pub const DEFAULT_HIDE_CHANCE: f64 = 0.20;
    pub const DEFAULT_SHUFFLE_CHANCE: f64 = 0.33;

    /// Validated construction. Bad values are rejected, never clamped.
    pub fn new(
        enabled: bool,
        hide_chance: f64,
        (hide_min, hide_max): (u32, u32),
        shuffle_chance: f64,
        (shuffle_min, shuffle_max): (u32, u32),
    ) -> Result<Self, ConfigError> {
        Ok(DestabilizeSettings {
            enabled,
            hide_chance: check_probability("destabilization.hide_chance", hide_chance)?,
            hide_range: DurationRange::new("destabilization.hide", hide_min, hide_max)?,
            shuffle_chance: check_probability("destabilization.shuffle_chance", shuffle_chance)?,
            shuffle_range: DurationRange::new("destabilization.shuffle", shuffle_min, shuffle_max)?,
        })
    }

    pub fn disabled() -> Self {
        DestabilizeSettings { enabled: false, ..Self::default() }
    }
}

impl Default for DestabilizeSettings {
    fn default() -> Self {
        DestabilizeSettings {
            enabled: true,
            hide_chance: Self::DEFAULT_HIDE_CHANCE,
            hide_range: DurationRange { min: 1, max: 2 },
            shuffle_chance: Self::DEFAULT_SHUFFLE_CHANCE,
            shuffle_range: DurationRange { min: 1, max: 3 },
        }
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Probability { field, value })
    }
}

// ── Controller ──

/// What a submission did to the pending slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Decision {
    /// Destabilization is off; nothing was drawn.
    Disabled,
    /// The active effect still has exercises left and was copied forward.
    CarriedForward(Effect),
    /// A fresh effect was rolled for the next exercise.
    Rolled(Effect),
    /// Trials were drawn and neither fired.
    Calm,
}

impl Decision {
    /// The effect queued for the next exercise, if any.
    pub fn queued(self) -> Option<Effect> {
        match self {
            Decision::CarriedForward(e) | Decision::Rolled(e) => Some(e),
            Decision::Disabled | Decision::Calm => None,
        }
    }
}

/// Owns `DestabilizationState` and is its only mutator.
#[derive(Clone, Debug)]
pub struct DestabilizationController {
    settings: DestabilizeSettings,
    state: DestabilizationState,
}

impl DestabilizationController {
    pub fn new(settings: DestabilizeSettings) -> Self {
        DestabilizationController { settings, state: DestabilizationState::CLEAR }
    }

    pub fn settings(&self) -> &DestabilizeSettings {
        &self.settings
    }

    /// Snapshot for readers (renderer, tests).
    pub fn state(&self) -> DestabilizationState {
        self.state
    }

    pub fn current_mode(&self) -> Option<Mode> {
        self.state.active.map(|e| e.mode)
    }

    /// Toggle globally. Either direction clears both slots.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
        self.reset();
    }

    /// Session restart.
    pub fn reset(&mut self) {
        self.state = DestabilizationState::CLEAR;
    }

    /// Promote `pending` to `active` for the exercise at `index`.
    /// Returns the effect now governing the keypad.
    pub fn on_new_exercise(&mut self, index: usize) -> Option<Effect> {
        if !self.settings.enabled {
            self.reset();
            return None;
        }
        self.state.active = self.state.pending.take();
        if let Some(effect) = self.state.active {
            debug!(index, mode = ?effect.mode, remaining = effect.remaining, "destabilization active");
        }
        self.state.active
    }

    /// Count the submission against the active effect and decide what the
    /// next exercise gets.
    pub fn on_answer_submitted(&mut self, rng: &mut dyn RandomSource) -> Decision {
        if !self.settings.enabled {
            self.reset();
            return Decision::Disabled;
        }

        if let Some(mut effect) = self.state.active {
            effect.remaining = effect.remaining.saturating_sub(1);
            self.state.active = if effect.remaining == 0 { None } else { Some(effect) };
        }

        if let Some(effect) = self.state.active {
            self.state.pending = Some(effect);
            return Decision::CarriedForward(effect);
        }

        self.state.pending = self.roll(rng);
        match self.state.pending {
            Some(effect) => {
                debug!(mode = ?effect.mode, remaining = effect.remaining, "destabilization queued");
                Decision::Rolled(effect)
            }
            None => Decision::Calm,
        }
    }

    fn roll(&self, rng: &mut dyn RandomSource) -> Option<Effect> {
        let hide = rng.next_float() < self.settings.hide_chance;
        let shuffle = rng.next_float() < self.settings.shuffle_chance;

        let mode = match (hide, shuffle) {
            (false, false) => return None,
            (true, false) => Mode::Hide,
            (false, true) => Mode::Shuffle,
            (true, true) => if rng.next_float() < 0.5 { Mode::Hide } else { Mode::Shuffle },
        };
        let range = match mode {
            Mode::Hide => self.settings.hide_range,
            Mode::Shuffle => self.settings.shuffle_range,
        };
        let remaining = rng.next_int(range.min, range.max);
        Some(Effect { mode, remaining })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::random::{RngSource, ScriptedRandom};

    fn controller() -> DestabilizationController {
        DestabilizationController::new(DestabilizeSettings::default())
    }

    // ── Settings validation ──

    #[test]
    fn inverted_range_is_rejected() {
        let err = DestabilizeSettings::new(true, 0.2, (3, 1), 0.3, (1, 3)).unwrap_err();
        assert!(matches!(err, ConfigError::DurationRange { min: 3, max: 1, .. }));
    }

    #[test]
    fn zero_minimum_is_rejected() {
        let err = DestabilizeSettings::new(true, 0.2, (1, 2), 0.3, (0, 3)).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDuration { .. }));
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        assert!(DestabilizeSettings::new(true, 1.5, (1, 2), 0.3, (1, 3)).is_err());
        assert!(DestabilizeSettings::new(true, 0.2, (1, 2), -0.1, (1, 3)).is_err());
        assert!(DestabilizeSettings::new(true, f64::NAN, (1, 2), 0.3, (1, 3)).is_err());
        assert!(DestabilizeSettings::new(true, 0.0, (1, 1), 1.0, (2, 2)).is_ok());
    }

    // ── Roll ──

    #[test]
    fn calm_roll_leaves_pending_empty() {
        let mut c = controller();
        let mut rng = ScriptedRandom::new().floats(&[0.9, 0.9]);
        assert_eq!(c.on_answer_submitted(&mut rng), Decision::Calm);
        assert!(c.state().is_clear());
    }

    #[test]
    fn hide_only_roll_queues_hide() {
        let mut c = controller();
        let mut rng = ScriptedRandom::new().floats(&[0.05, 0.9]).ints(&[2]);
        let d = c.on_answer_submitted(&mut rng);
        assert_eq!(d, Decision::Rolled(Effect { mode: Mode::Hide, remaining: 2 }));
        assert_eq!(c.state().pending, Some(Effect { mode: Mode::Hide, remaining: 2 }));
        // Not applied to the exercise being answered.
        assert_eq!(c.current_mode(), None);
    }

    #[test]
    fn both_fire_coin_flip_picks_one() {
        let mut c = controller();
        let mut rng = ScriptedRandom::new().floats(&[0.0, 0.0, 0.7]).ints(&[3]);
        let d = c.on_answer_submitted(&mut rng);
        assert_eq!(d, Decision::Rolled(Effect { mode: Mode::Shuffle, remaining: 3 }));

        let mut c = controller();
        let mut rng = ScriptedRandom::new().floats(&[0.0, 0.0, 0.2]).ints(&[1]);
        let d = c.on_answer_submitted(&mut rng);
        assert_eq!(d, Decision::Rolled(Effect { mode: Mode::Hide, remaining: 1 }));
    }

    // ── Apply on advance ──

    #[test]
    fn pending_becomes_active_on_new_exercise() {
        let mut c = controller();
        let mut rng = ScriptedRandom::new().floats(&[0.9, 0.1]).ints(&[2]);
        c.on_answer_submitted(&mut rng);
        let active = c.on_new_exercise(1);
        assert_eq!(active, Some(Effect { mode: Mode::Shuffle, remaining: 2 }));
        assert_eq!(c.current_mode(), Some(Mode::Shuffle));
        assert_eq!(c.state().pending, None);
    }

    #[test]
    fn reads_do_not_consume_duration() {
        let mut c = controller();
        let mut rng = ScriptedRandom::new().floats(&[0.1, 0.9]).ints(&[2]);
        c.on_answer_submitted(&mut rng);
        c.on_new_exercise(1);
        for _ in 0..10 {
            assert_eq!(c.current_mode(), Some(Mode::Hide));
            let _ = c.state();
        }
        assert_eq!(c.state().active.map(|e| e.remaining), Some(2));
    }

    // ── Carry-forward ──

    #[test]
    fn carry_forward_copies_decremented_effect_without_rolling() {
        let mut c = controller();
        let mut rng = ScriptedRandom::new().floats(&[0.9, 0.1]).ints(&[3]);
        c.on_answer_submitted(&mut rng);
        c.on_new_exercise(1);
        let draws_before = rng.float_draws;

        let d = c.on_answer_submitted(&mut rng);
        let expected = Effect { mode: Mode::Shuffle, remaining: 2 };
        assert_eq!(d, Decision::CarriedForward(expected));
        assert_eq!(c.state().pending, Some(expected));
        assert_eq!(rng.float_draws, draws_before, "no Bernoulli trial on carry-forward");
    }

    #[test]
    fn effect_expires_then_rolls_fresh() {
        let mut c = controller();
        let mut rng = ScriptedRandom::new()
            .floats(&[0.1, 0.9]) // hide
            .ints(&[1])
            .floats(&[0.9, 0.9]); // calm after expiry
        c.on_answer_submitted(&mut rng);
        c.on_new_exercise(1);
        assert_eq!(c.current_mode(), Some(Mode::Hide));

        assert_eq!(c.on_answer_submitted(&mut rng), Decision::Calm);
        assert_eq!(c.state().active, None);
        c.on_new_exercise(2);
        assert_eq!(c.current_mode(), None);
    }

    #[test]
    fn effect_spans_exactly_its_duration() {
        let mut c = controller();
        let mut rng = ScriptedRandom::new()
            .floats(&[0.9, 0.0])
            .ints(&[3])
            .floats(&[0.9, 0.9]);
        c.on_answer_submitted(&mut rng); // exercise 0 answered, shuffle x3 queued
        let mut shuffled = 0;
        for i in 1..=5 {
            c.on_new_exercise(i);
            if c.current_mode() == Some(Mode::Shuffle) { shuffled += 1; }
            if rng.floats.is_empty() { rng = rng.floats(&[0.9, 0.9]); }
            c.on_answer_submitted(&mut rng);
        }
        assert_eq!(shuffled, 3);
    }

    // ── Disabled ──

    #[test]
    fn disabled_never_draws_and_stays_clear() {
        let mut c = DestabilizationController::new(DestabilizeSettings::disabled());
        let mut rng = ScriptedRandom::new();
        for i in 0..20 {
            assert_eq!(c.on_answer_submitted(&mut rng), Decision::Disabled);
            assert_eq!(c.on_new_exercise(i), None);
            assert_eq!(c.current_mode(), None);
        }
        assert_eq!(rng.float_draws, 0);
    }

    #[test]
    fn disabling_mid_session_clears_both_slots() {
        let mut c = controller();
        let mut rng = ScriptedRandom::new().floats(&[0.0, 0.9]).ints(&[2]);
        c.on_answer_submitted(&mut rng);
        c.set_enabled(false);
        assert!(c.state().is_clear());
        assert_eq!(c.on_new_exercise(1), None);
    }

    // ── Invariant under random play ──

    #[test]
    fn slots_never_both_set_after_new_exercise() {
        let settings = DestabilizeSettings::new(true, 0.5, (1, 2), 0.5, (1, 3)).unwrap();
        for seed in 0..50 {
            let mut c = DestabilizationController::new(settings);
            let mut rng = RngSource::seeded(seed);
            for i in 0..40 {
                c.on_answer_submitted(&mut rng);
                c.on_new_exercise(i + 1);
                let s = c.state();
                assert!(!(s.active.is_some() && s.pending.is_some()));
                if let Some(a) = s.active {
                    assert!(a.remaining >= 1);
                }
            }
        }
    }
}
