/// ExerciseSession: one bounded run of N exercises.
///
/// ## Phases
///
///   Loading ──begin(ok)──▶ InProgress ──last submit──▶ Finished
///      │
///      └─begin(err)──▶ Loading (ProvisioningError surfaced, no retry)
///
/// ## Submit order (InProgress)
///   1. Parse the raw keypad text (unparseable = wrong answer, not an error)
///   2. Append a `SubmissionRecord` (elapsed since the exercise became current)
///   3. Score: correct → +1; wrong → missed list
///   4. Destabilization decides what the NEXT exercise gets
///   5. Advance; past the end → Finished, otherwise activate pending effect
///      and recompute the keypad layout (the only layout recomputation)
///
/// The session exclusively owns the submission log. It is handed out once,
/// after `Finished`, for the single observation flush.

use std::time::Instant;

use tracing::{debug, info};

use crate::domain::destabilize::{
    Decision, DestabilizationController, DestabilizationState, DestabilizeSettings, Effect, Mode,
};
use crate::domain::exercise::{parse_answer, Exercise, MissedExercise, SubmissionRecord};
use crate::domain::keypad::{KeypadLayout, KeypadLayoutEngine};
use crate::domain::random::RandomSource;
use crate::error::{ProvisioningError, SessionError};
use super::event::SessionEvent;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Loading,
    InProgress,
    Finished,
}

/// What the provisioning collaborator hands over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provisioned {
    pub session_id: Option<u64>,
    pub exercises: Vec<Exercise>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub record: SubmissionRecord,
    pub decision: Decision,
    pub finished: bool,
    pub events: Vec<SessionEvent>,
}

/// Final, immutable view of a finished session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: u64,
    pub score: i32,
    pub total: usize,
    pub missed: Vec<MissedExercise>,
}

pub struct ExerciseSession {
    phase: Phase,
    session_id: Option<u64>,
    exercises: Vec<Exercise>,
    index: usize,
    score: i32,
    missed: Vec<MissedExercise>,
    log: Vec<SubmissionRecord>,
    log_taken: bool,
    exercise_started: Option<Instant>,
    destab: DestabilizationController,
    keypad: KeypadLayoutEngine,
    layout: KeypadLayout,
    rng: Box<dyn RandomSource + Send>,
}

impl ExerciseSession {
    pub fn new(settings: DestabilizeSettings, rng: Box<dyn RandomSource + Send>) -> Self {
        ExerciseSession {
            phase: Phase::Loading,
            session_id: None,
            exercises: Vec::new(),
            index: 0,
            score: 0,
            missed: Vec::new(),
            log: Vec::new(),
            log_taken: false,
            exercise_started: None,
            destab: DestabilizationController::new(settings),
            keypad: KeypadLayoutEngine::new(),
            layout: KeypadLayout::default(),
            rng,
        }
    }

    // ── Loading → InProgress ──

    pub fn begin(&mut self, provisioned: Provisioned) -> Result<Vec<SessionEvent>, ProvisioningError> {
        self.begin_at(provisioned, Instant::now())
    }

    pub fn begin_at(
        &mut self,
        provisioned: Provisioned,
        now: Instant,
    ) -> Result<Vec<SessionEvent>, ProvisioningError> {
        // A rejected batch still discards the previous session.
        self.restart();
        let session_id = provisioned.session_id.ok_or(ProvisioningError::MissingSessionId)?;
        if provisioned.exercises.is_empty() {
            return Err(ProvisioningError::EmptyExerciseList);
        }

        self.session_id = Some(session_id);
        self.exercises = provisioned.exercises;
        self.phase = Phase::InProgress;
        info!(session_id, total = self.exercises.len(), "session started");

        let mut events = Vec::new();
        self.enter_exercise(0, now, &mut events);
        Ok(events)
    }

    /// Back to `Loading` with a clean slate (destabilization included).
    pub fn restart(&mut self) {
        self.phase = Phase::Loading;
        self.session_id = None;
        self.exercises.clear();
        self.index = 0;
        self.score = 0;
        self.missed.clear();
        self.log.clear();
        self.log_taken = false;
        self.exercise_started = None;
        self.destab.reset();
        self.layout = KeypadLayout::default();
    }

    // ── Reads ──

    pub fn phase(&self) -> Phase { self.phase }
    pub fn session_id(&self) -> Option<u64> { self.session_id }
    pub fn score(&self) -> i32 { self.score }
    pub fn total(&self) -> usize { self.exercises.len() }
    pub fn index(&self) -> usize { self.index }
    pub fn missed(&self) -> &[MissedExercise] { &self.missed }
    pub fn submissions(&self) -> &[SubmissionRecord] { &self.log }

    /// The exercise being answered. `None` outside `InProgress`.
    pub fn current_exercise(&self) -> Option<&Exercise> {
        if self.phase != Phase::InProgress { return None; }
        self.exercises.get(self.index)
    }

    /// Keypad for the current exercise; fixed until the next transition.
    pub fn layout(&self) -> &KeypadLayout {
        &self.layout
    }

    pub fn current_mode(&self) -> Option<Mode> {
        self.destab.current_mode()
    }

    pub fn destabilization(&self) -> DestabilizationState {
        self.destab.state()
    }

    /// When the current exercise became current (per-exercise timer).
    pub fn exercise_started(&self) -> Option<Instant> {
        self.exercise_started
    }

    pub fn summary(&self) -> Option<SessionSummary> {
        if self.phase != Phase::Finished { return None; }
        Some(SessionSummary {
            session_id: self.session_id?,
            score: self.score,
            total: self.exercises.len(),
            missed: self.missed.clone(),
        })
    }

    // ── Submit ──

    pub fn submit(&mut self, raw_input: &str) -> Result<SubmissionOutcome, SessionError> {
        self.submit_at(raw_input, Instant::now())
    }

    pub fn submit_at(&mut self, raw_input: &str, now: Instant) -> Result<SubmissionOutcome, SessionError> {
        match self.phase {
            Phase::Loading => return Err(SessionError::NotStarted),
            Phase::Finished => return Err(SessionError::AlreadyFinished),
            Phase::InProgress => {}
        }
        let exercise = self.exercises.get(self.index).ok_or(SessionError::AlreadyFinished)?;

        let proposed = parse_answer(raw_input);
        let is_correct = exercise.is_solved_by(proposed);
        let elapsed = self
            .exercise_started
            .map(|t| now.saturating_duration_since(t).as_secs_f64().round() as u64)
            .unwrap_or(0);

        let record = SubmissionRecord {
            exercise_id: exercise.id,
            proposed_answer: proposed,
            elapsed_seconds: elapsed,
            is_correct,
        };
        self.log.push(record.clone());

        if is_correct {
            self.score += 1;
        } else {
            self.missed.push(MissedExercise::from_exercise(exercise, proposed));
        }

        let mut events = vec![SessionEvent::AnswerScored { exercise_id: record.exercise_id, correct: is_correct }];

        let decision = self.destab.on_answer_submitted(self.rng.as_mut());
        match decision {
            Decision::CarriedForward(Effect { mode, remaining }) => {
                events.push(SessionEvent::EffectQueued { mode, remaining, carried: true });
            }
            Decision::Rolled(Effect { mode, remaining }) => {
                events.push(SessionEvent::EffectQueued { mode, remaining, carried: false });
            }
            Decision::Disabled | Decision::Calm => {}
        }

        let next = self.index + 1;
        let finished = next >= self.exercises.len();
        if finished {
            self.index = self.exercises.len();
            self.phase = Phase::Finished;
            self.exercise_started = None;
            info!(
                session_id = self.session_id,
                score = self.score,
                total = self.exercises.len(),
                missed = self.missed.len(),
                "session finished"
            );
            events.push(SessionEvent::SessionFinished { score: self.score, total: self.exercises.len() });
        } else {
            self.enter_exercise(next, now, &mut events);
        }

        Ok(SubmissionOutcome { record, decision, finished, events })
    }

    /// Hand out the submission log for the one-and-only flush.
    /// `None` before `Finished` or once it has been taken.
    pub fn take_submission_log(&mut self) -> Option<Vec<SubmissionRecord>> {
        if self.phase != Phase::Finished || self.log_taken { return None; }
        self.log_taken = true;
        Some(self.log.clone())
    }

    pub fn log_taken(&self) -> bool {
        self.log_taken
    }

    fn enter_exercise(&mut self, index: usize, now: Instant, events: &mut Vec<SessionEvent>) {
        self.index = index;
        self.exercise_started = Some(now);
        let active = self.destab.on_new_exercise(index);
        self.layout = self.keypad.layout(active.map(|e| e.mode), self.rng.as_mut());
        debug!(index, mode = ?active.map(|e| e.mode), "exercise started");

        events.push(SessionEvent::ExerciseStarted { index, total: self.exercises.len() });
        if let Some(Effect { mode, remaining }) = active {
            events.push(SessionEvent::EffectActivated { mode, remaining });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::exercise::Operation;
    use crate::domain::keypad::BASE_ORDER;
    use crate::domain::random::{RngSource, ScriptedRandom};

    fn three_exercises() -> Provisioned {
        Provisioned {
            session_id: Some(17),
            exercises: vec![
                Exercise::new(1, 2, 2, Operation::Addition),
                Exercise::new(2, 5, 3, Operation::Subtraction),
                Exercise::new(3, 3, 3, Operation::Multiplication),
            ],
        }
    }

    fn calm_session() -> ExerciseSession {
        ExerciseSession::new(DestabilizeSettings::disabled(), Box::new(ScriptedRandom::new()))
    }

    #[test]
    fn end_to_end_three_exercises() {
        let mut s = calm_session();
        s.begin(three_exercises()).unwrap();
        assert_eq!(s.phase(), Phase::InProgress);

        assert!(!s.submit("4").unwrap().finished);
        assert!(!s.submit("1").unwrap().finished);
        let last = s.submit("9").unwrap();
        assert!(last.finished);
        assert_eq!(s.phase(), Phase::Finished);

        let summary = s.summary().unwrap();
        assert_eq!(summary.score, 2);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.missed.len(), 1);
        let m = &summary.missed[0];
        assert_eq!((m.expected, m.given), (2, Some(1)));
        assert_eq!((m.operator_left, m.operator_right), (5, 3));
    }

    #[test]
    fn empty_list_or_missing_id_stays_loading() {
        let mut s = calm_session();
        let err = s.begin(Provisioned { session_id: Some(1), exercises: vec![] }).unwrap_err();
        assert_eq!(err, ProvisioningError::EmptyExerciseList);
        assert_eq!(s.phase(), Phase::Loading);

        let mut p = three_exercises();
        p.session_id = None;
        assert_eq!(s.begin(p).unwrap_err(), ProvisioningError::MissingSessionId);
        assert_eq!(s.phase(), Phase::Loading);
        assert_eq!(s.submit("4").unwrap_err(), SessionError::NotStarted);
        assert!(s.current_exercise().is_none());
    }

    #[test]
    fn submit_after_finish_is_a_no_op() {
        let mut s = calm_session();
        s.begin(three_exercises()).unwrap();
        for a in ["4", "0", "9"] { s.submit(a).unwrap(); }
        let before = (s.score(), s.missed().to_vec(), s.submissions().len());

        assert_eq!(s.submit("4").unwrap_err(), SessionError::AlreadyFinished);
        assert_eq!(s.submit("garbage").unwrap_err(), SessionError::AlreadyFinished);
        assert_eq!((s.score(), s.missed().to_vec(), s.submissions().len()), before);
    }

    #[test]
    fn unparseable_answer_is_wrong_not_an_error() {
        let mut s = calm_session();
        s.begin(three_exercises()).unwrap();
        let out = s.submit("").unwrap();
        assert!(!out.record.is_correct);
        assert_eq!(out.record.proposed_answer, None);
        assert_eq!(s.missed()[0].given, None);
        assert_eq!(s.score(), 0);
        assert_eq!(s.index(), 1);
    }

    #[test]
    fn records_elapsed_seconds_per_exercise() {
        let mut s = calm_session();
        let t0 = Instant::now();
        s.begin_at(three_exercises(), t0).unwrap();
        let t1 = t0 + Duration::from_millis(2600);
        s.submit_at("4", t1).unwrap();
        let t2 = t1 + Duration::from_millis(400);
        s.submit_at("2", t2).unwrap();
        let log = s.submissions();
        assert_eq!(log[0].elapsed_seconds, 3);
        assert_eq!(log[1].elapsed_seconds, 0);
    }

    #[test]
    fn submission_log_is_handed_out_once_after_finish() {
        let mut s = calm_session();
        s.begin(three_exercises()).unwrap();
        s.submit("4").unwrap();
        assert!(s.take_submission_log().is_none(), "not before Finished");
        s.submit("2").unwrap();
        s.submit("9").unwrap();
        let log = s.take_submission_log().unwrap();
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|r| r.is_correct));
        assert!(s.take_submission_log().is_none());
    }

    #[test]
    fn disabled_destabilization_keeps_mode_none_throughout() {
        let mut s = ExerciseSession::new(DestabilizeSettings::disabled(), Box::new(RngSource::seeded(3)));
        s.begin(three_exercises()).unwrap();
        for a in ["1", "x", "9"] {
            assert_eq!(s.current_mode(), None);
            assert_eq!(s.layout().digit_order(), BASE_ORDER);
            s.submit(a).unwrap();
            assert_eq!(s.current_mode(), None);
        }
    }

    #[test]
    fn effect_queued_at_submit_applies_to_next_exercise_only() {
        let rng = ScriptedRandom::new()
            .floats(&[0.0, 0.9]) // hide fires on first submit
            .ints(&[1])
            .floats(&[0.9, 0.9]); // calm after it expires
        let mut s = ExerciseSession::new(DestabilizeSettings::default(), Box::new(rng));
        s.begin(three_exercises()).unwrap();
        assert_eq!(s.current_mode(), None);

        let out = s.submit("4").unwrap();
        assert!(out.events.contains(&SessionEvent::EffectQueued { mode: Mode::Hide, remaining: 1, carried: false }));
        assert!(out.events.contains(&SessionEvent::EffectActivated { mode: Mode::Hide, remaining: 1 }));
        assert_eq!(s.current_mode(), Some(Mode::Hide));
        assert!(s.layout().any_hidden());

        s.submit("2").unwrap();
        assert_eq!(s.current_mode(), None);
        assert!(!s.layout().any_hidden());
    }

    #[test]
    fn shuffle_layout_is_recomputed_per_exercise_not_per_read() {
        let rng = ScriptedRandom::new()
            .floats(&[0.9, 0.0])
            .ints(&[3])
            .seeds(&[101, 202]);
        let mut s = ExerciseSession::new(DestabilizeSettings::default(), Box::new(rng));
        s.begin(three_exercises()).unwrap();
        s.submit("4").unwrap();
        let first = *s.layout();
        assert_eq!(*s.layout(), first);
        assert_eq!(s.current_mode(), Some(Mode::Shuffle));

        s.submit("2").unwrap(); // carried forward, no new roll
        assert_eq!(s.current_mode(), Some(Mode::Shuffle));
        assert_eq!(first, KeypadLayoutEngine::new().shuffled(101));
        assert_eq!(*s.layout(), KeypadLayoutEngine::new().shuffled(202));
    }

    #[test]
    fn restart_clears_state_and_destabilization() {
        let rng = ScriptedRandom::new().floats(&[0.0, 0.9]).ints(&[2]);
        let mut s = ExerciseSession::new(DestabilizeSettings::default(), Box::new(rng));
        s.begin(three_exercises()).unwrap();
        s.submit("0").unwrap();
        assert!(!s.destabilization().is_clear());
        s.restart();
        assert_eq!(s.phase(), Phase::Loading);
        assert!(s.destabilization().is_clear());
        assert_eq!(s.score(), 0);
        assert!(s.missed().is_empty());
    }

    #[test]
    fn rejected_begin_after_finish_leaves_session_loading() {
        let mut s = calm_session();
        s.begin(three_exercises()).unwrap();
        for a in ["4", "2", "9"] { s.submit(a).unwrap(); }
        assert_eq!(s.phase(), Phase::Finished);

        let err = s.begin(Provisioned { session_id: None, exercises: vec![] }).unwrap_err();
        assert_eq!(err, ProvisioningError::MissingSessionId);
        assert_eq!(s.phase(), Phase::Loading);
        assert!(s.summary().is_none());
        assert!(s.take_submission_log().is_none());
        assert_eq!(s.submit("4").unwrap_err(), SessionError::NotStarted);
    }
}
