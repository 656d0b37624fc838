/// Entry point: one drill session in the terminal.
///
///   load config → provision locally → drill loop → results (+ flush)
///   → score reveal (or skip straight to its result) → persist the new lit count

mod ui;

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pixelcalc::config::EngineConfig;
use pixelcalc::domain::destabilize::Mode;
use pixelcalc::domain::keypad::{AnswerBuffer, SUBMIT_INDEX};
use pixelcalc::domain::random::RngSource;
use pixelcalc::error::LogFlushError;
use pixelcalc::sim::animator::AnimationFrame;
use pixelcalc::sim::driver::SessionDriver;
use pixelcalc::sim::event::SessionEvent;
use pixelcalc::sim::local::{FileGridStore, FileObservationLog, LocalProvisioner};
use pixelcalc::sim::ports::SessionHost;
use pixelcalc::sim::reveal::{RevealCanceller, RevealOutcome};
use pixelcalc::sim::session::{Phase, SessionSummary};
use ui::input::{action_for, InputState, PadAction};
use ui::renderer::{DrillView, Renderer, ResultsView, RevealView, Screen};

const FRAME_WAIT: Duration = Duration::from_millis(50);
const LOG_FILE: &str = "pixelcalc.log";
const LOG_ENV: &str = "PIXELCALC_LOG";

type Driver = SessionDriver<LocalProvisioner, FileObservationLog, FileGridStore>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = EngineConfig::load().context("invalid configuration")?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("cannot create data dir {}", config.data_dir.display()))?;
    init_tracing(&config.data_dir);

    let log = FileObservationLog::new(&config.data_dir);
    let grid = FileGridStore::new(&config.data_dir, config.reveal.fallback_capacity);
    let provisioner = LocalProvisioner::new(Box::new(RngSource::from_entropy()), log.next_session_id());
    let mut driver = SessionDriver::new(&config, provisioner, log, grid, Box::new(RngSource::from_entropy()));

    let mut renderer = Renderer::new();
    renderer.init().context("terminal init failed")?;
    let result = run(&mut driver, &mut renderer, &config).await;
    let cleanup = renderer.cleanup();
    result?;
    cleanup.context("terminal cleanup failed")
}

fn init_tracing(data_dir: &Path) {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let path = data_dir.join(LOG_FILE);
    match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            info!(path = %path.display(), "logging initialized");
        }
        // Writing to stderr would corrupt the alternate screen.
        Err(_) => tracing_subscriber::registry().with(env_filter).init(),
    }
}

async fn run(driver: &mut Driver, renderer: &mut Renderer, config: &EngineConfig) -> Result<()> {
    renderer.render(&Screen::Loading("Preparing exercises..."))?;
    driver.load().await.context("could not start a session")?;

    if !drill(driver, renderer).await? {
        info!("session abandoned");
        return Ok(());
    }

    let capacity = match driver.grid_mut().load() {
        Ok(state) => state.capacity,
        Err(_) => config.reveal.fallback_capacity,
    };
    let mut host = TerminalHost {
        renderer,
        capacity,
        grid_seed: config.grid_seed,
        summary: None,
        notice: None,
        last_frame: None,
        render_error: None,
    };
    driver.conclude(&mut host).await?;
    if let Some(e) = host.render_error.take() {
        return Err(e.into());
    }

    if !results(&mut host)? {
        let outcome = driver.settle().await?;
        persist(driver, &outcome);
        return Ok(());
    }

    let outcome = reveal(driver, &mut host).await?;
    persist(driver, &outcome);
    if outcome.cancelled() {
        return Ok(());
    }
    wait_for_exit(&mut host, &outcome)
}

fn persist(driver: &mut Driver, outcome: &RevealOutcome) {
    if let Err(e) = driver.grid_mut().persist(outcome.final_lit) {
        warn!("could not save grid state: {e}");
    }
}

// ── Drill ──

/// Play until the session finishes. `false` if the player quit early.
async fn drill(driver: &mut Driver, renderer: &mut Renderer) -> Result<bool> {
    let mut input = InputState::new();
    let mut answer = AnswerBuffer::new();
    let mut message: Option<String> = None;

    while driver.session().phase() == Phase::InProgress {
        let elapsed = driver.session().exercise_started().map_or(Duration::ZERO, |t| t.elapsed());
        renderer.render(&Screen::Drill(DrillView {
            session: driver.session(),
            answer: answer.as_str(),
            elapsed,
            message: message.as_deref(),
        }))?;

        let actions = input.drain_events(FRAME_WAIT)?.to_vec();
        for action in actions {
            let slot = match action {
                PadAction::Back | PadAction::Quit => return Ok(false),
                PadAction::Slot(i) => i,
            };
            let Some(key) = driver.session().layout().slot(slot).map(|s| s.key) else { continue };
            if let Some(text) = answer.press(key) {
                let outcome = driver.submit(&text)?;
                message = describe(&outcome.events);
                if outcome.finished {
                    break;
                }
            }
        }
    }
    Ok(true)
}

fn describe(events: &[SessionEvent]) -> Option<String> {
    let mut parts = Vec::new();
    for ev in events {
        match ev {
            SessionEvent::AnswerScored { correct: true, .. } => parts.push("Correct!".to_string()),
            SessionEvent::AnswerScored { correct: false, .. } => parts.push("Wrong.".to_string()),
            SessionEvent::EffectActivated { mode: Mode::Hide, .. } => parts.push("The labels fade...".to_string()),
            SessionEvent::EffectActivated { mode: Mode::Shuffle, .. } => parts.push("The keys scramble!".to_string()),
            _ => {}
        }
    }
    if parts.is_empty() { None } else { Some(parts.join(" ")) }
}

// ── Results and reveal ──

struct TerminalHost<'r> {
    renderer: &'r mut Renderer,
    capacity: u32,
    grid_seed: u64,
    summary: Option<SessionSummary>,
    notice: Option<String>,
    last_frame: Option<AnimationFrame>,
    render_error: Option<io::Error>,
}

impl TerminalHost<'_> {
    fn draw_reveal(&mut self, frame: AnimationFrame, done: bool) {
        let view = RevealView {
            lit_count: frame.lit_count,
            capacity: self.capacity,
            score_remaining: frame.score_remaining,
            grid_seed: self.grid_seed,
            done,
        };
        if let Err(e) = self.renderer.render(&Screen::Reveal(view)) {
            self.render_error.get_or_insert(e);
        }
    }
}

impl SessionHost for TerminalHost<'_> {
    fn on_session_finished(&mut self, summary: &SessionSummary) {
        self.summary = Some(summary.clone());
        let view = ResultsView { summary, notice: None };
        if let Err(e) = self.renderer.render(&Screen::Results(view)) {
            self.render_error.get_or_insert(e);
        }
    }

    fn on_grid_reveal_frame(&mut self, frame: AnimationFrame) {
        self.last_frame = Some(frame);
        self.draw_reveal(frame, false);
    }

    fn on_reveal_finished(&mut self, outcome: &RevealOutcome) {
        self.capacity = outcome.capacity;
    }

    fn on_log_flush_failed(&mut self, error: &LogFlushError) {
        self.notice = Some(format!("Results were not saved: {error}"));
    }
}

/// Show the results screen. `true` if the player asked for the reveal.
fn results(host: &mut TerminalHost<'_>) -> Result<bool> {
    let Some(summary) = host.summary.clone() else { return Ok(false) };
    let mut input = InputState::new();
    loop {
        let view = ResultsView { summary: &summary, notice: host.notice.as_deref() };
        host.renderer.render(&Screen::Results(view))?;
        for action in input.drain_events(FRAME_WAIT)? {
            match action {
                PadAction::Slot(i) if *i == SUBMIT_INDEX => return Ok(true),
                PadAction::Back | PadAction::Quit => return Ok(false),
                PadAction::Slot(_) => {}
            }
        }
    }
}

async fn reveal(driver: &mut Driver, host: &mut TerminalHost<'_>) -> Result<RevealOutcome> {
    let canceller = driver.reveal_canceller();
    let stop = Arc::new(AtomicBool::new(false));
    let watcher = tokio::task::spawn_blocking({
        let stop = stop.clone();
        move || watch_for_escape(canceller, stop)
    });

    let outcome = driver.reveal(host).await;
    stop.store(true, Ordering::Relaxed);
    let watched = watcher.await;
    let outcome = outcome?;

    watched.context("input watcher panicked")??;
    if let Some(e) = host.render_error.take() {
        return Err(e.into());
    }
    Ok(outcome)
}

/// Blocking poll loop: Esc (or Ctrl+C) cancels the running reveal.
fn watch_for_escape(canceller: RevealCanceller, stop: Arc<AtomicBool>) -> io::Result<()> {
    while !stop.load(Ordering::Relaxed) {
        if event::poll(FRAME_WAIT)? {
            if let Event::Key(key) = event::read()? {
                if matches!(action_for(&key), Some(PadAction::Back | PadAction::Quit)) {
                    canceller.cancel();
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

fn wait_for_exit(host: &mut TerminalHost<'_>, outcome: &RevealOutcome) -> Result<()> {
    let frame = host.last_frame.unwrap_or(AnimationFrame { lit_count: outcome.final_lit, score_remaining: 0 });
    host.draw_reveal(frame, true);
    if let Some(e) = host.render_error.take() {
        return Err(e.into());
    }
    let mut input = InputState::new();
    loop {
        if !input.drain_events(FRAME_WAIT)?.is_empty() {
            return Ok(());
        }
    }
}
