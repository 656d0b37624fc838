/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// A missing file or missing keys fall back to defaults. A file that does
/// not parse, or a value that fails validation, is a hard `ConfigError`:
/// probabilities and duration ranges are never silently clamped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::destabilize::DestabilizeSettings;
use crate::domain::grid;
use crate::error::ConfigError;
use crate::sim::reveal::RevealSettings;

const CONFIG_FILE: &str = "config.toml";

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub destabilize: DestabilizeSettings,
    pub reveal: RevealSettings,
    pub grid_seed: u64,
    pub volume: u32,
    pub data_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            destabilize: DestabilizeSettings::default(),
            reveal: RevealSettings::default(),
            grid_seed: default_grid_seed(),
            volume: default_volume(),
            data_dir: PathBuf::from(default_data_dir()),
        }
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    #[serde(default)]
    destabilization: TomlDestabilization,
    #[serde(default)]
    reveal: TomlReveal,
    #[serde(default)]
    session: TomlSession,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TomlDestabilization {
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default = "default_hide_chance")]
    hide_chance: f64,
    #[serde(default = "default_hide_min")]
    hide_min: u32,
    #[serde(default = "default_hide_max")]
    hide_max: u32,
    #[serde(default = "default_shuffle_chance")]
    shuffle_chance: f64,
    #[serde(default = "default_shuffle_min")]
    shuffle_min: u32,
    #[serde(default = "default_shuffle_max")]
    shuffle_max: u32,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TomlReveal {
    #[serde(default = "default_step_interval")]
    step_interval_ms: u64,
    #[serde(default = "default_max_steps")]
    max_steps: u32,
    #[serde(default = "default_score_cap")]
    score_cap: u32,
    #[serde(default = "default_grid_capacity")]
    grid_capacity: u32,
    #[serde(default = "default_grid_seed")]
    grid_seed: u64,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TomlSession {
    #[serde(default = "default_volume")]
    volume: u32,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TomlGeneral {
    #[serde(default = "default_data_dir")]
    data_dir: String,
}

// ── Defaults ──

fn default_enabled() -> bool { true }
fn default_hide_chance() -> f64 { DestabilizeSettings::DEFAULT_HIDE_CHANCE }
fn default_hide_min() -> u32 { 1 }
fn default_hide_max() -> u32 { 2 }
fn default_shuffle_chance() -> f64 { DestabilizeSettings::DEFAULT_SHUFFLE_CHANCE }
fn default_shuffle_min() -> u32 { 1 }
fn default_shuffle_max() -> u32 { 3 }
fn default_step_interval() -> u64 { 16 }   // ~60 fps
fn default_max_steps() -> u32 { 30 }
fn default_score_cap() -> u32 { 30 }       // keeps the reveal under ~0.5s
fn default_grid_capacity() -> u32 { grid::DEFAULT_CAPACITY }
fn default_grid_seed() -> u64 { grid::DEFAULT_SEED }
fn default_volume() -> u32 { 10 }
fn default_data_dir() -> String { ".".into() }

impl Default for TomlDestabilization {
    fn default() -> Self {
        TomlDestabilization {
            enabled: default_enabled(),
            hide_chance: default_hide_chance(),
            hide_min: default_hide_min(),
            hide_max: default_hide_max(),
            shuffle_chance: default_shuffle_chance(),
            shuffle_min: default_shuffle_min(),
            shuffle_max: default_shuffle_max(),
        }
    }
}

impl Default for TomlReveal {
    fn default() -> Self {
        TomlReveal {
            step_interval_ms: default_step_interval(),
            max_steps: default_max_steps(),
            score_cap: default_score_cap(),
            grid_capacity: default_grid_capacity(),
            grid_seed: default_grid_seed(),
        }
    }
}

impl Default for TomlSession {
    fn default() -> Self {
        TomlSession { volume: default_volume() }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral { data_dir: default_data_dir() }
    }
}

// ── Validation ──

impl TomlConfig {
    fn resolve(self, search_dirs: &[PathBuf]) -> Result<EngineConfig, ConfigError> {
        let d = &self.destabilization;
        let destabilize = DestabilizeSettings::new(
            d.enabled,
            d.hide_chance,
            (d.hide_min, d.hide_max),
            d.shuffle_chance,
            (d.shuffle_min, d.shuffle_max),
        )?;

        let r = &self.reveal;
        if r.step_interval_ms == 0 {
            return Err(ConfigError::InvalidReveal { field: "step_interval_ms", reason: "must be greater than 0" });
        }
        if r.max_steps == 0 {
            return Err(ConfigError::InvalidReveal { field: "max_steps", reason: "must be at least 1" });
        }
        if r.grid_capacity == 0 {
            return Err(ConfigError::InvalidReveal { field: "grid_capacity", reason: "must be greater than 0" });
        }
        if r.grid_capacity > grid::MAX_CAPACITY {
            return Err(ConfigError::InvalidReveal { field: "grid_capacity", reason: "exceeds the maximum grid size" });
        }
        if self.session.volume == 0 {
            return Err(ConfigError::ZeroVolume);
        }

        Ok(EngineConfig {
            destabilize,
            reveal: RevealSettings {
                step_interval: Duration::from_millis(r.step_interval_ms),
                max_steps: r.max_steps,
                score_cap: r.score_cap,
                fallback_capacity: r.grid_capacity,
            },
            grid_seed: r.grid_seed,
            volume: self.session.volume,
            data_dir: resolve_data_dir(&self.general.data_dir, search_dirs),
        })
    }
}

/// Absolute paths win; relative ones resolve against the first candidate
/// directory that has them, then the CWD.
fn resolve_data_dir(raw: &str, search_dirs: &[PathBuf]) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return path;
    }
    search_dirs
        .iter()
        .map(|d| d.join(raw))
        .find(|p| p.is_dir())
        .unwrap_or(path)
}

// ── Loading ──

impl EngineConfig {
    /// Load `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    pub fn load() -> Result<Self, ConfigError> {
        let search_dirs = candidate_dirs();
        match search_dirs.iter().map(|d| d.join(CONFIG_FILE)).find(|p| p.exists()) {
            Some(path) => Self::load_from(&path, &search_dirs),
            None => {
                debug!("no {CONFIG_FILE} found, using defaults");
                TomlConfig::default().resolve(&search_dirs)
            }
        }
    }

    /// Load a specific file. Relative paths inside it resolve against `search_dirs`.
    pub fn load_from(path: &Path, search_dirs: &[PathBuf]) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let cfg = toml::from_str::<TomlConfig>(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        info!(path = %path.display(), "configuration loaded");
        cfg.resolve(search_dirs)
    }

    /// Parse configuration text (no file IO; relative data dir kept as-is).
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg = toml::from_str::<TomlConfig>(text)
            .map_err(|source| ConfigError::Parse { path: PathBuf::from("<inline>"), source })?;
        cfg.resolve(&[])
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}
