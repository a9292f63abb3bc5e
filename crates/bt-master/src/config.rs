use std::path::{Path, PathBuf};

use bt_ir::SongInfo;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Environment variable naming a user config file.
pub const CONFIG_ENV: &str = "BUZZTRAX_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    song: SongConfig,
    #[serde(default)]
    pattern: PatternConfig,
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    edit: EditConfig,
}

#[derive(Deserialize, Default, Debug, Clone)]
struct SongConfig {
    bpm: Option<u32>,
    ticks_per_beat: Option<u32>,
    subticks_per_tick: Option<u32>,
    length: Option<usize>,
}

#[derive(Deserialize, Default, Debug, Clone)]
struct PatternConfig {
    default_length: Option<usize>,
}

#[derive(Deserialize, Default, Debug, Clone)]
struct EngineConfig {
    diagnostics_capacity: Option<usize>,
}

#[derive(Deserialize, Default, Debug, Clone)]
struct EditConfig {
    random_seed: Option<u64>,
}

/// Bundled defaults, optionally overridden by a user file.
#[derive(Debug, Clone)]
pub struct Config {
    song: SongConfig,
    pattern: PatternConfig,
    engine: EngineConfig,
    edit: EditConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_base(embedded())
    }
}

fn embedded() -> ConfigFile {
    match toml::from_str(DEFAULT_CONFIG) {
        Ok(base) => base,
        Err(e) => {
            log::error!(target: "config", "bundled config.toml is malformed: {}", e);
            ConfigFile::default()
        }
    }
}

impl Config {
    fn from_base(base: ConfigFile) -> Self {
        Config {
            song: base.song,
            pattern: base.pattern,
            engine: base.engine,
            edit: base.edit,
        }
    }

    /// Bundled defaults merged with the file named by `BUZZTRAX_CONFIG`, if
    /// set. A bad user file is logged and ignored.
    pub fn load() -> Self {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_with(Some(Path::new(&path))),
            None => Self::load_with(None),
        }
    }

    /// Like [`Config::load`] with an explicit user file.
    pub fn load_with(user: Option<&Path>) -> Self {
        let Some(path) = user else {
            return Self::default();
        };
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(target: "config", "ignoring config: {}", e);
                Self::default()
            }
        }
    }

    /// Bundled defaults merged with `path`; errors are returned.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Bundled defaults merged with TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        let user: ConfigFile = toml::from_str(text)?;
        let mut base = embedded();
        merge_song(&mut base.song, user.song);
        if user.pattern.default_length.is_some() {
            base.pattern.default_length = user.pattern.default_length;
        }
        if user.engine.diagnostics_capacity.is_some() {
            base.engine.diagnostics_capacity = user.engine.diagnostics_capacity;
        }
        if user.edit.random_seed.is_some() {
            base.edit.random_seed = user.edit.random_seed;
        }
        Ok(Self::from_base(base))
    }

    /// Tempo for new songs. Zero values fall back to the defaults.
    pub fn song_info(&self) -> SongInfo {
        let fallback = SongInfo::default();
        let nonzero = |v: Option<u32>, d: u32| v.filter(|v| *v > 0).unwrap_or(d);
        SongInfo {
            bpm: nonzero(self.song.bpm, fallback.bpm),
            ticks_per_beat: nonzero(self.song.ticks_per_beat, fallback.ticks_per_beat),
            subticks_per_tick: nonzero(self.song.subticks_per_tick, fallback.subticks_per_tick),
        }
    }

    /// Sequence length of new songs, in ticks.
    pub fn song_length(&self) -> usize {
        self.song.length.unwrap_or(16)
    }

    pub fn pattern_length(&self) -> usize {
        self.pattern.default_length.unwrap_or(16).max(1)
    }

    pub fn diagnostics_capacity(&self) -> usize {
        self.engine.diagnostics_capacity.unwrap_or(256).max(1)
    }

    /// Seed for the edit RNG; `None` seeds from entropy.
    pub fn random_seed(&self) -> Option<u64> {
        self.edit.random_seed
    }
}

fn merge_song(base: &mut SongConfig, user: SongConfig) {
    if user.bpm.is_some() {
        base.bpm = user.bpm;
    }
    if user.ticks_per_beat.is_some() {
        base.ticks_per_beat = user.ticks_per_beat;
    }
    if user.subticks_per_tick.is_some() {
        base.subticks_per_tick = user.subticks_per_tick;
    }
    if user.length.is_some() {
        base.length = user.length;
    }
}
