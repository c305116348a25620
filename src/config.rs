use ini::Ini;
use log::{info, warn};
use std::path::Path;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex, PoisonError};
use thiserror::Error;

use crate::game::chart::ChartParams;
use crate::game::judgment::JudgeWindows;
use crate::game::life::Tuning;

pub const CONFIG_PATH: &str = "rhythmdrill.ini";

pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_COUNT_IN_BEATS: f64 = 4.0;
pub const DEFAULT_END_GRACE_BEATS: f64 = 2.0;
pub const DEFAULT_TICK_HZ: u32 = 60;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("bpm must be a positive number, got {0}")]
    InvalidBpm(f64),
    #[error("transport epoch must be finite, got {0}")]
    InvalidEpoch(f64),
    #[error("chart length must be a positive number of beats within the grid limit, got {0}")]
    InvalidLength(f64),
    #[error("density must be within [0, 1], got {0}")]
    DensityOutOfRange(f64),
    #[error("syncopation skip must be within [0, 1], got {0}")]
    SyncopationOutOfRange(f64),
    #[error("judge windows must satisfy 0 < perfect ({perfect}) <= great ({great}) <= hit ({hit})")]
    WindowOrder { perfect: f64, great: f64, hit: f64 },
    #[error("points must strictly decrease: perfect={perfect}, great={great}, good={good}")]
    PointsNotDecreasing { perfect: u32, great: u32, good: u32 },
    #[error("hit recovery and whiff penalty must not be negative")]
    NegativeHealthDelta,
    #[error("miss penalty ({miss}) must exceed whiff penalty ({whiff})")]
    PenaltyOrder { miss: i32, whiff: i32 },
    #[error("{name} must be a non-negative number of beats, got {value}")]
    InvalidBeats { name: &'static str, value: f64 },
    #[error("tick rate must be at least 1 Hz")]
    InvalidTickRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

/// Everything a session needs at runtime. The game loop reads it through the
/// session on every tick, never from a copy taken when the loop started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub bpm: f64,
    pub windows: JudgeWindows,
    pub tuning: Tuning,
    /// Lead-in before beat 0, so the first note is never judged before the
    /// player can react.
    pub count_in_beats: f64,
    /// Beats after the last note before the session is forced to finish.
    pub end_grace_beats: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            windows: JudgeWindows::default(),
            tuning: Tuning::default(),
            count_in_beats: DEFAULT_COUNT_IN_BEATS,
            end_grace_beats: DEFAULT_END_GRACE_BEATS,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(ConfigError::InvalidBpm(self.bpm));
        }
        self.windows.validate()?;
        self.tuning.validate()?;
        for (name, value) in [
            ("count-in", self.count_in_beats),
            ("end grace", self.end_grace_beats),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidBeats { name, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub log_level: LogLevel,
    /// Drive the headless run off the wall clock instead of simulated time.
    pub realtime: bool,
    pub tick_hz: u32,
    pub chart: ChartParams,
    /// Fixed chart seed; `None` draws a fresh one per run.
    pub seed: Option<u64>,
    pub session: SessionConfig,
    /// Uniform +/- jitter applied to autoplay inputs, in beats.
    pub autoplay_jitter_beats: f64,
    /// Probability that autoplay sits a note out.
    pub autoplay_skip: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            realtime: false,
            tick_hz: DEFAULT_TICK_HZ,
            chart: ChartParams::default(),
            seed: None,
            session: SessionConfig::default(),
            autoplay_jitter_beats: 0.05,
            autoplay_skip: 0.0,
        }
    }
}

impl Config {
    /// Fails fast on anything that would make a session meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chart.validate()?;
        self.session.validate()?;
        if self.tick_hz == 0 {
            return Err(ConfigError::InvalidTickRate);
        }
        if !self.autoplay_jitter_beats.is_finite() || self.autoplay_jitter_beats < 0.0 {
            return Err(ConfigError::InvalidBeats {
                name: "autoplay jitter",
                value: self.autoplay_jitter_beats,
            });
        }
        if !(0.0..=1.0).contains(&self.autoplay_skip) {
            return Err(ConfigError::DensityOutOfRange(self.autoplay_skip));
        }
        Ok(())
    }

    /// Populates a config from INI contents, keeping defaults for any key that
    /// is missing or does not parse. Validation is left to the caller.
    pub fn from_ini(conf: &Ini) -> Self {
        let d = Self::default();
        let chart = ChartParams {
            length_beats: read(conf, "Chart", "LengthBeats").unwrap_or(d.chart.length_beats),
            density: read(conf, "Chart", "Density").unwrap_or(d.chart.density),
            syncopated: read_bool(conf, "Chart", "Syncopated").unwrap_or(d.chart.syncopated),
            syncopation_skip: read(conf, "Chart", "SyncopationSkip")
                .unwrap_or(d.chart.syncopation_skip),
        };
        let windows = JudgeWindows {
            hit_window: read(conf, "Judge", "HitWindow").unwrap_or(d.session.windows.hit_window),
            perfect_window: read(conf, "Judge", "PerfectWindow")
                .unwrap_or(d.session.windows.perfect_window),
            great_window: read(conf, "Judge", "GreatWindow")
                .unwrap_or(d.session.windows.great_window),
        };
        let t = d.session.tuning;
        let tuning = Tuning {
            perfect_points: read(conf, "Score", "PerfectPoints").unwrap_or(t.perfect_points),
            great_points: read(conf, "Score", "GreatPoints").unwrap_or(t.great_points),
            good_points: read(conf, "Score", "GoodPoints").unwrap_or(t.good_points),
            combo_bonus_step: read(conf, "Score", "ComboBonusStep").unwrap_or(t.combo_bonus_step),
            combo_bonus_points: read(conf, "Score", "ComboBonusPoints")
                .unwrap_or(t.combo_bonus_points),
            combo_bonus_cap: read(conf, "Score", "ComboBonusCap").unwrap_or(t.combo_bonus_cap),
            hit_recovery: read(conf, "Life", "HitRecovery").unwrap_or(t.hit_recovery),
            miss_penalty: read(conf, "Life", "MissPenalty").unwrap_or(t.miss_penalty),
            whiff_penalty: read(conf, "Life", "WhiffPenalty").unwrap_or(t.whiff_penalty),
        };
        Self {
            log_level: conf
                .get_from(Some("Options"), "LogLevel")
                .and_then(|v| LogLevel::from_str(v).ok())
                .unwrap_or(d.log_level),
            realtime: read_bool(conf, "Options", "Realtime").unwrap_or(d.realtime),
            tick_hz: read(conf, "Options", "TickHz").unwrap_or(d.tick_hz),
            chart,
            seed: read(conf, "Chart", "Seed"),
            session: SessionConfig {
                bpm: read(conf, "Chart", "Bpm").unwrap_or(d.session.bpm),
                windows,
                tuning,
                count_in_beats: read(conf, "Session", "CountInBeats")
                    .unwrap_or(d.session.count_in_beats),
                end_grace_beats: read(conf, "Session", "EndGraceBeats")
                    .unwrap_or(d.session.end_grace_beats),
            },
            autoplay_jitter_beats: read(conf, "Autoplay", "JitterBeats")
                .unwrap_or(d.autoplay_jitter_beats),
            autoplay_skip: read(conf, "Autoplay", "Skip").unwrap_or(d.autoplay_skip),
        }
    }

    pub fn to_ini(&self) -> Ini {
        let mut conf = Ini::new();
        conf.with_section(Some("Options"))
            .set("LogLevel", self.log_level.as_str())
            .set("Realtime", bool_str(self.realtime))
            .set("TickHz", self.tick_hz.to_string());
        conf.with_section(Some("Chart"))
            .set("LengthBeats", self.chart.length_beats.to_string())
            .set("Bpm", self.session.bpm.to_string())
            .set("Density", self.chart.density.to_string())
            .set("Syncopated", bool_str(self.chart.syncopated))
            .set("SyncopationSkip", self.chart.syncopation_skip.to_string())
            .set("Seed", self.seed.map(|s| s.to_string()).unwrap_or_default());
        let w = &self.session.windows;
        conf.with_section(Some("Judge"))
            .set("HitWindow", w.hit_window.to_string())
            .set("PerfectWindow", w.perfect_window.to_string())
            .set("GreatWindow", w.great_window.to_string());
        let t = &self.session.tuning;
        conf.with_section(Some("Score"))
            .set("PerfectPoints", t.perfect_points.to_string())
            .set("GreatPoints", t.great_points.to_string())
            .set("GoodPoints", t.good_points.to_string())
            .set("ComboBonusStep", t.combo_bonus_step.to_string())
            .set("ComboBonusPoints", t.combo_bonus_points.to_string())
            .set("ComboBonusCap", t.combo_bonus_cap.to_string());
        conf.with_section(Some("Life"))
            .set("HitRecovery", t.hit_recovery.to_string())
            .set("MissPenalty", t.miss_penalty.to_string())
            .set("WhiffPenalty", t.whiff_penalty.to_string());
        conf.with_section(Some("Session"))
            .set("CountInBeats", self.session.count_in_beats.to_string())
            .set("EndGraceBeats", self.session.end_grace_beats.to_string());
        conf.with_section(Some("Autoplay"))
            .set("JitterBeats", self.autoplay_jitter_beats.to_string())
            .set("Skip", self.autoplay_skip.to_string());
        conf
    }
}

#[inline(always)]
const fn bool_str(v: bool) -> &'static str {
    if v { "1" } else { "0" }
}

fn read<T: FromStr>(conf: &Ini, section: &str, key: &str) -> Option<T> {
    conf.get_from(Some(section), key)
        .and_then(|v| v.trim().parse::<T>().ok())
}

fn read_bool(conf: &Ini, section: &str, key: &str) -> Option<bool> {
    let v = conf.get_from(Some(section), key)?.trim();
    if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") || v.eq_ignore_ascii_case("on") {
        Some(true)
    } else if v.eq_ignore_ascii_case("false")
        || v.eq_ignore_ascii_case("no")
        || v.eq_ignore_ascii_case("off")
    {
        Some(false)
    } else {
        v.parse::<u8>().ok().map(|n| n != 0)
    }
}

// Global configuration instance.
static CONFIG: LazyLock<Mutex<Config>> = LazyLock::new(|| Mutex::new(Config::default()));

fn create_default_config_file(path: &Path) -> Result<(), std::io::Error> {
    info!("'{}' not found, creating with default values.", path.display());
    Config::default().to_ini().write_to_file(path)
}

/// Loads `path` into the global config, creating it with defaults first if
/// it does not exist. Unreadable files fall back to defaults.
pub fn load<P: AsRef<Path>>(path: P) {
    let path = path.as_ref();
    if !path.exists()
        && let Err(e) = create_default_config_file(path)
    {
        warn!("Failed to create default config file: {e}");
    }

    let cfg = match Ini::load_from_file(path) {
        Ok(conf) => {
            info!("Loaded configuration from '{}'.", path.display());
            Config::from_ini(&conf)
        }
        Err(e) => {
            warn!("Failed to load '{}': {e}. Using default values.", path.display());
            Config::default()
        }
    };
    *CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = cfg;
}

pub fn get() -> Config {
    *CONFIG.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError, LogLevel, SessionConfig};
    use ini::Ini;

    #[test]
    fn missing_keys_keep_defaults() {
        let conf = Ini::load_from_str("[Chart]\nBpm=90\n").unwrap();
        let cfg = Config::from_ini(&conf);
        assert_eq!(cfg.session.bpm, 90.0);
        assert_eq!(cfg.chart, Config::default().chart);
        assert_eq!(cfg.session.windows, Config::default().session.windows);
        assert_eq!(cfg.seed, None);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn malformed_values_fall_back() {
        let conf = Ini::load_from_str(
            "[Options]\nLogLevel=loud\nRealtime=yes\n[Chart]\nDensity=lots\nSeed=42\nSyncopated=on\n",
        )
        .unwrap();
        let cfg = Config::from_ini(&conf);
        assert_eq!(cfg.log_level, LogLevel::Info);
        assert!(cfg.realtime);
        assert_eq!(cfg.chart.density, Config::default().chart.density);
        assert_eq!(cfg.seed, Some(42));
        assert!(cfg.chart.syncopated);
    }

    #[test]
    fn written_defaults_read_back() {
        let mut cfg = Config::default();
        cfg.seed = Some(7);
        cfg.log_level = LogLevel::Debug;
        let mut buf = Vec::new();
        cfg.to_ini().write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let back = Config::from_ini(&Ini::load_from_str(&text).unwrap());
        assert_eq!(back, cfg);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let conf = Ini::load_from_str("[Chart]\nBpm=0\n").unwrap();
        assert_eq!(
            Config::from_ini(&conf).validate().unwrap_err(),
            ConfigError::InvalidBpm(0.0)
        );
        let conf = Ini::load_from_str("[Chart]\nDensity=1.2\n").unwrap();
        assert_eq!(
            Config::from_ini(&conf).validate().unwrap_err(),
            ConfigError::DensityOutOfRange(1.2)
        );
        let session = SessionConfig {
            count_in_beats: -1.0,
            ..SessionConfig::default()
        };
        assert!(matches!(
            session.validate(),
            Err(ConfigError::InvalidBeats { name: "count-in", .. })
        ));
    }
}
