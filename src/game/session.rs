use log::{debug, info};
use rustc_hash::FxHashMap;
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, SessionConfig};
use crate::game::chart::NoteChart;
use crate::game::judgment::{self, InputOutcome, JudgmentResult, Quality};
use crate::game::life::{self, MAX_HEALTH};
use crate::game::note::{NoteId, NoteStatus};
use crate::game::timing::Transport;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Idle,
    Playing,
    Finished,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    /// Chart exhausted with health left.
    Cleared,
    /// Health reached zero.
    Failed,
    /// Ended by an explicit stop.
    Stopped,
    /// The clock became unusable.
    Aborted,
}

/// Facts for rendering and audio collaborators. The core never acts on
/// presentation state itself.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum GameEvent {
    NoteResolved {
        id: NoteId,
        quality: Quality,
    },
    SessionPhaseChanged {
        phase: Phase,
        #[serde(skip_serializing_if = "Option::is_none")]
        outcome: Option<Outcome>,
    },
    StatUpdated {
        score: u64,
        combo: u32,
        health: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("session can only start from Idle (currently {0:?})")]
    NotIdle(Phase),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: Phase,
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub health: i32,
    pub whiffs: u32,
    pub outcome: Option<Outcome>,
    quality_counts: FxHashMap<Quality, u32>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            score: 0,
            combo: 0,
            max_combo: 0,
            health: MAX_HEALTH,
            whiffs: 0,
            outcome: None,
            quality_counts: FxHashMap::default(),
        }
    }
}

impl SessionState {
    pub fn count(&self, quality: Quality) -> u32 {
        self.quality_counts.get(&quality).copied().unwrap_or(0)
    }

    fn bump(&mut self, quality: Quality) {
        *self.quality_counts.entry(quality).or_insert(0) += 1;
    }
}

/// One play-through: the chart, its transport, and the score/combo/health
/// state machine. Every mutation of note status goes through here.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    state: SessionState,
    chart: Option<NoteChart>,
    transport: Option<Transport>,
    outbox: Vec<GameEvent>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            state: SessionState::default(),
            chart: None,
            transport: None,
            outbox: Vec::new(),
        })
    }

    #[inline(always)]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replaces the tuning. Windows and scoring apply from the next judgment;
    /// tempo and count-in apply from the next `start`.
    pub fn set_config(&mut self, config: SessionConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    #[inline(always)]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    #[inline(always)]
    pub const fn phase(&self) -> Phase {
        self.state.phase
    }

    #[inline(always)]
    pub const fn is_playing(&self) -> bool {
        matches!(self.state.phase, Phase::Playing)
    }

    pub const fn chart(&self) -> Option<&NoteChart> {
        self.chart.as_ref()
    }

    pub const fn transport(&self) -> Option<&Transport> {
        self.transport.as_ref()
    }

    pub fn transport_mut(&mut self) -> Option<&mut Transport> {
        self.transport.as_mut()
    }

    /// Takes every event emitted since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Idle -> Playing. Beat 0 lands `count_in_beats` after `now`.
    pub fn start(&mut self, chart: NoteChart, now: f64) -> Result<(), SessionError> {
        if self.state.phase != Phase::Idle {
            return Err(SessionError::NotIdle(self.state.phase));
        }
        let cfg = &self.config;
        let count_in_s = cfg.count_in_beats * 60.0 / cfg.bpm;
        let transport = Transport::new(now + count_in_s, cfg.bpm)?;
        info!(
            "Session start: {} notes, last at beat {:.2}, bpm {}, count-in {:.2}s",
            chart.len(),
            chart.last_time(),
            cfg.bpm,
            count_in_s
        );
        self.chart = Some(chart);
        self.transport = Some(transport);
        self.state = SessionState {
            phase: Phase::Playing,
            ..SessionState::default()
        };
        self.outbox.push(GameEvent::SessionPhaseChanged {
            phase: Phase::Playing,
            outcome: None,
        });
        self.emit_stats();
        Ok(())
    }

    /// Judges one player attempt at `beat`. `None` when not playing.
    pub fn judge(&mut self, beat: f64) -> Option<InputOutcome> {
        if !self.is_playing() {
            debug!("Ignoring input at beat {beat:.3}: session is {:?}", self.state.phase);
            return None;
        }
        let chart = self.chart.as_mut()?;
        let outcome = judgment::judge_input(chart, beat, &self.config.windows, &self.config.tuning);
        match outcome {
            InputOutcome::Hit(result) => {
                self.outbox.push(GameEvent::NoteResolved {
                    id: result.note_id,
                    quality: result.quality,
                });
                self.on_hit(&result);
            }
            InputOutcome::Whiff => self.on_whiff(),
        }
        Some(outcome)
    }

    /// Auto-misses every note whose window has passed at `beat`. Returns how
    /// many notes were missed.
    pub fn sweep(&mut self, beat: f64) -> usize {
        if !self.is_playing() {
            return 0;
        }
        let hit_window = self.config.windows.hit_window;
        let mut missed = 0;
        // One note at a time: a failing miss ends the session, and whatever
        // is still Pending is then flushed by `finish`.
        while self.is_playing()
            && let Some(chart) = self.chart.as_mut()
            && let Some(id) = judgment::sweep_next_miss(chart, beat, hit_window)
        {
            self.outbox.push(GameEvent::NoteResolved {
                id,
                quality: Quality::Miss,
            });
            self.on_miss(id);
            missed += 1;
        }
        missed
    }

    fn on_hit(&mut self, result: &JudgmentResult) {
        if !self.is_playing() {
            return;
        }
        let tuning = &self.config.tuning;
        let s = &mut self.state;
        let bonus = tuning.combo_bonus(s.combo);
        s.score = s
            .score
            .saturating_add(u64::from(result.points_awarded) + u64::from(bonus));
        s.combo = s.combo.saturating_add(1);
        s.max_combo = s.max_combo.max(s.combo);
        s.health = life::apply_health_delta(s.health, tuning.hit_recovery);
        s.bump(result.quality);
        self.emit_stats();
    }

    fn on_miss(&mut self, id: NoteId) {
        if !self.is_playing() {
            return;
        }
        debug!("Miss penalty for {id}");
        self.state.bump(Quality::Miss);
        self.apply_penalty(self.config.tuning.miss_penalty);
    }

    fn on_whiff(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.state.whiffs = self.state.whiffs.saturating_add(1);
        self.apply_penalty(self.config.tuning.whiff_penalty);
    }

    fn apply_penalty(&mut self, penalty: i32) {
        let s = &mut self.state;
        s.combo = 0;
        s.health = life::apply_health_delta(s.health, -penalty);
        self.emit_stats();
        if self.state.health == 0 {
            info!("Player has failed!");
            self.finish(Outcome::Failed);
        }
    }

    /// Terminal check, run every tick whether or not anything else happened.
    pub fn check_terminal(&mut self, beat: f64) -> Phase {
        if !self.is_playing() {
            return self.state.phase;
        }
        if self.state.health == 0 {
            self.finish(Outcome::Failed);
        } else if let Some(chart) = self.chart.as_ref()
            && beat > chart.last_time() + self.config.end_grace_beats
        {
            info!("Chart exhausted at beat {beat:.2}.");
            self.finish(Outcome::Cleared);
        }
        self.state.phase
    }

    pub fn stop(&mut self) {
        if self.is_playing() {
            info!("Session stopped.");
            self.finish(Outcome::Stopped);
        }
    }

    pub fn abort(&mut self) {
        if self.is_playing() {
            log::error!("Session aborted: clock unavailable.");
            self.finish(Outcome::Aborted);
        }
    }

    /// Back to a fresh Idle from any phase, discarding the chart.
    pub fn reset(&mut self) {
        let was = self.state.phase;
        self.state = SessionState::default();
        self.chart = None;
        self.transport = None;
        if was != Phase::Idle {
            self.outbox.push(GameEvent::SessionPhaseChanged {
                phase: Phase::Idle,
                outcome: None,
            });
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        // Notes cut off by an early end still resolve and count, without
        // further penalty.
        if let Some(chart) = self.chart.as_mut() {
            for note in chart.notes_mut().iter_mut().filter(|n| n.is_pending()) {
                note.resolve(NoteStatus::Missed);
                self.state.bump(Quality::Miss);
                self.outbox.push(GameEvent::NoteResolved {
                    id: note.id(),
                    quality: Quality::Miss,
                });
            }
        }
        self.state.phase = Phase::Finished;
        self.state.outcome = Some(outcome);
        let s = &self.state;
        info!(
            "Session finished ({:?}): score {}, max combo {}, health {}, P/G/g/M {}/{}/{}/{}, whiffs {}",
            outcome,
            s.score,
            s.max_combo,
            s.health,
            s.count(Quality::Perfect),
            s.count(Quality::Great),
            s.count(Quality::Good),
            s.count(Quality::Miss),
            s.whiffs
        );
        self.outbox.push(GameEvent::SessionPhaseChanged {
            phase: Phase::Finished,
            outcome: Some(outcome),
        });
    }

    fn emit_stats(&mut self) {
        self.outbox.push(GameEvent::StatUpdated {
            score: self.state.score,
            combo: self.state.combo,
            health: self.state.health,
        });
    }
}
