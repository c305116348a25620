use log::{debug, info, trace, warn};

use crate::core::clock::Clock;
use crate::core::input::InputQueue;
use crate::game::chart::NoteChart;
use crate::game::session::{GameEvent, Outcome, Phase, Session, SessionError};
use crate::game::timing::{BeatGuard, BeatReading};

// Seconds of clock time between periodic status lines.
const STATUS_LOG_INTERVAL_S: f64 = 1.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TickStatus {
    Idle,
    Running { beat: f64 },
    Finished(Outcome),
}

/// Per-tick driver. Owns the clock, the buffered input and the session, and
/// reads all tuning through the session on every tick.
#[derive(Debug)]
pub struct GameLoop<C: Clock> {
    clock: C,
    session: Session,
    pending_edges: InputQueue,
    guard: BeatGuard,
    current_beat: f64,
    ticks: u64,
    last_status_log: f64,
}

impl<C: Clock> GameLoop<C> {
    pub fn new(clock: C, session: Session) -> Self {
        Self {
            clock,
            session,
            pending_edges: InputQueue::new(),
            guard: BeatGuard::new(),
            current_beat: 0.0,
            ticks: 0,
            last_status_log: f64::NEG_INFINITY,
        }
    }

    #[inline(always)]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    #[inline(always)]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[inline(always)]
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Beat used by the most recent tick.
    #[inline(always)]
    pub const fn current_beat(&self) -> f64 {
        self.current_beat
    }

    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.session.drain_events()
    }

    pub fn start(&mut self, chart: NoteChart) -> Result<(), SessionError> {
        let now = self.clock.now_seconds();
        self.session.start(chart, now)?;
        self.guard = BeatGuard::new();
        self.pending_edges.clear();
        self.ticks = 0;
        self.last_status_log = f64::NEG_INFINITY;
        if let Some(t) = self.session.transport() {
            self.current_beat = t.beat_at(now);
        }
        Ok(())
    }

    /// Buffers one player attempt. Judged by the next tick, at that tick's beat.
    pub fn queue_input(&mut self, timestamp: f64) {
        if !self.session.is_playing() {
            debug!("Ignoring input at {timestamp:.4}s: session is {:?}", self.session.phase());
            return;
        }
        self.pending_edges.push(timestamp);
    }

    /// Buffers an attempt stamped with the loop's own clock.
    pub fn queue_input_now(&mut self) {
        let now = self.clock.now_seconds();
        self.queue_input(now);
    }

    /// Ends the session now; later ticks and inputs are no-ops.
    pub fn stop(&mut self) {
        self.session.stop();
        let dropped = self.pending_edges.clear();
        if dropped > 0 {
            debug!("Dropped {dropped} buffered inputs on stop");
        }
    }

    /// Back to Idle so a new chart can be started.
    pub fn reset(&mut self) {
        self.session.reset();
        self.pending_edges.clear();
        self.guard = BeatGuard::new();
        self.current_beat = 0.0;
    }

    /// Pulls the transport onto an external timeline reading `observed_beat`
    /// right now. The judged beat still never moves backward.
    pub fn resync(&mut self, observed_beat: f64) -> Option<f64> {
        let now = self.clock.now_seconds();
        let drift = self.session.transport_mut()?.resync(now, observed_beat);
        if drift.abs() > f64::EPSILON {
            info!("Transport resynced by {drift:+.4} beats at {now:.4}s");
        }
        Some(drift)
    }

    /// One scheduling tick: a single clock read, then input, then the miss
    /// sweep, then the terminal check.
    pub fn update(&mut self) -> TickStatus {
        match self.session.phase() {
            Phase::Idle => return TickStatus::Idle,
            Phase::Finished => return self.finished(),
            Phase::Playing => {}
        }

        let now = self.clock.now_seconds();
        let Some(transport) = self.session.transport() else {
            warn!("Playing session has no transport; stopping");
            self.session.abort();
            return self.finished();
        };
        let beat = match self.guard.advance(transport, now) {
            BeatReading::Advanced(b) | BeatReading::Frozen(b) => b,
            BeatReading::Unavailable => {
                self.session.abort();
                self.pending_edges.clear();
                return self.finished();
            }
        };
        self.current_beat = beat;
        self.ticks += 1;

        while let Some(edge) = self.pending_edges.pop() {
            if !self.session.is_playing() {
                break;
            }
            trace!(
                "Draining input stamped {:.4}s at {:.4}s (latency {:.1}ms)",
                edge.timestamp,
                now,
                (now - edge.timestamp) * 1000.0
            );
            self.session.judge(beat);
        }
        self.session.sweep(beat);
        let phase = self.session.check_terminal(beat);

        if now - self.last_status_log >= STATUS_LOG_INTERVAL_S {
            let s = self.session.state();
            info!(
                "Beat: {:.2}, Time: {:.2}, Score: {}, Combo: {}, Health: {}, Pending: {}",
                beat,
                now,
                s.score,
                s.combo,
                s.health,
                self.session.chart().map_or(0, NoteChart::pending_count)
            );
            self.last_status_log = now;
        }

        if phase == Phase::Finished {
            self.pending_edges.clear();
            return self.finished();
        }
        TickStatus::Running { beat }
    }

    fn finished(&self) -> TickStatus {
        TickStatus::Finished(self.session.state().outcome.unwrap_or(Outcome::Stopped))
    }
}

#[cfg(test)]
mod tests {
    use super::{GameLoop, TickStatus};
    use crate::config::SessionConfig;
    use crate::core::clock::{Clock, ManualClock};
    use crate::game::chart::NoteChart;
    use crate::game::judgment::{JudgeWindows, Quality};
    use crate::game::life::MAX_HEALTH;
    use crate::game::note::{Lane, NoteId};
    use crate::game::session::{GameEvent, Outcome, Phase, Session};

    const TICK: f64 = 1.0 / 60.0;

    fn chart(times: &[f64]) -> NoteChart {
        let pairs: Vec<(f64, Lane)> = times.iter().map(|&t| (t, Lane::Mid)).collect();
        NoteChart::from_times(&pairs).unwrap()
    }

    fn config(hit_window: f64) -> SessionConfig {
        SessionConfig {
            bpm: 60.0,
            windows: JudgeWindows {
                hit_window,
                perfect_window: 0.08,
                great_window: hit_window.min(0.15),
            },
            count_in_beats: 0.0,
            end_grace_beats: 2.0,
            ..SessionConfig::default()
        }
    }

    fn resolved(events: &[GameEvent]) -> Vec<(NoteId, Quality)> {
        events
            .iter()
            .filter_map(|e| match e {
                GameEvent::NoteResolved { id, quality } => Some((*id, *quality)),
                _ => None,
            })
            .collect()
    }

    /// Ticks at 60 Hz up to (not including) `until`, then parks the clock
    /// exactly on `until`.
    fn tick_to(game: &mut GameLoop<&ManualClock>, clock: &ManualClock, until: f64) {
        while clock.now_seconds() + TICK < until {
            clock.advance(TICK);
            game.update();
        }
        clock.set(until);
    }

    fn run_inputs<'a>(
        clock: &'a ManualClock,
        session_cfg: SessionConfig,
        times: &[f64],
        inputs: &[f64],
        end: f64,
    ) -> (GameLoop<&'a ManualClock>, Vec<GameEvent>) {
        let mut game = GameLoop::new(clock, Session::new(session_cfg).unwrap());
        game.start(chart(times)).unwrap();
        let mut events = game.drain_events();
        for &t in inputs {
            tick_to(&mut game, clock, t);
            game.queue_input(t);
            game.update();
            events.extend(game.drain_events());
        }
        while clock.now_seconds() < end {
            clock.advance(TICK);
            if let TickStatus::Finished(_) = game.update() {
                break;
            }
        }
        events.extend(game.drain_events());
        (game, events)
    }

    #[test]
    fn four_note_scenario() {
        // 60 bpm: one beat per second, so clock seconds equal beats.
        let clock = ManualClock::new(0.0);
        let (game, events) =
            run_inputs(&clock, config(0.25), &[0.0, 1.0, 2.0, 3.0], &[0.05, 1.2, 2.0, 5.0], 8.0);
        // 1.20 is 0.20 beats from note 1, inside a 0.25 window: a late Good.
        assert_eq!(
            resolved(&events),
            vec![
                (NoteId(0), Quality::Perfect),
                (NoteId(1), Quality::Good),
                (NoteId(2), Quality::Perfect),
                (NoteId(3), Quality::Miss),
            ]
        );
        let s = game.session().state();
        assert_eq!(s.whiffs, 1, "the attempt at beat 5 has nothing to hit");
        assert_eq!(s.outcome, Some(Outcome::Cleared));
        assert_eq!(game.session().phase(), Phase::Finished);
    }

    #[test]
    fn four_note_scenario_with_narrow_window() {
        // With a 0.15 window note 1 is swept at beat 1.15, so the attempt at
        // 1.20 finds nothing and counts as a whiff.
        let clock = ManualClock::new(0.0);
        let (game, events) =
            run_inputs(&clock, config(0.15), &[0.0, 1.0, 2.0, 3.0], &[0.05, 1.2, 2.0, 5.0], 8.0);
        assert_eq!(
            resolved(&events),
            vec![
                (NoteId(0), Quality::Perfect),
                (NoteId(1), Quality::Miss),
                (NoteId(2), Quality::Perfect),
                (NoteId(3), Quality::Miss),
            ]
        );
        assert_eq!(game.session().state().whiffs, 2);
        assert_eq!(game.session().state().combo, 0);
    }

    #[test]
    fn perfect_play_never_loses_health() {
        let times: Vec<f64> = (0..16).map(|i| f64::from(i) * 0.5).collect();
        let clock = ManualClock::new(0.0);
        let mut game = GameLoop::new(&clock, Session::new(config(0.25)).unwrap());
        game.start(chart(&times)).unwrap();
        for &t in &times {
            tick_to(&mut game, &clock, t);
            game.queue_input(t);
            game.update();
            assert_eq!(game.session().state().health, MAX_HEALTH);
        }
        while !matches!(game.update(), TickStatus::Finished(_)) {
            clock.advance(TICK);
        }
        let events = game.drain_events();
        let res = resolved(&events);
        assert_eq!(res.len(), times.len());
        assert!(res.iter().all(|(_, q)| *q == Quality::Perfect));
        assert_eq!(game.session().state().combo, times.len() as u32);
        assert_eq!(game.session().state().outcome, Some(Outcome::Cleared));
    }

    #[test]
    fn idle_player_misses_everything_and_fails() {
        let times: Vec<f64> = (0..12).map(f64::from).collect();
        let clock = ManualClock::new(0.0);
        let (game, events) = run_inputs(&clock, config(0.25), &times, &[], 30.0);
        let res = resolved(&events);
        assert_eq!(res.len(), times.len());
        assert!(res.iter().all(|(_, q)| *q == Quality::Miss));
        let s = game.session().state();
        assert_eq!(s.combo, 0);
        assert_eq!(s.max_combo, 0);
        assert_eq!(s.health, 0);
        assert_eq!(s.outcome, Some(Outcome::Failed));
        assert_eq!(s.count(Quality::Miss), times.len() as u32);
        assert!(game.session().chart().unwrap().all_resolved());
    }

    #[test]
    fn input_is_judged_at_drain_time() {
        let clock = ManualClock::new(0.0);
        let mut game = GameLoop::new(&clock, Session::new(config(0.25)).unwrap());
        game.start(chart(&[1.0, 4.0])).unwrap();
        // Stamped at beat 0.5 but only drained at beat 1.0.
        clock.set(0.5);
        game.queue_input(0.5);
        clock.set(1.0);
        game.update();
        let res = resolved(&game.drain_events());
        assert_eq!(res, vec![(NoteId(0), Quality::Perfect)]);
    }

    #[test]
    fn backward_clock_freezes_the_beat() {
        let clock = ManualClock::new(0.0);
        let mut game = GameLoop::new(&clock, Session::new(config(0.25)).unwrap());
        game.start(chart(&[1.0, 2.0, 6.0])).unwrap();
        clock.set(1.5);
        assert_eq!(game.update(), TickStatus::Running { beat: 1.5 });
        assert_eq!(game.session().state().count(Quality::Miss), 1);

        clock.set(0.9);
        game.queue_input(0.9);
        // Judged at the frozen 1.5: nothing there, and note 0 is not revisited.
        assert_eq!(game.update(), TickStatus::Running { beat: 1.5 });
        assert_eq!(game.session().state().whiffs, 1);
        assert_eq!(game.session().state().count(Quality::Miss), 1);
        assert_eq!(game.current_beat(), 1.5);
    }

    #[test]
    fn unusable_clock_aborts() {
        let clock = ManualClock::new(0.0);
        let mut game = GameLoop::new(&clock, Session::new(config(0.25)).unwrap());
        game.start(chart(&[1.0, 2.0])).unwrap();
        clock.set(f64::NAN);
        assert_eq!(game.update(), TickStatus::Finished(Outcome::Aborted));
        assert!(game.session().chart().unwrap().all_resolved());
    }

    #[test]
    fn stop_cancels_everything_after_it() {
        let clock = ManualClock::new(0.0);
        let mut game = GameLoop::new(&clock, Session::new(config(0.25)).unwrap());
        game.start(chart(&[1.0, 2.0])).unwrap();
        clock.set(0.5);
        game.update();
        game.queue_input(0.9);
        game.stop();
        game.queue_input(1.0);
        clock.set(1.0);
        assert_eq!(game.update(), TickStatus::Finished(Outcome::Stopped));
        let s = game.session().state();
        assert_eq!(s.count(Quality::Perfect), 0);
        assert_eq!(s.whiffs, 0);
        assert_eq!(s.score, 0);
    }

    #[test]
    fn tuning_changes_reach_the_next_tick() {
        let clock = ManualClock::new(0.0);
        let mut game = GameLoop::new(&clock, Session::new(config(0.25)).unwrap());
        game.start(chart(&[1.0, 8.0])).unwrap();
        game.session_mut().set_config(config(0.5)).unwrap();
        clock.set(1.4);
        game.queue_input(1.4);
        game.update();
        assert_eq!(game.session().state().count(Quality::Good), 1);
        assert_eq!(game.session().state().whiffs, 0);
    }

    #[test]
    fn count_in_delays_beat_zero() {
        let clock = ManualClock::new(10.0);
        let cfg = SessionConfig {
            count_in_beats: 4.0,
            ..config(0.25)
        };
        let mut game = GameLoop::new(&clock, Session::new(cfg).unwrap());
        game.start(chart(&[0.0])).unwrap();
        assert_eq!(game.current_beat(), -4.0);
        clock.set(12.0);
        assert!(matches!(game.update(), TickStatus::Running { beat } if beat == -2.0));
        assert_eq!(game.session().state().whiffs, 0);
        assert!(game.session().chart().unwrap().notes()[0].is_pending());
    }

    #[test]
    fn resync_holds_the_judged_beat() {
        let clock = ManualClock::new(0.0);
        let mut game = GameLoop::new(&clock, Session::new(config(0.25)).unwrap());
        game.start(chart(&[8.0])).unwrap();
        clock.set(2.0);
        game.update();
        let drift = game.resync(1.75).unwrap();
        assert!((drift - 0.25).abs() < 1e-9);
        clock.set(2.1);
        assert_eq!(game.update(), TickStatus::Running { beat: 2.0 });
        clock.set(2.5);
        match game.update() {
            TickStatus::Running { beat } => assert!((beat - 2.25).abs() < 1e-9),
            other => panic!("unexpected {other:?}"),
        }
        assert!(game.resync(f64::NAN).is_some());
        game.stop();
        game.reset();
        assert_eq!(game.session().phase(), Phase::Idle);
        assert_eq!(game.update(), TickStatus::Idle);
    }
}
