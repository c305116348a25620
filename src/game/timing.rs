use log::warn;

use crate::config::ConfigError;

/// Maps clock seconds to a musical position for one session.
///
/// Holds nothing but the epoch and tempo captured at start, so every
/// `beat_at` is a pure function of the clock reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transport {
    start_epoch: f64,
    bpm: f64,
}

impl Transport {
    pub fn new(start_epoch: f64, bpm: f64) -> Result<Self, ConfigError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(ConfigError::InvalidBpm(bpm));
        }
        if !start_epoch.is_finite() {
            return Err(ConfigError::InvalidEpoch(start_epoch));
        }
        Ok(Self { start_epoch, bpm })
    }

    #[inline(always)]
    pub const fn start_epoch(&self) -> f64 {
        self.start_epoch
    }

    #[inline(always)]
    pub const fn bpm(&self) -> f64 {
        self.bpm
    }

    #[inline(always)]
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm
    }

    #[inline(always)]
    pub fn beat_at(&self, now: f64) -> f64 {
        (now - self.start_epoch) * self.bpm / 60.0
    }

    /// Clock time at which `beat` is reached.
    #[inline(always)]
    pub fn time_at(&self, beat: f64) -> f64 {
        beat.mul_add(self.seconds_per_beat(), self.start_epoch)
    }

    /// Re-anchors the epoch so that `beat_at(now) == observed_beat`.
    ///
    /// Used to pull the transport onto a second timeline (an audio device
    /// position, say) instead of letting the two drift apart. Returns the
    /// drift that was corrected, in beats (positive when the transport was
    /// ahead).
    pub fn resync(&mut self, now: f64, observed_beat: f64) -> f64 {
        if !now.is_finite() || !observed_beat.is_finite() {
            warn!("Ignoring resync with non-finite input (now={now}, beat={observed_beat})");
            return 0.0;
        }
        let drift = self.beat_at(now) - observed_beat;
        self.start_epoch = now - observed_beat * self.seconds_per_beat();
        drift
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeatReading {
    /// A fresh beat, not behind any earlier reading.
    Advanced(f64),
    /// The clock went backward; holding the last good beat.
    Frozen(f64),
    /// The clock produced no usable value.
    Unavailable,
}

impl BeatReading {
    pub const fn beat(&self) -> Option<f64> {
        match self {
            Self::Advanced(b) | Self::Frozen(b) => Some(*b),
            Self::Unavailable => None,
        }
    }
}

/// Keeps the judged beat monotonically non-decreasing within a session.
#[derive(Debug, Clone, Default)]
pub struct BeatGuard {
    last_beat: Option<f64>,
    regressions: u32,
}

impl BeatGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, transport: &Transport, now: f64) -> BeatReading {
        if !now.is_finite() {
            warn!("Clock returned non-finite time {now}");
            return BeatReading::Unavailable;
        }
        let beat = transport.beat_at(now);
        if let Some(last) = self.last_beat
            && beat < last
        {
            self.regressions = self.regressions.saturating_add(1);
            warn!(
                "Clock went backward: beat {beat:.4} < last {last:.4}; holding at last good beat"
            );
            return BeatReading::Frozen(last);
        }
        self.last_beat = Some(beat);
        BeatReading::Advanced(beat)
    }

    pub const fn last_beat(&self) -> Option<f64> {
        self.last_beat
    }

    pub const fn regressions(&self) -> u32 {
        self.regressions
    }
}

#[cfg(test)]
mod tests {
    use super::{BeatGuard, BeatReading, Transport};
    use crate::config::ConfigError;

    #[test]
    fn beat_follows_tempo() {
        let t = Transport::new(2.0, 120.0).unwrap();
        assert_eq!(t.beat_at(2.0), 0.0);
        assert_eq!(t.beat_at(3.0), 2.0);
        assert_eq!(t.beat_at(1.0), -2.0);
        assert!((t.time_at(5.0) - 4.5).abs() < 1e-12);
        assert!((t.beat_at(t.time_at(7.25)) - 7.25).abs() < 1e-12);
    }

    #[test]
    fn tempo_must_be_positive() {
        assert_eq!(
            Transport::new(0.0, 0.0).unwrap_err(),
            ConfigError::InvalidBpm(0.0)
        );
        assert!(Transport::new(0.0, -60.0).is_err());
        assert!(Transport::new(0.0, f64::NAN).is_err());
        assert!(Transport::new(f64::INFINITY, 60.0).is_err());
    }

    #[test]
    fn guard_freezes_on_backward_clock() {
        let t = Transport::new(0.0, 60.0).unwrap();
        let mut g = BeatGuard::new();
        assert_eq!(g.advance(&t, 1.0), BeatReading::Advanced(1.0));
        assert_eq!(g.advance(&t, 1.0), BeatReading::Advanced(1.0));
        assert_eq!(g.advance(&t, 0.5), BeatReading::Frozen(1.0));
        assert_eq!(g.regressions(), 1);
        assert_eq!(g.advance(&t, 1.5), BeatReading::Advanced(1.5));
        assert_eq!(g.advance(&t, f64::NAN), BeatReading::Unavailable);
        assert_eq!(g.last_beat(), Some(1.5));
    }

    #[test]
    fn resync_realigns_without_rewinding_the_guard() {
        let mut t = Transport::new(0.0, 60.0).unwrap();
        let mut g = BeatGuard::new();
        assert_eq!(g.advance(&t, 4.0), BeatReading::Advanced(4.0));

        // The audio timeline says we are only at beat 3.9.
        let drift = t.resync(4.0, 3.9);
        assert!((drift - 0.1).abs() < 1e-9);
        assert!((t.beat_at(4.0) - 3.9).abs() < 1e-9);

        // Until the transport catches up, the judged beat holds.
        assert_eq!(g.advance(&t, 4.05), BeatReading::Frozen(4.0));
        match g.advance(&t, 4.2) {
            BeatReading::Advanced(b) => assert!((b - 4.1).abs() < 1e-9),
            other => panic!("expected advance, got {other:?}"),
        }
    }
}
