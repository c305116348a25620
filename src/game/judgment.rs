use log::debug;
use serde::Serialize;
use smallvec::SmallVec;

use crate::config::ConfigError;
use crate::game::chart::NoteChart;
use crate::game::life::Tuning;
use crate::game::note::{NoteId, NoteStatus};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Quality {
    Perfect,
    Great,
    Good,
    Miss,
}

/// Tolerance bands, in beats. All comparisons are strict: an error of
/// exactly `hit_window` is outside the window.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JudgeWindows {
    pub hit_window: f64,
    pub perfect_window: f64,
    pub great_window: f64,
}

pub const DEFAULT_HIT_WINDOW: f64 = 0.25;
pub const DEFAULT_PERFECT_WINDOW: f64 = 0.08;
pub const DEFAULT_GREAT_WINDOW: f64 = 0.15;

impl Default for JudgeWindows {
    fn default() -> Self {
        Self {
            hit_window: DEFAULT_HIT_WINDOW,
            perfect_window: DEFAULT_PERFECT_WINDOW,
            great_window: DEFAULT_GREAT_WINDOW,
        }
    }
}

impl JudgeWindows {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.perfect_window > 0.0
            && self.perfect_window <= self.great_window
            && self.great_window <= self.hit_window
            && self.hit_window.is_finite();
        if !ordered {
            return Err(ConfigError::WindowOrder {
                perfect: self.perfect_window,
                great: self.great_window,
                hit: self.hit_window,
            });
        }
        Ok(())
    }
}

/// Maps an absolute beat error already inside the hit window to a quality band.
#[inline(always)]
pub fn classify_offset(abs_error: f64, windows: &JudgeWindows) -> Quality {
    if abs_error < windows.perfect_window {
        Quality::Perfect
    } else if abs_error < windows.great_window {
        Quality::Great
    } else {
        Quality::Good
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JudgmentResult {
    pub note_id: NoteId,
    pub quality: Quality,
    pub points_awarded: u32,
    /// Signed error in beats; negative means early.
    pub offset: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputOutcome {
    Hit(JudgmentResult),
    /// Nothing pending within the window.
    Whiff,
}

/// Judges one attempt at `beat`: the closest Pending note strictly inside
/// the hit window is marked Hit. Ties go to the earlier note.
pub fn judge_input(
    chart: &mut NoteChart,
    beat: f64,
    windows: &JudgeWindows,
    tuning: &Tuning,
) -> InputOutcome {
    let w = windows.hit_window;
    let notes = chart.notes_mut();
    let start = notes.partition_point(|n| n.time() <= beat - w);

    let mut best: Option<(usize, f64)> = None;
    for (idx, n) in notes.iter().enumerate().skip(start) {
        if n.time() >= beat + w {
            break;
        }
        if !n.is_pending() {
            continue;
        }
        let abs_err = (n.time() - beat).abs();
        if abs_err >= w {
            continue;
        }
        match best {
            Some((_, best_err)) if abs_err >= best_err => {}
            _ => best = Some((idx, abs_err)),
        }
    }

    let Some((idx, abs_err)) = best else {
        debug!("WHIFF at beat {beat:.3}");
        return InputOutcome::Whiff;
    };

    let note = &mut notes[idx];
    let offset = beat - note.time();
    let quality = classify_offset(abs_err, windows);
    note.resolve(NoteStatus::Hit { quality, offset });
    let result = JudgmentResult {
        note_id: note.id(),
        quality,
        points_awarded: tuning.points_for(quality),
        offset,
    };
    debug!(
        "HIT {} {:?} at beat {:.3} (note {:.3}, offset {:+.3})",
        result.note_id,
        quality,
        beat,
        note.time(),
        offset
    );
    InputOutcome::Hit(result)
}

/// Resolves the next Pending note whose window has fully passed at `beat`
/// as Missed. A cursor keeps later sweeps from revisiting anything behind
/// it, and notes already resolved are stepped over.
pub fn sweep_next_miss(chart: &mut NoteChart, beat: f64, hit_window: f64) -> Option<NoteId> {
    let mut cursor = chart.miss_cursor;
    let notes = chart.notes_mut();
    let mut missed = None;
    while cursor < notes.len() {
        let note = &mut notes[cursor];
        if beat <= note.time() + hit_window {
            break;
        }
        cursor += 1;
        if note.is_pending() {
            note.resolve(NoteStatus::Missed);
            debug!(
                "MISSED (time-based): {} at beat {:.3}, swept at {:.3}",
                note.id(),
                note.time(),
                beat
            );
            missed = Some(note.id());
            break;
        }
    }
    chart.miss_cursor = cursor;
    missed
}

/// Marks every Pending note whose window has fully passed at `beat` as
/// Missed and returns their ids in chart order.
pub fn sweep_misses(chart: &mut NoteChart, beat: f64, hit_window: f64) -> SmallVec<[NoteId; 4]> {
    std::iter::from_fn(|| sweep_next_miss(chart, beat, hit_window)).collect()
}
