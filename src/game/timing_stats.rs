use serde::Serialize;

use crate::game::chart::NoteChart;
use crate::game::note::NoteStatus;

/// Offset summary over hit notes, in beats. Misses are excluded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct TimingStats {
    pub mean_abs: f64,
    pub mean: f64,
    pub stddev: f64,
    pub max_abs: f64,
    pub count: usize,
}

impl TimingStats {
    /// Same statistics in milliseconds for a given tempo.
    pub fn to_ms(&self, seconds_per_beat: f64) -> Self {
        let k = seconds_per_beat * 1000.0;
        Self {
            mean_abs: self.mean_abs * k,
            mean: self.mean * k,
            stddev: self.stddev * k,
            max_abs: self.max_abs * k,
            count: self.count,
        }
    }
}

#[inline(always)]
fn hit_offsets(chart: &NoteChart) -> impl Iterator<Item = f64> + '_ {
    chart.notes().iter().filter_map(|n| match n.status() {
        NoteStatus::Hit { offset, .. } => Some(offset),
        _ => None,
    })
}

pub fn compute_timing_stats(chart: &NoteChart) -> TimingStats {
    let mut sum_abs = 0.0_f64;
    let mut sum_signed = 0.0_f64;
    let mut max_abs = 0.0_f64;
    let mut count: usize = 0;
    for e in hit_offsets(chart) {
        let a = e.abs();
        sum_abs += a;
        sum_signed += e;
        if a > max_abs {
            max_abs = a;
        }
        count += 1;
    }

    if count == 0 {
        return TimingStats::default();
    }

    let mean = sum_signed / count as f64;
    let mean_abs = sum_abs / count as f64;

    let stddev = if count > 1 {
        let sum_diff_sq: f64 = hit_offsets(chart).map(|e| (e - mean) * (e - mean)).sum();
        (sum_diff_sq / (count as f64 - 1.0)).sqrt()
    } else {
        0.0
    };

    TimingStats {
        mean_abs,
        mean,
        stddev,
        max_abs,
        count,
    }
}
