use log::debug;
use rand::Rng;
use thiserror::Error;

use crate::config::ConfigError;
use crate::game::note::{Lane, NoteEvent, NoteId};

/// Eighth-note grid spacing, in beats.
pub const GRID_STEP_BEATS: f64 = 0.5;

/// Longest chart the generator accepts: every grid point index fits a `u32`.
pub const MAX_LENGTH_BEATS: f64 = u32::MAX as f64 * GRID_STEP_BEATS;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("chart has no notes")]
    Empty,
    #[error("note {index} has invalid time {time}")]
    InvalidTime { index: usize, time: f64 },
    #[error("note {index} at beat {time} comes before the previous note at beat {previous}")]
    NonMonotonic { index: usize, previous: f64, time: f64 },
    #[error("chart has {0} notes, more than a note id can address")]
    TooManyNotes(usize),
}

/// Ordered, validated note sequence for one play-through.
///
/// Times never decrease and ids ascend in chart order, so "lowest id" and
/// "earliest scheduled" mean the same note.
#[derive(Clone, Debug)]
pub struct NoteChart {
    notes: Vec<NoteEvent>,
    // First index that may still be Pending and not yet past its window.
    pub(crate) miss_cursor: usize,
}

impl NoteChart {
    /// Builds a chart from `(beat, lane)` pairs, rejecting empty input and any
    /// time that is negative, non-finite, or earlier than its predecessor.
    pub fn from_times(times: &[(f64, Lane)]) -> Result<Self, ChartError> {
        if times.is_empty() {
            return Err(ChartError::Empty);
        }
        if u32::try_from(times.len()).is_err() {
            return Err(ChartError::TooManyNotes(times.len()));
        }
        let mut notes = Vec::with_capacity(times.len());
        let mut previous = 0.0_f64;
        for (index, &(time, lane)) in times.iter().enumerate() {
            if !time.is_finite() || time < 0.0 {
                return Err(ChartError::InvalidTime { index, time });
            }
            if time < previous {
                return Err(ChartError::NonMonotonic {
                    index,
                    previous,
                    time,
                });
            }
            previous = time;
            notes.push(NoteEvent::new(NoteId(index as u32), time, lane));
        }
        Ok(Self {
            notes,
            miss_cursor: 0,
        })
    }

    #[inline(always)]
    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    #[inline(always)]
    pub(crate) fn notes_mut(&mut self) -> &mut [NoteEvent] {
        &mut self.notes
    }

    pub fn get(&self, id: NoteId) -> Option<&NoteEvent> {
        self.notes.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn first_time(&self) -> f64 {
        self.notes.first().map_or(0.0, NoteEvent::time)
    }

    pub fn last_time(&self) -> f64 {
        self.notes.last().map_or(0.0, NoteEvent::time)
    }

    pub fn pending_count(&self) -> usize {
        self.notes.iter().filter(|n| n.is_pending()).count()
    }

    pub fn all_resolved(&self) -> bool {
        self.notes.iter().all(|n| !n.is_pending())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartParams {
    pub length_beats: f64,
    /// Probability in [0, 1] that a grid point carries a note.
    pub density: f64,
    pub syncopated: bool,
    /// Extra skip probability for on-beat points when `syncopated` is set.
    pub syncopation_skip: f64,
}

impl Default for ChartParams {
    fn default() -> Self {
        Self {
            length_beats: 32.0,
            density: 0.6,
            syncopated: false,
            syncopation_skip: 0.5,
        }
    }
}

impl ChartParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.length_beats.is_finite()
            || self.length_beats <= 0.0
            || self.length_beats > MAX_LENGTH_BEATS
        {
            return Err(ConfigError::InvalidLength(self.length_beats));
        }
        if !(0.0..=1.0).contains(&self.density) {
            return Err(ConfigError::DensityOutOfRange(self.density));
        }
        if !(0.0..=1.0).contains(&self.syncopation_skip) {
            return Err(ConfigError::SyncopationOutOfRange(self.syncopation_skip));
        }
        Ok(())
    }
}

/// Procedural chart source. Pure: the same params and seed always give the
/// same chart.
#[derive(Debug, Clone, Copy)]
pub struct ChartGenerator {
    params: ChartParams,
}

impl ChartGenerator {
    pub fn new(params: ChartParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub const fn params(&self) -> &ChartParams {
        &self.params
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<NoteChart, ChartError> {
        let p = &self.params;
        let mut times: Vec<(f64, Lane)> = Vec::new();
        let mut index: u32 = 0;
        loop {
            let time = f64::from(index) * GRID_STEP_BEATS;
            if time >= p.length_beats {
                break;
            }
            let on_beat = index % 2 == 0;
            let skip_on_beat = p.syncopated && on_beat && rng.random_bool(p.syncopation_skip);
            if !skip_on_beat && rng.random_bool(p.density) {
                times.push((time, Lane::from_grid_index(index)));
            }
            index += 1;
        }
        debug!(
            "Generated chart: {} notes over {} grid points (density={}, syncopated={})",
            times.len(),
            index,
            p.density,
            p.syncopated
        );
        NoteChart::from_times(&times)
    }
}
