use serde::Serialize;

use crate::game::judgment::Quality;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NoteId(pub u32);

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Lane {
    High,
    Mid,
    Low,
}

impl Lane {
    /// Lane for a point on the eighth-note grid: off-beats ride high, even
    /// downbeats sit low, odd downbeats in the middle.
    #[inline(always)]
    pub const fn from_grid_index(index: u32) -> Self {
        if index % 2 == 1 {
            Self::High
        } else if (index / 2) % 2 == 0 {
            Self::Low
        } else {
            Self::Mid
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum NoteStatus {
    Pending,
    // offset = judged beat - note time
    Hit { quality: Quality, offset: f64 },
    Missed,
}

impl NoteStatus {
    #[inline(always)]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    #[inline(always)]
    pub const fn is_resolved(&self) -> bool {
        !self.is_pending()
    }

    /// The quality this status reports to collaborators (`Miss` for missed notes).
    pub const fn quality(&self) -> Option<Quality> {
        match self {
            Self::Pending => None,
            Self::Hit { quality, .. } => Some(*quality),
            Self::Missed => Some(Quality::Miss),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NoteEvent {
    id: NoteId,
    time: f64,
    lane: Lane,
    status: NoteStatus,
}

impl NoteEvent {
    pub(crate) const fn new(id: NoteId, time: f64, lane: Lane) -> Self {
        Self {
            id,
            time,
            lane,
            status: NoteStatus::Pending,
        }
    }

    #[inline(always)]
    pub const fn id(&self) -> NoteId {
        self.id
    }

    /// Scheduled beat position.
    #[inline(always)]
    pub const fn time(&self) -> f64 {
        self.time
    }

    #[inline(always)]
    pub const fn lane(&self) -> Lane {
        self.lane
    }

    #[inline(always)]
    pub const fn status(&self) -> NoteStatus {
        self.status
    }

    #[inline(always)]
    pub const fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Pending -> Hit/Missed. A note leaves Pending exactly once; being asked
    /// to resolve it again means two judges claimed the same note.
    pub(crate) fn resolve(&mut self, to: NoteStatus) {
        assert!(
            self.status.is_pending(),
            "note {} resolved twice: {:?} -> {:?}",
            self.id,
            self.status,
            to
        );
        assert!(to.is_resolved(), "note {} cannot resolve back to Pending", self.id);
        self.status = to;
    }
}
