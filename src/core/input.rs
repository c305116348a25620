use std::collections::VecDeque;

/// One player attempt. Carries only the wall-clock time it was captured at;
/// the beat it is judged against comes from the tick that drains it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputEdge {
    pub timestamp: f64,
}

/// FIFO buffer between the platform event queue and the gameplay tick.
#[derive(Debug, Default)]
pub struct InputQueue {
    pending_edges: VecDeque<InputEdge>,
    dropped: u64,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn push(&mut self, timestamp: f64) {
        if !timestamp.is_finite() {
            self.dropped += 1;
            log::warn!("Dropping input edge with non-finite timestamp {timestamp}");
            return;
        }
        self.pending_edges.push_back(InputEdge { timestamp });
    }

    #[inline(always)]
    pub fn pop(&mut self) -> Option<InputEdge> {
        self.pending_edges.pop_front()
    }

    /// Discards everything still buffered, returning how many edges were lost.
    pub fn clear(&mut self) -> usize {
        let n = self.pending_edges.len();
        self.pending_edges.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.pending_edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_edges.is_empty()
    }

    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}
