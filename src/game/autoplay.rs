use log::debug;
use rand::Rng;

use crate::game::chart::NoteChart;
use crate::game::timing::Transport;

/// Scripted player: one attempt per note, at the note's clock time plus
/// optional jitter, with an optional chance of sitting a note out.
#[derive(Debug, Clone)]
pub struct Autoplay {
    schedule: Vec<f64>,
    next: usize,
}

impl Autoplay {
    pub fn new<R: Rng + ?Sized>(
        chart: &NoteChart,
        transport: &Transport,
        jitter_beats: f64,
        skip: f64,
        rng: &mut R,
    ) -> Self {
        let skip = skip.clamp(0.0, 1.0);
        let jitter = if jitter_beats.is_finite() { jitter_beats.abs() } else { 0.0 };
        let mut schedule = Vec::with_capacity(chart.len());
        for n in chart.notes() {
            if rng.random_bool(skip) {
                continue;
            }
            let err = if jitter > 0.0 {
                rng.random_range(-jitter..=jitter)
            } else {
                0.0
            };
            schedule.push(transport.time_at(n.time() + err));
        }
        schedule.sort_by(f64::total_cmp);
        debug!(
            "Autoplay scheduled {} of {} notes (jitter {jitter} beats)",
            schedule.len(),
            chart.len()
        );
        Self { schedule, next: 0 }
    }

    /// Attempts whose time has come by `now`, in order. Each is returned once.
    pub fn due(&mut self, now: f64) -> &[f64] {
        let start = self.next;
        while self.next < self.schedule.len() && self.schedule[self.next] <= now {
            self.next += 1;
        }
        &self.schedule[start..self.next]
    }

    pub fn remaining(&self) -> usize {
        self.schedule.len() - self.next
    }
}

#[cfg(test)]
mod tests {
    use super::Autoplay;
    use crate::game::chart::NoteChart;
    use crate::game::note::Lane;
    use crate::game::timing::Transport;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn chart() -> NoteChart {
        NoteChart::from_times(&[(0.0, Lane::Low), (1.0, Lane::Mid), (2.0, Lane::Low)]).unwrap()
    }

    #[test]
    fn exact_schedule_follows_the_transport() {
        let t = Transport::new(10.0, 120.0).unwrap();
        let mut a = Autoplay::new(&chart(), &t, 0.0, 0.0, &mut StdRng::seed_from_u64(0));
        assert_eq!(a.remaining(), 3);
        assert!(a.due(9.9).is_empty());
        assert_eq!(a.due(10.5), &[10.0, 10.5]);
        assert!(a.due(10.5).is_empty());
        assert_eq!(a.due(100.0), &[11.0]);
        assert_eq!(a.remaining(), 0);
    }

    #[test]
    fn jitter_stays_bounded_and_skip_drops_everything() {
        let t = Transport::new(0.0, 60.0).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let mut a = Autoplay::new(&chart(), &t, 0.1, 0.0, &mut rng);
        let times = a.due(f64::MAX).to_vec();
        assert_eq!(times.len(), 3);
        for (got, want) in times.iter().zip([0.0, 1.0, 2.0]) {
            assert!((got - want).abs() <= 0.1 + 1e-12, "{got} too far from {want}");
        }
        let silent = Autoplay::new(&chart(), &t, 0.0, 1.0, &mut rng);
        assert_eq!(silent.remaining(), 0);
    }
}
