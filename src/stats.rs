use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::top::{HitRecord, Placement, TOP_SLOTS, TopSections};
use crate::window::SampleWindow;

#[derive(Debug)]
struct Counters {
    total_hits: u64,
    interval_hits: u64,
    top: TopSections,
}

/// Consistent view of the global counters
#[derive(Debug, Clone, PartialEq)]
pub struct CountersSnapshot {
    pub total_hits: u64,
    pub interval_hits: u64,
    pub top: [HitRecord; TOP_SLOTS],
}

/// Global hit counters, the top-N tracker and the rolling sample window.
///
/// Lock order is counters then window. Neither lock is held across I/O.
pub struct TrafficStats {
    counters: Mutex<Counters>,
    window: RwLock<SampleWindow>,
}

impl TrafficStats {
    pub fn new(window_slots: usize, placement: Placement) -> Self {
        Self {
            counters: Mutex::new(Counters {
                total_hits: 0,
                interval_hits: 0,
                top: TopSections::new(placement),
            }),
            window: RwLock::new(SampleWindow::new(window_slots)),
        }
    }

    /// Records one classified hit for `section`, whose live count in the
    /// hit table is `section_hits`.
    pub fn record_hit(&self, section: &str, section_hits: u64) {
        let mut counters = self.counters.lock();
        counters.total_hits += 1;
        counters.interval_hits += 1;
        counters.top.offer(section, section_hits);
    }

    /// Folds the interval accumulator into the window and resets it.
    ///
    /// The counters lock is held for the whole step so no hit recorded
    /// concurrently is lost or counted twice.
    pub fn sample(&self) -> u64 {
        let mut counters = self.counters.lock();
        let interval_hits = std::mem::take(&mut counters.interval_hits);
        self.window.write().tick(interval_hits);
        drop(counters);

        trace!(interval_hits, "Sampled interval hits");
        interval_hits
    }

    pub fn window_average(&self) -> f64 {
        self.window.read().average()
    }

    /// Copy of the sample window, oldest sample first
    pub fn window_samples(&self) -> Vec<u64> {
        self.window.read().samples().collect()
    }

    pub fn total_hits(&self) -> u64 {
        self.counters.lock().total_hits
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let counters = self.counters.lock();
        CountersSnapshot {
            total_hits: counters.total_hits,
            interval_hits: counters.interval_hits,
            top: counters.top.slots().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_and_sample() {
        let stats = TrafficStats::new(4, Placement::Ranked);
        stats.record_hit("/a", 1);
        stats.record_hit("/a", 2);
        stats.record_hit("/b", 1);

        let snap = stats.snapshot();
        assert_eq!(snap.total_hits, 3);
        assert_eq!(snap.interval_hits, 3);
        assert_eq!(snap.top[0], HitRecord::new("/a", 2));
        assert_eq!(snap.top[1], HitRecord::new("/b", 1));

        assert_eq!(stats.sample(), 3);
        let snap = stats.snapshot();
        assert_eq!(snap.interval_hits, 0);
        assert_eq!(snap.total_hits, 3);
        assert_eq!(stats.window_average(), 0.75);
        assert_eq!(stats.window_samples(), vec![0, 0, 0, 3]);
    }

    #[test]
    fn test_empty_sample_advances_window() {
        let stats = TrafficStats::new(2, Placement::Ranked);
        stats.record_hit("/a", 1);
        stats.record_hit("/a", 2);
        stats.sample();
        assert_eq!(stats.window_average(), 1.0);

        assert_eq!(stats.sample(), 0);
        assert_eq!(stats.sample(), 0);
        assert_eq!(stats.window_average(), 0.0);
    }

    #[test]
    fn test_no_hits_lost_across_concurrent_samples() {
        let stats = Arc::new(TrafficStats::new(10_000, Placement::Ranked));

        let writer = {
            let stats = Arc::clone(&stats);
            std::thread::spawn(move || {
                for i in 1..=20_000 {
                    stats.record_hit("/a", i);
                }
            })
        };

        let sampler = {
            let stats = Arc::clone(&stats);
            std::thread::spawn(move || (0..500).map(|_| stats.sample()).sum::<u64>())
        };

        writer.join().unwrap();
        let sampled = sampler.join().unwrap() + stats.sample();

        assert_eq!(sampled, 20_000);
        assert_eq!(stats.total_hits(), 20_000);
    }
}
