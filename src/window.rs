/// Fixed-capacity circular buffer of per-interval hit counts.
///
/// The average always divides by the full capacity: slots that were never
/// written count as zero, so the average ramps up over the first window.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    slots: Vec<u64>,
    /// Index of the slot the next sample overwrites (the oldest)
    cursor: usize,
    ticks: u64,
}

impl SampleWindow {
    /// Panics if `capacity` is zero; configuration rejects that earlier.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sample window needs at least one slot");
        Self {
            slots: vec![0; capacity],
            cursor: 0,
            ticks: 0,
        }
    }

    /// Records `value` as the newest sample, overwriting the oldest.
    pub fn tick(&mut self, value: u64) {
        self.slots[self.cursor] = value;
        self.cursor = (self.cursor + 1) % self.slots.len();
        self.ticks += 1;
    }

    pub fn average(&self) -> f64 {
        self.sum() as f64 / self.slots.len() as f64
    }

    pub fn sum(&self) -> u64 {
        self.slots.iter().sum()
    }

    /// Total number of ticks since creation
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Whether every slot has been written at least once
    pub fn is_warm(&self) -> bool {
        self.ticks >= self.slots.len() as u64
    }

    /// Samples from oldest to newest
    pub fn samples(&self) -> impl Iterator<Item = u64> + '_ {
        let (newer, older) = self.slots.split_at(self.cursor);
        older.iter().chain(newer.iter()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_of_filled_window() {
        let cases: [([u64; 5], f64); 3] = [
            ([2, 2, 2, 2, 2], 2.0),
            ([20, 20, 20, 20, 20], 20.0),
            ([1, 2, 3, 4, 5], 3.0),
        ];

        for (samples, want) in cases {
            let mut window = SampleWindow::new(samples.len());
            for s in samples {
                window.tick(s);
            }
            assert_eq!(window.average(), want, "samples: {:?}", samples);
        }
    }

    #[test]
    fn test_unwritten_slots_count_as_zero() {
        let mut window = SampleWindow::new(60);
        window.tick(150);
        assert_eq!(window.average(), 2.5);
        assert!(!window.is_warm());

        let empty = SampleWindow::new(4);
        assert_eq!(empty.average(), 0.0);
    }

    #[test]
    fn test_oldest_sample_is_overwritten() {
        let mut window = SampleWindow::new(3);
        for s in [1, 2, 3, 4] {
            window.tick(s);
        }
        assert_eq!(window.samples().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(window.sum(), 9);
        assert_eq!(window.average(), 3.0);
        assert_eq!(window.ticks(), 4);
        assert!(window.is_warm());
    }

    #[test]
    fn test_spike_is_diluted_then_evicted() {
        let mut window = SampleWindow::new(60);
        window.tick(150);
        for _ in 0..59 {
            window.tick(0);
        }
        assert_eq!(window.average(), 2.5);

        window.tick(0);
        assert_eq!(window.average(), 0.0);
    }

    #[test]
    fn test_constant_value_average() {
        for v in [0, 1, 7, 1000] {
            let mut window = SampleWindow::new(60);
            for _ in 0..60 {
                window.tick(v);
            }
            assert_eq!(window.average(), v as f64);
        }
    }
}
