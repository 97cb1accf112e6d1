use dashmap::DashMap;

/// Per-section hit counts. Counts only grow and sections are never removed.
#[derive(Debug, Default)]
pub struct SectionHits {
    counts: DashMap<String, u64>,
}

impl SectionHits {
    pub fn new() -> Self {
        Self {
            counts: DashMap::new(),
        }
    }

    /// Increments the section and returns its post-increment count.
    ///
    /// The read-modify-write happens under the shard lock for the key, so
    /// concurrent callers never lose an increment.
    pub fn increment(&self, section: &str) -> u64 {
        if let Some(mut count) = self.counts.get_mut(section) {
            *count += 1;
            return *count;
        }

        let mut count = self.counts.entry(section.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn get(&self, section: &str) -> u64 {
        self.counts.get(section).map(|c| *c).unwrap_or(0)
    }

    /// Number of distinct sections seen
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|entry| *entry.value()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increment_returns_new_count() {
        let hits = SectionHits::new();
        assert_eq!(hits.increment("/tags"), 1);
        assert_eq!(hits.increment("/tags"), 2);
        assert_eq!(hits.increment("/articles"), 1);
        assert_eq!(hits.get("/tags"), 2);
        assert_eq!(hits.get("/missing"), 0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits.total(), 3);
    }

    #[test]
    fn test_concurrent_increments() {
        let hits = Arc::new(SectionHits::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let hits = Arc::clone(&hits);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        hits.increment("/shared");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(hits.get("/shared"), 8000);
    }
}
