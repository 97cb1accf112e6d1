//! Bounded tracker of the most-hit sections
//!
//! Holds exactly `TOP_SLOTS` slots, initialised empty with zero hits. Each
//! update carries the live count of one section as returned by the hit table.

use serde::{Deserialize, Serialize};

pub const TOP_SLOTS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitRecord {
    pub section: String,
    pub hits: u64,
}

impl HitRecord {
    pub fn new(section: impl Into<String>, hits: u64) -> Self {
        Self {
            section: section.into(),
            hits,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits == 0 && self.section.is_empty()
    }
}

/// How a new count is placed into the slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// True top-N: a section holds at most one slot, the smallest slot is
    /// displaced, and slots stay sorted by descending hits.
    #[default]
    Ranked,
    /// Scan slots in order and overwrite the first one holding fewer hits.
    /// The same section may then occupy several slots and the order is not
    /// a ranking.
    FirstFit,
}

#[derive(Debug, Clone)]
pub struct TopSections {
    slots: [HitRecord; TOP_SLOTS],
    placement: Placement,
}

impl TopSections {
    pub fn new(placement: Placement) -> Self {
        Self {
            slots: Default::default(),
            placement,
        }
    }

    /// Offers the section's new live count. Returns the slot index that
    /// was written, if any.
    pub fn offer(&mut self, section: &str, hits: u64) -> Option<usize> {
        match self.placement {
            Placement::Ranked => self.offer_ranked(section, hits),
            Placement::FirstFit => self.offer_first_fit(section, hits),
        }
    }

    fn offer_first_fit(&mut self, section: &str, hits: u64) -> Option<usize> {
        let idx = self.slots.iter().position(|slot| slot.hits < hits)?;
        self.slots[idx] = HitRecord::new(section, hits);
        Some(idx)
    }

    fn offer_ranked(&mut self, section: &str, hits: u64) -> Option<usize> {
        let idx = match self.slots.iter().position(|slot| slot.section == section) {
            Some(idx) if self.slots[idx].hits < hits => idx,
            Some(_) => return None,
            None => {
                // Slots are sorted, so the last one holds the minimum
                let last = TOP_SLOTS - 1;
                if self.slots[last].hits >= hits {
                    return None;
                }
                self.slots[last] = HitRecord::new(section, hits);
                last
            }
        };

        self.slots[idx].hits = hits;

        // Bubble the updated record up to keep descending order
        let mut pos = idx;
        while pos > 0 && self.slots[pos - 1].hits < self.slots[pos].hits {
            self.slots.swap(pos - 1, pos);
            pos -= 1;
        }
        Some(pos)
    }

    /// All slots, including unfilled ones
    pub fn slots(&self) -> &[HitRecord; TOP_SLOTS] {
        &self.slots
    }

    /// Filled slots in slot order
    pub fn filled(&self) -> Vec<HitRecord> {
        self.slots
            .iter()
            .filter(|slot| !slot.is_empty())
            .cloned()
            .collect()
    }
}

impl Default for TopSections {
    fn default() -> Self {
        Self::new(Placement::default())
    }
}
