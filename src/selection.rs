use crate::counts::PlayCounts;
use crate::model::PlaybackMode;
use crate::queue::PlaybackQueue;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Picks the title that plays after the current one.
#[derive(Debug)]
pub struct SelectionEngine {
    rng: SmallRng,
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// The queue always wins; otherwise `mode` decides. `None` means there is
    /// nothing to play.
    pub fn select_next(
        &mut self,
        mode: PlaybackMode,
        titles: &[String],
        current: Option<&str>,
        queue: &mut PlaybackQueue,
        counts: &PlayCounts,
    ) -> Option<String> {
        if let Some(queued) = queue.dequeue() {
            return Some(queued);
        }

        match mode {
            PlaybackMode::Sequential => sequential_after(titles, current),
            PlaybackMode::Repeat => match current {
                Some(title) => Some(title.to_string()),
                // nothing played yet: start from the top
                None => titles.first().cloned(),
            },
            PlaybackMode::WeightedRandom => self.weighted_pick(titles, counts),
        }
    }

    fn weighted_pick(&mut self, titles: &[String], counts: &PlayCounts) -> Option<String> {
        if titles.is_empty() {
            return None;
        }

        // same odds as drawing from a pool holding each title `weight` times,
        // without materialising the pool
        let weighted = weights(titles, counts);
        let total: u128 = weighted.iter().map(|(_, weight)| u128::from(*weight)).sum();
        if total == 0 {
            return titles.first().cloned();
        }

        let mut ticket = self.rng.random_range(0..total);
        for (title, weight) in weighted {
            let weight = u128::from(weight);
            if ticket < weight {
                return Some(title.to_string());
            }
            ticket -= weight;
        }
        titles.first().cloned()
    }
}

/// Inverse play-count weights: `1 + max(count) - count(title)`. The most
/// played title gets weight 1, a never played one gets the maximum.
pub fn weights<'a>(titles: &'a [String], counts: &PlayCounts) -> Vec<(&'a str, u64)> {
    let max_count = titles
        .iter()
        .map(|title| counts.get(title).saturating_add(1))
        .fold(1, u64::max);

    titles
        .iter()
        .map(|title| (title.as_str(), max_count - counts.get(title)))
        .collect()
}

/// Next title by position, wrapping past the end. An unknown `current`
/// behaves like position -1, so the first title comes next.
pub fn sequential_after(titles: &[String], current: Option<&str>) -> Option<String> {
    if titles.is_empty() {
        return None;
    }
    let next = match position_of(titles, current) {
        Some(index) => (index + 1) % titles.len(),
        None => 0,
    };
    titles.get(next).cloned()
}

/// Previous title by position, wrapping from the first to the last.
pub fn sequential_before(titles: &[String], current: Option<&str>) -> Option<String> {
    let last = titles.len().checked_sub(1)?;
    let previous = match position_of(titles, current) {
        Some(0) | None => last,
        Some(index) => index - 1,
    };
    titles.get(previous).cloned()
}

fn position_of(titles: &[String], current: Option<&str>) -> Option<usize> {
    let current = current?;
    titles.iter().position(|title| title == current)
}
