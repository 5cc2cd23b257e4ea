//! Sliding-window median over the most recent throughput samples.

/// Number of samples in the window. Odd, so the median is a single slot.
pub const WINDOW_SIZE: usize = 19;

/// Fixed-size median filter.
///
/// `sorted` and `ring` always hold the same multiset of values. The ring
/// remembers arrival order so the oldest value can be evicted; the sorted view
/// is repaired with a single insertion-sort pass per observation, which keeps
/// the median readable in constant time.
#[derive(Debug, Clone)]
pub struct MedianWindow {
    sorted: [u64; WINDOW_SIZE],
    ring: [u64; WINDOW_SIZE],
    cursor: usize,
}

impl MedianWindow {
    pub fn new() -> Self {
        Self {
            sorted: [0; WINDOW_SIZE],
            ring: [0; WINDOW_SIZE],
            cursor: 0,
        }
    }

    /// Ingest one sample and return the new median.
    pub fn observe(&mut self, value: u64) -> u64 {
        self.cursor += 1;
        if self.cursor >= WINDOW_SIZE {
            self.cursor = 0;
        }

        let evicted = std::mem::replace(&mut self.ring[self.cursor], value);

        // The evicted value is always present in the sorted view.
        let mut i = self
            .sorted
            .iter()
            .position(|&v| v == evicted)
            .unwrap_or(WINDOW_SIZE / 2);

        if value < evicted {
            while i > 0 && value < self.sorted[i - 1] {
                self.sorted[i] = self.sorted[i - 1];
                i -= 1;
            }
        } else {
            while i < WINDOW_SIZE - 1 && value > self.sorted[i + 1] {
                self.sorted[i] = self.sorted[i + 1];
                i += 1;
            }
        }

        self.sorted[i] = value;
        self.median()
    }

    pub fn median(&self) -> u64 {
        self.sorted[WINDOW_SIZE / 2]
    }

    /// Window contents in ascending order.
    pub fn sorted(&self) -> &[u64; WINDOW_SIZE] {
        &self.sorted
    }

    /// Window contents in ring order.
    pub fn ring(&self) -> &[u64; WINDOW_SIZE] {
        &self.ring
    }
}

impl Default for MedianWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Small LCG so the sliding-window checks are reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: u64) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (self.0 >> 33) % bound
        }
    }

    fn reference_median(recent: &VecDeque<u64>) -> u64 {
        let mut values: Vec<u64> = recent.iter().copied().collect();
        values.sort_unstable();
        values[WINDOW_SIZE / 2]
    }

    #[test]
    fn test_starts_at_zero() {
        let window = MedianWindow::new();
        assert_eq!(window.median(), 0);
        assert!(window.sorted().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_zero_bias_until_half_full() {
        let mut window = MedianWindow::new();
        for _ in 0..WINDOW_SIZE / 2 {
            assert_eq!(window.observe(1000), 0);
        }
        assert_eq!(window.observe(1000), 1000);
    }

    #[test]
    fn test_matches_reference_median() {
        for seed in [1, 42, 9_001] {
            let mut rng = Lcg(seed);
            let mut window = MedianWindow::new();
            let mut recent: VecDeque<u64> = std::iter::repeat_n(0, WINDOW_SIZE).collect();

            for _ in 0..500 {
                // Narrow range so duplicates are common.
                let value = rng.next(40);
                recent.pop_front();
                recent.push_back(value);
                assert_eq!(window.observe(value), reference_median(&recent));
            }
        }
    }

    #[test]
    fn test_sorted_view_is_permutation_of_ring() {
        let mut rng = Lcg(7);
        let mut window = MedianWindow::new();

        for _ in 0..300 {
            window.observe(rng.next(10_000));

            let sorted = window.sorted();
            assert!(sorted.windows(2).all(|pair| pair[0] <= pair[1]));

            let mut ring = *window.ring();
            ring.sort_unstable();
            assert_eq!(&ring, sorted);
        }
    }

    #[test]
    fn test_equal_values_are_stable() {
        let mut window = MedianWindow::new();
        for _ in 0..WINDOW_SIZE * 3 {
            window.observe(5);
        }
        assert_eq!(window.median(), 5);
        assert!(window.sorted().iter().all(|&v| v == 5));
    }

    #[test]
    fn test_outlier_resistance() {
        let mut window = MedianWindow::new();
        for _ in 0..WINDOW_SIZE {
            window.observe(1000);
        }
        assert_eq!(window.observe(1_000_000), 1000);
        assert_eq!(window.observe(0), 1000);
    }
}
