use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform choice among eligible candidates. Injected so that tests can pin
/// the sequence and assert set membership.
pub trait RandomSource: Send + Sync {
    /// Index in `0..len`; `len` is never zero.
    fn pick_index(&self, len: usize) -> usize;
}

pub fn choose<'a, T>(random: &dyn RandomSource, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    items.get(random.pick_index(items.len()))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick_index(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn pick_index(&self, len: usize) -> usize {
        self.rng.lock().random_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let a = SeededRandom::new(7);
        let b = SeededRandom::new(7);
        let xs: Vec<_> = (0..16).map(|_| a.pick_index(10)).collect();
        let ys: Vec<_> = (0..16).map(|_| b.pick_index(10)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|&i| i < 10));
    }

    #[test]
    fn choose_empty_is_none() {
        let items: [u8; 0] = [];
        assert!(choose(&ThreadRandom, &items).is_none());
        assert_eq!(choose(&ThreadRandom, &[3]), Some(&3));
    }
}
