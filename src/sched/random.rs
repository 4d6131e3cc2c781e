use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Randomness seam for the clique preprocessor.
///
/// The engine is deterministic everywhere else; routing the two random
/// draws (clique choice, slot choice) through this trait makes runs
/// reproducible under a configured seed.
pub trait RandomGen {
    fn rand_in_range(&mut self, range: std::ops::Range<usize>) -> usize;

    fn rand_elem<T: Clone>(&mut self, elems: &[T]) -> T {
        let i = self.rand_in_range(0..elems.len());
        elems[i].clone()
    }
}

pub struct DefaultRndGen {
    thread_rng: rand::rngs::ThreadRng,
}

impl DefaultRndGen {
    pub fn new() -> Self {
        DefaultRndGen {
            thread_rng: rand::thread_rng(),
        }
    }
}

impl Default for DefaultRndGen {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomGen for DefaultRndGen {
    fn rand_in_range(&mut self, range: std::ops::Range<usize>) -> usize {
        self.thread_rng.gen_range(range)
    }
}

/// Seeded generator; identical seeds reproduce identical schedules.
pub struct SeededRndGen {
    rng: StdRng,
}

impl SeededRndGen {
    pub fn new(seed: u64) -> Self {
        SeededRndGen {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomGen for SeededRndGen {
    fn rand_in_range(&mut self, range: std::ops::Range<usize>) -> usize {
        self.rng.gen_range(range)
    }
}
