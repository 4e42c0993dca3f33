use crate::cache::Block;

use super::Replace;

/// Evicts a uniformly chosen slot. The generator is owned by the policy so a
/// seeded run is reproducible.
#[derive(Debug)]
pub struct Random {
    rng: fastrand::Rng,
}

impl Random {
    pub fn new() -> Self {
        Random {
            rng: fastrand::Rng::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Random {
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl Replace for Random {
    fn select_victim(&mut self, blocks: &[Block]) -> usize {
        self.rng.usize(0..blocks.len())
    }

    fn install(&self, blocks: &mut [Block], victim: usize, block: Block) {
        blocks[victim] = block;
    }
}
