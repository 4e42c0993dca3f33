use crate::cache::Block;

use super::Replace;

/// Evicts the least recently used slot and pushes the new block to the front.
#[derive(Debug, Default)]
pub struct Lru {}

impl Lru {
    pub fn new() -> Self {
        Lru {}
    }
}

impl Replace for Lru {
    fn select_victim(&mut self, blocks: &[Block]) -> usize {
        blocks.len() - 1
    }

    fn install(&self, blocks: &mut [Block], victim: usize, block: Block) {
        blocks[..=victim].rotate_right(1);
        blocks[0] = block;
    }
}
