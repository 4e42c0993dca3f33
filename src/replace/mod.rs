pub mod lru;
pub mod random;

use crate::cache::Block;

/// Decides which slot of a full set gives way to an incoming block.
pub trait Replace {
    fn select_victim(&mut self, blocks: &[Block]) -> usize;
    /// Places `block` into the set where `victim` used to be.
    fn install(&self, blocks: &mut [Block], victim: usize, block: Block);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessResult {
    Hit,
    Miss,
}
