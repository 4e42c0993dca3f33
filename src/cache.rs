use log::debug;

use crate::replace::{AccessResult, Replace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addr {
    pub set: usize,
    pub tag: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct BitSection {
    shift: u32,
    mask: u64,
}

impl BitSection {
    fn apply(&self, num: u64) -> u64 {
        num.checked_shr(self.shift).unwrap_or(0) & self.mask
    }
}

/// Decodes `address` into `(tag, set index)`. Offset bits are dropped.
pub fn decode(address: u64, block_bits: u32, set_bits: u32) -> (u64, u64) {
    let set_sec = BitSection {
        shift: block_bits,
        mask: (1u64 << set_bits) - 1,
    };
    let tag_sec = BitSection {
        shift: block_bits + set_bits,
        mask: u64::MAX,
    };
    (tag_sec.apply(address), set_sec.apply(address))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub valid: bool,
    pub tag: u64,
}

impl Block {
    pub fn new(tag: u64) -> Self {
        Block { valid: true, tag }
    }

    pub fn holds(&self, tag: u64) -> bool {
        self.valid && self.tag == tag
    }
}

/// One associativity group. Slot 0 is the most recently used entry and the
/// last slot the least recently used one. The length never changes.
#[derive(Debug, Clone)]
pub struct Set {
    blocks: Box<[Block]>,
}

impl Set {
    pub fn new(n_ways: usize) -> Self {
        Set {
            blocks: vec![Block::default(); n_ways].into_boxed_slice(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn lookup_or_insert<R: Replace>(&mut self, tag: u64, repl: &mut R) -> AccessResult {
        // First, look for a hit
        if let Some(way) = self.blocks.iter().position(|b| b.holds(tag)) {
            self.blocks[..=way].rotate_right(1);
            return AccessResult::Hit;
        }

        // Its a miss, fill a vacant slot if there is one
        let block = Block::new(tag);
        if let Some(vacant) = self.blocks.iter().position(|b| !b.valid) {
            self.blocks[..=vacant].rotate_right(1);
            self.blocks[0] = block;
        } else {
            let victim = repl.select_victim(&self.blocks);
            debug!(
                "evict tag {:#x} from way {} for tag {:#x}",
                self.blocks[victim].tag, victim, tag
            );
            repl.install(&mut self.blocks, victim, block);
        }
        AccessResult::Miss
    }
}

#[derive(Debug)]
pub struct Cache<R: Replace> {
    pub sets: Vec<Set>,
    block_bits: u32,
    set_bits: u32,
    pub repl: R,
}

impl<R: Replace> Cache<R> {
    pub fn new(block_size: u64, n_sets: usize, n_ways: usize, repl: R) -> Self {
        assert!(n_ways > 0);
        assert!(block_size.is_power_of_two());
        assert!(n_sets.is_power_of_two());

        Cache {
            sets: vec![Set::new(n_ways); n_sets],
            block_bits: block_size.ilog2(),
            set_bits: n_sets.ilog2(),
            repl,
        }
    }
}

pub trait IsCache {
    fn access(&mut self, addr: u64) -> AccessResult;
    fn split_addr(&self, addr: u64) -> Addr;
    fn set(&self, set: usize) -> &Set;
    fn n_sets(&self) -> usize;

    /// Number of valid blocks across all sets.
    fn resident(&self) -> usize {
        (0..self.n_sets())
            .map(|s| self.set(s).blocks().iter().filter(|b| b.valid).count())
            .sum()
    }
}

impl<R: Replace> IsCache for Cache<R> {
    fn access(&mut self, addr: u64) -> AccessResult {
        let addr = self.split_addr(addr);
        self.sets[addr.set].lookup_or_insert(addr.tag, &mut self.repl)
    }

    fn split_addr(&self, addr: u64) -> Addr {
        let (tag, set) = decode(addr, self.block_bits, self.set_bits);
        Addr {
            set: set as usize,
            tag,
        }
    }

    fn set(&self, set: usize) -> &Set {
        &self.sets[set]
    }

    fn n_sets(&self) -> usize {
        self.sets.len()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::replace::{lru::Lru, random::Random};

    fn tags(set: &Set) -> Vec<Option<u64>> {
        set.blocks()
            .iter()
            .map(|b| b.valid.then_some(b.tag))
            .collect()
    }

    fn run<C: IsCache>(cache: &mut C, addrs: &[u64]) -> Vec<AccessResult> {
        addrs.iter().map(|&a| cache.access(a)).collect()
    }

    use AccessResult::{Hit, Miss};

    #[test]
    fn decode_splits_tag_and_set() {
        // 16 byte blocks, 4 sets
        assert_eq!(decode(0x1234, 4, 2), (0x48, 0x3));
        assert_eq!(decode(0xf, 4, 2), (0, 0));
        assert_eq!(decode(u64::MAX, 0, 0), (u64::MAX, 0));
        assert_eq!(decode(u64::MAX, 63, 0), (1, 0));
    }

    #[test]
    fn lru_capacity_miss_sequence() {
        let mut cache = Cache::new(1, 1, 2, Lru::new());
        assert_eq!(run(&mut cache, &[0, 1, 2]), vec![Miss, Miss, Miss]);
        assert_eq!(tags(cache.set(0)), vec![Some(2), Some(1)]);
        assert_eq!(cache.access(0), Miss);
    }

    #[test]
    fn resident_counts_valid_blocks() {
        let mut cache = Cache::new(4, 2, 2, Lru::new());
        assert_eq!(cache.resident(), 0);
        run(&mut cache, &[0x0, 0x4, 0x8, 0x10, 0x0]);
        // set 0 holds tags 0 and 2, set 1 holds tag 0
        assert_eq!(cache.resident(), 3);
    }

    #[test]
    fn direct_mapped_conflict() {
        let mut cache = Cache::new(1, 1, 1, Lru::new());
        assert_eq!(run(&mut cache, &[5, 5, 6]), vec![Miss, Hit, Miss]);
    }

    #[test]
    fn hit_moves_to_front() {
        let mut cache = Cache::new(1, 1, 4, Lru::new());
        run(&mut cache, &[1, 2, 3]);
        assert_eq!(tags(cache.set(0)), vec![Some(3), Some(2), Some(1), None]);
        assert_eq!(cache.access(1), Hit);
        assert_eq!(tags(cache.set(0)), vec![Some(1), Some(3), Some(2), None]);
        run(&mut cache, &[4, 5]);
        // 2 was least recently used
        assert_eq!(tags(cache.set(0)), vec![Some(5), Some(4), Some(1), Some(3)]);
    }

    #[test]
    fn offset_bits_share_a_block() {
        let mut cache = Cache::new(8, 2, 1, Lru::new());
        assert_eq!(run(&mut cache, &[0x10, 0x17, 0x18, 0x1f]), vec![Miss, Hit, Miss, Hit]);
        assert_eq!(cache.split_addr(0x18), Addr { set: 1, tag: 1 });
    }

    #[test]
    fn random_fills_vacant_slots_before_evicting() {
        let mut cache = Cache::new(1, 1, 4, Random::with_seed(7));
        assert_eq!(run(&mut cache, &[1, 2, 3, 4]), vec![Miss; 4]);
        assert_eq!(run(&mut cache, &[1, 2, 3, 4]), vec![Hit; 4]);
        assert_eq!(cache.access(9), Miss);
        let resident = tags(cache.set(0));
        assert!(resident.contains(&Some(9)));
        assert_eq!(resident.iter().filter(|t| t.is_some()).count(), 4);
    }

    #[test]
    fn random_replaces_in_place() {
        let mut cache = Cache::new(1, 1, 3, Random::with_seed(1));
        run(&mut cache, &[1, 2, 3]);
        let before = tags(cache.set(0));
        cache.access(4);
        let after = tags(cache.set(0));
        let changed: Vec<_> = (0..3).filter(|&i| before[i] != after[i]).collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(after[changed[0]], Some(4));
    }

    #[test]
    fn seeded_random_is_reproducible() {
        let addrs: Vec<u64> = (0..200).map(|i| (i * 7919) % 37).collect();
        let mut a = Cache::new(1, 2, 4, Random::with_seed(42));
        let mut b = Cache::new(1, 2, 4, Random::with_seed(42));
        assert_eq!(run(&mut a, &addrs), run(&mut b, &addrs));
    }

    proptest! {
        #[test]
        fn decode_fields_are_disjoint(addr: u64, block_bits in 0u32..32, set_bits in 0u32..32) {
            let (tag, set) = decode(addr, block_bits, set_bits);
            let line = addr >> block_bits;
            prop_assert!(set < (1u64 << set_bits));
            prop_assert_eq!((tag << set_bits) | set, line);
            prop_assert_eq!(decode(addr, block_bits, set_bits), (tag, set));
        }

        #[test]
        fn sets_keep_their_invariants(
            addrs in prop::collection::vec(0u64..64, 1..300),
            ways in 1usize..6,
            lru: bool,
        ) {
            let mut lru_cache = Cache::new(2, 2, ways, Lru::new());
            let mut rnd_cache = Cache::new(2, 2, ways, Random::with_seed(3));
            let cache: &mut dyn IsCache = if lru { &mut lru_cache } else { &mut rnd_cache };
            for &addr in &addrs {
                cache.access(addr);
                let target = cache.split_addr(addr);
                let set = cache.set(target.set);
                prop_assert_eq!(set.blocks().len(), ways);
                if lru {
                    prop_assert!(set.blocks()[0].holds(target.tag));
                } else {
                    prop_assert!(set.blocks().iter().any(|b| b.holds(target.tag)));
                }
                let mut valid: Vec<u64> = set.blocks().iter().filter(|b| b.valid).map(|b| b.tag).collect();
                valid.sort_unstable();
                let n = valid.len();
                valid.dedup();
                prop_assert_eq!(valid.len(), n);
            }
        }

        #[test]
        fn repeated_access_hits(addr: u64, lru: bool) {
            let mut lru_cache = Cache::new(4, 4, 2, Lru::new());
            let mut rnd_cache = Cache::new(4, 4, 2, Random::with_seed(9));
            let cache: &mut dyn IsCache = if lru { &mut lru_cache } else { &mut rnd_cache };
            cache.access(addr);
            let set = cache.split_addr(addr).set;
            let resident = cache.set(set).blocks().iter().filter(|b| b.valid).count();
            prop_assert_eq!(cache.access(addr), Hit);
            prop_assert_eq!(cache.access(addr), Hit);
            prop_assert_eq!(cache.set(set).blocks().iter().filter(|b| b.valid).count(), resident);
        }
    }
}
