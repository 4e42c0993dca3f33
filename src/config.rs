use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    cache::{Cache, IsCache},
    error::{Error, Result},
    replace::{lru::Lru, random::Random},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Policy {
    Lru,
    Random,
}

impl From<&str> for Policy {
    /// `l` selects LRU, anything else random replacement.
    fn from(s: &str) -> Self {
        if s.starts_with('l') {
            Policy::Lru
        } else {
            Policy::Random
        }
    }
}

impl From<String> for Policy {
    fn from(s: String) -> Self {
        Policy::from(s.as_str())
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Lru => write!(f, "lru"),
            Policy::Random => write!(f, "random"),
        }
    }
}

/// Normalized cache shape. All three fields are what the cache is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub block_size: u64,
    pub sets: u64,
    pub ways: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Decimal kilobytes
    pub capacity_kb: u64,
    pub associativity: u64,
    pub block_size: u64,
    pub policy: Policy,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Config {
    pub fn from_json(s: &str) -> Result<Config> {
        Ok(serde_json::from_str(s)?)
    }

    /// Reads `<capacityKB> <associativity> <blockSize> <policy>`.
    pub fn from_free_args(args: &mut pico_args::Arguments) -> Result<Config> {
        let capacity_kb = args.free_from_str()?;
        let associativity = args.free_from_str()?;
        let block_size = args.free_from_str()?;
        let policy: String = args.free_from_str()?;
        Ok(Config {
            capacity_kb,
            associativity,
            block_size,
            policy: Policy::from(policy),
            seed: None,
        })
    }

    pub fn geometry(&self) -> Result<Geometry> {
        if self.capacity_kb == 0 || self.associativity == 0 || self.block_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "capacity, associativity and block size must be positive (got {}KB, {}, {})",
                self.capacity_kb, self.associativity, self.block_size
            )));
        }
        let overflow = || Error::InvalidConfig("cache dimensions overflow 64 bits".to_string());

        let block_size = self
            .block_size
            .checked_next_power_of_two()
            .ok_or_else(overflow)?;
        let bytes = self.capacity_kb.checked_mul(1000).ok_or_else(overflow)?;
        let set_bytes = self
            .associativity
            .checked_mul(block_size)
            .ok_or_else(overflow)?;
        let sets = bytes / set_bytes;
        if sets == 0 {
            return Err(Error::InvalidConfig(format!(
                "{}KB cannot hold a single set of {} x {} byte blocks",
                self.capacity_kb, self.associativity, block_size
            )));
        }
        let sets = sets.checked_next_power_of_two().ok_or_else(overflow)?;

        Ok(Geometry {
            block_size,
            sets,
            ways: self.associativity,
        })
    }

    pub fn to_cache(&self) -> Result<Box<dyn IsCache>> {
        let geo = self.geometry()?;
        let too_large = |_| Error::InvalidConfig("cache too large for this platform".to_string());
        let n_sets = usize::try_from(geo.sets).map_err(too_large)?;
        let n_ways = usize::try_from(geo.ways).map_err(too_large)?;
        info!(
            "{} cache: {} sets x {} ways x {} byte blocks",
            self.policy, n_sets, n_ways, geo.block_size
        );

        Ok(match self.policy {
            Policy::Lru => {
                Box::new(Cache::new(geo.block_size, n_sets, n_ways, Lru::new())) as Box<dyn IsCache>
            }
            Policy::Random => {
                let repl = match self.seed {
                    Some(seed) => Random::with_seed(seed),
                    None => Random::new(),
                };
                Box::new(Cache::new(geo.block_size, n_sets, n_ways, repl)) as Box<dyn IsCache>
            }
        })
    }
}
