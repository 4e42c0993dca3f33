use std::fmt;

use serde::Serialize;

use crate::{config::Geometry, replace::AccessResult, trace::Op};

/// Per-run counters. Only hits and misses reported by the cache move them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub read_accesses: u64,
    pub write_accesses: u64,
    pub read_misses: u64,
    pub write_misses: u64,
}

impl Stats {
    pub fn record(&mut self, op: Op, result: AccessResult) {
        let (accesses, misses) = match op {
            Op::Read => (&mut self.read_accesses, &mut self.read_misses),
            Op::Write => (&mut self.write_accesses, &mut self.write_misses),
        };
        *accesses += 1;
        if result == AccessResult::Miss {
            *misses += 1;
        }
    }

    pub fn clear(&mut self) {
        *self = Stats::default();
    }

    pub fn accesses(&self) -> u64 {
        self.read_accesses + self.write_accesses
    }

    pub fn report(&self) -> Report {
        Report {
            total: Category::new(self.accesses(), self.read_misses + self.write_misses),
            read: Category::new(self.read_accesses, self.read_misses),
            write: Category::new(self.write_accesses, self.write_misses),
        }
    }
}

/// Miss percentage, 0 when nothing was accessed.
pub fn miss_percent(misses: u64, accesses: u64) -> f64 {
    if accesses == 0 {
        0.0
    } else {
        misses as f64 / accesses as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Category {
    pub accesses: u64,
    pub misses: u64,
    pub miss_percent: f64,
}

impl Category {
    fn new(accesses: u64, misses: u64) -> Self {
        Category {
            accesses,
            misses,
            miss_percent: miss_percent(misses, accesses),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Report {
    pub total: Category,
    pub read: Category,
    pub write: Category,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6}% {} {:.6}% {} {:.6}%",
            self.total.misses,
            self.total.miss_percent,
            self.read.misses,
            self.read.miss_percent,
            self.write.misses,
            self.write.miss_percent
        )
    }
}

/// What `--json` writes.
#[derive(Serialize)]
pub struct RunSummary {
    pub policy: String,
    pub geometry: Geometry,
    #[serde(flatten)]
    pub report: Report,
}
