//! Block selection strategies
//!
//! A strategy only decides where a sweep starts. Rotating the start point
//! keeps low-index DataNodes from being drained first on every allocation.
//! Every registry owns its own strategy instance, so sweeps over registries of
//! different sizes never disturb each other's rotation.

use crossbeam::utils::CachePadded;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Configured selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    #[default]
    RoundRobin,
    Random,
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "roundrobin" | "round-robin" | "round_robin" => Ok(SelectionPolicy::RoundRobin),
            "random" => Ok(SelectionPolicy::Random),
            _ => Err(format!(
                "Invalid block selection '{}'. Valid options: roundrobin, random",
                s
            )),
        }
    }
}

// Config files get the same case-insensitive parsing as the CLI
impl<'de> Deserialize<'de> for SelectionPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::RoundRobin => write!(f, "roundrobin"),
            SelectionPolicy::Random => write!(f, "random"),
        }
    }
}

/// Start-index picker of one registry
#[derive(Debug)]
pub enum BlockSelection {
    /// Monotonic counter, reduced modulo the size on every read
    RoundRobin { counter: CachePadded<AtomicU64> },
    /// Uniform pick from the calling thread's RNG
    Random,
}

impl BlockSelection {
    pub fn new(policy: SelectionPolicy) -> Self {
        match policy {
            SelectionPolicy::RoundRobin => Self::round_robin_from(0),
            SelectionPolicy::Random => BlockSelection::Random,
        }
    }

    /// Round-robin selection whose counter starts at `start`
    pub fn round_robin_from(start: u64) -> Self {
        BlockSelection::RoundRobin {
            counter: CachePadded::new(AtomicU64::new(start)),
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        match self {
            BlockSelection::RoundRobin { .. } => SelectionPolicy::RoundRobin,
            BlockSelection::Random => SelectionPolicy::Random,
        }
    }

    /// Pick a start index in `[0, size)`
    ///
    /// `size` must be non-zero. The round-robin counter advances by one per
    /// call and wraps at `u64::MAX`; only the returned value is reduced, so
    /// consecutive calls with the same size visit every index once before
    /// repeating, whatever sizes earlier calls used.
    pub fn get_next(&self, size: usize) -> usize {
        debug_assert!(size > 0, "selection over an empty pool");
        let size = size.max(1) as u64;
        match self {
            BlockSelection::RoundRobin { counter } => {
                (counter.fetch_add(1, Ordering::Relaxed) % size) as usize
            }
            BlockSelection::Random => rand::thread_rng().gen_range(0..size) as usize,
        }
    }
}
