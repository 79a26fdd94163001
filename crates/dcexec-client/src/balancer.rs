use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dcexec_common::{DcexecError, Result};

/// How a [`Client`](crate::Client) picks the server for the next call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BalancePolicy {
    /// Each server in turn
    #[default]
    RoundRobin,
    /// `weights[i]` consecutive calls to server `i`, then the next server
    WeightedRoundRobin(Vec<u32>),
    /// The server with the fewest calls in flight, lowest index on ties
    LeastConnections,
}

impl fmt::Display for BalancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalancePolicy::RoundRobin => f.write_str("round-robin"),
            BalancePolicy::WeightedRoundRobin(weights) => {
                let weights: Vec<String> = weights.iter().map(u32::to_string).collect();
                write!(f, "weighted:{}", weights.join(","))
            }
            BalancePolicy::LeastConnections => f.write_str("least-connections"),
        }
    }
}

/// Accepts `round-robin`, `least-connections`, `weighted` (weights supplied
/// separately) and `weighted:2,1,3`.
impl FromStr for BalancePolicy {
    type Err = DcexecError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "round-robin" | "rr" => return Ok(BalancePolicy::RoundRobin),
            "least-connections" | "lc" => return Ok(BalancePolicy::LeastConnections),
            "weighted" => return Ok(BalancePolicy::WeightedRoundRobin(Vec::new())),
            _ => {}
        }

        match s.strip_prefix("weighted:") {
            Some(list) => list
                .split(',')
                .map(|w| {
                    w.trim()
                        .parse::<u32>()
                        .map_err(|_| DcexecError::Config(format!("invalid weight '{}'", w)))
                })
                .collect::<Result<Vec<_>>>()
                .map(BalancePolicy::WeightedRoundRobin),
            None => Err(DcexecError::Config(format!("unknown balance policy '{}'", s))),
        }
    }
}

enum Schedule {
    RoundRobin { cursor: AtomicUsize },
    /// Running totals of the weights; ticket `t` belongs to the first server
    /// whose running total exceeds `t % total`
    Weighted { cumulative: Vec<u64>, ticket: AtomicU64 },
    LeastConnections,
}

/// Selection state for one policy over a fixed number of servers.
///
/// Selection is lock-free: round-robin and weighted round-robin advance an
/// atomic ticket, least-connections reads the caller-supplied load of each
/// server.
pub struct Balancer {
    len: usize,
    schedule: Schedule,
}

impl Balancer {
    /// Validates `policy` against `len` servers.
    ///
    /// Weighted round-robin needs at least one server and exactly one weight
    /// of at least 1 per server.
    pub fn new(policy: &BalancePolicy, len: usize) -> Result<Self> {
        let schedule = match policy {
            BalancePolicy::RoundRobin => return Ok(Self::round_robin(len)),
            BalancePolicy::LeastConnections => Schedule::LeastConnections,
            BalancePolicy::WeightedRoundRobin(weights) => {
                if len == 0 || weights.is_empty() {
                    return Err(DcexecError::Config(
                        "weighted round-robin needs at least one server and weight".to_string(),
                    ));
                }
                if weights.len() != len {
                    return Err(DcexecError::Config(format!(
                        "{} weights given for {} servers",
                        weights.len(),
                        len
                    )));
                }
                if let Some(index) = weights.iter().position(|&w| w == 0) {
                    return Err(DcexecError::Config(format!(
                        "weight of server {} must be at least 1",
                        index
                    )));
                }
                let cumulative = weights
                    .iter()
                    .scan(0u64, |total, &w| {
                        *total += u64::from(w);
                        Some(*total)
                    })
                    .collect();
                Schedule::Weighted {
                    cumulative,
                    ticket: AtomicU64::new(0),
                }
            }
        };
        Ok(Self { len, schedule })
    }

    pub fn round_robin(len: usize) -> Self {
        Self {
            len,
            schedule: Schedule::RoundRobin {
                cursor: AtomicUsize::new(0),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the server for the next call, or `None` with no servers.
    ///
    /// `load(i)` is only consulted for least-connections, and only when
    /// there is more than one server.
    pub fn pick(&self, load: impl Fn(usize) -> usize) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let index = match &self.schedule {
            Schedule::RoundRobin { cursor } => cursor.fetch_add(1, Ordering::Relaxed) % self.len,
            Schedule::Weighted { cumulative, ticket } => {
                let total = cumulative.last().copied().unwrap_or(1);
                let slot = ticket.fetch_add(1, Ordering::Relaxed) % total;
                cumulative.partition_point(|&end| end <= slot)
            }
            Schedule::LeastConnections => {
                if self.len == 1 {
                    0
                } else {
                    // min_by_key keeps the first of equal minimums
                    (0..self.len).min_by_key(|&i| load(i)).unwrap_or(0)
                }
            }
        };
        Some(index)
    }
}

impl fmt::Debug for Balancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.schedule {
            Schedule::RoundRobin { .. } => "round-robin",
            Schedule::Weighted { .. } => "weighted",
            Schedule::LeastConnections => "least-connections",
        };
        f.debug_struct("Balancer")
            .field("len", &self.len)
            .field("schedule", &kind)
            .finish()
    }
}
