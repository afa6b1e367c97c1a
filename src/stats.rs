use crate::sync::{Arc, Mutex};
use serde::{Deserialize, Serialize};

/// Shared handle to a core's counter block.
pub type Ref = Arc<Mutex<PerCore>>;

/// Per-core performance counters.
///
/// `load_latency` accumulates one cycle of waiting per outstanding load
/// lane per cycle, sampled at the top of the LSU tick (before same-cycle
/// completions are absorbed — downstream analyses rely on that
/// convention).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerCore {
    pub loads: u64,
    pub stores: u64,
    pub load_latency: u64,
}

impl PerCore {
    #[must_use]
    pub fn shared() -> Ref {
        Arc::new(Mutex::new(Self::default()))
    }
}

impl std::fmt::Display for PerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "loads={}, stores={}, load_latency={}",
            self.loads, self.stores, self.load_latency
        )
    }
}
