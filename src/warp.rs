use crate::sync::{Arc, Mutex};
use crate::trace::MAX_WARPS;
use bitvec::{array::BitArray, BitArr};
use std::collections::HashMap;

/// Per-core warp mask.
pub type WarpMask = BitArr!(for MAX_WARPS, in u32);

/// Warp-scheduler callbacks the back-end fires on retirement events.
///
/// `wspawn` and `barrier` return whether the initiating warp may be
/// resumed immediately; the caller combines that with the trace's
/// end-of-packet flag.
pub trait Scheduler {
    /// Un-suspend a warp that was parked on `fetch_stall`.
    fn resume(&mut self, wid: usize);

    fn wspawn(&mut self, count: u64, pc: u64) -> bool;

    fn barrier(&mut self, id: u64, count: u64, wid: usize) -> bool;
}

pub type SchedulerRef = Arc<Mutex<dyn Scheduler>>;

/// Reference warp table.
///
/// Tracks active and suspended warps so the hosting front-end (the demo
/// driver, the integration tests) has a working collaborator. Real
/// front-ends supply their own `Scheduler`.
#[derive(Debug, Default)]
pub struct Table {
    pub active: WarpMask,
    pub suspended: WarpMask,
    barriers: HashMap<u64, WarpMask>,
}

impl Table {
    #[must_use]
    pub fn new(num_warps: usize) -> Self {
        assert!(num_warps <= MAX_WARPS);
        let mut active: WarpMask = BitArray::ZERO;
        for wid in 0..num_warps {
            active.set(wid, true);
        }
        Self {
            active,
            suspended: BitArray::ZERO,
            barriers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn shared(num_warps: usize) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new(num_warps)))
    }

    pub fn suspend(&mut self, wid: usize) {
        self.suspended.set(wid, true);
    }

    #[must_use]
    pub fn is_ready(&self, wid: usize) -> bool {
        self.active[wid] && !self.suspended[wid]
    }
}

impl Scheduler for Table {
    fn resume(&mut self, wid: usize) {
        log::debug!("warp-table: resume wid={wid}");
        self.suspended.set(wid, false);
    }

    fn wspawn(&mut self, count: u64, pc: u64) -> bool {
        log::debug!("warp-table: wspawn count={count} pc={pc:#x}");
        let count = (count as usize).min(MAX_WARPS);
        for wid in 0..count {
            self.active.set(wid, true);
        }
        true
    }

    fn barrier(&mut self, id: u64, count: u64, wid: usize) -> bool {
        let waiting = self.barriers.entry(id).or_default();
        waiting.set(wid, true);
        if waiting.count_ones() as u64 == count {
            let released = self.barriers.remove(&id).unwrap_or_default();
            // release everyone that arrived earlier; the initiator is
            // resumed by the caller
            for other in released.iter_ones().filter(|other| *other != wid) {
                self.suspended.set(other, false);
            }
            log::debug!(
                "warp-table: barrier id={id} released=0b{:b}",
                released.as_raw_slice()[0]
            );
            true
        } else {
            false
        }
    }
}
