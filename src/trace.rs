use crate::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use crate::sync::Arc;
use crate::types::Op;
use bitvec::{array::BitArray, BitArr};

/// Maximum number of threads per warp.
pub const MAX_THREADS: usize = 32;

/// Maximum number of warps per core.
pub const MAX_WARPS: usize = 32;

/// Thread active mask.
///
/// Bit `i` selects thread `i` of the warp for the current instruction.
pub type ThreadMask = BitArr!(for MAX_THREADS, in u32);

/// Shared handle to an in-flight trace.
///
/// Traces move between ports and the LSU pending table; they are
/// refcounted immutable records, freed when the writeback collector drops
/// the last handle.
pub type Ref = Arc<Trace>;

pub fn next_uuid() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// One decoded micro-op in flight through the back-end.
///
/// The back-end models timing and resource occupancy only; operand values
/// never appear here. `payload` carries the class-specific arguments the
/// issuing front-end attached.
#[derive(Debug)]
pub struct Trace {
    pub uuid: u64,
    /// Originating core.
    pub cid: usize,
    /// Originating warp.
    pub wid: usize,
    /// Partial-issue index within the warp.
    pub pid: usize,
    pub tmask: ThreadMask,
    /// Last partial issue of its logical instruction.
    pub eop: bool,
    /// The front-end suspended the warp pending this op's retirement.
    pub fetch_stall: bool,
    pub op: Op,
    pub payload: Payload,
    logged: AtomicBool,
}

/// Class-specific trace payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    None,
    /// Per-thread effective addresses, indexed by thread id.
    Mem { addrs: Vec<u64> },
    /// Warp-control arguments (WSPAWN, BAR).
    Control { arg1: u64, arg2: u64 },
    Raster { unit: usize },
    Tex { unit: usize },
    Om { unit: usize },
}

impl Trace {
    /// Swap the diagnostic debounce latch, returning its previous value.
    ///
    /// Used to surface a queue-full stall exactly once per episode.
    pub fn log_once(&self, value: bool) -> bool {
        self.logged.swap(value, Ordering::Relaxed)
    }
}

impl std::fmt::Display for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cid={}, wid={}, pid={}, tmask=0b{:b}, eop={}, op={} (#{})",
            self.cid,
            self.wid,
            self.pid,
            self.tmask.as_raw_slice()[0],
            self.eop,
            self.op,
            self.uuid,
        )
    }
}

pub struct Builder {
    pub uuid: Option<u64>,
    pub cid: usize,
    pub wid: usize,
    pub pid: usize,
    pub tmask: ThreadMask,
    pub eop: bool,
    pub fetch_stall: bool,
    pub op: Op,
    pub payload: Payload,
}

impl Builder {
    #[must_use]
    pub fn new(op: Op) -> Self {
        Self {
            uuid: None,
            cid: 0,
            wid: 0,
            pid: 0,
            tmask: BitArray::ZERO,
            eop: true,
            fetch_stall: false,
            op,
            payload: Payload::None,
        }
    }

    #[must_use]
    pub fn build(self) -> Ref {
        Arc::new(Trace {
            uuid: self.uuid.unwrap_or_else(next_uuid),
            cid: self.cid,
            wid: self.wid,
            pid: self.pid,
            tmask: self.tmask,
            eop: self.eop,
            fetch_stall: self.fetch_stall,
            op: self.op,
            payload: self.payload,
            logged: AtomicBool::new(false),
        })
    }
}
