use crate::trace::MAX_THREADS;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("issue width must be at least 1")]
    ZeroIssueWidth,

    #[error("LSU bank count must be at least 1")]
    ZeroLsuBlocks,

    #[error("LSU lane count {0} must be a power of two no larger than {MAX_THREADS}")]
    BadLaneCount(usize),

    #[error("pending table needs at least one slot per bank")]
    ZeroQueueSize,

    #[error("IO window [{base:#x}, {end:#x}) is empty or inverted")]
    BadIoWindow { base: u64, end: u64 },

    #[error("local-memory window at {base:#x} is shadowed by the IO window")]
    LmemShadowedByIo { base: u64 },
}

/// Core configuration.
///
/// One instance is shared (`Arc<Config>`) across every unit of a core.
/// Defaults carry the stock values; `validate` rejects combinations the
/// fabric cannot express.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Issue lanes per functional unit.
    pub issue_width: usize,
    /// Independent load/store banks.
    pub num_lsu_blocks: usize,
    /// Memory lanes per LSU bank.
    pub num_lsu_lanes: usize,
    /// Outstanding-load slots per LSU bank.
    pub lsu_queue_size: usize,

    /// Integer register width; also the iterative divide latency.
    pub xlen: u64,
    pub latency_imul: u64,
    pub latency_fma: u64,
    pub latency_fdiv: u64,
    pub latency_fsqrt: u64,
    pub latency_fcvt: u64,

    pub io_base_addr: u64,
    pub io_end_addr: u64,
    pub lmem_enabled: bool,
    pub lmem_base_addr: u64,
    pub lmem_log_size: u32,

    pub num_raster_units: usize,
    pub num_tex_units: usize,
    pub num_om_units: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            issue_width: 4,
            num_lsu_blocks: 1,
            num_lsu_lanes: 4,
            lsu_queue_size: 16,
            xlen: 32,
            latency_imul: 4,
            latency_fma: 4,
            latency_fdiv: 16,
            latency_fsqrt: 16,
            latency_fcvt: 8,
            io_base_addr: 0xFF00_0000,
            io_end_addr: 0x1_0000_0000,
            lmem_enabled: true,
            lmem_base_addr: 0x7000_0000,
            lmem_log_size: 14,
            num_raster_units: 1,
            num_tex_units: 1,
            num_om_units: 1,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        if self.issue_width == 0 {
            return Err(Error::ZeroIssueWidth);
        }
        if self.num_lsu_blocks == 0 {
            return Err(Error::ZeroLsuBlocks);
        }
        if !self.num_lsu_lanes.is_power_of_two() || self.num_lsu_lanes > MAX_THREADS {
            return Err(Error::BadLaneCount(self.num_lsu_lanes));
        }
        if self.lsu_queue_size == 0 {
            return Err(Error::ZeroQueueSize);
        }
        if self.io_base_addr >= self.io_end_addr {
            return Err(Error::BadIoWindow {
                base: self.io_base_addr,
                end: self.io_end_addr,
            });
        }
        if self.lmem_enabled
            && self.lmem_base_addr >= self.io_base_addr
            && self.lmem_base_addr < self.io_end_addr
        {
            return Err(Error::LmemShadowedByIo {
                base: self.lmem_base_addr,
            });
        }
        Ok(())
    }
}
