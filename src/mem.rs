use crate::config::Config;
use crate::trace::MAX_THREADS;
use bitvec::{array::BitArray, BitArr};

/// Per-lane active mask of a load/store slice.
///
/// Bit `i` selects lane `i`; only the low `num_lsu_lanes` bits are ever
/// set.
pub type LaneMask = BitArr!(for MAX_THREADS, in u32);

/// Address-range classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum AddrSpace {
    Global,
    Shared,
    Io,
}

impl AddrSpace {
    /// IO window first, then the local-memory window, else global.
    #[must_use]
    pub fn classify(addr: u64, config: &Config) -> Self {
        if addr >= config.io_base_addr && addr < config.io_end_addr {
            return Self::Io;
        }
        if config.lmem_enabled
            && addr >= config.lmem_base_addr
            && (addr - config.lmem_base_addr) < (1u64 << config.lmem_log_size)
        {
            return Self::Shared;
        }
        Self::Global
    }
}

/// Anything routed through a `Switch` that carries an in-band tag.
pub trait Tagged {
    fn tag(&self) -> u64;
    fn set_tag(&mut self, tag: u64);
}

/// Per-bank LSU memory request: a masked vector of lane addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsuReq {
    pub mask: LaneMask,
    pub addrs: Vec<u64>,
    pub write: bool,
    pub tag: u64,
    pub cid: usize,
    pub uuid: u64,
}

impl LsuReq {
    #[must_use]
    pub fn new(num_lanes: usize) -> Self {
        Self {
            mask: BitArray::ZERO,
            addrs: vec![0; num_lanes],
            write: false,
            tag: 0,
            cid: 0,
            uuid: 0,
        }
    }
}

impl Tagged for LsuReq {
    fn tag(&self) -> u64 {
        self.tag
    }

    fn set_tag(&mut self, tag: u64) {
        self.tag = tag;
    }
}

impl std::fmt::Display for LsuReq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rw={}, mask=0b{:b}, ",
            self.write,
            self.mask.as_raw_slice()[0]
        )?;
        for (i, addr) in self.addrs.iter().enumerate() {
            if self.mask[i] {
                write!(f, "addr{i}={addr:#x}, ")?;
            } else {
                write!(f, "addr{i}=-, ")?;
            }
        }
        write!(f, "tag={:#x}, cid={} (#{})", self.tag, self.cid, self.uuid)
    }
}

/// Per-bank LSU memory response.
///
/// May cover a subset of the original request's lanes; the LSU reassembles
/// partials against its pending table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsuRsp {
    pub mask: LaneMask,
    pub tag: u64,
    pub cid: usize,
    pub uuid: u64,
}

impl LsuRsp {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mask: BitArray::ZERO,
            tag: 0,
            cid: 0,
            uuid: 0,
        }
    }
}

impl Default for LsuRsp {
    fn default() -> Self {
        Self::new()
    }
}

impl Tagged for LsuRsp {
    fn tag(&self) -> u64 {
        self.tag
    }

    fn set_tag(&mut self, tag: u64) {
        self.tag = tag;
    }
}

impl std::fmt::Display for LsuRsp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "mask=0b{:b}, tag={:#x}, cid={} (#{})",
            self.mask.as_raw_slice()[0],
            self.tag,
            self.cid,
            self.uuid
        )
    }
}

/// Single-lane memory request, downstream of the LSU adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemReq {
    pub addr: u64,
    pub write: bool,
    pub space: AddrSpace,
    pub tag: u64,
    pub cid: usize,
    pub uuid: u64,
}

impl Tagged for MemReq {
    fn tag(&self) -> u64 {
        self.tag
    }

    fn set_tag(&mut self, tag: u64) {
        self.tag = tag;
    }
}

impl std::fmt::Display for MemReq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rw={}, addr={:#x}, space={}, tag={:#x}, cid={} (#{})",
            self.write, self.addr, self.space, self.tag, self.cid, self.uuid
        )
    }
}

/// Single-lane memory response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRsp {
    pub tag: u64,
    pub cid: usize,
    pub uuid: u64,
}

impl Tagged for MemRsp {
    fn tag(&self) -> u64 {
        self.tag
    }

    fn set_tag(&mut self, tag: u64) {
        self.tag = tag;
    }
}

impl std::fmt::Display for MemRsp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tag={:#x}, cid={} (#{})", self.tag, self.cid, self.uuid)
    }
}
