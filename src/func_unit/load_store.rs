use crate::config::Config;
use crate::func_unit::FuncUnit;
use crate::mem::{LaneMask, LsuReq, LsuRsp};
use crate::pending;
use crate::port::{self, Clock};
use crate::sim::Component;
use crate::stats;
use crate::sync::Arc;
use crate::trace::{self, Payload};
use crate::types::{LsuOp, Op};

/// Outstanding load retained until every lane of its request answered.
#[derive(Debug, Clone)]
pub struct Entry {
    pub trace: trace::Ref,
    /// Lanes of the originating request still waiting for response bits.
    pub remaining: LaneMask,
}

/// One load/store bank.
///
/// Issue lane `iw` maps to bank `iw % num_lsu_blocks`. While `fence_lock`
/// is set no new trace from the bank's lanes may issue; the lock clears
/// only once the pending table drains.
pub struct Bank {
    pub pending_rd_reqs: pending::Table<Entry>,
    pub fence_lock: bool,
    pub fence_trace: Option<trace::Ref>,
    pub req_out: port::Ref<LsuReq>,
    pub rsp_in: port::Ref<LsuRsp>,
}

impl Bank {
    fn new(capacity: usize, req_out: port::Ref<LsuReq>, rsp_in: port::Ref<LsuRsp>) -> Self {
        Self {
            pending_rd_reqs: pending::Table::new(capacity),
            fence_lock: false,
            fence_trace: None,
            req_out,
            rsp_in,
        }
    }

    fn clear(&mut self) {
        self.pending_rd_reqs.clear();
        self.fence_lock = false;
        self.fence_trace = None;
    }
}

/// Load/store unit.
///
/// Stores retire immediately after the request leaves; loads park in the
/// bank's pending table until the response mask is fully reassembled.
pub struct LoadStoreUnit {
    config: Arc<Config>,
    stats: stats::Ref,
    inner: FuncUnit,
    pub banks: Vec<Bank>,
    pending_loads: usize,
}

impl LoadStoreUnit {
    /// `bank_ports` pairs each bank with its downstream request port and
    /// the demux response port it drains; one pair per LSU block.
    #[must_use]
    pub fn new(
        clock: &Clock,
        core_id: usize,
        config: Arc<Config>,
        stats: stats::Ref,
        bank_ports: Vec<(port::Ref<LsuReq>, port::Ref<LsuRsp>)>,
    ) -> Self {
        assert_eq!(
            bank_ports.len(),
            config.num_lsu_blocks,
            "one downstream port pair per LSU bank"
        );
        let inner = FuncUnit::new(clock, format!("core{core_id}-lsu-unit"), config.issue_width);
        let banks = bank_ports
            .into_iter()
            .map(|(req_out, rsp_in)| Bank::new(config.lsu_queue_size, req_out, rsp_in))
            .collect();
        Self {
            config,
            stats,
            inner,
            banks,
            pending_loads: 0,
        }
    }

    #[must_use]
    pub fn input(&self, lane: usize) -> port::Ref<trace::Ref> {
        Arc::clone(&self.inner.inputs[lane])
    }

    #[must_use]
    pub fn output(&self, lane: usize) -> port::Ref<trace::Ref> {
        Arc::clone(&self.inner.outputs[lane])
    }

    /// Outstanding load lanes across all banks.
    #[must_use]
    pub fn pending_loads(&self) -> usize {
        self.pending_loads
    }
}

impl Component for LoadStoreUnit {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn tick(&mut self, cycle: u64) {
        // one waiting cycle per outstanding lane, sampled before absorbing
        // responses (lanes completing this cycle still count once)
        self.stats.lock().load_latency += self.pending_loads as u64;

        // absorb responses
        for bank in &mut self.banks {
            let Some(rsp) = bank.rsp_in.lock().pop() else {
                continue;
            };
            log::debug!("{}: cycle={cycle:04} rsp {rsp}", self.inner.name);
            let entry = bank
                .pending_rd_reqs
                .get_mut(rsp.tag as usize)
                .expect("response for an unallocated tag");
            assert!(entry.remaining.any(), "pending slot with an empty mask");
            entry.remaining &= !rsp.mask;
            if entry.remaining.not_any() {
                let entry = bank.pending_rd_reqs.release(rsp.tag as usize);
                let iw = entry.trace.wid % self.inner.issue_width();
                self.inner.outputs[iw].lock().push(entry.trace, 1);
            }
            self.pending_loads -= rsp.mask.count_ones();
        }

        // issue
        let num_banks = self.banks.len();
        let num_lanes = self.config.num_lsu_lanes;
        for iw in 0..self.inner.issue_width() {
            let bank = &mut self.banks[iw % num_banks];

            if bank.fence_lock {
                // wait for all pending memory operations to complete
                if !bank.pending_rd_reqs.is_empty() {
                    continue;
                }
                let fence = bank
                    .fence_trace
                    .take()
                    .expect("fence lock without a fence trace");
                log::debug!("{}: cycle={cycle:04} fence-unlock {fence}", self.inner.name);
                self.inner.outputs[iw].lock().push(fence, 1);
                bank.fence_lock = false;
            }

            let Some(trace) = self.inner.inputs[iw].lock().front().cloned() else {
                continue;
            };
            let Op::Lsu(op) = trace.op else {
                panic!("{}: non-LSU trace dispatched: {trace}", self.inner.name);
            };

            if op == LsuOp::Fence {
                log::debug!("{}: cycle={cycle:04} fence-lock {trace}", self.inner.name);
                bank.fence_trace = Some(Arc::clone(&trace));
                bank.fence_lock = true;
                self.inner.inputs[iw].lock().pop();
                continue;
            }

            let is_write = op == LsuOp::Store;

            if !is_write && bank.pending_rd_reqs.is_full() {
                if !trace.log_once(true) {
                    log::debug!("{}: cycle={cycle:04} queue-full: {trace}", self.inner.name);
                }
                continue;
            }
            trace.log_once(false);

            // gather the active lanes of this partial issue
            let Payload::Mem { addrs } = &trace.payload else {
                panic!(
                    "{}: memory trace without an address payload: {trace}",
                    self.inner.name
                );
            };
            let mut req = LsuReq::new(num_lanes);
            req.write = is_write;
            let t0 = trace.pid * num_lanes;
            for i in 0..num_lanes {
                if trace.tmask[t0 + i] {
                    req.mask.set(i, true);
                    req.addrs[i] = addrs[t0 + i];
                }
            }
            if !is_write {
                req.tag = bank.pending_rd_reqs.allocate(Entry {
                    trace: Arc::clone(&trace),
                    remaining: req.mask,
                }) as u64;
            }
            req.cid = trace.cid;
            req.uuid = trace.uuid;

            let lanes = req.mask.count_ones();
            log::debug!("{}: cycle={cycle:04} req {req}", self.inner.name);
            bank.req_out.lock().push(req, 1);

            {
                let mut stats = self.stats.lock();
                if is_write {
                    stats.stores += lanes as u64;
                } else {
                    stats.loads += lanes as u64;
                }
            }
            if is_write {
                // do not wait on writes
                self.inner.outputs[iw].lock().push(Arc::clone(&trace), 1);
            } else {
                self.pending_loads += lanes;
            }

            self.inner.inputs[iw].lock().pop();
        }

        debug_assert_eq!(
            self.pending_loads,
            self.banks
                .iter()
                .flat_map(|bank| bank.pending_rd_reqs.iter())
                .map(|(_, entry)| entry.remaining.count_ones())
                .sum::<usize>(),
            "outstanding lane count diverged from the pending tables"
        );
    }

    fn reset(&mut self) {
        for bank in &mut self.banks {
            bank.clear();
        }
        self.pending_loads = 0;
    }
}
