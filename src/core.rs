use crate::config::Config;
use crate::coprocessor;
use crate::func_unit::{AluUnit, FpuUnit, LoadStoreUnit, SfuUnit};
use crate::interconn::{LocalMemDemux, LsuMemAdapter};
use crate::port;
use crate::sim::Simulator;
use crate::stats;
use crate::sync::{Arc, Mutex};
use crate::trace;
use crate::types::FuClass;
use crate::warp;
use console::style;

/// One SIMT core back-end: the four functional units plus the per-bank
/// memory fabric and the coprocessor hand-off arena.
///
/// Construction wires everything and registers it with the simulator in a
/// fixed order (units, then per-bank demux and adapter), so tick order —
/// and with it every latency in the fabric — is deterministic.
pub struct Core {
    pub id: usize,
    pub config: Arc<Config>,
    pub stats: stats::Ref,
    pub alu: Arc<Mutex<AluUnit>>,
    pub fpu: Arc<Mutex<FpuUnit>>,
    pub lsu: Arc<Mutex<LoadStoreUnit>>,
    pub sfu: Arc<Mutex<SfuUnit>>,
    pub lsu_demux: Vec<Arc<Mutex<LocalMemDemux>>>,
    pub lsu_adapters: Vec<Arc<Mutex<LsuMemAdapter>>>,
    pub coprocessors: coprocessor::Registry,
}

impl Core {
    pub fn new(
        sim: &mut Simulator,
        id: usize,
        config: Arc<Config>,
        scheduler: warp::SchedulerRef,
    ) -> Self {
        if let Err(err) = config.validate() {
            panic!("core{id}: invalid configuration: {err}");
        }
        let clock = sim.clock();
        let stats = stats::PerCore::shared();
        let coprocessors = coprocessor::Registry::new(&clock, &config);

        // per-bank memory fabric: LSU -> demux -> (local memory | adapter)
        let mut lsu_demux = Vec::with_capacity(config.num_lsu_blocks);
        let mut lsu_adapters = Vec::with_capacity(config.num_lsu_blocks);
        let mut bank_ports = Vec::with_capacity(config.num_lsu_blocks);
        for b in 0..config.num_lsu_blocks {
            let demux = LocalMemDemux::new(
                &clock,
                format!("core{id}-lsu-demux{b}"),
                Arc::clone(&config),
                1,
            );
            let adapter = LsuMemAdapter::new(
                &clock,
                format!("core{id}-lsu-adapter{b}"),
                Arc::clone(&config),
                1,
            );
            demux.req_dc.lock().bind(&adapter.req_in);
            adapter.rsp_in.lock().bind(&demux.rsp_dc);
            bank_ports.push((Arc::clone(&demux.req_in), Arc::clone(&demux.rsp_in)));
            lsu_demux.push(demux);
            lsu_adapters.push(adapter);
        }

        let alu = sim.add(AluUnit::new(
            &clock,
            id,
            Arc::clone(&config),
            Arc::clone(&scheduler),
        ));
        let fpu = sim.add(FpuUnit::new(&clock, id, Arc::clone(&config)));
        let lsu = sim.add(LoadStoreUnit::new(
            &clock,
            id,
            Arc::clone(&config),
            Arc::clone(&stats),
            bank_ports,
        ));
        let sfu = sim.add(SfuUnit::new(
            &clock,
            id,
            Arc::clone(&config),
            scheduler,
            &coprocessors,
        ));
        let lsu_demux: Vec<_> = lsu_demux.into_iter().map(|demux| sim.add(demux)).collect();
        let lsu_adapters: Vec<_> = lsu_adapters
            .into_iter()
            .map(|adapter| sim.add(adapter))
            .collect();

        log::info!(
            "{}: issue_width={} lsu_blocks={} lsu_lanes={}",
            style(format!("core{id}")).cyan(),
            config.issue_width,
            config.num_lsu_blocks,
            config.num_lsu_lanes,
        );

        Self {
            id,
            config,
            stats,
            alu,
            fpu,
            lsu,
            sfu,
            lsu_demux,
            lsu_adapters,
            coprocessors,
        }
    }

    /// Enqueue a decoded trace into issue lane `iw` of the unit selected
    /// by its functional-unit class; it becomes consumable next cycle.
    pub fn issue(&self, iw: usize, trace: trace::Ref) {
        assert!(iw < self.config.issue_width, "issue lane out of range");
        let input = match trace.op.class() {
            FuClass::Alu => self.alu.lock().input(iw),
            FuClass::Fpu => self.fpu.lock().input(iw),
            FuClass::Lsu => self.lsu.lock().input(iw),
            FuClass::Sfu => self.sfu.lock().input(iw),
        };
        input.lock().push(trace, 1);
    }

    /// Writeback port of one unit's issue lane.
    #[must_use]
    pub fn output(&self, class: FuClass, iw: usize) -> port::Ref<trace::Ref> {
        match class {
            FuClass::Alu => self.alu.lock().output(iw),
            FuClass::Fpu => self.fpu.lock().output(iw),
            FuClass::Lsu => self.lsu.lock().output(iw),
            FuClass::Sfu => self.sfu.lock().output(iw),
        }
    }
}
