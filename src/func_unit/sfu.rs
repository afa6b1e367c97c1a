use crate::config::Config;
use crate::coprocessor;
use crate::func_unit::{FuncUnit, REG_DELAY};
use crate::port::{self, Clock};
use crate::sim::Component;
use crate::sync::Arc;
use crate::trace::{self, Payload};
use crate::types::{Op, SfuOp};
use crate::warp;

/// Special-function unit.
///
/// Handles warp control and CSR ops locally and hands raster/texture/
/// output-merger traces off to the coprocessor engines, draining their
/// outputs back into the writeback lanes.
pub struct SfuUnit {
    cid: usize,
    scheduler: warp::SchedulerRef,
    inner: FuncUnit,
    raster_inputs: Vec<port::Ref<trace::Ref>>,
    tex_inputs: Vec<port::Ref<trace::Ref>>,
    om_inputs: Vec<port::Ref<trace::Ref>>,
    /// Engine output ports to poll, in registry order.
    pending_rsps: Vec<port::Ref<trace::Ref>>,
}

impl SfuUnit {
    #[must_use]
    pub fn new(
        clock: &Clock,
        core_id: usize,
        config: Arc<Config>,
        scheduler: warp::SchedulerRef,
        coprocessors: &coprocessor::Registry,
    ) -> Self {
        let inner = FuncUnit::new(clock, format!("core{core_id}-sfu-unit"), config.issue_width);
        let collect = |units: &[coprocessor::Unit]| -> Vec<port::Ref<trace::Ref>> {
            units.iter().map(|unit| Arc::clone(&unit.input)).collect()
        };
        let pending_rsps = coprocessors
            .units()
            .map(|unit| Arc::clone(&unit.output))
            .collect();
        Self {
            cid: core_id,
            scheduler,
            inner,
            raster_inputs: collect(&coprocessors.raster),
            tex_inputs: collect(&coprocessors.tex),
            om_inputs: collect(&coprocessors.om),
            pending_rsps,
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
}

impl Component for SfuUnit {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn tick(&mut self, cycle: u64) {
        // drain engine outputs addressed to this core; foreign heads stay
        // put for their owner
        for pending in &self.pending_rsps {
            let mut port = pending.lock();
            if port.front().map_or(true, |trace| trace.cid != self.cid) {
                continue;
            }
            let Some(trace) = port.pop() else { continue };
            drop(port);
            let iw = trace.wid % self.inner.issue_width();
            self.inner.outputs[iw].lock().push(trace, 1);
        }

        for iw in 0..self.inner.issue_width() {
            let Some(trace) = self.inner.inputs[iw].lock().pop() else {
                continue;
            };
            let Op::Sfu(op) = trace.op else {
                panic!("{}: non-SFU trace dispatched: {trace}", self.inner.name);
            };
            let mut release_warp = trace.fetch_stall;
            match op {
                SfuOp::Wspawn => {
                    self.inner.outputs[iw].lock().push(Arc::clone(&trace), 2 + REG_DELAY);
                    if trace.eop {
                        let Payload::Control { arg1, arg2 } = &trace.payload else {
                            panic!("{}: WSPAWN without control payload: {trace}", self.inner.name);
                        };
                        release_warp = self.scheduler.lock().wspawn(*arg1, *arg2);
                    }
                }
                SfuOp::Bar => {
                    self.inner.outputs[iw].lock().push(Arc::clone(&trace), 2 + REG_DELAY);
                    if trace.eop {
                        let Payload::Control { arg1, arg2 } = &trace.payload else {
                            panic!("{}: BAR without control payload: {trace}", self.inner.name);
                        };
                        release_warp = self.scheduler.lock().barrier(*arg1, *arg2, trace.wid);
                    }
                }
                SfuOp::Tmc
                | SfuOp::Split
                | SfuOp::Join
                | SfuOp::Pred
                | SfuOp::Csrrw
                | SfuOp::Csrrs
                | SfuOp::Csrrc => {
                    self.inner.outputs[iw].lock().push(Arc::clone(&trace), 2 + REG_DELAY);
                }
                SfuOp::Raster => {
                    let Payload::Raster { unit } = &trace.payload else {
                        panic!("{}: RASTER without unit index: {trace}", self.inner.name);
                    };
                    self.raster_inputs[*unit]
                        .lock()
                        .push(Arc::clone(&trace), REG_DELAY);
                }
                SfuOp::Tex => {
                    let Payload::Tex { unit } = &trace.payload else {
                        panic!("{}: TEX without unit index: {trace}", self.inner.name);
                    };
                    self.tex_inputs[*unit]
                        .lock()
                        .push(Arc::clone(&trace), REG_DELAY);
                }
                SfuOp::Om => {
                    let Payload::Om { unit } = &trace.payload else {
                        panic!("{}: OM without unit index: {trace}", self.inner.name);
                    };
                    self.om_inputs[*unit]
                        .lock()
                        .push(Arc::clone(&trace), REG_DELAY);
                }
                SfuOp::Cmov => {
                    // carried in the enumeration but never wired to an
                    // execution path
                    panic!("{}: CMOV has no execution path: {trace}", self.inner.name);
                }
            }

            log::debug!("{}: cycle={cycle:04} op={op}, {trace}", self.inner.name);
            if trace.eop && release_warp {
                self.scheduler.lock().resume(trace.wid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SfuUnit;
    use crate::config::Config;
    use crate::coprocessor::Registry;
    use crate::port;
    use crate::sim::Simulator;
    use crate::sync::{Arc, Mutex};
    use crate::trace::{self, Builder, Payload};
    use crate::types::{Op, SfuOp};
    use crate::warp::testing::Recorder;

    fn config() -> Arc<Config> {
        Arc::new(Config {
            issue_width: 2,
            ..Config::default()
        })
    }

    struct Harness {
        sim: Simulator,
        sfu: Arc<Mutex<SfuUnit>>,
        recorder: Arc<Mutex<Recorder>>,
        registry: Registry,
    }

    fn harness(config: Arc<Config>) -> Harness {
        let mut sim = Simulator::new();
        let recorder = Recorder::shared();
        let registry = Registry::new(&sim.clock(), &config);
        let sfu = sim.add(SfuUnit::new(
            &sim.clock(),
            0,
            config,
            recorder.clone(),
            &registry,
        ));
        Harness {
            sim,
            sfu,
            recorder,
            registry,
        }
    }

    fn arrival(sim: &mut Simulator, port: &port::Ref<trace::Ref>) -> u64 {
        for _ in 0..256 {
            if port.lock().front().is_some() {
                return sim.cycle();
            }
            sim.tick();
        }
        panic!("trace never arrived");
    }

    #[test]
    fn wspawn_invokes_the_scheduler_and_resumes_on_success() {
        let mut h = harness(config());
        let mut builder = Builder::new(Op::Sfu(SfuOp::Wspawn));
        builder.wid = 2;
        builder.payload = Payload::Control {
            arg1: 0b1111,
            arg2: 0x1000,
        };
        h.sfu.lock().input(0).lock().push(builder.build(), 1);

        // retires four cycles after issue
        let output = h.sfu.lock().output(0);
        assert_eq!(arrival(&mut h.sim, &output), 5);
        let recorder = h.recorder.lock();
        assert_eq!(recorder.wspawns, vec![(0b1111, 0x1000)]);
        assert_eq!(recorder.resumed, vec![2]);
    }

    #[test]
    fn wspawn_rejection_leaves_the_warp_suspended() {
        let mut h = harness(config());
        h.recorder.lock().wspawn_result = false;
        let mut builder = Builder::new(Op::Sfu(SfuOp::Wspawn));
        builder.payload = Payload::Control { arg1: 1, arg2: 0 };
        h.sfu.lock().input(0).lock().push(builder.build(), 1);

        h.sim.run(2);
        let recorder = h.recorder.lock();
        assert_eq!(recorder.wspawns.len(), 1);
        assert!(recorder.resumed.is_empty());
    }

    #[test]
    fn barrier_release_resumes_the_initiating_warp() {
        let mut h = harness(config());
        let mut builder = Builder::new(Op::Sfu(SfuOp::Bar));
        builder.wid = 1;
        builder.fetch_stall = true;
        builder.payload = Payload::Control { arg1: 3, arg2: 2 };
        h.sfu.lock().input(1).lock().push(builder.build(), 1);

        h.sim.run(2);
        let recorder = h.recorder.lock();
        assert_eq!(recorder.barriers, vec![(3, 2, 1)]);
        assert_eq!(recorder.resumed, vec![1]);
    }

    #[test]
    fn csr_ops_retire_after_four_cycles_without_callbacks() {
        let mut h = harness(config());
        h.sfu
            .lock()
            .input(0)
            .lock()
            .push(Builder::new(Op::Sfu(SfuOp::Csrrw)).build(), 1);

        let output = h.sfu.lock().output(0);
        assert_eq!(arrival(&mut h.sim, &output), 5);
        let recorder = h.recorder.lock();
        assert!(recorder.wspawns.is_empty());
        assert!(recorder.barriers.is_empty());
        assert!(recorder.resumed.is_empty());
    }

    #[test]
    fn tex_traces_are_forwarded_to_the_indexed_engine() {
        let config = Arc::new(Config {
            issue_width: 2,
            num_tex_units: 2,
            ..Config::default()
        });
        let mut h = harness(config);
        let mut builder = Builder::new(Op::Sfu(SfuOp::Tex));
        builder.payload = Payload::Tex { unit: 1 };
        h.sfu.lock().input(0).lock().push(builder.build(), 1);

        // handed off at cycle 1, at the engine two cycles later
        let input = h.registry.tex[1].input.clone();
        assert_eq!(arrival(&mut h.sim, &input), 3);
        assert!(h.registry.tex[0].input.lock().front().is_none());
        // the hand-off does not retire through the writeback lanes
        assert!(h.sfu.lock().output(0).lock().front().is_none());
    }

    #[test]
    fn engine_outputs_drain_only_for_the_matching_core() {
        let mut h = harness(config());
        let mut local = Builder::new(Op::Sfu(SfuOp::Raster));
        local.cid = 0;
        local.wid = 3;
        let mut foreign = Builder::new(Op::Sfu(SfuOp::Raster));
        foreign.cid = 9;
        h.registry.raster[0].output.lock().push(foreign.build(), 1);
        h.registry.raster[0].output.lock().push(local.build(), 2);

        h.sim.run(6);
        // the foreign head blocks the local trace behind it
        let head = h.registry.raster[0].output.lock().front().cloned();
        assert_eq!(head.expect("left in place").cid, 9);
        assert!(h.sfu.lock().output(1).lock().front().is_none());

        // once the owner consumes it, the local trace drains to wid % IW
        h.registry.raster[0].output.lock().pop();
        h.sim.run(2);
        let drained = h.sfu.lock().output(1).lock().pop().expect("drained");
        assert_eq!(drained.wid, 3);
    }

    #[test]
    #[should_panic(expected = "CMOV has no execution path")]
    fn cmov_is_rejected() {
        let mut h = harness(config());
        h.sfu
            .lock()
            .input(0)
            .lock()
            .push(Builder::new(Op::Sfu(SfuOp::Cmov)).build(), 1);
        h.sim.run(2);
    }
}
